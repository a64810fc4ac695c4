//! Header names used on the wire

pub const USER_AGENT: &str = "User-Agent";
pub const ACCEPT: &str = "Accept";
pub const ACCEPT_ENCODING: &str = "Accept-Encoding";
pub const AUTHORIZATION: &str = "Authorization";
pub const CONNECTION: &str = "Connection";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const X_FORWARDED_FOR: &str = "X-Forwarded-For";

/// Identifies the client library to the remote service
pub const X_CLOUD_CLIENT: &str = "X-Cloud-Client";

/// Carries cache counters (`hit:N,miss:N,error:N,age:N`)
pub const X_CLOUD_COUNTERS: &str = "X-Cloud-Counters";

/// The end user's original `Accept-Encoding`
pub const X_ACCEPT_ENCODING: &str = "X-Accept-Encoding";

/// Inbound headers the transport sets itself and never forwards
pub const TRANSPORT_OWNED: [&str; 4] = ["Host", "Content-Length", "Transfer-Encoding", CONNECTION];
