//! Wire protocol of the remote capability service
//!
//! Requests are plain `GET`s whose path names the wanted capabilities;
//! responses are JSON objects, optionally gzip-compressed.

pub mod headers;
mod request;
mod response;

pub use request::{InboundFacts, OutboundRequest, RequestOptions, build_path, build_request};
pub use response::{CloudResponse, decode_body, parse_response};

/// Error tag used for transport, authentication and decoding failures
pub const ERROR_TAG_EXCEPTION: &str = "Exception";

/// Error tag recorded when the `errors` object of a response is unusable
pub const ERROR_TAG_ERRORS: &str = "errors";

/// Error tag recorded when the `capabilities` object of a response is unusable
pub const ERROR_TAG_CAPABILITIES: &str = "capabilities";

/// Search path prefix; capability names follow, comma-separated
pub const REQUEST_PATH_PREFIX: &str = "/v1/json/search:('";

/// Search path suffix
pub const REQUEST_PATH_SUFFIX: &str = "')";
