//! End-to-end lookups against a mock capability service

mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use common::{API_KEY, API_VERSION, Behavior, DESKTOP_UA, MockService, PIXEL_UA};
use devcap::cache::cookie::COOKIE_NAME;
use devcap::error::ERROR_TAG_UNEXPECTED;
use devcap::host::ServerVariable;
use devcap::{
    CacheConfig, CacheKind, CacheStore, CloudClient, DeviceRecord, Identity, MemoryCache,
    MemoryRequest, MemoryResponse, Origin, RequestContext,
};

#[tokio::test]
async fn wireless_lookup_is_fetched_then_cached() {
    let mock = MockService::start(Behavior::Json).await;
    let client = CloudClient::new(&mock.config()).unwrap();

    let first = client
        .resolve(Identity::UserAgent(PIXEL_UA), &["is_wireless_device"])
        .await;
    assert_eq!(first.origin, Origin::Remote);
    assert_eq!(first.get("is_wireless_device"), "true");
    assert!(first.errors.is_empty());
    assert_eq!(first.device_id, "google_pixel_8_ver1");
    assert_eq!(first.last_dataset_update.timestamp(), 1_700_000_000);

    let second = client
        .resolve(Identity::UserAgent(PIXEL_UA), &["is_wireless_device"])
        .await;
    assert_eq!(second.origin, Origin::Cache);
    assert_eq!(second.get("is_wireless_device"), "true");

    assert_eq!(mock.hits(), 1);
    assert_eq!(client.remote_api_version(), API_VERSION);
    assert_eq!(client.cache().mtime(), 1_700_000_000);
}

#[tokio::test]
async fn request_carries_path_and_protocol_headers() {
    let mock = MockService::start(Behavior::Json).await;
    let client = CloudClient::new(&mock.config()).unwrap();

    client
        .resolve(
            Identity::UserAgent(PIXEL_UA),
            &["is_wireless_device", "", "model_name"],
        )
        .await;

    let seen = mock.last();
    let expected_auth = format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(API_KEY)
    );

    assert_eq!(seen.path, "/v1/json/search:('is_wireless_device,model_name')");
    assert_eq!(seen.header("authorization"), Some(expected_auth.as_str()));
    assert_eq!(seen.header("user-agent"), Some(PIXEL_UA));
    assert_eq!(seen.header("accept"), Some("*/*"));
    assert_eq!(seen.header("accept-encoding"), Some("gzip"));
    assert!(
        seen.header("x-cloud-client")
            .is_some_and(|v| v.starts_with("DevCapClient/Rust_"))
    );
}

#[tokio::test]
async fn gzip_responses_are_decoded() {
    let mock = MockService::start(Behavior::Gzip).await;
    let client = CloudClient::new(&mock.config()).unwrap();

    let record = client
        .resolve(Identity::UserAgent(PIXEL_UA), &["form_factor"])
        .await;
    assert_eq!(record.origin, Origin::Remote);
    assert_eq!(record.get("form_factor"), "Smartphone");
}

#[tokio::test]
async fn compression_off_sends_no_accept_encoding() {
    let mock = MockService::start(Behavior::Gzip).await;
    let client = CloudClient::new(&mock.config().with_compression(false)).unwrap();

    let record = client
        .resolve(Identity::UserAgent(DESKTOP_UA), &["form_factor"])
        .await;
    assert_eq!(record.get("form_factor"), "Desktop");
    assert_eq!(mock.last().header("accept-encoding"), None);
}

#[tokio::test]
async fn slow_service_reads_as_timeout() {
    let mock = MockService::start(Behavior::Slow(Duration::from_secs(3))).await;
    let config = mock
        .config()
        .with_connection_timeout(Duration::from_millis(200))
        .with_read_timeout(Duration::from_millis(200));
    let client = CloudClient::new(&config).unwrap();

    let record = client
        .resolve(Identity::UserAgent(PIXEL_UA), &["is_wireless_device"])
        .await;
    assert_eq!(record.origin, Origin::None);
    assert!(!record.has_capabilities());
    assert_eq!(record.errors.get("Exception").map(String::as_str), Some("Timeout"));
}

#[tokio::test]
async fn authentication_failures_have_dedicated_messages() {
    for (status, message) in [
        (401, "Invalid API key"),
        (402, "No API key was provided"),
        (403, "API key is expired or revoked"),
    ] {
        let mock = MockService::start(Behavior::Status(status)).await;
        let client = CloudClient::new(&mock.config()).unwrap();

        let record = client
            .resolve(Identity::UserAgent(PIXEL_UA), &["is_wireless_device"])
            .await;
        assert_eq!(
            record.errors.get("Exception").map(String::as_str),
            Some(message),
            "status {status}"
        );
        assert!(!record.has_capabilities());
    }
}

#[tokio::test]
async fn server_errors_use_generic_tag_and_are_not_cached() {
    let mock = MockService::start(Behavior::Status(500)).await;
    let client = CloudClient::new(&mock.config()).unwrap();

    for _ in 0..2 {
        let record = client
            .resolve(Identity::UserAgent(PIXEL_UA), &["is_wireless_device"])
            .await;
        assert_eq!(
            record.errors.get(ERROR_TAG_UNEXPECTED).map(String::as_str),
            Some("500: Internal Server Error")
        );
    }

    assert_eq!(mock.hits(), 2);
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let mock = MockService::start(Behavior::Garbage).await;
    let client = CloudClient::new(&mock.config()).unwrap();

    let record = client
        .resolve(Identity::UserAgent(PIXEL_UA), &["is_wireless_device"])
        .await;
    assert_eq!(
        record.errors.get("Exception").map(String::as_str),
        Some("malformed response")
    );
    assert_eq!(client.remote_api_version(), "Unknown");
}

#[tokio::test]
async fn unknown_capabilities_come_back_as_errors() {
    let mock = MockService::start(Behavior::Json).await;
    let client = CloudClient::new(&mock.config()).unwrap();

    let record = client
        .resolve(Identity::UserAgent(PIXEL_UA), &["is_tablet", "made_up_cap"])
        .await;
    assert_eq!(record.get("is_tablet"), "false");
    assert_eq!(record.get("made_up_cap"), "");
    assert!(record.errors.contains_key("made_up_cap"));
}

#[tokio::test]
async fn override_user_agent_keys_the_cache() {
    let mock = MockService::start(Behavior::Json).await;
    let cache = Arc::new(MemoryCache::new());
    let client = CloudClient::with_cache(&mock.config(), cache.clone()).unwrap();

    let request = MemoryRequest::new().with_user_agent(DESKTOP_UA);
    let identity = Identity::Override {
        context: RequestContext::new(&request),
        user_agent: PIXEL_UA,
    };

    let record = client.resolve(identity, &["is_smartphone"]).await;
    assert_eq!(record.get("is_smartphone"), "true");
    assert_eq!(mock.last().header("user-agent"), Some(PIXEL_UA));

    assert!(cache.get_by_user_agent(PIXEL_UA).has_capabilities());
    assert!(!cache.get_by_user_agent(DESKTOP_UA).has_capabilities());

    let again = client.resolve(identity, &["is_smartphone"]).await;
    assert_eq!(again.origin, Origin::Cache);
    assert_eq!(mock.hits(), 1);
}

#[tokio::test]
async fn cached_records_without_capabilities_fall_through() {
    let mock = MockService::start(Behavior::Json).await;
    let cache = Arc::new(MemoryCache::new());
    let client = CloudClient::with_cache(&mock.config(), cache.clone()).unwrap();

    let mut stale = DeviceRecord::degraded("Exception", "Timeout");
    stale.origin = Origin::Cache;
    assert!(cache.set_by_user_agent(PIXEL_UA, &stale));

    let record = client
        .resolve(Identity::UserAgent(PIXEL_UA), &["is_wireless_device"])
        .await;
    assert_eq!(record.origin, Origin::Remote);
    assert_eq!(record.get("is_wireless_device"), "true");
    assert!(record.errors.is_empty());
    assert_eq!(mock.hits(), 1);

    assert!(cache.set_by_user_agent(DESKTOP_UA, &DeviceRecord::empty()));
    let record = client
        .resolve(Identity::UserAgent(DESKTOP_UA), &["form_factor"])
        .await;
    assert_eq!(record.origin, Origin::Remote);
    assert_eq!(mock.hits(), 2);
}

#[tokio::test]
async fn context_lookup_forwards_client_facts() {
    let mock = MockService::start(Behavior::Json).await;
    let client = CloudClient::new(&mock.config()).unwrap();

    let request = MemoryRequest::new()
        .with_user_agent(format!("  {PIXEL_UA}  "))
        .with_header("Accept-Encoding", "br")
        .with_header("Accept-Language", "de-DE")
        .with_header("Host", "shop.example.com")
        .with_server_variable(ServerVariable::RemoteAddr, "203.0.113.9")
        .with_server_variable(ServerVariable::ForwardedFor, "10.1.1.1");

    let record = client
        .resolve(Identity::Context(RequestContext::new(&request)), &["model_name"])
        .await;
    assert_eq!(record.get("model_name"), "Pixel 8");

    let seen = mock.last();
    assert_eq!(seen.header("user-agent"), Some(PIXEL_UA));
    assert_eq!(seen.header("x-forwarded-for"), Some("203.0.113.9,10.1.1.1"));
    assert_eq!(seen.header("x-accept-encoding"), Some("br"));
    assert_eq!(seen.header("accept-language"), Some("de-DE"));
    assert_eq!(seen.header("host"), Some(mock.host().as_str()));
}

#[tokio::test]
async fn cookie_store_round_trips_through_the_client() {
    let mock = MockService::start(Behavior::Json).await;
    let config = mock.config().with_cache(CacheConfig {
        kind: CacheKind::Cookie,
        ttl: None,
    });
    let client = CloudClient::new(&config).unwrap();
    assert_eq!(client.caching_module_name(), "CookieCache");

    let first_request = MemoryRequest::new().with_user_agent(PIXEL_UA);
    let first_response = MemoryResponse::new();
    let context = RequestContext::with_response(&first_request, &first_response);

    let record = client
        .resolve(Identity::Context(context), &["is_wireless_device"])
        .await;
    assert_eq!(record.origin, Origin::Remote);

    let cookies = first_response.cookies();
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, COOKIE_NAME);

    // The browser sends the cookie back on its next request
    let next_request = MemoryRequest::new()
        .with_user_agent(PIXEL_UA)
        .with_cookie(COOKIE_NAME, cookies[0].value.clone());
    let next_response = MemoryResponse::new();
    let record = client
        .resolve(
            Identity::Context(RequestContext::with_response(&next_request, &next_response)),
            &["is_wireless_device"],
        )
        .await;

    assert_eq!(record.origin, Origin::Cache);
    assert_eq!(record.get("is_wireless_device"), "true");
    assert_eq!(mock.hits(), 1);
    assert!(next_response.cookies().is_empty());
}

#[tokio::test]
async fn counters_are_reported_when_due() {
    let mock = MockService::start(Behavior::Json).await;
    let config = mock.config().with_report_interval(Duration::from_secs(1));
    let client = CloudClient::new(&config).unwrap();

    client
        .resolve(Identity::UserAgent(PIXEL_UA), &["is_tablet"])
        .await;
    assert!(mock.last().header("x-cloud-counters").is_none());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    client
        .resolve(Identity::UserAgent(DESKTOP_UA), &["is_tablet"])
        .await;

    let report = mock.last();
    let counters = report.header("x-cloud-counters").unwrap();
    assert!(counters.starts_with("hit:0,miss:2,error:0,age:"), "{counters}");
    assert_eq!(client.cache().counters().miss, 0);
}

#[tokio::test]
async fn weighted_pool_spreads_across_endpoints() {
    let heavy = MockService::start(Behavior::Json).await;
    let light = MockService::start(Behavior::Json).await;

    let mut config = heavy.config().with_cache(CacheConfig {
        kind: CacheKind::None,
        ttl: None,
    });
    config.clear_servers();
    config.add_server("heavy", heavy.host(), 9);
    config.add_server("light", light.host(), 1);
    let client = CloudClient::new(&config).unwrap();

    for _ in 0..60 {
        client
            .resolve(Identity::UserAgent(PIXEL_UA), &["is_tablet"])
            .await;
    }

    assert_eq!(heavy.hits() + light.hits(), 60);
    assert!(heavy.hits() > light.hits());
}
