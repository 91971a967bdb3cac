//! Unit tests for client module.

use super::*;

// ============================================================================
// ClientConfig Tests
// ============================================================================

#[test]
fn test_client_config_default() {
    let config = ClientConfig::default();

    assert_eq!(config.base_url, "http://localhost:8080");
    assert_eq!(config.timeout, Duration::from_secs(30));
}

// ============================================================================
// ItopsClient Creation Tests
// ============================================================================

#[test]
fn test_itops_client_new() {
    let client = ItopsClient::new(ClientConfig::default());

    assert!(client.is_ok());
}

#[test]
fn test_itops_client_base_url_trimmed() {
    let client = ItopsClient::with_base_url("http://localhost:8080/").unwrap();

    assert_eq!(client.base_url(), "http://localhost:8080");
    assert_eq!(client.url("/api/health"), "http://localhost:8080/api/health");
}

#[test]
fn test_itops_client_rejects_invalid_url() {
    let client = ItopsClient::with_base_url("not a url");

    assert!(matches!(client, Err(Error::InvalidUrl(_))));
}

#[test]
fn test_with_token_keeps_base_url() {
    let client = ItopsClient::with_base_url("http://localhost:3000")
        .unwrap()
        .with_token("itops_abc");

    assert_eq!(client.token.as_deref(), Some("itops_abc"));
    assert_eq!(client.base_url(), "http://localhost:3000");
}

// ============================================================================
// Query Building Tests
// ============================================================================

#[test]
fn test_with_query_empty() {
    let path = with_query("/api/assets", &AssetQuery::default()).unwrap();

    assert_eq!(path, "/api/assets");
}

#[test]
fn test_with_query_filters() {
    let query = AssetQuery {
        page: Some(2),
        status: Some(AssetStatus::InUse),
        keyword: Some("SW 01".to_string()),
        ..Default::default()
    };
    let path = with_query("/api/assets", &query).unwrap();

    assert_eq!(path, "/api/assets?page=2&status=in_use&keyword=SW+01");
}

#[test]
fn test_with_query_device_search() {
    let query = DeviceSearchQuery {
        keyword: "10.0.0.1 core".to_string(),
    };
    let path = with_query("/api/network/devices/search", &query).unwrap();

    assert_eq!(path, "/api/network/devices/search?keyword=10.0.0.1+core");
}

// ============================================================================
// Envelope Handling Tests
// ============================================================================

#[test]
fn test_decode_data_unwraps_envelope() {
    let body = r#"{"code":200,"success":true,"message":"ok","data":{"status":"ok","version":"0.1.0","store":"memory"},"timestamp":"2026-01-01 00:00:00"}"#;
    let health: HealthResponse = decode_data(body).unwrap();

    assert_eq!(health.status, "ok");
    assert_eq!(health.store, "memory");
}

#[test]
fn test_decode_data_missing_payload() {
    let body = r#"{"code":200,"success":true,"message":"ok","data":null,"timestamp":"2026-01-01 00:00:00"}"#;
    let result: Result<HealthResponse, Error> = decode_data(body);

    assert!(matches!(result, Err(Error::MissingData)));
}

#[test]
fn test_error_from_maps_status() {
    let body = r#"{"code":404,"success":false,"message":"Not found: asset 9 does not exist","data":null,"timestamp":"2026-01-01 00:00:00"}"#;

    match error_from(404, None, body) {
        Error::NotFound(message) => assert!(message.contains("asset 9")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(error_from(401, None, "{}"), Error::Unauthorized(_)));
    assert!(matches!(
        error_from(429, Some(3), ""),
        Error::RateLimited {
            retry_after: Some(3)
        }
    ));
    assert!(matches!(
        error_from(500, None, "plain text"),
        Error::Api { status: 500, ref message } if message == "plain text"
    ));
}
