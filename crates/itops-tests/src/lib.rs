//! End-to-end tests for the IT Ops API.
//!
//! These tests require the API server to be running. Configure the server URL
//! via the `API_BASE_URL` environment variable (default: `http://localhost:8080`)
//! and the administrator credentials via `API_ADMIN_USER` / `API_ADMIN_PASSWORD`.
//! They are ignored by default; run them with `cargo test -- --ignored`.

use itops_client::{ClientConfig, ItopsClient};
use std::time::Duration;

/// Gets the API base URL from environment or uses default.
#[must_use]
pub fn get_api_url() -> String {
    std::env::var("API_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string())
}

/// Creates an anonymous test client configured for the API.
///
/// # Errors
/// Returns error if client creation fails.
pub fn create_test_client() -> Result<ItopsClient, itops_client::Error> {
    ItopsClient::new(ClientConfig {
        base_url: get_api_url(),
        timeout: Duration::from_secs(10),
    })
}

/// Creates a client logged in as the configured administrator.
///
/// Login is limited to one attempt every two seconds per client address,
/// so a rate limited attempt is retried once after the advertised delay.
///
/// # Errors
/// Returns error if client creation or login fails.
pub async fn admin_client() -> Result<ItopsClient, itops_client::Error> {
    let username = std::env::var("API_ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
    let password =
        std::env::var("API_ADMIN_PASSWORD").unwrap_or_else(|_| "change-me-now".to_string());
    let client = create_test_client()?;

    let login = match client.login(&username, &password).await {
        Err(itops_client::Error::RateLimited { retry_after }) => {
            tokio::time::sleep(Duration::from_secs(retry_after.unwrap_or(2))).await;
            client.login(&username, &password).await?
        }
        other => other?,
    };
    Ok(client.with_token(login.token))
}

/// Generates a unique asset code to avoid conflicts between tests.
#[must_use]
pub fn unique_code(prefix: &str) -> String {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64;
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);

    format!("{}-{}-{}", prefix, ts, counter)
}
