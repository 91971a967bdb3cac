//! HTTP client for the IT Ops API.

use crate::error::Error;
use crate::types::*;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

#[cfg(test)]
mod tests;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API (e.g., "http://localhost:8080").
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for the IT Ops API.
#[derive(Debug, Clone)]
pub struct ItopsClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ItopsClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        Url::parse(&config.base_url)?;
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built.
    pub fn with_base_url(base_url: &str) -> Result<Self, Error> {
        Self::new(ClientConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        })
    }

    /// Returns a copy of this client that sends `token` as a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ========================================================================
    // Health & Auth
    // ========================================================================

    /// Performs a health check.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn health_check(&self) -> Result<HealthResponse, Error> {
        let resp = self.request(Method::GET, "/api/health").send().await?;
        self.handle_response(resp).await
    }

    /// Logs in and returns the issued token.
    ///
    /// # Errors
    /// Returns [`Error::Unauthorized`] on bad credentials.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, Error> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let resp = self
            .request(Method::POST, "/api/auth/login")
            .json(&body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Revokes the current token.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn logout(&self) -> Result<(), Error> {
        let resp = self.request(Method::POST, "/api/auth/logout").send().await?;
        self.handle_empty_response(resp).await
    }

    /// Gets the calling user's profile.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn profile(&self) -> Result<ProfileResponse, Error> {
        let resp = self.request(Method::GET, "/api/auth/profile").send().await?;
        self.handle_response(resp).await
    }

    /// Updates the calling user's name and email.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<User, Error> {
        let resp = self
            .request(Method::PUT, "/api/auth/profile")
            .json(request)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Changes the calling user's password. Its other tokens are revoked.
    ///
    /// # Errors
    /// Returns [`Error::Api`] with status 400 when the current password is wrong.
    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<(), Error> {
        let resp = self
            .request(Method::POST, "/api/auth/change-password")
            .json(request)
            .send()
            .await?;
        self.handle_empty_response(resp).await
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// Lists users.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_users(&self, page: u32, page_size: u32) -> Result<Page<User>, Error> {
        let path = format!("/api/users?page={}&page_size={}", page, page_size);
        let resp = self.request(Method::GET, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Creates a user.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn create_user(&self, request: &CreateUserRequest) -> Result<User, Error> {
        let resp = self
            .request(Method::POST, "/api/users")
            .json(request)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Updates a user.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn update_user(&self, id: i64, request: &UpdateUserRequest) -> Result<User, Error> {
        let path = format!("/api/users/{}", id);
        let resp = self.request(Method::PUT, &path).json(request).send().await?;
        self.handle_response(resp).await
    }

    /// Sets a new password for a user.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn reset_password(&self, id: i64, new_password: &str) -> Result<(), Error> {
        let path = format!("/api/users/{}/reset-password", id);
        let body = ResetPasswordRequest {
            new_password: new_password.to_string(),
        };
        let resp = self.request(Method::POST, &path).json(&body).send().await?;
        self.handle_empty_response(resp).await
    }

    /// Clears a user's lockout.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn unlock_user(&self, id: i64) -> Result<User, Error> {
        let path = format!("/api/users/{}/unlock", id);
        let resp = self.request(Method::POST, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Deactivates a user.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn deactivate_user(&self, id: i64) -> Result<(), Error> {
        let path = format!("/api/users/{}", id);
        let resp = self.request(Method::DELETE, &path).send().await?;
        self.handle_empty_response(resp).await
    }

    // ========================================================================
    // Categories & Assets
    // ========================================================================

    /// Lists categories.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_categories(&self, network_only: bool) -> Result<Vec<Category>, Error> {
        let path = format!("/api/assets/categories?network_only={}", network_only);
        let resp = self.request(Method::GET, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Lists assets.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_assets(&self, query: &AssetQuery) -> Result<Page<Asset>, Error> {
        let path = with_query("/api/assets", query)?;
        let resp = self.request(Method::GET, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Exports every asset matching `query`.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn export_assets(&self, query: &AssetQuery) -> Result<Vec<Asset>, Error> {
        let path = with_query("/api/assets/export", query)?;
        let resp = self.request(Method::GET, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Registers an asset.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn create_asset(&self, request: &CreateAssetRequest) -> Result<Asset, Error> {
        let resp = self
            .request(Method::POST, "/api/assets")
            .json(request)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Gets an asset.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for unknown or deleted assets.
    pub async fn get_asset(&self, id: i64) -> Result<Asset, Error> {
        let path = format!("/api/assets/{}", id);
        let resp = self.request(Method::GET, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Moves an asset to another status.
    ///
    /// # Errors
    /// Returns [`Error::Api`] with status 400 when the asset already has it.
    pub async fn change_asset_status(
        &self,
        id: i64,
        request: &ChangeStatusRequest,
    ) -> Result<Asset, Error> {
        let path = format!("/api/assets/{}/change-status", id);
        let resp = self.request(Method::POST, &path).json(request).send().await?;
        self.handle_response(resp).await
    }

    /// Soft-deletes an asset.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn delete_asset(&self, id: i64) -> Result<(), Error> {
        let path = format!("/api/assets/{}", id);
        let resp = self.request(Method::DELETE, &path).send().await?;
        self.handle_empty_response(resp).await
    }

    // ========================================================================
    // Ports
    // ========================================================================

    /// Lists the ports of an asset.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_ports(&self, asset_id: i64) -> Result<Vec<Port>, Error> {
        let path = format!("/api/assets/{}/ports", asset_id);
        let resp = self.request(Method::GET, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Adds a port to an asset.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn create_port(
        &self,
        asset_id: i64,
        request: &CreatePortRequest,
    ) -> Result<Port, Error> {
        let path = format!("/api/assets/{}/ports", asset_id);
        let resp = self.request(Method::POST, &path).json(request).send().await?;
        self.handle_response(resp).await
    }

    /// Creates the category's default ports on an asset.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn auto_create_ports(&self, asset_id: i64) -> Result<AutoCreatePortsResponse, Error> {
        let path = format!("/api/assets/{}/ports/auto-create", asset_id);
        let resp = self.request(Method::POST, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Links two ports.
    ///
    /// # Errors
    /// Returns [`Error::Api`] with status 400 for self or same-asset links.
    pub async fn connect_ports(
        &self,
        request: &ConnectPortsRequest,
    ) -> Result<ConnectPortsResponse, Error> {
        let resp = self
            .request(Method::POST, "/api/ports/connect")
            .json(request)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Unlinks a port.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn disconnect_port(&self, port_id: i64) -> Result<Port, Error> {
        let path = format!("/api/ports/{}/disconnect", port_id);
        let resp = self.request(Method::POST, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Updates port attributes.
    ///
    /// # Errors
    /// Returns [`Error::Api`] with status 400 for a duplicate name.
    pub async fn update_port(
        &self,
        port_id: i64,
        request: &UpdatePortRequest,
    ) -> Result<Port, Error> {
        let path = format!("/api/ports/{}", port_id);
        let resp = self.request(Method::PUT, &path).json(request).send().await?;
        self.handle_response(resp).await
    }

    /// Deletes a port.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn delete_port(&self, port_id: i64) -> Result<(), Error> {
        let path = format!("/api/ports/{}", port_id);
        let resp = self.request(Method::DELETE, &path).send().await?;
        self.handle_empty_response(resp).await
    }

    // ========================================================================
    // Topology
    // ========================================================================

    /// Gets the topology graph.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_topology(&self) -> Result<Topology, Error> {
        let resp = self.request(Method::GET, "/api/network/topology").send().await?;
        self.handle_response(resp).await
    }

    /// Searches topology devices.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn search_devices(&self, keyword: &str) -> Result<Vec<Node>, Error> {
        let query = DeviceSearchQuery {
            keyword: keyword.to_string(),
        };
        let path = with_query("/api/network/devices/search", &query)?;
        let resp = self.request(Method::GET, &path).send().await?;
        self.handle_response(resp).await
    }

    /// Saves node positions; individual failures are reported, not raised.
    ///
    /// # Errors
    /// Returns error if the request fails or the batch is malformed.
    pub async fn save_positions(
        &self,
        positions: Vec<PositionUpdate>,
    ) -> Result<SavePositionsResult, Error> {
        let resp = self
            .request(Method::PUT, "/api/network/topology/positions")
            .json(&SavePositionsRequest { positions })
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Saves one device's position.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] for unknown assets.
    pub async fn update_device_position(
        &self,
        id: i64,
        x: f64,
        y: f64,
    ) -> Result<PositionUpdate, Error> {
        let path = format!("/api/network/devices/{}/position", id);
        let resp = self
            .request(Method::PUT, &path)
            .json(&Position { x, y })
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Runs an automatic layout.
    ///
    /// # Errors
    /// Returns error if the request fails or the algorithm is unknown.
    pub async fn auto_layout(&self, algorithm: &str) -> Result<AutoLayoutResponse, Error> {
        let resp = self
            .request(Method::POST, "/api/network/topology/auto-layout")
            .json(&AutoLayoutRequest {
                algorithm: algorithm.to_string(),
            })
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Gets the renderer defaults.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn get_topology_config(&self) -> Result<TopologyConfig, Error> {
        let resp = self
            .request(Method::GET, "/api/network/topology/config")
            .send()
            .await?;
        self.handle_response(resp).await
    }

    // ========================================================================
    // Response handling
    // ========================================================================

    async fn handle_response<T: DeserializeOwned>(&self, resp: reqwest::Response) -> Result<T, Error> {
        let status = resp.status();
        let retry_after = retry_after(&resp);
        let text = resp.text().await?;

        if status.is_success() {
            decode_data(&text)
        } else {
            Err(error_from(status.as_u16(), retry_after, &text))
        }
    }

    async fn handle_empty_response(&self, resp: reqwest::Response) -> Result<(), Error> {
        let status = resp.status();
        let retry_after = retry_after(&resp);

        if status.is_success() {
            Ok(())
        } else {
            let text = resp.text().await.unwrap_or_default();
            Err(error_from(status.as_u16(), retry_after, &text))
        }
    }
}

fn retry_after(resp: &reqwest::Response) -> Option<u64> {
    resp.headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

fn with_query<Q: Serialize>(path: &str, query: &Q) -> Result<String, Error> {
    let params = serde_urlencoded::to_string(query)?;
    if params.is_empty() {
        Ok(path.to_string())
    } else {
        Ok(format!("{}?{}", path, params))
    }
}

/// Unwraps the `data` field of a success envelope.
fn decode_data<T: DeserializeOwned>(body: &str) -> Result<T, Error> {
    let envelope: Envelope<T> = serde_json::from_str(body)?;
    envelope.data.ok_or(Error::MissingData)
}

/// Maps an error envelope (or a bare body) to an [`Error`].
fn error_from(status: u16, retry_after: Option<u64>, body: &str) -> Error {
    let message = serde_json::from_str::<Envelope<serde_json::Value>>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string());

    match status {
        401 => Error::Unauthorized(message),
        404 => Error::NotFound(message),
        429 => Error::RateLimited { retry_after },
        _ => Error::Api { status, message },
    }
}
