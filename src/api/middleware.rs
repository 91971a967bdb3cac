//! API middleware for authentication and rate limiting.

use crate::auth::{Permission, Session};
use crate::db::Role;
use crate::error::ApiError;
use crate::rate_limit::{EndpointCategory, Identity, Quota};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Header name for API key style token transport.
pub const API_KEY_HEADER: &str = "X-API-Key";

const BEARER_PREFIX: &str = "Bearer ";

static RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
static RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
static RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

// ============================================================================
// Authentication
// ============================================================================

/// The authenticated caller, attached to the request by [`authenticate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// User id.
    pub user_id: i64,
    /// Username.
    pub username: String,
    /// Role.
    pub role: Role,
    /// Raw token the request carried.
    pub token: String,
}

impl AuthUser {
    fn from_session(session: Session, token: String) -> Self {
        Self {
            user_id: session.user_id,
            username: session.username,
            role: session.role,
            token,
        }
    }

    /// Fails with 403 unless the caller's role grants `permission`.
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "role {} lacks {:?} permission",
                self.role.as_str(),
                permission
            )))
        }
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("authentication required".to_string()))
    }
}

/// Reads the token from `Authorization: Bearer` or `X-API-Key`.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value.strip_prefix(BEARER_PREFIX)
    {
        return Some(token.trim().to_string());
    }

    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
}

/// Authentication middleware.
///
/// Attaches an [`AuthUser`] when the request carries a live token. Never
/// rejects: handlers that need a caller extract [`AuthUser`] and fail with
/// 401 themselves.
pub async fn authenticate(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if let Some(token) = extract_token(request.headers()) {
        match state.tokens.validate(&token) {
            Some(session) => {
                let user = AuthUser::from_session(session, token);
                request.extensions_mut().insert(user);
            }
            None => debug!("Ignoring unknown or expired token"),
        }
    }

    next.run(request).await
}

// ============================================================================
// Rate Limiting
// ============================================================================

/// State for one rate-limited route group.
#[derive(Clone)]
pub struct RateLimitScope {
    /// Application state.
    pub state: Arc<AppState>,
    /// Category bound to the group.
    pub category: EndpointCategory,
}

impl RateLimitScope {
    /// Binds `category` to a route group.
    #[must_use]
    pub fn new(state: &Arc<AppState>, category: EndpointCategory) -> Self {
        Self {
            state: Arc::clone(state),
            category,
        }
    }
}

/// Rate limiting middleware.
///
/// Counts the request against the authenticated user, or the client
/// address when anonymous. Returns 429 Too Many Requests if any window of
/// the group's category is exceeded and adds rate limit headers to allowed
/// responses.
pub async fn rate_limit_middleware(
    State(scope): State<RateLimitScope>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let identity = match request.extensions().get::<AuthUser>() {
        Some(user) => Identity::User(user.user_id),
        None => Identity::Address(extract_client_ip(&request)),
    };

    match scope.state.limiter.check(&identity, scope.category).await {
        Ok(quota) => {
            let mut response = next.run(request).await;
            if let Some(quota) = quota {
                add_quota_headers(response.headers_mut(), &quota);
            }
            response
        }
        Err(e) => e.into_response(),
    }
}

fn add_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(RATE_LIMIT_LIMIT.clone(), HeaderValue::from(quota.limit));
    headers.insert(RATE_LIMIT_REMAINING.clone(), HeaderValue::from(quota.remaining));
    headers.insert(RATE_LIMIT_RESET.clone(), HeaderValue::from(quota.reset));
}

/// Extract client IP from request.
pub fn extract_client_ip(request: &Request<Body>) -> String {
    // Try X-Forwarded-For header first
    if let Some(forwarded) = request.headers().get("X-Forwarded-For")
        && let Ok(value) = forwarded.to_str()
        && let Some(ip) = value.split(',').next()
        && !ip.trim().is_empty()
    {
        return ip.trim().to_string();
    }

    // Try X-Real-IP header
    if let Some(real_ip) = request.headers().get("X-Real-IP")
        && let Ok(value) = real_ip.to_str()
    {
        return value.trim().to_string();
    }

    // Socket peer, when served with connect info
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}
