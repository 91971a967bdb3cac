//! Authentication: password hashing, bearer tokens and role permissions.
//!
//! Tokens are opaque (`itops_` followed by 32 hex characters). Only their
//! SHA-256 hash is kept, together with the session it opens.

use crate::db::{Role, User};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

/// Prefix for issued tokens.
pub const TOKEN_PREFIX: &str = "itops_";

/// Password hashing errors.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Error during password hashing.
    #[error("Failed to hash password: {0}")]
    HashError(String),

    /// Error during password verification.
    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// Invalid password hash format.
    #[error("Invalid password hash format")]
    InvalidHash,
}

/// Hashes a password using Argon2id.
///
/// # Errors
/// Returns an error if hashing fails.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashError(e.to_string()))
}

/// Verifies a password against a stored PHC hash.
///
/// # Errors
/// Returns an error if the stored hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Permission levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Read-only access.
    Read,
    /// Create and modify assets, ports and layouts.
    Edit,
    /// Manage users and categories.
    Admin,
}

impl Role {
    /// Permissions granted to this role.
    #[must_use]
    pub const fn permissions(self) -> &'static [Permission] {
        match self {
            Role::Admin => &[Permission::Read, Permission::Edit, Permission::Admin],
            Role::Operator => &[Permission::Read, Permission::Edit],
            Role::Viewer => &[Permission::Read],
        }
    }

    /// Check if this role has the given permission.
    #[must_use]
    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

/// An authenticated session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// User id.
    pub user_id: i64,
    /// Username at login time.
    pub username: String,
    /// Role at login time.
    pub role: Role,
    /// Expiry, Unix milliseconds.
    pub expires_at: u64,
}

/// A freshly issued token. The raw value is only ever returned here.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Raw bearer token.
    pub token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Store for issued tokens.
#[derive(Debug)]
pub struct TokenStore {
    /// Sessions keyed by token hash.
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl TokenStore {
    /// Create a token store issuing tokens valid for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Generate a new raw token.
    fn generate_token() -> String {
        format!("{}{}", TOKEN_PREFIX, Uuid::new_v4().simple())
    }

    /// Hash a raw token.
    fn hash_token(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Issue a token for `user`.
    pub fn issue(&self, user: &User) -> IssuedToken {
        self.issue_at(user, now_millis())
    }

    fn issue_at(&self, user: &User, now_ms: u64) -> IssuedToken {
        let token = Self::generate_token();
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        let session = Session {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            expires_at: now_ms.saturating_add(ttl_ms),
        };
        self.sessions.insert(Self::hash_token(&token), session);

        IssuedToken {
            token,
            expires_in: self.ttl.as_secs(),
        }
    }

    /// Validate a raw token and return its session if it is live.
    pub fn validate(&self, token: &str) -> Option<Session> {
        self.validate_at(token, now_millis())
    }

    fn validate_at(&self, token: &str, now_ms: u64) -> Option<Session> {
        let hash = Self::hash_token(token);
        let session = self.sessions.get(&hash).map(|s| s.clone())?;
        if session.expires_at <= now_ms {
            self.sessions.remove(&hash);
            return None;
        }
        Some(session)
    }

    /// Revoke a token. Returns `true` if it existed.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(&Self::hash_token(token)).is_some()
    }

    /// Revoke every token of a user. Returns how many were removed.
    pub fn revoke_user(&self, user_id: i64) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.user_id != user_id);
        before.saturating_sub(self.sessions.len())
    }

    /// Revoke every token of a user except `keep`. Returns how many were removed.
    pub fn revoke_others(&self, user_id: i64, keep: &str) -> usize {
        let keep = Self::hash_token(keep);
        let before = self.sessions.len();
        self.sessions
            .retain(|hash, s| s.user_id != user_id || *hash == keep);
        before.saturating_sub(self.sessions.len())
    }

    /// Drop expired sessions.
    pub fn purge_expired(&self) -> usize {
        let now = now_millis();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }

    /// Get the number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Spawns a background task that periodically drops expired sessions.
pub fn spawn_purge_task(tokens: Arc<TokenStore>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(interval);
        loop {
            interval_timer.tick().await;
            let purged = tokens.purge_expired();
            debug!(purged, "Expired sessions purged");
        }
    })
}
