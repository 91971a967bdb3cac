//! Application state management.

use crate::auth::{TokenStore, hash_password};
use crate::config::Config;
use crate::db::{DatabasePool, MemoryStore, NewUser, PgStore, Role, Store, User, UserRepository};
use crate::error::ApiError;
use crate::rate_limit::RateLimiter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Domain repositories.
    pub store: Arc<dyn Store>,
    /// Request rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// Issued bearer tokens.
    pub tokens: Arc<TokenStore>,
    /// Application configuration.
    pub config: Config,
    /// Optional database pool.
    pub db: Option<DatabasePool>,
}

impl AppState {
    /// Creates application state over an arbitrary store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: Config) -> Self {
        let limiter = Arc::new(RateLimiter::in_memory(&config.rate_limit));
        let tokens = Arc::new(TokenStore::new(Duration::from_secs(
            config.auth.token_ttl_secs,
        )));

        Self {
            store,
            limiter,
            tokens,
            config,
            db: None,
        }
    }

    /// Creates application state backed by PostgreSQL.
    #[must_use]
    pub fn with_database(db: DatabasePool, config: Config) -> Self {
        let store = Arc::new(PgStore::new(db.pool().clone()));
        let mut state = Self::new(store, config);
        state.db = Some(db);
        state
    }

    /// Creates application state backed by an in-memory store seeded with
    /// the standard categories.
    #[must_use]
    pub fn in_memory(config: Config) -> Self {
        warn!("Running without a database; data will not survive a restart");
        Self::new(Arc::new(MemoryStore::with_standard_categories()), config)
    }

    /// Backing store kind.
    #[must_use]
    pub fn store_kind(&self) -> &'static str {
        if self.db.is_some() { "postgres" } else { "memory" }
    }

    /// Creates the configured bootstrap administrator when no user exists yet.
    ///
    /// Returns the created user, or `None` when nothing was done.
    ///
    /// # Errors
    /// Returns an error if the store fails or the password cannot be hashed.
    pub async fn ensure_bootstrap_admin(&self) -> Result<Option<User>, ApiError> {
        let Some(ref admin) = self.config.auth.bootstrap_admin else {
            return Ok(None);
        };
        if self.store.count_users().await? > 0 {
            return Ok(None);
        }

        let password_hash =
            hash_password(&admin.password).map_err(|e| ApiError::Internal(e.to_string()))?;
        let user = self
            .store
            .create_user(
                &NewUser {
                    username: admin.username.clone(),
                    password: String::new(),
                    real_name: Some("Administrator".to_string()),
                    email: None,
                    role: Role::Admin,
                },
                &password_hash,
            )
            .await?;

        info!(username = %user.username, "Created bootstrap administrator");
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootstrapAdmin;

    fn config_with_admin() -> Config {
        let mut config = Config::default();
        config.auth.bootstrap_admin = Some(BootstrapAdmin {
            username: "admin".to_string(),
            password: "admin-pass".to_string(),
        });
        config
    }

    #[tokio::test]
    async fn test_in_memory_state() {
        let state = AppState::in_memory(Config::default());
        assert_eq!(state.store_kind(), "memory");
        assert!(state.db.is_none());
        assert!(state.store.ping().await.is_ok());
        assert!(state.tokens.is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_created_once() {
        let state = AppState::in_memory(config_with_admin());

        let created = state.ensure_bootstrap_admin().await.unwrap().unwrap();
        assert_eq!(created.role, Role::Admin);
        assert!(created.password_hash.starts_with("$argon2id$"));

        assert!(state.ensure_bootstrap_admin().await.unwrap().is_none());
        assert_eq!(state.store.count_users().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_no_bootstrap_admin_configured() {
        let state = AppState::in_memory(Config::default());
        assert!(state.ensure_bootstrap_admin().await.unwrap().is_none());
        assert_eq!(state.store.count_users().await.unwrap(), 0);
    }
}
