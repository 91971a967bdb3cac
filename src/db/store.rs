//! Repository traits shared by the PostgreSQL and in-memory stores.

use super::schema::{
    Asset, AssetFilter, AssetUpdate, Category, CategoryUpdate, NewAsset, NewCategory, NewPort,
    NewUser, Port, PortUpdate, TopologyAsset, User, UserUpdate,
};
use async_trait::async_trait;
use chrono::Duration;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record not found (or soft-deleted).
    #[error("{entity} {id} does not exist")]
    NotFound {
        /// Entity kind, e.g. `"asset"`.
        entity: &'static str,
        /// Requested id.
        id: i64,
    },

    /// Unique constraint violation.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A write would break a data invariant.
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// Query or connection failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    StoreError::Conflict(db_err.message().to_string())
                } else if db_err.is_check_violation() || db_err.is_foreign_key_violation() {
                    StoreError::DataIntegrity(db_err.message().to_string())
                } else {
                    StoreError::Database(db_err.message().to_string())
                }
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

/// Category persistence.
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Lists non-deleted categories ordered by `sort_order`.
    async fn list_categories(&self, network_only: bool) -> Result<Vec<Category>, StoreError>;

    /// Gets a category by ID.
    async fn get_category(&self, id: i64) -> Result<Category, StoreError>;

    /// Creates a category; the code must be unique.
    async fn create_category(&self, new: &NewCategory) -> Result<Category, StoreError>;

    /// Applies a partial update.
    async fn update_category(
        &self,
        id: i64,
        update: &CategoryUpdate,
    ) -> Result<Category, StoreError>;

    /// Soft-deletes a category.
    ///
    /// Fails with [`StoreError::DataIntegrity`] while non-deleted assets still
    /// reference it.
    async fn delete_category(&self, id: i64) -> Result<(), StoreError>;
}

/// Asset persistence, including topology coordinates.
#[async_trait]
pub trait AssetRepository: Send + Sync {
    /// Lists one page of assets matching `filter`, with the total match count.
    async fn list_assets(
        &self,
        filter: &AssetFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Asset>, u64), StoreError>;

    /// Lists every asset matching `filter`.
    async fn export_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError>;

    /// Gets a non-deleted asset by ID.
    async fn get_asset(&self, id: i64) -> Result<Asset, StoreError>;

    /// Creates an asset; the asset code must be unique and the category must exist.
    async fn create_asset(&self, new: &NewAsset) -> Result<Asset, StoreError>;

    /// Applies a partial update.
    async fn update_asset(&self, id: i64, update: &AssetUpdate) -> Result<Asset, StoreError>;

    /// Soft-deletes an asset.
    async fn delete_asset(&self, id: i64) -> Result<(), StoreError>;

    /// Non-deleted assets whose non-deleted category participates in the
    /// topology, ordered by id.
    async fn topology_assets(&self) -> Result<Vec<TopologyAsset>, StoreError>;

    /// Writes coordinates for one asset.
    ///
    /// Returns `false` when the asset does not exist or is soft-deleted.
    async fn set_position(&self, id: i64, x: f64, y: f64) -> Result<bool, StoreError>;
}

/// Port persistence and linking.
#[async_trait]
pub trait PortRepository: Send + Sync {
    /// Lists the ports of one asset ordered by id.
    async fn list_ports(&self, asset_id: i64) -> Result<Vec<Port>, StoreError>;

    /// Lists the ports of several assets ordered by asset then id.
    async fn ports_for_assets(&self, asset_ids: &[i64]) -> Result<Vec<Port>, StoreError>;

    /// Gets a port by ID.
    async fn get_port(&self, id: i64) -> Result<Port, StoreError>;

    /// Creates a port on an existing asset; names are unique per asset.
    async fn create_port(&self, asset_id: i64, new: &NewPort) -> Result<Port, StoreError>;

    /// Applies a partial update; the new name must stay unique per asset.
    async fn update_port(&self, id: i64, update: &PortUpdate) -> Result<Port, StoreError>;

    /// Deletes a port, clearing its peer's link first.
    async fn delete_port(&self, id: i64) -> Result<(), StoreError>;

    /// Links two ports on different assets.
    ///
    /// Previous links of either port are cleared. Both peer references are
    /// written together.
    async fn connect_ports(
        &self,
        port_id: i64,
        peer_port_id: i64,
        cable_type: Option<&str>,
    ) -> Result<(Port, Port), StoreError>;

    /// Clears the link of a port and of its peer.
    async fn disconnect_port(&self, id: i64) -> Result<Port, StoreError>;
}

/// User persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Gets a user by ID.
    async fn get_user(&self, id: i64) -> Result<User, StoreError>;

    /// Gets a user by username.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Lists one page of users with the total count.
    async fn list_users(&self, limit: u32, offset: u64) -> Result<(Vec<User>, u64), StoreError>;

    /// Creates a user from an already hashed password.
    async fn create_user(&self, new: &NewUser, password_hash: &str) -> Result<User, StoreError>;

    /// Applies a partial update.
    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User, StoreError>;

    /// Replaces the password hash.
    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError>;

    /// Marks a user inactive.
    async fn deactivate_user(&self, id: i64) -> Result<(), StoreError>;

    /// Records a successful login and clears any failure count or lock.
    async fn record_login(&self, id: i64) -> Result<(), StoreError>;

    /// Records a failed login.
    ///
    /// When the failure count reaches `max_failures` the account is locked for
    /// `lock_for` and the count starts over. A `max_failures` of zero never
    /// locks. Returns the updated user.
    async fn record_failed_login(
        &self,
        id: i64,
        max_failures: u32,
        lock_for: Duration,
    ) -> Result<User, StoreError>;

    /// Clears the failure count and any lock.
    async fn unlock_user(&self, id: i64) -> Result<User, StoreError>;

    /// Counts users.
    async fn count_users(&self) -> Result<u64, StoreError>;
}

/// Every repository the API needs, behind one object.
#[async_trait]
pub trait Store: CategoryRepository + AssetRepository + PortRepository + UserRepository {
    /// Checks that the backing storage is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
