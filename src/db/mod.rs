//! Database module: PostgreSQL pool, schema types and the domain stores.

mod memory;
mod pool;
mod postgres;
mod schema;
mod store;

pub use memory::MemoryStore;
pub use pool::DatabasePool;
pub use postgres::PgStore;
pub use schema::*;
pub use store::{
    AssetRepository, CategoryRepository, PortRepository, Store, StoreError, UserRepository,
};
