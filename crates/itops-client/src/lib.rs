//! HTTP client library for the IT Ops API.
//!
//! This crate provides a typed HTTP client for the IT Ops backend. Every
//! response envelope is unwrapped; error envelopes become [`Error`] values.
//!
//! # Example
//!
//! ```no_run
//! use itops_client::{ItopsClient, ClientConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), itops_client::Error> {
//!     let client = ItopsClient::new(ClientConfig {
//!         base_url: "http://localhost:8080".into(),
//!         timeout: Duration::from_secs(30),
//!     })?;
//!
//!     // Check health
//!     let health = client.health_check().await?;
//!     println!("Status: {}", health.status);
//!
//!     // Log in and read the topology
//!     let login = client.login("admin", "change-me-now").await?;
//!     let client = client.with_token(login.token);
//!     let topology = client.get_topology().await?;
//!     println!("{} nodes", topology.node_count);
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod types;

pub use client::{ClientConfig, ItopsClient};
pub use error::Error;
pub use types::*;
