//! Network topology: graph assembly, position persistence and auto layout.
//!
//! The assembler is read-only. Position saves apply each update on its own
//! and report per-item failures instead of aborting the batch.

mod assembler;
mod layout;

pub use assembler::assemble;
pub use layout::{LayoutAlgorithm, UnknownAlgorithm, compute as compute_layout};

use crate::db::{AssetFilter, AssetRepository, PortRepository, Store, StoreError};
use crate::models::{
    AutoLayoutResponse, FailureReason, Node, PositionFailure, PositionInput, SavePositionsResult,
    Topology,
};
use chrono::Utc;
use std::collections::HashSet;
use tracing::{info, warn};


/// Builds the topology graph from the store.
///
/// No participating assets is not an error: the graph is simply empty.
///
/// # Errors
/// Returns a store error if a read fails.
pub async fn build_topology(store: &dyn Store) -> Result<Topology, StoreError> {
    let assets = store.topology_assets().await?;
    let ids: Vec<i64> = assets.iter().map(|a| a.id).collect();
    let ports = store.ports_for_assets(&ids).await?;

    let (nodes, edges) = assemble(&assets, &ports);
    Ok(Topology {
        node_count: nodes.len(),
        edge_count: edges.len(),
        nodes,
        edges,
        generated_at: Utc::now().to_rfc3339(),
    })
}

/// Topology nodes whose asset matches `keyword`, ordered by id.
///
/// A blank keyword matches nothing.
///
/// # Errors
/// Returns a store error if a read fails.
pub async fn search_devices(store: &dyn Store, keyword: &str) -> Result<Vec<Node>, StoreError> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return Ok(Vec::new());
    }

    let filter = AssetFilter {
        keyword: Some(keyword.to_string()),
        ..Default::default()
    };
    let matching: HashSet<i64> = store
        .export_assets(&filter)
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();

    let assets: Vec<_> = store
        .topology_assets()
        .await?
        .into_iter()
        .filter(|a| matching.contains(&a.id))
        .collect();
    let ids: Vec<i64> = assets.iter().map(|a| a.id).collect();
    let ports = store.ports_for_assets(&ids).await?;

    let (nodes, _) = assemble(&assets, &ports);
    Ok(nodes)
}

/// Writes a batch of coordinates, one asset at a time.
///
/// Coordinates are stored as given; only values that are not finite numbers
/// are refused, and only for their own item.
pub async fn save_positions(store: &dyn Store, updates: &[PositionInput]) -> SavePositionsResult {
    let mut result = SavePositionsResult::default();

    for update in updates {
        let (Some(x), Some(y)) = (update.x.finite(), update.y.finite()) else {
            result.failed.push(PositionFailure {
                id: update.id,
                reason: FailureReason::InvalidCoordinate,
            });
            continue;
        };

        match store.set_position(update.id, x, y).await {
            Ok(true) => result.succeeded.push(update.id),
            Ok(false) => result.failed.push(PositionFailure {
                id: update.id,
                reason: FailureReason::NotFound,
            }),
            Err(e) => {
                warn!(asset_id = update.id, error = %e, "Position update failed");
                result.failed.push(PositionFailure {
                    id: update.id,
                    reason: FailureReason::StoreError,
                });
            }
        }
    }

    info!(
        succeeded = result.succeeded.len(),
        failed = result.failed.len(),
        "Saved topology positions"
    );
    result
}

/// Computes a layout for every topology node and persists it.
///
/// # Errors
/// Returns a store error if the node list cannot be read.
pub async fn auto_layout(
    store: &dyn Store,
    algorithm: LayoutAlgorithm,
) -> Result<AutoLayoutResponse, StoreError> {
    let ids: Vec<i64> = store
        .topology_assets()
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();

    let positions = compute_layout(algorithm, &ids);
    let inputs: Vec<PositionInput> = positions.iter().copied().map(Into::into).collect();
    let result = save_positions(store, &inputs).await;

    Ok(AutoLayoutResponse {
        algorithm: algorithm.to_string(),
        positions,
        result,
    })
}
