//! Health and network topology handlers.

use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::AuthUser;
use crate::auth::Permission;
use crate::config::TopologyConfig;
use crate::error::ApiError;
use crate::models::{
    AutoLayoutRequest, AutoLayoutResponse, DevicePositionRequest, DeviceSearchQuery,
    FailureReason, HealthResponse, Node, PositionUpdate, SavePositionsRequest,
    SavePositionsResult, Topology,
};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::topology::{self, LayoutAlgorithm};
use axum::extract::State;
use std::sync::Arc;
use tracing::warn;

// ============================================================================
// Health Check
// ============================================================================

/// Health check endpoint.
///
/// Pings the backing store; an unreachable store reports 503.
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Store unreachable")
    ),
    tag = "Health"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<ApiResponse<HealthResponse>, ApiError> {
    if let Err(e) = state.store.ping().await {
        warn!(error = %e, "Health check failed");
        return Err(ApiError::Unavailable("store unreachable".to_string()));
    }

    Ok(ApiResponse::success(
        HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.store_kind().to_string(),
        },
        "Service is healthy",
    ))
}

/// Liveness check.
#[utoipa::path(
    get,
    path = "/api/ping",
    responses((status = 200, description = "pong", body = String)),
    tag = "Health"
)]
pub async fn ping() -> ApiResponse<String> {
    ApiResponse::success("pong".to_string(), "pong")
}

// ============================================================================
// Topology
// ============================================================================

/// Returns the network topology graph.
#[utoipa::path(
    get,
    path = "/api/network/topology",
    responses(
        (status = 200, description = "Topology graph", body = Topology),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Topology"
)]
pub async fn get_topology(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<ApiResponse<Topology>, ApiError> {
    user.require(Permission::Read)?;

    let topology = topology::build_topology(state.store.as_ref()).await?;
    let message = format!(
        "{} nodes, {} edges",
        topology.node_count, topology.edge_count
    );
    Ok(ApiResponse::success(topology, message))
}

/// Searches topology devices by name, code, IP address or model.
#[utoipa::path(
    get,
    path = "/api/network/devices/search",
    params(DeviceSearchQuery),
    responses(
        (status = 200, description = "Matching nodes", body = [Node]),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Topology"
)]
pub async fn search_devices(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<DeviceSearchQuery>,
) -> Result<ApiResponse<Vec<Node>>, ApiError> {
    user.require(Permission::Read)?;

    let nodes = topology::search_devices(state.store.as_ref(), &query.keyword).await?;
    let message = format!("{} devices found", nodes.len());
    Ok(ApiResponse::success(nodes, message))
}

/// Saves node coordinates.
///
/// Each update is applied on its own; the response lists which ids were
/// written and why the others were not. The status is 200 even when some
/// updates fail.
#[utoipa::path(
    put,
    path = "/api/network/topology/positions",
    request_body = SavePositionsRequest,
    responses(
        (status = 200, description = "Per-item result", body = SavePositionsResult),
        (status = 422, description = "Malformed or empty batch")
    ),
    tag = "Topology"
)]
pub async fn save_positions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<SavePositionsRequest>,
) -> Result<ApiResponse<SavePositionsResult>, ApiError> {
    user.require(Permission::Edit)?;

    if request.positions.is_empty() {
        return Err(ApiError::field("positions", "must contain at least one item"));
    }

    let total = request.positions.len();
    let result = topology::save_positions(state.store.as_ref(), &request.positions).await;
    let message = if result.is_complete() {
        format!("Saved {} positions", total)
    } else {
        format!("Saved {} of {} positions", result.succeeded.len(), total)
    };

    Ok(ApiResponse::success(result, message))
}

/// Saves one device's coordinates.
#[utoipa::path(
    put,
    path = "/api/network/devices/{id}/position",
    params(("id" = i64, Path, description = "Asset id")),
    request_body = DevicePositionRequest,
    responses(
        (status = 200, description = "Position saved", body = PositionUpdate),
        (status = 404, description = "Asset not found"),
        (status = 422, description = "Invalid coordinate")
    ),
    tag = "Topology"
)]
pub async fn update_device_position(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(request): ValidJson<DevicePositionRequest>,
) -> Result<ApiResponse<PositionUpdate>, ApiError> {
    user.require(Permission::Edit)?;

    let (Some(x), Some(y)) = (request.x.finite(), request.y.finite()) else {
        return Err(ApiError::field("position", "coordinates must be finite numbers"));
    };
    let update = PositionUpdate { id, x, y };
    let result = topology::save_positions(state.store.as_ref(), &[update.into()]).await;

    match result.failed.first().map(|f| f.reason) {
        None => Ok(ApiResponse::success(update, "Position saved")),
        Some(FailureReason::NotFound) => {
            Err(ApiError::NotFound(format!("asset {} does not exist", id)))
        }
        Some(FailureReason::InvalidCoordinate) => {
            Err(ApiError::field("position", "coordinates must be finite numbers"))
        }
        Some(FailureReason::StoreError) => {
            Err(ApiError::Database(format!("position update for asset {} failed", id)))
        }
    }
}

/// Computes and persists a layout for every topology node.
#[utoipa::path(
    post,
    path = "/api/network/topology/auto-layout",
    request_body = AutoLayoutRequest,
    responses(
        (status = 200, description = "Computed and saved positions", body = AutoLayoutResponse),
        (status = 422, description = "Unknown algorithm")
    ),
    tag = "Topology"
)]
pub async fn auto_layout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<AutoLayoutRequest>,
) -> Result<ApiResponse<AutoLayoutResponse>, ApiError> {
    user.require(Permission::Edit)?;

    let algorithm: LayoutAlgorithm = request
        .algorithm
        .parse()
        .map_err(|e: topology::UnknownAlgorithm| ApiError::field("algorithm", e.to_string()))?;

    let response = topology::auto_layout(state.store.as_ref(), algorithm).await?;
    let message = format!(
        "Applied {} layout to {} nodes",
        response.algorithm,
        response.positions.len()
    );
    Ok(ApiResponse::success(response, message))
}

/// Returns the renderer defaults.
#[utoipa::path(
    get,
    path = "/api/network/topology/config",
    responses((status = 200, description = "Display configuration", body = TopologyConfig)),
    tag = "Topology"
)]
pub async fn get_topology_config(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<ApiResponse<TopologyConfig>, ApiError> {
    user.require(Permission::Read)?;
    Ok(ApiResponse::success(state.config.topology.clone(), "Topology configuration"))
}
