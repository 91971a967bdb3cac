//! API request and response models.

use crate::db::{AssetFilter, AssetStatus, Port, Role, User};
use crate::response::PageQuery;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// Health Models
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Backing store kind (`postgres` or `memory`).
    pub store: String,
}

// ============================================================================
// Topology Models
// ============================================================================

/// Persisted layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// Coarse device type derived from the category flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Category flagged as network equipment.
    NetworkDevice,
    /// Category flagged as an end-user terminal.
    Terminal,
    /// Neither.
    Other,
}

impl DeviceType {
    /// Network equipment wins over terminal when both flags are set.
    #[must_use]
    pub fn from_flags(is_network_device: bool, is_terminal: bool) -> Self {
        match (is_network_device, is_terminal) {
            (true, false) => DeviceType::NetworkDevice,
            (_, true) => DeviceType::Terminal,
            (false, false) => DeviceType::Other,
        }
    }
}

/// A port as shown on a topology node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NodePort {
    /// Port id.
    pub id: i64,
    /// Port name.
    pub name: String,
    /// Port type.
    pub port_type: Option<String>,
    /// Port speed.
    pub port_speed: Option<String>,
    /// Uplink flag.
    pub is_uplink: bool,
    /// Whether the port is linked.
    pub is_connected: bool,
    /// Peer port id, if linked.
    pub peer_port_id: Option<i64>,
}

impl From<&Port> for NodePort {
    fn from(port: &Port) -> Self {
        Self {
            id: port.id,
            name: port.name.clone(),
            port_type: port.port_type.clone(),
            port_speed: port.port_speed.clone(),
            is_uplink: port.is_uplink,
            is_connected: port.is_connected,
            peer_port_id: port.peer_port_id,
        }
    }
}

/// A topology vertex: one participating asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Node {
    /// Asset id.
    pub id: i64,
    /// Asset name.
    pub name: String,
    /// Category name.
    pub category: String,
    /// Device type.
    pub device_type: DeviceType,
    /// Asset status.
    pub status: String,
    /// Management IP address.
    pub ip_address: Option<String>,
    /// Ports owned by the asset.
    pub ports: Vec<NodePort>,
    /// Persisted coordinates, `null` when never placed.
    pub position: Option<Position>,
}

/// A topology edge: one physical port-to-port link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Edge {
    /// Lower asset id.
    pub from_asset_id: i64,
    /// Higher asset id.
    pub to_asset_id: i64,
    /// Port on `from_asset_id`.
    pub from_port_id: i64,
    /// Name of `from_port_id`.
    pub from_port: String,
    /// Port on `to_asset_id`.
    pub to_port_id: i64,
    /// Name of `to_port_id`.
    pub to_port: String,
}

/// The assembled topology graph.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Topology {
    /// Vertices ordered by asset id.
    pub nodes: Vec<Node>,
    /// Edges ordered by `(from_asset_id, to_asset_id, from_port_id)`.
    pub edges: Vec<Edge>,
    /// Number of nodes.
    pub node_count: usize,
    /// Number of edges.
    pub edge_count: usize,
    /// Generation time (RFC 3339).
    pub generated_at: String,
}

// ============================================================================
// Position Models
// ============================================================================

/// One requested coordinate update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PositionUpdate {
    /// Asset id.
    pub id: i64,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

/// A submitted coordinate.
///
/// Anything that is not a JSON number is kept as absent so the item can be
/// refused on its own instead of failing the whole batch.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, ToSchema)]
#[serde(from = "serde_json::Value")]
#[schema(value_type = f64)]
pub struct Coordinate(Option<f64>);

impl Coordinate {
    /// The value, if it is a finite number.
    #[must_use]
    pub fn finite(self) -> Option<f64> {
        self.0.filter(|v| v.is_finite())
    }
}

impl From<f64> for Coordinate {
    fn from(value: f64) -> Self {
        Self(Some(value))
    }
}

impl From<serde_json::Value> for Coordinate {
    fn from(value: serde_json::Value) -> Self {
        Self(value.as_f64())
    }
}

/// One coordinate update as submitted.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, ToSchema)]
pub struct PositionInput {
    /// Asset id.
    pub id: i64,
    /// X coordinate.
    pub x: Coordinate,
    /// Y coordinate.
    pub y: Coordinate,
}

impl From<PositionUpdate> for PositionInput {
    fn from(update: PositionUpdate) -> Self {
        Self {
            id: update.id,
            x: update.x.into(),
            y: update.y.into(),
        }
    }
}

/// Batch position update request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SavePositionsRequest {
    /// Updates to apply independently.
    pub positions: Vec<PositionInput>,
}

/// Single-asset position update request.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct DevicePositionRequest {
    /// X coordinate.
    pub x: Coordinate,
    /// Y coordinate.
    pub y: Coordinate,
}

/// Why one position update failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum FailureReason {
    /// Asset absent or soft-deleted.
    #[serde(rename = "not found")]
    NotFound,
    /// Coordinate is not a finite number.
    #[serde(rename = "invalid coordinate")]
    InvalidCoordinate,
    /// The store rejected the write.
    #[serde(rename = "store error")]
    StoreError,
}

/// A failed position update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PositionFailure {
    /// Asset id.
    pub id: i64,
    /// Failure reason.
    pub reason: FailureReason,
}

/// Partial-success report for a position batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SavePositionsResult {
    /// Ids whose coordinates were written.
    pub succeeded: Vec<i64>,
    /// Ids that were not written, with the reason.
    pub failed: Vec<PositionFailure>,
}

impl SavePositionsResult {
    /// Whether every update was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

// ============================================================================
// Layout Models
// ============================================================================

/// Auto-layout request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AutoLayoutRequest {
    /// `circular` or `grid`.
    pub algorithm: String,
}

/// Auto-layout result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AutoLayoutResponse {
    /// Algorithm applied.
    pub algorithm: String,
    /// Computed coordinates, ordered by asset id.
    pub positions: Vec<PositionUpdate>,
    /// Persistence report.
    pub result: SavePositionsResult,
}

// ============================================================================
// Asset and Port Models
// ============================================================================

/// Category list query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    /// Only categories flagged as network equipment.
    #[serde(default)]
    pub network_only: bool,
}

/// Asset list and export query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AssetListQuery {
    /// Page number (1-based). Ignored by export.
    pub page: Option<u32>,
    /// Page size. Ignored by export.
    pub page_size: Option<u32>,
    /// Restrict to one category.
    pub category_id: Option<i64>,
    /// Restrict to one status.
    pub status: Option<AssetStatus>,
    /// Substring match on name, code, IP address or model.
    pub keyword: Option<String>,
}

impl AssetListQuery {
    /// Pagination part of the query.
    #[must_use]
    pub fn page_query(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }

    /// Filter part of the query.
    #[must_use]
    pub fn filter(&self) -> AssetFilter {
        AssetFilter {
            category_id: self.category_id,
            status: self.status,
            keyword: self.keyword.clone(),
        }
    }
}

/// Port link request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectPortsRequest {
    /// First port.
    pub port_id: i64,
    /// Port on another asset.
    pub peer_port_id: i64,
    /// copper / fiber / wireless.
    #[serde(default)]
    pub cable_type: Option<String>,
}

/// Both sides of a new link.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectPortsResponse {
    /// The requested port.
    pub port: Port,
    /// Its peer.
    pub peer: Port,
}

/// Asset status change request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    /// New status.
    pub status: AssetStatus,
    /// Reason recorded in the log.
    #[serde(default)]
    pub remark: Option<String>,
}

/// Network device search query.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeviceSearchQuery {
    /// Substring match on name, code, IP address or model.
    #[serde(default)]
    pub keyword: String,
}

/// Port auto-creation result.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AutoCreatePortsResponse {
    /// Ports created by this call.
    pub created: Vec<Port>,
    /// Names that already existed.
    pub skipped: Vec<String>,
}

// ============================================================================
// Auth Models
// ============================================================================

/// Login request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Username.
    pub username: String,
    /// Password.
    pub password: String,
}

/// Login response. The token is only returned here.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token.
    pub token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    /// Authenticated user.
    pub user: User,
}

/// Self-service profile update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    /// Display name.
    #[serde(default)]
    pub real_name: Option<String>,
    /// Contact email.
    #[serde(default)]
    pub email: Option<String>,
}

/// Self-service password change.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    /// Current password.
    pub old_password: String,
    /// Replacement password.
    pub new_password: String,
    /// Must equal `new_password`.
    pub confirm_password: String,
}

/// Administrator password reset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    /// Replacement password.
    pub new_password: String,
}

/// Profile of the calling user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProfileResponse {
    /// User record.
    pub user: User,
    /// Effective role.
    pub role: Role,
    /// Granted permissions.
    pub permissions: Vec<crate::auth::Permission>,
}
