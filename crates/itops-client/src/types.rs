//! Request and response types for the IT Ops API.
//!
//! Timestamps are kept as the strings the server sends.

use serde::{Deserialize, Serialize};


// ============================================================================
// Envelope
// ============================================================================

/// Response envelope wrapping every API payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// HTTP status code.
    pub code: u16,
    /// Whether the request succeeded.
    pub success: bool,
    /// Human readable message.
    pub message: String,
    /// Payload.
    pub data: Option<T>,
    /// `YYYY-MM-DD HH:MM:SS` (UTC).
    pub timestamp: String,
}

/// One page of a list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub list: Vec<T>,
    /// Total matching items.
    pub total: u64,
    /// Page number (1-based).
    pub page: u32,
    /// Page size.
    pub page_size: u32,
    /// Number of pages.
    pub total_pages: u64,
}

/// Rate limit details carried by a 429 envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitDetails {
    /// Window maximum.
    pub limit: u32,
    /// Remaining requests.
    pub remaining: u32,
    /// Unix time the window resets.
    pub reset: u64,
    /// Seconds to wait.
    pub retry_after: u64,
}

// ============================================================================
// Health & Auth
// ============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// `postgres` or `memory`.
    pub store: String,
}

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access.
    Admin,
    /// Read and edit.
    Operator,
    /// Read only.
    #[default]
    Viewer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Operator => write!(f, "operator"),
            Self::Viewer => write!(f, "viewer"),
        }
    }
}

/// A system user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<String>,
    /// Consecutive failed logins since the last success.
    #[serde(default)]
    pub failed_login_count: i32,
    /// Logins are refused until this time.
    #[serde(default)]
    pub locked_until: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Request to create a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
}

/// Partial user update; unset fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Self-service profile update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Self-service password change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Administrator password reset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub new_password: String,
}

/// Login request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token.
    pub token: String,
    /// Always `Bearer`.
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
    /// Authenticated user.
    pub user: User,
}

/// Profile of the calling user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
    pub role: Role,
    pub permissions: Vec<String>,
}

// ============================================================================
// Inventory
// ============================================================================

/// Asset category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_network_device: bool,
    pub can_topology: bool,
    pub is_terminal: bool,
    pub default_port_count: i32,
    pub device_icon: Option<String>,
    pub device_color: Option<String>,
}

/// Asset lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    /// Deployed and in use.
    #[default]
    InUse,
    /// Spare.
    Idle,
    /// Under repair.
    Maintenance,
    /// Scrapped.
    Retired,
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InUse => write!(f, "in_use"),
            Self::Idle => write!(f, "idle"),
            Self::Maintenance => write!(f, "maintenance"),
            Self::Retired => write!(f, "retired"),
        }
    }
}

/// An inventoried asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub asset_code: String,
    pub name: String,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub status: AssetStatus,
    pub serial_number: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub location_detail: Option<String>,
    pub remark: Option<String>,
    pub x_position: Option<f64>,
    pub y_position: Option<f64>,
}

/// Request to register an asset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateAssetRequest {
    pub asset_code: String,
    pub name: String,
    pub category_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Asset status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: AssetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

/// Asset list filter and pagination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AssetStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

/// Device search query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceSearchQuery {
    pub keyword: String,
}

/// A physical port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: i64,
    pub asset_id: i64,
    pub name: String,
    pub port_type: Option<String>,
    pub port_speed: Option<String>,
    pub is_uplink: bool,
    pub vlan_id: Option<i32>,
    pub is_connected: bool,
    pub peer_port_id: Option<i64>,
    pub cable_type: Option<String>,
    pub description: Option<String>,
}

/// Request to create a port.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePortRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_speed: Option<String>,
    pub is_uplink: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<i32>,
}

/// Partial port update; unset fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePortRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port_speed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_uplink: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vlan_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Port link request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectPortsRequest {
    pub port_id: i64,
    pub peer_port_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cable_type: Option<String>,
}

/// Both sides of a new link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectPortsResponse {
    pub port: Port,
    pub peer: Port,
}

/// Port auto-creation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoCreatePortsResponse {
    pub created: Vec<Port>,
    pub skipped: Vec<String>,
}

// ============================================================================
// Topology
// ============================================================================

/// Layout coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Port summary inside a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodePort {
    pub id: i64,
    pub name: String,
    pub port_type: Option<String>,
    pub is_connected: bool,
    pub peer_port_id: Option<i64>,
}

/// Topology node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub name: String,
    pub category: String,
    /// `network_device`, `terminal` or `other`.
    pub device_type: String,
    pub status: String,
    pub ip_address: Option<String>,
    pub ports: Vec<NodePort>,
    /// `None` until a position has been saved.
    pub position: Option<Position>,
}

/// Topology edge between two ports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from_asset_id: i64,
    pub to_asset_id: i64,
    pub from_port_id: i64,
    pub from_port: String,
    pub to_port_id: i64,
    pub to_port: String,
}

/// Topology graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub node_count: usize,
    pub edge_count: usize,
    pub generated_at: String,
}

/// One coordinate update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

/// Batch position update request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavePositionsRequest {
    pub positions: Vec<PositionUpdate>,
}

/// A failed position update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionFailure {
    pub id: i64,
    /// `not found`, `invalid coordinate` or `store error`.
    pub reason: String,
}

/// Partial-success report for a position batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavePositionsResult {
    pub succeeded: Vec<i64>,
    pub failed: Vec<PositionFailure>,
}

/// Auto-layout request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoLayoutRequest {
    /// `circular` or `grid`.
    pub algorithm: String,
}

/// Auto-layout result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoLayoutResponse {
    pub algorithm: String,
    pub positions: Vec<PositionUpdate>,
    pub result: SavePositionsResult,
}

/// Topology renderer defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub layout_algorithm: String,
    pub show_ports: bool,
    pub show_labels: bool,
    pub node_size: u32,
    pub edge_width: u32,
    pub auto_refresh: bool,
    pub refresh_interval: u32,
}
