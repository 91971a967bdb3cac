//! Database schema types and write inputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::StoreError;

// ============================================================================
// Categories
// ============================================================================

/// Asset category and its topology capabilities.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    /// Unique identifier.
    pub id: i64,
    /// Display name (e.g., "Switch").
    pub name: String,
    /// Stable code (e.g., "SWITCH").
    pub code: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Ordering key for listings.
    pub sort_order: i32,
    /// Whether assets of this category are network equipment.
    pub is_network_device: bool,
    /// Whether assets of this category appear in the topology graph.
    pub can_topology: bool,
    /// Whether assets of this category are end-user terminals.
    pub is_terminal: bool,
    /// Number of ports created by port auto-creation.
    pub default_port_count: i32,
    /// Icon hint for renderers.
    pub device_icon: Option<String>,
    /// Color hint for renderers.
    pub device_color: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Request to create a category.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewCategory {
    /// Display name.
    pub name: String,
    /// Stable code.
    pub code: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ordering key.
    #[serde(default)]
    pub sort_order: i32,
    /// Network equipment flag.
    #[serde(default)]
    pub is_network_device: bool,
    /// Topology participation flag.
    #[serde(default)]
    pub can_topology: bool,
    /// Terminal flag.
    #[serde(default)]
    pub is_terminal: bool,
    /// Default port count for auto-creation.
    #[serde(default)]
    pub default_port_count: i32,
    /// Icon hint.
    #[serde(default)]
    pub device_icon: Option<String>,
    /// Color hint.
    #[serde(default)]
    pub device_color: Option<String>,
}

/// Partial category update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_network_device: Option<bool>,
    pub can_topology: Option<bool>,
    pub is_terminal: Option<bool>,
    pub default_port_count: Option<i32>,
    pub device_icon: Option<String>,
    pub device_color: Option<String>,
}

impl CategoryUpdate {
    /// Applies the update in place.
    pub fn apply(&self, category: &mut Category) {
        if let Some(ref name) = self.name {
            category.name = name.clone();
        }
        if let Some(ref description) = self.description {
            category.description = Some(description.clone());
        }
        if let Some(sort_order) = self.sort_order {
            category.sort_order = sort_order;
        }
        if let Some(flag) = self.is_network_device {
            category.is_network_device = flag;
        }
        if let Some(flag) = self.can_topology {
            category.can_topology = flag;
        }
        if let Some(flag) = self.is_terminal {
            category.is_terminal = flag;
        }
        if let Some(count) = self.default_port_count {
            category.default_port_count = count;
        }
        if let Some(ref icon) = self.device_icon {
            category.device_icon = Some(icon.clone());
        }
        if let Some(ref color) = self.device_color {
            category.device_color = Some(color.clone());
        }
    }
}

/// Seed entry for the standard category set.
#[derive(Debug, Clone, Copy)]
pub struct StandardCategory {
    pub name: &'static str,
    pub code: &'static str,
    pub description: &'static str,
    pub sort_order: i32,
    pub is_network_device: bool,
    pub can_topology: bool,
    pub is_terminal: bool,
    pub default_port_count: i32,
    pub device_icon: &'static str,
    pub device_color: &'static str,
}

const fn topology_device(
    name: &'static str,
    code: &'static str,
    description: &'static str,
    sort_order: i32,
    default_port_count: i32,
    device_icon: &'static str,
    device_color: &'static str,
) -> StandardCategory {
    StandardCategory {
        name,
        code,
        description,
        sort_order,
        is_network_device: true,
        can_topology: true,
        is_terminal: false,
        default_port_count,
        device_icon,
        device_color,
    }
}

const fn terminal_device(
    name: &'static str,
    code: &'static str,
    description: &'static str,
    sort_order: i32,
    device_icon: &'static str,
    device_color: &'static str,
) -> StandardCategory {
    StandardCategory {
        name,
        code,
        description,
        sort_order,
        is_network_device: true,
        can_topology: false,
        is_terminal: true,
        default_port_count: 0,
        device_icon,
        device_color,
    }
}

const fn other_device(
    name: &'static str,
    code: &'static str,
    description: &'static str,
    sort_order: i32,
    device_color: &'static str,
) -> StandardCategory {
    StandardCategory {
        name,
        code,
        description,
        sort_order,
        is_network_device: false,
        can_topology: false,
        is_terminal: false,
        default_port_count: 0,
        device_icon: "device",
        device_color,
    }
}

/// Categories seeded into a fresh database. Mirrored by `migrations/0002_seed_categories.sql`.
pub const STANDARD_CATEGORIES: [StandardCategory; 13] = [
    topology_device("Switch", "SWITCH", "Network switch", 10, 24, "switch", "#409eff"),
    topology_device("Router", "ROUTER", "Network router", 20, 8, "router", "#67c23a"),
    topology_device("Firewall", "FIREWALL", "Network firewall", 30, 6, "firewall", "#e6a23c"),
    topology_device("BRAS", "BRAS", "Broadband remote access server", 40, 48, "bras", "#f56c6c"),
    topology_device("Gateway", "GATEWAY", "Network gateway", 50, 4, "gateway", "#909399"),
    topology_device("Load Balancer", "LOAD_BALANCER", "Load balancer", 60, 8, "balancer", "#7c4dff"),
    terminal_device("Server", "SERVER", "Server", 70, "server", "#606266"),
    terminal_device("Workstation", "WORKSTATION", "Workstation", 80, "workstation", "#909399"),
    terminal_device("Desktop", "DESKTOP", "Desktop computer", 90, "desktop", "#c0c4cc"),
    terminal_device("Laptop", "LAPTOP", "Laptop computer", 100, "laptop", "#dcdfe6"),
    other_device("Monitor", "MONITOR", "Display monitor", 110, "#f5f7fa"),
    other_device("Printer", "PRINTER", "Printer", 120, "#ebeef5"),
    other_device("Office Equipment", "OFFICE_EQUIPMENT", "Other office equipment", 130, "#f4f4f5"),
];

// ============================================================================
// Assets
// ============================================================================

/// Asset lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
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

impl AssetStatus {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InUse => "in_use",
            Self::Idle => "idle",
            Self::Maintenance => "maintenance",
            Self::Retired => "retired",
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_use" => Ok(Self::InUse),
            "idle" => Ok(Self::Idle),
            "maintenance" => Ok(Self::Maintenance),
            "retired" => Ok(Self::Retired),
            other => Err(StoreError::Database(format!("unknown asset status: {}", other))),
        }
    }
}

/// An IT asset.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Asset {
    /// Unique identifier.
    pub id: i64,
    /// Unique inventory code.
    pub asset_code: String,
    /// Display name.
    pub name: String,
    /// Category reference.
    pub category_id: i64,
    /// Category display name.
    pub category_name: Option<String>,
    /// Brand.
    pub brand: Option<String>,
    /// Model.
    pub model: Option<String>,
    /// Lifecycle status.
    pub status: AssetStatus,
    /// Serial number.
    pub serial_number: Option<String>,
    /// Management IP address.
    pub ip_address: Option<String>,
    /// MAC address.
    pub mac_address: Option<String>,
    /// Free-form location.
    pub location_detail: Option<String>,
    /// Remarks.
    pub remark: Option<String>,
    /// Topology X coordinate, `null` until placed.
    pub x_position: Option<f64>,
    /// Topology Y coordinate, `null` until placed.
    pub y_position: Option<f64>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Raw asset row as selected from PostgreSQL.
#[derive(Debug, FromRow)]
pub struct AssetRow {
    pub id: i64,
    pub asset_code: String,
    pub name: String,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub status: String,
    pub serial_number: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub location_detail: Option<String>,
    pub remark: Option<String>,
    pub x_position: Option<f64>,
    pub y_position: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = StoreError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Asset {
            id: row.id,
            asset_code: row.asset_code,
            name: row.name,
            category_id: row.category_id,
            category_name: row.category_name,
            brand: row.brand,
            model: row.model,
            status: row.status.parse()?,
            serial_number: row.serial_number,
            ip_address: row.ip_address,
            mac_address: row.mac_address,
            location_detail: row.location_detail,
            remark: row.remark,
            x_position: row.x_position,
            y_position: row.y_position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Request to register an asset.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewAsset {
    /// Unique inventory code.
    pub asset_code: String,
    /// Display name.
    pub name: String,
    /// Category reference.
    pub category_id: i64,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Lifecycle status (default `in_use`).
    #[serde(default)]
    pub status: AssetStatus,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub location_detail: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

/// Partial asset update. Coordinates are not part of it: they only change
/// through position updates.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct AssetUpdate {
    pub name: Option<String>,
    pub category_id: Option<i64>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub status: Option<AssetStatus>,
    pub serial_number: Option<String>,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub location_detail: Option<String>,
    pub remark: Option<String>,
}

impl AssetUpdate {
    /// Applies the update in place.
    pub fn apply(&self, asset: &mut Asset) {
        fn set(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }

        if let Some(ref name) = self.name {
            asset.name = name.clone();
        }
        if let Some(category_id) = self.category_id {
            asset.category_id = category_id;
        }
        if let Some(status) = self.status {
            asset.status = status;
        }
        set(&mut asset.brand, &self.brand);
        set(&mut asset.model, &self.model);
        set(&mut asset.serial_number, &self.serial_number);
        set(&mut asset.ip_address, &self.ip_address);
        set(&mut asset.mac_address, &self.mac_address);
        set(&mut asset.location_detail, &self.location_detail);
        set(&mut asset.remark, &self.remark);
    }
}

/// Asset list filter.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssetFilter {
    /// Restrict to one category.
    pub category_id: Option<i64>,
    /// Restrict to one status.
    pub status: Option<AssetStatus>,
    /// Substring match on name, code, IP address or model.
    pub keyword: Option<String>,
}

impl AssetFilter {
    /// Trimmed, non-empty keyword.
    #[must_use]
    pub fn keyword(&self) -> Option<&str> {
        self.keyword
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// In-memory evaluation of the filter.
    #[must_use]
    pub fn matches(&self, asset: &Asset) -> bool {
        if self.category_id.is_some_and(|id| id != asset.category_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != asset.status) {
            return false;
        }
        match self.keyword() {
            None => true,
            Some(keyword) => {
                let contains = |field: Option<&str>| field.is_some_and(|f| f.contains(keyword));
                contains(Some(&asset.name))
                    || contains(Some(&asset.asset_code))
                    || contains(asset.ip_address.as_deref())
                    || contains(asset.model.as_deref())
            }
        }
    }
}

/// Asset projection used by the topology assembler.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct TopologyAsset {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub is_network_device: bool,
    pub is_terminal: bool,
    pub status: String,
    pub ip_address: Option<String>,
    pub x_position: Option<f64>,
    pub y_position: Option<f64>,
}

// ============================================================================
// Ports
// ============================================================================

/// A physical port owned by an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Port {
    /// Unique identifier.
    pub id: i64,
    /// Owning asset.
    pub asset_id: i64,
    /// Port name, unique per asset.
    pub name: String,
    /// ethernet / fiber / console / management.
    pub port_type: Option<String>,
    /// 1G / 10G / 40G / 100G.
    pub port_speed: Option<String>,
    /// Uplink flag.
    pub is_uplink: bool,
    /// VLAN id.
    pub vlan_id: Option<i32>,
    /// Whether the port is linked to a peer.
    pub is_connected: bool,
    /// Peer port on another asset.
    pub peer_port_id: Option<i64>,
    /// copper / fiber / wireless.
    pub cable_type: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Time of the last link.
    pub last_link_time: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Request to create a port.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewPort {
    /// Port name.
    pub name: String,
    #[serde(default)]
    pub port_type: Option<String>,
    #[serde(default)]
    pub port_speed: Option<String>,
    #[serde(default)]
    pub is_uplink: bool,
    #[serde(default)]
    pub vlan_id: Option<i32>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial port update. Links only change through connect and disconnect.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct PortUpdate {
    pub name: Option<String>,
    pub port_type: Option<String>,
    pub port_speed: Option<String>,
    pub is_uplink: Option<bool>,
    pub vlan_id: Option<i32>,
    pub description: Option<String>,
}

impl PortUpdate {
    /// Applies the update in place.
    pub fn apply(&self, port: &mut Port) {
        if let Some(ref name) = self.name {
            port.name = name.clone();
        }
        if let Some(ref port_type) = self.port_type {
            port.port_type = Some(port_type.clone());
        }
        if let Some(ref port_speed) = self.port_speed {
            port.port_speed = Some(port_speed.clone());
        }
        if let Some(is_uplink) = self.is_uplink {
            port.is_uplink = is_uplink;
        }
        if let Some(vlan_id) = self.vlan_id {
            port.vlan_id = Some(vlan_id);
        }
        if let Some(ref description) = self.description {
            port.description = Some(description.clone());
        }
    }
}

/// Rejects links that would break the port peer invariant: a peer must be
/// a different port on a different asset.
pub fn validate_link(a: &Port, b: &Port) -> Result<(), StoreError> {
    if a.id == b.id {
        return Err(StoreError::DataIntegrity(format!(
            "port {} cannot be linked to itself",
            a.id
        )));
    }
    if a.asset_id == b.asset_id {
        return Err(StoreError::DataIntegrity(format!(
            "ports {} and {} belong to the same asset {}",
            a.id, b.id, a.asset_id
        )));
    }
    Ok(())
}

// ============================================================================
// Users
// ============================================================================

/// User role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access including user and category management.
    Admin,
    /// Read and edit access.
    Operator,
    /// Read-only access.
    #[default]
    Viewer,
}

impl Role {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }
}

impl FromStr for Role {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "operator" => Ok(Self::Operator),
            "viewer" => Ok(Self::Viewer),
            other => Err(StoreError::Database(format!("unknown role: {}", other))),
        }
    }
}

/// A system user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// Argon2id PHC string; never serialized.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    /// Consecutive failed logins since the last success or lock.
    pub failed_login_count: i32,
    /// Logins are refused until this time.
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Whether the account is locked at `now`.
    #[must_use]
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }
}

/// Raw user row as selected from PostgreSQL.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub failed_login_count: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            real_name: row.real_name,
            email: row.email,
            role: row.role.parse()?,
            is_active: row.is_active,
            last_login_at: row.last_login_at,
            failed_login_count: row.failed_login_count,
            locked_until: row.locked_until,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Request to create a user.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct NewUser {
    pub username: String,
    /// Plain-text password; hashed before it reaches the store.
    pub password: String,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
}

/// Partial user update by an administrator.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UserUpdate {
    pub real_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    /// Applies the update in place.
    pub fn apply(&self, user: &mut User) {
        if let Some(ref real_name) = self.real_name {
            user.real_name = Some(real_name.clone());
        }
        if let Some(ref email) = self.email {
            user.email = Some(email.clone());
        }
        if let Some(role) = self.role {
            user.role = role;
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
    }

    /// Whether sessions opened before the update no longer reflect the user.
    #[must_use]
    pub fn invalidates_sessions(&self) -> bool {
        self.role.is_some() || self.is_active == Some(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn port(id: i64, asset_id: i64) -> Port {
        let now = Utc::now();
        Port {
            id,
            asset_id,
            name: format!("Port{}", id),
            port_type: None,
            port_speed: None,
            is_uplink: false,
            vlan_id: None,
            is_connected: false,
            peer_port_id: None,
            cable_type: None,
            description: None,
            last_link_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_validate_link_rejects_self() {
        let p = port(1, 10);
        let err = validate_link(&p, &p).unwrap_err();
        assert!(matches!(err, StoreError::DataIntegrity(_)));
    }

    #[test]
    fn test_validate_link_rejects_same_asset() {
        let err = validate_link(&port(1, 10), &port(2, 10)).unwrap_err();
        assert!(matches!(err, StoreError::DataIntegrity(_)));
    }

    #[test]
    fn test_validate_link_accepts_distinct_assets() {
        assert!(validate_link(&port(1, 10), &port(2, 11)).is_ok());
    }

    #[test]
    fn test_asset_status_round_trip_strings() {
        for status in [
            AssetStatus::InUse,
            AssetStatus::Idle,
            AssetStatus::Maintenance,
            AssetStatus::Retired,
        ] {
            assert_eq!(status.as_str().parse::<AssetStatus>().unwrap(), status);
        }
        assert!("scrapped".parse::<AssetStatus>().is_err());
    }

    #[test]
    fn test_standard_categories_flags() {
        let switch = STANDARD_CATEGORIES.iter().find(|c| c.code == "SWITCH").unwrap();
        assert!(switch.can_topology);
        assert!(switch.is_network_device);

        let server = STANDARD_CATEGORIES.iter().find(|c| c.code == "SERVER").unwrap();
        assert!(!server.can_topology);
        assert!(server.is_terminal);

        let printer = STANDARD_CATEGORIES.iter().find(|c| c.code == "PRINTER").unwrap();
        assert!(!printer.is_network_device);
    }

    #[test]
    fn test_user_password_hash_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: 1,
            username: "admin".into(),
            password_hash: "$argon2id$secret".into(),
            real_name: None,
            email: None,
            role: Role::Admin,
            is_active: true,
            last_login_at: None,
            failed_login_count: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("\"role\":\"admin\""));
    }

    #[test]
    fn test_user_lock_expires() {
        let now = Utc::now();
        let mut user: User = serde_json::from_value(serde_json::json!({
            "id": 1,
            "username": "ops",
            "real_name": null,
            "email": null,
            "role": "operator",
            "is_active": true,
            "last_login_at": null,
            "failed_login_count": 0,
            "locked_until": null,
            "created_at": now,
            "updated_at": now,
        }))
        .unwrap();
        assert!(!user.is_locked_at(now));

        user.locked_until = Some(now + chrono::Duration::minutes(30));
        assert!(user.is_locked_at(now));
        assert!(!user.is_locked_at(now + chrono::Duration::minutes(31)));
    }

    #[test]
    fn test_user_update_session_invalidation() {
        let rename = UserUpdate {
            real_name: Some("Ops".into()),
            ..Default::default()
        };
        assert!(!rename.invalidates_sessions());

        let demote = UserUpdate {
            role: Some(Role::Viewer),
            ..Default::default()
        };
        assert!(demote.invalidates_sessions());

        let disable = UserUpdate {
            is_active: Some(false),
            ..Default::default()
        };
        assert!(disable.invalidates_sessions());
    }
}
