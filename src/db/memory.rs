//! In-memory implementation of the repository traits.
//!
//! Used by tests and by development runs without a database. Semantics
//! mirror [`super::PgStore`]: soft deletes, unique codes, symmetric port
//! links.

use super::schema::{
    Asset, AssetFilter, AssetUpdate, Category, CategoryUpdate, NewAsset, NewCategory, NewPort,
    NewUser, Port, PortUpdate, STANDARD_CATEGORIES, TopologyAsset, User, UserUpdate,
    validate_link,
};
use super::store::{
    AssetRepository, CategoryRepository, PortRepository, Store, StoreError, UserRepository,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct Inner {
    categories: BTreeMap<i64, (Category, bool)>,
    assets: BTreeMap<i64, (Asset, bool)>,
    ports: BTreeMap<i64, Port>,
    users: BTreeMap<i64, User>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn category(&self, id: i64) -> Result<&Category, StoreError> {
        match self.categories.get(&id) {
            Some((category, false)) => Ok(category),
            _ => Err(StoreError::NotFound {
                entity: "category",
                id,
            }),
        }
    }

    fn asset(&self, id: i64) -> Result<Asset, StoreError> {
        match self.assets.get(&id) {
            Some((asset, false)) => Ok(self.hydrate(asset)),
            _ => Err(StoreError::NotFound { entity: "asset", id }),
        }
    }

    fn hydrate(&self, asset: &Asset) -> Asset {
        let mut asset = asset.clone();
        asset.category_name = self
            .categories
            .get(&asset.category_id)
            .map(|(c, _)| c.name.clone());
        asset
    }

    fn live_assets<'a>(&'a self, filter: &'a AssetFilter) -> impl Iterator<Item = Asset> + 'a {
        self.assets
            .values()
            .filter(|(_, deleted)| !deleted)
            .map(move |(asset, _)| self.hydrate(asset))
            .filter(move |asset| filter.matches(asset))
    }

    fn user_mut(&mut self, id: i64) -> Result<&mut User, StoreError> {
        self.users
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    fn clear_link(&mut self, id: i64) {
        if let Some(port) = self.ports.get_mut(&id) {
            port.peer_port_id = None;
            port.is_connected = false;
            port.cable_type = None;
            port.updated_at = Utc::now();
        }
    }
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with the standard category set.
    #[must_use]
    pub fn with_standard_categories() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.write();
            let now = Utc::now();
            for seed in STANDARD_CATEGORIES {
                let id = inner.next_id();
                let category = Category {
                    id,
                    name: seed.name.to_string(),
                    code: seed.code.to_string(),
                    description: Some(seed.description.to_string()),
                    sort_order: seed.sort_order,
                    is_network_device: seed.is_network_device,
                    can_topology: seed.can_topology,
                    is_terminal: seed.is_terminal,
                    default_port_count: seed.default_port_count,
                    device_icon: Some(seed.device_icon.to_string()),
                    device_color: Some(seed.device_color.to_string()),
                    created_at: now,
                    updated_at: now,
                };
                inner.categories.insert(id, (category, false));
            }
        }
        store
    }

    /// Finds a live category by code.
    #[must_use]
    pub fn category_by_code(&self, code: &str) -> Option<Category> {
        self.inner
            .read()
            .categories
            .values()
            .find(|(c, deleted)| !deleted && c.code == code)
            .map(|(c, _)| c.clone())
    }
}

// ============================================================================
// Categories
// ============================================================================

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn list_categories(&self, network_only: bool) -> Result<Vec<Category>, StoreError> {
        let inner = self.inner.read();
        let mut categories: Vec<Category> = inner
            .categories
            .values()
            .filter(|(c, deleted)| !deleted && (!network_only || c.is_network_device))
            .map(|(c, _)| c.clone())
            .collect();
        categories.sort_by_key(|c| (c.sort_order, c.id));
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> Result<Category, StoreError> {
        self.inner.read().category(id).cloned()
    }

    async fn create_category(&self, new: &NewCategory) -> Result<Category, StoreError> {
        let mut inner = self.inner.write();
        if inner.categories.values().any(|(c, _)| c.code == new.code) {
            return Err(StoreError::Conflict(format!(
                "category code {} already exists",
                new.code
            )));
        }

        let id = inner.next_id();
        let now = Utc::now();
        let category = Category {
            id,
            name: new.name.clone(),
            code: new.code.clone(),
            description: new.description.clone(),
            sort_order: new.sort_order,
            is_network_device: new.is_network_device,
            can_topology: new.can_topology,
            is_terminal: new.is_terminal,
            default_port_count: new.default_port_count,
            device_icon: new.device_icon.clone(),
            device_color: new.device_color.clone(),
            created_at: now,
            updated_at: now,
        };
        inner.categories.insert(id, (category.clone(), false));
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i64,
        update: &CategoryUpdate,
    ) -> Result<Category, StoreError> {
        let mut inner = self.inner.write();
        match inner.categories.get_mut(&id) {
            Some((category, false)) => {
                update.apply(category);
                category.updated_at = Utc::now();
                Ok(category.clone())
            }
            _ => Err(StoreError::NotFound {
                entity: "category",
                id,
            }),
        }
    }

    async fn delete_category(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        inner.category(id)?;
        let in_use = inner
            .assets
            .values()
            .filter(|(asset, deleted)| !deleted && asset.category_id == id)
            .count();
        if in_use > 0 {
            return Err(StoreError::DataIntegrity(format!(
                "category {} still has {} assets",
                id, in_use
            )));
        }
        match inner.categories.get_mut(&id) {
            Some((category, deleted)) if !*deleted => {
                *deleted = true;
                category.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(StoreError::NotFound {
                entity: "category",
                id,
            }),
        }
    }
}

// ============================================================================
// Assets
// ============================================================================

#[async_trait]
impl AssetRepository for MemoryStore {
    async fn list_assets(
        &self,
        filter: &AssetFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Asset>, u64), StoreError> {
        let inner = self.inner.read();
        let mut matching: Vec<Asset> = inner.live_assets(filter).collect();
        matching.sort_by(|a, b| b.id.cmp(&a.id));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn export_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError> {
        let inner = self.inner.read();
        Ok(inner.live_assets(filter).collect())
    }

    async fn get_asset(&self, id: i64) -> Result<Asset, StoreError> {
        self.inner.read().asset(id)
    }

    async fn create_asset(&self, new: &NewAsset) -> Result<Asset, StoreError> {
        let mut inner = self.inner.write();
        inner.category(new.category_id)?;
        if inner
            .assets
            .values()
            .any(|(a, _)| a.asset_code == new.asset_code)
        {
            return Err(StoreError::Conflict(format!(
                "asset code {} already exists",
                new.asset_code
            )));
        }

        let id = inner.next_id();
        let now = Utc::now();
        let asset = Asset {
            id,
            asset_code: new.asset_code.clone(),
            name: new.name.clone(),
            category_id: new.category_id,
            category_name: None,
            brand: new.brand.clone(),
            model: new.model.clone(),
            status: new.status,
            serial_number: new.serial_number.clone(),
            ip_address: new.ip_address.clone(),
            mac_address: new.mac_address.clone(),
            location_detail: new.location_detail.clone(),
            remark: new.remark.clone(),
            x_position: None,
            y_position: None,
            created_at: now,
            updated_at: now,
        };
        inner.assets.insert(id, (asset, false));
        inner.asset(id)
    }

    async fn update_asset(&self, id: i64, update: &AssetUpdate) -> Result<Asset, StoreError> {
        let mut inner = self.inner.write();
        if let Some(category_id) = update.category_id {
            inner.category(category_id)?;
        }
        match inner.assets.get_mut(&id) {
            Some((asset, false)) => {
                update.apply(asset);
                asset.updated_at = Utc::now();
            }
            _ => return Err(StoreError::NotFound { entity: "asset", id }),
        }
        inner.asset(id)
    }

    async fn delete_asset(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        match inner.assets.get_mut(&id) {
            Some((asset, deleted)) if !*deleted => {
                *deleted = true;
                asset.updated_at = Utc::now();
                Ok(())
            }
            _ => Err(StoreError::NotFound { entity: "asset", id }),
        }
    }

    async fn topology_assets(&self) -> Result<Vec<TopologyAsset>, StoreError> {
        let inner = self.inner.read();
        let assets = inner
            .assets
            .values()
            .filter(|(_, deleted)| !deleted)
            .filter_map(|(asset, _)| {
                let category = inner.category(asset.category_id).ok()?;
                category.can_topology.then(|| TopologyAsset {
                    id: asset.id,
                    name: asset.name.clone(),
                    category: category.name.clone(),
                    is_network_device: category.is_network_device,
                    is_terminal: category.is_terminal,
                    status: asset.status.as_str().to_string(),
                    ip_address: asset.ip_address.clone(),
                    x_position: asset.x_position,
                    y_position: asset.y_position,
                })
            })
            .collect();
        Ok(assets)
    }

    async fn set_position(&self, id: i64, x: f64, y: f64) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        match inner.assets.get_mut(&id) {
            Some((asset, false)) => {
                asset.x_position = Some(x);
                asset.y_position = Some(y);
                asset.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Ports
// ============================================================================

#[async_trait]
impl PortRepository for MemoryStore {
    async fn list_ports(&self, asset_id: i64) -> Result<Vec<Port>, StoreError> {
        let inner = self.inner.read();
        Ok(inner
            .ports
            .values()
            .filter(|p| p.asset_id == asset_id)
            .cloned()
            .collect())
    }

    async fn ports_for_assets(&self, asset_ids: &[i64]) -> Result<Vec<Port>, StoreError> {
        let inner = self.inner.read();
        let mut ports: Vec<Port> = inner
            .ports
            .values()
            .filter(|p| asset_ids.contains(&p.asset_id))
            .cloned()
            .collect();
        ports.sort_by_key(|p| (p.asset_id, p.id));
        Ok(ports)
    }

    async fn get_port(&self, id: i64) -> Result<Port, StoreError> {
        self.inner
            .read()
            .ports
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "port", id })
    }

    async fn create_port(&self, asset_id: i64, new: &NewPort) -> Result<Port, StoreError> {
        let mut inner = self.inner.write();
        inner.asset(asset_id)?;
        if inner
            .ports
            .values()
            .any(|p| p.asset_id == asset_id && p.name == new.name)
        {
            return Err(StoreError::Conflict(format!(
                "port {} already exists on asset {}",
                new.name, asset_id
            )));
        }

        let id = inner.next_id();
        let now = Utc::now();
        let port = Port {
            id,
            asset_id,
            name: new.name.clone(),
            port_type: new.port_type.clone(),
            port_speed: new.port_speed.clone(),
            is_uplink: new.is_uplink,
            vlan_id: new.vlan_id,
            is_connected: false,
            peer_port_id: None,
            cable_type: None,
            description: new.description.clone(),
            last_link_time: None,
            created_at: now,
            updated_at: now,
        };
        inner.ports.insert(id, port.clone());
        Ok(port)
    }

    async fn update_port(&self, id: i64, update: &PortUpdate) -> Result<Port, StoreError> {
        let mut inner = self.inner.write();
        let current = inner
            .ports
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "port", id })?;
        if let Some(ref name) = update.name
            && inner
                .ports
                .values()
                .any(|p| p.id != id && p.asset_id == current.asset_id && &p.name == name)
        {
            return Err(StoreError::Conflict(format!(
                "port {} already exists on asset {}",
                name, current.asset_id
            )));
        }

        let port = inner
            .ports
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "port", id })?;
        update.apply(port);
        port.updated_at = Utc::now();
        Ok(port.clone())
    }

    async fn delete_port(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let port = inner
            .ports
            .remove(&id)
            .ok_or(StoreError::NotFound { entity: "port", id })?;
        if let Some(peer) = port.peer_port_id {
            inner.clear_link(peer);
        }
        Ok(())
    }

    async fn connect_ports(
        &self,
        port_id: i64,
        peer_port_id: i64,
        cable_type: Option<&str>,
    ) -> Result<(Port, Port), StoreError> {
        let mut inner = self.inner.write();
        let port = inner.ports.get(&port_id).cloned().ok_or(StoreError::NotFound {
            entity: "port",
            id: port_id,
        })?;
        let peer = inner
            .ports
            .get(&peer_port_id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "port",
                id: peer_port_id,
            })?;
        validate_link(&port, &peer)?;

        for previous in [port.peer_port_id, peer.peer_port_id].into_iter().flatten() {
            inner.clear_link(previous);
        }

        let now = Utc::now();
        for (id, other) in [(port_id, peer_port_id), (peer_port_id, port_id)] {
            if let Some(p) = inner.ports.get_mut(&id) {
                p.peer_port_id = Some(other);
                p.is_connected = true;
                p.cable_type = cable_type.map(str::to_string);
                p.last_link_time = Some(now);
                p.updated_at = now;
            }
        }

        let linked = |id: i64| {
            inner
                .ports
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound { entity: "port", id })
        };
        Ok((linked(port_id)?, linked(peer_port_id)?))
    }

    async fn disconnect_port(&self, id: i64) -> Result<Port, StoreError> {
        let mut inner = self.inner.write();
        let peer = inner
            .ports
            .get(&id)
            .ok_or(StoreError::NotFound { entity: "port", id })?
            .peer_port_id;

        inner.clear_link(id);
        if let Some(peer) = peer {
            if inner.ports.get(&peer).and_then(|p| p.peer_port_id) == Some(id) {
                inner.clear_link(peer);
            }
        }
        inner
            .ports
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "port", id })
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
impl UserRepository for MemoryStore {
    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        self.inner
            .read()
            .users
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "user", id })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .inner
            .read()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, limit: u32, offset: u64) -> Result<(Vec<User>, u64), StoreError> {
        let inner = self.inner.read();
        let total = inner.users.len() as u64;
        let users = inner
            .users
            .values()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((users, total))
    }

    async fn create_user(&self, new: &NewUser, password_hash: &str) -> Result<User, StoreError> {
        let mut inner = self.inner.write();
        if inner.users.values().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                new.username
            )));
        }

        let id = inner.next_id();
        let now = Utc::now();
        let user = User {
            id,
            username: new.username.clone(),
            password_hash: password_hash.to_string(),
            real_name: new.real_name.clone(),
            email: new.email.clone(),
            role: new.role,
            is_active: true,
            last_login_at: None,
            failed_login_count: 0,
            locked_until: None,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User, StoreError> {
        let mut inner = self.inner.write();
        let user = inner.user_mut(id)?;
        update.apply(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let user = inner.user_mut(id)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn deactivate_user(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let user = inner.user_mut(id)?;
        user.is_active = false;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn record_login(&self, id: i64) -> Result<(), StoreError> {
        if let Some(user) = self.inner.write().users.get_mut(&id) {
            user.last_login_at = Some(Utc::now());
            user.failed_login_count = 0;
            user.locked_until = None;
        }
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: i64,
        max_failures: u32,
        lock_for: Duration,
    ) -> Result<User, StoreError> {
        let mut inner = self.inner.write();
        let user = inner.user_mut(id)?;
        let now = Utc::now();
        user.failed_login_count += 1;
        if max_failures > 0 && user.failed_login_count >= max_failures as i32 {
            user.failed_login_count = 0;
            user.locked_until = Some(now + lock_for);
        }
        user.updated_at = now;
        Ok(user.clone())
    }

    async fn unlock_user(&self, id: i64) -> Result<User, StoreError> {
        let mut inner = self.inner.write();
        let user = inner.user_mut(id)?;
        user.failed_login_count = 0;
        user.locked_until = None;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        Ok(self.inner.read().users.len() as u64)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
