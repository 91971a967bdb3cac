//! PostgreSQL implementation of the repository traits.

use super::schema::{
    Asset, AssetFilter, AssetRow, AssetUpdate, Category, CategoryUpdate, NewAsset, NewCategory,
    NewPort, NewUser, Port, PortUpdate, TopologyAsset, User, UserRow, UserUpdate, validate_link,
};
use super::store::{
    AssetRepository, CategoryRepository, PortRepository, Store, StoreError, UserRepository,
};
use async_trait::async_trait;
use chrono::Duration;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::{debug, warn};

const CATEGORY_COLUMNS: &str = "id, name, code, description, sort_order, is_network_device, \
     can_topology, is_terminal, default_port_count, device_icon, device_color, created_at, updated_at";

const ASSET_SELECT: &str = "SELECT a.id, a.asset_code, a.name, a.category_id, c.name AS category_name, \
     a.brand, a.model, a.status, a.serial_number, a.ip_address, a.mac_address, a.location_detail, \
     a.remark, a.x_position, a.y_position, a.created_at, a.updated_at \
     FROM it_asset a LEFT JOIN asset_category c ON c.id = a.category_id";

const PORT_COLUMNS: &str = "id, asset_id, port_name AS name, port_type, port_speed, is_uplink, \
     vlan_id, is_connected, connected_port_id AS peer_port_id, cable_type, description, \
     last_link_time, created_at, updated_at";

const USER_COLUMNS: &str = "id, username, password_hash, real_name, email, role, is_active, \
     last_login_at, failed_login_count, locked_until, created_at, updated_at";

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a store over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_asset_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &AssetFilter) {
    builder.push(" WHERE NOT a.is_deleted");
    if let Some(category_id) = filter.category_id {
        builder.push(" AND a.category_id = ").push_bind(category_id);
    }
    if let Some(status) = filter.status {
        builder.push(" AND a.status = ").push_bind(status.as_str());
    }
    if let Some(keyword) = filter.keyword() {
        let pattern = format!("%{}%", keyword);
        builder
            .push(" AND (a.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.asset_code ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.ip_address ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR a.model ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn rows_to_assets(rows: Vec<AssetRow>) -> Result<Vec<Asset>, StoreError> {
    rows.into_iter().map(Asset::try_from).collect()
}

// ============================================================================
// Categories
// ============================================================================

#[async_trait]
impl CategoryRepository for PgStore {
    async fn list_categories(&self, network_only: bool) -> Result<Vec<Category>, StoreError> {
        let sql = format!(
            "SELECT {} FROM asset_category WHERE NOT is_deleted AND ($1 = FALSE OR is_network_device) \
             ORDER BY sort_order, id",
            CATEGORY_COLUMNS
        );
        let categories = sqlx::query_as::<_, Category>(&sql)
            .bind(network_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> Result<Category, StoreError> {
        let sql = format!(
            "SELECT {} FROM asset_category WHERE id = $1 AND NOT is_deleted",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "category",
                id,
            })
    }

    async fn create_category(&self, new: &NewCategory) -> Result<Category, StoreError> {
        let sql = format!(
            "INSERT INTO asset_category (name, code, description, sort_order, is_network_device, \
             can_topology, is_terminal, default_port_count, device_icon, device_color) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            CATEGORY_COLUMNS
        );
        let category = sqlx::query_as::<_, Category>(&sql)
            .bind(&new.name)
            .bind(&new.code)
            .bind(&new.description)
            .bind(new.sort_order)
            .bind(new.is_network_device)
            .bind(new.can_topology)
            .bind(new.is_terminal)
            .bind(new.default_port_count)
            .bind(&new.device_icon)
            .bind(&new.device_color)
            .fetch_one(&self.pool)
            .await?;
        Ok(category)
    }

    async fn update_category(
        &self,
        id: i64,
        update: &CategoryUpdate,
    ) -> Result<Category, StoreError> {
        let sql = format!(
            "UPDATE asset_category SET \
             name = COALESCE($2, name), \
             description = COALESCE($3, description), \
             sort_order = COALESCE($4, sort_order), \
             is_network_device = COALESCE($5, is_network_device), \
             can_topology = COALESCE($6, can_topology), \
             is_terminal = COALESCE($7, is_terminal), \
             default_port_count = COALESCE($8, default_port_count), \
             device_icon = COALESCE($9, device_icon), \
             device_color = COALESCE($10, device_color), \
             updated_at = now() \
             WHERE id = $1 AND NOT is_deleted RETURNING {}",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.description)
            .bind(update.sort_order)
            .bind(update.is_network_device)
            .bind(update.can_topology)
            .bind(update.is_terminal)
            .bind(update.default_port_count)
            .bind(&update.device_icon)
            .bind(&update.device_color)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "category",
                id,
            })
    }

    async fn delete_category(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM asset_category WHERE id = $1 AND NOT is_deleted FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(StoreError::NotFound {
                entity: "category",
                id,
            });
        }

        let in_use: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM it_asset WHERE category_id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if in_use > 0 {
            return Err(StoreError::DataIntegrity(format!(
                "category {} still has {} assets",
                id, in_use
            )));
        }

        sqlx::query(
            "UPDATE asset_category SET is_deleted = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

// ============================================================================
// Assets
// ============================================================================

#[async_trait]
impl AssetRepository for PgStore {
    async fn list_assets(
        &self,
        filter: &AssetFilter,
        limit: u32,
        offset: u64,
    ) -> Result<(Vec<Asset>, u64), StoreError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM it_asset a");
        push_asset_filter(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(ASSET_SELECT);
        push_asset_filter(&mut select, filter);
        select
            .push(" ORDER BY a.id DESC LIMIT ")
            .push_bind(i64::from(limit))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset).unwrap_or(i64::MAX));
        let rows: Vec<AssetRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok((rows_to_assets(rows)?, u64::try_from(total).unwrap_or(0)))
    }

    async fn export_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError> {
        let mut select = QueryBuilder::<Postgres>::new(ASSET_SELECT);
        push_asset_filter(&mut select, filter);
        select.push(" ORDER BY a.id");
        let rows: Vec<AssetRow> = select.build_query_as().fetch_all(&self.pool).await?;
        rows_to_assets(rows)
    }

    async fn get_asset(&self, id: i64) -> Result<Asset, StoreError> {
        let sql = format!("{} WHERE a.id = $1 AND NOT a.is_deleted", ASSET_SELECT);
        let row: Option<AssetRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.ok_or(StoreError::NotFound { entity: "asset", id })?
            .try_into()
    }

    async fn create_asset(&self, new: &NewAsset) -> Result<Asset, StoreError> {
        self.get_category(new.category_id).await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO it_asset (asset_code, name, category_id, brand, model, status, \
             serial_number, ip_address, mac_address, location_detail, remark) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING id",
        )
        .bind(&new.asset_code)
        .bind(&new.name)
        .bind(new.category_id)
        .bind(&new.brand)
        .bind(&new.model)
        .bind(new.status.as_str())
        .bind(&new.serial_number)
        .bind(&new.ip_address)
        .bind(&new.mac_address)
        .bind(&new.location_detail)
        .bind(&new.remark)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match StoreError::from(e) {
            StoreError::Conflict(_) => {
                StoreError::Conflict(format!("asset code {} already exists", new.asset_code))
            }
            other => other,
        })?;

        debug!(asset_id = id, code = %new.asset_code, "Asset created");
        self.get_asset(id).await
    }

    async fn update_asset(&self, id: i64, update: &AssetUpdate) -> Result<Asset, StoreError> {
        if let Some(category_id) = update.category_id {
            self.get_category(category_id).await?;
        }

        let result = sqlx::query(
            "UPDATE it_asset SET \
             name = COALESCE($2, name), \
             category_id = COALESCE($3, category_id), \
             brand = COALESCE($4, brand), \
             model = COALESCE($5, model), \
             status = COALESCE($6, status), \
             serial_number = COALESCE($7, serial_number), \
             ip_address = COALESCE($8, ip_address), \
             mac_address = COALESCE($9, mac_address), \
             location_detail = COALESCE($10, location_detail), \
             remark = COALESCE($11, remark), \
             updated_at = now() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(&update.name)
        .bind(update.category_id)
        .bind(&update.brand)
        .bind(&update.model)
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.serial_number)
        .bind(&update.ip_address)
        .bind(&update.mac_address)
        .bind(&update.location_detail)
        .bind(&update.remark)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "asset", id });
        }
        self.get_asset(id).await
    }

    async fn delete_asset(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE it_asset SET is_deleted = TRUE, updated_at = now() WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "asset", id });
        }
        Ok(())
    }

    async fn topology_assets(&self) -> Result<Vec<TopologyAsset>, StoreError> {
        let assets = sqlx::query_as::<_, TopologyAsset>(
            "SELECT a.id, a.name, c.name AS category, c.is_network_device, c.is_terminal, \
             a.status, a.ip_address, a.x_position, a.y_position \
             FROM it_asset a JOIN asset_category c ON c.id = a.category_id \
             WHERE NOT a.is_deleted AND NOT c.is_deleted AND c.can_topology \
             ORDER BY a.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(assets)
    }

    async fn set_position(&self, id: i64, x: f64, y: f64) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE it_asset SET x_position = $2, y_position = $3, updated_at = now() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .bind(x)
        .bind(y)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

// ============================================================================
// Ports
// ============================================================================

#[async_trait]
impl PortRepository for PgStore {
    async fn list_ports(&self, asset_id: i64) -> Result<Vec<Port>, StoreError> {
        let sql = format!(
            "SELECT {} FROM asset_port WHERE asset_id = $1 ORDER BY id",
            PORT_COLUMNS
        );
        let ports = sqlx::query_as::<_, Port>(&sql)
            .bind(asset_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(ports)
    }

    async fn ports_for_assets(&self, asset_ids: &[i64]) -> Result<Vec<Port>, StoreError> {
        if asset_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM asset_port WHERE asset_id = ANY($1) ORDER BY asset_id, id",
            PORT_COLUMNS
        );
        let ports = sqlx::query_as::<_, Port>(&sql)
            .bind(asset_ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(ports)
    }

    async fn get_port(&self, id: i64) -> Result<Port, StoreError> {
        let sql = format!("SELECT {} FROM asset_port WHERE id = $1", PORT_COLUMNS);
        sqlx::query_as::<_, Port>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound { entity: "port", id })
    }

    async fn create_port(&self, asset_id: i64, new: &NewPort) -> Result<Port, StoreError> {
        self.get_asset(asset_id).await?;

        let sql = format!(
            "INSERT INTO asset_port (asset_id, port_name, port_type, port_speed, is_uplink, vlan_id, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            PORT_COLUMNS
        );
        sqlx::query_as::<_, Port>(&sql)
            .bind(asset_id)
            .bind(&new.name)
            .bind(&new.port_type)
            .bind(&new.port_speed)
            .bind(new.is_uplink)
            .bind(new.vlan_id)
            .bind(&new.description)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => StoreError::Conflict(format!(
                    "port {} already exists on asset {}",
                    new.name, asset_id
                )),
                other => other,
            })
    }

    async fn update_port(&self, id: i64, update: &PortUpdate) -> Result<Port, StoreError> {
        let sql = format!(
            "UPDATE asset_port SET \
             port_name = COALESCE($2, port_name), \
             port_type = COALESCE($3, port_type), \
             port_speed = COALESCE($4, port_speed), \
             is_uplink = COALESCE($5, is_uplink), \
             vlan_id = COALESCE($6, vlan_id), \
             description = COALESCE($7, description), \
             updated_at = now() \
             WHERE id = $1 RETURNING {}",
            PORT_COLUMNS
        );
        sqlx::query_as::<_, Port>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(&update.port_type)
            .bind(&update.port_speed)
            .bind(update.is_uplink)
            .bind(update.vlan_id)
            .bind(&update.description)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => StoreError::Conflict(format!(
                    "port {} already exists on its asset",
                    update.name.as_deref().unwrap_or_default()
                )),
                other => other,
            })?
            .ok_or(StoreError::NotFound { entity: "port", id })
    }

    async fn delete_port(&self, id: i64) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE asset_port SET connected_port_id = NULL, is_connected = FALSE, \
             cable_type = NULL, updated_at = now() WHERE connected_port_id = $1",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM asset_port WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "port", id });
        }

        tx.commit().await?;
        Ok(())
    }

    async fn connect_ports(
        &self,
        port_id: i64,
        peer_port_id: i64,
        cable_type: Option<&str>,
    ) -> Result<(Port, Port), StoreError> {
        let mut tx = self.pool.begin().await?;

        let select = format!("SELECT {} FROM asset_port WHERE id = $1 FOR UPDATE", PORT_COLUMNS);
        let port = sqlx::query_as::<_, Port>(&select)
            .bind(port_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "port",
                id: port_id,
            })?;
        let peer = sqlx::query_as::<_, Port>(&select)
            .bind(peer_port_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "port",
                id: peer_port_id,
            })?;

        if let Err(e) = validate_link(&port, &peer) {
            warn!(port_id, peer_port_id, error = %e, "Rejected port link");
            return Err(e);
        }

        sqlx::query(
            "UPDATE asset_port SET connected_port_id = NULL, is_connected = FALSE, \
             cable_type = NULL, updated_at = now() \
             WHERE connected_port_id IN ($1, $2) OR id IN ($1, $2)",
        )
        .bind(port_id)
        .bind(peer_port_id)
        .execute(&mut *tx)
        .await?;

        let update = format!(
            "UPDATE asset_port SET \
             connected_port_id = CASE WHEN id = $1 THEN $2 ELSE $1 END, \
             is_connected = TRUE, cable_type = $3, last_link_time = now(), updated_at = now() \
             WHERE id IN ($1, $2) RETURNING {}",
            PORT_COLUMNS
        );
        let linked = sqlx::query_as::<_, Port>(&update)
            .bind(port_id)
            .bind(peer_port_id)
            .bind(cable_type)
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;

        let mut linked = linked.into_iter();
        let (first, second) = match (linked.next(), linked.next()) {
            (Some(a), Some(b)) => (a, b),
            _ => {
                return Err(StoreError::Database(
                    "port link update returned fewer than two rows".to_string(),
                ));
            }
        };
        debug!(port_id, peer_port_id, "Ports connected");
        if first.id == port_id {
            Ok((first, second))
        } else {
            Ok((second, first))
        }
    }

    async fn disconnect_port(&self, id: i64) -> Result<Port, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE asset_port SET connected_port_id = NULL, is_connected = FALSE, \
             cable_type = NULL, updated_at = now() WHERE id = $1 \
             RETURNING {}",
            PORT_COLUMNS
        );
        let previous_peer: Option<i64> = sqlx::query_scalar(
            "SELECT connected_port_id FROM asset_port WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound { entity: "port", id })?;

        let port = sqlx::query_as::<_, Port>(&sql)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(peer) = previous_peer {
            sqlx::query(
                "UPDATE asset_port SET connected_port_id = NULL, is_connected = FALSE, \
                 cable_type = NULL, updated_at = now() WHERE id = $1 AND connected_port_id = $2",
            )
            .bind(peer)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(port)
    }
}

// ============================================================================
// Users
// ============================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn get_user(&self, id: i64) -> Result<User, StoreError> {
        let sql = format!("SELECT {} FROM sys_user WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound { entity: "user", id })?
            .try_into()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM sys_user WHERE username = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn list_users(&self, limit: u32, offset: u64) -> Result<(Vec<User>, u64), StoreError> {
        let total = self.count_users().await?;
        let sql = format!(
            "SELECT {} FROM sys_user ORDER BY id LIMIT $1 OFFSET $2",
            USER_COLUMNS
        );
        let rows: Vec<UserRow> = sqlx::query_as(&sql)
            .bind(i64::from(limit))
            .bind(i64::try_from(offset).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        let users = rows
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    async fn create_user(&self, new: &NewUser, password_hash: &str) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO sys_user (username, password_hash, real_name, email, role) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        );
        let row: UserRow = sqlx::query_as(&sql)
            .bind(&new.username)
            .bind(password_hash)
            .bind(&new.real_name)
            .bind(&new.email)
            .bind(new.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match StoreError::from(e) {
                StoreError::Conflict(_) => {
                    StoreError::Conflict(format!("username {} already exists", new.username))
                }
                other => other,
            })?;
        row.try_into()
    }

    async fn update_user(&self, id: i64, update: &UserUpdate) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE sys_user SET \
             real_name = COALESCE($2, real_name), \
             email = COALESCE($3, email), \
             role = COALESCE($4, role), \
             is_active = COALESCE($5, is_active), \
             updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&update.real_name)
            .bind(&update.email)
            .bind(update.role.map(|r| r.as_str()))
            .bind(update.is_active)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound { entity: "user", id })?
            .try_into()
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sys_user SET password_hash = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    async fn deactivate_user(&self, id: i64) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE sys_user SET is_active = FALSE, updated_at = now() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { entity: "user", id });
        }
        Ok(())
    }

    async fn record_login(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE sys_user SET last_login_at = now(), failed_login_count = 0, \
             locked_until = NULL WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_failed_login(
        &self,
        id: i64,
        max_failures: u32,
        lock_for: Duration,
    ) -> Result<User, StoreError> {
        // The right-hand side of SET sees the row before the update.
        let sql = format!(
            "UPDATE sys_user SET \
             failed_login_count = CASE WHEN $2 > 0 AND failed_login_count + 1 >= $2 \
                 THEN 0 ELSE failed_login_count + 1 END, \
             locked_until = CASE WHEN $2 > 0 AND failed_login_count + 1 >= $2 \
                 THEN now() + make_interval(secs => $3) ELSE locked_until END, \
             updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(i32::try_from(max_failures).unwrap_or(i32::MAX))
            .bind(lock_for.num_seconds() as f64)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound { entity: "user", id })?
            .try_into()
    }

    async fn unlock_user(&self, id: i64) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE sys_user SET failed_login_count = 0, locked_until = NULL, updated_at = now() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or(StoreError::NotFound { entity: "user", id })?
            .try_into()
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sys_user")
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
