//! Category, asset and port handlers.

use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::AuthUser;
use crate::auth::Permission;
use crate::db::{
    Asset, AssetRepository, AssetUpdate, Category, CategoryRepository, CategoryUpdate, NewAsset,
    NewCategory, NewPort, Port, PortRepository, PortUpdate,
};
use crate::error::ApiError;
use crate::models::{
    AssetListQuery, AutoCreatePortsResponse, CategoryQuery, ChangeStatusRequest,
    ConnectPortsRequest, ConnectPortsResponse,
};
use crate::response::{ApiResponse, PageData};
use crate::state::AppState;
use axum::extract::State;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

fn require_non_empty(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::field(field, "must not be empty"));
    }
    Ok(())
}

// ============================================================================
// Categories
// ============================================================================

/// Lists asset categories.
#[utoipa::path(
    get,
    path = "/api/assets/categories",
    params(CategoryQuery),
    responses((status = 200, description = "Categories ordered by sort order", body = [Category])),
    tag = "Categories"
)]
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<CategoryQuery>,
) -> Result<ApiResponse<Vec<Category>>, ApiError> {
    user.require(Permission::Read)?;
    let categories = state.store.list_categories(query.network_only).await?;
    let message = format!("{} categories", categories.len());
    Ok(ApiResponse::success(categories, message))
}

/// Creates a category.
#[utoipa::path(
    post,
    path = "/api/assets/categories",
    request_body = NewCategory,
    responses(
        (status = 200, description = "Category created", body = Category),
        (status = 400, description = "Duplicate code")
    ),
    tag = "Categories"
)]
pub async fn create_category(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<NewCategory>,
) -> Result<ApiResponse<Category>, ApiError> {
    user.require(Permission::Admin)?;
    require_non_empty("name", &request.name)?;
    require_non_empty("code", &request.code)?;
    if request.default_port_count < 0 {
        return Err(ApiError::field("default_port_count", "must not be negative"));
    }

    let category = state.store.create_category(&request).await?;
    info!(category_id = category.id, code = %category.code, "Created category");
    Ok(ApiResponse::success(category, "Category created"))
}

/// Updates a category.
#[utoipa::path(
    put,
    path = "/api/assets/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    request_body = CategoryUpdate,
    responses(
        (status = 200, description = "Category updated", body = Category),
        (status = 404, description = "Category not found")
    ),
    tag = "Categories"
)]
pub async fn update_category(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(request): ValidJson<CategoryUpdate>,
) -> Result<ApiResponse<Category>, ApiError> {
    user.require(Permission::Admin)?;
    if let Some(ref name) = request.name {
        require_non_empty("name", name)?;
    }

    let category = state.store.update_category(id, &request).await?;
    Ok(ApiResponse::success(category, "Category updated"))
}

/// Soft-deletes a category that no live asset references.
#[utoipa::path(
    delete,
    path = "/api/assets/categories/{id}",
    params(("id" = i64, Path, description = "Category id")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 400, description = "Category still has assets"),
        (status = 404, description = "Category not found")
    ),
    tag = "Categories"
)]
pub async fn delete_category(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Permission::Admin)?;
    state.store.delete_category(id).await?;
    info!(category_id = id, "Deleted category");
    Ok(ApiResponse::message("Category deleted"))
}

// ============================================================================
// Assets
// ============================================================================

/// Lists assets, paginated and filtered.
#[utoipa::path(
    get,
    path = "/api/assets",
    params(AssetListQuery),
    responses((status = 200, description = "One page of assets")),
    tag = "Assets"
)]
pub async fn list_assets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<AssetListQuery>,
) -> Result<ApiResponse<PageData<Asset>>, ApiError> {
    user.require(Permission::Read)?;

    let page = query.page_query();
    let (assets, total) = state
        .store
        .list_assets(&query.filter(), page.page_size(), page.offset())
        .await?;
    Ok(ApiResponse::page(assets, total, &page, format!("{} assets", total)))
}

/// Exports every asset matching the filter, unpaginated.
#[utoipa::path(
    get,
    path = "/api/assets/export",
    params(AssetListQuery),
    responses((status = 200, description = "All matching assets", body = [Asset])),
    tag = "Assets"
)]
pub async fn export_assets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidQuery(query): ValidQuery<AssetListQuery>,
) -> Result<ApiResponse<Vec<Asset>>, ApiError> {
    user.require(Permission::Read)?;

    let assets = state.store.export_assets(&query.filter()).await?;
    info!(user = %user.username, count = assets.len(), "Exported assets");
    let message = format!("Exported {} assets", assets.len());
    Ok(ApiResponse::success(assets, message))
}

/// Registers an asset.
#[utoipa::path(
    post,
    path = "/api/assets",
    request_body = NewAsset,
    responses(
        (status = 200, description = "Asset created", body = Asset),
        (status = 400, description = "Duplicate asset code"),
        (status = 404, description = "Unknown category")
    ),
    tag = "Assets"
)]
pub async fn create_asset(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<NewAsset>,
) -> Result<ApiResponse<Asset>, ApiError> {
    user.require(Permission::Edit)?;
    require_non_empty("asset_code", &request.asset_code)?;
    require_non_empty("name", &request.name)?;

    let asset = state.store.create_asset(&request).await?;
    info!(asset_id = asset.id, code = %asset.asset_code, "Created asset");
    Ok(ApiResponse::success(asset, "Asset created"))
}

/// Fetches one asset.
#[utoipa::path(
    get,
    path = "/api/assets/{id}",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found")
    ),
    tag = "Assets"
)]
pub async fn get_asset(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<ApiResponse<Asset>, ApiError> {
    user.require(Permission::Read)?;
    let asset = state.store.get_asset(id).await?;
    Ok(ApiResponse::success(asset, "Asset found"))
}

/// Updates an asset. Coordinates are not touched.
#[utoipa::path(
    put,
    path = "/api/assets/{id}",
    params(("id" = i64, Path, description = "Asset id")),
    request_body = AssetUpdate,
    responses(
        (status = 200, description = "Asset updated", body = Asset),
        (status = 404, description = "Asset not found")
    ),
    tag = "Assets"
)]
pub async fn update_asset(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(request): ValidJson<AssetUpdate>,
) -> Result<ApiResponse<Asset>, ApiError> {
    user.require(Permission::Edit)?;
    if let Some(ref name) = request.name {
        require_non_empty("name", name)?;
    }

    let asset = state.store.update_asset(id, &request).await?;
    Ok(ApiResponse::success(asset, "Asset updated"))
}

/// Moves an asset to another lifecycle status.
#[utoipa::path(
    post,
    path = "/api/assets/{id}/change-status",
    params(("id" = i64, Path, description = "Asset id")),
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = Asset),
        (status = 400, description = "Asset already has that status"),
        (status = 404, description = "Asset not found")
    ),
    tag = "Assets"
)]
pub async fn change_asset_status(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(request): ValidJson<ChangeStatusRequest>,
) -> Result<ApiResponse<Asset>, ApiError> {
    user.require(Permission::Edit)?;

    let current = state.store.get_asset(id).await?;
    if current.status == request.status {
        return Err(ApiError::BadRequest(format!(
            "asset {} is already {}",
            id,
            request.status.as_str()
        )));
    }

    let update = AssetUpdate {
        status: Some(request.status),
        ..Default::default()
    };
    let asset = state.store.update_asset(id, &update).await?;
    info!(
        asset_id = id,
        from = current.status.as_str(),
        to = asset.status.as_str(),
        remark = request.remark.as_deref().unwrap_or_default(),
        user = %user.username,
        "Changed asset status"
    );
    Ok(ApiResponse::success(asset, "Status changed"))
}

/// Soft-deletes an asset.
#[utoipa::path(
    delete,
    path = "/api/assets/{id}",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset deleted"),
        (status = 404, description = "Asset not found")
    ),
    tag = "Assets"
)]
pub async fn delete_asset(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Permission::Edit)?;
    state.store.delete_asset(id).await?;
    info!(asset_id = id, user = %user.username, "Deleted asset");
    Ok(ApiResponse::message("Asset deleted"))
}

// ============================================================================
// Ports
// ============================================================================

/// Lists the ports of an asset.
#[utoipa::path(
    get,
    path = "/api/assets/{id}/ports",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Ports ordered by id", body = [Port]),
        (status = 404, description = "Asset not found")
    ),
    tag = "Ports"
)]
pub async fn list_ports(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(asset_id): ValidPath<i64>,
) -> Result<ApiResponse<Vec<Port>>, ApiError> {
    user.require(Permission::Read)?;
    state.store.get_asset(asset_id).await?;

    let ports = state.store.list_ports(asset_id).await?;
    let message = format!("{} ports", ports.len());
    Ok(ApiResponse::success(ports, message))
}

/// Adds a port to an asset.
#[utoipa::path(
    post,
    path = "/api/assets/{id}/ports",
    params(("id" = i64, Path, description = "Asset id")),
    request_body = NewPort,
    responses(
        (status = 200, description = "Port created", body = Port),
        (status = 400, description = "Duplicate port name"),
        (status = 404, description = "Asset not found")
    ),
    tag = "Ports"
)]
pub async fn create_port(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(asset_id): ValidPath<i64>,
    ValidJson(request): ValidJson<NewPort>,
) -> Result<ApiResponse<Port>, ApiError> {
    user.require(Permission::Edit)?;
    require_non_empty("name", &request.name)?;

    let port = state.store.create_port(asset_id, &request).await?;
    Ok(ApiResponse::success(port, "Port created"))
}

/// Creates `Port1..PortN` from the category's default port count.
///
/// Names that already exist on the asset are skipped, so calling this
/// twice creates nothing the second time.
#[utoipa::path(
    post,
    path = "/api/assets/{id}/ports/auto-create",
    params(("id" = i64, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Ports created", body = AutoCreatePortsResponse),
        (status = 404, description = "Asset not found")
    ),
    tag = "Ports"
)]
pub async fn auto_create_ports(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(asset_id): ValidPath<i64>,
) -> Result<ApiResponse<AutoCreatePortsResponse>, ApiError> {
    user.require(Permission::Edit)?;

    let asset = state.store.get_asset(asset_id).await?;
    let category = state.store.get_category(asset.category_id).await?;
    let existing: HashSet<String> = state
        .store
        .list_ports(asset_id)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    let mut response = AutoCreatePortsResponse {
        created: Vec::new(),
        skipped: Vec::new(),
    };
    for index in 1..=category.default_port_count.max(0) {
        let name = format!("Port{}", index);
        if existing.contains(&name) {
            response.skipped.push(name);
            continue;
        }
        let port = state
            .store
            .create_port(
                asset_id,
                &NewPort {
                    name,
                    port_type: Some("ethernet".to_string()),
                    port_speed: None,
                    is_uplink: false,
                    vlan_id: None,
                    description: None,
                },
            )
            .await?;
        response.created.push(port);
    }

    info!(
        asset_id,
        created = response.created.len(),
        skipped = response.skipped.len(),
        "Auto-created ports"
    );
    let message = format!("Created {} ports", response.created.len());
    Ok(ApiResponse::success(response, message))
}

/// Updates port attributes. Links are left as they are.
#[utoipa::path(
    put,
    path = "/api/ports/{id}",
    params(("id" = i64, Path, description = "Port id")),
    request_body = PortUpdate,
    responses(
        (status = 200, description = "Port updated", body = Port),
        (status = 400, description = "Duplicate port name"),
        (status = 404, description = "Port not found")
    ),
    tag = "Ports"
)]
pub async fn update_port(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(request): ValidJson<PortUpdate>,
) -> Result<ApiResponse<Port>, ApiError> {
    user.require(Permission::Edit)?;
    if let Some(ref name) = request.name {
        require_non_empty("name", name)?;
    }

    let port = state.store.update_port(id, &request).await?;
    Ok(ApiResponse::success(port, "Port updated"))
}

/// Deletes a port, disconnecting its peer first.
#[utoipa::path(
    delete,
    path = "/api/ports/{id}",
    params(("id" = i64, Path, description = "Port id")),
    responses(
        (status = 200, description = "Port deleted"),
        (status = 404, description = "Port not found")
    ),
    tag = "Ports"
)]
pub async fn delete_port(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Permission::Edit)?;
    state.store.delete_port(id).await?;
    Ok(ApiResponse::message("Port deleted"))
}

/// Links two ports on different assets.
///
/// Previous links of either port are cleared first.
#[utoipa::path(
    post,
    path = "/api/ports/connect",
    request_body = ConnectPortsRequest,
    responses(
        (status = 200, description = "Ports linked", body = ConnectPortsResponse),
        (status = 400, description = "Self or same-asset link"),
        (status = 404, description = "Port not found")
    ),
    tag = "Ports"
)]
pub async fn connect_ports(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<ConnectPortsRequest>,
) -> Result<ApiResponse<ConnectPortsResponse>, ApiError> {
    user.require(Permission::Edit)?;

    let (port, peer) = state
        .store
        .connect_ports(
            request.port_id,
            request.peer_port_id,
            request.cable_type.as_deref(),
        )
        .await?;
    info!(port_id = port.id, peer_port_id = peer.id, "Connected ports");
    Ok(ApiResponse::success(
        ConnectPortsResponse { port, peer },
        "Ports connected",
    ))
}

/// Clears a port's link on both sides.
#[utoipa::path(
    post,
    path = "/api/ports/{id}/disconnect",
    params(("id" = i64, Path, description = "Port id")),
    responses(
        (status = 200, description = "Port disconnected", body = Port),
        (status = 404, description = "Port not found")
    ),
    tag = "Ports"
)]
pub async fn disconnect_port(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<ApiResponse<Port>, ApiError> {
    user.require(Permission::Edit)?;
    let port = state.store.disconnect_port(id).await?;
    Ok(ApiResponse::success(port, "Port disconnected"))
}
