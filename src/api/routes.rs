//! Route configuration.
//!
//! Routes are grouped by rate limit category; each group carries its own
//! rate limiting layer. Authentication runs before every group so the
//! limiter can count authenticated callers by user id.

use crate::api::middleware::{RateLimitScope, authenticate, rate_limit_middleware};
use crate::api::{assets, handlers, users};
use crate::rate_limit::EndpointCategory;
use crate::state::AppState;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use std::sync::Arc;

type StateRouter = Router<Arc<AppState>>;

fn limited(router: StateRouter, state: &Arc<AppState>, category: EndpointCategory) -> StateRouter {
    router.route_layer(from_fn_with_state(
        RateLimitScope::new(state, category),
        rate_limit_middleware,
    ))
}

/// Creates the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Health (never limited)
    let health = Router::new()
        .route("/api/health", get(handlers::health_check))
        .route("/api/ping", get(handlers::ping));

    // Login
    let login = Router::new().route("/api/auth/login", post(users::login));

    // Session
    let session = Router::new()
        .route("/api/auth/logout", post(users::logout))
        .route(
            "/api/auth/profile",
            get(users::profile).put(users::update_profile),
        )
        .route("/api/auth/change-password", post(users::change_password));

    // Administration
    let admin = Router::new()
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/{id}",
            put(users::update_user).delete(users::deactivate_user),
        )
        .route("/api/users/{id}/reset-password", post(users::reset_password))
        .route("/api/users/{id}/unlock", post(users::unlock_user))
        .route("/api/assets/categories", post(assets::create_category))
        .route(
            "/api/assets/categories/{id}",
            put(assets::update_category).delete(assets::delete_category),
        );

    // Asset queries
    let query = Router::new()
        .route("/api/assets", get(assets::list_assets))
        .route(
            "/api/network/devices/search",
            get(handlers::search_devices),
        );

    // Export
    let export = Router::new().route("/api/assets/export", get(assets::export_assets));

    // Everything else
    let default = Router::new()
        .route("/api/assets/categories", get(assets::list_categories))
        .route("/api/assets", post(assets::create_asset))
        .route(
            "/api/assets/{id}",
            get(assets::get_asset)
                .put(assets::update_asset)
                .delete(assets::delete_asset),
        )
        .route(
            "/api/assets/{id}/change-status",
            post(assets::change_asset_status),
        )
        .route(
            "/api/assets/{id}/ports",
            get(assets::list_ports).post(assets::create_port),
        )
        .route(
            "/api/assets/{id}/ports/auto-create",
            post(assets::auto_create_ports),
        )
        .route("/api/ports/connect", post(assets::connect_ports))
        .route(
            "/api/ports/{id}",
            put(assets::update_port).delete(assets::delete_port),
        )
        .route("/api/ports/{id}/disconnect", post(assets::disconnect_port))
        .route("/api/network/topology", get(handlers::get_topology))
        .route(
            "/api/network/topology/positions",
            put(handlers::save_positions),
        )
        .route(
            "/api/network/topology/auto-layout",
            post(handlers::auto_layout),
        )
        .route(
            "/api/network/topology/config",
            get(handlers::get_topology_config),
        )
        .route(
            "/api/network/devices/{id}/position",
            put(handlers::update_device_position),
        );

    health
        .merge(limited(login, &state, EndpointCategory::Login))
        .merge(limited(session, &state, EndpointCategory::Auth))
        .merge(limited(admin, &state, EndpointCategory::Admin))
        .merge(limited(query, &state, EndpointCategory::Query))
        .merge(limited(export, &state, EndpointCategory::Export))
        .merge(limited(default, &state, EndpointCategory::Default))
        .layer(from_fn_with_state(Arc::clone(&state), authenticate))
        .with_state(state)
}
