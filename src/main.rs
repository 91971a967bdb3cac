//! IT Ops Backend Server
//!
//! REST API server for IT asset inventory and network topology.
//!
//! Runs on PostgreSQL when `DATABASE_URL` (or `database.url`) is set and on
//! an in-memory store otherwise, or when started with `--memory`.

use itops_backend::api::create_router;
use itops_backend::auth::{Permission, spawn_purge_task};
use itops_backend::config::{Config, TopologyConfig};
use itops_backend::db::{
    Asset, AssetStatus, AssetUpdate, Category, CategoryUpdate, DatabasePool, NewAsset,
    NewCategory, NewPort, NewUser, Port, PortUpdate, Role, User, UserUpdate,
};
use itops_backend::models::{
    AutoCreatePortsResponse, AutoLayoutRequest, AutoLayoutResponse, ChangePasswordRequest,
    ChangeStatusRequest, ConnectPortsRequest, ConnectPortsResponse, Coordinate,
    DevicePositionRequest, DeviceType, Edge, FailureReason, HealthResponse, LoginRequest,
    LoginResponse, Node, NodePort, Position, PositionFailure, PositionInput, PositionUpdate,
    ProfileResponse, ResetPasswordRequest, SavePositionsRequest, SavePositionsResult, Topology,
    UpdateProfileRequest,
};
use itops_backend::rate_limit::spawn_cleanup_task;
use itops_backend::state::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// How often expired sessions are dropped.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    paths(
        itops_backend::api::handlers::health_check,
        itops_backend::api::handlers::ping,
        itops_backend::api::users::login,
        itops_backend::api::users::logout,
        itops_backend::api::users::profile,
        itops_backend::api::users::update_profile,
        itops_backend::api::users::change_password,
        itops_backend::api::users::list_users,
        itops_backend::api::users::create_user,
        itops_backend::api::users::update_user,
        itops_backend::api::users::deactivate_user,
        itops_backend::api::users::reset_password,
        itops_backend::api::users::unlock_user,
        itops_backend::api::assets::list_categories,
        itops_backend::api::assets::create_category,
        itops_backend::api::assets::update_category,
        itops_backend::api::assets::delete_category,
        itops_backend::api::assets::list_assets,
        itops_backend::api::assets::export_assets,
        itops_backend::api::assets::create_asset,
        itops_backend::api::assets::get_asset,
        itops_backend::api::assets::update_asset,
        itops_backend::api::assets::change_asset_status,
        itops_backend::api::assets::delete_asset,
        itops_backend::api::assets::list_ports,
        itops_backend::api::assets::create_port,
        itops_backend::api::assets::auto_create_ports,
        itops_backend::api::assets::update_port,
        itops_backend::api::assets::delete_port,
        itops_backend::api::assets::connect_ports,
        itops_backend::api::assets::disconnect_port,
        itops_backend::api::handlers::get_topology,
        itops_backend::api::handlers::search_devices,
        itops_backend::api::handlers::save_positions,
        itops_backend::api::handlers::update_device_position,
        itops_backend::api::handlers::auto_layout,
        itops_backend::api::handlers::get_topology_config,
    ),
    components(
        schemas(
            HealthResponse,
            LoginRequest,
            LoginResponse,
            ProfileResponse,
            UpdateProfileRequest,
            ChangePasswordRequest,
            ResetPasswordRequest,
            Permission,
            User,
            NewUser,
            UserUpdate,
            Role,
            Category,
            NewCategory,
            CategoryUpdate,
            Asset,
            AssetStatus,
            NewAsset,
            AssetUpdate,
            ChangeStatusRequest,
            Port,
            NewPort,
            PortUpdate,
            ConnectPortsRequest,
            ConnectPortsResponse,
            AutoCreatePortsResponse,
            Topology,
            Node,
            NodePort,
            Edge,
            Position,
            DeviceType,
            PositionUpdate,
            Coordinate,
            PositionInput,
            SavePositionsRequest,
            SavePositionsResult,
            PositionFailure,
            FailureReason,
            DevicePositionRequest,
            AutoLayoutRequest,
            AutoLayoutResponse,
            TopologyConfig,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Login and sessions"),
        (name = "Users", description = "User management"),
        (name = "Categories", description = "Asset categories"),
        (name = "Assets", description = "Asset inventory"),
        (name = "Ports", description = "Asset ports and links"),
        (name = "Topology", description = "Network topology and layout"),
    ),
    info(
        title = "IT Ops API",
        version = "0.1.0",
        description = "REST API for IT asset inventory and network topology",
        license(name = "MIT")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let force_memory = std::env::args().any(|arg| arg == "--memory");

    // Create application state
    let state = match config.database.url.clone() {
        Some(url) if !force_memory => {
            let db = DatabasePool::new(&url, &config.database).await?;
            if config.database.run_migrations {
                db.run_migrations().await?;
                info!("Database migrations applied");
            }
            AppState::with_database(db, config)
        }
        Some(_) => {
            warn!("--memory given; ignoring the configured database");
            AppState::in_memory(config)
        }
        None => AppState::in_memory(config),
    };

    if let Some(admin) = state.ensure_bootstrap_admin().await? {
        info!(username = %admin.username, "Bootstrap administrator ready");
    }

    let state = Arc::new(state);
    let server = state.config.server.clone();

    if state.limiter.is_enabled() {
        spawn_cleanup_task(
            Arc::clone(&state.limiter),
            Duration::from_secs(state.config.rate_limit.cleanup_interval_secs),
        );
    } else {
        warn!("Rate limiting is disabled");
    }
    spawn_purge_task(Arc::clone(&state.tokens), SESSION_PURGE_INTERVAL);

    info!(
        "Starting IT Ops Backend on {}:{} ({} store)",
        server.host,
        server.port,
        state.store_kind()
    );
    info!(
        "Swagger UI available at http://{}:{}/swagger-ui/",
        server.host, server.port
    );

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = create_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // Start the server
    let addr = format!("{}:{}", server.host, server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
