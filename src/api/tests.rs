//! Router tests over the in-memory store.

use super::create_router;
use crate::config::{BootstrapAdmin, Config};
use crate::db::{NewUser, Role, UserRepository};
use crate::state::AppState;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-password";

async fn app(rate_limited: bool) -> (Router, Arc<AppState>) {
    let mut config = Config::default();
    config.rate_limit.enabled = rate_limited;
    config.auth.bootstrap_admin = Some(BootstrapAdmin {
        username: "admin".to_string(),
        password: ADMIN_PASSWORD.to_string(),
    });

    let state = AppState::in_memory(config);
    state.ensure_bootstrap_admin().await.unwrap();
    let state = Arc::new(state);
    (create_router(Arc::clone(&state)), state)
}

/// Creates a user directly in the store and issues it a token.
async fn token_for(state: &AppState, username: &str, role: Role) -> String {
    let user = state
        .store
        .create_user(
            &NewUser {
                username: username.to_string(),
                password: String::new(),
                real_name: None,
                email: None,
                role,
            },
            "unused",
        )
        .await
        .unwrap();
    state.tokens.issue(&user).token
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

async fn category_id(app: &Router, token: &str, code: &str) -> i64 {
    let (_, _, body) = send(
        app,
        request(Method::GET, "/api/assets/categories?network_only=true", Some(token), None),
    )
    .await;
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["code"] == code)
        .unwrap()["id"]
        .as_i64()
        .unwrap()
}

async fn create_asset(app: &Router, token: &str, code: &str, category_id: i64) -> i64 {
    let (status, _, body) = send(
        app,
        request(
            Method::POST,
            "/api/assets",
            Some(token),
            Some(json!({"asset_code": code, "name": code, "category_id": category_id})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

async fn create_port(app: &Router, token: &str, asset_id: i64, name: &str) -> i64 {
    let (status, _, body) = send(
        app,
        request(
            Method::POST,
            &format!("/api/assets/{}/ports", asset_id),
            Some(token),
            Some(json!({"name": name})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["id"].as_i64().unwrap()
}

async fn login(app: &Router, username: &str, password: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(
        app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": username, "password": password})),
        ),
    )
    .await;
    (status, body)
}

async fn user_id(state: &AppState, username: &str) -> i64 {
    state
        .store
        .find_user_by_username(username)
        .await
        .unwrap()
        .unwrap()
        .id
}

// ============================================================================
// Health and Envelope
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app(false).await;
    let (status, _, body) = send(&app, request(Method::GET, "/api/health", None, None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["store"], "memory");
    assert_eq!(body["timestamp"].as_str().unwrap().len(), 19);
}

#[tokio::test]
async fn test_ping() {
    let (app, _) = app(true).await;
    let (status, _, body) = send(&app, request(Method::GET, "/api/ping", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "pong");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (app, _) = app(false).await;
    let (status, _, _) = send(&app, request(Method::GET, "/api/nope", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Authentication and Permissions
// ============================================================================

#[tokio::test]
async fn test_topology_requires_authentication() {
    let (app, _) = app(false).await;
    let (status, _, body) =
        send(&app, request(Method::GET, "/api/network/topology", None, None)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 401);
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized() {
    let (app, _) = app(false).await;
    let (status, _, _) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some("itops_bogus"), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_profile_and_logout() {
    let (app, _) = app(false).await;

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "admin", "password": ADMIN_PASSWORD})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert!(body["data"]["user"].get("password_hash").is_none());
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(token.starts_with("itops_"));

    let (status, _, body) =
        send(&app, request(Method::GET, "/api/auth/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");
    assert_eq!(body["data"]["permissions"], json!(["read", "edit", "admin"]));
    assert!(!body["data"]["user"]["last_login_at"].is_null());

    let (status, _, _) =
        send(&app, request(Method::POST, "/api/auth/logout", Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) =
        send(&app, request(Method::GET, "/api/auth/profile", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let (app, _) = app(false).await;
    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"username": "admin", "password": "wrong-password"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("invalid username or password"));
}

#[tokio::test]
async fn test_viewer_cannot_edit() {
    let (app, state) = app(false).await;
    let viewer = token_for(&state, "viewer", Role::Viewer).await;

    let (status, _, _) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some(&viewer), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/network/topology/positions",
            Some(&viewer),
            Some(json!({"positions": [{"id": 1, "x": 0.0, "y": 0.0}]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);
}

#[tokio::test]
async fn test_user_management_is_admin_only() {
    let (app, state) = app(false).await;
    let operator = token_for(&state, "operator", Role::Operator).await;
    let admin = token_for(&state, "admin2", Role::Admin).await;

    let (status, _, _) = send(&app, request(Method::GET, "/api/users", Some(&operator), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = send(
        &app,
        request(Method::GET, "/api/users?page=1&page_size=2", Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["list"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_user_validates_password() {
    let (app, state) = app(false).await;
    let admin = token_for(&state, "admin2", Role::Admin).await;

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({"username": "shorty", "password": "short"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["password"].is_string());

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({"username": "ops", "password": "long-enough", "role": "operator"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["role"], "operator");
}

#[tokio::test]
async fn test_deactivation_revokes_tokens() {
    let (app, state) = app(false).await;
    let admin = token_for(&state, "admin2", Role::Admin).await;
    let operator = token_for(&state, "operator", Role::Operator).await;
    let operator_id = state
        .store
        .find_user_by_username("operator")
        .await
        .unwrap()
        .unwrap()
        .id;

    let (status, _, _) = send(
        &app,
        request(Method::DELETE, &format!("/api/users/{}", operator_id), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some(&operator), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_repeated_failed_logins_lock_account() {
    let (app, state) = app(false).await;
    let admin2 = token_for(&state, "admin2", Role::Admin).await;

    for _ in 0..5 {
        let (status, body) = login(&app, "admin", "wrong-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["message"].as_str().unwrap().contains("invalid username or password"));
    }

    let (status, body) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap().contains("locked"));

    let admin_id = user_id(&state, "admin").await;
    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            &format!("/api/users/{}/unlock", admin_id),
            Some(&admin2),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["locked_until"].is_null());
    assert_eq!(body["data"]["failed_login_count"], 0);

    let (status, _) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_successful_login_resets_failure_count() {
    let (app, state) = app(false).await;

    for _ in 0..4 {
        login(&app, "admin", "wrong-password").await;
    }
    let (status, _) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    for _ in 0..4 {
        login(&app, "admin", "wrong-password").await;
    }
    let (status, _) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let admin = state.store.get_user(user_id(&state, "admin").await).await.unwrap();
    assert_eq!(admin.failed_login_count, 0);
    assert!(admin.locked_until.is_none());
}

#[tokio::test]
async fn test_update_user_revokes_tokens_on_role_change() {
    let (app, state) = app(false).await;
    let admin = token_for(&state, "admin2", Role::Admin).await;
    let operator = token_for(&state, "operator", Role::Operator).await;
    let operator_id = user_id(&state, "operator").await;
    let uri = format!("/api/users/{}", operator_id);

    let (status, _, body) = send(
        &app,
        request(Method::PUT, &uri, Some(&admin), Some(json!({"real_name": "Ops"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["real_name"], "Ops");
    let (status, _, _) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some(&operator), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(
        &app,
        request(Method::PUT, &uri, Some(&admin), Some(json!({"role": "viewer"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["role"], "viewer");
    let (status, _, _) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some(&operator), None),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let admin_id = user_id(&state, "admin2").await;
    let (status, _, _) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/users/{}", admin_id),
            Some(&admin),
            Some(json!({"is_active": false})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reset_password() {
    let (app, state) = app(false).await;
    let admin = token_for(&state, "admin2", Role::Admin).await;
    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({"username": "ops", "password": "first-password"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let ops_id = body["data"]["id"].as_i64().unwrap();
    let (_, body) = login(&app, "ops", "first-password").await;
    let ops_token = body["data"]["token"].as_str().unwrap().to_string();

    let uri = format!("/api/users/{}/reset-password", ops_id);
    let (status, _, body) = send(
        &app,
        request(Method::POST, &uri, Some(&admin), Some(json!({"new_password": "short"}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["new_password"].is_string());

    let (status, _, _) = send(
        &app,
        request(
            Method::POST,
            &uri,
            Some(&admin),
            Some(json!({"new_password": "second-password"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) =
        send(&app, request(Method::GET, "/api/auth/profile", Some(&ops_token), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "ops", "first-password").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "ops", "second-password").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_profile() {
    let (app, state) = app(false).await;
    let viewer = token_for(&state, "viewer", Role::Viewer).await;

    let (status, _, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/auth/profile",
            Some(&viewer),
            Some(json!({"real_name": "Vera", "email": "vera@example.com", "role": "admin"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["real_name"], "Vera");
    assert_eq!(body["data"]["email"], "vera@example.com");
    assert_eq!(body["data"]["role"], "viewer");
}

#[tokio::test]
async fn test_change_password() {
    let (app, _) = app(false).await;
    let (_, body) = login(&app, "admin", ADMIN_PASSWORD).await;
    let current = body["data"]["token"].as_str().unwrap().to_string();
    let (_, body) = login(&app, "admin", ADMIN_PASSWORD).await;
    let other = body["data"]["token"].as_str().unwrap().to_string();

    let change = |old: &str, new: &str, confirm: &str| {
        request(
            Method::POST,
            "/api/auth/change-password",
            Some(&current),
            Some(json!({"old_password": old, "new_password": new, "confirm_password": confirm})),
        )
    };

    let (status, _, body) =
        send(&app, change(ADMIN_PASSWORD, "new-password", "other-password")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["confirm_password"].is_string());

    let (status, _, body) = send(&app, change(ADMIN_PASSWORD, ADMIN_PASSWORD, ADMIN_PASSWORD)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["new_password"].is_string());

    let (status, _, _) = send(&app, change("not-my-password", "new-password", "new-password")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(&app, change(ADMIN_PASSWORD, "new-password", "new-password")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) =
        send(&app, request(Method::GET, "/api/auth/profile", Some(&current), None)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) =
        send(&app, request(Method::GET, "/api/auth/profile", Some(&other), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = login(&app, "admin", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = login(&app, "admin", "new-password").await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Inventory
// ============================================================================

#[tokio::test]
async fn test_asset_listing_paging_and_export() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let switch = category_id(&app, &token, "SWITCH").await;
    create_asset(&app, &token, "SW-01", switch).await;
    create_asset(&app, &token, "SW-02", switch).await;

    let (status, _, body) = send(
        &app,
        request(Method::GET, "/api/assets?page=1&page_size=1", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["page_size"], 1);
    assert_eq!(body["data"]["total_pages"], 2);
    assert_eq!(body["data"]["list"].as_array().unwrap().len(), 1);

    let (status, _, body) = send(
        &app,
        request(Method::GET, "/api/assets/export?keyword=SW-02", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let exported = body["data"].as_array().unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0]["asset_code"], "SW-02");
}

#[tokio::test]
async fn test_duplicate_asset_code_is_rejected() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let switch = category_id(&app, &token, "SWITCH").await;
    create_asset(&app, &token, "SW-01", switch).await;

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/assets",
            Some(&token),
            Some(json!({"asset_code": "SW-01", "name": "again", "category_id": switch})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_invalid_path_id_is_422() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "viewer", Role::Viewer).await;
    let (status, _, body) =
        send(&app, request(Method::GET, "/api/assets/abc", Some(&token), None)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["path"].is_string());
}

#[tokio::test]
async fn test_auto_create_ports_skips_existing_names() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let router = category_id(&app, &token, "ROUTER").await;
    let asset = create_asset(&app, &token, "RT-01", router).await;
    create_port(&app, &token, asset, "Port1").await;

    let uri = format!("/api/assets/{}/ports/auto-create", asset);
    let (status, _, body) = send(&app, request(Method::POST, &uri, Some(&token), None)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["created"].as_array().unwrap().len(), 7);
    assert_eq!(body["data"]["skipped"], json!(["Port1"]));

    let (_, _, body) = send(&app, request(Method::POST, &uri, Some(&token), None)).await;
    assert!(body["data"]["created"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["skipped"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_connect_rejects_same_asset() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let switch = category_id(&app, &token, "SWITCH").await;
    let asset = create_asset(&app, &token, "SW-01", switch).await;
    let a = create_port(&app, &token, asset, "Gi0/1").await;
    let b = create_port(&app, &token, asset, "Gi0/2").await;

    for (port_id, peer_port_id) in [(a, a), (a, b)] {
        let (status, _, body) = send(
            &app,
            request(
                Method::POST,
                "/api/ports/connect",
                Some(&token),
                Some(json!({"port_id": port_id, "peer_port_id": peer_port_id})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn test_category_in_use_cannot_be_deleted() {
    let (app, state) = app(false).await;
    let admin = token_for(&state, "admin2", Role::Admin).await;
    let switch = category_id(&app, &admin, "SWITCH").await;
    let asset = create_asset(&app, &admin, "SW-01", switch).await;
    let uri = format!("/api/assets/categories/{}", switch);

    let (status, _, body) = send(&app, request(Method::DELETE, &uri, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["message"].as_str().unwrap().contains("still has 1 assets"));

    let (_, _, body) =
        send(&app, request(Method::GET, "/api/network/topology", Some(&admin), None)).await;
    assert_eq!(body["data"]["node_count"], 1);

    let (status, _, _) = send(
        &app,
        request(Method::DELETE, &format!("/api/assets/{}", asset), Some(&admin), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&app, request(Method::DELETE, &uri, Some(&admin), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_asset_status() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let viewer = token_for(&state, "viewer", Role::Viewer).await;
    let switch = category_id(&app, &token, "SWITCH").await;
    let asset = create_asset(&app, &token, "SW-01", switch).await;
    let uri = format!("/api/assets/{}/change-status", asset);

    let (status, _, _) = send(
        &app,
        request(Method::POST, &uri, Some(&viewer), Some(json!({"status": "idle"}))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &app,
        request(Method::POST, &uri, Some(&token), Some(json!({"status": "in_use"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            &uri,
            Some(&token),
            Some(json!({"status": "maintenance", "remark": "fan replacement"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "maintenance");

    let (status, _, body) = send(
        &app,
        request(Method::POST, &uri, Some(&token), Some(json!({"status": "scrapped"}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["body"].is_string());
}

#[tokio::test]
async fn test_update_port() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let switch = category_id(&app, &token, "SWITCH").await;
    let asset = create_asset(&app, &token, "SW-01", switch).await;
    let port = create_port(&app, &token, asset, "Gi0/1").await;
    create_port(&app, &token, asset, "Gi0/2").await;
    let uri = format!("/api/ports/{}", port);

    let (status, _, body) = send(
        &app,
        request(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({"port_speed": "10G", "vlan_id": 30})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["name"], "Gi0/1");
    assert_eq!(body["data"]["port_speed"], "10G");
    assert_eq!(body["data"]["vlan_id"], 30);

    let (status, _, _) = send(
        &app,
        request(Method::PUT, &uri, Some(&token), Some(json!({"name": "Gi0/2"}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &app,
        request(Method::PUT, &uri, Some(&token), Some(json!({"name": "  "}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["name"].is_string());

    let (status, _, _) = send(
        &app,
        request(Method::PUT, "/api/ports/9999", Some(&token), Some(json!({"vlan_id": 1}))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Topology
// ============================================================================

#[tokio::test]
async fn test_topology_flow_with_partial_position_save() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let switch_cat = category_id(&app, &token, "SWITCH").await;
    let router_cat = category_id(&app, &token, "ROUTER").await;
    let switch = create_asset(&app, &token, "SW-01", switch_cat).await;
    let router = create_asset(&app, &token, "RT-01", router_cat).await;
    let sw_port = create_port(&app, &token, switch, "Gi0/1").await;
    let rt_port = create_port(&app, &token, router, "eth0").await;

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/ports/connect",
            Some(&token),
            Some(json!({"port_id": rt_port, "peer_port_id": sw_port, "cable_type": "fiber"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["port"]["peer_port_id"], sw_port);
    assert_eq!(body["data"]["peer"]["peer_port_id"], rt_port);

    let (status, _, body) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["node_count"], 2);
    assert_eq!(body["data"]["edge_count"], 1);
    assert_eq!(body["data"]["edges"][0]["from_asset_id"], switch);
    assert_eq!(body["data"]["edges"][0]["to_port"], "eth0");
    assert!(body["data"]["nodes"][0]["position"].is_null());

    let (status, _, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/network/topology/positions",
            Some(&token),
            Some(json!({"positions": [
                {"id": switch, "x": 100.0, "y": 150.0},
                {"id": 999, "x": 0.0, "y": 0.0}
            ]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["succeeded"], json!([switch]));
    assert_eq!(
        body["data"]["failed"],
        json!([{"id": 999, "reason": "not found"}])
    );
    assert_eq!(body["message"], "Saved 1 of 2 positions");

    let (_, _, body) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some(&token), None),
    )
    .await;
    assert_eq!(body["data"]["nodes"][0]["position"], json!({"x": 100.0, "y": 150.0}));
}

#[tokio::test]
async fn test_malformed_position_batches_are_422() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;

    for body in [
        json!({"positions": []}),
        json!({"positions": [{"id": 1, "x": 1.0}]}),
        json!({"positions": "nope"}),
        json!([1, 2, 3]),
    ] {
        let (status, _, response) = send(
            &app,
            request(
                Method::PUT,
                "/api/network/topology/positions",
                Some(&token),
                Some(body),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{response}");
        assert_eq!(response["code"], 422);
    }
}

#[tokio::test]
async fn test_non_numeric_coordinate_fails_only_its_item() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let switch_cat = category_id(&app, &token, "SWITCH").await;
    let a = create_asset(&app, &token, "SW-01", switch_cat).await;
    let b = create_asset(&app, &token, "SW-02", switch_cat).await;

    let (status, _, body) = send(
        &app,
        request(
            Method::PUT,
            "/api/network/topology/positions",
            Some(&token),
            Some(json!({"positions": [
                {"id": a, "x": 10.0, "y": 20.0},
                {"id": b, "x": "abc", "y": 0}
            ]})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["succeeded"], json!([a]));
    assert_eq!(
        body["data"]["failed"],
        json!([{"id": b, "reason": "invalid coordinate"}])
    );

    let (_, _, body) = send(
        &app,
        request(Method::GET, "/api/network/topology", Some(&token), None),
    )
    .await;
    let nodes = body["data"]["nodes"].as_array().unwrap();
    let node = |id: i64| nodes.iter().find(|n| n["id"] == id).unwrap();
    assert_eq!(node(a)["position"], json!({"x": 10.0, "y": 20.0}));
    assert!(node(b)["position"].is_null());

    let (status, _, body) = send(
        &app,
        request(
            Method::PUT,
            &format!("/api/network/devices/{}/position", b),
            Some(&token),
            Some(json!({"x": "left", "y": 1.0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["position"].is_string());
}

#[tokio::test]
async fn test_device_position_unknown_asset_is_404() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;
    let (status, _, _) = send(
        &app,
        request(
            Method::PUT,
            "/api/network/devices/999/position",
            Some(&token),
            Some(json!({"x": 1.0, "y": 2.0})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_search_devices() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "viewer", Role::Viewer).await;
    let operator = token_for(&state, "operator", Role::Operator).await;
    let switch = category_id(&app, &operator, "SWITCH").await;
    let router = category_id(&app, &operator, "ROUTER").await;
    create_asset(&app, &operator, "SW-CORE", switch).await;
    let rt = create_asset(&app, &operator, "RT-EDGE", router).await;

    let (status, _, body) = send(
        &app,
        request(Method::GET, "/api/network/devices/search?keyword=EDGE", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let found = body["data"].as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], rt);
    assert_eq!(found[0]["device_type"], "network_device");

    let (status, _, body) = send(
        &app,
        request(Method::GET, "/api/network/devices/search", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_auto_layout_rejects_unknown_algorithm() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "operator", Role::Operator).await;

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/network/topology/auto-layout",
            Some(&token),
            Some(json!({"algorithm": "spiral"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["data"]["algorithm"].is_string());

    let (status, _, body) = send(
        &app,
        request(
            Method::POST,
            "/api/network/topology/auto-layout",
            Some(&token),
            Some(json!({"algorithm": "circular"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["algorithm"], "circular");
}

#[tokio::test]
async fn test_topology_config() {
    let (app, state) = app(false).await;
    let token = token_for(&state, "viewer", Role::Viewer).await;
    let (status, _, body) = send(
        &app,
        request(Method::GET, "/api/network/topology/config", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["node_size"], 40);
    assert_eq!(body["data"]["show_ports"], true);
}

// ============================================================================
// Rate Limiting
// ============================================================================

#[tokio::test]
async fn test_second_login_within_two_seconds_is_429() {
    let (app, _) = app(true).await;
    let login = || {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("X-Forwarded-For", "203.0.113.7")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"username": "nobody", "password": "irrelevant"}).to_string(),
            ))
            .unwrap()
    };

    let (status, headers, _) = send(&app, login()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key("x-ratelimit-limit"));
    assert!(headers.contains_key("x-ratelimit-reset"));

    let (status, headers, body) = send(&app, login()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = headers["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=2).contains(&retry_after));
    assert_eq!(headers["x-ratelimit-remaining"], "0");
    assert_eq!(body["code"], 429);
    assert_eq!(body["data"]["limit"], 1);
}

#[tokio::test]
async fn test_login_limit_is_per_client_address() {
    let (app, _) = app(true).await;
    for address in ["198.51.100.1", "198.51.100.2"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("X-Forwarded-For", address)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"username": "nobody", "password": "irrelevant"}).to_string(),
            ))
            .unwrap();
        let (status, _, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_allowed_requests_carry_quota_headers() {
    let (app, state) = app(true).await;
    let token = token_for(&state, "viewer", Role::Viewer).await;
    let (status, headers, _) = send(
        &app,
        request(Method::GET, "/api/assets", Some(&token), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-ratelimit-limit"], "20");
    assert_eq!(headers["x-ratelimit-remaining"], "19");
}

#[tokio::test]
async fn test_health_is_not_rate_limited() {
    let (app, _) = app(true).await;
    for _ in 0..30 {
        let (status, headers, _) =
            send(&app, request(Method::GET, "/api/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(!headers.contains_key("x-ratelimit-limit"));
    }
}
