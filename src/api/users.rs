//! Login, session and user management handlers.

use crate::api::extract::{ValidJson, ValidPath, ValidQuery};
use crate::api::middleware::AuthUser;
use crate::auth::{Permission, hash_password, verify_password};
use crate::db::{NewUser, User, UserRepository, UserUpdate};
use crate::error::ApiError;
use crate::models::{
    ChangePasswordRequest, LoginRequest, LoginResponse, ProfileResponse, ResetPasswordRequest,
    UpdateProfileRequest,
};
use crate::response::{ApiResponse, PageData, PageQuery};
use crate::state::AppState;
use axum::extract::State;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

const INVALID_CREDENTIALS: &str = "invalid username or password";

const ACCOUNT_LOCKED: &str = "account is locked, try again later";

fn check_password_length(field: &str, password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::field(
            field,
            format!("must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    Ok(())
}

// ============================================================================
// Sessions
// ============================================================================

/// Exchanges credentials for a bearer token.
///
/// Unknown users, inactive users and wrong passwords all get the same 401.
/// A locked account gets a 401 saying so. Every wrong password counts
/// toward the lockout threshold.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many login attempts")
    ),
    tag = "Auth"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidJson(request): ValidJson<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiError> {
    let username = request.username.trim();
    let Some(user) = state.store.find_user_by_username(username).await? else {
        warn!(username, "Login failed: unknown user");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    };
    let now = Utc::now();
    if user.is_locked_at(now) {
        warn!(username, "Login refused: account locked");
        return Err(ApiError::Unauthorized(ACCOUNT_LOCKED.to_string()));
    }
    if !user.is_active {
        warn!(username, "Login failed: inactive user");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let valid = verify_password(&request.password, &user.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        let auth = &state.config.auth;
        let updated = state
            .store
            .record_failed_login(user.id, auth.max_failed_logins, auth.lockout_duration())
            .await?;
        if updated.is_locked_at(now) {
            warn!(
                username,
                lockout_minutes = auth.lockout_minutes,
                "Account locked after repeated failed logins"
            );
        } else {
            warn!(
                username,
                failures = updated.failed_login_count,
                "Login failed: wrong password"
            );
        }
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    state.store.record_login(user.id).await?;
    let issued = state.tokens.issue(&user);
    info!(user_id = user.id, username, "User logged in");

    Ok(ApiResponse::success(
        LoginResponse {
            token: issued.token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
            user,
        },
        "Login successful",
    ))
}

/// Revokes the calling token.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Auth"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> ApiResponse<()> {
    state.tokens.revoke(&user.token);
    info!(user_id = user.user_id, "User logged out");
    ApiResponse::message("Logged out")
}

/// Returns the calling user with its effective permissions.
#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Auth"
)]
pub async fn profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<ApiResponse<ProfileResponse>, ApiError> {
    let record = state.store.get_user(user.user_id).await?;
    Ok(ApiResponse::success(
        ProfileResponse {
            role: record.role,
            permissions: record.role.permissions().to_vec(),
            user: record,
        },
        "Profile",
    ))
}

/// Updates the caller's display name and email.
#[utoipa::path(
    put,
    path = "/api/auth/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Auth"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<UpdateProfileRequest>,
) -> Result<ApiResponse<User>, ApiError> {
    let update = UserUpdate {
        real_name: request.real_name,
        email: request.email,
        ..Default::default()
    };
    let updated = state.store.update_user(user.user_id, &update).await?;
    Ok(ApiResponse::success(updated, "Profile updated"))
}

/// Changes the caller's password and revokes its other tokens.
#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Current password is wrong"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Invalid new password")
    ),
    tag = "Auth"
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    if request.new_password != request.confirm_password {
        return Err(ApiError::field("confirm_password", "does not match new_password"));
    }
    check_password_length("new_password", &request.new_password)?;
    if request.new_password == request.old_password {
        return Err(ApiError::field(
            "new_password",
            "must differ from the current password",
        ));
    }

    let record = state.store.get_user(user.user_id).await?;
    let valid = verify_password(&request.old_password, &record.password_hash)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if !valid {
        warn!(user_id = user.user_id, "Password change refused: wrong current password");
        return Err(ApiError::BadRequest("current password is incorrect".to_string()));
    }

    let password_hash =
        hash_password(&request.new_password).map_err(|e| ApiError::Internal(e.to_string()))?;
    state.store.set_password(user.user_id, &password_hash).await?;
    let revoked = state.tokens.revoke_others(user.user_id, &user.token);
    info!(user_id = user.user_id, revoked, "Password changed");
    Ok(ApiResponse::message("Password changed"))
}

// ============================================================================
// User Management
// ============================================================================

/// Lists users, paginated.
#[utoipa::path(
    get,
    path = "/api/users",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("page_size" = Option<u32>, Query, description = "Page size")
    ),
    responses(
        (status = 200, description = "One page of users"),
        (status = 403, description = "Admin role required")
    ),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidQuery(page): ValidQuery<PageQuery>,
) -> Result<ApiResponse<PageData<User>>, ApiError> {
    user.require(Permission::Admin)?;

    let (users, total) = state
        .store
        .list_users(page.page_size(), page.offset())
        .await?;
    Ok(ApiResponse::page(users, total, &page, format!("{} users", total)))
}

/// Creates a user.
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = NewUser,
    responses(
        (status = 200, description = "User created", body = User),
        (status = 400, description = "Duplicate username"),
        (status = 422, description = "Invalid input")
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidJson(request): ValidJson<NewUser>,
) -> Result<ApiResponse<User>, ApiError> {
    user.require(Permission::Admin)?;

    if request.username.trim().is_empty() {
        return Err(ApiError::field("username", "must not be empty"));
    }
    check_password_length("password", &request.password)?;

    let password_hash =
        hash_password(&request.password).map_err(|e| ApiError::Internal(e.to_string()))?;
    let created = state.store.create_user(&request, &password_hash).await?;
    info!(
        user_id = created.id,
        username = %created.username,
        role = created.role.as_str(),
        created_by = %user.username,
        "Created user"
    );
    Ok(ApiResponse::success(created, "User created"))
}

/// Deactivates a user and revokes its tokens.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User deactivated"),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Permission::Admin)?;
    if id == user.user_id {
        return Err(ApiError::BadRequest("cannot deactivate yourself".to_string()));
    }

    state.store.deactivate_user(id).await?;
    let revoked = state.tokens.revoke_user(id);
    info!(user_id = id, revoked, "Deactivated user");
    Ok(ApiResponse::message("User deactivated"))
}

/// Updates a user. Role changes and deactivation revoke the user's tokens.
#[utoipa::path(
    put,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body = UserUpdate,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 400, description = "Cannot deactivate yourself"),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(request): ValidJson<UserUpdate>,
) -> Result<ApiResponse<User>, ApiError> {
    user.require(Permission::Admin)?;
    if id == user.user_id && request.is_active == Some(false) {
        return Err(ApiError::BadRequest("cannot deactivate yourself".to_string()));
    }

    let updated = state.store.update_user(id, &request).await?;
    let revoked = if request.invalidates_sessions() {
        state.tokens.revoke_user(id)
    } else {
        0
    };
    info!(
        user_id = id,
        role = updated.role.as_str(),
        is_active = updated.is_active,
        revoked,
        updated_by = %user.username,
        "Updated user"
    );
    Ok(ApiResponse::success(updated, "User updated"))
}

/// Sets a new password for a user and revokes its tokens.
#[utoipa::path(
    post,
    path = "/api/users/{id}/reset-password",
    params(("id" = i64, Path, description = "User id")),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Password too short")
    ),
    tag = "Users"
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
    ValidJson(request): ValidJson<ResetPasswordRequest>,
) -> Result<ApiResponse<()>, ApiError> {
    user.require(Permission::Admin)?;
    check_password_length("new_password", &request.new_password)?;

    let password_hash =
        hash_password(&request.new_password).map_err(|e| ApiError::Internal(e.to_string()))?;
    state.store.set_password(id, &password_hash).await?;
    let revoked = state.tokens.revoke_user(id);
    info!(user_id = id, revoked, reset_by = %user.username, "Password reset");
    Ok(ApiResponse::message("Password reset"))
}

/// Clears a lockout and the failed-login count.
#[utoipa::path(
    post,
    path = "/api/users/{id}/unlock",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User unlocked", body = User),
        (status = 404, description = "User not found")
    ),
    tag = "Users"
)]
pub async fn unlock_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidPath(id): ValidPath<i64>,
) -> Result<ApiResponse<User>, ApiError> {
    user.require(Permission::Admin)?;

    let unlocked = state.store.unlock_user(id).await?;
    info!(user_id = id, unlocked_by = %user.username, "Unlocked user");
    Ok(ApiResponse::success(unlocked, "User unlocked"))
}
