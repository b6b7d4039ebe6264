use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::middleware::{require_admin, require_user, CurrentUser},
    error::AuthResult,
    state::AppState,
    users::{
        dto::{
            AdminUpdateUserRequest, Profile, ProfileUpdatedResponse, UpdateProfileRequest,
            UserDeletedResponse, UserListResponse, UserResponse,
        },
        services,
    },
};

pub fn profile_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(get_profile).put(update_profile))
        .route_layer(middleware::from_fn_with_state(state, require_user))
}

pub fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route(
            "/admin/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/admin/users/:id/block", post(block_user))
        .route("/admin/users/:id/unblock", post(unblock_user))
        .route_layer(middleware::from_fn_with_state(state, require_admin))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> AuthResult<Json<Profile>> {
    let user = services::get_user(state.store.as_ref(), current.user_id).await?;
    Ok(Json(Profile::from(user)))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AuthResult<Json<ProfileUpdatedResponse>> {
    let user = services::update_profile(state.store.as_ref(), current.user_id, payload).await?;
    Ok(Json(ProfileUpdatedResponse {
        message: "Profile updated successfully".into(),
        profile: Profile::from(user),
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> AuthResult<Json<UserListResponse>> {
    let users = services::list_users(state.store.as_ref()).await?;
    Ok(Json(UserListResponse {
        message: "Users fetched successfully".into(),
        users,
    }))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AuthResult<Json<UserResponse>> {
    let user = services::get_user(state.store.as_ref(), id).await?;
    Ok(Json(UserResponse {
        message: "User fetched successfully".into(),
        user,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> AuthResult<Json<UserResponse>> {
    let user = services::admin_update_user(state.store.as_ref(), id, payload).await?;
    Ok(Json(UserResponse {
        message: "User updated successfully".into(),
        user,
    }))
}

#[instrument(skip(state))]
pub async fn block_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AuthResult<Json<UserResponse>> {
    let user = services::set_blocked(state.store.as_ref(), id, true).await?;
    Ok(Json(UserResponse {
        message: "User blocked successfully".into(),
        user,
    }))
}

#[instrument(skip(state))]
pub async fn unblock_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AuthResult<Json<UserResponse>> {
    let user = services::set_blocked(state.store.as_ref(), id, false).await?;
    Ok(Json(UserResponse {
        message: "User unblocked successfully".into(),
        user,
    }))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AuthResult<Json<UserDeletedResponse>> {
    services::delete_user(state.store.as_ref(), id).await?;
    Ok(Json(UserDeletedResponse {
        message: "User deleted successfully".into(),
        user_id: id,
    }))
}
