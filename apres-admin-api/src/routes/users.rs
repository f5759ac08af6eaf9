/// User administration endpoints
///
/// Listing users is reserved for superusers by default; the remaining routes
/// follow whatever the role policy says for their action. Changes record the
/// acting user when the route was authenticated.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{JsonBody, PathParam},
};
use apres_admin_shared::{
    auth::jwt::Identity, models::user::User, services::accounts::UserPayload,
};
use axum::{extract::State, http::StatusCode, Json};

pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.accounts.list_users().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.accounts.get_user(id).await?))
}

/// Add a user; the password is optional
pub async fn create_user(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<UserPayload>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.accounts.create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Replace profile fields and role
pub async fn update_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    actor: Option<Identity>,
    JsonBody(payload): JsonBody<UserPayload>,
) -> ApiResult<Json<User>> {
    let user = state.accounts.update_user(id, payload).await?;
    tracing::info!(
        user_id = user.id,
        role = %user.role,
        actor = ?actor.map(|a| a.user_id),
        "User updated"
    );
    Ok(Json(user))
}

/// Delete a user, returning the removed row
pub async fn delete_user(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    actor: Option<Identity>,
) -> ApiResult<Json<User>> {
    let user = state.accounts.delete_user(id).await?;
    tracing::info!(user_id = user.id, actor = ?actor.map(|a| a.user_id), "User deleted");
    Ok(Json(user))
}
