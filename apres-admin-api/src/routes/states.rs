/// State endpoints
///
/// `:state` is either a numeric ID or a state name.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{JsonBody, PathParam},
};
use apres_admin_shared::{
    models::{
        band::Band,
        state::{State as UsState, StatePayload},
        town::Town,
    },
    services::hierarchy::Lookup,
};
use axum::{extract::State, http::StatusCode, Json};

pub async fn list_states(State(state): State<AppState>) -> ApiResult<Json<Vec<UsState>>> {
    Ok(Json(state.hierarchy.list_states().await?))
}

pub async fn get_state(
    State(state): State<AppState>,
    PathParam(key): PathParam<String>,
) -> ApiResult<Json<UsState>> {
    Ok(Json(state.hierarchy.get_state(&Lookup::parse(&key)).await?))
}

pub async fn create_state(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<StatePayload>,
) -> ApiResult<(StatusCode, Json<UsState>)> {
    let created = state.hierarchy.create_state(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Delete a state
///
/// # Errors
///
/// - `404 Not Found`: No such state
/// - `409 Conflict`: The state still has towns (or another rejecting child)
pub async fn delete_state(
    State(state): State<AppState>,
    PathParam(key): PathParam<String>,
) -> ApiResult<Json<UsState>> {
    Ok(Json(state.hierarchy.delete_state(&Lookup::parse(&key)).await?))
}

pub async fn list_towns(
    State(state): State<AppState>,
    PathParam(key): PathParam<String>,
) -> ApiResult<Json<Vec<Town>>> {
    Ok(Json(state.hierarchy.list_towns(&Lookup::parse(&key)).await?))
}

pub async fn list_bands(
    State(state): State<AppState>,
    PathParam(key): PathParam<String>,
) -> ApiResult<Json<Vec<Band>>> {
    Ok(Json(state.hierarchy.list_bands(&Lookup::parse(&key)).await?))
}
