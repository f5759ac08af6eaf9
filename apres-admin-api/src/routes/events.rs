/// Event endpoints
///
/// # Endpoint
///
/// ```text
/// POST /api/events
/// Content-Type: application/json
///
/// {
///   "event_title": "Torchlight Parade",
///   "ski_town_id": 3,
///   "start_date": "2026-12-31",
///   "start_time": "18:30:00",
///   "categories": [4, 7]
/// }
/// ```
///
/// The event and its category links are stored together; an unknown category
/// rejects the whole request with `400 Bad Request`.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{JsonBody, PathParam, QueryParams},
};
use apres_admin_shared::models::event::{Event, EventFilter, EventPayload};
use axum::{extract::State, http::StatusCode, Json};

pub async fn list_events(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<EventFilter>,
) -> ApiResult<Json<Vec<Event>>> {
    Ok(Json(state.hierarchy.list_events(filter).await?))
}

pub async fn get_event(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.hierarchy.get_event(id).await?))
}

pub async fn create_event(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<EventPayload>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    let event = state.hierarchy.create_event(payload).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn delete_event(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Event>> {
    Ok(Json(state.hierarchy.delete_event(id).await?))
}
