/// Venue endpoints; listing lives under `/api/towns/:town/venues`

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{JsonBody, PathParam},
};
use apres_admin_shared::models::venue::{Venue, VenuePayload};
use axum::{extract::State, http::StatusCode, Json};

pub async fn create_venue(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<VenuePayload>,
) -> ApiResult<(StatusCode, Json<Venue>)> {
    let venue = state.hierarchy.create_venue(payload).await?;
    Ok((StatusCode::CREATED, Json(venue)))
}

pub async fn delete_venue(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Venue>> {
    Ok(Json(state.hierarchy.delete_venue(id).await?))
}
