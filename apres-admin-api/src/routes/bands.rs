/// Band endpoints; listing lives under `/api/states/:state/bands`

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{JsonBody, PathParam},
};
use apres_admin_shared::models::band::{Band, BandPayload};
use axum::{extract::State, http::StatusCode, Json};

pub async fn create_band(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BandPayload>,
) -> ApiResult<(StatusCode, Json<Band>)> {
    let band = state.hierarchy.create_band(payload).await?;
    Ok((StatusCode::CREATED, Json(band)))
}

pub async fn delete_band(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Band>> {
    Ok(Json(state.hierarchy.delete_band(id).await?))
}
