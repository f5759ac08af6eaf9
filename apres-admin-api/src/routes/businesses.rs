/// Business endpoints
///
/// `GET /api/businesses` accepts `town_id`, `town_name`, `city_id` and
/// `classification`; every filter given must match.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{JsonBody, PathParam, QueryParams},
};
use apres_admin_shared::{
    models::business::{Business, BusinessPayload},
    services::hierarchy::BusinessQuery,
};
use axum::{extract::State, http::StatusCode, Json};

pub async fn list_businesses(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<BusinessQuery>,
) -> ApiResult<Json<Vec<Business>>> {
    Ok(Json(state.hierarchy.list_businesses(query).await?))
}

pub async fn get_business(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Business>> {
    Ok(Json(state.hierarchy.get_business(id).await?))
}

pub async fn create_business(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<BusinessPayload>,
) -> ApiResult<(StatusCode, Json<Business>)> {
    let business = state.hierarchy.create_business(payload).await?;
    Ok((StatusCode::CREATED, Json(business)))
}

/// Overwrite a business
///
/// Omitting `townId` keeps the business in its current town.
pub async fn update_business(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
    JsonBody(payload): JsonBody<BusinessPayload>,
) -> ApiResult<Json<Business>> {
    Ok(Json(state.hierarchy.update_business(id, payload).await?))
}

pub async fn delete_business(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Business>> {
    Ok(Json(state.hierarchy.delete_business(id).await?))
}
