/// Calendar taxonomy endpoints (read-only)

use crate::{app::AppState, error::ApiResult, extract::PathParam};
use apres_admin_shared::models::calendar::{CalendarType, EventCategory, EventSubcategory};
use axum::{extract::State, Json};

pub async fn list_calendar_types(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<CalendarType>>> {
    Ok(Json(state.hierarchy.list_calendar_types().await?))
}

pub async fn list_categories(
    State(state): State<AppState>,
    PathParam(calendar_type_id): PathParam<i32>,
) -> ApiResult<Json<Vec<EventCategory>>> {
    Ok(Json(state.hierarchy.list_categories(calendar_type_id).await?))
}

pub async fn list_subcategories(
    State(state): State<AppState>,
    PathParam(category_id): PathParam<i32>,
) -> ApiResult<Json<Vec<EventSubcategory>>> {
    Ok(Json(state.hierarchy.list_subcategories(category_id).await?))
}
