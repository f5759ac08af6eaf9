/// Town endpoints
///
/// `GET /api/towns` lists every town, or the towns of one state when
/// `state_id` or `state_name` is given. `/api/towns/:town/businesses` takes a
/// town ID or a town name; the other `:town` routes take an ID.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::{JsonBody, PathParam, QueryParams},
};
use apres_admin_shared::{
    models::{
        business::Business,
        town::{Town, TownPayload},
        venue::Venue,
    },
    services::hierarchy::Lookup,
};
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

/// Query parameters of the town listing
#[derive(Debug, Default, Deserialize)]
pub struct TownQuery {
    #[serde(alias = "stateId")]
    pub state_id: Option<i32>,

    #[serde(alias = "stateName")]
    pub state_name: Option<String>,
}

pub async fn list_towns(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<TownQuery>,
) -> ApiResult<Json<Vec<Town>>> {
    let scope = match (query.state_id, query.state_name) {
        (Some(id), _) => Some(Lookup::Id(id)),
        (None, Some(name)) if !name.trim().is_empty() => Some(Lookup::Name(name.trim().to_string())),
        _ => None,
    };

    let towns = match scope {
        Some(key) => state.hierarchy.list_towns(&key).await?,
        None => state.hierarchy.list_all_towns().await?,
    };
    Ok(Json(towns))
}

pub async fn get_town(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Town>> {
    Ok(Json(state.hierarchy.get_town(id).await?))
}

pub async fn create_town(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<TownPayload>,
) -> ApiResult<(StatusCode, Json<Town>)> {
    let town = state.hierarchy.create_town(payload).await?;
    Ok((StatusCode::CREATED, Json(town)))
}

/// Delete a town
///
/// Venues go with the town and businesses lose their town reference; a town
/// that still has events is refused with `409 Conflict`.
pub async fn delete_town(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Town>> {
    Ok(Json(state.hierarchy.delete_town(id).await?))
}

pub async fn list_venues(
    State(state): State<AppState>,
    PathParam(id): PathParam<i32>,
) -> ApiResult<Json<Vec<Venue>>> {
    Ok(Json(state.hierarchy.list_venues(id).await?))
}

/// Businesses of a town given by ID, or of every town carrying a name
///
/// `404 Not Found` for an unknown town, `[]` for a town without businesses.
pub async fn list_businesses(
    State(state): State<AppState>,
    PathParam(town): PathParam<String>,
) -> ApiResult<Json<Vec<Business>>> {
    let key = Lookup::parse(&town);
    Ok(Json(state.hierarchy.list_town_businesses(&key).await?))
}
