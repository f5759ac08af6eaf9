/// Town model
///
/// Towns belong to exactly one state and own venues, businesses and events.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE towns (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     state_id INTEGER NOT NULL REFERENCES states(id)
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use validator::Validate;

/// A ski town
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Town {
    /// Unique town ID
    pub id: i32,

    /// Display name (not unique across states)
    pub name: String,

    /// Owning state
    pub state_id: i32,
}

/// Request payload for creating a town
///
/// Accepts both `stateId` (admin frontend) and `state_id`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct TownPayload {
    #[validate(
        required(message = "name is required"),
        length(max = 100, message = "name must be at most 100 characters")
    )]
    pub name: Option<String>,

    #[serde(default, alias = "stateId", deserialize_with = "crate::models::lenient_id")]
    #[validate(required(message = "stateId is required"))]
    pub state_id: Option<i32>,
}

/// Validated input for inserting a town
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTown {
    pub name: String,
    pub state_id: i32,
}

impl Town {
    pub async fn create(pool: &PgPool, data: CreateTown) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Town>(
            "INSERT INTO towns (name, state_id) VALUES ($1, $2) RETURNING id, name, state_id",
        )
        .bind(data.name)
        .bind(data.state_id)
        .fetch_one(pool)
        .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Town>("SELECT id, name, state_id FROM towns ORDER BY name, id")
            .fetch_all(pool)
            .await
    }

    pub async fn list_by_state(pool: &PgPool, state_id: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Town>(
            "SELECT id, name, state_id FROM towns WHERE state_id = $1 ORDER BY name, id",
        )
        .bind(state_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Town>("SELECT id, name, state_id FROM towns WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds every town carrying this name (case-insensitive), across all states
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Town>(
            "SELECT id, name, state_id FROM towns WHERE LOWER(name) = LOWER($1) ORDER BY id",
        )
        .bind(name)
        .fetch_all(pool)
        .await
    }

    /// IDs of the towns of a state, locked until the transaction ends
    pub async fn lock_ids_by_state<'e>(
        executor: impl PgExecutor<'e>,
        state_id: i32,
    ) -> Result<Vec<i32>, sqlx::Error> {
        sqlx::query_scalar("SELECT id FROM towns WHERE state_id = $1 ORDER BY id FOR UPDATE")
            .bind(state_id)
            .fetch_all(executor)
            .await
    }

    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Town>("DELETE FROM towns WHERE id = $1 RETURNING id, name, state_id")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Deletes every town of a state, returning how many were removed
    pub async fn delete_by_state<'e>(
        executor: impl PgExecutor<'e>,
        state_id: i32,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM towns WHERE state_id = $1")
            .bind(state_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
