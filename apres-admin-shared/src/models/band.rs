/// Band model
///
/// Bands tour a whole state rather than a single town.
///
/// ```sql
/// CREATE TABLE bands (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(150) NOT NULL,
///     state_id INTEGER NOT NULL REFERENCES states(id)
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Band {
    pub id: i32,
    pub name: String,
    pub state_id: i32,
}

/// Request payload for creating a band
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BandPayload {
    #[validate(
        required(message = "name is required"),
        length(max = 150, message = "name must be at most 150 characters")
    )]
    pub name: Option<String>,

    #[serde(default, alias = "stateId", deserialize_with = "crate::models::lenient_id")]
    #[validate(required(message = "stateId is required"))]
    pub state_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBand {
    pub name: String,
    pub state_id: i32,
}

impl Band {
    pub async fn create(pool: &PgPool, data: CreateBand) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Band>(
            "INSERT INTO bands (name, state_id) VALUES ($1, $2) RETURNING id, name, state_id",
        )
        .bind(data.name)
        .bind(data.state_id)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_state(pool: &PgPool, state_id: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Band>(
            "SELECT id, name, state_id FROM bands WHERE state_id = $1 ORDER BY name, id",
        )
        .bind(state_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Band>("DELETE FROM bands WHERE id = $1 RETURNING id, name, state_id")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count_by_state<'e>(
        executor: impl PgExecutor<'e>,
        state_id: i32,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM bands WHERE state_id = $1")
            .bind(state_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    pub async fn delete_by_state<'e>(
        executor: impl PgExecutor<'e>,
        state_id: i32,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bands WHERE state_id = $1")
            .bind(state_id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
