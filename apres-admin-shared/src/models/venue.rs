/// Venue model
///
/// ```sql
/// CREATE TABLE venues (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(150) NOT NULL,
///     town_id INTEGER NOT NULL REFERENCES towns(id)
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use validator::Validate;

/// A venue hosting après-ski events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Venue {
    pub id: i32,
    pub name: String,
    pub town_id: i32,
}

/// Request payload for creating a venue
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct VenuePayload {
    #[validate(
        required(message = "name is required"),
        length(max = 150, message = "name must be at most 150 characters")
    )]
    pub name: Option<String>,

    #[serde(default, alias = "townId", deserialize_with = "crate::models::lenient_id")]
    #[validate(required(message = "townId is required"))]
    pub town_id: Option<i32>,
}

/// Validated input for inserting a venue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVenue {
    pub name: String,
    pub town_id: i32,
}

impl Venue {
    pub async fn create(pool: &PgPool, data: CreateVenue) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Venue>(
            "INSERT INTO venues (name, town_id) VALUES ($1, $2) RETURNING id, name, town_id",
        )
        .bind(data.name)
        .bind(data.town_id)
        .fetch_one(pool)
        .await
    }

    pub async fn list_by_town(pool: &PgPool, town_id: i32) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Venue>(
            "SELECT id, name, town_id FROM venues WHERE town_id = $1 ORDER BY name, id",
        )
        .bind(town_id)
        .fetch_all(pool)
        .await
    }

    pub async fn delete(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Venue>("DELETE FROM venues WHERE id = $1 RETURNING id, name, town_id")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn count_by_towns<'e>(
        executor: impl PgExecutor<'e>,
        town_ids: &[i32],
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM venues WHERE town_id = ANY($1)")
                .bind(town_ids)
                .fetch_one(executor)
                .await?;

        Ok(count)
    }

    pub async fn delete_by_towns<'e>(
        executor: impl PgExecutor<'e>,
        town_ids: &[i32],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM venues WHERE town_id = ANY($1)")
            .bind(town_ids)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}
