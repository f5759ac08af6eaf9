/// State model, the root of the geographic hierarchy
///
/// # Schema
///
/// ```sql
/// CREATE TABLE states (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL UNIQUE
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use validator::Validate;

/// A US state (or any top-level region)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct State {
    /// Unique state ID
    pub id: i32,

    /// Display name, unique
    pub name: String,
}

/// Request payload for creating a state
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct StatePayload {
    #[validate(
        required(message = "name is required"),
        length(max = 100, message = "name must be at most 100 characters")
    )]
    pub name: Option<String>,
}

/// Validated input for inserting a state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateState {
    pub name: String,
}

impl State {
    /// Creates a new state
    pub async fn create(pool: &PgPool, data: CreateState) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, State>("INSERT INTO states (name) VALUES ($1) RETURNING id, name")
            .bind(data.name)
            .fetch_one(pool)
            .await
    }

    /// Lists all states alphabetically
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, State>("SELECT id, name FROM states ORDER BY name")
            .fetch_all(pool)
            .await
    }

    /// Finds a state by ID
    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, State>("SELECT id, name FROM states WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a state by name (case-insensitive)
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, State>("SELECT id, name FROM states WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    /// Deletes a state, returning the removed row
    ///
    /// Callers are responsible for dealing with towns and bands first; the
    /// foreign keys reject the delete otherwise.
    pub async fn delete<'e>(
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, State>("DELETE FROM states WHERE id = $1 RETURNING id, name")
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}
