/// Calendar taxonomy used to tag events
///
/// CalendarType → EventCategory → EventSubcategory. The taxonomy is curated
/// directly in the database; the API only reads it.
///
/// ```sql
/// CREATE TABLE calendar_types (id SERIAL PRIMARY KEY, name VARCHAR(100) NOT NULL UNIQUE);
/// CREATE TABLE event_categories (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     calendar_type_id INTEGER NOT NULL REFERENCES calendar_types(id)
/// );
/// CREATE TABLE event_subcategories (
///     id SERIAL PRIMARY KEY,
///     name VARCHAR(100) NOT NULL,
///     category_id INTEGER NOT NULL REFERENCES event_categories(id)
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CalendarType {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventCategory {
    pub id: i32,
    pub name: String,
    pub calendar_type_id: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventSubcategory {
    pub id: i32,
    pub name: String,
    pub category_id: i32,
}

impl CalendarType {
    pub async fn list(pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CalendarType>("SELECT id, name FROM calendar_types ORDER BY name")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, CalendarType>("SELECT id, name FROM calendar_types WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}

impl EventCategory {
    pub async fn list_by_calendar_type(
        pool: &PgPool,
        calendar_type_id: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EventCategory>(
            "SELECT id, name, calendar_type_id FROM event_categories \
             WHERE calendar_type_id = $1 ORDER BY name, id",
        )
        .bind(calendar_type_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(pool: &PgPool, id: i32) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, EventCategory>(
            "SELECT id, name, calendar_type_id FROM event_categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}

impl EventSubcategory {
    pub async fn list_by_category(
        pool: &PgPool,
        category_id: i32,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, EventSubcategory>(
            "SELECT id, name, category_id FROM event_subcategories \
             WHERE category_id = $1 ORDER BY name, id",
        )
        .bind(category_id)
        .fetch_all(pool)
        .await
    }
}
