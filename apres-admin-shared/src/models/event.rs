/// Event model
///
/// Events happen in a town, optionally at a venue, and are tagged with any
/// number of event categories through `event_category_links`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE events (
///     id SERIAL PRIMARY KEY,
///     title VARCHAR(200) NOT NULL,
///     town_id INTEGER NOT NULL REFERENCES towns(id),
///     venue_id INTEGER REFERENCES venues(id) ON DELETE SET NULL,
///     calendar_type_id INTEGER REFERENCES calendar_types(id),
///     start_date DATE NOT NULL,
///     start_time TIME,
///     end_date DATE,
///     end_time TIME,
///     repeat_type VARCHAR(50),
///     description TEXT,
///     is_featured BOOLEAN NOT NULL DEFAULT FALSE,
///     cost VARCHAR(100),
///     ticket_link VARCHAR(255)
/// );
///
/// CREATE TABLE event_category_links (
///     event_id INTEGER NOT NULL REFERENCES events(id) ON DELETE CASCADE,
///     category_id INTEGER NOT NULL REFERENCES event_categories(id),
///     PRIMARY KEY (event_id, category_id)
/// );
/// ```

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i32,
    pub title: String,
    pub town_id: i32,
    pub venue_id: Option<i32>,
    pub calendar_type_id: Option<i32>,
    pub start_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub repeat_type: Option<String>,
    pub description: Option<String>,
    pub is_featured: bool,
    pub cost: Option<String>,
    pub ticket_link: Option<String>,

    /// Linked event category IDs, ascending
    pub category_ids: Vec<i32>,
}

fn validate_event_dates(payload: &EventPayload) -> Result<(), ValidationError> {
    match (payload.start_date, payload.end_date) {
        (Some(start), Some(end)) if end < start => {
            let mut err = ValidationError::new("end_date");
            err.message = Some("end_date must not be before start_date".into());
            Err(err)
        }
        _ => Ok(()),
    }
}

/// Request payload for creating an event
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[validate(schema(function = "validate_event_dates"))]
pub struct EventPayload {
    #[serde(alias = "event_title", alias = "eventTitle")]
    #[validate(
        required(message = "title is required"),
        length(min = 1, max = 200, message = "title must be 1-200 characters")
    )]
    pub title: Option<String>,

    #[serde(default, alias = "townId", alias = "ski_town_id", deserialize_with = "crate::models::lenient_id")]
    #[validate(required(message = "townId is required"))]
    pub town_id: Option<i32>,

    #[serde(default, alias = "venueId", deserialize_with = "crate::models::lenient_id")]
    pub venue_id: Option<i32>,

    #[serde(default, alias = "calendarTypeId", deserialize_with = "crate::models::lenient_id")]
    pub calendar_type_id: Option<i32>,

    #[serde(alias = "startDate")]
    #[validate(required(message = "start_date is required"))]
    pub start_date: Option<NaiveDate>,

    #[serde(alias = "startTime")]
    pub start_time: Option<NaiveTime>,

    #[serde(alias = "endDate")]
    pub end_date: Option<NaiveDate>,

    #[serde(alias = "endTime")]
    pub end_time: Option<NaiveTime>,

    #[serde(alias = "repeatType")]
    pub repeat_type: Option<String>,

    pub description: Option<String>,

    #[serde(default, alias = "isFeatured")]
    pub is_featured: bool,

    pub cost: Option<String>,

    #[serde(alias = "ticketLink")]
    #[validate(url(message = "ticket_link must be a valid URL"))]
    pub ticket_link: Option<String>,

    #[serde(default)]
    pub categories: Vec<i32>,
}

/// Validated input for inserting an event and its category links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEvent {
    pub title: String,
    pub town_id: i32,
    pub venue_id: Option<i32>,
    pub calendar_type_id: Option<i32>,
    pub start_date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub repeat_type: Option<String>,
    pub description: Option<String>,
    pub is_featured: bool,
    pub cost: Option<String>,
    pub ticket_link: Option<String>,

    /// Deduplicated category IDs
    pub categories: Vec<i32>,
}

impl CreateEvent {
    pub fn into_event(self, id: i32) -> Event {
        Event {
            id,
            title: self.title,
            town_id: self.town_id,
            venue_id: self.venue_id,
            calendar_type_id: self.calendar_type_id,
            start_date: self.start_date,
            start_time: self.start_time,
            end_date: self.end_date,
            end_time: self.end_time,
            repeat_type: self.repeat_type,
            description: self.description,
            is_featured: self.is_featured,
            cost: self.cost,
            ticket_link: self.ticket_link,
            category_ids: self.categories,
        }
    }
}

/// Optional filters for event listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct EventFilter {
    pub town_id: Option<i32>,
    pub calendar_type_id: Option<i32>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.town_id.map_or(true, |id| event.town_id == id)
            && self
                .calendar_type_id
                .map_or(true, |id| event.calendar_type_id == Some(id))
    }
}

const EVENT_COLUMNS: &str = "e.id, e.title, e.town_id, e.venue_id, e.calendar_type_id, \
     e.start_date, e.start_time, e.end_date, e.end_time, e.repeat_type, e.description, \
     e.is_featured, e.cost, e.ticket_link, \
     ARRAY(SELECT l.category_id FROM event_category_links l \
           WHERE l.event_id = e.id ORDER BY l.category_id) AS category_ids";

impl Event {
    /// Inserts the event row only; links are added with [`Event::link_category`]
    ///
    /// Returns the new event ID.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        data: &CreateEvent,
    ) -> Result<i32, sqlx::Error> {
        let (id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO events (
                title, town_id, venue_id, calendar_type_id, start_date, start_time,
                end_date, end_time, repeat_type, description, is_featured, cost, ticket_link
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(&data.title)
        .bind(data.town_id)
        .bind(data.venue_id)
        .bind(data.calendar_type_id)
        .bind(data.start_date)
        .bind(data.start_time)
        .bind(data.end_date)
        .bind(data.end_time)
        .bind(&data.repeat_type)
        .bind(&data.description)
        .bind(data.is_featured)
        .bind(&data.cost)
        .bind(&data.ticket_link)
        .fetch_one(executor)
        .await?;

        Ok(id)
    }

    pub async fn link_category<'e>(
        executor: impl PgExecutor<'e>,
        event_id: i32,
        category_id: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO event_category_links (event_id, category_id) VALUES ($1, $2)")
            .bind(event_id)
            .bind(category_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn find_by_id<'e>(
        executor: impl PgExecutor<'e>,
        id: i32,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    pub async fn list(pool: &PgPool, filter: EventFilter) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Event>(&format!(
            r#"
            SELECT {EVENT_COLUMNS} FROM events e
            WHERE ($1::INTEGER IS NULL OR e.town_id = $1)
              AND ($2::INTEGER IS NULL OR e.calendar_type_id = $2)
            ORDER BY e.start_date, e.start_time NULLS FIRST, e.id
            "#
        ))
        .bind(filter.town_id)
        .bind(filter.calendar_type_id)
        .fetch_all(pool)
        .await
    }

    /// Deletes an event; its category links go with it
    pub async fn delete<'e>(executor: impl PgExecutor<'e>, id: i32) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn count_by_towns<'e>(
        executor: impl PgExecutor<'e>,
        town_ids: &[i32],
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM events WHERE town_id = ANY($1)")
                .bind(town_ids)
                .fetch_one(executor)
                .await?;

        Ok(count)
    }

    pub async fn delete_by_towns<'e>(
        executor: impl PgExecutor<'e>,
        town_ids: &[i32],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE town_id = ANY($1)")
            .bind(town_ids)
            .execute(executor)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_accepts_original_field_names() {
        let payload: EventPayload = serde_json::from_str(
            r#"{
                "event_title": "Torchlight Parade",
                "ski_town_id": 2,
                "start_date": "2026-12-31",
                "start_time": "18:30",
                "categories": [1, 3]
            }"#,
        )
        .unwrap();

        assert_eq!(payload.title.as_deref(), Some("Torchlight Parade"));
        assert_eq!(payload.town_id, Some(2));
        assert_eq!(payload.start_time, NaiveTime::from_hms_opt(18, 30, 0));
        assert_eq!(payload.categories, vec![1, 3]);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_end_before_start_rejected() {
        let payload = EventPayload {
            title: Some("Pond Skim".to_string()),
            town_id: Some(1),
            start_date: NaiveDate::from_ymd_opt(2026, 4, 10),
            end_date: NaiveDate::from_ymd_opt(2026, 4, 9),
            ..Default::default()
        };

        assert!(payload.validate().is_err());
    }

    #[test]
    fn test_missing_title_rejected() {
        let payload = EventPayload {
            town_id: Some(1),
            start_date: NaiveDate::from_ymd_opt(2026, 4, 10),
            ..Default::default()
        };

        let err = payload.validate().unwrap_err();
        assert!(err.field_errors().contains_key("title"));
    }

    #[test]
    fn test_filter() {
        let event = CreateEvent {
            title: "Pond Skim".to_string(),
            town_id: 1,
            venue_id: None,
            calendar_type_id: Some(2),
            start_date: NaiveDate::from_ymd_opt(2026, 4, 10).unwrap(),
            start_time: None,
            end_date: None,
            end_time: None,
            repeat_type: None,
            description: None,
            is_featured: false,
            cost: None,
            ticket_link: None,
            categories: vec![],
        }
        .into_event(7);

        assert!(EventFilter::default().matches(&event));
        assert!(EventFilter { town_id: Some(1), calendar_type_id: Some(2) }.matches(&event));
        assert!(!EventFilter { town_id: Some(2), calendar_type_id: None }.matches(&event));
        assert!(!EventFilter { town_id: None, calendar_type_id: Some(3) }.matches(&event));
    }
}
