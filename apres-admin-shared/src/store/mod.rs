//! Storage seam for the directory
//!
//! [`DirectoryStore`] is everything the services need from persistence.
//! [`PgStore`] backs it with PostgreSQL; [`MemoryStore`] keeps everything in
//! process and is used by tests and local runs without a database.
//!
//! Multi-row writes (cascading deletes, an event with its category links) are
//! atomic in both implementations.

mod memory;
mod postgres;

use async_trait::async_trait;

use crate::models::{
    band::{Band, CreateBand},
    business::{Business, BusinessFilter, CreateBusiness, UpdateBusiness},
    calendar::{CalendarType, EventCategory, EventSubcategory},
    event::{CreateEvent, Event, EventFilter},
    state::{CreateState, State},
    town::{CreateTown, Town},
    user::{CreateUser, UpdateUser, User},
    venue::{CreateVenue, Venue},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failures, classified by what the caller can do about them
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write
    #[error("Duplicate value violates {constraint}")]
    Conflict { constraint: String },

    /// A foreign key rejected the write: either the referenced parent is
    /// missing (insert) or children still reference the row (delete)
    #[error("Foreign key violation on {constraint}")]
    ForeignKeyViolation { constraint: String },

    /// The database could not be reached; retrying later may succeed
    #[error("Database unavailable: {0}")]
    Unavailable(String),

    /// Anything else
    #[error("Database error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let constraint = db.constraint().unwrap_or_default().to_string();
                match db.code().as_deref() {
                    Some("23505") => StoreError::Conflict { constraint },
                    Some("23503") => StoreError::ForeignKeyViolation { constraint },
                    _ => StoreError::Internal(err.to_string()),
                }
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

/// Children that cannot exist without their parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedChildren {
    /// Refuse to delete the parent while children exist
    Reject,
    /// Delete the children with the parent
    Cascade,
}

/// Children whose reference to the parent is optional
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkedChildren {
    Reject,
    Cascade,
    /// Keep the children and clear their reference
    Detach,
}

/// What deleting a state or town does to each kind of child
///
/// When towns cascade from a state, each town's own rules apply to its
/// venues, businesses and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CascadeRules {
    pub state_towns: OwnedChildren,
    pub state_bands: OwnedChildren,
    pub town_venues: OwnedChildren,
    pub town_businesses: LinkedChildren,
    pub town_events: OwnedChildren,
}

impl Default for CascadeRules {
    fn default() -> Self {
        Self {
            state_towns: OwnedChildren::Reject,
            state_bands: OwnedChildren::Cascade,
            town_venues: OwnedChildren::Cascade,
            town_businesses: LinkedChildren::Detach,
            town_events: OwnedChildren::Reject,
        }
    }
}

/// Kind of child row that can block a delete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Towns,
    Bands,
    Venues,
    Businesses,
    Events,
}

impl ChildKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChildKind::Towns => "towns",
            ChildKind::Bands => "bands",
            ChildKind::Venues => "venues",
            ChildKind::Businesses => "businesses",
            ChildKind::Events => "events",
        }
    }
}

/// Result of deleting a parent row under [`CascadeRules`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome<T> {
    /// The row (and whatever cascaded) is gone
    Deleted(T),
    /// No row has this ID
    NotFound,
    /// A `Reject` rule stopped the delete; nothing was changed
    Blocked { children: ChildKind, count: i64 },
}

/// Persistence operations of the directory
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> StoreResult<()>;

    // Users
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn find_user(&self, id: i32) -> StoreResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, data: CreateUser) -> StoreResult<User>;
    async fn update_user(&self, id: i32, data: UpdateUser) -> StoreResult<Option<User>>;
    async fn delete_user(&self, id: i32) -> StoreResult<Option<User>>;

    // States
    async fn list_states(&self) -> StoreResult<Vec<State>>;
    async fn find_state(&self, id: i32) -> StoreResult<Option<State>>;
    async fn find_state_by_name(&self, name: &str) -> StoreResult<Option<State>>;
    async fn create_state(&self, data: CreateState) -> StoreResult<State>;
    async fn delete_state(&self, id: i32, rules: &CascadeRules) -> StoreResult<DeleteOutcome<State>>;

    // Towns
    /// All towns, or only those of one state
    async fn list_towns(&self, state_id: Option<i32>) -> StoreResult<Vec<Town>>;
    async fn find_town(&self, id: i32) -> StoreResult<Option<Town>>;
    /// Case-insensitive; the same name may exist in several states
    async fn find_towns_by_name(&self, name: &str) -> StoreResult<Vec<Town>>;
    async fn create_town(&self, data: CreateTown) -> StoreResult<Town>;
    async fn delete_town(&self, id: i32, rules: &CascadeRules) -> StoreResult<DeleteOutcome<Town>>;

    // Venues
    async fn list_venues(&self, town_id: i32) -> StoreResult<Vec<Venue>>;
    async fn create_venue(&self, data: CreateVenue) -> StoreResult<Venue>;
    async fn delete_venue(&self, id: i32) -> StoreResult<Option<Venue>>;

    // Businesses
    async fn list_businesses(&self, filter: &BusinessFilter) -> StoreResult<Vec<Business>>;
    async fn find_business(&self, id: i32) -> StoreResult<Option<Business>>;
    async fn create_business(&self, data: CreateBusiness) -> StoreResult<Business>;
    async fn update_business(&self, id: i32, data: UpdateBusiness) -> StoreResult<Option<Business>>;
    async fn delete_business(&self, id: i32) -> StoreResult<Option<Business>>;

    // Bands
    async fn list_bands(&self, state_id: i32) -> StoreResult<Vec<Band>>;
    async fn create_band(&self, data: CreateBand) -> StoreResult<Band>;
    async fn delete_band(&self, id: i32) -> StoreResult<Option<Band>>;

    // Calendar taxonomy
    async fn list_calendar_types(&self) -> StoreResult<Vec<CalendarType>>;
    async fn find_calendar_type(&self, id: i32) -> StoreResult<Option<CalendarType>>;
    async fn list_categories(&self, calendar_type_id: i32) -> StoreResult<Vec<EventCategory>>;
    async fn find_category(&self, id: i32) -> StoreResult<Option<EventCategory>>;
    async fn list_subcategories(&self, category_id: i32) -> StoreResult<Vec<EventSubcategory>>;

    // Events
    async fn list_events(&self, filter: EventFilter) -> StoreResult<Vec<Event>>;
    async fn find_event(&self, id: i32) -> StoreResult<Option<Event>>;
    /// Inserts the event and every category link, or nothing at all
    async fn create_event(&self, data: CreateEvent) -> StoreResult<Event>;
    async fn delete_event(&self, id: i32) -> StoreResult<Option<Event>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = CascadeRules::default();

        assert_eq!(rules.state_towns, OwnedChildren::Reject);
        assert_eq!(rules.state_bands, OwnedChildren::Cascade);
        assert_eq!(rules.town_venues, OwnedChildren::Cascade);
        assert_eq!(rules.town_businesses, LinkedChildren::Detach);
        assert_eq!(rules.town_events, OwnedChildren::Reject);
    }

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(StoreError::from(sqlx::Error::PoolClosed).is_retryable());
        assert!(!StoreError::from(sqlx::Error::RowNotFound).is_retryable());
        assert!(!StoreError::Conflict { constraint: "users_email_key".into() }.is_retryable());
    }
}
