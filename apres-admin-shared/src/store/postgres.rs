//! PostgreSQL-backed store
//!
//! Single-statement operations go straight to the model queries. Cascading
//! deletes and event creation run in one transaction each; returning early
//! with `?` drops the transaction, which rolls it back.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info};

use super::{
    CascadeRules, ChildKind, DeleteOutcome, DirectoryStore, LinkedChildren, OwnedChildren,
    StoreError, StoreResult,
};
use crate::db::pool::health_check;
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

/// [`DirectoryStore`] over a PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Applies the town-level rules to every child of `town_ids`
///
/// All `Reject` checks run before anything is modified, so a blocked delete
/// leaves the transaction untouched.
async fn remove_town_children(
    conn: &mut PgConnection,
    town_ids: &[i32],
    rules: &CascadeRules,
) -> Result<Option<(ChildKind, i64)>, sqlx::Error> {
    if town_ids.is_empty() {
        return Ok(None);
    }

    let venues = Venue::count_by_towns(&mut *conn, town_ids).await?;
    if venues > 0 && rules.town_venues == OwnedChildren::Reject {
        return Ok(Some((ChildKind::Venues, venues)));
    }

    let businesses = Business::count_by_towns(&mut *conn, town_ids).await?;
    if businesses > 0 && rules.town_businesses == LinkedChildren::Reject {
        return Ok(Some((ChildKind::Businesses, businesses)));
    }

    let events = Event::count_by_towns(&mut *conn, town_ids).await?;
    if events > 0 && rules.town_events == OwnedChildren::Reject {
        return Ok(Some((ChildKind::Events, events)));
    }

    if events > 0 {
        let removed = Event::delete_by_towns(&mut *conn, town_ids).await?;
        debug!(removed, "Cascaded events");
    }

    if venues > 0 {
        let removed = Venue::delete_by_towns(&mut *conn, town_ids).await?;
        debug!(removed, "Cascaded venues");
    }

    if businesses > 0 {
        let affected = match rules.town_businesses {
            LinkedChildren::Detach => Business::detach_from_towns(&mut *conn, town_ids).await?,
            _ => Business::delete_by_towns(&mut *conn, town_ids).await?,
        };
        debug!(affected, policy = ?rules.town_businesses, "Released businesses");
    }

    Ok(None)
}

#[async_trait]
impl DirectoryStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        health_check(&self.pool).await.map_err(StoreError::from)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(User::list(&self.pool).await?)
    }

    async fn find_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(User::find_by_username(&self.pool, username).await?)
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        Ok(User::create(&self.pool, data).await?)
    }

    async fn update_user(&self, id: i32, data: UpdateUser) -> StoreResult<Option<User>> {
        Ok(User::update(&self.pool, id, data).await?)
    }

    async fn delete_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(User::delete(&self.pool, id).await?)
    }

    async fn list_states(&self) -> StoreResult<Vec<State>> {
        Ok(State::list(&self.pool).await?)
    }

    async fn find_state(&self, id: i32) -> StoreResult<Option<State>> {
        Ok(State::find_by_id(&self.pool, id).await?)
    }

    async fn find_state_by_name(&self, name: &str) -> StoreResult<Option<State>> {
        Ok(State::find_by_name(&self.pool, name).await?)
    }

    async fn create_state(&self, data: CreateState) -> StoreResult<State> {
        Ok(State::create(&self.pool, data).await?)
    }

    async fn delete_state(&self, id: i32, rules: &CascadeRules) -> StoreResult<DeleteOutcome<State>> {
        let mut tx = self.pool.begin().await?;

        if State::find_by_id(&mut *tx, id).await?.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        let town_ids = Town::lock_ids_by_state(&mut *tx, id).await?;
        if !town_ids.is_empty() && rules.state_towns == OwnedChildren::Reject {
            return Ok(DeleteOutcome::Blocked {
                children: ChildKind::Towns,
                count: town_ids.len() as i64,
            });
        }

        let bands = Band::count_by_state(&mut *tx, id).await?;
        if bands > 0 && rules.state_bands == OwnedChildren::Reject {
            return Ok(DeleteOutcome::Blocked {
                children: ChildKind::Bands,
                count: bands,
            });
        }

        if let Some((children, count)) = remove_town_children(&mut tx, &town_ids, rules).await? {
            return Ok(DeleteOutcome::Blocked { children, count });
        }

        let towns = Town::delete_by_state(&mut *tx, id).await?;
        let bands = Band::delete_by_state(&mut *tx, id).await?;

        let state = State::delete(&mut *tx, id)
            .await?
            .ok_or_else(|| StoreError::Internal(format!("state {id} vanished during delete")))?;

        tx.commit().await?;

        info!(state_id = id, towns, bands, "Deleted state");
        Ok(DeleteOutcome::Deleted(state))
    }

    async fn list_towns(&self, state_id: Option<i32>) -> StoreResult<Vec<Town>> {
        let towns = match state_id {
            Some(state_id) => Town::list_by_state(&self.pool, state_id).await?,
            None => Town::list(&self.pool).await?,
        };
        Ok(towns)
    }

    async fn find_town(&self, id: i32) -> StoreResult<Option<Town>> {
        Ok(Town::find_by_id(&self.pool, id).await?)
    }

    async fn find_towns_by_name(&self, name: &str) -> StoreResult<Vec<Town>> {
        Ok(Town::find_by_name(&self.pool, name).await?)
    }

    async fn create_town(&self, data: CreateTown) -> StoreResult<Town> {
        Ok(Town::create(&self.pool, data).await?)
    }

    async fn delete_town(&self, id: i32, rules: &CascadeRules) -> StoreResult<DeleteOutcome<Town>> {
        let mut tx = self.pool.begin().await?;

        if Town::find_by_id(&mut *tx, id).await?.is_none() {
            return Ok(DeleteOutcome::NotFound);
        }

        if let Some((children, count)) = remove_town_children(&mut tx, &[id], rules).await? {
            return Ok(DeleteOutcome::Blocked { children, count });
        }

        let town = Town::delete(&mut *tx, id)
            .await?
            .ok_or_else(|| StoreError::Internal(format!("town {id} vanished during delete")))?;

        tx.commit().await?;

        info!(town_id = id, "Deleted town");
        Ok(DeleteOutcome::Deleted(town))
    }

    async fn list_venues(&self, town_id: i32) -> StoreResult<Vec<Venue>> {
        Ok(Venue::list_by_town(&self.pool, town_id).await?)
    }

    async fn create_venue(&self, data: CreateVenue) -> StoreResult<Venue> {
        Ok(Venue::create(&self.pool, data).await?)
    }

    async fn delete_venue(&self, id: i32) -> StoreResult<Option<Venue>> {
        Ok(Venue::delete(&self.pool, id).await?)
    }

    async fn list_businesses(&self, filter: &BusinessFilter) -> StoreResult<Vec<Business>> {
        Ok(Business::list(&self.pool, filter).await?)
    }

    async fn find_business(&self, id: i32) -> StoreResult<Option<Business>> {
        Ok(Business::find_by_id(&self.pool, id).await?)
    }

    async fn create_business(&self, data: CreateBusiness) -> StoreResult<Business> {
        Ok(Business::create(&self.pool, data).await?)
    }

    async fn update_business(&self, id: i32, data: UpdateBusiness) -> StoreResult<Option<Business>> {
        Ok(Business::update(&self.pool, id, data).await?)
    }

    async fn delete_business(&self, id: i32) -> StoreResult<Option<Business>> {
        Ok(Business::delete(&self.pool, id).await?)
    }

    async fn list_bands(&self, state_id: i32) -> StoreResult<Vec<Band>> {
        Ok(Band::list_by_state(&self.pool, state_id).await?)
    }

    async fn create_band(&self, data: CreateBand) -> StoreResult<Band> {
        Ok(Band::create(&self.pool, data).await?)
    }

    async fn delete_band(&self, id: i32) -> StoreResult<Option<Band>> {
        Ok(Band::delete(&self.pool, id).await?)
    }

    async fn list_calendar_types(&self) -> StoreResult<Vec<CalendarType>> {
        Ok(CalendarType::list(&self.pool).await?)
    }

    async fn find_calendar_type(&self, id: i32) -> StoreResult<Option<CalendarType>> {
        Ok(CalendarType::find_by_id(&self.pool, id).await?)
    }

    async fn list_categories(&self, calendar_type_id: i32) -> StoreResult<Vec<EventCategory>> {
        Ok(EventCategory::list_by_calendar_type(&self.pool, calendar_type_id).await?)
    }

    async fn find_category(&self, id: i32) -> StoreResult<Option<EventCategory>> {
        Ok(EventCategory::find_by_id(&self.pool, id).await?)
    }

    async fn list_subcategories(&self, category_id: i32) -> StoreResult<Vec<EventSubcategory>> {
        Ok(EventSubcategory::list_by_category(&self.pool, category_id).await?)
    }

    async fn list_events(&self, filter: EventFilter) -> StoreResult<Vec<Event>> {
        Ok(Event::list(&self.pool, filter).await?)
    }

    async fn find_event(&self, id: i32) -> StoreResult<Option<Event>> {
        Ok(Event::find_by_id(&self.pool, id).await?)
    }

    async fn create_event(&self, data: CreateEvent) -> StoreResult<Event> {
        let mut tx = self.pool.begin().await?;

        let id = Event::insert(&mut *tx, &data).await?;
        for category_id in &data.categories {
            Event::link_category(&mut *tx, id, *category_id).await?;
        }

        let event = Event::find_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| StoreError::Internal(format!("event {id} missing after insert")))?;

        tx.commit().await?;

        info!(event_id = id, categories = data.categories.len(), "Created event");
        Ok(event)
    }

    async fn delete_event(&self, id: i32) -> StoreResult<Option<Event>> {
        let mut tx = self.pool.begin().await?;

        let Some(event) = Event::find_by_id(&mut *tx, id).await? else {
            return Ok(None);
        };
        Event::delete(&mut *tx, id).await?;

        tx.commit().await?;
        Ok(Some(event))
    }
}
