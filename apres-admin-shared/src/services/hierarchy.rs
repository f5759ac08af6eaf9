//! Directory of states, towns, venues, businesses and bands, plus the event
//! calendar hung off it
//!
//! Lookups scoped to a parent distinguish an unknown parent (`NotFound`) from
//! a parent without children (empty list). Creates validate the payload and
//! check that the parent exists before touching the store. Deletes of states
//! and towns follow the [`CascadeRules`] the service was built with.

use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::{field_errors, non_blank, optional_text, required, FieldError};
use crate::models::{
    band::{Band, BandPayload, CreateBand},
    business::{
        Business, BusinessFilter, BusinessPayload, CreateBusiness, UpdateBusiness,
        VALID_CLASSIFICATIONS,
    },
    calendar::{CalendarType, EventCategory, EventSubcategory},
    event::{CreateEvent, Event, EventFilter, EventPayload},
    state::{CreateState, State, StatePayload},
    town::{CreateTown, Town, TownPayload},
    venue::{CreateVenue, Venue, VenuePayload},
};
use crate::store::{CascadeRules, ChildKind, DeleteOutcome, DirectoryStore, StoreError};

pub type HierarchyResult<T> = Result<T, HierarchyError>;

/// Hierarchy service errors
#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
    /// Payload or query failed validation, including a missing parent
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{resource} {key} not found")]
    NotFound { resource: &'static str, key: String },

    /// A `Reject` cascade rule kept the row alive
    #[error("{resource} {id} still has {count} {}", children.as_str())]
    HasChildren {
        resource: &'static str,
        id: i32,
        children: ChildKind,
        count: i64,
    },

    /// Uniqueness or referential conflict reported by the store
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl HierarchyError {
    fn not_found(resource: &'static str, key: impl fmt::Display) -> Self {
        HierarchyError::NotFound {
            resource,
            key: key.to_string(),
        }
    }

    /// Classifies a store failure raised while inserting or updating a row
    fn on_create(err: StoreError, resource: &str) -> Self {
        match err {
            StoreError::Conflict { .. } => {
                HierarchyError::Conflict(format!("{resource} already exists"))
            }
            StoreError::ForeignKeyViolation { constraint } => {
                let field = parent_field(&constraint);
                HierarchyError::Validation(vec![FieldError::new(
                    field,
                    format!("{field} does not reference an existing row"),
                )])
            }
            other => HierarchyError::Store(other),
        }
    }

    /// Classifies a store failure raised while deleting a row
    fn on_delete(err: StoreError, resource: &str, id: i32) -> Self {
        match err {
            StoreError::ForeignKeyViolation { .. } => {
                HierarchyError::Conflict(format!("{resource} {id} is still referenced"))
            }
            other => HierarchyError::Store(other),
        }
    }
}

impl From<StoreError> for HierarchyError {
    fn from(err: StoreError) -> Self {
        HierarchyError::Store(err)
    }
}

impl From<Vec<FieldError>> for HierarchyError {
    fn from(details: Vec<FieldError>) -> Self {
        HierarchyError::Validation(details)
    }
}

/// Maps a foreign key constraint name to the payload field it guards
fn parent_field(constraint: &str) -> &'static str {
    const FIELDS: [(&str, &str); 5] = [
        ("calendar_type_id", "calendar_type_id"),
        ("category_id", "categories"),
        ("venue_id", "venue_id"),
        ("town_id", "town_id"),
        ("state_id", "state_id"),
    ];

    FIELDS
        .iter()
        .find(|(column, _)| constraint.contains(column))
        .map(|(_, field)| *field)
        .unwrap_or("parent")
}

fn validate(payload: &impl Validate) -> HierarchyResult<()> {
    payload
        .validate()
        .map_err(|errors| HierarchyError::Validation(field_errors(&errors)))
}

fn missing_parent(field: &str, id: i32) -> HierarchyError {
    HierarchyError::Validation(vec![FieldError::new(
        field,
        format!("{field} {id} does not exist"),
    )])
}

/// A state or town addressed either by ID or by name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(i32),
    Name(String),
}

impl Lookup {
    /// Path segments that parse as an integer are IDs; anything else is a name
    pub fn parse(segment: &str) -> Self {
        match segment.trim().parse::<i32>() {
            Ok(id) => Lookup::Id(id),
            Err(_) => Lookup::Name(segment.trim().to_string()),
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "{id}"),
            Lookup::Name(name) => f.write_str(name),
        }
    }
}

/// Query parameters of the business listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BusinessQuery {
    #[serde(alias = "townName")]
    pub town_name: Option<String>,

    #[serde(alias = "townId")]
    pub town_id: Option<i32>,

    #[serde(alias = "cityId")]
    pub city_id: Option<i32>,

    pub classification: Option<String>,
}

/// Reads and writes the directory through a [`DirectoryStore`]
#[derive(Clone)]
pub struct HierarchyService {
    store: Arc<dyn DirectoryStore>,
    rules: CascadeRules,
}

impl HierarchyService {
    pub fn new(store: Arc<dyn DirectoryStore>, rules: CascadeRules) -> Self {
        Self { store, rules }
    }

    pub fn rules(&self) -> &CascadeRules {
        &self.rules
    }

    // States

    pub async fn list_states(&self) -> HierarchyResult<Vec<State>> {
        Ok(self.store.list_states().await?)
    }

    pub async fn get_state(&self, key: &Lookup) -> HierarchyResult<State> {
        let state = match key {
            Lookup::Id(id) => self.store.find_state(*id).await?,
            Lookup::Name(name) => self.store.find_state_by_name(name).await?,
        };
        state.ok_or_else(|| HierarchyError::not_found("state", key))
    }

    pub async fn create_state(&self, payload: StatePayload) -> HierarchyResult<State> {
        validate(&payload)?;
        let name = non_blank(required(payload.name, "name")?, "name")?;

        let state = self
            .store
            .create_state(CreateState { name })
            .await
            .map_err(|e| HierarchyError::on_create(e, "state"))?;

        info!(state_id = state.id, name = %state.name, "Created state");
        Ok(state)
    }

    pub async fn delete_state(&self, key: &Lookup) -> HierarchyResult<State> {
        let id = self.get_state(key).await?.id;

        match self
            .store
            .delete_state(id, &self.rules)
            .await
            .map_err(|e| HierarchyError::on_delete(e, "state", id))?
        {
            DeleteOutcome::Deleted(state) => Ok(state),
            DeleteOutcome::NotFound => Err(HierarchyError::not_found("state", id)),
            DeleteOutcome::Blocked { children, count } => Err(HierarchyError::HasChildren {
                resource: "state",
                id,
                children,
                count,
            }),
        }
    }

    // Towns

    /// Every town, alphabetically
    pub async fn list_all_towns(&self) -> HierarchyResult<Vec<Town>> {
        Ok(self.store.list_towns(None).await?)
    }

    /// Towns of one state; an unknown state is `NotFound`
    pub async fn list_towns(&self, state: &Lookup) -> HierarchyResult<Vec<Town>> {
        let state = self.get_state(state).await?;
        Ok(self.store.list_towns(Some(state.id)).await?)
    }

    pub async fn get_town(&self, id: i32) -> HierarchyResult<Town> {
        self.store
            .find_town(id)
            .await?
            .ok_or_else(|| HierarchyError::not_found("town", id))
    }

    pub async fn create_town(&self, payload: TownPayload) -> HierarchyResult<Town> {
        validate(&payload)?;
        let name = non_blank(required(payload.name, "name")?, "name")?;
        let state_id = required(payload.state_id, "state_id")?;

        if self.store.find_state(state_id).await?.is_none() {
            return Err(missing_parent("state_id", state_id));
        }

        let town = self
            .store
            .create_town(CreateTown { name, state_id })
            .await
            .map_err(|e| HierarchyError::on_create(e, "town"))?;

        info!(town_id = town.id, state_id, name = %town.name, "Created town");
        Ok(town)
    }

    pub async fn delete_town(&self, id: i32) -> HierarchyResult<Town> {
        match self
            .store
            .delete_town(id, &self.rules)
            .await
            .map_err(|e| HierarchyError::on_delete(e, "town", id))?
        {
            DeleteOutcome::Deleted(town) => Ok(town),
            DeleteOutcome::NotFound => Err(HierarchyError::not_found("town", id)),
            DeleteOutcome::Blocked { children, count } => Err(HierarchyError::HasChildren {
                resource: "town",
                id,
                children,
                count,
            }),
        }
    }

    // Venues

    pub async fn list_venues(&self, town_id: i32) -> HierarchyResult<Vec<Venue>> {
        self.get_town(town_id).await?;
        Ok(self.store.list_venues(town_id).await?)
    }

    pub async fn create_venue(&self, payload: VenuePayload) -> HierarchyResult<Venue> {
        validate(&payload)?;
        let name = non_blank(required(payload.name, "name")?, "name")?;
        let town_id = required(payload.town_id, "town_id")?;

        if self.store.find_town(town_id).await?.is_none() {
            return Err(missing_parent("town_id", town_id));
        }

        let venue = self
            .store
            .create_venue(CreateVenue { name, town_id })
            .await
            .map_err(|e| HierarchyError::on_create(e, "venue"))?;

        info!(venue_id = venue.id, town_id, "Created venue");
        Ok(venue)
    }

    pub async fn delete_venue(&self, id: i32) -> HierarchyResult<Venue> {
        self.store
            .delete_venue(id)
            .await
            .map_err(|e| HierarchyError::on_delete(e, "venue", id))?
            .ok_or_else(|| HierarchyError::not_found("venue", id))
    }

    // Businesses

    /// Lists businesses matching every filter that is set
    ///
    /// A town name that matches no town is `NotFound`; a real town without
    /// businesses yields an empty list. Town names are not unique, so a name
    /// covers every town carrying it.
    pub async fn list_businesses(&self, query: BusinessQuery) -> HierarchyResult<Vec<Business>> {
        let classification = optional_text(query.classification);
        if let Some(c) = &classification {
            if !VALID_CLASSIFICATIONS.contains(&c.as_str()) {
                return Err(HierarchyError::Validation(vec![FieldError::new(
                    "classification",
                    "classification must be one of the fixed classifications",
                )]));
            }
        }

        let town_ids = match optional_text(query.town_name) {
            Some(name) => {
                let towns = self.store.find_towns_by_name(&name).await?;
                if towns.is_empty() {
                    return Err(HierarchyError::not_found("town", name));
                }
                let ids = towns
                    .into_iter()
                    .map(|t| t.id)
                    .filter(|id| query.town_id.map_or(true, |wanted| *id == wanted))
                    .collect();
                Some(ids)
            }
            None => query.town_id.map(|id| vec![id]),
        };

        let filter = BusinessFilter {
            town_ids,
            city_id: query.city_id,
            classification,
        };
        Ok(self.store.list_businesses(&filter).await?)
    }

    /// Businesses of one town, addressed by ID or by name
    ///
    /// An unknown ID is `NotFound` just like an unknown name.
    pub async fn list_town_businesses(&self, town: &Lookup) -> HierarchyResult<Vec<Business>> {
        let query = match town {
            Lookup::Id(id) => {
                self.get_town(*id).await?;
                BusinessQuery {
                    town_id: Some(*id),
                    ..Default::default()
                }
            }
            Lookup::Name(name) => BusinessQuery {
                town_name: Some(name.clone()),
                ..Default::default()
            },
        };
        self.list_businesses(query).await
    }

    pub async fn get_business(&self, id: i32) -> HierarchyResult<Business> {
        self.store
            .find_business(id)
            .await?
            .ok_or_else(|| HierarchyError::not_found("business", id))
    }

    pub async fn create_business(&self, payload: BusinessPayload) -> HierarchyResult<Business> {
        validate(&payload)?;
        let name = non_blank(required(payload.name, "name")?, "name")?;
        let town_id = required(payload.town_id, "town_id")?;

        if self.store.find_town(town_id).await?.is_none() {
            return Err(missing_parent("town_id", town_id));
        }

        let data = CreateBusiness {
            name,
            town_id,
            city_id: payload.city_id,
            state_id: payload.state_id,
            classification: optional_text(payload.classification),
            physical_address: optional_text(payload.physical_address),
            zipcode: optional_text(payload.zipcode),
            website_url: optional_text(payload.website_url),
            facebook_page: optional_text(payload.facebook_page),
            instagram_page: optional_text(payload.instagram_page),
            x_page: optional_text(payload.x_page),
            best_of_apres_ski: payload.best_of_apres_ski,
            apres_ski_membership_years: payload.apres_ski_membership_years,
        };

        let business = self
            .store
            .create_business(data)
            .await
            .map_err(|e| HierarchyError::on_create(e, "business"))?;

        info!(business_id = business.id, town_id, "Created business");
        Ok(business)
    }

    /// Overwrites a business; an omitted town keeps the current one
    pub async fn update_business(
        &self,
        id: i32,
        payload: BusinessPayload,
    ) -> HierarchyResult<Business> {
        validate(&payload)?;
        let name = non_blank(required(payload.name, "name")?, "name")?;

        if let Some(town_id) = payload.town_id {
            if self.store.find_town(town_id).await?.is_none() {
                return Err(missing_parent("town_id", town_id));
            }
        }

        let data = UpdateBusiness {
            name,
            town_id: payload.town_id,
            city_id: payload.city_id,
            state_id: payload.state_id,
            classification: optional_text(payload.classification),
            physical_address: optional_text(payload.physical_address),
            zipcode: optional_text(payload.zipcode),
            website_url: optional_text(payload.website_url),
            facebook_page: optional_text(payload.facebook_page),
            instagram_page: optional_text(payload.instagram_page),
            x_page: optional_text(payload.x_page),
            best_of_apres_ski: payload.best_of_apres_ski,
            apres_ski_membership_years: payload.apres_ski_membership_years,
        };

        let business = self
            .store
            .update_business(id, data)
            .await
            .map_err(|e| HierarchyError::on_create(e, "business"))?
            .ok_or_else(|| HierarchyError::not_found("business", id))?;

        info!(business_id = id, town_id = ?business.town_id, "Updated business");
        Ok(business)
    }

    pub async fn delete_business(&self, id: i32) -> HierarchyResult<Business> {
        self.store
            .delete_business(id)
            .await
            .map_err(|e| HierarchyError::on_delete(e, "business", id))?
            .ok_or_else(|| HierarchyError::not_found("business", id))
    }

    // Bands

    pub async fn list_bands(&self, state: &Lookup) -> HierarchyResult<Vec<Band>> {
        let state = self.get_state(state).await?;
        Ok(self.store.list_bands(state.id).await?)
    }

    pub async fn create_band(&self, payload: BandPayload) -> HierarchyResult<Band> {
        validate(&payload)?;
        let name = non_blank(required(payload.name, "name")?, "name")?;
        let state_id = required(payload.state_id, "state_id")?;

        if self.store.find_state(state_id).await?.is_none() {
            return Err(missing_parent("state_id", state_id));
        }

        let band = self
            .store
            .create_band(CreateBand { name, state_id })
            .await
            .map_err(|e| HierarchyError::on_create(e, "band"))?;

        info!(band_id = band.id, state_id, "Created band");
        Ok(band)
    }

    pub async fn delete_band(&self, id: i32) -> HierarchyResult<Band> {
        self.store
            .delete_band(id)
            .await
            .map_err(|e| HierarchyError::on_delete(e, "band", id))?
            .ok_or_else(|| HierarchyError::not_found("band", id))
    }

    // Calendar

    pub async fn list_calendar_types(&self) -> HierarchyResult<Vec<CalendarType>> {
        Ok(self.store.list_calendar_types().await?)
    }

    pub async fn list_categories(&self, calendar_type_id: i32) -> HierarchyResult<Vec<EventCategory>> {
        if self.store.find_calendar_type(calendar_type_id).await?.is_none() {
            return Err(HierarchyError::not_found("calendar type", calendar_type_id));
        }
        Ok(self.store.list_categories(calendar_type_id).await?)
    }

    pub async fn list_subcategories(&self, category_id: i32) -> HierarchyResult<Vec<EventSubcategory>> {
        if self.store.find_category(category_id).await?.is_none() {
            return Err(HierarchyError::not_found("category", category_id));
        }
        Ok(self.store.list_subcategories(category_id).await?)
    }

    // Events

    pub async fn list_events(&self, filter: EventFilter) -> HierarchyResult<Vec<Event>> {
        Ok(self.store.list_events(filter).await?)
    }

    pub async fn get_event(&self, id: i32) -> HierarchyResult<Event> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| HierarchyError::not_found("event", id))
    }

    /// Creates an event with its category links
    ///
    /// The store inserts the event and its links atomically; an unknown
    /// category anywhere in the list leaves no event behind.
    pub async fn create_event(&self, payload: EventPayload) -> HierarchyResult<Event> {
        validate(&payload)?;
        let title = non_blank(required(payload.title, "title")?, "title")?;
        let town_id = required(payload.town_id, "town_id")?;
        let start_date = required(payload.start_date, "start_date")?;

        if self.store.find_town(town_id).await?.is_none() {
            return Err(missing_parent("town_id", town_id));
        }
        if let Some(calendar_type_id) = payload.calendar_type_id {
            if self.store.find_calendar_type(calendar_type_id).await?.is_none() {
                return Err(missing_parent("calendar_type_id", calendar_type_id));
            }
        }

        let mut categories = payload.categories;
        categories.sort_unstable();
        categories.dedup();

        let data = CreateEvent {
            title,
            town_id,
            venue_id: payload.venue_id,
            calendar_type_id: payload.calendar_type_id,
            start_date,
            start_time: payload.start_time,
            end_date: payload.end_date,
            end_time: payload.end_time,
            repeat_type: optional_text(payload.repeat_type),
            description: optional_text(payload.description),
            is_featured: payload.is_featured,
            cost: optional_text(payload.cost),
            ticket_link: optional_text(payload.ticket_link),
            categories,
        };

        Ok(self
            .store
            .create_event(data)
            .await
            .map_err(|e| HierarchyError::on_create(e, "event"))?)
    }

    pub async fn delete_event(&self, id: i32) -> HierarchyResult<Event> {
        self.store
            .delete_event(id)
            .await
            .map_err(|e| HierarchyError::on_delete(e, "event", id))?
            .ok_or_else(|| HierarchyError::not_found("event", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{LinkedChildren, MemoryStore, OwnedChildren};
    use chrono::NaiveDate;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: HierarchyService,
    }

    fn fixture(rules: CascadeRules) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let service = HierarchyService::new(store.clone(), rules);
        Fixture { store, service }
    }

    async fn state(service: &HierarchyService, name: &str) -> State {
        service
            .create_state(StatePayload {
                name: Some(name.to_string()),
            })
            .await
            .unwrap()
    }

    async fn town(service: &HierarchyService, state_id: i32, name: &str) -> Town {
        service
            .create_town(TownPayload {
                name: Some(name.to_string()),
                state_id: Some(state_id),
            })
            .await
            .unwrap()
    }

    async fn business(service: &HierarchyService, town_id: i32, name: &str) -> Business {
        service
            .create_business(BusinessPayload {
                name: Some(name.to_string()),
                town_id: Some(town_id),
                ..Default::default()
            })
            .await
            .unwrap()
    }

    fn event_payload(town_id: i32, categories: Vec<i32>) -> EventPayload {
        EventPayload {
            title: Some("Torchlight Parade".to_string()),
            town_id: Some(town_id),
            start_date: NaiveDate::from_ymd_opt(2026, 12, 31),
            categories,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_town_and_list_by_state() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let vail = town(&f.service, colorado.id, "  Vail ").await;

        assert_eq!(vail.name, "Vail");

        let by_id = f.service.list_towns(&Lookup::Id(colorado.id)).await.unwrap();
        let by_name = f
            .service
            .list_towns(&Lookup::Name("colorado".to_string()))
            .await
            .unwrap();
        assert_eq!(by_id, vec![vail.clone()]);
        assert_eq!(by_name, by_id);
    }

    #[tokio::test]
    async fn test_create_town_with_unknown_state_is_validation_error() {
        let f = fixture(CascadeRules::default());
        let err = f
            .service
            .create_town(TownPayload {
                name: Some("Vail".to_string()),
                state_id: Some(42),
            })
            .await
            .unwrap_err();

        match err {
            HierarchyError::Validation(details) => assert_eq!(details[0].field, "state_id"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_town_requires_name() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;

        let err = f
            .service
            .create_town(TownPayload {
                name: Some("   ".to_string()),
                state_id: Some(colorado.id),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Validation(_)));

        let err = f
            .service
            .create_town(TownPayload {
                name: None,
                state_id: Some(colorado.id),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_state_is_conflict() {
        let f = fixture(CascadeRules::default());
        state(&f.service, "Utah").await;

        let err = f
            .service
            .create_state(StatePayload {
                name: Some("Utah".to_string()),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_parent_scoped_lists_distinguish_unknown_parent() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let aspen = town(&f.service, colorado.id, "Aspen").await;

        assert!(f.service.list_venues(aspen.id).await.unwrap().is_empty());
        assert!(matches!(
            f.service.list_venues(999).await,
            Err(HierarchyError::NotFound { resource: "town", .. })
        ));
        assert!(f
            .service
            .list_bands(&Lookup::Id(colorado.id))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            f.service.list_towns(&Lookup::Name("Atlantis".into())).await,
            Err(HierarchyError::NotFound { resource: "state", .. })
        ));
    }

    #[tokio::test]
    async fn test_businesses_by_town_name() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let aspen = town(&f.service, colorado.id, "Aspen").await;

        let query = |name: &str| BusinessQuery {
            town_name: Some(name.to_string()),
            ..Default::default()
        };

        assert!(f.service.list_businesses(query("Aspen")).await.unwrap().is_empty());
        assert!(matches!(
            f.service.list_businesses(query("Nonexistent")).await,
            Err(HierarchyError::NotFound { resource: "town", .. })
        ));

        let ajax = business(&f.service, aspen.id, "Ajax Tavern").await;
        assert_eq!(f.service.list_businesses(query("aspen")).await.unwrap(), vec![ajax]);
    }

    #[tokio::test]
    async fn test_town_businesses_by_id_or_name() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let aspen = town(&f.service, colorado.id, "Aspen").await;
        let vail = town(&f.service, colorado.id, "Vail").await;
        let ajax = business(&f.service, aspen.id, "Ajax Tavern").await;
        business(&f.service, vail.id, "Red Lion").await;

        let by_id = f.service.list_town_businesses(&Lookup::parse(&aspen.id.to_string())).await.unwrap();
        assert_eq!(by_id, vec![ajax.clone()]);

        let by_name = f.service.list_town_businesses(&Lookup::parse("Aspen")).await.unwrap();
        assert_eq!(by_name, vec![ajax]);

        assert!(matches!(
            f.service.list_town_businesses(&Lookup::Id(i32::MAX)).await,
            Err(HierarchyError::NotFound { resource: "town", .. })
        ));
    }

    #[tokio::test]
    async fn test_update_business_overwrites_fields_and_keeps_town() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let aspen = town(&f.service, colorado.id, "Aspen").await;
        let created = business(&f.service, aspen.id, "Ajax Tavern").await;

        let updated = f
            .service
            .update_business(
                created.id,
                BusinessPayload {
                    name: Some("Ajax Tavern & Patio".to_string()),
                    classification: Some("Green Circle (All Ages)".to_string()),
                    best_of_apres_ski: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Ajax Tavern & Patio");
        assert_eq!(updated.town_id, Some(aspen.id));
        assert!(updated.best_of_apres_ski);
        assert_eq!(f.service.get_business(created.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_business_moves_town_and_reports_missing_rows() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let aspen = town(&f.service, colorado.id, "Aspen").await;
        let vail = town(&f.service, colorado.id, "Vail").await;
        let created = business(&f.service, aspen.id, "Red Lion").await;
        let payload = |town_id: Option<i32>| BusinessPayload {
            name: Some("Red Lion".to_string()),
            town_id,
            ..Default::default()
        };

        let moved = f.service.update_business(created.id, payload(Some(vail.id))).await.unwrap();
        assert_eq!(moved.town_id, Some(vail.id));

        match f.service.update_business(created.id, payload(Some(i32::MAX))).await {
            Err(HierarchyError::Validation(details)) => assert_eq!(details[0].field, "town_id"),
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(matches!(
            f.service.update_business(i32::MAX, payload(None)).await,
            Err(HierarchyError::NotFound { resource: "business", .. })
        ));
    }

    #[tokio::test]
    async fn test_business_classification_filter_is_validated() {
        let f = fixture(CascadeRules::default());
        let err = f
            .service
            .list_businesses(BusinessQuery {
                classification: Some("Bunny Hill".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HierarchyError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_town_returns_row_and_removes_it() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let vail = town(&f.service, colorado.id, "Vail").await;

        assert_eq!(f.service.delete_town(vail.id).await.unwrap(), vail);
        assert!(f
            .service
            .list_towns(&Lookup::Id(colorado.id))
            .await
            .unwrap()
            .is_empty());
        assert!(matches!(
            f.service.delete_town(vail.id).await,
            Err(HierarchyError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_state_with_towns_is_rejected_intact() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        town(&f.service, colorado.id, "Vail").await;

        let err = f.service.delete_state(&Lookup::Id(colorado.id)).await.unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::HasChildren {
                children: ChildKind::Towns,
                count: 1,
                ..
            }
        ));
        assert_eq!(f.service.list_towns(&Lookup::Id(colorado.id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_state_bands_cascade() {
        let f = fixture(CascadeRules::default());
        let utah = state(&f.service, "Utah").await;
        f.service
            .create_band(BandPayload {
                name: Some("The Moguls".to_string()),
                state_id: Some(utah.id),
            })
            .await
            .unwrap();

        f.service.delete_state(&Lookup::Id(utah.id)).await.unwrap();
        assert!(f.store.list_bands(utah.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_town_businesses_detach() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let vail = town(&f.service, colorado.id, "Vail").await;
        let bar = business(&f.service, vail.id, "Garfinkel's").await;

        f.service.delete_town(vail.id).await.unwrap();

        let kept = f.service.get_business(bar.id).await.unwrap();
        assert_eq!(kept.town_id, None);
    }

    #[tokio::test]
    async fn test_town_businesses_cascade_variant() {
        let rules = CascadeRules {
            town_businesses: LinkedChildren::Cascade,
            ..CascadeRules::default()
        };
        let f = fixture(rules);
        let colorado = state(&f.service, "Colorado").await;
        let vail = town(&f.service, colorado.id, "Vail").await;
        let bar = business(&f.service, vail.id, "Garfinkel's").await;

        f.service.delete_town(vail.id).await.unwrap();
        assert!(matches!(
            f.service.get_business(bar.id).await,
            Err(HierarchyError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_state_towns_cascade_variant_applies_town_rules() {
        let rules = CascadeRules {
            state_towns: OwnedChildren::Cascade,
            ..CascadeRules::default()
        };
        let f = fixture(rules);
        let colorado = state(&f.service, "Colorado").await;
        let vail = town(&f.service, colorado.id, "Vail").await;
        f.service.create_event(event_payload(vail.id, vec![])).await.unwrap();

        // Town events still reject, so the whole state delete is refused
        let err = f.service.delete_state(&Lookup::Id(colorado.id)).await.unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::HasChildren {
                children: ChildKind::Events,
                ..
            }
        ));
        assert!(f.service.get_town(vail.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_town_with_events_rejected() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let vail = town(&f.service, colorado.id, "Vail").await;
        let venue = f
            .service
            .create_venue(VenuePayload {
                name: Some("Red Lion".to_string()),
                town_id: Some(vail.id),
            })
            .await
            .unwrap();
        f.service.create_event(event_payload(vail.id, vec![])).await.unwrap();

        assert!(matches!(
            f.service.delete_town(vail.id).await,
            Err(HierarchyError::HasChildren {
                children: ChildKind::Events,
                ..
            })
        ));
        assert_eq!(f.service.list_venues(vail.id).await.unwrap(), vec![venue]);
    }

    #[tokio::test]
    async fn test_event_with_unknown_category_leaves_no_row() {
        let f = fixture(CascadeRules::default());
        let colorado = state(&f.service, "Colorado").await;
        let vail = town(&f.service, colorado.id, "Vail").await;
        let calendar = f.store.add_calendar_type("Nightlife").unwrap();
        let live = f.store.add_category(calendar.id, "Live Music").unwrap();

        let err = f
            .service
            .create_event(event_payload(vail.id, vec![live.id, 9999]))
            .await
            .unwrap_err();
        match err {
            HierarchyError::Validation(details) => assert_eq!(details[0].field, "categories"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.service.list_events(EventFilter::default()).await.unwrap().is_empty());

        let event = f
            .service
            .create_event(event_payload(vail.id, vec![live.id, live.id]))
            .await
            .unwrap();
        assert_eq!(event.category_ids, vec![live.id]);
    }

    #[tokio::test]
    async fn test_calendar_lists_require_parent() {
        let f = fixture(CascadeRules::default());
        let calendar = f.store.add_calendar_type("Family").unwrap();
        let category = f.store.add_category(calendar.id, "Kids").unwrap();
        let sub = f.store.add_subcategory(category.id, "Ski School").unwrap();

        assert_eq!(f.service.list_categories(calendar.id).await.unwrap(), vec![category.clone()]);
        assert_eq!(f.service.list_subcategories(category.id).await.unwrap(), vec![sub]);
        assert!(matches!(
            f.service.list_categories(999).await,
            Err(HierarchyError::NotFound { .. })
        ));
        assert!(matches!(
            f.service.list_subcategories(999).await,
            Err(HierarchyError::NotFound { .. })
        ));
    }

    #[test]
    fn test_state_ref_parse() {
        assert_eq!(Lookup::parse("12"), Lookup::Id(12));
        assert_eq!(Lookup::parse("Colorado"), Lookup::Name("Colorado".to_string()));
    }

    #[test]
    fn test_parent_field() {
        assert_eq!(parent_field("towns_state_id_fkey"), "state_id");
        assert_eq!(parent_field("events_venue_id_fkey"), "venue_id");
        assert_eq!(parent_field("event_category_links_category_id_fkey"), "categories");
        assert_eq!(parent_field("events_calendar_type_id_fkey"), "calendar_type_id");
        assert_eq!(parent_field(""), "parent");
    }
}
