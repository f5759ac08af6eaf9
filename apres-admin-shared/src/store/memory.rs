//! In-memory store for tests and database-less local runs
//!
//! All tables sit behind one `RwLock`, so every operation (including a
//! cascading delete) observes and leaves a consistent snapshot. Unique and
//! foreign-key constraints of the SQL schema are enforced by hand and
//! reported with the same constraint names PostgreSQL would use.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{
    CascadeRules, ChildKind, DeleteOutcome, DirectoryStore, LinkedChildren, OwnedChildren,
    StoreError, StoreResult,
};
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

#[derive(Debug, Default)]
struct Tables {
    /// Last ID handed out per table, like one SERIAL sequence each
    sequences: HashMap<&'static str, i32>,
    users: BTreeMap<i32, User>,
    states: BTreeMap<i32, State>,
    towns: BTreeMap<i32, Town>,
    venues: BTreeMap<i32, Venue>,
    businesses: BTreeMap<i32, Business>,
    bands: BTreeMap<i32, Band>,
    calendar_types: BTreeMap<i32, CalendarType>,
    categories: BTreeMap<i32, EventCategory>,
    subcategories: BTreeMap<i32, EventSubcategory>,
    events: BTreeMap<i32, Event>,
    /// (event_id, category_id)
    links: BTreeSet<(i32, i32)>,
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict {
        constraint: constraint.to_string(),
    }
}

fn missing_parent(constraint: &str) -> StoreError {
    StoreError::ForeignKeyViolation {
        constraint: constraint.to_string(),
    }
}

/// Collects rows in `ORDER BY name, id` order
fn by_name<T>(rows: impl Iterator<Item = T>, key: impl Fn(&T) -> (String, i32)) -> Vec<T> {
    let mut rows: Vec<T> = rows.collect();
    rows.sort_by_key(|row| key(row));
    rows
}

impl Tables {
    fn allocate_id(&mut self, table: &'static str) -> i32 {
        let last = self.sequences.entry(table).or_insert(0);
        *last += 1;
        *last
    }

    fn check_user_unique(&self, email: &str, username: Option<&str>, except: Option<i32>) -> StoreResult<()> {
        for user in self.users.values().filter(|u| Some(u.id) != except) {
            if user.email == email {
                return Err(conflict("users_email_key"));
            }
            if username.is_some() && user.username.as_deref() == username {
                return Err(conflict("users_username_key"));
            }
        }
        Ok(())
    }

    fn event_with_links(&self, event: &Event) -> Event {
        let mut event = event.clone();
        event.category_ids = self
            .links
            .range((event.id, i32::MIN)..=(event.id, i32::MAX))
            .map(|(_, category_id)| *category_id)
            .collect();
        event
    }

    /// Applies the town-level rules to every child of `town_ids`
    ///
    /// Every `Reject` check runs before the first mutation.
    fn remove_town_children(&mut self, town_ids: &[i32], rules: &CascadeRules) -> Option<(ChildKind, i64)> {
        if town_ids.is_empty() {
            return None;
        }

        let in_towns = |town_id: i32| town_ids.contains(&town_id);

        let venues: Vec<i32> = self.venues.values().filter(|v| in_towns(v.town_id)).map(|v| v.id).collect();
        if !venues.is_empty() && rules.town_venues == OwnedChildren::Reject {
            return Some((ChildKind::Venues, venues.len() as i64));
        }

        let businesses: Vec<i32> = self
            .businesses
            .values()
            .filter(|b| b.town_id.is_some_and(in_towns))
            .map(|b| b.id)
            .collect();
        if !businesses.is_empty() && rules.town_businesses == LinkedChildren::Reject {
            return Some((ChildKind::Businesses, businesses.len() as i64));
        }

        let events: Vec<i32> = self.events.values().filter(|e| in_towns(e.town_id)).map(|e| e.id).collect();
        if !events.is_empty() && rules.town_events == OwnedChildren::Reject {
            return Some((ChildKind::Events, events.len() as i64));
        }

        for id in &events {
            self.events.remove(id);
        }
        self.links.retain(|(event_id, _)| !events.contains(event_id));

        for id in &venues {
            self.venues.remove(id);
        }
        for event in self.events.values_mut() {
            if event.venue_id.is_some_and(|v| venues.contains(&v)) {
                event.venue_id = None;
            }
        }

        for id in &businesses {
            if rules.town_businesses == LinkedChildren::Detach {
                if let Some(business) = self.businesses.get_mut(id) {
                    business.town_id = None;
                }
            } else {
                self.businesses.remove(id);
            }
        }

        None
    }
}

/// [`DirectoryStore`] kept entirely in process memory
///
/// IDs come from one shared sequence, so they are unique across tables.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Internal("memory store lock poisoned".to_string()))
    }

    /// Adds a calendar type; the taxonomy has no write API
    pub fn add_calendar_type(&self, name: &str) -> StoreResult<CalendarType> {
        let mut tables = self.write()?;
        if tables.calendar_types.values().any(|c| c.name == name) {
            return Err(conflict("calendar_types_name_key"));
        }

        let row = CalendarType {
            id: tables.allocate_id("calendar_types"),
            name: name.to_string(),
        };
        tables.calendar_types.insert(row.id, row.clone());
        Ok(row)
    }

    pub fn add_category(&self, calendar_type_id: i32, name: &str) -> StoreResult<EventCategory> {
        let mut tables = self.write()?;
        if !tables.calendar_types.contains_key(&calendar_type_id) {
            return Err(missing_parent("event_categories_calendar_type_id_fkey"));
        }

        let row = EventCategory {
            id: tables.allocate_id("categories"),
            name: name.to_string(),
            calendar_type_id,
        };
        tables.categories.insert(row.id, row.clone());
        Ok(row)
    }

    pub fn add_subcategory(&self, category_id: i32, name: &str) -> StoreResult<EventSubcategory> {
        let mut tables = self.write()?;
        if !tables.categories.contains_key(&category_id) {
            return Err(missing_parent("event_subcategories_category_id_fkey"));
        }

        let row = EventSubcategory {
            id: tables.allocate_id("subcategories"),
            name: name.to_string(),
            category_id,
        };
        tables.subcategories.insert(row.id, row.clone());
        Ok(row)
    }
}

#[async_trait]
impl DirectoryStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        self.read().map(|_| ())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.read()?.users.values().cloned().collect())
    }

    async fn find_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn create_user(&self, data: CreateUser) -> StoreResult<User> {
        let mut tables = self.write()?;
        tables.check_user_unique(&data.email, data.username.as_deref(), None)?;

        let user = User {
            id: tables.allocate_id("users"),
            email: data.email,
            username: data.username,
            password_hash: data.password_hash,
            first_name: data.first_name,
            last_name: data.last_name,
            phone: data.phone,
            role: data.role,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_user(&self, id: i32, data: UpdateUser) -> StoreResult<Option<User>> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(&id) {
            return Ok(None);
        }
        tables.check_user_unique(&data.email, data.username.as_deref(), Some(id))?;

        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.email = data.email;
        if data.username.is_some() {
            user.username = data.username;
        }
        user.first_name = data.first_name;
        user.last_name = data.last_name;
        user.phone = data.phone;
        user.role = data.role;

        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i32) -> StoreResult<Option<User>> {
        Ok(self.write()?.users.remove(&id))
    }

    async fn list_states(&self) -> StoreResult<Vec<State>> {
        let tables = self.read()?;
        Ok(by_name(tables.states.values().cloned(), |s| (s.name.clone(), s.id)))
    }

    async fn find_state(&self, id: i32) -> StoreResult<Option<State>> {
        Ok(self.read()?.states.get(&id).cloned())
    }

    async fn find_state_by_name(&self, name: &str) -> StoreResult<Option<State>> {
        Ok(self
            .read()?
            .states
            .values()
            .find(|s| s.name.to_lowercase() == name.to_lowercase())
            .cloned())
    }

    async fn create_state(&self, data: CreateState) -> StoreResult<State> {
        let mut tables = self.write()?;
        if tables.states.values().any(|s| s.name == data.name) {
            return Err(conflict("states_name_key"));
        }

        let state = State {
            id: tables.allocate_id("states"),
            name: data.name,
        };
        tables.states.insert(state.id, state.clone());
        Ok(state)
    }

    async fn delete_state(&self, id: i32, rules: &CascadeRules) -> StoreResult<DeleteOutcome<State>> {
        let mut tables = self.write()?;
        if !tables.states.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }

        let town_ids: Vec<i32> = tables.towns.values().filter(|t| t.state_id == id).map(|t| t.id).collect();
        if !town_ids.is_empty() && rules.state_towns == OwnedChildren::Reject {
            return Ok(DeleteOutcome::Blocked {
                children: ChildKind::Towns,
                count: town_ids.len() as i64,
            });
        }

        let bands = tables.bands.values().filter(|b| b.state_id == id).count() as i64;
        if bands > 0 && rules.state_bands == OwnedChildren::Reject {
            return Ok(DeleteOutcome::Blocked {
                children: ChildKind::Bands,
                count: bands,
            });
        }

        if let Some((children, count)) = tables.remove_town_children(&town_ids, rules) {
            return Ok(DeleteOutcome::Blocked { children, count });
        }

        tables.towns.retain(|_, t| t.state_id != id);
        tables.bands.retain(|_, b| b.state_id != id);

        match tables.states.remove(&id) {
            Some(state) => Ok(DeleteOutcome::Deleted(state)),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn list_towns(&self, state_id: Option<i32>) -> StoreResult<Vec<Town>> {
        let tables = self.read()?;
        let towns = tables
            .towns
            .values()
            .filter(|t| state_id.map_or(true, |id| t.state_id == id))
            .cloned();
        Ok(by_name(towns, |t| (t.name.clone(), t.id)))
    }

    async fn find_town(&self, id: i32) -> StoreResult<Option<Town>> {
        Ok(self.read()?.towns.get(&id).cloned())
    }

    async fn find_towns_by_name(&self, name: &str) -> StoreResult<Vec<Town>> {
        let needle = name.to_lowercase();
        Ok(self
            .read()?
            .towns
            .values()
            .filter(|t| t.name.to_lowercase() == needle)
            .cloned()
            .collect())
    }

    async fn create_town(&self, data: CreateTown) -> StoreResult<Town> {
        let mut tables = self.write()?;
        if !tables.states.contains_key(&data.state_id) {
            return Err(missing_parent("towns_state_id_fkey"));
        }

        let town = Town {
            id: tables.allocate_id("towns"),
            name: data.name,
            state_id: data.state_id,
        };
        tables.towns.insert(town.id, town.clone());
        Ok(town)
    }

    async fn delete_town(&self, id: i32, rules: &CascadeRules) -> StoreResult<DeleteOutcome<Town>> {
        let mut tables = self.write()?;
        if !tables.towns.contains_key(&id) {
            return Ok(DeleteOutcome::NotFound);
        }

        if let Some((children, count)) = tables.remove_town_children(&[id], rules) {
            return Ok(DeleteOutcome::Blocked { children, count });
        }

        match tables.towns.remove(&id) {
            Some(town) => Ok(DeleteOutcome::Deleted(town)),
            None => Ok(DeleteOutcome::NotFound),
        }
    }

    async fn list_venues(&self, town_id: i32) -> StoreResult<Vec<Venue>> {
        let tables = self.read()?;
        let venues = tables.venues.values().filter(|v| v.town_id == town_id).cloned();
        Ok(by_name(venues, |v| (v.name.clone(), v.id)))
    }

    async fn create_venue(&self, data: CreateVenue) -> StoreResult<Venue> {
        let mut tables = self.write()?;
        if !tables.towns.contains_key(&data.town_id) {
            return Err(missing_parent("venues_town_id_fkey"));
        }

        let venue = Venue {
            id: tables.allocate_id("venues"),
            name: data.name,
            town_id: data.town_id,
        };
        tables.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    async fn delete_venue(&self, id: i32) -> StoreResult<Option<Venue>> {
        let mut tables = self.write()?;
        let removed = tables.venues.remove(&id);
        if removed.is_some() {
            for event in tables.events.values_mut().filter(|e| e.venue_id == Some(id)) {
                event.venue_id = None;
            }
        }
        Ok(removed)
    }

    async fn list_businesses(&self, filter: &BusinessFilter) -> StoreResult<Vec<Business>> {
        let tables = self.read()?;
        let businesses = tables.businesses.values().filter(|b| filter.matches(b)).cloned();
        Ok(by_name(businesses, |b| (b.name.clone(), b.id)))
    }

    async fn find_business(&self, id: i32) -> StoreResult<Option<Business>> {
        Ok(self.read()?.businesses.get(&id).cloned())
    }

    async fn create_business(&self, data: CreateBusiness) -> StoreResult<Business> {
        let mut tables = self.write()?;
        if !tables.towns.contains_key(&data.town_id) {
            return Err(missing_parent("businesses_town_id_fkey"));
        }

        let id = tables.allocate_id("businesses");
        let business = data.into_business(id);
        tables.businesses.insert(id, business.clone());
        Ok(business)
    }

    async fn update_business(&self, id: i32, data: UpdateBusiness) -> StoreResult<Option<Business>> {
        let mut tables = self.write()?;
        if !tables.businesses.contains_key(&id) {
            return Ok(None);
        }
        if let Some(town_id) = data.town_id {
            if !tables.towns.contains_key(&town_id) {
                return Err(missing_parent("businesses_town_id_fkey"));
            }
        }

        Ok(tables.businesses.get_mut(&id).map(|business| {
            data.apply_to(business);
            business.clone()
        }))
    }

    async fn delete_business(&self, id: i32) -> StoreResult<Option<Business>> {
        Ok(self.write()?.businesses.remove(&id))
    }

    async fn list_bands(&self, state_id: i32) -> StoreResult<Vec<Band>> {
        let tables = self.read()?;
        let bands = tables.bands.values().filter(|b| b.state_id == state_id).cloned();
        Ok(by_name(bands, |b| (b.name.clone(), b.id)))
    }

    async fn create_band(&self, data: CreateBand) -> StoreResult<Band> {
        let mut tables = self.write()?;
        if !tables.states.contains_key(&data.state_id) {
            return Err(missing_parent("bands_state_id_fkey"));
        }

        let band = Band {
            id: tables.allocate_id("bands"),
            name: data.name,
            state_id: data.state_id,
        };
        tables.bands.insert(band.id, band.clone());
        Ok(band)
    }

    async fn delete_band(&self, id: i32) -> StoreResult<Option<Band>> {
        Ok(self.write()?.bands.remove(&id))
    }

    async fn list_calendar_types(&self) -> StoreResult<Vec<CalendarType>> {
        let tables = self.read()?;
        Ok(by_name(tables.calendar_types.values().cloned(), |c| (c.name.clone(), c.id)))
    }

    async fn find_calendar_type(&self, id: i32) -> StoreResult<Option<CalendarType>> {
        Ok(self.read()?.calendar_types.get(&id).cloned())
    }

    async fn list_categories(&self, calendar_type_id: i32) -> StoreResult<Vec<EventCategory>> {
        let tables = self.read()?;
        let categories = tables
            .categories
            .values()
            .filter(|c| c.calendar_type_id == calendar_type_id)
            .cloned();
        Ok(by_name(categories, |c| (c.name.clone(), c.id)))
    }

    async fn find_category(&self, id: i32) -> StoreResult<Option<EventCategory>> {
        Ok(self.read()?.categories.get(&id).cloned())
    }

    async fn list_subcategories(&self, category_id: i32) -> StoreResult<Vec<EventSubcategory>> {
        let tables = self.read()?;
        let subcategories = tables
            .subcategories
            .values()
            .filter(|s| s.category_id == category_id)
            .cloned();
        Ok(by_name(subcategories, |s| (s.name.clone(), s.id)))
    }

    async fn list_events(&self, filter: EventFilter) -> StoreResult<Vec<Event>> {
        let tables = self.read()?;
        let mut events: Vec<Event> = tables
            .events
            .values()
            .filter(|e| filter.matches(e))
            .map(|e| tables.event_with_links(e))
            .collect();
        events.sort_by(|a, b| {
            (a.start_date, a.start_time, a.id).cmp(&(b.start_date, b.start_time, b.id))
        });
        Ok(events)
    }

    async fn find_event(&self, id: i32) -> StoreResult<Option<Event>> {
        let tables = self.read()?;
        Ok(tables.events.get(&id).map(|e| tables.event_with_links(e)))
    }

    async fn create_event(&self, data: CreateEvent) -> StoreResult<Event> {
        let mut tables = self.write()?;

        // Validate every reference before touching any table
        if !tables.towns.contains_key(&data.town_id) {
            return Err(missing_parent("events_town_id_fkey"));
        }
        if data.venue_id.is_some_and(|id| !tables.venues.contains_key(&id)) {
            return Err(missing_parent("events_venue_id_fkey"));
        }
        if data.calendar_type_id.is_some_and(|id| !tables.calendar_types.contains_key(&id)) {
            return Err(missing_parent("events_calendar_type_id_fkey"));
        }
        if data.categories.iter().any(|id| !tables.categories.contains_key(id)) {
            return Err(missing_parent("event_category_links_category_id_fkey"));
        }

        let id = tables.allocate_id("events");
        for category_id in &data.categories {
            tables.links.insert((id, *category_id));
        }

        let event = data.into_event(id);
        tables.events.insert(id, event.clone());
        Ok(tables.event_with_links(&event))
    }

    async fn delete_event(&self, id: i32) -> StoreResult<Option<Event>> {
        let mut tables = self.write()?;
        let Some(event) = tables.events.get(&id).map(|e| tables.event_with_links(e)) else {
            return Ok(None);
        };

        tables.events.remove(&id);
        tables.links.retain(|(event_id, _)| *event_id != id);

        Ok(Some(event))
    }
}
