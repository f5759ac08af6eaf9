/// Integration tests for the PostgreSQL store
///
/// These exercise the transactional paths (cascading deletes and event
/// creation) against a real database. They are ignored by default; run them
/// with `DATABASE_URL` set and `cargo test --test pg_store_tests -- --ignored`.
/// Every test works on rows it created, with unique names, so the tests can
/// share one database.

use apres_admin_shared::db::migrations::run_migrations;
use apres_admin_shared::db::pool::{create_pool, DatabaseConfig};
use apres_admin_shared::models::{
    business::{CreateBusiness, UpdateBusiness},
    event::{CreateEvent, EventFilter},
    state::CreateState,
    town::CreateTown,
    user::{CreateUser, Role},
    venue::CreateVenue,
};
use apres_admin_shared::store::{
    CascadeRules, ChildKind, DeleteOutcome, DirectoryStore, LinkedChildren, OwnedChildren,
    PgStore, StoreError,
};
use chrono::NaiveDate;
use std::env;
use std::sync::atomic::{AtomicU32, Ordering};

static COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique(prefix: &str) -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{prefix}-{nanos}-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

async fn test_store() -> PgStore {
    let url = env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");

    let pool = create_pool(DatabaseConfig::from_url(url)).await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Migrations failed");
    PgStore::new(pool)
}

async fn state_and_town(store: &PgStore) -> (i32, i32) {
    let state = store
        .create_state(CreateState { name: unique("state") })
        .await
        .expect("create state");
    let town = store
        .create_town(CreateTown { name: unique("town"), state_id: state.id })
        .await
        .expect("create town");
    (state.id, town.id)
}

fn business(name: String, town_id: i32) -> CreateBusiness {
    CreateBusiness {
        name,
        town_id,
        city_id: None,
        state_id: None,
        classification: None,
        physical_address: None,
        zipcode: None,
        website_url: None,
        facebook_page: None,
        instagram_page: None,
        x_page: None,
        best_of_apres_ski: false,
        apres_ski_membership_years: vec![],
    }
}

fn event(town_id: i32, categories: Vec<i32>) -> CreateEvent {
    CreateEvent {
        title: unique("event"),
        town_id,
        venue_id: None,
        calendar_type_id: None,
        start_date: NaiveDate::from_ymd_opt(2027, 1, 15).expect("valid date"),
        start_time: None,
        end_date: None,
        end_time: None,
        repeat_type: None,
        description: None,
        is_featured: false,
        cost: None,
        ticket_link: None,
        categories,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_ping() {
    let store = test_store().await;
    assert!(store.ping().await.is_ok());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_state_is_conflict() {
    let store = test_store().await;
    let name = unique("state");

    store.create_state(CreateState { name: name.clone() }).await.expect("first insert");
    let err = store.create_state(CreateState { name }).await.unwrap_err();

    assert!(matches!(err, StoreError::Conflict { .. }), "{err:?}");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_missing_parent_is_foreign_key_violation() {
    let store = test_store().await;

    let err = store
        .create_town(CreateTown { name: unique("town"), state_id: i32::MAX })
        .await
        .unwrap_err();

    match err {
        StoreError::ForeignKeyViolation { constraint } => assert!(constraint.contains("state_id")),
        other => panic!("expected foreign key violation, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_email_is_conflict() {
    let store = test_store().await;
    let email = format!("{}@apres.test", unique("user"));
    let user = |username: String| CreateUser {
        email: email.clone(),
        username: Some(username),
        password_hash: None,
        first_name: None,
        last_name: None,
        phone: None,
        role: Role::User,
    };

    store.create_user(user(unique("first"))).await.expect("first insert");
    let err = store.create_user(user(unique("second"))).await.unwrap_err();

    assert!(matches!(err, StoreError::Conflict { .. }), "{err:?}");
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_reject_leaves_parent_and_children() {
    let store = test_store().await;
    let (state_id, town_id) = state_and_town(&store).await;

    let outcome = store.delete_state(state_id, &CascadeRules::default()).await.expect("delete");

    assert_eq!(outcome, DeleteOutcome::Blocked { children: ChildKind::Towns, count: 1 });
    assert!(store.find_state(state_id).await.expect("find").is_some());
    assert!(store.find_town(town_id).await.expect("find").is_some());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_cascade_removes_children() {
    let store = test_store().await;
    let (state_id, town_id) = state_and_town(&store).await;
    let venue = store
        .create_venue(CreateVenue { name: unique("venue"), town_id })
        .await
        .expect("create venue");
    let rules = CascadeRules {
        state_towns: OwnedChildren::Cascade,
        town_businesses: LinkedChildren::Cascade,
        ..CascadeRules::default()
    };

    let outcome = store.delete_state(state_id, &rules).await.expect("delete");

    assert!(matches!(outcome, DeleteOutcome::Deleted(state) if state.id == state_id));
    assert!(store.find_town(town_id).await.expect("find").is_none());
    assert!(store.list_venues(town_id).await.expect("list").iter().all(|v| v.id != venue.id));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_detach_clears_business_town() {
    let store = test_store().await;
    let (_, town_id) = state_and_town(&store).await;
    let created = store
        .create_business(business(unique("business"), town_id))
        .await
        .expect("create business");

    let outcome = store.delete_town(town_id, &CascadeRules::default()).await.expect("delete");
    assert!(matches!(outcome, DeleteOutcome::Deleted(_)));

    let detached = store.find_business(created.id).await.expect("find").expect("business kept");
    assert_eq!(detached.town_id, None);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_business_keeps_town_unless_moved() {
    let store = test_store().await;
    let (_, town_id) = state_and_town(&store).await;
    let (_, other_town_id) = state_and_town(&store).await;
    let created = store
        .create_business(business(unique("business"), town_id))
        .await
        .expect("create business");
    let update = |town_id: Option<i32>| UpdateBusiness {
        name: "Renamed".to_string(),
        town_id,
        classification: Some("Green Circle (All Ages)".to_string()),
        ..UpdateBusiness::default()
    };

    let kept = store.update_business(created.id, update(None)).await.expect("update").expect("row");
    assert_eq!(kept.name, "Renamed");
    assert_eq!(kept.town_id, Some(town_id));

    let moved = store
        .update_business(created.id, update(Some(other_town_id)))
        .await
        .expect("update")
        .expect("row");
    assert_eq!(moved.town_id, Some(other_town_id));

    let err = store.update_business(created.id, update(Some(i32::MAX))).await.unwrap_err();
    assert!(matches!(err, StoreError::ForeignKeyViolation { .. }), "{err:?}");

    assert!(store.update_business(i32::MAX, update(None)).await.expect("update").is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_event_with_unknown_category_is_rolled_back() {
    let store = test_store().await;
    let (_, town_id) = state_and_town(&store).await;

    let err = store.create_event(event(town_id, vec![i32::MAX])).await.unwrap_err();
    assert!(matches!(err, StoreError::ForeignKeyViolation { .. }), "{err:?}");

    let events = store
        .list_events(EventFilter { town_id: Some(town_id), calendar_type_id: None })
        .await
        .expect("list");
    assert!(events.is_empty());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_event_category_links_round_trip() {
    let store = test_store().await;
    let (_, town_id) = state_and_town(&store).await;

    let calendar_type_id: i32 =
        sqlx::query_scalar("INSERT INTO calendar_types (name) VALUES ($1) RETURNING id")
            .bind(unique("calendar"))
            .fetch_one(store.pool())
            .await
            .expect("insert calendar type");
    let mut categories = Vec::new();
    for name in ["Acoustic", "DJ"] {
        let id: i32 = sqlx::query_scalar(
            "INSERT INTO event_categories (name, calendar_type_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(calendar_type_id)
        .fetch_one(store.pool())
        .await
        .expect("insert category");
        categories.push(id);
    }

    let created = store.create_event(event(town_id, categories.clone())).await.expect("create");
    let found = store.find_event(created.id).await.expect("find").expect("event exists");
    assert_eq!(found.category_ids, categories);

    let deleted = store.delete_event(created.id).await.expect("delete");
    assert!(deleted.is_some());
    assert!(store.find_event(created.id).await.expect("find").is_none());
}
