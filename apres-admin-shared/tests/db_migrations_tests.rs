/// Integration tests for database migrations
///
/// These tests need a running PostgreSQL database and are ignored by default.
/// Run with:
/// cargo test --test db_migrations_tests -- --ignored --test-threads=1

use apres_admin_shared::db::migrations::{ensure_database_exists, migration_status, run_migrations};
use apres_admin_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use sqlx::PgPool;
use std::env;

async fn migrated_pool() -> PgPool {
    let url = env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");

    ensure_database_exists(&url).await.expect("Failed to create database");
    let pool = create_pool(DatabaseConfig::from_url(url)).await.expect("Failed to create pool");
    run_migrations(&pool).await.expect("Migrations failed");
    pool
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_migrations_are_idempotent() {
    let pool = migrated_pool().await;

    assert!(run_migrations(&pool).await.is_ok());

    let status = migration_status(&pool).await.expect("Failed to read migration status");
    assert!(status.is_up_to_date);
    assert_eq!(status.applied_migrations, status.known_migrations);
    assert!(status.latest_version.is_some());

    close_pool(&pool).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_migration_creates_all_tables() {
    let pool = migrated_pool().await;

    let expected = [
        "users",
        "states",
        "towns",
        "venues",
        "businesses",
        "bands",
        "calendar_types",
        "event_categories",
        "event_subcategories",
        "events",
        "event_category_links",
    ];

    for table in expected {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .expect("Failed to query information_schema");

        assert!(exists, "table {table} should exist");
    }

    close_pool(&pool).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn test_migration_creates_role_enum() {
    let pool = migrated_pool().await;

    let labels: Vec<String> = sqlx::query_scalar(
        "SELECT e.enumlabel::text
         FROM pg_enum e JOIN pg_type t ON t.oid = e.enumtypid
         WHERE t.typname = 'user_role'
         ORDER BY e.enumsortorder",
    )
    .fetch_all(&pool)
    .await
    .expect("Failed to query pg_enum");

    assert_eq!(labels, ["user", "admin", "superuser"]);

    close_pool(&pool).await;
}
