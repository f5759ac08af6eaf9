//! # Après-Ski Admin Shared Library
//!
//! Domain types, persistence and business logic behind the après-ski admin
//! API.
//!
//! ## Module Organization
//!
//! - `models`: Database models, request payloads and their queries
//! - `db`: Connection pool and embedded migrations
//! - `auth`: Tokens, password hashing, the role policy and the auth gate
//! - `store`: The storage seam with PostgreSQL and in-memory backends
//! - `services`: Hierarchy and account operations used by the HTTP layer

pub mod auth;
pub mod db;
pub mod models;
pub mod services;
pub mod store;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
