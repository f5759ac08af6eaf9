//! Common test utilities for integration tests
//!
//! Every test gets its own in-memory store, so tests never share rows:
//! - Seeded accounts for each role (bcrypt hashes at the minimum cost)
//! - A router built from an explicit variable map instead of the process env
//! - Request helpers returning status plus parsed JSON body

#![allow(dead_code)]

use apres_admin_api::app::{build_router, AppState};
use apres_admin_api::config::Config;
use apres_admin_shared::models::user::{CreateUser, Role, User};
use apres_admin_shared::store::{DirectoryStore, MemoryStore};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tower::Service as _;

pub const JWT_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Password shared by every seeded account
pub const PASSWORD: &str = "Apr3s!Ski";

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub app: axum::Router,
    pub superuser: User,
    pub admin: User,
    pub user: User,
}

impl TestContext {
    /// Creates a context with the default access policy
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_policy("").await
    }

    /// Creates a context with `ACCESS_POLICY` set to `policy`
    pub async fn with_policy(policy: &str) -> anyhow::Result<Self> {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgresql://localhost/apres_test"),
            ("JWT_SECRET", JWT_SECRET),
            ("ACCESS_POLICY", policy),
        ]
        .into_iter()
        .collect();
        let config = Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))?;

        let store = Arc::new(MemoryStore::new());
        let superuser = seed_user(&store, "root", Role::Superuser).await?;
        let admin = seed_user(&store, "ops", Role::Admin).await?;
        let user = seed_user(&store, "skier", Role::User).await?;

        let state = AppState::new(store.clone(), config);
        let app = build_router(state.clone());

        Ok(Self {
            store,
            state,
            app,
            superuser,
            admin,
            user,
        })
    }

    /// Issues a token for `user` without going through login
    pub fn token_for(&self, user: &User) -> String {
        self.state
            .tokens
            .issue(user.id, user.role)
            .expect("token should be issued")
    }

    /// Sends a request and returns the status and JSON body (`Null` if empty)
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request should build");

        let response = self
            .app
            .clone()
            .call(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                panic!("expected JSON, got {}", String::from_utf8_lossy(&bytes))
            })
        };

        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, None).await
    }
}

async fn seed_user(store: &MemoryStore, username: &str, role: Role) -> anyhow::Result<User> {
    let password_hash = bcrypt::hash(PASSWORD, 4)?;
    let user = store
        .create_user(CreateUser {
            email: format!("{username}@apres.test"),
            username: Some(username.to_string()),
            password_hash: Some(password_hash),
            first_name: None,
            last_name: None,
            phone: None,
            role,
        })
        .await?;
    Ok(user)
}
