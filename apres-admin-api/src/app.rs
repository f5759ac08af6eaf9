/// Application state and router builder
///
/// This module defines the shared application state and builds the Axum
/// router. Every route names the [`Action`] it performs; access to it is
/// decided by the role policy, never by where the route sits in the router.
///
/// # Example
///
/// ```no_run
/// use apres_admin_api::{app::{build_router, AppState}, config::Config};
/// use apres_admin_shared::store::PgStore;
/// use std::sync::Arc;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = apres_admin_shared::db::pool::create_pool(config.database.clone()).await?;
/// let state = AppState::new(Arc::new(PgStore::new(pool)), config);
/// let app = build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::{rate_limit::RateLimiter, security::SecurityHeadersLayer},
};
use apres_admin_shared::{
    auth::{
        authorization::{Action, Requirement, RolePolicy},
        jwt::TokenService,
        middleware::authenticate,
    },
    services::{accounts::AccountService, hierarchy::HierarchyService},
    store::{CascadeRules, DirectoryStore},
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post, put, MethodRouter},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; every field
/// is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend
    pub store: Arc<dyn DirectoryStore>,

    /// Directory and calendar operations
    pub hierarchy: HierarchyService,

    /// Login, signup and user administration
    pub accounts: AccountService,

    /// Token issuing and verification
    pub tokens: TokenService,

    /// Action → requirement table
    pub policy: Arc<RolePolicy>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Present when Redis is configured
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    /// Creates application state with the default cascade rules
    pub fn new(store: Arc<dyn DirectoryStore>, config: Config) -> Self {
        Self::with_rules(store, config, CascadeRules::default())
    }

    pub fn with_rules(store: Arc<dyn DirectoryStore>, config: Config, rules: CascadeRules) -> Self {
        let tokens = TokenService::new(config.jwt.secret.clone());

        Self {
            hierarchy: HierarchyService::new(store.clone(), rules),
            accounts: AccountService::new(store.clone(), tokens.clone()),
            policy: Arc::new(config.policy.clone()),
            store,
            tokens,
            config: Arc::new(config),
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: Option<RateLimiter>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

/// What the access check needs to know about one route
#[derive(Clone)]
struct Guard {
    action: Action,
    policy: Arc<RolePolicy>,
    tokens: TokenService,
}

/// Runs the role policy for the action of the matched route
///
/// Public actions never look at the Authorization header. Otherwise the auth
/// gate runs first (401 without a token, 403 for a bad one), then the role
/// check, and the verified identity is handed to the handler.
async fn enforce_access(
    State(guard): State<Guard>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if guard.policy.requirement(guard.action) == Requirement::Public {
        return Ok(next.run(req).await);
    }

    let identity = authenticate(req.headers(), &guard.tokens)?;
    guard.policy.authorize(guard.action, Some(&identity)).map_err(|e| {
        tracing::info!(
            action = %guard.action,
            user_id = identity.user_id,
            role = %identity.role,
            "Access denied"
        );
        e
    })?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

/// Attaches the access check for `action` to a method router
fn guarded(state: &AppState, action: Action, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.layer(from_fn_with_state(
        Guard {
            action,
            policy: state.policy.clone(),
            tokens: state.tokens.clone(),
        },
        enforce_access,
    ))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Routes
///
/// ```text
/// GET    /health                           health
/// POST   /api/login                        login
/// POST   /api/signup                       signup
/// GET    /api/validate-token               validate-token
/// GET    /api/users                        list-users
/// POST   /api/users                        create-user
/// GET    /api/users/:id                    view-user
/// PUT    /api/users/:id                    update-user
/// DELETE /api/users/:id                    delete-user
/// GET    /api/states                       read-directory
/// POST   /api/states                       manage-states
/// GET    /api/states/:state                read-directory
/// DELETE /api/states/:state                manage-states
/// GET    /api/states/:state/towns          read-directory
/// GET    /api/states/:state/bands          read-directory
/// GET    /api/towns                        read-directory
/// POST   /api/towns                        create-town
/// GET    /api/towns/:town                  read-directory
/// DELETE /api/towns/:town                  delete-town
/// GET    /api/towns/:town/venues           read-directory
/// GET    /api/towns/:town/businesses       read-directory
/// GET    /api/businesses                   read-directory
/// POST   /api/businesses                   create-business
/// GET    /api/businesses/:id               read-directory
/// DELETE /api/businesses/:id               delete-business
/// POST   /api/venues                       create-venue
/// DELETE /api/venues/:id                   delete-venue
/// POST   /api/bands                        create-band
/// DELETE /api/bands/:id                    delete-band
/// GET    /api/calendar-types               read-directory
/// GET    /api/calendar-types/:id/categories read-directory
/// GET    /api/categories/:id/subcategories read-directory
/// GET    /api/events                       read-directory
/// POST   /api/events                       create-event
/// GET    /api/events/:id                   read-directory
/// DELETE /api/events/:id                   delete-event
/// ```
///
/// # Middleware Stack
///
/// Outermost first: security headers, CORS, request tracing, rate limiting,
/// then the per-route access check.
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{
        auth, bands, businesses, calendars, events, health, states, towns, users, venues,
    };

    let g = |action: Action, route: MethodRouter<AppState>| guarded(&state, action, route);

    let api = Router::new()
        // Accounts
        .route("/login", g(Action::Login, post(auth::login)))
        .route("/signup", g(Action::Signup, post(auth::signup)))
        .route("/validate-token", g(Action::ValidateToken, get(auth::validate_token)))
        .route(
            "/users",
            g(Action::ListUsers, get(users::list_users))
                .merge(g(Action::CreateUser, post(users::create_user))),
        )
        .route(
            "/users/:id",
            g(Action::ViewUser, get(users::get_user))
                .merge(g(Action::UpdateUser, put(users::update_user)))
                .merge(g(Action::DeleteUser, delete(users::delete_user))),
        )
        // States
        .route(
            "/states",
            g(Action::ReadDirectory, get(states::list_states))
                .merge(g(Action::ManageStates, post(states::create_state))),
        )
        .route(
            "/states/:state",
            g(Action::ReadDirectory, get(states::get_state))
                .merge(g(Action::ManageStates, delete(states::delete_state))),
        )
        .route("/states/:state/towns", g(Action::ReadDirectory, get(states::list_towns)))
        .route("/states/:state/bands", g(Action::ReadDirectory, get(states::list_bands)))
        // Towns
        .route(
            "/towns",
            g(Action::ReadDirectory, get(towns::list_towns))
                .merge(g(Action::CreateTown, post(towns::create_town))),
        )
        .route(
            "/towns/:town",
            g(Action::ReadDirectory, get(towns::get_town))
                .merge(g(Action::DeleteTown, delete(towns::delete_town))),
        )
        .route("/towns/:town/venues", g(Action::ReadDirectory, get(towns::list_venues)))
        .route(
            "/towns/:town/businesses",
            g(Action::ReadDirectory, get(towns::list_businesses)),
        )
        // Businesses
        .route(
            "/businesses",
            g(Action::ReadDirectory, get(businesses::list_businesses))
                .merge(g(Action::CreateBusiness, post(businesses::create_business))),
        )
        .route(
            "/businesses/:id",
            g(Action::ReadDirectory, get(businesses::get_business))
                .merge(g(Action::UpdateBusiness, put(businesses::update_business)))
                .merge(g(Action::DeleteBusiness, delete(businesses::delete_business))),
        )
        // Venues and bands
        .route("/venues", g(Action::CreateVenue, post(venues::create_venue)))
        .route("/venues/:id", g(Action::DeleteVenue, delete(venues::delete_venue)))
        .route("/bands", g(Action::CreateBand, post(bands::create_band)))
        .route("/bands/:id", g(Action::DeleteBand, delete(bands::delete_band)))
        // Calendar
        .route(
            "/calendar-types",
            g(Action::ReadDirectory, get(calendars::list_calendar_types)),
        )
        .route(
            "/calendar-types/:id/categories",
            g(Action::ReadDirectory, get(calendars::list_categories)),
        )
        .route(
            "/categories/:id/subcategories",
            g(Action::ReadDirectory, get(calendars::list_subcategories)),
        )
        .route(
            "/events",
            g(Action::ReadDirectory, get(events::list_events))
                .merge(g(Action::CreateEvent, post(events::create_event))),
        )
        .route(
            "/events/:id",
            g(Action::ReadDirectory, get(events::get_event))
                .merge(g(Action::DeleteEvent, delete(events::delete_event))),
        );

    let health = g(Action::Health, get(health::health_check));
    let cors = cors_layer(&state.config.api.cors_origins);
    let production = state.config.api.production;

    Router::new()
        .route("/health", health)
        .nest("/api", api)
        .layer(from_fn_with_state(
            state.clone(),
            crate::middleware::rate_limit::rate_limit_layer,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}
