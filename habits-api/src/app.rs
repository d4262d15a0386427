/// Application state and router builder
///
/// This module defines the shared application state and builds the Axum
/// router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use habits_api::{app::AppState, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let state = AppState::new(pool, config);
/// let app = habits_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post},
    Router,
};
use habits_shared::auth::middleware::{session_auth_middleware, AuthError};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    /// Secret used to sign and verify sessions
    pub fn session_secret(&self) -> &str {
        &self.config.session.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /health                         # public
/// └── /api/
///     ├── /auth/{signup,signin,logout}    # public
///     └── everything else                 # session required
///         ├── /user, /users
///         ├── /tasks, /tasks/report, /tasks/contest
///         ├── /personal-tasks
///         ├── /badges, /leaderboards, /analytics
///         ├── /teams/...
///         ├── /goals
///         ├── /contests/...
///         └── /notifications
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Session authentication (protected routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/signup", post(routes::auth::signup))
        .route("/signin", post(routes::auth::signin))
        .route("/logout", post(routes::auth::logout));

    let team_routes = Router::new()
        .route("/", get(routes::teams::list_teams).post(routes::teams::create_team))
        .route("/search", get(routes::teams::search_teams))
        .route("/join", post(routes::teams::join_team))
        .route(
            "/:id",
            get(routes::teams::get_team)
                .put(routes::teams::update_team)
                .delete(routes::teams::delete_team),
        )
        .route("/:id/leave", post(routes::teams::leave_team))
        .route(
            "/:id/members",
            post(routes::teams::add_member).delete(routes::teams::remove_member),
        )
        .route("/:id/invite", post(routes::teams::invite_member))
        .route("/:id/accept-invitation", post(routes::teams::accept_invitation))
        .route("/:id/decline-invitation", post(routes::teams::decline_invitation))
        .route(
            "/:id/contest-tasks",
            get(routes::contest_tasks::list_team_contest_tasks)
                .put(routes::contest_tasks::update_progress),
        );

    let contest_routes = Router::new()
        .route(
            "/",
            get(routes::contests::list_contests)
                .post(routes::contests::create_contest)
                .put(routes::contests::update_contest_from_body)
                .delete(routes::contests::delete_contest_from_query),
        )
        .route(
            "/:id",
            get(routes::contests::get_contest)
                .put(routes::contests::update_contest)
                .delete(routes::contests::delete_contest),
        )
        .route(
            "/:id/tasks",
            get(routes::contest_tasks::list_contest_tasks)
                .post(routes::contest_tasks::create_contest_task)
                .put(routes::contest_tasks::update_progress),
        );

    let protected_routes = Router::new()
        .route("/user", get(routes::users::current_user))
        .route(
            "/user/:id",
            get(routes::users::get_user).put(routes::users::update_user),
        )
        .route("/users", get(routes::users::list_users))
        .route(
            "/tasks",
            get(routes::tasks::list_tasks)
                .post(routes::tasks::create_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/tasks/report", post(routes::tasks::report_progress))
        .route(
            "/tasks/contest",
            get(routes::contest_tasks::list_open_contest_tasks)
                .put(routes::contest_tasks::update_progress),
        )
        .route(
            "/personal-tasks",
            get(routes::personal_tasks::list_personal_tasks)
                .post(routes::personal_tasks::create_personal_task)
                .put(routes::personal_tasks::update_personal_task)
                .delete(routes::personal_tasks::delete_personal_task),
        )
        .route("/badges", get(routes::badges::list_badges))
        .route("/leaderboards", get(routes::stats::leaderboards))
        .route("/analytics", get(routes::stats::analytics))
        .route(
            "/goals",
            get(routes::goals::list_goals).post(routes::goals::create_goal),
        )
        .route(
            "/notifications",
            get(routes::notifications::list_notifications)
                .put(routes::notifications::mark_read),
        )
        .route(
            "/notifications/:id",
            delete(routes::notifications::delete_notification),
        )
        .nest("/teams", team_routes)
        .nest("/contests", contest_routes)
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_auth_layer,
        ));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/api", api_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// CORS for the configured origins
///
/// A wildcard origin cannot carry cookies, so `*` falls back to the
/// permissive layer used for local development.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
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
        .max_age(std::time::Duration::from_secs(3600))
}

/// Session authentication layer
///
/// Injects an `AuthContext` into request extensions or answers 401.
async fn session_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    session_auth_middleware(state.session_secret().to_string(), req, next).await
}
