//! Common test utilities for integration tests
//!
//! - A router over a lazily connected pool, for paths that never reach the
//!   database (authentication, validation, headers)
//! - A database-backed context for the `#[ignore]`d tests, driven by
//!   `DATABASE_URL`
//! - Session cookie and request helpers

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use habits_api::{
    app::{build_router, AppState},
    config::Config,
};
use habits_shared::{
    auth::{
        jwt::{create_token, Claims},
        middleware::SESSION_COOKIE,
    },
    db::{migrations, pool},
    models::user::{CreateUser, User, UserRole},
};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const TEST_SECRET: &str = "test-session-secret-that-is-long-enough";

/// Configuration that never touches the process environment
pub fn test_config(database_url: &str) -> Config {
    let vars = [
        ("DATABASE_URL", database_url),
        ("SESSION_SECRET", TEST_SECRET),
        ("CORS_ORIGINS", "http://localhost:3000"),
        ("RUN_MIGRATIONS", "false"),
    ];

    Config::from_lookup(|key| {
        vars.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| value.to_string())
    })
    .expect("test config is valid")
}

/// Router whose pool never connects unless a handler queries it
pub fn offline_app() -> Router {
    let config = test_config("postgres://nobody@127.0.0.1:1/none");
    let db = pool::create_lazy_pool(&config.database.pool_config()).expect("lazy pool");
    build_router(AppState::new(db, config))
}

/// `Cookie` header value carrying a session for `user_id`
pub fn session_cookie_for(user_id: Uuid, role: UserRole, secret: &str) -> String {
    let token = create_token(&Claims::new(user_id, role), secret).expect("token");
    format!("{}={}", SESSION_COOKIE, token)
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");

    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }

    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
}

/// Database-backed test context
pub struct TestContext {
    pub db: PgPool,
    pub app: Router,
    users: Vec<Uuid>,
}

impl TestContext {
    /// Connects to `DATABASE_URL` and applies migrations
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let url = std::env::var("DATABASE_URL")?;

        let config = test_config(&url);
        let db = PgPool::connect(&url).await?;
        migrations::run_migrations(&db).await?;

        let app = build_router(AppState::new(db.clone(), config));

        Ok(Self {
            db,
            app,
            users: Vec::new(),
        })
    }

    /// Creates a user with a unique email and returns it with its cookie
    pub async fn user(&mut self, role: UserRole) -> anyhow::Result<(User, String)> {
        let user = User::create(
            &self.db,
            CreateUser {
                email: format!("test-{}@example.com", Uuid::new_v4()),
                password_hash: "unused".to_string(),
                name: format!("Test {}", role.as_str()),
                role,
            },
        )
        .await?;

        self.users.push(user.id);
        let cookie = session_cookie_for(user.id, role, TEST_SECRET);
        Ok((user, cookie))
    }

    /// Deletes the test users; their rows cascade
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM teams WHERE created_by = ANY($1)")
            .bind(&self.users)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM contests WHERE created_by = ANY($1)")
            .bind(&self.users)
            .execute(&self.db)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ANY($1)")
            .bind(&self.users)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
