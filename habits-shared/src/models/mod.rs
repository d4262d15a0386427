/// Database models for the habit tracker
///
/// Each model owns the SQL for its table(s). Functions take a `&PgPool` when
/// they always run standalone, or a generic executor / `&mut PgConnection`
/// when callers compose them inside a transaction.
///
/// # Example
///
/// ```no_run
/// use habits_shared::models::user::{CreateUser, User, UserRole};
/// use habits_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     email: "sam@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: "Sam".to_string(),
///     role: UserRole::Member,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod completed_task;
pub mod contest;
pub mod contest_task;
pub mod goal;
pub mod invitation;
pub mod notification;
pub mod personal_task;
pub mod task;
pub mod team;
pub mod team_member;
pub mod user;
pub mod user_badge;
