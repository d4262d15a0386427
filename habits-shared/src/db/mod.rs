/// Database access: connection pool and schema migrations
///
/// Table-level queries live next to their row types in [`crate::models`].

pub mod pool;
pub mod migrations;
