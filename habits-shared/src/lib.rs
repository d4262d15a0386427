//! # Healthy Habits Shared Library
//!
//! Domain types, persistence and business rules used by the habit tracker
//! API server.
//!
//! ## Module Organization
//!
//! - `auth`: password hashing, session tokens and the session middleware
//! - `db`: connection pool and embedded migrations
//! - `models`: database models and their queries
//! - `badges`: the static badge catalog and its evaluator
//! - `progress`: the progress report workflow
//! - `stats`: leaderboards and personal analytics

pub mod auth;
pub mod badges;
pub mod db;
pub mod models;
pub mod progress;
pub mod stats;

/// Current version of the shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
