//! # Habit Tracker API Server Library
//!
//! HTTP/JSON backend for the habit tracker: sessions, habit progress
//! reports, badges, leaderboards, teams, contests, goals and notifications.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `extract`: JSON body extractor with API-shaped rejections
//! - `middleware`: Response hardening layers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
