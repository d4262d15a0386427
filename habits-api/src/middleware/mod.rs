/// Middleware modules for the API server
///
/// Session authentication lives in `habits_shared::auth::middleware`; this
/// module holds the layers that only make sense at the HTTP edge.

pub mod security;
