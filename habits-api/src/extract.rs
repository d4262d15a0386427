/// Request extractors
///
/// [`ApiJson`] behaves like [`axum::Json`] but rejects malformed bodies with
/// the same `{ error, message }` shape as every other [`ApiError`], instead
/// of axum's plain-text rejection.

use crate::error::ApiError;
use axum::extract::FromRequest;

/// JSON request body
///
/// ```text
/// POST /api/tasks/report
/// { "taskType": "Water", "goalNumber": "abc" }
///
/// 400 { "error": "bad_request", "message": "Failed to deserialize the JSON body ..." }
/// ```
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
