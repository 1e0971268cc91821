pub mod admin;
pub mod auth;
pub mod booking;
pub mod calendar;
pub mod pages;

use axum::http::StatusCode;
use ulid::Ulid;

use super::error::AppError;

/// Ids in paths are ULIDs; anything else cannot name a record.
fn parse_id(raw: &str) -> Result<Ulid, AppError> {
    Ulid::from_string(raw).map_err(|_| AppError::NotFound)
}

/// Status for a page re-rendered because its form had errors.
const INVALID_FORM: StatusCode = StatusCode::UNPROCESSABLE_ENTITY;
