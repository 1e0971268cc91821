use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use crate::session::SessionError;
use crate::store::StoreError;

use super::render;

/// Application-level error type for HTTP handlers.
///
/// Renders as a small HTML error page. Store failures are logged in full and
/// shown to the visitor only as a generic message.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Page not found")]
    NotFound,

    #[error("Form has expired or was not sent from this site")]
    Csrf,

    #[error("Server is busy")]
    Busy,

    #[error("internal error: {0}")]
    Internal(&'static str),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Store(e) => match e {
                StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found".to_string()),
                StoreError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                StoreError::LimitExceeded(msg) => (StatusCode::BAD_REQUEST, format!("Request too large: {msg}")),
                StoreError::Conflict(_) => (
                    StatusCode::CONFLICT,
                    "Those dates are no longer available".to_string(),
                ),
                StoreError::Unavailable(_) | StoreError::Timeout => {
                    tracing::error!(error = %e, "store error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Something went wrong on our side. Please try again shortly.".to_string(),
                    )
                }
            },
            AppError::Session(SessionError::Full) => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Session(e) => {
                tracing::error!(error = %e, "session error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong on our side. Please try again shortly.".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Csrf => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Busy => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::Internal(what) => {
                tracing::error!(what, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong on our side. Please try again shortly.".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Html(render::error_page(status, &message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_statuses() {
        let cases = [
            (AppError::from(StoreError::NotFound(ulid::Ulid::new())), StatusCode::NOT_FOUND),
            (AppError::from(StoreError::Validation("x".into())), StatusCode::BAD_REQUEST),
            (AppError::from(StoreError::Conflict(ulid::Ulid::new())), StatusCode::CONFLICT),
            (AppError::from(StoreError::Timeout), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Csrf, StatusCode::BAD_REQUEST),
            (AppError::Busy, StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn internal_details_stay_out_of_the_page() {
        let (_, message) = AppError::from(StoreError::Unavailable("disk on fire".into())).status_and_message();
        assert!(!message.contains("disk"));
    }
}
