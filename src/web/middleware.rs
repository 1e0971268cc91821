//! Request plumbing shared by every route: session loading, CSRF checks on
//! posts, the admin gate, the in-flight limit and request metrics.

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, FromRequestParts, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, Method};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use cookie::{Cookie, SameSite};

use crate::limits::{MAX_FORM_BYTES, MAX_FORM_FIELDS};
use crate::observability;
use crate::session::{Session, SESSION_COOKIE};

use super::error::AppError;
use super::state::AppState;

const CSRF_FIELD: &str = "csrf_token";
const CSRF_HEADER: &str = "x-csrf-token";

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.value().to_string())
}

fn parse_fields(bytes: &[u8]) -> Result<Vec<(String, String)>, AppError> {
    let fields: Vec<(String, String)> = serde_urlencoded::from_bytes(bytes)
        .map_err(|e| AppError::BadRequest(format!("malformed form: {e}")))?;
    if fields.len() > MAX_FORM_FIELDS {
        return Err(AppError::BadRequest("too many form fields".into()));
    }
    Ok(fields)
}

/// Reads the body, checks the posted (or header) CSRF token, then puts the body back.
async fn check_csrf(session: &Session, req: Request) -> Result<Request, AppError> {
    let (parts, body) = req.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_FORM_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("request body too large".into()))?;

    let presented = match parts.headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) {
        Some(token) => Some(token.to_string()),
        None => serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
            .ok()
            .and_then(|fields| fields.into_iter().find(|(k, _)| k == CSRF_FIELD))
            .map(|(_, v)| v),
    };
    if !presented.is_some_and(|t| session.verify_csrf(&t)) {
        tracing::warn!(path = %parts.uri.path(), "csrf check failed");
        metrics::counter!(observability::CSRF_FAILURES_TOTAL).increment(1);
        return Err(AppError::Csrf);
    }
    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// Attach the visitor's session to the request and send the cookie back when
/// the id is new or has rotated.
pub async fn session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let cookie_id = session_cookie(req.headers());
    let session = state.sessions.load_or_create(cookie_id.as_deref())?;
    req.extensions_mut().insert(session.clone());

    if req.method() == Method::POST {
        req = check_csrf(&session, req).await?;
    }

    let mut response = next.run(req).await;
    if session.needs_cookie() {
        let cookie = Cookie::build((SESSION_COOKIE, session.id()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(state.config.production)
            .max_age(cookie::time::Duration::seconds(
                state.sessions.lifetime().as_secs() as i64,
            ))
            .build();
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(v) => {
                response.headers_mut().append(SET_COOKIE, v);
            }
            Err(e) => tracing::error!(error = %e, "session cookie not encodable"),
        }
    }
    Ok(response)
}

/// Admin routes only: bounce anonymous visitors to the login page.
pub async fn require_admin(session: Session, req: Request, next: Next) -> Response {
    if !session.is_authenticated() {
        session.error("Log in first!");
        return Redirect::to("/user/login").into_response();
    }
    next.run(req).await
}

/// Refuse work once `max_connections` requests are already in flight.
pub async fn limit_in_flight(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Ok(_permit) = state.in_flight.clone().try_acquire_owned() else {
        tracing::warn!(path = %req.uri().path(), "request limit reached, rejecting");
        metrics::counter!(observability::REQUESTS_REJECTED_TOTAL).increment(1);
        return Err(AppError::Busy);
    };
    Ok(next.run(req).await)
}

pub async fn record_metrics(req: Request, next: Next) -> Response {
    let method = observability::method_label(req.method());
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16().to_string();
    metrics::counter!(observability::HTTP_REQUESTS_TOTAL, "method" => method, "status" => status)
        .increment(1);
    metrics::histogram!(observability::HTTP_REQUEST_DURATION_SECONDS, "method" => method)
        .record(start.elapsed().as_secs_f64());
    response
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AppError::Internal("session layer not installed"))
    }
}

/// Url-encoded form fields in posted order, duplicates kept.
#[derive(Debug, Clone, Default)]
pub struct FormFields(pub Vec<(String, String)>);

impl<S: Send + Sync> FromRequest<S> for FormFields {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self(parse_fields(&bytes)?))
    }
}
