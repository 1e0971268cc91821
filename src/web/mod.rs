//! HTTP surface: routes, middleware and server-rendered pages.

pub mod error;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod render;
pub mod state;

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use handlers::{admin, auth, booking, calendar, pages};
use state::AppState;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/reservations-new", get(admin::new_reservations))
        .route("/reservations-all", get(admin::all_reservations))
        .route(
            "/reservations/{src}/{id}",
            get(admin::show_reservation).post(admin::update_reservation),
        )
        .route("/process-reservation/{src}/{id}", post(admin::process_reservation))
        .route("/delete-reservation/{src}/{id}", post(admin::delete_reservation))
        .route(
            "/reservations-calendar",
            get(calendar::show_calendar).post(calendar::save_calendar),
        )
        .route_layer(axum::middleware::from_fn(middleware::require_admin))
}

/// Build the full application [`Router`] with all middleware layers.
///
/// Layers run outermost first: panic recovery, tracing, timeout, metrics,
/// the in-flight limit, then the session (and CSRF) layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/contact", get(pages::contact))
        .route("/rooms/{id}", get(pages::room))
        .route(
            "/search-availability",
            get(booking::search_page).post(booking::post_search),
        )
        .route("/search-availability-json", post(booking::availability_json))
        .route("/choose-room/{id}", get(booking::choose_room))
        .route("/book-room", get(booking::book_room))
        .route(
            "/make-reservation",
            get(booking::reservation_form).post(booking::post_reservation),
        )
        .route("/reservation-summary", get(booking::reservation_summary))
        .route("/user/login", get(auth::login_page).post(auth::post_login))
        .route("/user/logout", get(auth::logout))
        .nest("/admin", admin_routes())
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::session_layer))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::limit_in_flight))
        .layer(axum::middleware::from_fn(middleware::record_metrics))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, REQUEST_TIMEOUT))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
