use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::calendar::YearMonth;
use crate::model::GuestDetails;
use crate::session::Session;
use crate::web::error::{AppError, AppResult};
use crate::web::forms::{validate_guest_form, Form};
use crate::web::middleware::FormFields;
use crate::web::render::{self, return_path, PageContext};
use crate::web::state::AppState;

use super::{parse_id, INVALID_FORM};

type MonthQuery = Query<HashMap<String, String>>;

/// The calendar month a reservation page was opened from, if it came from the calendar.
fn origin_month(src: &str, params: &HashMap<String, String>) -> AppResult<Option<YearMonth>> {
    if src != "cal" {
        return Ok(None);
    }
    match (params.get("y"), params.get("m")) {
        (Some(y), Some(m)) => {
            let today = chrono::Local::now().date_naive();
            Ok(Some(YearMonth::from_query(Some(y), Some(m), today)?))
        }
        _ => Ok(None),
    }
}

fn check_src(src: &str) -> AppResult<()> {
    match src {
        "new" | "all" | "cal" => Ok(()),
        _ => Err(AppError::NotFound),
    }
}

fn guest_form(guest: &GuestDetails) -> Form {
    Form::new(vec![
        ("first_name".into(), guest.first_name.clone()),
        ("last_name".into(), guest.last_name.clone()),
        ("email".into(), guest.email.clone()),
        ("phone".into(), guest.phone.clone()),
    ])
}

pub async fn dashboard(State(state): State<AppState>, session: Session) -> AppResult<Html<String>> {
    let new_count = state.store.new_reservations().await?.len();
    let all_count = state.store.all_reservations().await?.len();
    let ctx = PageContext::from_session(&session);
    Ok(Html(render::dashboard(&ctx, new_count, all_count)))
}

pub async fn new_reservations(State(state): State<AppState>, session: Session) -> AppResult<Html<String>> {
    let list = state.store.new_reservations().await?;
    let ctx = PageContext::from_session(&session);
    Ok(Html(render::reservations_list(&ctx, "New reservations", "new", &list)))
}

pub async fn all_reservations(State(state): State<AppState>, session: Session) -> AppResult<Html<String>> {
    let list = state.store.all_reservations().await?;
    let ctx = PageContext::from_session(&session);
    Ok(Html(render::reservations_list(&ctx, "All reservations", "all", &list)))
}

pub async fn show_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, String)>,
    Query(params): MonthQuery,
) -> AppResult<Html<String>> {
    check_src(&src)?;
    let month = origin_month(&src, &params)?;
    let info = state.store.reservation(parse_id(&id)?).await?;
    let form = guest_form(&info.reservation.guest);
    let ctx = PageContext::from_session(&session);
    Ok(Html(render::reservation_show(&ctx, &info, &src, &form, month)))
}

pub async fn update_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, String)>,
    Query(params): MonthQuery,
    FormFields(fields): FormFields,
) -> AppResult<Response> {
    check_src(&src)?;
    let month = origin_month(&src, &params)?;
    let id = parse_id(&id)?;

    let mut form = Form::new(fields);
    validate_guest_form(&mut form);
    if !form.valid() {
        let info = state.store.reservation(id).await?;
        let ctx = PageContext::from_session(&session);
        let page = render::reservation_show(&ctx, &info, &src, &form, month);
        return Ok((INVALID_FORM, Html(page)).into_response());
    }

    state.store.update_reservation(id, form.guest_details()).await?;
    tracing::info!(reservation_id = %id, "reservation updated");
    session.flash("Changes saved");
    Ok(Redirect::to(&return_path(&src, month)).into_response())
}

pub async fn process_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, String)>,
    Query(params): MonthQuery,
) -> AppResult<Redirect> {
    check_src(&src)?;
    let month = origin_month(&src, &params)?;
    let id = parse_id(&id)?;
    state.store.set_processed(id, true).await?;
    tracing::info!(reservation_id = %id, "reservation marked processed");
    session.flash("Reservation marked as processed");
    Ok(Redirect::to(&return_path(&src, month)))
}

pub async fn delete_reservation(
    State(state): State<AppState>,
    session: Session,
    Path((src, id)): Path<(String, String)>,
    Query(params): MonthQuery,
) -> AppResult<Redirect> {
    check_src(&src)?;
    let month = origin_month(&src, &params)?;
    let id = parse_id(&id)?;
    state.store.delete_reservation(id).await?;
    tracing::info!(reservation_id = %id, "reservation deleted");
    session.flash("Reservation deleted");
    Ok(Redirect::to(&return_path(&src, month)))
}
