//! The guest's path: search dates, pick a room, leave contact details, see the summary.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use serde::Serialize;

use crate::mail::MailData;
use crate::model::{Day, Reservation};
use crate::observability;
use crate::session::Session;
use crate::store::StoreError;
use crate::web::error::{AppError, AppResult};
use crate::web::forms::{parse_day, validate_guest_form, Form, ReservationDraft, DRAFT_KEY};
use crate::web::middleware::FormFields;
use crate::web::render::{self, escape, long_date, PageContext};
use crate::web::state::AppState;

use super::{parse_id, INVALID_FORM};

const GUEST_TEMPLATE: &str = "basic.html";

fn dates_from(form: &Form, start_key: &str, end_key: &str) -> Option<(Day, Day)> {
    Some((parse_day(form.get(start_key))?, parse_day(form.get(end_key))?))
}

fn no_draft(session: &Session) -> Response {
    session.error("There are no reservation details available to display");
    Redirect::to("/").into_response()
}

pub async fn search_page(session: Session) -> Html<String> {
    Html(render::search_availability(&PageContext::from_session(&session)))
}

pub async fn post_search(
    State(state): State<AppState>,
    session: Session,
    FormFields(fields): FormFields,
) -> AppResult<Response> {
    let form = Form::new(fields);
    let Some((start, end)) = dates_from(&form, "start", "end") else {
        session.error("Please enter valid arrival and departure dates");
        return Ok(Redirect::to("/search-availability").into_response());
    };

    let rooms = match state.store.find_available_rooms(start, end).await {
        Ok(rooms) => rooms,
        Err(StoreError::Validation(msg)) => {
            session.error(msg);
            return Ok(Redirect::to("/search-availability").into_response());
        }
        Err(e) => return Err(e.into()),
    };
    if rooms.is_empty() {
        session.error("Sorry, no availability for the requested period");
        return Ok(Redirect::to("/search-availability").into_response());
    }

    let draft = ReservationDraft::new(start, end);
    session.put(DRAFT_KEY, &draft)?;
    let ctx = PageContext::from_session(&session);
    Ok(Html(render::choose_room(&ctx, &rooms, &draft)).into_response())
}

#[derive(Debug, Serialize)]
pub struct AvailabilityReply {
    pub ok: bool,
    pub message: String,
    pub room_id: String,
    pub start_date: String,
    pub end_date: String,
}

/// Availability of one room, answered as JSON for the room page's date form.
pub async fn availability_json(
    State(state): State<AppState>,
    FormFields(fields): FormFields,
) -> Json<AvailabilityReply> {
    let form = Form::new(fields);
    let mut reply = AvailabilityReply {
        ok: false,
        message: String::new(),
        room_id: form.get("room_id").to_string(),
        start_date: form.get("start").to_string(),
        end_date: form.get("end").to_string(),
    };

    let room_id = parse_id(form.get("room_id")).ok();
    let (Some(room_id), Some((start, end))) = (room_id, dates_from(&form, "start", "end")) else {
        reply.message = "Error parsing form".into();
        return Json(reply);
    };

    match state.store.is_room_available(start, end, room_id).await {
        Ok(true) => reply.ok = true,
        Ok(false) => reply.message = "Not available for those dates".into(),
        Err(StoreError::Validation(msg)) => reply.message = msg,
        Err(StoreError::NotFound(_)) => reply.message = "Unknown room".into(),
        Err(e) => {
            tracing::error!(error = %e, %room_id, "availability lookup failed");
            reply.message = "Error querying availability".into();
        }
    }
    Json(reply)
}

pub async fn choose_room(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let room = state.store.room(parse_id(&id)?).await?;
    let Some(mut draft) = session.get::<ReservationDraft>(DRAFT_KEY) else {
        return Ok(no_draft(&session));
    };
    draft.room_id = Some(room.id);
    draft.room_name = Some(room.name);
    session.put(DRAFT_KEY, &draft)?;
    Ok(Redirect::to("/make-reservation").into_response())
}

/// Start a booking straight from a room page: `?id=<room>&s=<arrival>&e=<departure>`.
pub async fn book_room(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Response> {
    let get = |k: &str| params.get(k).map(String::as_str).unwrap_or("");
    let room_id = parse_id(get("id"))?;
    let (Some(start), Some(end)) = (parse_day(get("s")), parse_day(get("e"))) else {
        return Err(AppError::BadRequest("invalid dates".into()));
    };
    let room = state.store.room(room_id).await?;

    let mut draft = ReservationDraft::new(start, end);
    draft.room_id = Some(room.id);
    draft.room_name = Some(room.name);
    session.put(DRAFT_KEY, &draft)?;
    Ok(Redirect::to("/make-reservation").into_response())
}

pub async fn reservation_form(session: Session) -> Response {
    let Some(draft) = session.get::<ReservationDraft>(DRAFT_KEY) else {
        return no_draft(&session);
    };
    if draft.room_id.is_none() {
        session.error("Please choose a room first");
        return Redirect::to("/search-availability").into_response();
    }
    let form = Form::new(vec![
        ("first_name".into(), draft.guest.first_name.clone()),
        ("last_name".into(), draft.guest.last_name.clone()),
        ("email".into(), draft.guest.email.clone()),
        ("phone".into(), draft.guest.phone.clone()),
    ]);
    let ctx = PageContext::from_session(&session);
    Html(render::make_reservation(&ctx, &draft, &form)).into_response()
}

pub async fn post_reservation(
    State(state): State<AppState>,
    session: Session,
    FormFields(fields): FormFields,
) -> AppResult<Response> {
    let Some(mut draft) = session.get::<ReservationDraft>(DRAFT_KEY) else {
        return Ok(no_draft(&session));
    };
    let Some(room_id) = draft.room_id else {
        session.error("Please choose a room first");
        return Ok(Redirect::to("/search-availability").into_response());
    };

    let mut form = Form::new(fields);
    validate_guest_form(&mut form);
    draft.guest = form.guest_details();
    if !form.valid() {
        session.put(DRAFT_KEY, &draft)?;
        let ctx = PageContext::from_session(&session);
        return Ok((INVALID_FORM, Html(render::make_reservation(&ctx, &draft, &form))).into_response());
    }

    let reservation = match state
        .store
        .insert_reservation(room_id, draft.guest.clone(), draft.start, draft.end)
        .await
    {
        Ok(r) => r,
        Err(StoreError::Conflict(_)) => {
            session.remove(DRAFT_KEY);
            session.error("Sorry, that room has just been taken for those dates. Please search again.");
            return Ok(Redirect::to("/search-availability").into_response());
        }
        Err(StoreError::Validation(msg)) => {
            session.error(msg);
            return Ok(Redirect::to("/search-availability").into_response());
        }
        Err(e) => return Err(e.into()),
    };
    metrics::counter!(observability::RESERVATIONS_CREATED_TOTAL).increment(1);
    tracing::info!(reservation_id = %reservation.id, %room_id, "reservation created");

    let room_name = draft.room_name.clone().unwrap_or_default();
    send_confirmations(&state, &reservation, &room_name);

    draft.reservation_id = Some(reservation.id);
    session.put(DRAFT_KEY, &draft)?;
    Ok(Redirect::to("/reservation-summary").into_response())
}

fn send_confirmations(state: &AppState, reservation: &Reservation, room_name: &str) {
    let guest = &reservation.guest;
    let start = long_date(reservation.stay.start);
    let end = long_date(reservation.stay.end);

    state.mailer.send(MailData {
        to: guest.email.clone(),
        from: state.config.mail_from.clone(),
        subject: "Reservation confirmation".into(),
        content: format!(
            "<strong>Reservation confirmation</strong><br>Dear {},<br>This is to confirm your stay in {} from {start} to {end}.",
            escape(&guest.first_name),
            escape(room_name),
        ),
        template: Some(GUEST_TEMPLATE.into()),
    });
    state.mailer.send(MailData {
        to: state.config.owner_email.clone(),
        from: state.config.mail_from.clone(),
        subject: "New reservation".into(),
        content: format!(
            "<strong>New reservation</strong><br>{} has booked {} from {start} to {end}.",
            escape(&guest.full_name()),
            escape(room_name),
        ),
        template: None,
    });
}

/// Shows the finished reservation once, then forgets the draft.
pub async fn reservation_summary(session: Session) -> AppResult<Response> {
    let Some(draft) = session.take::<ReservationDraft>(DRAFT_KEY) else {
        return Ok(no_draft(&session));
    };
    if draft.reservation_id.is_none() {
        session.put(DRAFT_KEY, &draft)?;
        session.error("Your reservation has not been completed yet");
        return Ok(Redirect::to("/make-reservation").into_response());
    }
    let ctx = PageContext::from_session(&session);
    Ok(Html(render::reservation_summary(&ctx, &draft)).into_response())
}
