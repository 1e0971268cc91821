use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::calendar::{
    build_month_grid, parse_calendar_form, reconcile_month_edits, snapshot_session_key, CalendarSnapshot,
    YearMonth,
};
use crate::session::Session;
use crate::store::{RestrictionStore, StoreError};
use crate::web::error::AppResult;
use crate::web::middleware::FormFields;
use crate::web::render::{self, PageContext};
use crate::web::state::AppState;

/// Render every room's grid for the month and remember what was shown.
pub async fn show_calendar(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Html<String>> {
    let today = chrono::Local::now().date_naive();
    let month = YearMonth::from_query(
        params.get("y").map(String::as_str),
        params.get("m").map(String::as_str),
        today,
    )?;

    let store: &dyn RestrictionStore = state.store.as_ref();
    let rooms = store.all_rooms().await?;
    let mut grids = Vec::with_capacity(rooms.len());
    for room in rooms {
        let snapshot = build_month_grid(store, &room, month).await?;
        session.put(&snapshot_session_key(room.id), &snapshot)?;
        grids.push((room, snapshot));
    }

    let ctx = PageContext::from_session(&session);
    Ok(Html(render::calendar(&ctx, month, &grids)))
}

/// Apply the posted checkboxes against the snapshots taken at render time.
pub async fn save_calendar(
    State(state): State<AppState>,
    session: Session,
    FormFields(fields): FormFields,
) -> AppResult<Response> {
    let field = |k: &str| fields.iter().find(|(name, _)| name == k).map(|(_, v)| v.as_str());
    let today = chrono::Local::now().date_naive();
    let month = match (field("y"), field("m")) {
        (Some(y), Some(m)) => YearMonth::from_query(Some(y), Some(m), today)?,
        _ => YearMonth::of(today),
    };

    let edit = match parse_calendar_form(&fields) {
        Ok(edit) => edit,
        Err(StoreError::Validation(msg)) => {
            session.error(msg);
            return Ok(Redirect::to(&month.calendar_path()).into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let store: &dyn RestrictionStore = state.store.as_ref();
    let rooms = store.all_rooms().await?;
    let mut snapshots = HashMap::with_capacity(rooms.len());
    for room in &rooms {
        let key = snapshot_session_key(room.id);
        if let Some(snapshot) = session.take::<CalendarSnapshot>(&key) {
            snapshots.insert(room.id, snapshot);
        }
    }

    let report = reconcile_month_edits(store, &edit, &rooms, month, &snapshots).await;
    session.flash("Changes saved");
    if !report.is_clean() {
        session.warning(format!(
            "Some changes were not applied: {} failed, {} room(s) had changed since the calendar was loaded",
            report.failures,
            report.stale_rooms.len()
        ));
    }
    Ok(Redirect::to(&month.calendar_path()).into_response())
}
