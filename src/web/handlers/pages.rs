use axum::extract::{Path, State};
use axum::response::Html;

use crate::session::Session;
use crate::web::error::AppResult;
use crate::web::render::{self, PageContext};
use crate::web::state::AppState;

use super::parse_id;

pub async fn home(State(state): State<AppState>, session: Session) -> AppResult<Html<String>> {
    let rooms = state.store.all_rooms().await?;
    Ok(Html(render::home(&PageContext::from_session(&session), &rooms)))
}

pub async fn about(session: Session) -> Html<String> {
    Html(render::about(&PageContext::from_session(&session)))
}

pub async fn contact(session: Session) -> Html<String> {
    Html(render::contact(&PageContext::from_session(&session)))
}

pub async fn room(
    State(state): State<AppState>,
    session: Session,
    Path(id): Path<String>,
) -> AppResult<Html<String>> {
    let room = state.store.room(parse_id(&id)?).await?;
    Ok(Html(render::room_page(&PageContext::from_session(&session), &room)))
}
