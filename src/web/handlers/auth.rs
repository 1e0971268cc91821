use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::auth;
use crate::session::{Session, ADMIN_ID_KEY};
use crate::web::error::AppResult;
use crate::web::forms::Form;
use crate::web::middleware::FormFields;
use crate::web::render::{self, PageContext};
use crate::web::state::AppState;

use super::INVALID_FORM;

pub async fn login_page(session: Session) -> Response {
    if session.is_authenticated() {
        return Redirect::to("/admin/dashboard").into_response();
    }
    let ctx = PageContext::from_session(&session);
    Html(render::login(&ctx, &Form::default())).into_response()
}

pub async fn post_login(
    State(state): State<AppState>,
    session: Session,
    FormFields(fields): FormFields,
) -> AppResult<Response> {
    let mut form = Form::new(fields);
    form.required(&["email", "password"]);
    form.is_email("email");
    if !form.valid() {
        let ctx = PageContext::from_session(&session);
        return Ok((INVALID_FORM, Html(render::login(&ctx, &form))).into_response());
    }

    let email = form.get("email").trim();
    match auth::authenticate(&state.store, email, form.get("password")).await? {
        Some(admin_id) => {
            session.renew()?;
            session.put(ADMIN_ID_KEY, &admin_id)?;
            tracing::info!(%admin_id, "administrator logged in");
            session.flash("Logged in successfully");
            Ok(Redirect::to("/admin/dashboard").into_response())
        }
        None => {
            session.error("Invalid login credentials");
            Ok(Redirect::to("/user/login").into_response())
        }
    }
}

pub async fn logout(session: Session) -> AppResult<Redirect> {
    session.destroy()?;
    session.flash("Logged out");
    Ok(Redirect::to("/user/login"))
}
