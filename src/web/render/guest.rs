use std::fmt::Write as _;

use crate::model::Room;
use crate::web::forms::{Form, ReservationDraft};

use super::{escape, iso, layout, long_date, PageContext};

fn room_links(rooms: &[Room]) -> String {
    let mut out = String::from("<ul class=\"rooms\">");
    for room in rooms {
        let _ = write!(out, r#"<li><a href="/rooms/{}">{}</a></li>"#, room.id, escape(&room.name));
    }
    out.push_str("</ul>");
    out
}

pub fn home(ctx: &PageContext, rooms: &[Room]) -> String {
    let body = format!(
        r#"<h1>Welcome to Fort Smythe Bed &amp; Breakfast</h1>
<p>Your home away from home, set among some of the finest scenery in the country.</p>
<h2>Our rooms</h2>
{rooms}
<p><a class="btn" href="/search-availability">Make a reservation now</a></p>"#,
        rooms = room_links(rooms)
    );
    layout(ctx, "Home", &body)
}

pub fn about(ctx: &PageContext) -> String {
    layout(
        ctx,
        "About",
        "<h1>About us</h1><p>A family-run bed &amp; breakfast with a handful of well-kept rooms.</p>",
    )
}

pub fn contact(ctx: &PageContext) -> String {
    layout(
        ctx,
        "Contact",
        "<h1>Contact</h1><p>Write to us at the address on your confirmation email, or call the front desk.</p>",
    )
}

/// A room's own page, with a date form that checks just this room.
pub fn room_page(ctx: &PageContext, room: &Room) -> String {
    let body = format!(
        r#"<h1>{name}</h1>
<p>A comfortable room with everything you need for a restful stay.</p>
<form id="check-availability" action="/search-availability-json" method="post">
{csrf}
<input type="hidden" name="room_id" value="{id}">
<label>Arrival <input type="date" name="start" required></label>
<label>Departure <input type="date" name="end" required></label>
<button type="submit">Check availability</button>
</form>"#,
        name = escape(&room.name),
        csrf = ctx.csrf_field(),
        id = room.id,
    );
    layout(ctx, &room.name, &body)
}

pub fn search_availability(ctx: &PageContext) -> String {
    let body = format!(
        r#"<h1>Search for availability</h1>
<form action="/search-availability" method="post" novalidate>
{csrf}
<label>Arrival <input type="date" name="start" required></label>
<label>Departure <input type="date" name="end" required></label>
<button type="submit">Search availability</button>
</form>"#,
        csrf = ctx.csrf_field()
    );
    layout(ctx, "Search availability", &body)
}

pub fn choose_room(ctx: &PageContext, rooms: &[Room], draft: &ReservationDraft) -> String {
    let mut list = String::from("<ul class=\"rooms\">");
    for room in rooms {
        let _ = write!(
            list,
            r#"<li><a href="/choose-room/{}">{}</a></li>"#,
            room.id,
            escape(&room.name)
        );
    }
    list.push_str("</ul>");
    let body = format!(
        "<h1>Choose a room</h1><p>Available from {} to {}:</p>{list}",
        long_date(draft.start),
        long_date(draft.end)
    );
    layout(ctx, "Choose a room", &body)
}

fn field_error(form: &Form, field: &str) -> String {
    form.errors
        .get(field)
        .map(|m| format!(r#"<span class="field-error">{}</span>"#, escape(m)))
        .unwrap_or_default()
}

fn text_input(form: &Form, field: &str, label: &str, kind: &str) -> String {
    format!(
        r#"<label>{label} <input type="{kind}" name="{field}" value="{value}" autocomplete="off"></label>{err}"#,
        value = escape(form.get(field)),
        err = field_error(form, field),
    )
}

/// Guest contact form. `form` carries previous input and its errors on a failed submit.
pub fn make_reservation(ctx: &PageContext, draft: &ReservationDraft, form: &Form) -> String {
    let room_name = draft.room_name.as_deref().unwrap_or("");
    let body = format!(
        r#"<h1>Make reservation</h1>
<p><strong>Room:</strong> {room}<br>
<strong>Arrival:</strong> {start}<br>
<strong>Departure:</strong> {end}</p>
<form action="/make-reservation" method="post" novalidate>
{csrf}
<input type="hidden" name="start" value="{start_iso}">
<input type="hidden" name="end" value="{end_iso}">
{first}
{last}
{email}
{phone}
<button type="submit">Make reservation</button>
</form>"#,
        room = escape(room_name),
        start = long_date(draft.start),
        end = long_date(draft.end),
        start_iso = iso(draft.start),
        end_iso = iso(draft.end),
        csrf = ctx.csrf_field(),
        first = text_input(form, "first_name", "First name", "text"),
        last = text_input(form, "last_name", "Last name", "text"),
        email = text_input(form, "email", "Email", "email"),
        phone = text_input(form, "phone", "Phone", "text"),
    );
    layout(ctx, "Make reservation", &body)
}

pub fn reservation_summary(ctx: &PageContext, draft: &ReservationDraft) -> String {
    let body = format!(
        r#"<h1>Reservation summary</h1>
<table class="summary">
<tr><td>Name</td><td>{name}</td></tr>
<tr><td>Room</td><td>{room}</td></tr>
<tr><td>Arrival</td><td>{start}</td></tr>
<tr><td>Departure</td><td>{end}</td></tr>
<tr><td>Email</td><td>{email}</td></tr>
<tr><td>Phone</td><td>{phone}</td></tr>
</table>"#,
        name = escape(&draft.guest.full_name()),
        room = escape(draft.room_name.as_deref().unwrap_or("")),
        start = long_date(draft.start),
        end = long_date(draft.end),
        email = escape(&draft.guest.email),
        phone = escape(&draft.guest.phone),
    );
    layout(ctx, "Reservation summary", &body)
}

pub fn login(ctx: &PageContext, form: &Form) -> String {
    let body = format!(
        r#"<h1>Login</h1>
<form action="/user/login" method="post" novalidate>
{csrf}
{email}
<label>Password <input type="password" name="password" autocomplete="current-password"></label>{pw_err}
<button type="submit">Login</button>
</form>"#,
        csrf = ctx.csrf_field(),
        email = text_input(form, "email", "Email", "email"),
        pw_err = field_error(form, "password"),
    );
    layout(ctx, "Login", &body)
}
