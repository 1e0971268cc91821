use std::fmt::Write as _;

use chrono::Datelike;

use crate::calendar::{add_field_name, remove_field_name, CalendarSnapshot, YearMonth};
use crate::model::{ReservationInfo, Room};
use crate::web::forms::Form;

use super::{escape, iso, layout, PageContext};

pub fn dashboard(ctx: &PageContext, new_count: usize, all_count: usize) -> String {
    let body = format!(
        r#"<h1>Dashboard</h1>
<ul>
<li><a href="/admin/reservations-new">New reservations</a> ({new_count})</li>
<li><a href="/admin/reservations-all">All reservations</a> ({all_count})</li>
<li><a href="/admin/reservations-calendar">Reservations calendar</a></li>
</ul>"#
    );
    layout(ctx, "Dashboard", &body)
}

/// Table of reservations. `src` names the list so detail pages can link back.
pub fn reservations_list(ctx: &PageContext, title: &str, src: &str, list: &[ReservationInfo]) -> String {
    let mut rows = String::new();
    for info in list {
        let r = &info.reservation;
        let _ = write!(
            rows,
            r#"<tr><td>{id}</td><td><a href="/admin/reservations/{src}/{id}">{name}</a></td><td>{room}</td><td>{start}</td><td>{end}</td><td>{processed}</td></tr>"#,
            id = r.id,
            src = escape(src),
            name = escape(&r.guest.full_name()),
            room = escape(&info.room_name),
            start = iso(r.stay.start),
            end = iso(r.stay.end),
            processed = if r.processed { "yes" } else { "no" },
        );
    }
    let body = format!(
        r#"<h1>{title}</h1>
<table class="reservations">
<thead><tr><th>ID</th><th>Guest</th><th>Room</th><th>Arrival</th><th>Departure</th><th>Processed</th></tr></thead>
<tbody>{rows}</tbody>
</table>"#,
        title = escape(title)
    );
    layout(ctx, title, &body)
}

fn edit_input(form: &Form, field: &str, label: &str) -> String {
    let err = form
        .errors
        .get(field)
        .map(|m| format!(r#"<span class="field-error">{}</span>"#, escape(m)))
        .unwrap_or_default();
    format!(
        r#"<label>{label} <input type="text" name="{field}" value="{}"></label>{err}"#,
        escape(form.get(field))
    )
}

/// Where a reservation page returns to: its list, or the calendar month it was opened from.
pub fn return_path(src: &str, month: Option<YearMonth>) -> String {
    match (src, month) {
        ("cal", Some(m)) => m.calendar_path(),
        ("new", _) => "/admin/reservations-new".to_string(),
        _ => "/admin/reservations-all".to_string(),
    }
}

/// One reservation with its edit form.
pub fn reservation_show(
    ctx: &PageContext,
    info: &ReservationInfo,
    src: &str,
    form: &Form,
    month: Option<YearMonth>,
) -> String {
    let r = &info.reservation;
    let query = month
        .map(|m| format!("?y={}&m={:02}", m.year, m.month))
        .unwrap_or_default();
    let back = return_path(src, month);
    let process_link = if r.processed {
        String::new()
    } else {
        format!(
            r#"<form action="/admin/process-reservation/{src}/{id}{query}" method="post">
{csrf}
<button type="submit" class="btn">Mark as processed</button>
</form>"#,
            src = escape(src),
            id = r.id,
            query = escape(&query),
            csrf = ctx.csrf_field(),
        )
    };
    let body = format!(
        r#"<h1>Reservation</h1>
<p><strong>Room:</strong> {room}<br>
<strong>Arrival:</strong> {start}<br>
<strong>Departure:</strong> {end}</p>
<form action="/admin/reservations/{src}/{id}{query}" method="post" novalidate>
{csrf}
{first}
{last}
{email}
{phone}
<button type="submit">Save</button>
<a href="{back}">Cancel</a>
</form>
{process_link}
<form action="/admin/delete-reservation/{src}/{id}{query}" method="post">
{csrf}
<button type="submit" class="btn danger">Delete</button>
</form>"#,
        room = escape(&info.room_name),
        start = iso(r.stay.start),
        end = iso(r.stay.end),
        src = escape(src),
        id = r.id,
        query = escape(&query),
        csrf = ctx.csrf_field(),
        first = edit_input(form, "first_name", "First name"),
        last = edit_input(form, "last_name", "Last name"),
        email = edit_input(form, "email", "Email"),
        phone = edit_input(form, "phone", "Phone"),
        back = escape(&back),
    );
    layout(ctx, "Reservation", &body)
}

fn room_month_table(room: &Room, month: YearMonth, snap: &CalendarSnapshot) -> String {
    let mut head = String::new();
    let mut cells = String::new();
    for day in month.days() {
        let _ = write!(head, "<th>{}</th>", day.day());
        let booked = snap
            .reservation_on(day)
            .map(|res_id| {
                format!(
                    r#"<a class="booked" href="/admin/reservations/cal/{res_id}?y={}&amp;m={:02}">R</a>"#,
                    month.year, month.month
                )
            })
            .unwrap_or_default();
        // A blocked day keeps its box even when a guest also holds it.
        let cell = if snap.block_on(day).is_some() {
            format!(
                r#"<input type="checkbox" name="{}" value="1" checked>{booked}"#,
                remove_field_name(room.id, day)
            )
        } else if !booked.is_empty() {
            booked
        } else {
            format!(
                r#"<input type="checkbox" name="{}" value="1">"#,
                add_field_name(room.id, day)
            )
        };
        let _ = write!(cells, "<td>{cell}</td>");
    }
    format!(
        r#"<h2>{name}</h2>
<table class="calendar"><tr>{head}</tr><tr>{cells}</tr></table>"#,
        name = escape(&room.name)
    )
}

/// Month grid for every room. Ticked boxes are blocked days.
pub fn calendar(ctx: &PageContext, month: YearMonth, rooms: &[(Room, CalendarSnapshot)]) -> String {
    let prev = month.prev();
    let next = month.next();
    let mut tables = String::new();
    for (room, snap) in rooms {
        tables.push_str(&room_month_table(room, month, snap));
    }
    let body = format!(
        r#"<h1>Reservations calendar</h1>
<p><a href="{prev_path}">&lt;&lt; {prev}</a> <strong>{month}</strong> <a href="{next_path}">{next} &gt;&gt;</a></p>
<form action="/admin/reservations-calendar" method="post">
{csrf}
<input type="hidden" name="y" value="{year}">
<input type="hidden" name="m" value="{mm}">
{tables}
<label>Days per new block <input type="number" name="block_count" value="1" min="1"></label>
<button type="submit">Save changes</button>
</form>"#,
        prev_path = escape(&prev.calendar_path()),
        next_path = escape(&next.calendar_path()),
        csrf = ctx.csrf_field(),
        year = month.year,
        mm = month.month,
    );
    layout(ctx, "Reservations calendar", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn calendar_cells_reflect_snapshot() {
        let room = Room {
            id: Ulid::new(),
            name: "General's Quarters".into(),
        };
        let month = YearMonth::new(2024, 2).unwrap();
        let mut snap = CalendarSnapshot::empty(room.id, month, 0);
        let day = |n| month.first_day().with_day(n).unwrap();
        snap.blocks.insert(day(3), Some(Ulid::new()));
        let res = Ulid::new();
        snap.reservations.insert(day(10), Some(res));

        let html = calendar(&PageContext::default(), month, &[(room.clone(), snap)]);
        let kept = remove_field_name(room.id, day(3));
        assert!(html.contains(&format!(r#"name="{kept}" value="1" checked"#)));
        assert!(html.contains(&add_field_name(room.id, day(4))));
        assert!(!html.contains(&add_field_name(room.id, day(10))));
        assert!(html.contains(&format!("/admin/reservations/cal/{res}?y=2024&amp;m=02")));
        assert!(html.contains(r#"name="m" value="2""#));
        assert_eq!(html.matches(r#"type="checkbox""#).count(), 28);
    }

    #[test]
    fn blocked_and_booked_day_keeps_its_checkbox() {
        let room = Room {
            id: Ulid::new(),
            name: "Major's Suite".into(),
        };
        let month = YearMonth::new(2024, 3).unwrap();
        let mut snap = CalendarSnapshot::empty(room.id, month, 0);
        let day = month.first_day().with_day(20).unwrap();
        let res = Ulid::new();
        snap.blocks.insert(day, Some(Ulid::new()));
        snap.reservations.insert(day, Some(res));

        let html = calendar(&PageContext::default(), month, &[(room.clone(), snap)]);
        let kept = remove_field_name(room.id, day);
        assert!(html.contains(&format!(r#"name="{kept}" value="1" checked><a class="booked""#)));
        assert!(html.contains(&format!("/admin/reservations/cal/{res}?")));
        assert_eq!(html.matches(r#"type="checkbox""#).count(), 31);
    }
}
