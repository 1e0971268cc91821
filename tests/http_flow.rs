use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use http_body_util::BodyExt;
use tower::ServiceExt;
use ulid::Ulid;

use innkeep::auth;
use innkeep::config::Config;
use innkeep::mail::{MailTemplates, Mailer, MemoryTransport};
use innkeep::session::SessionStore;
use innkeep::store::Store;
use innkeep::web::{build_router, state::AppState};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct horse battery";

// ── Test infrastructure ──────────────────────────────────────

struct TestApp {
    router: Router,
    store: Arc<Store>,
    mail: Arc<MemoryTransport>,
}

async fn start_app(with_admin: bool) -> TestApp {
    let dir = std::env::temp_dir().join(format!("innkeep_http_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = Arc::new(Config {
        data_dir: dir.clone(),
        templates_dir: dir.join("templates"),
        ..Config::default()
    });

    let store = Arc::new(Store::open(config.wal_path(), config.store_timeout).unwrap());
    store
        .seed_rooms_if_empty(&["General's Quarters", "Major's Suite"])
        .await
        .unwrap();
    if with_admin {
        auth::seed_administrator(&store, ADMIN_EMAIL, ADMIN_PASSWORD)
            .await
            .unwrap();
    }

    let mail = Arc::new(MemoryTransport::default());
    let mailer = Mailer::spawn(
        MailTemplates::new(&config.templates_dir, false),
        mail.clone(),
    );
    let sessions = Arc::new(SessionStore::new(config.session_lifetime));
    let state = AppState::new(store.clone(), sessions, mailer, config);
    TestApp {
        router: build_router(state),
        store,
        mail,
    }
}

struct Reply {
    status: StatusCode,
    location: Option<String>,
    body: String,
}

/// A browser stand-in: remembers the session cookie between requests.
struct Visitor {
    router: Router,
    cookie: Option<String>,
}

impl Visitor {
    fn new(app: &TestApp) -> Self {
        Self {
            router: app.router.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, mut req: Request<Body>) -> Reply {
        if let Some(c) = &self.cookie {
            req.headers_mut().insert(COOKIE, c.parse().unwrap());
        }
        let resp = self.router.clone().oneshot(req).await.unwrap();
        if let Some(set) = resp.headers().get(SET_COOKIE) {
            let pair = set.to_str().unwrap().split(';').next().unwrap().to_string();
            self.cookie = Some(pair);
        }
        let status = resp.status();
        let location = resp
            .headers()
            .get(LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        Reply {
            status,
            location,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    async fn get(&mut self, path: &str) -> Reply {
        self.send(Request::get(path).body(Body::empty()).unwrap()).await
    }

    async fn post(&mut self, path: &str, fields: &[(&str, &str)]) -> Reply {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let req = Request::post(path)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(req).await
    }

    /// Load a page and pull the CSRF token out of its form.
    async fn csrf_from(&mut self, path: &str) -> String {
        let page = self.get(path).await;
        assert_eq!(page.status, StatusCode::OK, "{path}");
        extract_after(&page.body, r#"name="csrf_token" value=""#)
    }

    async fn login(&mut self) {
        let csrf = self.csrf_from("/user/login").await;
        let resp = self
            .post(
                "/user/login",
                &[("csrf_token", &csrf), ("email", ADMIN_EMAIL), ("password", ADMIN_PASSWORD)],
            )
            .await;
        assert_eq!(resp.status, StatusCode::SEE_OTHER);
        assert_eq!(resp.location.as_deref(), Some("/admin/dashboard"));
    }
}

fn extract_after(haystack: &str, marker: &str) -> String {
    let start = haystack.find(marker).unwrap_or_else(|| panic!("{marker} not in page")) + marker.len();
    haystack[start..].split('"').next().unwrap().to_string()
}

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

async fn room_id(store: &Store, name: &str) -> Ulid {
    store
        .all_rooms()
        .await
        .unwrap()
        .into_iter()
        .find(|r| r.name == name)
        .unwrap()
        .id
}

// ── Guest booking ────────────────────────────────────────────

#[tokio::test]
async fn guest_books_a_room_end_to_end() {
    let app = start_app(false).await;
    let mut guest = Visitor::new(&app);

    let home = guest.get("/").await;
    assert_eq!(home.status, StatusCode::OK);
    assert!(home.body.contains("General&#39;s Quarters"));
    assert!(guest.cookie.is_some());

    let csrf = guest.csrf_from("/search-availability").await;
    let found = guest
        .post(
            "/search-availability",
            &[("csrf_token", &csrf), ("start", "2030-06-01"), ("end", "2030-06-04")],
        )
        .await;
    assert_eq!(found.status, StatusCode::OK);
    assert!(found.body.contains("Major&#39;s Suite"));
    let chosen = extract_after(&found.body, r#"href="/choose-room/"#);

    let picked = guest.get(&format!("/choose-room/{chosen}")).await;
    assert_eq!(picked.status, StatusCode::SEE_OTHER);
    assert_eq!(picked.location.as_deref(), Some("/make-reservation"));

    let form = guest.get("/make-reservation").await;
    assert_eq!(form.status, StatusCode::OK);
    assert!(form.body.contains("Saturday 01 June 2030"));

    let booked = guest
        .post(
            "/make-reservation",
            &[
                ("csrf_token", &csrf),
                ("first_name", "Ada"),
                ("last_name", "Lovelace"),
                ("email", "ada@example.com"),
                ("phone", "555-0100"),
            ],
        )
        .await;
    assert_eq!(booked.status, StatusCode::SEE_OTHER);
    assert_eq!(booked.location.as_deref(), Some("/reservation-summary"));

    let summary = guest.get("/reservation-summary").await;
    assert_eq!(summary.status, StatusCode::OK);
    assert!(summary.body.contains("Ada Lovelace"));

    // The summary is shown once
    let again = guest.get("/reservation-summary").await;
    assert_eq!(again.status, StatusCode::SEE_OTHER);
    assert_eq!(again.location.as_deref(), Some("/"));

    let room = Ulid::from_string(&chosen).unwrap();
    assert!(!app
        .store
        .is_room_available(d("2030-06-02"), d("2030-06-03"), room)
        .await
        .unwrap());
    // Departure day is free for the next guest
    assert!(app
        .store
        .is_room_available(d("2030-06-04"), d("2030-06-06"), room)
        .await
        .unwrap());

    for _ in 0..200 {
        if app.mail.sent().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let sent = app.mail.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().any(|m| m.to == "ada@example.com" && m.html_body.contains("Dear Ada")));
}

#[tokio::test]
async fn invalid_guest_form_is_shown_again() {
    let app = start_app(false).await;
    let room = room_id(&app.store, "Major's Suite").await;
    let mut guest = Visitor::new(&app);

    let go = guest
        .get(&format!("/book-room?id={room}&s=2030-08-01&e=2030-08-03"))
        .await;
    assert_eq!(go.location.as_deref(), Some("/make-reservation"));
    let csrf = guest.csrf_from("/make-reservation").await;

    let resp = guest
        .post(
            "/make-reservation",
            &[("csrf_token", &csrf), ("first_name", "A"), ("last_name", ""), ("email", "nope")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.body.contains("at least 2 characters"));
    assert!(resp.body.contains("This field is required"));
    assert!(app.store.all_reservations().await.unwrap().is_empty());
}

#[tokio::test]
async fn taken_room_sends_guest_back_to_search() {
    let app = start_app(false).await;
    let room = room_id(&app.store, "General's Quarters").await;
    let mut guest = Visitor::new(&app);

    guest
        .get(&format!("/book-room?id={room}&s=2030-09-01&e=2030-09-05"))
        .await;
    let csrf = guest.csrf_from("/make-reservation").await;

    // Someone else gets there first
    app.store
        .insert_owner_block(room, d("2030-09-03"), d("2030-09-03"))
        .await
        .unwrap();

    let resp = guest
        .post(
            "/make-reservation",
            &[
                ("csrf_token", &csrf),
                ("first_name", "Grace"),
                ("last_name", "Hopper"),
                ("email", "grace@example.com"),
            ],
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/search-availability"));
    let page = guest.get("/search-availability").await;
    assert!(page.body.contains("just been taken"));
}

#[tokio::test]
async fn no_availability_flashes_error() {
    let app = start_app(false).await;
    for name in ["General's Quarters", "Major's Suite"] {
        let room = room_id(&app.store, name).await;
        app.store
            .insert_owner_block(room, d("2030-10-01"), d("2030-10-20"))
            .await
            .unwrap();
    }
    let mut guest = Visitor::new(&app);
    let csrf = guest.csrf_from("/search-availability").await;
    let resp = guest
        .post(
            "/search-availability",
            &[("csrf_token", &csrf), ("start", "2030-10-05"), ("end", "2030-10-07")],
        )
        .await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    let page = guest.get("/search-availability").await;
    assert!(page.body.contains("no availability"));
}

#[tokio::test]
async fn availability_json_answers_for_one_room() {
    let app = start_app(false).await;
    let room = room_id(&app.store, "Major's Suite").await;
    app.store
        .insert_owner_block(room, d("2030-03-01"), d("2030-03-10"))
        .await
        .unwrap();

    let mut guest = Visitor::new(&app);
    let csrf = guest.csrf_from(&format!("/rooms/{room}")).await;
    let room_str = room.to_string();

    let blocked = guest
        .post(
            "/search-availability-json",
            &[("csrf_token", &csrf), ("room_id", &room_str), ("start", "2030-03-10"), ("end", "2030-03-12")],
        )
        .await;
    let json: serde_json::Value = serde_json::from_str(&blocked.body).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["room_id"], room_str);

    let free = guest
        .post(
            "/search-availability-json",
            &[("csrf_token", &csrf), ("room_id", &room_str), ("start", "2030-03-11"), ("end", "2030-03-12")],
        )
        .await;
    let json: serde_json::Value = serde_json::from_str(&free.body).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["start_date"], "2030-03-11");
}

#[tokio::test]
async fn post_without_csrf_token_is_rejected() {
    let app = start_app(false).await;
    let mut guest = Visitor::new(&app);
    guest.get("/").await;
    let resp = guest
        .post("/search-availability", &[("start", "2030-06-01"), ("end", "2030-06-04")])
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);

    let forged = guest
        .post(
            "/search-availability",
            &[("csrf_token", "x"), ("start", "2030-06-01"), ("end", "2030-06-04")],
        )
        .await;
    assert_eq!(forged.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_room_page_is_not_found() {
    let app = start_app(false).await;
    let mut guest = Visitor::new(&app);
    assert_eq!(guest.get(&format!("/rooms/{}", Ulid::new())).await.status, StatusCode::NOT_FOUND);
    assert_eq!(guest.get("/rooms/not-a-ulid").await.status, StatusCode::NOT_FOUND);
}

// ── Administration ───────────────────────────────────────────

#[tokio::test]
async fn admin_pages_require_login() {
    let app = start_app(true).await;
    let mut visitor = Visitor::new(&app);
    let resp = visitor.get("/admin/dashboard").await;
    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location.as_deref(), Some("/user/login"));

    let csrf = visitor.csrf_from("/user/login").await;
    let wrong = visitor
        .post(
            "/user/login",
            &[("csrf_token", &csrf), ("email", ADMIN_EMAIL), ("password", "wrong")],
        )
        .await;
    assert_eq!(wrong.location.as_deref(), Some("/user/login"));
    let page = visitor.get("/user/login").await;
    assert!(page.body.contains("Invalid login credentials"));
}

#[tokio::test]
async fn login_rotates_session_and_logout_ends_it() {
    let app = start_app(true).await;
    let mut admin = Visitor::new(&app);
    admin.get("/").await;
    let before = admin.cookie.clone();
    admin.login().await;
    assert_ne!(admin.cookie, before);

    assert_eq!(admin.get("/admin/dashboard").await.status, StatusCode::OK);
    let out = admin.get("/user/logout").await;
    assert_eq!(out.location.as_deref(), Some("/user/login"));
    assert_eq!(admin.get("/admin/dashboard").await.status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn admin_calendar_edit_round_trip() {
    let app = start_app(true).await;
    let general = room_id(&app.store, "General's Quarters").await;
    let major = room_id(&app.store, "Major's Suite").await;
    app.store
        .insert_owner_block(general, d("2030-07-03"), d("2030-07-04"))
        .await
        .unwrap();

    let mut admin = Visitor::new(&app);
    admin.login().await;

    let page = admin.get("/admin/reservations-calendar?y=2030&m=07").await;
    assert_eq!(page.status, StatusCode::OK);
    assert!(page.body.contains(&format!(r#"name="remove_blocked_{general}_2030-07-03" value="1" checked"#)));
    let csrf = extract_after(&page.body, r#"name="csrf_token" value=""#);

    // Untick the General's block, add a two-day block to the Major's Suite
    let add = format!("add_blocked_{major}_2030-07-10");
    let saved = admin
        .post(
            "/admin/reservations-calendar",
            &[("csrf_token", &csrf), ("y", "2030"), ("m", "7"), ("block_count", "2"), (&add, "1")],
        )
        .await;
    assert_eq!(saved.status, StatusCode::SEE_OTHER);
    assert_eq!(
        saved.location.as_deref(),
        Some("/admin/reservations-calendar?y=2030&m=07")
    );

    let july = (d("2030-07-01"), d("2030-07-31"));
    let general_left = app
        .store
        .restrictions_for_room_in_range(general, july.0, july.1)
        .await
        .unwrap();
    assert!(general_left.is_empty());
    let major_blocks = app
        .store
        .restrictions_for_room_in_range(major, july.0, july.1)
        .await
        .unwrap();
    assert_eq!(major_blocks.len(), 1);
    assert_eq!(major_blocks[0].span.start, d("2030-07-10"));
    assert_eq!(major_blocks[0].span.end, d("2030-07-11"));

    let reloaded = admin.get("/admin/reservations-calendar?y=2030&m=07").await;
    assert!(reloaded.body.contains("Changes saved"));
    assert!(reloaded.body.contains(&format!(r#"name="remove_blocked_{major}_2030-07-11" value="1" checked"#)));
}

#[tokio::test]
async fn resubmitting_an_old_calendar_keeps_blocks() {
    let app = start_app(true).await;
    let major = room_id(&app.store, "Major's Suite").await;
    app.store
        .insert_owner_block(major, d("2030-07-20"), d("2030-07-20"))
        .await
        .unwrap();

    let mut admin = Visitor::new(&app);
    admin.login().await;
    let page = admin.get("/admin/reservations-calendar?y=2030&m=07").await;
    let csrf = extract_after(&page.body, r#"name="csrf_token" value=""#);
    let keep = format!("remove_blocked_{major}_2030-07-20");

    let first = admin
        .post(
            "/admin/reservations-calendar",
            &[("csrf_token", &csrf), ("y", "2030"), ("m", "07"), (&keep, "1")],
        )
        .await;
    assert_eq!(first.status, StatusCode::SEE_OTHER);

    // Same form again: the snapshot was used up, so nothing may be removed
    let second = admin
        .post(
            "/admin/reservations-calendar",
            &[("csrf_token", &csrf), ("y", "2030"), ("m", "07")],
        )
        .await;
    assert_eq!(second.status, StatusCode::SEE_OTHER);
    let left = app
        .store
        .restrictions_for_room_in_range(major, d("2030-07-01"), d("2030-07-31"))
        .await
        .unwrap();
    assert_eq!(left.len(), 1);

    let reloaded = admin.get("/admin/reservations-calendar?y=2030&m=07").await;
    assert!(reloaded.body.contains("had changed since the calendar was loaded"));
}

#[tokio::test]
async fn admin_processes_and_deletes_a_reservation() {
    let app = start_app(true).await;
    let room = room_id(&app.store, "Major's Suite").await;
    let guest = innkeep::model::GuestDetails {
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        email: "ada@example.com".into(),
        phone: String::new(),
    };
    let res = app
        .store
        .insert_reservation(room, guest, d("2030-05-01"), d("2030-05-03"))
        .await
        .unwrap();

    let mut admin = Visitor::new(&app);
    admin.login().await;

    let list = admin.get("/admin/reservations-new").await;
    assert!(list.body.contains(&format!("/admin/reservations/new/{}", res.id)));

    let show = admin.get(&format!("/admin/reservations/new/{}", res.id)).await;
    assert_eq!(show.status, StatusCode::OK);
    let csrf = extract_after(&show.body, r#"name="csrf_token" value=""#);
    let edited = admin
        .post(
            &format!("/admin/reservations/new/{}", res.id),
            &[
                ("csrf_token", &csrf),
                ("first_name", "Augusta"),
                ("last_name", "King"),
                ("email", "augusta@example.com"),
            ],
        )
        .await;
    assert_eq!(edited.location.as_deref(), Some("/admin/reservations-new"));
    let info = app.store.reservation(res.id).await.unwrap();
    assert_eq!(info.reservation.guest.first_name, "Augusta");

    let show = admin.get(&format!("/admin/reservations/new/{}", res.id)).await;
    let process_path = format!("/admin/process-reservation/new/{}", res.id);
    assert!(show.body.contains(&format!(r#"action="{process_path}" method="post""#)));
    let as_link = admin.get(&process_path).await;
    assert_eq!(as_link.status, StatusCode::METHOD_NOT_ALLOWED);
    let forged = admin.post(&process_path, &[]).await;
    assert_eq!(forged.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.store.new_reservations().await.unwrap().len(), 1);

    let csrf = extract_after(&show.body, r#"name="csrf_token" value=""#);
    let processed = admin.post(&process_path, &[("csrf_token", &csrf)]).await;
    assert_eq!(processed.status, StatusCode::SEE_OTHER);
    assert!(app.store.new_reservations().await.unwrap().is_empty());

    let deleted = admin
        .post(
            &format!("/admin/delete-reservation/all/{}", res.id),
            &[("csrf_token", &csrf)],
        )
        .await;
    assert_eq!(deleted.location.as_deref(), Some("/admin/reservations-all"));
    assert!(app.store.all_reservations().await.unwrap().is_empty());
    assert!(app
        .store
        .is_room_available(d("2030-05-01"), d("2030-05-03"), room)
        .await
        .unwrap());
}
