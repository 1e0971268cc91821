//! Server-rendered HTML. Every interpolated value goes through `escape`.

mod admin;
mod guest;

pub use admin::*;
pub use guest::*;

use std::fmt::Write as _;

use axum::http::StatusCode;

use crate::model::Day;
use crate::session::{Flashes, Session};

/// What every page needs besides its own body.
#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub flashes: Flashes,
    pub csrf_token: String,
    pub is_authenticated: bool,
}

impl PageContext {
    /// Pops the session's pending flashes.
    pub fn from_session(session: &Session) -> Self {
        Self {
            flashes: session.take_flashes(),
            csrf_token: session.csrf_token(),
            is_authenticated: session.is_authenticated(),
        }
    }

    pub fn csrf_field(&self) -> String {
        format!(
            r#"<input type="hidden" name="csrf_token" value="{}">"#,
            escape(&self.csrf_token)
        )
    }
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn iso(day: Day) -> String {
    day.format("%Y-%m-%d").to_string()
}

pub fn long_date(day: Day) -> String {
    day.format("%A %d %B %Y").to_string()
}

fn flash_block(flashes: &Flashes) -> String {
    let mut out = String::new();
    for (class, message) in [
        ("success", &flashes.flash),
        ("warning", &flashes.warning),
        ("error", &flashes.error),
    ] {
        if let Some(m) = message {
            let _ = write!(out, r#"<div class="alert alert-{class}" role="alert">{}</div>"#, escape(m));
        }
    }
    out
}

/// Wrap a page body in the site layout.
pub fn layout(ctx: &PageContext, title: &str, body: &str) -> String {
    let account = if ctx.is_authenticated {
        r#"<a href="/admin/dashboard">Admin</a> <a href="/user/logout">Logout</a>"#
    } else {
        r#"<a href="/user/login">Login</a>"#
    };
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | Fort Smythe B&amp;B</title>
</head>
<body>
<nav>
<a href="/">Home</a> <a href="/about">About</a> <a href="/search-availability">Book Now</a> <a href="/contact">Contact</a>
{account}
</nav>
<main>
{flashes}
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        flashes = flash_block(&ctx.flashes),
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let ctx = PageContext::default();
    let body = format!(
        "<h1>{}</h1><p>{}</p><p><a href=\"/\">Back to the home page</a></p>",
        status.as_u16(),
        escape(message)
    );
    layout(&ctx, status.canonical_reason().unwrap_or("Error"), &body)
}
