pub mod auth;
pub mod calendar;
pub mod config;
pub mod limits;
pub mod mail;
pub mod model;
pub mod observability;
pub mod reaper;
pub mod session;
pub mod store;
pub mod wal;
pub mod web;
