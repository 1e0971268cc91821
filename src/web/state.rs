use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::config::Config;
use crate::mail::Mailer;
use crate::session::SessionStore;
use crate::store::Store;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub sessions: Arc<SessionStore>,
    pub mailer: Mailer,
    pub config: Arc<Config>,
    /// Permits for requests in flight.
    pub in_flight: Arc<Semaphore>,
}

impl AppState {
    pub fn new(store: Arc<Store>, sessions: Arc<SessionStore>, mailer: Mailer, config: Arc<Config>) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.max_connections.max(1)));
        Self {
            store,
            sessions,
            mailer,
            config,
            in_flight,
        }
    }
}
