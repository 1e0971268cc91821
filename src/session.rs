//! Server-side sessions: a cookie carries a random id, values live here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng as _};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::limits::MAX_SESSIONS;
use crate::observability;

pub const SESSION_COOKIE: &str = "innkeep_session";

const SESSION_ID_LEN: usize = 40;
const CSRF_TOKEN_LEN: usize = 30;

/// Key holding the logged-in administrator's id.
pub const ADMIN_ID_KEY: &str = "admin_id";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session limit reached")]
    Full,
    #[error("session value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

fn random_token(len: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

struct SessionEntry {
    values: HashMap<String, Value>,
    csrf_token: String,
    expires_at: Instant,
}

impl SessionEntry {
    fn new(lifetime: Duration) -> Self {
        Self {
            values: HashMap::new(),
            csrf_token: random_token(CSRF_TOKEN_LEN),
            expires_at: Instant::now() + lifetime,
        }
    }
}

/// All live sessions. Each expires a fixed lifetime after it was created.
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    lifetime: Duration,
}

impl SessionStore {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            lifetime,
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Resume the session named by the cookie, or start a fresh one when it is
    /// absent, unknown, or expired.
    pub fn load_or_create(self: &Arc<Self>, cookie_id: Option<&str>) -> Result<Session, SessionError> {
        if let Some(id) = cookie_id {
            let live = self
                .sessions
                .get(id)
                .map(|e| e.expires_at > Instant::now());
            match live {
                Some(true) => return Ok(self.handle(id.to_string(), false)),
                Some(false) => {
                    self.sessions.remove(id);
                }
                None => {}
            }
        }
        let id = self.insert_new()?;
        Ok(self.handle(id, true))
    }

    fn handle(self: &Arc<Self>, id: String, is_new: bool) -> Session {
        Session {
            store: self.clone(),
            id: Arc::new(Mutex::new(id)),
            changed_id: Arc::new(Mutex::new(is_new)),
        }
    }

    fn insert_new(&self) -> Result<String, SessionError> {
        if self.sessions.len() >= MAX_SESSIONS {
            self.sweep_expired();
            if self.sessions.len() >= MAX_SESSIONS {
                tracing::warn!("session limit reached");
                return Err(SessionError::Full);
            }
        }
        let id = random_token(SESSION_ID_LEN);
        self.sessions.insert(id.clone(), SessionEntry::new(self.lifetime));
        metrics::gauge!(observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        Ok(id)
    }

    /// Drop every expired session. Returns how many went.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, e| e.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());
        metrics::gauge!(observability::SESSIONS_ACTIVE).set(self.sessions.len() as f64);
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Flash messages collected for the next rendered page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flashes {
    pub flash: Option<String>,
    pub warning: Option<String>,
    pub error: Option<String>,
}

/// A request's view of its session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Session {
    store: Arc<SessionStore>,
    id: Arc<Mutex<String>>,
    /// Set when the cookie must be (re)sent.
    changed_id: Arc<Mutex<bool>>,
}

impl Session {
    pub fn id(&self) -> String {
        self.id.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// True when the response has to carry a new session cookie.
    pub fn needs_cookie(&self) -> bool {
        *self.changed_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_entry<R>(&self, f: impl FnOnce(&mut SessionEntry) -> R) -> Option<R> {
        let id = self.id();
        self.store.sessions.get_mut(&id).map(|mut e| f(e.value_mut()))
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.with_entry(|e| e.values.get(key).cloned())
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let value = serde_json::to_value(value)?;
        self.with_entry(|e| e.values.insert(key.to_string(), value));
        Ok(())
    }

    pub fn remove(&self, key: &str) {
        self.with_entry(|e| e.values.remove(key));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.with_entry(|e| e.values.contains_key(key)).unwrap_or(false)
    }

    /// Read a value and delete it in one step.
    pub fn take<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.with_entry(|e| e.values.remove(key))
            .flatten()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn flash(&self, message: impl Into<String>) {
        self.put_message("flash", message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.put_message("warning", message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.put_message("error", message.into());
    }

    fn put_message(&self, key: &str, message: String) {
        self.with_entry(|e| e.values.insert(key.to_string(), Value::String(message)));
    }

    /// Pop all pending flash messages.
    pub fn take_flashes(&self) -> Flashes {
        Flashes {
            flash: self.take("flash"),
            warning: self.take("warning"),
            error: self.take("error"),
        }
    }

    pub fn csrf_token(&self) -> String {
        self.with_entry(|e| e.csrf_token.clone()).unwrap_or_default()
    }

    /// Constant-time comparison against the session's CSRF token.
    pub fn verify_csrf(&self, presented: &str) -> bool {
        let expected = self.csrf_token();
        if expected.is_empty() || expected.len() != presented.len() {
            return false;
        }
        expected
            .bytes()
            .zip(presented.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    pub fn admin_id(&self) -> Option<ulid::Ulid> {
        self.get(ADMIN_ID_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        self.contains(ADMIN_ID_KEY)
    }

    /// Move the session's values under a fresh id and CSRF token. Called on
    /// privilege changes so an id known before login is useless after it.
    pub fn renew(&self) -> Result<(), SessionError> {
        let old = self.id();
        let values = self
            .store
            .sessions
            .remove(&old)
            .map(|(_, e)| e.values)
            .unwrap_or_default();
        let new_id = self.store.insert_new()?;
        if let Some(mut e) = self.store.sessions.get_mut(&new_id) {
            e.values = values;
        }
        *self.id.lock().unwrap_or_else(|e| e.into_inner()) = new_id;
        *self.changed_id.lock().unwrap_or_else(|e| e.into_inner()) = true;
        Ok(())
    }

    /// Forget everything and continue under a fresh id.
    pub fn destroy(&self) -> Result<(), SessionError> {
        self.store.sessions.remove(&self.id());
        let new_id = self.store.insert_new()?;
        *self.id.lock().unwrap_or_else(|e| e.into_inner()) = new_id;
        *self.changed_id.lock().unwrap_or_else(|e| e.into_inner()) = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<SessionStore> {
        Arc::new(SessionStore::new(Duration::from_secs(60)))
    }

    #[test]
    fn new_session_needs_cookie() {
        let store = store();
        let s = store.load_or_create(None).unwrap();
        assert!(s.needs_cookie());
        assert_eq!(s.id().len(), SESSION_ID_LEN);
        assert_eq!(s.csrf_token().len(), CSRF_TOKEN_LEN);

        let again = store.load_or_create(Some(&s.id())).unwrap();
        assert!(!again.needs_cookie());
        assert_eq!(again.id(), s.id());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_cookie_starts_fresh() {
        let store = store();
        let s = store.load_or_create(Some("bogus")).unwrap();
        assert_ne!(s.id(), "bogus");
        assert!(s.needs_cookie());
    }

    #[test]
    fn typed_values_and_take() {
        let store = store();
        let s = store.load_or_create(None).unwrap();
        s.put("count", &3u32).unwrap();
        assert_eq!(s.get::<u32>("count"), Some(3));
        assert_eq!(s.take::<u32>("count"), Some(3));
        assert_eq!(s.get::<u32>("count"), None);
        // Wrong type reads as absent
        s.put("name", &"ada").unwrap();
        assert_eq!(s.get::<u32>("name"), None);
    }

    #[test]
    fn flashes_pop_once() {
        let store = store();
        let s = store.load_or_create(None).unwrap();
        s.flash("Saved");
        s.error("Nope");
        let f = s.take_flashes();
        assert_eq!(f.flash.as_deref(), Some("Saved"));
        assert_eq!(f.error.as_deref(), Some("Nope"));
        assert_eq!(f.warning, None);
        assert_eq!(s.take_flashes(), Flashes::default());
    }

    #[test]
    fn csrf_verification() {
        let store = store();
        let s = store.load_or_create(None).unwrap();
        let token = s.csrf_token();
        assert!(s.verify_csrf(&token));
        assert!(!s.verify_csrf(""));
        assert!(!s.verify_csrf("x".repeat(CSRF_TOKEN_LEN).as_str()));
    }

    #[test]
    fn expired_sessions_are_swept_and_not_resumed() {
        let store = Arc::new(SessionStore::new(Duration::ZERO));
        let s = store.load_or_create(None).unwrap();
        let old = s.id();
        let resumed = store.load_or_create(Some(&old)).unwrap();
        assert_ne!(resumed.id(), old);
        assert_eq!(store.sweep_expired(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn renew_keeps_values_under_new_id() {
        let store = store();
        let s = store.load_or_create(None).unwrap();
        s.put("draft", &"kept").unwrap();
        let before = s.id();
        let token_before = s.csrf_token();
        s.renew().unwrap();
        assert_ne!(s.id(), before);
        assert_ne!(s.csrf_token(), token_before);
        assert_eq!(s.get::<String>("draft").as_deref(), Some("kept"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn destroy_forgets_values() {
        let store = store();
        let s = store.load_or_create(None).unwrap();
        s.put(ADMIN_ID_KEY, &ulid::Ulid::new()).unwrap();
        assert!(s.is_authenticated());
        s.destroy().unwrap();
        assert!(!s.is_authenticated());
        assert_eq!(store.len(), 1);
    }
}
