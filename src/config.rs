use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::store::DEFAULT_CALL_TIMEOUT;

/// Runtime settings, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Marks session cookies `Secure` and hides error details.
    pub production: bool,
    /// Read mail templates once and keep them in memory.
    pub template_cache: bool,
    pub templates_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub store_timeout: Duration,
    pub session_lifetime: Duration,
    /// WAL appends between compactions.
    pub compact_threshold: u64,
    pub max_connections: usize,
    /// Administrator created on first start when both are set.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
    pub mail_from: String,
    /// Where new-reservation notices go.
    pub owner_email: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            production: false,
            template_cache: false,
            templates_dir: PathBuf::from("./templates"),
            metrics_port: None,
            store_timeout: DEFAULT_CALL_TIMEOUT,
            session_lifetime: Duration::from_secs(24 * 60 * 60),
            compact_threshold: 1000,
            max_connections: 256,
            admin_email: None,
            admin_password: None,
            mail_from: "reservations@innkeep.local".into(),
            owner_email: "owner@innkeep.local".into(),
            smtp_host: "localhost".into(),
            smtp_port: 1025,
        }
    }
}

impl Config {
    /// Read settings from `INNKEEP_*` (and `SMTP_*`) variables, defaulting anything unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        let flag = |key: &str, default: bool| {
            get(key)
                .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };
        let non_empty = |key: &str| get(key).filter(|s| !s.trim().is_empty());

        Self {
            bind: non_empty("INNKEEP_BIND").unwrap_or(d.bind),
            port: parsed(&get, "INNKEEP_PORT").unwrap_or(d.port),
            data_dir: non_empty("INNKEEP_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            production: flag("INNKEEP_PRODUCTION", d.production),
            template_cache: flag("INNKEEP_TEMPLATE_CACHE", d.template_cache),
            templates_dir: non_empty("INNKEEP_TEMPLATES_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.templates_dir),
            metrics_port: parsed(&get, "INNKEEP_METRICS_PORT"),
            store_timeout: parsed(&get, "INNKEEP_STORE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.store_timeout),
            session_lifetime: parsed(&get, "INNKEEP_SESSION_LIFETIME_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.session_lifetime),
            compact_threshold: parsed(&get, "INNKEEP_COMPACT_THRESHOLD").unwrap_or(d.compact_threshold),
            max_connections: parsed(&get, "INNKEEP_MAX_CONNECTIONS").unwrap_or(d.max_connections),
            admin_email: non_empty("INNKEEP_ADMIN_EMAIL"),
            admin_password: non_empty("INNKEEP_ADMIN_PASSWORD"),
            mail_from: non_empty("INNKEEP_MAIL_FROM").unwrap_or(d.mail_from),
            owner_email: non_empty("INNKEEP_OWNER_EMAIL").unwrap_or(d.owner_email),
            smtp_host: non_empty("SMTP_HOST").unwrap_or(d.smtp_host),
            smtp_port: parsed(&get, "SMTP_PORT").unwrap_or(d.smtp_port),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("innkeep.wal")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.trim().parse().ok())
}
