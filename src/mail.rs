//! Outgoing mail: handlers enqueue, a background task renders and delivers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::observability;

const CHANNEL_CAPACITY: usize = 256;
const CONTENT_PLACEHOLDER: &str = "[%content%]";

/// A message as queued by a handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailData {
    pub to: String,
    pub from: String,
    pub subject: String,
    /// HTML fragment; placed into the template when one is named.
    pub content: String,
    /// File name under the mail template directory.
    pub template: Option<String>,
}

/// A fully rendered message, ready for a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid template name {0:?}")]
    BadTemplateName(String),
    #[error("template {name}: {source}")]
    Template {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Writes each message to the log instead of sending it.
pub struct LogTransport {
    pub smtp_host: String,
    pub smtp_port: u16,
}

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            from = %mail.from,
            subject = %mail.subject,
            bytes = mail.html_body.len(),
            relay = %format!("{}:{}", self.smtp_host, self.smtp_port),
            "mail delivered to log"
        );
        Ok(())
    }
}

/// Keeps delivered messages in memory.
#[derive(Default)]
pub struct MemoryTransport {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MemoryTransport {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl MailTransport for MemoryTransport {
    async fn deliver(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(mail.clone());
        Ok(())
    }
}

/// Loads mail templates from `<templates_dir>/email/`, optionally caching them.
pub struct MailTemplates {
    dir: PathBuf,
    cache: Option<DashMap<String, Arc<str>>>,
}

impl MailTemplates {
    pub fn new(templates_dir: &Path, use_cache: bool) -> Self {
        Self {
            dir: templates_dir.join("email"),
            cache: use_cache.then(DashMap::new),
        }
    }

    async fn load(&self, name: &str) -> Result<Arc<str>, MailError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(MailError::BadTemplateName(name.to_string()));
        }
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.get(name)
        {
            return Ok(hit.value().clone());
        }
        let text: Arc<str> = tokio::fs::read_to_string(self.dir.join(name))
            .await
            .map_err(|source| MailError::Template {
                name: name.to_string(),
                source,
            })?
            .into();
        if let Some(cache) = &self.cache {
            cache.insert(name.to_string(), text.clone());
        }
        Ok(text)
    }

    /// Body for `data`: its content placed in the named template, or as-is.
    pub async fn render(&self, data: &MailData) -> Result<String, MailError> {
        match &data.template {
            None => Ok(data.content.clone()),
            Some(name) => {
                let template = self.load(name).await?;
                Ok(template.replacen(CONTENT_PLACEHOLDER, &data.content, 1))
            }
        }
    }
}

/// Handle for queueing mail. Cheap to clone.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<MailData>,
}

impl Mailer {
    /// Start the delivery task and return a handle to it.
    pub fn spawn(templates: MailTemplates, transport: Arc<dyn MailTransport>) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        tokio::spawn(run_mail_listener(rx, templates, transport));
        Self { tx }
    }

    /// Queue a message. Never waits; a full queue drops the message with a warning.
    pub fn send(&self, data: MailData) {
        if let Err(e) = self.tx.try_send(data) {
            tracing::warn!(error = %e, "mail queue rejected message");
            metrics::counter!(observability::MAIL_SENT_TOTAL, "status" => "dropped").increment(1);
        }
    }
}

/// Deliver queued messages until every `Mailer` is dropped.
pub async fn run_mail_listener(
    mut rx: mpsc::Receiver<MailData>,
    templates: MailTemplates,
    transport: Arc<dyn MailTransport>,
) {
    while let Some(data) = rx.recv().await {
        let html_body = match templates.render(&data).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, to = %data.to, "mail template unavailable, sending bare content");
                data.content.clone()
            }
        };
        let mail = OutgoingMail {
            to: data.to,
            from: data.from,
            subject: data.subject,
            html_body,
        };
        match transport.deliver(&mail).await {
            Ok(()) => {
                metrics::counter!(observability::MAIL_SENT_TOTAL, "status" => "ok").increment(1);
            }
            Err(e) => {
                tracing::error!(error = %e, to = %mail.to, "mail delivery failed");
                metrics::counter!(observability::MAIL_SENT_TOTAL, "status" => "error").increment(1);
            }
        }
    }
    tracing::debug!("mail listener stopped");
}
