use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use slog::Logger;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Outcome of handing one email to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReceipt {
    pub success: bool,
    /// Message id on success, error text otherwise.
    pub detail: String,
}

impl DeliveryReceipt {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            detail: message_id.into(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            detail: error.into(),
        }
    }
}

/// Email transport for workflow notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, NotifierError>;
}

fn check_recipient(recipient: &str) -> Result<(), NotifierError> {
    if recipient.contains('@') && !recipient.trim().is_empty() {
        Ok(())
    } else {
        Err(NotifierError::InvalidRecipient(recipient.to_string()))
    }
}

/// Writes every email to the audit log and reports success.
pub struct LoggingNotifier {
    logger: Logger,
}

impl LoggingNotifier {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, NotifierError> {
        check_recipient(recipient)?;
        let message_id = Uuid::new_v4().to_string();
        slog::info!(
            self.logger,
            "email dispatched";
            "to" => recipient.to_string(),
            "subject" => subject.to_string(),
            "bytes" => html_body.len(),
            "message_id" => message_id.clone(),
        );
        Ok(DeliveryReceipt::delivered(message_id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub html_body: String,
    pub sent_at: DateTime<Utc>,
}

/// Keeps delivered emails in memory. Can be switched into a failing mode.
#[derive(Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().clone()
    }

    pub fn sent_to(&self, recipient: &str) -> Vec<SentEmail> {
        self.sent
            .lock()
            .iter()
            .filter(|m| m.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<DeliveryReceipt, NotifierError> {
        check_recipient(recipient)?;
        if self.failing.load(Ordering::SeqCst) {
            return Ok(DeliveryReceipt::failed("mail relay unavailable"));
        }
        self.sent.lock().push(SentEmail {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            sent_at: Utc::now(),
        });
        Ok(DeliveryReceipt::delivered(Uuid::new_v4().to_string()))
    }
}
