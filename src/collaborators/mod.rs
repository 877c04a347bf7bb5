//! External services the workflow talks to, behind async traits.

pub mod documents;
pub mod notifier;
pub mod storage;
pub mod templates;

use std::sync::Arc;

pub use documents::{ClaimSummary, DocumentError, DocumentService, LocalDocumentService, SummaryLine};
pub use notifier::{DeliveryReceipt, InMemoryNotifier, LoggingNotifier, Notifier, NotifierError, SentEmail};
pub use storage::{DriveStorage, LocalDriveStorage, StorageError};

#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub documents: Arc<dyn DocumentService>,
    pub storage: Arc<dyn DriveStorage>,
}

impl Collaborators {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        documents: Arc<dyn DocumentService>,
        storage: Arc<dyn DriveStorage>,
    ) -> Self {
        Self {
            notifier,
            documents,
            storage,
        }
    }

    /// Sends one email, folding any failure into a warning string.
    pub async fn notify(&self, recipient: &str, content: &templates::EmailContent) -> Option<String> {
        let result = crate::tracing::with_metrics("notify", || async {
            match self
                .notifier
                .send(recipient, &content.subject, &content.html_body)
                .await
            {
                Ok(receipt) if receipt.success => Ok(receipt),
                Ok(receipt) => Err(receipt.detail),
                Err(e) => Err(e.to_string()),
            }
        })
        .await;

        result
            .err()
            .map(|e| format!("Notification to {} failed: {}", recipient, e))
    }
}
