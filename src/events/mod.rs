use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::{ApprovalStatus, ExpenseStatus, FinanceEntryStatus};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Committed workflow transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    ExpenseSubmitted {
        record_id: Uuid,
        epv_id: String,
    },
    SentForApproval {
        record_id: Uuid,
        approver_count: usize,
    },
    SplitInvoiceCreated {
        master_id: Uuid,
        sub_invoice_ids: Vec<Uuid>,
    },
    ApprovalDecided {
        record_id: Uuid,
        approval_id: Uuid,
        decision: ApprovalStatus,
    },
    ExpenseStatusChanged {
        record_id: Uuid,
        old_status: ExpenseStatus,
        new_status: ExpenseStatus,
    },
    DocumentsRequested(Uuid),
    SupplementaryDocumentsUploaded {
        record_id: Uuid,
        file_count: usize,
    },
    ProcessingClaimed {
        record_id: Uuid,
        holder: String,
    },
    ProcessingReleased(Uuid),
    FinanceEntryCreated {
        entry_id: Uuid,
        record_id: Uuid,
    },
    FinanceEntryReviewed {
        entry_id: Uuid,
        status: FinanceEntryStatus,
    },
    PaymentDetailsRecorded {
        entry_id: Uuid,
        processing_days: i64,
        sop_exceeded: bool,
    },
    FinanceExpenseRejected {
        record_id: Uuid,
        kind: String,
    },
    CityAssignmentChanged {
        assignment_id: Uuid,
        city: String,
        is_active: bool,
    },
    MasterDataChanged {
        kind: String,
        id: Uuid,
        is_active: bool,
    },
    FinanceSettingChanged {
        setting_name: String,
        previous_value: Option<String>,
        new_value: String,
    },

    // Generic event for custom messages
    Generic {
        message: String,
        timestamp: DateTime<Utc>,
        metadata: serde_json::Value,
    },
}

impl Event {
    /// Create a generic event with string data
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// Drains the event channel, logging each transition.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ExpenseStatusChanged {
                record_id,
                old_status,
                new_status,
            } => {
                info!(%record_id, %old_status, %new_status, "Expense status changed");
            }
            Event::PaymentDetailsRecorded {
                entry_id,
                processing_days,
                sop_exceeded: true,
            } => {
                warn!(
                    %entry_id,
                    processing_days,
                    "Payment recorded after the processing SOP window"
                );
            }
            Event::FinanceExpenseRejected { record_id, kind } => {
                warn!(%record_id, kind = %kind, "Finance rejected expense");
            }
            Event::FinanceSettingChanged {
                setting_name,
                previous_value,
                new_value,
            } => {
                info!(
                    setting = %setting_name,
                    previous = ?previous_value,
                    new = %new_value,
                    "Finance setting changed"
                );
            }
            other => {
                info!(event = ?other, "Workflow event");
            }
        }
    }

    warn!("Event processing loop has ended");
}
