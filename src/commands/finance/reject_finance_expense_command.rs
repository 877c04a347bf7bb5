use crate::{
    auth::{RequestContext, Role},
    commands::{emit, find_record, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{expense_record, DocumentStatus, ExpenseStatus, FinanceStatus},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts};
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_city_access, ensure_in_finance_queue};

lazy_static! {
    static ref FINANCE_REJECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("epv_finance_rejections_total", "Expenses rejected by finance"),
        &["kind"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinanceRejectionKind {
    /// The submitter can answer with supplementary documents.
    UploadMissing,
    /// The submitter has to file a new EPV.
    RestartProcess,
}

/// Rejection text stored on the record.
pub fn format_rejection_reason(
    reason: &str,
    rejected_by: &str,
    at: DateTime<Utc>,
    kind: FinanceRejectionKind,
) -> String {
    let action = match kind {
        FinanceRejectionKind::UploadMissing => "Upload missing documents",
        FinanceRejectionKind::RestartProcess => "Create a new EPV",
    };
    format!(
        "[FINANCE REJECTION] {}\n\nRejected by: {}\nRejected on: {}\n\nAction Required: {}",
        reason,
        rejected_by,
        at.format("%Y-%m-%d %H:%M:%S"),
        action
    )
}

/// Finance sends an approved expense back to its submitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectFinanceExpenseCommand {
    pub record_id: Uuid,
    pub actor: RequestContext,
    pub reason: String,
    pub kind: FinanceRejectionKind,
}

#[async_trait::async_trait]
impl Command for RejectFinanceExpenseCommand {
    type Result = expense_record::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(record_id = %self.record_id, kind = %self.kind))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor.require_role(&[Role::Finance], "reject expenses")?;
        let reason = required_text(&self.reason, "Rejection reason")?;

        let txn = db_pool.begin().await?;
        let record = find_record(&txn, self.record_id).await?;
        ensure_in_finance_queue(&record)?;
        ensure_city_access(&txn, &self.actor, &record).await?;

        let now = Utc::now();
        let old_status = record.status;
        let mut active: expense_record::ActiveModel = record.into();
        active.status = Set(ExpenseStatus::Rejected);
        match self.kind {
            FinanceRejectionKind::UploadMissing => {
                active.finance_status = Set(Some(FinanceStatus::PendingDocuments));
                active.document_status = Set(DocumentStatus::PendingAdditionalDocuments);
                active.requested_documents = Set(Some(reason.clone()));
            }
            FinanceRejectionKind::RestartProcess => {
                active.finance_status = Set(Some(FinanceStatus::Rejected));
                active.document_status = Set(DocumentStatus::Complete);
            }
        }
        active.rejection_reason = Set(Some(format_rejection_reason(
            &reason,
            &self.actor.email,
            now,
            self.kind,
        )));
        active.being_processed_by = Set(None);
        active.processing_started_at = Set(None);
        active.updated_at = Set(now);
        let record = active.update(&txn).await?;
        txn.commit().await?;

        info!(epv_id = %record.epv_id, kind = %self.kind, "Expense rejected by finance");
        emit(
            &event_sender,
            vec![
                Event::FinanceExpenseRejected {
                    record_id: record.id,
                    kind: self.kind.to_string(),
                },
                Event::ExpenseStatusChanged {
                    record_id: record.id,
                    old_status,
                    new_status: record.status,
                },
            ],
        )
        .await?;

        FINANCE_REJECTIONS
            .with_label_values(&[self.kind.to_string().as_str()])
            .inc();
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reason_carries_actor_time_and_next_step() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let text = format_rejection_reason(
            "Bill is illegible",
            "fin@x.org",
            at,
            FinanceRejectionKind::UploadMissing,
        );
        assert_eq!(
            text,
            "[FINANCE REJECTION] Bill is illegible\n\nRejected by: fin@x.org\nRejected on: 2024-03-05 14:07:09\n\nAction Required: Upload missing documents"
        );
        assert!(format_rejection_reason("x", "f", at, FinanceRejectionKind::RestartProcess)
            .ends_with("Action Required: Create a new EPV"));
    }

    #[test]
    fn kinds_use_wire_names() {
        assert_eq!(FinanceRejectionKind::UploadMissing.to_string(), "upload_missing");
        let parsed: FinanceRejectionKind = serde_json::from_str("\"restart_process\"").unwrap();
        assert_eq!(parsed, FinanceRejectionKind::RestartProcess);
    }
}
