use crate::{
    auth::{RequestContext, Role},
    commands::{emit, find_record, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{approval, expense_record, ApprovalStatus, DocumentStatus, ExpenseStatus, FinanceStatus},
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

pub(crate) const DOCUMENT_ROLES: &[Role] = &[Role::Finance, Role::FinanceApprover, Role::SuperAdmin];

lazy_static! {
    static ref DOCUMENT_REQUESTS: IntCounter = IntCounter::new(
        "epv_document_requests_total",
        "Additional document requests sent to submitters"
    )
    .expect("metric can be created");
}

/// Sends an approved record back to its submitter for more paperwork.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestDocumentsCommand {
    pub record_id: Uuid,
    pub actor: RequestContext,
    pub requested_documents: String,
}

#[async_trait::async_trait]
impl Command for RequestDocumentsCommand {
    type Result = expense_record::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(record_id = %self.record_id, actor = %self.actor.email))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor.require_role(DOCUMENT_ROLES, "request additional documents")?;
        let requested = required_text(&self.requested_documents, "Requested documents description")?;

        let txn = db_pool.begin().await?;
        let record = find_record(&txn, self.record_id).await?;
        if !record.is_in_finance_queue() {
            return Err(ServiceError::Conflict(format!(
                "Documents can only be requested for approved expenses awaiting finance; {} is {}",
                record.epv_id, record.status
            )));
        }

        let now = Utc::now();
        let old_status = record.status;
        let mut active: expense_record::ActiveModel = record.into();
        active.document_status = Set(DocumentStatus::PendingAdditionalDocuments);
        active.finance_status = Set(Some(FinanceStatus::PendingDocuments));
        active.status = Set(ExpenseStatus::Rejected);
        active.requested_documents = Set(Some(requested.clone()));
        active.being_processed_by = Set(None);
        active.processing_started_at = Set(None);
        active.updated_at = Set(now);
        let record = active.update(&txn).await?;

        approval::ActiveModel {
            id: Set(Uuid::new_v4()),
            expense_record_id: Set(record.id),
            allocation_id: Set(None),
            approver_email: Set(self.actor.email.clone()),
            approver_name: Set(Some(self.actor.name.clone())),
            status: Set(ApprovalStatus::DocumentsRequested),
            action_date: Set(Some(now)),
            comments: Set(Some(requested)),
            token: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(epv_id = %record.epv_id, "Additional documents requested");
        emit(
            &event_sender,
            vec![
                Event::DocumentsRequested(record.id),
                Event::ExpenseStatusChanged {
                    record_id: record.id,
                    old_status,
                    new_status: record.status,
                },
            ],
        )
        .await?;

        DOCUMENT_REQUESTS.inc();
        Ok(record)
    }
}
