use crate::{
    auth::RequestContext,
    commands::{emit, find_record, Command, DocumentLocator},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        approval, expense_record, supplementary_document, ApprovalStatus, DocumentStatus,
        ExpenseStatus, FinanceStatus,
    },
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::request_documents_command::DOCUMENT_ROLES;

pub const SYSTEM_APPROVER_NAME: &str = "System";

lazy_static! {
    static ref SUPPLEMENTARY_UPLOADS: IntCounter = IntCounter::new(
        "epv_supplementary_uploads_total",
        "Supplementary document batches accepted"
    )
    .expect("metric can be created");
}

/// Who may answer a document request: the submitter or finance staff.
pub fn ensure_can_upload(
    record: &expense_record::Model,
    uploader: &RequestContext,
) -> Result<(), ServiceError> {
    if !uploader.is(&record.email_id) && !DOCUMENT_ROLES.contains(&uploader.role) {
        return Err(ServiceError::Forbidden(
            "Only the submitter or finance may upload supplementary documents".to_string(),
        ));
    }
    if record.finance_status != Some(FinanceStatus::PendingDocuments) {
        return Err(ServiceError::Conflict(format!(
            "Expense {} is not waiting for additional documents",
            record.epv_id
        )));
    }
    Ok(())
}

/// A file already written to local storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredSupplement {
    pub filename: String,
    pub file_path: String,
    pub drive_file_id: Option<String>,
    pub description: Option<String>,
}

/// Records stored supplementary files and hands the record back to finance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadSupplementaryCommand {
    pub record_id: Uuid,
    pub uploader: RequestContext,
    pub files: Vec<StoredSupplement>,
    /// Replacement locator when the merged artifact was rebuilt.
    pub document: Option<DocumentLocator>,
    pub system_approver_email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupplementsRecorded {
    pub record: expense_record::Model,
    pub documents: Vec<supplementary_document::Model>,
}

#[async_trait::async_trait]
impl Command for UploadSupplementaryCommand {
    type Result = SupplementsRecorded;

    #[instrument(skip(self, db_pool, event_sender), fields(record_id = %self.record_id, files = self.files.len()))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        if self.files.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one file is required".to_string(),
            ));
        }

        let txn = db_pool.begin().await?;
        let record = find_record(&txn, self.record_id).await?;
        ensure_can_upload(&record, &self.uploader)?;

        let now = Utc::now();
        let mut documents = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let doc = supplementary_document::ActiveModel {
                id: Set(Uuid::new_v4()),
                expense_record_id: Set(record.id),
                filename: Set(file.filename.clone()),
                file_path: Set(file.file_path.clone()),
                drive_file_id: Set(file.drive_file_id.clone()),
                uploaded_by: Set(self.uploader.email.clone()),
                uploaded_on: Set(now),
                description: Set(file.description.clone()),
            }
            .insert(&txn)
            .await?;
            documents.push(doc);
        }

        let old_status = record.status;
        let mut active: expense_record::ActiveModel = record.into();
        if let Some(doc) = &self.document {
            active.file_url = Set(doc.file_url.clone());
            active.drive_file_id = Set(doc.drive_file_id.clone());
            active.document_path = Set(doc.document_path.clone());
        }
        active.document_status = Set(DocumentStatus::DocumentsUploaded);
        active.finance_status = Set(Some(FinanceStatus::Pending));
        active.status = Set(ExpenseStatus::Approved);
        active.updated_at = Set(now);
        let record = active.update(&txn).await?;

        approval::ActiveModel {
            id: Set(Uuid::new_v4()),
            expense_record_id: Set(record.id),
            allocation_id: Set(None),
            approver_email: Set(self.system_approver_email.clone()),
            approver_name: Set(Some(SYSTEM_APPROVER_NAME.to_string())),
            status: Set(ApprovalStatus::Resubmitted),
            action_date: Set(Some(now)),
            comments: Set(Some(format!(
                "{} supplementary document(s) uploaded by {}",
                documents.len(),
                self.uploader.email
            ))),
            token: Set(None),
            created_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(epv_id = %record.epv_id, files = documents.len(), "Supplementary documents recorded");
        emit(
            &event_sender,
            vec![
                Event::SupplementaryDocumentsUploaded {
                    record_id: record.id,
                    file_count: documents.len(),
                },
                Event::ExpenseStatusChanged {
                    record_id: record.id,
                    old_status,
                    new_status: record.status,
                },
            ],
        )
        .await?;

        SUPPLEMENTARY_UPLOADS.inc();
        Ok(SupplementsRecorded { record, documents })
    }
}
