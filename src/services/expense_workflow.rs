use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde::Deserialize;
use slog::Logger;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{RequestContext, Role},
    collaborators::{templates, ClaimSummary, Collaborators, SummaryLine},
    commands::{
        documents::{
            ensure_can_upload, RequestDocumentsCommand, StoredSupplement, SupplementsRecorded,
            UploadSupplementaryCommand,
        },
        expenses::{
            create_split_invoice_command::{validate_allocations, SPLIT_EXPENSE_HEAD},
            distinct_emails,
            submit_expense_command::{validate_invoice_age, validate_lines, validate_period},
            AllocationInput, ApprovalDecision, CreateSplitInvoiceCommand, DecideApprovalCommand,
            DecisionRecorded, ExpenseLine, RoutedApprovals, SendForApprovalCommand, SplitInvoice,
            SubmitExpenseCommand, SubmittedExpense,
        },
        find_record, find_record_by_epv, Command, DocumentLocator,
    },
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    logging::audit,
    models::{approval, cost_center, employee, expense_record, finance_setting, ApprovalStatus},
    queries::{
        AllocationTotals, AllocationTotalsQuery, ExpenseDetail, GetExpenseDetailQuery,
        ListOwnExpensesQuery, Query,
    },
    tracing::with_metrics,
    workflow::{amount_in_words, identifiers, WorkflowOutcome},
};

use super::{store_upload, Upload};

#[derive(Debug, Clone, Deserialize)]
pub struct ExpenseLineRequest {
    #[serde(flatten)]
    pub line: ExpenseLine,
    pub receipt: Option<Upload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitExpenseRequest {
    pub employee_id: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub cost_center_id: Uuid,
    pub payment_to: Option<String>,
    pub city: Option<String>,
    pub lines: Vec<ExpenseLineRequest>,
    /// Routes the claim straight away when present.
    #[serde(default)]
    pub approver_emails: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SplitInvoiceRequest {
    pub employee_id: Option<String>,
    pub invoice_date: NaiveDate,
    pub total_amount: Decimal,
    pub description: Option<String>,
    pub payment_to: Option<String>,
    pub invoice: Upload,
    pub allocations: Vec<AllocationInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupplementaryUpload {
    #[serde(flatten)]
    pub file: Upload,
    pub description: Option<String>,
}

/// Submission, approval routing, token decisions and the supplementary
/// document cycle.
#[derive(Clone)]
pub struct ExpenseWorkflowService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    collaborators: Collaborators,
    config: Arc<AppConfig>,
    logger: Logger,
}

impl ExpenseWorkflowService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        collaborators: Collaborators,
        config: Arc<AppConfig>,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            collaborators,
            config,
            logger,
        }
    }

    fn record_dir(&self, epv_id: &str) -> PathBuf {
        self.config.upload_path().join(epv_id)
    }

    fn decision_links(&self, epv_id: &str, token: &str) -> (String, String) {
        let base = self.config.base_url();
        (
            format!("{}/approve-expense/{}?token={}", base, epv_id, token),
            format!("{}/reject-expense/{}?token={}", base, epv_id, token),
        )
    }

    async fn academic_year(&self) -> Result<String, ServiceError> {
        let configured = finance_setting::Entity::find_by_id(finance_setting::ACADEMIC_YEAR.to_string())
            .one(self.db_pool.as_ref())
            .await?
            .map(|s| s.setting_value.trim().to_string())
            .filter(|v| !v.is_empty());
        Ok(configured.unwrap_or_else(|| identifiers::academic_year(Utc::now())))
    }

    /// Oldest invoice date a claim may carry today, when the finance team has
    /// set a limit.
    async fn oldest_invoice_date(&self) -> Result<Option<NaiveDate>, ServiceError> {
        let limit = finance_setting::Entity::find_by_id(finance_setting::MAX_DAYS_PAST.to_string())
            .one(self.db_pool.as_ref())
            .await?
            .and_then(|s| s.setting_value.trim().parse::<i64>().ok())
            .filter(|days| *days > 0);
        Ok(limit.map(|days| Utc::now().date_naive() - chrono::Duration::days(days)))
    }

    /// Cover sheet plus attachments into one artifact. Any failure is fatal to
    /// the calling operation.
    async fn build_artifact(
        &self,
        summary: &ClaimSummary,
        attachments: Vec<PathBuf>,
    ) -> Result<PathBuf, ServiceError> {
        let documents = self.collaborators.documents.clone();
        let summary_path = with_metrics("generate_summary", || documents.generate_summary(summary))
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Summary generation failed: {}", e)))?;

        let mut inputs = vec![summary_path];
        inputs.extend(attachments);
        with_metrics("merge_documents", || documents.merge(&inputs, &summary.epv_id))
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Document merge failed: {}", e)))
    }

    /// Uploads the artifact to the drive; falls back to the local download
    /// route with a warning.
    async fn publish_artifact(
        &self,
        epv_id: &str,
        artifact: &Path,
        folder_id: Option<&str>,
        outcome_warnings: &mut Vec<String>,
    ) -> DocumentLocator {
        let storage = self.collaborators.storage.clone();
        let display_name = format!("{}.pdf", epv_id);
        let uploaded = with_metrics("drive_upload", || async {
            let file_id = storage.upload(artifact, &display_name, folder_id).await?;
            let url = storage.get_shareable_url(&file_id).await?;
            Ok::<_, crate::collaborators::StorageError>((file_id, url))
        })
        .await;

        let document_path = Some(artifact.to_string_lossy().into_owned());
        match uploaded {
            Ok((file_id, url)) => DocumentLocator {
                file_url: Some(url),
                drive_file_id: Some(file_id),
                document_path,
            },
            Err(e) => {
                warn!(epv_id, error = %e, "Drive upload failed; serving the local copy");
                outcome_warnings.push(format!("Drive upload failed, document kept locally: {}", e));
                DocumentLocator {
                    file_url: Some(format!("/files/{}", epv_id)),
                    drive_file_id: None,
                    document_path,
                }
            }
        }
    }

    async fn cleanup(&self, epv_id: &str) {
        let dir = self.record_dir(epv_id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Could not remove abandoned uploads");
            }
        }
    }

    async fn active_cost_center(&self, id: Uuid) -> Result<cost_center::Model, ServiceError> {
        cost_center::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await?
            .filter(|cc| cc.is_active)
            .ok_or_else(|| ServiceError::ValidationError(format!("Unknown cost center {}", id)))
    }

    /// Validates, builds and stores the claim documents, then persists the
    /// claim. Nothing is persisted when the documents cannot be produced.
    #[instrument(skip(self, ctx, request), fields(submitter = %ctx.email))]
    pub async fn submit_expense(
        &self,
        ctx: &RequestContext,
        request: SubmitExpenseRequest,
    ) -> Result<WorkflowOutcome<SubmittedExpense>, ServiceError> {
        validate_period(request.from_date, request.to_date)?;
        let approver_emails = if request.approver_emails.is_empty() {
            Vec::new()
        } else {
            distinct_emails(&request.approver_emails)?
        };
        let total = validate_lines(
            request
                .lines
                .iter()
                .map(|l| (&l.line, l.receipt.is_some())),
        )?;
        if let Some(oldest) = self.oldest_invoice_date().await? {
            validate_invoice_age(request.lines.iter().map(|l| &l.line), oldest)?;
        }
        let cc = self.active_cost_center(request.cost_center_id).await?;

        let now = Utc::now();
        let epv_id = identifiers::generate_epv_id(&identifiers::cost_center_code(Some(&cc.name)), now);
        let academic_year = self.academic_year().await?;
        let dir = self.record_dir(&epv_id);

        let mut lines = Vec::with_capacity(request.lines.len());
        let mut receipts = Vec::new();
        for (idx, entry) in request.lines.into_iter().enumerate() {
            let mut line = entry.line;
            line.receipt_filename = None;
            line.receipt_path = None;
            if let Some(receipt) = &entry.receipt {
                let path = match store_upload(&dir, idx + 1, receipt).await {
                    Ok(path) => path,
                    Err(e) => {
                        self.cleanup(&epv_id).await;
                        return Err(e);
                    }
                };
                line.receipt_filename = Some(receipt.filename.clone());
                line.receipt_path = Some(path.to_string_lossy().into_owned());
                receipts.push(path);
            }
            lines.push(line);
        }

        let summary = ClaimSummary {
            epv_id: epv_id.clone(),
            employee_name: ctx.name.clone(),
            employee_email: ctx.email.clone(),
            employee_id: request.employee_id.clone(),
            cost_center_name: Some(cc.name.clone()),
            from_date: request.from_date,
            to_date: request.to_date,
            payment_to: request.payment_to.clone(),
            academic_year: academic_year.clone(),
            total_amount: total,
            amount_in_words: amount_in_words(total),
            lines: lines
                .iter()
                .map(|l| SummaryLine {
                    invoice_date: l.invoice_date.unwrap_or(request.from_date),
                    expense_head: l.expense_head.clone().unwrap_or_default(),
                    description: l.description.clone(),
                    gst: l.gst,
                    amount: l.amount.unwrap_or_default(),
                })
                .collect(),
        };

        let artifact = match self.build_artifact(&summary, receipts).await {
            Ok(path) => path,
            Err(e) => {
                self.cleanup(&epv_id).await;
                return Err(e);
            }
        };

        let mut warnings = Vec::new();
        let document = self
            .publish_artifact(&epv_id, &artifact, cc.drive_folder_id.as_deref(), &mut warnings)
            .await;

        let command = SubmitExpenseCommand {
            epv_id: epv_id.clone(),
            submitter: ctx.clone(),
            employee_id: request.employee_id,
            from_date: request.from_date,
            to_date: request.to_date,
            cost_center_id: cc.id,
            payment_to: request.payment_to,
            city: request.city,
            academic_year,
            lines,
            document,
        };
        let submitted = match command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
        {
            Ok(submitted) => submitted,
            Err(e) => {
                self.cleanup(&epv_id).await;
                return Err(e);
            }
        };
        audit(&self.logger, "expense_submitted", &epv_id, &ctx.email);

        let mut outcome = WorkflowOutcome::new(submitted);
        outcome.warnings = warnings;

        if !approver_emails.is_empty() {
            let routed = self
                .send_for_approval(ctx, outcome.value.record.id, approver_emails)
                .await?;
            outcome.value.record = routed.value.record;
            outcome.warnings.extend(routed.warnings);
        }
        Ok(outcome)
    }

    /// Creates approval requests and emails each new approver their links.
    #[instrument(skip(self, ctx, approver_emails), fields(actor = %ctx.email))]
    pub async fn send_for_approval(
        &self,
        ctx: &RequestContext,
        record_id: Uuid,
        approver_emails: Vec<String>,
    ) -> Result<WorkflowOutcome<RoutedApprovals>, ServiceError> {
        let record = find_record(self.db_pool.as_ref(), record_id).await?;
        if !ctx.is(&record.email_id) && ctx.role != Role::SuperAdmin {
            return Err(ServiceError::Forbidden(
                "Only the submitter may route this expense".to_string(),
            ));
        }

        let routed = SendForApprovalCommand {
            record_id,
            approver_emails,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "sent_for_approval", &routed.record.epv_id, &ctx.email);

        let mut outcome = WorkflowOutcome::new(routed);
        for approval in &outcome.value.approvals {
            let Some(token) = approval.token.as_deref() else {
                continue;
            };
            let (approve_url, reject_url) = self.decision_links(&outcome.value.record.epv_id, token);
            let content = templates::approval_request(
                &outcome.value.record,
                approval.approver_name.as_deref().unwrap_or(&approval.approver_email),
                &approve_url,
                &reject_url,
            );
            if let Some(w) = self.collaborators.notify(&approval.approver_email, &content).await {
                outcome.warnings.push(w);
            }
        }
        Ok(outcome)
    }

    /// Splits one vendor invoice across cost centers, each slice approved by
    /// its own approver.
    #[instrument(skip(self, ctx, request), fields(submitter = %ctx.email))]
    pub async fn create_split_invoice(
        &self,
        ctx: &RequestContext,
        request: SplitInvoiceRequest,
    ) -> Result<WorkflowOutcome<SplitInvoice>, ServiceError> {
        validate_allocations(request.total_amount, &request.allocations)?;

        let now = Utc::now();
        let epv_id = identifiers::generate_epv_id(identifiers::MASTER_CODE, now);
        let academic_year = self.academic_year().await?;
        let invoice_path = store_upload(&self.record_dir(&epv_id), 1, &request.invoice).await?;

        let summary = ClaimSummary {
            epv_id: epv_id.clone(),
            employee_name: ctx.name.clone(),
            employee_email: ctx.email.clone(),
            employee_id: request.employee_id.clone(),
            cost_center_name: None,
            from_date: request.invoice_date,
            to_date: request.invoice_date,
            payment_to: request.payment_to.clone(),
            academic_year: academic_year.clone(),
            total_amount: request.total_amount,
            amount_in_words: amount_in_words(request.total_amount),
            lines: vec![SummaryLine {
                invoice_date: request.invoice_date,
                expense_head: SPLIT_EXPENSE_HEAD.to_string(),
                description: request.description.clone(),
                gst: Decimal::ZERO,
                amount: request.total_amount,
            }],
        };
        let artifact = match self.build_artifact(&summary, vec![invoice_path]).await {
            Ok(path) => path,
            Err(e) => {
                self.cleanup(&epv_id).await;
                return Err(e);
            }
        };

        let mut warnings = Vec::new();
        let document = self.publish_artifact(&epv_id, &artifact, None, &mut warnings).await;

        let command = CreateSplitInvoiceCommand {
            master_epv_id: epv_id.clone(),
            submitter: ctx.clone(),
            employee_id: request.employee_id,
            invoice_date: request.invoice_date,
            total_amount: request.total_amount,
            description: request.description,
            payment_to: request.payment_to,
            academic_year,
            document,
            allocations: request.allocations,
        };
        let split = match command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
        {
            Ok(split) => split,
            Err(e) => {
                self.cleanup(&epv_id).await;
                return Err(e);
            }
        };
        audit(&self.logger, "split_invoice_created", &epv_id, &ctx.email);

        let mut outcome = WorkflowOutcome::new(split);
        outcome.warnings = warnings;
        for part in &outcome.value.parts {
            let Some(token) = part.approval.token.as_deref() else {
                continue;
            };
            let (approve_url, reject_url) = self.decision_links(&part.sub_invoice.epv_id, token);
            let content = templates::split_approval_request(
                &part.sub_invoice,
                &part.allocation,
                &approve_url,
                &reject_url,
            );
            if let Some(w) = self
                .collaborators
                .notify(&part.allocation.approver_email, &content)
                .await
            {
                outcome.warnings.push(w);
            }
        }
        Ok(outcome)
    }

    /// Applies an approver's decision link. A rejection is mailed to the
    /// submitter.
    #[instrument(skip(self, token, decision))]
    pub async fn decide(
        &self,
        epv_id: &str,
        token: &str,
        decision: ApprovalDecision,
    ) -> Result<WorkflowOutcome<DecisionRecorded>, ServiceError> {
        let recorded = DecideApprovalCommand {
            epv_id: epv_id.to_string(),
            token: token.to_string(),
            decision: decision.clone(),
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(
            &self.logger,
            &format!("approval_{}", recorded.approval.status),
            epv_id,
            &recorded.approval.approver_email,
        );

        let mut outcome = WorkflowOutcome::new(recorded);
        if let ApprovalDecision::Reject { reason } = decision {
            let approval = &outcome.value.approval;
            let rejected_by = approval
                .approver_name
                .clone()
                .unwrap_or_else(|| approval.approver_email.clone());
            let content = templates::rejection_notice(&outcome.value.record, &rejected_by, reason.trim());
            if let Some(w) = self
                .collaborators
                .notify(&outcome.value.record.email_id, &content)
                .await
            {
                outcome.warnings.push(w);
            }
        }
        Ok(outcome)
    }

    /// The still-pending approval a decision link points at, for rendering
    /// the reject form.
    pub async fn pending_decision(
        &self,
        epv_id: &str,
        token: &str,
    ) -> Result<(expense_record::Model, approval::Model), ServiceError> {
        let invalid = || ServiceError::NotFound("Invalid or unknown approval token".to_string());
        let record = find_record_by_epv(self.db_pool.as_ref(), epv_id)
            .await
            .map_err(|_| invalid())?;
        let row = approval::Entity::find()
            .filter(approval::Column::Token.eq(token))
            .filter(approval::Column::ExpenseRecordId.eq(record.id))
            .one(self.db_pool.as_ref())
            .await?
            .ok_or_else(invalid)?;
        if row.status != ApprovalStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "This expense has already been {}",
                row.status
            )));
        }
        Ok((record, row))
    }

    #[instrument(skip(self, ctx, requested_documents), fields(actor = %ctx.email))]
    pub async fn request_documents(
        &self,
        ctx: &RequestContext,
        record_id: Uuid,
        requested_documents: String,
    ) -> Result<WorkflowOutcome<expense_record::Model>, ServiceError> {
        let record = RequestDocumentsCommand {
            record_id,
            actor: ctx.clone(),
            requested_documents,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "documents_requested", &record.epv_id, &ctx.email);

        let content = templates::documents_requested(
            &record,
            record.requested_documents.as_deref().unwrap_or_default(),
            &ctx.name,
        );
        let mut outcome = WorkflowOutcome::new(record);
        if let Some(w) = self.collaborators.notify(&outcome.value.email_id, &content).await {
            outcome.warnings.push(w);
        }
        Ok(outcome)
    }

    /// Stores the answer to a document request, rebuilds the claim bundle
    /// and returns the record to the finance queue.
    #[instrument(skip(self, ctx, files), fields(actor = %ctx.email, files = files.len()))]
    pub async fn upload_supplementary(
        &self,
        ctx: &RequestContext,
        record_id: Uuid,
        files: Vec<SupplementaryUpload>,
    ) -> Result<WorkflowOutcome<SupplementsRecorded>, ServiceError> {
        if files.is_empty() {
            return Err(ServiceError::ValidationError(
                "At least one file is required".to_string(),
            ));
        }
        let record = find_record(self.db_pool.as_ref(), record_id).await?;
        ensure_can_upload(&record, ctx)?;

        let mut warnings = Vec::new();
        let dir = self
            .record_dir(&record.epv_id)
            .join("supplementary")
            .join(Utc::now().format("%Y%m%d%H%M%S%3f").to_string());
        let storage = self.collaborators.storage.clone();
        let folder = match record.cost_center_id {
            Some(id) => cost_center::Entity::find_by_id(id)
                .one(self.db_pool.as_ref())
                .await?
                .and_then(|cc| cc.drive_folder_id),
            None => None,
        };

        let mut stored = Vec::with_capacity(files.len());
        for (idx, upload) in files.iter().enumerate() {
            let path = store_upload(&dir, idx + 1, &upload.file).await?;
            let drive_file_id = match with_metrics("drive_upload", || {
                storage.upload(&path, &upload.file.filename, folder.as_deref())
            })
            .await
            {
                Ok(id) => Some(id),
                Err(e) => {
                    warnings.push(format!("Drive upload of {} failed: {}", upload.file.filename, e));
                    None
                }
            };
            stored.push(StoredSupplement {
                filename: upload.file.filename.clone(),
                file_path: path.to_string_lossy().into_owned(),
                drive_file_id,
                description: upload.description.clone(),
            });
        }

        let document = self
            .rebuild_bundle(&record, &stored, folder.as_deref(), &mut warnings)
            .await;

        let recorded = UploadSupplementaryCommand {
            record_id,
            uploader: ctx.clone(),
            files: stored,
            document,
            system_approver_email: self.config.system_approver_email.clone(),
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "supplementary_uploaded", &recorded.record.epv_id, &ctx.email);

        let mut outcome = WorkflowOutcome::new(recorded);
        outcome.warnings = warnings;

        let finance_team = employee::Entity::find()
            .filter(employee::Column::Role.is_in([Role::Finance, Role::FinanceApprover]))
            .filter(employee::Column::IsActive.eq(true))
            .all(self.db_pool.as_ref())
            .await?;
        let content = templates::documents_resubmitted(
            &outcome.value.record,
            &ctx.name,
            outcome.value.documents.len(),
        );
        for member in finance_team {
            if let Some(w) = self.collaborators.notify(&member.email, &content).await {
                outcome.warnings.push(w);
            }
        }
        Ok(outcome)
    }

    /// Merges the current bundle with the new files. Failures leave the old
    /// bundle in place and become warnings.
    async fn rebuild_bundle(
        &self,
        record: &expense_record::Model,
        stored: &[StoredSupplement],
        folder: Option<&str>,
        warnings: &mut Vec<String>,
    ) -> Option<DocumentLocator> {
        let mut original = record
            .document_path
            .as_deref()
            .map(PathBuf::from)
            .filter(|p| p.exists());
        if original.is_none() {
            if let Some(file_id) = record.drive_file_id.as_deref() {
                let target = self.record_dir(&record.epv_id).join("original.pdf");
                match self.collaborators.storage.download(file_id, &target).await {
                    Ok(true) => original = Some(target),
                    Ok(false) => warnings.push("Original document not found on the drive".to_string()),
                    Err(e) => warnings.push(format!("Original document download failed: {}", e)),
                }
            }
        }

        let mut inputs: Vec<PathBuf> = original.into_iter().collect();
        inputs.extend(stored.iter().map(|s| PathBuf::from(&s.file_path)));
        let output_name = format!("{}_updated_{}", record.epv_id, Utc::now().format("%Y%m%d%H%M%S"));
        let documents = self.collaborators.documents.clone();
        let merged = match with_metrics("merge_documents", || documents.merge(&inputs, &output_name)).await {
            Ok(path) => path,
            Err(e) => {
                warnings.push(format!("Could not rebuild the claim bundle: {}", e));
                return None;
            }
        };

        Some(
            self.publish_artifact(&record.epv_id, &merged, folder, warnings)
                .await,
        )
    }

    pub async fn expense_detail(
        &self,
        ctx: &RequestContext,
        epv_id: &str,
    ) -> Result<ExpenseDetail, ServiceError> {
        GetExpenseDetailQuery {
            epv_id: epv_id.to_string(),
            viewer: ctx.clone(),
        }
        .execute(self.db_pool.as_ref())
        .await
    }

    pub async fn own_expenses(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<expense_record::Model>, ServiceError> {
        ListOwnExpensesQuery { viewer: ctx.clone() }
            .execute(self.db_pool.as_ref())
            .await
    }

    pub async fn allocation_totals(&self, master_id: Uuid) -> Result<AllocationTotals, ServiceError> {
        AllocationTotalsQuery { master_id }
            .execute(self.db_pool.as_ref())
            .await
    }

    /// Local path of the claim bundle, for the download route.
    pub async fn document_file(
        &self,
        ctx: &RequestContext,
        epv_id: &str,
    ) -> Result<PathBuf, ServiceError> {
        let detail = self.expense_detail(ctx, epv_id).await?;
        detail
            .record
            .document_path
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .ok_or_else(|| ServiceError::NotFound(format!("No document stored for {}", epv_id)))
    }
}
