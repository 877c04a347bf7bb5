use crate::{
    auth::RequestContext,
    commands::{emit, Command, DocumentLocator},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{
        allocation, approval, cost_center, employee, expense_item, expense_record,
        AllocationStatus, ApprovalStatus, DocumentStatus, ExpenseStatus, InvoiceType, SplitStatus,
    },
    workflow::{amount_in_words, identifiers},
};
use chrono::{NaiveDate, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

pub const MASTER_COST_CENTER_LABEL: &str = "Master Invoice";
pub const SPLIT_EXPENSE_HEAD: &str = "Split Invoice";
const DEFAULT_PAYEE: &str = "Vendor";

lazy_static! {
    static ref SPLIT_INVOICES_CREATED: IntCounter = IntCounter::new(
        "epv_split_invoices_created_total",
        "Master invoices split across cost centers"
    )
    .expect("metric can be created");
    static ref SPLIT_INVOICE_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "epv_split_invoice_failures_total",
            "Split invoice requests that were refused or failed"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationInput {
    pub cost_center_id: Uuid,
    pub amount: Decimal,
    pub description: Option<String>,
    pub expense_head: Option<String>,
    /// Falls back to the cost center's approver.
    pub approver_email: Option<String>,
}

/// Checks the allocation amounts against the master total.
pub fn validate_allocations(total: Decimal, allocations: &[AllocationInput]) -> Result<(), ServiceError> {
    if total <= Decimal::ZERO {
        return Err(ServiceError::ValidationError(
            "Master invoice amount must be greater than zero".to_string(),
        ));
    }
    if allocations.is_empty() {
        return Err(ServiceError::ValidationError(
            "At least one allocation is required".to_string(),
        ));
    }
    if let Some(pos) = allocations.iter().position(|a| a.amount <= Decimal::ZERO) {
        return Err(ServiceError::ValidationError(format!(
            "Allocation {}: amount must be greater than zero",
            pos + 1
        )));
    }
    let allocated: Decimal = allocations.iter().map(|a| a.amount).sum();
    if allocated != total {
        return Err(ServiceError::ValidationError(format!(
            "Allocations total {} but the master invoice is {}",
            allocated, total
        )));
    }
    Ok(())
}

/// Creates a master invoice, its sub-invoices, allocations and approval
/// requests in one transaction.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSplitInvoiceCommand {
    #[validate(length(min = 5))]
    pub master_epv_id: String,
    pub submitter: RequestContext,
    pub employee_id: Option<String>,
    pub invoice_date: NaiveDate,
    pub total_amount: Decimal,
    pub description: Option<String>,
    pub payment_to: Option<String>,
    pub academic_year: String,
    pub document: DocumentLocator,
    #[validate(length(min = 1, message = "At least one allocation is required"))]
    pub allocations: Vec<AllocationInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitPart {
    pub sub_invoice: expense_record::Model,
    pub allocation: allocation::Model,
    /// Carries the decision token.
    pub approval: approval::Model,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitInvoice {
    pub master: expense_record::Model,
    pub parts: Vec<SplitPart>,
}

#[async_trait::async_trait]
impl Command for CreateSplitInvoiceCommand {
    type Result = SplitInvoice;

    #[instrument(skip(self, db_pool, event_sender), fields(master_epv_id = %self.master_epv_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = async {
            self.validate()?;
            validate_allocations(self.total_amount, &self.allocations)?;
            self.persist(db_pool.as_ref()).await
        }
        .await;

        let split = match result {
            Ok(split) => split,
            Err(e) => {
                warn!(error = %e, "Split invoice refused");
                SPLIT_INVOICE_FAILURES
                    .with_label_values(&[e.error_type()])
                    .inc();
                return Err(e);
            }
        };

        info!(
            master_id = %split.master.id,
            parts = split.parts.len(),
            "Split invoice created"
        );
        emit(
            &event_sender,
            vec![Event::SplitInvoiceCreated {
                master_id: split.master.id,
                sub_invoice_ids: split.parts.iter().map(|p| p.sub_invoice.id).collect(),
            }],
        )
        .await?;

        SPLIT_INVOICES_CREATED.inc();
        Ok(split)
    }
}

impl CreateSplitInvoiceCommand {
    async fn active_cost_center<C: ConnectionTrait>(
        db: &C,
        id: Uuid,
    ) -> Result<cost_center::Model, ServiceError> {
        cost_center::Entity::find_by_id(id)
            .one(db)
            .await?
            .filter(|cc| cc.is_active)
            .ok_or_else(|| ServiceError::ValidationError(format!("Unknown cost center {}", id)))
    }

    async fn persist(&self, db: &DbPool) -> Result<SplitInvoice, ServiceError> {
        let now = Utc::now();
        let payment_to = self
            .payment_to
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PAYEE.to_string());

        let txn = db.begin().await?;

        let master = expense_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            epv_id: Set(self.master_epv_id.clone()),
            email_id: Set(self.submitter.email.clone()),
            employee_name: Set(self.submitter.name.clone()),
            employee_id: Set(self.employee_id.clone()),
            from_date: Set(self.invoice_date),
            to_date: Set(self.invoice_date),
            payment_to: Set(Some(payment_to.clone())),
            submission_date: Set(now),
            academic_year: Set(self.academic_year.clone()),
            cost_center_id: Set(None),
            cost_center_name: Set(Some(MASTER_COST_CENTER_LABEL.to_string())),
            city: Set(None),
            file_url: Set(self.document.file_url.clone()),
            drive_file_id: Set(self.document.drive_file_id.clone()),
            document_path: Set(self.document.document_path.clone()),
            total_amount: Set(self.total_amount),
            amount_in_words: Set(amount_in_words(self.total_amount)),
            invoice_type: Set(InvoiceType::Master),
            master_invoice_id: Set(None),
            split_status: Set(Some(SplitStatus::Splitting)),
            approved_amount: Set(Decimal::ZERO),
            rejected_amount: Set(Decimal::ZERO),
            pending_amount: Set(self.total_amount),
            status: Set(ExpenseStatus::Submitted),
            finance_status: Set(None),
            document_status: Set(DocumentStatus::Complete),
            requested_documents: Set(None),
            rejection_reason: Set(None),
            being_processed_by: Set(None),
            processing_started_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        self.insert_item(&txn, master.id, self.description.clone(), None, self.total_amount)
            .await?;

        let mut parts = Vec::with_capacity(self.allocations.len());
        for input in &self.allocations {
            let cc = Self::active_cost_center(&txn, input.cost_center_id).await?;
            let approver_email = input
                .approver_email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .or(cc.approver_email.as_deref())
                .map(str::to_lowercase)
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Cost center {} has no approver; name one for this allocation",
                        cc.name
                    ))
                })?;
            if !validator::validate_email(approver_email.as_str()) {
                return Err(ServiceError::ValidationError(format!(
                    "Invalid approver email: {}",
                    approver_email
                )));
            }
            let approver_name = employee::Entity::find_by_email(&approver_email)
                .one(&txn)
                .await?
                .map(|e| e.name);

            let description = input.description.clone().or_else(|| self.description.clone());
            let sub_epv = identifiers::generate_epv_id(
                &identifiers::cost_center_code(Some(cc.name.as_str())),
                now,
            );

            let sub_invoice = expense_record::ActiveModel {
                id: Set(Uuid::new_v4()),
                epv_id: Set(sub_epv),
                email_id: Set(self.submitter.email.clone()),
                employee_name: Set(self.submitter.name.clone()),
                employee_id: Set(self.employee_id.clone()),
                from_date: Set(self.invoice_date),
                to_date: Set(self.invoice_date),
                payment_to: Set(Some(payment_to.clone())),
                submission_date: Set(now),
                academic_year: Set(self.academic_year.clone()),
                cost_center_id: Set(Some(cc.id)),
                cost_center_name: Set(Some(cc.name.clone())),
                city: Set(cc.city.clone()),
                file_url: Set(self.document.file_url.clone()),
                drive_file_id: Set(self.document.drive_file_id.clone()),
                document_path: Set(self.document.document_path.clone()),
                total_amount: Set(input.amount),
                amount_in_words: Set(amount_in_words(input.amount)),
                invoice_type: Set(InvoiceType::Sub),
                master_invoice_id: Set(Some(master.id)),
                split_status: Set(None),
                approved_amount: Set(Decimal::ZERO),
                rejected_amount: Set(Decimal::ZERO),
                pending_amount: Set(input.amount),
                status: Set(ExpenseStatus::PendingApproval),
                finance_status: Set(None),
                document_status: Set(DocumentStatus::Complete),
                requested_documents: Set(None),
                rejection_reason: Set(None),
                being_processed_by: Set(None),
                processing_started_at: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;

            self.insert_item(
                &txn,
                sub_invoice.id,
                description.clone(),
                input.expense_head.clone(),
                input.amount,
            )
            .await?;

            let allocation = allocation::ActiveModel {
                id: Set(Uuid::new_v4()),
                expense_record_id: Set(master.id),
                sub_invoice_id: Set(Some(sub_invoice.id)),
                cost_center_id: Set(cc.id),
                cost_center_name: Set(cc.name.clone()),
                allocated_amount: Set(input.amount),
                description: Set(description),
                expense_head: Set(input.expense_head.clone()),
                approver_email: Set(approver_email.clone()),
                approver_name: Set(approver_name.clone()),
                status: Set(AllocationStatus::Pending),
                action_date: Set(None),
                rejection_reason: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;

            let approval = approval::ActiveModel {
                id: Set(Uuid::new_v4()),
                expense_record_id: Set(sub_invoice.id),
                allocation_id: Set(Some(allocation.id)),
                approver_email: Set(approver_email),
                approver_name: Set(approver_name),
                status: Set(ApprovalStatus::Pending),
                action_date: Set(None),
                comments: Set(None),
                token: Set(Some(Uuid::new_v4().to_string())),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;

            parts.push(SplitPart {
                sub_invoice,
                allocation,
                approval,
            });
        }

        let mut active: expense_record::ActiveModel = master.into();
        active.split_status = Set(Some(SplitStatus::PendingApproval));
        active.status = Set(ExpenseStatus::PendingApproval);
        active.updated_at = Set(Utc::now());
        let master = active.update(&txn).await?;

        txn.commit().await?;
        Ok(SplitInvoice { master, parts })
    }

    async fn insert_item<C: ConnectionTrait>(
        &self,
        db: &C,
        record_id: Uuid,
        description: Option<String>,
        expense_head: Option<String>,
        amount: Decimal,
    ) -> Result<expense_item::Model, ServiceError> {
        let item = expense_item::ActiveModel {
            id: Set(Uuid::new_v4()),
            expense_record_id: Set(record_id),
            invoice_date: Set(self.invoice_date),
            expense_head: Set(expense_head
                .filter(|h| !h.trim().is_empty())
                .unwrap_or_else(|| SPLIT_EXPENSE_HEAD.to_string())),
            description: Set(description),
            gst: Set(Decimal::ZERO),
            amount: Set(amount),
            receipt_filename: Set(None),
            receipt_path: Set(None),
            split_invoice: Set(true),
        }
        .insert(db)
        .await?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn slice(amount: Decimal) -> AllocationInput {
        AllocationInput {
            cost_center_id: Uuid::new_v4(),
            amount,
            description: None,
            expense_head: None,
            approver_email: None,
        }
    }

    #[test]
    fn allocations_must_sum_to_total() {
        assert!(validate_allocations(dec!(1000), &[slice(dec!(600)), slice(dec!(400))]).is_ok());
        assert_matches!(
            validate_allocations(dec!(1000), &[slice(dec!(600)), slice(dec!(300))]),
            Err(ServiceError::ValidationError(msg)) if msg.contains("900")
        );
    }

    #[test]
    fn rejects_empty_or_non_positive_slices() {
        assert_matches!(
            validate_allocations(dec!(10), &[]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            validate_allocations(dec!(10), &[slice(dec!(10)), slice(dec!(0))]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            validate_allocations(dec!(0), &[slice(dec!(0))]),
            Err(ServiceError::ValidationError(_))
        );
    }
}
