use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{prelude::*, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{RequestContext, Role},
    commands::find_record_by_epv,
    errors::ServiceError,
    models::{
        allocation, approval, expense_item, expense_record, finance_entry,
        supplementary_document, InvoiceType,
    },
    workflow::InvoiceVariant,
};

use super::Query;

/// Everything known about one EPV.
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseDetail {
    pub record: expense_record::Model,
    pub variant: InvoiceVariant,
    pub items: Vec<expense_item::Model>,
    pub approvals: Vec<approval::Model>,
    pub allocations: Vec<allocation::Model>,
    pub supplementary_documents: Vec<supplementary_document::Model>,
    pub finance_entries: Vec<finance_entry::Model>,
}

/// Detail view for the submitter, one of the approvers, finance staff or a
/// super admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetExpenseDetailQuery {
    pub epv_id: String,
    pub viewer: RequestContext,
}

#[async_trait]
impl Query for GetExpenseDetailQuery {
    type Result = ExpenseDetail;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let record = find_record_by_epv(db_pool, &self.epv_id).await?;

        let approvals = approval::Entity::find()
            .filter(approval::Column::ExpenseRecordId.eq(record.id))
            .order_by_asc(approval::Column::CreatedAt)
            .all(db_pool)
            .await?;

        let privileged = self.viewer.role.is_finance_staff() || self.viewer.role == Role::SuperAdmin;
        let involved = self.viewer.is(&record.email_id)
            || approvals.iter().any(|a| self.viewer.is(&a.approver_email));
        if !privileged && !involved {
            return Err(ServiceError::Forbidden(format!(
                "You may not view expense {}",
                record.epv_id
            )));
        }

        let variant = InvoiceVariant::load(db_pool, &record).await?;
        let items = expense_item::Entity::find()
            .filter(expense_item::Column::ExpenseRecordId.eq(record.id))
            .order_by_asc(expense_item::Column::InvoiceDate)
            .all(db_pool)
            .await?;
        let allocations = allocation::Entity::find()
            .filter(match record.invoice_type {
                InvoiceType::Sub => allocation::Column::SubInvoiceId.eq(record.id),
                _ => allocation::Column::ExpenseRecordId.eq(record.id),
            })
            .order_by_asc(allocation::Column::CreatedAt)
            .all(db_pool)
            .await?;
        let supplementary_documents = supplementary_document::Entity::find()
            .filter(supplementary_document::Column::ExpenseRecordId.eq(record.id))
            .order_by_asc(supplementary_document::Column::UploadedOn)
            .all(db_pool)
            .await?;
        let finance_entries = finance_entry::Entity::find()
            .filter(finance_entry::Column::ExpenseRecordId.eq(record.id))
            .order_by_asc(finance_entry::Column::EntryDate)
            .all(db_pool)
            .await?;

        Ok(ExpenseDetail {
            record,
            variant,
            items,
            approvals,
            allocations,
            supplementary_documents,
            finance_entries,
        })
    }
}

/// The caller's own submissions, newest first. Sub-invoices are listed under
/// their master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOwnExpensesQuery {
    pub viewer: RequestContext,
}

#[async_trait]
impl Query for ListOwnExpensesQuery {
    type Result = Vec<expense_record::Model>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        Ok(expense_record::Entity::find()
            .filter(expense_record::Column::EmailId.eq(self.viewer.email.as_str()))
            .filter(expense_record::Column::InvoiceType.ne(InvoiceType::Sub))
            .order_by_desc(expense_record::Column::SubmissionDate)
            .all(db_pool)
            .await?)
    }
}

/// Allocation sum check for a master invoice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationTotals {
    pub master_total: Decimal,
    pub allocated: Decimal,
    /// `allocated - master_total`; zero when consistent.
    pub drift: Decimal,
    pub allocation_count: usize,
}

impl AllocationTotals {
    pub fn is_consistent(&self) -> bool {
        self.drift.is_zero()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationTotalsQuery {
    pub master_id: Uuid,
}

#[async_trait]
impl Query for AllocationTotalsQuery {
    type Result = AllocationTotals;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let master = crate::commands::find_record(db_pool, self.master_id).await?;
        if master.invoice_type != InvoiceType::Master {
            return Err(ServiceError::ValidationError(format!(
                "{} is not a master invoice",
                master.epv_id
            )));
        }
        let allocations = allocation::Entity::find()
            .filter(allocation::Column::ExpenseRecordId.eq(master.id))
            .all(db_pool)
            .await?;
        let allocated: Decimal = allocations.iter().map(|a| a.allocated_amount).sum();

        Ok(AllocationTotals {
            master_total: master.total_amount,
            allocated,
            drift: allocated - master.total_amount,
            allocation_count: allocations.len(),
        })
    }
}
