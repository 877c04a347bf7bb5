use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Aggregate approval status of an expense record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExpenseStatus {
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "partially_approved")]
    PartiallyApproved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Where the record stands in the finance queue. `None` on the model means
/// finance has not looked at it yet.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinanceStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "pending_documents")]
    PendingDocuments,
    #[sea_orm(string_value = "processed")]
    Processed,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(40))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DocumentStatus {
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "pending_additional_documents")]
    PendingAdditionalDocuments,
    #[sea_orm(string_value = "documents_uploaded")]
    DocumentsUploaded,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceType {
    #[sea_orm(string_value = "standard")]
    Standard,
    #[sea_orm(string_value = "master")]
    Master,
    #[sea_orm(string_value = "sub")]
    Sub,
    #[sea_orm(string_value = "split")]
    Split,
}

/// Progress of a master invoice across its sub-invoices.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SplitStatus {
    #[sea_orm(string_value = "splitting")]
    Splitting,
    #[sea_orm(string_value = "pending_approval")]
    PendingApproval,
    #[sea_orm(string_value = "partially_approved")]
    PartiallyApproved,
    #[sea_orm(string_value = "fully_approved")]
    FullyApproved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// The `expense_records` table: one row per EPV.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expense_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable code, `EPV-YYYYMMDD-<CODE>-<HEX>`.
    #[sea_orm(unique)]
    pub epv_id: String,

    /// Submitter email.
    pub email_id: String,
    pub employee_name: String,
    pub employee_id: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub payment_to: Option<String>,
    pub submission_date: DateTime<Utc>,
    pub academic_year: String,

    pub cost_center_id: Option<Uuid>,
    pub cost_center_name: Option<String>,
    pub city: Option<String>,

    /// Shareable locator of the supporting document.
    pub file_url: Option<String>,
    pub drive_file_id: Option<String>,
    /// Local copy of the merged supporting document.
    pub document_path: Option<String>,

    pub total_amount: Decimal,
    pub amount_in_words: String,

    pub invoice_type: InvoiceType,
    pub master_invoice_id: Option<Uuid>,
    pub split_status: Option<SplitStatus>,
    pub approved_amount: Decimal,
    pub rejected_amount: Decimal,
    pub pending_amount: Decimal,

    pub status: ExpenseStatus,
    pub finance_status: Option<FinanceStatus>,
    pub document_status: DocumentStatus,
    pub requested_documents: Option<String>,
    pub rejection_reason: Option<String>,

    /// Email of the finance user currently holding the processing claim.
    pub being_processed_by: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::expense_item::Entity")]
    ExpenseItems,

    #[sea_orm(has_many = "super::approval::Entity")]
    Approvals,

    #[sea_orm(has_many = "super::allocation::Entity")]
    Allocations,

    #[sea_orm(has_many = "super::finance_entry::Entity")]
    FinanceEntries,

    #[sea_orm(has_many = "super::supplementary_document::Entity")]
    SupplementaryDocuments,

    #[sea_orm(
        belongs_to = "super::cost_center::Entity",
        from = "Column::CostCenterId",
        to = "super::cost_center::Column::Id"
    )]
    CostCenter,
}

impl Related<super::expense_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseItems.def()
    }
}

impl Related<super::approval::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approvals.def()
    }
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocations.def()
    }
}

impl Related<super::finance_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinanceEntries.def()
    }
}

impl Related<super::supplementary_document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupplementaryDocuments.def()
    }
}

impl Related<super::cost_center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CostCenter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether finance may pick this record up for processing. Sub-invoices
    /// are paid through their master.
    pub fn is_in_finance_queue(&self) -> bool {
        self.status == ExpenseStatus::Approved
            && self.invoice_type != InvoiceType::Sub
            && matches!(self.finance_status, None | Some(FinanceStatus::Pending))
    }

    /// Whether the record came back through the supplementary-document cycle.
    pub fn is_resubmitted(&self) -> bool {
        self.document_status == DocumentStatus::DocumentsUploaded
    }

    pub fn is_sub_invoice(&self) -> bool {
        self.invoice_type == InvoiceType::Sub
    }
}
