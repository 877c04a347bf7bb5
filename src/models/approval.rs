use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    /// Finance asked the submitter for more documents.
    #[sea_orm(string_value = "documents_requested")]
    DocumentsRequested,
    /// Supplementary documents were uploaded and the record went back to finance.
    #[sea_orm(string_value = "resubmitted")]
    Resubmitted,
}

impl ApprovalStatus {
    /// Rows written by a human approver, as opposed to workflow bookkeeping rows.
    pub fn is_decision(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved | Self::Rejected)
    }
}

/// One approval request sent to one approver, or one workflow action logged
/// against the record.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "approvals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_record_id: Uuid,
    pub allocation_id: Option<Uuid>,
    pub approver_email: String,
    pub approver_name: Option<String>,
    pub status: ApprovalStatus,
    pub action_date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    /// Single-use decision token; absent on bookkeeping rows.
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::expense_record::Entity",
        from = "Column::ExpenseRecordId",
        to = "super::expense_record::Column::Id",
        on_delete = "Cascade"
    )]
    ExpenseRecord,

    #[sea_orm(
        belongs_to = "super::allocation::Entity",
        from = "Column::AllocationId",
        to = "super::allocation::Column::Id"
    )]
    Allocation,
}

impl Related<super::expense_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseRecord.def()
    }
}

impl Related<super::allocation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Allocation.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
