use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AllocationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// A per-cost-center slice of a split (master) invoice.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// The master record being split.
    pub expense_record_id: Uuid,
    /// The sub-invoice created for this slice.
    pub sub_invoice_id: Option<Uuid>,
    pub cost_center_id: Uuid,
    pub cost_center_name: String,
    pub allocated_amount: Decimal,
    pub description: Option<String>,
    pub expense_head: Option<String>,
    pub approver_email: String,
    pub approver_name: Option<String>,
    pub status: AllocationStatus,
    pub action_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
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

    #[sea_orm(has_many = "super::approval::Entity")]
    Approvals,
}

impl Related<super::expense_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseRecord.def()
    }
}

impl Related<super::approval::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Approvals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
