use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line item of an expense claim.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expense_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_record_id: Uuid,
    pub invoice_date: NaiveDate,
    pub expense_head: String,
    pub description: Option<String>,
    pub gst: Decimal,
    pub amount: Decimal,
    pub receipt_filename: Option<String>,
    pub receipt_path: Option<String>,
    /// Backed by a separately recorded master invoice rather than its own receipt.
    pub split_invoice: bool,
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
}

impl Related<super::expense_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
