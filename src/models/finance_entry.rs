use chrono::{DateTime, NaiveDate, Utc};
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
pub enum FinanceEntryStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Foreign Contribution (Regulation) Act classification of a payment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum FcraStatus {
    #[sea_orm(string_value = "FCRA")]
    #[serde(rename = "FCRA")]
    #[strum(serialize = "FCRA")]
    Fcra,
    #[sea_orm(string_value = "Non-FCRA")]
    #[serde(rename = "Non-FCRA")]
    #[strum(serialize = "Non-FCRA")]
    NonFcra,
}

/// Finance team processing record for an approved expense.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "finance_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_record_id: Uuid,
    pub finance_user_email: String,
    pub entry_date: DateTime<Utc>,
    pub vendor_name: String,
    pub journal_entry: Option<String>,
    pub payment_voucher: Option<String>,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub fcra_status: FcraStatus,
    pub comments: Option<String>,

    pub is_partial_payment: bool,
    pub amount_1: Option<Decimal>,
    pub journal_entry_1: Option<String>,
    pub payment_voucher_1: Option<String>,
    pub fcra_status_1: Option<FcraStatus>,
    pub transaction_id_1: Option<String>,
    pub payment_date_1: Option<NaiveDate>,
    pub amount_2: Option<Decimal>,
    pub journal_entry_2: Option<String>,
    pub payment_voucher_2: Option<String>,
    pub fcra_status_2: Option<FcraStatus>,
    pub transaction_id_2: Option<String>,
    pub payment_date_2: Option<NaiveDate>,

    /// Filled in only after the entry is approved.
    pub transaction_id: Option<String>,
    pub payment_date: Option<NaiveDate>,

    pub status: FinanceEntryStatus,
    pub approver_email: Option<String>,
    pub approved_on: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
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
}

impl Related<super::expense_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ExpenseRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Approved by the finance approver but still missing payment details.
    pub fn awaits_payment_details(&self) -> bool {
        self.status == FinanceEntryStatus::Approved
            && (self.transaction_id.is_none() || self.payment_date.is_none())
    }
}
