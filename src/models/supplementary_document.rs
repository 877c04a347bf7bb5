use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file uploaded in answer to a finance document request.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "supplementary_documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub expense_record_id: Uuid,
    pub filename: String,
    pub file_path: String,
    pub drive_file_id: Option<String>,
    pub uploaded_by: String,
    pub uploaded_on: DateTime<Utc>,
    pub description: Option<String>,
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
