use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Key of the processing-days SOP setting.
pub const MAX_DAYS_PROCESSING: &str = "max_days_processing";
/// Oldest invoice date, in days before submission, a claim may carry.
pub const MAX_DAYS_PAST: &str = "max_days_past";
/// Overrides the academic year stamped on new submissions.
pub const ACADEMIC_YEAR: &str = "academic_year";

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "finance_settings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub setting_name: String,
    pub setting_value: String,
    pub description: Option<String>,
    /// Value replaced by the last change, kept for the change log.
    pub previous_value: Option<String>,
    pub updated_by: Option<String>,
    pub updated_on: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
