use chrono::{DateTime, Utc};
use sea_orm::{
    entity::prelude::*,
    sea_query::{Expr, Func},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

/// Directory entry for a person who submits, approves or processes expenses.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub email: String,
    pub employee_id: Option<String>,
    pub name: String,
    pub manager_email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::city_assignment::Entity")]
    CityAssignments,
}

impl Related<super::city_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CityAssignments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    /// Looks an employee up by email, ignoring case.
    pub fn find_by_email(email: &str) -> Select<Entity> {
        Self::find().filter(
            Expr::expr(Func::lower(Expr::col(Column::Email))).eq(email.trim().to_lowercase()),
        )
    }
}
