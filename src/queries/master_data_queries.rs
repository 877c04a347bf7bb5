use async_trait::async_trait;
use sea_orm::{prelude::*, QueryOrder};
use serde::{Deserialize, Serialize};

use crate::{
    auth::RequestContext,
    commands::admin::ADMIN_ROLES,
    errors::ServiceError,
    models::{cost_center, employee, expense_head, finance_setting},
};

use super::Query;

/// Cost centers by name; inactive ones only when asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCostCentersQuery {
    pub viewer: RequestContext,
    pub include_inactive: bool,
}

#[async_trait]
impl Query for ListCostCentersQuery {
    type Result = Vec<cost_center::Model>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut select = cost_center::Entity::find().order_by_asc(cost_center::Column::Name);
        if self.include_inactive {
            self.viewer.require_role(ADMIN_ROLES, "view inactive cost centers")?;
        } else {
            select = select.filter(cost_center::Column::IsActive.eq(true));
        }
        Ok(select.all(db_pool).await?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEmployeesQuery {
    pub viewer: RequestContext,
}

#[async_trait]
impl Query for ListEmployeesQuery {
    type Result = Vec<employee::Model>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        self.viewer.require_role(ADMIN_ROLES, "view employees")?;
        Ok(employee::Entity::find()
            .order_by_asc(employee::Column::Name)
            .all(db_pool)
            .await?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListExpenseHeadsQuery {
    pub viewer: RequestContext,
    pub include_inactive: bool,
}

#[async_trait]
impl Query for ListExpenseHeadsQuery {
    type Result = Vec<expense_head::Model>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut select = expense_head::Entity::find().order_by_asc(expense_head::Column::HeadName);
        if self.include_inactive {
            self.viewer.require_role(ADMIN_ROLES, "view inactive expense heads")?;
        } else {
            select = select.filter(expense_head::Column::IsActive.eq(true));
        }
        Ok(select.all(db_pool).await?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceSettingsQuery {
    pub viewer: RequestContext,
}

#[async_trait]
impl Query for FinanceSettingsQuery {
    type Result = Vec<finance_setting::Model>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        self.viewer.require_role(ADMIN_ROLES, "view finance settings")?;
        Ok(finance_setting::Entity::find()
            .order_by_asc(finance_setting::Column::SettingName)
            .all(db_pool)
            .await?)
    }
}
