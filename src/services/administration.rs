use slog::Logger;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    commands::{
        admin::{
            CostCenterInput, EmployeeInput, ExpenseHeadInput, MasterDataKind,
            SaveCostCenterCommand, SaveEmployeeCommand, SaveExpenseHeadCommand, StatusToggled,
            ToggleStatusCommand, UpdateFinanceSettingsCommand,
        },
        Command,
    },
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    logging::audit,
    models::{cost_center, employee, expense_head, finance_setting},
    queries::{
        FinanceSettingsQuery, ListCostCentersQuery, ListEmployeesQuery, ListExpenseHeadsQuery,
        Query,
    },
};

/// Master data and finance settings.
#[derive(Clone)]
pub struct AdministrationService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    logger: Logger,
}

impl AdministrationService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, logger: Logger) -> Self {
        Self {
            db_pool,
            event_sender,
            logger,
        }
    }

    pub async fn cost_centers(
        &self,
        ctx: &RequestContext,
        include_inactive: bool,
    ) -> Result<Vec<cost_center::Model>, ServiceError> {
        ListCostCentersQuery {
            viewer: ctx.clone(),
            include_inactive,
        }
        .execute(self.db_pool.as_ref())
        .await
    }

    #[instrument(skip(self, ctx, input), fields(actor = %ctx.email))]
    pub async fn save_cost_center(
        &self,
        ctx: &RequestContext,
        id: Option<Uuid>,
        input: CostCenterInput,
    ) -> Result<cost_center::Model, ServiceError> {
        let saved = SaveCostCenterCommand {
            actor: ctx.clone(),
            id,
            input,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "cost_center_saved", &saved.name, &ctx.email);
        Ok(saved)
    }

    pub async fn employees(&self, ctx: &RequestContext) -> Result<Vec<employee::Model>, ServiceError> {
        ListEmployeesQuery { viewer: ctx.clone() }
            .execute(self.db_pool.as_ref())
            .await
    }

    #[instrument(skip(self, ctx, input), fields(actor = %ctx.email))]
    pub async fn save_employee(
        &self,
        ctx: &RequestContext,
        id: Option<Uuid>,
        input: EmployeeInput,
    ) -> Result<employee::Model, ServiceError> {
        let saved = SaveEmployeeCommand {
            actor: ctx.clone(),
            id,
            input,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "employee_saved", &saved.email, &ctx.email);
        Ok(saved)
    }

    pub async fn expense_heads(
        &self,
        ctx: &RequestContext,
        include_inactive: bool,
    ) -> Result<Vec<expense_head::Model>, ServiceError> {
        ListExpenseHeadsQuery {
            viewer: ctx.clone(),
            include_inactive,
        }
        .execute(self.db_pool.as_ref())
        .await
    }

    #[instrument(skip(self, ctx, input), fields(actor = %ctx.email))]
    pub async fn save_expense_head(
        &self,
        ctx: &RequestContext,
        id: Option<Uuid>,
        input: ExpenseHeadInput,
    ) -> Result<expense_head::Model, ServiceError> {
        let saved = SaveExpenseHeadCommand {
            actor: ctx.clone(),
            id,
            input,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "expense_head_saved", &saved.head_name, &ctx.email);
        Ok(saved)
    }

    #[instrument(skip(self, ctx), fields(actor = %ctx.email))]
    pub async fn toggle_status(
        &self,
        ctx: &RequestContext,
        kind: MasterDataKind,
        id: Uuid,
    ) -> Result<StatusToggled, ServiceError> {
        let toggled = ToggleStatusCommand {
            actor: ctx.clone(),
            kind,
            id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, &format!("{}_status_toggled", kind), &id.to_string(), &ctx.email);
        Ok(toggled)
    }

    pub async fn finance_settings(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<finance_setting::Model>, ServiceError> {
        FinanceSettingsQuery { viewer: ctx.clone() }
            .execute(self.db_pool.as_ref())
            .await
    }

    #[instrument(skip(self, ctx), fields(actor = %ctx.email))]
    pub async fn update_finance_settings(
        &self,
        ctx: &RequestContext,
        max_days_processing: i64,
        max_days_past: i64,
    ) -> Result<Vec<finance_setting::Model>, ServiceError> {
        let saved = UpdateFinanceSettingsCommand {
            actor: ctx.clone(),
            max_days_processing,
            max_days_past,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "finance_settings_updated", "finance_settings", &ctx.email);
        Ok(saved)
    }
}
