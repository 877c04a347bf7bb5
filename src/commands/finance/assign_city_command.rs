use crate::{
    auth::{RequestContext, Role},
    commands::{emit, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{city_assignment, employee},
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Makes a finance user responsible for one city's expenses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignCityCommand {
    pub actor: RequestContext,
    pub employee_id: Uuid,
    pub city: String,
}

#[async_trait::async_trait]
impl Command for AssignCityCommand {
    type Result = city_assignment::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(employee_id = %self.employee_id, city = %self.city))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor
            .require_role(&[Role::FinanceApprover], "assign cities")?;
        let city = required_text(&self.city, "City")?;
        let db = db_pool.as_ref();

        let assignee = employee::Entity::find_by_id(self.employee_id)
            .one(db)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Employee {} not found", self.employee_id))
            })?;
        if !assignee.role.is_finance_staff() {
            return Err(ServiceError::ValidationError(format!(
                "{} is not a finance user",
                assignee.email
            )));
        }

        let existing = city_assignment::Entity::find()
            .filter(city_assignment::Column::EmployeeId.eq(assignee.id))
            .filter(city_assignment::Column::IsActive.eq(true))
            .all(db)
            .await?;
        if existing.iter().any(|a| a.city.eq_ignore_ascii_case(&city)) {
            return Err(ServiceError::Conflict(format!(
                "{} is already assigned to {}",
                assignee.name, city
            )));
        }

        let assignment = city_assignment::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(assignee.id),
            city: Set(city),
            assigned_by: Set(self.actor.email.clone()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        info!(assignment_id = %assignment.id, assignee = %assignee.email, "City assigned");
        emit(
            &event_sender,
            vec![Event::CityAssignmentChanged {
                assignment_id: assignment.id,
                city: assignment.city.clone(),
                is_active: true,
            }],
        )
        .await?;
        Ok(assignment)
    }
}
