use crate::{
    auth::{RequestContext, Role},
    commands::{emit, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::city_assignment,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Flips an assignment between active and inactive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleCityAssignmentCommand {
    pub actor: RequestContext,
    pub assignment_id: Uuid,
}

#[async_trait::async_trait]
impl Command for ToggleCityAssignmentCommand {
    type Result = city_assignment::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(assignment_id = %self.assignment_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor
            .require_role(&[Role::FinanceApprover], "manage city assignments")?;
        let db = db_pool.as_ref();

        let assignment = city_assignment::Entity::find_by_id(self.assignment_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("City assignment {} not found", self.assignment_id))
            })?;

        let is_active = !assignment.is_active;
        let mut active: city_assignment::ActiveModel = assignment.into();
        active.is_active = Set(is_active);
        let assignment = active.update(db).await?;

        info!(city = %assignment.city, is_active, "City assignment toggled");
        emit(
            &event_sender,
            vec![Event::CityAssignmentChanged {
                assignment_id: assignment.id,
                city: assignment.city.clone(),
                is_active,
            }],
        )
        .await?;
        Ok(assignment)
    }
}
