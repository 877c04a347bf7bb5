use crate::{
    auth::{RequestContext, Role},
    commands::{emit, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::employee,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{checked_email, optional_text, require_admin};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmployeeInput {
    pub email: String,
    pub name: String,
    pub employee_id: Option<String>,
    pub manager_email: Option<String>,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Adds a person to the directory, or edits one when `id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveEmployeeCommand {
    pub actor: RequestContext,
    pub id: Option<Uuid>,
    pub input: EmployeeInput,
}

#[async_trait::async_trait]
impl Command for SaveEmployeeCommand {
    type Result = employee::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(actor = %self.actor.email, id = ?self.id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        require_admin(&self.actor, "manage employees")?;
        let email = checked_email(&self.input.email, "Email")?;
        let name = required_text(&self.input.name, "Name")?;
        let manager_email = match optional_text(self.input.manager_email.as_deref()) {
            Some(m) => Some(checked_email(&m, "Manager email")?),
            None => None,
        };
        let db = db_pool.as_ref();

        if let Some(holder) = employee::Entity::find_by_email(&email).one(db).await? {
            if Some(holder.id) != self.id {
                return Err(ServiceError::Conflict(format!(
                    "{} already belongs to {}",
                    email, holder.name
                )));
            }
        }

        let saved = match self.id {
            Some(id) => {
                let existing = employee::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Employee {} not found", id)))?;
                let mut active: employee::ActiveModel = existing.into();
                active.email = Set(email);
                active.name = Set(name);
                active.employee_id = Set(optional_text(self.input.employee_id.as_deref()));
                active.manager_email = Set(manager_email);
                active.role = Set(self.input.role);
                active.is_active = Set(self.input.is_active);
                active.update(db).await?
            }
            None => {
                employee::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    email: Set(email),
                    employee_id: Set(optional_text(self.input.employee_id.as_deref())),
                    name: Set(name),
                    manager_email: Set(manager_email),
                    role: Set(self.input.role),
                    is_active: Set(self.input.is_active),
                    created_at: Set(Utc::now()),
                }
                .insert(db)
                .await?
            }
        };

        info!(employee = %saved.email, role = %saved.role, "Employee saved");
        emit(
            &event_sender,
            vec![Event::MasterDataChanged {
                kind: "employee".to_string(),
                id: saved.id,
                is_active: saved.is_active,
            }],
        )
        .await?;
        Ok(saved)
    }
}
