use crate::{
    auth::RequestContext,
    commands::{emit, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::cost_center,
};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{checked_email, optional_text, require_admin};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostCenterInput {
    pub name: String,
    pub city: Option<String>,
    pub approver_email: Option<String>,
    pub drive_folder_id: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Creates a cost center, or edits one when `id` is set. Name and city are
/// fixed once created because past claims are filed under them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveCostCenterCommand {
    pub actor: RequestContext,
    pub id: Option<Uuid>,
    pub input: CostCenterInput,
}

#[async_trait::async_trait]
impl Command for SaveCostCenterCommand {
    type Result = cost_center::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(actor = %self.actor.email, id = ?self.id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        require_admin(&self.actor, "manage cost centers")?;
        let approver_email = match optional_text(self.input.approver_email.as_deref()) {
            Some(email) => Some(checked_email(&email, "Approver email")?),
            None => None,
        };
        let drive_folder_id = optional_text(self.input.drive_folder_id.as_deref());
        let db = db_pool.as_ref();

        let saved = match self.id {
            Some(id) => {
                let existing = cost_center::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Cost center {} not found", id)))?;
                let mut active: cost_center::ActiveModel = existing.into();
                active.approver_email = Set(approver_email);
                active.drive_folder_id = Set(drive_folder_id);
                active.is_active = Set(self.input.is_active);
                active.update(db).await?
            }
            None => {
                let name = required_text(&self.input.name, "Cost center name")?;
                let taken = cost_center::Entity::find()
                    .filter(
                        Expr::expr(Func::lower(Expr::col(cost_center::Column::Name)))
                            .eq(name.to_lowercase()),
                    )
                    .one(db)
                    .await?;
                if taken.is_some() {
                    return Err(ServiceError::Conflict(format!(
                        "Cost center {} already exists",
                        name
                    )));
                }
                cost_center::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    name: Set(name),
                    approver_email: Set(approver_email),
                    city: Set(optional_text(self.input.city.as_deref())),
                    drive_folder_id: Set(drive_folder_id),
                    is_active: Set(self.input.is_active),
                }
                .insert(db)
                .await?
            }
        };

        info!(cost_center = %saved.name, is_active = saved.is_active, "Cost center saved");
        emit(
            &event_sender,
            vec![Event::MasterDataChanged {
                kind: "cost_center".to_string(),
                id: saved.id,
                is_active: saved.is_active,
            }],
        )
        .await?;
        Ok(saved)
    }
}
