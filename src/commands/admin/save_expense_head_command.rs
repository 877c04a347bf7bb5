use crate::{
    auth::RequestContext,
    commands::{emit, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::expense_head,
};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{optional_text, require_admin};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseHeadInput {
    pub head_name: String,
    pub head_code: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Creates an expense head, or edits one when `id` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveExpenseHeadCommand {
    pub actor: RequestContext,
    pub id: Option<Uuid>,
    pub input: ExpenseHeadInput,
}

#[async_trait::async_trait]
impl Command for SaveExpenseHeadCommand {
    type Result = expense_head::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(actor = %self.actor.email, id = ?self.id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        require_admin(&self.actor, "manage expense heads")?;
        let head_name = required_text(&self.input.head_name, "Head name")?;
        let db = db_pool.as_ref();

        let same_name = expense_head::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col(expense_head::Column::HeadName)))
                    .eq(head_name.to_lowercase()),
            )
            .one(db)
            .await?;
        if let Some(other) = same_name {
            if Some(other.id) != self.id {
                return Err(ServiceError::Conflict(format!(
                    "Expense head {} already exists",
                    head_name
                )));
            }
        }

        let head_code = optional_text(self.input.head_code.as_deref());
        let description = optional_text(self.input.description.as_deref());
        let saved = match self.id {
            Some(id) => {
                let existing = expense_head::Entity::find_by_id(id)
                    .one(db)
                    .await?
                    .ok_or_else(|| ServiceError::NotFound(format!("Expense head {} not found", id)))?;
                let mut active: expense_head::ActiveModel = existing.into();
                active.head_name = Set(head_name);
                active.head_code = Set(head_code);
                active.description = Set(description);
                active.is_active = Set(self.input.is_active);
                active.update(db).await?
            }
            None => {
                expense_head::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    head_name: Set(head_name),
                    head_code: Set(head_code),
                    description: Set(description),
                    is_active: Set(self.input.is_active),
                }
                .insert(db)
                .await?
            }
        };

        info!(head = %saved.head_name, "Expense head saved");
        emit(
            &event_sender,
            vec![Event::MasterDataChanged {
                kind: "expense_head".to_string(),
                id: saved.id,
                is_active: saved.is_active,
            }],
        )
        .await?;
        Ok(saved)
    }
}
