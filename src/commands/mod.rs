use crate::{
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::expense_record,
};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

/// Command trait for implementing the Command Pattern
///
/// This trait allows for encapsulating all the logic needed to execute a business operation
/// into a single object that can be validated, executed, and produce events.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `db_pool` - Database connection pool for persistence operations
    /// * `event_sender` - Channel to publish domain events
    ///
    /// # Returns
    /// * `Result<Self::Result, ServiceError>` - The result of command execution or an error
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

pub mod admin;
pub mod documents;
pub mod expenses;
pub mod finance;

pub(crate) async fn find_record<C: ConnectionTrait>(
    db: &C,
    record_id: Uuid,
) -> Result<expense_record::Model, ServiceError> {
    expense_record::Entity::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Expense record {} not found", record_id)))
}

pub(crate) async fn find_record_by_epv<C: ConnectionTrait>(
    db: &C,
    epv_id: &str,
) -> Result<expense_record::Model, ServiceError> {
    expense_record::Entity::find()
        .filter(expense_record::Column::EpvId.eq(epv_id))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Expense record {} not found", epv_id)))
}

pub(crate) async fn emit(event_sender: &EventSender, events: Vec<Event>) -> Result<(), ServiceError> {
    for event in events {
        event_sender.send(event).await.map_err(|e| {
            let msg = format!("Failed to publish workflow event: {}", e);
            error!("{}", msg);
            ServiceError::EventError(msg)
        })?;
    }
    Ok(())
}

/// Trims and rejects blank text.
pub(crate) fn required_text(value: &str, field: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ServiceError::ValidationError(format!("{} is required", field)))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Where a record's supporting document lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DocumentLocator {
    pub file_url: Option<String>,
    pub drive_file_id: Option<String>,
    pub document_path: Option<String>,
}
