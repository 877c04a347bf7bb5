use crate::{
    auth::RequestContext,
    commands::{emit, find_record, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    workflow::lock,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Gives up the caller's own processing claim. Returns whether a claim was
/// released; releasing a claim someone else holds is a no-op.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseProcessingCommand {
    pub record_id: Uuid,
    pub actor: RequestContext,
}

#[async_trait::async_trait]
impl Command for ReleaseProcessingCommand {
    type Result = bool;

    #[instrument(skip(self, db_pool, event_sender), fields(record_id = %self.record_id, actor = %self.actor.email))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();
        let record = find_record(db, self.record_id).await?;
        let released = lock::release(db, record.id, &self.actor.email).await?;
        debug!(epv_id = %record.epv_id, released, "Processing claim release");

        if released {
            emit(&event_sender, vec![Event::ProcessingReleased(record.id)]).await?;
        }
        Ok(released)
    }
}
