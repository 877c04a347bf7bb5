use crate::{
    auth::{RequestContext, Role},
    commands::{emit, find_record, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::expense_record,
    workflow::lock,
};
use chrono::{Duration, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_city_access, ensure_in_finance_queue};

lazy_static! {
    static ref PROCESSING_CLAIMS: IntCounterVec = IntCounterVec::new(
        Opts::new("epv_processing_claims_total", "Finance processing claim attempts"),
        &["outcome"]
    )
    .expect("metric can be created");
}

/// Takes the soft processing lock on a record in the finance queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimProcessingCommand {
    pub record_id: Uuid,
    pub actor: RequestContext,
    pub lock_timeout_minutes: i64,
}

#[async_trait::async_trait]
impl Command for ClaimProcessingCommand {
    type Result = expense_record::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(record_id = %self.record_id, actor = %self.actor.email))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = self.claim(db_pool.as_ref()).await;
        PROCESSING_CLAIMS
            .with_label_values(&[match &result {
                Ok(_) => "claimed",
                Err(e) => e.error_type(),
            }])
            .inc();
        let record = result?;

        info!(epv_id = %record.epv_id, "Processing claim taken");
        emit(
            &event_sender,
            vec![Event::ProcessingClaimed {
                record_id: record.id,
                holder: self.actor.email.clone(),
            }],
        )
        .await?;
        Ok(record)
    }
}

impl ClaimProcessingCommand {
    async fn claim(&self, db: &DbPool) -> Result<expense_record::Model, ServiceError> {
        self.actor.require_role(&[Role::Finance], "process expenses")?;
        let record = find_record(db, self.record_id).await?;
        ensure_in_finance_queue(&record)?;
        ensure_city_access(db, &self.actor, &record).await?;

        lock::claim(
            db,
            record.id,
            &self.actor.email,
            Duration::minutes(self.lock_timeout_minutes),
            Utc::now(),
        )
        .await?;
        find_record(db, record.id).await
    }
}
