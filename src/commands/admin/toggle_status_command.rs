use crate::{
    auth::RequestContext,
    commands::{emit, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{cost_center, employee, expense_head},
};
use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum::Display;
use tracing::{info, instrument};
use uuid::Uuid;

use super::require_admin;

lazy_static! {
    static ref STATUS_TOGGLES: IntCounterVec = IntCounterVec::new(
        Opts::new("epv_master_data_toggles_total", "Master data rows switched on or off"),
        &["kind"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MasterDataKind {
    CostCenter,
    Employee,
    ExpenseHead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusToggled {
    pub kind: MasterDataKind,
    pub id: Uuid,
    pub is_active: bool,
}

/// Flips the active flag of a cost center, employee or expense head.
/// Inactive rows stay referenced by past claims; they only drop out of
/// pickers and routing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleStatusCommand {
    pub actor: RequestContext,
    pub kind: MasterDataKind,
    pub id: Uuid,
}

impl ToggleStatusCommand {
    fn not_found(&self) -> ServiceError {
        ServiceError::NotFound(format!("{} {} not found", self.kind, self.id))
    }
}

#[async_trait::async_trait]
impl Command for ToggleStatusCommand {
    type Result = StatusToggled;

    #[instrument(skip(self, db_pool, event_sender), fields(kind = %self.kind, id = %self.id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        require_admin(&self.actor, "change master data status")?;
        let db = db_pool.as_ref();

        let is_active = match self.kind {
            MasterDataKind::CostCenter => {
                let row = cost_center::Entity::find_by_id(self.id)
                    .one(db)
                    .await?
                    .ok_or_else(|| self.not_found())?;
                let flipped = !row.is_active;
                let mut active: cost_center::ActiveModel = row.into();
                active.is_active = Set(flipped);
                active.update(db).await?.is_active
            }
            MasterDataKind::Employee => {
                let row = employee::Entity::find_by_id(self.id)
                    .one(db)
                    .await?
                    .ok_or_else(|| self.not_found())?;
                if self.actor.is(&row.email) {
                    return Err(ServiceError::Conflict(
                        "You cannot change your own status".to_string(),
                    ));
                }
                let flipped = !row.is_active;
                let mut active: employee::ActiveModel = row.into();
                active.is_active = Set(flipped);
                active.update(db).await?.is_active
            }
            MasterDataKind::ExpenseHead => {
                let row = expense_head::Entity::find_by_id(self.id)
                    .one(db)
                    .await?
                    .ok_or_else(|| self.not_found())?;
                let flipped = !row.is_active;
                let mut active: expense_head::ActiveModel = row.into();
                active.is_active = Set(flipped);
                active.update(db).await?.is_active
            }
        };

        STATUS_TOGGLES
            .with_label_values(&[self.kind.to_string().as_str()])
            .inc();
        info!(is_active, "Master data status changed");
        emit(
            &event_sender,
            vec![Event::MasterDataChanged {
                kind: self.kind.to_string(),
                id: self.id,
                is_active,
            }],
        )
        .await?;
        Ok(StatusToggled {
            kind: self.kind,
            id: self.id,
            is_active,
        })
    }
}
