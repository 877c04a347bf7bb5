use crate::{
    auth::RequestContext,
    commands::{emit, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::finance_setting,
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::{ops::RangeInclusive, sync::Arc};
use tracing::{info, instrument};

use super::require_admin;

lazy_static! {
    static ref FINANCE_SETTING_CHANGES: IntCounter = IntCounter::new(
        "epv_finance_setting_changes_total",
        "Finance settings whose value changed"
    )
    .expect("metric can be created");
}

pub const PROCESSING_DAYS_RANGE: RangeInclusive<i64> = 1..=200;
pub const PAST_DAYS_RANGE: RangeInclusive<i64> = 1..=365;

/// Sets the processing-days SOP and the oldest invoice age a claim may
/// carry. Unchanged values keep their change log untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFinanceSettingsCommand {
    pub actor: RequestContext,
    pub max_days_processing: i64,
    pub max_days_past: i64,
}

fn check_range(value: i64, range: &RangeInclusive<i64>, label: &str) -> Result<(), ServiceError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ServiceError::ValidationError(format!(
            "{} must be between {} and {} days",
            label,
            range.start(),
            range.end()
        )))
    }
}

#[async_trait::async_trait]
impl Command for UpdateFinanceSettingsCommand {
    type Result = Vec<finance_setting::Model>;

    #[instrument(skip(self, db_pool, event_sender), fields(actor = %self.actor.email))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        require_admin(&self.actor, "update finance settings")?;
        check_range(self.max_days_processing, &PROCESSING_DAYS_RANGE, "Max processing days")?;
        check_range(self.max_days_past, &PAST_DAYS_RANGE, "Max days past")?;

        let txn = db_pool.begin().await?;
        let mut events = Vec::new();
        let mut saved = Vec::new();
        for (name, value, description) in [
            (
                finance_setting::MAX_DAYS_PROCESSING,
                self.max_days_processing,
                "Days allowed from approval to payment",
            ),
            (
                finance_setting::MAX_DAYS_PAST,
                self.max_days_past,
                "Oldest invoice date accepted on a claim, in days",
            ),
        ] {
            let (row, change) = self
                .write_setting(&txn, name, value.to_string(), description)
                .await?;
            if let Some(event) = change {
                events.push(event);
            }
            saved.push(row);
        }
        txn.commit().await?;

        FINANCE_SETTING_CHANGES.inc_by(events.len() as u64);
        info!(changed = events.len(), "Finance settings updated");
        emit(&event_sender, events).await?;
        Ok(saved)
    }
}

impl UpdateFinanceSettingsCommand {
    async fn write_setting<C: ConnectionTrait>(
        &self,
        db: &C,
        name: &str,
        value: String,
        description: &str,
    ) -> Result<(finance_setting::Model, Option<Event>), ServiceError> {
        let now = Utc::now();
        match finance_setting::Entity::find_by_id(name.to_string()).one(db).await? {
            Some(current) if current.setting_value.trim() == value => Ok((current, None)),
            Some(current) => {
                let previous = current.setting_value.clone();
                let mut active: finance_setting::ActiveModel = current.into();
                active.setting_value = Set(value.clone());
                active.previous_value = Set(Some(previous.clone()));
                active.updated_by = Set(Some(self.actor.email.clone()));
                active.updated_on = Set(Some(now));
                let row = active.update(db).await?;
                Ok((
                    row,
                    Some(Event::FinanceSettingChanged {
                        setting_name: name.to_string(),
                        previous_value: Some(previous),
                        new_value: value,
                    }),
                ))
            }
            None => {
                let row = finance_setting::ActiveModel {
                    setting_name: Set(name.to_string()),
                    setting_value: Set(value.clone()),
                    description: Set(Some(description.to_string())),
                    previous_value: Set(None),
                    updated_by: Set(Some(self.actor.email.clone())),
                    updated_on: Set(Some(now)),
                }
                .insert(db)
                .await?;
                Ok((
                    row,
                    Some(Event::FinanceSettingChanged {
                        setting_name: name.to_string(),
                        previous_value: None,
                        new_value: value,
                    }),
                ))
            }
        }
    }
}
