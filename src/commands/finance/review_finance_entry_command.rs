use crate::{
    auth::{RequestContext, Role},
    commands::{emit, find_record, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{expense_record, finance_entry, FinanceEntryStatus, FinanceStatus},
};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_city_access, find_entry};

lazy_static! {
    static ref FINANCE_REVIEWS: IntCounterVec = IntCounterVec::new(
        Opts::new("epv_finance_reviews_total", "Second-level finance review decisions"),
        &["decision"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum EntryDecision {
    Approve,
    Reject { reason: String },
}

/// Finance Approver decision on a pending finance entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinanceEntryCommand {
    pub entry_id: Uuid,
    pub actor: RequestContext,
    pub decision: EntryDecision,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewedEntry {
    pub entry: finance_entry::Model,
    pub record: expense_record::Model,
}

#[async_trait::async_trait]
impl Command for ReviewFinanceEntryCommand {
    type Result = ReviewedEntry;

    #[instrument(skip(self, db_pool, event_sender), fields(entry_id = %self.entry_id, actor = %self.actor.email))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor
            .require_role(&[Role::FinanceApprover], "review finance entries")?;
        let reason = match &self.decision {
            EntryDecision::Approve => None,
            EntryDecision::Reject { reason } => Some(required_text(reason, "Rejection reason")?),
        };

        let txn = db_pool.begin().await?;
        let entry = find_entry(&txn, self.entry_id).await?;
        let record = find_record(&txn, entry.expense_record_id).await?;
        ensure_city_access(&txn, &self.actor, &record).await?;

        if entry.status != FinanceEntryStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Finance entry has already been {}",
                entry.status
            )));
        }

        let now = Utc::now();
        let new_status = if reason.is_some() {
            FinanceEntryStatus::Rejected
        } else {
            FinanceEntryStatus::Approved
        };
        let mut update = finance_entry::Entity::update_many()
            .col_expr(finance_entry::Column::Status, Expr::value(new_status))
            .col_expr(
                finance_entry::Column::ApproverEmail,
                Expr::value(Some(self.actor.email.clone())),
            )
            .col_expr(finance_entry::Column::UpdatedAt, Expr::value(now));
        update = match &reason {
            None => update.col_expr(
                finance_entry::Column::ApprovedOn,
                Expr::value(Some(now)),
            ),
            Some(reason) => update
                .col_expr(
                    finance_entry::Column::RejectionReason,
                    Expr::value(Some(reason.clone())),
                )
                .col_expr(
                    finance_entry::Column::ApprovedOn,
                    Expr::value(Option::<DateTime<Utc>>::None),
                ),
        };
        let result = update
            .filter(finance_entry::Column::Id.eq(entry.id))
            .filter(finance_entry::Column::Status.eq(FinanceEntryStatus::Pending))
            .exec(&txn)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "Finance entry was reviewed concurrently".to_string(),
            ));
        }

        // A rejected entry sends the record back to the finance queue for a new entry.
        let record = if new_status == FinanceEntryStatus::Rejected {
            let mut active: expense_record::ActiveModel = record.into();
            active.finance_status = Set(Some(FinanceStatus::Pending));
            active.updated_at = Set(now);
            active.update(&txn).await?
        } else {
            record
        };

        let entry = find_entry(&txn, entry.id).await?;
        txn.commit().await?;

        info!(entry_id = %entry.id, status = %entry.status, "Finance entry reviewed");
        emit(
            &event_sender,
            vec![Event::FinanceEntryReviewed {
                entry_id: entry.id,
                status: entry.status,
            }],
        )
        .await?;

        FINANCE_REVIEWS
            .with_label_values(&[entry.status.to_string().as_str()])
            .inc();
        Ok(ReviewedEntry { entry, record })
    }
}
