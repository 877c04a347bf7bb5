use crate::{
    commands::{emit, find_record, find_record_by_epv, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{allocation, approval, expense_record, AllocationStatus, ApprovalStatus},
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{IntCounterVec, Opts};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::recompute::{recompute_master, recompute_record};

lazy_static! {
    static ref APPROVAL_DECISIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("epv_approval_decisions_total", "Approval decisions recorded"),
        &["decision"]
    )
    .expect("metric can be created");
    static ref APPROVAL_DECISION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "epv_approval_decision_failures_total",
            "Approval decisions that could not be recorded"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve { comments: Option<String> },
    Reject { reason: String },
}

impl ApprovalDecision {
    fn status(&self) -> ApprovalStatus {
        match self {
            Self::Approve { .. } => ApprovalStatus::Approved,
            Self::Reject { .. } => ApprovalStatus::Rejected,
        }
    }
}

/// Consumes a single-use decision token.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DecideApprovalCommand {
    #[validate(length(min = 1))]
    pub epv_id: String,
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    pub decision: ApprovalDecision,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecorded {
    pub record: expense_record::Model,
    pub approval: approval::Model,
    /// Refreshed master when the decided record is a sub-invoice.
    pub master: Option<expense_record::Model>,
}

#[async_trait::async_trait]
impl Command for DecideApprovalCommand {
    type Result = DecisionRecorded;

    #[instrument(skip(self, db_pool, event_sender), fields(epv_id = %self.epv_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let result = async {
            self.validate()?;
            self.validate_decision()?;
            self.record_decision(db_pool.as_ref()).await
        }
        .await;

        let (recorded, old_status) = result.map_err(|e| {
            APPROVAL_DECISION_FAILURES
                .with_label_values(&[e.error_type()])
                .inc();
            warn!(error = %e, "Approval decision rejected");
            e
        })?;

        self.log_and_trigger_event(&event_sender, &recorded, old_status)
            .await?;
        APPROVAL_DECISIONS
            .with_label_values(&[self.decision.status().to_string().as_str()])
            .inc();
        Ok(recorded)
    }
}

impl DecideApprovalCommand {
    fn validate_decision(&self) -> Result<(), ServiceError> {
        if let ApprovalDecision::Reject { reason } = &self.decision {
            if reason.trim().is_empty() {
                return Err(ServiceError::ValidationError(
                    "A rejection reason is required".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn record_decision(
        &self,
        db: &DbPool,
    ) -> Result<(DecisionRecorded, crate::models::ExpenseStatus), ServiceError> {
        let invalid = || ServiceError::NotFound("Invalid or unknown approval token".to_string());

        let now = Utc::now();
        let new_status = self.decision.status();
        let (comments, reason) = match &self.decision {
            ApprovalDecision::Approve { comments } => (
                comments.clone().filter(|c| !c.trim().is_empty()),
                None,
            ),
            ApprovalDecision::Reject { reason } => {
                (Some(reason.trim().to_string()), Some(reason.trim().to_string()))
            }
        };

        let txn = db.begin().await?;

        // Consume the token before any read so concurrent deciders serialise
        // on this write; only one of them can move it out of pending.
        let consumed = approval::Entity::update_many()
            .col_expr(approval::Column::Status, Expr::value(new_status))
            .col_expr(approval::Column::ActionDate, Expr::value(now))
            .col_expr(approval::Column::Comments, Expr::value(comments))
            .filter(approval::Column::Token.eq(self.token.as_str()))
            .filter(approval::Column::Status.eq(ApprovalStatus::Pending))
            .exec(&txn)
            .await?;

        let record = find_record_by_epv(&txn, &self.epv_id)
            .await
            .map_err(|e| match e {
                ServiceError::NotFound(_) => invalid(),
                other => other,
            })?;
        let row = approval::Entity::find()
            .filter(approval::Column::Token.eq(self.token.as_str()))
            .one(&txn)
            .await?
            .filter(|a| a.expense_record_id == record.id)
            .ok_or_else(invalid)?;

        if consumed.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "This expense has already been {}",
                row.status
            )));
        }

        if let Some(allocation_id) = row.allocation_id {
            if let Some(alloc) = allocation::Entity::find_by_id(allocation_id).one(&txn).await? {
                let mut active: allocation::ActiveModel = alloc.into();
                active.status = Set(match new_status {
                    ApprovalStatus::Rejected => AllocationStatus::Rejected,
                    _ => AllocationStatus::Approved,
                });
                active.action_date = Set(Some(now));
                active.rejection_reason = Set(reason.clone());
                active.updated_at = Set(now);
                active.update(&txn).await?;
            }
        }

        let old_status = record.status;
        let master_id = record.master_invoice_id.filter(|_| record.is_sub_invoice());
        let record = recompute_record(&txn, record, reason.as_deref()).await?;
        let master = match master_id {
            Some(master_id) => Some(recompute_master(&txn, master_id).await?),
            None => None,
        };

        let approval = approval::Entity::find_by_id(row.id)
            .one(&txn)
            .await?
            .ok_or_else(invalid)?;

        txn.commit().await?;

        // Re-read outside the transaction for the caller.
        let record = find_record(db, record.id).await?;
        Ok((
            DecisionRecorded {
                record,
                approval,
                master,
            },
            old_status,
        ))
    }

    async fn log_and_trigger_event(
        &self,
        event_sender: &EventSender,
        recorded: &DecisionRecorded,
        old_status: crate::models::ExpenseStatus,
    ) -> Result<(), ServiceError> {
        info!(
            record_id = %recorded.record.id,
            approver = %recorded.approval.approver_email,
            decision = %recorded.approval.status,
            status = %recorded.record.status,
            "Approval decision recorded"
        );

        let mut events = vec![Event::ApprovalDecided {
            record_id: recorded.record.id,
            approval_id: recorded.approval.id,
            decision: recorded.approval.status,
        }];
        if old_status != recorded.record.status {
            events.push(Event::ExpenseStatusChanged {
                record_id: recorded.record.id,
                old_status,
                new_status: recorded.record.status,
            });
        }
        emit(event_sender, events).await
    }
}
