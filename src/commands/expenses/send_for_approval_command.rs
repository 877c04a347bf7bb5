use crate::{
    commands::{emit, find_record, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{approval, employee, expense_record, ApprovalStatus, ExpenseStatus},
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref APPROVAL_REQUESTS: IntCounter = IntCounter::new(
        "epv_approval_requests_total",
        "Approval requests created"
    )
    .expect("metric can be created");
}

/// Creates one pending approval per new approver on a standard record.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SendForApprovalCommand {
    pub record_id: Uuid,
    #[validate(length(min = 1, message = "At least one approver is required"))]
    pub approver_emails: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoutedApprovals {
    pub record: expense_record::Model,
    /// Rows created by this call, tokens included.
    pub approvals: Vec<approval::Model>,
}

/// Trimmed, lower-cased, de-duplicated, in first-seen order.
pub(crate) fn distinct_emails(emails: &[String]) -> Result<Vec<String>, ServiceError> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in emails {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            continue;
        }
        if !validator::validate_email(email.as_str()) {
            return Err(ServiceError::ValidationError(format!(
                "Invalid approver email: {}",
                raw
            )));
        }
        if seen.insert(email.clone()) {
            out.push(email);
        }
    }
    if out.is_empty() {
        return Err(ServiceError::ValidationError(
            "At least one approver is required".to_string(),
        ));
    }
    Ok(out)
}

#[async_trait::async_trait]
impl Command for SendForApprovalCommand {
    type Result = RoutedApprovals;

    #[instrument(skip(self, db_pool, event_sender), fields(record_id = %self.record_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate()?;
        let emails = distinct_emails(&self.approver_emails)?;

        let db = db_pool.as_ref();
        let (routed, old_status) = self.route(db, emails).await?;

        info!(
            record_id = %routed.record.id,
            approvers = routed.approvals.len(),
            "Expense sent for approval"
        );
        let mut events = vec![Event::SentForApproval {
            record_id: routed.record.id,
            approver_count: routed.approvals.len(),
        }];
        if old_status != routed.record.status {
            events.push(Event::ExpenseStatusChanged {
                record_id: routed.record.id,
                old_status,
                new_status: routed.record.status,
            });
        }
        emit(&event_sender, events).await?;

        APPROVAL_REQUESTS.inc_by(routed.approvals.len() as u64);
        Ok(routed)
    }
}

impl SendForApprovalCommand {
    async fn route(
        &self,
        db: &DbPool,
        emails: Vec<String>,
    ) -> Result<(RoutedApprovals, ExpenseStatus), ServiceError> {
        let txn = db.begin().await?;
        let record = find_record(&txn, self.record_id).await?;

        if !matches!(
            record.status,
            ExpenseStatus::Submitted | ExpenseStatus::PendingApproval
        ) {
            return Err(ServiceError::Conflict(format!(
                "Expense {} is {} and cannot be sent for approval",
                record.epv_id, record.status
            )));
        }

        let existing = approval::Entity::find()
            .filter(approval::Column::ExpenseRecordId.eq(record.id))
            .all(&txn)
            .await?;
        if existing
            .iter()
            .any(|a| matches!(a.status, ApprovalStatus::Approved | ApprovalStatus::Rejected))
        {
            return Err(ServiceError::Conflict(format!(
                "Expense {} already has approval decisions",
                record.epv_id
            )));
        }

        let already_asked: HashSet<String> = existing
            .iter()
            .map(|a| a.approver_email.to_lowercase())
            .collect();
        let new_emails: Vec<String> = emails
            .into_iter()
            .filter(|e| !already_asked.contains(e))
            .collect();
        if new_emails.is_empty() {
            return Err(ServiceError::Conflict(format!(
                "Every listed approver already has a pending request for {}",
                record.epv_id
            )));
        }

        let now = Utc::now();
        let mut approvals = Vec::with_capacity(new_emails.len());
        for email in new_emails {
            let approver_name = employee::Entity::find_by_email(&email)
                .one(&txn)
                .await?
                .map(|e| e.name);

            let row = approval::ActiveModel {
                id: Set(Uuid::new_v4()),
                expense_record_id: Set(record.id),
                allocation_id: Set(None),
                approver_email: Set(email),
                approver_name: Set(approver_name),
                status: Set(ApprovalStatus::Pending),
                action_date: Set(None),
                comments: Set(None),
                token: Set(Some(Uuid::new_v4().to_string())),
                created_at: Set(now),
            }
            .insert(&txn)
            .await?;
            approvals.push(row);
        }

        let old_status = record.status;
        let mut active: expense_record::ActiveModel = record.into();
        active.status = Set(ExpenseStatus::PendingApproval);
        active.updated_at = Set(now);
        let record = active.update(&txn).await?;

        txn.commit().await?;
        Ok((RoutedApprovals { record, approvals }, old_status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn emails_are_normalised_and_deduplicated() {
        let emails = vec![
            " Boss@X.org ".to_string(),
            "boss@x.org".to_string(),
            "".to_string(),
            "cfo@x.org".to_string(),
        ];
        assert_eq!(
            distinct_emails(&emails).unwrap(),
            vec!["boss@x.org".to_string(), "cfo@x.org".to_string()]
        );
    }

    #[test]
    fn invalid_or_missing_emails_fail() {
        assert_matches!(
            distinct_emails(&["not-an-email".to_string()]),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            distinct_emails(&["  ".to_string()]),
            Err(ServiceError::ValidationError(_))
        );
    }
}
