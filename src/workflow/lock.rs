//! Time-bounded advisory claim on an expense record.
//!
//! A record is held by `being_processed_by` since `processing_started_at`.
//! A claim older than the timeout is treated as free; expiry is evaluated
//! lazily whenever the lock is read or claimed. Claiming and releasing are
//! each a single conditional UPDATE so two finance users can never both win.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{employee, expense_record};

/// How a record's lock looks to a particular viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockView {
    Free,
    HeldBySelf { remaining_minutes: i64 },
    HeldByOther { holder: String, remaining_minutes: i64 },
}

fn remaining_minutes(started: DateTime<Utc>, timeout: Duration, now: DateTime<Utc>) -> i64 {
    let left = (started + timeout) - now;
    // Round up so a lock with seconds left never reads as zero.
    ((left.num_seconds() + 59) / 60).max(1)
}

/// Pure view of the lock columns; `holder` is whatever display form the caller
/// resolved for the holder email.
pub fn lock_view(
    record: &expense_record::Model,
    viewer_email: &str,
    timeout: Duration,
    now: DateTime<Utc>,
) -> LockView {
    match (&record.being_processed_by, record.processing_started_at) {
        (Some(holder), Some(started)) if started + timeout > now => {
            let remaining = remaining_minutes(started, timeout, now);
            if holder == viewer_email {
                LockView::HeldBySelf {
                    remaining_minutes: remaining,
                }
            } else {
                LockView::HeldByOther {
                    holder: holder.clone(),
                    remaining_minutes: remaining,
                }
            }
        }
        _ => LockView::Free,
    }
}

async fn holder_display_name<C: ConnectionTrait>(db: &C, email: &str) -> String {
    match employee::Entity::find_by_email(email)
        .one(db)
        .await
    {
        Ok(Some(emp)) => emp.name,
        _ => email.to_string(),
    }
}

/// Claims the record for `holder`, stealing an expired claim. Re-claiming a
/// lock already held by `holder` refreshes it.
pub async fn claim<C: ConnectionTrait>(
    db: &C,
    record_id: Uuid,
    holder: &str,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let cutoff = now - timeout;
    let result = expense_record::Entity::update_many()
        .col_expr(
            expense_record::Column::BeingProcessedBy,
            Expr::value(holder.to_string()),
        )
        .col_expr(expense_record::Column::ProcessingStartedAt, Expr::value(now))
        .filter(expense_record::Column::Id.eq(record_id))
        .filter(
            Condition::any()
                .add(expense_record::Column::BeingProcessedBy.is_null())
                .add(expense_record::Column::BeingProcessedBy.eq(holder))
                .add(expense_record::Column::ProcessingStartedAt.is_null())
                .add(expense_record::Column::ProcessingStartedAt.lte(cutoff)),
        )
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        debug!(%record_id, holder, "Processing lock claimed");
        return Ok(());
    }

    let record = expense_record::Entity::find_by_id(record_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Expense record {} not found", record_id)))?;

    match lock_view(&record, holder, timeout, now) {
        LockView::HeldByOther {
            holder: holder_email,
            remaining_minutes,
        } => Err(ServiceError::Locked {
            holder: holder_display_name(db, &holder_email).await,
            remaining_minutes,
        }),
        // The row changed between the update and the read; report it as busy.
        _ => Err(ServiceError::Conflict(format!(
            "Expense record {} is being updated, try again",
            record.epv_id
        ))),
    }
}

/// Releases the claim if `holder` owns it. Returns whether anything changed.
pub async fn release<C: ConnectionTrait>(
    db: &C,
    record_id: Uuid,
    holder: &str,
) -> Result<bool, ServiceError> {
    let result = clear_query()
        .filter(expense_record::Column::Id.eq(record_id))
        .filter(expense_record::Column::BeingProcessedBy.eq(holder))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

fn clear_query() -> sea_orm::UpdateMany<expense_record::Entity> {
    expense_record::Entity::update_many()
        .col_expr(
            expense_record::Column::BeingProcessedBy,
            Expr::value(Option::<String>::None),
        )
        .col_expr(
            expense_record::Column::ProcessingStartedAt,
            Expr::value(Option::<DateTime<Utc>>::None),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record_held_by(holder: Option<&str>, started: Option<DateTime<Utc>>) -> expense_record::Model {
        let now = Utc::now();
        expense_record::Model {
            id: Uuid::new_v4(),
            epv_id: "EPV-20240101-GEN-0000000000".into(),
            email_id: "a@x.org".into(),
            employee_name: "A".into(),
            employee_id: None,
            from_date: now.date_naive(),
            to_date: now.date_naive(),
            payment_to: None,
            submission_date: now,
            academic_year: "2024-2025".into(),
            cost_center_id: None,
            cost_center_name: None,
            city: None,
            file_url: None,
            drive_file_id: None,
            document_path: None,
            total_amount: Default::default(),
            amount_in_words: String::new(),
            invoice_type: crate::models::InvoiceType::Standard,
            master_invoice_id: None,
            split_status: None,
            approved_amount: Default::default(),
            rejected_amount: Default::default(),
            pending_amount: Default::default(),
            status: crate::models::ExpenseStatus::Approved,
            finance_status: None,
            document_status: crate::models::DocumentStatus::Complete,
            requested_documents: None,
            rejection_reason: None,
            being_processed_by: holder.map(str::to_string),
            processing_started_at: started,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn views_depend_on_viewer_and_expiry() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let timeout = Duration::minutes(30);

        let free = record_held_by(None, None);
        assert_eq!(lock_view(&free, "f@x.org", timeout, now), LockView::Free);

        let held = record_held_by(Some("f@x.org"), Some(now - Duration::minutes(10)));
        assert_eq!(
            lock_view(&held, "f@x.org", timeout, now),
            LockView::HeldBySelf { remaining_minutes: 20 }
        );
        assert_eq!(
            lock_view(&held, "g@x.org", timeout, now),
            LockView::HeldByOther {
                holder: "f@x.org".into(),
                remaining_minutes: 20
            }
        );

        let expired = record_held_by(Some("f@x.org"), Some(now - Duration::minutes(31)));
        assert_eq!(lock_view(&expired, "g@x.org", timeout, now), LockView::Free);
    }

    #[test]
    fn remaining_minutes_round_up() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let started = now - Duration::minutes(29) - Duration::seconds(30);
        assert_eq!(remaining_minutes(started, Duration::minutes(30), now), 1);
    }
}
