//! Pure workflow rules and the record-level primitives built on them.

pub mod aggregate;
pub mod amount_words;
pub mod business_days;
pub mod identifiers;
pub mod invoice;
pub mod lock;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::models::{approval, ApprovalStatus};

pub use aggregate::{aggregate, aggregate_approvals, split_totals, Aggregate, Decision, SplitTotals};
pub use amount_words::amount_in_words;
pub use business_days::business_days_between;
pub use invoice::InvoiceVariant;
pub use lock::LockView;

/// Result of a committed workflow operation plus any side effects that failed
/// after the commit (notifications, uploads).
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome<T> {
    pub value: T,
    pub warnings: Vec<String>,
}

impl<T> WorkflowOutcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WorkflowOutcome<U> {
        WorkflowOutcome {
            value: f(self.value),
            warnings: self.warnings,
        }
    }
}

fn row_time(row: &approval::Model) -> DateTime<Utc> {
    row.action_date.unwrap_or(row.created_at)
}

/// Start of the finance processing clock: the latest resubmission if the
/// record went through the document cycle, else the earliest approval.
pub fn processing_anchor<'a, I>(rows: I) -> Option<DateTime<Utc>>
where
    I: IntoIterator<Item = &'a approval::Model>,
{
    let mut latest_resubmission: Option<DateTime<Utc>> = None;
    let mut earliest_approval: Option<DateTime<Utc>> = None;

    for row in rows {
        match row.status {
            ApprovalStatus::Resubmitted => {
                let at = row_time(row);
                latest_resubmission = Some(latest_resubmission.map_or(at, |t| t.max(at)));
            }
            ApprovalStatus::Approved => {
                if let Some(at) = row.action_date {
                    earliest_approval = Some(earliest_approval.map_or(at, |t| t.min(at)));
                }
            }
            _ => {}
        }
    }

    latest_resubmission.or(earliest_approval)
}

/// Business days from the processing anchor to the payment date.
pub fn processing_days(anchor: Option<DateTime<Utc>>, payment_date: Option<NaiveDate>) -> i64 {
    business_days_between(anchor.map(|a| a.date_naive()), payment_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn row(status: ApprovalStatus, at: DateTime<Utc>) -> approval::Model {
        approval::Model {
            id: Uuid::new_v4(),
            expense_record_id: Uuid::nil(),
            allocation_id: None,
            approver_email: "a@x.org".into(),
            approver_name: None,
            status,
            action_date: Some(at),
            comments: None,
            token: None,
            created_at: at,
        }
    }

    #[test]
    fn anchor_prefers_latest_resubmission() {
        let jan = |d| Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap();
        let rows = vec![
            row(ApprovalStatus::Approved, jan(2)),
            row(ApprovalStatus::Resubmitted, jan(8)),
            row(ApprovalStatus::Resubmitted, jan(10)),
            row(ApprovalStatus::DocumentsRequested, jan(5)),
        ];
        assert_eq!(processing_anchor(&rows), Some(jan(10)));
    }

    #[test]
    fn anchor_falls_back_to_earliest_approval() {
        let jan = |d| Utc.with_ymd_and_hms(2024, 1, d, 9, 0, 0).unwrap();
        let rows = vec![
            row(ApprovalStatus::Approved, jan(4)),
            row(ApprovalStatus::Approved, jan(2)),
            row(ApprovalStatus::Pending, jan(1)),
        ];
        assert_eq!(processing_anchor(&rows), Some(jan(2)));
        assert_eq!(
            processing_days(processing_anchor(&rows), NaiveDate::from_ymd_opt(2024, 1, 5)),
            4
        );
    }

    #[test]
    fn no_anchor_means_zero_days() {
        assert_eq!(processing_anchor(&[]), None);
        assert_eq!(processing_days(None, NaiveDate::from_ymd_opt(2024, 1, 5)), 0);
    }
}
