use crate::{
    auth::RequestContext,
    commands::{emit, Command, DocumentLocator},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{cost_center, expense_item, expense_record, DocumentStatus, ExpenseStatus, InvoiceType},
    workflow::amount_in_words,
};
use chrono::{NaiveDate, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref EXPENSE_SUBMISSIONS: IntCounter = IntCounter::new(
        "epv_expense_submissions_total",
        "Total number of expense claims submitted"
    )
    .expect("metric can be created");
    static ref EXPENSE_SUBMISSION_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "epv_expense_submission_failures_total",
            "Total number of failed expense submissions"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// One line of an expense claim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpenseLine {
    pub invoice_date: Option<NaiveDate>,
    pub expense_head: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub gst: Decimal,
    pub amount: Option<Decimal>,
    /// Backed by a separately recorded master invoice; no receipt needed.
    #[serde(default)]
    pub split_invoice: bool,
    pub receipt_filename: Option<String>,
    pub receipt_path: Option<String>,
}

/// Checks every line and returns the claim total. `has_receipt` tells whether
/// the line at that position carries a receipt.
pub fn validate_lines<'a, I>(lines: I) -> Result<Decimal, ServiceError>
where
    I: IntoIterator<Item = (&'a ExpenseLine, bool)>,
{
    let mut total = Decimal::ZERO;
    let mut count = 0usize;

    for (idx, (line, has_receipt)) in lines.into_iter().enumerate() {
        count += 1;
        let position = idx + 1;
        let amount = line.amount.ok_or_else(|| {
            ServiceError::ValidationError(format!("Line {}: amount is required", position))
        })?;
        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: amount must be greater than zero",
                position
            )));
        }
        if line.invoice_date.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: invoice date is required",
                position
            )));
        }
        if line
            .expense_head
            .as_deref()
            .map_or(true, |h| h.trim().is_empty())
        {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: expense head is required",
                position
            )));
        }
        if line.gst < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: GST cannot be negative",
                position
            )));
        }
        if !line.split_invoice && !has_receipt {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: a receipt is required",
                position
            )));
        }
        total += amount;
    }

    if count == 0 {
        return Err(ServiceError::ValidationError(
            "At least one expense line is required".to_string(),
        ));
    }
    Ok(total)
}

pub fn validate_period(from: NaiveDate, to: NaiveDate) -> Result<(), ServiceError> {
    if from > to {
        Err(ServiceError::ValidationError(
            "From date cannot be after to date".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// Refuses lines invoiced before `oldest`.
pub fn validate_invoice_age<'a, I>(lines: I, oldest: NaiveDate) -> Result<(), ServiceError>
where
    I: IntoIterator<Item = &'a ExpenseLine>,
{
    for (idx, line) in lines.into_iter().enumerate() {
        if let Some(date) = line.invoice_date.filter(|d| *d < oldest) {
            return Err(ServiceError::ValidationError(format!(
                "Line {}: invoice date {} is older than the allowed {}",
                idx + 1,
                date,
                oldest
            )));
        }
    }
    Ok(())
}

/// Persists a claim whose documents have already been produced.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitExpenseCommand {
    #[validate(length(min = 5))]
    pub epv_id: String,
    pub submitter: RequestContext,
    pub employee_id: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub cost_center_id: Uuid,
    pub payment_to: Option<String>,
    pub city: Option<String>,
    pub academic_year: String,
    #[validate(length(min = 1, message = "At least one expense line is required"))]
    pub lines: Vec<ExpenseLine>,
    pub document: DocumentLocator,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmittedExpense {
    pub record: expense_record::Model,
    pub items: Vec<expense_item::Model>,
}

#[async_trait::async_trait]
impl Command for SubmitExpenseCommand {
    type Result = SubmittedExpense;

    #[instrument(skip(self, db_pool, event_sender), fields(epv_id = %self.epv_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.validate().map_err(|e| {
            EXPENSE_SUBMISSION_FAILURES.with_label_values(&["validation"]).inc();
            ServiceError::from(e)
        })?;

        let db = db_pool.as_ref();
        let submitted = self.persist(db).await.map_err(|e| {
            EXPENSE_SUBMISSION_FAILURES
                .with_label_values(&[e.error_type()])
                .inc();
            e
        })?;

        info!(
            record_id = %submitted.record.id,
            epv_id = %submitted.record.epv_id,
            submitter = %self.submitter.email,
            lines = submitted.items.len(),
            "Expense claim submitted"
        );
        emit(
            &event_sender,
            vec![Event::ExpenseSubmitted {
                record_id: submitted.record.id,
                epv_id: submitted.record.epv_id.clone(),
            }],
        )
        .await?;

        EXPENSE_SUBMISSIONS.inc();
        Ok(submitted)
    }
}

impl SubmitExpenseCommand {
    async fn persist(&self, db: &DbPool) -> Result<SubmittedExpense, ServiceError> {
        validate_period(self.from_date, self.to_date)?;
        let total = validate_lines(
            self.lines
                .iter()
                .map(|l| (l, l.receipt_path.is_some())),
        )?;

        let cost_center = cost_center::Entity::find_by_id(self.cost_center_id)
            .one(db)
            .await?
            .filter(|cc| cc.is_active)
            .ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Unknown cost center {}",
                    self.cost_center_id
                ))
            })?;

        let now = Utc::now();
        let city = self
            .city
            .clone()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| cost_center.city.clone());

        let txn = db.begin().await?;

        let record = expense_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            epv_id: Set(self.epv_id.clone()),
            email_id: Set(self.submitter.email.clone()),
            employee_name: Set(self.submitter.name.clone()),
            employee_id: Set(self.employee_id.clone()),
            from_date: Set(self.from_date),
            to_date: Set(self.to_date),
            payment_to: Set(self.payment_to.clone()),
            submission_date: Set(now),
            academic_year: Set(self.academic_year.clone()),
            cost_center_id: Set(Some(cost_center.id)),
            cost_center_name: Set(Some(cost_center.name.clone())),
            city: Set(city),
            file_url: Set(self.document.file_url.clone()),
            drive_file_id: Set(self.document.drive_file_id.clone()),
            document_path: Set(self.document.document_path.clone()),
            total_amount: Set(total),
            amount_in_words: Set(amount_in_words(total)),
            invoice_type: Set(InvoiceType::Standard),
            master_invoice_id: Set(None),
            split_status: Set(None),
            approved_amount: Set(Decimal::ZERO),
            rejected_amount: Set(Decimal::ZERO),
            pending_amount: Set(total),
            status: Set(ExpenseStatus::Submitted),
            finance_status: Set(None),
            document_status: Set(DocumentStatus::Complete),
            requested_documents: Set(None),
            rejection_reason: Set(None),
            being_processed_by: Set(None),
            processing_started_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!("Failed to insert expense record {}: {}", self.epv_id, e);
            ServiceError::db_error(e)
        })?;

        let mut items = Vec::with_capacity(self.lines.len());
        for line in &self.lines {
            let item = expense_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                expense_record_id: Set(record.id),
                invoice_date: Set(line.invoice_date.unwrap_or(self.from_date)),
                expense_head: Set(line
                    .expense_head
                    .as_deref()
                    .unwrap_or_default()
                    .trim()
                    .to_string()),
                description: Set(line.description.clone()),
                gst: Set(line.gst),
                amount: Set(line.amount.unwrap_or_default()),
                receipt_filename: Set(line.receipt_filename.clone()),
                receipt_path: Set(line.receipt_path.clone()),
                split_invoice: Set(line.split_invoice),
            }
            .insert(&txn)
            .await?;
            items.push(item);
        }

        txn.commit().await?;
        Ok(SubmittedExpense { record, items })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn line(amount: Option<Decimal>, split: bool) -> ExpenseLine {
        ExpenseLine {
            invoice_date: NaiveDate::from_ymd_opt(2024, 1, 2),
            expense_head: Some("Travel".into()),
            description: None,
            gst: Decimal::ZERO,
            amount,
            split_invoice: split,
            receipt_filename: None,
            receipt_path: None,
        }
    }

    #[test]
    fn totals_valid_lines() {
        let lines = vec![line(Some(dec!(100.50)), false), line(Some(dec!(49.50)), true)];
        let total = validate_lines(vec![(&lines[0], true), (&lines[1], false)]).unwrap();
        assert_eq!(total, dec!(150));
    }

    #[test]
    fn rejects_empty_claims_and_bad_amounts() {
        assert_matches!(validate_lines(Vec::new()), Err(ServiceError::ValidationError(_)));

        let zero = line(Some(dec!(0)), false);
        assert_matches!(
            validate_lines(vec![(&zero, true)]),
            Err(ServiceError::ValidationError(msg)) if msg.contains("greater than zero")
        );

        let missing = line(None, false);
        assert_matches!(validate_lines(vec![(&missing, true)]), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn receipts_required_unless_split() {
        let plain = line(Some(dec!(10)), false);
        assert_matches!(
            validate_lines(vec![(&plain, false)]),
            Err(ServiceError::ValidationError(msg)) if msg.contains("receipt")
        );
        let split = line(Some(dec!(10)), true);
        assert!(validate_lines(vec![(&split, false)]).is_ok());
    }

    #[test]
    fn period_must_be_ordered() {
        let jan = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
        assert!(validate_period(jan(1), jan(1)).is_ok());
        assert_matches!(validate_period(jan(2), jan(1)), Err(ServiceError::ValidationError(_)));
    }

    #[test]
    fn stale_invoices_are_refused() {
        let oldest = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let fresh = line(Some(dec!(10)), false);
        assert!(validate_invoice_age([&fresh], oldest).is_ok());

        let mut stale = line(Some(dec!(10)), false);
        stale.invoice_date = NaiveDate::from_ymd_opt(2023, 12, 31);
        assert_matches!(
            validate_invoice_age([&fresh, &stale], oldest),
            Err(ServiceError::ValidationError(msg)) if msg.starts_with("Line 2")
        );
    }
}
