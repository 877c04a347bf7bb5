use crate::{
    auth::{RequestContext, Role},
    commands::{emit, find_record, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{expense_record, finance_entry, FcraStatus, FinanceEntryStatus, FinanceStatus},
    workflow::lock,
};
use chrono::{Duration, Utc};
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, Opts};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{ensure_city_access, ensure_in_finance_queue};

lazy_static! {
    static ref FINANCE_ENTRIES_CREATED: IntCounter = IntCounter::new(
        "epv_finance_entries_created_total",
        "Finance entries submitted for second-level approval"
    )
    .expect("metric can be created");
    static ref FINANCE_ENTRY_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "epv_finance_entry_failures_total",
            "Finance entries that could not be created"
        ),
        &["error_type"]
    )
    .expect("metric can be created");
}

/// One of the two instalments of a partial payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentSlot {
    pub amount: Option<Decimal>,
    pub journal_entry: Option<String>,
    pub payment_voucher: Option<String>,
    pub fcra_status: Option<FcraStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartialPayment {
    pub first: PaymentSlot,
    pub second: PaymentSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinanceEntryInput {
    pub vendor_name: String,
    pub journal_entry: Option<String>,
    pub payment_voucher: Option<String>,
    pub amount: Decimal,
    pub reason: Option<String>,
    pub fcra_status: FcraStatus,
    pub comments: Option<String>,
    /// Present when the amount is paid in two instalments.
    pub partial: Option<PartialPayment>,
}

impl FinanceEntryInput {
    /// Returns the two slot amounts for a partial payment.
    pub fn check(&self) -> Result<Option<(Decimal, Decimal)>, ServiceError> {
        required_text(&self.vendor_name, "Vendor name")?;
        if self.amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Amount must be greater than zero".to_string(),
            ));
        }
        let Some(partial) = &self.partial else {
            return Ok(None);
        };
        let (Some(first), Some(second)) = (partial.first.amount, partial.second.amount) else {
            return Err(ServiceError::ValidationError(
                "Both partial payment amounts are required".to_string(),
            ));
        };
        if first <= Decimal::ZERO || second <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Partial payment amounts must be greater than zero".to_string(),
            ));
        }
        if first + second != self.amount {
            return Err(ServiceError::ValidationError(format!(
                "Partial payments total {} but the entry amount is {}",
                first + second,
                self.amount
            )));
        }
        Ok(Some((first, second)))
    }
}

/// Records finance's processing of an approved expense and sends it for
/// second-level approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFinanceEntryCommand {
    pub record_id: Uuid,
    pub actor: RequestContext,
    pub entry: FinanceEntryInput,
    pub lock_timeout_minutes: i64,
}

#[async_trait::async_trait]
impl Command for CreateFinanceEntryCommand {
    type Result = finance_entry::Model;

    #[instrument(skip(self, db_pool, event_sender), fields(record_id = %self.record_id, actor = %self.actor.email))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let entry = self.create(db_pool.as_ref()).await.map_err(|e| {
            FINANCE_ENTRY_FAILURES
                .with_label_values(&[e.error_type()])
                .inc();
            e
        })?;

        info!(entry_id = %entry.id, amount = %entry.amount, "Finance entry created");
        emit(
            &event_sender,
            vec![Event::FinanceEntryCreated {
                entry_id: entry.id,
                record_id: entry.expense_record_id,
            }],
        )
        .await?;

        FINANCE_ENTRIES_CREATED.inc();
        Ok(entry)
    }
}

impl CreateFinanceEntryCommand {
    async fn create(&self, db: &DbPool) -> Result<finance_entry::Model, ServiceError> {
        self.actor.require_role(&[Role::Finance], "create finance entries")?;
        let slots = self.entry.check()?;

        let txn = db.begin().await?;
        let record = find_record(&txn, self.record_id).await?;
        ensure_in_finance_queue(&record)?;
        ensure_city_access(&txn, &self.actor, &record).await?;

        let now = Utc::now();
        lock::claim(
            &txn,
            record.id,
            &self.actor.email,
            Duration::minutes(self.lock_timeout_minutes),
            now,
        )
        .await?;

        let live = finance_entry::Entity::find()
            .filter(finance_entry::Column::ExpenseRecordId.eq(record.id))
            .filter(finance_entry::Column::Status.ne(FinanceEntryStatus::Rejected))
            .count(&txn)
            .await?;
        if live > 0 {
            return Err(ServiceError::Conflict(format!(
                "Expense {} already has a finance entry",
                record.epv_id
            )));
        }

        let input = &self.entry;
        let partial = input.partial.clone().unwrap_or_else(|| PartialPayment {
            first: PaymentSlot::default(),
            second: PaymentSlot::default(),
        });
        let entry = finance_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            expense_record_id: Set(record.id),
            finance_user_email: Set(self.actor.email.clone()),
            entry_date: Set(now),
            vendor_name: Set(input.vendor_name.trim().to_string()),
            journal_entry: Set(input.journal_entry.clone()),
            payment_voucher: Set(input.payment_voucher.clone()),
            amount: Set(input.amount),
            reason: Set(input.reason.clone()),
            fcra_status: Set(input.fcra_status),
            comments: Set(input.comments.clone()),
            is_partial_payment: Set(slots.is_some()),
            amount_1: Set(slots.map(|(first, _)| first)),
            journal_entry_1: Set(partial.first.journal_entry),
            payment_voucher_1: Set(partial.first.payment_voucher),
            fcra_status_1: Set(partial.first.fcra_status),
            transaction_id_1: Set(None),
            payment_date_1: Set(None),
            amount_2: Set(slots.map(|(_, second)| second)),
            journal_entry_2: Set(partial.second.journal_entry),
            payment_voucher_2: Set(partial.second.payment_voucher),
            fcra_status_2: Set(partial.second.fcra_status),
            transaction_id_2: Set(None),
            payment_date_2: Set(None),
            transaction_id: Set(None),
            payment_date: Set(None),
            status: Set(FinanceEntryStatus::Pending),
            approver_email: Set(None),
            approved_on: Set(None),
            rejection_reason: Set(None),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        let mut active: expense_record::ActiveModel = record.into();
        active.finance_status = Set(Some(FinanceStatus::Processed));
        active.being_processed_by = Set(None);
        active.processing_started_at = Set(None);
        active.updated_at = Set(now);
        active.update(&txn).await?;

        txn.commit().await?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn input(amount: Decimal, partial: Option<(Option<Decimal>, Option<Decimal>)>) -> FinanceEntryInput {
        FinanceEntryInput {
            vendor_name: "Acme Travels".into(),
            journal_entry: Some("JE-1".into()),
            payment_voucher: None,
            amount,
            reason: None,
            fcra_status: FcraStatus::NonFcra,
            comments: None,
            partial: partial.map(|(a, b)| PartialPayment {
                first: PaymentSlot {
                    amount: a,
                    ..Default::default()
                },
                second: PaymentSlot {
                    amount: b,
                    ..Default::default()
                },
            }),
        }
    }

    #[test]
    fn full_payment_has_no_slots() {
        assert_eq!(input(dec!(500), None).check().unwrap(), None);
    }

    #[test]
    fn partial_slots_must_cover_the_amount() {
        assert_eq!(
            input(dec!(500), Some((Some(dec!(200)), Some(dec!(300))))).check().unwrap(),
            Some((dec!(200), dec!(300)))
        );
        assert_matches!(
            input(dec!(500), Some((Some(dec!(200)), Some(dec!(200))))).check(),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            input(dec!(500), Some((Some(dec!(500)), None))).check(),
            Err(ServiceError::ValidationError(msg)) if msg.contains("Both")
        );
    }

    #[test]
    fn vendor_and_amount_are_required() {
        let mut blank = input(dec!(10), None);
        blank.vendor_name = "  ".into();
        assert_matches!(blank.check(), Err(ServiceError::ValidationError(_)));
        assert_matches!(input(dec!(0), None).check(), Err(ServiceError::ValidationError(_)));
    }
}
