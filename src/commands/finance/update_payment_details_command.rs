use crate::{
    auth::{RequestContext, Role},
    commands::{emit, find_record, required_text, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::{approval, finance_entry, FinanceEntryStatus, InvoiceType},
    workflow::{invoice::sub_invoices, processing_anchor, processing_days},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{find_entry, max_processing_days};

/// Transaction details for one instalment of a partial payment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotPaymentDetails {
    pub transaction_id: Option<String>,
    pub payment_date: Option<NaiveDate>,
}

/// Fills in the transaction details of an approved finance entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatePaymentDetailsCommand {
    pub entry_id: Uuid,
    pub actor: RequestContext,
    pub transaction_id: String,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub first_slot: Option<SlotPaymentDetails>,
    #[serde(default)]
    pub second_slot: Option<SlotPaymentDetails>,
    /// SOP used when no `max_days_processing` setting exists.
    pub default_max_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRecorded {
    pub entry: finance_entry::Model,
    pub processing_days: i64,
    pub max_days: i64,
    pub sop_exceeded: bool,
}

/// Approval rows that can anchor the processing clock; a master is approved
/// through its sub-invoices.
pub(crate) async fn anchor_rows<C: ConnectionTrait>(
    db: &C,
    record_id: Uuid,
) -> Result<Vec<approval::Model>, ServiceError> {
    let record = find_record(db, record_id).await?;
    let mut ids = vec![record.id];
    if record.invoice_type == InvoiceType::Master {
        ids.extend(sub_invoices(db, record.id).await?.into_iter().map(|s| s.id));
    }
    Ok(approval::Entity::find()
        .filter(approval::Column::ExpenseRecordId.is_in(ids))
        .all(db)
        .await?)
}

#[async_trait::async_trait]
impl Command for UpdatePaymentDetailsCommand {
    type Result = PaymentRecorded;

    #[instrument(skip(self, db_pool, event_sender), fields(entry_id = %self.entry_id, actor = %self.actor.email))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        self.actor
            .require_role(&[Role::Finance], "record payment details")?;
        let transaction_id = required_text(&self.transaction_id, "Transaction id")?;

        let db = db_pool.as_ref();
        let entry = find_entry(db, self.entry_id).await?;
        if !self.actor.is(&entry.finance_user_email) {
            return Err(ServiceError::Forbidden(
                "Only the finance user who created the entry may record its payment".to_string(),
            ));
        }
        if entry.status != FinanceEntryStatus::Approved {
            return Err(ServiceError::Conflict(format!(
                "Payment details need an approved entry; this one is {}",
                entry.status
            )));
        }

        let first = self.first_slot.clone().unwrap_or_default();
        let second = self.second_slot.clone().unwrap_or_default();
        let is_partial = entry.is_partial_payment;
        let record_id = entry.expense_record_id;

        let mut active: finance_entry::ActiveModel = entry.into();
        active.transaction_id = Set(Some(transaction_id));
        active.payment_date = Set(Some(self.payment_date));
        if is_partial {
            active.transaction_id_1 = Set(first.transaction_id);
            active.payment_date_1 = Set(first.payment_date);
            active.transaction_id_2 = Set(second.transaction_id);
            active.payment_date_2 = Set(second.payment_date);
        }
        active.updated_at = Set(Utc::now());
        let entry = active.update(db).await?;

        let anchor = processing_anchor(&anchor_rows(db, record_id).await?);
        let days = processing_days(anchor, entry.payment_date);
        let max_days = max_processing_days(db, self.default_max_days).await?;
        let sop_exceeded = days > max_days;

        if sop_exceeded {
            warn!(entry_id = %entry.id, days, max_days, "Processing exceeded the SOP");
        } else {
            info!(entry_id = %entry.id, days, "Payment details recorded");
        }
        emit(
            &event_sender,
            vec![Event::PaymentDetailsRecorded {
                entry_id: entry.id,
                processing_days: days,
                sop_exceeded,
            }],
        )
        .await?;

        Ok(PaymentRecorded {
            entry,
            processing_days: days,
            max_days,
            sop_exceeded,
        })
    }
}
