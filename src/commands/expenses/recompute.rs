//! Re-derives aggregate state after a child row changes. Always called inside
//! the transaction that changed the child.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tracing::debug;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{approval, expense_record, ExpenseStatus},
    workflow::{aggregate, aggregate_approvals, invoice::sub_invoices, split_totals, Decision},
};

/// Applies the aggregate rule to the record's decision rows. Leaves the record
/// untouched when it has none.
pub(crate) async fn recompute_record<C: ConnectionTrait>(
    db: &C,
    record: expense_record::Model,
    rejection_reason: Option<&str>,
) -> Result<expense_record::Model, ServiceError> {
    let statuses = approval::Entity::find()
        .filter(approval::Column::ExpenseRecordId.eq(record.id))
        .all(db)
        .await?
        .into_iter()
        .map(|a| a.status);

    let Some(result) = aggregate_approvals(statuses) else {
        return Ok(record);
    };

    let new_status = result.expense_status();
    debug!(record_id = %record.id, from = %record.status, to = %new_status, "Recomputed record status");

    let mut active: expense_record::ActiveModel = record.into();
    active.status = Set(new_status);
    if new_status == ExpenseStatus::Rejected {
        if let Some(reason) = rejection_reason {
            active.rejection_reason = Set(Some(reason.to_string()));
        }
    }
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}

/// Same rule over the master's sub-invoices, plus the running totals.
pub(crate) async fn recompute_master<C: ConnectionTrait>(
    db: &C,
    master_id: Uuid,
) -> Result<expense_record::Model, ServiceError> {
    let master = crate::commands::find_record(db, master_id).await?;
    let subs = sub_invoices(db, master_id).await?;

    let totals = split_totals(subs.iter().map(|s| (s.status, s.total_amount)));
    let result = aggregate(subs.iter().map(|s| Decision::from_sub_invoice(s.status)));

    let mut active: expense_record::ActiveModel = master.into();
    active.approved_amount = Set(totals.approved);
    active.rejected_amount = Set(totals.rejected);
    active.pending_amount = Set(totals.pending);
    if let Some(result) = result {
        active.split_status = Set(Some(result.split_status()));
        active.status = Set(result.expense_status());
    }
    active.updated_at = Set(Utc::now());
    Ok(active.update(db).await?)
}
