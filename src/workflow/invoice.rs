//! Standard, master, sub and split invoices as one tagged type.

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{cost_center, expense_record, InvoiceType, SplitStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InvoiceVariant {
    Standard,
    Master {
        split_status: Option<SplitStatus>,
        sub_invoices: Vec<Uuid>,
        approved_amount: Decimal,
        rejected_amount: Decimal,
        pending_amount: Decimal,
    },
    Sub {
        master_id: Uuid,
    },
    Split,
}

impl InvoiceVariant {
    pub fn from_record(
        record: &expense_record::Model,
        sub_invoices: Vec<Uuid>,
    ) -> Result<Self, ServiceError> {
        Ok(match record.invoice_type {
            InvoiceType::Standard => Self::Standard,
            InvoiceType::Split => Self::Split,
            InvoiceType::Master => Self::Master {
                split_status: record.split_status,
                sub_invoices,
                approved_amount: record.approved_amount,
                rejected_amount: record.rejected_amount,
                pending_amount: record.pending_amount,
            },
            InvoiceType::Sub => Self::Sub {
                master_id: record.master_invoice_id.ok_or_else(|| {
                    ServiceError::InternalError(format!(
                        "Sub invoice {} has no master invoice",
                        record.epv_id
                    ))
                })?,
            },
        })
    }

    pub async fn load<C: ConnectionTrait>(
        db: &C,
        record: &expense_record::Model,
    ) -> Result<Self, ServiceError> {
        let subs = if record.invoice_type == InvoiceType::Master {
            sub_invoices(db, record.id)
                .await?
                .into_iter()
                .map(|s| s.id)
                .collect()
        } else {
            Vec::new()
        };
        Self::from_record(record, subs)
    }
}

/// Sub-invoices of a master in creation order.
pub async fn sub_invoices<C: ConnectionTrait>(
    db: &C,
    master_id: Uuid,
) -> Result<Vec<expense_record::Model>, ServiceError> {
    Ok(expense_record::Entity::find()
        .filter(expense_record::Column::MasterInvoiceId.eq(master_id))
        .filter(expense_record::Column::InvoiceType.eq(InvoiceType::Sub))
        .order_by_asc(expense_record::Column::CreatedAt)
        .order_by_asc(expense_record::Column::EpvId)
        .all(db)
        .await?)
}

/// City a record is filed under: its own, else its cost center's, else for a
/// master the first sub-invoice's.
pub async fn resolve_city<C: ConnectionTrait>(
    db: &C,
    record: &expense_record::Model,
) -> Result<Option<String>, ServiceError> {
    if let Some(city) = non_empty(record.city.as_deref()) {
        return Ok(Some(city));
    }
    if let Some(cc_id) = record.cost_center_id {
        if let Some(cc) = cost_center::Entity::find_by_id(cc_id).one(db).await? {
            if let Some(city) = non_empty(cc.city.as_deref()) {
                return Ok(Some(city));
            }
        }
    }
    if record.invoice_type == InvoiceType::Master {
        if let Some(first) = sub_invoices(db, record.id).await?.into_iter().next() {
            if let Some(city) = non_empty(first.city.as_deref()) {
                return Ok(Some(city));
            }
            if let Some(cc_id) = first.cost_center_id {
                if let Some(cc) = cost_center::Entity::find_by_id(cc_id).one(db).await? {
                    return Ok(non_empty(cc.city.as_deref()));
                }
            }
        }
    }
    Ok(None)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
