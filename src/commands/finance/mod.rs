//! Finance-side commands: the processing claim, finance entries and their
//! second-level review, payment details, finance rejection and city
//! assignments.

pub mod assign_city_command;
pub mod claim_processing_command;
pub mod create_finance_entry_command;
pub mod reject_finance_expense_command;
pub mod release_processing_command;
pub mod review_finance_entry_command;
pub mod toggle_city_assignment_command;
pub mod update_payment_details_command;

pub use assign_city_command::AssignCityCommand;
pub use claim_processing_command::ClaimProcessingCommand;
pub use create_finance_entry_command::{
    CreateFinanceEntryCommand, FinanceEntryInput, PartialPayment, PaymentSlot,
};
pub use reject_finance_expense_command::{FinanceRejectionKind, RejectFinanceExpenseCommand};
pub use release_processing_command::ReleaseProcessingCommand;
pub use review_finance_entry_command::{EntryDecision, ReviewFinanceEntryCommand, ReviewedEntry};
pub use toggle_city_assignment_command::ToggleCityAssignmentCommand;
pub use update_payment_details_command::{
    PaymentRecorded, SlotPaymentDetails, UpdatePaymentDetailsCommand,
};

use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use crate::{
    auth::{RequestContext, Role},
    errors::ServiceError,
    models::{city_assignment, employee, expense_record, finance_entry, finance_setting},
    workflow::invoice::resolve_city,
};

/// Cities the user is actively assigned to. Empty means unrestricted.
pub async fn assigned_cities<C: ConnectionTrait>(
    db: &C,
    email: &str,
) -> Result<Vec<String>, ServiceError> {
    let Some(emp) = employee::Entity::find_by_email(email)
        .one(db)
        .await?
    else {
        return Ok(Vec::new());
    };

    Ok(city_assignment::Entity::find()
        .filter(city_assignment::Column::EmployeeId.eq(emp.id))
        .filter(city_assignment::Column::IsActive.eq(true))
        .all(db)
        .await?
        .into_iter()
        .map(|a| a.city)
        .collect())
}

pub fn city_allowed(cities: &[String], city: Option<&str>) -> bool {
    match city {
        _ if cities.is_empty() => true,
        Some(city) => cities.iter().any(|c| c.eq_ignore_ascii_case(city)),
        // Records without any city are open to every finance user.
        None => true,
    }
}

/// Forbidden unless the actor's city assignments cover the record.
pub(crate) async fn ensure_city_access<C: ConnectionTrait>(
    db: &C,
    actor: &RequestContext,
    record: &expense_record::Model,
) -> Result<(), ServiceError> {
    if actor.role == Role::SuperAdmin {
        return Ok(());
    }
    let cities = assigned_cities(db, &actor.email).await?;
    if cities.is_empty() {
        return Ok(());
    }
    let city = resolve_city(db, record).await?;
    if city_allowed(&cities, city.as_deref()) {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "You are not assigned to expenses from {}",
            city.unwrap_or_default()
        )))
    }
}

pub(crate) fn ensure_in_finance_queue(record: &expense_record::Model) -> Result<(), ServiceError> {
    if record.is_in_finance_queue() {
        Ok(())
    } else {
        Err(ServiceError::Conflict(format!(
            "Expense {} is not awaiting finance processing",
            record.epv_id
        )))
    }
}

pub(crate) async fn find_entry<C: ConnectionTrait>(
    db: &C,
    entry_id: Uuid,
) -> Result<finance_entry::Model, ServiceError> {
    finance_entry::Entity::find_by_id(entry_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Finance entry {} not found", entry_id)))
}

/// The processing-days SOP: the finance setting when it parses, else `default`.
pub async fn max_processing_days<C: ConnectionTrait>(
    db: &C,
    default: i64,
) -> Result<i64, ServiceError> {
    Ok(finance_setting::Entity::find_by_id(finance_setting::MAX_DAYS_PROCESSING.to_string())
        .one(db)
        .await?
        .and_then(|s| s.setting_value.trim().parse::<i64>().ok())
        .filter(|days| *days > 0)
        .unwrap_or(default))
}
