//! Master data kept by finance approvers and super admins: cost centers,
//! employees, expense heads and the finance settings.

pub mod save_cost_center_command;
pub mod save_employee_command;
pub mod save_expense_head_command;
pub mod toggle_status_command;
pub mod update_finance_settings_command;

pub use save_cost_center_command::{CostCenterInput, SaveCostCenterCommand};
pub use save_employee_command::{EmployeeInput, SaveEmployeeCommand};
pub use save_expense_head_command::{ExpenseHeadInput, SaveExpenseHeadCommand};
pub use toggle_status_command::{MasterDataKind, StatusToggled, ToggleStatusCommand};
pub use update_finance_settings_command::UpdateFinanceSettingsCommand;

use crate::{
    auth::{RequestContext, Role},
    errors::ServiceError,
};

pub(crate) const ADMIN_ROLES: &[Role] = &[Role::SuperAdmin, Role::FinanceApprover];

pub(crate) fn require_admin(actor: &RequestContext, action: &str) -> Result<(), ServiceError> {
    actor.require_role(ADMIN_ROLES, action)
}

/// Trimmed text, `None` when blank.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Trimmed, lower-cased email; rejects malformed addresses.
pub(crate) fn checked_email(value: &str, field: &str) -> Result<String, ServiceError> {
    let email = value.trim().to_lowercase();
    if validator::validate_email(email.as_str()) {
        Ok(email)
    } else {
        Err(ServiceError::ValidationError(format!(
            "{} is not a valid email: {}",
            field, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn blank_optional_text_is_none() {
        assert_eq!(optional_text(Some("  ")), None);
        assert_eq!(optional_text(Some(" Pune ")), Some("Pune".to_string()));
        assert_eq!(optional_text(None), None);
    }

    #[test]
    fn emails_are_normalised() {
        assert_eq!(checked_email(" Ravi@EPV.org ", "Approver").unwrap(), "ravi@epv.org");
        assert_matches!(
            checked_email("ravi", "Approver"),
            Err(ServiceError::ValidationError(msg)) if msg.contains("Approver")
        );
    }

    #[test]
    fn only_approvers_and_admins_manage_master_data() {
        let clerk = RequestContext::new("f@x.org", "F", Role::Finance);
        assert_matches!(require_admin(&clerk, "edit"), Err(ServiceError::Forbidden(_)));
        let admin = RequestContext::new("a@x.org", "A", Role::SuperAdmin);
        assert!(require_admin(&admin, "edit").is_ok());
    }
}
