// Workflow records
pub mod allocation;
pub mod approval;
pub mod expense_item;
pub mod expense_record;
pub mod finance_entry;
pub mod supplementary_document;

// Directory
pub mod city_assignment;
pub mod cost_center;
pub mod employee;
pub mod expense_head;
pub mod finance_setting;

pub use allocation::AllocationStatus;
pub use approval::ApprovalStatus;
pub use expense_record::{DocumentStatus, ExpenseStatus, FinanceStatus, InvoiceType, SplitStatus};
pub use finance_entry::{FcraStatus, FinanceEntryStatus};
