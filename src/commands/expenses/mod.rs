pub mod create_split_invoice_command;
pub mod decide_approval_command;
pub(crate) mod recompute;
pub mod send_for_approval_command;
pub mod submit_expense_command;

pub use create_split_invoice_command::{
    AllocationInput, CreateSplitInvoiceCommand, SplitInvoice, SplitPart,
};
pub use decide_approval_command::{ApprovalDecision, DecideApprovalCommand, DecisionRecorded};
pub(crate) use send_for_approval_command::distinct_emails;
pub use send_for_approval_command::{RoutedApprovals, SendForApprovalCommand};
pub use submit_expense_command::{ExpenseLine, SubmitExpenseCommand, SubmittedExpense};
