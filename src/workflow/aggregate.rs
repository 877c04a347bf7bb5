//! The approval aggregate rule shared by records and master invoices.

use rust_decimal::Decimal;

use crate::models::{ApprovalStatus, ExpenseStatus, SplitStatus};

/// A single approver's (or sub-invoice's) standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
}

impl Decision {
    /// Bookkeeping rows (`documents_requested`, `resubmitted`) carry no decision.
    pub fn from_approval(status: ApprovalStatus) -> Option<Self> {
        match status {
            ApprovalStatus::Pending => Some(Self::Pending),
            ApprovalStatus::Approved => Some(Self::Approved),
            ApprovalStatus::Rejected => Some(Self::Rejected),
            ApprovalStatus::DocumentsRequested | ApprovalStatus::Resubmitted => None,
        }
    }

    pub fn from_sub_invoice(status: ExpenseStatus) -> Self {
        match status {
            ExpenseStatus::Approved => Self::Approved,
            ExpenseStatus::Rejected => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Approved,
    PartiallyApproved,
    Rejected,
}

impl Aggregate {
    pub fn expense_status(self) -> ExpenseStatus {
        match self {
            Self::Approved => ExpenseStatus::Approved,
            Self::PartiallyApproved => ExpenseStatus::PartiallyApproved,
            Self::Rejected => ExpenseStatus::Rejected,
        }
    }

    pub fn split_status(self) -> SplitStatus {
        match self {
            Self::Approved => SplitStatus::FullyApproved,
            Self::PartiallyApproved => SplitStatus::PartiallyApproved,
            Self::Rejected => SplitStatus::Rejected,
        }
    }
}

/// Any rejection rejects the whole; unanimous approval approves it; anything
/// else is partial. `None` when there is nothing to aggregate.
pub fn aggregate<I>(decisions: I) -> Option<Aggregate>
where
    I: IntoIterator<Item = Decision>,
{
    let mut seen = false;
    let mut all_approved = true;
    for decision in decisions {
        seen = true;
        match decision {
            Decision::Rejected => return Some(Aggregate::Rejected),
            Decision::Pending => all_approved = false,
            Decision::Approved => {}
        }
    }

    match (seen, all_approved) {
        (false, _) => None,
        (true, true) => Some(Aggregate::Approved),
        (true, false) => Some(Aggregate::PartiallyApproved),
    }
}

/// Aggregate over a record's approval rows, ignoring bookkeeping rows.
pub fn aggregate_approvals<I>(statuses: I) -> Option<Aggregate>
where
    I: IntoIterator<Item = ApprovalStatus>,
{
    aggregate(statuses.into_iter().filter_map(Decision::from_approval))
}

/// Running totals of a master invoice over its sub-invoices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SplitTotals {
    pub approved: Decimal,
    pub rejected: Decimal,
    pub pending: Decimal,
}

pub fn split_totals<I>(subs: I) -> SplitTotals
where
    I: IntoIterator<Item = (ExpenseStatus, Decimal)>,
{
    subs.into_iter()
        .fold(SplitTotals::default(), |mut totals, (status, amount)| {
            match Decision::from_sub_invoice(status) {
                Decision::Approved => totals.approved += amount,
                Decision::Rejected => totals.rejected += amount,
                Decision::Pending => totals.pending += amount,
            }
            totals
        })
}
