use async_trait::async_trait;
use sea_orm::DatabaseConnection;

use crate::errors::ServiceError;

pub mod expense_queries;
pub mod finance_queries;
pub mod master_data_queries;
pub mod report_queries;

pub use expense_queries::{
    AllocationTotals, AllocationTotalsQuery, ExpenseDetail, GetExpenseDetailQuery,
    ListOwnExpensesQuery,
};
pub use finance_queries::{
    CityAssignmentView, EntryForReview, FinanceQueueQuery, ListCityAssignmentsQuery,
    PendingFinanceEntriesQuery, QueueItem, QueueView,
};
pub use master_data_queries::{
    FinanceSettingsQuery, ListCostCentersQuery, ListEmployeesQuery, ListExpenseHeadsQuery,
};
pub use report_queries::{
    DashboardSummary, DashboardSummaryQuery, ExpenseTrends, ExpenseTrendsQuery, ReportFilters,
    ReportPeriod, TrendGranularity,
};

/// Trait representing a generic asynchronous query.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    /// Executes the query using the provided database pool.
    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}
