use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::{
    auth::RequestContext,
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    queries::{
        DashboardSummary, DashboardSummaryQuery, ExpenseTrends, ExpenseTrendsQuery, Query,
        ReportFilters, TrendGranularity,
    },
};

/// Read-only reporting over the workflow tables.
#[derive(Clone)]
pub struct ReportsService {
    db_pool: Arc<DbPool>,
    config: Arc<AppConfig>,
}

impl ReportsService {
    pub fn new(db_pool: Arc<DbPool>, config: Arc<AppConfig>) -> Self {
        Self { db_pool, config }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    pub async fn dashboard(
        &self,
        ctx: &RequestContext,
        filters: ReportFilters,
    ) -> Result<DashboardSummary, ServiceError> {
        DashboardSummaryQuery {
            viewer: ctx.clone(),
            filters,
            today: Self::today(),
            default_max_days: self.config.default_max_processing_days,
        }
        .execute(self.db_pool.as_ref())
        .await
    }

    pub async fn expense_trends(
        &self,
        ctx: &RequestContext,
        granularity: TrendGranularity,
        expense_head: Option<String>,
    ) -> Result<ExpenseTrends, ServiceError> {
        ExpenseTrendsQuery {
            viewer: ctx.clone(),
            granularity,
            expense_head,
            today: Self::today(),
        }
        .execute(self.db_pool.as_ref())
        .await
    }
}
