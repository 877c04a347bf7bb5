use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    auth::RequestContext,
    queries::{DashboardSummary, ExpenseTrends, ReportFilters, ReportPeriod, TrendGranularity},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct DashboardParams {
    /// all, this_month, last_month, this_quarter, last_quarter or this_year
    #[schema(value_type = Option<String>)]
    pub period: Option<ReportPeriod>,
    pub city: Option<String>,
    pub cost_center: Option<String>,
    pub expense_head: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct TrendParams {
    /// monthly, quarterly or yearly
    #[schema(value_type = Option<String>)]
    pub granularity: Option<TrendGranularity>,
    pub expense_head: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/dashboard",
    params(
        ("period" = Option<String>, Query, description = "all, this_month, last_month, this_quarter, last_quarter or this_year"),
        ("city" = Option<String>, Query, description = "City filter"),
        ("cost_center" = Option<String>, Query, description = "Cost center name filter"),
        ("expense_head" = Option<String>, Query, description = "Expense head filter")
    ),
    responses(
        (status = 200, description = "Dashboard figures", body = crate::ApiResponse<serde_json::Value>)
    ),
    tag = "Reports"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<DashboardParams>,
) -> ApiResult<DashboardSummary> {
    let filters = ReportFilters {
        period: params.period.unwrap_or_default(),
        city: params.city,
        cost_center: params.cost_center,
        expense_head: params.expense_head,
    };
    let summary = state.services.reports.dashboard(&ctx, filters).await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/expense-trends",
    params(
        ("granularity" = Option<String>, Query, description = "monthly, quarterly or yearly"),
        ("expense_head" = Option<String>, Query, description = "Only count lines of this expense head")
    ),
    responses(
        (status = 200, description = "Approved spend per period", body = crate::ApiResponse<serde_json::Value>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "Reports"
)]
pub async fn expense_trends(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<TrendParams>,
) -> ApiResult<ExpenseTrends> {
    let trends = state
        .services
        .reports
        .expense_trends(&ctx, params.granularity.unwrap_or_default(), params.expense_head)
        .await?;
    Ok(Json(ApiResponse::success(trends)))
}
