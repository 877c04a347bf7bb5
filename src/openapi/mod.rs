use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "EPV Workflow API",
        version = "1.0.0",
        description = r#"
# Expense voucher workflow

Submission of expense claims, approval through single-use email links, split
invoices allocated across cost centers, the supplementary document cycle and
finance processing.

## Identity

Callers are identified by headers set by the fronting identity proxy:
`X-User-Email`, `X-User-Name` and `X-User-Role` (Employee, Finance, Finance
Approver or Super Admin). Decision links carry their own token instead.

## Warnings

Mutating calls return `{ value, warnings }`. A warning means the change was
committed but a follow-up (an email, a drive upload) failed.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Expenses", description = "Claim submission and routing"),
        (name = "Split Invoices", description = "One invoice allocated across cost centers"),
        (name = "Approvals", description = "Emailed decision links"),
        (name = "Documents", description = "Supplementary document cycle"),
        (name = "Finance", description = "Finance queue, entries and payments"),
        (name = "Administration", description = "Cost centers, employees, expense heads and finance settings"),
        (name = "Reports", description = "Dashboard figures and expense trends")
    ),
    paths(
        crate::handlers::expenses::submit_expense,
        crate::handlers::expenses::list_own_expenses,
        crate::handlers::expenses::get_expense,
        crate::handlers::expenses::send_for_approval,
        crate::handlers::expenses::create_split_invoice,
        crate::handlers::expenses::allocation_totals,
        crate::handlers::expenses::request_documents,
        crate::handlers::expenses::upload_supplementary,
        crate::handlers::approvals::approve_expense,
        crate::handlers::approvals::reject_expense_form,
        crate::handlers::approvals::reject_expense,
        crate::handlers::finance::finance_queue,
        crate::handlers::finance::claim_processing,
        crate::handlers::finance::create_finance_entry,
        crate::handlers::finance::reject_finance_expense,
        crate::handlers::finance::review_finance_entry,
        crate::handlers::finance::update_payment_details,
        crate::handlers::finance::assign_city,
        crate::handlers::admin::list_cost_centers,
        crate::handlers::admin::create_cost_center,
        crate::handlers::admin::toggle_cost_center,
        crate::handlers::admin::update_finance_settings,
        crate::handlers::reports::dashboard,
        crate::handlers::reports::expense_trends,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::handlers::UploadPayload,
            crate::handlers::expenses::ExpenseLinePayload,
            crate::handlers::expenses::SubmitExpensePayload,
            crate::handlers::expenses::SendForApprovalPayload,
            crate::handlers::expenses::SplitInvoicePayload,
            crate::handlers::expenses::RequestDocumentsPayload,
            crate::handlers::expenses::SupplementaryFilePayload,
            crate::handlers::expenses::SupplementaryPayload,
            crate::handlers::approvals::RejectPayload,
            crate::handlers::approvals::PendingDecision,
            crate::handlers::finance::FinanceRejectPayload,
            crate::handlers::finance::PaymentDetailsPayload,
            crate::handlers::finance::AssignCityPayload,
            crate::handlers::admin::FinanceSettingsPayload,
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn openapi_routes<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/api-docs/openapi.json",
        get(|| async { Json(ApiDocV1::openapi()) }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_workflow_paths() {
        let doc = ApiDocV1::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/expenses"));
        assert!(doc.paths.paths.contains_key("/approve-expense/{epv_id}"));
        assert!(doc.paths.paths.contains_key("/api/v1/finance/queue"));
        assert!(doc.paths.paths.contains_key("/api/v1/reports/dashboard"));
        assert!(doc.paths.paths.contains_key("/api/v1/settings/finance"));
        let schemas = &doc.components.expect("components").schemas;
        assert!(schemas.contains_key("ErrorResponse"));
    }
}
