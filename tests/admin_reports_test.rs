mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use chrono::{TimeZone, Utc};
use rust_decimal_macros::dec;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;

use common::*;
use epv_workflow::{
    auth::Role,
    commands::{
        admin::{CostCenterInput, EmployeeInput, ExpenseHeadInput, MasterDataKind},
        finance::{EntryDecision, FinanceEntryInput},
    },
    errors::ServiceError,
    models::{approval, expense_record, finance_setting, ApprovalStatus, FcraStatus},
    queries::{ReportFilters, TrendGranularity},
    services::PaymentDetailsRequest,
};

fn research() -> CostCenterInput {
    CostCenterInput {
        name: "Research".to_string(),
        city: Some("Delhi".to_string()),
        approver_email: Some("Ravi@EPV.org".to_string()),
        drive_folder_id: None,
        is_active: true,
    }
}

#[tokio::test]
async fn cost_centers_are_managed_by_approvers_and_admins() {
    let app = TestApp::new().await;
    let admin = &app.state.services.administration;

    for caller in [submitter(), finance(FINANCE_1)] {
        assert_matches!(
            admin.save_cost_center(&caller, None, research()).await,
            Err(ServiceError::Forbidden(_))
        );
    }

    let created = admin
        .save_cost_center(&finance_approver(), None, research())
        .await
        .unwrap();
    assert_eq!(created.approver_email.as_deref(), Some(APPROVER_A));
    assert_eq!(created.city.as_deref(), Some("Delhi"));

    let mut clash = research();
    clash.name = "research ".to_string();
    assert_matches!(
        admin.save_cost_center(&finance_approver(), None, clash).await,
        Err(ServiceError::Conflict(_))
    );

    // Name and city stay as created.
    let mut edit = research();
    edit.name = "Renamed".to_string();
    edit.city = Some("Chennai".to_string());
    edit.approver_email = Some(APPROVER_B.to_string());
    let edited = admin
        .save_cost_center(&finance_approver(), Some(created.id), edit)
        .await
        .unwrap();
    assert_eq!(edited.name, "Research");
    assert_eq!(edited.city.as_deref(), Some("Delhi"));
    assert_eq!(edited.approver_email.as_deref(), Some(APPROVER_B));
}

#[tokio::test]
async fn inactive_cost_centers_drop_out_of_submission() {
    let app = TestApp::new().await;
    let admin = &app.state.services.administration;
    let super_admin = ctx("root@epv.org", Role::SuperAdmin);

    let toggled = admin
        .toggle_status(&super_admin, MasterDataKind::CostCenter, app.operations.id)
        .await
        .unwrap();
    assert!(!toggled.is_active);

    let visible = admin.cost_centers(&submitter(), false).await.unwrap();
    assert!(visible.iter().all(|cc| cc.id != app.operations.id));
    assert_matches!(
        admin.cost_centers(&submitter(), true).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_eq!(admin.cost_centers(&super_admin, true).await.unwrap().len(), 2);

    let refused = app
        .state
        .services
        .expenses
        .submit_expense(&submitter(), app.claim_request(dec!(100)))
        .await;
    assert_matches!(refused, Err(ServiceError::ValidationError(_)));

    let back = admin
        .toggle_status(&super_admin, MasterDataKind::CostCenter, app.operations.id)
        .await
        .unwrap();
    assert!(back.is_active);
}

#[tokio::test]
async fn employee_emails_stay_unique_regardless_of_case() {
    let app = TestApp::new().await;
    let admin = &app.state.services.administration;
    let input = EmployeeInput {
        email: "Dev.Shah@EPV.org".to_string(),
        name: "Dev".to_string(),
        employee_id: Some("EMP-042".to_string()),
        manager_email: Some(APPROVER_A.to_string()),
        role: Role::Finance,
        is_active: true,
    };

    let created = admin.save_employee(&finance_approver(), None, input.clone()).await.unwrap();
    assert_eq!(created.email, "dev.shah@epv.org");
    assert_eq!(created.role, Role::Finance);

    let mut clash = input.clone();
    clash.email = "dev.shah@epv.org".to_string();
    assert_matches!(
        admin.save_employee(&finance_approver(), None, clash).await,
        Err(ServiceError::Conflict(_))
    );

    let mut taken = input.clone();
    taken.email = SUBMITTER.to_string();
    assert_matches!(
        admin.save_employee(&finance_approver(), Some(created.id), taken).await,
        Err(ServiceError::Conflict(_))
    );

    let mut promoted = input;
    promoted.role = Role::FinanceApprover;
    let edited = admin
        .save_employee(&finance_approver(), Some(created.id), promoted)
        .await
        .unwrap();
    assert_eq!(edited.id, created.id);
    assert_eq!(edited.role, Role::FinanceApprover);

    let own_id = app.employee(FINANCE_APPROVER).id;
    assert_matches!(
        admin
            .toggle_status(&finance_approver(), MasterDataKind::Employee, own_id)
            .await,
        Err(ServiceError::Conflict(_))
    );
    let toggled = admin
        .toggle_status(&finance_approver(), MasterDataKind::Employee, created.id)
        .await
        .unwrap();
    assert!(!toggled.is_active);
}

#[tokio::test]
async fn expense_heads_are_unique_and_toggle() {
    let app = TestApp::new().await;
    let admin = &app.state.services.administration;
    let travel = ExpenseHeadInput {
        head_name: "Travel".to_string(),
        head_code: Some("TRV".to_string()),
        description: None,
        is_active: true,
    };

    let created = admin.save_expense_head(&finance_approver(), None, travel.clone()).await.unwrap();
    let mut clash = travel.clone();
    clash.head_name = "TRAVEL".to_string();
    assert_matches!(
        admin.save_expense_head(&finance_approver(), None, clash).await,
        Err(ServiceError::Conflict(_))
    );

    let mut blank = travel;
    blank.head_name = "  ".to_string();
    assert_matches!(
        admin.save_expense_head(&finance_approver(), None, blank).await,
        Err(ServiceError::ValidationError(_))
    );

    admin
        .toggle_status(&finance_approver(), MasterDataKind::ExpenseHead, created.id)
        .await
        .unwrap();
    assert!(admin.expense_heads(&submitter(), false).await.unwrap().is_empty());
    assert_eq!(admin.expense_heads(&finance_approver(), true).await.unwrap().len(), 1);
}

#[tokio::test]
async fn finance_settings_keep_the_previous_value() {
    let app = TestApp::new().await;
    let admin = &app.state.services.administration;

    assert_matches!(
        admin.update_finance_settings(&finance(FINANCE_1), 10, 30).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        admin.update_finance_settings(&finance_approver(), 0, 30).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        admin.update_finance_settings(&finance_approver(), 10, 400).await,
        Err(ServiceError::ValidationError(_))
    );

    let first = admin.update_finance_settings(&finance_approver(), 10, 30).await.unwrap();
    assert!(first.iter().all(|s| s.previous_value.is_none()));

    let second = admin.update_finance_settings(&finance_approver(), 7, 30).await.unwrap();
    let processing = second
        .iter()
        .find(|s| s.setting_name == finance_setting::MAX_DAYS_PROCESSING)
        .unwrap();
    assert_eq!(processing.setting_value, "7");
    assert_eq!(processing.previous_value.as_deref(), Some("10"));
    assert_eq!(processing.updated_by.as_deref(), Some(FINANCE_APPROVER));
    let past = second
        .iter()
        .find(|s| s.setting_name == finance_setting::MAX_DAYS_PAST)
        .unwrap();
    assert_eq!(past.previous_value, None);

    let listed = admin.finance_settings(&finance_approver()).await.unwrap();
    assert_eq!(listed.len(), 2);
}

#[tokio::test]
async fn invoices_older_than_the_limit_are_refused() {
    let app = TestApp::new().await;
    app.state
        .services
        .administration
        .update_finance_settings(&finance_approver(), 5, 30)
        .await
        .unwrap();

    // The standard claim is invoiced on 2024-04-02.
    let refused = app
        .state
        .services
        .expenses
        .submit_expense(&submitter(), app.claim_request(dec!(100)))
        .await;
    assert_matches!(
        refused,
        Err(ServiceError::ValidationError(msg)) if msg.contains("2024-04-02")
    );
    assert_eq!(expense_record::Entity::find().count(app.db.as_ref()).await.unwrap(), 0);

    let mut recent = app.claim_request(dec!(100));
    let today = Utc::now().date_naive();
    recent.from_date = today;
    recent.to_date = today;
    recent.lines[0].line.invoice_date = Some(today);
    app.state
        .services
        .expenses
        .submit_expense(&submitter(), recent)
        .await
        .unwrap();
}

#[tokio::test]
async fn dashboard_reports_processing_days_and_sop_breaches() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(1800)).await;
    let desk = &app.state.services.finance;
    let reports = &app.state.services.reports;
    let clerk = finance(FINANCE_1);

    // Approved on Monday 2024-01-01.
    approval::Entity::update_many()
        .col_expr(
            approval::Column::ActionDate,
            Expr::value(Some(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())),
        )
        .filter(approval::Column::ExpenseRecordId.eq(record.id))
        .filter(approval::Column::Status.eq(ApprovalStatus::Approved))
        .exec(app.db.as_ref())
        .await
        .unwrap();

    let before = reports.dashboard(&finance_approver(), ReportFilters::default()).await.unwrap();
    assert_eq!(before.total_claims, 1);
    assert_eq!(before.approved_total, 1);
    assert_eq!(before.approved_this_month, 0);
    assert_eq!(before.paid_claims, 0);
    assert_eq!(before.average_processing_days, None);

    let entry = desk
        .create_entry(
            &clerk,
            record.id,
            FinanceEntryInput {
                vendor_name: "Acme Travels".to_string(),
                journal_entry: Some("JE-204".to_string()),
                payment_voucher: Some("PV-88".to_string()),
                amount: dec!(1800),
                reason: None,
                fcra_status: FcraStatus::NonFcra,
                comments: None,
                partial: None,
            },
        )
        .await
        .unwrap();
    desk.review_entry(&finance_approver(), entry.id, EntryDecision::Approve)
        .await
        .unwrap();
    let payment = || PaymentDetailsRequest {
        transaction_id: "UTR-1".to_string(),
        payment_date: date(2024, 1, 5),
        first_slot: None,
        second_slot: None,
    };
    desk.update_payment(&clerk, entry.id, payment()).await.unwrap();

    let paid = reports.dashboard(&finance_approver(), ReportFilters::default()).await.unwrap();
    assert_eq!(paid.paid_claims, 1);
    assert_eq!(paid.average_processing_days, Some(dec!(5.0)));
    assert_eq!(paid.max_processing_days, 5);
    assert_eq!(paid.sop_breaches, 0);
    assert_eq!(paid.approved_amount, dec!(1800));

    app.state
        .services
        .administration
        .update_finance_settings(&finance_approver(), 3, 365)
        .await
        .unwrap();
    let stricter = reports.dashboard(&finance_approver(), ReportFilters::default()).await.unwrap();
    assert_eq!(stricter.max_processing_days, 3);
    assert_eq!(stricter.sop_breaches, 1);
    let rerecorded = desk.update_payment(&clerk, entry.id, payment()).await.unwrap();
    assert_eq!(rerecorded.max_days, 3);
    assert!(rerecorded.sop_exceeded);

    let own = reports.dashboard(&submitter(), ReportFilters::default()).await.unwrap();
    assert_eq!(own.total_claims, 1);
    let stranger = reports
        .dashboard(&ctx(OTHER_EMPLOYEE, Role::Employee), ReportFilters::default())
        .await
        .unwrap();
    assert_eq!(stranger.total_claims, 0);

    let elsewhere = ReportFilters {
        city: Some("Mumbai".to_string()),
        ..ReportFilters::default()
    };
    let filtered = reports.dashboard(&finance_approver(), elsewhere).await.unwrap();
    assert_eq!(filtered.total_claims, 0);
}

#[tokio::test]
async fn pending_claims_are_counted_until_decided() {
    let app = TestApp::new().await;
    app.submit(dec!(250), &[APPROVER_A, APPROVER_B]).await;
    app.approved_expense(dec!(100)).await;

    let summary = app
        .state
        .services
        .reports
        .dashboard(&finance_approver(), ReportFilters::default())
        .await
        .unwrap();
    assert_eq!(summary.total_claims, 2);
    assert_eq!(summary.pending_claims, 1);
    assert_eq!(summary.approved_total, 1);
    assert_eq!(summary.approved_this_month, 1);
    assert_eq!(summary.total_amount, dec!(350));
}

#[tokio::test]
async fn trends_put_approved_spend_in_the_current_bucket() {
    let app = TestApp::new().await;
    app.approved_expense(dec!(640)).await;
    app.submit(dec!(90), &[APPROVER_A]).await;
    let reports = &app.state.services.reports;

    let monthly = reports
        .expense_trends(&finance_approver(), TrendGranularity::Monthly, None)
        .await
        .unwrap();
    assert_eq!(monthly.labels.len(), 12);
    assert_eq!(monthly.labels[11], Utc::now().format("%b %Y").to_string());
    assert_eq!(monthly.values[11], dec!(640));
    assert_eq!(monthly.values.iter().copied().sum::<rust_decimal::Decimal>(), dec!(640));

    let travel = reports
        .expense_trends(&finance_approver(), TrendGranularity::Yearly, Some("travel".to_string()))
        .await
        .unwrap();
    assert_eq!(travel.values[2], dec!(640));
    let meals = reports
        .expense_trends(&finance_approver(), TrendGranularity::Quarterly, Some("Meals".to_string()))
        .await
        .unwrap();
    assert!(meals.values.iter().all(|v| v.is_zero()));

    assert_matches!(
        reports
            .expense_trends(&submitter(), TrendGranularity::Monthly, None)
            .await,
        Err(ServiceError::Forbidden(_))
    );
}

#[tokio::test]
async fn admin_and_report_routes_check_roles() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/settings/finance",
            Some(&submitter()),
            Some(json!({ "max_days_processing": 7, "max_days_past": 60 })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PUT,
            "/api/v1/settings/finance",
            Some(&finance_approver()),
            Some(json!({ "max_days_processing": 7, "max_days_past": 60 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/expense-heads",
            Some(&finance_approver()),
            Some(json!({ "head_name": "Stationery" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/expense-heads/{}/toggle-status", id),
            Some(&finance_approver()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], json!(false));
    assert_eq!(body["data"]["kind"], json!("expense_head"));

    let (status, body) = app
        .request(
            Method::GET,
            "/api/v1/reports/dashboard?period=this_month",
            Some(&submitter()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_claims"], json!(0));

    let (status, _) = app
        .request(
            Method::GET,
            "/api/v1/reports/expense-trends?granularity=quarterly",
            Some(&submitter()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
