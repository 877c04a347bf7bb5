mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

use common::*;
use epv_workflow::{
    auth::Role,
    commands::expenses::{AllocationInput, ApprovalDecision},
    errors::ServiceError,
    models::{employee, ExpenseStatus, InvoiceType, SplitStatus},
    services::SplitInvoiceRequest,
};

fn approve() -> ApprovalDecision {
    ApprovalDecision::Approve { comments: None }
}

fn reject(reason: &str) -> ApprovalDecision {
    ApprovalDecision::Reject {
        reason: reason.to_string(),
    }
}

#[tokio::test]
async fn single_approver_approves_and_token_cannot_be_replayed() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(1250.50), &[APPROVER_A]).await;
    let epv_id = submitted.record.epv_id.clone();

    assert!(epv_id.starts_with("EPV-"));
    assert_eq!(submitted.record.status, ExpenseStatus::PendingApproval);
    assert_eq!(
        submitted.record.amount_in_words,
        "Rupees One Thousand Two Hundred and Fifty and Fifty Paise Only"
    );

    let mails = app.notifier.sent_to(APPROVER_A);
    assert_eq!(mails.len(), 1);
    assert_eq!(mails[0].subject, format!("Expense Approval Request: {}", epv_id));

    let token = app.token_for(APPROVER_A, &epv_id);
    let expenses = &app.state.services.expenses;
    let decided = expenses.decide(&epv_id, &token, approve()).await.unwrap();
    assert_eq!(decided.value.record.status, ExpenseStatus::Approved);
    assert!(decided.warnings.is_empty());

    let replay = expenses.decide(&epv_id, &token, reject("changed my mind")).await;
    assert_matches!(replay, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn concurrent_decisions_on_one_token_resolve_once() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(700), &[APPROVER_A]).await;
    let epv_id = submitted.record.epv_id.clone();
    let token = app.token_for(APPROVER_A, &epv_id);
    let expenses = &app.state.services.expenses;

    let (approved, rejected) = tokio::join!(
        expenses.decide(&epv_id, &token, approve()),
        expenses.decide(&epv_id, &token, reject("Duplicate claim")),
    );
    let winner = match (approved, rejected) {
        (Ok(won), Err(lost)) | (Err(lost), Ok(won)) => {
            assert_matches!(lost, ServiceError::Conflict(_));
            won
        }
        _ => panic!("exactly one decision should win"),
    };

    let detail = expenses.expense_detail(&submitter(), &epv_id).await.unwrap();
    assert_eq!(detail.record.status, winner.value.record.status);
    assert_eq!(detail.approvals.len(), 1);
    assert_eq!(detail.approvals[0].status, winner.value.approval.status);
}

#[tokio::test]
async fn approver_names_resolve_regardless_of_email_case() {
    let app = TestApp::new().await;
    employee::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set("Nisha.Rao@EPV.org".to_string()),
        employee_id: Set(None),
        name: Set("Nisha".to_string()),
        manager_email: Set(None),
        role: Set(Role::Employee),
        is_active: Set(true),
        created_at: Set(Utc::now()),
    }
    .insert(app.db.as_ref())
    .await
    .unwrap();

    let submitted = app.submit(dec!(420), &["nisha.rao@epv.org"]).await;
    let detail = app
        .state
        .services
        .expenses
        .expense_detail(&submitter(), &submitted.record.epv_id)
        .await
        .unwrap();
    assert_eq!(detail.approvals[0].approver_email, "nisha.rao@epv.org");
    assert_eq!(detail.approvals[0].approver_name.as_deref(), Some("Nisha"));
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(500), &[APPROVER_A]).await;

    let result = app
        .state
        .services
        .expenses
        .decide(&submitted.record.epv_id, "not-a-token", approve())
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

#[tokio::test]
async fn one_rejection_rejects_and_notifies_submitter() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(800), &[APPROVER_A, APPROVER_B]).await;
    let epv_id = submitted.record.epv_id.clone();
    let expenses = &app.state.services.expenses;

    let token_a = app.token_for(APPROVER_A, &epv_id);
    let partial = expenses.decide(&epv_id, &token_a, approve()).await.unwrap();
    assert_eq!(partial.value.record.status, ExpenseStatus::PartiallyApproved);

    let token_b = app.token_for(APPROVER_B, &epv_id);
    let rejected = expenses
        .decide(&epv_id, &token_b, reject("Receipt is illegible"))
        .await
        .unwrap();
    assert_eq!(rejected.value.record.status, ExpenseStatus::Rejected);
    assert_eq!(
        rejected.value.record.rejection_reason.as_deref(),
        Some("Receipt is illegible")
    );

    let notices = app.notifier.sent_to(SUBMITTER);
    assert_eq!(notices.len(), 1);
    assert_eq!(
        notices[0].subject,
        format!("Expense Rejection Notification: {}", epv_id)
    );
}

#[tokio::test]
async fn rejection_requires_a_reason() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(300), &[APPROVER_A]).await;
    let epv_id = submitted.record.epv_id;
    let token = app.token_for(APPROVER_A, &epv_id);

    let result = app
        .state
        .services
        .expenses
        .decide(&epv_id, &token, reject("   "))
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn routing_twice_to_the_same_approvers_conflicts() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(300), &[APPROVER_A]).await;

    let again = app
        .state
        .services
        .expenses
        .send_for_approval(&submitter(), submitted.record.id, vec![APPROVER_A.to_uppercase()])
        .await;
    assert_matches!(again, Err(ServiceError::Conflict(_)));

    let stranger = app
        .state
        .services
        .expenses
        .send_for_approval(
            &ctx(OTHER_EMPLOYEE, Role::Employee),
            submitted.record.id,
            vec![APPROVER_B.to_string()],
        )
        .await;
    assert_matches!(stranger, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn split_invoice_rolls_sub_decisions_up_to_master() {
    let app = TestApp::new().await;
    let request = SplitInvoiceRequest {
        employee_id: None,
        invoice_date: date(2024, 5, 10),
        total_amount: dec!(10000),
        description: Some("Venue booking".to_string()),
        payment_to: Some("Grand Hall".to_string()),
        invoice: pdf("venue.pdf"),
        allocations: vec![
            AllocationInput {
                cost_center_id: app.operations.id,
                amount: dec!(6000),
                description: None,
                expense_head: Some("Events".to_string()),
                approver_email: None,
            },
            AllocationInput {
                cost_center_id: app.programs.id,
                amount: dec!(4000),
                description: None,
                expense_head: Some("Events".to_string()),
                approver_email: None,
            },
        ],
    };

    let expenses = &app.state.services.expenses;
    let split = expenses
        .create_split_invoice(&submitter(), request)
        .await
        .unwrap()
        .value;
    assert_eq!(split.master.invoice_type, InvoiceType::Master);
    assert!(split.master.epv_id.contains("-MASTER-"));
    assert_eq!(split.master.split_status, Some(SplitStatus::PendingApproval));
    assert_eq!(split.parts.len(), 2);

    let totals = expenses.allocation_totals(split.master.id).await.unwrap();
    assert!(totals.is_consistent());
    assert_eq!(totals.allocated, dec!(10000));

    let ops = &split.parts[0].sub_invoice;
    let progs = &split.parts[1].sub_invoice;
    assert_eq!(ops.city.as_deref(), Some("Pune"));
    assert_eq!(
        app.notifier.sent_to(APPROVER_A)[0].subject,
        format!("Split Invoice Approval Required: {} - Operations", ops.epv_id)
    );

    let token = app.token_for(APPROVER_A, &ops.epv_id);
    let first = expenses.decide(&ops.epv_id, &token, approve()).await.unwrap();
    let master = first.value.master.expect("master refreshed");
    assert_eq!(master.status, ExpenseStatus::PartiallyApproved);
    assert_eq!(master.approved_amount, dec!(6000));
    assert_eq!(master.pending_amount, dec!(4000));

    let token = app.token_for(APPROVER_B, &progs.epv_id);
    let second = expenses
        .decide(&progs.epv_id, &token, reject("Not our event"))
        .await
        .unwrap();
    assert_eq!(second.value.record.status, ExpenseStatus::Rejected);
    let master = second.value.master.expect("master refreshed");
    assert_eq!(master.status, ExpenseStatus::Rejected);
    assert_eq!(master.split_status, Some(SplitStatus::Rejected));
    assert_eq!(master.rejected_amount, dec!(4000));

    let ops_detail = expenses
        .expense_detail(&submitter(), &ops.epv_id)
        .await
        .unwrap();
    assert_eq!(ops_detail.record.status, ExpenseStatus::Approved);
}

#[tokio::test]
async fn split_allocations_must_sum_to_total() {
    let app = TestApp::new().await;
    let request = SplitInvoiceRequest {
        employee_id: None,
        invoice_date: date(2024, 5, 10),
        total_amount: dec!(1000),
        description: None,
        payment_to: None,
        invoice: pdf("bill.pdf"),
        allocations: vec![AllocationInput {
            cost_center_id: app.operations.id,
            amount: dec!(999.99),
            description: None,
            expense_head: None,
            approver_email: None,
        }],
    };

    let result = app
        .state
        .services
        .expenses
        .create_split_invoice(&submitter(), request)
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}
