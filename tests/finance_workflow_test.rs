mod common;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};

use common::*;
use epv_workflow::{
    commands::finance::{EntryDecision, FinanceEntryInput, FinanceRejectionKind},
    errors::ServiceError,
    models::{
        approval, expense_record, ApprovalStatus, DocumentStatus, ExpenseStatus, FcraStatus,
        FinanceEntryStatus, FinanceStatus,
    },
    queries::QueueView,
    services::PaymentDetailsRequest,
    workflow::LockView,
};

fn entry_input(amount: Decimal) -> FinanceEntryInput {
    FinanceEntryInput {
        vendor_name: "Acme Travels".to_string(),
        journal_entry: Some("JE-204".to_string()),
        payment_voucher: Some("PV-88".to_string()),
        amount,
        reason: None,
        fcra_status: FcraStatus::NonFcra,
        comments: None,
        partial: None,
    }
}

#[tokio::test]
async fn only_one_of_two_concurrent_claims_wins() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(900)).await;
    let desk = &app.state.services.finance;
    let (one, two) = (finance(FINANCE_1), finance(FINANCE_2));

    let (first, second) = tokio::join!(desk.claim(&one, record.id), desk.claim(&two, record.id));
    let results = [first, second];
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(ServiceError::Locked { remaining_minutes, .. }) if *remaining_minutes >= 29)));

    let holder = results
        .iter()
        .find_map(|r| r.as_ref().ok())
        .and_then(|r| r.being_processed_by.clone())
        .expect("winner holds the lock");
    assert!(holder == FINANCE_1 || holder == FINANCE_2);

    let queue = desk.queue(&one, QueueView::Pending).await.unwrap();
    let expected = if holder == FINANCE_1 {
        matches!(queue[0].lock, LockView::HeldBySelf { .. })
    } else {
        matches!(queue[0].lock, LockView::HeldByOther { ref holder, .. } if holder == FINANCE_2)
    };
    assert!(expected, "unexpected lock view {:?}", queue[0].lock);
}

#[tokio::test]
async fn expired_claims_can_be_taken_over() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(900)).await;
    let desk = &app.state.services.finance;

    desk.claim(&finance(FINANCE_1), record.id).await.unwrap();
    assert_matches!(
        desk.claim(&finance(FINANCE_2), record.id).await,
        Err(ServiceError::Locked { holder, .. }) if holder == "Farah"
    );

    expense_record::Entity::update_many()
        .col_expr(
            expense_record::Column::ProcessingStartedAt,
            Expr::value(Utc::now() - Duration::minutes(31)),
        )
        .filter(expense_record::Column::Id.eq(record.id))
        .exec(app.db.as_ref())
        .await
        .unwrap();

    let stolen = desk.claim(&finance(FINANCE_2), record.id).await.unwrap();
    assert_eq!(stolen.being_processed_by.as_deref(), Some(FINANCE_2));

    assert!(!desk.release(&finance(FINANCE_1), record.id).await.unwrap());
    assert!(desk.release(&finance(FINANCE_2), record.id).await.unwrap());
}

#[tokio::test]
async fn entry_review_and_payment_track_processing_days() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(1800)).await;
    let desk = &app.state.services.finance;
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

    let entry = desk.create_entry(&clerk, record.id, entry_input(dec!(1800))).await.unwrap();
    assert_eq!(entry.status, FinanceEntryStatus::Pending);
    assert_eq!(entry.finance_user_email, FINANCE_1);

    let duplicate = desk.create_entry(&clerk, record.id, entry_input(dec!(1800))).await;
    assert_matches!(duplicate, Err(ServiceError::Conflict(_)));

    let pending = desk.pending_entries(&finance_approver()).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_matches!(
        desk.pending_entries(&clerk).await,
        Err(ServiceError::Forbidden(_))
    );

    let reviewed = desk
        .review_entry(&finance_approver(), entry.id, EntryDecision::Approve)
        .await
        .unwrap();
    assert_eq!(reviewed.value.entry.status, FinanceEntryStatus::Approved);
    assert_eq!(reviewed.value.entry.approver_email.as_deref(), Some(FINANCE_APPROVER));
    assert_eq!(reviewed.value.record.finance_status, Some(FinanceStatus::Processed));

    let awaiting = desk.queue(&clerk, QueueView::AwaitingPayment).await.unwrap();
    assert_eq!(awaiting.len(), 1);

    let on_time = desk
        .update_payment(
            &clerk,
            entry.id,
            PaymentDetailsRequest {
                transaction_id: "UTR-1".to_string(),
                payment_date: date(2024, 1, 5),
                first_slot: None,
                second_slot: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(on_time.processing_days, 5);
    assert_eq!(on_time.max_days, 5);
    assert!(!on_time.sop_exceeded);

    let late = desk
        .update_payment(
            &clerk,
            entry.id,
            PaymentDetailsRequest {
                transaction_id: "UTR-1".to_string(),
                payment_date: date(2024, 1, 10),
                first_slot: None,
                second_slot: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(late.processing_days, 8);
    assert!(late.sop_exceeded);

    let someone_else = desk
        .update_payment(
            &finance(FINANCE_2),
            entry.id,
            PaymentDetailsRequest {
                transaction_id: "UTR-2".to_string(),
                payment_date: date(2024, 1, 10),
                first_slot: None,
                second_slot: None,
            },
        )
        .await;
    assert_matches!(someone_else, Err(ServiceError::Forbidden(_)));

    assert!(desk.queue(&clerk, QueueView::AwaitingPayment).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejected_entry_returns_record_to_the_queue() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(450)).await;
    let desk = &app.state.services.finance;
    let clerk = finance(FINANCE_1);

    let entry = desk.create_entry(&clerk, record.id, entry_input(dec!(450))).await.unwrap();
    assert!(desk.queue(&clerk, QueueView::Pending).await.unwrap().is_empty());

    let blank = desk
        .review_entry(
            &finance_approver(),
            entry.id,
            EntryDecision::Reject { reason: " ".to_string() },
        )
        .await;
    assert_matches!(blank, Err(ServiceError::ValidationError(_)));

    let reviewed = desk
        .review_entry(
            &finance_approver(),
            entry.id,
            EntryDecision::Reject {
                reason: "Wrong voucher number".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(reviewed.value.entry.status, FinanceEntryStatus::Rejected);
    assert_eq!(reviewed.value.record.finance_status, Some(FinanceStatus::Pending));

    let mails = app.notifier.sent_to(FINANCE_1);
    assert!(mails
        .iter()
        .any(|m| m.subject == format!("Finance Entry Rejected: {}", record.epv_id)));

    assert_eq!(desk.queue(&clerk, QueueView::Pending).await.unwrap().len(), 1);
    let again = desk.create_entry(&clerk, record.id, entry_input(dec!(450))).await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn finance_rejection_records_formatted_reason() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(700)).await;
    let desk = &app.state.services.finance;

    let outcome = desk
        .reject_expense(
            &finance(FINANCE_1),
            record.id,
            "Duplicate of an earlier claim".to_string(),
            FinanceRejectionKind::RestartProcess,
        )
        .await
        .unwrap();
    let rejected = outcome.value;
    assert_eq!(rejected.status, ExpenseStatus::Rejected);
    assert_eq!(rejected.finance_status, Some(FinanceStatus::Rejected));
    let reason = rejected.rejection_reason.expect("reason stored");
    assert!(reason.starts_with("[FINANCE REJECTION] Duplicate of an earlier claim"));
    assert!(reason.contains("Rejected by: fin1"));
    assert!(reason.ends_with("Action Required: Create a new EPV"));

    let notices = app.notifier.sent_to(SUBMITTER);
    assert!(notices
        .iter()
        .any(|m| m.subject == format!("Expense Rejection Notification: {}", record.epv_id)
            && m.html_body.contains("(Finance Team)")));
}

#[tokio::test]
async fn upload_missing_rejection_opens_the_document_cycle() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(700)).await;

    let rejected = app
        .state
        .services
        .finance
        .reject_expense(
            &finance(FINANCE_2),
            record.id,
            "Attach the boarding pass".to_string(),
            FinanceRejectionKind::UploadMissing,
        )
        .await
        .unwrap()
        .value;
    assert_eq!(rejected.finance_status, Some(FinanceStatus::PendingDocuments));
    assert_eq!(rejected.document_status, DocumentStatus::PendingAdditionalDocuments);
    assert!(rejected
        .rejection_reason
        .as_deref()
        .is_some_and(|r| r.ends_with("Action Required: Upload missing documents")));
}

#[tokio::test]
async fn city_assignments_restrict_finance_users() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(300)).await;
    let desk = &app.state.services.finance;
    let clerk = finance(FINANCE_1);
    let clerk_id = app.employee(FINANCE_1).id;

    assert_matches!(
        desk.assign_city(&clerk, clerk_id, "Mumbai".to_string()).await,
        Err(ServiceError::Forbidden(_))
    );
    let assignment = desk
        .assign_city(&finance_approver(), clerk_id, "Mumbai".to_string())
        .await
        .unwrap();
    assert!(assignment.is_active);
    assert_matches!(
        desk.assign_city(&finance_approver(), clerk_id, "mumbai".to_string()).await,
        Err(ServiceError::Conflict(_))
    );

    // The claim is from Pune.
    assert!(desk.queue(&clerk, QueueView::Pending).await.unwrap().is_empty());
    assert_matches!(
        desk.claim(&clerk, record.id).await,
        Err(ServiceError::Forbidden(_))
    );
    assert_eq!(
        desk.queue(&finance(FINANCE_2), QueueView::Pending).await.unwrap().len(),
        1
    );

    let listed = desk.city_assignments(&finance_approver()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].employee_email.as_deref(), Some(FINANCE_1));

    let toggled = desk.toggle_city(&finance_approver(), assignment.id).await.unwrap();
    assert!(!toggled.is_active);
    assert!(desk.claim(&clerk, record.id).await.is_ok());
}

#[tokio::test]
async fn employees_cannot_use_the_finance_queue() {
    let app = TestApp::new().await;
    let result = app.state.services.finance.queue(&submitter(), QueueView::Pending).await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}
