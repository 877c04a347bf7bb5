mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use common::*;
use epv_workflow::{
    auth::Role,
    errors::ServiceError,
    models::{approval, ApprovalStatus, DocumentStatus, ExpenseStatus, FinanceStatus},
    queries::QueueView,
    services::SupplementaryUpload,
};

fn supplement(name: &str) -> SupplementaryUpload {
    SupplementaryUpload {
        file: pdf(name),
        description: Some("Hotel bill".to_string()),
    }
}

#[tokio::test]
async fn requesting_documents_takes_the_claim_out_of_the_queue() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(2200)).await;
    let finance_ctx = finance(FINANCE_1);

    let pending = app.state.services.finance.queue(&finance_ctx, QueueView::Pending).await.unwrap();
    assert_eq!(pending.len(), 1);

    let outcome = app
        .state
        .services
        .expenses
        .request_documents(&finance_ctx, record.id, "Original hotel invoice".to_string())
        .await
        .unwrap();
    let updated = outcome.value;
    assert_eq!(updated.status, ExpenseStatus::Rejected);
    assert_eq!(updated.finance_status, Some(FinanceStatus::PendingDocuments));
    assert_eq!(updated.document_status, DocumentStatus::PendingAdditionalDocuments);
    assert_eq!(updated.requested_documents.as_deref(), Some("Original hotel invoice"));

    let mails = app.notifier.sent_to(SUBMITTER);
    assert!(mails
        .iter()
        .any(|m| m.subject == format!("Additional Documents Requested: {}", record.epv_id)));

    let pending = app.state.services.finance.queue(&finance_ctx, QueueView::Pending).await.unwrap();
    assert!(pending.is_empty());
    let rejected = app.state.services.finance.queue(&finance_ctx, QueueView::Rejected).await.unwrap();
    assert_eq!(rejected.len(), 1);
}

#[tokio::test]
async fn employees_cannot_request_documents() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(100)).await;

    let result = app
        .state
        .services
        .expenses
        .request_documents(&submitter(), record.id, "anything".to_string())
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn documents_cannot_be_requested_before_approval() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(100), &[APPROVER_A]).await;

    let result = app
        .state
        .services
        .expenses
        .request_documents(&finance(FINANCE_1), submitted.record.id, "receipt".to_string())
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}

#[tokio::test]
async fn only_the_submitter_or_finance_may_upload() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(750)).await;
    app.state
        .services
        .expenses
        .request_documents(&finance(FINANCE_1), record.id, "Boarding pass".to_string())
        .await
        .unwrap();

    let stranger = ctx(OTHER_EMPLOYEE, Role::Employee);
    let result = app
        .state
        .services
        .expenses
        .upload_supplementary(&stranger, record.id, vec![supplement("pass.pdf")])
        .await;
    assert_matches!(result, Err(ServiceError::Forbidden(_)));

    let empty = app
        .state
        .services
        .expenses
        .upload_supplementary(&submitter(), record.id, Vec::new())
        .await;
    assert_matches!(empty, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn upload_returns_the_claim_to_finance_as_resubmitted() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(3100)).await;
    let finance_ctx = finance(FINANCE_1);
    app.state
        .services
        .expenses
        .request_documents(&finance_ctx, record.id, "Hotel bill".to_string())
        .await
        .unwrap();

    let outcome = app
        .state
        .services
        .expenses
        .upload_supplementary(
            &submitter(),
            record.id,
            vec![supplement("hotel.pdf"), supplement("hotel-2.pdf")],
        )
        .await
        .unwrap();
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

    let updated = &outcome.value.record;
    assert_eq!(updated.status, ExpenseStatus::Approved);
    assert_eq!(updated.finance_status, Some(FinanceStatus::Pending));
    assert_eq!(updated.document_status, DocumentStatus::DocumentsUploaded);
    assert_ne!(updated.drive_file_id, record.drive_file_id);
    assert_eq!(outcome.value.documents.len(), 2);
    assert!(outcome
        .value
        .documents
        .iter()
        .all(|d| d.uploaded_by == SUBMITTER && d.drive_file_id.is_some()));

    let resubmitted = approval::Entity::find()
        .filter(approval::Column::ExpenseRecordId.eq(record.id))
        .filter(approval::Column::Status.eq(ApprovalStatus::Resubmitted))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(resubmitted.len(), 1);
    assert_eq!(resubmitted[0].approver_email, app.config.system_approver_email);

    let finance_queue = &app.state.services.finance;
    assert!(finance_queue.queue(&finance_ctx, QueueView::Pending).await.unwrap().is_empty());
    let again = finance_queue.queue(&finance_ctx, QueueView::Resubmitted).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].record.id, record.id);

    for member in [FINANCE_1, FINANCE_2, FINANCE_APPROVER] {
        assert!(app
            .notifier
            .sent_to(member)
            .iter()
            .any(|m| m.subject == format!("Supplementary Documents Uploaded: {}", record.epv_id)));
    }
}

#[tokio::test]
async fn upload_without_a_request_conflicts() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(100)).await;

    let result = app
        .state
        .services
        .expenses
        .upload_supplementary(&submitter(), record.id, vec![supplement("late.pdf")])
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));
}
