mod common;

use axum::http::{Method, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rust_decimal_macros::dec;
use serde_json::{json, Value};

use common::*;

fn submission_body(app: &TestApp, approvers: &[&str]) -> Value {
    json!({
        "employee_id": "EMP-001",
        "from_date": "2024-04-01",
        "to_date": "2024-04-03",
        "cost_center_id": app.operations.id,
        "lines": [{
            "invoice_date": "2024-04-02",
            "expense_head": "Travel",
            "description": "Cab to the airport",
            "gst": "0",
            "amount": "850.00",
            "receipt": {
                "filename": "cab.pdf",
                "content_base64": STANDARD.encode(b"%PDF-1.4 cab receipt"),
            }
        }],
        "approver_emails": approvers,
    })
}

#[tokio::test]
async fn health_reports_database_status() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_null());
}

#[tokio::test]
async fn api_requires_caller_identity() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/expenses", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn submit_over_http_then_decide_through_the_link() {
    let app = TestApp::new().await;
    let caller = submitter();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/expenses",
            Some(&caller),
            Some(submission_body(&app, &[APPROVER_A])),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    let record = &body["data"]["value"]["record"];
    assert_eq!(record["status"], "pending_approval");
    let epv_id = record["epv_id"].as_str().expect("epv id").to_string();

    let (status, listed) = app.request(Method::GET, "/api/v1/expenses", Some(&caller), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(1));

    let token = app.token_for(APPROVER_A, &epv_id);
    let link = format!("/approve-expense/{}?token={}", epv_id, token);

    let (status, body) = app.request(Method::GET, &link, None, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["value"]["record"]["status"], "approved");

    let (status, body) = app.request(Method::GET, &link, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn reject_link_shows_summary_then_records_reason() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(520), &[APPROVER_B]).await;
    let epv_id = submitted.record.epv_id;
    let token = app.token_for(APPROVER_B, &epv_id);
    let link = format!("/reject-expense/{}?token={}", epv_id, token);

    let (status, body) = app.request(Method::GET, &link, None, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["epv_id"], epv_id.as_str());
    assert_eq!(body["data"]["approval_status"], "pending");

    let (status, _) = app
        .request(Method::POST, &link, None, Some(json!({ "reason": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(Method::POST, &link, None, Some(json!({ "reason": "Not a project cost" })))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["value"]["record"]["status"], "rejected");

    let (status, body) = app.request(Method::GET, &link, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn unknown_token_is_not_found_over_http() {
    let app = TestApp::new().await;
    let submitted = app.submit(dec!(90), &[APPROVER_A]).await;
    let link = format!(
        "/approve-expense/{}?token=00000000-0000-0000-0000-000000000000",
        submitted.record.epv_id
    );
    let (status, _) = app.request(Method::GET, &link, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn finance_queue_over_http_respects_roles() {
    let app = TestApp::new().await;
    let record = app.approved_expense(dec!(1200)).await;

    let (status, _) = app
        .request(Method::GET, "/api/v1/finance/queue", Some(&submitter()), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let clerk = finance(FINANCE_1);
    let (status, body) = app
        .request(Method::GET, "/api/v1/finance/queue?view=pending", Some(&clerk), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["record"]["id"], record.id.to_string());

    let claim = format!("/api/v1/finance/expenses/{}/claim", record.id);
    let (status, _) = app.request(Method::POST, &claim, Some(&clerk), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .request(Method::POST, &claim, Some(&finance(FINANCE_2)), None)
        .await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["details"]["holder"], "Farah");
}

#[tokio::test]
async fn invalid_base64_is_a_bad_request() {
    let app = TestApp::new().await;
    let mut body = submission_body(&app, &[]);
    body["lines"][0]["receipt"]["content_base64"] = json!("***");

    let (status, body) = app
        .request(Method::POST, "/api/v1/expenses", Some(&submitter()), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().is_some_and(|m| m.contains("base64")));
}
