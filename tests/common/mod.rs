#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use epv_workflow::{
    auth::{RequestContext, Role, USER_EMAIL_HEADER, USER_NAME_HEADER, USER_ROLE_HEADER},
    collaborators::{
        Collaborators, DocumentService, InMemoryNotifier, LocalDocumentService, LocalDriveStorage,
    },
    commands::expenses::{ExpenseLine, SubmittedExpense},
    config::AppConfig,
    db::{self, DbPool},
    events::{process_events, EventSender},
    handlers::AppServices,
    logging::discard_logger,
    models::{cost_center, employee},
    services::{ExpenseLineRequest, SubmitExpenseRequest, Upload},
    AppState,
};

pub const SUBMITTER: &str = "asha@epv.org";
pub const OTHER_EMPLOYEE: &str = "kiran@epv.org";
pub const APPROVER_A: &str = "ravi@epv.org";
pub const APPROVER_B: &str = "meera@epv.org";
pub const FINANCE_1: &str = "fin1@epv.org";
pub const FINANCE_2: &str = "fin2@epv.org";
pub const FINANCE_APPROVER: &str = "fa@epv.org";

pub fn ctx(email: &str, role: Role) -> RequestContext {
    let name = email.split('@').next().unwrap_or(email).to_string();
    RequestContext::new(email, name, role)
}

pub fn submitter() -> RequestContext {
    ctx(SUBMITTER, Role::Employee)
}

pub fn finance(email: &str) -> RequestContext {
    ctx(email, Role::Finance)
}

pub fn finance_approver() -> RequestContext {
    ctx(FINANCE_APPROVER, Role::FinanceApprover)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn pdf(name: &str) -> Upload {
    Upload {
        filename: name.to_string(),
        content: format!("%PDF-1.4 {}", name).into_bytes(),
    }
}

/// Application wired to a temporary SQLite file, local document and drive
/// backends and an in-memory mailbox.
pub struct TestApp {
    pub state: AppState,
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub notifier: Arc<InMemoryNotifier>,
    pub drive: Arc<LocalDriveStorage>,
    pub operations: cost_center::Model,
    pub programs: cost_center::Model,
    pub employees: Vec<employee::Model>,
    router: Router,
    _event_task: tokio::task::JoinHandle<()>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let documents = |dir: &TempDir| -> Arc<dyn DocumentService> {
            Arc::new(LocalDocumentService::new(dir.path().join("generated")))
        };
        Self::with_documents(documents).await
    }

    /// Same harness with a caller-supplied document service.
    pub async fn with_documents<F>(documents: F) -> Self
    where
        F: FnOnce(&TempDir) -> Arc<dyn DocumentService>,
    {
        let dir = tempfile::tempdir().expect("temp dir");
        let db_path = dir.path().join("epv_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 4;
        cfg.db_min_connections = 1;
        cfg.upload_dir = dir.path().join("uploads").display().to_string();
        cfg.public_base_url = Some("http://epv.test".to_string());

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");
        let db = Arc::new(pool);
        let config = Arc::new(cfg);

        let (tx, rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(tx));
        let event_task = tokio::spawn(process_events(rx));

        let notifier = Arc::new(InMemoryNotifier::new());
        let drive = Arc::new(LocalDriveStorage::new(
            dir.path().join("drive"),
            "http://drive.test",
        ));
        let collaborators = Collaborators::new(notifier.clone(), documents(&dir), drive.clone());

        let services = AppServices::new(
            db.clone(),
            event_sender.clone(),
            collaborators,
            config.clone(),
            discard_logger(),
        );
        let state = AppState {
            db: db.clone(),
            config: config.clone(),
            event_sender,
            services,
        };
        let router = epv_workflow::app_router(state.clone(), discard_logger());

        let employees = seed_employees(&db).await;
        let operations = seed_cost_center(&db, "Operations", "Pune", APPROVER_A).await;
        let programs = seed_cost_center(&db, "Programs", "Mumbai", APPROVER_B).await;

        Self {
            state,
            db,
            config,
            notifier,
            drive,
            operations,
            programs,
            employees,
            router,
            _event_task: event_task,
            _dir: dir,
        }
    }

    pub fn employee(&self, email: &str) -> &employee::Model {
        self.employees
            .iter()
            .find(|e| e.email == email)
            .expect("seeded employee")
    }

    /// One-line claim against the Operations cost center.
    pub fn claim_request(&self, amount: Decimal) -> SubmitExpenseRequest {
        SubmitExpenseRequest {
            employee_id: Some("EMP-001".to_string()),
            from_date: date(2024, 4, 1),
            to_date: date(2024, 4, 3),
            cost_center_id: self.operations.id,
            payment_to: None,
            city: None,
            lines: vec![ExpenseLineRequest {
                line: ExpenseLine {
                    invoice_date: Some(date(2024, 4, 2)),
                    expense_head: Some("Travel".to_string()),
                    description: Some("Train to Nashik".to_string()),
                    gst: Decimal::ZERO,
                    amount: Some(amount),
                    split_invoice: false,
                    receipt_filename: None,
                    receipt_path: None,
                },
                receipt: Some(pdf("ticket.pdf")),
            }],
            approver_emails: Vec::new(),
        }
    }

    pub async fn submit(&self, amount: Decimal, approvers: &[&str]) -> SubmittedExpense {
        let mut request = self.claim_request(amount);
        request.approver_emails = approvers.iter().map(|a| a.to_string()).collect();
        self.state
            .services
            .expenses
            .submit_expense(&submitter(), request)
            .await
            .expect("submission succeeds")
            .value
    }

    /// Decision token mailed to `approver` for `epv_id`.
    pub fn token_for(&self, approver: &str, epv_id: &str) -> String {
        let mail = self
            .notifier
            .sent_to(approver)
            .into_iter()
            .rev()
            .find(|m| m.subject.contains(epv_id))
            .expect("approval email");
        let marker = format!("/approve-expense/{}?token=", epv_id);
        let start = mail.html_body.find(&marker).expect("approve link") + marker.len();
        mail.html_body[start..]
            .chars()
            .take_while(|c| c.is_ascii_hexdigit() || *c == '-')
            .collect()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&RequestContext>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header(USER_EMAIL_HEADER, caller.email.as_str())
                .header(USER_NAME_HEADER, caller.name.as_str())
                .header(USER_ROLE_HEADER, caller.role.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request");

        let response = self.router.clone().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

async fn seed_employees(db: &DbPool) -> Vec<employee::Model> {
    let people = [
        (SUBMITTER, "Asha", Role::Employee),
        (OTHER_EMPLOYEE, "Kiran", Role::Employee),
        (APPROVER_A, "Ravi", Role::Employee),
        (APPROVER_B, "Meera", Role::Employee),
        (FINANCE_1, "Farah", Role::Finance),
        (FINANCE_2, "Gopal", Role::Finance),
        (FINANCE_APPROVER, "Lata", Role::FinanceApprover),
    ];
    let mut out = Vec::new();
    for (email, name, role) in people {
        let model = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            employee_id: Set(None),
            name: Set(name.to_string()),
            manager_email: Set(None),
            role: Set(role),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .expect("seed employee");
        out.push(model);
    }
    out
}

async fn seed_cost_center(db: &DbPool, name: &str, city: &str, approver: &str) -> cost_center::Model {
    cost_center::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        approver_email: Set(Some(approver.to_string())),
        city: Set(Some(city.to_string())),
        drive_folder_id: Set(Some(format!("folder-{}", name.to_lowercase()))),
        is_active: Set(true),
    }
    .insert(db)
    .await
    .expect("seed cost center")
}

impl TestApp {
    /// A claim approved by its single approver and waiting for finance.
    pub async fn approved_expense(&self, amount: Decimal) -> epv_workflow::models::expense_record::Model {
        let submitted = self.submit(amount, &[APPROVER_A]).await;
        let epv_id = submitted.record.epv_id;
        let token = self.token_for(APPROVER_A, &epv_id);
        self.state
            .services
            .expenses
            .decide(
                &epv_id,
                &token,
                epv_workflow::commands::expenses::ApprovalDecision::Approve { comments: None },
            )
            .await
            .expect("approval succeeds")
            .value
            .record
    }
}
