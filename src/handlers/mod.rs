pub mod admin;
pub mod approvals;
pub mod expenses;
pub mod finance;
pub mod reports;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use slog::Logger;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    collaborators::Collaborators,
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    services::{
        AdministrationService, ExpenseWorkflowService, FinanceService, ReportsService, Upload,
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub expenses: Arc<ExpenseWorkflowService>,
    pub finance: Arc<FinanceService>,
    pub administration: Arc<AdministrationService>,
    pub reports: Arc<ReportsService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        collaborators: Collaborators,
        config: Arc<AppConfig>,
        logger: Logger,
    ) -> Self {
        let expenses_logger = logger.new(slog::o!("component" => "expense_workflow"));
        let finance_logger = logger.new(slog::o!("component" => "finance"));
        let admin_logger = logger.new(slog::o!("component" => "administration"));

        Self {
            expenses: Arc::new(ExpenseWorkflowService::new(
                db_pool.clone(),
                event_sender.clone(),
                collaborators.clone(),
                config.clone(),
                expenses_logger,
            )),
            finance: Arc::new(FinanceService::new(
                db_pool.clone(),
                event_sender.clone(),
                collaborators,
                config.clone(),
                finance_logger,
            )),
            administration: Arc::new(AdministrationService::new(
                db_pool.clone(),
                event_sender,
                admin_logger,
            )),
            reports: Arc::new(ReportsService::new(db_pool, config)),
        }
    }
}

/// File sent inline as base64.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UploadPayload {
    pub filename: String,
    /// Base64 (standard alphabet) file content
    pub content_base64: String,
}

impl TryFrom<UploadPayload> for Upload {
    type Error = ServiceError;

    fn try_from(payload: UploadPayload) -> Result<Self, Self::Error> {
        let content = STANDARD.decode(payload.content_base64.trim()).map_err(|e| {
            ServiceError::ValidationError(format!("{}: invalid base64 content: {}", payload.filename, e))
        })?;
        if content.is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "{}: file is empty",
                payload.filename
            )));
        }
        Ok(Upload {
            filename: payload.filename,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decodes_base64_uploads() {
        let upload = Upload::try_from(UploadPayload {
            filename: "bill.pdf".into(),
            content_base64: STANDARD.encode(b"%PDF-1.4"),
        })
        .unwrap();
        assert_eq!(upload.content, b"%PDF-1.4");
    }

    #[test]
    fn rejects_bad_or_empty_content() {
        assert_matches!(
            Upload::try_from(UploadPayload {
                filename: "x.pdf".into(),
                content_base64: "***".into(),
            }),
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            Upload::try_from(UploadPayload {
                filename: "x.pdf".into(),
                content_base64: String::new(),
            }),
            Err(ServiceError::ValidationError(_))
        );
    }
}
