//! Workflow services: run commands, then the side effects that must not roll
//! back a committed transition (emails, drive uploads).

pub mod administration;
pub mod expense_workflow;
pub mod finance;
pub mod reports;

pub use expense_workflow::{
    ExpenseLineRequest, ExpenseWorkflowService, SplitInvoiceRequest, SubmitExpenseRequest,
    SupplementaryUpload,
};
pub use administration::AdministrationService;
pub use finance::{FinanceService, PaymentDetailsRequest};
pub use reports::ReportsService;

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

use crate::errors::ServiceError;

/// A file received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Upload {
    pub filename: String,
    pub content: Vec<u8>,
}

/// Keeps ASCII alphanumerics, dots, dashes and underscores; never empty.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Writes `upload` under `dir`, prefixing `index` so equal names do not clash.
pub(crate) async fn store_upload(
    dir: &Path,
    index: usize,
    upload: &Upload,
) -> Result<PathBuf, ServiceError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        error!(dir = %dir.display(), error = %e, "Cannot create upload directory");
        ServiceError::InternalError(format!("Cannot store uploaded file: {}", e))
    })?;
    let path = dir.join(format!("{:02}_{}", index, sanitize_filename(&upload.filename)));
    tokio::fs::write(&path, &upload.content).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "Cannot write uploaded file");
        ServiceError::InternalError(format!("Cannot store uploaded file: {}", e))
    })?;
    Ok(path)
}
