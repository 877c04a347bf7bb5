use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document input missing: {0}")]
    MissingInput(String),
    #[error("Nothing to merge")]
    EmptyMerge,
    #[error("Document I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Document rendering failed: {0}")]
    Rendering(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryLine {
    pub invoice_date: NaiveDate,
    pub expense_head: String,
    pub description: Option<String>,
    pub gst: Decimal,
    pub amount: Decimal,
}

/// Data printed on the cover sheet of a claim.
#[derive(Debug, Clone, Serialize)]
pub struct ClaimSummary {
    pub epv_id: String,
    pub employee_name: String,
    pub employee_email: String,
    pub employee_id: Option<String>,
    pub cost_center_name: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub payment_to: Option<String>,
    pub academic_year: String,
    pub total_amount: Decimal,
    pub amount_in_words: String,
    pub lines: Vec<SummaryLine>,
}

/// Produces the claim cover sheet and bundles it with receipts.
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn generate_summary(&self, summary: &ClaimSummary) -> Result<PathBuf, DocumentError>;

    /// Concatenates `inputs` in order into a new artifact named `output_name`.
    async fn merge(&self, inputs: &[PathBuf], output_name: &str) -> Result<PathBuf, DocumentError>;
}

/// Plain-text cover sheets and byte-concatenated bundles in a work directory.
pub struct LocalDocumentService {
    work_dir: PathBuf,
}

impl LocalDocumentService {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn render(summary: &ClaimSummary) -> String {
        let mut out = String::new();
        out.push_str(&format!("EXPENSE PAYMENT VOUCHER {}\n", summary.epv_id));
        out.push_str(&format!(
            "Employee: {} <{}>{}\n",
            summary.employee_name,
            summary.employee_email,
            summary
                .employee_id
                .as_deref()
                .map(|id| format!(" ({})", id))
                .unwrap_or_default()
        ));
        out.push_str(&format!(
            "Cost center: {}\nPeriod: {} to {}\nAcademic year: {}\n",
            summary.cost_center_name.as_deref().unwrap_or("-"),
            summary.from_date,
            summary.to_date,
            summary.academic_year
        ));
        if let Some(payee) = &summary.payment_to {
            out.push_str(&format!("Payment to: {}\n", payee));
        }
        out.push('\n');
        for (idx, line) in summary.lines.iter().enumerate() {
            out.push_str(&format!(
                "{:>3}. {} | {} | {} | GST {} | {}\n",
                idx + 1,
                line.invoice_date,
                line.expense_head,
                line.description.as_deref().unwrap_or(""),
                line.gst,
                line.amount
            ));
        }
        out.push_str(&format!(
            "\nTotal: {}\n{}\n",
            summary.total_amount, summary.amount_in_words
        ));
        out
    }
}

#[async_trait]
impl DocumentService for LocalDocumentService {
    async fn generate_summary(&self, summary: &ClaimSummary) -> Result<PathBuf, DocumentError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(format!("{}_summary.txt", summary.epv_id));
        tokio::fs::write(&path, Self::render(summary)).await?;
        Ok(path)
    }

    async fn merge(&self, inputs: &[PathBuf], output_name: &str) -> Result<PathBuf, DocumentError> {
        if inputs.is_empty() {
            return Err(DocumentError::EmptyMerge);
        }
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let output = self.work_dir.join(output_name);
        let mut bundle = Vec::new();
        for input in inputs {
            bundle.extend(read_input(input).await?);
        }
        let mut file = tokio::fs::File::create(&output).await?;
        file.write_all(&bundle).await?;
        file.flush().await?;
        Ok(output)
    }
}

async fn read_input(path: &Path) -> Result<Vec<u8>, DocumentError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(DocumentError::MissingInput(path.display().to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn summary() -> ClaimSummary {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        ClaimSummary {
            epv_id: "EPV-20240102-GEN-ABCDEF0123".into(),
            employee_name: "Asha".into(),
            employee_email: "asha@x.org".into(),
            employee_id: Some("E1".into()),
            cost_center_name: Some("Pune".into()),
            from_date: day,
            to_date: day,
            payment_to: None,
            academic_year: "2024-2025".into(),
            total_amount: dec!(100),
            amount_in_words: "Rupees One Hundred Only".into(),
            lines: vec![SummaryLine {
                invoice_date: day,
                expense_head: "Travel".into(),
                description: None,
                gst: dec!(0),
                amount: dec!(100),
            }],
        }
    }

    #[tokio::test]
    async fn summary_then_merge_produces_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalDocumentService::new(dir.path());
        let cover = service.generate_summary(&summary()).await.unwrap();
        let receipt = dir.path().join("receipt.pdf");
        tokio::fs::write(&receipt, b"RECEIPT").await.unwrap();

        let merged = service.merge(&[cover, receipt], "bundle.pdf").await.unwrap();
        let bytes = tokio::fs::read(merged).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("EXPENSE PAYMENT VOUCHER EPV-20240102-GEN-ABCDEF0123"));
        assert!(text.ends_with("RECEIPT"));
    }

    #[tokio::test]
    async fn merge_reports_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let service = LocalDocumentService::new(dir.path());
        let result = service.merge(&[dir.path().join("nope.pdf")], "out.pdf").await;
        assert_matches!(result, Err(DocumentError::MissingInput(_)));
        assert_matches!(service.merge(&[], "out.pdf").await, Err(DocumentError::EmptyMerge));
    }
}
