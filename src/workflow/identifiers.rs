//! Human-readable identifiers stamped on new records.

use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

/// Code used in the EPV id of master invoices.
pub const MASTER_CODE: &str = "MASTER";

/// Cost center name reduced to ASCII alphanumerics and underscores.
pub fn cost_center_code(cost_center_name: Option<&str>) -> String {
    let code: String = cost_center_name
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if code.is_empty() {
        "GEN".to_string()
    } else {
        code
    }
}

/// `EPV-YYYYMMDD-<CODE>-<10 uppercase hex>`.
pub fn generate_epv_id(code: &str, now: DateTime<Utc>) -> String {
    let simple = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("EPV-{}-{}-{}", now.format("%Y%m%d"), code, &simple[..10])
}

pub fn academic_year(now: DateTime<Utc>) -> String {
    format!("{}-{}", now.year(), now.year() + 1)
}
