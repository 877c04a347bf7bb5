//! Subjects and HTML bodies of workflow emails.

use rust_decimal::Decimal;

use crate::models::{allocation, expense_record, finance_entry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html_body: String,
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn record_table(record: &expense_record::Model, amount: Decimal) -> String {
    format!(
        "<table>\
         <tr><td>EPV</td><td>{}</td></tr>\
         <tr><td>Submitted by</td><td>{} ({})</td></tr>\
         <tr><td>Cost center</td><td>{}</td></tr>\
         <tr><td>Period</td><td>{} to {}</td></tr>\
         <tr><td>Amount</td><td>{}</td></tr>\
         </table>",
        escape(&record.epv_id),
        escape(&record.employee_name),
        escape(&record.email_id),
        escape(record.cost_center_name.as_deref().unwrap_or("-")),
        record.from_date,
        record.to_date,
        amount,
    )
}

fn document_link(record: &expense_record::Model) -> String {
    match &record.file_url {
        Some(url) => format!("<p><a href=\"{}\">View supporting document</a></p>", escape(url)),
        None => String::new(),
    }
}

pub fn approval_request(
    record: &expense_record::Model,
    approver_name: &str,
    approve_url: &str,
    reject_url: &str,
) -> EmailContent {
    EmailContent {
        subject: format!("Expense Approval Request: {}", record.epv_id),
        html_body: format!(
            "<p>Dear {},</p><p>An expense claim needs your approval.</p>{}{}\
             <p><a href=\"{}\">Approve</a> | <a href=\"{}\">Reject</a></p>",
            escape(approver_name),
            record_table(record, record.total_amount),
            document_link(record),
            escape(approve_url),
            escape(reject_url),
        ),
    }
}

pub fn split_approval_request(
    sub_invoice: &expense_record::Model,
    allocation: &allocation::Model,
    approve_url: &str,
    reject_url: &str,
) -> EmailContent {
    EmailContent {
        subject: format!(
            "Split Invoice Approval Required: {} - {}",
            sub_invoice.epv_id, allocation.cost_center_name
        ),
        html_body: format!(
            "<p>Dear {},</p><p>A share of a split invoice was allocated to {}.</p>{}{}\
             <p><a href=\"{}\">Approve</a> | <a href=\"{}\">Reject</a></p>",
            escape(allocation.approver_name.as_deref().unwrap_or(&allocation.approver_email)),
            escape(&allocation.cost_center_name),
            record_table(sub_invoice, allocation.allocated_amount),
            document_link(sub_invoice),
            escape(approve_url),
            escape(reject_url),
        ),
    }
}

pub fn rejection_notice(record: &expense_record::Model, rejected_by: &str, reason: &str) -> EmailContent {
    EmailContent {
        subject: format!("Expense Rejection Notification: {}", record.epv_id),
        html_body: format!(
            "<p>Dear {},</p><p>Your expense claim was rejected by {}.</p>{}\
             <p><strong>Reason:</strong> {}</p>",
            escape(&record.employee_name),
            escape(rejected_by),
            record_table(record, record.total_amount),
            escape(reason),
        ),
    }
}

pub fn documents_requested(
    record: &expense_record::Model,
    requested: &str,
    requested_by: &str,
) -> EmailContent {
    EmailContent {
        subject: format!("Additional Documents Requested: {}", record.epv_id),
        html_body: format!(
            "<p>Dear {},</p><p>{} needs additional documents before your claim can be paid.</p>{}\
             <p><strong>Requested:</strong> {}</p>",
            escape(&record.employee_name),
            escape(requested_by),
            record_table(record, record.total_amount),
            escape(requested),
        ),
    }
}

pub fn documents_resubmitted(record: &expense_record::Model, uploaded_by: &str, file_count: usize) -> EmailContent {
    EmailContent {
        subject: format!("Supplementary Documents Uploaded: {}", record.epv_id),
        html_body: format!(
            "<p>{} uploaded {} supplementary document(s). The claim is back in the finance queue.</p>{}{}",
            escape(uploaded_by),
            file_count,
            record_table(record, record.total_amount),
            document_link(record),
        ),
    }
}

pub fn finance_entry_rejected(
    record: &expense_record::Model,
    entry: &finance_entry::Model,
    rejected_by: &str,
    reason: &str,
) -> EmailContent {
    EmailContent {
        subject: format!("Finance Entry Rejected: {}", record.epv_id),
        html_body: format!(
            "<p>The finance entry for vendor {} was rejected by {}.</p>{}\
             <p><strong>Reason:</strong> {}</p>",
            escape(&entry.vendor_name),
            escape(rejected_by),
            record_table(record, entry.amount),
            escape(reason),
        ),
    }
}
