//! Dashboard figures and expense trends. Figures are computed over top-level
//! claims only; sub-invoices are counted through their master.

use async_trait::async_trait;
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use sea_orm::{
    prelude::*,
    sea_query::{Expr, Func},
    QueryOrder,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, ops::Range};

use crate::{
    auth::{RequestContext, Role},
    commands::finance::{
        assigned_cities, city_allowed, max_processing_days,
        update_payment_details_command::anchor_rows,
    },
    errors::ServiceError,
    models::{
        approval, expense_item, expense_record, finance_entry, ApprovalStatus, ExpenseStatus,
        FinanceEntryStatus, InvoiceType,
    },
    workflow::{invoice::resolve_city, processing_anchor, processing_days},
};

use super::Query;

const TREND_ROLES: &[Role] = &[Role::Finance, Role::FinanceApprover, Role::SuperAdmin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    #[default]
    All,
    ThisMonth,
    LastMonth,
    ThisQuarter,
    LastQuarter,
    ThisYear,
}

fn quarter_start(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month0() / 3 * 3 + 1, 1)
}

impl ReportPeriod {
    /// Half-open date range of the period around `today`; `None` is unbounded.
    pub fn bounds(self, today: NaiveDate) -> Option<Range<NaiveDate>> {
        let month = today.with_day(1)?;
        let quarter = quarter_start(today)?;
        match self {
            Self::All => None,
            Self::ThisMonth => Some(month..month.checked_add_months(Months::new(1))?),
            Self::LastMonth => Some(month.checked_sub_months(Months::new(1))?..month),
            Self::ThisQuarter => Some(quarter..quarter.checked_add_months(Months::new(3))?),
            Self::LastQuarter => Some(quarter.checked_sub_months(Months::new(3))?..quarter),
            Self::ThisYear => {
                let year = NaiveDate::from_ymd_opt(today.year(), 1, 1)?;
                Some(year..year.checked_add_months(Months::new(12))?)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportFilters {
    #[serde(default)]
    pub period: ReportPeriod,
    pub city: Option<String>,
    pub cost_center: Option<String>,
    pub expense_head: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_claims: u64,
    pub pending_claims: u64,
    pub approved_this_month: u64,
    pub approved_total: u64,
    pub rejected_claims: u64,
    pub paid_claims: u64,
    pub total_amount: Decimal,
    pub approved_amount: Decimal,
    /// Mean business days from approval to payment over paid claims.
    pub average_processing_days: Option<Decimal>,
    pub max_processing_days: i64,
    /// Paid claims that took longer than `max_processing_days`.
    pub sop_breaches: u64,
}

fn matches_text(filter: Option<&str>, value: Option<&str>) -> bool {
    match filter.map(str::trim).filter(|f| !f.is_empty()) {
        None => true,
        Some(f) => value.is_some_and(|v| v.trim().eq_ignore_ascii_case(f)),
    }
}

/// Top-level claims the viewer may report on, narrowed by `filters`.
async fn scoped_records(
    db: &DatabaseConnection,
    viewer: &RequestContext,
    filters: &ReportFilters,
    today: NaiveDate,
) -> Result<Vec<(expense_record::Model, Option<String>)>, ServiceError> {
    let mut select = expense_record::Entity::find()
        .filter(expense_record::Column::InvoiceType.ne(InvoiceType::Sub))
        .order_by_asc(expense_record::Column::SubmissionDate);
    if viewer.role == Role::Employee {
        select = select.filter(
            Expr::expr(Func::lower(Expr::col(expense_record::Column::EmailId)))
                .eq(viewer.email.trim().to_lowercase()),
        );
    }
    let cities = if viewer.role == Role::Finance {
        assigned_cities(db, &viewer.email).await?
    } else {
        Vec::new()
    };
    let period = filters.period.bounds(today);

    let mut candidates = Vec::new();
    for record in select.all(db).await? {
        if let Some(range) = &period {
            if !range.contains(&record.submission_date.date_naive()) {
                continue;
            }
        }
        if !matches_text(filters.cost_center.as_deref(), record.cost_center_name.as_deref()) {
            continue;
        }
        let city = resolve_city(db, &record).await?;
        if !city_allowed(&cities, city.as_deref())
            || !matches_text(filters.city.as_deref(), city.as_deref())
        {
            continue;
        }
        candidates.push((record, city));
    }

    let Some(head) = filters.expense_head.as_deref().filter(|h| !h.trim().is_empty()) else {
        return Ok(candidates);
    };
    let with_head: Vec<Uuid> = expense_item::Entity::find()
        .filter(expense_item::Column::ExpenseRecordId.is_in(candidates.iter().map(|(r, _)| r.id)))
        .all(db)
        .await?
        .into_iter()
        .filter(|item| item.expense_head.trim().eq_ignore_ascii_case(head.trim()))
        .map(|item| item.expense_record_id)
        .collect();
    Ok(candidates
        .into_iter()
        .filter(|(r, _)| with_head.contains(&r.id))
        .collect())
}

/// Average of whole-day counts, to one decimal place.
pub fn average_days(days: &[i64]) -> Option<Decimal> {
    if days.is_empty() {
        return None;
    }
    let total: i64 = days.iter().sum();
    Some((Decimal::from(total) / Decimal::from(days.len() as u64)).round_dp(1))
}

/// Headline figures for the dashboard. Employees see their own claims,
/// finance users the cities they are assigned to, approvers and admins
/// everything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummaryQuery {
    pub viewer: RequestContext,
    pub filters: ReportFilters,
    pub today: NaiveDate,
    pub default_max_days: i64,
}

#[async_trait]
impl Query for DashboardSummaryQuery {
    type Result = DashboardSummary;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let records = scoped_records(db_pool, &self.viewer, &self.filters, self.today).await?;
        let max_days = max_processing_days(db_pool, self.default_max_days).await?;
        let this_month = ReportPeriod::ThisMonth.bounds(self.today);
        let ids: Vec<Uuid> = records.iter().map(|(r, _)| r.id).collect();

        let mut approved_at: HashMap<Uuid, NaiveDate> = HashMap::new();
        for row in approval::Entity::find()
            .filter(approval::Column::ExpenseRecordId.is_in(ids.clone()))
            .filter(approval::Column::Status.eq(ApprovalStatus::Approved))
            .all(db_pool)
            .await?
        {
            if let Some(at) = row.action_date {
                let day = approved_at.entry(row.expense_record_id).or_insert(at.date_naive());
                *day = (*day).max(at.date_naive());
            }
        }
        let paid: HashMap<Uuid, finance_entry::Model> = finance_entry::Entity::find()
            .filter(finance_entry::Column::ExpenseRecordId.is_in(ids))
            .filter(finance_entry::Column::Status.eq(FinanceEntryStatus::Approved))
            .filter(finance_entry::Column::PaymentDate.is_not_null())
            .all(db_pool)
            .await?
            .into_iter()
            .map(|e| (e.expense_record_id, e))
            .collect();

        let mut summary = DashboardSummary {
            total_claims: records.len() as u64,
            pending_claims: 0,
            approved_this_month: 0,
            approved_total: 0,
            rejected_claims: 0,
            paid_claims: 0,
            total_amount: Decimal::ZERO,
            approved_amount: Decimal::ZERO,
            average_processing_days: None,
            max_processing_days: max_days,
            sop_breaches: 0,
        };
        let mut days = Vec::new();
        for (record, _) in &records {
            summary.total_amount += record.total_amount;
            match record.status {
                ExpenseStatus::Submitted
                | ExpenseStatus::PendingApproval
                | ExpenseStatus::PartiallyApproved => summary.pending_claims += 1,
                ExpenseStatus::Rejected => summary.rejected_claims += 1,
                ExpenseStatus::Approved => {
                    summary.approved_total += 1;
                    summary.approved_amount += record.total_amount;
                    let decided = approved_at
                        .get(&record.id)
                        .copied()
                        .unwrap_or_else(|| record.updated_at.date_naive());
                    if this_month.as_ref().is_some_and(|m| m.contains(&decided)) {
                        summary.approved_this_month += 1;
                    }
                }
            }
            if let Some(entry) = paid.get(&record.id) {
                let rows = anchor_rows(db_pool, record.id).await?;
                let taken = processing_days(processing_anchor(&rows), entry.payment_date);
                if taken > max_days {
                    summary.sop_breaches += 1;
                }
                days.push(taken);
            }
        }
        summary.paid_claims = days.len() as u64;
        summary.average_processing_days = average_days(&days);
        Ok(summary)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendGranularity {
    #[default]
    Monthly,
    Quarterly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendBucket {
    pub label: String,
    pub range: Range<NaiveDate>,
}

impl TrendGranularity {
    fn count(self) -> u32 {
        match self {
            Self::Monthly => 12,
            Self::Quarterly => 4,
            Self::Yearly => 3,
        }
    }

    fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
        }
    }

    /// Buckets oldest first, the last one holding `today`.
    pub fn buckets(self, today: NaiveDate) -> Vec<TrendBucket> {
        let current = match self {
            Self::Monthly => today.with_day(1),
            Self::Quarterly => quarter_start(today),
            Self::Yearly => NaiveDate::from_ymd_opt(today.year(), 1, 1),
        };
        let Some(current) = current else {
            return Vec::new();
        };
        (0..self.count())
            .rev()
            .filter_map(|back| {
                let start = current.checked_sub_months(Months::new(back * self.months()))?;
                let end = start.checked_add_months(Months::new(self.months()))?;
                let label = match self {
                    Self::Monthly => start.format("%b %Y").to_string(),
                    Self::Quarterly => format!("Q{} {}", start.month0() / 3 + 1, start.year()),
                    Self::Yearly => start.year().to_string(),
                };
                Some(TrendBucket { label, range: start..end })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseTrends {
    pub labels: Vec<String>,
    pub values: Vec<Decimal>,
}

/// Approved spend per period. With an expense head only the matching lines
/// count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpenseTrendsQuery {
    pub viewer: RequestContext,
    pub granularity: TrendGranularity,
    pub expense_head: Option<String>,
    pub today: NaiveDate,
}

#[async_trait]
impl Query for ExpenseTrendsQuery {
    type Result = ExpenseTrends;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        self.viewer.require_role(TREND_ROLES, "view expense trends")?;
        let buckets = self.granularity.buckets(self.today);
        let mut values = vec![Decimal::ZERO; buckets.len()];
        let filters = ReportFilters {
            expense_head: self.expense_head.clone(),
            ..ReportFilters::default()
        };
        let approved: Vec<expense_record::Model> =
            scoped_records(db_pool, &self.viewer, &filters, self.today)
                .await?
                .into_iter()
                .map(|(r, _)| r)
                .filter(|r| r.status == ExpenseStatus::Approved)
                .collect();

        let head = self.expense_head.as_deref().map(str::trim).filter(|h| !h.is_empty());
        let mut head_amounts: HashMap<Uuid, Decimal> = HashMap::new();
        if let Some(head) = head {
            for item in expense_item::Entity::find()
                .filter(expense_item::Column::ExpenseRecordId.is_in(approved.iter().map(|r| r.id)))
                .all(db_pool)
                .await?
                .into_iter()
                .filter(|item| item.expense_head.trim().eq_ignore_ascii_case(head))
            {
                *head_amounts.entry(item.expense_record_id).or_default() += item.amount;
            }
        }

        for record in &approved {
            let day = record.submission_date.date_naive();
            if let Some(slot) = buckets.iter().position(|b| b.range.contains(&day)) {
                values[slot] += match head {
                    Some(_) => head_amounts.get(&record.id).copied().unwrap_or_default(),
                    None => record.total_amount,
                };
            }
        }
        Ok(ExpenseTrends {
            labels: buckets.into_iter().map(|b| b.label).collect(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn periods_cover_the_expected_dates() {
        let today = date(2024, 2, 14);
        assert_eq!(ReportPeriod::All.bounds(today), None);
        assert_eq!(
            ReportPeriod::ThisMonth.bounds(today),
            Some(date(2024, 2, 1)..date(2024, 3, 1))
        );
        assert_eq!(
            ReportPeriod::LastMonth.bounds(today),
            Some(date(2024, 1, 1)..date(2024, 2, 1))
        );
        assert_eq!(
            ReportPeriod::LastQuarter.bounds(today),
            Some(date(2023, 10, 1)..date(2024, 1, 1))
        );
        assert_eq!(
            ReportPeriod::ThisYear.bounds(today),
            Some(date(2024, 1, 1)..date(2025, 1, 1))
        );
    }

    #[test]
    fn monthly_buckets_end_with_the_current_month() {
        let buckets = TrendGranularity::Monthly.buckets(date(2024, 3, 9));
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets[0].label, "Apr 2023");
        assert_eq!(buckets[11].label, "Mar 2024");
        assert_eq!(buckets[11].range, date(2024, 3, 1)..date(2024, 4, 1));
    }

    #[test]
    fn quarterly_and_yearly_labels() {
        let quarters = TrendGranularity::Quarterly.buckets(date(2024, 5, 20));
        let labels: Vec<_> = quarters.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Q3 2023", "Q4 2023", "Q1 2024", "Q2 2024"]);

        let years = TrendGranularity::Yearly.buckets(date(2024, 5, 20));
        assert_eq!(years[0].label, "2022");
        assert_eq!(years[2].range, date(2024, 1, 1)..date(2025, 1, 1));
    }

    #[test]
    fn average_is_rounded_to_one_place() {
        assert_eq!(average_days(&[]), None);
        assert_eq!(average_days(&[2, 3, 3]), Some(Decimal::new(27, 1)));
    }

    #[test]
    fn blank_text_filters_match_everything() {
        assert!(matches_text(None, None));
        assert!(matches_text(Some(" "), Some("Pune")));
        assert!(matches_text(Some("pune"), Some("Pune")));
        assert!(!matches_text(Some("Pune"), None));
    }
}
