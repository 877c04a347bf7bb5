use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{prelude::*, Condition, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    auth::{RequestContext, Role},
    commands::finance::{assigned_cities, city_allowed},
    errors::ServiceError,
    models::{
        city_assignment, employee, expense_record, finance_entry, DocumentStatus, ExpenseStatus, FinanceEntryStatus,
        FinanceStatus, InvoiceType,
    },
    workflow::{invoice::resolve_city, lock::lock_view, LockView},
};

use super::Query;

const QUEUE_ROLES: &[Role] = &[Role::Finance, Role::FinanceApprover, Role::SuperAdmin];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueView {
    /// Approved and untouched by finance.
    Pending,
    /// Back from the supplementary document cycle.
    Resubmitted,
    /// Sent back by finance.
    Rejected,
    /// The viewer's approved entries still missing transaction details.
    AwaitingPayment,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueItem {
    pub record: expense_record::Model,
    pub city: Option<String>,
    pub lock: LockView,
    pub entry: Option<finance_entry::Model>,
}

/// One tab of the finance dashboard, filtered to the viewer's cities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinanceQueueQuery {
    pub viewer: RequestContext,
    pub view: QueueView,
    pub lock_timeout_minutes: i64,
}

fn awaiting_finance() -> Condition {
    Condition::all()
        .add(expense_record::Column::Status.eq(ExpenseStatus::Approved))
        .add(expense_record::Column::InvoiceType.ne(InvoiceType::Sub))
        .add(
            Condition::any()
                .add(expense_record::Column::FinanceStatus.is_null())
                .add(expense_record::Column::FinanceStatus.eq(FinanceStatus::Pending)),
        )
}

impl FinanceQueueQuery {
    async fn records(
        &self,
        db: &DatabaseConnection,
    ) -> Result<Vec<(expense_record::Model, Option<finance_entry::Model>)>, ServiceError> {
        let with_no_entry = |records: Vec<expense_record::Model>| {
            records.into_iter().map(|r| (r, None)).collect::<Vec<_>>()
        };
        let ordered = expense_record::Entity::find().order_by_asc(expense_record::Column::SubmissionDate);

        Ok(match self.view {
            QueueView::Pending => with_no_entry(
                ordered
                    .filter(awaiting_finance())
                    .filter(expense_record::Column::DocumentStatus.ne(DocumentStatus::DocumentsUploaded))
                    .all(db)
                    .await?,
            ),
            QueueView::Resubmitted => with_no_entry(
                ordered
                    .filter(awaiting_finance())
                    .filter(expense_record::Column::DocumentStatus.eq(DocumentStatus::DocumentsUploaded))
                    .all(db)
                    .await?,
            ),
            QueueView::Rejected => with_no_entry(
                ordered
                    .filter(expense_record::Column::FinanceStatus.is_in([
                        FinanceStatus::Rejected,
                        FinanceStatus::PendingDocuments,
                    ]))
                    .all(db)
                    .await?,
            ),
            QueueView::AwaitingPayment => {
                let entries = finance_entry::Entity::find()
                    .filter(finance_entry::Column::FinanceUserEmail.eq(self.viewer.email.as_str()))
                    .filter(finance_entry::Column::Status.eq(FinanceEntryStatus::Approved))
                    .filter(
                        Condition::any()
                            .add(finance_entry::Column::TransactionId.is_null())
                            .add(finance_entry::Column::PaymentDate.is_null()),
                    )
                    .order_by_asc(finance_entry::Column::ApprovedOn)
                    .all(db)
                    .await?;
                let ids: Vec<Uuid> = entries.iter().map(|e| e.expense_record_id).collect();
                let mut records: HashMap<Uuid, expense_record::Model> = expense_record::Entity::find()
                    .filter(expense_record::Column::Id.is_in(ids))
                    .all(db)
                    .await?
                    .into_iter()
                    .map(|r| (r.id, r))
                    .collect();
                entries
                    .into_iter()
                    .filter_map(|e| records.remove(&e.expense_record_id).map(|r| (r, Some(e))))
                    .collect()
            }
        })
    }
}

#[async_trait]
impl Query for FinanceQueueQuery {
    type Result = Vec<QueueItem>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        self.viewer.require_role(QUEUE_ROLES, "view the finance queue")?;
        let cities = if self.viewer.role == Role::SuperAdmin {
            Vec::new()
        } else {
            assigned_cities(db_pool, &self.viewer.email).await?
        };
        let timeout = Duration::minutes(self.lock_timeout_minutes);
        let now = Utc::now();

        let mut items = Vec::new();
        for (record, entry) in self.records(db_pool).await? {
            let city = resolve_city(db_pool, &record).await?;
            if !city_allowed(&cities, city.as_deref()) {
                continue;
            }
            let lock = lock_view(&record, &self.viewer.email, timeout, now);
            items.push(QueueItem {
                record,
                city,
                lock,
                entry,
            });
        }
        Ok(items)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EntryForReview {
    pub entry: finance_entry::Model,
    pub record: expense_record::Model,
}

/// Finance entries waiting for the Finance Approver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingFinanceEntriesQuery {
    pub viewer: RequestContext,
}

#[async_trait]
impl Query for PendingFinanceEntriesQuery {
    type Result = Vec<EntryForReview>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        self.viewer
            .require_role(&[Role::FinanceApprover], "review finance entries")?;
        let cities = assigned_cities(db_pool, &self.viewer.email).await?;

        let entries = finance_entry::Entity::find()
            .filter(finance_entry::Column::Status.eq(FinanceEntryStatus::Pending))
            .order_by_asc(finance_entry::Column::EntryDate)
            .find_also_related(expense_record::Entity)
            .all(db_pool)
            .await?;

        let mut out = Vec::with_capacity(entries.len());
        for (entry, record) in entries {
            let Some(record) = record else { continue };
            let city = resolve_city(db_pool, &record).await?;
            if city_allowed(&cities, city.as_deref()) {
                out.push(EntryForReview { entry, record });
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CityAssignmentView {
    #[serde(flatten)]
    pub assignment: city_assignment::Model,
    pub employee_name: Option<String>,
    pub employee_email: Option<String>,
}

/// Every city assignment, active or not, with the assignee's name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListCityAssignmentsQuery {
    pub viewer: RequestContext,
}

#[async_trait]
impl Query for ListCityAssignmentsQuery {
    type Result = Vec<CityAssignmentView>;

    async fn execute(&self, db_pool: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        self.viewer.require_role(
            &[Role::FinanceApprover, Role::SuperAdmin],
            "view city assignments",
        )?;

        let rows = city_assignment::Entity::find()
            .order_by_asc(city_assignment::Column::City)
            .find_also_related(employee::Entity)
            .all(db_pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(assignment, emp)| CityAssignmentView {
                assignment,
                employee_name: emp.as_ref().map(|e| e.name.clone()),
                employee_email: emp.map(|e| e.email),
            })
            .collect())
    }
}
