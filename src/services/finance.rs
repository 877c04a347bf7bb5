use chrono::NaiveDate;
use serde::Deserialize;
use slog::Logger;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    collaborators::{templates, Collaborators},
    commands::{
        finance::{
            AssignCityCommand, ClaimProcessingCommand, CreateFinanceEntryCommand, EntryDecision,
            FinanceEntryInput, FinanceRejectionKind, PaymentRecorded, RejectFinanceExpenseCommand,
            ReleaseProcessingCommand, ReviewFinanceEntryCommand, ReviewedEntry,
            SlotPaymentDetails, ToggleCityAssignmentCommand, UpdatePaymentDetailsCommand,
        },
        find_record, Command,
    },
    config::AppConfig,
    db::DbPool,
    errors::ServiceError,
    events::EventSender,
    logging::audit,
    models::{city_assignment, expense_record, finance_entry},
    queries::{
        CityAssignmentView, EntryForReview, FinanceQueueQuery, ListCityAssignmentsQuery,
        PendingFinanceEntriesQuery, Query, QueueItem, QueueView,
    },
    workflow::WorkflowOutcome,
};

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentDetailsRequest {
    pub transaction_id: String,
    pub payment_date: NaiveDate,
    pub first_slot: Option<SlotPaymentDetails>,
    pub second_slot: Option<SlotPaymentDetails>,
}

/// The finance side of the workflow: queue views, the processing claim,
/// entries and their review, payments and rejections.
#[derive(Clone)]
pub struct FinanceService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    collaborators: Collaborators,
    config: Arc<AppConfig>,
    logger: Logger,
}

impl FinanceService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        collaborators: Collaborators,
        config: Arc<AppConfig>,
        logger: Logger,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            collaborators,
            config,
            logger,
        }
    }

    pub async fn queue(
        &self,
        ctx: &RequestContext,
        view: QueueView,
    ) -> Result<Vec<QueueItem>, ServiceError> {
        FinanceQueueQuery {
            viewer: ctx.clone(),
            view,
            lock_timeout_minutes: self.config.lock_timeout_minutes,
        }
        .execute(self.db_pool.as_ref())
        .await
    }

    pub async fn pending_entries(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<EntryForReview>, ServiceError> {
        PendingFinanceEntriesQuery { viewer: ctx.clone() }
            .execute(self.db_pool.as_ref())
            .await
    }

    #[instrument(skip(self, ctx), fields(actor = %ctx.email))]
    pub async fn claim(
        &self,
        ctx: &RequestContext,
        record_id: Uuid,
    ) -> Result<expense_record::Model, ServiceError> {
        let record = ClaimProcessingCommand {
            record_id,
            actor: ctx.clone(),
            lock_timeout_minutes: self.config.lock_timeout_minutes,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "processing_claimed", &record.epv_id, &ctx.email);
        Ok(record)
    }

    #[instrument(skip(self, ctx), fields(actor = %ctx.email))]
    pub async fn release(&self, ctx: &RequestContext, record_id: Uuid) -> Result<bool, ServiceError> {
        ReleaseProcessingCommand {
            record_id,
            actor: ctx.clone(),
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self, ctx, entry), fields(actor = %ctx.email))]
    pub async fn create_entry(
        &self,
        ctx: &RequestContext,
        record_id: Uuid,
        entry: FinanceEntryInput,
    ) -> Result<finance_entry::Model, ServiceError> {
        let created = CreateFinanceEntryCommand {
            record_id,
            actor: ctx.clone(),
            entry,
            lock_timeout_minutes: self.config.lock_timeout_minutes,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        let record = find_record(self.db_pool.as_ref(), created.expense_record_id).await?;
        audit(&self.logger, "finance_entry_created", &record.epv_id, &ctx.email);
        Ok(created)
    }

    /// Second-level review. A rejected entry is mailed back to the finance
    /// user who created it.
    #[instrument(skip(self, ctx, decision), fields(actor = %ctx.email))]
    pub async fn review_entry(
        &self,
        ctx: &RequestContext,
        entry_id: Uuid,
        decision: EntryDecision,
    ) -> Result<WorkflowOutcome<ReviewedEntry>, ServiceError> {
        let reviewed = ReviewFinanceEntryCommand {
            entry_id,
            actor: ctx.clone(),
            decision: decision.clone(),
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(
            &self.logger,
            &format!("finance_entry_{}", reviewed.entry.status),
            &reviewed.record.epv_id,
            &ctx.email,
        );

        let mut outcome = WorkflowOutcome::new(reviewed);
        if let EntryDecision::Reject { reason } = decision {
            let content = templates::finance_entry_rejected(
                &outcome.value.record,
                &outcome.value.entry,
                &ctx.name,
                reason.trim(),
            );
            if let Some(w) = self
                .collaborators
                .notify(&outcome.value.entry.finance_user_email, &content)
                .await
            {
                outcome.warnings.push(w);
            }
        }
        Ok(outcome)
    }

    #[instrument(skip(self, ctx, request), fields(actor = %ctx.email))]
    pub async fn update_payment(
        &self,
        ctx: &RequestContext,
        entry_id: Uuid,
        request: PaymentDetailsRequest,
    ) -> Result<PaymentRecorded, ServiceError> {
        UpdatePaymentDetailsCommand {
            entry_id,
            actor: ctx.clone(),
            transaction_id: request.transaction_id,
            payment_date: request.payment_date,
            first_slot: request.first_slot,
            second_slot: request.second_slot,
            default_max_days: self.config.default_max_processing_days,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Sends an approved expense back to the submitter, either for missing
    /// documents or to start over.
    #[instrument(skip(self, ctx, reason), fields(actor = %ctx.email, kind = %kind))]
    pub async fn reject_expense(
        &self,
        ctx: &RequestContext,
        record_id: Uuid,
        reason: String,
        kind: FinanceRejectionKind,
    ) -> Result<WorkflowOutcome<expense_record::Model>, ServiceError> {
        let record = RejectFinanceExpenseCommand {
            record_id,
            actor: ctx.clone(),
            reason: reason.clone(),
            kind,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "finance_rejected", &record.epv_id, &ctx.email);

        let rejected_by = format!("{} (Finance Team)", ctx.name);
        let content = templates::rejection_notice(&record, &rejected_by, reason.trim());
        let mut outcome = WorkflowOutcome::new(record);
        if let Some(w) = self.collaborators.notify(&outcome.value.email_id, &content).await {
            outcome.warnings.push(w);
        }
        Ok(outcome)
    }

    pub async fn city_assignments(
        &self,
        ctx: &RequestContext,
    ) -> Result<Vec<CityAssignmentView>, ServiceError> {
        ListCityAssignmentsQuery { viewer: ctx.clone() }
            .execute(self.db_pool.as_ref())
            .await
    }

    pub async fn assign_city(
        &self,
        ctx: &RequestContext,
        employee_id: Uuid,
        city: String,
    ) -> Result<city_assignment::Model, ServiceError> {
        let assignment = AssignCityCommand {
            actor: ctx.clone(),
            employee_id,
            city,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await?;
        audit(&self.logger, "city_assigned", &assignment.city, &ctx.email);
        Ok(assignment)
    }

    pub async fn toggle_city(
        &self,
        ctx: &RequestContext,
        assignment_id: Uuid,
    ) -> Result<city_assignment::Model, ServiceError> {
        ToggleCityAssignmentCommand {
            actor: ctx.clone(),
            assignment_id,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }
}
