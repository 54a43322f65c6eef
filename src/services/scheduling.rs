use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::SchedulingConfig;
use crate::db::DbPool;
use crate::entities::{
    production_order::Entity as ProductionOrder,
    work_center::Entity as WorkCenter,
    work_center_allocation::{self, AllocationStatus, Entity as WorkCenterAllocation},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// A proposed work-center time slice to validate.
#[derive(Debug, Clone)]
pub struct CandidateAllocation {
    pub work_center_id: Uuid,
    pub order_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
}

/// Input for persisting an allocation.
#[derive(Debug, Clone)]
pub struct ScheduleAllocation {
    pub work_center_id: Uuid,
    pub order_id: Uuid,
    pub step_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    pub scheduled_end: Option<DateTime<Utc>>,
    /// Display position; next free number at the work center when absent.
    pub sequence_number: Option<i32>,
}

impl ScheduleAllocation {
    fn candidate(&self) -> CandidateAllocation {
        CandidateAllocation {
            work_center_id: self.work_center_id,
            order_id: self.order_id,
            scheduled_start: self.scheduled_start,
            scheduled_end: self.scheduled_end,
        }
    }
}

/// One overlapping allocation found during validation.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationConflict {
    pub allocation_id: Uuid,
    pub order_id: Uuid,
    pub scheduled_start: DateTime<Utc>,
    /// Effective end (explicit or defaulted) used for the overlap check.
    pub scheduled_end: DateTime<Utc>,
}

/// Validation result: every overlap is reported, no early exit. Missing
/// references are hard failures; an inactive work center only warns.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationOutcome {
    pub conflicts: Vec<AllocationConflict>,
    pub reference_errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn is_schedulable(&self) -> bool {
        self.conflicts.is_empty() && self.reference_errors.is_empty()
    }
}

/// Per-day utilization of a work center against the fixed daily capacity.
#[derive(Debug, Clone, Serialize)]
pub struct DailyCapacity {
    pub work_center_id: Uuid,
    pub day: NaiveDate,
    pub allocated_minutes: i64,
    pub capacity_minutes: i64,
    pub utilization_pct: f64,
}

/// Work-center scheduling: conflict detection, run tracking and capacity
/// reporting. Detection only; nothing here optimizes or re-plans.
#[derive(Clone)]
pub struct SchedulingService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
    config: SchedulingConfig,
}

impl SchedulingService {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Option<EventSender>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
        }
    }

    /// Checks a candidate against every non-completed allocation at the same
    /// work center. Allocations without an end occupy the configured default
    /// duration.
    #[instrument(skip(self, candidate), fields(work_center_id = %candidate.work_center_id))]
    pub async fn validate(
        &self,
        candidate: &CandidateAllocation,
    ) -> Result<ValidationOutcome, ServiceError> {
        let candidate_end = candidate.scheduled_end.unwrap_or(
            candidate.scheduled_start
                + Duration::minutes(self.config.default_allocation_minutes),
        );
        if candidate_end <= candidate.scheduled_start {
            return Err(ServiceError::Validation(format!(
                "Scheduled end {} is not after start {}",
                candidate_end, candidate.scheduled_start
            )));
        }

        let db = &*self.db;
        let mut outcome = ValidationOutcome::default();

        match WorkCenter::find_by_id(candidate.work_center_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
        {
            Some(work_center) if !work_center.is_active => {
                outcome
                    .warnings
                    .push(format!("Work center {} is inactive", work_center.code));
            }
            Some(_) => {}
            None => {
                outcome.reference_errors.push(format!(
                    "Work center {} not found",
                    candidate.work_center_id
                ));
            }
        }

        if ProductionOrder::find_by_id(candidate.order_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .is_none()
        {
            outcome
                .reference_errors
                .push(format!("Order {} not found", candidate.order_id));
        }

        let existing = WorkCenterAllocation::find()
            .filter(work_center_allocation::Column::WorkCenterId.eq(candidate.work_center_id))
            .filter(work_center_allocation::Column::Status.ne(AllocationStatus::Completed))
            .all(db)
            .await
            .map_err(ServiceError::db)?;

        for allocation in existing {
            let existing_end =
                allocation.effective_end(self.config.default_allocation_minutes);
            if candidate.scheduled_start < existing_end
                && candidate_end > allocation.scheduled_start
            {
                outcome.conflicts.push(AllocationConflict {
                    allocation_id: allocation.id,
                    order_id: allocation.order_id,
                    scheduled_start: allocation.scheduled_start,
                    scheduled_end: existing_end,
                });
            }
        }

        Ok(outcome)
    }

    /// Validates and persists an allocation with status not_started.
    #[instrument(skip(self, input), fields(work_center_id = %input.work_center_id))]
    pub async fn schedule(
        &self,
        input: ScheduleAllocation,
    ) -> Result<work_center_allocation::Model, ServiceError> {
        let outcome = self.validate(&input.candidate()).await?;
        if !outcome.reference_errors.is_empty() {
            return Err(ServiceError::NotFound(outcome.reference_errors.join("; ")));
        }
        if !outcome.conflicts.is_empty() {
            return Err(ServiceError::SchedulingConflict {
                conflicts: outcome.conflicts,
            });
        }
        for warning in &outcome.warnings {
            warn!(warning = %warning, "scheduling with warning");
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db)?;

        let sequence_number = match input.sequence_number {
            Some(sequence) => sequence,
            None => {
                let last = WorkCenterAllocation::find()
                    .filter(
                        work_center_allocation::Column::WorkCenterId.eq(input.work_center_id),
                    )
                    .order_by_desc(work_center_allocation::Column::SequenceNumber)
                    .one(&txn)
                    .await
                    .map_err(ServiceError::db)?;
                last.map(|a| a.sequence_number + 1).unwrap_or(1)
            }
        };

        let now = Utc::now();
        let allocation = work_center_allocation::ActiveModel {
            id: Set(Uuid::new_v4()),
            work_center_id: Set(input.work_center_id),
            order_id: Set(input.order_id),
            step_id: Set(input.step_id),
            scheduled_start: Set(input.scheduled_start),
            scheduled_end: Set(input.scheduled_end),
            sequence_number: Set(sequence_number),
            status: Set(AllocationStatus::NotStarted),
            started_at: Set(None),
            completed_at: Set(None),
            status_changed_by: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db)?;

        txn.commit().await.map_err(ServiceError::db)?;

        counter!("shopfloor.scheduling.allocations", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::AllocationScheduled {
                    allocation_id: allocation.id,
                    work_center_id: allocation.work_center_id,
                    order_id: allocation.order_id,
                    scheduled_start: allocation.scheduled_start,
                })
                .await;
        }

        info!(allocation_id = %allocation.id, "allocation scheduled");
        Ok(allocation)
    }

    /// Reassigns sequence numbers 1..N in the given order. Overlaps among
    /// the reordered set are not re-validated; the caller is trusted.
    #[instrument(skip(self, ordered_ids))]
    pub async fn reorder(
        &self,
        work_center_id: Uuid,
        ordered_ids: &[Uuid],
    ) -> Result<(), ServiceError> {
        let db = &*self.db;
        let allocations = WorkCenterAllocation::find()
            .filter(work_center_allocation::Column::WorkCenterId.eq(work_center_id))
            .all(db)
            .await
            .map_err(ServiceError::db)?;
        let by_id: HashMap<Uuid, work_center_allocation::Model> =
            allocations.into_iter().map(|a| (a.id, a)).collect();

        for id in ordered_ids {
            if !by_id.contains_key(id) {
                return Err(ServiceError::Validation(format!(
                    "Allocation {} does not belong to work center {}",
                    id, work_center_id
                )));
            }
        }

        let txn = db.begin().await.map_err(ServiceError::db)?;
        for (index, id) in ordered_ids.iter().enumerate() {
            let allocation = by_id[id].clone();
            let target = index as i32 + 1;
            if allocation.sequence_number != target {
                let mut active: work_center_allocation::ActiveModel = allocation.into();
                active.sequence_number = Set(target);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await.map_err(ServiceError::db)?;
            }
        }
        txn.commit().await.map_err(ServiceError::db)?;

        Ok(())
    }

    /// Starts a scheduled run.
    #[instrument(skip(self))]
    pub async fn start_run(
        &self,
        allocation_id: Uuid,
        actor: &str,
    ) -> Result<work_center_allocation::Model, ServiceError> {
        self.transition_run(allocation_id, AllocationStatus::Running, actor)
            .await
    }

    /// Pauses a running allocation.
    #[instrument(skip(self))]
    pub async fn pause_run(
        &self,
        allocation_id: Uuid,
        actor: &str,
    ) -> Result<work_center_allocation::Model, ServiceError> {
        self.transition_run(allocation_id, AllocationStatus::Paused, actor)
            .await
    }

    /// Completes a run, releasing the work center.
    #[instrument(skip(self))]
    pub async fn complete_run(
        &self,
        allocation_id: Uuid,
        actor: &str,
    ) -> Result<work_center_allocation::Model, ServiceError> {
        self.transition_run(allocation_id, AllocationStatus::Completed, actor)
            .await
    }

    /// Deletes an allocation that has not started yet.
    #[instrument(skip(self))]
    pub async fn delete_allocation(&self, allocation_id: Uuid) -> Result<(), ServiceError> {
        let allocation = self.get_allocation(allocation_id).await?;
        if allocation.status != AllocationStatus::NotStarted {
            return Err(ServiceError::Conflict(format!(
                "Allocation {} has started and cannot be deleted (status {})",
                allocation_id, allocation.status
            )));
        }

        WorkCenterAllocation::delete_by_id(allocation_id)
            .exec(&*self.db)
            .await
            .map_err(ServiceError::db)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::AllocationDeleted { allocation_id })
                .await;
        }

        Ok(())
    }

    /// Per-day utilization for the given work centers over a date range,
    /// inclusive. Minutes of non-completed allocations are clipped to each
    /// day before summing.
    #[instrument(skip(self, work_center_ids))]
    pub async fn capacity(
        &self,
        work_center_ids: &[Uuid],
        from_day: NaiveDate,
        to_day: NaiveDate,
    ) -> Result<Vec<DailyCapacity>, ServiceError> {
        if to_day < from_day {
            return Err(ServiceError::Validation(format!(
                "Range end {} is before start {}",
                to_day, from_day
            )));
        }

        let db = &*self.db;
        let allocations = WorkCenterAllocation::find()
            .filter(
                work_center_allocation::Column::WorkCenterId
                    .is_in(work_center_ids.iter().copied()),
            )
            .filter(work_center_allocation::Column::Status.ne(AllocationStatus::Completed))
            .all(db)
            .await
            .map_err(ServiceError::db)?;

        let capacity_minutes = self.config.daily_capacity_minutes;
        let mut report = Vec::new();
        for &work_center_id in work_center_ids {
            let mut day = from_day;
            loop {
                let day_start = day.and_time(NaiveTime::MIN).and_utc();
                let day_end = day_start + Duration::days(1);

                let allocated_minutes: i64 = allocations
                    .iter()
                    .filter(|a| a.work_center_id == work_center_id)
                    .map(|a| {
                        let start = a.scheduled_start.max(day_start);
                        let end = a
                            .effective_end(self.config.default_allocation_minutes)
                            .min(day_end);
                        if end > start {
                            (end - start).num_minutes()
                        } else {
                            0
                        }
                    })
                    .sum();

                report.push(DailyCapacity {
                    work_center_id,
                    day,
                    allocated_minutes,
                    capacity_minutes,
                    utilization_pct: allocated_minutes as f64 / capacity_minutes as f64 * 100.0,
                });

                if day >= to_day {
                    break;
                }
                day = match day.succ_opt() {
                    Some(next) => next,
                    None => break,
                };
            }
        }

        Ok(report)
    }

    /// Allocations at a work center in display order.
    #[instrument(skip(self))]
    pub async fn allocations_for_work_center(
        &self,
        work_center_id: Uuid,
    ) -> Result<Vec<work_center_allocation::Model>, ServiceError> {
        WorkCenterAllocation::find()
            .filter(work_center_allocation::Column::WorkCenterId.eq(work_center_id))
            .order_by_asc(work_center_allocation::Column::SequenceNumber)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db)
    }

    async fn transition_run(
        &self,
        allocation_id: Uuid,
        target: AllocationStatus,
        actor: &str,
    ) -> Result<work_center_allocation::Model, ServiceError> {
        let allocation = self.get_allocation(allocation_id).await?;
        if !allocation.status.can_transition_to(&target) {
            return Err(ServiceError::Conflict(format!(
                "Allocation {} cannot transition from {} to {}",
                allocation_id, allocation.status, target
            )));
        }

        let old_status = allocation.status.clone();
        let started_at = allocation.started_at;
        let now = Utc::now();
        let mut active: work_center_allocation::ActiveModel = allocation.into();
        match &target {
            AllocationStatus::Running => {
                active.started_at = Set(started_at.or(Some(now)));
            }
            AllocationStatus::Completed => {
                active.completed_at = Set(Some(now));
            }
            AllocationStatus::Paused | AllocationStatus::NotStarted => {}
        }
        active.status = Set(target);
        active.status_changed_by = Set(Some(actor.to_string()));
        active.updated_at = Set(now);
        let updated = active.update(&*self.db).await.map_err(ServiceError::db)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::AllocationStatusChanged {
                    allocation_id: updated.id,
                    old_status: old_status.to_string(),
                    new_status: updated.status.to_string(),
                })
                .await;
        }

        Ok(updated)
    }

    async fn get_allocation(
        &self,
        allocation_id: Uuid,
    ) -> Result<work_center_allocation::Model, ServiceError> {
        WorkCenterAllocation::find_by_id(allocation_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Allocation {} not found", allocation_id))
            })
    }
}
