use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    part::Entity as Part,
    production_order::{self, Entity as ProductionOrder, OrderStatus},
    production_step::{self, Entity as ProductionStep, StepStatus},
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::consumption::{ConsumeAllOutcome, ConsumptionService};
use crate::services::order_numbers::OrderNumberGenerator;

/// Input for creating a production order with its initial routing.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub part_id: Uuid,
    pub quantity_ordered: Decimal,
    /// Step names, scheduled in the given order as sequence 1..N.
    pub steps: Vec<String>,
}

/// Result of a step transition: the updated step, the order after its
/// recompute, and the consumption outcome when the transition completed the
/// order.
#[derive(Debug, Clone)]
pub struct StepTransitionOutcome {
    pub step: production_step::Model,
    pub order: production_order::Model,
    pub consumption: Option<ConsumeAllOutcome>,
}

/// Result of an explicit order completion. `failures` lists BOM lines whose
/// consumption failed while the order still completed.
#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub order: production_order::Model,
    pub failures: Vec<crate::services::consumption::LineFailure>,
}

/// Order lifecycle state machine.
///
/// Step writes and the order-status recompute execute in one transaction,
/// so the order is never observed in a state inconsistent with its steps.
/// Completion drives the consumption ledger.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    consumption: Arc<ConsumptionService>,
    order_numbers: Arc<dyn OrderNumberGenerator>,
    event_sender: Option<EventSender>,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        consumption: Arc<ConsumptionService>,
        order_numbers: Arc<dyn OrderNumberGenerator>,
        event_sender: Option<EventSender>,
    ) -> Self {
        Self {
            db,
            consumption,
            order_numbers,
            event_sender,
        }
    }

    /// Creates a queued order with its steps. The external numbering
    /// generator is invoked exactly once.
    #[instrument(skip(self, input), fields(part_id = %input.part_id))]
    pub async fn create_order(
        &self,
        input: CreateOrder,
    ) -> Result<production_order::Model, ServiceError> {
        if input.quantity_ordered <= Decimal::ZERO {
            return Err(ServiceError::Validation(format!(
                "Ordered quantity must be positive, got {}",
                input.quantity_ordered
            )));
        }
        if input.steps.iter().any(|name| name.trim().is_empty()) {
            return Err(ServiceError::Validation(
                "Step names cannot be empty".to_string(),
            ));
        }

        let db = &*self.db;
        Part::find_by_id(input.part_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", input.part_id)))?;

        let order_number = self.order_numbers.next_number(db).await?;

        let txn = db.begin().await.map_err(ServiceError::db)?;
        let now = Utc::now();
        let order = production_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_number: Set(order_number.clone()),
            part_id: Set(input.part_id),
            status: Set(OrderStatus::Queued),
            quantity_ordered: Set(input.quantity_ordered),
            quantity_completed: Set(None),
            hold_reason: Set(None),
            actual_start: Set(None),
            actual_end: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db)?;

        for (index, name) in input.steps.iter().enumerate() {
            production_step::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id),
                sequence_number: Set(index as i32 + 1),
                name: Set(name.clone()),
                status: Set(StepStatus::Pending),
                started_at: Set(None),
                completed_at: Set(None),
                actual_minutes: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db)?;
        }
        txn.commit().await.map_err(ServiceError::db)?;

        counter!("shopfloor.orders.created", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderCreated {
                    order_id: order.id,
                    order_number,
                })
                .await;
        }

        info!(order_id = %order.id, order_number = %order.order_number, "order created");
        Ok(order)
    }

    /// Appends a step to the order's routing.
    #[instrument(skip(self))]
    pub async fn add_step(
        &self,
        order_id: Uuid,
        name: &str,
    ) -> Result<production_step::Model, ServiceError> {
        if name.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Step name cannot be empty".to_string(),
            ));
        }

        let db = &*self.db;
        let order = self.get_order(order_id).await?;
        if order.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Order {} is complete; steps can no longer be added",
                order.order_number
            )));
        }

        let last = ProductionStep::find()
            .filter(production_step::Column::OrderId.eq(order_id))
            .order_by_desc(production_step::Column::SequenceNumber)
            .one(db)
            .await
            .map_err(ServiceError::db)?;
        let next_sequence = last.map(|s| s.sequence_number + 1).unwrap_or(1);

        let now = Utc::now();
        production_step::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            sequence_number: Set(next_sequence),
            name: Set(name.to_string()),
            status: Set(StepStatus::Pending),
            started_at: Set(None),
            completed_at: Set(None),
            actual_minutes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db)
    }

    /// Removes a pending step and renumbers the remainder contiguously.
    #[instrument(skip(self))]
    pub async fn remove_step(&self, step_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;
        let step = self.get_step(step_id).await?;
        if step.status != StepStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Step {} has started and cannot be removed",
                step_id
            )));
        }

        let txn = db.begin().await.map_err(ServiceError::db)?;
        ProductionStep::delete_by_id(step_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db)?;

        let remaining = ProductionStep::find()
            .filter(production_step::Column::OrderId.eq(step.order_id))
            .order_by_asc(production_step::Column::SequenceNumber)
            .all(&txn)
            .await
            .map_err(ServiceError::db)?;
        for (index, sibling) in remaining.into_iter().enumerate() {
            let target = index as i32 + 1;
            if sibling.sequence_number != target {
                let mut active: production_step::ActiveModel = sibling.into();
                active.sequence_number = Set(target);
                active.updated_at = Set(Utc::now());
                active.update(&txn).await.map_err(ServiceError::db)?;
            }
        }
        txn.commit().await.map_err(ServiceError::db)?;

        Ok(())
    }

    /// Transitions a step and recomputes the order status in the same
    /// transaction. Hold is sticky: while the order is on hold no automatic
    /// order transition happens, whatever the steps do.
    ///
    /// When the transition settles the last open step, the order completes
    /// and all outstanding BOM lines are consumed; per-line failures are
    /// reported in the outcome without undoing the completion (the derived
    /// idempotency keys make a later `complete_order` retry safe).
    #[instrument(skip(self))]
    pub async fn transition_step(
        &self,
        step_id: Uuid,
        new_status: StepStatus,
    ) -> Result<StepTransitionOutcome, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db)?;

        let step = ProductionStep::find_by_id(step_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Step {} not found", step_id)))?;

        if !step.status.can_transition_to(&new_status) {
            return Err(ServiceError::Conflict(format!(
                "Step {} cannot transition from {} to {}",
                step_id, step.status, new_status
            )));
        }

        let now = Utc::now();
        let started_at = step.started_at;
        let mut active: production_step::ActiveModel = step.into();
        active.status = Set(new_status.clone());
        match new_status {
            StepStatus::InProgress => {
                active.started_at = Set(Some(now));
            }
            StepStatus::Complete | StepStatus::Skipped => {
                active.completed_at = Set(Some(now));
                active.actual_minutes = Set(started_at.map(|s| (now - s).num_minutes()));
            }
            StepStatus::Pending => {}
        }
        active.updated_at = Set(now);
        let updated_step = active.update(&txn).await.map_err(ServiceError::db)?;

        let order = ProductionOrder::find_by_id(updated_step.order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", updated_step.order_id))
            })?;

        let old_status = order.status.clone();
        let mut completed_now = false;
        let updated_order = if order.status == OrderStatus::Hold {
            order
        } else {
            let steps = ProductionStep::find()
                .filter(production_step::Column::OrderId.eq(order.id))
                .all(&txn)
                .await
                .map_err(ServiceError::db)?;

            let all_settled = steps.iter().all(|s| s.status.is_settled());
            let any_active = steps
                .iter()
                .any(|s| matches!(s.status, StepStatus::InProgress | StepStatus::Complete));

            if all_settled && order.status.can_transition_to(&OrderStatus::Complete) {
                completed_now = true;
                let quantity_ordered = order.quantity_ordered;
                let quantity_completed = order.quantity_completed;
                let mut active: production_order::ActiveModel = order.into();
                active.status = Set(OrderStatus::Complete);
                active.actual_end = Set(Some(now));
                active.quantity_completed =
                    Set(Some(quantity_completed.unwrap_or(quantity_ordered)));
                active.updated_at = Set(now);
                active.update(&txn).await.map_err(ServiceError::db)?
            } else if any_active && order.status == OrderStatus::Queued {
                let actual_start = order.actual_start;
                let mut active: production_order::ActiveModel = order.into();
                active.status = Set(OrderStatus::InProgress);
                active.actual_start = Set(actual_start.or(Some(now)));
                active.updated_at = Set(now);
                active.update(&txn).await.map_err(ServiceError::db)?
            } else {
                order
            }
        };

        txn.commit().await.map_err(ServiceError::db)?;

        counter!("shopfloor.steps.transitioned", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::StepTransitioned {
                    step_id: updated_step.id,
                    order_id: updated_order.id,
                    new_status: updated_step.status.to_string(),
                })
                .await;
            if updated_order.status != old_status {
                sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id: updated_order.id,
                        old_status: old_status.to_string(),
                        new_status: updated_order.status.to_string(),
                    })
                    .await;
            }
        }

        let consumption = if completed_now {
            counter!("shopfloor.orders.completed", 1);
            let outcome = self
                .consumption
                .consume_all_outstanding(updated_order.id)
                .await?;
            if !outcome.failed.is_empty() {
                warn!(
                    order_id = %updated_order.id,
                    failed = outcome.failed.len(),
                    "order completed with failed BOM lines"
                );
            }
            if let Some(sender) = &self.event_sender {
                sender
                    .send_or_log(Event::OrderCompleted {
                        order_id: updated_order.id,
                        quantity_completed: updated_order
                            .quantity_completed
                            .unwrap_or(updated_order.quantity_ordered),
                    })
                    .await;
            }
            Some(outcome)
        } else {
            None
        };

        Ok(StepTransitionOutcome {
            step: updated_step,
            order: updated_order,
            consumption,
        })
    }

    /// Puts an order on hold. Only an explicit `resume` leaves this state.
    #[instrument(skip(self))]
    pub async fn put_on_hold(
        &self,
        order_id: Uuid,
        reason: &str,
    ) -> Result<production_order::Model, ServiceError> {
        let db = &*self.db;
        let order = self.get_order(order_id).await?;
        if !order.status.can_transition_to(&OrderStatus::Hold) {
            return Err(ServiceError::Conflict(format!(
                "Order {} cannot be held from status {}",
                order.order_number, order.status
            )));
        }

        let mut active: production_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Hold);
        active.hold_reason = Set(Some(reason.to_string()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::db)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderHeld {
                    order_id: updated.id,
                    reason: reason.to_string(),
                })
                .await;
        }

        Ok(updated)
    }

    /// Resumes a held order, clearing the hold reason.
    #[instrument(skip(self))]
    pub async fn resume(&self, order_id: Uuid) -> Result<production_order::Model, ServiceError> {
        let db = &*self.db;
        let order = self.get_order(order_id).await?;
        if order.status != OrderStatus::Hold {
            return Err(ServiceError::Conflict(format!(
                "Order {} is not on hold (status {})",
                order.order_number, order.status
            )));
        }

        let mut active: production_order::ActiveModel = order.into();
        active.status = Set(OrderStatus::InProgress);
        active.hold_reason = Set(None);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(ServiceError::db)?;

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderResumed {
                    order_id: updated.id,
                })
                .await;
        }

        Ok(updated)
    }

    /// Explicitly completes an order, consuming all outstanding BOM lines
    /// first.
    ///
    /// When every outstanding line fails the order is left untouched and the
    /// aggregated failures are returned as the error. When only some lines
    /// fail, the order still completes and the failures are reported in the
    /// result. Re-invocation is a no-op on inventory thanks to the derived
    /// idempotency keys.
    #[instrument(skip(self))]
    pub async fn complete_order(
        &self,
        order_id: Uuid,
        quantity_completed: Option<Decimal>,
    ) -> Result<CompletionResult, ServiceError> {
        if let Some(qty) = quantity_completed {
            if qty < Decimal::ZERO {
                return Err(ServiceError::Validation(format!(
                    "Completed quantity cannot be negative, got {}",
                    qty
                )));
            }
        }

        let db = &*self.db;
        let order = self.get_order(order_id).await?;
        if order.status != OrderStatus::Complete
            && !order.status.can_transition_to(&OrderStatus::Complete)
        {
            return Err(ServiceError::Conflict(format!(
                "Order {} cannot complete from status {}",
                order.order_number, order.status
            )));
        }

        let outcome = self.consumption.consume_all_outstanding(order_id).await?;
        if outcome.all_failed() {
            warn!(order_id = %order_id, failed = outcome.failed.len(), "completion aborted");
            return Err(ServiceError::ConsumptionFailed {
                failures: outcome.failed,
            });
        }

        let order = self.get_order(order_id).await?;
        if order.status == OrderStatus::Complete {
            return Ok(CompletionResult {
                order,
                failures: outcome.failed,
            });
        }

        let old_status = order.status.clone();
        let quantity_ordered = order.quantity_ordered;
        let existing_completed = order.quantity_completed;
        let mut active: production_order::ActiveModel = order.into();
        let now = Utc::now();
        active.status = Set(OrderStatus::Complete);
        active.actual_end = Set(Some(now));
        active.quantity_completed = Set(Some(
            quantity_completed
                .or(existing_completed)
                .unwrap_or(quantity_ordered),
        ));
        active.updated_at = Set(now);
        let updated = active.update(db).await.map_err(ServiceError::db)?;

        counter!("shopfloor.orders.completed", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::OrderStatusChanged {
                    order_id: updated.id,
                    old_status: old_status.to_string(),
                    new_status: updated.status.to_string(),
                })
                .await;
            sender
                .send_or_log(Event::OrderCompleted {
                    order_id: updated.id,
                    quantity_completed: updated
                        .quantity_completed
                        .unwrap_or(updated.quantity_ordered),
                })
                .await;
        }

        info!(order_id = %updated.id, "order completed");
        Ok(CompletionResult {
            order: updated,
            failures: outcome.failed,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<production_order::Model, ServiceError> {
        ProductionOrder::find_by_id(order_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
    }

    #[instrument(skip(self))]
    pub async fn steps_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<production_step::Model>, ServiceError> {
        ProductionStep::find()
            .filter(production_step::Column::OrderId.eq(order_id))
            .order_by_asc(production_step::Column::SequenceNumber)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db)
    }

    /// Lists orders, optionally filtered by status, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<production_order::Model>, u64), ServiceError> {
        let db = &*self.db;
        let mut query = ProductionOrder::find();
        if let Some(status) = status {
            query = query.filter(production_order::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(production_order::Column::CreatedAt)
            .paginate(db, limit.max(1));

        let total = paginator.num_items().await.map_err(ServiceError::db)?;
        let orders = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::db)?;

        Ok((orders, total))
    }

    async fn get_step(&self, step_id: Uuid) -> Result<production_step::Model, ServiceError> {
        ProductionStep::find_by_id(step_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Step {} not found", step_id)))
    }
}
