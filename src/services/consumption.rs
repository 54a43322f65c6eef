use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    bom_line::{self, Entity as BomLine},
    ledger_entry::{self, Entity as LedgerEntry},
    part::{self, Entity as Part},
    production_order::Entity as ProductionOrder,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::bom::BomService;
use crate::services::inventory::InventoryService;
use crate::services::serialized_units::SerializedUnitService;

/// Input for a single material consumption.
#[derive(Debug, Clone)]
pub struct ConsumeMaterial {
    pub order_id: Uuid,
    pub part_id: Uuid,
    pub qty: Decimal,
    pub location_id: Uuid,
    pub step_id: Option<Uuid>,
    pub bom_line_id: Option<Uuid>,
    pub serialized_unit_id: Option<Uuid>,
    pub idempotency_key: Option<String>,
    pub unit_cost: Option<Decimal>,
}

impl ConsumeMaterial {
    pub fn new(order_id: Uuid, part_id: Uuid, qty: Decimal, location_id: Uuid) -> Self {
        Self {
            order_id,
            part_id,
            qty,
            location_id,
            step_id: None,
            bom_line_id: None,
            serialized_unit_id: None,
            idempotency_key: None,
            unit_cost: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineSuccess {
    pub bom_line_id: Uuid,
    pub ledger_entry_id: Uuid,
    pub qty: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineFailure {
    pub bom_line_id: Uuid,
    pub part_id: Uuid,
    pub error: String,
}

/// Success/failure split returned by `consume_all_outstanding`. Per-line
/// failures never fail the batch call itself.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsumeAllOutcome {
    pub succeeded: Vec<LineSuccess>,
    pub failed: Vec<LineFailure>,
}

impl ConsumeAllOutcome {
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

/// Append-only material consumption ledger.
///
/// The only production-driven caller of the balance store, the unit tracker
/// and the BOM aggregates. Every `consume`/`reverse` call mutates all of
/// them in one transaction: an entry is never observable without its
/// balance, unit and BOM effects.
#[derive(Clone)]
pub struct ConsumptionService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl ConsumptionService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Records a material consumption against an order.
    ///
    /// When `idempotency_key` is supplied and a non-reversal entry with that
    /// key already exists, the existing entry is returned unchanged and no
    /// state is touched (at-most-once).
    #[instrument(skip(self, input), fields(order_id = %input.order_id, part_id = %input.part_id))]
    pub async fn consume(
        &self,
        input: ConsumeMaterial,
    ) -> Result<ledger_entry::Model, ServiceError> {
        if input.serialized_unit_id.is_none() && input.qty <= Decimal::ZERO {
            return Err(ServiceError::Validation(format!(
                "Consumption quantity must be positive, got {}",
                input.qty
            )));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db)?;

        if let Some(key) = &input.idempotency_key {
            if let Some(existing) = Self::find_by_idempotency_key(&txn, key).await? {
                info!(entry_id = %existing.id, key = %key, "idempotent replay");
                counter!("shopfloor.ledger.replays", 1);
                return Ok(existing);
            }
        }

        ProductionOrder::find_by_id(input.order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", input.order_id)))?;
        let part = Part::find_by_id(input.part_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", input.part_id)))?;

        if let Some(bom_line_id) = input.bom_line_id {
            let line = BomLine::find_by_id(bom_line_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db)?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("BOM line {} not found", bom_line_id))
                })?;
            if line.order_id != input.order_id {
                return Err(ServiceError::Validation(format!(
                    "BOM line {} does not belong to order {}",
                    bom_line_id, input.order_id
                )));
            }
        }

        let (qty, unit_cost) =
            Self::take_stock(&txn, &input, &part).await?;

        if let Some(bom_line_id) = input.bom_line_id {
            BomService::apply_consumption(&txn, bom_line_id, qty).await?;
        }

        let now = Utc::now();
        let entry = ledger_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(input.order_id),
            part_id: Set(input.part_id),
            qty: Set(qty),
            is_reversal: Set(false),
            reversal_of_id: Set(None),
            idempotency_key: Set(input.idempotency_key.clone()),
            step_id: Set(input.step_id),
            bom_line_id: Set(input.bom_line_id),
            serialized_unit_id: Set(input.serialized_unit_id),
            location_id: Set(input.location_id),
            unit_cost: Set(unit_cost),
            reason: Set(None),
            consumed_at: Set(now),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db)?;

        txn.commit().await.map_err(ServiceError::db)?;

        counter!("shopfloor.ledger.consumptions", 1);
        histogram!(
            "shopfloor.ledger.consumed_qty",
            qty.to_f64().unwrap_or(0.0)
        );
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::MaterialConsumed {
                    entry_id: entry.id,
                    order_id: entry.order_id,
                    part_id: entry.part_id,
                    location_id: entry.location_id,
                    qty: entry.qty,
                })
                .await;
        }

        info!(entry_id = %entry.id, %qty, "material consumed");
        Ok(entry)
    }

    /// Reverses a prior consumption by appending a negating entry.
    ///
    /// Reversing an already-reversed entry returns the existing reversal
    /// (idempotent no-op). The original entry is never modified.
    #[instrument(skip(self))]
    pub async fn reverse(
        &self,
        ledger_entry_id: Uuid,
        reason: &str,
    ) -> Result<ledger_entry::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db)?;

        if let Some(existing) = LedgerEntry::find()
            .filter(ledger_entry::Column::ReversalOfId.eq(ledger_entry_id))
            .one(&txn)
            .await
            .map_err(ServiceError::db)?
        {
            info!(reversal_id = %existing.id, "reversal replay");
            counter!("shopfloor.ledger.replays", 1);
            return Ok(existing);
        }

        let original = LedgerEntry::find_by_id(ledger_entry_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Ledger entry {} not found", ledger_entry_id))
            })?;
        if original.is_reversal {
            return Err(ServiceError::Validation(format!(
                "Ledger entry {} is itself a reversal and cannot be reversed",
                ledger_entry_id
            )));
        }

        InventoryService::apply_adjustment(
            &txn,
            original.part_id,
            original.location_id,
            original.qty,
            None,
        )
        .await?;

        if let Some(unit_id) = original.serialized_unit_id {
            SerializedUnitService::restore(&txn, unit_id, original.location_id).await?;
        }

        if let Some(bom_line_id) = original.bom_line_id {
            BomService::apply_reversal(&txn, bom_line_id, original.qty).await?;
        }

        let now = Utc::now();
        let reversal = ledger_entry::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(original.order_id),
            part_id: Set(original.part_id),
            qty: Set(-original.qty),
            is_reversal: Set(true),
            reversal_of_id: Set(Some(original.id)),
            idempotency_key: Set(None),
            step_id: Set(original.step_id),
            bom_line_id: Set(original.bom_line_id),
            serialized_unit_id: Set(original.serialized_unit_id),
            location_id: Set(original.location_id),
            unit_cost: Set(original.unit_cost),
            reason: Set(Some(reason.to_string())),
            consumed_at: Set(now),
            created_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db)?;

        txn.commit().await.map_err(ServiceError::db)?;

        counter!("shopfloor.ledger.reversals", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ConsumptionReversed {
                    reversal_id: reversal.id,
                    original_id: original.id,
                    order_id: reversal.order_id,
                })
                .await;
        }

        info!(reversal_id = %reversal.id, original_id = %original.id, "consumption reversed");
        Ok(reversal)
    }

    /// Consumes the outstanding quantity of every open BOM line of an order.
    ///
    /// Each line is consumed with a deterministic idempotency key derived
    /// from (order, line), so repeated invocations never double-consume.
    /// Per-line failures are collected, never raised.
    #[instrument(skip(self))]
    pub async fn consume_all_outstanding(
        &self,
        order_id: Uuid,
    ) -> Result<ConsumeAllOutcome, ServiceError> {
        let db = &*self.db;
        ProductionOrder::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let open_lines = BomLine::find()
            .filter(bom_line::Column::OrderId.eq(order_id))
            .filter(bom_line::Column::IsConsumed.eq(false))
            .order_by_asc(bom_line::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::db)?;

        let mut outcome = ConsumeAllOutcome::default();
        for line in open_lines {
            let outstanding = line.outstanding();
            if outstanding <= Decimal::ZERO {
                outcome.failed.push(LineFailure {
                    bom_line_id: line.id,
                    part_id: line.part_id,
                    error: format!("Nothing outstanding to consume ({})", outstanding),
                });
                continue;
            }
            let Some(source_location_id) = line.source_location_id else {
                outcome.failed.push(LineFailure {
                    bom_line_id: line.id,
                    part_id: line.part_id,
                    error: "BOM line has no source location".to_string(),
                });
                continue;
            };

            let mut input =
                ConsumeMaterial::new(order_id, line.part_id, outstanding, source_location_id);
            input.bom_line_id = Some(line.id);
            input.idempotency_key = Some(Self::line_idempotency_key(order_id, line.id));

            match self.consume(input).await {
                Ok(entry) => outcome.succeeded.push(LineSuccess {
                    bom_line_id: line.id,
                    ledger_entry_id: entry.id,
                    qty: outstanding,
                }),
                Err(e) => {
                    warn!(bom_line_id = %line.id, error = %e, "BOM line consumption failed");
                    outcome.failed.push(LineFailure {
                        bom_line_id: line.id,
                        part_id: line.part_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Ledger history for an order, oldest first. This is the durable record
    /// downstream analytics read.
    #[instrument(skip(self))]
    pub async fn entries_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<ledger_entry::Model>, ServiceError> {
        LedgerEntry::find()
            .filter(ledger_entry::Column::OrderId.eq(order_id))
            .order_by_asc(ledger_entry::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db)
    }

    /// Deterministic idempotency key for system-driven BOM line consumption.
    pub fn line_idempotency_key(order_id: Uuid, bom_line_id: Uuid) -> String {
        format!("wo-consume:{}:{}", order_id, bom_line_id)
    }

    async fn find_by_idempotency_key(
        txn: &DatabaseTransaction,
        key: &str,
    ) -> Result<Option<ledger_entry::Model>, ServiceError> {
        LedgerEntry::find()
            .filter(ledger_entry::Column::IdempotencyKey.eq(key))
            .filter(ledger_entry::Column::IsReversal.eq(false))
            .one(txn)
            .await
            .map_err(ServiceError::db)
    }

    /// Takes stock for the consumption: either the serialized unit (forcing
    /// quantity to one) or the fungible balance. Returns the effective
    /// quantity and the resolved unit cost.
    async fn take_stock(
        txn: &DatabaseTransaction,
        input: &ConsumeMaterial,
        part: &part::Model,
    ) -> Result<(Decimal, Option<Decimal>), ServiceError> {
        match input.serialized_unit_id {
            Some(unit_id) => {
                SerializedUnitService::mark_consumed(
                    txn,
                    unit_id,
                    input.part_id,
                    input.location_id,
                )
                .await?;
                InventoryService::apply_adjustment(
                    txn,
                    input.part_id,
                    input.location_id,
                    -Decimal::ONE,
                    None,
                )
                .await?;
                Ok((Decimal::ONE, input.unit_cost.or(part.standard_cost)))
            }
            None => {
                let balance = InventoryService::apply_adjustment(
                    txn,
                    input.part_id,
                    input.location_id,
                    -input.qty,
                    None,
                )
                .await?;
                Ok((
                    input.qty,
                    input.unit_cost.or(balance.unit_cost).or(part.standard_cost),
                ))
            }
        }
    }
}
