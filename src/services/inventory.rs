use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    QueryFilter, QuerySelect, TransactionTrait,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    inventory_balance::{self, Entity as InventoryBalance},
    location::Entity as Location,
    part::Entity as Part,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Canonical inventory balance store.
///
/// `apply_adjustment` is the single mutation point for on-hand quantities.
/// Every subsystem that touches inventory (production consumption, reversal,
/// manual receipt, transfer) funnels through it, so the balance never drifts
/// from the ledger's intent.
#[derive(Clone)]
pub struct InventoryService {
    db: Arc<DbPool>,
    event_sender: Option<EventSender>,
}

impl InventoryService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Applies a signed quantity delta to the (part, location) balance row
    /// inside the caller's transaction.
    ///
    /// Locks the row (FOR UPDATE on Postgres; SQLite serializes writers),
    /// creates it at zero when absent, and rejects any adjustment that would
    /// take the balance below zero. The resulting quantity is never clamped.
    pub async fn apply_adjustment<C>(
        conn: &C,
        part_id: Uuid,
        location_id: Uuid,
        delta: Decimal,
        unit_cost: Option<Decimal>,
    ) -> Result<inventory_balance::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut query = InventoryBalance::find()
            .filter(inventory_balance::Column::PartId.eq(part_id))
            .filter(inventory_balance::Column::LocationId.eq(location_id));
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        let existing = query.one(conn).await.map_err(ServiceError::db)?;

        let now = Utc::now();
        match existing {
            Some(balance) => {
                let new_quantity = balance.quantity_on_hand + delta;
                if new_quantity < Decimal::ZERO {
                    let required = -delta;
                    warn!(
                        %part_id, %location_id,
                        available = %balance.quantity_on_hand,
                        %required,
                        "rejecting adjustment below zero"
                    );
                    return Err(ServiceError::InsufficientResource {
                        available: balance.quantity_on_hand,
                        required,
                    });
                }

                let mut active: inventory_balance::ActiveModel = balance.into();
                active.quantity_on_hand = Set(new_quantity);
                if let Some(cost) = unit_cost {
                    active.unit_cost = Set(Some(cost));
                }
                active.updated_at = Set(now);
                active.update(conn).await.map_err(ServiceError::db)
            }
            None => {
                if delta < Decimal::ZERO {
                    return Err(ServiceError::InsufficientResource {
                        available: Decimal::ZERO,
                        required: -delta,
                    });
                }

                inventory_balance::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    part_id: Set(part_id),
                    location_id: Set(location_id),
                    quantity_on_hand: Set(delta),
                    unit_cost: Set(unit_cost),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(conn)
                .await
                .map_err(ServiceError::db)
            }
        }
    }

    /// Receives stock into a location (manual pickup / goods receipt).
    #[instrument(skip(self))]
    pub async fn receive(
        &self,
        part_id: Uuid,
        location_id: Uuid,
        qty: Decimal,
        unit_cost: Option<Decimal>,
    ) -> Result<inventory_balance::Model, ServiceError> {
        if qty <= Decimal::ZERO {
            return Err(ServiceError::Validation(format!(
                "Receipt quantity must be positive, got {}",
                qty
            )));
        }

        let db = &*self.db;
        let part = Part::find_by_id(part_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;
        if !part.is_active {
            return Err(ServiceError::Validation(format!(
                "Part {} is inactive",
                part.part_number
            )));
        }
        Location::find_by_id(location_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {} not found", location_id)))?;

        let txn = db.begin().await.map_err(ServiceError::db)?;
        let balance =
            Self::apply_adjustment(&txn, part_id, location_id, qty, unit_cost).await?;
        txn.commit().await.map_err(ServiceError::db)?;

        counter!("shopfloor.inventory.receipts", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::InventoryAdjusted {
                    part_id,
                    location_id,
                    delta: qty,
                    new_quantity: balance.quantity_on_hand,
                })
                .await;
        }

        info!(%part_id, %location_id, %qty, "stock received");
        Ok(balance)
    }

    /// Moves stock between two locations, conserving the total on hand.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        part_id: Uuid,
        from_location_id: Uuid,
        to_location_id: Uuid,
        qty: Decimal,
    ) -> Result<(), ServiceError> {
        if qty <= Decimal::ZERO {
            return Err(ServiceError::Validation(format!(
                "Transfer quantity must be positive, got {}",
                qty
            )));
        }
        if from_location_id == to_location_id {
            return Err(ServiceError::Validation(
                "Transfer source and destination are the same location".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::db)?;
        let source =
            Self::apply_adjustment(&txn, part_id, from_location_id, -qty, None).await?;
        Self::apply_adjustment(&txn, part_id, to_location_id, qty, source.unit_cost).await?;
        txn.commit().await.map_err(ServiceError::db)?;

        counter!("shopfloor.inventory.transfers", 1);
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::InventoryTransferred {
                    part_id,
                    from_location_id,
                    to_location_id,
                    qty,
                })
                .await;
        }

        Ok(())
    }

    /// Returns the balance row for a (part, location) pair, if any.
    #[instrument(skip(self))]
    pub async fn balance(
        &self,
        part_id: Uuid,
        location_id: Uuid,
    ) -> Result<Option<inventory_balance::Model>, ServiceError> {
        InventoryBalance::find()
            .filter(inventory_balance::Column::PartId.eq(part_id))
            .filter(inventory_balance::Column::LocationId.eq(location_id))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)
    }

    /// On-hand quantity, zero when no balance row exists.
    pub async fn on_hand(
        &self,
        part_id: Uuid,
        location_id: Uuid,
    ) -> Result<Decimal, ServiceError> {
        Ok(self
            .balance(part_id, location_id)
            .await?
            .map(|b| b.quantity_on_hand)
            .unwrap_or(Decimal::ZERO))
    }

    /// All balance rows for a part across locations.
    #[instrument(skip(self))]
    pub async fn balances_for_part(
        &self,
        part_id: Uuid,
    ) -> Result<Vec<inventory_balance::Model>, ServiceError> {
        InventoryBalance::find()
            .filter(inventory_balance::Column::PartId.eq(part_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db)
    }
}
