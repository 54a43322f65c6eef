use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder,
};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    bom_line::{self, Entity as BomLine},
    part::Entity as Part,
    production_order::Entity as ProductionOrder,
};
use crate::errors::ServiceError;

/// Per-part rollup of required and consumed quantities for one order.
#[derive(Debug, Clone, Serialize)]
pub struct PartAllocation {
    pub part_id: Uuid,
    pub quantity_required: Decimal,
    pub quantity_consumed: Decimal,
    pub outstanding: Decimal,
}

/// Maintains the per-order material requirements and their consumption
/// aggregates. The aggregates are updated only by the consumption ledger,
/// inside the ledger's transaction.
#[derive(Clone)]
pub struct BomService {
    db: Arc<DbPool>,
}

impl BomService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Attaches a material requirement to an order.
    #[instrument(skip(self))]
    pub async fn add_line(
        &self,
        order_id: Uuid,
        part_id: Uuid,
        quantity_required: Decimal,
        source_location_id: Option<Uuid>,
    ) -> Result<bom_line::Model, ServiceError> {
        if quantity_required <= Decimal::ZERO {
            return Err(ServiceError::Validation(format!(
                "Required quantity must be positive, got {}",
                quantity_required
            )));
        }

        let db = &*self.db;
        let order = ProductionOrder::find_by_id(order_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        if order.status.is_terminal() {
            return Err(ServiceError::Conflict(format!(
                "Order {} is complete; BOM lines can no longer be added",
                order.order_number
            )));
        }
        Part::find_by_id(part_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;

        let now = Utc::now();
        bom_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id),
            part_id: Set(part_id),
            quantity_required: Set(quantity_required),
            quantity_consumed: Set(Decimal::ZERO),
            is_consumed: Set(false),
            source_location_id: Set(source_location_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db)
    }

    #[instrument(skip(self))]
    pub async fn lines_for_order(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<bom_line::Model>, ServiceError> {
        BomLine::find()
            .filter(bom_line::Column::OrderId.eq(order_id))
            .order_by_asc(bom_line::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db)
    }

    /// Rolls the order's lines up per part.
    #[instrument(skip(self))]
    pub async fn allocation_summary(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<PartAllocation>, ServiceError> {
        let lines = self.lines_for_order(order_id).await?;

        let mut by_part: BTreeMap<Uuid, PartAllocation> = BTreeMap::new();
        for line in lines {
            let entry = by_part.entry(line.part_id).or_insert(PartAllocation {
                part_id: line.part_id,
                quantity_required: Decimal::ZERO,
                quantity_consumed: Decimal::ZERO,
                outstanding: Decimal::ZERO,
            });
            entry.quantity_required += line.quantity_required;
            entry.quantity_consumed += line.quantity_consumed;
        }
        let mut summary: Vec<PartAllocation> = by_part.into_values().collect();
        for allocation in &mut summary {
            allocation.outstanding = allocation.quantity_required - allocation.quantity_consumed;
        }

        Ok(summary)
    }

    /// Records consumption against a line inside the ledger's transaction.
    /// `quantity_consumed` only ever grows here.
    pub(crate) async fn apply_consumption<C>(
        conn: &C,
        bom_line_id: Uuid,
        qty: Decimal,
    ) -> Result<bom_line::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let line = Self::find_line(conn, bom_line_id).await?;

        let new_consumed = line.quantity_consumed + qty;
        let is_consumed = new_consumed >= line.quantity_required;

        let mut active: bom_line::ActiveModel = line.into();
        active.quantity_consumed = Set(new_consumed);
        active.is_consumed = Set(is_consumed);
        active.updated_at = Set(Utc::now());
        active.update(conn).await.map_err(ServiceError::db)
    }

    /// Backs consumption out of a line inside the ledger's transaction,
    /// flooring the aggregate at zero and reopening the line.
    pub(crate) async fn apply_reversal<C>(
        conn: &C,
        bom_line_id: Uuid,
        qty: Decimal,
    ) -> Result<bom_line::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let line = Self::find_line(conn, bom_line_id).await?;

        let new_consumed = (line.quantity_consumed - qty).max(Decimal::ZERO);

        let mut active: bom_line::ActiveModel = line.into();
        active.quantity_consumed = Set(new_consumed);
        active.is_consumed = Set(false);
        active.updated_at = Set(Utc::now());
        active.update(conn).await.map_err(ServiceError::db)
    }

    async fn find_line<C>(conn: &C, bom_line_id: Uuid) -> Result<bom_line::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        BomLine::find_by_id(bom_line_id)
            .one(conn)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("BOM line {} not found", bom_line_id)))
    }
}
