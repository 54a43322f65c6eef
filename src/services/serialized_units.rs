use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait,
    QueryFilter, QuerySelect, TransactionTrait,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::{
    location::Entity as Location,
    part::Entity as Part,
    serialized_unit::{self, Entity as SerializedUnit, UnitStatus},
};
use crate::errors::ServiceError;
use crate::services::inventory::InventoryService;

/// Tracks individually serialized part instances.
///
/// Production-driven consumption never calls the mutators here directly;
/// the consumption ledger does, inside its own transaction, so a unit's
/// status and location always change together with the ledger entry.
#[derive(Clone)]
pub struct SerializedUnitService {
    db: Arc<DbPool>,
}

impl SerializedUnitService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Registers a new in-stock unit of a serialized part.
    #[instrument(skip(self))]
    pub async fn register(
        &self,
        part_id: Uuid,
        serial_number: &str,
        location_id: Uuid,
    ) -> Result<serialized_unit::Model, ServiceError> {
        if serial_number.trim().is_empty() {
            return Err(ServiceError::Validation(
                "Serial number cannot be empty".to_string(),
            ));
        }

        let db = &*self.db;
        let part = Part::find_by_id(part_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))?;
        if !part.is_serialized {
            return Err(ServiceError::Validation(format!(
                "Part {} is not serialized",
                part.part_number
            )));
        }
        Location::find_by_id(location_id)
            .one(db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {} not found", location_id)))?;

        // A registered unit is also one on-hand piece of its part on the
        // fungible balance.
        let txn = db.begin().await.map_err(ServiceError::db)?;
        let now = Utc::now();
        let unit = serialized_unit::ActiveModel {
            id: Set(Uuid::new_v4()),
            part_id: Set(part_id),
            serial_number: Set(serial_number.to_string()),
            status: Set(UnitStatus::InStock),
            current_location_id: Set(Some(location_id)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db)?;
        InventoryService::apply_adjustment(
            &txn,
            part_id,
            location_id,
            Decimal::ONE,
            part.standard_cost,
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db)?;

        Ok(unit)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, unit_id: Uuid) -> Result<serialized_unit::Model, ServiceError> {
        SerializedUnit::find_by_id(unit_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Serialized unit {} not found", unit_id)))
    }

    #[instrument(skip(self))]
    pub async fn units_at_location(
        &self,
        location_id: Uuid,
    ) -> Result<Vec<serialized_unit::Model>, ServiceError> {
        SerializedUnit::find()
            .filter(serialized_unit::Column::CurrentLocationId.eq(location_id))
            .all(&*self.db)
            .await
            .map_err(ServiceError::db)
    }

    /// Consumes a unit inside the caller's transaction. The unit must be in
    /// stock at the expected location and belong to the expected part.
    /// Status and location are cleared in the same statement.
    pub(crate) async fn mark_consumed<C>(
        conn: &C,
        unit_id: Uuid,
        part_id: Uuid,
        location_id: Uuid,
    ) -> Result<serialized_unit::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let unit = Self::find_locked(conn, unit_id).await?;

        if unit.part_id != part_id {
            return Err(ServiceError::Validation(format!(
                "Serialized unit {} does not belong to part {}",
                unit_id, part_id
            )));
        }
        if !unit.is_available_at(location_id) {
            warn!(
                %unit_id,
                status = %unit.status,
                location = ?unit.current_location_id,
                "serialized unit unavailable"
            );
            return Err(ServiceError::InsufficientResource {
                available: Decimal::ZERO,
                required: Decimal::ONE,
            });
        }

        let mut active: serialized_unit::ActiveModel = unit.into();
        active.status = Set(UnitStatus::Consumed);
        active.current_location_id = Set(None);
        active.updated_at = Set(Utc::now());
        active.update(conn).await.map_err(ServiceError::db)
    }

    /// Restores a consumed unit to stock at the given location, inside the
    /// caller's transaction. Status and location are restored together.
    pub(crate) async fn restore<C>(
        conn: &C,
        unit_id: Uuid,
        location_id: Uuid,
    ) -> Result<serialized_unit::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let unit = Self::find_locked(conn, unit_id).await?;

        if unit.status != UnitStatus::Consumed {
            return Err(ServiceError::Conflict(format!(
                "Serialized unit {} is not consumed (status {})",
                unit_id, unit.status
            )));
        }

        let mut active: serialized_unit::ActiveModel = unit.into();
        active.status = Set(UnitStatus::InStock);
        active.current_location_id = Set(Some(location_id));
        active.updated_at = Set(Utc::now());
        active.update(conn).await.map_err(ServiceError::db)
    }

    async fn find_locked<C>(
        conn: &C,
        unit_id: Uuid,
    ) -> Result<serialized_unit::Model, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut query =
            SerializedUnit::find().filter(serialized_unit::Column::Id.eq(unit_id));
        if conn.get_database_backend() == DbBackend::Postgres {
            query = query.lock_exclusive();
        }
        query
            .one(conn)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Serialized unit {} not found", unit_id)))
    }
}
