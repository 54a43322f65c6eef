use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::{
    location::{self, Entity as Location},
    part::{self, Entity as Part},
    work_center::{self, Entity as WorkCenter},
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Validate)]
pub struct CreatePart {
    #[validate(length(min = 1))]
    pub part_number: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub unit_of_measure: String,
    pub standard_cost: Option<Decimal>,
    pub is_serialized: bool,
}

#[derive(Debug, Clone, Validate)]
pub struct CreateLocation {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub name: String,
}

#[derive(Debug, Clone, Validate)]
pub struct CreateWorkCenter {
    #[validate(length(min = 1))]
    pub code: String,
    #[validate(length(min = 1))]
    pub name: String,
}

/// Minimal master-data surface the core validates references against.
/// Full master-data management lives outside this system.
#[derive(Clone)]
pub struct MasterDataService {
    db: Arc<DbPool>,
}

impl MasterDataService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(part_number = %input.part_number))]
    pub async fn create_part(&self, input: CreatePart) -> Result<part::Model, ServiceError> {
        input.validate()?;
        if let Some(cost) = input.standard_cost {
            if cost < Decimal::ZERO {
                return Err(ServiceError::Validation(format!(
                    "Standard cost cannot be negative, got {}",
                    cost
                )));
            }
        }

        let now = Utc::now();
        part::ActiveModel {
            id: Set(Uuid::new_v4()),
            part_number: Set(input.part_number),
            description: Set(input.description),
            unit_of_measure: Set(input.unit_of_measure),
            standard_cost: Set(input.standard_cost),
            is_serialized: Set(input.is_serialized),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db)
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_location(
        &self,
        input: CreateLocation,
    ) -> Result<location::Model, ServiceError> {
        input.validate()?;

        location::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(input.code),
            name: Set(input.name),
            is_active: Set(true),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db)
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_work_center(
        &self,
        input: CreateWorkCenter,
    ) -> Result<work_center::Model, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        work_center::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(input.code),
            name: Set(input.name),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await
        .map_err(ServiceError::db)
    }

    /// Flips a work center's active flag. Inactive work centers remain
    /// schedulable; the conflict detector only warns about them.
    #[instrument(skip(self))]
    pub async fn set_work_center_active(
        &self,
        work_center_id: Uuid,
        is_active: bool,
    ) -> Result<work_center::Model, ServiceError> {
        let work_center = self.get_work_center(work_center_id).await?;

        let mut active: work_center::ActiveModel = work_center.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await.map_err(ServiceError::db)
    }

    #[instrument(skip(self))]
    pub async fn get_part(&self, part_id: Uuid) -> Result<part::Model, ServiceError> {
        Part::find_by_id(part_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Part {} not found", part_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_location(&self, location_id: Uuid) -> Result<location::Model, ServiceError> {
        Location::find_by_id(location_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| ServiceError::NotFound(format!("Location {} not found", location_id)))
    }

    #[instrument(skip(self))]
    pub async fn get_work_center(
        &self,
        work_center_id: Uuid,
    ) -> Result<work_center::Model, ServiceError> {
        WorkCenter::find_by_id(work_center_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Work center {} not found", work_center_id))
            })
    }
}
