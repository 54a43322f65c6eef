use async_trait::async_trait;
use sea_orm::{EntityTrait, PaginatorTrait};

use crate::db::DbPool;
use crate::entities::production_order::Entity as ProductionOrder;
use crate::errors::ServiceError;

/// Seam to the external human-readable order-numbering generator. Invoked
/// exactly once per order, at creation.
#[async_trait]
pub trait OrderNumberGenerator: Send + Sync {
    async fn next_number(&self, db: &DbPool) -> Result<String, ServiceError>;
}

/// Default generator: a simple per-store sequence. Orders are never deleted,
/// so the row count is a stable high-water mark.
pub struct SequentialOrderNumberGenerator {
    prefix: String,
}

impl SequentialOrderNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for SequentialOrderNumberGenerator {
    fn default() -> Self {
        Self::new("WO")
    }
}

#[async_trait]
impl OrderNumberGenerator for SequentialOrderNumberGenerator {
    async fn next_number(&self, db: &DbPool) -> Result<String, ServiceError> {
        let count = ProductionOrder::find()
            .count(db)
            .await
            .map_err(ServiceError::db)?;
        Ok(format!("{}-{:06}", self.prefix, count + 1))
    }
}
