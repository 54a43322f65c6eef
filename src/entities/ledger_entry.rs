use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// An immutable consumption or reversal record. Entries are never updated
/// or deleted; a mistake is corrected by appending a reversal entry that
/// references the original. The net effect for an (order, part) pair is the
/// sum of its entries' signed quantities.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    pub part_id: Uuid,
    /// Signed quantity: positive for consumption, negative for reversal.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub qty: Decimal,
    pub is_reversal: bool,
    /// Set only on reversal entries, referencing the reversed original.
    pub reversal_of_id: Option<Uuid>,
    /// Unique among non-reversal entries; NULL on reversals.
    pub idempotency_key: Option<String>,
    pub step_id: Option<Uuid>,
    pub bom_line_id: Option<Uuid>,
    pub serialized_unit_id: Option<Uuid>,
    pub location_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub unit_cost: Option<Decimal>,
    /// Operator-supplied reason; present on reversals.
    pub reason: Option<String>,
    pub consumed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn is_consumption(&self) -> bool {
        !self.is_reversal
    }

    /// Extended cost of the entry, when a unit cost was resolved.
    pub fn extended_cost(&self) -> Option<Decimal> {
        self.unit_cost.map(|cost| cost * self.qty)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::production_order::Entity",
        from = "Column::OrderId",
        to = "super::production_order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::part::Entity",
        from = "Column::PartId",
        to = "super::part::Column::Id"
    )]
    Part,
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Part.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
