use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Production order lifecycle states. Transitions not listed in
/// [`OrderStatus::can_transition_to`] are rejected centrally by the order
/// service.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "queued")]
    Queued,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "hold")]
    Hold,
    #[sea_orm(string_value = "complete")]
    Complete,
}

impl OrderStatus {
    /// Legal transition table. Hold is sticky: the only way out is an
    /// explicit resume back to in_progress.
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Queued, InProgress)
                | (Queued, Hold)
                | (Queued, Complete)
                | (InProgress, Hold)
                | (InProgress, Complete)
                | (Hold, InProgress)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Complete)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable number obtained from the external numbering generator
    /// exactly once, at creation.
    pub order_number: String,
    pub part_id: Uuid,
    pub status: OrderStatus,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity_ordered: Decimal,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity_completed: Option<Decimal>,
    /// Set only while status is hold.
    pub hold_reason: Option<String>,
    pub actual_start: Option<DateTime<Utc>>,
    pub actual_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::part::Entity",
        from = "Column::PartId",
        to = "super::part::Column::Id"
    )]
    Part,
    #[sea_orm(has_many = "super::production_step::Entity")]
    Steps,
    #[sea_orm(has_many = "super::bom_line::Entity")]
    BomLines,
    #[sea_orm(has_many = "super::ledger_entry::Entity")]
    LedgerEntries,
}

impl Related<super::part::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Part.def()
    }
}

impl Related<super::production_step::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Steps.def()
    }
}

impl Related<super::bom_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BomLines.def()
    }
}

impl Related<super::ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use rstest::rstest;

    #[rstest]
    #[case(Queued, InProgress, true)]
    #[case(Queued, Hold, true)]
    #[case(Queued, Complete, true)]
    #[case(InProgress, Hold, true)]
    #[case(InProgress, Complete, true)]
    #[case(Hold, InProgress, true)]
    #[case(Hold, Complete, false)]
    #[case(Hold, Queued, false)]
    #[case(Complete, InProgress, false)]
    #[case(Complete, Queued, false)]
    #[case(InProgress, Queued, false)]
    fn transition_table(
        #[case] from: super::OrderStatus,
        #[case] to: super::OrderStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }
}
