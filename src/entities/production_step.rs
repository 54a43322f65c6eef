use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Production step states. Complete and skipped are terminal.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum StepStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "complete")]
    Complete,
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl StepStatus {
    pub fn can_transition_to(&self, next: &StepStatus) -> bool {
        use StepStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress) | (Pending, Skipped) | (InProgress, Complete) | (InProgress, Skipped)
        )
    }

    /// A step counts toward order completion once it can no longer run.
    pub fn is_settled(&self) -> bool {
        matches!(self, StepStatus::Complete | StepStatus::Skipped)
    }
}

/// A routing step owned exclusively by its production order.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "production_steps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    /// Unique within the order; renumbered contiguously on removal.
    pub sequence_number: i32,
    pub name: String,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub actual_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::production_order::Entity",
        from = "Column::OrderId",
        to = "super::production_order::Column::Id"
    )]
    Order,
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::StepStatus::*;
    use rstest::rstest;

    #[rstest]
    #[case(Pending, InProgress, true)]
    #[case(Pending, Skipped, true)]
    #[case(Pending, Complete, false)]
    #[case(InProgress, Complete, true)]
    #[case(InProgress, Skipped, true)]
    #[case(Complete, InProgress, false)]
    #[case(Complete, Skipped, false)]
    #[case(Skipped, InProgress, false)]
    #[case(Skipped, Complete, false)]
    fn transition_table(
        #[case] from: super::StepStatus,
        #[case] to: super::StepStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn settled_states() {
        assert!(Complete.is_settled());
        assert!(Skipped.is_settled());
        assert!(!Pending.is_settled());
        assert!(!InProgress.is_settled());
    }
}
