use chrono::{DateTime, Duration, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::Display;

/// Allocation run states. Completed allocations no longer occupy the work
/// center and are excluded from conflict checks.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, Display)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "snake_case")]
pub enum AllocationStatus {
    #[sea_orm(string_value = "not_started")]
    NotStarted,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "completed")]
    Completed,
}

impl AllocationStatus {
    pub fn can_transition_to(&self, next: &AllocationStatus) -> bool {
        use AllocationStatus::*;
        matches!(
            (self, next),
            (NotStarted, Running)
                | (Running, Paused)
                | (Paused, Running)
                | (Running, Completed)
                | (Paused, Completed)
        )
    }
}

/// A slice of work-center time claimed by a production order.
///
/// Soft invariant, enforced at write time only: among non-completed
/// allocations of one work center no two intervals overlap. `reorder` trusts
/// the caller and does not re-check it.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "work_center_allocations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub work_center_id: Uuid,
    pub order_id: Uuid,
    pub step_id: Option<Uuid>,
    pub scheduled_start: DateTime<Utc>,
    /// Absent end means the allocation occupies start + the configured
    /// default duration for conflict purposes.
    pub scheduled_end: Option<DateTime<Utc>>,
    /// Display ordering within the work center, not a concurrency guarantee.
    pub sequence_number: i32,
    pub status: AllocationStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Actor recorded on the last run-status change.
    pub status_changed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// End of the occupied interval for conflict checks.
    pub fn effective_end(&self, default_duration_minutes: i64) -> DateTime<Utc> {
        self.scheduled_end
            .unwrap_or(self.scheduled_start + Duration::minutes(default_duration_minutes))
    }

    pub fn occupies_work_center(&self) -> bool {
        self.status != AllocationStatus::Completed
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work_center::Entity",
        from = "Column::WorkCenterId",
        to = "super::work_center::Column::Id"
    )]
    WorkCenter,
    #[sea_orm(
        belongs_to = "super::production_order::Entity",
        from = "Column::OrderId",
        to = "super::production_order::Column::Id"
    )]
    Order,
}

impl Related<super::work_center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WorkCenter.def()
    }
}

impl Related<super::production_order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::AllocationStatus::*;
    use rstest::rstest;

    #[rstest]
    #[case(NotStarted, Running, true)]
    #[case(Running, Paused, true)]
    #[case(Paused, Running, true)]
    #[case(Running, Completed, true)]
    #[case(Paused, Completed, true)]
    #[case(NotStarted, Paused, false)]
    #[case(NotStarted, Completed, false)]
    #[case(Completed, Running, false)]
    #[case(Paused, NotStarted, false)]
    fn transition_table(
        #[case] from: super::AllocationStatus,
        #[case] to: super::AllocationStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }
}
