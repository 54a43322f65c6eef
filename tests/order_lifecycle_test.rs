//! Integration tests for the order/step lifecycle state machine: status
//! aggregation, sticky hold, and the step transition rules.

mod common;

use common::{dec, seed_part, setup};
use shopfloor_api::entities::production_order::OrderStatus;
use shopfloor_api::entities::production_step::StepStatus;
use shopfloor_api::errors::ServiceError;
use shopfloor_api::services::orders::CreateOrder;

#[tokio::test]
async fn order_aggregates_step_statuses() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-100").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(10),
            steps: vec!["cut".into(), "weld".into(), "paint".into()],
        })
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Queued);

    let steps = services.orders.steps_for_order(order.id).await.unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(
        steps.iter().map(|s| s.sequence_number).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );

    // First step starts: order moves to in_progress and actual_start is set.
    let outcome = services
        .orders
        .transition_step(steps[0].id, StepStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::InProgress);
    assert!(outcome.order.actual_start.is_some());
    assert!(outcome.step.started_at.is_some());

    // Two settled, one in progress: still in_progress.
    services
        .orders
        .transition_step(steps[0].id, StepStatus::Complete)
        .await
        .unwrap();
    services
        .orders
        .transition_step(steps[1].id, StepStatus::InProgress)
        .await
        .unwrap();
    services
        .orders
        .transition_step(steps[1].id, StepStatus::Complete)
        .await
        .unwrap();
    services
        .orders
        .transition_step(steps[2].id, StepStatus::InProgress)
        .await
        .unwrap();
    let order = services.orders.get_order(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::InProgress);
    assert!(order.actual_end.is_none());

    // Last step settles: order completes with actual_end and quantity.
    let outcome = services
        .orders
        .transition_step(steps[2].id, StepStatus::Complete)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Complete);
    assert!(outcome.order.actual_end.is_some());
    assert_eq!(outcome.order.quantity_completed, Some(dec(10)));
    assert!(outcome.step.completed_at.is_some());
    assert!(outcome.step.actual_minutes.is_some());
}

#[tokio::test]
async fn skipping_every_step_completes_the_order() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-110").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(2),
            steps: vec!["inspect".into(), "pack".into()],
        })
        .await
        .unwrap();
    let steps = services.orders.steps_for_order(order.id).await.unwrap();

    // Skipped from pending: no start, no duration.
    let outcome = services
        .orders
        .transition_step(steps[0].id, StepStatus::Skipped)
        .await
        .unwrap();
    assert_eq!(outcome.step.started_at, None);
    assert_eq!(outcome.step.actual_minutes, None);
    assert_eq!(outcome.order.status, OrderStatus::Queued);

    let outcome = services
        .orders
        .transition_step(steps[1].id, StepStatus::Skipped)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Complete);
}

#[tokio::test]
async fn hold_is_sticky_until_explicit_resume() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-200").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(5),
            steps: vec!["machine".into()],
        })
        .await
        .unwrap();
    let steps = services.orders.steps_for_order(order.id).await.unwrap();

    services
        .orders
        .transition_step(steps[0].id, StepStatus::InProgress)
        .await
        .unwrap();
    let held = services
        .orders
        .put_on_hold(order.id, "material quarantine")
        .await
        .unwrap();
    assert_eq!(held.status, OrderStatus::Hold);
    assert_eq!(held.hold_reason.as_deref(), Some("material quarantine"));

    // Step completion while on hold must not auto-transition the order.
    let outcome = services
        .orders
        .transition_step(steps[0].id, StepStatus::Complete)
        .await
        .unwrap();
    assert_eq!(outcome.order.status, OrderStatus::Hold);
    assert!(outcome.consumption.is_none());

    let resumed = services.orders.resume(order.id).await.unwrap();
    assert_eq!(resumed.status, OrderStatus::InProgress);
    assert_eq!(resumed.hold_reason, None);

    // Explicit completion finishes the order.
    let result = services.orders.complete_order(order.id, None).await.unwrap();
    assert_eq!(result.order.status, OrderStatus::Complete);
    assert!(result.order.actual_end.is_some());
}

#[tokio::test]
async fn transitions_out_of_terminal_steps_are_rejected() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-300").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec!["lap".into(), "test".into()],
        })
        .await
        .unwrap();
    let steps = services.orders.steps_for_order(order.id).await.unwrap();

    services
        .orders
        .transition_step(steps[0].id, StepStatus::InProgress)
        .await
        .unwrap();
    services
        .orders
        .transition_step(steps[0].id, StepStatus::Complete)
        .await
        .unwrap();

    let reopen = services
        .orders
        .transition_step(steps[0].id, StepStatus::InProgress)
        .await;
    assert!(matches!(reopen, Err(ServiceError::Conflict(_))));

    services
        .orders
        .transition_step(steps[1].id, StepStatus::Skipped)
        .await
        .unwrap();
    let unskip = services
        .orders
        .transition_step(steps[1].id, StepStatus::Complete)
        .await;
    assert!(matches!(unskip, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn pending_to_complete_is_not_a_legal_shortcut() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-310").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec!["polish".into()],
        })
        .await
        .unwrap();
    let steps = services.orders.steps_for_order(order.id).await.unwrap();

    let result = services
        .orders
        .transition_step(steps[0].id, StepStatus::Complete)
        .await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn remove_step_renumbers_and_guards_started_steps() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-400").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec!["a".into(), "b".into(), "c".into()],
        })
        .await
        .unwrap();
    let steps = services.orders.steps_for_order(order.id).await.unwrap();

    services.orders.remove_step(steps[0].id).await.unwrap();
    let remaining = services.orders.steps_for_order(order.id).await.unwrap();
    assert_eq!(
        remaining
            .iter()
            .map(|s| (s.name.as_str(), s.sequence_number))
            .collect::<Vec<_>>(),
        vec![("b", 1), ("c", 2)]
    );

    services
        .orders
        .transition_step(remaining[0].id, StepStatus::InProgress)
        .await
        .unwrap();
    let result = services.orders.remove_step(remaining[0].id).await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn add_step_appends_to_the_routing() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-500").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec!["drill".into()],
        })
        .await
        .unwrap();

    let added = services.orders.add_step(order.id, "deburr").await.unwrap();
    assert_eq!(added.sequence_number, 2);
    assert_eq!(added.status, StepStatus::Pending);

    // Completed orders accept no further routing changes.
    services.orders.complete_order(order.id, None).await.unwrap();
    let result = services.orders.add_step(order.id, "late step").await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn resume_requires_hold_and_hold_requires_live_order() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-600").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let result = services.orders.resume(order.id).await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));

    services.orders.complete_order(order.id, None).await.unwrap();
    let result = services.orders.put_on_hold(order.id, "too late").await;
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
}

#[tokio::test]
async fn completed_order_cannot_be_completed_with_different_quantity() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "ASM-700").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(8),
            steps: vec![],
        })
        .await
        .unwrap();

    let first = services
        .orders
        .complete_order(order.id, Some(dec(7)))
        .await
        .unwrap();
    assert_eq!(first.order.quantity_completed, Some(dec(7)));

    // Re-completion is an inventory no-op and keeps the recorded quantity.
    let second = services
        .orders
        .complete_order(order.id, Some(dec(3)))
        .await
        .unwrap();
    assert_eq!(second.order.quantity_completed, Some(dec(7)));
}
