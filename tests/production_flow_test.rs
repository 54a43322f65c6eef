//! End-to-end production flow: order completion drives BOM consumption
//! through the ledger with deterministic idempotency keys, and the balance
//! store stays consistent across retries, transfers and partial failures.

mod common;

use common::{dec, seed_location, seed_part, setup};
use shopfloor_api::entities::production_order::OrderStatus;
use shopfloor_api::entities::production_step::StepStatus;
use shopfloor_api::errors::ServiceError;
use shopfloor_api::services::orders::CreateOrder;

#[tokio::test]
async fn complete_order_consumes_outstanding_lines_exactly_once() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "RAW-10").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(part.id, location.id, dec(15), None)
        .await
        .unwrap();

    let assembly = seed_part(&services, "FG-10").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: assembly.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();
    let line = services
        .bom
        .add_line(order.id, part.id, dec(10), Some(location.id))
        .await
        .unwrap();

    let result = services.orders.complete_order(order.id, None).await.unwrap();
    assert_eq!(result.order.status, OrderStatus::Complete);
    assert!(result.failures.is_empty());
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(5)
    );
    let lines = services.bom.lines_for_order(order.id).await.unwrap();
    assert!(lines[0].is_consumed);
    assert_eq!(lines[0].quantity_consumed, dec(10));

    // The derived key makes a second completion a no-op on inventory.
    let again = services.orders.complete_order(order.id, None).await.unwrap();
    assert_eq!(again.order.status, OrderStatus::Complete);
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(5)
    );
    let entries = services.consumption.entries_for_order(order.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].bom_line_id, Some(line.id));
}

#[tokio::test]
async fn partial_line_failure_still_completes_but_reports() {
    let (_db, services) = setup().await;
    let good = seed_part(&services, "RAW-20").await;
    let missing_source = seed_part(&services, "RAW-21").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(good.id, location.id, dec(50), None)
        .await
        .unwrap();

    let assembly = seed_part(&services, "FG-20").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: assembly.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();
    services
        .bom
        .add_line(order.id, good.id, dec(5), Some(location.id))
        .await
        .unwrap();
    let broken = services
        .bom
        .add_line(order.id, missing_source.id, dec(5), None)
        .await
        .unwrap();

    let result = services.orders.complete_order(order.id, None).await.unwrap();
    assert_eq!(result.order.status, OrderStatus::Complete);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].bom_line_id, broken.id);
    assert_eq!(
        services.inventory.on_hand(good.id, location.id).await.unwrap(),
        dec(45)
    );
}

#[tokio::test]
async fn completion_aborts_when_every_line_fails() {
    let (_db, services) = setup().await;
    let starved = seed_part(&services, "RAW-30").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(starved.id, location.id, dec(2), None)
        .await
        .unwrap();

    let assembly = seed_part(&services, "FG-30").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: assembly.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();
    services
        .bom
        .add_line(order.id, starved.id, dec(10), Some(location.id))
        .await
        .unwrap();

    let result = services.orders.complete_order(order.id, None).await;
    match result {
        Err(ServiceError::ConsumptionFailed { failures }) => {
            assert_eq!(failures.len(), 1);
        }
        other => panic!("expected ConsumptionFailed, got {:?}", other),
    }

    // Order and stock are untouched.
    let order = services.orders.get_order(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Queued);
    assert!(order.actual_end.is_none());
    assert_eq!(
        services.inventory.on_hand(starved.id, location.id).await.unwrap(),
        dec(2)
    );
}

#[tokio::test]
async fn step_driven_completion_also_consumes() {
    let (_db, services) = setup().await;
    let raw = seed_part(&services, "RAW-40").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(raw.id, location.id, dec(20), None)
        .await
        .unwrap();

    let assembly = seed_part(&services, "FG-40").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: assembly.id,
            quantity_ordered: dec(4),
            steps: vec!["assemble".into()],
        })
        .await
        .unwrap();
    services
        .bom
        .add_line(order.id, raw.id, dec(8), Some(location.id))
        .await
        .unwrap();
    let steps = services.orders.steps_for_order(order.id).await.unwrap();

    services
        .orders
        .transition_step(steps[0].id, StepStatus::InProgress)
        .await
        .unwrap();
    let outcome = services
        .orders
        .transition_step(steps[0].id, StepStatus::Complete)
        .await
        .unwrap();

    assert_eq!(outcome.order.status, OrderStatus::Complete);
    let consumption = outcome.consumption.expect("completion consumes");
    assert_eq!(consumption.succeeded.len(), 1);
    assert!(consumption.failed.is_empty());
    assert_eq!(
        services.inventory.on_hand(raw.id, location.id).await.unwrap(),
        dec(12)
    );

    // The explicit completion afterwards changes nothing.
    services.orders.complete_order(order.id, None).await.unwrap();
    assert_eq!(
        services.inventory.on_hand(raw.id, location.id).await.unwrap(),
        dec(12)
    );
}

#[tokio::test]
async fn reversal_reopens_the_bom_line_for_the_next_completion() {
    let (_db, services) = setup().await;
    let raw = seed_part(&services, "RAW-50").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(raw.id, location.id, dec(30), None)
        .await
        .unwrap();

    let assembly = seed_part(&services, "FG-50").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: assembly.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();
    services
        .bom
        .add_line(order.id, raw.id, dec(6), Some(location.id))
        .await
        .unwrap();

    let result = services.orders.complete_order(order.id, None).await.unwrap();
    assert!(result.failures.is_empty());
    let entries = services.consumption.entries_for_order(order.id).await.unwrap();
    services
        .consumption
        .reverse(entries[0].id, "wrong lot")
        .await
        .unwrap();

    let lines = services.bom.lines_for_order(order.id).await.unwrap();
    assert!(!lines[0].is_consumed);
    assert_eq!(lines[0].quantity_consumed, dec(0));
    assert_eq!(
        services.inventory.on_hand(raw.id, location.id).await.unwrap(),
        dec(30)
    );

    let summary = services.bom.allocation_summary(order.id).await.unwrap();
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].outstanding, dec(6));
}

#[tokio::test]
async fn transfer_conserves_total_stock() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "RAW-60").await;
    let here = seed_location(&services, "L1").await;
    let there = seed_location(&services, "L2").await;
    services
        .inventory
        .receive(part.id, here.id, dec(10), Some(dec(4)))
        .await
        .unwrap();

    services
        .inventory
        .transfer(part.id, here.id, there.id, dec(4))
        .await
        .unwrap();
    assert_eq!(
        services.inventory.on_hand(part.id, here.id).await.unwrap(),
        dec(6)
    );
    assert_eq!(
        services.inventory.on_hand(part.id, there.id).await.unwrap(),
        dec(4)
    );

    // The destination inherits the source cost.
    let destination = services
        .inventory
        .balance(part.id, there.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(destination.unit_cost, Some(dec(4)));

    let result = services
        .inventory
        .transfer(part.id, here.id, there.id, dec(100))
        .await;
    assert!(matches!(
        result,
        Err(ServiceError::InsufficientResource { .. })
    ));
    assert_eq!(
        services.inventory.on_hand(part.id, here.id).await.unwrap(),
        dec(6)
    );
    assert_eq!(
        services.inventory.on_hand(part.id, there.id).await.unwrap(),
        dec(4)
    );
}
