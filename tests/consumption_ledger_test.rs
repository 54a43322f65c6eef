//! Integration tests for the material consumption ledger: idempotency,
//! reversal symmetry, conservation and the non-negative balance guarantee.

mod common;

use common::{dec, seed_location, seed_part, seed_serialized_part, setup};
use rust_decimal::Decimal;
use shopfloor_api::entities::serialized_unit::UnitStatus;
use shopfloor_api::errors::ServiceError;
use shopfloor_api::services::consumption::ConsumeMaterial;
use shopfloor_api::services::orders::CreateOrder;

#[tokio::test]
async fn consume_with_same_key_writes_exactly_one_entry() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "P-100").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(part.id, location.id, dec(15), None)
        .await
        .unwrap();
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let mut input = ConsumeMaterial::new(order.id, part.id, dec(4), location.id);
    input.idempotency_key = Some("op-retry-1".to_string());

    let first = services.consumption.consume(input.clone()).await.unwrap();
    let second = services.consumption.consume(input).await.unwrap();

    assert_eq!(first.id, second.id);
    let entries = services.consumption.entries_for_order(order.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    // Exactly one decrement despite two calls.
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(11)
    );
}

#[tokio::test]
async fn reversal_restores_balance_and_is_idempotent() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "P-200").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(part.id, location.id, dec(15), Some(dec(3)))
        .await
        .unwrap();
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let entry = services
        .consumption
        .consume(ConsumeMaterial::new(order.id, part.id, dec(5), location.id))
        .await
        .unwrap();
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(10)
    );

    let reversal = services
        .consumption
        .reverse(entry.id, "operator mistake")
        .await
        .unwrap();
    assert!(reversal.is_reversal);
    assert_eq!(reversal.reversal_of_id, Some(entry.id));
    assert_eq!(reversal.qty, dec(-5));
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(15)
    );

    // Second reverse is a no-op returning the same reversal.
    let again = services
        .consumption
        .reverse(entry.id, "double click")
        .await
        .unwrap();
    assert_eq!(again.id, reversal.id);
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(15)
    );
    assert_eq!(
        services.consumption.entries_for_order(order.id).await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn reversing_a_reversal_is_rejected() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "P-210").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(part.id, location.id, dec(5), None)
        .await
        .unwrap();
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let entry = services
        .consumption
        .consume(ConsumeMaterial::new(order.id, part.id, dec(2), location.id))
        .await
        .unwrap();
    let reversal = services.consumption.reverse(entry.id, "undo").await.unwrap();

    let result = services.consumption.reverse(reversal.id, "undo undo").await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn over_consumption_fails_and_leaves_state_untouched() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "P-300").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(part.id, location.id, dec(3), None)
        .await
        .unwrap();
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let result = services
        .consumption
        .consume(ConsumeMaterial::new(order.id, part.id, dec(5), location.id))
        .await;

    match result {
        Err(ServiceError::InsufficientResource {
            available,
            required,
        }) => {
            assert_eq!(available, dec(3));
            assert_eq!(required, dec(5));
        }
        other => panic!("expected InsufficientResource, got {:?}", other),
    }
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(3)
    );
    assert!(services
        .consumption
        .entries_for_order(order.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn non_positive_quantity_is_rejected() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "P-310").await;
    let location = seed_location(&services, "MAIN").await;
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let result = services
        .consumption
        .consume(ConsumeMaterial::new(order.id, part.id, dec(0), location.id))
        .await;
    assert!(matches!(result, Err(ServiceError::Validation(_))));
}

#[tokio::test]
async fn serialized_unit_consumption_and_reversal_restore_both_fields() {
    let (_db, services) = setup().await;
    let part = seed_serialized_part(&services, "SER-100").await;
    let location = seed_location(&services, "VAULT").await;
    let unit = services
        .serialized_units
        .register(part.id, "SN-0001", location.id)
        .await
        .unwrap();
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(1)
    );
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    // Quantity is forced to one for serialized consumption.
    let mut input = ConsumeMaterial::new(order.id, part.id, dec(99), location.id);
    input.serialized_unit_id = Some(unit.id);
    let entry = services.consumption.consume(input).await.unwrap();
    assert_eq!(entry.qty, dec(1));

    let consumed = services.serialized_units.get(unit.id).await.unwrap();
    assert_eq!(consumed.status, UnitStatus::Consumed);
    assert_eq!(consumed.current_location_id, None);
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        Decimal::ZERO
    );

    services.consumption.reverse(entry.id, "wrong unit").await.unwrap();
    let restored = services.serialized_units.get(unit.id).await.unwrap();
    assert_eq!(restored.status, UnitStatus::InStock);
    assert_eq!(restored.current_location_id, Some(location.id));
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(1)
    );
}

#[tokio::test]
async fn unavailable_serialized_unit_fails_without_side_effects() {
    let (_db, services) = setup().await;
    let part = seed_serialized_part(&services, "SER-200").await;
    let here = seed_location(&services, "HERE").await;
    let elsewhere = seed_location(&services, "ELSEWHERE").await;
    let unit = services
        .serialized_units
        .register(part.id, "SN-0002", here.id)
        .await
        .unwrap();
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    // Wrong location: the unit is in stock, but not where we claim.
    let mut input = ConsumeMaterial::new(order.id, part.id, dec(1), elsewhere.id);
    input.serialized_unit_id = Some(unit.id);
    let result = services.consumption.consume(input).await;
    assert!(matches!(
        result,
        Err(ServiceError::InsufficientResource { .. })
    ));

    let untouched = services.serialized_units.get(unit.id).await.unwrap();
    assert_eq!(untouched.status, UnitStatus::InStock);
    assert_eq!(untouched.current_location_id, Some(here.id));
    assert!(services
        .consumption
        .entries_for_order(order.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn balance_changes_match_signed_ledger_sum() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "P-400").await;
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(part.id, location.id, dec(50), None)
        .await
        .unwrap();
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let first = services
        .consumption
        .consume(ConsumeMaterial::new(order.id, part.id, dec(7), location.id))
        .await
        .unwrap();
    services
        .consumption
        .consume(ConsumeMaterial::new(order.id, part.id, dec(12), location.id))
        .await
        .unwrap();
    services.consumption.reverse(first.id, "scrap recovered").await.unwrap();

    let entries = services.consumption.entries_for_order(order.id).await.unwrap();
    let signed_sum: Decimal = entries.iter().map(|e| e.qty).sum();
    assert_eq!(signed_sum, dec(12));
    assert_eq!(
        services.inventory.on_hand(part.id, location.id).await.unwrap(),
        dec(50) - signed_sum
    );
}

#[tokio::test]
async fn unit_cost_resolution_prefers_override_then_balance_then_standard() {
    let (_db, services) = setup().await;
    let part = seed_part(&services, "P-500").await; // standard cost 25
    let location = seed_location(&services, "MAIN").await;
    services
        .inventory
        .receive(part.id, location.id, dec(20), Some(dec(30)))
        .await
        .unwrap();
    let order = services
        .orders
        .create_order(CreateOrder {
            part_id: part.id,
            quantity_ordered: dec(1),
            steps: vec![],
        })
        .await
        .unwrap();

    let mut with_override = ConsumeMaterial::new(order.id, part.id, dec(1), location.id);
    with_override.unit_cost = Some(dec(42));
    let entry = services.consumption.consume(with_override).await.unwrap();
    assert_eq!(entry.unit_cost, Some(dec(42)));

    let from_balance = services
        .consumption
        .consume(ConsumeMaterial::new(order.id, part.id, dec(1), location.id))
        .await
        .unwrap();
    assert_eq!(from_balance.unit_cost, Some(dec(30)));
}
