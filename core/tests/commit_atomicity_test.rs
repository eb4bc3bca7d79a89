//! All-or-nothing commit tests.
//!
//! A bundle whose components cannot all be reserved must leave no capacity taken,
//! whether the failure is a lost race, a provider error, or a timeout inside the
//! critical section.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use booking_core::error::ConflictCause;
use booking_core::inventory::{InMemoryInventory, InventoryProvider};
use booking_core::policy::PolicyConfig;
use booking_core::types::{HotelId, OperationId, ResourceKind};
use booking_core::BookingError;
use booking_testing::faults::{Effect, FaultyInventory, Operation};
use booking_testing::fixtures::{self, ballroom, bundle, buffet, doubles, key, march};
use booking_testing::mocks::test_clock;
use std::sync::Arc;

fn short_timeouts() -> PolicyConfig {
    PolicyConfig {
        provider_timeout_ms: 100,
        ..PolicyConfig::default()
    }
}

async fn assert_untouched(inventory: &InMemoryInventory) {
    for (kind, id) in [
        (ResourceKind::RoomType, "double"),
        (ResourceKind::FunctionRoom, "ballroom"),
        (ResourceKind::Catering, "buffet"),
    ] {
        assert_eq!(
            inventory.active_holds(&key(kind, id)).await,
            0,
            "{id} must not keep a partial reservation"
        );
    }
}

#[tokio::test]
async fn test_unavailable_component_reserves_nothing() {
    let inventory = Arc::new(fixtures::sample_inventory(10));
    // someone else holds the ballroom
    inventory
        .decrement_capacity(
            &OperationId::new("other-event"),
            &key(ResourceKind::FunctionRoom, "ballroom"),
            &march(10, 11),
            None,
            1,
        )
        .await
        .unwrap();
    let engine = fixtures::engine(inventory.clone(), Arc::new(test_clock()));

    let result = engine
        .confirm_bundle(&bundle(vec![doubles(2), ballroom()]), true)
        .await;

    let details = match result {
        Err(BookingError::InsufficientCapacity(details)) => details,
        other => panic!("expected insufficient capacity, got {other:?}"),
    };
    assert!(details.verdict.components[0].sufficient);
    assert!(!details.verdict.components[1].sufficient);
    assert_eq!(details.alternatives.components.len(), 1);
    assert_eq!(details.alternatives.components[0].index, 1);
    // the garden pavilion is free on the same day
    assert_eq!(
        details.alternatives.components[0].candidates[0].resource,
        key(ResourceKind::FunctionRoom, "garden")
    );
    assert_eq!(inventory.active_holds(&key(ResourceKind::RoomType, "double")).await, 0);
}

#[tokio::test]
async fn test_decrement_failure_rolls_back_earlier_components() {
    let inner = Arc::new(fixtures::sample_inventory(10));
    let faulty = Arc::new(FaultyInventory::new(inner.clone()));
    faulty.inject(
        Operation::Decrement,
        Some(key(ResourceKind::Catering, "buffet")),
        Effect::Unreachable,
    );
    let engine = fixtures::engine(faulty, Arc::new(test_clock()));

    let result = engine
        .confirm_bundle(&bundle(vec![doubles(2), ballroom(), buffet(40)]), true)
        .await;

    let conflict = match result {
        Err(BookingError::Conflict(conflict)) => conflict,
        other => panic!("expected conflict, got {other:?}"),
    };
    assert_eq!(conflict.changes.len(), 1);
    assert_eq!(conflict.changes[0].cause, ConflictCause::ProviderFailure);
    assert!(conflict.references(&key(ResourceKind::Catering, "buffet")));
    assert_untouched(&inner).await;
}

#[tokio::test]
async fn test_timeout_inside_critical_section_rolls_back() {
    let inner = Arc::new(fixtures::sample_inventory(10));
    let faulty = Arc::new(FaultyInventory::new(inner.clone()));
    faulty.inject(
        Operation::Decrement,
        Some(key(ResourceKind::FunctionRoom, "ballroom")),
        Effect::Stall,
    );
    let engine = fixtures::engine_with_policy(faulty, Arc::new(test_clock()), short_timeouts());

    let result = engine
        .confirm_bundle(&bundle(vec![doubles(2), ballroom(), buffet(40)]), true)
        .await;

    let conflict = match result {
        Err(BookingError::Conflict(conflict)) => conflict,
        other => panic!("expected conflict, got {other:?}"),
    };
    assert_eq!(conflict.changes[0].cause, ConflictCause::ProviderTimeout);
    assert_untouched(&inner).await;
}

#[tokio::test]
async fn test_revalidation_timeout_is_a_conflict_not_a_booking() {
    let inner = Arc::new(fixtures::sample_inventory(10));
    let faulty = Arc::new(FaultyInventory::new(inner.clone()));
    // first query (engine validation) passes, second (re-validation under lock) stalls
    faulty.inject_after(
        Operation::Query,
        Some(key(ResourceKind::RoomType, "double")),
        Effect::Stall,
        1,
    );
    let engine = fixtures::engine_with_policy(faulty, Arc::new(test_clock()), short_timeouts());

    let result = engine.confirm_bundle(&bundle(vec![doubles(1)]), true).await;

    let conflict = match result {
        Err(BookingError::Conflict(conflict)) => conflict,
        other => panic!("expected conflict, got {other:?}"),
    };
    assert_eq!(conflict.changes[0].cause, ConflictCause::ProviderTimeout);
    assert_eq!(conflict.changes[0].available, None);
    assert_untouched(&inner).await;
}

#[tokio::test]
async fn test_validation_timeout_is_availability_unknown() {
    let inner = Arc::new(fixtures::sample_inventory(10));
    let faulty = Arc::new(FaultyInventory::new(inner));
    faulty.inject(Operation::Query, None, Effect::Stall);
    let engine = fixtures::engine_with_policy(faulty, Arc::new(test_clock()), short_timeouts());

    let result = engine.validate_bundle(&bundle(vec![doubles(1)])).await;
    assert!(matches!(result, Err(BookingError::AvailabilityUnknown(_))));
}

#[tokio::test]
async fn test_unreachable_provider_is_availability_unknown() {
    let inner = Arc::new(fixtures::sample_inventory(10));
    let faulty = Arc::new(FaultyInventory::new(inner));
    faulty.inject(Operation::Describe, None, Effect::Unreachable);
    let engine = fixtures::engine(faulty, Arc::new(test_clock()));

    let result = engine.confirm_bundle(&bundle(vec![doubles(1)]), true).await;
    assert!(matches!(result, Err(BookingError::AvailabilityUnknown(_))));
}

#[tokio::test]
async fn test_failed_rollback_fences_resource_until_reconciled() {
    let inner = Arc::new(fixtures::sample_inventory(10));
    let faulty = Arc::new(FaultyInventory::new(inner.clone()));
    let double = key(ResourceKind::RoomType, "double");
    faulty.inject(
        Operation::Decrement,
        Some(key(ResourceKind::FunctionRoom, "ballroom")),
        Effect::Unreachable,
    );
    faulty.inject(Operation::Increment, Some(double.clone()), Effect::Unreachable);
    let engine = fixtures::engine(faulty.clone(), Arc::new(test_clock()));

    let result = engine.confirm_bundle(&fixtures::package_bundle(), true).await;
    let error = match result {
        Err(BookingError::Compensation(error)) => error,
        other => panic!("expected unreconciled capacity, got {other:?}"),
    };
    assert!(error.references(&double));
    assert_eq!(engine.pending_compensations(), 1);
    assert!(engine.list_bookings(&HotelId::new(fixtures::HOTEL)).await.unwrap().is_empty());

    // the leaked hold blocks further commits on doubles until it is released
    let blocked = engine.confirm_bundle(&bundle(vec![doubles(1)]), true).await;
    assert!(matches!(blocked, Err(BookingError::Compensation(_))));
    assert_eq!(inner.active_holds(&double).await, 1);

    faulty.clear();
    assert_eq!(engine.reconcile().await.unwrap(), 0);
    assert_eq!(engine.pending_compensations(), 0);
    assert_untouched(&inner).await;

    engine
        .confirm_bundle(&bundle(vec![doubles(1)]), true)
        .await
        .unwrap();
    assert_eq!(inner.active_holds(&double).await, 1);
}

#[tokio::test]
async fn test_queued_release_settles_on_next_commit() {
    let inner = Arc::new(fixtures::sample_inventory(10));
    let faulty = Arc::new(FaultyInventory::new(inner.clone()));
    let double = key(ResourceKind::RoomType, "double");
    faulty.inject(
        Operation::Decrement,
        Some(key(ResourceKind::FunctionRoom, "ballroom")),
        Effect::Unreachable,
    );
    faulty.inject(Operation::Increment, Some(double.clone()), Effect::Unreachable);
    let engine = fixtures::engine(faulty.clone(), Arc::new(test_clock()));

    assert!(engine
        .confirm_bundle(&fixtures::package_bundle(), true)
        .await
        .is_err());

    faulty.clear();
    let booking = engine
        .confirm_bundle(&bundle(vec![doubles(3)]), true)
        .await
        .unwrap();
    assert_eq!(booking.holds.len(), 1);
    assert_eq!(engine.pending_compensations(), 0);
    assert_eq!(inner.active_holds(&double).await, 1);
    assert_eq!(inner.query_capacity(&double, &march(10, 12), None).await.unwrap(), 7);
}
