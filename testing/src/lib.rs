//! # Booking Testing
//!
//! Testing utilities for the booking engine.
//!
//! This crate provides:
//! - Deterministic clocks (`FixedClock`, `ManualClock`)
//! - `FaultyInventory`, an inventory decorator that injects timeouts and failures
//! - Seeded hotel fixtures and bundle builders
//!
//! ## Example
//!
//! ```ignore
//! use booking_testing::{fixtures, mocks::test_clock};
//!
//! #[tokio::test]
//! async fn test_package_flow() {
//!     let inventory = Arc::new(fixtures::sample_inventory(10));
//!     let engine = fixtures::engine(inventory, Arc::new(test_clock()));
//!
//!     let booking = engine.confirm_bundle(&fixtures::package_bundle(), true).await.unwrap();
//!     assert_eq!(booking.price.total.minor(), 749_700);
//! }
//! ```

use booking_core::environment::Clock;
use chrono::{DateTime, Utc};

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use chrono::Duration;
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Never in practice: the timestamp is hardcoded.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that tests move forward (or set) explicitly
    #[derive(Debug)]
    pub struct ManualClock {
        time: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Starts at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Mutex::new(time),
            }
        }

        /// Moves the clock by `by`
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jumps to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = time;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

/// Fault injection for inventory providers
pub mod faults {
    use async_trait::async_trait;
    use booking_core::error::ProviderError;
    use booking_core::inventory::InventoryProvider;
    use booking_core::types::{
        DateRange, HotelId, OperationId, ResourceDescriptor, ResourceKey, ResourceKind, TimeWindow,
    };
    use std::sync::{Arc, Mutex, PoisonError};
    use std::time::Duration;

    /// Provider operation a fault applies to
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Operation {
        /// `describe`
        Describe,
        /// `list_resources`
        List,
        /// `query_capacity`
        Query,
        /// `decrement_capacity`
        Decrement,
        /// `increment_capacity`
        Increment,
        /// `ping`
        Ping,
    }

    /// What happens when a fault fires
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Effect {
        /// Never answers in time (sleeps far beyond any test timeout)
        Stall,
        /// Answers `ProviderError::Unreachable`
        Unreachable,
    }

    #[derive(Debug)]
    struct Rule {
        operation: Operation,
        resource: Option<ResourceKey>,
        effect: Effect,
        skip: usize,
    }

    /// Decorator that injects faults in front of a real provider.
    pub struct FaultyInventory {
        inner: Arc<dyn InventoryProvider>,
        rules: Mutex<Vec<Rule>>,
    }

    impl FaultyInventory {
        /// Wraps `inner` with no faults armed
        #[must_use]
        pub fn new(inner: Arc<dyn InventoryProvider>) -> Self {
            Self {
                inner,
                rules: Mutex::new(Vec::new()),
            }
        }

        /// Arms a fault for every matching call (`resource: None` matches any resource)
        pub fn inject(&self, operation: Operation, resource: Option<ResourceKey>, effect: Effect) {
            self.inject_after(operation, resource, effect, 0);
        }

        /// Arms a fault that lets the first `skip` matching calls through
        pub fn inject_after(
            &self,
            operation: Operation,
            resource: Option<ResourceKey>,
            effect: Effect,
            skip: usize,
        ) {
            self.rules
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(Rule {
                    operation,
                    resource,
                    effect,
                    skip,
                });
        }

        /// Disarms every fault
        pub fn clear(&self) {
            self.rules.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }

        fn fault_for(
            &self,
            operation: Operation,
            resource: Option<&ResourceKey>,
        ) -> Option<Effect> {
            let mut rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
            let rule = rules.iter_mut().find(|rule| {
                rule.operation == operation
                    && rule.resource.as_ref().is_none_or(|r| Some(r) == resource)
            })?;
            if rule.skip > 0 {
                rule.skip -= 1;
                return None;
            }
            Some(rule.effect)
        }

        async fn apply(
            &self,
            operation: Operation,
            resource: Option<&ResourceKey>,
        ) -> Result<(), ProviderError> {
            match self.fault_for(operation, resource) {
                None => Ok(()),
                Some(Effect::Stall) => {
                    tokio::time::sleep(Duration::from_secs(3_600)).await;
                    Ok(())
                }
                Some(Effect::Unreachable) => Err(ProviderError::Unreachable {
                    reason: format!("injected fault on {operation:?}"),
                }),
            }
        }
    }

    #[async_trait]
    impl InventoryProvider for FaultyInventory {
        async fn describe(
            &self,
            resource: &ResourceKey,
        ) -> Result<ResourceDescriptor, ProviderError> {
            self.apply(Operation::Describe, Some(resource)).await?;
            self.inner.describe(resource).await
        }

        async fn list_resources(
            &self,
            hotel: &HotelId,
            kind: ResourceKind,
        ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
            self.apply(Operation::List, None).await?;
            self.inner.list_resources(hotel, kind).await
        }

        async fn query_capacity(
            &self,
            resource: &ResourceKey,
            dates: &DateRange,
            window: Option<&TimeWindow>,
        ) -> Result<u32, ProviderError> {
            self.apply(Operation::Query, Some(resource)).await?;
            self.inner.query_capacity(resource, dates, window).await
        }

        async fn decrement_capacity(
            &self,
            operation: &OperationId,
            resource: &ResourceKey,
            dates: &DateRange,
            window: Option<&TimeWindow>,
            quantity: u32,
        ) -> Result<(), ProviderError> {
            self.apply(Operation::Decrement, Some(resource)).await?;
            self.inner
                .decrement_capacity(operation, resource, dates, window, quantity)
                .await
        }

        async fn increment_capacity(
            &self,
            operation: &OperationId,
            resource: &ResourceKey,
        ) -> Result<(), ProviderError> {
            self.apply(Operation::Increment, Some(resource)).await?;
            self.inner.increment_capacity(operation, resource).await
        }

        async fn ping(&self) -> Result<(), ProviderError> {
            self.apply(Operation::Ping, None).await?;
            self.inner.ping().await
        }
    }
}

/// Seeded hotel fixtures
///
/// One hotel, [`fixtures::HOTEL`], with:
///
/// | kind          | id       | unit price | capacity |
/// |---------------|----------|-----------:|---------:|
/// | room type     | double   |    100,000 | (param)  |
/// | room type     | suite    |    250,000 |        4 |
/// | room type     | twin     |     90,000 |        6 |
/// | function room | ballroom |    300,000 |        1 |
/// | function room | garden   |    180,000 |        1 |
/// | catering      | buffet   |      4,500 |      200 |
#[allow(clippy::expect_used, clippy::missing_panics_doc)]
pub mod fixtures {
    use booking_core::environment::Clock;
    use booking_core::inventory::{InMemoryInventory, InventoryProvider, InventorySeed};
    use booking_core::policy::PolicyConfig;
    use booking_core::store::InMemoryBookingStore;
    use booking_core::types::{
        BundleMetadata, BundleRequest, ComponentRequest, DateRange, HotelId, Money,
        ResourceDescriptor, ResourceId, ResourceKey, ResourceKind,
    };
    use booking_core::BookingEngine;
    use chrono::NaiveDate;
    use std::sync::Arc;

    /// Hotel every fixture resource belongs to
    pub const HOTEL: &str = "grand-plaza";

    /// Calendar date
    #[must_use]
    pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
    }

    /// Half-open range of March 2025 days
    #[must_use]
    pub fn march(start: u32, end: u32) -> DateRange {
        DateRange::new(date(2025, 3, start), date(2025, 3, end)).expect("valid fixture range")
    }

    /// Resource key shortcut
    #[must_use]
    pub fn key(kind: ResourceKind, id: &str) -> ResourceKey {
        ResourceKey::new(kind, id)
    }

    fn resource(
        kind: ResourceKind,
        id: &str,
        name: &str,
        price: u64,
        capacity: u32,
    ) -> ResourceDescriptor {
        ResourceDescriptor {
            key: ResourceKey::new(kind, id),
            hotel_id: HotelId::new(HOTEL),
            name: name.to_string(),
            unit_price: Money::from_minor(price),
            capacity,
        }
    }

    /// Seed of the fixture hotel with `double_capacity` double rooms
    #[must_use]
    pub fn sample_seed(double_capacity: u32) -> InventorySeed {
        InventorySeed {
            resources: vec![
                resource(ResourceKind::RoomType, "double", "Double room", 100_000, double_capacity),
                resource(ResourceKind::RoomType, "suite", "Junior suite", 250_000, 4),
                resource(ResourceKind::RoomType, "twin", "Twin room", 90_000, 6),
                resource(ResourceKind::FunctionRoom, "ballroom", "Grand ballroom", 300_000, 1),
                resource(ResourceKind::FunctionRoom, "garden", "Garden pavilion", 180_000, 1),
                resource(ResourceKind::Catering, "buffet", "Buffet lunch", 4_500, 200),
            ],
        }
    }

    /// In-memory inventory of the fixture hotel
    #[must_use]
    pub fn sample_inventory(double_capacity: u32) -> InMemoryInventory {
        InMemoryInventory::from_seed(sample_seed(double_capacity))
    }

    /// Engine with default policy and a fresh in-memory store
    #[must_use]
    pub fn engine(inventory: Arc<dyn InventoryProvider>, clock: Arc<dyn Clock>) -> BookingEngine {
        engine_with_policy(inventory, clock, PolicyConfig::default())
    }

    /// Engine with an explicit policy
    #[must_use]
    pub fn engine_with_policy(
        inventory: Arc<dyn InventoryProvider>,
        clock: Arc<dyn Clock>,
        policy: PolicyConfig,
    ) -> BookingEngine {
        BookingEngine::new(policy, inventory, Arc::new(InMemoryBookingStore::new()), clock)
            .expect("fixture policy is valid")
    }

    /// Bundle over March 10-12 with the given components
    #[must_use]
    pub fn bundle(components: Vec<ComponentRequest>) -> BundleRequest {
        BundleRequest {
            hotel_id: HotelId::new(HOTEL),
            dates: march(10, 12),
            components,
            metadata: BundleMetadata {
                event_name: Some("Sales kickoff".to_string()),
                contact: Some("events@example.com".to_string()),
            },
        }
    }

    /// `quantity` double rooms for the nights of March 10 and 11
    #[must_use]
    pub fn doubles(quantity: u32) -> ComponentRequest {
        ComponentRequest::RoomBlock {
            room_type: ResourceId::new("double"),
            quantity,
            dates: march(10, 12),
        }
    }

    /// The ballroom for March 10, all day
    #[must_use]
    pub fn ballroom() -> ComponentRequest {
        ComponentRequest::FunctionRoom {
            room_id: ResourceId::new("ballroom"),
            dates: march(10, 11),
            window: None,
        }
    }

    /// Buffet for `headcount` guests on March 10
    #[must_use]
    pub fn buffet(headcount: u32) -> ComponentRequest {
        ComponentRequest::Catering {
            service_id: ResourceId::new("buffet"),
            headcount,
            dates: march(10, 11),
        }
    }

    /// 2 doubles × 2 nights + ballroom × 1 day: totals 749,700 under the default policy
    #[must_use]
    pub fn package_bundle() -> BundleRequest {
        bundle(vec![doubles(2), ballroom()])
    }
}

/// Installs a test tracing subscriber once; later calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("booking_core=debug"))
        .with_test_writer()
        .try_init();
}
