//! Inventory provider: the collaborator that owns remaining capacity.
//!
//! The engine only reads capacity through [`InventoryProvider::query_capacity`] and
//! only mutates it through the paired [`InventoryProvider::decrement_capacity`] /
//! [`InventoryProvider::increment_capacity`] calls, both idempotent by [`OperationId`].
//!
//! [`InMemoryInventory`] is the in-process implementation used by the server and the
//! tests. [`TimedInventory`] bounds every call of any provider with a timeout.

use crate::error::ProviderError;
use crate::types::{
    DateRange, HotelId, OperationId, ResourceDescriptor, ResourceKey, ResourceKind, TimeWindow,
    windows_conflict,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Capacity collaborator for every resource kind.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Static description (hotel, name, unit price, capacity) of a resource.
    ///
    /// # Errors
    ///
    /// [`ProviderError::UnknownResource`] if the resource does not exist.
    async fn describe(&self, resource: &ResourceKey) -> Result<ResourceDescriptor, ProviderError>;

    /// Every resource of `kind` at `hotel`, ordered by key.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    async fn list_resources(
        &self,
        hotel: &HotelId,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError>;

    /// Units still free on every date of `dates` (and inside `window`, for function rooms).
    ///
    /// # Errors
    ///
    /// [`ProviderError::UnknownResource`] or transport failures.
    async fn query_capacity(
        &self,
        resource: &ResourceKey,
        dates: &DateRange,
        window: Option<&TimeWindow>,
    ) -> Result<u32, ProviderError>;

    /// Takes `quantity` units for `dates`. Replaying `operation` is a no-op success.
    ///
    /// # Errors
    ///
    /// [`ProviderError::InsufficientCapacity`] when not enough units remain.
    async fn decrement_capacity(
        &self,
        operation: &OperationId,
        resource: &ResourceKey,
        dates: &DateRange,
        window: Option<&TimeWindow>,
        quantity: u32,
    ) -> Result<(), ProviderError>;

    /// Gives back what `operation` took. Releasing an unknown or released operation is a no-op.
    ///
    /// # Errors
    ///
    /// Transport failures only.
    async fn increment_capacity(
        &self,
        operation: &OperationId,
        resource: &ResourceKey,
    ) -> Result<(), ProviderError>;

    /// Liveness check used by readiness endpoints.
    ///
    /// # Errors
    ///
    /// When the provider cannot be reached.
    async fn ping(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

// ============================================================================
// In-memory capacity ledger
// ============================================================================

/// Capacity taken by one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Hold {
    dates: DateRange,
    window: Option<TimeWindow>,
    quantity: u32,
}

#[derive(Clone, Debug)]
struct ResourceLedger {
    descriptor: ResourceDescriptor,
    holds: HashMap<OperationId, Hold>,
}

impl ResourceLedger {
    fn new(descriptor: ResourceDescriptor) -> Self {
        Self {
            descriptor,
            holds: HashMap::new(),
        }
    }

    /// min over dates of (capacity - units held on that date by competing holds)
    fn remaining(&self, dates: &DateRange, window: Option<&TimeWindow>) -> u32 {
        dates
            .dates()
            .map(|date| {
                let used = self
                    .holds
                    .values()
                    .filter(|hold| hold.dates.contains_date(date))
                    .filter(|hold| windows_conflict(hold.window.as_ref(), window))
                    .fold(0_u32, |acc, hold| acc.saturating_add(hold.quantity));
                self.descriptor.capacity.saturating_sub(used)
            })
            .min()
            .unwrap_or(0)
    }
}

/// Seed file for [`InMemoryInventory`].
///
/// ```json
/// { "resources": [
///     { "kind": "room_type", "id": "double", "hotel_id": "grand-plaza",
///       "name": "Double room", "unit_price": 100000, "capacity": 10 } ] }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InventorySeed {
    /// Resources to register
    pub resources: Vec<ResourceDescriptor>,
}

impl InventorySeed {
    /// Parses a JSON seed.
    ///
    /// # Errors
    ///
    /// Returns the serde error for malformed JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// In-process capacity owner.
///
/// Each resource has a per-date capacity and a ledger of holds keyed by operation id.
/// Function-room holds only compete when their time windows overlap.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    resources: RwLock<BTreeMap<ResourceKey, ResourceLedger>>,
}

impl InMemoryInventory {
    /// Empty inventory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inventory pre-populated from a seed
    #[must_use]
    pub fn from_seed(seed: InventorySeed) -> Self {
        let resources = seed
            .resources
            .into_iter()
            .map(|descriptor| (descriptor.key.clone(), ResourceLedger::new(descriptor)))
            .collect();
        Self {
            resources: RwLock::new(resources),
        }
    }

    /// Registers (or replaces the description of) a resource. Existing holds are kept.
    pub async fn add_resource(&self, descriptor: ResourceDescriptor) {
        let mut resources = self.resources.write().await;
        match resources.get_mut(&descriptor.key) {
            Some(ledger) => ledger.descriptor = descriptor,
            None => {
                resources.insert(descriptor.key.clone(), ResourceLedger::new(descriptor));
            }
        }
    }

    /// Number of live holds on a resource
    pub async fn active_holds(&self, resource: &ResourceKey) -> usize {
        self.resources
            .read()
            .await
            .get(resource)
            .map_or(0, |ledger| ledger.holds.len())
    }

    /// Drops holds whose last night is before `today`. Returns how many were dropped.
    ///
    /// Past nights are never queried for availability, so their holds only slow down
    /// [`InventoryProvider::query_capacity`]. Releasing a pruned operation is a no-op.
    pub async fn prune_before(&self, today: NaiveDate) -> usize {
        let mut resources = self.resources.write().await;
        let mut pruned = 0;
        for ledger in resources.values_mut() {
            let before = ledger.holds.len();
            ledger.holds.retain(|_, hold| hold.dates.end > today);
            pruned += before - ledger.holds.len();
        }
        pruned
    }

    /// Number of resources registered
    pub async fn resource_count(&self) -> usize {
        self.resources.read().await.len()
    }
}

#[async_trait]
impl InventoryProvider for InMemoryInventory {
    async fn describe(&self, resource: &ResourceKey) -> Result<ResourceDescriptor, ProviderError> {
        self.resources
            .read()
            .await
            .get(resource)
            .map(|ledger| ledger.descriptor.clone())
            .ok_or_else(|| ProviderError::UnknownResource(resource.clone()))
    }

    async fn list_resources(
        &self,
        hotel: &HotelId,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        Ok(self
            .resources
            .read()
            .await
            .values()
            .filter(|ledger| {
                ledger.descriptor.key.kind == kind && &ledger.descriptor.hotel_id == hotel
            })
            .map(|ledger| ledger.descriptor.clone())
            .collect())
    }

    async fn query_capacity(
        &self,
        resource: &ResourceKey,
        dates: &DateRange,
        window: Option<&TimeWindow>,
    ) -> Result<u32, ProviderError> {
        let resources = self.resources.read().await;
        let ledger = resources
            .get(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.clone()))?;
        Ok(ledger.remaining(dates, window))
    }

    async fn decrement_capacity(
        &self,
        operation: &OperationId,
        resource: &ResourceKey,
        dates: &DateRange,
        window: Option<&TimeWindow>,
        quantity: u32,
    ) -> Result<(), ProviderError> {
        let mut resources = self.resources.write().await;
        let ledger = resources
            .get_mut(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.clone()))?;

        let hold = Hold {
            dates: *dates,
            window: window.copied(),
            quantity,
        };

        if let Some(existing) = ledger.holds.get(operation) {
            if *existing == hold {
                tracing::debug!(%operation, %resource, "decrement replayed, already applied");
                return Ok(());
            }
            return Err(ProviderError::InvalidOperation {
                reason: format!("operation {operation} replayed with different arguments"),
            });
        }

        // CRITICAL: capacity is re-checked under the write lock, never trusted from a prior read
        let available = ledger.remaining(dates, window);
        if available < quantity {
            return Err(ProviderError::InsufficientCapacity {
                resource: resource.clone(),
                requested: quantity,
                available,
            });
        }

        ledger.holds.insert(operation.clone(), hold);
        tracing::debug!(
            %operation,
            %resource,
            quantity,
            remaining = available - quantity,
            "capacity decremented"
        );
        Ok(())
    }

    async fn increment_capacity(
        &self,
        operation: &OperationId,
        resource: &ResourceKey,
    ) -> Result<(), ProviderError> {
        let mut resources = self.resources.write().await;
        let ledger = resources
            .get_mut(resource)
            .ok_or_else(|| ProviderError::UnknownResource(resource.clone()))?;

        match ledger.holds.remove(operation) {
            Some(hold) => {
                tracing::debug!(
                    %operation,
                    %resource,
                    quantity = hold.quantity,
                    "capacity released"
                );
            }
            None => {
                tracing::debug!(%operation, %resource, "release of unknown operation ignored");
            }
        }
        Ok(())
    }
}

// ============================================================================
// Timeout decorator
// ============================================================================

/// Bounds every call of an inner provider with a timeout.
///
/// An elapsed call surfaces as [`ProviderError::Timeout`], which callers report as
/// "availability unknown" rather than as either "available" or "unavailable".
#[derive(Clone)]
pub struct TimedInventory {
    inner: Arc<dyn InventoryProvider>,
    limit: Duration,
}

impl TimedInventory {
    /// Wraps `inner` with a per-call `limit`
    #[must_use]
    pub fn new(inner: Arc<dyn InventoryProvider>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    async fn bounded<T: Send>(
        &self,
        operation: &'static str,
        resource: &ResourceKey,
        call: impl Future<Output = Result<T, ProviderError>> + Send,
    ) -> Result<T, ProviderError> {
        if let Ok(result) = tokio::time::timeout(self.limit, call).await {
            result
        } else {
            tracing::warn!(operation, %resource, limit = ?self.limit, "inventory call timed out");
            Err(ProviderError::Timeout {
                operation,
                resource: resource.clone(),
            })
        }
    }
}

#[async_trait]
impl InventoryProvider for TimedInventory {
    async fn describe(&self, resource: &ResourceKey) -> Result<ResourceDescriptor, ProviderError> {
        self.bounded("describe", resource, self.inner.describe(resource))
            .await
    }

    async fn list_resources(
        &self,
        hotel: &HotelId,
        kind: ResourceKind,
    ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
        let scope = ResourceKey::new(kind, format!("{hotel}/*"));
        self.bounded("list_resources", &scope, self.inner.list_resources(hotel, kind))
            .await
    }

    async fn query_capacity(
        &self,
        resource: &ResourceKey,
        dates: &DateRange,
        window: Option<&TimeWindow>,
    ) -> Result<u32, ProviderError> {
        self.bounded(
            "query_capacity",
            resource,
            self.inner.query_capacity(resource, dates, window),
        )
        .await
    }

    async fn decrement_capacity(
        &self,
        operation: &OperationId,
        resource: &ResourceKey,
        dates: &DateRange,
        window: Option<&TimeWindow>,
        quantity: u32,
    ) -> Result<(), ProviderError> {
        self.bounded(
            "decrement_capacity",
            resource,
            self.inner
                .decrement_capacity(operation, resource, dates, window, quantity),
        )
        .await
    }

    async fn increment_capacity(
        &self,
        operation: &OperationId,
        resource: &ResourceKey,
    ) -> Result<(), ProviderError> {
        self.bounded(
            "increment_capacity",
            resource,
            self.inner.increment_capacity(operation, resource),
        )
        .await
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let any = ResourceKey::new(ResourceKind::RoomType, "*");
        self.bounded("ping", &any, self.inner.ping()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Money;
    use chrono::NaiveTime;

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, start).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, end).unwrap(),
        )
        .unwrap()
    }

    fn window(start: u32, end: u32) -> TimeWindow {
        TimeWindow::new(
            NaiveTime::from_hms_opt(start, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(end, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn descriptor(key: &ResourceKey, capacity: u32) -> ResourceDescriptor {
        ResourceDescriptor {
            key: key.clone(),
            hotel_id: HotelId::new("grand"),
            name: key.id.to_string(),
            unit_price: Money::from_minor(100_000),
            capacity,
        }
    }

    async fn inventory_with(key: &ResourceKey, capacity: u32) -> InMemoryInventory {
        let inventory = InMemoryInventory::new();
        inventory.add_resource(descriptor(key, capacity)).await;
        inventory
    }

    #[tokio::test]
    async fn test_remaining_is_min_over_nights() {
        let key = ResourceKey::new(ResourceKind::RoomType, "double");
        let inventory = inventory_with(&key, 5).await;

        inventory
            .decrement_capacity(&OperationId::new("a"), &key, &range(11, 12), None, 3)
            .await
            .unwrap();

        assert_eq!(inventory.query_capacity(&key, &range(10, 11), None).await.unwrap(), 5);
        assert_eq!(inventory.query_capacity(&key, &range(10, 13), None).await.unwrap(), 2);
        // checkout day is free again
        assert_eq!(inventory.query_capacity(&key, &range(12, 14), None).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_decrement_refuses_oversell() {
        let key = ResourceKey::new(ResourceKind::RoomType, "double");
        let inventory = inventory_with(&key, 1).await;

        inventory
            .decrement_capacity(&OperationId::new("a"), &key, &range(10, 12), None, 1)
            .await
            .unwrap();
        let err = inventory
            .decrement_capacity(&OperationId::new("b"), &key, &range(11, 13), None, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InsufficientCapacity { available: 0, .. }));
    }

    #[tokio::test]
    async fn test_decrement_and_increment_are_idempotent() {
        let key = ResourceKey::new(ResourceKind::RoomType, "double");
        let inventory = inventory_with(&key, 2).await;
        let op = OperationId::new("commit-1-0");

        inventory.decrement_capacity(&op, &key, &range(10, 12), None, 2).await.unwrap();
        inventory.decrement_capacity(&op, &key, &range(10, 12), None, 2).await.unwrap();
        assert_eq!(inventory.active_holds(&key).await, 1);

        inventory.increment_capacity(&op, &key).await.unwrap();
        inventory.increment_capacity(&op, &key).await.unwrap();
        assert_eq!(inventory.query_capacity(&key, &range(10, 12), None).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replay_with_other_arguments_is_rejected() {
        let key = ResourceKey::new(ResourceKind::RoomType, "double");
        let inventory = inventory_with(&key, 4).await;
        let op = OperationId::new("x");

        inventory.decrement_capacity(&op, &key, &range(10, 12), None, 1).await.unwrap();
        let err = inventory
            .decrement_capacity(&op, &key, &range(10, 12), None, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidOperation { .. }));
    }

    #[tokio::test]
    async fn test_function_room_windows() {
        let key = ResourceKey::new(ResourceKind::FunctionRoom, "ballroom");
        let inventory = inventory_with(&key, 1).await;

        inventory
            .decrement_capacity(
                &OperationId::new("am"),
                &key,
                &range(10, 11),
                Some(&window(9, 12)),
                1,
            )
            .await
            .unwrap();

        let afternoon = inventory
            .query_capacity(&key, &range(10, 11), Some(&window(12, 17)))
            .await
            .unwrap();
        let overlapping = inventory
            .query_capacity(&key, &range(10, 11), Some(&window(11, 13)))
            .await
            .unwrap();
        let whole_day = inventory.query_capacity(&key, &range(10, 11), None).await.unwrap();

        assert_eq!(afternoon, 1);
        assert_eq!(overlapping, 0);
        assert_eq!(whole_day, 0);
    }

    #[tokio::test]
    async fn test_prune_drops_only_finished_holds() {
        let key = ResourceKey::new(ResourceKind::RoomType, "double");
        let inventory = inventory_with(&key, 5).await;
        let past = OperationId::new("past");
        let live = OperationId::new("live");
        for (op, dates) in [(&past, range(1, 3)), (&live, range(3, 6))] {
            inventory
                .decrement_capacity(op, &key, &dates, None, 2)
                .await
                .unwrap();
        }

        let today = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        assert_eq!(inventory.prune_before(today).await, 1);
        assert_eq!(inventory.prune_before(today).await, 0);
        assert_eq!(inventory.active_holds(&key).await, 1);
        assert_eq!(inventory.query_capacity(&key, &range(3, 4), None).await.unwrap(), 3);

        // releasing a pruned operation is still a no-op success
        inventory.increment_capacity(&past, &key).await.unwrap();
        assert_eq!(inventory.active_holds(&key).await, 1);
    }

    #[tokio::test]
    async fn test_unknown_resource() {
        let inventory = InMemoryInventory::new();
        let key = ResourceKey::new(ResourceKind::Catering, "buffet");
        assert!(matches!(
            inventory.describe(&key).await,
            Err(ProviderError::UnknownResource(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_parsing() {
        let seed = InventorySeed::from_json(
            r#"{"resources":[{"kind":"catering","id":"buffet","hotel_id":"grand",
                "name":"Buffet","unit_price":4500,"capacity":200}]}"#,
        )
        .unwrap();
        let inventory = InMemoryInventory::from_seed(seed);
        let listed = inventory
            .list_resources(&HotelId::new("grand"), ResourceKind::Catering)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].capacity, 200);
    }

    struct Stalled;

    #[async_trait]
    impl InventoryProvider for Stalled {
        async fn describe(
            &self,
            resource: &ResourceKey,
        ) -> Result<ResourceDescriptor, ProviderError> {
            Err(ProviderError::UnknownResource(resource.clone()))
        }

        async fn list_resources(
            &self,
            _: &HotelId,
            _: ResourceKind,
        ) -> Result<Vec<ResourceDescriptor>, ProviderError> {
            Ok(vec![])
        }

        async fn query_capacity(
            &self,
            _: &ResourceKey,
            _: &DateRange,
            _: Option<&TimeWindow>,
        ) -> Result<u32, ProviderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(10)
        }

        async fn decrement_capacity(
            &self,
            _: &OperationId,
            _: &ResourceKey,
            _: &DateRange,
            _: Option<&TimeWindow>,
            _: u32,
        ) -> Result<(), ProviderError> {
            Ok(())
        }

        async fn increment_capacity(
            &self,
            _: &OperationId,
            _: &ResourceKey,
        ) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_timed_inventory_reports_timeout() {
        let timed = TimedInventory::new(Arc::new(Stalled), Duration::from_millis(50));
        let key = ResourceKey::new(ResourceKind::RoomType, "double");
        let err = timed.query_capacity(&key, &range(10, 11), None).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { operation: "query_capacity", .. }));
    }
}
