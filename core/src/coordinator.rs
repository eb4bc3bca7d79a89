//! Booking commit coordinator.
//!
//! The only component that writes. A commit:
//!
//! 1. locks exactly the resources the bundle touches, in sorted key order
//! 2. re-validates availability inside that critical section
//! 3. decrements capacity for every component under per-component operation ids
//! 4. generates a confirmation code and persists the booking
//!
//! Any failure in steps 2-4 rolls back every decrement already applied, so a bundle is
//! reserved entirely or not at all. There is no automatic retry: the caller re-validates.
//! A rollback that keeps failing is handed to the [`Compensator`], which fences the
//! resource until the release goes through.
//!
//! This double check (validate, then re-validate under lock) is what stops two callers
//! from both taking the last unit of a resource.

use crate::compensation::{Compensation, Compensator};
use crate::environment::Clock;
use crate::error::{
    BookingError, CompensationError, ComponentConflict, ConflictCause, ConflictError, ProviderError,
};
use crate::inventory::InventoryProvider;
use crate::metrics::{self, CommitOutcome};
use crate::store::{BookingStore, ConfirmationCodeGenerator};
use crate::types::{
    Booking, BookingStatus, BundleRequest, CapacityHold, ComponentRequest, OperationId,
    PriceBreakdown, ResourceKey,
};
use chrono::NaiveTime;
use futures::future::join_all;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

// ============================================================================
// Per-resource locks
// ============================================================================

/// Lock table with one async mutex per resource.
///
/// Commits and cancellations that share a resource are serialized; those with
/// disjoint resource sets never wait on each other. There is no global lock.
#[derive(Debug, Default)]
pub struct ResourceLocks {
    table: Mutex<HashMap<ResourceKey, Arc<AsyncMutex<()>>>>,
}

impl ResourceLocks {
    /// Creates an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, key: &ResourceKey) -> Arc<AsyncMutex<()>> {
        // the table only maps keys to handles, so a poisoned map is still consistent
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(table.entry(key.clone()).or_default())
    }

    /// Acquires every lock in `keys`, sorted and de-duplicated, so two overlapping
    /// sets can never deadlock. Locks are released when the returned set drops.
    pub async fn acquire(&self, keys: &[ResourceKey]) -> ResourceLockSet {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = SmallVec::new();
        for key in &ordered {
            guards.push(self.handle(key).lock_owned().await);
        }
        tracing::trace!(locks = ordered.len(), "resource locks acquired");

        ResourceLockSet {
            keys: ordered,
            _guards: guards,
        }
    }
}

/// Guards held for one critical section.
pub struct ResourceLockSet {
    keys: Vec<ResourceKey>,
    _guards: SmallVec<[OwnedMutexGuard<()>; 4]>,
}

impl ResourceLockSet {
    /// Keys held, in acquisition order
    #[must_use]
    pub fn keys(&self) -> &[ResourceKey] {
        &self.keys
    }
}

// ============================================================================
// Commit state machine
// ============================================================================

/// Phase of a single commit attempt.
///
/// `Requested → Validating → Committing → Confirmed`, with `Validating → Rejected`
/// and `Committing → Conflicted` as the failure exits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitPhase {
    /// Attempt created
    Requested,
    /// Request shape being checked
    Validating,
    /// Locks held; re-validating and reserving
    Committing,
    /// Booking persisted (terminal)
    Confirmed,
    /// Malformed request (terminal)
    Rejected,
    /// Race lost or provider failure, rolled back (terminal)
    Conflicted,
}

impl CommitPhase {
    /// Whether `next` is a legal successor
    #[must_use]
    pub const fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Validating)
                | (Self::Validating, Self::Committing | Self::Rejected)
                | (Self::Committing, Self::Confirmed | Self::Conflicted)
        )
    }

    /// Confirmed, Rejected and Conflicted are final
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Rejected | Self::Conflicted)
    }
}

impl fmt::Display for CommitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One commit attempt: its id (the root of its operation ids) and current phase.
#[derive(Debug)]
struct CommitAttempt {
    id: Uuid,
    phase: CommitPhase,
}

impl CommitAttempt {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            phase: CommitPhase::Requested,
        }
    }

    fn advance(&mut self, next: CommitPhase) -> Result<(), BookingError> {
        if !self.phase.can_advance_to(next) {
            return Err(BookingError::InvalidState(format!(
                "commit {} cannot move from {} to {}",
                self.id, self.phase, next
            )));
        }
        tracing::debug!(attempt = %self.id, from = %self.phase, to = %next, "commit phase");
        self.phase = next;
        Ok(())
    }

    fn operation(&self, index: usize) -> OperationId {
        OperationId::for_component(self.id, index)
    }
}

fn conflict_cause(error: &ProviderError) -> ConflictCause {
    match error {
        ProviderError::InsufficientCapacity { .. } => ConflictCause::CapacityChanged,
        ProviderError::Timeout { .. } => ConflictCause::ProviderTimeout,
        _ => ConflictCause::ProviderFailure,
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Converts a validated, priced bundle into a persisted booking, atomically.
pub struct CommitCoordinator {
    provider: Arc<dyn InventoryProvider>,
    store: Arc<dyn BookingStore>,
    locks: Arc<ResourceLocks>,
    compensator: Arc<Compensator>,
    codes: ConfirmationCodeGenerator,
    clock: Arc<dyn Clock>,
    check_in_time: NaiveTime,
}

impl CommitCoordinator {
    /// Creates a coordinator
    #[must_use]
    pub fn new(
        provider: Arc<dyn InventoryProvider>,
        store: Arc<dyn BookingStore>,
        locks: Arc<ResourceLocks>,
        compensator: Arc<Compensator>,
        codes: ConfirmationCodeGenerator,
        clock: Arc<dyn Clock>,
        check_in_time: NaiveTime,
    ) -> Self {
        Self {
            provider,
            store,
            locks,
            compensator,
            codes,
            clock,
            check_in_time,
        }
    }

    /// Commits `bundle` at `price`.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] / [`BookingError::InvalidState`]: rejected before
    ///   any lock was taken
    /// - [`BookingError::Conflict`]: capacity changed (or the provider failed) inside the
    ///   critical section; nothing stays reserved
    /// - [`BookingError::Store`]: the booking could not be persisted; nothing stays reserved
    /// - [`BookingError::Compensation`]: a resource has unreconciled capacity (from this
    ///   attempt's rollback or an earlier one); it is fenced until the release succeeds
    pub async fn commit(
        &self,
        bundle: &BundleRequest,
        price: PriceBreakdown,
    ) -> Result<Booking, BookingError> {
        let mut attempt = CommitAttempt::new();
        attempt.advance(CommitPhase::Validating)?;

        let shape = bundle.validate().map_err(BookingError::from).and_then(|()| {
            if price.lines.len() == bundle.components.len() {
                Ok(())
            } else {
                Err(BookingError::InvalidState(
                    "price does not match the bundle's components".to_string(),
                ))
            }
        });
        if let Err(error) = shape {
            attempt.advance(CommitPhase::Rejected)?;
            metrics::record_commit(CommitOutcome::Rejected, 0.0);
            return Err(error);
        }

        let started = Instant::now();
        let locks = self.locks.acquire(&bundle.resource_keys()).await;
        attempt.advance(CommitPhase::Committing)?;

        let result = self
            .reserve_and_persist(&attempt, locks.keys(), bundle, price)
            .await;
        drop(locks);
        let elapsed = started.elapsed().as_secs_f64();

        match result {
            Ok(booking) => {
                attempt.advance(CommitPhase::Confirmed)?;
                metrics::record_commit(CommitOutcome::Confirmed, elapsed);
                metrics::record_revenue(booking.price.total.minor());
                tracing::info!(
                    code = %booking.confirmation_code,
                    hotel = %booking.bundle.hotel_id,
                    total = booking.price.total.minor(),
                    "booking confirmed"
                );
                Ok(booking)
            }
            Err(error) => {
                attempt.advance(CommitPhase::Conflicted)?;
                metrics::record_commit(CommitOutcome::Conflicted, elapsed);
                tracing::warn!(attempt = %attempt.id, %error, "commit rolled back");
                Err(error)
            }
        }
    }

    async fn reserve_and_persist(
        &self,
        attempt: &CommitAttempt,
        locked: &[ResourceKey],
        bundle: &BundleRequest,
        price: PriceBreakdown,
    ) -> Result<Booking, BookingError> {
        // capacity is only trustworthy once earlier failed rollbacks here went through
        self.compensator.settle_pending(locked).await?;

        // CRITICAL: re-read capacity now that no other commit can touch these resources
        let keys: Vec<ResourceKey> = bundle
            .components
            .iter()
            .map(ComponentRequest::resource_key)
            .collect();
        let reads = join_all(bundle.components.iter().zip(&keys).map(|(component, key)| {
            self.provider
                .query_capacity(key, component.dates(), component.window())
        }))
        .await;

        let changes: Vec<ComponentConflict> = bundle
            .components
            .iter()
            .zip(reads)
            .enumerate()
            .filter_map(|(index, (component, read))| {
                let requested = component.requested_units();
                let (available, cause) = match read {
                    Ok(available) if available >= requested => return None,
                    Ok(available) => (Some(available), ConflictCause::CapacityChanged),
                    Err(error) => (None, conflict_cause(&error)),
                };
                Some(ComponentConflict {
                    index,
                    resource: component.resource_key(),
                    requested,
                    available,
                    cause,
                })
            })
            .collect();
        if !changes.is_empty() {
            return Err(ConflictError { changes }.into());
        }

        let mut applied: Vec<CapacityHold> = Vec::with_capacity(bundle.components.len());
        for (index, component) in bundle.components.iter().enumerate() {
            let hold = CapacityHold {
                index,
                resource: component.resource_key(),
                operation_id: attempt.operation(index),
            };
            let decrement = self
                .provider
                .decrement_capacity(
                    &hold.operation_id,
                    &hold.resource,
                    component.dates(),
                    component.window(),
                    component.requested_units(),
                )
                .await;

            if let Err(error) = decrement {
                let available = match &error {
                    ProviderError::InsufficientCapacity { available, .. } => Some(*available),
                    _ => None,
                };
                let conflict = ComponentConflict {
                    index,
                    resource: hold.resource.clone(),
                    requested: component.requested_units(),
                    available,
                    cause: conflict_cause(&error),
                };
                // a timed-out decrement may still have landed; its release is a no-op otherwise
                applied.push(hold);
                self.rollback(&applied).await?;
                return Err(ConflictError {
                    changes: vec![conflict],
                }
                .into());
            }
            applied.push(hold);
        }

        let now = self.clock.now();
        let booking = Booking {
            confirmation_code: self.codes.next(now),
            bundle: bundle.clone(),
            price,
            status: BookingStatus::Confirmed,
            created_at: now,
            check_in_at: bundle.dates.start.and_time(self.check_in_time).and_utc(),
            holds: applied,
            cancellation: None,
        };

        if let Err(error) = self.store.insert(booking.clone()).await {
            self.rollback(&booking.holds).await?;
            return Err(error.into());
        }
        Ok(booking)
    }

    async fn rollback(&self, holds: &[CapacityHold]) -> Result<(), CompensationError> {
        let releases = holds.iter().rev().cloned().map(Compensation::Release).collect();
        self.compensator.settle(releases).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;
    use std::time::Duration;

    #[test]
    fn test_phase_transitions() {
        use CommitPhase::{Committing, Confirmed, Conflicted, Rejected, Requested, Validating};

        assert!(Requested.can_advance_to(Validating));
        assert!(Validating.can_advance_to(Committing));
        assert!(Validating.can_advance_to(Rejected));
        assert!(Committing.can_advance_to(Confirmed));
        assert!(Committing.can_advance_to(Conflicted));

        assert!(!Requested.can_advance_to(Committing));
        assert!(!Validating.can_advance_to(Confirmed));
        assert!(!Committing.can_advance_to(Rejected));
        assert!(!Confirmed.can_advance_to(Validating));
        assert!(Conflicted.is_terminal() && Rejected.is_terminal() && Confirmed.is_terminal());
    }

    #[test]
    fn test_illegal_advance_is_invalid_state() {
        let mut attempt = CommitAttempt::new();
        assert!(matches!(
            attempt.advance(CommitPhase::Confirmed),
            Err(BookingError::InvalidState(_))
        ));
        assert_eq!(attempt.phase, CommitPhase::Requested);
    }

    #[tokio::test]
    async fn test_locks_acquire_in_sorted_order() {
        let locks = ResourceLocks::new();
        let catering = ResourceKey::new(ResourceKind::Catering, "buffet");
        let rooms = ResourceKey::new(ResourceKind::RoomType, "double");

        let set = locks
            .acquire(&[catering.clone(), rooms.clone(), catering.clone()])
            .await;
        assert_eq!(set.keys(), &[rooms, catering]);
    }

    #[tokio::test]
    async fn test_overlapping_sets_serialize_disjoint_sets_do_not() {
        let locks = Arc::new(ResourceLocks::new());
        let rooms = ResourceKey::new(ResourceKind::RoomType, "double");
        let ballroom = ResourceKey::new(ResourceKind::FunctionRoom, "ballroom");

        let held = locks.acquire(&[rooms.clone()]).await;

        // disjoint: immediate
        let disjoint =
            tokio::time::timeout(Duration::from_millis(100), locks.acquire(&[ballroom.clone()]))
                .await;
        assert!(disjoint.is_ok());
        drop(disjoint);

        // overlapping: waits until the first set drops
        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move { locks.acquire(&[ballroom, rooms]).await.keys().len() })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(held);
        let acquired = tokio::time::timeout(Duration::from_secs(1), contender).await;
        assert!(matches!(acquired, Ok(Ok(2))));
    }
}
