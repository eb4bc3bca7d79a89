//! Error taxonomy of the booking engine.
//!
//! Each failure class carries a different caller obligation:
//!
//! - [`ValidationError`]: malformed request, a caller bug. Never retried.
//! - [`BookingError::AvailabilityUnknown`]: the inventory could not answer. Retry with backoff.
//! - [`BookingError::InsufficientCapacity`]: nothing free. Consult the attached alternatives.
//! - [`ConflictError`]: a concurrent commit won. Re-validate, then re-attempt.
//! - [`PolicyError`]: cancellation refused. Terminal.
//! - [`CompensationError`]: capacity could not be reconciled after a failure. The
//!   resources stay fenced until the queued compensations succeed.

use crate::types::{
    AlternativeSet, BookingStatus, BundleVerdict, CapacityHold, ConfirmationCode, DateRange,
    HotelId, ResourceKey,
};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Malformed or inconsistent request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Bundle has no components
    #[error("bundle must contain at least one component")]
    EmptyBundle,

    /// Hotel id is blank
    #[error("hotel id must not be empty")]
    MissingHotel,

    /// `start >= end`
    #[error("invalid date range [{start}, {end}){}", component_suffix(.component))]
    InvalidDateRange {
        /// Offending component, `None` for the bundle window
        component: Option<usize>,
        /// Range start
        start: NaiveDate,
        /// Range end
        end: NaiveDate,
    },

    /// Component dates leave the bundle window
    #[error("component {component} dates {dates} fall outside bundle window {bundle}")]
    OutsideBundleWindow {
        /// Offending component
        component: usize,
        /// Component dates
        dates: DateRange,
        /// Bundle window
        bundle: DateRange,
    },

    /// Quantity or headcount is zero
    #[error("component {component} must request at least one unit")]
    ZeroQuantity {
        /// Offending component
        component: usize,
    },

    /// Function-room window with `start >= end`
    #[error("component {component} has an empty time window")]
    InvalidTimeWindow {
        /// Offending component
        component: usize,
    },

    /// Resource id is blank
    #[error("component {component} has an empty resource identifier")]
    EmptyIdentifier {
        /// Offending component
        component: usize,
    },

    /// Same resource listed twice in one bundle
    #[error("resource {resource} is requested more than once")]
    DuplicateResource {
        /// Repeated resource
        resource: ResourceKey,
    },

    /// Inventory does not know the resource
    #[error("unknown resource {resource}")]
    UnknownResource {
        /// Requested resource
        resource: ResourceKey,
    },

    /// Resource belongs to another hotel
    #[error("resource {resource} does not belong to hotel {hotel}")]
    HotelMismatch {
        /// Requested resource
        resource: ResourceKey,
        /// Hotel of the bundle
        hotel: HotelId,
    },

    /// Booking policies were not accepted at confirmation
    #[error("booking policies must be accepted before confirming")]
    PoliciesNotAccepted,

    /// Policy configuration is internally inconsistent
    #[error("invalid policy configuration: {0}")]
    InvalidPolicy(String),
}

fn component_suffix(component: &Option<usize>) -> String {
    component.map_or_else(String::new, |i| format!(" in component {i}"))
}

/// Failure reported by an inventory provider.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Resource is not known to the provider
    #[error("unknown resource {0}")]
    UnknownResource(ResourceKey),

    /// Provider could not be reached
    #[error("inventory provider unreachable: {reason}")]
    Unreachable {
        /// Transport-level reason
        reason: String,
    },

    /// Call exceeded the configured timeout
    #[error("inventory call {operation} timed out for {resource}")]
    Timeout {
        /// Provider operation (`query_capacity`, `decrement_capacity`, ...)
        operation: &'static str,
        /// Resource involved
        resource: ResourceKey,
    },

    /// Decrement refused for lack of capacity
    #[error("insufficient capacity on {resource}: requested {requested}, available {available}")]
    InsufficientCapacity {
        /// Resource involved
        resource: ResourceKey,
        /// Units requested
        requested: u32,
        /// Units remaining
        available: u32,
    },

    /// Call was malformed (e.g. an operation id replayed with different arguments)
    #[error("invalid inventory operation: {reason}")]
    InvalidOperation {
        /// What was wrong
        reason: String,
    },
}

impl ProviderError {
    /// Whether the error means "could not find out" rather than a definite answer
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable { .. } | Self::Timeout { .. })
    }
}

/// Why a component failed at commit time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCause {
    /// Another commit consumed the capacity since the caller validated
    CapacityChanged,
    /// Inventory call timed out inside the critical section
    ProviderTimeout,
    /// Inventory call failed inside the critical section
    ProviderFailure,
}

/// One component that changed between validation and commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentConflict {
    /// Position of the component in the bundle
    pub index: usize,
    /// Resource involved
    pub resource: ResourceKey,
    /// Units requested
    pub requested: u32,
    /// Units remaining, when known
    pub available: Option<u32>,
    /// What happened
    pub cause: ConflictCause,
}

/// Commit lost a race (or hit a provider failure) and was rolled back.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("commit conflict on {} component(s); re-validate before retrying", .changes.len())]
pub struct ConflictError {
    /// Components that changed
    pub changes: Vec<ComponentConflict>,
}

impl ConflictError {
    /// Whether `resource` is among the changed components
    #[must_use]
    pub fn references(&self, resource: &ResourceKey) -> bool {
        self.changes.iter().any(|c| &c.resource == resource)
    }
}

/// Compensating inventory calls kept failing after retries.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{} capacity hold(s) could not be reconciled; queued for retry", .holds.len())]
pub struct CompensationError {
    /// Holds whose compensation is still queued
    pub holds: Vec<CapacityHold>,
}

impl CompensationError {
    /// Whether a hold on `resource` is still unsettled
    #[must_use]
    pub fn references(&self, resource: &ResourceKey) -> bool {
        self.holds.iter().any(|hold| &hold.resource == resource)
    }
}

/// Cancellation refused by policy. All variants are terminal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Check-in reached (or the booking completed)
    #[error("booking has already started ({hours_until_check_in}h until check-in)")]
    AlreadyStarted {
        /// Whole hours until check-in (zero or negative)
        hours_until_check_in: i64,
    },

    /// Penalty applies but was not accepted
    #[error("a {penalty_percent}% cancellation penalty applies and must be accepted")]
    PenaltyNotAccepted {
        /// Penalty percent that applies
        penalty_percent: u32,
    },

    /// Reason was empty
    #[error("a cancellation reason is required")]
    MissingReason,

    /// Booking was cancelled before
    #[error("booking {0} is already cancelled")]
    AlreadyCancelled(ConfirmationCode),

    /// Booking status does not allow cancellation
    #[error("booking in status {0} cannot be cancelled")]
    NotCancellable(BookingStatus),
}

/// Persistence failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Confirmation code already exists
    #[error("confirmation code {0} already exists")]
    DuplicateCode(ConfirmationCode),

    /// Booking to update does not exist
    #[error("booking {0} does not exist")]
    Missing(ConfirmationCode),

    /// Backend failure
    #[error("booking store unavailable: {0}")]
    Unavailable(String),
}

/// No availability, with the verdict and the alternatives the caller should consult.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsufficientCapacity {
    /// Per-component verdict
    pub verdict: BundleVerdict,
    /// Substitutes per failing component
    pub alternatives: AlternativeSet,
}

/// Umbrella error returned by engine operations.
#[derive(Error, Debug)]
pub enum BookingError {
    /// Malformed request
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Inventory could not answer
    #[error("availability unknown: {0}")]
    AvailabilityUnknown(ProviderError),

    /// Legitimately unavailable
    #[error("insufficient capacity: {}", .0.alternatives.summary)]
    InsufficientCapacity(Box<InsufficientCapacity>),

    /// Race lost at commit
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Capacity left unreconciled after a failure; the resources are fenced
    #[error(transparent)]
    Compensation(#[from] CompensationError),

    /// Cancellation refused
    #[error("cancellation refused: {0}")]
    Policy(#[from] PolicyError),

    /// Programmer error (operation invoked in the wrong state)
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No booking with that code
    #[error("booking {0} not found")]
    NotFound(ConfirmationCode),

    /// Persistence failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl BookingError {
    /// Builds an `InsufficientCapacity` error
    #[must_use]
    pub fn insufficient(verdict: BundleVerdict, alternatives: AlternativeSet) -> Self {
        Self::InsufficientCapacity(Box::new(InsufficientCapacity {
            verdict,
            alternatives,
        }))
    }
}

impl From<ProviderError> for BookingError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::UnknownResource(resource) => {
                Self::Validation(ValidationError::UnknownResource { resource })
            }
            ProviderError::InvalidOperation { reason } => Self::InvalidState(reason),
            other => Self::AvailabilityUnknown(other),
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, BookingError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    #[test]
    fn test_provider_errors_map_to_taxonomy() {
        let key = ResourceKey::new(ResourceKind::RoomType, "double");

        let err: BookingError = ProviderError::UnknownResource(key.clone()).into();
        assert!(matches!(
            err,
            BookingError::Validation(ValidationError::UnknownResource { .. })
        ));

        let err: BookingError = ProviderError::Timeout {
            operation: "query_capacity",
            resource: key,
        }
        .into();
        assert!(matches!(err, BookingError::AvailabilityUnknown(_)));
    }

    #[test]
    fn test_conflict_message_mentions_revalidation() {
        let err = ConflictError {
            changes: vec![ComponentConflict {
                index: 0,
                resource: ResourceKey::new(ResourceKind::RoomType, "double"),
                requested: 1,
                available: Some(0),
                cause: ConflictCause::CapacityChanged,
            }],
        };
        assert!(err.to_string().contains("re-validate"));
        assert!(err.references(&ResourceKey::new(ResourceKind::RoomType, "double")));
    }
}
