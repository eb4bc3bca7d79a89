//! Domain types for the booking engine.
//!
//! Requests arrive as closed, tagged variants (one per resource kind), are validated once
//! at the boundary via [`BundleRequest::validate`], and flow through the engine as
//! strongly-typed values from then on.

use crate::error::ValidationError;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a hotel (the scope every resource lives in).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotelId(String);

impl HotelId {
    /// Creates a new `HotelId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HotelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier (or type tag) of a bookable resource, e.g. `"double"` or `"ballroom"`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates a new `ResourceId`
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable booking reference, generated only at successful commit.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmationCode(String);

impl ConfirmationCode {
    /// Wraps an existing code (e.g. one received from a caller)
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfirmationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier that makes a capacity decrement/increment pair idempotent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Creates an `OperationId` from an arbitrary string
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Operation id for one component of a commit attempt.
    #[must_use]
    pub fn for_component(attempt: Uuid, index: usize) -> Self {
        Self(format!("commit-{attempt}-{index}"))
    }

    /// Returns the identifier as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (minor currency units to avoid floating point errors)
// ============================================================================

/// Basis points in one whole (100%).
pub const BPS_PER_WHOLE: u32 = 10_000;

/// Money in minor currency units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Multiplies money by a unit count with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, units: u64) -> Option<Self> {
        match self.0.checked_mul(units) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Portion of this amount expressed in basis points, rounded half-up to the minor unit.
    ///
    /// `Money::from_minor(630_000).portion_bps(1_900) == Money::from_minor(119_700)`
    #[must_use]
    pub fn portion_bps(self, bps: u32) -> Self {
        let scaled = u128::from(self.0) * u128::from(bps) + u128::from(BPS_PER_WHOLE / 2);
        let rounded = scaled / u128::from(BPS_PER_WHOLE);
        // bps is bounded by policy validation, so the result fits back into u64 for any sane amount
        Self(u64::try_from(rounded).unwrap_or(u64::MAX))
    }

    /// Portion of this amount expressed as a whole percentage, rounded half-up.
    #[must_use]
    pub fn portion_percent(self, percent: u32) -> Self {
        self.portion_bps(percent.saturating_mul(100))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Dates and time windows
// ============================================================================

/// Half-open range of calendar dates: `start` inclusive, `end` exclusive.
///
/// For room blocks each date in the range is a night; for function rooms it is a day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateRange {
    /// First date (inclusive)
    pub start: NaiveDate,
    /// Last date (exclusive)
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a range, rejecting empty or inverted ones.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidDateRange`] unless `start < end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ValidationError> {
        let range = Self { start, end };
        if range.is_valid() {
            Ok(range)
        } else {
            Err(ValidationError::InvalidDateRange {
                component: None,
                start,
                end,
            })
        }
    }

    /// `true` when `start < end`
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.start < self.end
    }

    /// Number of nights (or days) covered
    #[must_use]
    pub fn nights(&self) -> u32 {
        u32::try_from((self.end - self.start).num_days()).unwrap_or(0)
    }

    /// Whether `other` lies entirely within this range
    #[must_use]
    pub fn contains_range(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the night `date` is covered
    #[must_use]
    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Half-open overlap test
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Same-length range moved by `days` (negative moves earlier)
    #[must_use]
    pub fn shift_days(&self, days: i64) -> Option<Self> {
        let delta = Duration::try_days(days)?;
        Some(Self {
            start: self.start.checked_add_signed(delta)?,
            end: self.end.checked_add_signed(delta)?,
        })
    }

    /// Iterates over every covered date
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take_while(move |d| *d < self.end)
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Half-open time-of-day window used by function rooms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start time (inclusive)
    pub start: NaiveTime,
    /// End time (exclusive)
    pub end: NaiveTime,
}

impl TimeWindow {
    /// Creates a window; `None` if `start >= end`
    #[must_use]
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    /// `existing.start < requested.end && requested.start < existing.end`
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Whether two optional windows compete for the same slot. A missing window means the whole day.
#[must_use]
pub fn windows_conflict(a: Option<&TimeWindow>, b: Option<&TimeWindow>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.overlaps(b),
        _ => true,
    }
}

// ============================================================================
// Resources
// ============================================================================

/// The three independently managed kinds of resource a bundle can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A block of hotel rooms of one type
    RoomType,
    /// A meeting/event room booked by day and optional time window
    FunctionRoom,
    /// A catering service sized by headcount
    Catering,
}

impl ResourceKind {
    /// All kinds, in lock order
    pub const ALL: [Self; 3] = [Self::RoomType, Self::FunctionRoom, Self::Catering];

    /// Stable snake-case label (used in logs and metric labels)
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RoomType => "room_type",
            Self::FunctionRoom => "function_room",
            Self::Catering => "catering",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully-qualified resource reference. Its ordering is the lock-acquisition order.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceKey {
    /// Resource kind
    pub kind: ResourceKind,
    /// Resource identifier or type tag
    pub id: ResourceId,
}

impl ResourceKey {
    /// Creates a new `ResourceKey`
    #[must_use]
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: ResourceId::new(id),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Static description of a resource as published by the inventory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Resource reference
    #[serde(flatten)]
    pub key: ResourceKey,
    /// Hotel owning the resource
    pub hotel_id: HotelId,
    /// Display name
    pub name: String,
    /// Price per unit per billing unit (night, day, or cover)
    pub unit_price: Money,
    /// Units available per night/day before any booking
    pub capacity: u32,
}

/// One row of the catalog returned when a bundle is started.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Resource description
    pub descriptor: ResourceDescriptor,
    /// Remaining capacity over the requested dates
    pub remaining: u32,
}

// ============================================================================
// Requests
// ============================================================================

/// One line item of a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentRequest {
    /// `quantity` rooms of `room_type` for every night in `dates`
    RoomBlock {
        /// Room type tag (e.g. "double")
        room_type: ResourceId,
        /// Number of rooms
        quantity: u32,
        /// Nights
        dates: DateRange,
    },
    /// A function room for every day in `dates`, optionally limited to a time window
    FunctionRoom {
        /// Function room identifier
        room_id: ResourceId,
        /// Days
        dates: DateRange,
        /// Optional time window on each day
        #[serde(default)]
        window: Option<TimeWindow>,
    },
    /// One catering order for `headcount` covers
    Catering {
        /// Catering service identifier
        service_id: ResourceId,
        /// Number of covers
        headcount: u32,
        /// Service dates
        dates: DateRange,
    },
}

impl ComponentRequest {
    /// Resource kind of this component
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::RoomBlock { .. } => ResourceKind::RoomType,
            Self::FunctionRoom { .. } => ResourceKind::FunctionRoom,
            Self::Catering { .. } => ResourceKind::Catering,
        }
    }

    /// Resource identifier of this component
    #[must_use]
    pub const fn resource_id(&self) -> &ResourceId {
        match self {
            Self::RoomBlock { room_type, .. } => room_type,
            Self::FunctionRoom { room_id, .. } => room_id,
            Self::Catering { service_id, .. } => service_id,
        }
    }

    /// Resource key (kind + id)
    #[must_use]
    pub fn resource_key(&self) -> ResourceKey {
        ResourceKey {
            kind: self.kind(),
            id: self.resource_id().clone(),
        }
    }

    /// Requested dates
    #[must_use]
    pub const fn dates(&self) -> &DateRange {
        match self {
            Self::RoomBlock { dates, .. }
            | Self::FunctionRoom { dates, .. }
            | Self::Catering { dates, .. } => dates,
        }
    }

    /// Time window (function rooms only)
    #[must_use]
    pub const fn window(&self) -> Option<&TimeWindow> {
        match self {
            Self::FunctionRoom { window, .. } => window.as_ref(),
            _ => None,
        }
    }

    /// Units to take from capacity: rooms, 1 function room, or covers
    #[must_use]
    pub const fn requested_units(&self) -> u32 {
        match self {
            Self::RoomBlock { quantity, .. } => *quantity,
            Self::FunctionRoom { .. } => 1,
            Self::Catering { headcount, .. } => *headcount,
        }
    }

    /// Billing multiplier: nights for rooms, days for function rooms, one per catering order
    #[must_use]
    pub fn billing_units(&self) -> u32 {
        match self {
            Self::RoomBlock { dates, .. } | Self::FunctionRoom { dates, .. } => dates.nights(),
            Self::Catering { .. } => 1,
        }
    }
}

/// Free-form metadata carried with a bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleMetadata {
    /// Event name (e.g. "Annual sales kickoff")
    #[serde(default)]
    pub event_name: Option<String>,
    /// Contact person or email
    #[serde(default)]
    pub contact: Option<String>,
}

/// An ordered set of components committed together as one atomic unit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleRequest {
    /// Hotel the bundle is booked at
    pub hotel_id: HotelId,
    /// Overall window every component must fall within
    pub dates: DateRange,
    /// Line items, in caller order
    pub components: Vec<ComponentRequest>,
    /// Event name / contact
    #[serde(default)]
    pub metadata: BundleMetadata,
}

impl BundleRequest {
    /// Checks every structural invariant of the request.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.hotel_id.as_str().trim().is_empty() {
            return Err(ValidationError::MissingHotel);
        }
        if !self.dates.is_valid() {
            return Err(ValidationError::InvalidDateRange {
                component: None,
                start: self.dates.start,
                end: self.dates.end,
            });
        }
        if self.components.is_empty() {
            return Err(ValidationError::EmptyBundle);
        }

        let mut seen = HashSet::new();
        for (index, component) in self.components.iter().enumerate() {
            let dates = component.dates();
            if !dates.is_valid() {
                return Err(ValidationError::InvalidDateRange {
                    component: Some(index),
                    start: dates.start,
                    end: dates.end,
                });
            }
            if !self.dates.contains_range(dates) {
                return Err(ValidationError::OutsideBundleWindow {
                    component: index,
                    dates: *dates,
                    bundle: self.dates,
                });
            }
            if component.requested_units() == 0 {
                return Err(ValidationError::ZeroQuantity { component: index });
            }
            if component.resource_id().as_str().trim().is_empty() {
                return Err(ValidationError::EmptyIdentifier { component: index });
            }
            if let ComponentRequest::FunctionRoom {
                window: Some(window),
                ..
            } = component
            {
                if window.start >= window.end {
                    return Err(ValidationError::InvalidTimeWindow { component: index });
                }
            }
            let key = component.resource_key();
            if !seen.insert(key.clone()) {
                return Err(ValidationError::DuplicateResource { resource: key });
            }
        }
        Ok(())
    }

    /// Resource keys touched by the bundle, sorted and de-duplicated (the lock order).
    #[must_use]
    pub fn resource_keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self
            .components
            .iter()
            .map(ComponentRequest::resource_key)
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Number of distinct resource kinds (more than one makes the bundle a package)
    #[must_use]
    pub fn distinct_kinds(&self) -> usize {
        self.components
            .iter()
            .map(ComponentRequest::kind)
            .collect::<HashSet<_>>()
            .len()
    }
}

// ============================================================================
// Verdicts and alternatives
// ============================================================================

/// Availability verdict for one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentVerdict {
    /// Position of the component in the bundle
    pub index: usize,
    /// Resource queried
    pub resource: ResourceKey,
    /// Units requested
    pub requested: u32,
    /// Units remaining over the component's dates (and window)
    pub available: u32,
    /// `available >= requested`
    pub sufficient: bool,
    /// `requested - available` when insufficient
    pub shortfall: Option<u32>,
    /// Unit price reported by the inventory
    pub unit_price: Money,
}

impl ComponentVerdict {
    /// Builds a verdict from the requested and available counts
    #[must_use]
    pub fn new(
        index: usize,
        resource: ResourceKey,
        requested: u32,
        available: u32,
        unit_price: Money,
    ) -> Self {
        let sufficient = available >= requested;
        Self {
            index,
            resource,
            requested,
            available,
            sufficient,
            shortfall: (!sufficient).then(|| requested - available),
            unit_price,
        }
    }
}

/// Aggregated verdict for a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleVerdict {
    /// Per-component verdicts, in bundle order
    pub components: Vec<ComponentVerdict>,
    /// Logical AND of every component's `sufficient`
    pub all_sufficient: bool,
}

impl BundleVerdict {
    /// Aggregates component verdicts
    #[must_use]
    pub fn from_components(components: Vec<ComponentVerdict>) -> Self {
        let all_sufficient = components.iter().all(|c| c.sufficient);
        Self {
            components,
            all_sufficient,
        }
    }

    /// Components that cannot be satisfied
    pub fn insufficient(&self) -> impl Iterator<Item = &ComponentVerdict> {
        self.components.iter().filter(|c| !c.sufficient)
    }
}

/// A substitute the caller may explicitly re-request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeCandidate {
    /// Substitute resource
    pub resource: ResourceKey,
    /// Dates the substitute is free for
    pub dates: DateRange,
    /// Units available
    pub available: u32,
    /// `available - requested` (over-provisioning)
    pub capacity_delta: u32,
    /// Days the dates moved from the original request
    pub date_delta_days: u32,
    /// Unit price of the substitute
    pub unit_price: Money,
}

/// Ranked substitutes for one failing component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentAlternatives {
    /// Position of the failing component in the bundle
    pub index: usize,
    /// What was originally requested
    pub requested_resource: ResourceKey,
    /// Units originally requested
    pub requested: u32,
    /// Candidates, best first
    pub candidates: Vec<AlternativeCandidate>,
    /// Why `candidates` is empty, when it is
    pub reason: Option<String>,
}

/// Alternatives for every failing component of a bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternativeSet {
    /// One entry per insufficient component
    pub components: Vec<ComponentAlternatives>,
    /// Human-readable summary
    pub summary: String,
}

// ============================================================================
// Pricing
// ============================================================================

/// Subtotal of one component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLine {
    /// Position of the component in the bundle
    pub index: usize,
    /// Priced resource
    pub resource: ResourceKey,
    /// Unit price
    pub unit_price: Money,
    /// Rooms, function rooms or covers
    pub units: u32,
    /// Nights, days, or 1 for catering
    pub billing_units: u32,
    /// `unit_price * units * billing_units`
    pub subtotal: Money,
}

/// Complete price of a bundle, all amounts in minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    /// Per-component lines
    pub lines: Vec<PriceLine>,
    /// Sum of line subtotals
    pub subtotal: Money,
    /// Discount applied (0 for single-kind bundles)
    pub bundle_discount_bps: u32,
    /// `round_half_up(subtotal * discount)`
    pub discount_amount: Money,
    /// `subtotal - discount_amount`
    pub discounted_subtotal: Money,
    /// Tax rate
    pub tax_rate_bps: u32,
    /// `round_half_up(discounted_subtotal * tax)`
    pub tax: Money,
    /// `discounted_subtotal + tax`
    pub total: Money,
}

impl PriceBreakdown {
    /// Recovers the tax-exclusive amount from `total`, rounded half-up.
    #[must_use]
    pub fn pre_tax_from_total(&self) -> Money {
        let divisor = u128::from(BPS_PER_WHOLE) + u128::from(self.tax_rate_bps);
        let scaled = u128::from(self.total.minor()) * u128::from(BPS_PER_WHOLE) + divisor / 2;
        Money::from_minor(u64::try_from(scaled / divisor).unwrap_or(u64::MAX))
    }
}

// ============================================================================
// Bookings
// ============================================================================

/// Booking lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Not yet committed
    Pending,
    /// Capacity reserved, code issued
    Confirmed,
    /// Cancelled through the cancellation policy
    Cancelled,
    /// Stay/event elapsed (driven externally)
    Completed,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        };
        f.write_str(label)
    }
}

/// Capacity taken by one component at commit, released again on cancellation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityHold {
    /// Position of the component in the bundle
    pub index: usize,
    /// Resource decremented
    pub resource: ResourceKey,
    /// Operation id used for the decrement (and the paired increment)
    pub operation_id: OperationId,
}

/// Details recorded when a booking is cancelled.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRecord {
    /// When the cancellation was accepted
    pub cancelled_at: DateTime<Utc>,
    /// Caller-supplied reason
    pub reason: String,
    /// Quote the cancellation was settled with
    pub quote: CancellationQuote,
}

/// A committed booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Unique confirmation code
    pub confirmation_code: ConfirmationCode,
    /// The committed request
    pub bundle: BundleRequest,
    /// Price the booking was committed at
    pub price: PriceBreakdown,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Commit time
    pub created_at: DateTime<Utc>,
    /// Start of the overall date range
    pub check_in_at: DateTime<Utc>,
    /// Capacity reserved per component
    pub holds: Vec<CapacityHold>,
    /// Present once cancelled
    pub cancellation: Option<CancellationRecord>,
}

impl Booking {
    /// Returns a copy transitioned to `Cancelled`
    #[must_use]
    pub fn cancelled(&self, record: CancellationRecord) -> Self {
        Self {
            status: BookingStatus::Cancelled,
            cancellation: Some(record),
            ..self.clone()
        }
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cancellation penalty bracket
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyTier {
    /// No penalty
    Free,
    /// Partial penalty (50% by default)
    Partial,
    /// Whole amount retained
    Full,
}

impl PenaltyTier {
    /// Stable label
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Partial => "partial",
            Self::Full => "full",
        }
    }
}

/// Computed (never stored on its own) cancellation terms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationQuote {
    /// Booking quoted
    pub confirmation_code: ConfirmationCode,
    /// Moment the quote was computed for
    pub quoted_at: DateTime<Utc>,
    /// Check-in instant of the booking
    pub check_in_at: DateTime<Utc>,
    /// Whole hours until check-in (negative once started)
    pub hours_until_check_in: i64,
    /// Whole minutes until check-in
    pub minutes_until_check_in: i64,
    /// Penalty bracket
    pub tier: PenaltyTier,
    /// Penalty in percent of the paid total
    pub penalty_percent: u32,
    /// Total paid
    pub paid_total: Money,
    /// `round_half_up(paid_total * penalty_percent / 100)`
    pub penalty_amount: Money,
    /// `paid_total - penalty_amount`
    pub refund_amount: Money,
}

impl CancellationQuote {
    /// Whether check-in has been reached at quote time
    #[must_use]
    pub fn check_in_reached(&self) -> bool {
        self.quoted_at >= self.check_in_at
    }
}
