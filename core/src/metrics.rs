//! Business metrics for the booking engine.
//!
//! Recorded through the `metrics` facade; the server binary installs the Prometheus
//! exporter. Without an installed recorder every call is a no-op.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `booking_commits_total{outcome}` - Commit attempts by outcome
//! - `booking_validations_total{result}` - Bundle validations (available, insufficient)
//! - `booking_cancellations_total{tier}` - Cancellations by penalty tier
//! - `booking_refunds_minor_units_total` - Refunded amount in minor units
//! - `booking_revenue_minor_units_total` - Committed totals in minor units
//!
//! ## Gauges
//! - `booking_compensations_pending` - Compensating inventory calls waiting for a retry
//!
//! ## Histograms
//! - `booking_commit_duration_seconds` - Time spent in the commit critical section

use crate::types::PenaltyTier;
use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Outcome label of a commit attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Booking persisted
    Confirmed,
    /// Lost a race or hit a provider failure, rolled back
    Conflicted,
    /// Malformed request
    Rejected,
}

impl CommitOutcome {
    const fn label(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Conflicted => "conflicted",
            Self::Rejected => "rejected",
        }
    }
}

/// Registers metric descriptions. Call once at startup.
pub fn register_booking_metrics() {
    describe_counter!(
        "booking_commits_total",
        "Commit attempts by outcome (confirmed, conflicted, rejected)"
    );
    describe_counter!(
        "booking_validations_total",
        "Bundle validations by result (available, insufficient)"
    );
    describe_counter!(
        "booking_cancellations_total",
        "Cancellations by penalty tier (free, partial, full)"
    );
    describe_counter!(
        "booking_refunds_minor_units_total",
        "Refunded amount in minor currency units"
    );
    describe_counter!(
        "booking_revenue_minor_units_total",
        "Committed booking totals in minor currency units"
    );
    describe_gauge!(
        "booking_compensations_pending",
        "Rollbacks and restores that failed and are queued for retry"
    );
    describe_histogram!(
        "booking_commit_duration_seconds",
        "Time spent inside the commit critical section"
    );

    tracing::info!("Booking metrics registered");
}

/// Record the outcome of a commit attempt.
pub fn record_commit(outcome: CommitOutcome, duration_secs: f64) {
    metrics::counter!("booking_commits_total", "outcome" => outcome.label()).increment(1);
    metrics::histogram!("booking_commit_duration_seconds").record(duration_secs);
}

/// Record revenue of a confirmed booking.
pub fn record_revenue(total_minor: u64) {
    metrics::counter!("booking_revenue_minor_units_total").increment(total_minor);
}

/// Record a bundle validation.
pub fn record_validation(all_sufficient: bool) {
    let result = if all_sufficient { "available" } else { "insufficient" };
    metrics::counter!("booking_validations_total", "result" => result).increment(1);
}

/// Record the size of the compensation queue.
#[allow(clippy::cast_precision_loss)]
pub fn record_pending_compensations(pending: usize) {
    metrics::gauge!("booking_compensations_pending").set(pending as f64);
}

/// Record a completed cancellation.
///
/// # Arguments
///
/// * `tier` - Penalty tier the cancellation was settled in
/// * `refund_minor` - Refund amount in minor units
pub fn record_cancellation(tier: PenaltyTier, refund_minor: u64) {
    metrics::counter!("booking_cancellations_total", "tier" => tier.as_str()).increment(1);
    metrics::counter!("booking_refunds_minor_units_total").increment(refund_minor);
    tracing::debug!(tier = tier.as_str(), refund_minor, "Recorded cancellation metric");
}
