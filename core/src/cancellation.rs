//! Cancellation policy engine.
//!
//! Pure rules only: [`CancellationPolicy::quote`] computes the tier and amounts for a
//! booking at a given instant, [`CancellationPolicy::authorize`] checks the
//! preconditions of a cancellation. Releasing capacity and persisting the cancelled
//! booking happen in the engine, under the booking's resource locks.

use crate::error::PolicyError;
use crate::policy::PolicyConfig;
use crate::types::{Booking, BookingStatus, CancellationQuote, PenaltyTier};
use chrono::{DateTime, Duration, Utc};

/// Tiered penalty schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CancellationPolicy {
    free_window: Duration,
    mid_window: Duration,
    partial_penalty_percent: u32,
}

impl CancellationPolicy {
    /// Creates a schedule; hours must satisfy `free > mid > 0` (see [`PolicyConfig::validate`]).
    #[must_use]
    pub fn new(
        free_window_hours: u32,
        mid_window_hours: u32,
        partial_penalty_percent: u32,
    ) -> Self {
        Self {
            free_window: Duration::hours(i64::from(free_window_hours)),
            mid_window: Duration::hours(i64::from(mid_window_hours)),
            partial_penalty_percent,
        }
    }

    /// Uses the thresholds of `policy`
    #[must_use]
    pub fn from_policy(policy: &PolicyConfig) -> Self {
        Self::new(
            policy.free_window_hours,
            policy.mid_window_hours,
            policy.partial_penalty_percent,
        )
    }

    /// Tier and penalty percent for the time left until check-in.
    ///
    /// Compares the exact remaining duration, so 71h59m is below a 72h window.
    #[must_use]
    pub fn tier_for(&self, remaining: Duration) -> (PenaltyTier, u32) {
        if remaining >= self.free_window {
            (PenaltyTier::Free, 0)
        } else if remaining >= self.mid_window {
            (PenaltyTier::Partial, self.partial_penalty_percent)
        } else {
            (PenaltyTier::Full, 100)
        }
    }

    /// Cancellation terms for `booking` at `now`.
    #[must_use]
    pub fn quote(&self, booking: &Booking, now: DateTime<Utc>) -> CancellationQuote {
        let remaining = booking.check_in_at - now;
        let (tier, penalty_percent) = self.tier_for(remaining);

        let paid_total = booking.price.total;
        let penalty_amount = paid_total.portion_percent(penalty_percent);
        // penalty_percent <= 100, so the penalty never exceeds what was paid
        let refund_amount = paid_total.checked_sub(penalty_amount).unwrap_or_default();

        CancellationQuote {
            confirmation_code: booking.confirmation_code.clone(),
            quoted_at: now,
            check_in_at: booking.check_in_at,
            hours_until_check_in: remaining.num_hours(),
            minutes_until_check_in: remaining.num_minutes(),
            tier,
            penalty_percent,
            paid_total,
            penalty_amount,
            refund_amount,
        }
    }

    /// Checks every precondition of a cancellation, in order: status, check-in not
    /// reached, penalty accepted, reason given.
    ///
    /// # Errors
    ///
    /// The first [`PolicyError`] that applies.
    pub fn authorize(
        &self,
        booking: &Booking,
        quote: &CancellationQuote,
        accepted_penalty: bool,
        reason: &str,
    ) -> Result<(), PolicyError> {
        match booking.status {
            BookingStatus::Confirmed => {}
            BookingStatus::Cancelled => {
                return Err(PolicyError::AlreadyCancelled(booking.confirmation_code.clone()));
            }
            BookingStatus::Completed => {
                return Err(PolicyError::AlreadyStarted {
                    hours_until_check_in: quote.hours_until_check_in,
                });
            }
            BookingStatus::Pending => {
                return Err(PolicyError::NotCancellable(booking.status));
            }
        }

        if quote.check_in_reached() {
            return Err(PolicyError::AlreadyStarted {
                hours_until_check_in: quote.hours_until_check_in,
            });
        }

        if quote.penalty_percent > 0 && !accepted_penalty {
            return Err(PolicyError::PenaltyNotAccepted {
                penalty_percent: quote.penalty_percent,
            });
        }

        if reason.trim().is_empty() {
            return Err(PolicyError::MissingReason);
        }

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{
        BundleMetadata, BundleRequest, ComponentRequest, ConfirmationCode, DateRange, HotelId,
        Money, PriceBreakdown, ResourceId,
    };
    use chrono::{NaiveDate, TimeZone};

    fn booking(total: u64, check_in_at: DateTime<Utc>, status: BookingStatus) -> Booking {
        let dates = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
        )
        .unwrap();
        Booking {
            confirmation_code: ConfirmationCode::new("BKG-20250101-000001"),
            bundle: BundleRequest {
                hotel_id: HotelId::new("grand"),
                dates,
                components: vec![ComponentRequest::RoomBlock {
                    room_type: ResourceId::new("double"),
                    quantity: 1,
                    dates,
                }],
                metadata: BundleMetadata::default(),
            },
            price: PriceBreakdown {
                lines: vec![],
                subtotal: Money::from_minor(total),
                bundle_discount_bps: 0,
                discount_amount: Money::ZERO,
                discounted_subtotal: Money::from_minor(total),
                tax_rate_bps: 0,
                tax: Money::ZERO,
                total: Money::from_minor(total),
            },
            status,
            created_at: check_in_at - Duration::days(30),
            check_in_at,
            holds: vec![],
            cancellation: None,
        }
    }

    fn check_in() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap()
    }

    fn policy() -> CancellationPolicy {
        CancellationPolicy::from_policy(&PolicyConfig::default())
    }

    #[test]
    fn test_tier_boundaries() {
        let policy = policy();
        let at = |minutes: i64| policy.tier_for(Duration::minutes(minutes));

        assert_eq!(at(72 * 60), (PenaltyTier::Free, 0));
        assert_eq!(at(72 * 60 - 1), (PenaltyTier::Partial, 50));
        assert_eq!(at(24 * 60), (PenaltyTier::Partial, 50));
        assert_eq!(at(24 * 60 - 1), (PenaltyTier::Full, 100));
        assert_eq!(at(1), (PenaltyTier::Full, 100));
    }

    #[test]
    fn test_partial_scenario() {
        let booking = booking(749_700, check_in(), BookingStatus::Confirmed);
        let quote = policy().quote(&booking, check_in() - Duration::hours(30));

        assert_eq!(quote.tier, PenaltyTier::Partial);
        assert_eq!(quote.hours_until_check_in, 30);
        assert_eq!(quote.penalty_amount, Money::from_minor(374_850));
        assert_eq!(quote.refund_amount, Money::from_minor(374_850));
    }

    #[test]
    fn test_authorize_order() {
        let policy = policy();
        let now = check_in() - Duration::hours(30);

        let cancelled = booking(100, check_in(), BookingStatus::Cancelled);
        let quote = policy.quote(&cancelled, now);
        assert!(matches!(
            policy.authorize(&cancelled, &quote, true, "x"),
            Err(PolicyError::AlreadyCancelled(_))
        ));

        let pending = booking(100, check_in(), BookingStatus::Pending);
        assert_eq!(
            policy.authorize(&pending, &quote, true, "x"),
            Err(PolicyError::NotCancellable(BookingStatus::Pending))
        );

        let confirmed = booking(100, check_in(), BookingStatus::Confirmed);
        assert_eq!(
            policy.authorize(&confirmed, &quote, false, ""),
            Err(PolicyError::PenaltyNotAccepted { penalty_percent: 50 })
        );
        assert_eq!(
            policy.authorize(&confirmed, &quote, true, "   "),
            Err(PolicyError::MissingReason)
        );
        assert_eq!(policy.authorize(&confirmed, &quote, true, "event moved"), Ok(()));
    }

    #[test]
    fn test_free_tier_needs_no_acceptance() {
        let policy = policy();
        let confirmed = booking(100, check_in(), BookingStatus::Confirmed);
        let quote = policy.quote(&confirmed, check_in() - Duration::days(5));
        assert_eq!(quote.refund_amount, Money::from_minor(100));
        assert_eq!(policy.authorize(&confirmed, &quote, false, "plans changed"), Ok(()));
    }

    #[test]
    fn test_started_booking_cannot_be_cancelled() {
        let policy = policy();
        let confirmed = booking(100, check_in(), BookingStatus::Confirmed);

        for now in [check_in(), check_in() + Duration::hours(2)] {
            let quote = policy.quote(&confirmed, now);
            assert!(matches!(
                policy.authorize(&confirmed, &quote, true, "too late"),
                Err(PolicyError::AlreadyStarted { .. })
            ));
        }

        let completed = booking(100, check_in(), BookingStatus::Completed);
        let quote = policy.quote(&completed, check_in() - Duration::days(1));
        assert!(matches!(
            policy.authorize(&completed, &quote, true, "x"),
            Err(PolicyError::AlreadyStarted { .. })
        ));
    }
}
