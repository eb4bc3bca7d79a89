//! Booking persistence boundary.
//!
//! Bookings are owned by the commit coordinator's storage boundary: they are
//! inserted once at commit and only ever updated by cancellation.

use crate::environment::Clock;
use crate::error::StoreError;
use crate::types::{Booking, ConfirmationCode, HotelId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Storage for committed bookings.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persists a new booking.
    ///
    /// # Errors
    ///
    /// [`StoreError::DuplicateCode`] if the confirmation code is already taken.
    async fn insert(&self, booking: Booking) -> Result<(), StoreError>;

    /// Loads a booking by confirmation code.
    ///
    /// # Errors
    ///
    /// Backend failures only; a missing booking is `Ok(None)`.
    async fn get(&self, code: &ConfirmationCode) -> Result<Option<Booking>, StoreError>;

    /// Replaces an existing booking.
    ///
    /// # Errors
    ///
    /// [`StoreError::Missing`] if no booking has that code.
    async fn update(&self, booking: Booking) -> Result<(), StoreError>;

    /// Bookings of a hotel, oldest first.
    ///
    /// # Errors
    ///
    /// Backend failures only.
    async fn list_by_hotel(&self, hotel: &HotelId) -> Result<Vec<Booking>, StoreError>;
}

/// In-memory [`BookingStore`].
#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    bookings: RwLock<HashMap<ConfirmationCode, Booking>>,
}

impl InMemoryBookingStore {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookings
    pub async fn len(&self) -> usize {
        self.bookings.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.bookings.read().await.is_empty()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.confirmation_code) {
            return Err(StoreError::DuplicateCode(booking.confirmation_code));
        }
        bookings.insert(booking.confirmation_code.clone(), booking);
        Ok(())
    }

    async fn get(&self, code: &ConfirmationCode) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read().await.get(code).cloned())
    }

    async fn update(&self, booking: Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        match bookings.get_mut(&booking.confirmation_code) {
            Some(existing) => {
                *existing = booking;
                Ok(())
            }
            None => Err(StoreError::Missing(booking.confirmation_code)),
        }
    }

    async fn list_by_hotel(&self, hotel: &HotelId) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| &b.bundle.hotel_id == hotel)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.confirmation_code.cmp(&b.confirmation_code))
        });
        Ok(bookings)
    }
}

/// Generates `{prefix}-{YYYYMMDD}-{sequence:06}` codes.
///
/// The sequence is process-wide and monotonic; it starts from the clock's
/// second-of-day so a restarted process does not replay the previous run's codes
/// for the same day. Uniqueness is still enforced by [`BookingStore::insert`].
#[derive(Debug)]
pub struct ConfirmationCodeGenerator {
    prefix: String,
    sequence: AtomicU64,
}

impl ConfirmationCodeGenerator {
    /// Creates a generator seeded from `clock`
    #[must_use]
    pub fn new(prefix: impl Into<String>, clock: &dyn Clock) -> Self {
        let now = clock.now();
        let seed = now.timestamp().rem_euclid(86_400).unsigned_abs() * 10;
        Self {
            prefix: prefix.into(),
            sequence: AtomicU64::new(seed),
        }
    }

    /// Next code for a booking committed at `at`
    pub fn next(&self, at: DateTime<Utc>) -> ConfirmationCode {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        ConfirmationCode::new(format!(
            "{}-{}-{:06}",
            self.prefix,
            at.format("%Y%m%d"),
            sequence
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    struct AtMidnight;

    impl Clock for AtMidnight {
        fn now(&self) -> DateTime<Utc> {
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
        }
    }

    #[test]
    fn test_codes_are_prefixed_and_unique() {
        let generator = ConfirmationCodeGenerator::new("BKG", &AtMidnight);
        let at = AtMidnight.now();

        let first = generator.next(at);
        assert_eq!(first.as_str(), "BKG-20250101-000001");

        let codes: HashSet<_> = (0..500).map(|_| generator.next(at)).collect();
        assert_eq!(codes.len(), 500);
        assert!(!codes.contains(&first));
    }

    #[tokio::test]
    async fn test_missing_booking_is_none() {
        let store = InMemoryBookingStore::new();
        let found = store.get(&ConfirmationCode::new("BKG-1")).await.unwrap();
        assert!(found.is_none());
        assert!(store.is_empty().await);
    }
}
