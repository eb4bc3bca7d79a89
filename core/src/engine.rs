//! `BookingEngine`: the operations offered to the booking wizard.
//!
//! Control flow:
//!
//! ```text
//! validate ──ok──▶ price ──▶ commit ──▶ confirmation
//!    │
//!    └─insufficient─▶ suggest ──▶ caller decides ──▶ validate again
//!
//! quote / cancel run independently against an existing booking
//! ```
//!
//! All pricing and policy arithmetic happens here; the HTTP boundary only renders results.

use crate::cancellation::CancellationPolicy;
use crate::compensation::{Compensation, Compensator, RetryPolicy};
use crate::coordinator::{CommitCoordinator, ResourceLocks};
use crate::environment::Clock;
use crate::error::{BookingError, ProviderError, ValidationError};
use crate::inventory::{InventoryProvider, TimedInventory};
use crate::metrics;
use crate::policy::PolicyConfig;
use crate::pricing::PricingCalculator;
use crate::store::{BookingStore, ConfirmationCodeGenerator};
use crate::suggester::{AlternativeSuggester, SearchBounds};
use crate::types::{
    AlternativeSet, Booking, BundleRequest, BundleVerdict, CancellationQuote, CancellationRecord,
    CapacityHold, CatalogEntry, ConfirmationCode, DateRange, HotelId, ResourceKind,
};
use crate::validator::AvailabilityValidator;
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;

/// Result of `validate_bundle`: the verdict, plus alternatives when it is not fully sufficient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Per-component verdict
    pub verdict: BundleVerdict,
    /// Present when `verdict.all_sufficient` is false
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alternatives: Option<AlternativeSet>,
}

/// Facade wiring validator, suggester, pricing, commit and cancellation together.
pub struct BookingEngine {
    policy: PolicyConfig,
    clock: Arc<dyn Clock>,
    provider: Arc<dyn InventoryProvider>,
    store: Arc<dyn BookingStore>,
    locks: Arc<ResourceLocks>,
    compensator: Arc<Compensator>,
    validator: AvailabilityValidator,
    suggester: AlternativeSuggester,
    pricing: PricingCalculator,
    coordinator: CommitCoordinator,
    cancellation: CancellationPolicy,
}

impl BookingEngine {
    /// Builds an engine. Every inventory call is bounded by `policy.provider_timeout_ms`.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidPolicy`] when `policy` is inconsistent.
    pub fn new(
        policy: PolicyConfig,
        provider: Arc<dyn InventoryProvider>,
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ValidationError> {
        policy.validate()?;

        let provider: Arc<dyn InventoryProvider> =
            Arc::new(TimedInventory::new(provider, policy.provider_timeout()));
        let locks = Arc::new(ResourceLocks::new());
        let compensator = Arc::new(Compensator::new(
            Arc::clone(&provider),
            RetryPolicy::default(),
        ));
        let coordinator = CommitCoordinator::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            Arc::clone(&locks),
            Arc::clone(&compensator),
            ConfirmationCodeGenerator::new(policy.confirmation_prefix.clone(), clock.as_ref()),
            Arc::clone(&clock),
            policy.check_in_time,
        );

        Ok(Self {
            validator: AvailabilityValidator::new(Arc::clone(&provider)),
            suggester: AlternativeSuggester::new(
                Arc::clone(&provider),
                SearchBounds::from(&policy),
            ),
            pricing: PricingCalculator::from_policy(&policy),
            cancellation: CancellationPolicy::from_policy(&policy),
            coordinator,
            policy,
            clock,
            provider,
            store,
            locks,
            compensator,
        })
    }

    /// Active policy
    #[must_use]
    pub const fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Catalog of every resource at `hotel` with its remaining capacity over `dates`.
    /// Read-only.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] for an empty hotel id or date range;
    /// [`BookingError::AvailabilityUnknown`] when the inventory cannot answer.
    pub async fn start_bundle(
        &self,
        hotel: &HotelId,
        dates: &DateRange,
    ) -> Result<Vec<CatalogEntry>, BookingError> {
        if hotel.as_str().trim().is_empty() {
            return Err(ValidationError::MissingHotel.into());
        }
        if !dates.is_valid() {
            return Err(ValidationError::InvalidDateRange {
                component: None,
                start: dates.start,
                end: dates.end,
            }
            .into());
        }

        let listed = try_join_all(
            ResourceKind::ALL
                .iter()
                .map(|kind| self.provider.list_resources(hotel, *kind)),
        )
        .await?;
        let descriptors: Vec<_> = listed.into_iter().flatten().collect();

        let remaining = try_join_all(
            descriptors
                .iter()
                .map(|d| self.provider.query_capacity(&d.key, dates, None)),
        )
        .await?;

        tracing::debug!(%hotel, %dates, resources = descriptors.len(), "catalog built");
        Ok(descriptors
            .into_iter()
            .zip(remaining)
            .map(|(descriptor, remaining)| CatalogEntry {
                descriptor,
                remaining,
            })
            .collect())
    }

    /// Verdict for `bundle`, with alternatives when anything is insufficient.
    ///
    /// # Errors
    ///
    /// [`BookingError::Validation`] or [`BookingError::AvailabilityUnknown`].
    pub async fn validate_bundle(
        &self,
        bundle: &BundleRequest,
    ) -> Result<ValidationOutcome, BookingError> {
        let verdict = self.validator.validate(bundle).await?;
        metrics::record_validation(verdict.all_sufficient);

        let alternatives = if verdict.all_sufficient {
            None
        } else {
            Some(self.suggester.suggest(bundle, &verdict).await?)
        };
        Ok(ValidationOutcome {
            verdict,
            alternatives,
        })
    }

    /// Validates, prices and commits `bundle`.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::PoliciesNotAccepted`] when `accepted_policies` is false
    /// - [`BookingError::InsufficientCapacity`] with verdict and alternatives
    /// - [`BookingError::Conflict`] when a concurrent commit won; re-validate first
    /// - [`BookingError::AvailabilityUnknown`] when the inventory cannot answer
    pub async fn confirm_bundle(
        &self,
        bundle: &BundleRequest,
        accepted_policies: bool,
    ) -> Result<Booking, BookingError> {
        if !accepted_policies {
            return Err(ValidationError::PoliciesNotAccepted.into());
        }

        let verdict = self.validator.validate(bundle).await?;
        metrics::record_validation(verdict.all_sufficient);
        if !verdict.all_sufficient {
            let alternatives = self.suggester.suggest(bundle, &verdict).await?;
            return Err(BookingError::insufficient(verdict, alternatives));
        }

        // priced outside any lock; the coordinator only re-checks capacity
        let price = self.pricing.price(bundle, &verdict)?;
        self.coordinator.commit(bundle, price).await
    }

    /// Loads a booking.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown code.
    pub async fn get_booking(&self, code: &ConfirmationCode) -> Result<Booking, BookingError> {
        self.store
            .get(code)
            .await?
            .ok_or_else(|| BookingError::NotFound(code.clone()))
    }

    /// Bookings of a hotel, oldest first.
    ///
    /// # Errors
    ///
    /// [`BookingError::Store`] on backend failure.
    pub async fn list_bookings(&self, hotel: &HotelId) -> Result<Vec<Booking>, BookingError> {
        Ok(self.store.list_by_hotel(hotel).await?)
    }

    /// Cancellation terms for a booking as of now. Computed, never stored.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] for an unknown code.
    pub async fn cancellation_quote(
        &self,
        code: &ConfirmationCode,
    ) -> Result<CancellationQuote, BookingError> {
        let booking = self.get_booking(code).await?;
        Ok(self.cancellation.quote(&booking, self.clock.now()))
    }

    /// Cancels a booking, releasing its capacity exactly once.
    ///
    /// Runs under the booking's resource locks, so a concurrent cancel of the same
    /// booking observes the first one's result and fails with `AlreadyCancelled`.
    /// The release is all-or-nothing: if any hold cannot be released, or the cancelled
    /// booking cannot be stored, the holds already released are taken back under their
    /// own operation ids and the booking stays confirmed. The call may then be retried.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] for an unknown code
    /// - [`BookingError::Policy`] when the policy refuses
    /// - [`BookingError::AvailabilityUnknown`] when capacity could not be released
    /// - [`BookingError::Compensation`] when released capacity could not be taken back;
    ///   the resources are fenced until [`Self::reconcile`] succeeds
    pub async fn cancel_booking(
        &self,
        code: &ConfirmationCode,
        reason: &str,
        accepted_penalty: bool,
    ) -> Result<Booking, BookingError> {
        let keys = self.get_booking(code).await?.bundle.resource_keys();
        let locks = self.locks.acquire(&keys).await;
        self.compensator.settle_pending(locks.keys()).await?;

        // re-read under lock
        let booking = self.get_booking(code).await?;
        let now = self.clock.now();
        let quote = self.cancellation.quote(&booking, now);
        self.cancellation
            .authorize(&booking, &quote, accepted_penalty, reason)?;

        let mut released: Vec<&CapacityHold> = Vec::with_capacity(booking.holds.len());
        for hold in &booking.holds {
            if let Err(error) = self
                .provider
                .increment_capacity(&hold.operation_id, &hold.resource)
                .await
            {
                tracing::warn!(
                    %code,
                    resource = %hold.resource,
                    %error,
                    "release failed, restoring holds"
                );
                self.restore(&booking, &released).await?;
                return Err(error.into());
            }
            released.push(hold);
        }

        let cancelled = booking.cancelled(CancellationRecord {
            cancelled_at: now,
            reason: reason.trim().to_string(),
            quote: quote.clone(),
        });
        if let Err(error) = self.store.update(cancelled.clone()).await {
            self.restore(&booking, &released).await?;
            return Err(error.into());
        }
        drop(locks);

        metrics::record_cancellation(quote.tier, quote.refund_amount.minor());
        tracing::info!(
            %code,
            tier = quote.tier.as_str(),
            penalty = quote.penalty_amount.minor(),
            refund = quote.refund_amount.minor(),
            "booking cancelled"
        );
        Ok(cancelled)
    }

    /// Re-takes released holds of a booking that stays confirmed.
    async fn restore(
        &self,
        booking: &Booking,
        released: &[&CapacityHold],
    ) -> Result<(), BookingError> {
        let restores = released
            .iter()
            .map(|hold| {
                let component = booking.bundle.components.get(hold.index).ok_or_else(|| {
                    BookingError::InvalidState(format!(
                        "booking {} has a hold for missing component {}",
                        booking.confirmation_code, hold.index
                    ))
                })?;
                Ok(Compensation::Restore {
                    hold: (*hold).clone(),
                    dates: *component.dates(),
                    window: component.window().copied(),
                    quantity: component.requested_units(),
                })
            })
            .collect::<Result<Vec<_>, BookingError>>()?;
        Ok(self.compensator.settle(restores).await?)
    }

    /// Retries every queued compensation under the locks of its resources.
    ///
    /// Returns how many are still queued.
    ///
    /// # Errors
    ///
    /// [`BookingError::Compensation`] when some of them still fail.
    pub async fn reconcile(&self) -> Result<usize, BookingError> {
        let keys = self.compensator.pending_resources();
        if keys.is_empty() {
            return Ok(0);
        }
        let locks = self.locks.acquire(&keys).await;
        self.compensator.settle_pending(locks.keys()).await?;
        Ok(self.compensator.pending_count())
    }

    /// Compensations waiting for the inventory to recover
    #[must_use]
    pub fn pending_compensations(&self) -> usize {
        self.compensator.pending_count()
    }

    /// Readiness check: whether the inventory provider answers in time.
    ///
    /// # Errors
    ///
    /// The provider error when it does not.
    pub async fn check_inventory(&self) -> Result<(), ProviderError> {
        self.provider.ping().await
    }
}
