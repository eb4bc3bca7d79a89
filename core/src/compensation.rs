//! Compensating inventory calls.
//!
//! A failed commit gives back what it took; a failed cancellation re-takes what it
//! already gave back. Both are inventory calls themselves and can fail. Each one is
//! retried with exponential backoff; whatever still fails is parked in a queue keyed by
//! resource and the resource is fenced: commits and cancellations touching it are
//! refused until the queue for it drains.
//!
//! Every action replays the original operation id, so applying one twice is harmless.

use crate::error::{CompensationError, ProviderError};
use crate::inventory::InventoryProvider;
use crate::metrics;
use crate::types::{CapacityHold, DateRange, ResourceKey, TimeWindow};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Backoff for compensating calls.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 attempts, 20ms then 40ms apart, capped at 500ms
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Total attempts, including the first (at least 1)
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = if attempts == 0 { 1 } else { attempts };
        self
    }

    /// Delay before the first retry
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Attempts made before giving up
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after the 0-indexed `attempt` failed: `initial * 2^attempt`, capped
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_mul(2_u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}

/// One compensating inventory call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Compensation {
    /// Give back capacity a failed commit took
    Release(CapacityHold),
    /// Take back capacity a failed cancellation released early
    Restore {
        /// Hold to re-apply, under its original operation id
        hold: CapacityHold,
        /// Dates the hold covered
        dates: DateRange,
        /// Time window the hold covered (function rooms)
        window: Option<TimeWindow>,
        /// Units the hold took
        quantity: u32,
    },
}

impl Compensation {
    /// Hold the action concerns
    #[must_use]
    pub const fn hold(&self) -> &CapacityHold {
        match self {
            Self::Release(hold) | Self::Restore { hold, .. } => hold,
        }
    }

    /// Resource the action touches
    #[must_use]
    pub const fn resource(&self) -> &ResourceKey {
        &self.hold().resource
    }

    const fn name(&self) -> &'static str {
        match self {
            Self::Release(_) => "release",
            Self::Restore { .. } => "restore",
        }
    }

    async fn apply(&self, provider: &dyn InventoryProvider) -> Result<(), ProviderError> {
        match self {
            Self::Release(hold) => {
                provider
                    .increment_capacity(&hold.operation_id, &hold.resource)
                    .await
            }
            Self::Restore {
                hold,
                dates,
                window,
                quantity,
            } => {
                provider
                    .decrement_capacity(
                        &hold.operation_id,
                        &hold.resource,
                        dates,
                        window.as_ref(),
                        *quantity,
                    )
                    .await
            }
        }
    }
}

/// Applies compensations and keeps the ones that could not be applied.
pub struct Compensator {
    provider: Arc<dyn InventoryProvider>,
    retry: RetryPolicy,
    pending: Mutex<Vec<Compensation>>,
}

impl Compensator {
    /// Creates a compensator with an empty queue
    #[must_use]
    pub fn new(provider: Arc<dyn InventoryProvider>, retry: RetryPolicy) -> Self {
        Self {
            provider,
            retry,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Applies every action, retrying each one.
    ///
    /// Callers must hold the locks of every resource involved.
    ///
    /// # Errors
    ///
    /// [`CompensationError`] listing the holds that are still unsettled; those actions
    /// are queued and their resources stay fenced until [`Self::settle_pending`] succeeds.
    pub async fn settle(&self, actions: Vec<Compensation>) -> Result<(), CompensationError> {
        let mut unsettled = Vec::new();
        for action in actions {
            if let Err(error) = self.apply_with_retry(&action).await {
                tracing::error!(
                    action = action.name(),
                    operation = %action.hold().operation_id,
                    resource = %action.resource(),
                    %error,
                    "compensation failed, queued for retry"
                );
                unsettled.push(action);
            }
        }
        self.park(unsettled)
    }

    /// Retries queued actions on `resources`.
    ///
    /// Callers must hold the locks of `resources`.
    ///
    /// # Errors
    ///
    /// [`CompensationError`] when some of them still fail; they stay queued.
    pub async fn settle_pending(&self, resources: &[ResourceKey]) -> Result<(), CompensationError> {
        let due = self.take(resources);
        if due.is_empty() {
            return Ok(());
        }
        tracing::info!(actions = due.len(), "retrying queued compensations");
        self.settle(due).await
    }

    /// Resources with queued actions, sorted and de-duplicated
    #[must_use]
    pub fn pending_resources(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self
            .queue()
            .iter()
            .map(|action| action.resource().clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Number of queued actions
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue().len()
    }

    async fn apply_with_retry(&self, action: &Compensation) -> Result<(), ProviderError> {
        let mut attempt = 0;
        loop {
            match action.apply(self.provider.as_ref()).await {
                Ok(()) => return Ok(()),
                Err(error) if attempt + 1 >= self.retry.max_attempts() => return Err(error),
                Err(error) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        action = action.name(),
                        resource = %action.resource(),
                        attempt = attempt + 1,
                        ?delay,
                        %error,
                        "compensation attempt failed"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    fn park(&self, unsettled: Vec<Compensation>) -> Result<(), CompensationError> {
        if unsettled.is_empty() {
            return Ok(());
        }
        let holds = unsettled.iter().map(|action| action.hold().clone()).collect();
        let mut queue = self.queue();
        queue.extend(unsettled);
        metrics::record_pending_compensations(queue.len());
        Err(CompensationError { holds })
    }

    fn take(&self, resources: &[ResourceKey]) -> Vec<Compensation> {
        let mut queue = self.queue();
        let (due, rest): (Vec<_>, Vec<_>) = queue
            .drain(..)
            .partition(|action| resources.contains(action.resource()));
        *queue = rest;
        metrics::record_pending_compensations(queue.len());
        due
    }

    fn queue(&self) -> std::sync::MutexGuard<'_, Vec<Compensation>> {
        // entries are whole values; a poisoned queue is still consistent
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
