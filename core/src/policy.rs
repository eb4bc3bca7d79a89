//! Injectable business policy.
//!
//! Discount, tax, cancellation thresholds and the search bounds of the
//! alternative suggester are configuration, not constants, so they can vary
//! per deployment (or per hotel, by running one engine per policy).

use crate::error::ValidationError;
use crate::types::BPS_PER_WHOLE;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy configuration shared by pricing, cancellation and commit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Discount for multi-kind bundles, in basis points (1000 = 10%)
    pub bundle_discount_bps: u32,
    /// Tax rate applied after discount, in basis points (1900 = 19%)
    pub tax_rate_bps: u32,
    /// At or beyond this many hours before check-in cancellation is free
    pub free_window_hours: u32,
    /// Below this many hours the full amount is retained
    pub mid_window_hours: u32,
    /// Penalty between the two windows
    pub partial_penalty_percent: u32,
    /// Time of day on the first bundle date that counts as check-in (UTC)
    pub check_in_time: NaiveTime,
    /// Days the suggester moves the date range per widening step
    pub suggestion_step_days: u32,
    /// Maximum widening steps
    pub suggestion_max_steps: u32,
    /// Candidates kept per failing component
    pub max_alternatives: usize,
    /// Bound on every inventory call, in milliseconds
    pub provider_timeout_ms: u64,
    /// Prefix of generated confirmation codes
    pub confirmation_prefix: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            bundle_discount_bps: 1_000,
            tax_rate_bps: 1_900,
            free_window_hours: 72,
            mid_window_hours: 24,
            partial_penalty_percent: 50,
            check_in_time: NaiveTime::MIN,
            suggestion_step_days: 1,
            suggestion_max_steps: 3,
            max_alternatives: 5,
            provider_timeout_ms: 2_000,
            confirmation_prefix: "BKG".to_string(),
        }
    }
}

impl PolicyConfig {
    /// Rejects inconsistent thresholds and out-of-range percentages.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidPolicy`] describing the first problem.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let fail = |reason: &str| Err(ValidationError::InvalidPolicy(reason.to_string()));

        if self.mid_window_hours == 0 {
            return fail("mid_window_hours must be greater than zero");
        }
        if self.free_window_hours <= self.mid_window_hours {
            return fail("free_window_hours must be greater than mid_window_hours");
        }
        if self.partial_penalty_percent > 100 {
            return fail("partial_penalty_percent must not exceed 100");
        }
        if self.bundle_discount_bps > BPS_PER_WHOLE {
            return fail("bundle_discount_bps must not exceed 10000");
        }
        if self.tax_rate_bps > BPS_PER_WHOLE {
            return fail("tax_rate_bps must not exceed 10000");
        }
        if self.suggestion_step_days == 0 {
            return fail("suggestion_step_days must be greater than zero");
        }
        if self.max_alternatives == 0 {
            return fail("max_alternatives must be greater than zero");
        }
        if self.provider_timeout_ms == 0 {
            return fail("provider_timeout_ms must be greater than zero");
        }
        if self.confirmation_prefix.trim().is_empty() {
            return fail("confirmation_prefix must not be empty");
        }
        Ok(())
    }

    /// Timeout applied to every inventory call
    #[must_use]
    pub const fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}
