//! Pricing & discount calculator.
//!
//! All arithmetic is in integer minor units. Percentages are basis points and every
//! derived amount is rounded half-up exactly once:
//!
//! ```text
//! subtotal            = Σ unit_price × units × billing_units
//! discount            = round(subtotal × discount)     (multi-kind bundles only)
//! discounted_subtotal = subtotal − discount
//! tax                 = round(discounted_subtotal × tax_rate)
//! total               = discounted_subtotal + tax
//! ```

use crate::error::BookingError;
use crate::policy::PolicyConfig;
use crate::types::{BundleRequest, BundleVerdict, Money, PriceBreakdown, PriceLine};

/// Computes [`PriceBreakdown`]s. Stateless apart from its rates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PricingCalculator {
    bundle_discount_bps: u32,
    tax_rate_bps: u32,
}

impl PricingCalculator {
    /// Creates a calculator with explicit rates
    #[must_use]
    pub const fn new(bundle_discount_bps: u32, tax_rate_bps: u32) -> Self {
        Self {
            bundle_discount_bps,
            tax_rate_bps,
        }
    }

    /// Uses the rates of `policy`
    #[must_use]
    pub const fn from_policy(policy: &PolicyConfig) -> Self {
        Self::new(policy.bundle_discount_bps, policy.tax_rate_bps)
    }

    /// Prices a fully available bundle.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidState`] if the verdict is not fully sufficient, does not
    /// match the bundle, or an amount overflows.
    pub fn price(
        &self,
        bundle: &BundleRequest,
        verdict: &BundleVerdict,
    ) -> Result<PriceBreakdown, BookingError> {
        if !verdict.all_sufficient {
            return Err(BookingError::InvalidState(
                "cannot price a bundle that is not fully available".to_string(),
            ));
        }
        if verdict.components.len() != bundle.components.len() {
            return Err(BookingError::InvalidState(format!(
                "verdict covers {} component(s), bundle has {}",
                verdict.components.len(),
                bundle.components.len()
            )));
        }

        let overflow = || BookingError::InvalidState("price overflow".to_string());

        let mut lines = Vec::with_capacity(bundle.components.len());
        let mut subtotal = Money::ZERO;
        for (index, (component, component_verdict)) in
            bundle.components.iter().zip(&verdict.components).enumerate()
        {
            let units = component.requested_units();
            let billing_units = component.billing_units();
            let line_total = component_verdict
                .unit_price
                .checked_multiply(u64::from(units))
                .and_then(|m| m.checked_multiply(u64::from(billing_units)))
                .ok_or_else(overflow)?;
            subtotal = subtotal.checked_add(line_total).ok_or_else(overflow)?;
            lines.push(PriceLine {
                index,
                resource: component.resource_key(),
                unit_price: component_verdict.unit_price,
                units,
                billing_units,
                subtotal: line_total,
            });
        }

        // a "package" is more than one resource kind
        let bundle_discount_bps = if bundle.distinct_kinds() > 1 {
            self.bundle_discount_bps
        } else {
            0
        };
        let discount_amount = subtotal.portion_bps(bundle_discount_bps);
        let discounted_subtotal = subtotal.checked_sub(discount_amount).ok_or_else(overflow)?;
        let tax = discounted_subtotal.portion_bps(self.tax_rate_bps);
        let total = discounted_subtotal.checked_add(tax).ok_or_else(overflow)?;

        Ok(PriceBreakdown {
            lines,
            subtotal,
            bundle_discount_bps,
            discount_amount,
            discounted_subtotal,
            tax_rate_bps: self.tax_rate_bps,
            tax,
            total,
        })
    }
}
