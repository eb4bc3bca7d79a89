//! Alternative suggester: ranked substitutes for components that cannot be satisfied.
//!
//! The search never rewrites the caller's request. For every failing component it
//! returns an independent, ranked candidate list the caller may explicitly re-request:
//!
//! 1. other resources of the same kind over the original dates
//! 2. otherwise, every resource of that kind (the original included) over the original
//!    range shifted by ±k·step days, for k = 1..=max steps; the first k with a hit wins
//!
//! Candidates are ranked by capacity delta, then date delta, then unit price.

use crate::error::{BookingError, ProviderError};
use crate::inventory::InventoryProvider;
use crate::policy::PolicyConfig;
use crate::types::{
    AlternativeCandidate, AlternativeSet, BundleRequest, BundleVerdict, ComponentAlternatives,
    ComponentRequest, DateRange, HotelId, ResourceDescriptor,
};
use futures::future::try_join_all;
use std::sync::Arc;

/// Bounds of the widening search
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchBounds {
    /// Days moved per step
    pub step_days: u32,
    /// Maximum number of steps
    pub max_steps: u32,
    /// Candidates kept per component
    pub max_alternatives: usize,
}

impl From<&PolicyConfig> for SearchBounds {
    fn from(policy: &PolicyConfig) -> Self {
        Self {
            step_days: policy.suggestion_step_days,
            max_steps: policy.suggestion_max_steps,
            max_alternatives: policy.max_alternatives,
        }
    }
}

/// Proposes substitutes for insufficient components.
#[derive(Clone)]
pub struct AlternativeSuggester {
    provider: Arc<dyn InventoryProvider>,
    bounds: SearchBounds,
}

impl AlternativeSuggester {
    /// Creates a suggester
    #[must_use]
    pub fn new(provider: Arc<dyn InventoryProvider>, bounds: SearchBounds) -> Self {
        Self { provider, bounds }
    }

    /// Alternatives for every insufficient component of `verdict`.
    ///
    /// A component whose search finds nothing (or whose search the inventory could not
    /// answer) is still listed, with an empty candidate list and a reason.
    ///
    /// # Errors
    ///
    /// [`BookingError::InvalidState`] when called for a fully sufficient verdict.
    pub async fn suggest(
        &self,
        bundle: &BundleRequest,
        verdict: &BundleVerdict,
    ) -> Result<AlternativeSet, BookingError> {
        if verdict.all_sufficient {
            return Err(BookingError::InvalidState(
                "alternatives requested for a fully available bundle".to_string(),
            ));
        }

        let mut components = Vec::new();
        for failing in verdict.insufficient() {
            let component = bundle.components.get(failing.index).ok_or_else(|| {
                BookingError::InvalidState(format!(
                    "verdict references component {} which the bundle does not have",
                    failing.index
                ))
            })?;

            let (candidates, reason) = match self.search(&bundle.hotel_id, component).await {
                Ok(candidates) => {
                    let reason = candidates.is_empty().then(|| self.exhausted_reason(component));
                    (candidates, reason)
                }
                Err(error) if error.is_transient() => {
                    tracing::warn!(
                        resource = %failing.resource,
                        %error,
                        "alternative search failed"
                    );
                    (Vec::new(), Some(format!("alternative search unavailable: {error}")))
                }
                Err(error) => return Err(error.into()),
            };

            components.push(ComponentAlternatives {
                index: failing.index,
                requested_resource: failing.resource.clone(),
                requested: failing.requested,
                candidates,
                reason,
            });
        }

        let with_hits = components.iter().filter(|c| !c.candidates.is_empty()).count();
        let summary = format!(
            "{} of {} component(s) unavailable; alternatives found for {}",
            components.len(),
            verdict.components.len(),
            with_hits
        );
        tracing::debug!(%summary, "alternatives computed");

        Ok(AlternativeSet {
            components,
            summary,
        })
    }

    async fn search(
        &self,
        hotel: &HotelId,
        component: &ComponentRequest,
    ) -> Result<Vec<AlternativeCandidate>, ProviderError> {
        let original = component.resource_key();
        let resources = self.provider.list_resources(hotel, component.kind()).await?;

        let others: Vec<&ResourceDescriptor> =
            resources.iter().filter(|r| r.key != original).collect();
        let mut candidates = self
            .candidates_for(&others, component, *component.dates(), 0)
            .await?;

        let everything: Vec<&ResourceDescriptor> = resources.iter().collect();
        let mut step = 1;
        while candidates.is_empty() && step <= self.bounds.max_steps {
            let delta = step.saturating_mul(self.bounds.step_days);
            for offset in [-i64::from(delta), i64::from(delta)] {
                if let Some(shifted) = component.dates().shift_days(offset) {
                    candidates.extend(
                        self.candidates_for(&everything, component, shifted, delta)
                            .await?,
                    );
                }
            }
            step += 1;
        }

        rank(&mut candidates);
        candidates.truncate(self.bounds.max_alternatives);
        Ok(candidates)
    }

    async fn candidates_for(
        &self,
        resources: &[&ResourceDescriptor],
        component: &ComponentRequest,
        dates: DateRange,
        date_delta_days: u32,
    ) -> Result<Vec<AlternativeCandidate>, ProviderError> {
        let requested = component.requested_units();
        let window = component.window();

        let available = try_join_all(
            resources
                .iter()
                .map(|r| self.provider.query_capacity(&r.key, &dates, window)),
        )
        .await?;

        Ok(resources
            .iter()
            .zip(available)
            .filter(|(_, available)| *available >= requested)
            .map(|(resource, available)| AlternativeCandidate {
                resource: resource.key.clone(),
                dates,
                available,
                capacity_delta: available - requested,
                date_delta_days,
                unit_price: resource.unit_price,
            })
            .collect())
    }

    fn exhausted_reason(&self, component: &ComponentRequest) -> String {
        format!(
            "no {} with {} free unit(s) within {} day(s) of {}",
            component.kind(),
            component.requested_units(),
            self.bounds.max_steps.saturating_mul(self.bounds.step_days),
            component.dates()
        )
    }
}

/// Capacity delta, then date delta, then price; resource id and start date keep it total.
fn rank(candidates: &mut [AlternativeCandidate]) {
    candidates.sort_by(|a, b| {
        (a.capacity_delta, a.date_delta_days, a.unit_price, &a.resource, a.dates.start).cmp(&(
            b.capacity_delta,
            b.date_delta_days,
            b.unit_price,
            &b.resource,
            b.dates.start,
        ))
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::inventory::InMemoryInventory;
    use crate::types::{
        BundleMetadata, ComponentVerdict, Money, OperationId, ResourceId, ResourceKey,
        ResourceKind,
    };
    use chrono::NaiveDate;

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, start).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, end).unwrap(),
        )
        .unwrap()
    }

    fn bounds() -> SearchBounds {
        SearchBounds {
            step_days: 1,
            max_steps: 3,
            max_alternatives: 5,
        }
    }

    async fn add(
        inventory: &InMemoryInventory,
        kind: ResourceKind,
        id: &str,
        price: u64,
        capacity: u32,
    ) {
        inventory
            .add_resource(ResourceDescriptor {
                key: ResourceKey::new(kind, id),
                hotel_id: HotelId::new("grand"),
                name: id.to_string(),
                unit_price: Money::from_minor(price),
                capacity,
            })
            .await;
    }

    fn single(component: ComponentRequest, available: u32) -> (BundleRequest, BundleVerdict) {
        let verdict = BundleVerdict::from_components(vec![ComponentVerdict::new(
            0,
            component.resource_key(),
            component.requested_units(),
            available,
            Money::ZERO,
        )]);
        let bundle = BundleRequest {
            hotel_id: HotelId::new("grand"),
            dates: range(1, 28),
            components: vec![component],
            metadata: BundleMetadata::default(),
        };
        (bundle, verdict)
    }

    #[tokio::test]
    async fn test_same_dates_ranked_by_capacity_delta_then_price() {
        let inventory = InMemoryInventory::new();
        add(&inventory, ResourceKind::RoomType, "double", 100_000, 1).await;
        add(&inventory, ResourceKind::RoomType, "suite", 250_000, 2).await;
        add(&inventory, ResourceKind::RoomType, "twin", 90_000, 2).await;
        add(&inventory, ResourceKind::RoomType, "family", 80_000, 6).await;

        let (bundle, verdict) = single(
            ComponentRequest::RoomBlock {
                room_type: ResourceId::new("double"),
                quantity: 2,
                dates: range(10, 12),
            },
            1,
        );
        let suggester = AlternativeSuggester::new(Arc::new(inventory), bounds());
        let set = suggester.suggest(&bundle, &verdict).await.unwrap();

        let ids: Vec<_> = set.components[0]
            .candidates
            .iter()
            .map(|c| c.resource.id.as_str())
            .collect();
        assert_eq!(ids, vec!["twin", "suite", "family"]);
        assert!(set.components[0].candidates.iter().all(|c| c.date_delta_days == 0));
        assert_eq!(set.components[0].reason, None);
    }

    #[tokio::test]
    async fn test_widening_shifts_dates_and_includes_original() {
        let inventory = InMemoryInventory::new();
        add(&inventory, ResourceKind::FunctionRoom, "ballroom", 300_000, 1).await;
        let ballroom = ResourceKey::new(ResourceKind::FunctionRoom, "ballroom");
        inventory
            .decrement_capacity(&OperationId::new("taken"), &ballroom, &range(10, 11), None, 1)
            .await
            .unwrap();

        let (bundle, verdict) = single(
            ComponentRequest::FunctionRoom {
                room_id: ResourceId::new("ballroom"),
                dates: range(10, 11),
                window: None,
            },
            0,
        );
        let suggester = AlternativeSuggester::new(Arc::new(inventory), bounds());
        let set = suggester.suggest(&bundle, &verdict).await.unwrap();

        let candidates = &set.components[0].candidates;
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.date_delta_days == 1 && c.resource == ballroom));
        assert_eq!(candidates[0].dates, range(9, 10));
        assert_eq!(candidates[1].dates, range(11, 12));
    }

    #[tokio::test]
    async fn test_exhausted_search_keeps_component_with_reason() {
        let inventory = InMemoryInventory::new();
        add(&inventory, ResourceKind::Catering, "buffet", 4_500, 50).await;

        let (bundle, verdict) = single(
            ComponentRequest::Catering {
                service_id: ResourceId::new("buffet"),
                headcount: 80,
                dates: range(10, 11),
            },
            50,
        );
        let suggester = AlternativeSuggester::new(Arc::new(inventory), bounds());
        let set = suggester.suggest(&bundle, &verdict).await.unwrap();

        assert_eq!(set.components.len(), 1);
        assert!(set.components[0].candidates.is_empty());
        assert!(set.components[0].reason.as_deref().unwrap().contains("within 3 day(s)"));
    }

    #[tokio::test]
    async fn test_sufficient_verdict_is_invalid_state() {
        let suggester = AlternativeSuggester::new(Arc::new(InMemoryInventory::new()), bounds());
        let (bundle, verdict) = single(
            ComponentRequest::Catering {
                service_id: ResourceId::new("buffet"),
                headcount: 10,
                dates: range(10, 11),
            },
            50,
        );
        assert!(matches!(
            suggester.suggest(&bundle, &verdict).await,
            Err(BookingError::InvalidState(_))
        ));
    }
}
