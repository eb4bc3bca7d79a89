//! Availability validator: a pure read over the inventory.

use crate::error::{BookingError, ValidationError};
use crate::inventory::InventoryProvider;
use crate::types::{BundleRequest, BundleVerdict, ComponentRequest, ComponentVerdict, HotelId};
use futures::future::try_join_all;
use std::sync::Arc;

/// Produces a [`BundleVerdict`] for a bundle without side effects.
///
/// Components are queried concurrently. Provider errors are surfaced verbatim:
/// a timeout or unreachable provider becomes [`BookingError::AvailabilityUnknown`],
/// never a guess in either direction.
#[derive(Clone)]
pub struct AvailabilityValidator {
    provider: Arc<dyn InventoryProvider>,
}

impl AvailabilityValidator {
    /// Creates a validator over `provider`
    #[must_use]
    pub fn new(provider: Arc<dyn InventoryProvider>) -> Self {
        Self { provider }
    }

    /// Validates the request shape, then checks every component against the inventory.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for malformed requests, unknown resources, or
    ///   resources of another hotel
    /// - [`BookingError::AvailabilityUnknown`] when the inventory cannot answer
    pub async fn validate(&self, bundle: &BundleRequest) -> Result<BundleVerdict, BookingError> {
        bundle.validate()?;

        let verdicts = try_join_all(
            bundle
                .components
                .iter()
                .enumerate()
                .map(|(index, component)| self.check_component(&bundle.hotel_id, index, component)),
        )
        .await?;

        let verdict = BundleVerdict::from_components(verdicts);
        tracing::debug!(
            hotel = %bundle.hotel_id,
            components = verdict.components.len(),
            all_sufficient = verdict.all_sufficient,
            "bundle validated"
        );
        Ok(verdict)
    }

    /// Verdict for a single component.
    ///
    /// # Errors
    ///
    /// As [`AvailabilityValidator::validate`].
    pub async fn check_component(
        &self,
        hotel: &HotelId,
        index: usize,
        component: &ComponentRequest,
    ) -> Result<ComponentVerdict, BookingError> {
        let resource = component.resource_key();
        let descriptor = self.provider.describe(&resource).await?;
        if &descriptor.hotel_id != hotel {
            return Err(ValidationError::HotelMismatch {
                resource,
                hotel: hotel.clone(),
            }
            .into());
        }

        let available = self
            .provider
            .query_capacity(&resource, component.dates(), component.window())
            .await?;

        let verdict = ComponentVerdict::new(
            index,
            resource,
            component.requested_units(),
            available,
            descriptor.unit_price,
        );
        if !verdict.sufficient {
            tracing::debug!(
                resource = %verdict.resource,
                requested = verdict.requested,
                available,
                "component insufficient"
            );
        }
        Ok(verdict)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::inventory::InMemoryInventory;
    use crate::types::{
        BundleMetadata, DateRange, Money, OperationId, ResourceDescriptor, ResourceId,
        ResourceKey, ResourceKind,
    };
    use chrono::NaiveDate;

    fn range(start: u32, end: u32) -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2025, 3, start).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, end).unwrap(),
        )
        .unwrap()
    }

    async fn inventory() -> Arc<InMemoryInventory> {
        let inventory = InMemoryInventory::new();
        for (kind, id, hotel, capacity) in [
            (ResourceKind::RoomType, "double", "grand", 3),
            (ResourceKind::Catering, "buffet", "grand", 100),
            (ResourceKind::RoomType, "twin", "harbour", 5),
        ] {
            inventory
                .add_resource(ResourceDescriptor {
                    key: ResourceKey::new(kind, id),
                    hotel_id: HotelId::new(hotel),
                    name: id.to_string(),
                    unit_price: Money::from_minor(10_000),
                    capacity,
                })
                .await;
        }
        Arc::new(inventory)
    }

    fn bundle(components: Vec<ComponentRequest>) -> BundleRequest {
        BundleRequest {
            hotel_id: HotelId::new("grand"),
            dates: range(10, 14),
            components,
            metadata: BundleMetadata::default(),
        }
    }

    fn rooms(id: &str, quantity: u32) -> ComponentRequest {
        ComponentRequest::RoomBlock {
            room_type: ResourceId::new(id),
            quantity,
            dates: range(10, 12),
        }
    }

    #[tokio::test]
    async fn test_verdict_reports_shortfall() {
        let inventory = inventory().await;
        inventory
            .decrement_capacity(
                &OperationId::new("earlier"),
                &ResourceKey::new(ResourceKind::RoomType, "double"),
                &range(11, 12),
                None,
                2,
            )
            .await
            .unwrap();

        let validator = AvailabilityValidator::new(inventory);
        let catering = ComponentRequest::Catering {
            service_id: ResourceId::new("buffet"),
            headcount: 60,
            dates: range(10, 11),
        };
        let verdict = validator
            .validate(&bundle(vec![rooms("double", 2), catering]))
            .await
            .unwrap();

        assert!(!verdict.all_sufficient);
        assert_eq!(verdict.components[0].available, 1);
        assert_eq!(verdict.components[0].shortfall, Some(1));
        assert!(verdict.components[1].sufficient);
        assert_eq!(verdict.components[1].shortfall, None);
    }

    #[tokio::test]
    async fn test_unknown_and_foreign_resources_are_validation_errors() {
        let validator = AvailabilityValidator::new(inventory().await);

        let unknown = validator.validate(&bundle(vec![rooms("penthouse", 1)])).await;
        assert!(matches!(
            unknown,
            Err(BookingError::Validation(ValidationError::UnknownResource { .. }))
        ));

        let foreign = validator.validate(&bundle(vec![rooms("twin", 1)])).await;
        assert!(matches!(
            foreign,
            Err(BookingError::Validation(ValidationError::HotelMismatch { .. }))
        ));
    }
}
