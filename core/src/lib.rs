//! # Booking Core
//!
//! Resource booking consistency engine for hotel and event packages.
//!
//! A bundle combines independently managed resources (room-type blocks, a function
//! room, a catering order) that must be free at the same time and are booked as one
//! atomic unit.
//!
//! ## Components
//!
//! - **Availability Validator**: per-component verdict from the inventory (pure read)
//! - **Alternative Suggester**: ranked substitutes when a component is insufficient
//! - **Pricing Calculator**: subtotals, package discount, tax, in integer minor units
//! - **Commit Coordinator**: re-validate and reserve under per-resource locks, all or nothing
//! - **Cancellation Policy**: tiered penalty quote and idempotent capacity release
//! - **Compensator**: retries rollbacks and restores that failed, fencing the resource meanwhile
//!
//! ## Example
//!
//! ```ignore
//! use booking_core::{BookingEngine, InMemoryBookingStore, InMemoryInventory, PolicyConfig};
//! use booking_core::environment::SystemClock;
//!
//! let engine = BookingEngine::new(
//!     PolicyConfig::default(),
//!     Arc::new(InMemoryInventory::from_seed(seed)),
//!     Arc::new(InMemoryBookingStore::new()),
//!     Arc::new(SystemClock),
//! )?;
//!
//! let outcome = engine.validate_bundle(&bundle).await?;
//! if outcome.verdict.all_sufficient {
//!     let booking = engine.confirm_bundle(&bundle, true).await?;
//!     println!("confirmed {}", booking.confirmation_code);
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

pub mod cancellation;
pub mod compensation;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod metrics;
pub mod policy;
pub mod pricing;
pub mod store;
pub mod suggester;
pub mod types;
pub mod validator;

pub use engine::{BookingEngine, ValidationOutcome};
pub use error::{
    BookingError, CompensationError, ConflictError, PolicyError, ProviderError, StoreError,
    ValidationError,
};
pub use inventory::{InMemoryInventory, InventoryProvider, InventorySeed, TimedInventory};
pub use policy::PolicyConfig;
pub use store::{BookingStore, InMemoryBookingStore};

/// Environment module - injected dependencies
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Cancellation tiers and confirmation codes depend on "now", so the engine never
    /// reads the system time directly.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Clone, Copy, Debug, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
