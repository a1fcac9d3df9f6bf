//! Business logic services.

pub mod orders;

pub use orders::{OrderServiceError, OrderTransitionService};
