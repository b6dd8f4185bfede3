//! The refresh pipeline: aggregate → build → guard → deliver.
//!
//! Each stage is usable on its own; [`crate::service::Coordinator`] runs
//! them in sequence once per cycle.

pub mod aggregator;
pub mod delivery;
pub mod payload;
pub mod size_guard;

pub use aggregator::EntityAggregator;
pub use delivery::{DeliveryClient, DeliveryError, DeliveryFailed, ReqwestTransport, WebhookTransport};
pub use payload::{Payload, PayloadBuilder};
