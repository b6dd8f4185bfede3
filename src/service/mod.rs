//! Service layer: instance lifecycle and refresh scheduling.
//!
//! [`RelayService`] validates and registers instances, each driven by its
//! own [`Coordinator`], and emits lifecycle events through the
//! [`super::domain::EventBus`].

pub mod coordinator;
pub mod registry;
pub mod relay_service;

pub use coordinator::{Coordinator, InstanceStatus, PipelineContext, RefreshOutcome};
pub use registry::CoordinatorRegistry;
pub use relay_service::RelayService;
