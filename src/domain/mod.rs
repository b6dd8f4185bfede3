//! Domain layer: identifiers, configuration, entity data, and events.
//!
//! Plain data types shared by the pipeline, the coordinators, and the
//! API. Nothing in here performs I/O.

pub mod entity;
pub mod event_bus;
pub mod instance_config;
pub mod instance_id;
pub mod refresh_result;
pub mod relay_event;

pub use entity::{
    EntitySnapshot, EntitySummary, HistoryPoint, HistoryRecord, RecentSample, domain_of,
    sanitize_entity_id,
};
pub use event_bus::EventBus;
pub use instance_config::InstanceConfig;
pub use instance_id::InstanceId;
pub use refresh_result::{RefreshPhase, RefreshResult, RefreshStatus};
pub use relay_event::RelayEvent;
