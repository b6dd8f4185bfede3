//! Events published for observers of instance state.
//!
//! Every lifecycle change and every completed cycle emits a [`RelayEvent`]
//! through the [`super::EventBus`]; WebSocket clients receive them filtered
//! by instance.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::InstanceId;

/// Observer notification.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// An instance passed its initial refresh and is scheduled.
    InstanceCreated {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Display name.
        name: String,
        /// Number of configured entities.
        entity_count: usize,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },

    /// An instance was torn down.
    InstanceRemoved {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Removal timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A cycle delivered its payload.
    RefreshSucceeded {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Entities in the payload.
        entity_count: usize,
        /// Size of the delivered body.
        payload_bytes: usize,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// A cycle failed.
    RefreshFailed {
        /// Instance identifier.
        instance_id: InstanceId,
        /// Human-readable failure reason.
        reason: String,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl RelayEvent {
    /// Returns the instance this event belongs to.
    #[must_use]
    pub fn instance_id(&self) -> InstanceId {
        match self {
            Self::InstanceCreated { instance_id, .. }
            | Self::InstanceRemoved { instance_id, .. }
            | Self::RefreshSucceeded { instance_id, .. }
            | Self::RefreshFailed { instance_id, .. } => *instance_id,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::InstanceCreated { .. } => "instance_created",
            Self::InstanceRemoved { .. } => "instance_removed",
            Self::RefreshSucceeded { .. } => "refresh_succeeded",
            Self::RefreshFailed { .. } => "refresh_failed",
        }
    }
}
