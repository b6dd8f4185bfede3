//! Outcome of a refresh cycle and the coordinator's observable state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Terminal status of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefreshStatus {
    /// Payload was delivered.
    Success,
    /// The cycle failed; see [`RefreshResult::error`].
    Failure,
}

/// Where a coordinator currently is in its refresh state machine.
///
/// `Idle → Refreshing → (Success | Failed) → Idle`; the terminal states are
/// recorded in [`RefreshResult`] and the phase drops back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    /// Waiting for the next tick or trigger.
    #[default]
    Idle,
    /// A cycle is in flight.
    Refreshing,
}

/// Result of the most recent completed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RefreshResult {
    /// When the cycle completed.
    pub last_update: DateTime<Utc>,
    /// Entities included in the payload.
    pub entity_count: usize,
    /// Success or failure.
    pub status: RefreshStatus,
    /// Failure reason; absent on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshResult {
    /// A successful cycle that delivered `entity_count` entities.
    #[must_use]
    pub fn success(entity_count: usize) -> Self {
        Self {
            last_update: Utc::now(),
            entity_count,
            status: RefreshStatus::Success,
            error: None,
        }
    }

    /// A failed cycle.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            last_update: Utc::now(),
            entity_count: 0,
            status: RefreshStatus::Failure,
            error: Some(reason.into()),
        }
    }

    /// Returns `true` for [`RefreshStatus::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RefreshStatus::Success
    }
}
