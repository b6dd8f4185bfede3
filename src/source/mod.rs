//! Read-only collaborators: current entity state and recorded history.
//!
//! The pipeline only ever sees the [`StateSource`] and [`HistorySource`]
//! traits. [`HomeAssistantClient`] implements both against the Home
//! Assistant REST API.

pub mod home_assistant;
#[cfg(test)]
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{EntitySnapshot, HistoryRecord};

pub use home_assistant::HomeAssistantClient;
#[cfg(test)]
pub use memory::InMemorySource;

/// Errors raised by state and history reads.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Transport-level failure talking to the host.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The host rejected our credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The host answered with an unexpected status.
    #[error("api error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The host answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The source is not reachable.
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Returns `true` when the host itself cannot be asked, as opposed to
    /// a bad answer about one entity.
    #[must_use]
    pub fn is_source_down(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout(),
            Self::AuthenticationFailed | Self::Unavailable(_) => true,
            Self::Api { .. } | Self::InvalidResponse(_) => false,
        }
    }
}

/// Current-state lookup.
#[async_trait]
pub trait StateSource: Send + Sync + fmt::Debug {
    /// Returns the entity's snapshot, or `None` when the host does not know it.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the host cannot be asked at all.
    async fn read_state(&self, entity_id: &str) -> Result<Option<EntitySnapshot>, SourceError>;
}

/// Recorded state history lookup.
#[async_trait]
pub trait HistorySource: Send + Sync + fmt::Debug {
    /// Returns the records in `[start, end]`, oldest first. May be empty.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when history cannot be read.
    async fn read_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, SourceError>;
}
