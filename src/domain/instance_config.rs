//! Validated per-instance configuration.
//!
//! An [`InstanceConfig`] is what the setup surface (REST API or the
//! instances file) hands over. It is immutable for the lifetime of a
//! coordinator; any change goes through reconfiguration, which builds a
//! fresh coordinator.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::RelayError;

/// Default refresh interval in minutes.
pub const DEFAULT_UPDATE_INTERVAL_MINUTES: u32 = 60;
/// Smallest accepted refresh interval in minutes.
pub const MIN_UPDATE_INTERVAL_MINUTES: u32 = 5;
/// Largest accepted refresh interval in minutes (24 hours).
pub const MAX_UPDATE_INTERVAL_MINUTES: u32 = 1440;
/// Largest number of recent samples per entity.
pub const MAX_HISTORY_POINTS: u8 = 25;

/// Path template of the TRMNL custom plugin webhook.
const WEBHOOK_PATH: &str = "/api/custom_plugins/";

/// Configuration of one webhook instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct InstanceConfig {
    /// Opaque TRMNL plugin webhook id.
    pub webhook_id: String,
    /// Entity identifiers in `domain.object_id` form, in display order.
    pub entities: Vec<String>,
    /// Minutes between automatic refreshes, `5..=1440`.
    #[serde(default = "default_update_interval")]
    pub update_interval: u32,
    /// Recent samples to include per entity, `0..=25`.
    #[serde(default)]
    pub history_points: u8,
    /// Optional human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

const fn default_update_interval() -> u32 {
    DEFAULT_UPDATE_INTERVAL_MINUTES
}

impl InstanceConfig {
    /// Checks every bound and format rule.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidConfig`] naming the first violated rule.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.webhook_id.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "webhook_id must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self.webhook_id.chars().find(|c| !is_webhook_char(*c)) {
            return Err(RelayError::InvalidConfig(format!(
                "webhook_id may only contain letters, digits, '-' and '_', got {bad:?}"
            )));
        }
        if !(MIN_UPDATE_INTERVAL_MINUTES..=MAX_UPDATE_INTERVAL_MINUTES)
            .contains(&self.update_interval)
        {
            return Err(RelayError::InvalidConfig(format!(
                "update_interval must be between {MIN_UPDATE_INTERVAL_MINUTES} and \
                 {MAX_UPDATE_INTERVAL_MINUTES} minutes, got {}",
                self.update_interval
            )));
        }
        if self.history_points > MAX_HISTORY_POINTS {
            return Err(RelayError::InvalidConfig(format!(
                "history_points must be at most {MAX_HISTORY_POINTS}, got {}",
                self.history_points
            )));
        }
        if self.entities.is_empty() {
            return Err(RelayError::InvalidConfig(
                "at least one entity is required".to_string(),
            ));
        }
        if let Some(bad) = self.entities.iter().find(|e| !is_entity_id(e)) {
            return Err(RelayError::InvalidConfig(format!(
                "invalid entity id '{bad}', expected 'domain.object_id'"
            )));
        }
        Ok(())
    }

    /// Refresh period as a [`Duration`].
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.update_interval) * 60)
    }

    /// Configured name, or `TRMNL Webhook <first 8 chars>...`.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                let prefix: String = self.webhook_id.chars().take(8).collect();
                format!("TRMNL Webhook {prefix}...")
            }
        }
    }

    /// Full webhook URL under the given TRMNL base URL. The id is
    /// percent-encoded as a single path segment.
    #[must_use]
    pub fn webhook_url(&self, base_url: &str) -> String {
        format!(
            "{}{WEBHOOK_PATH}{}",
            base_url.trim_end_matches('/'),
            urlencoding::encode(&self.webhook_id)
        )
    }
}

/// Unreserved URL characters TRMNL uses in plugin ids.
fn is_webhook_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// `domain.object_id` with both halves non-empty.
fn is_entity_id(entity_id: &str) -> bool {
    match entity_id.split_once('.') {
        Some((domain, object_id)) => {
            !domain.is_empty() && !object_id.is_empty() && !entity_id.contains(char::is_whitespace)
        }
        None => false,
    }
}
