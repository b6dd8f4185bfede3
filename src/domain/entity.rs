//! Entity data as read from the host and as pushed to the display.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Separator between an entity's domain and its object id.
pub const DOMAIN_SEPARATOR: char = '.';

/// Current state of one entity, read fresh every cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    /// Entity identifier (`sensor.kitchen_temperature`).
    pub entity_id: String,
    /// Friendly name, or the entity id when the host has none.
    pub display_name: String,
    /// Raw state string as reported by the host.
    pub raw_state: String,
    /// Unit of measurement, if any.
    pub unit: Option<String>,
    /// When the state last changed.
    pub last_changed: DateTime<Utc>,
}

/// One raw history record before numeric filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    /// When the state was recorded.
    pub timestamp: DateTime<Utc>,
    /// Raw state string.
    pub state: String,
}

/// A history record whose state parsed as a finite number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryPoint {
    /// When the value was recorded.
    pub timestamp: DateTime<Utc>,
    /// Parsed value.
    pub value: f64,
}

/// One `{time, value}` entry of `recent_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentSample {
    /// `HH:MM` of the sample.
    pub time: String,
    /// Value with two decimals.
    pub value: String,
}

/// Per-entity summary as it appears in the outbound payload.
///
/// Field order is the wire order. Optional fields are omitted rather than
/// sent as `null` to save payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntitySummary {
    /// Domain used for grouping; not part of the wire format.
    #[serde(skip)]
    pub domain: String,
    /// Entity id with the domain separator replaced by `_`.
    pub entity_id: String,
    /// Friendly name.
    #[serde(rename = "name")]
    pub display_name: String,
    /// Current state, stringified.
    pub current: String,
    /// Last change, `%Y-%m-%d %H:%M:%S` UTC.
    pub last_changed: String,
    /// Unit of measurement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Mean over the history window.
    #[serde(rename = "24h_avg", skip_serializing_if = "Option::is_none")]
    pub avg_24h: Option<String>,
    /// Minimum over the history window.
    #[serde(rename = "24h_min", skip_serializing_if = "Option::is_none")]
    pub min_24h: Option<String>,
    /// Maximum over the history window.
    #[serde(rename = "24h_max", skip_serializing_if = "Option::is_none")]
    pub max_24h: Option<String>,
    /// Most recent samples, oldest first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_data: Option<Vec<RecentSample>>,
}

/// Text before the first separator, or the whole id when there is none.
#[must_use]
pub fn domain_of(entity_id: &str) -> &str {
    entity_id
        .split_once(DOMAIN_SEPARATOR)
        .map_or(entity_id, |(domain, _)| domain)
}

/// Replaces every domain separator with `_`.
#[must_use]
pub fn sanitize_entity_id(entity_id: &str) -> String {
    entity_id.replace(DOMAIN_SEPARATOR, "_")
}
