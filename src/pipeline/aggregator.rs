//! Per-entity aggregation: current snapshot + 24 h history → summary.
//!
//! Per-entity problems never fail a cycle. A missing entity, or one the
//! host answers badly for, is skipped and a history read failure degrades
//! to a summary without statistics. Only a state source that is down
//! propagates, since then every entity would be skipped and an empty
//! payload pushed over the display.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{
    EntitySnapshot, EntitySummary, HistoryPoint, HistoryRecord, RecentSample, domain_of,
    sanitize_entity_id,
};
use crate::source::{HistorySource, SourceError, StateSource};

/// Length of the history lookback window, ending at cycle start.
pub const HISTORY_WINDOW_HOURS: i64 = 24;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SAMPLE_TIME_FORMAT: &str = "%H:%M";

/// Builds [`EntitySummary`]s from the state and history sources.
#[derive(Debug, Clone)]
pub struct EntityAggregator {
    states: Arc<dyn StateSource>,
    history: Arc<dyn HistorySource>,
    history_points: u8,
}

impl EntityAggregator {
    /// Creates an aggregator emitting up to `history_points` recent samples
    /// per entity (0 disables `recent_data`).
    #[must_use]
    pub fn new(
        states: Arc<dyn StateSource>,
        history: Arc<dyn HistorySource>,
        history_points: u8,
    ) -> Self {
        Self {
            states,
            history,
            history_points,
        }
    }

    /// Aggregates every configured entity in order, skipping unknown ones.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] only when the state source itself is down.
    pub async fn collect(
        &self,
        entity_ids: &[String],
        cycle_start: DateTime<Utc>,
    ) -> Result<Vec<EntitySummary>, SourceError> {
        let mut summaries = Vec::with_capacity(entity_ids.len());
        for entity_id in entity_ids {
            if let Some(summary) = self.aggregate(entity_id, cycle_start).await? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    /// Aggregates one entity. `Ok(None)` when the entity is not found or
    /// its state could not be read.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] when the state source is down
    /// (see [`SourceError::is_source_down`]).
    pub async fn aggregate(
        &self,
        entity_id: &str,
        cycle_start: DateTime<Utc>,
    ) -> Result<Option<EntitySummary>, SourceError> {
        let snapshot = match self.states.read_state(entity_id).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                tracing::warn!(entity_id, "entity not found, skipping");
                return Ok(None);
            }
            Err(e) if e.is_source_down() => return Err(e),
            Err(e) => {
                tracing::warn!(entity_id, error = %e, "entity state unreadable, skipping");
                return Ok(None);
            }
        };

        let history = self.numeric_history(entity_id, cycle_start).await;
        Ok(Some(summarize(&snapshot, &history, self.history_points)))
    }

    async fn numeric_history(&self, entity_id: &str, cycle_start: DateTime<Utc>) -> Vec<HistoryPoint> {
        let start = cycle_start - Duration::hours(HISTORY_WINDOW_HOURS);
        match self.history.read_history(entity_id, start, cycle_start).await {
            Ok(records) => numeric_points(records),
            Err(e) => {
                tracing::debug!(entity_id, error = %e, "history unavailable");
                Vec::new()
            }
        }
    }
}

/// Keeps records whose state parses as a finite number, oldest first.
#[must_use]
pub fn numeric_points(records: Vec<HistoryRecord>) -> Vec<HistoryPoint> {
    let mut points: Vec<HistoryPoint> = records
        .into_iter()
        .filter_map(|record| {
            let value = record.state.trim().parse::<f64>().ok()?;
            value.is_finite().then_some(HistoryPoint {
                timestamp: record.timestamp,
                value,
            })
        })
        .collect();
    points.sort_by_key(|p| p.timestamp);
    points
}

/// Folds a snapshot and its numeric history into a wire summary.
///
/// Statistics are present iff `history` is non-empty. `recent_data` holds
/// the last `min(history_points, history.len())` points when both are
/// non-zero.
#[must_use]
pub fn summarize(
    snapshot: &EntitySnapshot,
    history: &[HistoryPoint],
    history_points: u8,
) -> EntitySummary {
    let mut summary = EntitySummary {
        domain: domain_of(&snapshot.entity_id).to_string(),
        entity_id: sanitize_entity_id(&snapshot.entity_id),
        display_name: snapshot.display_name.clone(),
        current: snapshot.raw_state.clone(),
        last_changed: snapshot.last_changed.format(TIMESTAMP_FORMAT).to_string(),
        unit: snapshot.unit.clone().filter(|u| !u.is_empty()),
        avg_24h: None,
        min_24h: None,
        max_24h: None,
        recent_data: None,
    };

    let Some(stats) = Stats::over(history) else {
        return summary;
    };
    summary.avg_24h = Some(format_value(stats.avg));
    summary.min_24h = Some(format_value(stats.min));
    summary.max_24h = Some(format_value(stats.max));

    if history_points > 0 {
        let take = usize::from(history_points).min(history.len());
        let recent = history
            .iter()
            .skip(history.len() - take)
            .map(|p| RecentSample {
                time: p.timestamp.format(SAMPLE_TIME_FORMAT).to_string(),
                value: format_value(p.value),
            })
            .collect();
        summary.recent_data = Some(recent);
    }

    summary
}

#[derive(Debug, Clone, Copy)]
struct Stats {
    avg: f64,
    min: f64,
    max: f64,
}

impl Stats {
    fn over(points: &[HistoryPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let (sum, min, max) = points.iter().fold(
            (0.0_f64, f64::INFINITY, f64::NEG_INFINITY),
            |(sum, min, max), p| (sum + p.value, min.min(p.value), max.max(p.value)),
        );
        #[allow(clippy::cast_precision_loss)]
        let avg = sum / points.len() as f64;
        Some(Self { avg, min, max })
    }
}

fn format_value(value: f64) -> String {
    format!("{value:.2}")
}
