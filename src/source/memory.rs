//! In-memory state and history source.
//!
//! Holds snapshots and history records in maps. History reads honour the
//! requested window. Individual entities can be marked as failing to
//! exercise degraded paths.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{HistorySource, SourceError, StateSource};
use crate::domain::{EntitySnapshot, HistoryRecord};

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<String, EntitySnapshot>,
    history: HashMap<String, Vec<HistoryRecord>>,
    failing_history: HashSet<String>,
    states_offline: bool,
}

/// Map-backed [`StateSource`] + [`HistorySource`].
#[derive(Debug, Default)]
pub struct InMemorySource {
    inner: RwLock<Inner>,
}

impl InMemorySource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an entity snapshot.
    pub async fn set_state(&self, snapshot: EntitySnapshot) {
        let mut inner = self.inner.write().await;
        inner.states.insert(snapshot.entity_id.clone(), snapshot);
    }

    /// Replaces the history of an entity.
    pub async fn set_history(&self, entity_id: &str, records: Vec<HistoryRecord>) {
        let mut inner = self.inner.write().await;
        inner.history.insert(entity_id.to_string(), records);
    }

    /// Makes history reads for `entity_id` fail.
    pub async fn fail_history(&self, entity_id: &str) {
        let mut inner = self.inner.write().await;
        inner.failing_history.insert(entity_id.to_string());
    }

    /// Makes every state read fail as if the host were unreachable.
    pub async fn set_states_offline(&self, offline: bool) {
        self.inner.write().await.states_offline = offline;
    }
}

#[async_trait]
impl StateSource for InMemorySource {
    async fn read_state(&self, entity_id: &str) -> Result<Option<EntitySnapshot>, SourceError> {
        let inner = self.inner.read().await;
        if inner.states_offline {
            return Err(SourceError::Unavailable("state store offline".to_string()));
        }
        Ok(inner.states.get(entity_id).cloned())
    }
}

#[async_trait]
impl HistorySource for InMemorySource {
    async fn read_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, SourceError> {
        let inner = self.inner.read().await;
        if inner.failing_history.contains(entity_id) {
            return Err(SourceError::Unavailable(format!(
                "history for {entity_id} unavailable"
            )));
        }
        Ok(inner
            .history
            .get(entity_id)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.timestamp >= start && r.timestamp <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn history_is_windowed() {
        let source = InMemorySource::new();
        let now = Utc::now();
        source
            .set_history(
                "sensor.a",
                vec![
                    HistoryRecord {
                        timestamp: now - Duration::hours(30),
                        state: "1".to_string(),
                    },
                    HistoryRecord {
                        timestamp: now - Duration::hours(1),
                        state: "2".to_string(),
                    },
                ],
            )
            .await;

        let Ok(records) = source
            .read_history("sensor.a", now - Duration::hours(24), now)
            .await
        else {
            panic!("history should load");
        };
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().map(|r| r.state.as_str()), Some("2"));
    }

    #[tokio::test]
    async fn unknown_state_is_none_and_offline_is_error() {
        let source = InMemorySource::new();
        assert!(matches!(source.read_state("sensor.x").await, Ok(None)));
        source.set_states_offline(true).await;
        assert!(source.read_state("sensor.x").await.is_err());
    }
}
