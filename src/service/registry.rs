//! Concurrent store of live coordinators.
//!
//! [`CoordinatorRegistry`] maps each [`InstanceId`] to its
//! [`Coordinator`]. Coordinators are handed out as `Arc`s so callers can
//! trigger or inspect an instance without holding the map lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::coordinator::Coordinator;
use crate::domain::InstanceId;
use crate::error::RelayError;

/// Central store for all active instances.
///
/// # Concurrency
///
/// The outer map is guarded by a [`RwLock`]. Per-instance state lives
/// inside each [`Coordinator`], so lookups never serialize refreshes.
#[derive(Debug)]
pub struct CoordinatorRegistry {
    coordinators: RwLock<HashMap<InstanceId, Arc<Coordinator>>>,
}

impl CoordinatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            coordinators: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::AlreadyConfigured`] if another instance already
    /// targets the same webhook, or [`RelayError::InvalidRequest`] if the
    /// ID is taken.
    pub async fn insert(&self, coordinator: Arc<Coordinator>) -> Result<InstanceId, RelayError> {
        let id = coordinator.id();
        let mut map = self.coordinators.write().await;
        if map.contains_key(&id) {
            return Err(RelayError::InvalidRequest(format!(
                "instance {id} already exists"
            )));
        }
        let webhook_id = &coordinator.config().webhook_id;
        if map.values().any(|c| &c.config().webhook_id == webhook_id) {
            return Err(RelayError::AlreadyConfigured(webhook_id.clone()));
        }
        map.insert(id, coordinator);
        Ok(id)
    }

    /// Looks up a coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InstanceNotFound`] if `id` is unknown.
    pub async fn get(&self, id: InstanceId) -> Result<Arc<Coordinator>, RelayError> {
        let map = self.coordinators.read().await;
        map.get(&id)
            .map(Arc::clone)
            .ok_or(RelayError::InstanceNotFound(id))
    }

    /// Swaps in a new coordinator under an existing ID, returning the old
    /// one so the caller can tear it down.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InstanceNotFound`] if the ID is not registered.
    pub async fn replace(&self, coordinator: Arc<Coordinator>) -> Result<Arc<Coordinator>, RelayError> {
        let id = coordinator.id();
        let mut map = self.coordinators.write().await;
        let Some(slot) = map.get_mut(&id) else {
            return Err(RelayError::InstanceNotFound(id));
        };
        Ok(std::mem::replace(slot, coordinator))
    }

    /// Unregisters a coordinator and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InstanceNotFound`] if `id` is unknown.
    pub async fn remove(&self, id: InstanceId) -> Result<Arc<Coordinator>, RelayError> {
        let mut map = self.coordinators.write().await;
        map.remove(&id).ok_or(RelayError::InstanceNotFound(id))
    }

    /// Unregisters every coordinator.
    pub async fn drain(&self) -> Vec<Arc<Coordinator>> {
        let mut map = self.coordinators.write().await;
        map.drain().map(|(_, c)| c).collect()
    }

    /// Returns `true` if some instance already posts to `webhook_id`.
    pub async fn contains_webhook(&self, webhook_id: &str) -> bool {
        let map = self.coordinators.read().await;
        map.values().any(|c| c.config().webhook_id == webhook_id)
    }

    /// All coordinators, ordered by display name.
    pub async fn list(&self) -> Vec<Arc<Coordinator>> {
        let map = self.coordinators.read().await;
        let mut all: Vec<Arc<Coordinator>> = map.values().map(Arc::clone).collect();
        all.sort_by_cached_key(|c| (c.config().display_name(), c.id().to_string()));
        all
    }

    /// Returns the number of registered instances.
    pub async fn len(&self) -> usize {
        self.coordinators.read().await.len()
    }

    /// Returns `true` if no instances are registered.
    pub async fn is_empty(&self) -> bool {
        self.coordinators.read().await.is_empty()
    }
}

impl Default for CoordinatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::{EventBus, InstanceConfig};
    use crate::pipeline::delivery::fake::ScriptedTransport;
    use crate::pipeline::{DeliveryClient, WebhookTransport};
    use crate::service::coordinator::PipelineContext;
    use crate::source::{HistorySource, InMemorySource, StateSource};

    fn context() -> PipelineContext {
        let source = Arc::new(InMemorySource::new());
        PipelineContext {
            states: Arc::clone(&source) as Arc<dyn StateSource>,
            history: source as Arc<dyn HistorySource>,
            delivery: DeliveryClient::new(
                Arc::new(ScriptedTransport::default()) as Arc<dyn WebhookTransport>
            ),
            webhook_base_url: "http://trmnl.local".to_string(),
            timezone: chrono_tz::Tz::UTC,
        }
    }

    fn make(id: InstanceId, webhook_id: &str, name: &str) -> Arc<Coordinator> {
        let config = InstanceConfig {
            webhook_id: webhook_id.to_string(),
            entities: vec!["sensor.a".to_string()],
            update_interval: 60,
            history_points: 0,
            name: Some(name.to_string()),
        };
        Arc::new(Coordinator::new(id, config, &context(), EventBus::new(4)))
    }

    #[tokio::test]
    async fn insert_and_get() {
        let registry = CoordinatorRegistry::new();
        let id = InstanceId::new();
        let Ok(inserted) = registry.insert(make(id, "hook", "A")).await else {
            panic!("insert should succeed");
        };
        assert_eq!(inserted, id);
        assert_eq!(registry.len().await, 1);
        let Ok(found) = registry.get(id).await else {
            panic!("instance should exist");
        };
        assert_eq!(found.id(), id);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let registry = CoordinatorRegistry::new();
        let result = registry.get(InstanceId::new()).await;
        assert!(matches!(result, Err(RelayError::InstanceNotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_webhook_is_rejected() {
        let registry = CoordinatorRegistry::new();
        let _ = registry.insert(make(InstanceId::new(), "hook", "A")).await;
        let result = registry.insert(make(InstanceId::new(), "hook", "B")).await;
        assert!(matches!(result, Err(RelayError::AlreadyConfigured(ref w)) if w == "hook"));
        assert!(registry.contains_webhook("hook").await);
        assert!(!registry.contains_webhook("other").await);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let registry = CoordinatorRegistry::new();
        let id = InstanceId::new();
        let _ = registry.insert(make(id, "one", "A")).await;
        let result = registry.insert(make(id, "two", "B")).await;
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn replace_returns_previous() {
        let registry = CoordinatorRegistry::new();
        let id = InstanceId::new();
        let _ = registry.insert(make(id, "hook", "Old")).await;
        let Ok(old) = registry.replace(make(id, "hook", "New")).await else {
            panic!("replace should succeed");
        };
        assert_eq!(old.config().name.as_deref(), Some("Old"));
        let Ok(current) = registry.get(id).await else {
            panic!("instance should exist");
        };
        assert_eq!(current.config().name.as_deref(), Some("New"));
    }

    #[tokio::test]
    async fn replace_unknown_is_not_found() {
        let registry = CoordinatorRegistry::new();
        let result = registry.replace(make(InstanceId::new(), "hook", "A")).await;
        assert!(matches!(result, Err(RelayError::InstanceNotFound(_))));
    }

    #[tokio::test]
    async fn remove_and_list() {
        let registry = CoordinatorRegistry::new();
        let a = InstanceId::new();
        let _ = registry.insert(make(a, "a", "Beta")).await;
        let _ = registry.insert(make(InstanceId::new(), "b", "Alpha")).await;

        let names: Vec<String> = registry
            .list()
            .await
            .iter()
            .map(|c| c.config().display_name())
            .collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);

        assert!(registry.remove(a).await.is_ok());
        assert!(registry.remove(a).await.is_err());
        assert_eq!(registry.len().await, 1);

        assert_eq!(registry.drain().await.len(), 1);
        assert!(registry.is_empty().await);
    }
}
