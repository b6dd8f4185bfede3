//! Relay service: instance lifecycle and on-demand refresh.

use std::sync::Arc;

use chrono::Utc;

use super::coordinator::{Coordinator, InstanceStatus, PipelineContext, RefreshOutcome};
use super::registry::CoordinatorRegistry;
use crate::domain::{EventBus, InstanceConfig, InstanceId, RelayEvent};
use crate::error::RelayError;

/// Body posted once when an instance is created, to prove the webhook
/// exists before anything is scheduled.
pub const CONNECTIVITY_TEST_BODY: &str =
    r#"{"merge_variables":{"test":"true","message":"trmnl-relay connectivity test"}}"#;

/// Orchestration layer for all instance operations.
///
/// Owns the [`CoordinatorRegistry`] for state and the [`EventBus`] for
/// lifecycle events. Every new coordinator must complete one successful
/// cycle before it is registered and scheduled.
#[derive(Debug, Clone)]
pub struct RelayService {
    registry: Arc<CoordinatorRegistry>,
    event_bus: EventBus,
    context: PipelineContext,
}

impl RelayService {
    /// Creates a new `RelayService`.
    #[must_use]
    pub fn new(
        registry: Arc<CoordinatorRegistry>,
        event_bus: EventBus,
        context: PipelineContext,
    ) -> Self {
        Self {
            registry,
            event_bus,
            context,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the inner [`CoordinatorRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<CoordinatorRegistry> {
        &self.registry
    }

    /// Sets up a new instance: validation, webhook connectivity test,
    /// initial refresh, registration, schedule start.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InvalidConfig`] if `config` is invalid.
    /// - [`RelayError::AlreadyConfigured`] if the webhook is taken.
    /// - [`RelayError::SetupValidation`] if the test payload is rejected.
    /// - [`RelayError::NotReady`] if the initial refresh fails.
    pub async fn create_instance(&self, config: InstanceConfig) -> Result<InstanceStatus, RelayError> {
        self.precheck(&config).await?;

        let url = config.webhook_url(&self.context.webhook_base_url);
        if let Err(e) = self
            .context
            .delivery
            .probe(&url, CONNECTIVITY_TEST_BODY.as_bytes())
            .await
        {
            tracing::warn!(webhook_id = %config.webhook_id, error = %e, "webhook connectivity test failed");
            return Err(RelayError::SetupValidation(e.to_string()));
        }

        let coordinator = self.activate(InstanceId::new(), config).await?;
        Ok(coordinator.status().await)
    }

    /// Re-creates an instance from persisted configuration without the
    /// connectivity test.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_instance`] minus
    /// [`RelayError::SetupValidation`].
    pub async fn restore_instance(&self, config: InstanceConfig) -> Result<InstanceId, RelayError> {
        self.precheck(&config).await?;
        let coordinator = self.activate(InstanceId::new(), config).await?;
        Ok(coordinator.id())
    }

    /// Restores every configuration, logging and skipping the ones that
    /// are invalid or not ready. Returns how many came up.
    pub async fn restore_all(&self, configs: Vec<InstanceConfig>) -> usize {
        let total = configs.len();
        let mut restored = 0usize;
        for config in configs {
            let name = config.display_name();
            match self.restore_instance(config).await {
                Ok(id) => {
                    restored += 1;
                    tracing::info!(instance_id = %id, name, "instance restored");
                }
                Err(e) => tracing::error!(name, error = %e, "instance skipped"),
            }
        }
        tracing::info!(restored, total, "instances restored");
        restored
    }

    /// Replaces an instance's configuration.
    ///
    /// The old coordinator's schedule is stopped first, and any cycle it
    /// has in flight is dropped, so the two never post at once. A fresh
    /// coordinator is then built under the same id and must pass its
    /// initial refresh before it takes over.
    ///
    /// # Errors
    ///
    /// - [`RelayError::InstanceNotFound`] if `id` is unknown.
    /// - [`RelayError::InvalidConfig`] if `config` is invalid or changes
    ///   the webhook.
    /// - [`RelayError::NotReady`] if the initial refresh fails; the old
    ///   coordinator's schedule is restarted.
    pub async fn reconfigure_instance(
        &self,
        id: InstanceId,
        config: InstanceConfig,
    ) -> Result<InstanceStatus, RelayError> {
        config.validate()?;
        let current = self.registry.get(id).await?;
        if current.config().webhook_id != config.webhook_id {
            return Err(RelayError::InvalidConfig(
                "webhook_id cannot be changed; remove and re-create the instance".to_string(),
            ));
        }

        current.stop().await;
        let replacement = Arc::new(Coordinator::new(
            id,
            config,
            &self.context,
            self.event_bus.clone(),
        ));
        if let Err(e) = initial_refresh(&replacement).await {
            tracing::warn!(instance_id = %id, error = %e, "reconfiguration rejected, keeping previous config");
            current.start();
            return Err(e);
        }

        let previous = self.registry.replace(Arc::clone(&replacement)).await?;
        previous.shutdown();
        replacement.start();

        tracing::info!(instance_id = %id, "instance reconfigured");
        Ok(replacement.status().await)
    }

    /// Removes an instance, cancelling its timer and abandoning any
    /// in-flight cycle.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InstanceNotFound`] if `id` is unknown.
    pub async fn remove_instance(&self, id: InstanceId) -> Result<(), RelayError> {
        let coordinator = self.registry.remove(id).await?;
        coordinator.shutdown();

        let _ = self.event_bus.publish(RelayEvent::InstanceRemoved {
            instance_id: id,
            timestamp: Utc::now(),
        });
        tracing::info!(instance_id = %id, "instance removed");
        Ok(())
    }

    /// Requests an immediate refresh.
    ///
    /// Returns `true` if the request was accepted, `false` if it was
    /// coalesced into a cycle already in flight.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InstanceNotFound`] if `id` is unknown.
    pub async fn trigger_refresh(&self, id: InstanceId) -> Result<bool, RelayError> {
        let coordinator = self.registry.get(id).await.inspect_err(|_| {
            tracing::error!(instance_id = %id, "refresh requested for unknown instance");
        })?;
        let accepted = coordinator.request_refresh();
        tracing::info!(instance_id = %id, accepted, "on-demand refresh requested");
        Ok(accepted)
    }

    /// Returns the status of one instance.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InstanceNotFound`] if `id` is unknown.
    pub async fn instance_status(&self, id: InstanceId) -> Result<InstanceStatus, RelayError> {
        let coordinator = self.registry.get(id).await?;
        Ok(coordinator.status().await)
    }

    /// Returns the status of every instance, ordered by name.
    pub async fn list_instances(&self) -> Vec<InstanceStatus> {
        let coordinators = self.registry.list().await;
        let mut statuses = Vec::with_capacity(coordinators.len());
        for coordinator in coordinators {
            statuses.push(coordinator.status().await);
        }
        statuses
    }

    /// Stops every instance. Used on process shutdown.
    pub async fn shutdown_all(&self) {
        for coordinator in self.registry.drain().await {
            coordinator.shutdown();
        }
    }

    async fn precheck(&self, config: &InstanceConfig) -> Result<(), RelayError> {
        config.validate()?;
        if self.registry.contains_webhook(&config.webhook_id).await {
            return Err(RelayError::AlreadyConfigured(config.webhook_id.clone()));
        }
        Ok(())
    }

    async fn activate(
        &self,
        id: InstanceId,
        config: InstanceConfig,
    ) -> Result<Arc<Coordinator>, RelayError> {
        let coordinator = Arc::new(Coordinator::new(
            id,
            config,
            &self.context,
            self.event_bus.clone(),
        ));
        initial_refresh(&coordinator).await?;

        self.registry.insert(Arc::clone(&coordinator)).await?;
        coordinator.start();

        let config = coordinator.config();
        let _ = self.event_bus.publish(RelayEvent::InstanceCreated {
            instance_id: id,
            name: config.display_name(),
            entity_count: config.entities.len(),
            timestamp: Utc::now(),
        });
        tracing::info!(instance_id = %id, name = %config.display_name(), "instance created");
        Ok(coordinator)
    }
}

async fn initial_refresh(coordinator: &Coordinator) -> Result<(), RelayError> {
    match coordinator.refresh().await {
        RefreshOutcome::Completed(result) if result.is_success() => Ok(()),
        RefreshOutcome::Completed(result) => Err(RelayError::NotReady(
            result
                .error
                .unwrap_or_else(|| "initial refresh failed".to_string()),
        )),
        RefreshOutcome::Coalesced => Err(RelayError::Internal(
            "initial refresh overlapped another cycle".to_string(),
        )),
    }
}
