//! Per-instance refresh coordinator.
//!
//! A [`Coordinator`] owns one instance's pipeline and drives it on a fixed
//! interval or on demand. At most one cycle runs at a time; a trigger that
//! arrives while a cycle is in flight is coalesced into it.
//!
//! ```text
//! Idle ──tick/trigger──▶ Refreshing ──▶ Success | Failed ──▶ Idle
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use utoipa::ToSchema;

use crate::domain::{
    EventBus, InstanceConfig, InstanceId, RefreshPhase, RefreshResult, RelayEvent,
};
use crate::error::RelayError;
use crate::pipeline::{DeliveryClient, EntityAggregator, PayloadBuilder, size_guard};
use crate::source::{HistorySource, StateSource};

const LAST_UPDATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Collaborators shared by every coordinator in the process.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Current-state lookup.
    pub states: Arc<dyn StateSource>,
    /// History lookup.
    pub history: Arc<dyn HistorySource>,
    /// Retrying webhook sender.
    pub delivery: DeliveryClient,
    /// TRMNL base URL, e.g. `https://usetrmnl.com`.
    pub webhook_base_url: String,
    /// Timezone used for `last_update`.
    pub timezone: Tz,
}

/// Result of asking a coordinator to refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This call ran a full cycle.
    Completed(RefreshResult),
    /// A cycle was already in flight; nothing new was started.
    Coalesced,
}

/// Observable state of one instance.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InstanceStatus {
    /// Instance identifier.
    #[schema(value_type = String, format = Uuid)]
    pub instance_id: InstanceId,
    /// Display name.
    pub name: String,
    /// Active configuration.
    pub config: InstanceConfig,
    /// Whether a cycle is in flight.
    pub phase: RefreshPhase,
    /// Most recent completed cycle.
    pub last_result: Option<RefreshResult>,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    last_result: Option<RefreshResult>,
    consecutive_failures: u32,
}

#[derive(Debug, Clone, Copy)]
struct CycleReport {
    entity_count: usize,
    payload_bytes: usize,
}

/// Refresh scheduler and pipeline runner for one instance.
#[derive(Debug)]
pub struct Coordinator {
    id: InstanceId,
    config: InstanceConfig,
    webhook_url: String,
    timezone: Tz,
    aggregator: EntityAggregator,
    delivery: DeliveryClient,
    event_bus: EventBus,
    in_flight: AtomicBool,
    cycles_started: AtomicU64,
    trigger_mark: AtomicU64,
    state: RwLock<CoordinatorState>,
    trigger: Arc<Notify>,
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl Coordinator {
    /// Builds an idle coordinator. Call [`Self::start`] to schedule it.
    #[must_use]
    pub fn new(
        id: InstanceId,
        config: InstanceConfig,
        context: &PipelineContext,
        event_bus: EventBus,
    ) -> Self {
        let aggregator = EntityAggregator::new(
            Arc::clone(&context.states),
            Arc::clone(&context.history),
            config.history_points,
        );
        Self {
            id,
            webhook_url: config.webhook_url(&context.webhook_base_url),
            config,
            timezone: context.timezone,
            aggregator,
            delivery: context.delivery.clone(),
            event_bus,
            in_flight: AtomicBool::new(false),
            cycles_started: AtomicU64::new(0),
            trigger_mark: AtomicU64::new(0),
            state: RwLock::new(CoordinatorState::default()),
            trigger: Arc::new(Notify::new()),
            schedule: Mutex::new(None),
        }
    }

    /// Instance identifier.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    /// Current phase, derived from the single-flight flag.
    #[must_use]
    pub fn phase(&self) -> RefreshPhase {
        if self.in_flight.load(Ordering::Acquire) {
            RefreshPhase::Refreshing
        } else {
            RefreshPhase::Idle
        }
    }

    /// Runs one cycle now unless one is already in flight.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Some(_flight) = FlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(instance_id = %self.id, "refresh already in flight, coalescing");
            return RefreshOutcome::Coalesced;
        };
        self.cycles_started.fetch_add(1, Ordering::AcqRel);

        let result = match self.run_cycle().await {
            Ok(report) => {
                tracing::info!(
                    instance_id = %self.id,
                    entity_count = report.entity_count,
                    payload_bytes = report.payload_bytes,
                    "refresh succeeded"
                );
                let _ = self.event_bus.publish(RelayEvent::RefreshSucceeded {
                    instance_id: self.id,
                    entity_count: report.entity_count,
                    payload_bytes: report.payload_bytes,
                    timestamp: Utc::now(),
                });
                RefreshResult::success(report.entity_count)
            }
            Err(e) => {
                tracing::error!(instance_id = %self.id, error = %e, "refresh failed");
                let _ = self.event_bus.publish(RelayEvent::RefreshFailed {
                    instance_id: self.id,
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                RefreshResult::failure(e.to_string())
            }
        };

        let mut state = self.state.write().await;
        if result.is_success() {
            state.consecutive_failures = 0;
        } else {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        }
        state.last_result = Some(result.clone());
        RefreshOutcome::Completed(result)
    }

    /// Asks the scheduled task for an immediate cycle.
    ///
    /// Returns `false` when a cycle is already in flight and the request
    /// was coalesced into it. A request that a cycle starting after it
    /// already serves does not run another one.
    pub fn request_refresh(&self) -> bool {
        if self.in_flight.load(Ordering::Acquire) {
            tracing::debug!(instance_id = %self.id, "refresh in flight, trigger coalesced");
            return false;
        }
        self.trigger_mark
            .store(self.cycles_started.load(Ordering::Acquire), Ordering::Release);
        self.trigger.notify_one();
        true
    }

    /// `true` once a cycle has started since the last on-demand request.
    fn trigger_served(&self) -> bool {
        self.cycles_started.load(Ordering::Acquire) > self.trigger_mark.load(Ordering::Acquire)
    }

    /// Starts the interval timer. Calling it twice restarts the timer.
    pub fn start(self: &Arc<Self>) {
        let period = self.config.interval();
        let task = tokio::spawn(run_schedule(
            Arc::downgrade(self),
            Arc::clone(&self.trigger),
            period,
        ));
        let previous = self
            .schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
        tracing::info!(
            instance_id = %self.id,
            interval_secs = period.as_secs(),
            "refresh schedule started"
        );
    }

    /// Cancels the timer and abandons any in-flight cycle without waiting.
    pub fn shutdown(&self) {
        let task = self
            .schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            tracing::info!(instance_id = %self.id, "refresh schedule stopped");
        }
    }

    /// Cancels the timer and waits until any in-flight cycle has been
    /// dropped, so the single-flight flag is clear on return.
    pub async fn stop(&self) {
        let task = self
            .schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
            tracing::info!(instance_id = %self.id, "refresh schedule stopped");
        }
    }

    /// Returns `true` while the interval timer task is alive.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.schedule
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Snapshot for display and diagnostics.
    pub async fn status(&self) -> InstanceStatus {
        let state = self.state.read().await;
        InstanceStatus {
            instance_id: self.id,
            name: self.config.display_name(),
            config: self.config.clone(),
            phase: self.phase(),
            last_result: state.last_result.clone(),
            consecutive_failures: state.consecutive_failures,
        }
    }

    async fn run_cycle(&self) -> Result<CycleReport, RelayError> {
        let cycle_start = Utc::now();
        let summaries = self
            .aggregator
            .collect(&self.config.entities, cycle_start)
            .await?;

        let last_update = format_last_update(cycle_start, self.timezone);
        let payload = PayloadBuilder::build(&last_update, &summaries);
        let body = payload.to_wire()?;

        let payload_bytes = size_guard::check(&body).inspect_err(|e| {
            tracing::error!(instance_id = %self.id, error = %e, "payload rejected");
        })?;
        tracing::info!(
            instance_id = %self.id,
            payload_bytes,
            limit = size_guard::PAYLOAD_LIMIT_BYTES,
            "payload size"
        );

        self.delivery.send(&self.webhook_url, &body).await?;

        Ok(CycleReport {
            entity_count: payload.entity_count(),
            payload_bytes,
        })
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        let slot = self
            .schedule
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = slot.take() {
            task.abort();
        }
    }
}

/// `last_update` stamp in the display timezone.
pub(crate) fn format_last_update(at: DateTime<Utc>, timezone: Tz) -> String {
    at.with_timezone(&timezone)
        .format(LAST_UPDATE_FORMAT)
        .to_string()
}

/// Interval loop. Holds only a weak reference between cycles so a dropped
/// coordinator ends its own schedule.
async fn run_schedule(
    coordinator: Weak<Coordinator>,
    trigger: Arc<Notify>,
    period: std::time::Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let on_demand = tokio::select! {
            _ = ticker.tick() => false,
            () = trigger.notified() => true,
        };

        let Some(coordinator) = coordinator.upgrade() else {
            return;
        };
        if on_demand && coordinator.trigger_served() {
            tracing::debug!(instance_id = %coordinator.id, "on-demand refresh already served");
            continue;
        }
        tracing::debug!(instance_id = %coordinator.id, on_demand, "refresh due");
        let _ = coordinator.refresh().await;
    }
}

/// Holds the single-flight flag for the duration of a cycle. Dropping it,
/// including on task abort, clears the flag.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::{EntitySnapshot, HistoryRecord, RefreshStatus};
    use crate::pipeline::WebhookTransport;
    use crate::pipeline::aggregator::summarize;
    use crate::pipeline::delivery::DeliveryError;
    use crate::pipeline::delivery::fake::ScriptedTransport;
    use crate::source::InMemorySource;
    use chrono::TimeZone;
    use std::time::Duration;

    fn config(entities: &[&str], history_points: u8) -> InstanceConfig {
        InstanceConfig {
            webhook_id: "hook123".to_string(),
            entities: entities.iter().map(|e| (*e).to_string()).collect(),
            update_interval: 5,
            history_points,
            name: Some("Test".to_string()),
        }
    }

    async fn source_with(entities: &[(&str, &str)]) -> Arc<InMemorySource> {
        let source = Arc::new(InMemorySource::new());
        for (id, state) in entities {
            source
                .set_state(EntitySnapshot {
                    entity_id: (*id).to_string(),
                    display_name: (*id).to_string(),
                    raw_state: (*state).to_string(),
                    unit: None,
                    last_changed: Utc::now(),
                })
                .await;
        }
        source
    }

    fn context(source: &Arc<InMemorySource>, transport: &Arc<ScriptedTransport>) -> PipelineContext {
        PipelineContext {
            states: Arc::clone(source) as Arc<dyn StateSource>,
            history: Arc::clone(source) as Arc<dyn HistorySource>,
            delivery: DeliveryClient::new(Arc::clone(transport) as Arc<dyn WebhookTransport>)
                .with_retry_config(3, Duration::from_millis(1)),
            webhook_base_url: "http://trmnl.local".to_string(),
            timezone: Tz::UTC,
        }
    }

    fn coordinator(
        cfg: InstanceConfig,
        source: &Arc<InMemorySource>,
        transport: &Arc<ScriptedTransport>,
        bus: &EventBus,
    ) -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            InstanceId::new(),
            cfg,
            &context(source, transport),
            bus.clone(),
        ))
    }

    async fn settle(mut done: impl FnMut() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn successful_cycle_posts_grouped_payload() {
        let source = source_with(&[("sensor.a", "1"), ("sensor.b", "2"), ("light.c", "on")]).await;
        let transport = Arc::new(ScriptedTransport::default());
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let c = coordinator(config(&["sensor.a", "sensor.b", "light.c"], 0), &source, &transport, &bus);

        let RefreshOutcome::Completed(result) = c.refresh().await else {
            panic!("refresh should run");
        };
        assert_eq!(result.status, RefreshStatus::Success);
        assert_eq!(result.entity_count, 3);

        let calls = transport.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "http://trmnl.local/api/custom_plugins/hook123");
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&calls[0].body) else {
            panic!("body should be json");
        };
        let vars = &body["merge_variables"];
        assert_eq!(vars["sensors"].as_array().map(Vec::len), Some(2));
        assert_eq!(vars["lights"][0]["entity_id"], serde_json::json!("light_c"));

        let Ok(event) = rx.recv().await else {
            panic!("event expected");
        };
        assert_eq!(event.event_type_str(), "refresh_succeeded");

        let status = c.status().await;
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.phase, RefreshPhase::Idle);
    }

    #[tokio::test]
    async fn oversized_payload_fails_without_sending() {
        let ids: Vec<String> = (0..40).map(|i| format!("sensor.long_entity_name_{i}")).collect();
        let source = Arc::new(InMemorySource::new());
        for id in &ids {
            source
                .set_state(EntitySnapshot {
                    entity_id: id.clone(),
                    display_name: format!("A fairly verbose friendly name for {id}"),
                    raw_state: "123.456".to_string(),
                    unit: Some("kWh".to_string()),
                    last_changed: Utc::now(),
                })
                .await;
        }
        let transport = Arc::new(ScriptedTransport::default());
        let bus = EventBus::new(16);
        let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let c = coordinator(config(&refs, 0), &source, &transport, &bus);

        let RefreshOutcome::Completed(result) = c.refresh().await else {
            panic!("refresh should run");
        };
        assert_eq!(result.status, RefreshStatus::Failure);
        assert!(result.error.unwrap_or_default().contains("payload too large"));
        assert!(transport.calls().await.is_empty());
    }

    fn padded_snapshot(raw_state: String, last_changed: DateTime<Utc>) -> EntitySnapshot {
        EntitySnapshot {
            entity_id: "sensor.pad".to_string(),
            display_name: "Pad".to_string(),
            raw_state,
            unit: None,
            last_changed,
        }
    }

    /// Wire size of the `sensor.pad` payload with an empty state.
    fn unpadded_wire_len(last_changed: DateTime<Utc>) -> usize {
        let summary = summarize(&padded_snapshot(String::new(), last_changed), &[], 0);
        let Ok(body) = PayloadBuilder::build("2025-01-01 00:00:00", &[summary]).to_wire() else {
            panic!("payload should serialize");
        };
        body.len()
    }

    #[tokio::test]
    async fn payload_at_limit_is_sent_and_one_byte_over_is_not() {
        let changed = Utc::now();
        let base = unpadded_wire_len(changed);
        let limit = size_guard::PAYLOAD_LIMIT_BYTES;

        for (target, sent) in [(limit, true), (limit + 1, false)] {
            let source = Arc::new(InMemorySource::new());
            source
                .set_state(padded_snapshot("x".repeat(target - base), changed))
                .await;
            let transport = Arc::new(ScriptedTransport::default());
            let bus = EventBus::new(16);
            let c = coordinator(config(&["sensor.pad"], 0), &source, &transport, &bus);

            let RefreshOutcome::Completed(result) = c.refresh().await else {
                panic!("refresh should run");
            };
            let calls = transport.calls().await;
            if sent {
                assert!(result.is_success(), "{target} bytes should be sent");
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].body.len(), target);
            } else {
                assert!(!result.is_success(), "{target} bytes should be rejected");
                assert!(calls.is_empty());
            }
        }
    }

    #[tokio::test]
    async fn failure_then_success_resets_failure_count() {
        let source = source_with(&[("sensor.a", "1")]).await;
        let refused = || Err(DeliveryError::Transport("refused".to_string()));
        let transport = Arc::new(ScriptedTransport::new(vec![refused(), refused(), refused()]));
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a"], 0), &source, &transport, &bus);

        let RefreshOutcome::Completed(first) = c.refresh().await else {
            panic!("refresh should run");
        };
        assert!(!first.is_success());
        assert_eq!(c.status().await.consecutive_failures, 1);
        assert_eq!(transport.calls().await.len(), 3);

        let RefreshOutcome::Completed(second) = c.refresh().await else {
            panic!("refresh should run");
        };
        assert!(second.is_success());
        assert_eq!(c.status().await.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn missing_entities_are_skipped_not_fatal() {
        let source = source_with(&[("sensor.a", "1")]).await;
        let transport = Arc::new(ScriptedTransport::default());
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a", "sensor.gone"], 0), &source, &transport, &bus);

        let RefreshOutcome::Completed(result) = c.refresh().await else {
            panic!("refresh should run");
        };
        assert!(result.is_success());
        assert_eq!(result.entity_count, 1);
    }

    #[tokio::test]
    async fn history_points_shape_recent_data() {
        let source = source_with(&[("sensor.a", "4")]).await;
        let now = Utc::now();
        let records = (1..=4)
            .map(|i| HistoryRecord {
                timestamp: now - chrono::Duration::hours(5 - i),
                state: i.to_string(),
            })
            .collect();
        source.set_history("sensor.a", records).await;
        let transport = Arc::new(ScriptedTransport::default());
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a"], 2), &source, &transport, &bus);

        let _ = c.refresh().await;
        let calls = transport.calls().await;
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&calls[0].body) else {
            panic!("body should be json");
        };
        let entity = &body["merge_variables"]["sensors"][0];
        assert_eq!(entity["24h_avg"], serde_json::json!("2.50"));
        let values: Vec<&str> = entity["recent_data"]
            .as_array()
            .map(|a| a.iter().filter_map(|s| s["value"].as_str()).collect())
            .unwrap_or_default();
        assert_eq!(values, vec!["3.00", "4.00"]);
    }

    #[tokio::test]
    async fn concurrent_refresh_is_coalesced() {
        let source = source_with(&[("sensor.a", "1")]).await;
        let (transport, gate) = ScriptedTransport::gated();
        let transport = Arc::new(transport);
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a"], 0), &source, &transport, &bus);

        let running = tokio::spawn({
            let c = Arc::clone(&c);
            async move { c.refresh().await }
        });
        let watched = Arc::clone(&c);
        settle(move || watched.phase() == RefreshPhase::Refreshing).await;

        assert_eq!(c.refresh().await, RefreshOutcome::Coalesced);
        assert!(!c.request_refresh());

        gate.add_permits(1);
        let Ok(RefreshOutcome::Completed(result)) = running.await else {
            panic!("first refresh should complete");
        };
        assert!(result.is_success());
        assert_eq!(transport.calls().await.len(), 1);
        assert_eq!(c.phase(), RefreshPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_fires_on_interval_and_on_demand() {
        let source = source_with(&[("sensor.a", "1")]).await;
        let transport = Arc::new(ScriptedTransport::default());
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a"], 0), &source, &transport, &bus);
        c.start();
        assert!(c.is_scheduled());

        tokio::time::sleep(Duration::from_secs(5 * 60 + 1)).await;
        assert_eq!(transport.calls().await.len(), 1);

        assert!(c.request_refresh());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls().await.len(), 2);

        c.shutdown();
        tokio::time::sleep(Duration::from_secs(60 * 60)).await;
        assert_eq!(transport.calls().await.len(), 2);
        assert!(!c.is_scheduled());
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_served_by_a_later_cycle_is_not_repeated() {
        let source = source_with(&[("sensor.a", "1")]).await;
        let transport = Arc::new(ScriptedTransport::default());
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a"], 0), &source, &transport, &bus);
        c.start();

        // A cycle begins after the request but before the schedule wakes,
        // as a tick racing the trigger would.
        assert!(c.request_refresh());
        let RefreshOutcome::Completed(result) = c.refresh().await else {
            panic!("refresh should run");
        };
        assert!(result.is_success());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls().await.len(), 1);

        assert!(c.request_refresh());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.calls().await.len(), 2);
        c.shutdown();
    }

    #[tokio::test]
    async fn stop_waits_for_in_flight_cycle_to_be_dropped() {
        let source = source_with(&[("sensor.a", "1")]).await;
        let transport = Arc::new(ScriptedTransport::hanging());
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a"], 0), &source, &transport, &bus);
        c.start();
        assert!(c.request_refresh());

        let watched = Arc::clone(&c);
        settle(move || watched.phase() == RefreshPhase::Refreshing).await;

        c.stop().await;
        assert_eq!(c.phase(), RefreshPhase::Idle);
        assert!(!c.is_scheduled());
    }

    #[tokio::test]
    async fn shutdown_abandons_in_flight_cycle() {
        let source = source_with(&[("sensor.a", "1")]).await;
        let transport = Arc::new(ScriptedTransport::hanging());
        let bus = EventBus::new(16);
        let c = coordinator(config(&["sensor.a"], 0), &source, &transport, &bus);
        c.start();
        assert!(c.request_refresh());

        let watched = Arc::clone(&c);
        settle(move || watched.phase() == RefreshPhase::Refreshing).await;

        c.shutdown();
        let watched = Arc::clone(&c);
        settle(move || watched.phase() == RefreshPhase::Idle).await;
        assert!(c.status().await.last_result.is_none());
    }

    #[test]
    fn last_update_uses_display_timezone() {
        let Some(at) = Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).single() else {
            panic!("valid timestamp");
        };
        assert_eq!(format_last_update(at, Tz::UTC), "2025-01-15 12:00:00");
        assert_eq!(
            format_last_update(at, chrono_tz::Europe::Prague),
            "2025-01-15 13:00:00"
        );
    }
}
