//! Home Assistant REST API client.
//!
//! Implements [`StateSource`] via `GET /api/states/{entity_id}` and
//! [`HistorySource`] via `GET /api/history/period/{start}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{HistorySource, SourceError, StateSource};
use crate::domain::{EntitySnapshot, HistoryRecord};

/// Per-request timeout for Home Assistant reads.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// State object as returned by `/api/states/{entity_id}`.
#[derive(Debug, Deserialize)]
struct HaState {
    entity_id: String,
    state: String,
    #[serde(default)]
    attributes: serde_json::Value,
    last_changed: String,
}

/// History record as returned by `/api/history/period` with `no_attributes`.
#[derive(Debug, Deserialize)]
struct HaHistoryState {
    state: String,
    last_changed: String,
}

/// Home Assistant REST API client.
#[derive(Debug, Clone)]
pub struct HomeAssistantClient {
    base_url: String,
    token: String,
    client: Client,
}

impl HomeAssistantClient {
    /// Creates a client for `base_url` authenticating with a long-lived or
    /// supervisor token.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    /// Base URL without trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches the current state of one entity. `Ok(None)` on 404.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] on transport failure, authentication
    /// failure, or an unparseable body.
    pub async fn get_state(&self, entity_id: &str) -> Result<Option<EntitySnapshot>, SourceError> {
        let url = format!(
            "{}/api/states/{}",
            self.base_url,
            urlencoding::encode(entity_id)
        );
        tracing::trace!(entity_id, %url, "reading entity state");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let state = response.json::<HaState>().await?;
                snapshot_from(state).map(Some)
            }
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SourceError::AuthenticationFailed)
            }
            status => Err(SourceError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }

    /// Fetches recorded state changes of one entity in `[start, end]`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] on transport failure or a non-200 answer.
    pub async fn get_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, SourceError> {
        let start_str = start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end_str = end.to_rfc3339_opts(SecondsFormat::Secs, true);
        let url = format!(
            "{}/api/history/period/{}?filter_entity_id={}&end_time={}&no_attributes",
            self.base_url,
            urlencoding::encode(&start_str),
            urlencoding::encode(entity_id),
            urlencoding::encode(&end_str),
        );
        tracing::trace!(entity_id, %url, "reading entity history");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                // One inner array per entity; we filtered to a single entity.
                let history: Vec<Vec<HaHistoryState>> = response.json().await?;
                let Some(states) = history.into_iter().next() else {
                    return Ok(Vec::new());
                };

                let records = states
                    .into_iter()
                    .filter_map(|s| match parse_timestamp(&s.last_changed) {
                        Ok(timestamp) => Some(HistoryRecord {
                            timestamp,
                            state: s.state,
                        }),
                        Err(_) => {
                            tracing::trace!(entity_id, raw = %s.last_changed, "skipping record with bad timestamp");
                            None
                        }
                    })
                    .collect::<Vec<_>>();
                tracing::debug!(entity_id, records = records.len(), "history read");
                Ok(records)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(SourceError::AuthenticationFailed)
            }
            status => Err(SourceError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl StateSource for HomeAssistantClient {
    async fn read_state(&self, entity_id: &str) -> Result<Option<EntitySnapshot>, SourceError> {
        self.get_state(entity_id).await
    }
}

#[async_trait]
impl HistorySource for HomeAssistantClient {
    async fn read_history(
        &self,
        entity_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryRecord>, SourceError> {
        self.get_history(entity_id, start, end).await
    }
}

fn snapshot_from(state: HaState) -> Result<EntitySnapshot, SourceError> {
    let last_changed = parse_timestamp(&state.last_changed)?;
    let display_name = state
        .attributes
        .get("friendly_name")
        .and_then(serde_json::Value::as_str)
        .map_or_else(|| state.entity_id.clone(), str::to_string);
    let unit = state
        .attributes
        .get("unit_of_measurement")
        .and_then(serde_json::Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string);

    Ok(EntitySnapshot {
        entity_id: state.entity_id,
        display_name,
        raw_state: state.state,
        unit,
        last_changed,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, SourceError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SourceError::InvalidResponse(format!("bad timestamp '{raw}': {e}")))
}
