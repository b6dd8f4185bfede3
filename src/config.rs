//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Per-instance settings live in
//! [`crate::domain::InstanceConfig`] and arrive over the API or from
//! `INSTANCES_FILE`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono_tz::Tz;

use crate::domain::InstanceConfig;

/// Home Assistant URL when running as a Supervisor add-on.
pub const SUPERVISOR_BASE_URL: &str = "http://supervisor/core";
/// Home Assistant URL otherwise.
pub const LOCAL_BASE_URL: &str = "http://localhost:8123";
/// Default TRMNL server.
pub const DEFAULT_TRMNL_BASE_URL: &str = "https://usetrmnl.com";

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Home Assistant base URL.
    pub ha_base_url: String,

    /// Long-lived access token or Supervisor token.
    pub ha_token: String,

    /// TRMNL base URL; webhooks live under `/api/custom_plugins/`.
    pub trmnl_base_url: String,

    /// Optional JSON file with instances to restore at startup.
    pub instances_file: Option<PathBuf>,

    /// Timezone for `last_update`.
    pub display_timezone: Tz,

    /// Capacity of the EventBus broadcast channel.
    pub event_bus_capacity: usize,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("listen_addr", &self.listen_addr)
            .field("ha_base_url", &self.ha_base_url)
            .field("ha_token", &"<redacted>")
            .field("trmnl_base_url", &self.trmnl_base_url)
            .field("instances_file", &self.instances_file)
            .field("display_timezone", &self.display_timezone)
            .field("event_bus_capacity", &self.event_bus_capacity)
            .finish()
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is set, or if `LISTEN_ADDR` or
    /// `DISPLAY_TIMEZONE` cannot be parsed.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr: SocketAddr = var("LISTEN_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse()?;

        let supervisor_token = var("SUPERVISOR_TOKEN");
        let ha_base_url = var("HA_BASE_URL").unwrap_or_else(|| {
            if supervisor_token.is_some() {
                SUPERVISOR_BASE_URL.to_string()
            } else {
                LOCAL_BASE_URL.to_string()
            }
        });
        let ha_token = var("HA_TOKEN")
            .or(supervisor_token)
            .ok_or("HA_TOKEN or SUPERVISOR_TOKEN must be set")?;

        let trmnl_base_url =
            var("TRMNL_BASE_URL").unwrap_or_else(|| DEFAULT_TRMNL_BASE_URL.to_string());

        let instances_file = var("INSTANCES_FILE").map(PathBuf::from);

        let display_timezone = match var("DISPLAY_TIMEZONE") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| format!("invalid DISPLAY_TIMEZONE '{name}': {e}"))?,
            None => Tz::UTC,
        };

        let event_bus_capacity = var("EVENT_BUS_CAPACITY")
            .and_then(|v| v.parse().ok())
            .unwrap_or(1024);

        Ok(Self {
            listen_addr,
            ha_base_url,
            ha_token,
            trmnl_base_url,
            instances_file,
            display_timezone,
            event_bus_capacity,
        })
    }
}

/// Reads a JSON array of instance configurations.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a JSON array of
/// instance configurations.
pub fn load_instances_file(path: &Path) -> anyhow::Result<Vec<InstanceConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading instances file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parsing instances file {}", path.display()))
}
