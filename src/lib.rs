//! # trmnl-relay
//!
//! Periodically collects Home Assistant entity state and 24 h history,
//! condenses it into a domain-grouped JSON document, and pushes it to a
//! TRMNL e-ink display's webhook under a strict 2 KiB payload limit.
//!
//! Each configured instance runs its own refresh loop. The REST API and
//! WebSocket endpoint manage instances, trigger on-demand refreshes, and
//! stream refresh outcomes.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── RelayService + CoordinatorRegistry (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Coordinator: one refresh loop per instance (service/)
//!     │     aggregate → build payload → size guard → deliver (pipeline/)
//!     │
//!     ├── Home Assistant REST API (source/)
//!     └── TRMNL webhook (pipeline/delivery)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod source;
pub mod ws;
