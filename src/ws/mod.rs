//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams [`crate::domain::RelayEvent`]s
//! filtered by instance and accepts refresh and status commands.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
