//! Data Transfer Objects for REST request/response serialization.
//!
//! Instance configuration and status are exposed as-is from the domain and
//! service layers; this module adds the list and refresh envelopes.

pub mod common_dto;
pub mod instance_dto;

pub use common_dto::*;
pub use instance_dto::*;
