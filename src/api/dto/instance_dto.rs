//! Instance DTOs for list and refresh responses.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::service::InstanceStatus;

/// Paginated list response for `GET /instances`.
#[derive(Debug, Serialize, ToSchema)]
pub struct InstanceListResponse {
    /// Instances on this page, ordered by name.
    pub data: Vec<InstanceStatus>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}

/// Response body for `POST /instances/{id}/refresh` (202 Accepted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    /// `false` when the request was folded into a cycle already running.
    pub accepted: bool,
}
