//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{InstanceListResponse, PaginationMeta, RefreshResponse};
use super::handlers::{instance, system};
use crate::domain::{InstanceConfig, RefreshPhase, RefreshResult, RefreshStatus};
use crate::error::{ErrorBody, ErrorResponse};
use crate::service::InstanceStatus;

/// Generated OpenAPI 3.1 document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "trmnl-relay",
        description = "Pushes Home Assistant entity snapshots to TRMNL e-ink displays."
    ),
    paths(
        system::health_handler,
        instance::create_instance,
        instance::list_instances,
        instance::get_instance,
        instance::update_instance,
        instance::delete_instance,
        instance::refresh_instance,
    ),
    components(schemas(
        system::HealthResponse,
        InstanceConfig,
        InstanceStatus,
        InstanceListResponse,
        PaginationMeta,
        RefreshResponse,
        RefreshResult,
        RefreshStatus,
        RefreshPhase,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Instances", description = "Webhook instances and refresh triggers"),
    )
)]
pub struct ApiDoc;
