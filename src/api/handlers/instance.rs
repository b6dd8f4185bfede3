//! Instance handlers: create, list, get, update, delete, refresh.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{InstanceListResponse, PaginationParams, RefreshResponse};
use crate::app_state::AppState;
use crate::domain::{InstanceConfig, InstanceId};
use crate::error::{ErrorResponse, RelayError};
use crate::service::InstanceStatus;

/// `POST /instances` — Set up a new instance.
///
/// # Errors
///
/// Returns [`RelayError`] on invalid config, duplicate webhook, failed
/// connectivity test, or failed initial refresh.
#[utoipa::path(
    post,
    path = "/api/v1/instances",
    tag = "Instances",
    summary = "Create an instance",
    description = "Validates the configuration, posts a test payload to the webhook, runs the first refresh, and schedules the instance.",
    request_body = InstanceConfig,
    responses(
        (status = 201, description = "Instance created", body = InstanceStatus),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 409, description = "Webhook already configured", body = ErrorResponse),
        (status = 502, description = "Webhook connectivity test failed", body = ErrorResponse),
        (status = 503, description = "Initial refresh failed", body = ErrorResponse),
    )
)]
pub async fn create_instance(
    State(state): State<AppState>,
    Json(config): Json<InstanceConfig>,
) -> Result<impl IntoResponse, RelayError> {
    let status = state.relay_service.create_instance(config).await?;
    Ok((StatusCode::CREATED, Json(status)))
}

/// `GET /instances` — List instances with pagination.
///
/// # Errors
///
/// Returns [`RelayError`] on internal failures.
#[utoipa::path(
    get,
    path = "/api/v1/instances",
    tag = "Instances",
    summary = "List instances",
    description = "Returns a paginated list of all instances ordered by name.",
    params(PaginationParams),
    responses(
        (status = 200, description = "Paginated instance list", body = InstanceListResponse),
    )
)]
pub async fn list_instances(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, RelayError> {
    let statuses = state.relay_service.list_instances().await;
    let (data, pagination) = params.paginate(statuses);
    Ok(Json(InstanceListResponse { data, pagination }))
}

/// `GET /instances/:id` — Instance status.
///
/// # Errors
///
/// Returns [`RelayError::InstanceNotFound`] if the instance does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/instances/{id}",
    tag = "Instances",
    summary = "Get instance status",
    description = "Returns the configuration, current phase, and last refresh result of one instance.",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    responses(
        (status = 200, description = "Instance status", body = InstanceStatus),
        (status = 404, description = "Instance not found", body = ErrorResponse),
    )
)]
pub async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, RelayError> {
    let status = state
        .relay_service
        .instance_status(InstanceId::from_uuid(id))
        .await?;
    Ok(Json(status))
}

/// `PUT /instances/:id` — Replace an instance's configuration.
///
/// # Errors
///
/// Returns [`RelayError`] if the instance does not exist, the config is
/// invalid, or the replacement's first refresh fails.
#[utoipa::path(
    put,
    path = "/api/v1/instances/{id}",
    tag = "Instances",
    summary = "Reconfigure an instance",
    description = "Rebuilds the instance with a new configuration. The webhook id cannot change.",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    request_body = InstanceConfig,
    responses(
        (status = 200, description = "Instance reconfigured", body = InstanceStatus),
        (status = 400, description = "Invalid configuration", body = ErrorResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
        (status = 503, description = "Initial refresh failed", body = ErrorResponse),
    )
)]
pub async fn update_instance(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
    Json(config): Json<InstanceConfig>,
) -> Result<impl IntoResponse, RelayError> {
    let status = state
        .relay_service
        .reconfigure_instance(InstanceId::from_uuid(id), config)
        .await?;
    Ok(Json(status))
}

/// `DELETE /instances/:id` — Remove an instance.
///
/// # Errors
///
/// Returns [`RelayError::InstanceNotFound`] if the instance does not exist.
#[utoipa::path(
    delete,
    path = "/api/v1/instances/{id}",
    tag = "Instances",
    summary = "Delete an instance",
    description = "Stops the refresh schedule, abandons any in-flight cycle, and emits an InstanceRemoved event.",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    responses(
        (status = 204, description = "Instance deleted"),
        (status = 404, description = "Instance not found", body = ErrorResponse),
    )
)]
pub async fn delete_instance(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, RelayError> {
    state
        .relay_service
        .remove_instance(InstanceId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /instances/:id/refresh` — Push an update now.
///
/// # Errors
///
/// Returns [`RelayError::InstanceNotFound`] if the instance does not exist.
#[utoipa::path(
    post,
    path = "/api/v1/instances/{id}/refresh",
    tag = "Instances",
    summary = "Trigger a refresh",
    description = "Requests an immediate refresh. `accepted` is false when a refresh was already running and the request was folded into it.",
    params(
        ("id" = uuid::Uuid, Path, description = "Instance UUID"),
    ),
    responses(
        (status = 202, description = "Refresh requested", body = RefreshResponse),
        (status = 404, description = "Instance not found", body = ErrorResponse),
    )
)]
pub async fn refresh_instance(
    State(state): State<AppState>,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, RelayError> {
    let accepted = state
        .relay_service
        .trigger_refresh(InstanceId::from_uuid(id))
        .await?;
    Ok((StatusCode::ACCEPTED, Json(RefreshResponse { accepted })))
}

/// Instance management routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/instances", post(create_instance).get(list_instances))
        .route(
            "/instances/{id}",
            get(get_instance).put(update_instance).delete(delete_instance),
        )
        .route("/instances/{id}/refresh", post(refresh_instance))
}
