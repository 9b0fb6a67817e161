//! services/api/src/web/services.rs
//!
//! Staff handlers for the services recorded against a client.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use casebook_core::domain::Service;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::forms::ServiceForm;
use crate::web::state::{AppState, StaffUser};

/// GET /clients/{id}/services - Live services, newest first
#[utoipa::path(
    get,
    path = "/clients/{id}/services",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Service list"),
        (status = 404, description = "No such live client")
    )
)]
pub async fn list_services_handler(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Service>>> {
    state.db.get_client(client_id).await?;
    Ok(Json(state.db.list_services(client_id).await?))
}

/// POST /clients/{id}/services - Record a service
#[utoipa::path(
    post,
    path = "/clients/{id}/services",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = ServiceForm,
    responses(
        (status = 201, description = "Service created"),
        (status = 404, description = "No such live client"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_service_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(client_id): Path<Uuid>,
    Json(form): Json<ServiceForm>,
) -> ApiResult<impl IntoResponse> {
    let new_service = form.validate()?;
    let service = state
        .db
        .create_service(client_id, &new_service, &staff.actor())
        .await?;
    info!(service_id = %service.id, client_id = %client_id, actor = %staff.actor(), "Service recorded");
    Ok((StatusCode::CREATED, Json(service)))
}

/// GET /services/{id}
#[utoipa::path(
    get,
    path = "/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 200, description = "Service"),
        (status = 404, description = "No such live service")
    )
)]
pub async fn get_service_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Service>> {
    Ok(Json(state.db.get_service(id).await?))
}

/// PUT /services/{id}
#[utoipa::path(
    put,
    path = "/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    request_body = ServiceForm,
    responses(
        (status = 200, description = "Service updated"),
        (status = 404, description = "No such live service"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_service_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
    Json(form): Json<ServiceForm>,
) -> ApiResult<Json<Service>> {
    let changes = form.validate()?;
    let service = state.db.update_service(id, &changes, &staff.actor()).await?;
    info!(service_id = %id, actor = %staff.actor(), "Service updated");
    Ok(Json(service))
}

/// DELETE /services/{id} - Soft-delete; the service stops counting toward the ledger
#[utoipa::path(
    delete,
    path = "/services/{id}",
    params(("id" = Uuid, Path, description = "Service id")),
    responses(
        (status = 204, description = "Service deleted"),
        (status = 404, description = "No such live service")
    )
)]
pub async fn delete_service_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_service(id, &staff.actor()).await?;
    info!(service_id = %id, actor = %staff.actor(), "Service deleted");
    Ok(StatusCode::NO_CONTENT)
}
