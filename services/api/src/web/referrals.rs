//! services/api/src/web/referrals.rs
//!
//! Staff handlers for referral contacts and the clients they referred.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use casebook_core::domain::{Client, Referral};
use casebook_core::filter::ReferralQuery;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::forms::{ClientLookupForm, ClientSelection, ReferralForm};
use crate::web::state::{AppState, StaffUser};

/// A referral with the live clients attached to it.
#[derive(Serialize)]
pub struct ReferralDetail {
    pub referral: Referral,
    pub label: String,
    pub clients: Vec<Client>,
}

async fn referral_detail(state: &AppState, id: Uuid) -> ApiResult<ReferralDetail> {
    let referral = state.db.get_referral(id).await?;
    let clients = state.db.list_clients_for_referral(id).await?;
    Ok(ReferralDetail {
        label: referral.label(),
        referral,
        clients,
    })
}

/// GET /referrals - All live referrals ordered by agency
#[utoipa::path(
    get,
    path = "/referrals",
    responses((status = 200, description = "Referral list"))
)]
pub async fn list_referrals_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Referral>>> {
    Ok(Json(state.db.search_referrals(&ReferralQuery::all()).await?))
}

/// POST /referrals
#[utoipa::path(
    post,
    path = "/referrals",
    request_body = ReferralForm,
    responses(
        (status = 201, description = "Referral created"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_referral_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Json(form): Json<ReferralForm>,
) -> ApiResult<impl IntoResponse> {
    let new_referral = form.validate()?;
    let referral = state.db.create_referral(&new_referral, &staff.actor()).await?;
    info!(referral_id = %referral.id, actor = %staff.actor(), "Referral created");
    Ok((StatusCode::CREATED, Json(referral)))
}

/// GET /referrals/{id} - Referral with its clients
#[utoipa::path(
    get,
    path = "/referrals/{id}",
    params(("id" = Uuid, Path, description = "Referral id")),
    responses(
        (status = 200, description = "Referral detail"),
        (status = 404, description = "No such live referral")
    )
)]
pub async fn get_referral_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ReferralDetail>> {
    Ok(Json(referral_detail(&state, id).await?))
}

/// PUT /referrals/{id}
#[utoipa::path(
    put,
    path = "/referrals/{id}",
    params(("id" = Uuid, Path, description = "Referral id")),
    request_body = ReferralForm,
    responses(
        (status = 200, description = "Referral updated"),
        (status = 404, description = "No such live referral"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_referral_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
    Json(form): Json<ReferralForm>,
) -> ApiResult<Json<Referral>> {
    let changes = form.validate()?;
    let referral = state.db.update_referral(id, &changes, &staff.actor()).await?;
    info!(referral_id = %id, actor = %staff.actor(), "Referral updated");
    Ok(Json(referral))
}

/// DELETE /referrals/{id}
#[utoipa::path(
    delete,
    path = "/referrals/{id}",
    params(("id" = Uuid, Path, description = "Referral id")),
    responses(
        (status = 204, description = "Referral deleted"),
        (status = 404, description = "No such live referral")
    )
)]
pub async fn delete_referral_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_referral(id, &staff.actor()).await?;
    info!(referral_id = %id, actor = %staff.actor(), "Referral deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /referrals/{id}/clients - Attach one (`client_id`) or many (`client_ids`) clients
#[utoipa::path(
    post,
    path = "/referrals/{id}/clients",
    params(("id" = Uuid, Path, description = "Referral id")),
    request_body = ClientSelection,
    responses(
        (status = 200, description = "Updated referral detail"),
        (status = 404, description = "No such live referral")
    )
)]
pub async fn add_clients_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
    Json(selection): Json<ClientSelection>,
) -> ApiResult<Json<ReferralDetail>> {
    let ids = selection.ids();
    state.db.link_clients(id, &ids).await?;
    info!(referral_id = %id, count = ids.len(), actor = %staff.actor(), "Clients attached to referral");
    Ok(Json(referral_detail(&state, id).await?))
}

/// POST /referrals/{id}/clients/remove - Detach several clients
#[utoipa::path(
    post,
    path = "/referrals/{id}/clients/remove",
    params(("id" = Uuid, Path, description = "Referral id")),
    request_body = ClientSelection,
    responses(
        (status = 200, description = "Updated referral detail"),
        (status = 404, description = "No such live referral")
    )
)]
pub async fn remove_clients_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
    Json(selection): Json<ClientSelection>,
) -> ApiResult<Json<ReferralDetail>> {
    let ids = selection.ids();
    state.db.unlink_clients(id, &ids).await?;
    info!(referral_id = %id, count = ids.len(), actor = %staff.actor(), "Clients detached from referral");
    Ok(Json(referral_detail(&state, id).await?))
}

/// DELETE /referrals/{id}/clients/{client_id} - Detach one client
#[utoipa::path(
    delete,
    path = "/referrals/{id}/clients/{client_id}",
    params(
        ("id" = Uuid, Path, description = "Referral id"),
        ("client_id" = Uuid, Path, description = "Client id")
    ),
    responses(
        (status = 204, description = "Client detached"),
        (status = 404, description = "No such live referral")
    )
)]
pub async fn remove_client_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path((id, client_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    state.db.unlink_clients(id, &[client_id]).await?;
    info!(referral_id = %id, client_id = %client_id, actor = %staff.actor(), "Client detached from referral");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /referrals/{id}/clients/lookup - Find candidate clients by name or email
#[utoipa::path(
    post,
    path = "/referrals/{id}/clients/lookup",
    params(("id" = Uuid, Path, description = "Referral id")),
    request_body = ClientLookupForm,
    responses(
        (status = 200, description = "Matching live clients"),
        (status = 404, description = "No such live referral")
    )
)]
pub async fn lookup_clients_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(form): Json<ClientLookupForm>,
) -> ApiResult<Json<Vec<Client>>> {
    state.db.get_referral(id).await?;
    Ok(Json(state.db.search_clients(&form.query()).await?))
}
