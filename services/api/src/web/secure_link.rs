//! services/api/src/web/secure_link.rs
//!
//! Public, passcode-gated access to a client's own summary. Every refusal,
//! whatever the cause, is answered as not-found.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use casebook_core::domain::Client;
use casebook_core::ledger::ClientSummary;
use casebook_core::ports::PortError;
use chrono::Utc;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::clients::{document_response, load_summary};
use crate::web::state::AppState;

async fn open_link(state: &AppState, link_id: &str, passcode: &str) -> ApiResult<Client> {
    let link_id = Uuid::parse_str(link_id).map_err(|_| ApiError::NotFound)?;
    let client = state
        .db
        .get_client_by_link(link_id)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => ApiError::NotFound,
            other => ApiError::Port(other),
        })?;
    client
        .secure_link
        .check(link_id, passcode, Utc::now())
        .map_err(|denial| {
            warn!(client_id = %client.id, ?denial, "Secure link refused");
            ApiError::NotFound
        })?;
    Ok(client)
}

/// GET /csr/{link_id}/{passcode} - Client summary without a staff session
#[utoipa::path(
    get,
    path = "/csr/{link_id}/{passcode}",
    params(
        ("link_id" = String, Path, description = "Link id from the mailed URL"),
        ("passcode" = String, Path, description = "Passcode from the mailed URL")
    ),
    responses(
        (status = 200, description = "Client summary"),
        (status = 404, description = "Unknown, wrong or expired link")
    )
)]
pub async fn secure_summary_handler(
    State(state): State<Arc<AppState>>,
    Path((link_id, passcode)): Path<(String, String)>,
) -> ApiResult<Json<ClientSummary>> {
    let client = open_link(&state, &link_id, &passcode).await?;
    Ok(Json(load_summary(&state, client).await?))
}

/// GET /csr/{link_id}/{passcode}/print - Printable client summary without a staff session
#[utoipa::path(
    get,
    path = "/csr/{link_id}/{passcode}/print",
    params(
        ("link_id" = String, Path, description = "Link id from the mailed URL"),
        ("passcode" = String, Path, description = "Passcode from the mailed URL")
    ),
    responses(
        (status = 200, description = "HTML status report", content_type = "text/html"),
        (status = 404, description = "Unknown, wrong or expired link")
    )
)]
pub async fn secure_print_handler(
    State(state): State<Arc<AppState>>,
    Path((link_id, passcode)): Path<(String, String)>,
) -> ApiResult<Response> {
    let client = open_link(&state, &link_id, &passcode).await?;
    let summary = load_summary(&state, client).await?;
    Ok(document_response(state.renderer.render_client_report(&summary)?))
}
