//! services/api/src/web/clients.rs
//!
//! Staff handlers for client records, their secure links and their status
//! report.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use casebook_core::domain::Client;
use casebook_core::filter::ClientQuery;
use casebook_core::ledger::ClientSummary;
use casebook_core::ports::{OutgoingMail, RenderedDocument};
use casebook_core::ValidationErrors;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::web::forms::ClientForm;
use crate::web::state::{AppState, StaffUser};

//=========================================================================================
// Shared Helpers
//=========================================================================================

/// Loads everything the detail view and the status report show.
pub(crate) async fn load_summary(state: &AppState, client: Client) -> ApiResult<ClientSummary> {
    let services = state.db.list_services(client.id).await?;
    let referrals = state.db.list_referrals_for_client(client.id).await?;
    Ok(ClientSummary::build(client, services, referrals))
}

/// Turns a rendered document into an HTTP response.
pub(crate) fn document_response(doc: RenderedDocument) -> Response {
    ([(header::CONTENT_TYPE, doc.content_type)], doc.body).into_response()
}

fn no_email(field: &str, message: &str) -> ApiError {
    let mut errors = ValidationErrors::new();
    errors.add(field, message);
    ApiError::Validation(errors)
}

/// Returned after a secure link was mailed to a client.
#[derive(Serialize, ToSchema)]
pub struct LinkSent {
    pub sent_to: String,
    pub expires_at: DateTime<Utc>,
}

/// Returned after a referral contact was told about an enrollment.
#[derive(Serialize, ToSchema)]
pub struct EnrollmentSent {
    pub sent_to: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /clients - All live clients ordered by last name
#[utoipa::path(
    get,
    path = "/clients",
    responses(
        (status = 200, description = "Client list"),
        (status = 401, description = "No active session")
    )
)]
pub async fn list_clients_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Client>>> {
    Ok(Json(state.db.search_clients(&ClientQuery::all()).await?))
}

/// POST /clients - Enroll a new client
#[utoipa::path(
    post,
    path = "/clients",
    request_body = ClientForm,
    responses(
        (status = 201, description = "Client created"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn create_client_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Json(form): Json<ClientForm>,
) -> ApiResult<impl IntoResponse> {
    let new_client = form.validate()?;
    let client = state.db.create_client(&new_client, &staff.actor()).await?;
    info!(client_id = %client.id, actor = %staff.actor(), "Client created");
    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /clients/{id} - Client detail with ledger, services and referrals
#[utoipa::path(
    get,
    path = "/clients/{id}",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Client summary"),
        (status = 404, description = "No such live client")
    )
)]
pub async fn get_client_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClientSummary>> {
    let client = state.db.get_client(id).await?;
    Ok(Json(load_summary(&state, client).await?))
}

/// PUT /clients/{id} - Replace a client's editable fields
#[utoipa::path(
    put,
    path = "/clients/{id}",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = ClientForm,
    responses(
        (status = 200, description = "Client updated"),
        (status = 404, description = "No such live client"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_client_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
    Json(form): Json<ClientForm>,
) -> ApiResult<Json<Client>> {
    let changes = form.validate()?;
    let client = state.db.update_client(id, &changes, &staff.actor()).await?;
    info!(client_id = %id, actor = %staff.actor(), "Client updated");
    Ok(Json(client))
}

/// DELETE /clients/{id} - Soft-delete a client
#[utoipa::path(
    delete,
    path = "/clients/{id}",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 404, description = "No such live client")
    )
)]
pub async fn delete_client_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_client(id, &staff.actor()).await?;
    info!(client_id = %id, actor = %staff.actor(), "Client deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /clients/{id}/email-link - Open the client's summary link and mail it
///
/// A new passcode is issued every time; earlier links stop working. If the
/// mail cannot be sent the previous link is restored.
#[utoipa::path(
    post,
    path = "/clients/{id}/email-link",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Link issued and mailed", body = LinkSent),
        (status = 404, description = "No such live client"),
        (status = 422, description = "Client has no email address")
    )
)]
pub async fn email_link_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LinkSent>> {
    let client = state.db.get_client(id).await?;
    if client.email.trim().is_empty() {
        return Err(no_email("email", "Client has no email address."));
    }

    let previous = client.secure_link.clone();
    let link = previous.reissue(Utc::now(), state.config.secure_link_ttl);
    let client = state.db.update_secure_link(id, &link).await?;
    let url = format!("{}{}", state.config.public_base_url, link.path());

    let sent = state
        .mailer
        .send(OutgoingMail {
            to: client.email.clone(),
            subject: "Your program summary link".to_string(),
            body: format!(
                "Hello {},\n\nYou can view your program summary at:\n{}\n\nThis link expires {}.\n",
                client.display_name(),
                url,
                link.expires_at.format("%B %-d, %Y at %-I:%M %p UTC"),
            ),
        })
        .await;
    if let Err(e) = sent {
        warn!(client_id = %id, "Secure link mail failed, restoring previous link: {}", e);
        state.db.update_secure_link(id, &previous).await?;
        return Err(e.into());
    }
    info!(client_id = %id, actor = %staff.actor(), "Secure link mailed");

    Ok(Json(LinkSent {
        sent_to: client.email,
        expires_at: link.expires_at,
    }))
}

/// POST /clients/{id}/referrals/{referral_id}/email-enrollment - Tell a referral contact the client enrolled
#[utoipa::path(
    post,
    path = "/clients/{id}/referrals/{referral_id}/email-enrollment",
    params(
        ("id" = Uuid, Path, description = "Client id"),
        ("referral_id" = Uuid, Path, description = "Referral id")
    ),
    responses(
        (status = 200, description = "Notice mailed", body = EnrollmentSent),
        (status = 404, description = "No such live client or referral"),
        (status = 422, description = "Referral has no email address")
    )
)]
pub async fn email_enrollment_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path((id, referral_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<EnrollmentSent>> {
    let client = state.db.get_client(id).await?;
    let referral = state.db.get_referral(referral_id).await?;
    if referral.email.trim().is_empty() {
        return Err(no_email("email", "Referral has no email address."));
    }

    let enrolled = client
        .date_enroll
        .map(|d| format!(" on {}", d.format("%B %-d, %Y")))
        .unwrap_or_default();
    state
        .mailer
        .send(OutgoingMail {
            to: referral.email.clone(),
            subject: format!("Enrollment: {}", client.display_name()),
            body: format!(
                "Hello {},\n\n{} enrolled in the program{}.\n\nCause numbers: {}\n",
                referral.full_name,
                client.display_name(),
                enrolled,
                client.cause_numbers.join(", "),
            ),
        })
        .await?;
    info!(client_id = %id, referral_id = %referral_id, actor = %staff.actor(), "Enrollment notice mailed");

    Ok(Json(EnrollmentSent {
        sent_to: referral.email,
    }))
}

/// GET /clients/{id}/print - Printable client status report
#[utoipa::path(
    get,
    path = "/clients/{id}/print",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "HTML status report", content_type = "text/html"),
        (status = 404, description = "No such live client")
    )
)]
pub async fn print_client_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let client = state.db.get_client(id).await?;
    let summary = load_summary(&state, client).await?;
    Ok(document_response(state.renderer.render_client_report(&summary)?))
}
