//! services/api/src/web/case_notes.rs
//!
//! Staff handlers for case notes and the printable case-note sheet.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use casebook_core::domain::CaseNote;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::clients::document_response;
use crate::web::forms::{CaseNoteForm, NotePrintParams};
use crate::web::state::{AppState, StaffUser};

/// GET /clients/{id}/notes - Live case notes, newest first
#[utoipa::path(
    get,
    path = "/clients/{id}/notes",
    params(("id" = Uuid, Path, description = "Client id")),
    responses(
        (status = 200, description = "Case note list"),
        (status = 404, description = "No such live client")
    )
)]
pub async fn list_case_notes_handler(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
) -> ApiResult<Json<Vec<CaseNote>>> {
    state.db.get_client(client_id).await?;
    Ok(Json(state.db.list_case_notes(client_id).await?))
}

/// POST /clients/{id}/notes - Record a case note
#[utoipa::path(
    post,
    path = "/clients/{id}/notes",
    params(("id" = Uuid, Path, description = "Client id")),
    request_body = CaseNoteForm,
    responses(
        (status = 201, description = "Case note created"),
        (status = 404, description = "No such live client"),
        (status = 422, description = "Validation failed, e.g. start time after end time")
    )
)]
pub async fn create_case_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(client_id): Path<Uuid>,
    Json(form): Json<CaseNoteForm>,
) -> ApiResult<impl IntoResponse> {
    let new_note = form.validate()?;
    let note = state
        .db
        .create_case_note(client_id, &new_note, &staff.actor())
        .await?;
    info!(note_id = %note.id, client_id = %client_id, actor = %staff.actor(), "Case note recorded");
    Ok((StatusCode::CREATED, Json(note)))
}

/// GET /clients/{id}/notes/print - Printable case-note sheet
///
/// Narrowed by an inclusive `from`/`to` date range and, when given, an
/// explicit comma-separated `ids` list.
#[utoipa::path(
    get,
    path = "/clients/{id}/notes/print",
    params(("id" = Uuid, Path, description = "Client id"), NotePrintParams),
    responses(
        (status = 200, description = "HTML case-note sheet", content_type = "text/html"),
        (status = 404, description = "No such live client"),
        (status = 422, description = "Malformed id list")
    )
)]
pub async fn print_case_notes_handler(
    State(state): State<Arc<AppState>>,
    Path(client_id): Path<Uuid>,
    Query(params): Query<NotePrintParams>,
) -> ApiResult<Response> {
    let selected = params.selected_ids()?;
    let client = state.db.get_client(client_id).await?;
    let mut notes: Vec<CaseNote> = state
        .db
        .list_case_notes(client_id)
        .await?
        .into_iter()
        .filter(|n| params.includes(n.date))
        .filter(|n| selected.as_ref().map_or(true, |ids| ids.contains(&n.id)))
        .collect();
    notes.sort_by(|a, b| a.date.cmp(&b.date).then(a.start_time.cmp(&b.start_time)));
    Ok(document_response(
        state.renderer.render_case_note_sheet(&client, &notes)?,
    ))
}

/// GET /notes/{id}
#[utoipa::path(
    get,
    path = "/notes/{id}",
    params(("id" = Uuid, Path, description = "Case note id")),
    responses(
        (status = 200, description = "Case note"),
        (status = 404, description = "No such live case note")
    )
)]
pub async fn get_case_note_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CaseNote>> {
    Ok(Json(state.db.get_case_note(id).await?))
}

/// PUT /notes/{id}
#[utoipa::path(
    put,
    path = "/notes/{id}",
    params(("id" = Uuid, Path, description = "Case note id")),
    request_body = CaseNoteForm,
    responses(
        (status = 200, description = "Case note updated"),
        (status = 404, description = "No such live case note"),
        (status = 422, description = "Validation failed")
    )
)]
pub async fn update_case_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
    Json(form): Json<CaseNoteForm>,
) -> ApiResult<Json<CaseNote>> {
    let changes = form.validate()?;
    let note = state.db.update_case_note(id, &changes, &staff.actor()).await?;
    info!(note_id = %id, actor = %staff.actor(), "Case note updated");
    Ok(Json(note))
}

/// DELETE /notes/{id}
#[utoipa::path(
    delete,
    path = "/notes/{id}",
    params(("id" = Uuid, Path, description = "Case note id")),
    responses(
        (status = 204, description = "Case note deleted"),
        (status = 404, description = "No such live case note")
    )
)]
pub async fn delete_case_note_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.db.delete_case_note(id, &staff.actor()).await?;
    info!(note_id = %id, actor = %staff.actor(), "Case note deleted");
    Ok(StatusCode::NO_CONTENT)
}
