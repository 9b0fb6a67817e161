//! services/api/src/web/reports.rs
//!
//! The missed-class attendance report.

use axum::{extract::State, Extension, Json};
use casebook_core::domain::ClientStatus;
use casebook_core::filter::{ClientField, FilterBuilder};
use casebook_core::ledger::attended_class;
use casebook_core::permissions::ATTENDANCE_REPORT;
use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::web::state::{AppState, StaffUser};

/// Days looked back from today, inclusive of both ends.
const LOOKBACK_DAYS: i64 = 7;

#[derive(Serialize)]
pub struct MissedClass {
    pub client_id: Uuid,
    pub display_name: String,
    pub phone: String,
    pub email: String,
    pub primary_location: String,
}

#[derive(Serialize)]
pub struct AttendanceReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub clients: Vec<MissedClass>,
}

/// GET /reports/attendance - Active clients with no attendance in the last week
#[utoipa::path(
    get,
    path = "/reports/attendance",
    responses(
        (status = 200, description = "Clients who missed class"),
        (status = 403, description = "Needs view_client and view_service")
    )
)]
pub async fn attendance_report_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
) -> ApiResult<Json<AttendanceReport>> {
    staff.require(ATTENDANCE_REPORT)?;

    let end = Utc::now().date_naive();
    let start = end - Duration::days(LOOKBACK_DAYS);
    let active = FilterBuilder::new(false)
        .text(ClientField::CurrentStatus, Some(ClientStatus::Active.code()))
        .build();

    let mut clients = Vec::new();
    for client in state.db.search_clients(&active).await? {
        let services = state.db.list_services(client.id).await?;
        if !attended_class(&client, &services, start, end) {
            clients.push(MissedClass {
                client_id: client.id,
                display_name: client.display_name(),
                phone: client.phone,
                email: client.email,
                primary_location: client.primary_location,
            });
        }
    }
    info!(count = clients.len(), "Attendance report built");

    Ok(Json(AttendanceReport { start, end, clients }))
}
