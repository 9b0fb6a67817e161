//! services/api/src/web/rest.rs
//!
//! The master definition for the OpenAPI specification and the health check.

use axum::Json;
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::web::{auth, case_notes, clients, forms, referrals, reports, search, secure_link, services};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        auth::signup_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::get_profile_handler,
        auth::update_profile_handler,
        clients::list_clients_handler,
        clients::create_client_handler,
        clients::get_client_handler,
        clients::update_client_handler,
        clients::delete_client_handler,
        clients::email_link_handler,
        clients::email_enrollment_handler,
        clients::print_client_handler,
        services::list_services_handler,
        services::create_service_handler,
        services::get_service_handler,
        services::update_service_handler,
        services::delete_service_handler,
        case_notes::list_case_notes_handler,
        case_notes::create_case_note_handler,
        case_notes::print_case_notes_handler,
        case_notes::get_case_note_handler,
        case_notes::update_case_note_handler,
        case_notes::delete_case_note_handler,
        referrals::list_referrals_handler,
        referrals::create_referral_handler,
        referrals::get_referral_handler,
        referrals::update_referral_handler,
        referrals::delete_referral_handler,
        referrals::add_clients_handler,
        referrals::remove_clients_handler,
        referrals::remove_client_handler,
        referrals::lookup_clients_handler,
        search::search_handler,
        reports::attendance_report_handler,
        secure_link::secure_summary_handler,
        secure_link::secure_print_handler,
    ),
    components(
        schemas(
            Health,
            auth::SignupRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            auth::ProfileResponse,
            clients::LinkSent,
            clients::EnrollmentSent,
            forms::ClientForm,
            forms::ServiceForm,
            forms::CaseNoteForm,
            forms::ReferralForm,
            forms::ClientSelection,
            forms::ClientLookupForm,
            forms::SearchForm,
            forms::SearchType,
            forms::ProfileForm,
        )
    ),
    tags(
        (name = "Casebook API", description = "Client records, services, case notes and referrals for program staff.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Health
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct Health {
    status: &'static str,
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = Health))
)]
pub async fn health_handler() -> Json<Health> {
    Json(Health { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_public_and_staff_routes() {
        let spec = ApiDoc::openapi();
        for path in ["/health", "/clients/{id}", "/csr/{link_id}/{passcode}", "/search"] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
