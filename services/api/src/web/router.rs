//! services/api/src/web/router.rs
//!
//! Assembles the public and staff routers around the shared state.

use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ConfigError;
use crate::error::ApiResult;
use crate::web::{
    auth, case_notes, clients, middleware::require_auth, referrals, reports, rest, search,
    secure_link, services, state::AppState,
};

pub fn build_router(app_state: Arc<AppState>) -> ApiResult<Router> {
    let origin = app_state
        .config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ConfigError::InvalidValue("CORS_ORIGIN".to_string(), e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/auth/signup", post(auth::signup_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/csr/{link_id}/{passcode}", get(secure_link::secure_summary_handler))
        .route("/csr/{link_id}/{passcode}/print", get(secure_link::secure_print_handler));

    // Staff routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/profile",
            get(auth::get_profile_handler).put(auth::update_profile_handler),
        )
        .route(
            "/clients",
            get(clients::list_clients_handler).post(clients::create_client_handler),
        )
        .route(
            "/clients/{id}",
            get(clients::get_client_handler)
                .put(clients::update_client_handler)
                .delete(clients::delete_client_handler),
        )
        .route("/clients/{id}/email-link", post(clients::email_link_handler))
        .route(
            "/clients/{id}/referrals/{referral_id}/email-enrollment",
            post(clients::email_enrollment_handler),
        )
        .route("/clients/{id}/print", get(clients::print_client_handler))
        .route(
            "/clients/{id}/services",
            get(services::list_services_handler).post(services::create_service_handler),
        )
        .route(
            "/services/{id}",
            get(services::get_service_handler)
                .put(services::update_service_handler)
                .delete(services::delete_service_handler),
        )
        .route(
            "/clients/{id}/notes",
            get(case_notes::list_case_notes_handler).post(case_notes::create_case_note_handler),
        )
        .route("/clients/{id}/notes/print", get(case_notes::print_case_notes_handler))
        .route(
            "/notes/{id}",
            get(case_notes::get_case_note_handler)
                .put(case_notes::update_case_note_handler)
                .delete(case_notes::delete_case_note_handler),
        )
        .route(
            "/referrals",
            get(referrals::list_referrals_handler).post(referrals::create_referral_handler),
        )
        .route(
            "/referrals/{id}",
            get(referrals::get_referral_handler)
                .put(referrals::update_referral_handler)
                .delete(referrals::delete_referral_handler),
        )
        .route("/referrals/{id}/clients", post(referrals::add_clients_handler))
        .route("/referrals/{id}/clients/remove", post(referrals::remove_clients_handler))
        .route("/referrals/{id}/clients/lookup", post(referrals::lookup_clients_handler))
        .route(
            "/referrals/{id}/clients/{client_id}",
            axum::routing::delete(referrals::remove_client_handler),
        )
        .route("/search", post(search::search_handler))
        .route("/reports/attendance", get(reports::attendance_report_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    Ok(Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", rest::ApiDoc::openapi())))
}
