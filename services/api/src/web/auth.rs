//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for staff signup, login, and logout, plus the
//! signed-in staff member's own profile.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use casebook_core::domain::User;
use casebook_core::ports::PortError;
use casebook_core::ValidationErrors;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::web::forms::ProfileForm;
use crate::web::middleware::session_cookie;
use crate::web::state::{AppState, StaffUser};

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

/// A staff member's profile as shown to themselves.
#[derive(Serialize, ToSchema)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub permissions: Vec<String>,
}

impl From<User> for ProfileResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            permissions: user.permissions.codenames(),
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

//=========================================================================================
// Session Helpers
//=========================================================================================

/// Opens a session for `user_id` and returns the `Set-Cookie` value.
async fn open_session(state: &AppState, user_id: Uuid) -> ApiResult<String> {
    let auth_session_id = Uuid::new_v4().to_string();
    let ttl = state.config.session_ttl;
    state
        .db
        .create_auth_session(&auth_session_id, user_id, Utc::now() + ttl)
        .await?;
    Ok(format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        ttl.num_seconds()
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new staff account with no permissions
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 422, description = "Email missing or already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim();
    if email.is_empty() || req.password.is_empty() {
        let mut errors = ValidationErrors::new();
        if email.is_empty() {
            errors.add("email", "This field is required.");
        }
        if req.password.is_empty() {
            errors.add("password", "This field is required.");
        }
        return Err(ApiError::Validation(errors));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })?
        .to_string();

    let user = state.db.create_user_with_email(email, &password_hash).await?;
    let cookie = open_session(&state, user.user_id).await?;
    info!(user_id = %user.user_id, "Staff account created");

    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email.unwrap_or_default(),
    };
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let user_creds = state
        .db
        .get_user_by_email(req.email.trim())
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => {
                warn!("Login for unknown email");
                ApiError::Unauthorized
            }
            other => ApiError::Port(other),
        })?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;

    if Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_err()
    {
        warn!(user_id = %user_creds.user_id, "Login with a wrong password");
        return Err(ApiError::Unauthorized);
    }

    let cookie = open_session(&state, user_creds.user_id).await?;
    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let auth_session_id = session_cookie(&headers).ok_or(ApiError::Unauthorized)?;
    state.db.delete_auth_session(auth_session_id).await?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

/// GET /profile - The signed-in staff member
#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "Current profile", body = ProfileResponse),
        (status = 401, description = "No active session")
    )
)]
pub async fn get_profile_handler(Extension(staff): Extension<StaffUser>) -> Json<ProfileResponse> {
    Json(staff.0.into())
}

/// PUT /profile - Update own name and email
#[utoipa::path(
    put,
    path = "/profile",
    request_body = ProfileForm,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 422, description = "Validation failed"),
        (status = 401, description = "No active session")
    )
)]
pub async fn update_profile_handler(
    State(state): State<Arc<AppState>>,
    Extension(staff): Extension<StaffUser>,
    Json(form): Json<ProfileForm>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = form.validate()?;
    let user = state.db.update_user_profile(staff.0.user_id, &profile).await?;
    info!(user_id = %user.user_id, "Profile updated");
    Ok(Json(user.into()))
}
