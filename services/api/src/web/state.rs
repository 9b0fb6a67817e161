//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-request staff identity.

use std::sync::Arc;

use casebook_core::domain::User;
use casebook_core::permissions::Permission;
use casebook_core::ports::{DatabaseService, DocumentRenderer, Mailer};
use tracing::warn;

use crate::config::Config;
use crate::error::ApiError;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub mailer: Arc<dyn Mailer>,
    pub renderer: Arc<dyn DocumentRenderer>,
}

//=========================================================================================
// StaffUser (Inserted by the Auth Middleware)
//=========================================================================================

/// The signed-in staff member making the request.
#[derive(Debug, Clone)]
pub struct StaffUser(pub User);

impl StaffUser {
    /// Name written to audit columns.
    pub fn actor(&self) -> String {
        self.0.actor_name()
    }

    /// Fails with the full list of missing permissions, if any.
    pub fn require(&self, required: &[Permission]) -> Result<(), ApiError> {
        let missing = self.0.permissions.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            warn!(user_id = %self.0.user_id, ?missing, "Permission denied");
            Err(ApiError::Forbidden(missing))
        }
    }
}
