//! crates/casebook_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! mail transports or document renderers.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{CaseNote, Client, Referral, Service, User, UserCredentials};
use crate::filter::{ClientQuery, ReferralQuery};
use crate::ledger::ClientSummary;
use crate::secure_link::SecureLink;
use crate::validation::{
    NewCaseNote, NewClient, NewReferral, NewService, ProfileUpdate, ValidationErrors,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, mail).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid data: {0}")]
    Invalid(ValidationErrors),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

impl From<ValidationErrors> for PortError {
    fn from(errors: ValidationErrors) -> Self {
        PortError::Invalid(errors)
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistent storage. Every read skips soft-deleted records unless the
/// method says otherwise; every write takes the acting staff member's name for
/// the audit columns.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Auth Methods ---
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn update_user_profile(&self, user_id: Uuid, profile: &ProfileUpdate) -> PortResult<User>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;

    // --- Clients ---
    async fn search_clients(&self, query: &ClientQuery) -> PortResult<Vec<Client>>;

    async fn get_client(&self, client_id: Uuid) -> PortResult<Client>;

    async fn get_client_by_link(&self, link_id: Uuid) -> PortResult<Client>;

    async fn create_client(&self, client: &NewClient, actor: &str) -> PortResult<Client>;

    async fn update_client(&self, client_id: Uuid, client: &NewClient, actor: &str) -> PortResult<Client>;

    async fn delete_client(&self, client_id: Uuid, actor: &str) -> PortResult<()>;

    async fn update_secure_link(&self, client_id: Uuid, link: &SecureLink) -> PortResult<Client>;

    // --- Services ---
    async fn list_services(&self, client_id: Uuid) -> PortResult<Vec<Service>>;

    async fn get_service(&self, service_id: Uuid) -> PortResult<Service>;

    async fn create_service(&self, client_id: Uuid, service: &NewService, actor: &str) -> PortResult<Service>;

    async fn update_service(&self, service_id: Uuid, service: &NewService, actor: &str) -> PortResult<Service>;

    async fn delete_service(&self, service_id: Uuid, actor: &str) -> PortResult<()>;

    // --- Case Notes ---
    async fn list_case_notes(&self, client_id: Uuid) -> PortResult<Vec<CaseNote>>;

    async fn get_case_note(&self, note_id: Uuid) -> PortResult<CaseNote>;

    async fn create_case_note(&self, client_id: Uuid, note: &NewCaseNote, actor: &str) -> PortResult<CaseNote>;

    async fn update_case_note(&self, note_id: Uuid, note: &NewCaseNote, actor: &str) -> PortResult<CaseNote>;

    async fn delete_case_note(&self, note_id: Uuid, actor: &str) -> PortResult<()>;

    // --- Referrals ---
    async fn search_referrals(&self, query: &ReferralQuery) -> PortResult<Vec<Referral>>;

    async fn get_referral(&self, referral_id: Uuid) -> PortResult<Referral>;

    async fn create_referral(&self, referral: &NewReferral, actor: &str) -> PortResult<Referral>;

    async fn update_referral(&self, referral_id: Uuid, referral: &NewReferral, actor: &str) -> PortResult<Referral>;

    async fn delete_referral(&self, referral_id: Uuid, actor: &str) -> PortResult<()>;

    async fn list_referrals_for_client(&self, client_id: Uuid) -> PortResult<Vec<Referral>>;

    async fn list_clients_for_referral(&self, referral_id: Uuid) -> PortResult<Vec<Client>>;

    /// Associates clients with a referral. Already-linked clients are left alone.
    async fn link_clients(&self, referral_id: Uuid, client_ids: &[Uuid]) -> PortResult<()>;

    async fn unlink_clients(&self, referral_id: Uuid, client_ids: &[Uuid]) -> PortResult<()>;
}

/// A message ready to hand to a mail transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    /// Delivers a single message.
    async fn send(&self, mail: OutgoingMail) -> PortResult<()>;
}

/// A rendered printable document.
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub content_type: &'static str,
    pub body: Bytes,
}

pub trait DocumentRenderer: Send + Sync {
    /// The client status report: identity, ledger, services.
    fn render_client_report(&self, summary: &ClientSummary) -> PortResult<RenderedDocument>;

    /// The case-note sheet for one client.
    fn render_case_note_sheet(&self, client: &Client, notes: &[CaseNote]) -> PortResult<RenderedDocument>;
}
