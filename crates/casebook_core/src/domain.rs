//! crates/casebook_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database. They derive `Serialize` so
//! the web layer and the print templates can hand them out as-is.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::permissions::PermissionSet;
use crate::secure_link::SecureLink;

//=========================================================================================
// Record Lifecycle
//=========================================================================================

/// Whether a record is still in use or has been soft-deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RecordState {
    Live,
    Deleted {
        on: Option<DateTime<Utc>>,
        by: String,
    },
}

impl RecordState {
    pub fn is_live(&self) -> bool {
        matches!(self, RecordState::Live)
    }

    /// Rebuilds the state from the `deleted`, `deleted_on`, `deleted_by` columns.
    pub fn from_columns(deleted: bool, on: Option<DateTime<Utc>>, by: String) -> Self {
        if deleted {
            RecordState::Deleted { on, by }
        } else {
            RecordState::Live
        }
    }
}

/// Who touched a record last, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Audit {
    pub last_updated: DateTime<Utc>,
    pub last_updated_by: String,
}

impl Audit {
    pub fn stamp(actor: &str, now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            last_updated_by: actor.to_string(),
        }
    }
}

//=========================================================================================
// Client
//=========================================================================================

/// Program status of a client. Stored as a one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ClientStatus {
    Active,
    Pending,
    Unsuccessful,
    Successful,
    Inactive,
}

impl ClientStatus {
    pub const ALL: [ClientStatus; 5] = [
        ClientStatus::Active,
        ClientStatus::Pending,
        ClientStatus::Unsuccessful,
        ClientStatus::Successful,
        ClientStatus::Inactive,
    ];

    pub fn code(self) -> &'static str {
        match self {
            ClientStatus::Active => "A",
            ClientStatus::Pending => "P",
            ClientStatus::Unsuccessful => "U",
            ClientStatus::Successful => "S",
            ClientStatus::Inactive => "I",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ClientStatus::Active => "Active",
            ClientStatus::Pending => "Pending",
            ClientStatus::Unsuccessful => "Unsuccessful",
            ClientStatus::Successful => "Successful",
            ClientStatus::Inactive => "Inactive",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }
}

impl Default for ClientStatus {
    fn default() -> Self {
        ClientStatus::Pending
    }
}

/// The number of sessions a client is originally required to attend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionQuota {
    /// 40 weeks
    Long,
    /// 26 weeks
    Short,
}

impl SessionQuota {
    pub fn sessions(self) -> i32 {
        match self {
            SessionQuota::Long => 40,
            SessionQuota::Short => 26,
        }
    }

    pub fn from_sessions(sessions: i32) -> Option<Self> {
        match sessions {
            40 => Some(SessionQuota::Long),
            26 => Some(SessionQuota::Short),
            _ => None,
        }
    }
}

impl Default for SessionQuota {
    fn default() -> Self {
        SessionQuota::Long
    }
}

/// A person enrolled in the program.
#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: Uuid,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub dcs: Option<bool>,
    pub primary_location: String,
    pub dob: Option<NaiveDate>,
    pub ethnicity: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub relationship_status: Option<String>,
    pub employment_status: Option<String>,
    /// Up to three court cause numbers.
    pub cause_numbers: Vec<String>,
    pub date_enroll: Option<NaiveDate>,
    pub date_discharge: Option<NaiveDate>,
    pub date_complete: Option<NaiveDate>,
    pub session_quota: SessionQuota,
    pub session_qty_add: i32,
    pub status: ClientStatus,
    pub secure_link: SecureLink,
    pub audit: Audit,
    pub state: RecordState,
}

impl Client {
    /// "First Middle Last", title-cased, middle name omitted when blank.
    pub fn display_name(&self) -> String {
        let full = if self.middle_name.trim().is_empty() {
            format!("{} {}", self.first_name, self.last_name)
        } else {
            format!("{} {} {}", self.first_name, self.middle_name, self.last_name)
        };
        title_case(&full)
    }

    pub fn required_sessions(&self) -> i32 {
        self.session_quota.sessions() + self.session_qty_add
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for c in text.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

//=========================================================================================
// Service, CaseNote, Referral
//=========================================================================================

/// One billable or creditable event for a client.
#[derive(Debug, Clone, Serialize)]
pub struct Service {
    pub id: Uuid,
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub description: String,
    pub fee: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub payment: Option<Decimal>,
    pub credit: Option<i32>,
    pub notes: String,
    pub audit: Audit,
    pub state: RecordState,
}

impl Service {
    /// True when the service falls within the seven days ending `today`.
    pub fn is_recent(&self, today: NaiveDate) -> bool {
        today - Duration::days(7) <= self.date && self.date <= today
    }
}

/// A facilitator's record of a class or session attended by a client.
#[derive(Debug, Clone, Serialize)]
pub struct CaseNote {
    pub id: Uuid,
    pub client_id: Uuid,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub facilitator: String,
    pub class_topic: String,
    pub location: String,
    pub notes: String,
    pub audit: Audit,
    pub state: RecordState,
}

/// A partner agency contact that referred one or more clients.
#[derive(Debug, Clone, Serialize)]
pub struct Referral {
    pub id: Uuid,
    pub full_name: String,
    pub agency: String,
    pub phone: String,
    pub email: String,
    pub audit: Audit,
    pub state: RecordState,
}

impl Referral {
    /// The "Agency--Name" label used in referral pickers.
    pub fn label(&self) -> String {
        format!("{}--{}", self.agency, self.full_name)
    }
}

//=========================================================================================
// Staff Users
//=========================================================================================

// Represents a staff user - used throughout app
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub permissions: PermissionSet,
}

impl User {
    /// The name written into audit columns for changes made by this user.
    pub fn actor_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if !name.is_empty() {
            name.to_string()
        } else {
            self.email.clone().unwrap_or_else(|| "System".to_string())
        }
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}
