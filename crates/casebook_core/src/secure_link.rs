//! crates/casebook_core/src/secure_link.rs
//!
//! Passcode-gated links that let a client read their own status report
//! without a staff login.

use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

pub const PASSCODE_LEN: usize = 6;

/// A fresh random passcode of [`PASSCODE_LEN`] ASCII letters and digits.
pub fn generate_passcode() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSCODE_LEN)
        .map(char::from)
        .collect()
}

/// Why a link request was refused. Callers answer every variant the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDenial {
    WrongLink,
    WrongPasscode,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecureLink {
    pub link_id: Uuid,
    #[serde(skip_serializing)]
    pub passcode: String,
    pub expires_at: DateTime<Utc>,
}

impl SecureLink {
    /// A link that is already closed. New clients start this way.
    pub fn expired(link_id: Uuid, passcode: String, now: DateTime<Utc>) -> Self {
        Self {
            link_id,
            passcode,
            expires_at: now,
        }
    }

    /// Opens the link for `ttl` with a new passcode. The link id is kept.
    pub fn reissue(&self, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            link_id: self.link_id,
            passcode: generate_passcode(),
            expires_at: now + ttl,
        }
    }

    pub fn check(&self, link_id: Uuid, passcode: &str, now: DateTime<Utc>) -> Result<(), LinkDenial> {
        if self.link_id != link_id {
            return Err(LinkDenial::WrongLink);
        }
        if !bool::from(self.passcode.as_bytes().ct_eq(passcode.as_bytes())) {
            return Err(LinkDenial::WrongPasscode);
        }
        if now >= self.expires_at {
            return Err(LinkDenial::Expired);
        }
        Ok(())
    }

    /// Path of the public summary page, relative to the site root.
    pub fn path(&self) -> String {
        format!("/csr/{}/{}", self.link_id, self.passcode)
    }
}
