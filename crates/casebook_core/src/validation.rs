//! crates/casebook_core/src/validation.rs
//!
//! Field-level validation errors and the validated write models handed to the
//! storage port. Every write model carries a `check` that storage adapters run
//! again before persisting, so a bad record is refused rather than saved.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog;
use crate::domain::{ClientStatus, SessionQuota};

/// Messages keyed by the name of the offending field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn merge(&mut self, other: ValidationErrors) {
        for (field, messages) in other.errors {
            self.errors.entry(field).or_default().extend(messages);
        }
    }

    /// `Ok(value)` when nothing was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn require_text(&mut self, field: &str, value: &str, max: usize) {
        if value.trim().is_empty() {
            self.add(field, "This field is required.");
        } else {
            self.limit(field, value, max);
        }
    }

    pub fn limit(&mut self, field: &str, value: &str, max: usize) {
        let len = value.chars().count();
        if len > max {
            self.add(
                field,
                format!("Ensure this value has at most {max} characters (it has {len})."),
            );
        }
    }

    pub fn choice(&mut self, field: &str, value: Option<&str>, options: &[&str]) {
        if let Some(value) = value {
            if !options.contains(&value) {
                self.add(
                    field,
                    format!("Select a valid choice. {value} is not one of the available choices."),
                );
            }
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

//=========================================================================================
// Limits
//=========================================================================================

pub const MAX_NAME: usize = 32;
pub const MAX_PHONE: usize = 22;
pub const MAX_EMAIL: usize = 64;
pub const MAX_CAUSE: usize = 25;
pub const MAX_CAUSES: usize = 3;
pub const MAX_NOTES: usize = 200;
pub const MAX_FACILITATOR: usize = 25;
pub const MAX_TOPIC: usize = 25;
pub const MAX_AGENCY: usize = 50;
pub const MAX_PROFILE_NAME: usize = 150;
pub const MAX_PROFILE_EMAIL: usize = 254;
pub const MAX_CREDIT: i32 = 1;

/// Largest amount a NUMERIC(5,2) column holds.
fn max_amount() -> Decimal {
    Decimal::new(99_999, 2)
}

//=========================================================================================
// Write Models
//=========================================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct NewClient {
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
    pub cause_numbers: Vec<String>,
    pub date_enroll: Option<NaiveDate>,
    pub date_discharge: Option<NaiveDate>,
    pub session_quota: SessionQuota,
    pub session_qty_add: i32,
    pub status: ClientStatus,
}

impl NewClient {
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("first_name", &self.first_name, MAX_NAME);
        errors.limit("middle_name", &self.middle_name, MAX_NAME);
        errors.require_text("last_name", &self.last_name, MAX_NAME);
        errors.limit("phone", &self.phone, MAX_PHONE);
        errors.limit("email", &self.email, MAX_EMAIL);
        errors.choice("primary_location", Some(&self.primary_location), catalog::LOCATIONS);
        errors.choice("ethnicity", self.ethnicity.as_deref(), catalog::ETHNICITIES);
        errors.choice("gender", self.gender.as_deref(), catalog::GENDERS);
        errors.choice("language", self.language.as_deref(), catalog::LANGUAGES);
        errors.choice(
            "relationship_status",
            self.relationship_status.as_deref(),
            catalog::RELATIONSHIPS,
        );
        errors.choice(
            "employment_status",
            self.employment_status.as_deref(),
            catalog::EMPLOYMENTS,
        );
        if self.cause_numbers.len() > MAX_CAUSES {
            errors.add("cause_numbers", format!("At most {MAX_CAUSES} cause numbers are allowed."));
        }
        for cause in &self.cause_numbers {
            errors.limit("cause_numbers", cause, MAX_CAUSE);
        }
        if self.session_qty_add < 0 {
            errors.add("session_qty_add", "Ensure this value is greater than or equal to 0.");
        }
        errors.into_result(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewService {
    pub date: NaiveDate,
    pub description: String,
    pub fee: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub payment: Option<Decimal>,
    pub credit: Option<i32>,
    pub notes: String,
}

impl NewService {
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.description.is_empty() {
            errors.add("description", "This field is required.");
        } else {
            errors.choice("description", Some(&self.description), catalog::SERVICES);
        }
        if let Some(fee) = self.fee {
            if !catalog::is_fee(fee) {
                errors.add("fee", format!("Select a valid choice. {fee} is not one of the available choices."));
            }
        }
        if let Some(discount) = self.discount {
            if !catalog::is_discount(discount) {
                errors.add(
                    "discount",
                    format!("Select a valid choice. {discount} is not one of the available choices."),
                );
            }
        }
        if let Some(payment) = self.payment {
            check_amount(&mut errors, "payment", payment);
        }
        if let Some(credit) = self.credit {
            if credit < 0 {
                errors.add("credit", "Ensure this value is greater than or equal to 0.");
            } else if credit > MAX_CREDIT {
                errors.add("credit", format!("Ensure this value is less than or equal to {MAX_CREDIT}."));
            }
        }
        errors.limit("notes", &self.notes, MAX_NOTES);
        errors.into_result(())
    }
}

fn check_amount(errors: &mut ValidationErrors, field: &str, amount: Decimal) {
    if amount.is_sign_negative() && !amount.is_zero() {
        errors.add(field, "Error: Enter positive numbers only");
    } else if amount.normalize().scale() > 2 {
        errors.add(field, "Ensure that there are no more than 2 decimal places.");
    } else if amount > max_amount() {
        errors.add(field, "Ensure that there are no more than 5 digits in total.");
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCaseNote {
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub facilitator: String,
    pub class_topic: String,
    pub location: String,
    pub notes: String,
}

impl NewCaseNote {
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("facilitator", &self.facilitator, MAX_FACILITATOR);
        errors.require_text("class_topic", &self.class_topic, MAX_TOPIC);
        errors.choice("location", Some(&self.location), catalog::LOCATIONS);
        errors.limit("notes", &self.notes, MAX_NOTES);
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if start > end {
                errors.add("end_time", "Start time is after end time.");
            }
        }
        errors.into_result(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewReferral {
    pub full_name: String,
    pub agency: String,
    pub phone: String,
    pub email: String,
}

impl NewReferral {
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("full_name", &self.full_name, MAX_NAME * 2);
        errors.require_text("agency", &self.agency, MAX_AGENCY);
        errors.limit("phone", &self.phone, MAX_PHONE);
        errors.limit("email", &self.email, MAX_EMAIL);
        errors.into_result(())
    }
}

/// A staff member's own editable profile fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn check(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.limit("first_name", &self.first_name, MAX_PROFILE_NAME);
        errors.limit("last_name", &self.last_name, MAX_PROFILE_NAME);
        if let Some(email) = &self.email {
            errors.limit("email", email, MAX_PROFILE_EMAIL);
        }
        errors.into_result(())
    }
}
