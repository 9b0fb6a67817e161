//! services/api/src/web/forms.rs
//!
//! JSON request bodies for the staff routes. Each form turns itself into the
//! matching core write model with `validate`, collecting every field error
//! before returning.

use std::str::FromStr;

use casebook_core::catalog;
use casebook_core::domain::{ClientStatus, SessionQuota};
use casebook_core::filter::{ClientField, ClientQuery, FilterBuilder, ReferralField, ReferralQuery};
use casebook_core::validation::{
    NewCaseNote, NewClient, NewReferral, NewService, ProfileUpdate, ValidationErrors, MAX_AGENCY,
    MAX_EMAIL, MAX_NAME, MAX_PHONE,
};
use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

const REQUIRED: &str = "This field is required.";

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_amount(errors: &mut ValidationErrors, field: &str, raw: &Option<String>) -> Option<Decimal> {
    let raw = blank_to_none(raw)?;
    match Decimal::from_str(&raw) {
        Ok(amount) => Some(amount),
        Err(_) => {
            errors.add(field, "Enter a number.");
            None
        }
    }
}

fn parse_time(errors: &mut ValidationErrors, field: &str, raw: &Option<String>) -> Option<NaiveTime> {
    let Some(raw) = blank_to_none(raw) else {
        errors.add(field, REQUIRED);
        return None;
    };
    let parsed = NaiveTime::parse_from_str(&raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"));
    match parsed {
        Ok(time) => Some(time),
        Err(_) => {
            errors.add(field, "Enter a valid time.");
            None
        }
    }
}

fn required_date(errors: &mut ValidationErrors, field: &str, date: Option<NaiveDate>) -> NaiveDate {
    date.unwrap_or_else(|| {
        errors.add(field, REQUIRED);
        NaiveDate::default()
    })
}

//=========================================================================================
// Client
//=========================================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ClientForm {
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: String,
    pub dcs: Option<bool>,
    /// Defaults to "No City Chosen".
    pub primary_location: Option<String>,
    pub dob: Option<NaiveDate>,
    pub ethnicity: Option<String>,
    pub gender: Option<String>,
    pub language: Option<String>,
    pub relationship_status: Option<String>,
    pub employment_status: Option<String>,
    /// Up to three court cause numbers; blanks are dropped.
    pub cause_numbers: Vec<String>,
    pub date_enroll: Option<NaiveDate>,
    pub date_discharge: Option<NaiveDate>,
    /// 40 or 26. Defaults to 40.
    pub session_quota: Option<i32>,
    pub session_qty_add: i32,
    /// One-letter status code (A, P, U, S, I). Defaults to P.
    pub current_status: Option<String>,
}

impl ClientForm {
    pub fn validate(&self) -> Result<NewClient, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let status = match blank_to_none(&self.current_status) {
            None => ClientStatus::default(),
            Some(code) => ClientStatus::from_code(&code).unwrap_or_else(|| {
                errors.add(
                    "current_status",
                    format!("Select a valid choice. {code} is not one of the available choices."),
                );
                ClientStatus::default()
            }),
        };
        let session_quota = match self.session_quota {
            None => SessionQuota::default(),
            Some(n) => SessionQuota::from_sessions(n).unwrap_or_else(|| {
                errors.add(
                    "session_quota",
                    format!("Select a valid choice. {n} is not one of the available choices."),
                );
                SessionQuota::default()
            }),
        };

        let client = NewClient {
            first_name: self.first_name.trim().to_string(),
            middle_name: self.middle_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
            dcs: self.dcs,
            primary_location: blank_to_none(&self.primary_location)
                .unwrap_or_else(|| catalog::NO_CITY.to_string()),
            dob: self.dob,
            ethnicity: blank_to_none(&self.ethnicity),
            gender: blank_to_none(&self.gender),
            language: blank_to_none(&self.language),
            relationship_status: blank_to_none(&self.relationship_status),
            employment_status: blank_to_none(&self.employment_status),
            cause_numbers: self
                .cause_numbers
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect(),
            date_enroll: self.date_enroll,
            date_discharge: self.date_discharge,
            session_quota,
            session_qty_add: self.session_qty_add,
            status,
        };
        if let Err(more) = client.check() {
            errors.merge(more);
        }
        errors.into_result(client)
    }
}

//=========================================================================================
// Service
//=========================================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ServiceForm {
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Decimal as text, e.g. "25.00".
    pub fee: Option<String>,
    pub discount: Option<String>,
    pub payment: Option<String>,
    pub credit: Option<i32>,
    pub notes: String,
}

impl ServiceForm {
    pub fn validate(&self) -> Result<NewService, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let service = NewService {
            date: required_date(&mut errors, "date", self.date),
            description: self.description.clone(),
            fee: parse_amount(&mut errors, "fee", &self.fee),
            discount: parse_amount(&mut errors, "discount", &self.discount),
            payment: parse_amount(&mut errors, "payment", &self.payment),
            credit: self.credit,
            notes: self.notes.clone(),
        };
        if let Err(more) = service.check() {
            errors.merge(more);
        }
        errors.into_result(service)
    }
}

//=========================================================================================
// Case Note
//=========================================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct CaseNoteForm {
    pub date: Option<NaiveDate>,
    /// "HH:MM" or "HH:MM:SS".
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub facilitator: String,
    pub class_topic: String,
    pub location: Option<String>,
    pub notes: String,
}

impl CaseNoteForm {
    pub fn validate(&self) -> Result<NewCaseNote, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let note = NewCaseNote {
            date: required_date(&mut errors, "date", self.date),
            start_time: parse_time(&mut errors, "start_time", &self.start_time),
            end_time: parse_time(&mut errors, "end_time", &self.end_time),
            facilitator: self.facilitator.trim().to_string(),
            class_topic: self.class_topic.trim().to_string(),
            location: blank_to_none(&self.location).unwrap_or_else(|| catalog::NO_CITY.to_string()),
            notes: self.notes.clone(),
        };
        if let Err(more) = note.check() {
            errors.merge(more);
        }
        errors.into_result(note)
    }
}

//=========================================================================================
// Referral
//=========================================================================================

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ReferralForm {
    pub full_name: String,
    pub agency: String,
    pub phone: String,
    pub email: String,
}

impl ReferralForm {
    pub fn validate(&self) -> Result<NewReferral, ValidationErrors> {
        let referral = NewReferral {
            full_name: self.full_name.trim().to_string(),
            agency: self.agency.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
        };
        referral.check().map(|_| referral)
    }
}

/// Client ids to attach to or detach from a referral.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ClientSelection {
    One { client_id: Uuid },
    Many { client_ids: Vec<Uuid> },
}

impl ClientSelection {
    pub fn ids(&self) -> Vec<Uuid> {
        match self {
            ClientSelection::One { client_id } => vec![*client_id],
            ClientSelection::Many { client_ids } => client_ids.clone(),
        }
    }
}

/// Finds candidate clients for a referral by name or email.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ClientLookupForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ClientLookupForm {
    pub fn query(&self) -> ClientQuery {
        FilterBuilder::new(true)
            .text(ClientField::FirstName, self.first_name.as_deref())
            .text(ClientField::LastName, self.last_name.as_deref())
            .text(ClientField::Email, self.email.as_deref())
            .build()
    }
}

//=========================================================================================
// Search
//=========================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, serde::Serialize, ToSchema)]
pub enum SearchType {
    #[default]
    Clients,
    Referrals,
}

/// Either a free-text `searchbar` or the advanced form fields.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct SearchForm {
    /// When non-blank, every other field is ignored.
    pub searchbar: Option<String>,
    pub search_type: SearchType,
    /// Substring instead of exact matching for text fields.
    pub contains: bool,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Only a checked box narrows the search.
    pub dcs: bool,
    pub locations: Vec<String>,
    /// Status codes.
    pub status: Vec<String>,
    pub full_name: Option<String>,
    pub agency: Option<String>,
    pub ref_phone: Option<String>,
    pub ref_email: Option<String>,
}

/// What a validated search form asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchRequest {
    Clients(ClientQuery),
    Referrals(ReferralQuery),
}

impl SearchForm {
    pub fn validate(&self) -> Result<SearchRequest, ValidationErrors> {
        if let Some(raw) = blank_to_none(&self.searchbar) {
            return Ok(SearchRequest::Clients(ClientQuery::by_name_tokens(&raw)));
        }

        let mut errors = ValidationErrors::new();
        let limits = [
            ("first_name", &self.first_name, MAX_NAME),
            ("last_name", &self.last_name, MAX_NAME),
            ("phone", &self.phone, MAX_PHONE),
            ("email", &self.email, MAX_EMAIL),
            ("full_name", &self.full_name, MAX_NAME * 2),
            ("agency", &self.agency, MAX_AGENCY),
            ("ref_phone", &self.ref_phone, MAX_PHONE),
            ("ref_email", &self.ref_email, MAX_EMAIL),
        ];
        for (field, value, max) in limits {
            if let Some(value) = value {
                errors.limit(field, value.trim(), max);
            }
        }
        for location in &self.locations {
            if !catalog::is_location(location) {
                errors.add(
                    "locations",
                    format!("Select a valid choice. {location} is not one of the available choices."),
                );
            }
        }
        for code in &self.status {
            if ClientStatus::from_code(code).is_none() {
                errors.add(
                    "status",
                    format!("Select a valid choice. {code} is not one of the available choices."),
                );
            }
        }
        errors.into_result(())?;

        Ok(match self.search_type {
            SearchType::Clients => SearchRequest::Clients(
                FilterBuilder::new(self.contains)
                    .text(ClientField::FirstName, self.first_name.as_deref())
                    .text(ClientField::LastName, self.last_name.as_deref())
                    .text(ClientField::Phone, self.phone.as_deref())
                    .text(ClientField::Email, self.email.as_deref())
                    .flag(ClientField::Dcs, self.dcs.then_some(true))
                    .one_of(ClientField::PrimaryLocation, &self.locations)
                    .one_of(ClientField::CurrentStatus, &self.status)
                    .build(),
            ),
            SearchType::Referrals => SearchRequest::Referrals(
                FilterBuilder::new(self.contains)
                    .text(ReferralField::FullName, self.full_name.as_deref())
                    .text(ReferralField::Agency, self.agency.as_deref())
                    .text(ReferralField::Phone, self.ref_phone.as_deref())
                    .text(ReferralField::Email, self.ref_email.as_deref())
                    .build(),
            ),
        })
    }
}

//=========================================================================================
// Profile
//=========================================================================================

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

fn looks_like_email(value: &str) -> bool {
    Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(value))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<ProfileUpdate, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = blank_to_none(&self.email);
        if let Some(email) = &email {
            if !looks_like_email(email) {
                errors.add("email", "Enter a valid email address.");
            }
        }
        let profile = ProfileUpdate {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email,
        };
        if let Err(more) = profile.check() {
            errors.merge(more);
        }
        errors.into_result(profile)
    }
}

//=========================================================================================
// Case-note print selection
//=========================================================================================

/// Query string for the case-note sheet. `ids` is a comma-separated list.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct NotePrintParams {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub ids: Option<String>,
}

impl NotePrintParams {
    pub fn selected_ids(&self) -> Result<Option<Vec<Uuid>>, ValidationErrors> {
        let Some(raw) = blank_to_none(&self.ids) else {
            return Ok(None);
        };
        let mut errors = ValidationErrors::new();
        let mut ids = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match Uuid::parse_str(part) {
                Ok(id) => ids.push(id),
                Err(_) => errors.add("ids", format!("'{part}' is not a valid id.")),
            }
        }
        errors.into_result(Some(ids))
    }

    pub fn includes(&self, date: NaiveDate) -> bool {
        self.from.map_or(true, |from| from <= date) && self.to.map_or(true, |to| date <= to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_core::filter::{FilterValue, Predicate};
    use pretty_assertions::assert_eq;

    fn note_form(start: &str, end: &str) -> CaseNoteForm {
        CaseNoteForm {
            date: NaiveDate::from_ymd_opt(2024, 4, 9),
            start_time: Some(start.into()),
            end_time: Some(end.into()),
            facilitator: "R. Ortiz".into(),
            class_topic: "Empathy".into(),
            location: Some("Muncie".into()),
            notes: String::new(),
        }
    }

    #[test]
    fn client_form_applies_defaults() {
        let form: ClientForm =
            serde_json::from_value(serde_json::json!({"first_name": "Ana", "last_name": "Bell"})).unwrap();
        let client = form.validate().unwrap();
        assert_eq!(client.primary_location, catalog::NO_CITY);
        assert_eq!(client.status, ClientStatus::Pending);
        assert_eq!(client.session_quota, SessionQuota::Long);
    }

    #[test]
    fn client_form_reports_codes_and_core_rules_together() {
        let form = ClientForm {
            last_name: "Bell".into(),
            current_status: Some("X".into()),
            session_quota: Some(30),
            ..ClientForm::default()
        };
        let errors = form.validate().unwrap_err();
        for field in ["first_name", "current_status", "session_quota"] {
            assert!(errors.has(field), "expected an error on {field}");
        }
    }

    #[test]
    fn service_form_parses_amounts() {
        let form = ServiceForm {
            date: NaiveDate::from_ymd_opt(2024, 4, 9),
            description: "Attended Class Session".into(),
            fee: Some("25".into()),
            payment: Some(" ".into()),
            ..ServiceForm::default()
        };
        let service = form.validate().unwrap();
        assert_eq!(service.fee, Some(Decimal::from(25)));
        assert_eq!(service.payment, None);

        let bad = ServiceForm {
            payment: Some("ten".into()),
            ..form
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.messages("payment"), ["Enter a number."]);
    }

    #[test]
    fn service_form_requires_a_date() {
        let form = ServiceForm {
            description: "Attended Class Session".into(),
            ..ServiceForm::default()
        };
        assert!(form.validate().unwrap_err().has("date"));
    }

    #[test]
    fn case_note_times_are_required_and_ordered() {
        let errors = note_form("19:00", "18:00").validate().unwrap_err();
        assert_eq!(errors.messages("end_time"), ["Start time is after end time."]);

        let mut missing = note_form("18:00", "19:00");
        missing.start_time = None;
        assert!(missing.validate().unwrap_err().has("start_time"));

        assert!(note_form("18:00:00", "19:30").validate().is_ok());
    }

    #[test]
    fn searchbar_wins_over_the_advanced_fields() {
        let form = SearchForm {
            searchbar: Some("Ana Bell".into()),
            search_type: SearchType::Referrals,
            ..SearchForm::default()
        };
        assert_eq!(
            form.validate().unwrap(),
            SearchRequest::Clients(ClientQuery::by_name_tokens("Ana Bell"))
        );
    }

    #[test]
    fn blank_searchbar_falls_through_to_the_advanced_fields() {
        let form = SearchForm {
            searchbar: Some("   ".into()),
            last_name: Some("Bell".into()),
            ..SearchForm::default()
        };
        let SearchRequest::Clients(query) = form.validate().unwrap() else {
            panic!("expected a client search");
        };
        assert_eq!(
            query.predicates,
            vec![Predicate::Equals(ClientField::LastName, FilterValue::Text("Bell".into()))]
        );
    }

    #[test]
    fn overlong_search_text_is_rejected_per_field() {
        let form = SearchForm {
            last_name: Some("x".repeat(MAX_NAME + 1)),
            phone: Some("5".repeat(MAX_PHONE)),
            agency: Some("a".repeat(MAX_AGENCY + 1)),
            ..SearchForm::default()
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("last_name"));
        assert!(errors.has("agency"));
        assert!(!errors.has("phone"));
    }

    #[test]
    fn advanced_client_search_builds_groups() {
        let form = SearchForm {
            contains: false,
            last_name: Some(" Bell ".into()),
            dcs: true,
            status: vec!["A".into(), "P".into()],
            ..SearchForm::default()
        };
        let SearchRequest::Clients(query) = form.validate().unwrap() else {
            panic!("expected a client search");
        };
        assert_eq!(
            query.predicates,
            vec![
                Predicate::Equals(ClientField::LastName, FilterValue::Text("Bell".into())),
                Predicate::Equals(ClientField::Dcs, FilterValue::Bool(true)),
                Predicate::AnyOf(vec![
                    Predicate::Equals(ClientField::CurrentStatus, FilterValue::Text("A".into())),
                    Predicate::Equals(ClientField::CurrentStatus, FilterValue::Text("P".into())),
                ]),
            ]
        );
    }

    #[test]
    fn unchecked_dcs_does_not_narrow() {
        let SearchRequest::Clients(query) = SearchForm::default().validate().unwrap() else {
            panic!("expected a client search");
        };
        assert!(query.predicates.is_empty());
    }

    #[test]
    fn unknown_locations_are_rejected() {
        let form = SearchForm {
            locations: vec!["Atlantis".into()],
            ..SearchForm::default()
        };
        assert!(form.validate().unwrap_err().has("locations"));
    }

    #[test]
    fn profile_email_must_look_like_an_address() {
        let form = ProfileForm {
            first_name: "Ana".into(),
            last_name: "Bell".into(),
            email: Some("not-an-address".into()),
        };
        assert!(form.validate().unwrap_err().has("email"));
        let ok = ProfileForm {
            email: Some("ana@example.org".into()),
            ..form
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn selection_accepts_one_or_many() {
        let one: ClientSelection =
            serde_json::from_str(r#"{"client_id":"67e55044-10b1-426f-9247-bb680e5fe0c8"}"#).unwrap();
        assert_eq!(one.ids().len(), 1);
        let many: ClientSelection = serde_json::from_str(
            r#"{"client_ids":["67e55044-10b1-426f-9247-bb680e5fe0c8","67e55044-10b1-426f-9247-bb680e5fe0c9"]}"#,
        )
        .unwrap();
        assert_eq!(many.ids().len(), 2);
    }

    #[test]
    fn print_params_filter_by_range_and_ids() {
        let params = NotePrintParams {
            from: NaiveDate::from_ymd_opt(2024, 1, 1),
            to: NaiveDate::from_ymd_opt(2024, 1, 31),
            ids: Some("nope".into()),
        };
        assert!(params.includes(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
        assert!(!params.includes(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert!(params.selected_ids().unwrap_err().has("ids"));
    }
}
