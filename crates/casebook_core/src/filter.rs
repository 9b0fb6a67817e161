//! crates/casebook_core/src/filter.rs
//!
//! Typed search predicates for clients and referrals.
//!
//! A [`SearchQuery`] is a conjunction of [`Predicate`]s over one record kind's
//! [`Field`] enum. Storage adapters translate it to SQL or evaluate it in
//! memory with [`SearchQuery::matches`]. Excluding soft-deleted records is the
//! adapter's job and is not expressed here.

use crate::domain::{Client, Referral};

/// A searchable column of some record kind.
pub trait Field: Copy + std::fmt::Debug {
    /// Column name in storage. Always a compile-time constant.
    fn column(self) -> &'static str;

    /// The field results are ordered by.
    fn order_by() -> Self;
}

/// Records that can be evaluated against predicates in memory.
pub trait Filterable {
    type Field: Field;

    fn field(&self, field: Self::Field) -> FieldValue<'_>;
}

/// A value a predicate compares against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Text(String),
    Bool(bool),
}

/// A value read from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    Bool(Option<bool>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate<F> {
    Equals(F, FilterValue),
    /// Case-sensitive substring match.
    Contains(F, String),
    /// Matches when any member does. Empty matches nothing.
    AnyOf(Vec<Predicate<F>>),
}

impl<F: Field> Predicate<F> {
    pub fn matches<R>(&self, record: &R) -> bool
    where
        R: Filterable<Field = F>,
    {
        match self {
            Predicate::Equals(field, expected) => match (record.field(*field), expected) {
                (FieldValue::Text(actual), FilterValue::Text(expected)) => actual == expected,
                (FieldValue::Bool(actual), FilterValue::Bool(expected)) => {
                    actual == Some(*expected)
                }
                _ => false,
            },
            Predicate::Contains(field, needle) => match record.field(*field) {
                FieldValue::Text(actual) => actual.contains(needle.as_str()),
                FieldValue::Bool(Some(actual)) => actual.to_string().contains(needle.as_str()),
                FieldValue::Bool(None) => false,
            },
            Predicate::AnyOf(members) => members.iter().any(|p| p.matches(record)),
        }
    }
}

/// A conjunction of predicates. No predicates matches every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery<F> {
    pub predicates: Vec<Predicate<F>>,
}

impl<F: Field> SearchQuery<F> {
    pub fn all() -> Self {
        Self {
            predicates: Vec::new(),
        }
    }

    pub fn matches<R>(&self, record: &R) -> bool
    where
        R: Filterable<Field = F>,
    {
        self.predicates.iter().all(|p| p.matches(record))
    }

    /// Keeps matching records and sorts them by the field's ordering column.
    pub fn apply<R>(&self, records: impl IntoIterator<Item = R>) -> Vec<R>
    where
        R: Filterable<Field = F>,
    {
        let order = F::order_by();
        let mut hits: Vec<R> = records.into_iter().filter(|r| self.matches(r)).collect();
        hits.sort_by(|a, b| sort_key(a.field(order)).cmp(&sort_key(b.field(order))));
        hits
    }
}

fn sort_key(value: FieldValue<'_>) -> (Option<bool>, &str) {
    match value {
        FieldValue::Text(text) => (None, text),
        FieldValue::Bool(flag) => (flag, ""),
    }
}

/// Builds a [`SearchQuery`] from optional form values.
///
/// Blank text values are skipped. With `contains` set, text values become
/// substring matches; otherwise they must match exactly.
#[derive(Debug, Clone)]
pub struct FilterBuilder<F> {
    contains: bool,
    predicates: Vec<Predicate<F>>,
}

impl<F: Field> FilterBuilder<F> {
    pub fn new(contains: bool) -> Self {
        Self {
            contains,
            predicates: Vec::new(),
        }
    }

    fn text_predicate(&self, field: F, value: &str) -> Predicate<F> {
        if self.contains {
            Predicate::Contains(field, value.to_string())
        } else {
            Predicate::Equals(field, FilterValue::Text(value.to_string()))
        }
    }

    pub fn text(mut self, field: F, value: Option<&str>) -> Self {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            let predicate = self.text_predicate(field, value);
            self.predicates.push(predicate);
        }
        self
    }

    /// Flags always match exactly, whatever the `contains` setting.
    pub fn flag(mut self, field: F, value: Option<bool>) -> Self {
        if let Some(value) = value {
            self.predicates
                .push(Predicate::Equals(field, FilterValue::Bool(value)));
        }
        self
    }

    /// One OR-group over the selected values; no selection adds nothing.
    pub fn one_of<I, S>(mut self, field: F, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let members: Vec<Predicate<F>> = values
            .into_iter()
            .filter(|v| !v.as_ref().trim().is_empty())
            .map(|v| self.text_predicate(field, v.as_ref().trim()))
            .collect();
        if !members.is_empty() {
            self.predicates.push(Predicate::AnyOf(members));
        }
        self
    }

    pub fn build(self) -> SearchQuery<F> {
        SearchQuery {
            predicates: self.predicates,
        }
    }
}

//=========================================================================================
// Clients
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientField {
    FirstName,
    LastName,
    Phone,
    Email,
    Dcs,
    PrimaryLocation,
    CurrentStatus,
}

impl Field for ClientField {
    fn column(self) -> &'static str {
        match self {
            ClientField::FirstName => "first_name",
            ClientField::LastName => "last_name",
            ClientField::Phone => "phone",
            ClientField::Email => "email",
            ClientField::Dcs => "dcs",
            ClientField::PrimaryLocation => "primary_location",
            ClientField::CurrentStatus => "current_status",
        }
    }

    fn order_by() -> Self {
        ClientField::LastName
    }
}

impl Filterable for Client {
    type Field = ClientField;

    fn field(&self, field: ClientField) -> FieldValue<'_> {
        match field {
            ClientField::FirstName => FieldValue::Text(&self.first_name),
            ClientField::LastName => FieldValue::Text(&self.last_name),
            ClientField::Phone => FieldValue::Text(&self.phone),
            ClientField::Email => FieldValue::Text(&self.email),
            ClientField::Dcs => FieldValue::Bool(self.dcs),
            ClientField::PrimaryLocation => FieldValue::Text(&self.primary_location),
            ClientField::CurrentStatus => FieldValue::Text(self.status.code()),
        }
    }
}

pub type ClientQuery = SearchQuery<ClientField>;

impl ClientQuery {
    /// Free-text name search: every whitespace-separated token is matched as a
    /// substring of first or last name, and any hit qualifies. A blank string
    /// matches nobody.
    pub fn by_name_tokens(raw: &str) -> Self {
        let members = raw
            .split_whitespace()
            .flat_map(|token| {
                [
                    Predicate::Contains(ClientField::FirstName, token.to_string()),
                    Predicate::Contains(ClientField::LastName, token.to_string()),
                ]
            })
            .collect();
        Self {
            predicates: vec![Predicate::AnyOf(members)],
        }
    }
}

//=========================================================================================
// Referrals
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferralField {
    FullName,
    Agency,
    Phone,
    Email,
}

impl Field for ReferralField {
    fn column(self) -> &'static str {
        match self {
            ReferralField::FullName => "full_name",
            ReferralField::Agency => "agency",
            ReferralField::Phone => "phone",
            ReferralField::Email => "email",
        }
    }

    fn order_by() -> Self {
        ReferralField::Agency
    }
}

impl Filterable for Referral {
    type Field = ReferralField;

    fn field(&self, field: ReferralField) -> FieldValue<'_> {
        match field {
            ReferralField::FullName => FieldValue::Text(&self.full_name),
            ReferralField::Agency => FieldValue::Text(&self.agency),
            ReferralField::Phone => FieldValue::Text(&self.phone),
            ReferralField::Email => FieldValue::Text(&self.email),
        }
    }
}

pub type ReferralQuery = SearchQuery<ReferralField>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Audit, ClientStatus, RecordState, SessionQuota};
    use crate::secure_link::SecureLink;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn client(first: &str, last: &str, location: &str, status: ClientStatus) -> Client {
        let now = Utc::now();
        Client {
            id: Uuid::new_v4(),
            first_name: first.into(),
            middle_name: String::new(),
            last_name: last.into(),
            phone: String::new(),
            email: format!("{}@example.org", first.to_lowercase()),
            dcs: None,
            primary_location: location.into(),
            dob: None,
            ethnicity: None,
            gender: None,
            language: None,
            relationship_status: None,
            employment_status: None,
            cause_numbers: Vec::new(),
            date_enroll: None,
            date_discharge: None,
            date_complete: None,
            session_quota: SessionQuota::Long,
            session_qty_add: 0,
            status,
            secure_link: SecureLink::expired(Uuid::new_v4(), "abcdef".into(), now),
            audit: Audit::stamp("System", now),
            state: RecordState::Live,
        }
    }

    fn roster() -> Vec<Client> {
        vec![
            client("Maria", "Young", "Lafayette", ClientStatus::Active),
            client("Sam", "Adams", "Muncie", ClientStatus::Pending),
            client("Lee", "Marsh", "Delphi", ClientStatus::Active),
        ]
    }

    fn last_names(clients: &[Client]) -> Vec<&str> {
        clients.iter().map(|c| c.last_name.as_str()).collect()
    }

    #[test]
    fn no_values_returns_everything_by_last_name() {
        let query = FilterBuilder::<ClientField>::new(false)
            .text(ClientField::FirstName, Some(""))
            .text(ClientField::Email, None)
            .flag(ClientField::Dcs, None)
            .one_of(ClientField::PrimaryLocation, Vec::<String>::new())
            .build();
        assert_eq!(query, ClientQuery::all());
        let hits = query.apply(roster());
        assert_eq!(last_names(&hits), vec!["Adams", "Marsh", "Young"]);
    }

    #[test]
    fn two_selections_return_the_union() {
        let query = FilterBuilder::new(false)
            .one_of(ClientField::PrimaryLocation, ["Lafayette", "Delphi"])
            .build();
        let hits = query.apply(roster());
        assert_eq!(last_names(&hits), vec!["Marsh", "Young"]);
    }

    #[test]
    fn contains_flag_switches_to_substring_matching() {
        let exact = FilterBuilder::new(false)
            .text(ClientField::LastName, Some("Ma"))
            .build();
        assert!(exact.apply(roster()).is_empty());

        let partial = FilterBuilder::new(true)
            .text(ClientField::LastName, Some("Ma"))
            .build();
        assert_eq!(last_names(&partial.apply(roster())), vec!["Marsh"]);
    }

    #[test]
    fn scalar_and_multi_value_fields_are_combined_with_and() {
        let query = FilterBuilder::new(false)
            .one_of(ClientField::CurrentStatus, ["A"])
            .one_of(ClientField::PrimaryLocation, ["Lafayette", "Muncie"])
            .build();
        assert_eq!(last_names(&query.apply(roster())), vec!["Young"]);
    }

    #[test]
    fn dcs_flag_matches_only_checked_clients() {
        let mut clients = roster();
        clients[1].dcs = Some(true);
        clients[2].dcs = Some(false);
        let query = FilterBuilder::new(true)
            .flag(ClientField::Dcs, Some(true))
            .build();
        assert_eq!(last_names(&query.apply(clients)), vec!["Adams"]);
    }

    #[test]
    fn name_tokens_or_across_first_and_last_name() {
        let query = ClientQuery::by_name_tokens("  Sam  Mars ");
        assert_eq!(last_names(&query.apply(roster())), vec!["Adams", "Marsh"]);
    }

    #[test]
    fn blank_name_search_matches_nobody() {
        assert!(ClientQuery::by_name_tokens("   ").apply(roster()).is_empty());
    }

    #[test]
    fn matching_is_case_sensitive() {
        let query = FilterBuilder::new(true)
            .text(ClientField::FirstName, Some("maria"))
            .build();
        assert!(query.apply(roster()).is_empty());
    }

    #[test]
    fn referrals_order_by_agency() {
        let referral = |name: &str, agency: &str| Referral {
            id: Uuid::new_v4(),
            full_name: name.into(),
            agency: agency.into(),
            phone: String::new(),
            email: String::new(),
            audit: Audit::stamp("System", Utc::now()),
            state: RecordState::Live,
        };
        let all = vec![
            referral("Kim", "Probation"),
            referral("Ray", "DCS"),
            referral("Ana", "County Court"),
        ];
        let hits = ReferralQuery::all().apply(all);
        let agencies: Vec<_> = hits.iter().map(|r| r.agency.as_str()).collect();
        assert_eq!(agencies, vec!["County Court", "DCS", "Probation"]);
    }
}
