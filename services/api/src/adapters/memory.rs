//! services/api/src/adapters/memory.rs
//!
//! A process-local implementation of the `DatabaseService` port. It backs the
//! `memory` storage mode and the router integration tests. It keeps the same
//! rules as the PostgreSQL adapter: soft-deleted records are invisible to every
//! read, and write models are checked before anything is stored.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use casebook_core::domain::{
    Audit, CaseNote, Client, RecordState, Referral, Service, User, UserCredentials,
};
use casebook_core::filter::{ClientQuery, ReferralQuery};
use casebook_core::permissions::{Permission, PermissionSet};
use casebook_core::ports::{DatabaseService, PortError, PortResult};
use casebook_core::secure_link::{generate_passcode, SecureLink};
use casebook_core::validation::{
    NewCaseNote, NewClient, NewReferral, NewService, ProfileUpdate, ValidationErrors,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

//=========================================================================================
// Stored Records
//=========================================================================================

/// Records that carry a soft-delete state.
trait Stored {
    const KIND: &'static str;

    fn state(&self) -> &RecordState;
    fn mark_deleted(&mut self, actor: &str, now: DateTime<Utc>);
}

macro_rules! stored {
    ($ty:ty, $kind:literal) => {
        impl Stored for $ty {
            const KIND: &'static str = $kind;

            fn state(&self) -> &RecordState {
                &self.state
            }

            fn mark_deleted(&mut self, actor: &str, now: DateTime<Utc>) {
                self.state = RecordState::Deleted {
                    on: Some(now),
                    by: actor.to_string(),
                };
                self.audit = Audit::stamp(actor, now);
            }
        }
    };
}

stored!(Client, "Client");
stored!(Service, "Service");
stored!(CaseNote, "Case note");
stored!(Referral, "Referral");

/// Every live record in `table`. Reads go through here or [`live_get`].
fn live<T: Stored>(table: &HashMap<Uuid, T>) -> impl Iterator<Item = &T> {
    table.values().filter(|r| r.state().is_live())
}

fn live_get<T: Stored>(table: &HashMap<Uuid, T>, id: Uuid) -> PortResult<&T> {
    table
        .get(&id)
        .filter(|r| r.state().is_live())
        .ok_or_else(|| PortError::NotFound(format!("{} {} not found", T::KIND, id)))
}

fn live_get_mut<T: Stored>(table: &mut HashMap<Uuid, T>, id: Uuid) -> PortResult<&mut T> {
    table
        .get_mut(&id)
        .filter(|r| r.state().is_live())
        .ok_or_else(|| PortError::NotFound(format!("{} {} not found", T::KIND, id)))
}

fn soft_delete<T: Stored>(table: &mut HashMap<Uuid, T>, id: Uuid, actor: &str) -> PortResult<()> {
    live_get_mut(table, id)?.mark_deleted(actor, Utc::now());
    Ok(())
}

struct StoredUser {
    user: User,
    hashed_password: Option<String>,
}

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, StoredUser>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    clients: HashMap<Uuid, Client>,
    services: HashMap<Uuid, Service>,
    case_notes: HashMap<Uuid, CaseNote>,
    referrals: HashMap<Uuid, Referral>,
    /// (referral id, client id)
    referral_clients: BTreeSet<(Uuid, Uuid)>,
}

//=========================================================================================
// The Adapter
//=========================================================================================

#[derive(Default)]
pub struct MemoryAdapter {
    store: RwLock<Store>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants named permissions to a staff user. There is no HTTP route for
    /// this; operators grant permissions directly in storage.
    pub async fn grant_permissions(&self, user_id: Uuid, permissions: &[Permission]) -> PortResult<()> {
        let mut store = self.store.write().await;
        let stored = store
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        stored.user.permissions = stored
            .user
            .permissions
            .codenames()
            .into_iter()
            .filter_map(|c| Permission::from_codename(&c))
            .chain(permissions.iter().copied())
            .collect();
        Ok(())
    }
}

fn client_from(id: Uuid, input: &NewClient, link: SecureLink, audit: Audit) -> Client {
    Client {
        id,
        first_name: input.first_name.clone(),
        middle_name: input.middle_name.clone(),
        last_name: input.last_name.clone(),
        phone: input.phone.clone(),
        email: input.email.clone(),
        dcs: input.dcs,
        primary_location: input.primary_location.clone(),
        dob: input.dob,
        ethnicity: input.ethnicity.clone(),
        gender: input.gender.clone(),
        language: input.language.clone(),
        relationship_status: input.relationship_status.clone(),
        employment_status: input.employment_status.clone(),
        cause_numbers: input.cause_numbers.clone(),
        date_enroll: input.date_enroll,
        date_discharge: input.date_discharge,
        date_complete: None,
        session_quota: input.session_quota,
        session_qty_add: input.session_qty_add,
        status: input.status,
        secure_link: link,
        audit,
        state: RecordState::Live,
    }
}

fn apply_service(service: &mut Service, input: &NewService) {
    service.date = input.date;
    service.description = input.description.clone();
    service.fee = input.fee;
    service.discount = input.discount;
    service.payment = input.payment;
    service.credit = input.credit;
    service.notes = input.notes.clone();
}

fn apply_case_note(note: &mut CaseNote, input: &NewCaseNote) {
    note.date = input.date;
    note.start_time = input.start_time;
    note.end_time = input.end_time;
    note.facilitator = input.facilitator.clone();
    note.class_topic = input.class_topic.clone();
    note.location = input.location.clone();
    note.notes = input.notes.clone();
}

fn apply_referral(referral: &mut Referral, input: &NewReferral) {
    referral.full_name = input.full_name.clone();
    referral.agency = input.agency.clone();
    referral.phone = input.phone.clone();
    referral.email = input.email.clone();
}

fn email_taken() -> PortError {
    let mut errors = ValidationErrors::new();
    errors.add("email", "A user with that email already exists.");
    PortError::Invalid(errors)
}

#[async_trait]
impl DatabaseService for MemoryAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut store = self.store.write().await;
        if store
            .users
            .values()
            .any(|u| u.user.email.as_deref() == Some(email))
        {
            return Err(email_taken());
        }
        let user = User {
            user_id: Uuid::new_v4(),
            email: Some(email.to_string()),
            first_name: String::new(),
            last_name: String::new(),
            permissions: PermissionSet::default(),
        };
        store.users.insert(
            user.user_id,
            StoredUser {
                user: user.clone(),
                hashed_password: Some(hashed_password.to_string()),
            },
        );
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let store = self.store.read().await;
        store
            .users
            .values()
            .find_map(|u| match (&u.user.email, &u.hashed_password) {
                (Some(e), Some(hash)) if e == email => Some(UserCredentials {
                    user_id: u.user.user_id,
                    email: e.clone(),
                    hashed_password: hash.clone(),
                }),
                _ => None,
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let store = self.store.read().await;
        store
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn update_user_profile(&self, user_id: Uuid, profile: &ProfileUpdate) -> PortResult<User> {
        profile.check()?;
        let mut store = self.store.write().await;
        if let Some(email) = &profile.email {
            if store
                .users
                .values()
                .any(|u| u.user.user_id != user_id && u.user.email.as_ref() == Some(email))
            {
                return Err(email_taken());
            }
        }
        let stored = store
            .users
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        stored.user.first_name = profile.first_name.clone();
        stored.user.last_name = profile.last_name.clone();
        stored.user.email = profile.email.clone();
        Ok(stored.user.clone())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut store = self.store.write().await;
        let now = Utc::now();
        store.auth_sessions.retain(|_, (_, expires)| *expires > now);
        store
            .auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let store = self.store.read().await;
        match store.auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.store.write().await.auth_sessions.remove(session_id);
        Ok(())
    }

    // --- Clients ---

    async fn search_clients(&self, query: &ClientQuery) -> PortResult<Vec<Client>> {
        let store = self.store.read().await;
        Ok(query.apply(live(&store.clients).cloned()))
    }

    async fn get_client(&self, client_id: Uuid) -> PortResult<Client> {
        let store = self.store.read().await;
        live_get(&store.clients, client_id).cloned()
    }

    async fn get_client_by_link(&self, link_id: Uuid) -> PortResult<Client> {
        let store = self.store.read().await;
        let client = live(&store.clients)
            .find(|c| c.secure_link.link_id == link_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Client link {} not found", link_id)));
        client
    }

    async fn create_client(&self, client: &NewClient, actor: &str) -> PortResult<Client> {
        client.check()?;
        let now = Utc::now();
        let link = SecureLink::expired(Uuid::new_v4(), generate_passcode(), now);
        let created = client_from(Uuid::new_v4(), client, link, Audit::stamp(actor, now));
        let mut store = self.store.write().await;
        store.clients.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_client(&self, client_id: Uuid, client: &NewClient, actor: &str) -> PortResult<Client> {
        client.check()?;
        let mut store = self.store.write().await;
        let existing = live_get_mut(&mut store.clients, client_id)?;
        let mut updated = client_from(
            client_id,
            client,
            existing.secure_link.clone(),
            Audit::stamp(actor, Utc::now()),
        );
        updated.date_complete = existing.date_complete;
        *existing = updated.clone();
        Ok(updated)
    }

    async fn delete_client(&self, client_id: Uuid, actor: &str) -> PortResult<()> {
        soft_delete(&mut self.store.write().await.clients, client_id, actor)
    }

    async fn update_secure_link(&self, client_id: Uuid, link: &SecureLink) -> PortResult<Client> {
        let mut store = self.store.write().await;
        let client = live_get_mut(&mut store.clients, client_id)?;
        client.secure_link = link.clone();
        Ok(client.clone())
    }

    // --- Services ---

    async fn list_services(&self, client_id: Uuid) -> PortResult<Vec<Service>> {
        let store = self.store.read().await;
        let mut services: Vec<Service> = live(&store.services)
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect();
        services.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.audit.last_updated.cmp(&a.audit.last_updated))
        });
        Ok(services)
    }

    async fn get_service(&self, service_id: Uuid) -> PortResult<Service> {
        let store = self.store.read().await;
        live_get(&store.services, service_id).cloned()
    }

    async fn create_service(&self, client_id: Uuid, service: &NewService, actor: &str) -> PortResult<Service> {
        service.check()?;
        let mut store = self.store.write().await;
        live_get(&store.clients, client_id)?;
        let mut created = Service {
            id: Uuid::new_v4(),
            client_id,
            date: service.date,
            description: String::new(),
            fee: None,
            discount: None,
            payment: None,
            credit: None,
            notes: String::new(),
            audit: Audit::stamp(actor, Utc::now()),
            state: RecordState::Live,
        };
        apply_service(&mut created, service);
        store.services.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_service(&self, service_id: Uuid, service: &NewService, actor: &str) -> PortResult<Service> {
        service.check()?;
        let mut store = self.store.write().await;
        let existing = live_get_mut(&mut store.services, service_id)?;
        apply_service(existing, service);
        existing.audit = Audit::stamp(actor, Utc::now());
        Ok(existing.clone())
    }

    async fn delete_service(&self, service_id: Uuid, actor: &str) -> PortResult<()> {
        soft_delete(&mut self.store.write().await.services, service_id, actor)
    }

    // --- Case Notes ---

    async fn list_case_notes(&self, client_id: Uuid) -> PortResult<Vec<CaseNote>> {
        let store = self.store.read().await;
        let mut notes: Vec<CaseNote> = live(&store.case_notes)
            .filter(|n| n.client_id == client_id)
            .cloned()
            .collect();
        notes.sort_by(|a, b| b.date.cmp(&a.date).then(b.start_time.cmp(&a.start_time)));
        Ok(notes)
    }

    async fn get_case_note(&self, note_id: Uuid) -> PortResult<CaseNote> {
        let store = self.store.read().await;
        live_get(&store.case_notes, note_id).cloned()
    }

    async fn create_case_note(&self, client_id: Uuid, note: &NewCaseNote, actor: &str) -> PortResult<CaseNote> {
        note.check()?;
        let mut store = self.store.write().await;
        live_get(&store.clients, client_id)?;
        let mut created = CaseNote {
            id: Uuid::new_v4(),
            client_id,
            date: note.date,
            start_time: None,
            end_time: None,
            facilitator: String::new(),
            class_topic: String::new(),
            location: String::new(),
            notes: String::new(),
            audit: Audit::stamp(actor, Utc::now()),
            state: RecordState::Live,
        };
        apply_case_note(&mut created, note);
        store.case_notes.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_case_note(&self, note_id: Uuid, note: &NewCaseNote, actor: &str) -> PortResult<CaseNote> {
        note.check()?;
        let mut store = self.store.write().await;
        let existing = live_get_mut(&mut store.case_notes, note_id)?;
        apply_case_note(existing, note);
        existing.audit = Audit::stamp(actor, Utc::now());
        Ok(existing.clone())
    }

    async fn delete_case_note(&self, note_id: Uuid, actor: &str) -> PortResult<()> {
        soft_delete(&mut self.store.write().await.case_notes, note_id, actor)
    }

    // --- Referrals ---

    async fn search_referrals(&self, query: &ReferralQuery) -> PortResult<Vec<Referral>> {
        let store = self.store.read().await;
        Ok(query.apply(live(&store.referrals).cloned()))
    }

    async fn get_referral(&self, referral_id: Uuid) -> PortResult<Referral> {
        let store = self.store.read().await;
        live_get(&store.referrals, referral_id).cloned()
    }

    async fn create_referral(&self, referral: &NewReferral, actor: &str) -> PortResult<Referral> {
        referral.check()?;
        let mut created = Referral {
            id: Uuid::new_v4(),
            full_name: String::new(),
            agency: String::new(),
            phone: String::new(),
            email: String::new(),
            audit: Audit::stamp(actor, Utc::now()),
            state: RecordState::Live,
        };
        apply_referral(&mut created, referral);
        let mut store = self.store.write().await;
        store.referrals.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_referral(&self, referral_id: Uuid, referral: &NewReferral, actor: &str) -> PortResult<Referral> {
        referral.check()?;
        let mut store = self.store.write().await;
        let existing = live_get_mut(&mut store.referrals, referral_id)?;
        apply_referral(existing, referral);
        existing.audit = Audit::stamp(actor, Utc::now());
        Ok(existing.clone())
    }

    async fn delete_referral(&self, referral_id: Uuid, actor: &str) -> PortResult<()> {
        soft_delete(&mut self.store.write().await.referrals, referral_id, actor)
    }

    async fn list_referrals_for_client(&self, client_id: Uuid) -> PortResult<Vec<Referral>> {
        let store = self.store.read().await;
        let mut referrals: Vec<Referral> = live(&store.referrals)
            .filter(|r| store.referral_clients.contains(&(r.id, client_id)))
            .cloned()
            .collect();
        referrals.sort_by(|a, b| a.agency.cmp(&b.agency));
        Ok(referrals)
    }

    async fn list_clients_for_referral(&self, referral_id: Uuid) -> PortResult<Vec<Client>> {
        let store = self.store.read().await;
        let mut clients: Vec<Client> = live(&store.clients)
            .filter(|c| store.referral_clients.contains(&(referral_id, c.id)))
            .cloned()
            .collect();
        clients.sort_by(|a, b| a.last_name.cmp(&b.last_name));
        Ok(clients)
    }

    async fn link_clients(&self, referral_id: Uuid, client_ids: &[Uuid]) -> PortResult<()> {
        let mut store = self.store.write().await;
        live_get(&store.referrals, referral_id)?;
        let linkable: Vec<Uuid> = client_ids
            .iter()
            .copied()
            .filter(|id| live_get(&store.clients, *id).is_ok())
            .collect();
        store
            .referral_clients
            .extend(linkable.into_iter().map(|id| (referral_id, id)));
        Ok(())
    }

    async fn unlink_clients(&self, referral_id: Uuid, client_ids: &[Uuid]) -> PortResult<()> {
        let mut store = self.store.write().await;
        live_get(&store.referrals, referral_id)?;
        for client_id in client_ids {
            store.referral_clients.remove(&(referral_id, *client_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_core::domain::{ClientStatus, SessionQuota};
    use casebook_core::filter::{ClientField, FilterBuilder};
    use chrono::{NaiveDate, NaiveTime};

    fn new_client(first: &str, last: &str) -> NewClient {
        NewClient {
            first_name: first.into(),
            middle_name: String::new(),
            last_name: last.into(),
            phone: String::new(),
            email: String::new(),
            dcs: None,
            primary_location: "Lafayette".into(),
            dob: None,
            ethnicity: None,
            gender: None,
            language: None,
            relationship_status: None,
            employment_status: None,
            cause_numbers: Vec::new(),
            date_enroll: None,
            date_discharge: None,
            session_quota: SessionQuota::Long,
            session_qty_add: 0,
            status: ClientStatus::Active,
        }
    }

    #[tokio::test]
    async fn opening_a_session_drops_expired_ones() {
        let db = MemoryAdapter::new();
        let user = db.create_user_with_email("kim@example.org", "hash").await.unwrap();
        let now = Utc::now();
        db.create_auth_session("stale", user.user_id, now - chrono::Duration::minutes(1))
            .await
            .unwrap();
        db.create_auth_session("fresh", user.user_id, now + chrono::Duration::days(1))
            .await
            .unwrap();

        let store = db.store.read().await;
        assert!(!store.auth_sessions.contains_key("stale"));
        assert!(store.auth_sessions.contains_key("fresh"));
        drop(store);
        assert_eq!(db.validate_auth_session("fresh").await.unwrap(), user.user_id);
    }

    #[tokio::test]
    async fn deleted_clients_disappear_from_every_read() {
        let db = MemoryAdapter::new();
        let kept = db.create_client(&new_client("Ana", "Bell"), "Staff").await.unwrap();
        let gone = db.create_client(&new_client("Cal", "Bell"), "Staff").await.unwrap();
        db.delete_client(gone.id, "Staff").await.unwrap();

        let hits = db.search_clients(&ClientQuery::all()).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, kept.id);
        assert!(matches!(db.get_client(gone.id).await, Err(PortError::NotFound(_))));
        assert!(matches!(
            db.get_client_by_link(gone.secure_link.link_id).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            db.delete_client(gone.id, "Staff").await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn new_clients_start_with_a_closed_link() {
        let db = MemoryAdapter::new();
        let client = db.create_client(&new_client("Ana", "Bell"), "Staff").await.unwrap();
        let link = &client.secure_link;
        assert!(link
            .check(link.link_id, &link.passcode, Utc::now())
            .is_err());
        assert_eq!(client.audit.last_updated_by, "Staff");
    }

    #[tokio::test]
    async fn search_orders_by_last_name() {
        let db = MemoryAdapter::new();
        db.create_client(&new_client("Ana", "Zed"), "Staff").await.unwrap();
        db.create_client(&new_client("Ben", "Adams"), "Staff").await.unwrap();
        let query = FilterBuilder::new(true)
            .one_of(ClientField::PrimaryLocation, ["Lafayette"])
            .build();
        let names: Vec<String> = db
            .search_clients(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.last_name)
            .collect();
        assert_eq!(names, ["Adams", "Zed"]);
    }

    #[tokio::test]
    async fn invalid_case_note_is_not_stored() {
        let db = MemoryAdapter::new();
        let client = db.create_client(&new_client("Ana", "Bell"), "Staff").await.unwrap();
        let note = NewCaseNote {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            start_time: NaiveTime::from_hms_opt(19, 0, 0),
            end_time: NaiveTime::from_hms_opt(18, 0, 0),
            facilitator: "R. Ortiz".into(),
            class_topic: "Anger".into(),
            location: "Lafayette".into(),
            notes: String::new(),
        };
        let err = db.create_case_note(client.id, &note, "Staff").await.unwrap_err();
        assert!(matches!(err, PortError::Invalid(ref e) if e.has("end_time")));
        assert!(db.list_case_notes(client.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn linking_skips_deleted_clients_and_repeats() {
        let db = MemoryAdapter::new();
        let referral = db
            .create_referral(
                &NewReferral {
                    full_name: "Dana Cole".into(),
                    agency: "DCS".into(),
                    phone: String::new(),
                    email: String::new(),
                },
                "Staff",
            )
            .await
            .unwrap();
        let a = db.create_client(&new_client("Ana", "Bell"), "Staff").await.unwrap();
        let b = db.create_client(&new_client("Ben", "Cox"), "Staff").await.unwrap();
        db.delete_client(b.id, "Staff").await.unwrap();

        db.link_clients(referral.id, &[a.id, a.id, b.id]).await.unwrap();
        let linked = db.list_clients_for_referral(referral.id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(db.list_referrals_for_client(a.id).await.unwrap().len(), 1);

        db.unlink_clients(referral.id, &[a.id]).await.unwrap();
        assert!(db.list_clients_for_referral(referral.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_signup_email_is_a_field_error() {
        let db = MemoryAdapter::new();
        db.create_user_with_email("a@example.org", "hash").await.unwrap();
        let err = db.create_user_with_email("a@example.org", "hash").await.unwrap_err();
        assert!(matches!(err, PortError::Invalid(ref e) if e.has("email")));
    }
}
