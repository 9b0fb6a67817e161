//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Reads are built from [`live_rows`] so that soft-deleted rows never leave the
//! database; writes guard on the same [`LIVE`] condition.

use async_trait::async_trait;
use casebook_core::domain::{
    Audit, CaseNote, Client, ClientStatus, RecordState, Referral, Service, SessionQuota, User,
    UserCredentials,
};
use casebook_core::filter::{ClientQuery, Field, FilterValue, Predicate, ReferralQuery, SearchQuery};
use casebook_core::permissions::PermissionSet;
use casebook_core::ports::{DatabaseService, PortError, PortResult};
use casebook_core::secure_link::{generate_passcode, SecureLink};
use casebook_core::validation::{
    NewCaseNote, NewClient, NewReferral, NewService, ProfileUpdate, ValidationErrors,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// Shared Query Construction
//=========================================================================================

/// Condition every live row satisfies.
const LIVE: &str = "deleted = FALSE";

const CLIENT_COLUMNS: &str = "id, first_name, middle_name, last_name, phone, email, dcs, \
    primary_location, dob, ethnicity, gender, language, relationship_status, employment_status, \
    cause, cause2, cause3, date_enroll, date_discharge, date_complete, sesh_qty_orig, \
    session_qty_add, current_status, link_id, passcode, link_expires_at, last_updated, \
    last_updated_by, deleted, deleted_on, deleted_by";

const SERVICE_COLUMNS: &str = "id, client_id, date, description, fee, discount, payment, credit, \
    notes, last_updated, last_updated_by, deleted, deleted_on, deleted_by";

const CASE_NOTE_COLUMNS: &str = "id, client_id, date, start_time, end_time, facilitator, \
    class_topic, location, notes, last_updated, last_updated_by, deleted, deleted_on, deleted_by";

const REFERRAL_COLUMNS: &str = "id, full_name, agency, phone, email, last_updated, \
    last_updated_by, deleted, deleted_on, deleted_by";

const USER_COLUMNS: &str = "user_id, email, first_name, last_name, permissions";

/// Starts a `SELECT` over the live rows of `table`. Callers append `AND ...`.
fn live_rows<'a>(table: &str, columns: &str) -> QueryBuilder<'a, Postgres> {
    QueryBuilder::new(format!("SELECT {columns} FROM {table} WHERE {LIVE}"))
}

fn push_predicate<F: Field>(qb: &mut QueryBuilder<'_, Postgres>, predicate: &Predicate<F>) {
    match predicate {
        Predicate::Equals(field, FilterValue::Text(value)) => {
            qb.push(field.column()).push(" = ").push_bind(value.clone());
        }
        Predicate::Equals(field, FilterValue::Bool(value)) => {
            qb.push(field.column()).push(" = ").push_bind(*value);
        }
        Predicate::Contains(field, needle) => {
            qb.push("strpos(")
                .push(field.column())
                .push("::text, ")
                .push_bind(needle.clone())
                .push(") > 0");
        }
        Predicate::AnyOf(members) if members.is_empty() => {
            qb.push("FALSE");
        }
        Predicate::AnyOf(members) => {
            qb.push("(");
            for (i, member) in members.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_predicate(qb, member);
            }
            qb.push(")");
        }
    }
}

/// Appends the query's predicates and its ordering to a [`live_rows`] builder.
fn push_search<F: Field>(qb: &mut QueryBuilder<'_, Postgres>, query: &SearchQuery<F>) {
    for predicate in &query.predicates {
        qb.push(" AND ");
        push_predicate(qb, predicate);
    }
    qb.push(" ORDER BY ").push(F::order_by().column());
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn invalid(field: &str, message: &str) -> PortError {
    let mut errors = ValidationErrors::new();
    errors.add(field, message);
    PortError::Invalid(errors)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: Option<String>,
    first_name: String,
    last_name: String,
    permissions: Vec<String>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            permissions: PermissionSet::from_codenames(self.permissions),
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

#[derive(FromRow)]
struct ClientRecord {
    id: Uuid,
    first_name: String,
    middle_name: String,
    last_name: String,
    phone: String,
    email: String,
    dcs: Option<bool>,
    primary_location: String,
    dob: Option<NaiveDate>,
    ethnicity: Option<String>,
    gender: Option<String>,
    language: Option<String>,
    relationship_status: Option<String>,
    employment_status: Option<String>,
    cause: String,
    cause2: String,
    cause3: String,
    date_enroll: Option<NaiveDate>,
    date_discharge: Option<NaiveDate>,
    date_complete: Option<NaiveDate>,
    sesh_qty_orig: i32,
    session_qty_add: i32,
    current_status: String,
    link_id: Uuid,
    passcode: String,
    link_expires_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    last_updated_by: String,
    deleted: bool,
    deleted_on: Option<DateTime<Utc>>,
    deleted_by: String,
}
impl ClientRecord {
    fn to_domain(self) -> PortResult<Client> {
        let status = ClientStatus::from_code(self.current_status.trim()).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Client {} has unknown status '{}'",
                self.id, self.current_status
            ))
        })?;
        let session_quota = SessionQuota::from_sessions(self.sesh_qty_orig).ok_or_else(|| {
            PortError::Unexpected(format!(
                "Client {} has unknown session quota {}",
                self.id, self.sesh_qty_orig
            ))
        })?;
        let cause_numbers = [self.cause, self.cause2, self.cause3]
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect();
        Ok(Client {
            id: self.id,
            first_name: self.first_name,
            middle_name: self.middle_name,
            last_name: self.last_name,
            phone: self.phone,
            email: self.email,
            dcs: self.dcs,
            primary_location: self.primary_location,
            dob: self.dob,
            ethnicity: self.ethnicity,
            gender: self.gender,
            language: self.language,
            relationship_status: self.relationship_status,
            employment_status: self.employment_status,
            cause_numbers,
            date_enroll: self.date_enroll,
            date_discharge: self.date_discharge,
            date_complete: self.date_complete,
            session_quota,
            session_qty_add: self.session_qty_add,
            status,
            secure_link: SecureLink {
                link_id: self.link_id,
                passcode: self.passcode,
                expires_at: self.link_expires_at,
            },
            audit: Audit {
                last_updated: self.last_updated,
                last_updated_by: self.last_updated_by,
            },
            state: RecordState::from_columns(self.deleted, self.deleted_on, self.deleted_by),
        })
    }
}

fn clients_to_domain(records: Vec<ClientRecord>) -> PortResult<Vec<Client>> {
    records.into_iter().map(ClientRecord::to_domain).collect()
}

#[derive(FromRow)]
struct ServiceRecord {
    id: Uuid,
    client_id: Uuid,
    date: NaiveDate,
    description: String,
    fee: Option<Decimal>,
    discount: Option<Decimal>,
    payment: Option<Decimal>,
    credit: Option<i32>,
    notes: String,
    last_updated: DateTime<Utc>,
    last_updated_by: String,
    deleted: bool,
    deleted_on: Option<DateTime<Utc>>,
    deleted_by: String,
}
impl ServiceRecord {
    fn to_domain(self) -> Service {
        Service {
            id: self.id,
            client_id: self.client_id,
            date: self.date,
            description: self.description,
            fee: self.fee,
            discount: self.discount,
            payment: self.payment,
            credit: self.credit,
            notes: self.notes,
            audit: Audit {
                last_updated: self.last_updated,
                last_updated_by: self.last_updated_by,
            },
            state: RecordState::from_columns(self.deleted, self.deleted_on, self.deleted_by),
        }
    }
}

#[derive(FromRow)]
struct CaseNoteRecord {
    id: Uuid,
    client_id: Uuid,
    date: NaiveDate,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    facilitator: String,
    class_topic: String,
    location: String,
    notes: String,
    last_updated: DateTime<Utc>,
    last_updated_by: String,
    deleted: bool,
    deleted_on: Option<DateTime<Utc>>,
    deleted_by: String,
}
impl CaseNoteRecord {
    fn to_domain(self) -> CaseNote {
        CaseNote {
            id: self.id,
            client_id: self.client_id,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            facilitator: self.facilitator,
            class_topic: self.class_topic,
            location: self.location,
            notes: self.notes,
            audit: Audit {
                last_updated: self.last_updated,
                last_updated_by: self.last_updated_by,
            },
            state: RecordState::from_columns(self.deleted, self.deleted_on, self.deleted_by),
        }
    }
}

#[derive(FromRow)]
struct ReferralRecord {
    id: Uuid,
    full_name: String,
    agency: String,
    phone: String,
    email: String,
    last_updated: DateTime<Utc>,
    last_updated_by: String,
    deleted: bool,
    deleted_on: Option<DateTime<Utc>>,
    deleted_by: String,
}
impl ReferralRecord {
    fn to_domain(self) -> Referral {
        Referral {
            id: self.id,
            full_name: self.full_name,
            agency: self.agency,
            phone: self.phone,
            email: self.email,
            audit: Audit {
                last_updated: self.last_updated,
                last_updated_by: self.last_updated_by,
            },
            state: RecordState::from_columns(self.deleted, self.deleted_on, self.deleted_by),
        }
    }
}

fn cause_at(client: &NewClient, index: usize) -> String {
    client.cause_numbers.get(index).cloned().unwrap_or_default()
}

impl DbAdapter {
    /// Marks one live row of `table` deleted, stamping who and when.
    async fn soft_delete(&self, table: &str, what: &str, id: Uuid, actor: &str) -> PortResult<()> {
        let sql = format!(
            "UPDATE {table} SET deleted = TRUE, deleted_on = now(), deleted_by = $2, \
             last_updated = now(), last_updated_by = $2 WHERE id = $1 AND {LIVE}"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(actor)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("{} {} not found", what, id)));
        }
        Ok(())
    }

    async fn fetch_client(&self, qb: &mut QueryBuilder<'_, Postgres>, what: String) -> PortResult<Client> {
        qb.build_query_as::<ClientRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or(PortError::NotFound(what))?
            .to_domain()
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn create_user_with_email(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(email)
            .bind(hashed_password)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    invalid("email", "A user with that email already exists.")
                }
                _ => unexpected(e),
            })?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1 AND hashed_password IS NOT NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?
        .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = $1");
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn update_user_profile(&self, user_id: Uuid, profile: &ProfileUpdate) -> PortResult<User> {
        profile.check()?;
        let sql = format!(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4 WHERE user_id = $1 RETURNING {USER_COLUMNS}"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(profile.email.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    invalid("email", "A user with that email already exists.")
                }
                _ => unexpected(e),
            })?
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        Ok(record.to_domain())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    // --- Clients ---

    async fn search_clients(&self, query: &ClientQuery) -> PortResult<Vec<Client>> {
        let mut qb = live_rows("clients", CLIENT_COLUMNS);
        push_search(&mut qb, query);
        let records = qb
            .build_query_as::<ClientRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        clients_to_domain(records)
    }

    async fn get_client(&self, client_id: Uuid) -> PortResult<Client> {
        let mut qb = live_rows("clients", CLIENT_COLUMNS);
        qb.push(" AND id = ").push_bind(client_id);
        self.fetch_client(&mut qb, format!("Client {} not found", client_id))
            .await
    }

    async fn get_client_by_link(&self, link_id: Uuid) -> PortResult<Client> {
        let mut qb = live_rows("clients", CLIENT_COLUMNS);
        qb.push(" AND link_id = ").push_bind(link_id);
        self.fetch_client(&mut qb, format!("Client link {} not found", link_id))
            .await
    }

    async fn create_client(&self, client: &NewClient, actor: &str) -> PortResult<Client> {
        client.check()?;
        let sql = format!(
            "INSERT INTO clients (id, first_name, middle_name, last_name, phone, email, dcs, \
             primary_location, dob, ethnicity, gender, language, relationship_status, \
             employment_status, cause, cause2, cause3, date_enroll, date_discharge, sesh_qty_orig, \
             session_qty_add, current_status, link_id, passcode, link_expires_at, last_updated, \
             last_updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18, $19, $20, $21, $22, $23, $24, now(), now(), $25) RETURNING {CLIENT_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ClientRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&client.first_name)
            .bind(&client.middle_name)
            .bind(&client.last_name)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(client.dcs)
            .bind(&client.primary_location)
            .bind(client.dob)
            .bind(client.ethnicity.as_deref())
            .bind(client.gender.as_deref())
            .bind(client.language.as_deref())
            .bind(client.relationship_status.as_deref())
            .bind(client.employment_status.as_deref())
            .bind(cause_at(client, 0))
            .bind(cause_at(client, 1))
            .bind(cause_at(client, 2))
            .bind(client.date_enroll)
            .bind(client.date_discharge)
            .bind(client.session_quota.sessions())
            .bind(client.session_qty_add)
            .bind(client.status.code())
            .bind(Uuid::new_v4())
            .bind(generate_passcode())
            .bind(actor)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        record.to_domain()
    }

    async fn update_client(&self, client_id: Uuid, client: &NewClient, actor: &str) -> PortResult<Client> {
        client.check()?;
        let sql = format!(
            "UPDATE clients SET first_name = $2, middle_name = $3, last_name = $4, phone = $5, \
             email = $6, dcs = $7, primary_location = $8, dob = $9, ethnicity = $10, gender = $11, \
             language = $12, relationship_status = $13, employment_status = $14, cause = $15, \
             cause2 = $16, cause3 = $17, date_enroll = $18, date_discharge = $19, \
             sesh_qty_orig = $20, session_qty_add = $21, current_status = $22, \
             last_updated = now(), last_updated_by = $23 \
             WHERE id = $1 AND {LIVE} RETURNING {CLIENT_COLUMNS}"
        );
        sqlx::query_as::<_, ClientRecord>(&sql)
            .bind(client_id)
            .bind(&client.first_name)
            .bind(&client.middle_name)
            .bind(&client.last_name)
            .bind(&client.phone)
            .bind(&client.email)
            .bind(client.dcs)
            .bind(&client.primary_location)
            .bind(client.dob)
            .bind(client.ethnicity.as_deref())
            .bind(client.gender.as_deref())
            .bind(client.language.as_deref())
            .bind(client.relationship_status.as_deref())
            .bind(client.employment_status.as_deref())
            .bind(cause_at(client, 0))
            .bind(cause_at(client, 1))
            .bind(cause_at(client, 2))
            .bind(client.date_enroll)
            .bind(client.date_discharge)
            .bind(client.session_quota.sessions())
            .bind(client.session_qty_add)
            .bind(client.status.code())
            .bind(actor)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Client {} not found", client_id)))?
            .to_domain()
    }

    async fn delete_client(&self, client_id: Uuid, actor: &str) -> PortResult<()> {
        self.soft_delete("clients", "Client", client_id, actor).await
    }

    async fn update_secure_link(&self, client_id: Uuid, link: &SecureLink) -> PortResult<Client> {
        let sql = format!(
            "UPDATE clients SET link_id = $2, passcode = $3, link_expires_at = $4 \
             WHERE id = $1 AND {LIVE} RETURNING {CLIENT_COLUMNS}"
        );
        sqlx::query_as::<_, ClientRecord>(&sql)
            .bind(client_id)
            .bind(link.link_id)
            .bind(&link.passcode)
            .bind(link.expires_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Client {} not found", client_id)))?
            .to_domain()
    }

    // --- Services ---

    async fn list_services(&self, client_id: Uuid) -> PortResult<Vec<Service>> {
        let mut qb = live_rows("services", SERVICE_COLUMNS);
        qb.push(" AND client_id = ")
            .push_bind(client_id)
            .push(" ORDER BY date DESC, last_updated DESC");
        let records = qb
            .build_query_as::<ServiceRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_service(&self, service_id: Uuid) -> PortResult<Service> {
        let mut qb = live_rows("services", SERVICE_COLUMNS);
        qb.push(" AND id = ").push_bind(service_id);
        let record = qb
            .build_query_as::<ServiceRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Service {} not found", service_id)))?;
        Ok(record.to_domain())
    }

    async fn create_service(&self, client_id: Uuid, service: &NewService, actor: &str) -> PortResult<Service> {
        service.check()?;
        self.get_client(client_id).await?;
        let sql = format!(
            "INSERT INTO services (id, client_id, date, description, fee, discount, payment, credit, \
             notes, last_updated, last_updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), $10) RETURNING {SERVICE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ServiceRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(client_id)
            .bind(service.date)
            .bind(&service.description)
            .bind(service.fee)
            .bind(service.discount)
            .bind(service.payment)
            .bind(service.credit)
            .bind(&service.notes)
            .bind(actor)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_service(&self, service_id: Uuid, service: &NewService, actor: &str) -> PortResult<Service> {
        service.check()?;
        let sql = format!(
            "UPDATE services SET date = $2, description = $3, fee = $4, discount = $5, payment = $6, \
             credit = $7, notes = $8, last_updated = now(), last_updated_by = $9 \
             WHERE id = $1 AND {LIVE} RETURNING {SERVICE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ServiceRecord>(&sql)
            .bind(service_id)
            .bind(service.date)
            .bind(&service.description)
            .bind(service.fee)
            .bind(service.discount)
            .bind(service.payment)
            .bind(service.credit)
            .bind(&service.notes)
            .bind(actor)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Service {} not found", service_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_service(&self, service_id: Uuid, actor: &str) -> PortResult<()> {
        self.soft_delete("services", "Service", service_id, actor).await
    }

    // --- Case Notes ---

    async fn list_case_notes(&self, client_id: Uuid) -> PortResult<Vec<CaseNote>> {
        let mut qb = live_rows("case_notes", CASE_NOTE_COLUMNS);
        qb.push(" AND client_id = ")
            .push_bind(client_id)
            .push(" ORDER BY date DESC, start_time DESC");
        let records = qb
            .build_query_as::<CaseNoteRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_case_note(&self, note_id: Uuid) -> PortResult<CaseNote> {
        let mut qb = live_rows("case_notes", CASE_NOTE_COLUMNS);
        qb.push(" AND id = ").push_bind(note_id);
        let record = qb
            .build_query_as::<CaseNoteRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Case note {} not found", note_id)))?;
        Ok(record.to_domain())
    }

    async fn create_case_note(&self, client_id: Uuid, note: &NewCaseNote, actor: &str) -> PortResult<CaseNote> {
        note.check()?;
        self.get_client(client_id).await?;
        let sql = format!(
            "INSERT INTO case_notes (id, client_id, date, start_time, end_time, facilitator, \
             class_topic, location, notes, last_updated, last_updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), $10) RETURNING {CASE_NOTE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CaseNoteRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(client_id)
            .bind(note.date)
            .bind(note.start_time)
            .bind(note.end_time)
            .bind(&note.facilitator)
            .bind(&note.class_topic)
            .bind(&note.location)
            .bind(&note.notes)
            .bind(actor)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_case_note(&self, note_id: Uuid, note: &NewCaseNote, actor: &str) -> PortResult<CaseNote> {
        note.check()?;
        let sql = format!(
            "UPDATE case_notes SET date = $2, start_time = $3, end_time = $4, facilitator = $5, \
             class_topic = $6, location = $7, notes = $8, last_updated = now(), last_updated_by = $9 \
             WHERE id = $1 AND {LIVE} RETURNING {CASE_NOTE_COLUMNS}"
        );
        let record = sqlx::query_as::<_, CaseNoteRecord>(&sql)
            .bind(note_id)
            .bind(note.date)
            .bind(note.start_time)
            .bind(note.end_time)
            .bind(&note.facilitator)
            .bind(&note.class_topic)
            .bind(&note.location)
            .bind(&note.notes)
            .bind(actor)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Case note {} not found", note_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_case_note(&self, note_id: Uuid, actor: &str) -> PortResult<()> {
        self.soft_delete("case_notes", "Case note", note_id, actor).await
    }

    // --- Referrals ---

    async fn search_referrals(&self, query: &ReferralQuery) -> PortResult<Vec<Referral>> {
        let mut qb = live_rows("referrals", REFERRAL_COLUMNS);
        push_search(&mut qb, query);
        let records = qb
            .build_query_as::<ReferralRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get_referral(&self, referral_id: Uuid) -> PortResult<Referral> {
        let mut qb = live_rows("referrals", REFERRAL_COLUMNS);
        qb.push(" AND id = ").push_bind(referral_id);
        let record = qb
            .build_query_as::<ReferralRecord>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Referral {} not found", referral_id)))?;
        Ok(record.to_domain())
    }

    async fn create_referral(&self, referral: &NewReferral, actor: &str) -> PortResult<Referral> {
        referral.check()?;
        let sql = format!(
            "INSERT INTO referrals (id, full_name, agency, phone, email, last_updated, last_updated_by) \
             VALUES ($1, $2, $3, $4, $5, now(), $6) RETURNING {REFERRAL_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ReferralRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&referral.full_name)
            .bind(&referral.agency)
            .bind(&referral.phone)
            .bind(&referral.email)
            .bind(actor)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(record.to_domain())
    }

    async fn update_referral(&self, referral_id: Uuid, referral: &NewReferral, actor: &str) -> PortResult<Referral> {
        referral.check()?;
        let sql = format!(
            "UPDATE referrals SET full_name = $2, agency = $3, phone = $4, email = $5, \
             last_updated = now(), last_updated_by = $6 \
             WHERE id = $1 AND {LIVE} RETURNING {REFERRAL_COLUMNS}"
        );
        let record = sqlx::query_as::<_, ReferralRecord>(&sql)
            .bind(referral_id)
            .bind(&referral.full_name)
            .bind(&referral.agency)
            .bind(&referral.phone)
            .bind(&referral.email)
            .bind(actor)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?
            .ok_or_else(|| PortError::NotFound(format!("Referral {} not found", referral_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_referral(&self, referral_id: Uuid, actor: &str) -> PortResult<()> {
        self.soft_delete("referrals", "Referral", referral_id, actor).await
    }

    async fn list_referrals_for_client(&self, client_id: Uuid) -> PortResult<Vec<Referral>> {
        let mut qb = live_rows("referrals", REFERRAL_COLUMNS);
        qb.push(" AND id IN (SELECT referral_id FROM referral_clients WHERE client_id = ")
            .push_bind(client_id)
            .push(") ORDER BY agency");
        let records = qb
            .build_query_as::<ReferralRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_clients_for_referral(&self, referral_id: Uuid) -> PortResult<Vec<Client>> {
        let mut qb = live_rows("clients", CLIENT_COLUMNS);
        qb.push(" AND id IN (SELECT client_id FROM referral_clients WHERE referral_id = ")
            .push_bind(referral_id)
            .push(") ORDER BY last_name");
        let records = qb
            .build_query_as::<ClientRecord>()
            .fetch_all(&self.pool)
            .await
            .map_err(unexpected)?;
        clients_to_domain(records)
    }

    async fn link_clients(&self, referral_id: Uuid, client_ids: &[Uuid]) -> PortResult<()> {
        self.get_referral(referral_id).await?;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;
        for client_id in client_ids {
            let sql = format!(
                "INSERT INTO referral_clients (referral_id, client_id) \
                 SELECT $1, id FROM clients WHERE id = $2 AND {LIVE} \
                 ON CONFLICT DO NOTHING"
            );
            sqlx::query(&sql)
                .bind(referral_id)
                .bind(client_id)
                .execute(&mut *tx)
                .await
                .map_err(unexpected)?;
        }
        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn unlink_clients(&self, referral_id: Uuid, client_ids: &[Uuid]) -> PortResult<()> {
        self.get_referral(referral_id).await?;
        sqlx::query("DELETE FROM referral_clients WHERE referral_id = $1 AND client_id = ANY($2)")
            .bind(referral_id)
            .bind(client_ids)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebook_core::filter::{ClientField, FilterBuilder};

    #[test]
    fn reads_start_from_live_rows() {
        let qb = live_rows("referrals", "id");
        assert_eq!(qb.sql(), "SELECT id FROM referrals WHERE deleted = FALSE");
    }

    #[test]
    fn empty_search_only_orders() {
        let mut qb = live_rows("clients", "id");
        push_search(&mut qb, &ClientQuery::all());
        assert_eq!(
            qb.sql(),
            "SELECT id FROM clients WHERE deleted = FALSE ORDER BY last_name"
        );
    }

    #[test]
    fn predicates_render_with_bind_parameters() {
        let query = FilterBuilder::new(true)
            .text(ClientField::LastName, Some("Ad"))
            .flag(ClientField::Dcs, Some(true))
            .one_of(ClientField::PrimaryLocation, ["Delphi", "Muncie"])
            .build();
        let mut qb = live_rows("clients", "id");
        push_search(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT id FROM clients WHERE deleted = FALSE \
             AND strpos(last_name::text, $1) > 0 \
             AND dcs = $2 \
             AND (strpos(primary_location::text, $3) > 0 OR strpos(primary_location::text, $4) > 0) \
             ORDER BY last_name"
        );
    }

    #[test]
    fn exact_matches_and_empty_groups() {
        let query = ClientQuery {
            predicates: vec![
                Predicate::Equals(ClientField::CurrentStatus, FilterValue::Text("A".into())),
                Predicate::AnyOf(Vec::new()),
            ],
        };
        let mut qb = live_rows("clients", "id");
        push_search(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT id FROM clients WHERE deleted = FALSE AND current_status = $1 AND FALSE ORDER BY last_name"
        );
    }
}
