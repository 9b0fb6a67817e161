//! Shared harness for the router tests: the real router over the in-memory
//! adapter, with mail captured in an outbox.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use casebook_api::adapters::{HtmlPrintRenderer, MemoryAdapter, Outbox};
use casebook_api::config::Config;
use casebook_api::web::{build_router, AppState};
use casebook_core::permissions::Permission;
use casebook_core::ports::{DatabaseService, Mailer};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

pub struct TestApp {
    pub router: Router,
    pub db: Arc<MemoryAdapter>,
    pub outbox: Arc<Outbox>,
}

pub struct Reply {
    pub status: StatusCode,
    pub content_type: String,
    pub text: String,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(Config::in_memory())
    }

    pub fn with_config(config: Config) -> Self {
        let outbox = Arc::new(Outbox::new());
        Self::assemble(config, outbox.clone(), outbox)
    }

    /// Routes mail through `mailer`; the outbox stays empty.
    pub fn with_mailer(mailer: Arc<dyn Mailer>) -> Self {
        Self::assemble(Config::in_memory(), Arc::new(Outbox::new()), mailer)
    }

    fn assemble(config: Config, outbox: Arc<Outbox>, mailer: Arc<dyn Mailer>) -> Self {
        let db = Arc::new(MemoryAdapter::new());
        let state = Arc::new(AppState {
            db: db.clone(),
            config: Arc::new(config),
            mailer,
            renderer: Arc::new(HtmlPrintRenderer::new(None).unwrap()),
        });
        Self {
            router: build_router(state).unwrap(),
            db,
            outbox,
        }
    }

    pub async fn send(&self, method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Reply {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        Reply {
            status,
            content_type,
            text: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// A signed-in staff member holding `permissions`. Returns the cookie header.
    pub async fn staff(&self, permissions: &[Permission]) -> String {
        let email = format!("{}@example.org", Uuid::new_v4());
        let user = self.db.create_user_with_email(&email, "unused").await.unwrap();
        self.db.grant_permissions(user.user_id, permissions).await.unwrap();
        let session = Uuid::new_v4().to_string();
        self.db
            .create_auth_session(&session, user.user_id, Utc::now() + Duration::days(1))
            .await
            .unwrap();
        format!("session={session}")
    }

    pub async fn create_client(&self, cookie: &str, body: Value) -> Uuid {
        let reply = self.send(Method::POST, "/clients", Some(cookie), Some(body)).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
        id_of(&reply.json())
    }

    pub async fn create_referral(&self, cookie: &str, agency: &str, email: &str) -> Uuid {
        let body = json!({"full_name": "Dana Cole", "agency": agency, "email": email});
        let reply = self.send(Method::POST, "/referrals", Some(cookie), Some(body)).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
        id_of(&reply.json())
    }
}

pub fn client_body(first: &str, last: &str) -> Value {
    json!({
        "first_name": first,
        "last_name": last,
        "primary_location": "Lafayette",
        "current_status": "A",
    })
}

pub fn id_of(value: &Value) -> Uuid {
    Uuid::parse_str(value["id"].as_str().unwrap()).unwrap()
}

pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}
