//! End-to-end checks of the staff and public routes against the in-memory store.

mod common;

use axum::http::{header, Method, Request, StatusCode};
use async_trait::async_trait;
use casebook_api::config::Config;
use casebook_core::permissions::{Permission, ADVANCED_SEARCH, ATTENDANCE_REPORT};
use casebook_core::ports::{DatabaseService, Mailer, OutgoingMail, PortError, PortResult};
use chrono::{Duration, Utc};
use common::{client_body, decimal, id_of, TestApp};
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|c| c["last_name"].as_str().unwrap().to_string())
        .collect()
}

fn link_path_from(body: &str) -> String {
    let start = body.find("/csr/").unwrap();
    body[start..].split_whitespace().next().unwrap().to_string()
}

#[tokio::test]
async fn signup_login_and_logout_drive_the_session_cookie() {
    let app = TestApp::new();
    let credentials = json!({"email": "kim@example.org", "password": "hunter22"});

    let response = app
        .router
        .clone()
        .oneshot(
            Request::post("/auth/signup")
                .header(header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(credentials.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    assert!(cookie.starts_with("session="));

    let profile = app.send(Method::GET, "/profile", Some(&cookie), None).await;
    assert_eq!(profile.status, StatusCode::OK);
    assert_eq!(profile.json()["email"], "kim@example.org");
    assert_eq!(profile.json()["permissions"], json!([]));

    let logout = app.send(Method::POST, "/auth/logout", Some(&cookie), None).await;
    assert!(logout.status.is_success());
    let after = app.send(Method::GET, "/profile", Some(&cookie), None).await;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);

    let wrong = app
        .send(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({"email": "kim@example.org", "password": "nope"})),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    let right = app
        .send(Method::POST, "/auth/login", None, Some(credentials))
        .await;
    assert_eq!(right.status, StatusCode::OK);
}

#[tokio::test]
async fn staff_routes_need_a_session() {
    let app = TestApp::new();
    let reply = app.send(Method::GET, "/clients", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);

    let health = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(health.status, StatusCode::OK);
}

#[tokio::test]
async fn invalid_client_reports_every_field() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let body = json!({"first_name": "", "last_name": "", "primary_location": "Atlantis"});

    let reply = app.send(Method::POST, "/clients", Some(&staff), Some(body)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = &reply.json()["errors"];
    for field in ["first_name", "last_name", "primary_location"] {
        assert!(errors.get(field).is_some(), "missing error for {field}: {errors}");
    }
}

#[tokio::test]
async fn case_note_ending_before_it_starts_is_refused() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let client = app.create_client(&staff, client_body("Ana", "Bell")).await;

    let note = json!({
        "date": "2024-03-05",
        "start_time": "19:00",
        "end_time": "18:00",
        "facilitator": "Lee",
        "class_topic": "Anger",
        "location": "Lafayette",
    });
    let uri = format!("/clients/{client}/notes");
    let reply = app.send(Method::POST, &uri, Some(&staff), Some(note)).await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(reply.json()["errors"].get("end_time").is_some());

    let notes = app.send(Method::GET, &uri, Some(&staff), None).await;
    assert_eq!(notes.json(), json!([]));
}

#[tokio::test]
async fn ledger_ignores_deleted_services() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let client = app.create_client(&staff, client_body("Ana", "Bell")).await;
    let today = Utc::now().date_naive().to_string();
    let uri = format!("/clients/{client}/services");

    let kept = json!({
        "date": today,
        "description": "Attended Class Session",
        "fee": "25",
        "payment": "10.00",
        "credit": 1,
    });
    let reply = app.send(Method::POST, &uri, Some(&staff), Some(kept)).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);

    let dropped = json!({"date": today, "description": "Bad Check Fee", "fee": "30"});
    let reply = app.send(Method::POST, &uri, Some(&staff), Some(dropped)).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
    let dropped_id = id_of(&reply.json());
    let reply = app
        .send(Method::DELETE, &format!("/services/{dropped_id}"), Some(&staff), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let summary = app
        .send(Method::GET, &format!("/clients/{client}"), Some(&staff), None)
        .await
        .json();
    let ledger = &summary["ledger"];
    assert_eq!(decimal(&ledger["fees"]), dec!(25));
    assert_eq!(decimal(&ledger["payments"]), dec!(10));
    assert_eq!(decimal(&ledger["balance_remaining"]), dec!(-15));
    assert_eq!(ledger["credits"], 1);
    assert_eq!(summary["services"].as_array().unwrap().len(), 1);

    let gone = app
        .send(Method::GET, &format!("/services/{dropped_id}"), Some(&staff), None)
        .await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_client_is_hidden_everywhere() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let client = app.create_client(&staff, client_body("Ana", "Bell")).await;
    app.create_client(&staff, client_body("Bo", "Ames")).await;

    let uri = format!("/clients/{client}");
    assert_eq!(app.send(Method::DELETE, &uri, Some(&staff), None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.send(Method::GET, &uri, Some(&staff), None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.send(Method::DELETE, &uri, Some(&staff), None).await.status, StatusCode::NOT_FOUND);

    let list = app.send(Method::GET, "/clients", Some(&staff), None).await.json();
    assert_eq!(names(&list), vec!["Ames"]);
}

#[tokio::test]
async fn mailed_secure_link_opens_the_summary_until_reissued() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let mut body = client_body("Ana", "Bell");
    body["email"] = json!("ana@example.org");
    let client = app.create_client(&staff, body).await;

    let uri = format!("/clients/{client}/email-link");
    let reply = app.send(Method::POST, &uri, Some(&staff), None).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text);
    assert_eq!(reply.json()["sent_to"], "ana@example.org");

    let sent = app.outbox.sent().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.org");
    let path = link_path_from(&sent[0].body);

    let open = app.send(Method::GET, &path, None, None).await;
    assert_eq!(open.status, StatusCode::OK);
    assert_eq!(open.json()["client"]["last_name"], "Bell");

    let printed = app.send(Method::GET, &format!("{path}/print"), None, None).await;
    assert_eq!(printed.status, StatusCode::OK);
    assert!(printed.content_type.starts_with("text/html"));

    let (base, _) = path.rsplit_once('/').unwrap();
    let wrong = app.send(Method::GET, &format!("{base}/not-it"), None, None).await;
    assert_eq!(wrong.status, StatusCode::NOT_FOUND);
    let garbage = app.send(Method::GET, "/csr/not-a-uuid/abc", None, None).await;
    assert_eq!(garbage.status, StatusCode::NOT_FOUND);

    app.send(Method::POST, &uri, Some(&staff), None).await;
    let stale = app.send(Method::GET, &path, None, None).await;
    assert_eq!(stale.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_secure_link_is_not_found() {
    let config = Config {
        secure_link_ttl: Duration::zero(),
        ..Config::in_memory()
    };
    let app = TestApp::with_config(config);
    let staff = app.staff(&[]).await;
    let mut body = client_body("Ana", "Bell");
    body["email"] = json!("ana@example.org");
    let client = app.create_client(&staff, body).await;

    app.send(Method::POST, &format!("/clients/{client}/email-link"), Some(&staff), None)
        .await;
    let path = link_path_from(&app.outbox.sent().await[0].body);
    let reply = app.send(Method::GET, &path, None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

struct DownMailer;

#[async_trait]
impl Mailer for DownMailer {
    async fn send(&self, _mail: OutgoingMail) -> PortResult<()> {
        Err(PortError::Unexpected("relay unreachable".into()))
    }
}

#[tokio::test]
async fn failed_link_mail_keeps_the_previous_link() {
    let app = TestApp::with_mailer(Arc::new(DownMailer));
    let staff = app.staff(&[]).await;
    let mut body = client_body("Ana", "Bell");
    body["email"] = json!("ana@example.org");
    let client = app.create_client(&staff, body).await;

    let issued = app
        .db
        .get_client(client)
        .await
        .unwrap()
        .secure_link
        .reissue(Utc::now(), Duration::hours(1));
    app.db.update_secure_link(client, &issued).await.unwrap();

    let reply = app
        .send(Method::POST, &format!("/clients/{client}/email-link"), Some(&staff), None)
        .await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);

    let stored = app.db.get_client(client).await.unwrap().secure_link;
    assert_eq!(stored, issued);
    let open = app.send(Method::GET, &issued.path(), None, None).await;
    assert_eq!(open.status, StatusCode::OK);
}

#[tokio::test]
async fn email_link_needs_an_address() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let client = app.create_client(&staff, client_body("Ana", "Bell")).await;

    let reply = app
        .send(Method::POST, &format!("/clients/{client}/email-link"), Some(&staff), None)
        .await;
    assert_eq!(reply.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(app.outbox.sent().await.is_empty());
}

#[tokio::test]
async fn advanced_search_needs_permissions_and_unions_choices() {
    let app = TestApp::new();
    let clerk = app.staff(&[Permission::ViewClient]).await;
    let reply = app.send(Method::POST, "/search", Some(&clerk), Some(json!({}))).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(reply.json()["missing_permissions"], json!(["view_referral"]));

    let staff = app.staff(ADVANCED_SEARCH).await;
    for (first, last, city) in [("Ana", "Bell", "Delphi"), ("Bo", "Ames", "Muncie"), ("Cy", "Cole", "Lafayette")] {
        let mut body = client_body(first, last);
        body["primary_location"] = json!(city);
        app.create_client(&staff, body).await;
    }

    let form = json!({"search_type": "Clients", "locations": ["Delphi", "Muncie"]});
    let reply = app.send(Method::POST, "/search", Some(&staff), Some(form)).await;
    assert_eq!(reply.status, StatusCode::OK, "{}", reply.text);
    assert_eq!(names(&reply.json()["clients"]), vec!["Ames", "Bell"]);
    assert!(reply.json().get("referrals").is_none());

    let bar = app
        .send(Method::POST, "/search", Some(&staff), Some(json!({"searchbar": "Cy Cole"})))
        .await;
    assert_eq!(names(&bar.json()["clients"]), vec!["Cole"]);

    let blank = app
        .send(
            Method::POST,
            "/search",
            Some(&staff),
            Some(json!({"searchbar": "", "search_type": "Clients", "last_name": "Bell"})),
        )
        .await;
    assert_eq!(blank.status, StatusCode::OK, "{}", blank.text);
    assert_eq!(names(&blank.json()["clients"]), vec!["Bell"]);

    let too_long = app
        .send(
            Method::POST,
            "/search",
            Some(&staff),
            Some(json!({"last_name": "x".repeat(33)})),
        )
        .await;
    assert_eq!(too_long.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(too_long.json()["errors"].get("last_name").is_some());

    let bad = app
        .send(Method::POST, "/search", Some(&staff), Some(json!({"locations": ["Atlantis"]})))
        .await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn referral_links_and_unlinks_clients() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let ana = app.create_client(&staff, client_body("Ana", "Bell")).await;
    let bo = app.create_client(&staff, client_body("Bo", "Ames")).await;
    let referral = app.create_referral(&staff, "County Probation", "dana@example.org").await;

    let uri = format!("/referrals/{referral}/clients");
    let reply = app
        .send(Method::POST, &uri, Some(&staff), Some(json!({"client_ids": [ana, bo]})))
        .await;
    assert!(reply.status.is_success(), "{}", reply.text);
    // Linking twice is harmless.
    app.send(Method::POST, &uri, Some(&staff), Some(json!({"client_id": ana})))
        .await;

    let detail = app
        .send(Method::GET, &format!("/referrals/{referral}"), Some(&staff), None)
        .await
        .json();
    assert_eq!(names(&detail["clients"]), vec!["Ames", "Bell"]);

    let summary = app
        .send(Method::GET, &format!("/clients/{ana}"), Some(&staff), None)
        .await
        .json();
    assert_eq!(summary["referrals"].as_array().unwrap().len(), 1);

    let reply = app
        .send(Method::DELETE, &format!("{uri}/{bo}"), Some(&staff), None)
        .await;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);
    let detail = app
        .send(Method::GET, &format!("/referrals/{referral}"), Some(&staff), None)
        .await
        .json();
    assert_eq!(names(&detail["clients"]), vec!["Bell"]);

    let notice = app
        .send(
            Method::POST,
            &format!("/clients/{ana}/referrals/{referral}/email-enrollment"),
            Some(&staff),
            None,
        )
        .await;
    assert_eq!(notice.status, StatusCode::OK);
    let sent = app.outbox.sent().await;
    assert_eq!(sent.last().unwrap().to, "dana@example.org");
    assert!(sent.last().unwrap().body.contains("Ana Bell"));
}

#[tokio::test]
async fn attendance_report_lists_active_clients_without_class() {
    let app = TestApp::new();
    let clerk = app.staff(&[]).await;
    let denied = app.send(Method::GET, "/reports/attendance", Some(&clerk), None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let staff = app.staff(ATTENDANCE_REPORT).await;
    let present = app.create_client(&staff, client_body("Ana", "Bell")).await;
    let absent = app.create_client(&staff, client_body("Bo", "Ames")).await;
    let lapsed = app.create_client(&staff, client_body("Cy", "Cole")).await;
    let mut pending = client_body("Di", "Dunn");
    pending["current_status"] = json!("P");
    app.create_client(&staff, pending).await;

    let today = Utc::now().date_naive();
    for (client, date) in [(present, today), (lapsed, today - Duration::days(30))] {
        let attended = json!({"date": date.to_string(), "description": "Attended Class Session"});
        let reply = app
            .send(
                Method::POST,
                &format!("/clients/{client}/services"),
                Some(&staff),
                Some(attended),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
    }
    let reply = app
        .send(
            Method::POST,
            &format!("/clients/{absent}/services"),
            Some(&staff),
            Some(json!({"date": today.to_string(), "description": "Absent From Class"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let report = app
        .send(Method::GET, "/reports/attendance", Some(&staff), None)
        .await
        .json();
    let missed: Vec<&str> = report["clients"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["display_name"].as_str().unwrap())
        .collect();
    assert_eq!(missed, vec!["Bo Ames", "Cy Cole"]);
}

#[tokio::test]
async fn case_note_sheet_respects_range_and_ids() {
    let app = TestApp::new();
    let staff = app.staff(&[]).await;
    let client = app.create_client(&staff, client_body("Ana", "Bell")).await;
    let uri = format!("/clients/{client}/notes");

    let mut ids = Vec::new();
    for (date, topic) in [("2024-03-05", "Empathy"), ("2024-03-12", "Boundaries"), ("2024-03-19", "Accountability")] {
        let note = json!({
            "date": date,
            "start_time": "18:00",
            "end_time": "19:30",
            "facilitator": "Lee",
            "class_topic": topic,
            "location": "Lafayette",
        });
        let reply = app.send(Method::POST, &uri, Some(&staff), Some(note)).await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.text);
        ids.push(id_of(&reply.json()));
    }

    let ranged = app
        .send(Method::GET, &format!("{uri}/print?from=2024-03-10"), Some(&staff), None)
        .await;
    assert_eq!(ranged.status, StatusCode::OK);
    assert!(ranged.content_type.starts_with("text/html"));
    assert!(!ranged.text.contains("Empathy"));
    assert!(ranged.text.contains("Boundaries"));
    assert!(ranged.text.contains("Accountability"));

    let picked = app
        .send(
            Method::GET,
            &format!("{uri}/print?ids={},{}", ids[0], ids[2]),
            Some(&staff),
            None,
        )
        .await;
    assert!(picked.text.contains("Empathy"));
    assert!(!picked.text.contains("Boundaries"));

    let bad = app
        .send(Method::GET, &format!("{uri}/print?ids=nope"), Some(&staff), None)
        .await;
    assert_eq!(bad.status, StatusCode::UNPROCESSABLE_ENTITY);
}
