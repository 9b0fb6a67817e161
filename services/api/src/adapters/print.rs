//! services/api/src/adapters/print.rs
//!
//! Renders printable client documents to HTML with `tera`. The templates ship
//! inside the binary; a directory given in `TEMPLATES_PATH` may replace any of
//! them by file name.

use std::path::Path;

use bytes::Bytes;
use casebook_core::domain::{CaseNote, Client};
use casebook_core::ledger::ClientSummary;
use casebook_core::ports::{DocumentRenderer, PortError, PortResult, RenderedDocument};
use chrono::{NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tera::{Context, Tera};
use tracing::info;

const CLIENT_REPORT: &str = "client_report.html";
const CASE_NOTE_SHEET: &str = "case_note_sheet.html";

const EMBEDDED: [(&str, &str); 2] = [
    (CLIENT_REPORT, include_str!("../../templates/client_report.html")),
    (CASE_NOTE_SHEET, include_str!("../../templates/case_note_sheet.html")),
];

const HTML: &str = "text/html; charset=utf-8";

pub struct HtmlPrintRenderer {
    tera: Tera,
}

impl HtmlPrintRenderer {
    /// Loads templates, preferring files in `dir` over the embedded copies.
    pub fn new(dir: Option<&Path>) -> Result<Self, tera::Error> {
        let mut tera = match dir {
            Some(dir) => {
                let glob = format!("{}/*.html", dir.display());
                info!("Loading print templates from {}", glob);
                Tera::new(&glob)?
            }
            None => Tera::default(),
        };
        let missing: Vec<(&str, &str)> = EMBEDDED
            .iter()
            .copied()
            .filter(|(name, _)| !tera.get_template_names().any(|n| n == *name))
            .collect();
        tera.add_raw_templates(missing)?;
        Ok(Self { tera })
    }

    fn render(&self, template: &str, context: Value) -> PortResult<RenderedDocument> {
        let context = Context::from_value(context).map_err(|e| PortError::Unexpected(e.to_string()))?;
        let html = self
            .tera
            .render(template, &context)
            .map_err(|e| PortError::Unexpected(format!("failed to render {}: {}", template, e)))?;
        Ok(RenderedDocument {
            content_type: HTML,
            body: Bytes::from(html),
        })
    }
}

fn money(amount: Option<Decimal>) -> String {
    amount.map(|a| format!("{:.2}", a)).unwrap_or_default()
}

fn clock(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%-I:%M %p").to_string()).unwrap_or_default()
}

fn client_header(client: &Client) -> Value {
    json!({
        "name": client.display_name(),
        "status": client.status.label(),
        "location": client.primary_location,
        "phone": client.phone,
        "email": client.email,
        "date_enroll": client.date_enroll.map(|d| d.to_string()).unwrap_or_default(),
        "date_discharge": client.date_discharge.map(|d| d.to_string()).unwrap_or_default(),
        "cause_numbers": client.cause_numbers,
    })
}

impl DocumentRenderer for HtmlPrintRenderer {
    fn render_client_report(&self, summary: &ClientSummary) -> PortResult<RenderedDocument> {
        let ledger = &summary.ledger;
        let today = Utc::now().date_naive();
        let services: Vec<Value> = summary
            .services
            .iter()
            .map(|s| {
                json!({
                    "date": s.date.to_string(),
                    "description": s.description.trim(),
                    "fee": money(s.fee),
                    "discount": money(s.discount),
                    "payment": money(s.payment),
                    "credit": s.credit.map(|c| c.to_string()).unwrap_or_default(),
                    "notes": s.notes,
                    "recent": s.is_recent(today),
                })
            })
            .collect();
        let referrals: Vec<String> = summary.referrals.iter().map(|r| r.label()).collect();
        self.render(
            CLIENT_REPORT,
            json!({
                "generated_at": today.to_string(),
                "client": client_header(&summary.client),
                "ledger": {
                    "required_sessions": summary.client.required_sessions(),
                    "credits": ledger.credits,
                    "sessions_left": ledger.sessions_left,
                    "fees": money(Some(ledger.fees)),
                    "discounts": money(Some(ledger.discounts)),
                    "payments": money(Some(ledger.payments)),
                    "balance_remaining": money(Some(ledger.balance_remaining)),
                },
                "services": services,
                "referrals": referrals,
            }),
        )
    }

    fn render_case_note_sheet(&self, client: &Client, notes: &[CaseNote]) -> PortResult<RenderedDocument> {
        let notes: Vec<Value> = notes
            .iter()
            .map(|n| {
                json!({
                    "date": n.date.to_string(),
                    "start_time": clock(n.start_time),
                    "end_time": clock(n.end_time),
                    "facilitator": n.facilitator,
                    "class_topic": n.class_topic,
                    "location": n.location,
                    "notes": n.notes,
                })
            })
            .collect();
        self.render(
            CASE_NOTE_SHEET,
            json!({
                "generated_at": Utc::now().date_naive().to_string(),
                "client": client_header(client),
                "notes": notes,
            }),
        )
    }
}
