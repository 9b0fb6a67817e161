//! crates/casebook_core/src/ledger.rs
//!
//! Per-client aggregates derived from the client's services. Everything here
//! is recomputed from the records handed in; soft-deleted services never count.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{Client, Referral, Service};

/// Service descriptions that count as having been in class.
pub const ATTENDANCE_MARKERS: [&str; 2] = ["Attended Class", "Deferred"];

/// Running totals for one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientLedger {
    pub credits: i32,
    pub payments: Decimal,
    pub fees: Decimal,
    pub discounts: Decimal,
    pub sessions_left: i32,
    pub balance_remaining: Decimal,
}

impl ClientLedger {
    pub fn compute(client: &Client, services: &[Service]) -> Self {
        let mut credits = 0;
        let mut payments = Decimal::ZERO;
        let mut fees = Decimal::ZERO;
        let mut discounts = Decimal::ZERO;

        for service in live_services_of(client, services) {
            credits += service.credit.unwrap_or(0);
            payments += service.payment.unwrap_or(Decimal::ZERO);
            fees += service.fee.unwrap_or(Decimal::ZERO);
            discounts += service.discount.unwrap_or(Decimal::ZERO);
        }

        Self {
            credits,
            payments,
            fees,
            discounts,
            sessions_left: client.required_sessions() - credits,
            balance_remaining: (discounts + payments) - fees,
        }
    }
}

/// True if any live service of `client` dated in `[start, end]` shows attendance.
pub fn attended_class(client: &Client, services: &[Service], start: NaiveDate, end: NaiveDate) -> bool {
    live_services_of(client, services)
        .filter(|s| start <= s.date && s.date <= end)
        .any(|s| {
            ATTENDANCE_MARKERS
                .iter()
                .any(|marker| s.description.contains(marker))
        })
}

fn live_services_of<'a>(
    client: &'a Client,
    services: &'a [Service],
) -> impl Iterator<Item = &'a Service> + 'a {
    services
        .iter()
        .filter(move |s| s.client_id == client.id && s.state.is_live())
}

/// Everything a client status report shows.
#[derive(Debug, Clone, Serialize)]
pub struct ClientSummary {
    pub client: Client,
    pub display_name: String,
    pub ledger: ClientLedger,
    /// Live services, newest first.
    pub services: Vec<Service>,
    pub referrals: Vec<Referral>,
}

impl ClientSummary {
    pub fn build(client: Client, services: Vec<Service>, referrals: Vec<Referral>) -> Self {
        let ledger = ClientLedger::compute(&client, &services);
        let mut services: Vec<Service> = services
            .into_iter()
            .filter(|s| s.client_id == client.id && s.state.is_live())
            .collect();
        services.sort_by(|a, b| b.date.cmp(&a.date));
        let referrals = referrals.into_iter().filter(|r| r.state.is_live()).collect();
        Self {
            display_name: client.display_name(),
            client,
            ledger,
            services,
            referrals,
        }
    }
}
