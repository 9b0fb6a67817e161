//! services/api/src/adapters/mailer.rs
//!
//! Mail transports implementing the `Mailer` port. No SMTP relay is wired in;
//! `LogMailer` writes every message to the log and `Outbox` keeps them in
//! memory so callers can inspect what was sent.

use async_trait::async_trait;
use casebook_core::ports::{Mailer, OutgoingMail, PortResult};
use tokio::sync::Mutex;
use tracing::info;

/// Writes outgoing mail to the tracing log.
#[derive(Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> PortResult<()> {
        info!(
            from = %self.from,
            to = %mail.to,
            subject = %mail.subject,
            "Sending mail:\n{}",
            mail.body
        );
        Ok(())
    }
}

/// Keeps every message it is handed.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for Outbox {
    async fn send(&self, mail: OutgoingMail) -> PortResult<()> {
        info!(to = %mail.to, subject = %mail.subject, "Queued mail in outbox");
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn outbox_keeps_messages_in_order() {
        let outbox = Outbox::new();
        for subject in ["first", "second"] {
            outbox
                .send(OutgoingMail {
                    to: "client@example.org".into(),
                    subject: subject.into(),
                    body: String::new(),
                })
                .await
                .unwrap();
        }
        let subjects: Vec<String> = outbox.sent().await.into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects, ["first", "second"]);
    }
}
