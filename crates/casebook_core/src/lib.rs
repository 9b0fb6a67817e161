pub mod catalog;
pub mod domain;
pub mod filter;
pub mod ledger;
pub mod permissions;
pub mod ports;
pub mod secure_link;
pub mod validation;

pub use domain::{AuthSession, CaseNote, Client, ClientStatus, Referral, RecordState, Service, SessionQuota, User, UserCredentials};
pub use ledger::{ClientLedger, ClientSummary};
pub use ports::{DatabaseService, DocumentRenderer, Mailer, OutgoingMail, PortError, PortResult, RenderedDocument};
pub use validation::ValidationErrors;
