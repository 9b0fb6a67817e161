pub mod auth;
pub mod case_notes;
pub mod clients;
pub mod forms;
pub mod middleware;
pub mod referrals;
pub mod reports;
pub mod rest;
pub mod router;
pub mod search;
pub mod secure_link;
pub mod services;
pub mod state;

// Re-export what the binaries need to build and serve the application.
pub use middleware::require_auth;
pub use router::build_router;
pub use state::{AppState, StaffUser};
