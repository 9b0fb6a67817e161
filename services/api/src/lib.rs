//! services/api/src/lib.rs
//!
//! The casebook HTTP service: configuration, storage and mail adapters, and
//! the axum web layer. The `api` binary wires these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
