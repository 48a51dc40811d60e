//! # SendLoop Gateway
//!
//! The operational HTTP surface the administrative layer talks to:
//! scheduler status and triggers, the delivery log, gateway health, and
//! sheet statistics. Axum with CORS + request tracing.

pub mod routes;
pub mod server;

pub use server::{AppState, build_router, start};
