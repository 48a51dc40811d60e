//! # SendLoop WhatsApp
//!
//! Delivery side of the pipeline: recipient/phone normalization, flat
//! `{{key}}` template rendering, the WhatsApp Business Cloud API client,
//! and the bounded in-memory delivery log.

pub mod client;
pub mod format;
pub mod log;

pub use client::WhatsAppClient;
pub use format::{is_valid_phone, normalize_phone, render_template};
pub use log::MessageLog;
