//! Trait seams between the scheduler and its external collaborators.
//!
//! The scheduler is written entirely against these traits so the dispatch
//! logic can be exercised with in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{DeliveryResult, MessageRecord, NewRecord, RecordStatus};

/// The external record store: an ordered table of message rows.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read the full record set in position order. No caching.
    async fn read_all(&self) -> Result<Vec<MessageRecord>>;

    /// Write exactly the status and sent_at columns of one row.
    async fn update_status(
        &self,
        position: u32,
        status: RecordStatus,
        sent_at: &str,
    ) -> Result<()>;

    /// Append new Pending rows (administrative import path).
    async fn append_rows(&self, rows: &[NewRecord]) -> Result<()>;
}

/// The external messaging gateway: one delivery attempt per call.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Attempt one delivery. Never errors upward — transport failures,
    /// timeouts and non-success responses all come back as a failed
    /// `DeliveryResult`.
    async fn send(&self, phone_number: &str, body: &str) -> DeliveryResult;

    /// Probe gateway reachability; returns the gateway's identity payload.
    async fn health(&self) -> Result<serde_json::Value>;
}
