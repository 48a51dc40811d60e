//! Pending-set selection: which records are due right now.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{Duration, NaiveDateTime};

use sendloop_core::error::Result;
use sendloop_core::traits::RecordStore;
use sendloop_core::types::{MessageRecord, RecordStatus};

/// Initial watermark: row 1 is the header, so nothing is below it.
const WATERMARK_START: u32 = 1;

/// Reads the full record set and filters it down to the rows that should be
/// dispatched now. Holds the process-lifetime watermark: the highest row
/// position known to have been written back, used to suppress re-selection
/// within this run. The watermark advances only after a successful
/// writeback, never speculatively.
pub struct PendingSelector {
    store: Arc<dyn RecordStore>,
    watermark: AtomicU32,
    lead_time: Duration,
}

impl PendingSelector {
    pub fn new(store: Arc<dyn RecordStore>, lead_time_minutes: i64) -> Self {
        Self {
            store,
            watermark: AtomicU32::new(WATERMARK_START),
            lead_time: Duration::minutes(lead_time_minutes),
        }
    }

    /// Select due records in store (position) order. A record is due iff it
    /// is Pending, `now` has reached its trigger time (appointment minus
    /// lead time, boundary inclusive), and it sits above the watermark.
    /// Read failures propagate with no side effects.
    pub async fn select_due(&self, now: NaiveDateTime) -> Result<Vec<MessageRecord>> {
        let records = self.store.read_all().await?;
        let watermark = self.watermark();

        Ok(records
            .into_iter()
            .filter(|record| {
                record.status == RecordStatus::Pending
                    && record.position > watermark
                    && record
                        .scheduled_at()
                        .is_some_and(|at| now >= at - self.lead_time)
            })
            .collect())
    }

    pub fn watermark(&self) -> u32 {
        self.watermark.load(Ordering::Relaxed)
    }

    /// Monotonic advance: lower positions never move the watermark back.
    pub fn advance(&self, position: u32) {
        self.watermark.fetch_max(position, Ordering::Relaxed);
    }

    /// Manual resync: forget everything processed this run.
    pub fn reset(&self) {
        self.watermark.store(WATERMARK_START, Ordering::Relaxed);
    }
}
