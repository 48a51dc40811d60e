//! Per-record dispatch: validate, render, send with retry, write back.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{NaiveDateTime, SecondsFormat, Utc};

use sendloop_core::error::Result;
use sendloop_core::traits::{MessageSender, RecordStore};
use sendloop_core::types::{MessageRecord, RecordStatus};
use sendloop_whatsapp::format::{is_valid_phone, render_template};

use crate::retry::{BackoffPolicy, send_with_retry};
use crate::selector::PendingSelector;

/// Monotonic delivery counters, shared between the dispatch loop and the
/// engine's status snapshot.
#[derive(Default)]
pub struct DispatchStats {
    sent: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Administrative zeroing; not part of the normal flow.
    pub fn reset(&self) {
        self.sent.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }
}

/// Runs one check pass: selects due records and processes each one in
/// position order, sequentially. Fault-isolated per record — nothing a
/// single record does can abort the pass.
pub struct Dispatcher {
    store: Arc<dyn RecordStore>,
    sender: Arc<dyn MessageSender>,
    selector: Arc<PendingSelector>,
    stats: Arc<DispatchStats>,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sender: Arc<dyn MessageSender>,
        selector: Arc<PendingSelector>,
        stats: Arc<DispatchStats>,
        max_attempts: u32,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            store,
            sender,
            selector,
            stats,
            max_attempts,
            backoff,
        }
    }

    /// One check pass. Returns the number of records processed; a store
    /// read failure aborts the pass before any side effects.
    pub async fn run_pass(&self, now: NaiveDateTime) -> Result<usize> {
        let due = self.selector.select_due(now).await?;
        if due.is_empty() {
            tracing::debug!("✅ No messages to send at this time");
            return Ok(0);
        }

        tracing::info!("📤 Found {} message(s) to send", due.len());
        let count = due.len();
        for record in &due {
            self.process(record).await;
        }
        Ok(count)
    }

    /// Process one due record through validation, rendering, delivery and
    /// writeback. Never propagates an error upward.
    pub async fn process(&self, record: &MessageRecord) {
        tracing::info!(
            "📨 Processing row {} for {} ({})",
            record.position,
            record.recipient_name,
            record.phone_number
        );

        if !is_valid_phone(&record.phone_number) {
            tracing::warn!(
                "❌ Invalid phone number on row {}: {:?}",
                record.position,
                record.phone_number
            );
            self.write_outcome(record.position, RecordStatus::Failed).await;
            return;
        }

        let message = render_template(&record.body_template, &record.template_vars());
        let result = send_with_retry(
            self.sender.as_ref(),
            &record.phone_number,
            &message,
            self.max_attempts,
            self.backoff,
        )
        .await;

        if result.success {
            tracing::info!("✅ Message sent to {}", record.phone_number);
            self.write_outcome(record.position, RecordStatus::Sent).await;
        } else {
            tracing::warn!(
                "❌ Delivery to {} exhausted after {} attempt(s): {}",
                record.phone_number,
                self.max_attempts,
                result.error.as_deref().unwrap_or("unknown")
            );
            self.write_outcome(record.position, RecordStatus::Failed).await;
        }
    }

    /// Persist the outcome. Counters and the watermark move only after the
    /// writeback succeeds; on a writeback failure the row keeps its stale
    /// store status and will be reselected on a later pass.
    async fn write_outcome(&self, position: u32, status: RecordStatus) {
        let sent_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        match self.store.update_status(position, status, &sent_at).await {
            Ok(()) => {
                self.selector.advance(position);
                match status {
                    RecordStatus::Sent => self.stats.record_sent(),
                    _ => self.stats.record_failed(),
                }
            }
            Err(e) => {
                tracing::error!(
                    "❌ Writeback failed for row {}: {} — row stays eligible for the next pass",
                    position,
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSender, MockStore};
    use chrono::NaiveDate;
    use std::sync::atomic::Ordering as AtomicOrdering;

    struct Harness {
        store: Arc<MockStore>,
        sender: Arc<MockSender>,
        selector: Arc<PendingSelector>,
        stats: Arc<DispatchStats>,
        dispatcher: Dispatcher,
    }

    fn harness() -> Harness {
        let store = Arc::new(MockStore::default());
        let sender = Arc::new(MockSender::default());
        let selector = Arc::new(PendingSelector::new(store.clone(), 15));
        let stats = Arc::new(DispatchStats::default());
        let dispatcher = Dispatcher::new(
            store.clone(),
            sender.clone(),
            selector.clone(),
            stats.clone(),
            3,
            BackoffPolicy::default(),
        );
        Harness {
            store,
            sender,
            selector,
            stats,
            dispatcher,
        }
    }

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_dispatch_writes_back_and_counts() {
        let h = harness();
        h.store.push_record(2, "09:00", RecordStatus::Pending);

        let processed = h.dispatcher.run_pass(noon()).await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(h.store.status_of(2), Some(RecordStatus::Sent));
        assert_eq!(h.stats.sent(), 1);
        assert_eq!(h.stats.failed(), 0);
        assert_eq!(h.selector.watermark(), 2);

        let updates = h.store.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].1, RecordStatus::Sent);
        assert!(!updates[0].2.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_phone_fails_without_gateway_call() {
        let h = harness();
        h.store.push_record(2, "09:00", RecordStatus::Pending);
        h.store.set_phone(2, "12345"); // 5 digits — under the minimum

        h.dispatcher.run_pass(noon()).await.unwrap();

        assert_eq!(h.sender.calls.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(h.store.status_of(2), Some(RecordStatus::Failed));
        assert_eq!(h.stats.failed(), 1);
        assert_eq!(h.selector.watermark(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_template_is_rendered_before_sending() {
        let h = harness();
        h.store.push_record(2, "09:30", RecordStatus::Pending);

        h.dispatcher.run_pass(noon()).await.unwrap();

        assert_eq!(
            h.sender.last_body().unwrap(),
            "Hi Alex, your appointment is at 09:30."
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_failure_marks_failed_and_advances_watermark() {
        let h = harness();
        h.store.push_record(2, "09:00", RecordStatus::Pending);
        h.sender.script_failures(5); // more than max_attempts

        h.dispatcher.run_pass(noon()).await.unwrap();

        assert_eq!(h.sender.calls.load(AtomicOrdering::SeqCst), 3);
        assert_eq!(h.store.status_of(2), Some(RecordStatus::Failed));
        assert_eq!(h.stats.failed(), 1);
        // Watermark still advances so the permanently-failing row is not
        // reprocessed within this run.
        assert_eq!(h.selector.watermark(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_writeback_failure_leaves_row_eligible() {
        let h = harness();
        h.store.push_record(2, "09:00", RecordStatus::Pending);
        h.store.fail_writes(true);

        h.dispatcher.run_pass(noon()).await.unwrap();

        // No counter movement, no watermark movement, row still Pending.
        assert_eq!(h.stats.sent(), 0);
        assert_eq!(h.stats.failed(), 0);
        assert_eq!(h.selector.watermark(), 1);
        assert_eq!(h.store.status_of(2), Some(RecordStatus::Pending));

        // Store recovers: the same row is selected and finished next pass.
        h.store.fail_writes(false);
        h.dispatcher.run_pass(noon()).await.unwrap();
        assert_eq!(h.store.status_of(2), Some(RecordStatus::Sent));
        assert_eq!(h.stats.sent(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_bad_record_does_not_abort_the_pass() {
        let h = harness();
        h.store.push_record(2, "09:00", RecordStatus::Pending);
        h.store.set_phone(2, "bogus");
        h.store.push_record(3, "09:00", RecordStatus::Pending);

        let processed = h.dispatcher.run_pass(noon()).await.unwrap();

        assert_eq!(processed, 2);
        assert_eq!(h.store.status_of(2), Some(RecordStatus::Failed));
        assert_eq!(h.store.status_of(3), Some(RecordStatus::Sent));
        assert_eq!(h.stats.sent(), 1);
        assert_eq!(h.stats.failed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watermark_never_decreases_across_processing() {
        let h = harness();
        h.selector.advance(9);
        h.store.push_record(2, "09:00", RecordStatus::Pending);

        // Row 2 sits below the watermark and is not selected.
        let processed = h.dispatcher.run_pass(noon()).await.unwrap();
        assert_eq!(processed, 0);
        assert_eq!(h.selector.watermark(), 9);

        // Even direct processing of a lower row cannot move it back.
        let record = MessageRecord {
            position: 4,
            sender_name: "A".into(),
            recipient_name: "B".into(),
            phone_number: "919876543210".into(),
            body_template: "hi".into(),
            schedule_date: "2026-03-14".into(),
            schedule_time: "09:00".into(),
            status: RecordStatus::Pending,
            sent_at: String::new(),
        };
        h.dispatcher.process(&record).await;
        assert_eq!(h.selector.watermark(), 9);
    }
}
