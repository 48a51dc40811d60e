//! Scheduler engine — owns the two timers and the pass gate.
//!
//! Two independent tokio intervals: a frequent check timer that selects and
//! dispatches due records, and a less-frequent sync timer that re-reads the
//! sheet as an availability probe. A single-permit async mutex guards the
//! check pass: a timer tick that finds a pass in flight is coalesced, a
//! manual trigger queues behind it. Duplicate concurrent sends for one
//! record are therefore impossible.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, Notify};

use sendloop_core::config::SchedulerConfig;
use sendloop_core::traits::{MessageSender, RecordStore};
use sendloop_core::types::SchedulerSnapshot;

use crate::dispatch::{DispatchStats, Dispatcher};
use crate::retry::BackoffPolicy;
use crate::selector::PendingSelector;

#[derive(Default)]
struct Timestamps {
    last_check: Option<DateTime<Utc>>,
    last_sync: Option<DateTime<Utc>>,
}

/// The scheduler driver. Stopped ↔ Running; all other state is
/// process-lifetime only.
pub struct SchedulerEngine {
    dispatcher: Dispatcher,
    selector: Arc<PendingSelector>,
    store: Arc<dyn RecordStore>,
    stats: Arc<DispatchStats>,
    check_interval_minutes: u64,
    sync_interval_minutes: u64,
    running: AtomicBool,
    /// Single-permit gate serializing check passes.
    pass_gate: Mutex<()>,
    stop_signal: StdMutex<Option<Arc<Notify>>>,
    timestamps: StdMutex<Timestamps>,
}

impl SchedulerEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        sender: Arc<dyn MessageSender>,
        config: &SchedulerConfig,
    ) -> Self {
        let selector = Arc::new(PendingSelector::new(
            store.clone(),
            config.lead_time_minutes,
        ));
        let stats = Arc::new(DispatchStats::default());
        let backoff = BackoffPolicy::from_settings(&config.backoff_strategy, config.backoff_base_ms);
        let dispatcher = Dispatcher::new(
            store.clone(),
            sender,
            selector.clone(),
            stats.clone(),
            config.max_attempts,
            backoff,
        );

        Self {
            dispatcher,
            selector,
            store,
            stats,
            check_interval_minutes: config.check_interval_minutes.max(1),
            sync_interval_minutes: config.sync_interval_minutes.max(1),
            running: AtomicBool::new(false),
            pass_gate: Mutex::new(()),
            stop_signal: StdMutex::new(None),
            timestamps: StdMutex::new(Timestamps::default()),
        }
    }

    /// Arm both timers. No-op when already Running. The check interval's
    /// first tick fires immediately, so one pass runs right away instead of
    /// waiting a full period; the sync timer waits out its first period.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!("⚠️ Scheduler is already running");
            return;
        }

        tracing::info!(
            "🚀 Scheduler started (check: every {}min, sync: every {}min)",
            self.check_interval_minutes,
            self.sync_interval_minutes
        );

        let notify = Arc::new(Notify::new());
        *self.stop_signal.lock().unwrap() = Some(notify.clone());

        let engine = self.clone();
        let stop = notify.clone();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(engine.check_interval_minutes * 60));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !engine.running.load(Ordering::SeqCst) {
                            break;
                        }
                        engine.run_check(true).await;
                        if !engine.running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    _ = stop.notified() => break,
                }
            }
        });

        let engine = self.clone();
        let stop = notify;
        tokio::spawn(async move {
            let period = Duration::from_secs(engine.sync_interval_minutes * 60);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !engine.running.load(Ordering::SeqCst) {
                            break;
                        }
                        engine.run_sync().await;
                        if !engine.running.load(Ordering::SeqCst) {
                            break;
                        }
                    }
                    _ = stop.notified() => break,
                }
            }
        });
    }

    /// Cancel future timer firings. An in-flight check pass runs to
    /// completion. No-op when already Stopped.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            tracing::warn!("⚠️ Scheduler is not running");
            return;
        }
        if let Some(notify) = self.stop_signal.lock().unwrap().take() {
            notify.notify_waiters();
        }
        tracing::info!("🛑 Scheduler stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// One check pass behind the single-permit gate. Timer ticks pass
    /// `coalesce = true`: if a pass is already in flight the tick is
    /// dropped. Manual triggers queue for the permit instead.
    async fn run_check(&self, coalesce: bool) {
        let _guard = if coalesce {
            match self.pass_gate.try_lock() {
                Ok(guard) => guard,
                Err(_) => {
                    tracing::debug!("⏭️ Check pass already in flight — tick coalesced");
                    return;
                }
            }
        } else {
            self.pass_gate.lock().await
        };

        self.timestamps.lock().unwrap().last_check = Some(Utc::now());
        tracing::debug!("🔍 Checking for messages to send...");

        // The sheet's schedule columns are naive local time.
        let now = chrono::Local::now().naive_local();
        match self.dispatcher.run_pass(now).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("✅ Processed {} message(s)", n),
            Err(e) => tracing::warn!("❌ Check pass aborted: {e}"),
        }
    }

    /// Full sheet re-read. Availability probe only — no watermark or
    /// status side effects.
    async fn run_sync(&self) {
        self.timestamps.lock().unwrap().last_sync = Some(Utc::now());
        tracing::debug!("🔄 Syncing sheet data...");
        match self.store.read_all().await {
            Ok(records) => tracing::info!("✅ Sheet sync completed ({} records)", records.len()),
            Err(e) => tracing::warn!("❌ Sheet sync failed: {e}"),
        }
    }

    /// Manually run one check pass, independent of timer state. Safe while
    /// Stopped. Returns the trigger timestamp.
    pub async fn trigger_check(&self) -> DateTime<Utc> {
        let triggered_at = Utc::now();
        tracing::info!("🔄 Manual trigger: checking messages...");
        self.run_check(false).await;
        triggered_at
    }

    /// Manually run one sync probe.
    pub async fn trigger_sync(&self) {
        tracing::info!("🔄 Manual trigger: syncing sheet...");
        self.run_sync().await;
    }

    /// Manual resync: reset the watermark to its initial value, then sync.
    /// Rows already marked Sent/Failed in the sheet stay excluded by
    /// status; rows whose writeback was lost become eligible again.
    pub async fn resync(&self) {
        self.selector.reset();
        tracing::info!("🔄 Watermark reset");
        self.run_sync().await;
    }

    /// Point-in-time state snapshot.
    pub fn status(&self) -> SchedulerSnapshot {
        let timestamps = self.timestamps.lock().unwrap();
        SchedulerSnapshot {
            running: self.is_running(),
            last_check_at: timestamps.last_check,
            last_sync_at: timestamps.last_sync,
            sent_count: self.stats.sent(),
            failed_count: self.stats.failed(),
            check_interval_minutes: self.check_interval_minutes,
            sync_interval_minutes: self.sync_interval_minutes,
        }
    }

    /// Zero the delivery counters (administrative action).
    pub fn reset_stats(&self) {
        self.stats.reset();
        tracing::info!("🔄 Statistics reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockSender, MockStore};
    use sendloop_core::types::RecordStatus;
    use std::sync::atomic::Ordering as AtomicOrdering;

    fn engine_with(store: Arc<MockStore>, sender: Arc<MockSender>) -> Arc<SchedulerEngine> {
        Arc::new(SchedulerEngine::new(
            store,
            sender,
            &SchedulerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_status_before_start() {
        let engine = engine_with(
            Arc::new(MockStore::default()),
            Arc::new(MockSender::default()),
        );
        let status = engine.status();
        assert!(!status.running);
        assert_eq!(status.sent_count, 0);
        assert_eq!(status.failed_count, 0);
        assert!(status.last_check_at.is_none());
        assert!(status.last_sync_at.is_none());
        assert_eq!(status.check_interval_minutes, 1);
        assert_eq!(status.sync_interval_minutes, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_check_with_zero_due_records() {
        let store = Arc::new(MockStore::default());
        let sender = Arc::new(MockSender::default());
        let engine = engine_with(store.clone(), sender.clone());

        engine.trigger_check().await;

        let status = engine.status();
        assert_eq!(status.sent_count, 0);
        assert_eq!(status.failed_count, 0);
        assert!(status.last_check_at.is_some());
        assert_eq!(sender.calls.load(AtomicOrdering::SeqCst), 0);
        assert_eq!(store.reads.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_check_while_stopped_dispatches() {
        let store = Arc::new(MockStore::default());
        // Due for any plausible wall clock during a test run.
        store.push_record_raw(2, "2020-01-01", "00:00", RecordStatus::Pending);
        let sender = Arc::new(MockSender::default());
        let engine = engine_with(store.clone(), sender.clone());

        engine.trigger_check().await;

        assert!(!engine.is_running());
        assert_eq!(engine.status().sent_count, 1);
        assert_eq!(store.status_of(2), Some(RecordStatus::Sent));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_passes_are_serialized() {
        let store = Arc::new(MockStore::default());
        store.set_read_delay_ms(200);
        let sender = Arc::new(MockSender::default());
        let engine = engine_with(store.clone(), sender);

        tokio::join!(engine.trigger_check(), engine.trigger_check());

        // Both manual triggers ran (queued), but never concurrently.
        assert_eq!(store.reads.load(AtomicOrdering::SeqCst), 2);
        assert_eq!(store.max_in_flight.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_stop_disarms() {
        let store = Arc::new(MockStore::default());
        let engine = engine_with(store.clone(), Arc::new(MockSender::default()));

        engine.start();
        assert!(engine.is_running());
        engine.start(); // no-op
        assert!(engine.is_running());

        // Let the immediate first tick run its pass.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.reads.load(AtomicOrdering::SeqCst) >= 1);

        engine.stop();
        assert!(!engine.is_running());
        engine.stop(); // no-op
        assert!(!engine.is_running());

        // No further ticks fire after stop.
        let reads_at_stop = store.reads.load(AtomicOrdering::SeqCst);
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(store.reads.load(AtomicOrdering::SeqCst), reads_at_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_timer_fires_immediately_then_periodically() {
        let store = Arc::new(MockStore::default());
        let engine = engine_with(store.clone(), Arc::new(MockSender::default()));

        engine.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let first = store.reads.load(AtomicOrdering::SeqCst);
        assert!(first >= 1, "first pass should not wait for the interval");

        // Two more check periods (1min each) plus one sync period (5min).
        tokio::time::sleep(Duration::from_secs(310)).await;
        assert!(store.reads.load(AtomicOrdering::SeqCst) > first);

        let status = engine.status();
        assert!(status.last_check_at.is_some());
        assert!(status.last_sync_at.is_some());
        engine.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stats_zeroes_counters() {
        let store = Arc::new(MockStore::default());
        store.push_record_raw(2, "2020-01-01", "00:00", RecordStatus::Pending);
        let engine = engine_with(store, Arc::new(MockSender::default()));

        engine.trigger_check().await;
        assert_eq!(engine.status().sent_count, 1);

        engine.reset_stats();
        let status = engine.status();
        assert_eq!(status.sent_count, 0);
        assert_eq!(status.failed_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resync_resets_watermark_and_probes() {
        let store = Arc::new(MockStore::default());
        store.push_record_raw(2, "2020-01-01", "00:00", RecordStatus::Pending);
        let sender = Arc::new(MockSender::default());
        let engine = engine_with(store.clone(), sender.clone());

        engine.trigger_check().await;
        assert_eq!(store.status_of(2), Some(RecordStatus::Sent));

        engine.resync().await;
        assert!(engine.status().last_sync_at.is_some());

        // The processed row is excluded by status, not the watermark, so a
        // resync does not resend it.
        engine.trigger_check().await;
        assert_eq!(sender.calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_outage_does_not_stop_the_scheduler() {
        let store = Arc::new(MockStore::default());
        store.fail_reads(true);
        let engine = engine_with(store.clone(), Arc::new(MockSender::default()));

        engine.start();
        tokio::time::sleep(Duration::from_secs(130)).await;

        // Passes failed but the driver is still Running and still ticking.
        assert!(engine.is_running());
        assert!(store.reads.load(AtomicOrdering::SeqCst) >= 2);
        engine.stop();
    }
}
