//! In-memory fakes for the `RecordStore` and `MessageSender` seams.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sendloop_core::error::{Result, SendLoopError};
use sendloop_core::traits::{MessageSender, RecordStore};
use sendloop_core::types::{DeliveryLogEntry, DeliveryResult, MessageRecord, NewRecord, RecordStatus};
use sendloop_whatsapp::MessageLog;

/// In-memory record store with switchable read/write failures.
#[derive(Default)]
pub struct MockStore {
    records: Mutex<Vec<MessageRecord>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    pub reads: AtomicU32,
    pub updates: Mutex<Vec<(u32, RecordStatus, String)>>,
    read_delay_ms: AtomicU32,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockStore {
    pub fn push_record(&self, position: u32, time: &str, status: RecordStatus) {
        self.push_record_raw(position, "2026-03-14", time, status);
    }

    pub fn push_record_raw(&self, position: u32, date: &str, time: &str, status: RecordStatus) {
        self.records.lock().unwrap().push(MessageRecord {
            position,
            sender_name: "Ms. Rivera".into(),
            recipient_name: "Alex".into(),
            phone_number: "919876543210".into(),
            body_template: "Hi {{recipient_name}}, your appointment is at {{appointment_time}}.".into(),
            schedule_date: date.into(),
            schedule_time: time.into(),
            status,
            sent_at: String::new(),
        });
    }

    pub fn set_phone(&self, position: u32, phone: &str) {
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.iter_mut().find(|r| r.position == position) {
            r.phone_number = phone.to_string();
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_read_delay_ms(&self, ms: u32) {
        self.read_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn status_of(&self, position: u32) -> Option<RecordStatus> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.position == position)
            .map(|r| r.status)
    }
}

#[async_trait]
impl RecordStore for MockStore {
    async fn read_all(&self) -> Result<Vec<MessageRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SendLoopError::Store("sheet unavailable".into()));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn update_status(
        &self,
        position: u32,
        status: RecordStatus,
        sent_at: &str,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SendLoopError::Store("sheet unavailable".into()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((position, status, sent_at.to_string()));
        let mut records = self.records.lock().unwrap();
        if let Some(r) = records.iter_mut().find(|r| r.position == position) {
            r.status = status;
            r.sent_at = sent_at.to_string();
        }
        Ok(())
    }

    async fn append_rows(&self, _rows: &[NewRecord]) -> Result<()> {
        Ok(())
    }
}

/// Scriptable delivery client fake. Consumes scripted results in order;
/// once the script is exhausted every call succeeds. Appends one delivery
/// log entry per call when a log is attached, like the real client.
#[derive(Default)]
pub struct MockSender {
    script: Mutex<VecDeque<DeliveryResult>>,
    pub calls: AtomicU32,
    pub sent: Mutex<Vec<(String, String)>>,
    log: Option<Arc<MessageLog>>,
}

impl MockSender {
    pub fn with_log(log: Arc<MessageLog>) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    /// Queue `n` generic failures ahead of the default successes.
    pub fn script_failures(&self, n: usize) {
        let mut script = self.script.lock().unwrap();
        for i in 0..n {
            script.push_back(DeliveryResult::failed(format!("scripted failure {}", i + 1)));
        }
    }

    pub fn script_failure_messages(&self, messages: &[&str]) {
        let mut script = self.script.lock().unwrap();
        for m in messages {
            script.push_back(DeliveryResult::failed(*m));
        }
    }

    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, b)| b.clone())
    }
}

#[async_trait]
impl MessageSender for MockSender {
    async fn send(&self, phone_number: &str, body: &str) -> DeliveryResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((phone_number.to_string(), body.to_string()));

        let result = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| DeliveryResult::delivered("wamid.mock"));

        if let Some(log) = &self.log {
            log.append(DeliveryLogEntry::from_result(phone_number, &result));
        }
        result
    }

    async fn health(&self) -> Result<serde_json::Value> {
        Ok(serde_json::json!({ "id": "mock-gateway" }))
    }
}
