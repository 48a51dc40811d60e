//! Data model shared across the workspace.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery state of a message record, as stored in the sheet.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RecordStatus {
    Pending,
    Sent,
    Failed,
}

impl RecordStatus {
    /// Parse the status cell. Blank cells mean Pending; anything
    /// unrecognized is treated as already handled so it is never re-sent.
    pub fn parse(cell: &str) -> Self {
        match cell.trim().to_lowercase().as_str() {
            "" | "pending" => Self::Pending,
            "sent" => Self::Sent,
            _ => Self::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Sent => "Sent",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the message queue sheet (columns A..H).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    /// 1-based sheet row number. Row 1 is the header, so data starts at 2.
    /// Assigned by the store; stable identity for writebacks.
    pub position: u32,
    /// Column A — who the reminder is from.
    pub sender_name: String,
    /// Column B — who the reminder is about.
    pub recipient_name: String,
    /// Column C — destination phone number, free-form.
    pub phone_number: String,
    /// Column D — message template with `{{key}}` placeholders.
    pub body_template: String,
    /// Column E — appointment date, `YYYY-MM-DD`.
    pub schedule_date: String,
    /// Column F — appointment time, `HH:MM`.
    pub schedule_time: String,
    /// Column G — delivery status.
    pub status: RecordStatus,
    /// Column H — writeback timestamp, empty until acted on.
    pub sent_at: String,
}

impl MessageRecord {
    /// Combine the date and time columns into the appointment instant,
    /// naive in the sheet's local timezone. `None` when either column is
    /// unparseable — such a record is never due.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.schedule_date.trim(), "%Y-%m-%d").ok()?;
        let time = self.schedule_time.trim();
        let time = NaiveTime::parse_from_str(time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M"))
            .ok()?;
        Some(date.and_time(time))
    }

    /// Named substitution data for template rendering.
    pub fn template_vars(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("sender_name", self.sender_name.as_str()),
            ("recipient_name", self.recipient_name.as_str()),
            ("appointment_date", self.schedule_date.as_str()),
            ("appointment_time", self.schedule_time.as_str()),
        ]
    }
}

/// A new row for the administrative import path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    pub sender_name: String,
    pub recipient_name: String,
    pub phone_number: String,
    pub body_template: String,
    pub schedule_date: String,
    pub schedule_time: String,
}

impl NewRecord {
    /// Render as a full A..H sheet row: new records start Pending with an
    /// empty sent_at.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.sender_name.clone(),
            self.recipient_name.clone(),
            self.phone_number.clone(),
            self.body_template.clone(),
            self.schedule_date.clone(),
            self.schedule_time.clone(),
            RecordStatus::Pending.as_str().to_string(),
            String::new(),
        ]
    }
}

/// Outcome of a single delivery attempt (or a whole retry sequence).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub success: bool,
    /// Gateway acknowledgment id, present iff success.
    pub message_id: Option<String>,
    /// Gateway or transport error detail, present iff failure.
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(message_id: impl Into<String>) -> Self {
        Self {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// One delivery attempt, as retained by the message log store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub timestamp: DateTime<Utc>,
    pub phone_number: String,
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryLogEntry {
    pub fn from_result(phone_number: &str, result: &DeliveryResult) -> Self {
        Self {
            timestamp: Utc::now(),
            phone_number: phone_number.to_string(),
            success: result.success,
            message_id: result.message_id.clone(),
            error: result.error.clone(),
        }
    }
}

/// Point-in-time view of the scheduler, returned by `status()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub running: bool,
    pub last_check_at: Option<DateTime<Utc>>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub sent_count: u64,
    pub failed_count: u64,
    pub check_interval_minutes: u64,
    pub sync_interval_minutes: u64,
}

/// Aggregate counts over the full sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetStats {
    pub total: usize,
    pub pending: usize,
    pub sent: usize,
    pub failed: usize,
}

impl SheetStats {
    pub fn from_records(records: &[MessageRecord]) -> Self {
        Self {
            total: records.len(),
            pending: records.iter().filter(|r| r.status == RecordStatus::Pending).count(),
            sent: records.iter().filter(|r| r.status == RecordStatus::Sent).count(),
            failed: records.iter().filter(|r| r.status == RecordStatus::Failed).count(),
        }
    }
}
