//! # SendLoop Sheets
//!
//! Google Sheets (REST v4) implementation of the `RecordStore` trait. The
//! sheet is the message queue: columns A..H hold sender, recipient, phone,
//! template, date, time, status, and sent_at. Row 1 is the header.

use async_trait::async_trait;
use serde::Deserialize;

use sendloop_core::config::SheetsConfig;
use sendloop_core::error::{Result, SendLoopError};
use sendloop_core::traits::RecordStore;
use sendloop_core::types::{MessageRecord, NewRecord, RecordStatus};

/// Row number of the first data row (row 1 is the header).
const FIRST_DATA_ROW: u32 = 2;

/// `spreadsheets.values` response body.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Google Sheets record store.
pub struct GoogleSheetsStore {
    config: SheetsConfig,
    client: reqwest::Client,
}

impl GoogleSheetsStore {
    pub fn new(config: SheetsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/{}/values/{}!{}",
            self.config.api_url, self.config.spreadsheet_id, self.config.tab, range
        )
    }

    fn map_status_error(status: reqwest::StatusCode, body: String) -> SendLoopError {
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            SendLoopError::AuthFailed(format!("Sheets API error {status}: {body}"))
        } else {
            SendLoopError::Store(format!("Sheets API error {status}: {body}"))
        }
    }

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(Self::map_status_error(status, body))
        }
    }
}

/// Map raw cell rows to records, skipping the header row. Short rows are
/// padded with empty cells; positions are 1-based sheet row numbers.
pub fn records_from_values(values: &[Vec<String>]) -> Vec<MessageRecord> {
    values
        .iter()
        .skip(1)
        .enumerate()
        .map(|(i, row)| record_from_row(FIRST_DATA_ROW + i as u32, row))
        .collect()
}

fn record_from_row(position: u32, row: &[String]) -> MessageRecord {
    let cell = |i: usize| row.get(i).map(String::as_str).unwrap_or("").to_string();
    MessageRecord {
        position,
        sender_name: cell(0),
        recipient_name: cell(1),
        phone_number: cell(2),
        body_template: cell(3),
        schedule_date: cell(4),
        schedule_time: cell(5),
        status: RecordStatus::parse(&cell(6)),
        sent_at: cell(7),
    }
}

#[async_trait]
impl RecordStore for GoogleSheetsStore {
    async fn read_all(&self) -> Result<Vec<MessageRecord>> {
        let url = self.values_url("A:H");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| SendLoopError::Store(format!("Sheets read failed: {e}")))?;
        let response = Self::check_response(response).await?;

        let range: ValueRange = response
            .json()
            .await
            .map_err(|e| SendLoopError::Store(format!("Invalid Sheets response: {e}")))?;

        Ok(records_from_values(&range.values))
    }

    async fn update_status(
        &self,
        position: u32,
        status: RecordStatus,
        sent_at: &str,
    ) -> Result<()> {
        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(&format!("G{position}:H{position}"))
        );
        let body = serde_json::json!({
            "values": [[status.as_str(), sent_at]],
        });

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendLoopError::Store(format!("Sheets writeback failed: {e}")))?;
        Self::check_response(response).await?;

        tracing::debug!("✅ Row {} status updated to {}", position, status);
        Ok(())
    }

    async fn append_rows(&self, rows: &[NewRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{}:append?valueInputOption=USER_ENTERED",
            self.values_url("A:H")
        );
        let values: Vec<Vec<String>> = rows.iter().map(NewRecord::to_row).collect();
        let body = serde_json::json!({ "values": values });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| SendLoopError::Store(format!("Sheets append failed: {e}")))?;
        Self::check_response(response).await?;

        tracing::info!("✅ Appended {} row(s) to the sheet", rows.len());
        Ok(())
    }
}
