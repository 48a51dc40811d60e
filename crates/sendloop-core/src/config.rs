//! SendLoop configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SendLoopError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SendLoopConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl SendLoopConfig {
    /// Load config from the default path (~/.sendloop/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SendLoopError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SendLoopError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SendLoopError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sendloop")
            .join("config.toml")
    }
}

/// Operational HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 5000 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Google Sheets record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Spreadsheet ID (from the sheet URL).
    #[serde(default)]
    pub spreadsheet_id: String,
    /// OAuth2 bearer token with spreadsheets scope.
    #[serde(default)]
    pub access_token: String,
    /// Tab name holding the message queue.
    #[serde(default = "default_sheet_tab")]
    pub tab: String,
    /// Sheets API base URL.
    #[serde(default = "default_sheets_api_url")]
    pub api_url: String,
}

fn default_sheet_tab() -> String { "Sheet1".into() }
fn default_sheets_api_url() -> String { "https://sheets.googleapis.com/v4/spreadsheets".into() }

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            access_token: String::new(),
            tab: default_sheet_tab(),
            api_url: default_sheets_api_url(),
        }
    }
}

/// WhatsApp Business Cloud API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Graph API access token from Meta Business Suite.
    #[serde(default)]
    pub api_token: String,
    /// WhatsApp Phone Number ID (the sending identity).
    #[serde(default)]
    pub phone_number_id: String,
    /// Graph API base URL.
    #[serde(default = "default_whatsapp_api_url")]
    pub api_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_send_timeout")]
    pub timeout_secs: u64,
}

fn default_whatsapp_api_url() -> String { "https://graph.facebook.com/v18.0".into() }
fn default_send_timeout() -> u64 { 10 }

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            phone_number_id: String::new(),
            api_url: default_whatsapp_api_url(),
            timeout_secs: default_send_timeout(),
        }
    }
}

/// Scheduler cadence and retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Minutes between check passes (minimum 1).
    #[serde(default = "default_check_interval")]
    pub check_interval_minutes: u64,
    /// Minutes between sheet sync probes (minimum 1).
    #[serde(default = "default_sync_interval")]
    pub sync_interval_minutes: u64,
    /// How many minutes before the appointment the reminder goes out.
    #[serde(default = "default_lead_time")]
    pub lead_time_minutes: i64,
    /// Maximum delivery attempts per record.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Backoff strategy between attempts: "constant", "linear", "exponential".
    #[serde(default = "default_backoff_strategy")]
    pub backoff_strategy: String,
    /// Base backoff delay in milliseconds.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_check_interval() -> u64 { 1 }
fn default_sync_interval() -> u64 { 5 }
fn default_lead_time() -> i64 { 15 }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_strategy() -> String { "linear".into() }
fn default_backoff_base_ms() -> u64 { 1000 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval_minutes: default_check_interval(),
            sync_interval_minutes: default_sync_interval(),
            lead_time_minutes: default_lead_time(),
            max_attempts: default_max_attempts(),
            backoff_strategy: default_backoff_strategy(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

/// Delivery log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Maximum retained delivery log entries (ring buffer capacity).
    #[serde(default = "default_log_capacity")]
    pub capacity: usize,
}

fn default_log_capacity() -> usize { 500 }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            capacity: default_log_capacity(),
        }
    }
}
