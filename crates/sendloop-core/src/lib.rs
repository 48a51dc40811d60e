//! # SendLoop Core
//!
//! Shared foundation for the SendLoop workspace: the error type, the TOML
//! configuration system, the record/log data model, and the trait seams
//! (`RecordStore`, `MessageSender`) that the scheduler is written against.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::SendLoopConfig;
pub use error::{Result, SendLoopError};
pub use traits::{MessageSender, RecordStore};
pub use types::{
    DeliveryLogEntry, DeliveryResult, MessageRecord, NewRecord, RecordStatus, SchedulerSnapshot,
    SheetStats,
};
