//! API route handlers for the operational surface.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use sendloop_core::types::SheetStats;

use super::server::AppState;

/// Service liveness endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "sendloop-gateway",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Scheduler state snapshot.
pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let uptime = state.start_time.elapsed();
    Json(serde_json::json!({
        "success": true,
        "data": state.engine.status(),
        "uptime_secs": uptime.as_secs(),
    }))
}

/// Arm the scheduler timers.
pub async fn scheduler_start(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.engine.start();
    Json(serde_json::json!({
        "success": true,
        "message": "Scheduler started",
    }))
}

/// Disarm the scheduler timers; an in-flight pass completes.
pub async fn scheduler_stop(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.engine.stop();
    Json(serde_json::json!({
        "success": true,
        "message": "Scheduler stopped",
    }))
}

/// Manually trigger one check pass.
pub async fn scheduler_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let triggered_at = state.engine.trigger_check().await;
    Json(serde_json::json!({
        "success": true,
        "message": "Message check triggered successfully",
        "data": { "triggered_at": triggered_at.to_rfc3339() },
    }))
}

/// Manually trigger one sync probe.
pub async fn scheduler_sync(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.engine.trigger_sync().await;
    Json(serde_json::json!({
        "success": true,
        "message": "Sheet sync triggered successfully",
    }))
}

/// Reset the watermark and re-probe the sheet.
pub async fn scheduler_resync(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.engine.resync().await;
    Json(serde_json::json!({
        "success": true,
        "message": "Watermark reset and sheet re-synced",
    }))
}

/// Zero the delivery counters.
pub async fn scheduler_reset_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.engine.reset_stats();
    Json(serde_json::json!({
        "success": true,
        "message": "Statistics reset",
    }))
}

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// Recent delivery log entries, newest first.
pub async fn recent_logs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogsQuery>,
) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(100);
    let logs = state.log.recent(limit);
    Json(serde_json::json!({
        "success": true,
        "count": logs.len(),
        "data": logs,
    }))
}

/// Clear the delivery log.
pub async fn clear_logs(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.log.clear();
    Json(serde_json::json!({
        "success": true,
        "message": "Message logs cleared successfully",
    }))
}

/// WhatsApp gateway reachability probe. Always 200; the probe outcome is
/// in the payload.
pub async fn whatsapp_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.sender.health().await {
        Ok(identity) => Json(serde_json::json!({
            "success": true,
            "data": { "healthy": true, "gateway": identity },
        })),
        Err(e) => Json(serde_json::json!({
            "success": true,
            "data": { "healthy": false, "error": e.to_string() },
        })),
    }
}

/// Aggregate counts over the full sheet.
pub async fn sheet_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    match state.store.read_all().await {
        Ok(records) => Json(serde_json::json!({
            "success": true,
            "data": SheetStats::from_records(&records),
        })),
        Err(e) => Json(serde_json::json!({
            "success": false,
            "error": e.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sendloop_core::config::SchedulerConfig;
    use sendloop_core::error::Result;
    use sendloop_core::traits::{MessageSender, RecordStore};
    use sendloop_core::types::{
        DeliveryLogEntry, DeliveryResult, MessageRecord, NewRecord, RecordStatus,
    };
    use sendloop_scheduler::SchedulerEngine;
    use sendloop_whatsapp::MessageLog;

    struct EmptyStore;

    #[async_trait]
    impl RecordStore for EmptyStore {
        async fn read_all(&self) -> Result<Vec<MessageRecord>> {
            Ok(Vec::new())
        }
        async fn update_status(&self, _: u32, _: RecordStatus, _: &str) -> Result<()> {
            Ok(())
        }
        async fn append_rows(&self, _: &[NewRecord]) -> Result<()> {
            Ok(())
        }
    }

    struct OfflineSender;

    #[async_trait]
    impl MessageSender for OfflineSender {
        async fn send(&self, _: &str, _: &str) -> DeliveryResult {
            DeliveryResult::failed("offline")
        }
        async fn health(&self) -> Result<serde_json::Value> {
            Err(sendloop_core::error::SendLoopError::Gateway("offline".into()))
        }
    }

    fn test_state() -> State<Arc<AppState>> {
        let store: Arc<dyn RecordStore> = Arc::new(EmptyStore);
        let sender: Arc<dyn MessageSender> = Arc::new(OfflineSender);
        let engine = Arc::new(SchedulerEngine::new(
            store.clone(),
            sender.clone(),
            &SchedulerConfig::default(),
        ));
        State(Arc::new(AppState {
            engine,
            log: Arc::new(MessageLog::new(100)),
            sender,
            store,
            start_time: std::time::Instant::now(),
        }))
    }

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = health_check().await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "sendloop-gateway");
    }

    #[tokio::test]
    async fn test_scheduler_status_snapshot() {
        let Json(body) = scheduler_status(test_state()).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["running"], false);
        assert_eq!(body["data"]["sent_count"], 0);
        assert!(body["data"]["last_check_at"].is_null());
    }

    #[tokio::test]
    async fn test_scheduler_check_returns_trigger_timestamp() {
        let Json(body) = scheduler_check(test_state()).await;
        assert_eq!(body["success"], true);
        assert!(body["data"]["triggered_at"].is_string());
    }

    #[tokio::test]
    async fn test_logs_roundtrip() {
        let state = test_state();
        state.0.log.append(DeliveryLogEntry::from_result(
            "919876543210",
            &DeliveryResult::delivered("wamid.1"),
        ));

        let Json(body) = recent_logs(
            State(state.0.clone()),
            Query(LogsQuery { limit: Some(10) }),
        )
        .await;
        assert_eq!(body["count"], 1);
        assert_eq!(body["data"][0]["phone_number"], "919876543210");

        let Json(body) = clear_logs(State(state.0.clone())).await;
        assert_eq!(body["success"], true);

        let Json(body) = recent_logs(State(state.0.clone()), Query(LogsQuery { limit: None })).await;
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_whatsapp_health_reports_unreachable_without_erroring() {
        let Json(body) = whatsapp_health(test_state()).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["healthy"], false);
    }

    #[tokio::test]
    async fn test_sheet_stats_on_empty_sheet() {
        let Json(body) = sheet_stats(test_state()).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["total"], 0);
    }
}
