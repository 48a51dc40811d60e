//! WhatsApp Business Cloud API delivery client.
//!
//! Uses the official WhatsApp Business Platform (Cloud API) for messaging.
//! Requires: Access Token + Phone Number ID from Meta Business Suite.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sendloop_core::config::WhatsAppConfig;
use sendloop_core::error::{Result, SendLoopError};
use sendloop_core::traits::MessageSender;
use sendloop_core::types::{DeliveryLogEntry, DeliveryResult};

use crate::format::normalize_phone;
use crate::log::MessageLog;

/// One-attempt delivery client. Retries live a layer above; this client
/// issues exactly one bounded-timeout gateway call per `send` and records
/// every attempt in the delivery log.
pub struct WhatsAppClient {
    config: WhatsAppConfig,
    client: reqwest::Client,
    log: Arc<MessageLog>,
}

impl WhatsAppClient {
    pub fn new(config: WhatsAppConfig, log: Arc<MessageLog>) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            log,
        }
    }

    /// Send a text message via the Cloud API. Always resolves to a
    /// `DeliveryResult`; transport errors, timeouts and non-2xx responses
    /// become failures carrying the gateway's error payload.
    async fn send_text_message(&self, to: &str, text: &str) -> DeliveryResult {
        let to = normalize_phone(to);
        let url = format!(
            "{}/{}/messages",
            self.config.api_url, self.config.phone_number_id
        );

        let body = serde_json::json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": "text",
            "text": {
                "preview_url": false,
                "body": text
            }
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .header("Content-Type", "application/json")
            .json(&body)
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await;

        let result = match response {
            Err(e) => DeliveryResult::failed(format!("WhatsApp API request failed: {e}")),
            Ok(resp) if !resp.status().is_success() => {
                let status = resp.status();
                let error_text = resp.text().await.unwrap_or_default();
                DeliveryResult::failed(format!("WhatsApp API error {status}: {error_text}"))
            }
            Ok(resp) => match resp.json::<serde_json::Value>().await {
                Err(e) => DeliveryResult::failed(format!("Invalid WhatsApp response: {e}")),
                Ok(json) => {
                    let msg_id = json["messages"][0]["id"].as_str().unwrap_or("unknown");
                    DeliveryResult::delivered(msg_id)
                }
            },
        };

        self.log.append(DeliveryLogEntry::from_result(&to, &result));

        match &result {
            DeliveryResult {
                message_id: Some(id),
                ..
            } => tracing::debug!("✅ WhatsApp message sent: {} → {}", id, to),
            DeliveryResult { error, .. } => tracing::warn!(
                "❌ WhatsApp send failed to {}: {}",
                to,
                error.as_deref().unwrap_or("unknown")
            ),
        }

        result
    }

    /// Verify the token and phone number id by fetching the gateway
    /// identity.
    async fn probe(&self) -> Result<serde_json::Value> {
        if self.config.api_token.is_empty() {
            return Err(SendLoopError::Config(
                "WhatsApp api_token not configured".into(),
            ));
        }
        if self.config.phone_number_id.is_empty() {
            return Err(SendLoopError::Config(
                "WhatsApp phone_number_id not configured".into(),
            ));
        }

        let url = format!("{}/{}", self.config.api_url, self.config.phone_number_id);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_token))
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| SendLoopError::Gateway(format!("WhatsApp probe failed: {e}")))?;

        if response.status().is_success() {
            let identity: serde_json::Value = response
                .json()
                .await
                .map_err(|e| SendLoopError::Gateway(format!("Invalid WhatsApp response: {e}")))?;
            Ok(identity)
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(SendLoopError::AuthFailed(format!(
                "WhatsApp token verification failed: {text}"
            )))
        }
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send(&self, phone_number: &str, body: &str) -> DeliveryResult {
        self.send_text_message(phone_number, body).await
    }

    async fn health(&self) -> Result<serde_json::Value> {
        self.probe().await
    }
}
