//! Webhook delivery.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use ffq_models::NotificationEnvelope;

use crate::error::{NotifierError, NotifierResult};

/// Delivers notification envelopes over a shared, timeout-bounded client.
pub struct WebhookDeliverer {
    client: reqwest::Client,
}

impl WebhookDeliverer {
    pub fn new(http_timeout: Duration) -> NotifierResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(http_timeout)
            .build()
            .map_err(|e| NotifierError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Decode and deliver one leased payload. Returns the 2xx status code.
    pub async fn deliver_payload(&self, payload: &[u8]) -> NotifierResult<u16> {
        let envelope: NotificationEnvelope = serde_json::from_slice(payload)
            .map_err(|e| NotifierError::MalformedPayload(e.to_string()))?;
        self.deliver(&envelope).await
    }

    /// POST the envelope body as JSON. Any 2xx is success; everything else
    /// is retryable. The response body is drained and discarded so the
    /// connection can be reused.
    pub async fn deliver(&self, envelope: &NotificationEnvelope) -> NotifierResult<u16> {
        let command_id = envelope.command_id.as_str();
        let start = Instant::now();

        let resp = self
            .client
            .post(&envelope.url)
            .header("Content-Type", "application/json")
            .json(&envelope.body)
            .send()
            .await;

        let duration = start.elapsed();
        let resp = match resp {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    command_id,
                    duration_ms = duration.as_millis() as u64,
                    error = %e,
                    "webhook delivery failed"
                );
                return Err(NotifierError::Transport(e.to_string()));
            }
        };

        let status = resp.status().as_u16();
        // Drain the body regardless of status.
        let _ = resp.bytes().await;

        if !(200..300).contains(&status) {
            warn!(
                command_id,
                duration_ms = duration.as_millis() as u64,
                status,
                "webhook returned non-2xx"
            );
            return Err(NotifierError::Status(status));
        }

        info!(
            command_id,
            duration_ms = duration.as_millis() as u64,
            status,
            success = true,
            "webhook delivered"
        );
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn malformed_payload_is_unrecoverable() {
        let deliverer = WebhookDeliverer::new(Duration::from_secs(1)).unwrap();
        let err = deliverer.deliver_payload(b"not json").await.unwrap_err();
        assert!(err.is_unrecoverable());
        assert!(err.to_string().starts_with("unmarshal payload"));
    }

    #[tokio::test]
    async fn transport_failure_is_retryable() {
        let deliverer = WebhookDeliverer::new(Duration::from_secs(1)).unwrap();
        let envelope = NotificationEnvelope {
            url: "http://127.0.0.1:1/unreachable".to_string(),
            command_id: "c1".to_string(),
            status: "SUCCESS".to_string(),
            body: serde_json::json!({"command_id": "c1"}),
        };
        let err = deliverer.deliver(&envelope).await.unwrap_err();
        assert!(matches!(err, NotifierError::Transport(_)));
        assert!(!err.is_unrecoverable());
    }
}
