//! Public webhook gateway.
//!
//! `RECEIVED -> VALIDATED -> ENQUEUED`, or `RECEIVED -> REJECTED` with a 400.
//! The shape check runs before any cryptography, the signature check runs
//! before anything is persisted, and once a notification is authentic the
//! sender always gets a `200` within the acknowledgement budget. Rejections
//! are logged and published on the event bus only. Deduplication is the
//! worker's job.

use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use courtbook_core::audit::event_types;
use courtbook_core::error::CoreError;
use courtbook_core::types::DbId;
use courtbook_core::webhooks::{
    validate_provider, verify_signature, NewWebhookJob, WebhookJobPayload, WebhookNotification,
};
use courtbook_events::PlatformEvent;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-signature";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Acknowledgement returned to the provider.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<DbId>,
}

/// POST /webhooks/{provider}
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    validate_provider(&provider).map_err(|e| CoreError::Validation(e.to_string()))?;

    // Shape check.
    let raw_payload: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| CoreError::Validation(format!("payload is not valid JSON: {e}")))?;
    let notification = WebhookNotification::parse(&raw_payload).map_err(|e| {
        tracing::info!(provider = %provider, error = %e, "Malformed webhook rejected");
        CoreError::Validation(e.to_string())
    })?;

    let request_id = header_str(&headers, REQUEST_ID_HEADER)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // Authenticity.
    match state.config.webhooks.secret_for(&provider) {
        Some(secret) => {
            let signature = header_str(&headers, SIGNATURE_HEADER).unwrap_or_default();
            if let Err(e) = verify_signature(
                secret,
                signature,
                &notification.external_id,
                &request_id,
                Utc::now().timestamp(),
                state.config.webhooks.replay_window_secs,
            ) {
                tracing::warn!(
                    security = true,
                    provider = %provider,
                    external_id = %notification.external_id,
                    request_id = %request_id,
                    error = %e,
                    "Webhook signature rejected",
                );
                // Unauthenticated senders must not grow the audit table.
                state.event_bus.publish(
                    PlatformEvent::new(event_types::WEBHOOK_REJECTED, None)
                        .with_entity("webhook", &notification.external_id)
                        .with_payload(serde_json::json!({
                            "provider": provider,
                            "reason": e.to_string(),
                            "requestId": request_id,
                            "kind": notification.kind,
                        })),
                );
                return Err(AppError::InvalidSignature(e.to_string()));
            }
        }
        None => {
            tracing::debug!(provider = %provider, "No signing secret configured, skipping signature check");
        }
    }

    // Enqueue within the acknowledgement budget.
    let job = NewWebhookJob {
        payload: WebhookJobPayload {
            provider: provider.clone(),
            raw_payload,
            request_id: request_id.clone(),
            received_at: Utc::now(),
        },
        max_attempts: state.config.webhooks.max_attempts,
    };
    let budget = Duration::from_millis(state.config.webhooks.ack_timeout_ms);

    let job_id = match tokio::time::timeout(budget, state.webhook_queue.enqueue(job)).await {
        Ok(Ok(job_id)) => {
            tracing::info!(
                provider = %provider,
                external_id = %notification.external_id,
                job_id,
                "Webhook enqueued",
            );
            Some(job_id)
        }
        Ok(Err(e)) => {
            tracing::error!(
                escalate = true,
                provider = %provider,
                external_id = %notification.external_id,
                request_id = %request_id,
                error = %e,
                "Webhook enqueue failed, acknowledging anyway",
            );
            None
        }
        Err(_) => {
            tracing::error!(
                escalate = true,
                provider = %provider,
                external_id = %notification.external_id,
                request_id = %request_id,
                budget_ms = state.config.webhooks.ack_timeout_ms,
                "Webhook enqueue exceeded acknowledgement budget, acknowledging anyway",
            );
            None
        }
    };

    Ok(Json(WebhookAck {
        status: "received",
        job_id,
    }))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
