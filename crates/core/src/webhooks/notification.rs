//! Minimal shape of an inbound provider notification.
//!
//! Only the fields needed to authenticate, route, and deduplicate are read;
//! the raw payload is carried through the queue untouched.

use serde_json::Value;

/// Notification type that changes payment state.
pub const KIND_PAYMENT: &str = "payment";

/// Payment statuses a notification may move a payment into.
pub const PAYMENT_STATUSES: &[&str] = &[
    "pending",
    "approved",
    "authorized",
    "in_process",
    "rejected",
    "cancelled",
    "refunded",
    "charged_back",
];

const MAX_PROVIDER_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is missing required field '{0}'")]
    MissingField(&'static str),

    #[error("unknown payment status '{0}'")]
    UnknownStatus(String),

    #[error("invalid provider '{0}'")]
    InvalidProvider(String),
}

/// The routing-relevant view of a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotification {
    /// Notification type (`type`, or `topic` for older senders).
    pub kind: String,
    /// Provider-side id of the referenced record (`data.id`, or `id`).
    pub external_id: String,
    /// Id of the notification itself, when the sender assigns one (`id`).
    pub notification_id: Option<String>,
    pub action: Option<String>,
    /// Reported status (`data.status`, or `status`).
    pub status: Option<String>,
}

impl WebhookNotification {
    pub fn parse(payload: &Value) -> Result<Self, NotificationError> {
        let kind = non_empty_str(payload.get("type"))
            .or_else(|| non_empty_str(payload.get("topic")))
            .ok_or(NotificationError::MissingField("type"))?;

        let data = payload.get("data");
        let external_id = data
            .and_then(|d| id_value(d.get("id")))
            .or_else(|| id_value(payload.get("id")))
            .ok_or(NotificationError::MissingField("data.id"))?;

        let status = data
            .and_then(|d| non_empty_str(d.get("status")))
            .or_else(|| non_empty_str(payload.get("status")));

        Ok(Self {
            kind,
            external_id,
            notification_id: id_value(payload.get("id")),
            action: non_empty_str(payload.get("action")),
            status,
        })
    }

    pub fn parse_bytes(raw: &[u8]) -> Result<Self, NotificationError> {
        let value: Value = serde_json::from_slice(raw)
            .map_err(|e| NotificationError::InvalidJson(e.to_string()))?;
        Self::parse(&value)
    }

    /// Key under which a delivery is deduplicated.
    ///
    /// The sender's notification id when present. Otherwise the record id
    /// together with the reported state, so a later status change of the same
    /// record is still processed.
    pub fn idempotency_key(&self) -> String {
        match &self.notification_id {
            Some(id) => id.clone(),
            None => format!(
                "{}:{}:{}",
                self.external_id,
                self.action.as_deref().unwrap_or(&self.kind),
                self.status.as_deref().unwrap_or("-"),
            ),
        }
    }

    pub fn is_payment(&self) -> bool {
        self.kind == KIND_PAYMENT
    }

    /// The reported payment status, checked against [`PAYMENT_STATUSES`].
    pub fn payment_status(&self) -> Result<&str, NotificationError> {
        let status = self
            .status
            .as_deref()
            .ok_or(NotificationError::MissingField("data.status"))?;
        if PAYMENT_STATUSES.contains(&status) {
            Ok(status)
        } else {
            Err(NotificationError::UnknownStatus(status.to_string()))
        }
    }
}

/// Check a provider path segment: `[a-z0-9_-]{1,32}`.
pub fn validate_provider(provider: &str) -> Result<(), NotificationError> {
    let valid = !provider.is_empty()
        && provider.len() <= MAX_PROVIDER_LEN
        && provider
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(NotificationError::InvalidProvider(provider.to_string()))
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Ids arrive as strings or as JSON numbers depending on the sender.
fn id_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn reads_type_and_nested_id() {
        let n = WebhookNotification::parse(&json!({
            "type": "payment",
            "action": "payment.updated",
            "data": { "id": "PAY-9", "status": "approved" }
        }))
        .unwrap();
        assert_eq!(n.kind, "payment");
        assert_eq!(n.external_id, "PAY-9");
        assert_eq!(n.action.as_deref(), Some("payment.updated"));
        assert!(n.is_payment());
        assert_eq!(n.payment_status(), Ok("approved"));
    }

    #[test]
    fn falls_back_to_topic_and_numeric_top_level_id() {
        let n = WebhookNotification::parse(&json!({ "topic": "merchant_order", "id": 12345 }))
            .unwrap();
        assert_eq!(n.kind, "merchant_order");
        assert_eq!(n.external_id, "12345");
        assert!(!n.is_payment());
    }

    #[test]
    fn missing_type_or_id_is_rejected() {
        assert_matches!(
            WebhookNotification::parse(&json!({ "data": { "id": "1" } })),
            Err(NotificationError::MissingField("type"))
        );
        assert_matches!(
            WebhookNotification::parse(&json!({ "type": "payment", "data": {} })),
            Err(NotificationError::MissingField("data.id"))
        );
        assert_matches!(
            WebhookNotification::parse(&json!({ "type": "", "id": "1" })),
            Err(NotificationError::MissingField("type"))
        );
    }

    #[test]
    fn idempotency_key_prefers_notification_id() {
        let n = WebhookNotification::parse(&json!({
            "id": 777, "type": "payment", "data": { "id": "PAY-1", "status": "approved" }
        }))
        .unwrap();
        assert_eq!(n.idempotency_key(), "777");

        let pending = WebhookNotification::parse(&json!({
            "type": "payment", "data": { "id": "PAY-1", "status": "pending" }
        }))
        .unwrap();
        let approved = WebhookNotification::parse(&json!({
            "type": "payment", "data": { "id": "PAY-1", "status": "approved" }
        }))
        .unwrap();
        assert_eq!(pending.idempotency_key(), "PAY-1:payment:pending");
        assert_ne!(pending.idempotency_key(), approved.idempotency_key());
    }

    #[test]
    fn invalid_json_is_reported() {
        assert_matches!(
            WebhookNotification::parse_bytes(b"{not json"),
            Err(NotificationError::InvalidJson(_))
        );
    }

    #[test]
    fn unknown_payment_status_is_rejected() {
        let n = WebhookNotification::parse(&json!({
            "type": "payment", "data": { "id": "1", "status": "teleported" }
        }))
        .unwrap();
        assert_matches!(n.payment_status(), Err(NotificationError::UnknownStatus(_)));
    }

    #[test]
    fn provider_slugs() {
        assert!(validate_provider("mercadopago").is_ok());
        assert!(validate_provider("pay_pal-2").is_ok());
        assert!(validate_provider("").is_err());
        assert!(validate_provider("Stripe").is_err());
        assert!(validate_provider("../etc").is_err());
        assert!(validate_provider(&"a".repeat(33)).is_err());
    }
}
