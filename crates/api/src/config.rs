use std::collections::HashMap;

use courtbook_core::webhooks::{DEFAULT_MAX_ATTEMPTS, REPLAY_WINDOW_SECS};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Currency assigned to credits granted without one (default: `USD`).
    pub default_currency: String,
    pub jwt: JwtConfig,
    pub webhooks: WebhookConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                    |
    /// |---------------------------|----------------------------|
    /// | `HOST`                    | `0.0.0.0`                  |
    /// | `PORT`                    | `3000`                     |
    /// | `CORS_ORIGINS`            | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`    | `30`                       |
    /// | `CREDIT_DEFAULT_CURRENCY` | `USD`                      |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let default_currency =
            std::env::var("CREDIT_DEFAULT_CURRENCY").unwrap_or_else(|_| "USD".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            default_currency,
            jwt: JwtConfig::from_env(),
            webhooks: WebhookConfig::from_env(),
        }
    }
}

// ---------------------------------------------------------------------------
// Webhooks
// ---------------------------------------------------------------------------

const SECRET_PREFIX: &str = "WEBHOOK_SECRET_";

/// Webhook gateway settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Signing secrets keyed by upper-cased provider slug.
    secrets: HashMap<String, String>,
    /// Hard budget for enqueueing before the gateway acknowledges anyway.
    pub ack_timeout_ms: u64,
    pub replay_window_secs: i64,
    pub max_attempts: i32,
    /// Rejected deliveries per provider inside the window that raise an
    /// alert. `0` disables alerting.
    pub rejection_alert_threshold: usize,
    pub rejection_window_secs: i64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secrets: HashMap::new(),
            ack_timeout_ms: 2000,
            replay_window_secs: REPLAY_WINDOW_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rejection_alert_threshold: 20,
            rejection_window_secs: 60,
        }
    }
}

impl WebhookConfig {
    /// | Env Var                             | Default |
    /// |-------------------------------------|---------|
    /// | `WEBHOOK_SECRET_<PROVIDER>`         | unset   |
    /// | `WEBHOOK_ACK_TIMEOUT_MS`            | `2000`  |
    /// | `WEBHOOK_REPLAY_WINDOW_SECS`        | `300`   |
    /// | `WEBHOOK_MAX_ATTEMPTS`              | `3`     |
    /// | `WEBHOOK_REJECTION_ALERT_THRESHOLD` | `20`    |
    /// | `WEBHOOK_REJECTION_WINDOW_SECS`     | `60`    |
    ///
    /// `<PROVIDER>` is the provider slug upper-cased with `-` replaced by `_`.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let secrets = std::env::vars()
            .filter_map(|(key, value)| {
                let provider = key.strip_prefix(SECRET_PREFIX)?;
                (!value.is_empty()).then(|| (provider.to_string(), value))
            })
            .collect();

        let ack_timeout_ms: u64 = std::env::var("WEBHOOK_ACK_TIMEOUT_MS")
            .map(|v| v.parse().expect("WEBHOOK_ACK_TIMEOUT_MS must be a valid u64"))
            .unwrap_or(defaults.ack_timeout_ms);

        let replay_window_secs: i64 = std::env::var("WEBHOOK_REPLAY_WINDOW_SECS")
            .map(|v| v.parse().expect("WEBHOOK_REPLAY_WINDOW_SECS must be a valid i64"))
            .unwrap_or(defaults.replay_window_secs);

        let max_attempts: i32 = std::env::var("WEBHOOK_MAX_ATTEMPTS")
            .map(|v| v.parse().expect("WEBHOOK_MAX_ATTEMPTS must be a valid i32"))
            .unwrap_or(defaults.max_attempts);

        let rejection_alert_threshold: usize = std::env::var("WEBHOOK_REJECTION_ALERT_THRESHOLD")
            .map(|v| v.parse().expect("WEBHOOK_REJECTION_ALERT_THRESHOLD must be a valid usize"))
            .unwrap_or(defaults.rejection_alert_threshold);

        let rejection_window_secs: i64 = std::env::var("WEBHOOK_REJECTION_WINDOW_SECS")
            .map(|v| v.parse().expect("WEBHOOK_REJECTION_WINDOW_SECS must be a valid i64"))
            .unwrap_or(defaults.rejection_window_secs);

        Self {
            secrets,
            ack_timeout_ms,
            replay_window_secs,
            max_attempts,
            rejection_alert_threshold,
            rejection_window_secs,
        }
    }

    /// Register a signing secret for `provider`.
    pub fn with_secret(mut self, provider: &str, secret: impl Into<String>) -> Self {
        self.secrets.insert(env_key(provider), secret.into());
        self
    }

    /// Signing secret of `provider`, if one is configured.
    pub fn secret_for(&self, provider: &str) -> Option<&str> {
        self.secrets.get(&env_key(provider)).map(String::as_str)
    }
}

fn env_key(provider: &str) -> String {
    provider.to_ascii_uppercase().replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_lookup_normalizes_provider_slug() {
        let config = WebhookConfig::default().with_secret("mercado-pago", "s3cret");
        assert_eq!(config.secret_for("mercado-pago"), Some("s3cret"));
        assert_eq!(config.secret_for("MERCADO_PAGO"), Some("s3cret"));
        assert_eq!(config.secret_for("stripe"), None);
    }

    #[test]
    fn defaults_match_gateway_contract() {
        let config = WebhookConfig::default();
        assert_eq!(config.ack_timeout_ms, 2000);
        assert_eq!(config.replay_window_secs, 300);
        assert_eq!(config.max_attempts, 3);
    }
}
