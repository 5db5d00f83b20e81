use std::time::Duration;

use courtbook_core::webhooks::RetryPolicy;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
    /// Budget for processing one job attempt.
    pub job_timeout: Duration,
    /// Jobs locked longer than this are assumed abandoned by a crashed worker.
    pub stale_lock_secs: i64,
    pub expiry_interval: Duration,
    pub retry_base_secs: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1000),
            batch_size: 10,
            job_timeout: Duration::from_secs(30),
            stale_lock_secs: 300,
            expiry_interval: Duration::from_secs(3600),
            retry_base_secs: 2,
        }
    }
}

impl WorkerConfig {
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `WORKER_POLL_INTERVAL_MS`     | `1000`  |
    /// | `WORKER_BATCH_SIZE`           | `10`    |
    /// | `WORKER_JOB_TIMEOUT_SECS`     | `30`    |
    /// | `WORKER_STALE_LOCK_SECS`      | `300`   |
    /// | `CREDIT_EXPIRY_INTERVAL_SECS` | `3600`  |
    /// | `WEBHOOK_RETRY_BASE_SECS`     | `2`     |
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            poll_interval: Duration::from_millis(env_or("WORKER_POLL_INTERVAL_MS", 1000)),
            batch_size: env_or("WORKER_BATCH_SIZE", defaults.batch_size),
            job_timeout: Duration::from_secs(env_or("WORKER_JOB_TIMEOUT_SECS", 30)),
            stale_lock_secs: env_or("WORKER_STALE_LOCK_SECS", defaults.stale_lock_secs),
            expiry_interval: Duration::from_secs(env_or("CREDIT_EXPIRY_INTERVAL_SECS", 3600)),
            retry_base_secs: env_or("WEBHOOK_RETRY_BASE_SECS", defaults.retry_base_secs),
        }
    }

    /// Backoff policy for a job allowed `max_attempts` attempts.
    pub fn retry_policy(&self, max_attempts: i32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_secs: self.retry_base_secs,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a valid number")),
        Err(_) => default,
    }
}
