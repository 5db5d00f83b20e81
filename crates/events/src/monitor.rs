//! Rejected-delivery monitor.
//!
//! The webhook gateway does not persist deliveries it rejects; it publishes
//! a `webhook.rejected` [`PlatformEvent`] instead. [`RejectionMonitor`]
//! counts those per provider over a sliding window and escalates once a
//! provider reaches the alert threshold.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;

use courtbook_core::audit::event_types;

use crate::bus::PlatformEvent;

pub struct RejectionMonitor {
    window: Duration,
    threshold: usize,
    seen: HashMap<String, VecDeque<DateTime<Utc>>>,
}

impl RejectionMonitor {
    /// A `threshold` of zero disables escalation.
    pub fn new(window: Duration, threshold: usize) -> Self {
        Self {
            window,
            threshold,
            seen: HashMap::new(),
        }
    }

    /// Record one bus event.
    ///
    /// Returns the provider's rejection count when this event brings it up
    /// to the threshold. Further rejections inside the same window do not
    /// fire again.
    pub fn observe(&mut self, event: &PlatformEvent) -> Option<usize> {
        if event.event_type != event_types::WEBHOOK_REJECTED {
            return None;
        }
        let provider = event
            .payload
            .get("provider")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");

        let cutoff = event.timestamp - self.window;
        let times = self.seen.entry(provider.to_string()).or_default();
        while times.front().is_some_and(|t| *t <= cutoff) {
            times.pop_front();
        }
        times.push_back(event.timestamp);

        (self.threshold > 0 && times.len() == self.threshold).then_some(times.len())
    }

    /// Consume the bus until it closes.
    pub async fn run(mut self, mut receiver: broadcast::Receiver<PlatformEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Some(count) = self.observe(&event) {
                        tracing::error!(
                            escalate = true,
                            security = true,
                            provider = event.payload.get("provider").and_then(|v| v.as_str()),
                            count,
                            window_secs = self.window.num_seconds(),
                            "Webhook rejection rate over threshold",
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Rejection monitor lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, rejection monitor shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejected(provider: &str, at: DateTime<Utc>) -> PlatformEvent {
        let mut event = PlatformEvent::new(event_types::WEBHOOK_REJECTED, None)
            .with_entity("webhook", "PAY-1")
            .with_payload(json!({ "provider": provider, "reason": "stale" }));
        event.timestamp = at;
        event
    }

    #[test]
    fn fires_once_when_threshold_is_reached() {
        let mut monitor = RejectionMonitor::new(Duration::seconds(60), 3);
        let now = Utc::now();

        assert_eq!(monitor.observe(&rejected("mp", now)), None);
        assert_eq!(monitor.observe(&rejected("mp", now)), None);
        assert_eq!(monitor.observe(&rejected("mp", now)), Some(3));
        assert_eq!(monitor.observe(&rejected("mp", now)), None);
    }

    #[test]
    fn providers_are_counted_separately() {
        let mut monitor = RejectionMonitor::new(Duration::seconds(60), 2);
        let now = Utc::now();

        assert_eq!(monitor.observe(&rejected("mp", now)), None);
        assert_eq!(monitor.observe(&rejected("stripe", now)), None);
        assert_eq!(monitor.observe(&rejected("stripe", now)), Some(2));
    }

    #[test]
    fn old_rejections_leave_the_window() {
        let mut monitor = RejectionMonitor::new(Duration::seconds(60), 2);
        let start = Utc::now();

        assert_eq!(monitor.observe(&rejected("mp", start)), None);
        let later = start + Duration::seconds(120);
        assert_eq!(monitor.observe(&rejected("mp", later)), None);
        assert_eq!(monitor.observe(&rejected("mp", later)), Some(2));
    }

    #[test]
    fn other_events_are_ignored() {
        let mut monitor = RejectionMonitor::new(Duration::seconds(60), 1);
        let event = PlatformEvent::new("credit.granted", Some(1));
        assert_eq!(monitor.observe(&event), None);
    }

    #[test]
    fn zero_threshold_never_fires() {
        let mut monitor = RejectionMonitor::new(Duration::seconds(60), 0);
        assert_eq!(monitor.observe(&rejected("mp", Utc::now())), None);
    }

    #[tokio::test]
    async fn run_stops_when_bus_closes() {
        let bus = crate::EventBus::default();
        let receiver = bus.subscribe();
        let handle = tokio::spawn(RejectionMonitor::new(Duration::seconds(60), 1).run(receiver));

        bus.publish(rejected("mp", Utc::now()));
        drop(bus);

        handle.await.unwrap();
    }
}
