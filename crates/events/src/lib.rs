//! Domain event fan-out, audit persistence and bus monitors.

pub mod audit;
pub mod bus;
pub mod monitor;

pub use audit::AuditPublisher;
pub use bus::{EventBus, PlatformEvent};
pub use monitor::RejectionMonitor;
