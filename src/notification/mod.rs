//! Neighbor cell measurement intake

pub mod monitor;
pub mod store;

pub use monitor::{MonitorOutcome, NotificationMonitor};
pub use store::MeasurementStore;
