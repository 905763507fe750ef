//! Command handlers for the host AT commands

mod cloud;
mod cloud_pos;
mod ncellmeas;

pub use cloud::handle_cloud;
pub use cloud_pos::handle_cloud_pos;
pub use ncellmeas::{handle_ncellmeas, handle_ncellmeas_stop};

use tokio::sync::mpsc;

use crate::cloud::{CloudState, LocationClient};
use crate::location::LocationOrchestrator;
use crate::notification::NotificationMonitor;

/// Context passed to command handlers
pub struct HandlerContext<'a> {
    pub device_id: &'a str,
    pub cloud_state: &'a CloudState,
    pub client: &'a dyn LocationClient,
    pub monitor: &'a NotificationMonitor,
    pub orchestrator: &'a LocationOrchestrator,
    /// Modem command link, when a modem is attached
    pub modem_tx: Option<&'a mpsc::Sender<String>>,
}

/// Errno-style codes for rejections that are not request errors
pub(crate) mod code {
    pub const EINVAL: i32 = -22;
    pub const EIO: i32 = -5;
    pub const ENOTSUP: i32 = -95;
}
