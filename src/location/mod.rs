//! Location request orchestration

pub mod modem_cell;
pub mod orchestrator;

pub use modem_cell::ModemCellSource;
pub use orchestrator::{LocationEvent, LocationOrchestrator};
