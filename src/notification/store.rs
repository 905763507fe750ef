//! Latest measurement report slot

use std::sync::Arc;

use async_trait::async_trait;
use cellfix_shared::{Cell, LocationError, MeasurementReport};
use tokio::sync::watch;

use crate::cloud::CellInfoSource;

/// Contents of the slot
#[derive(Debug, Default)]
struct MeasurementSnapshot {
    report: Option<Arc<MeasurementReport>>,
    /// A successful measurement arrived since the flag was last cleared
    measured: bool,
}

/// Holds the most recent report
///
/// Writers replace the report wholesale; readers take an `Arc` clone that
/// stays valid after later replacements.
#[derive(Debug, Clone)]
pub struct MeasurementStore {
    tx: Arc<watch::Sender<MeasurementSnapshot>>,
}

impl Default for MeasurementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(MeasurementSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Replace the report. Failed measurements are stored but do not count
    /// as measured.
    pub fn publish(&self, report: MeasurementReport) {
        let measured = !report.is_failed();
        self.tx.send_replace(MeasurementSnapshot {
            report: Some(Arc::new(report)),
            measured,
        });
    }

    /// Clear the measured flag, keeping the report
    pub fn invalidate(&self) {
        self.tx.send_if_modified(|snapshot| std::mem::replace(&mut snapshot.measured, false));
    }

    pub fn is_measured(&self) -> bool {
        self.tx.borrow().measured
    }

    pub fn latest(&self) -> Option<Arc<MeasurementReport>> {
        self.tx.borrow().report.clone()
    }
}

/// Serving cell from the latest report, used when no modem is attached
#[async_trait]
impl CellInfoSource for MeasurementStore {
    async fn serving_cell(&self) -> Result<Cell, LocationError> {
        self.latest()
            .filter(|report| report.has_serving_cell())
            .map(|report| report.current_cell)
            .ok_or_else(|| LocationError::CellLookup("no serving cell measured".into()))
    }
}
