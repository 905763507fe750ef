//! `%NCELLMEAS` notification monitor
//!
//! Runs on the notification delivery path: classifies, decodes and publishes
//! synchronously without awaiting.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use cellfix_shared::ncellmeas::{neighbor_count, NOTIFICATION_PREFIX};
use cellfix_shared::{decode_notification, encode_notification, DecodeError, DecodeLimits, SearchType};
use tracing::{debug, info, warn};

use crate::notification::store::MeasurementStore;

/// What happened to one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// Not a `%NCELLMEAS` notification
    Ignored,
    /// Monitoring is paused
    Paused,
    /// Decoded and published
    Published { measured: bool },
    /// Decode failed; the previous report is kept, unmeasured
    Rejected(DecodeError),
}

pub struct NotificationMonitor {
    store: MeasurementStore,
    limits: DecodeLimits,
    search_type: AtomicU8,
    paused: AtomicBool,
}

impl NotificationMonitor {
    /// Starts paused; resumed when the location service link comes up
    pub fn new(store: MeasurementStore, limits: DecodeLimits) -> Self {
        Self {
            store,
            limits,
            search_type: AtomicU8::new(0),
            paused: AtomicBool::new(true),
        }
    }

    pub fn is_notification(line: &str) -> bool {
        line.starts_with(NOTIFICATION_PREFIX)
    }

    pub fn search_type(&self) -> SearchType {
        SearchType::from_wire(i64::from(self.search_type.load(Ordering::SeqCst))).unwrap_or_default()
    }

    /// Record the search type of the last `AT%NCELLMEAS=<n>`
    pub fn set_search_type(&self, search_type: SearchType) {
        let wire = search_type as u8;
        let old = self.search_type.swap(wire, Ordering::SeqCst);
        if old != wire {
            debug!("[NCELLMEAS] Search type {:?}", search_type);
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Handle one line from the modem
    pub fn on_notification(&self, line: &str) -> MonitorOutcome {
        if !Self::is_notification(line) {
            return MonitorOutcome::Ignored;
        }
        if self.is_paused() {
            debug!("[NCELLMEAS] Monitor paused, notification dropped");
            return MonitorOutcome::Paused;
        }

        // A new measurement supersedes the old one even if it fails to decode
        self.store.invalidate();

        let search_type = self.search_type();
        if !search_type.is_gci() {
            debug!("[NCELLMEAS] Neighbor cell count: {}", neighbor_count(line));
        }

        match decode_notification(line, search_type, &self.limits) {
            Ok(report) => {
                if let Some(t) = report.truncation {
                    warn!(
                        "[NCELLMEAS] Results truncated: {} neighbors dropped, GCI list capped: {}",
                        t.neighbors_dropped, t.gci_cells_capped
                    );
                }
                if report.is_failed() {
                    warn!("[NCELLMEAS] Measurement failed");
                } else {
                    info!(
                        "[NCELLMEAS] Cell {:#x}: {} neighbors, {} GCI cells ({:?})",
                        report.current_cell.id,
                        report.neighbors.len(),
                        report.gci_cells.len(),
                        report.status
                    );
                }
                debug!("[NCELLMEAS] {}", encode_notification(&report, search_type));

                self.store.publish(report);
                MonitorOutcome::Published {
                    measured: self.store.is_measured(),
                }
            }
            Err(e) => {
                warn!("[NCELLMEAS] Parsing failed: {}", e);
                MonitorOutcome::Rejected(e)
            }
        }
    }
}
