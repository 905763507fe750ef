//! Location service collaborators
//!
//! The orchestrator depends only on the traits here; [`tcp::TcpLocationClient`]
//! is the production implementation.

pub mod tcp;

pub use tcp::TcpLocationClient;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use cellfix_shared::{Cell, LocationError, LocationResult, MeasurementReport, WifiApSet};

/// Cellular data attached to a location request
#[derive(Debug, Clone)]
pub enum CellQuery {
    /// Freshly looked-up serving cell, no neighbors
    SingleCell(Cell),
    /// Latest measurement report, shared with the store
    MultiCell(Arc<MeasurementReport>),
}

/// Everything one location request carries
#[derive(Debug, Clone, Default)]
pub struct LocationQuery {
    pub cells: Option<CellQuery>,
    pub wifi: Option<WifiApSet>,
}

/// Source of the current serving cell for single-cell requests
#[async_trait]
pub trait CellInfoSource: Send + Sync {
    async fn serving_cell(&self) -> Result<Cell, LocationError>;
}

/// Location service client
#[async_trait]
pub trait LocationClient: Send + Sync {
    /// Check that the service is reachable
    async fn check_reachable(&self) -> Result<()>;

    /// Submit one request and wait for its result
    async fn locate(&self, query: LocationQuery) -> Result<LocationResult, LocationError>;
}

/// Link state shared by the command handlers and the orchestrator
#[derive(Debug, Default)]
pub struct CloudState {
    ready: AtomicBool,
    send_location: AtomicBool,
}

impl CloudState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn send_location(&self) -> bool {
        self.send_location.load(Ordering::SeqCst)
    }

    pub fn set_send_location(&self, enabled: bool) {
        self.send_location.store(enabled, Ordering::SeqCst);
    }
}
