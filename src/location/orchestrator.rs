//! Location Request Orchestrator
//!
//! Accepts `AT#XNRFCLOUDPOS` requests on the command path and hands them to
//! a single background worker. The caller gets an immediate accept or reject;
//! the outcome arrives later as a [`LocationEvent`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cellfix_shared::state_machine::{
    CellMode, LocationStateMachine, RequestContext, RequestEvent, TransitionResult,
};
use cellfix_shared::{LocationResult, RequestError, WifiApSet};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::cloud::{CellInfoSource, CellQuery, CloudState, LocationClient, LocationQuery};
use crate::notification::MeasurementStore;

/// Terminal outcome of an accepted request
#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Resolved(LocationResult),
    /// Positive service error code, or -1
    Failed(i32),
}

impl LocationEvent {
    /// Unsolicited response line for the host
    pub fn response(&self) -> String {
        match self {
            Self::Resolved(r) => format!(
                "#XNRFCLOUDPOS: {},{:.6},{:.6},{}",
                r.kind.to_wire(),
                r.latitude,
                r.longitude,
                r.uncertainty
            ),
            Self::Failed(code) => format!("#XNRFCLOUDPOS: {code}"),
        }
    }
}

/// Work item for the background worker; owns the access points
#[derive(Debug)]
struct LocationJob {
    cell_mode: CellMode,
    wifi: Option<WifiApSet>,
}

type SharedMachine = Arc<Mutex<LocationStateMachine>>;

fn lock(fsm: &Mutex<LocationStateMachine>) -> MutexGuard<'_, LocationStateMachine> {
    fsm.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct LocationOrchestrator {
    fsm: SharedMachine,
    store: MeasurementStore,
    cloud_state: Arc<CloudState>,
    wifi_ap_min: usize,
    job_tx: mpsc::Sender<LocationJob>,
}

impl LocationOrchestrator {
    /// Create the orchestrator and start its worker
    pub fn new(
        store: MeasurementStore,
        cloud_state: Arc<CloudState>,
        cells: Arc<dyn CellInfoSource>,
        client: Arc<dyn LocationClient>,
        wifi_ap_min: usize,
    ) -> (Self, mpsc::Receiver<LocationEvent>) {
        let (job_tx, job_rx) = mpsc::channel::<LocationJob>(1);
        let (event_tx, event_rx) = mpsc::channel::<LocationEvent>(8);
        let fsm: SharedMachine = Arc::new(Mutex::new(LocationStateMachine::new()));

        let worker = WorkerContext {
            fsm: fsm.clone(),
            store: store.clone(),
            cells,
            client,
        };
        tokio::spawn(async move {
            location_worker(job_rx, worker, event_tx).await;
        });

        let orchestrator = Self {
            fsm,
            store,
            cloud_state,
            wifi_ap_min,
            job_tx,
        };
        (orchestrator, event_rx)
    }

    pub fn busy(&self) -> bool {
        lock(&self.fsm).busy()
    }

    /// Validate `<cell_mode>,<wifi_mode>[,<mac>[,<rssi>]]*` and queue the request
    pub fn request<S: AsRef<str>>(&self, params: &[S]) -> Result<(), RequestError> {
        let ctx = RequestContext {
            cloud_ready: self.cloud_state.is_ready(),
            measured: self.store.is_measured(),
            wifi_ap_min: self.wifi_ap_min,
        };

        // Held until Dispatched so the worker cannot finish the job first
        let mut fsm = lock(&self.fsm);
        let accepted = fsm.begin(params, ctx)?;
        let ap_count = accepted.wifi.as_ref().map_or(0, WifiApSet::len);

        let job = LocationJob {
            cell_mode: accepted.cell_mode,
            wifi: accepted.wifi,
        };
        if self.job_tx.try_send(job).is_err() {
            fsm.process_event(RequestEvent::Aborted);
            return Err(RequestError::QueueClosed);
        }
        fsm.process_event(RequestEvent::Dispatched);

        info!(
            "[LOCATION] Request queued: cell mode {:?}, {} access points",
            accepted.cell_mode, ap_count
        );
        Ok(())
    }
}

#[derive(Clone)]
struct WorkerContext {
    fsm: SharedMachine,
    store: MeasurementStore,
    cells: Arc<dyn CellInfoSource>,
    client: Arc<dyn LocationClient>,
}

/// Returns the state machine to `Idle` when dropped, on every exit path
struct DispatchGuard {
    fsm: SharedMachine,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        if let TransitionResult::Invalid { from, .. } = lock(&self.fsm).process_event(RequestEvent::Finished) {
            warn!("[LOCATION] Request finished while {:?}", from);
        }
    }
}

async fn location_worker(
    mut job_rx: mpsc::Receiver<LocationJob>,
    ctx: WorkerContext,
    event_tx: mpsc::Sender<LocationEvent>,
) {
    while let Some(job) = job_rx.recv().await {
        let guard = DispatchGuard { fsm: ctx.fsm.clone() };
        let task_ctx = ctx.clone();

        // Run in its own task so a panic still releases the guard
        let result = tokio::spawn(async move {
            let _guard = guard;
            run_job(job, &task_ctx).await
        })
        .await;

        let event = result.unwrap_or_else(|e| {
            error!("[LOCATION] Request task failed: {}", e);
            LocationEvent::Failed(-1)
        });
        if event_tx.send(event).await.is_err() {
            debug!("[LOCATION] Event receiver closed, worker exiting");
            break;
        }
    }
}

async fn run_job(job: LocationJob, ctx: &WorkerContext) -> LocationEvent {
    let cells = match job.cell_mode {
        CellMode::None => None,
        CellMode::SingleCell => {
            let lookup = ctx.cells.serving_cell().await;
            // The lookup overwrites part of the stored measurement
            ctx.store.invalidate();
            match lookup {
                Ok(cell) => Some(CellQuery::SingleCell(cell)),
                Err(e) => {
                    error!("[LOCATION] Failed to obtain single-cell information: {}", e);
                    return LocationEvent::Failed(e.code());
                }
            }
        }
        CellMode::MultiCell => ctx.store.latest().map(CellQuery::MultiCell),
    };

    let query = LocationQuery {
        cells,
        wifi: job.wifi,
    };
    match ctx.client.locate(query).await {
        Ok(result) => {
            info!(
                "[LOCATION] Resolved ({:?}): {:.6},{:.6} +/- {} m",
                result.kind, result.latitude, result.longitude, result.uncertainty
            );
            LocationEvent::Resolved(result)
        }
        Err(e) => {
            error!("[LOCATION] Request failed: {}", e);
            LocationEvent::Failed(e.code())
        }
    }
}
