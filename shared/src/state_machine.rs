//! Location Request State Machine
//!
//! Tracks the single location request that may be in flight and validates new
//! requests against it. Transitions:
//!
//! ```text
//! Idle --Begin--> Building --Dispatched--> Dispatched --Finished--> Idle
//!                    |
//!                    +------Aborted------> Idle
//! ```

use crate::error::RequestError;
use crate::field::str_to_int;
use crate::model::WifiApSet;
use crate::wifi::parse_access_points;

/// Cellular part of a location request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellMode {
    #[default]
    None,
    /// Serving cell only, refreshed right before the request
    SingleCell,
    /// Serving cell and neighbors from the last `%NCELLMEAS`
    MultiCell,
}

impl CellMode {
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::SingleCell),
            2 => Some(Self::MultiCell),
            _ => None,
        }
    }
}

/// Progress of the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestPhase {
    #[default]
    Idle,
    /// Parameters accepted, request being assembled
    Building,
    /// Handed to the background worker
    Dispatched,
}

/// Events that can trigger phase transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// A request passed validation
    Begin { cell_mode: CellMode, wifi: bool },
    /// The request was queued for the worker
    Dispatched,
    /// The request was dropped before reaching the worker
    Aborted,
    /// The worker finished with the request, successfully or not
    Finished,
}

/// Result of a transition attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    Success(RequestPhase),
    Invalid { from: RequestPhase, event: RequestEvent },
}

impl TransitionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Conditions outside the state machine that gate a new request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestContext {
    /// Connected to the location service
    pub cloud_ready: bool,
    /// A successful neighbor measurement is available
    pub measured: bool,
    /// Minimum number of access points for a Wi-Fi request
    pub wifi_ap_min: usize,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedRequest {
    pub cell_mode: CellMode,
    /// Present iff Wi-Fi positioning was requested
    pub wifi: Option<WifiApSet>,
}

/// Parameter index of the first access point (after cell and Wi-Fi modes)
pub const WIFI_APS_BEGIN_IDX: usize = 2;

/// The location request state machine
#[derive(Debug, Default)]
pub struct LocationStateMachine {
    phase: RequestPhase,
    cell_mode: CellMode,
    wifi_mode: bool,
}

impl LocationStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    /// A request is being built or is in flight
    pub fn busy(&self) -> bool {
        self.phase != RequestPhase::Idle
    }

    /// Modes of the current (or last) request
    pub fn modes(&self) -> (CellMode, bool) {
        (self.cell_mode, self.wifi_mode)
    }

    /// Validate location command parameters and move to `Building`
    ///
    /// `params` are `<cell_mode>,<wifi_mode>[,<mac>[,<rssi>]]*`. Checks run in
    /// a fixed order: link readiness, busy, argument shape, measurement
    /// availability, stray access points, then the access point list itself.
    /// On any error the machine is left in (or returned to) `Idle`.
    pub fn begin<S: AsRef<str>>(
        &mut self,
        params: &[S],
        ctx: RequestContext,
    ) -> Result<AcceptedRequest, RequestError> {
        if !ctx.cloud_ready {
            return Err(RequestError::NotReady);
        }
        if self.busy() {
            return Err(RequestError::Busy);
        }
        if params.len() < WIFI_APS_BEGIN_IDX {
            return Err(RequestError::InvalidArgument(format!(
                "expected at least {WIFI_APS_BEGIN_IDX} parameters, got {}",
                params.len()
            )));
        }

        let cell_mode = mode_param(params[0].as_ref(), "cell_mode")?;
        let wifi_mode = mode_param(params[1].as_ref(), "wifi_mode")?;
        let cell_mode = CellMode::from_wire(cell_mode)
            .ok_or_else(|| RequestError::InvalidArgument(format!("cell_mode {cell_mode}")))?;
        let wifi = match wifi_mode {
            0 => false,
            1 => true,
            other => return Err(RequestError::InvalidArgument(format!("wifi_mode {other}"))),
        };
        if cell_mode == CellMode::None && !wifi {
            return Err(RequestError::InvalidArgument(
                "at least one of cellular/Wi-Fi information must be included".into(),
            ));
        }
        if cell_mode == CellMode::MultiCell && !ctx.measured {
            return Err(RequestError::PreconditionFailed);
        }

        let ap_params = &params[WIFI_APS_BEGIN_IDX..];
        if !wifi && !ap_params.is_empty() {
            return Err(RequestError::UnexpectedAccessPoints);
        }

        let transition = self.process_event(RequestEvent::Begin { cell_mode, wifi });
        debug_assert!(transition.is_success());

        let wifi = if wifi {
            match parse_access_points(ap_params, ctx.wifi_ap_min) {
                Ok(set) => Some(set),
                Err(e) => {
                    self.process_event(RequestEvent::Aborted);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        Ok(AcceptedRequest { cell_mode, wifi })
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: RequestEvent) -> TransitionResult {
        let next = match (self.phase, event) {
            (RequestPhase::Idle, RequestEvent::Begin { cell_mode, wifi }) => {
                self.cell_mode = cell_mode;
                self.wifi_mode = wifi;
                RequestPhase::Building
            }
            (RequestPhase::Building, RequestEvent::Dispatched) => RequestPhase::Dispatched,
            (RequestPhase::Building, RequestEvent::Aborted) => RequestPhase::Idle,
            (RequestPhase::Dispatched, RequestEvent::Finished) => RequestPhase::Idle,
            (from, event) => return TransitionResult::Invalid { from, event },
        };
        self.phase = next;
        TransitionResult::Success(next)
    }
}

fn mode_param(text: &str, name: &str) -> Result<i64, RequestError> {
    str_to_int(text, 10).map_err(|_| RequestError::InvalidArgument(format!("{name} {text:?}")))
}
