//! Error taxonomy shared by the decoders, the access-point parser, the
//! request state machine and the location client.

use thiserror::Error;

/// Hard failures of a `%NCELLMEAS` decode.
///
/// Any of these terminates the current decode; no partial report is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed notification: {0}")]
    Malformed(String),

    #[error("Field {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("Could not reserve storage for {0} records")]
    AllocationFailed(usize),
}

impl DecodeError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Errors from parsing the Wi-Fi access point parameters of a location command.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApParseError {
    #[error("MAC address {index} malformed: {text:?}")]
    MalformedMac { index: usize, text: String },

    #[error("RSSI {index} out of bounds ([{min},{max}]): {value}")]
    RssiOutOfRange {
        index: usize,
        value: i64,
        min: i8,
        max: i8,
    },

    #[error("Insufficient access point count (got {got}, min {min})")]
    InsufficientAccessPoints { got: usize, min: usize },

    #[error("Could not reserve storage for {0} access points")]
    AllocationFailed(usize),
}

/// Rejections of a location request before it is handed to the worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("A location request is already ongoing")]
    Busy,

    #[error("Not connected to the location service")]
    NotReady,

    #[error("No neighboring cell measurement available")]
    PreconditionFailed,

    #[error("Access point list rejected: {0}")]
    AccessPoints(#[from] ApParseError),

    #[error("Too many access point parameters for a request without Wi-Fi")]
    UnexpectedAccessPoints,

    #[error("Request queue unavailable")]
    QueueClosed,
}

impl RequestError {
    /// Errno-style code reported to the host for a rejected command.
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) => -22,
            Self::Busy => -16,
            Self::NotReady => -107,
            Self::PreconditionFailed => -11,
            Self::AccessPoints(ApParseError::MalformedMac { .. }) => -74,
            Self::AccessPoints(ApParseError::AllocationFailed(_)) => -12,
            Self::AccessPoints(_) => -22,
            Self::UnexpectedAccessPoints => -7,
            Self::QueueClosed => -5,
        }
    }
}

/// Terminal failures of a dispatched location request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocationError {
    #[error("Serving cell lookup failed: {0}")]
    CellLookup(String),

    #[error("Location service rejected the request: {code}")]
    Cloud { code: i32 },

    #[error("Location service unreachable: {0}")]
    Transport(String),

    #[error("Malformed reply from location service: {0}")]
    InvalidReply(String),
}

impl LocationError {
    /// Code reported to the host: the service's own positive error code when
    /// it sent one, otherwise -1.
    pub fn code(&self) -> i32 {
        match self {
            Self::Cloud { code } if *code > 0 => *code,
            _ => -1,
        }
    }
}
