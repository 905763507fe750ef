//! Measurement and location data model

use mac_address::MacAddress;

/// Outcome reported by the modem in the first `%NCELLMEAS` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementStatus {
    #[default]
    Success,
    /// The measurement failed; the notification carries no cell data
    Fail,
    /// The measurement was interrupted; results may be partial or absent
    Incomplete,
}

impl MeasurementStatus {
    /// Map the wire value (0, 1, 2) to a status
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::Fail),
            2 => Some(Self::Incomplete),
            _ => None,
        }
    }

    pub fn to_wire(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Fail => 1,
            Self::Incomplete => 2,
        }
    }
}

/// One measured LTE cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub id: u32,
    pub mcc: i32,
    pub mnc: i32,
    pub tac: u32,
    pub timing_advance: i32,
    pub timing_advance_meas_time: i64,
    pub earfcn: i32,
    pub phys_cell_id: i32,
    pub rsrp: i32,
    pub rsrq: i32,
    pub measurement_time: i64,
}

impl Cell {
    /// Largest valid E-UTRAN cell identity (28 bits)
    pub const ID_MAX: u32 = 0x0FFF_FFFF;
    /// Cell identity used when the modem reports none or an out-of-range one
    pub const ID_INVALID: u32 = u32::MAX;
    /// Timing advance value meaning "not measured"
    pub const TIMING_ADVANCE_OMIT: i32 = 65535;

    pub fn has_valid_id(&self) -> bool {
        self.id <= Self::ID_MAX
    }

    pub fn has_timing_advance(&self) -> bool {
        self.timing_advance != Self::TIMING_ADVANCE_OMIT
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            id: Self::ID_INVALID,
            mcc: 0,
            mnc: 0,
            tac: 0,
            timing_advance: Self::TIMING_ADVANCE_OMIT,
            timing_advance_meas_time: 0,
            earfcn: 0,
            phys_cell_id: 0,
            rsrp: 0,
            rsrq: 0,
            measurement_time: 0,
        }
    }
}

/// A neighbor of the serving cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborCell {
    pub earfcn: i32,
    pub phys_cell_id: i32,
    pub rsrp: i32,
    pub rsrq: i32,
    pub time_diff: i32,
}

/// Marker for a decode that ran past a configured capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Truncation {
    /// Neighbor records present on the wire but not stored
    pub neighbors_dropped: usize,
    /// Cell blocks were left unread because the GCI cell list was full
    pub gci_cells_capped: bool,
}

/// Decoded `%NCELLMEAS` notification
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementReport {
    pub status: MeasurementStatus,
    pub current_cell: Cell,
    /// Neighbors of the serving cell, in arrival order
    pub neighbors: Vec<NeighborCell>,
    /// Non-serving cells from a GCI search, in arrival order
    pub gci_cells: Vec<Cell>,
    pub truncation: Option<Truncation>,
    /// The notification carried a serving cell block, even one whose id
    /// decoded to [`Cell::ID_INVALID`]
    pub serving_cell_reported: bool,
}

impl MeasurementReport {
    /// A report for a measurement the modem flagged as failed
    pub fn failed() -> Self {
        Self {
            status: MeasurementStatus::Fail,
            ..Default::default()
        }
    }

    /// A report with the given status and no cell data
    pub fn empty(status: MeasurementStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == MeasurementStatus::Fail
    }

    pub fn is_truncated(&self) -> bool {
        self.truncation.is_some()
    }

    /// Whether the report carries a serving cell usable for positioning
    pub fn has_serving_cell(&self) -> bool {
        self.current_cell.has_valid_id()
    }

    /// Whether a serving cell block has to be written back when re-encoding
    pub fn carries_serving_block(&self) -> bool {
        self.serving_cell_reported || self.has_serving_cell()
    }
}

/// A scanned Wi-Fi access point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WifiAp {
    pub mac: MacAddress,
    /// `None` when the host did not supply a signal strength
    pub rssi: Option<i8>,
}

/// Access points supplied with one location command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WifiApSet {
    aps: Vec<WifiAp>,
}

impl WifiApSet {
    pub(crate) fn from_vec(aps: Vec<WifiAp>) -> Self {
        Self { aps }
    }

    pub fn len(&self) -> usize {
        self.aps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aps.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, WifiAp> {
        self.aps.iter()
    }

    pub fn as_slice(&self) -> &[WifiAp] {
        &self.aps
    }
}

impl<'a> IntoIterator for &'a WifiApSet {
    type Item = &'a WifiAp;
    type IntoIter = std::slice::Iter<'a, WifiAp>;

    fn into_iter(self) -> Self::IntoIter {
        self.aps.iter()
    }
}

/// Which method the location service used to resolve a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationType {
    SingleCell,
    MultiCell,
    Wifi,
}

impl LocationType {
    pub fn to_wire(self) -> i32 {
        match self {
            Self::SingleCell => 0,
            Self::MultiCell => 1,
            Self::Wifi => 2,
        }
    }
}

/// Terminal result of a location request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationResult {
    pub kind: LocationType,
    pub latitude: f64,
    pub longitude: f64,
    /// Radius in meters
    pub uncertainty: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_mapping() {
        assert_eq!(MeasurementStatus::from_wire(0), Some(MeasurementStatus::Success));
        assert_eq!(MeasurementStatus::from_wire(1), Some(MeasurementStatus::Fail));
        assert_eq!(MeasurementStatus::from_wire(2), Some(MeasurementStatus::Incomplete));
        assert_eq!(MeasurementStatus::from_wire(3), None);
        assert_eq!(MeasurementStatus::Incomplete.to_wire(), 2);
    }

    #[test]
    fn test_default_cell_is_invalid() {
        let cell = Cell::default();
        assert!(!cell.has_valid_id());
        assert!(!cell.has_timing_advance());
    }

    #[test]
    fn test_failed_report() {
        let report = MeasurementReport::failed();
        assert!(report.is_failed());
        assert!(!report.has_serving_cell());
        assert!(report.neighbors.is_empty());
    }
}
