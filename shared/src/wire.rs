//! JSON bodies exchanged with the location service
//!
//! One request and one reply per line. Requests carry LTE cells (the serving
//! cell with its neighbor measurement results, then any GCI cells) and/or
//! Wi-Fi access points.

use mac_address::MacAddress;
use serde::{Deserialize, Serialize};

use crate::model::{Cell, LocationResult, LocationType, MeasurementReport, NeighborCell, WifiApSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequestBody {
    pub device_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lte: Vec<LteCell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiBody>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LteCell {
    pub mcc: i32,
    pub mnc: i32,
    pub eci: u32,
    pub tac: u32,
    pub earfcn: i32,
    /// Timing advance, omitted when not measured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adv: Option<i32>,
    pub rsrp: i32,
    pub rsrq: i32,
    /// Neighbor measurement results
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nmr: Vec<NeighborMeasurement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborMeasurement {
    pub earfcn: i32,
    pub pci: i32,
    pub rsrp: i32,
    pub rsrq: i32,
    pub time_diff: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiBody {
    pub access_points: Vec<AccessPointBody>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointBody {
    pub mac_address: MacAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_strength: Option<i8>,
}

impl LteCell {
    /// `None` for cells without a valid identity, which the service cannot use
    pub fn new(cell: &Cell, neighbors: &[NeighborCell]) -> Option<Self> {
        if !cell.has_valid_id() {
            return None;
        }
        Some(Self {
            mcc: cell.mcc,
            mnc: cell.mnc,
            eci: cell.id,
            tac: cell.tac,
            earfcn: cell.earfcn,
            adv: cell.has_timing_advance().then_some(cell.timing_advance),
            rsrp: cell.rsrp,
            rsrq: cell.rsrq,
            nmr: neighbors
                .iter()
                .map(|n| NeighborMeasurement {
                    earfcn: n.earfcn,
                    pci: n.phys_cell_id,
                    rsrp: n.rsrp,
                    rsrq: n.rsrq,
                    time_diff: n.time_diff,
                })
                .collect(),
        })
    }

    /// Serving cell with its neighbors, followed by the GCI cells
    pub fn from_report(report: &MeasurementReport) -> Vec<Self> {
        Self::new(&report.current_cell, &report.neighbors)
            .into_iter()
            .chain(report.gci_cells.iter().filter_map(|c| Self::new(c, &[])))
            .collect()
    }
}

impl From<&WifiApSet> for WifiBody {
    fn from(set: &WifiApSet) -> Self {
        Self {
            access_points: set
                .iter()
                .map(|ap| AccessPointBody {
                    mac_address: ap.mac,
                    signal_strength: ap.rssi,
                })
                .collect(),
        }
    }
}

/// Positioning method reported back by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FulfilledWith {
    Scell,
    Mcell,
    Wifi,
}

impl From<FulfilledWith> for LocationType {
    fn from(value: FulfilledWith) -> Self {
        match value {
            FulfilledWith::Scell => Self::SingleCell,
            FulfilledWith::Mcell => Self::MultiCell,
            FulfilledWith::Wifi => Self::Wifi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub lat: f64,
    pub lon: f64,
    pub uncertainty: u32,
    pub fulfilled_with: FulfilledWith,
}

impl From<LocationFix> for LocationResult {
    fn from(fix: LocationFix) -> Self {
        Self {
            kind: fix.fulfilled_with.into(),
            latitude: fix.lat,
            longitude: fix.lon,
            uncertainty: fix.uncertainty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: i32,
}

/// A reply line: either a fix or an error code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocationReply {
    Fix(LocationFix),
    Error(ErrorBody),
}
