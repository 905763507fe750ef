//! cellfix shared types
//!
//! Measurement data model, `%NCELLMEAS` decoders, the Wi-Fi access point
//! parser, the `%XMONITOR` serving cell decoder, the location request state
//! machine, the line codec used by the device, and the JSON bodies
//! exchanged with the location service.
//! Everything here is synchronous and free of I/O.

pub mod codec;
pub mod error;
pub mod field;
pub mod gci;
pub mod model;
pub mod ncellmeas;
pub mod state_machine;
pub mod wifi;
pub mod wire;
pub mod xmonitor;

pub use error::{ApParseError, DecodeError, LocationError, RequestError};
pub use model::{
    Cell, LocationResult, LocationType, MeasurementReport, MeasurementStatus, NeighborCell,
    Truncation, WifiAp, WifiApSet,
};

/// Capacity and validation bounds
pub mod limits {
    /// Neighbor cells kept per report; the default and the largest accepted capacity
    pub const NEIGHBOR_CELLS_MAX: usize = 10;

    /// Non-serving cells kept from a GCI search; the default and the largest
    /// accepted capacity
    pub const GCI_CELLS_MAX: usize = 10;

    /// Default minimum number of access points for a Wi-Fi request
    pub const WIFI_AP_COUNT_MIN: usize = 2;

    /// Accepted RSSI range for access points, in dBm
    pub const RSSI_MIN: i8 = -128;
    pub const RSSI_MAX: i8 = 0;

    /// Longest line accepted on the host and modem links
    pub const MAX_LINE_LEN: usize = 4096;
}

/// Storage bounds applied while decoding a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    pub neighbor_cells_max: usize,
    pub gci_cells_max: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            neighbor_cells_max: limits::NEIGHBOR_CELLS_MAX,
            gci_cells_max: limits::GCI_CELLS_MAX,
        }
    }
}

/// Neighbor search type requested with `AT%NCELLMEAS=<n>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchType {
    #[default]
    Default,
    ExtendedLight,
    ExtendedComplete,
    GciDefault,
    GciExtendedLight,
    GciExtendedComplete,
}

impl SearchType {
    pub fn from_wire(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Default),
            1 => Some(Self::ExtendedLight),
            2 => Some(Self::ExtendedComplete),
            3 => Some(Self::GciDefault),
            4 => Some(Self::GciExtendedLight),
            5 => Some(Self::GciExtendedComplete),
            _ => None,
        }
    }

    /// GCI searches report every cell as a full block and need the GCI decoder
    pub fn is_gci(self) -> bool {
        matches!(
            self,
            Self::GciDefault | Self::GciExtendedLight | Self::GciExtendedComplete
        )
    }
}

/// Decode a notification with the decoder matching `search_type`
pub fn decode_notification(
    notification: &str,
    search_type: SearchType,
    limits: &DecodeLimits,
) -> Result<MeasurementReport, DecodeError> {
    if search_type.is_gci() {
        gci::decode(notification, limits)
    } else {
        ncellmeas::decode(notification, limits)
    }
}

/// Re-encode a report in the notification variant matching `search_type`
pub fn encode_notification(report: &MeasurementReport, search_type: SearchType) -> String {
    if search_type.is_gci() {
        gci::encode(report)
    } else {
        ncellmeas::encode(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_type_classification() {
        assert_eq!(SearchType::from_wire(0), Some(SearchType::Default));
        assert!(!SearchType::ExtendedComplete.is_gci());
        assert!(SearchType::from_wire(3).unwrap().is_gci());
        assert!(SearchType::from_wire(5).unwrap().is_gci());
        assert_eq!(SearchType::from_wire(6), None);
        assert_eq!(SearchType::from_wire(-1), None);
    }

    #[test]
    fn test_default_limits() {
        let limits = DecodeLimits::default();
        assert_eq!(limits.neighbor_cells_max, 10);
        assert_eq!(limits.gci_cells_max, 10);
    }

    #[test]
    fn test_decode_notification_dispatches_on_search_type() {
        let standard = "%NCELLMEAS: 0,\"00011B07\",\"26295\",\"00B7\",10,7300,0,63,-8,13584";
        let report = decode_notification(standard, SearchType::Default, &DecodeLimits::default())
            .expect("standard decode failed");
        assert_eq!(report.current_cell.id, 0x11B07);

        // Ten parameters are not a full GCI block, so nothing is stored
        let report = decode_notification(standard, SearchType::GciDefault, &DecodeLimits::default())
            .expect("short GCI input is not an error");
        assert!(!report.has_serving_cell());
        assert!(report.gci_cells.is_empty());
    }
}
