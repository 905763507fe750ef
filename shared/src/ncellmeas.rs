//! Standard `%NCELLMEAS` decoder
//!
//! ```text
//! %NCELLMEAS: status [,<cell_id>,<plmn>,<tac>,<timing_advance>,<earfcn>,
//!     <phys_cell_id>,<rsrp>,<rsrq>,<measurement_time>
//!     [,<n_earfcn>,<n_phys_cell_id>,<n_rsrp>,<n_rsrq>,<time_diff>]*
//!     [,<ta_meas_time>]]
//! ```
//!
//! The neighbor count is derived from the number of commas in the raw text,
//! which also tells whether the trailing `ta_meas_time` (added in modem
//! firmware 1.3.1) is present.

use std::fmt::Write;

use crate::error::DecodeError;
use crate::field::{char_frequency, Fields};
use crate::model::{Cell, MeasurementReport, MeasurementStatus, NeighborCell, Truncation};
use crate::DecodeLimits;

pub const STATUS_INDEX: usize = 1;
const CELL_ID_INDEX: usize = 2;
const PLMN_INDEX: usize = 3;
const TAC_INDEX: usize = 4;
const TIMING_ADV_INDEX: usize = 5;
const EARFCN_INDEX: usize = 6;
const PHYS_CELL_ID_INDEX: usize = 7;
const RSRP_INDEX: usize = 8;
const RSRQ_INDEX: usize = 9;
const MEASUREMENT_TIME_INDEX: usize = 10;

/// Fields up to and including the serving cell block (name and status included)
pub const PRE_NCELLS_PARAMS_COUNT: usize = 11;
/// Fields per neighbor record
pub const NCELL_PARAMS_COUNT: usize = 5;

/// Notification prefix, including the separator
pub const NOTIFICATION_PREFIX: &str = "%NCELLMEAS:";

/// Number of neighbor records announced by a standard notification
///
/// Counted from the commas in the raw text. The result is the same whether or
/// not the optional trailing `ta_meas_time` is present.
pub fn neighbor_count(notification: &str) -> usize {
    let commas = char_frequency(notification, ',');
    if commas < PRE_NCELLS_PARAMS_COUNT {
        return 0;
    }
    // One more element than commas after the serving cell block.
    let ncell_elements = commas - (PRE_NCELLS_PARAMS_COUNT - 1) + 1;
    ncell_elements / NCELL_PARAMS_COUNT
}

/// Decode a standard notification
pub fn decode(notification: &str, limits: &DecodeLimits) -> Result<MeasurementReport, DecodeError> {
    let fields = Fields::parse_notification(notification)?;
    let status = read_status(&fields)?;

    match status {
        MeasurementStatus::Fail => return Ok(MeasurementReport::failed()),
        MeasurementStatus::Incomplete if fields.len() == STATUS_INDEX + 1 => {
            return Ok(MeasurementReport::empty(status));
        }
        _ => {}
    }

    if fields.len() < PRE_NCELLS_PARAMS_COUNT {
        return Err(DecodeError::malformed(format!(
            "expected at least {PRE_NCELLS_PARAMS_COUNT} fields, got {}",
            fields.len()
        )));
    }

    let (mcc, mnc) = fields.plmn(PLMN_INDEX)?;
    let mut cell = Cell {
        id: read_cell_id(&fields, CELL_ID_INDEX)?,
        mcc,
        mnc,
        tac: read_tac(&fields, TAC_INDEX)?,
        timing_advance: fields.int32(TIMING_ADV_INDEX, "timing_advance")?,
        timing_advance_meas_time: 0,
        earfcn: fields.int32(EARFCN_INDEX, "earfcn")?,
        phys_cell_id: fields.int32(PHYS_CELL_ID_INDEX, "phys_cell_id")?,
        rsrp: fields.int32(RSRP_INDEX, "rsrp")?,
        rsrq: fields.int32(RSRQ_INDEX, "rsrq")?,
        measurement_time: fields.int(MEASUREMENT_TIME_INDEX, "measurement_time")?,
    };

    let ncells_count = neighbor_count(notification);
    let ta_meas_time_index = PRE_NCELLS_PARAMS_COUNT + ncells_count * NCELL_PARAMS_COUNT;
    if fields.len() < ta_meas_time_index {
        return Err(DecodeError::malformed(format!(
            "{ncells_count} neighbors need {ta_meas_time_index} fields, got {}",
            fields.len()
        )));
    }
    if fields.len() > ta_meas_time_index {
        cell.timing_advance_meas_time = fields.int(ta_meas_time_index, "ta_meas_time")?;
    }

    let kept = ncells_count.min(limits.neighbor_cells_max);
    let mut neighbors = Vec::new();
    neighbors
        .try_reserve_exact(kept)
        .map_err(|_| DecodeError::AllocationFailed(kept))?;

    for i in 0..kept {
        let start = PRE_NCELLS_PARAMS_COUNT + i * NCELL_PARAMS_COUNT;
        neighbors.push(read_neighbor(&fields, start)?);
    }

    let truncation = (ncells_count > kept).then(|| Truncation {
        neighbors_dropped: ncells_count - kept,
        gci_cells_capped: false,
    });

    Ok(MeasurementReport {
        status,
        current_cell: cell,
        neighbors,
        gci_cells: Vec::new(),
        truncation,
        serving_cell_reported: true,
    })
}

/// Re-encode a report as a standard notification, for diagnostic display
///
/// Values are written exactly as decoded, so decoding the output yields the
/// same cells and neighbors.
pub fn encode(report: &MeasurementReport) -> String {
    let mut out = format!("{NOTIFICATION_PREFIX} {}", report.status.to_wire());
    if report.is_failed() || (!report.carries_serving_block() && report.neighbors.is_empty()) {
        return out;
    }

    let cell = &report.current_cell;
    write_cell_head(&mut out, cell);
    let _ = write!(
        out,
        ",{},{},{},{},{},{}",
        cell.timing_advance, cell.earfcn, cell.phys_cell_id, cell.rsrp, cell.rsrq, cell.measurement_time
    );
    for n in &report.neighbors {
        write_neighbor(&mut out, n);
    }
    let _ = write!(out, ",{}", cell.timing_advance_meas_time);
    out
}

pub(crate) fn read_status(fields: &Fields<'_>) -> Result<MeasurementStatus, DecodeError> {
    let value = fields.int32(STATUS_INDEX, "status")?;
    MeasurementStatus::from_wire(value).ok_or(DecodeError::OutOfRange {
        field: "status",
        value: value.into(),
    })
}

/// Cell ids above the 28-bit range are kept as [`Cell::ID_INVALID`]
pub(crate) fn read_cell_id(fields: &Fields<'_>, idx: usize) -> Result<u32, DecodeError> {
    let id = fields.hex_string(idx, "cell_id")?;
    Ok(u32::try_from(id)
        .ok()
        .filter(|&id| id <= Cell::ID_MAX)
        .unwrap_or(Cell::ID_INVALID))
}

pub(crate) fn read_tac(fields: &Fields<'_>, idx: usize) -> Result<u32, DecodeError> {
    let tac = fields.hex_string(idx, "tac")?;
    u32::try_from(tac).map_err(|_| DecodeError::OutOfRange {
        field: "tac",
        value: tac,
    })
}

pub(crate) fn read_neighbor(fields: &Fields<'_>, start: usize) -> Result<NeighborCell, DecodeError> {
    Ok(NeighborCell {
        earfcn: fields.int32(start, "n_earfcn")?,
        phys_cell_id: fields.int32(start + 1, "n_phys_cell_id")?,
        rsrp: fields.int32(start + 2, "n_rsrp")?,
        rsrq: fields.int32(start + 3, "n_rsrq")?,
        time_diff: fields.int32(start + 4, "time_diff")?,
    })
}

pub(crate) fn write_cell_head(out: &mut String, cell: &Cell) {
    let _ = write!(
        out,
        ",\"{:08X}\",\"{:03}{:02}\",\"{:04X}\"",
        cell.id, cell.mcc, cell.mnc, cell.tac
    );
}

pub(crate) fn write_neighbor(out: &mut String, n: &NeighborCell) {
    let _ = write!(
        out,
        ",{},{},{},{},{}",
        n.earfcn, n.phys_cell_id, n.rsrp, n.rsrq, n.time_diff
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_NEIGHBORS: &str = "%NCELLMEAS: 0,\"00011B07\",\"26295\",\"00B7\",10,7300,0,63,-8,13584,\
        6400,309,55,-10,20,1800,28,42,-12,25,13590";

    fn notification(neighbors: usize, ta_meas_time: bool) -> String {
        let mut text = String::from("%NCELLMEAS: 0,\"0199F10A\",\"310260\",\"4A2F\",1,5110,210,47,-5,9000");
        for i in 0..neighbors {
            text.push_str(&format!(",{},{},{},{},{}", 5110 + i, 100 + i, 40 - i as i32, -10, i * 2));
        }
        if ta_meas_time {
            text.push_str(",9050");
        }
        text
    }

    #[test]
    fn test_neighbor_count_ignores_ta_meas_time() {
        assert_eq!(neighbor_count(TWO_NEIGHBORS), 2);
        assert_eq!(neighbor_count(&notification(0, false)), 0);
        assert_eq!(neighbor_count(&notification(0, true)), 0);
        assert_eq!(neighbor_count(&notification(1, false)), 1);
        assert_eq!(neighbor_count(&notification(4, true)), 4);
        assert_eq!(neighbor_count("%NCELLMEAS: 1"), 0);
    }

    #[test]
    fn test_decode_serving_cell_and_neighbors() {
        let report = decode(TWO_NEIGHBORS, &DecodeLimits::default()).expect("decode failed");

        assert_eq!(report.status, MeasurementStatus::Success);
        assert!(report.truncation.is_none());

        let cell = report.current_cell;
        assert_eq!(cell.id, 0x11B07);
        assert_eq!((cell.mcc, cell.mnc), (262, 95));
        assert_eq!(cell.tac, 0xB7);
        assert_eq!(cell.timing_advance, 10);
        assert_eq!(cell.earfcn, 7300);
        assert_eq!(cell.phys_cell_id, 0);
        assert_eq!(cell.rsrp, 63);
        assert_eq!(cell.rsrq, -8);
        assert_eq!(cell.measurement_time, 13584);
        assert_eq!(cell.timing_advance_meas_time, 13590);

        assert_eq!(
            report.neighbors,
            vec![
                NeighborCell { earfcn: 6400, phys_cell_id: 309, rsrp: 55, rsrq: -10, time_diff: 20 },
                NeighborCell { earfcn: 1800, phys_cell_id: 28, rsrp: 42, rsrq: -12, time_diff: 25 },
            ]
        );
    }

    #[test]
    fn test_ta_meas_time_absent_defaults_to_zero() {
        let report = decode(&notification(3, false), &DecodeLimits::default()).unwrap();
        assert_eq!(report.neighbors.len(), 3);
        assert_eq!(report.current_cell.timing_advance_meas_time, 0);
        assert_eq!(report.neighbors[2].time_diff, 4);
    }

    #[test]
    fn test_neighbor_overflow_truncates_in_arrival_order() {
        let limits = DecodeLimits {
            neighbor_cells_max: 2,
            ..Default::default()
        };
        let report = decode(&notification(5, true), &limits).expect("truncation is not an error");

        assert_eq!(report.neighbors.len(), 2);
        assert_eq!(report.neighbors[0].earfcn, 5110);
        assert_eq!(report.neighbors[1].earfcn, 5111);
        assert_eq!(
            report.truncation,
            Some(Truncation {
                neighbors_dropped: 3,
                gci_cells_capped: false
            })
        );
        assert_eq!(report.current_cell.timing_advance_meas_time, 9050);
    }

    #[test]
    fn test_plmn_with_three_digit_mnc() {
        let report = decode(&notification(0, true), &DecodeLimits::default()).unwrap();
        assert_eq!((report.current_cell.mcc, report.current_cell.mnc), (310, 260));
    }

    #[test]
    fn test_out_of_range_cell_id_is_invalid_not_error() {
        let text = TWO_NEIGHBORS.replace("00011B07", "FFFFFFFF");
        let report = decode(&text, &DecodeLimits::default()).expect("decode failed");
        assert_eq!(report.current_cell.id, Cell::ID_INVALID);
        assert_eq!(report.neighbors.len(), 2);

        let text = TWO_NEIGHBORS.replace("00011B07", "10000000");
        let report = decode(&text, &DecodeLimits::default()).unwrap();
        assert_eq!(report.current_cell.id, Cell::ID_INVALID);
    }

    #[test]
    fn test_failed_status_is_not_an_error() {
        let report = decode("%NCELLMEAS: 1", &DecodeLimits::default()).expect("fail is expected");
        assert!(report.is_failed());
        assert!(!report.has_serving_cell());

        // Data after a failure status is ignored.
        let report = decode(&TWO_NEIGHBORS.replacen(": 0", ": 1", 1), &DecodeLimits::default()).unwrap();
        assert!(report.is_failed());
        assert!(report.neighbors.is_empty());
    }

    #[test]
    fn test_incomplete_without_results() {
        let report = decode("%NCELLMEAS: 2\r\n", &DecodeLimits::default()).unwrap();
        assert_eq!(report.status, MeasurementStatus::Incomplete);
        assert!(!report.has_serving_cell());
    }

    #[test]
    fn test_incomplete_with_results_is_decoded() {
        let text = TWO_NEIGHBORS.replacen(": 0", ": 2", 1);
        let report = decode(&text, &DecodeLimits::default()).unwrap();
        assert_eq!(report.status, MeasurementStatus::Incomplete);
        assert_eq!(report.neighbors.len(), 2);
    }

    #[test]
    fn test_too_few_fields_is_malformed() {
        let err = decode("%NCELLMEAS: 0,\"00011B07\",\"26295\"", &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_bad_plmn_is_malformed() {
        let text = TWO_NEIGHBORS.replace("26295", "26A95");
        assert!(matches!(
            decode(&text, &DecodeLimits::default()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_neighbor_field_is_malformed() {
        let text = TWO_NEIGHBORS.replace(",309,", ",x,");
        assert!(matches!(
            decode(&text, &DecodeLimits::default()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        assert!(matches!(
            decode("%NCELLMEAS: 7", &DecodeLimits::default()),
            Err(DecodeError::OutOfRange { field: "status", .. })
        ));
    }

    #[test]
    fn test_encode_reproduces_decoded_values() {
        let limits = DecodeLimits::default();
        let report = decode(TWO_NEIGHBORS, &limits).unwrap();

        let text = encode(&report);
        assert_eq!(text, TWO_NEIGHBORS);
        assert_eq!(decode(&text, &limits).unwrap(), report);

        let failed = MeasurementReport::failed();
        assert_eq!(decode(&encode(&failed), &limits).unwrap(), failed);
    }

    #[test]
    fn test_encode_keeps_cell_with_invalid_id() {
        let limits = DecodeLimits::default();
        let text = "%NCELLMEAS: 0,\"FFFFFFFF\",\"26295\",\"00B7\",10,7300,0,63,-8,13584,13590";
        let report = decode(text, &limits).unwrap();
        assert!(!report.has_serving_cell());
        assert!(report.serving_cell_reported);

        let encoded = encode(&report);
        assert_eq!(encoded, text);
        assert_eq!(decode(&encoded, &limits).unwrap(), report);

        // Over-range ids come back as the invalid id with every other value intact
        let report = decode(&TWO_NEIGHBORS.replace("00011B07", "10000000"), &limits).unwrap();
        let again = decode(&encode(&report), &limits).unwrap();
        assert_eq!(again, report);
        assert_eq!(again.neighbors.len(), 2);
    }

    #[test]
    fn test_encode_incomplete_without_results() {
        let limits = DecodeLimits::default();
        let report = decode("%NCELLMEAS: 2", &limits).unwrap();
        assert_eq!(encode(&report), "%NCELLMEAS: 2");
        assert_eq!(decode(&encode(&report), &limits).unwrap(), report);
    }
}
