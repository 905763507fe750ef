//! `%NCELLMEAS` decoder for GCI search types
//!
//! ```text
//! %NCELLMEAS: status
//!     [,<cell_id>,<plmn>,<tac>,<ta>,<ta_meas_time>,<earfcn>,<phys_cell_id>,
//!       <rsrp>,<rsrq>,<meas_time>,<serving>,<neighbor_count>
//!       [,<n_earfcn>,<n_phys_cell_id>,<n_rsrp>,<n_rsrq>,<time_diff>]*]*
//! ```
//!
//! Every discovered cell is reported as a full block. Only the serving cell
//! carries a neighbor list in practice, so neighbors are only kept for it.

use std::fmt::Write;

use crate::error::DecodeError;
use crate::field::Fields;
use crate::model::{Cell, MeasurementReport, MeasurementStatus, Truncation};
use crate::ncellmeas::{
    read_cell_id, read_neighbor, read_status, read_tac, write_cell_head, write_neighbor,
    NCELL_PARAMS_COUNT, NOTIFICATION_PREFIX, STATUS_INDEX,
};
use crate::DecodeLimits;

/// Fields per cell block, `neighbor_count` included
pub const GCI_CELL_PARAMS_COUNT: usize = 12;

/// Decode a GCI notification
///
/// Neighbor records beyond `limits.neighbor_cells_max` are stepped over
/// without being parsed. Decoding stops once `limits.gci_cells_max`
/// non-serving cells are stored.
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

    let blocks_that_fit = fields.len().saturating_sub(STATUS_INDEX + 1) / GCI_CELL_PARAMS_COUNT;
    let gci_capacity = blocks_that_fit.min(limits.gci_cells_max);
    let mut gci_cells = Vec::new();
    gci_cells
        .try_reserve_exact(gci_capacity)
        .map_err(|_| DecodeError::AllocationFailed(gci_capacity))?;

    let mut report = MeasurementReport {
        status,
        ..Default::default()
    };
    let mut neighbors_dropped = 0;
    let mut gci_cells_capped = false;

    // Index of the last consumed field
    let mut cursor = STATUS_INDEX;
    while cursor + GCI_CELL_PARAMS_COUNT < fields.len() {
        if gci_cells.len() >= limits.gci_cells_max {
            gci_cells_capped = true;
            break;
        }

        let (cell, serving, neighbor_count) = read_cell_block(&fields, cursor + 1)?;
        cursor += GCI_CELL_PARAMS_COUNT;

        if !serving {
            gci_cells.push(cell);
            continue;
        }

        report.current_cell = cell;
        report.serving_cell_reported = true;
        let kept = neighbor_count.min(limits.neighbor_cells_max);
        let mut neighbors = Vec::new();
        neighbors
            .try_reserve_exact(kept)
            .map_err(|_| DecodeError::AllocationFailed(kept))?;

        for _ in 0..kept {
            neighbors.push(read_neighbor(&fields, cursor + 1)?);
            cursor += NCELL_PARAMS_COUNT;
        }
        // Records over the bound are skipped so the next block lines up
        let skipped = neighbor_count - kept;
        cursor = cursor.saturating_add(skipped.saturating_mul(NCELL_PARAMS_COUNT));
        neighbors_dropped = skipped;
        report.neighbors = neighbors;
    }

    report.gci_cells = gci_cells;
    if neighbors_dropped > 0 || gci_cells_capped {
        report.truncation = Some(Truncation {
            neighbors_dropped,
            gci_cells_capped,
        });
    }
    Ok(report)
}

/// Read one 12-field cell block starting at `start`
///
/// Returns the cell, whether it is the serving cell and its neighbor count.
fn read_cell_block(fields: &Fields<'_>, start: usize) -> Result<(Cell, bool, usize), DecodeError> {
    let (mcc, mnc) = fields.plmn(start + 1)?;
    let cell = Cell {
        id: read_cell_id(fields, start)?,
        mcc,
        mnc,
        tac: read_tac(fields, start + 2)?,
        timing_advance: fields.int32(start + 3, "timing_advance")?,
        timing_advance_meas_time: fields.int(start + 4, "ta_meas_time")?,
        earfcn: fields.int32(start + 5, "earfcn")?,
        phys_cell_id: fields.int32(start + 6, "phys_cell_id")?,
        rsrp: fields.int32(start + 7, "rsrp")?,
        rsrq: fields.int32(start + 8, "rsrq")?,
        measurement_time: fields.int(start + 9, "measurement_time")?,
    };
    let serving = fields.int(start + 10, "serving")? != 0;

    let count = fields.int(start + 11, "neighbor_count")?;
    let neighbor_count = usize::try_from(count).map_err(|_| DecodeError::OutOfRange {
        field: "neighbor_count",
        value: count,
    })?;

    Ok((cell, serving, neighbor_count))
}

/// Re-encode a report as a GCI notification, for diagnostic display
///
/// The serving cell, when present, is written first with its neighbors,
/// followed by the non-serving cells.
pub fn encode(report: &MeasurementReport) -> String {
    let mut out = format!("{NOTIFICATION_PREFIX} {}", report.status.to_wire());
    if report.is_failed() {
        return out;
    }

    if report.carries_serving_block() {
        write_cell_block(&mut out, &report.current_cell, true, report.neighbors.len());
        for n in &report.neighbors {
            write_neighbor(&mut out, n);
        }
    }
    for cell in &report.gci_cells {
        write_cell_block(&mut out, cell, false, 0);
    }
    out
}

fn write_cell_block(out: &mut String, cell: &Cell, serving: bool, neighbor_count: usize) {
    write_cell_head(out, cell);
    let _ = write!(
        out,
        ",{},{},{},{},{},{},{},{},{}",
        cell.timing_advance,
        cell.timing_advance_meas_time,
        cell.earfcn,
        cell.phys_cell_id,
        cell.rsrp,
        cell.rsrq,
        cell.measurement_time,
        u8::from(serving),
        neighbor_count
    );
}
