//! `%XMONITOR` reply decoder
//!
//! ```text
//! %XMONITOR: <reg_status>[,<full_name>,<short_name>,<plmn>,<tac>,<AcT>,<band>,
//!     <cell_id>,<phys_cell_id>,<EARFCN>,<rsrp>,<snr>,...]
//! ```
//!
//! Only the serving cell is taken from the reply. The modem reports neither
//! timing advance nor RSRQ here, so both are left at their "not measured"
//! values.

use crate::error::DecodeError;
use crate::field::Fields;
use crate::model::Cell;
use crate::ncellmeas::{read_cell_id, read_tac};

/// Command that asks the modem for its network status
pub const COMMAND: &str = "AT%XMONITOR";

/// Reply prefix, including the separator
pub const REPLY_PREFIX: &str = "%XMONITOR:";

const REG_STATUS_INDEX: usize = 1;
const PLMN_INDEX: usize = 4;
const TAC_INDEX: usize = 5;
const CELL_ID_INDEX: usize = 8;
const PHYS_CELL_ID_INDEX: usize = 9;
const EARFCN_INDEX: usize = 10;
const RSRP_INDEX: usize = 11;

/// Registered on the home network
const REG_HOME: i32 = 1;
/// Registered while roaming
const REG_ROAMING: i32 = 5;

pub fn is_reply(line: &str) -> bool {
    line.trim_start().starts_with(REPLY_PREFIX)
}

/// Decode the serving cell from a `%XMONITOR` reply
///
/// Returns `None` when the modem is not registered, since the reply then
/// carries no cell parameters.
pub fn decode(reply: &str) -> Result<Option<Cell>, DecodeError> {
    let fields = Fields::parse_notification(reply.trim_start())?;
    let reg_status = fields.int32(REG_STATUS_INDEX, "reg_status")?;
    if reg_status != REG_HOME && reg_status != REG_ROAMING {
        return Ok(None);
    }

    let (mcc, mnc) = fields.plmn(PLMN_INDEX)?;
    Ok(Some(Cell {
        id: read_cell_id(&fields, CELL_ID_INDEX)?,
        mcc,
        mnc,
        tac: read_tac(&fields, TAC_INDEX)?,
        earfcn: fields.int32(EARFCN_INDEX, "earfcn")?,
        phys_cell_id: fields.int32(PHYS_CELL_ID_INDEX, "phys_cell_id")?,
        rsrp: fields.int32(RSRP_INDEX, "rsrp")?,
        ..Default::default()
    }))
}
