//! `AT%NCELLMEAS` interception
//!
//! The modem runs the measurement; the device only remembers the search type
//! so the next notification is decoded with the right decoder.

use cellfix_shared::field::str_to_int;
use cellfix_shared::SearchType;
use tracing::{debug, warn};

use super::{code, HandlerContext};
use crate::command::{CommandResult, CommandType};

/// Handle `AT%NCELLMEAS[=<search_type>[,...]]`
pub fn handle_ncellmeas(ctx: &HandlerContext<'_>, cmd: CommandType, line: &str) -> CommandResult {
    if let CommandType::Set(params) = &cmd {
        let search_type = match params.first() {
            None => Some(SearchType::Default),
            Some(p) => str_to_int(p, 10).ok().and_then(SearchType::from_wire),
        };
        let Some(search_type) = search_type else {
            warn!("[NCELLMEAS] Invalid search type: {:?}", params.first());
            return CommandResult::Rejected {
                code: code::EINVAL,
                message: "Invalid search type".into(),
            };
        };
        ctx.monitor.set_search_type(search_type);
    }

    forward(ctx, line)
}

/// Handle `AT%NCELLMEASSTOP`
pub fn handle_ncellmeas_stop(ctx: &HandlerContext<'_>, line: &str) -> CommandResult {
    forward(ctx, line)
}

/// Pass the command on to the modem; its own reply follows on the modem link
fn forward(ctx: &HandlerContext<'_>, line: &str) -> CommandResult {
    let Some(modem_tx) = ctx.modem_tx else {
        debug!("[NCELLMEAS] No modem attached, {} acknowledged locally", line);
        return CommandResult::Completed { lines: Vec::new() };
    };
    match modem_tx.try_send(line.to_string()) {
        Ok(()) => CommandResult::Pending,
        Err(e) => {
            warn!("[NCELLMEAS] Modem link unavailable: {}", e);
            CommandResult::Rejected {
                code: code::EIO,
                message: "Modem link unavailable".into(),
            }
        }
    }
}
