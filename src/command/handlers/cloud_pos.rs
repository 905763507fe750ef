//! Location request command handler

use super::{code, HandlerContext};
use crate::command::{CommandResult, CommandType};

/// Handle `AT#XNRFCLOUDPOS=<cell_mode>,<wifi_mode>[,<mac>[,<rssi>]]*`
///
/// Only validates and queues; the result is reported later as an
/// unsolicited `#XNRFCLOUDPOS` line.
pub fn handle_cloud_pos(ctx: &HandlerContext<'_>, cmd: CommandType) -> CommandResult {
    let CommandType::Set(params) = cmd else {
        return CommandResult::Rejected {
            code: code::ENOTSUP,
            message: "Only the set form is supported".into(),
        };
    };

    match ctx.orchestrator.request(&params) {
        Ok(()) => CommandResult::Completed { lines: Vec::new() },
        Err(e) => CommandResult::Rejected {
            code: e.code(),
            message: e.to_string(),
        },
    }
}
