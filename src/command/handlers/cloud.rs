//! Location service link command handler

use cellfix_shared::field::str_to_int;
use tracing::{error, info};

use super::{code, HandlerContext};
use crate::command::{CommandResult, CommandType};

const OP_DISCONNECT: i64 = 0;
const OP_CONNECT: i64 = 1;

/// Handle `AT#XNRFCLOUD`
pub async fn handle_cloud(ctx: &HandlerContext<'_>, cmd: CommandType) -> CommandResult {
    match cmd {
        CommandType::Set(params) => handle_set(ctx, &params).await,
        CommandType::Read => CommandResult::Completed {
            lines: vec![format!(
                "#XNRFCLOUD: {},{},\"{}\"",
                u8::from(ctx.cloud_state.is_ready()),
                u8::from(ctx.cloud_state.send_location()),
                ctx.device_id
            )],
        },
        CommandType::Test => CommandResult::Completed {
            lines: vec![format!(
                "#XNRFCLOUD: ({},{}),<send_location>",
                OP_DISCONNECT, OP_CONNECT
            )],
        },
    }
}

async fn handle_set(ctx: &HandlerContext<'_>, params: &[String]) -> CommandResult {
    let op = params.first().and_then(|p| str_to_int(p, 10).ok());
    match op {
        Some(OP_CONNECT) if !ctx.cloud_state.is_ready() => {
            let send_location = match params.get(1).map(|p| str_to_int(p, 10)) {
                None => false,
                Some(Ok(0)) => false,
                Some(Ok(1)) => true,
                Some(_) => return invalid("send_location must be 0 or 1"),
            };

            if let Err(e) = ctx.client.check_reachable().await {
                error!("[CLOUD] Connection failed: {:#}", e);
                return CommandResult::Rejected {
                    code: code::EIO,
                    message: format!("Connection failed: {e}"),
                };
            }

            ctx.cloud_state.set_send_location(send_location);
            ctx.cloud_state.set_ready(true);
            ctx.monitor.resume();
            info!("[CLOUD] Connected, notification monitoring resumed");
            state_echo(ctx)
        }
        Some(OP_DISCONNECT) => {
            ctx.cloud_state.set_ready(false);
            ctx.monitor.pause();
            info!("[CLOUD] Disconnected, notification monitoring paused");
            state_echo(ctx)
        }
        _ => invalid("Unsupported operation"),
    }
}

fn state_echo(ctx: &HandlerContext<'_>) -> CommandResult {
    CommandResult::Completed {
        lines: vec![format!(
            "#XNRFCLOUD: {},{}",
            u8::from(ctx.cloud_state.is_ready()),
            u8::from(ctx.cloud_state.send_location())
        )],
    }
}

fn invalid(message: &str) -> CommandResult {
    CommandResult::Rejected {
        code: code::EINVAL,
        message: message.into(),
    }
}
