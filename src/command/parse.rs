//! Host line classification
//!
//! Turns one line from the host link into a typed [`HostCommand`]. Command
//! names are matched case-insensitively; parameters are passed on as sent,
//! so a quoted string keeps its quotes and never reads as a number.

use cellfix_shared::field::Fields;

use crate::notification::NotificationMonitor;

/// Form of an AT command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandType {
    /// `AT<cmd>=<p1>,<p2>,...` or bare `AT<cmd>`
    Set(Vec<String>),
    /// `AT<cmd>?`
    Read,
    /// `AT<cmd>=?`
    Test,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// `AT#XNRFCLOUDPOS`
    CloudPos(CommandType),
    /// `AT#XNRFCLOUD`
    Cloud(CommandType),
    /// `AT%NCELLMEAS`
    NcellmeasSet(CommandType),
    /// `AT%NCELLMEASSTOP`
    NcellmeasStop,
    /// A `%NCELLMEAS` notification replayed on the host link
    Notification(String),
    Unknown(String),
}

const CMD_CLOUD_POS: &str = "AT#XNRFCLOUDPOS";
const CMD_CLOUD: &str = "AT#XNRFCLOUD";
const CMD_NCELLMEAS: &str = "AT%NCELLMEAS";
const CMD_NCELLMEAS_STOP: &str = "AT%NCELLMEASSTOP";

pub fn parse_host_line(line: &str) -> HostCommand {
    let line = line.trim();
    if NotificationMonitor::is_notification(line) {
        return HostCommand::Notification(line.to_string());
    }

    let name_end = line.find(['=', '?']).unwrap_or(line.len());
    let (name, rest) = line.split_at(name_end);
    let name = name.trim().to_ascii_uppercase();

    let unknown = || HostCommand::Unknown(line.to_string());
    match name.as_str() {
        CMD_NCELLMEAS_STOP if rest.is_empty() => HostCommand::NcellmeasStop,
        CMD_CLOUD_POS => command_type(rest).map_or_else(unknown, HostCommand::CloudPos),
        CMD_CLOUD => command_type(rest).map_or_else(unknown, HostCommand::Cloud),
        CMD_NCELLMEAS => command_type(rest).map_or_else(unknown, HostCommand::NcellmeasSet),
        _ => unknown(),
    }
}

/// Classify what follows the command name; `None` if malformed
fn command_type(rest: &str) -> Option<CommandType> {
    match rest.trim() {
        "" => Some(CommandType::Set(Vec::new())),
        "?" => Some(CommandType::Read),
        "=?" => Some(CommandType::Test),
        other => {
            let params = other.strip_prefix('=')?;
            let fields = Fields::parse_with_name("", params).ok()?;
            let params = (1..fields.len())
                .filter_map(|i| fields.get(i).ok())
                .map(|f| {
                    if f.quoted {
                        format!("\"{}\"", f.text)
                    } else {
                        f.text.to_string()
                    }
                })
                .collect();
            Some(CommandType::Set(params))
        }
    }
}
