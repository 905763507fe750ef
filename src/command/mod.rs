//! Host command handling
//!
//! This module handles:
//! - Classifying host lines into typed commands
//! - Dispatching to the command handlers
//! - Rendering `OK`/`ERROR` responses

mod executor;
pub mod handlers;
mod parse;

pub use executor::{CommandExecutor, CommandResult};
pub use parse::CommandType;
