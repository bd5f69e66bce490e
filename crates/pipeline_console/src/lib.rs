//! Line-oriented console front end for the pipeline monitor.

pub mod app;
pub mod commands;
pub mod render;

pub use app::{ConsoleAction, ConsoleApp, HELP_TEXT};
pub use commands::{parse_slash_command, SlashCommand};
