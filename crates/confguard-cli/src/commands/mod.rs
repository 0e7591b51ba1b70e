//! Subcommand implementations.

pub mod check;
pub mod diff;
pub mod init;
pub mod list_rules;
pub mod output;
