//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod init;
pub mod maintenance;
pub mod status;
pub mod watch;
