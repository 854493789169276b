//! Command implementations shared by the CLI and other front ends.

pub mod init;
