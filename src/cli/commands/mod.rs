//! CLI command implementations.

pub mod blueprint;
pub mod init;
pub mod percolate;
