//! Common utilities shared by the library and the CLI

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// One mebibyte, the unit fixture sizes are expressed in
pub const MIB: u64 = 1024 * 1024;
