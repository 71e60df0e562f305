//! Netscribe Core — error type, data directories, server configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, NetscribeConfig};
pub use error::{Error, Result};
