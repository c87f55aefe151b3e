//! Crate-level error type.
//!
//! Leaf capabilities define their own error enums; this one gathers
//! them for code that wires the system together at startup.

use thiserror::Error;

use crate::capture::CaptureError;
use crate::config::ConfigError;
use crate::hw::HwError;
use crate::notify::NotifyError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("hardware error: {0}")]
    Hardware(#[from] HwError),

    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
