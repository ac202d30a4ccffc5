//! # GPIO Error Handling
//!
//! This module defines the `GpioError` enum, which represents the different error
//! types that can occur in the sbcio crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::hal::Mode;
use crate::pins::Numbering;

/// Represents the different error types that can occur in the sbcio crate.
#[derive(Debug, Error)]
pub enum GpioError {
    /// A pin number does not resolve to a usable pin in the active numbering scheme.
    #[error("Invalid {numbering} pin: {pin}")]
    InvalidPin { pin: u32, numbering: Numbering },

    /// An index into a digital input or output port is out of range.
    #[error("Invalid port index {index} (port has {size} pins)")]
    InvalidPortIndex { index: usize, size: usize },

    /// The requested mode is not available on this pin for the active architecture.
    #[error("Mode {mode} is not supported on MCU pin {pin}")]
    UnsupportedMode { pin: u32, mode: Mode },

    /// The running board could not be matched to a known pin layout.
    #[error("Unsupported board: {0}")]
    UnsupportedBoard(String),

    /// A pin does not fit into a `PinMask`.
    #[error("Pin {pin} exceeds the pin mask capacity of {capacity}")]
    MaskOverflow { pin: u32, capacity: u32 },

    /// The register window could not be opened or mapped.
    #[error("Failed to map {} at 0x{base:08X}: {source}", path.display())]
    Map {
        path: PathBuf,
        base: u64,
        #[source]
        source: std::io::Error,
    },

    /// A generic I/O failure (board probe files, configuration files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A configuration document could not be parsed.
    #[error("Configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The monitoring thread could not be started.
    #[error("Monitor thread error: {0}")]
    Thread(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GpioError>;
