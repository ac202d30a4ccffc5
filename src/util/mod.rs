//! # Utility Modules
//!
//! Common helpers shared by the GPIO and digital input layers.

pub mod logging;

pub use logging::LogThrottle;
