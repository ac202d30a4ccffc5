//! # sbcio - GPIO for Single-Board Linux Computers
//!
//! The sbcio crate gives applications one board-independent pin numbering
//! over the GPIO registers of Raspberry Pi (BCM283x) and Allwinner H3 based
//! boards, plus edge-triggered digital inputs built on top of it.
//!
//! ## Features
//!
//! - Memory-mapped register access through `/dev/mem`, one backend per SoC family
//! - Logical, MCU and physical header numbering from per-board pin tables
//! - A shared, reference-counted `Gpio` handle that restores every pin it
//!   changed when the last reference goes away
//! - Digital input ports with active polarity, edge flags and callbacks
//!   driven by a polling monitor thread
//! - Digital output ports and a switch adapter
//! - Logging through the `log` facade
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! sbcio = "0.1.0"
//! ```
//!
//! ```rust,no_run
//! use sbcio::{DinConfig, DinPin, DinPort, Edge, Gpio, Pull};
//!
//! let gpio = Gpio::open()?;
//! let buttons = DinPort::open(
//!     &gpio,
//!     &[DinPin::active_low(0).with_pull(Pull::Up), DinPin::active_low(1).with_pull(Pull::Up)],
//!     DinConfig::default(),
//! )?;
//! buttons.set_edge(0, Edge::BOTH)?;
//! buttons.set_callback(0, |edge| {
//!     println!("button 0: {edge}");
//!     Ok(())
//! })?;
//! # Ok::<(), sbcio::GpioError>(())
//! ```
//!
//! Without hardware, [`hal::SimBackend`] stands in for the registers:
//!
//! ```rust
//! use sbcio::hal::SimBackend;
//! use sbcio::pins::RPI_REV3;
//! use sbcio::{Gpio, Mode};
//!
//! let gpio = Gpio::builder()
//!     .backend(SimBackend::new(54))
//!     .pin_table(RPI_REV3.clone())
//!     .build()?;
//! gpio.set_mode(0, Mode::Output)?;
//! gpio.write(0, true)?;
//! assert!(gpio.read(0)?);
//! # Ok::<(), sbcio::GpioError>(())
//! ```

pub mod board;
pub mod config;
pub mod constants;
pub mod dinput;
pub mod dout;
pub mod error;
pub mod gpio;
pub mod hal;
pub mod logging;
pub mod mask;
pub mod pins;
pub mod switch;
pub mod util;

pub use crate::error::{GpioError, Result};
pub use crate::logging::{init_logger, log_info};

pub use board::{BoardInfo, Soc};
pub use config::{Config, DinConfig, GpioConfig};
pub use dinput::{ActiveLevel, DinPin, DinPort, Edge, MonitorStats};
pub use dout::{DoutPin, DoutPort};
pub use gpio::{Gpio, GpioBuilder};
pub use hal::{ArchBackend, Mode, Pull};
pub use mask::PinMask;
pub use pins::{BoardRevision, Numbering, PinTable};
pub use switch::Switch;
