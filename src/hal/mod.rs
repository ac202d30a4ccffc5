//! # Hardware Abstraction Layer
//!
//! One `ArchBackend` implementation per SoC family. Backends work on raw MCU
//! pin numbers and know nothing about board layouts or numbering schemes;
//! that translation lives in [`crate::gpio::Gpio`].
//!
//! ## Backends
//!
//! - [`bcm283x::Bcm283xBackend`]: Raspberry Pi (BCM2835/6/7, BCM2711)
//! - [`allwinner_h3::H3Backend`]: NanoPi boards built on the Allwinner H3
//! - [`sim::SimBackend`]: in-memory pins for tests and host development
//!
//! Backends do not serialize register access. Mode and pull changes are
//! read-modify-write sequences on shared register words and must not race
//! with each other; `Gpio` runs them under its own state lock. On the BCM283x
//! `toggle` is a read followed by a write to GPSET/GPCLR and can lose a
//! concurrent update to another bit of the same word. The H3 has no set/clear
//! registers, so its `write` and `toggle` are read-modify-writes of the DAT
//! word; the H3 backend serializes them with its own lock.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};

use crate::board::{BoardInfo, SocFamily};
use crate::error::Result;

pub mod allwinner_h3;
pub mod bcm283x;
pub mod iomap;
pub mod sim;

pub use allwinner_h3::H3Backend;
pub use bcm283x::Bcm283xBackend;
pub use iomap::RegisterWindow;
pub use sim::SimBackend;

/// Pin function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Input,
    Output,
    Alt0,
    Alt1,
    Alt2,
    Alt3,
    Alt4,
    Alt5,
    /// Hardware PWM; the backend picks the alternate function for the pin.
    Pwm,
    /// Pin parked with its I/O disabled (Allwinner only)
    Disabled,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Input => "INPUT",
            Mode::Output => "OUTPUT",
            Mode::Alt0 => "ALT0",
            Mode::Alt1 => "ALT1",
            Mode::Alt2 => "ALT2",
            Mode::Alt3 => "ALT3",
            Mode::Alt4 => "ALT4",
            Mode::Alt5 => "ALT5",
            Mode::Pwm => "PWM",
            Mode::Disabled => "DISABLED",
        };
        f.write_str(s)
    }
}

/// Pull resistor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pull {
    #[default]
    Off,
    Down,
    Up,
}

impl fmt::Display for Pull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Pull::Off => "OFF",
            Pull::Down => "DOWN",
            Pull::Up => "UP",
        };
        f.write_str(s)
    }
}

/// Register-level access to the GPIO block of one SoC family.
pub trait ArchBackend: Send + Sync + fmt::Debug {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// MCU pins `0..pin_count()` are addressable
    fn pin_count(&self) -> u32;

    fn set_mode(&self, pin: u32, mode: Mode) -> Result<()>;

    /// Mode as currently programmed in hardware. PWM pins read back as the
    /// alternate function that carries PWM.
    fn mode(&self, pin: u32) -> Result<Mode>;

    fn set_pull(&self, pin: u32, pull: Pull) -> Result<()>;

    /// Pull as programmed in hardware, `None` when the SoC cannot report it.
    fn pull(&self, pin: u32) -> Result<Option<Pull>>;

    fn write(&self, pin: u32, high: bool) -> Result<()>;

    fn read(&self, pin: u32) -> Result<bool>;

    /// Invert the output latch. Not atomic, see the module docs.
    fn toggle(&self, pin: u32) -> Result<()>;
}

/// Open the register backend matching `board`.
pub fn select_backend(board: &BoardInfo, mem_device: &Path) -> Result<Arc<dyn ArchBackend>> {
    let backend: Arc<dyn ArchBackend> = match board.family() {
        SocFamily::Bcm283x => Arc::new(Bcm283xBackend::open(mem_device, board.soc, board.io_base)?),
        SocFamily::AllwinnerH3 => Arc::new(H3Backend::open(mem_device)?),
    };
    info!("GPIO backend initialized: {} ({})", backend.name(), board.model);
    Ok(backend)
}
