//! # Board Identification
//!
//! Works out which board the process runs on from `/proc/cpuinfo` and, for
//! Allwinner boards, the device-tree model string. The result selects both
//! the register backend and the pin table.
//!
//! Raspberry Pi revision codes come in two flavours:
//!
//! - old style (`0002`..`0015`): looked up in a small table, bit 24 marks
//!   an over-volted board and is ignored
//! - new style (bit 23 set): a bit field with the processor in bits 12..15
//!   and the board type in bits 4..11
//!
//! ```rust,no_run
//! let board = sbcio::board::probe()?;
//! println!("{} (GPIO {})", board.model, board.revision);
//! # Ok::<(), sbcio::GpioError>(())
//! ```

use std::fmt;
use std::fs;
use std::path::Path;

use log::debug;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::constants::{BCM2711_PERI_BASE, BCM2835_PERI_BASE, BCM2836_PERI_BASE, H3_IO1_BASE};
use crate::error::{GpioError, Result};
use crate::pins::{BoardRevision, PinTable};

const CPUINFO: &str = "/proc/cpuinfo";
const DT_MODEL: &str = "/proc/device-tree/model";

/// SoC on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Soc {
    Bcm2835,
    Bcm2836,
    Bcm2837,
    Bcm2711,
    AllwinnerH3,
}

/// Register layout family of a SoC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocFamily {
    Bcm283x,
    AllwinnerH3,
}

impl Soc {
    pub fn family(self) -> SocFamily {
        match self {
            Soc::Bcm2835 | Soc::Bcm2836 | Soc::Bcm2837 | Soc::Bcm2711 => SocFamily::Bcm283x,
            Soc::AllwinnerH3 => SocFamily::AllwinnerH3,
        }
    }
}

impl fmt::Display for Soc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Soc::Bcm2835 => "BCM2835",
            Soc::Bcm2836 => "BCM2836",
            Soc::Bcm2837 => "BCM2837",
            Soc::Bcm2711 => "BCM2711",
            Soc::AllwinnerH3 => "Allwinner H3",
        };
        f.write_str(s)
    }
}

/// Identity of the running board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    /// Marketing name, e.g. "Raspberry Pi 3 Model B"
    pub model: String,
    pub soc: Soc,
    /// Pin layout revision
    pub revision: BoardRevision,
    /// Raw Raspberry Pi revision code
    pub revision_code: Option<u32>,
    /// Physical base of the SoC peripheral block
    pub io_base: u64,
}

impl BoardInfo {
    /// Identify a board from the contents of `/proc/cpuinfo` and, if
    /// available, the device-tree model string.
    pub fn from_sources(cpuinfo: &str, dt_model: Option<&str>) -> Result<Self> {
        let hardware = field(cpuinfo, "Hardware").unwrap_or_default();
        let dt_model = dt_model.map(|m| m.trim_end_matches('\0').trim());

        let allwinner = hardware.contains("sun8i")
            || hardware.contains("Allwinner")
            || dt_model.map_or(false, |m| m.contains("NanoPi"));
        if allwinner {
            return Self::allwinner(hardware, dt_model);
        }

        let code = field(cpuinfo, "Revision")
            .and_then(|r| u32::from_str_radix(r, 16).ok())
            .ok_or_else(|| {
                GpioError::UnsupportedBoard(format!(
                    "no Raspberry Pi revision in cpuinfo (hardware '{hardware}')"
                ))
            })?;
        Self::raspberry_pi(code, dt_model)
    }

    /// Board layout for a Raspberry Pi revision code.
    pub fn raspberry_pi(code: u32, dt_model: Option<&str>) -> Result<Self> {
        let unsupported = || GpioError::UnsupportedBoard(format!("Raspberry Pi revision {code:04x}"));

        let (model, soc, revision) = if code & (1 << 23) != 0 {
            let soc = match (code >> 12) & 0xF {
                0 => Soc::Bcm2835,
                1 => Soc::Bcm2836,
                2 => Soc::Bcm2837,
                3 => Soc::Bcm2711,
                _ => return Err(unsupported()),
            };
            let model = new_style_model((code >> 4) & 0xFF).ok_or_else(unsupported)?;
            (model, soc, BoardRevision::RpiRev3)
        } else {
            let (model, revision) = match code & 0x00FF_FFFF {
                0x02 | 0x03 => ("Raspberry Pi Model B", BoardRevision::RpiRev1),
                0x04..=0x06 | 0x0d..=0x0f => ("Raspberry Pi Model B", BoardRevision::RpiRev2),
                0x07..=0x09 => ("Raspberry Pi Model A", BoardRevision::RpiRev2),
                0x10 | 0x13 => ("Raspberry Pi Model B+", BoardRevision::RpiRev3),
                0x11 | 0x14 => ("Raspberry Pi Compute Module", BoardRevision::RpiRev3),
                0x12 | 0x15 => ("Raspberry Pi Model A+", BoardRevision::RpiRev3),
                _ => return Err(unsupported()),
            };
            (model, Soc::Bcm2835, revision)
        };

        let io_base = match soc {
            Soc::Bcm2835 => BCM2835_PERI_BASE,
            Soc::Bcm2836 | Soc::Bcm2837 => BCM2836_PERI_BASE,
            _ => BCM2711_PERI_BASE,
        };

        let model = dt_model
            .filter(|m| m.starts_with("Raspberry Pi"))
            .map_or_else(|| model.to_string(), str::to_string);

        debug!("Raspberry Pi revision {code:06x}: {model}, {soc}, {revision}");
        Ok(Self {
            model,
            soc,
            revision,
            revision_code: Some(code),
            io_base,
        })
    }

    fn allwinner(hardware: &str, dt_model: Option<&str>) -> Result<Self> {
        let model = dt_model.ok_or_else(|| {
            GpioError::UnsupportedBoard(format!(
                "Allwinner board '{hardware}' without a device-tree model"
            ))
        })?;
        let lower = model.to_ascii_lowercase();
        let revision = if lower.contains("m1 plus") || lower.contains("m1plus") {
            BoardRevision::NanoPiM1Plus
        } else if lower.contains("m1") {
            BoardRevision::NanoPiM1
        } else if lower.contains("neo") {
            BoardRevision::NanoPiNeo
        } else {
            return Err(GpioError::UnsupportedBoard(model.to_string()));
        };

        debug!("Allwinner board '{model}': {revision}");
        Ok(Self {
            model: model.to_string(),
            soc: Soc::AllwinnerH3,
            revision,
            revision_code: None,
            io_base: H3_IO1_BASE,
        })
    }

    pub fn family(&self) -> SocFamily {
        self.soc.family()
    }

    pub fn pin_table(&self) -> &'static PinTable {
        self.revision.pin_table()
    }
}

/// Read the identity sources from explicit paths.
pub fn probe_from(cpuinfo: &Path, dt_model: &Path) -> Result<BoardInfo> {
    let cpuinfo = fs::read_to_string(cpuinfo)?;
    let model = fs::read_to_string(dt_model).ok();
    BoardInfo::from_sources(&cpuinfo, model.as_deref())
}

/// Identify the running board; the result is cached for the process.
pub fn probe() -> Result<&'static BoardInfo> {
    static BOARD: OnceCell<BoardInfo> = OnceCell::new();
    BOARD.get_or_try_init(|| probe_from(Path::new(CPUINFO), Path::new(DT_MODEL)))
}

fn field<'a>(cpuinfo: &'a str, name: &str) -> Option<&'a str> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == name).then(|| value.trim())
    })
}

fn new_style_model(board_type: u32) -> Option<&'static str> {
    let model = match board_type {
        0x00 => "Raspberry Pi Model A",
        0x01 => "Raspberry Pi Model B",
        0x02 => "Raspberry Pi Model A+",
        0x03 => "Raspberry Pi Model B+",
        0x04 => "Raspberry Pi 2 Model B",
        0x06 => "Raspberry Pi Compute Module",
        0x08 => "Raspberry Pi 3 Model B",
        0x09 => "Raspberry Pi Zero",
        0x0a => "Raspberry Pi Compute Module 3",
        0x0c => "Raspberry Pi Zero W",
        0x0d => "Raspberry Pi 3 Model B+",
        0x0e => "Raspberry Pi 3 Model A+",
        0x10 => "Raspberry Pi Compute Module 3+",
        0x11 => "Raspberry Pi 4 Model B",
        0x12 => "Raspberry Pi Zero 2 W",
        0x13 => "Raspberry Pi 400",
        0x14 => "Raspberry Pi Compute Module 4",
        _ => return None,
    };
    Some(model)
}
