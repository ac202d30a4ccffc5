//! # Pin Numbering
//!
//! Every supported board revision carries a `PinTable`: the logical pin list
//! (index = logical pin, value = MCU pin) and the physical header list
//! (index = header pin - 1, value = MCU pin). Negative entries mark header
//! positions or logical slots without a GPIO behind them.
//!
//! The MCU numbering scheme is derived from the logical list, so all three
//! schemes always address the same set of MCU pins.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GpioError, Result};

/// Pin numbering scheme used by a `Gpio` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Numbering {
    /// Board-independent index, contiguous from 0
    #[default]
    Logical,
    /// SoC-native pin number
    Mcu,
    /// Pin position on the board header, starting at 1
    Physical,
}

impl fmt::Display for Numbering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numbering::Logical => write!(f, "logical"),
            Numbering::Mcu => write!(f, "mcu"),
            Numbering::Physical => write!(f, "physical"),
        }
    }
}

/// Board revisions with a known pin layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoardRevision {
    /// Raspberry Pi model B, PCB 1.0 (26-pin header)
    RpiRev1,
    /// Raspberry Pi models A/B, PCB 2.0 (26-pin header plus P5)
    RpiRev2,
    /// Raspberry Pi models with the 40-pin header
    RpiRev3,
    /// NanoPi NEO and NEO Air
    NanoPiNeo,
    /// NanoPi M1
    NanoPiM1,
    /// NanoPi M1 Plus
    NanoPiM1Plus,
}

impl BoardRevision {
    /// Static pin table of this revision.
    pub fn pin_table(self) -> &'static PinTable {
        match self {
            BoardRevision::RpiRev1 => &RPI_REV1,
            BoardRevision::RpiRev2 => &RPI_REV2,
            BoardRevision::RpiRev3 => &RPI_REV3,
            BoardRevision::NanoPiNeo => &NANOPI_NEO,
            BoardRevision::NanoPiM1 => &NANOPI_M1,
            BoardRevision::NanoPiM1Plus => &NANOPI_M1_PLUS,
        }
    }
}

impl fmt::Display for BoardRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BoardRevision::RpiRev1 => "Raspberry Pi GPIO rev 1",
            BoardRevision::RpiRev2 => "Raspberry Pi GPIO rev 2",
            BoardRevision::RpiRev3 => "Raspberry Pi GPIO rev 3",
            BoardRevision::NanoPiNeo => "NanoPi NEO",
            BoardRevision::NanoPiM1 => "NanoPi M1",
            BoardRevision::NanoPiM1Plus => "NanoPi M1 Plus",
        };
        f.write_str(name)
    }
}

/// Immutable per-revision mapping between numbering schemes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinTable {
    name: Cow<'static, str>,
    logical: Cow<'static, [i16]>,
    physical: Cow<'static, [i16]>,
}

impl PinTable {
    const fn from_static(name: &'static str, logical: &'static [i16], physical: &'static [i16]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            logical: Cow::Borrowed(logical),
            physical: Cow::Borrowed(physical),
        }
    }

    /// Build a table for a board without a built-in layout.
    ///
    /// Negative entries are gaps. Every non-negative MCU pin must appear at
    /// most once per list and both lists must address the same MCU pins.
    pub fn new(name: impl Into<String>, logical: Vec<i16>, physical: Vec<i16>) -> Result<Self> {
        let table = Self {
            name: Cow::Owned(name.into()),
            logical: Cow::Owned(logical),
            physical: Cow::Owned(physical),
        };
        table.validate()?;
        Ok(table)
    }

    /// Table with only a logical list; physical numbering has no valid pins.
    pub fn logical_only(name: impl Into<String>, logical: Vec<i16>) -> Result<Self> {
        let table = Self {
            name: Cow::Owned(name.into()),
            logical: Cow::Owned(logical),
            physical: Cow::Owned(Vec::new()),
        };
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        let logical = sorted_valid(&self.logical);
        if logical.windows(2).any(|w| w[0] == w[1]) {
            return Err(GpioError::Config(format!(
                "pin table '{}' maps two logical pins to the same MCU pin",
                self.name
            )));
        }
        if self.physical.is_empty() {
            return Ok(());
        }
        let physical = sorted_valid(&self.physical);
        if physical.windows(2).any(|w| w[0] == w[1]) {
            return Err(GpioError::Config(format!(
                "pin table '{}' maps two header pins to the same MCU pin",
                self.name
            )));
        }
        if physical.iter().any(|p| logical.binary_search(p).is_err()) {
            return Err(GpioError::Config(format!(
                "pin table '{}' has header pins without a logical pin",
                self.name
            )));
        }
        Ok(())
    }

    /// Human readable name of the layout.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Translate `pin` in `numbering` to an MCU pin number.
    pub fn to_mcu(&self, pin: u32, numbering: Numbering) -> Option<u32> {
        match numbering {
            Numbering::Logical => entry(&self.logical, pin as usize),
            Numbering::Mcu => {
                let found = self.logical.iter().any(|&m| m >= 0 && m as u32 == pin);
                found.then_some(pin)
            }
            Numbering::Physical => pin
                .checked_sub(1)
                .and_then(|idx| entry(&self.physical, idx as usize)),
        }
    }

    /// Translate an MCU pin number back to `numbering`.
    pub fn from_mcu(&self, mcu: u32, numbering: Numbering) -> Option<u32> {
        let position = |list: &[i16]| list.iter().position(|&m| m >= 0 && m as u32 == mcu);
        match numbering {
            Numbering::Logical => position(&self.logical).map(|i| i as u32),
            Numbering::Mcu => position(&self.logical).map(|_| mcu),
            Numbering::Physical => position(&self.physical).map(|i| i as u32 + 1),
        }
    }

    /// Whether `pin` addresses a GPIO in `numbering`.
    pub fn is_valid(&self, pin: u32, numbering: Numbering) -> bool {
        self.to_mcu(pin, numbering).is_some()
    }

    /// Valid pin numbers of `numbering`, ascending.
    pub fn pins(&self, numbering: Numbering) -> Vec<u32> {
        match numbering {
            Numbering::Logical => valid_positions(&self.logical, 0),
            Numbering::Mcu => sorted_valid(&self.logical).into_iter().map(u32::from).collect(),
            Numbering::Physical => valid_positions(&self.physical, 1),
        }
    }

    /// Number of valid pins in `numbering`.
    pub fn len(&self, numbering: Numbering) -> usize {
        match numbering {
            Numbering::Logical | Numbering::Mcu => self.logical.iter().filter(|&&m| m >= 0).count(),
            Numbering::Physical => self.physical.iter().filter(|&&m| m >= 0).count(),
        }
    }

    /// `true` when the table has no GPIO at all.
    pub fn is_empty(&self) -> bool {
        self.len(Numbering::Logical) == 0
    }

    /// Highest MCU pin referenced by the table.
    pub fn max_mcu(&self) -> Option<u32> {
        self.logical.iter().filter(|&&m| m >= 0).map(|&m| m as u32).max()
    }

    /// Number of header positions (valid or not).
    pub fn header_size(&self) -> usize {
        self.physical.len()
    }
}

fn entry(list: &[i16], idx: usize) -> Option<u32> {
    list.get(idx).copied().filter(|&m| m >= 0).map(|m| m as u32)
}

fn sorted_valid(list: &[i16]) -> Vec<u16> {
    let mut pins: Vec<u16> = list.iter().filter(|&&m| m >= 0).map(|&m| m as u16).collect();
    pins.sort_unstable();
    pins
}

fn valid_positions(list: &[i16], first: u32) -> Vec<u32> {
    list.iter()
        .enumerate()
        .filter(|(_, &m)| m >= 0)
        .map(|(i, _)| i as u32 + first)
        .collect()
}

// Raspberry Pi --------------------------------------------------------------

pub static RPI_REV1: PinTable = PinTable::from_static(
    "Raspberry Pi GPIO rev 1",
    &[17, 18, 21, 22, 23, 24, 25, 4, 0, 1, 8, 7, 10, 9, 11, 14, 15],
    &[
        -1, -1, 0, -1, 1, -1, 4, 14, -1, 15, 17, 18, 21, -1, 22, 23, -1, 24, 10, -1, 9, 25, 11, 8,
        -1, 7,
    ],
);

pub static RPI_REV2: PinTable = PinTable::from_static(
    "Raspberry Pi GPIO rev 2",
    &[
        17, 18, 27, 22, 23, 24, 25, 4, 2, 3, 8, 7, 10, 9, 11, 14, 15, 28, 29, 30, 31,
    ],
    &[
        -1, -1, 2, -1, 3, -1, 4, 14, -1, 15, 17, 18, 27, -1, 22, 23, -1, 24, 10, -1, 9, 25, 11, 8,
        -1, 7, // P5 header follows P1
        -1, -1, 28, 29, 30, 31, -1, -1,
    ],
);

pub static RPI_REV3: PinTable = PinTable::from_static(
    "Raspberry Pi GPIO rev 3",
    &[
        17, 18, 27, 22, 23, 24, 25, 4, 2, 3, 8, 7, 10, 9, 11, 14, 15, -1, -1, -1, -1, 5, 6, 13,
        19, 26, 12, 16, 20, 21, 0, 1,
    ],
    &[
        -1, -1, 2, -1, 3, -1, 4, 14, -1, 15, 17, 18, 27, -1, 22, 23, -1, 24, 10, -1, 9, 25, 11, 8,
        -1, 7, 0, 1, 5, -1, 6, 12, 13, -1, 19, 16, 26, 20, -1, 21,
    ],
);

// NanoPi (Allwinner H3) -----------------------------------------------------

pub static NANOPI_NEO: PinTable = PinTable::from_static(
    "NanoPi NEO",
    &[
        0, 6, 2, 3, 88, 89, 1, 91, 12, 11, 25, 17, 22, 23, 24, 86, 87, 4, 5, 10, 105, 20, 21, 19,
        18, 104,
    ],
    &[
        -1, -1, 12, -1, 11, -1, 91, 86, -1, 87, 0, 6, 2, -1, 3, 88, -1, 89, 22, -1, 23, 1, 24, 25,
        // debug UART, LEDs and USB/audio header
        -1, -1, 4, 5, 10, 104, -1, -1, -1, -1, -1, 105, 17, 18, 19, 20, 21,
    ],
);

const NANOPI_M1_LOGICAL: &[i16] = &[
    0, 6, 2, 3, 88, 89, 1, 91, 12, 11, 25, 17, 22, 23, 24, 86, 87, 20, 21, 8, 16, 9, 7, 13, 15,
    14, 19, 18,
];

const NANOPI_M1_PHYSICAL: &[i16] = &[
    -1, -1, 12, -1, 11, -1, 91, 86, -1, 87, 0, 6, 2, -1, 3, 88, -1, 89, 22, -1, 23, 1, 24, 25, -1,
    17, 19, 18, 20, -1, 21, 7, 8, -1, 16, 13, 9, 15, -1, 14,
];

pub static NANOPI_M1: PinTable =
    PinTable::from_static("NanoPi M1", NANOPI_M1_LOGICAL, NANOPI_M1_PHYSICAL);

pub static NANOPI_M1_PLUS: PinTable =
    PinTable::from_static("NanoPi M1 Plus", NANOPI_M1_LOGICAL, NANOPI_M1_PHYSICAL);
