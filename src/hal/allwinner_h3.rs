//! # Allwinner H3 GPIO Backend
//!
//! The H3 splits its pins into banks. Banks A, C, D, E, F and G live in the
//! PIO block, bank L in the R_PIO block, so two register windows are mapped.
//! Every bank has the same register set:
//!
//! | word | register | content                               |
//! |------|----------|---------------------------------------|
//! | 0..3 | CFG0..3  | 4-bit function fields, 8 pins per word |
//! | 4    | DAT      | one bit per pin                        |
//! | 5..6 | DRV0..1  | drive strength (unused here)           |
//! | 7..8 | PUL0..1  | 2-bit pull fields, 16 pins per word    |
//!
//! MCU pin numbers are contiguous over the bonded-out banks: A0 is 0, C0 is
//! 22, ... L0 is 94. Function numbers 2..6 are exposed as `Alt0..Alt4`.
//!
//! There are no set/clear registers: `write` and `toggle` are both a
//! read-modify-write of the bank's DAT word. The backend serializes them
//! with its own lock, so concurrent writes to pins of the same bank do not
//! lose updates inside this process. Another process driving the same bank
//! still can.

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::thread;

use log::trace;

use crate::constants::{
    BLOCK_SIZE, H3_BANK_SIZES, H3_BANK_STRIDE, H3_CFG0, H3_DAT, H3_FUNC_DISABLED, H3_IO1_BASE,
    H3_IO2_BASE, H3_PIO_OFFSET, H3_PUL0, H3_R_PIO_OFFSET, PULL_SETTLE,
};
use crate::error::{GpioError, Result};
use crate::hal::iomap::RegisterWindow;
use crate::hal::{ArchBackend, Mode, Pull};
use crate::pins::Numbering;

/// MCU pin wired to PWM1
const H3_PWM_PIN: u32 = 6;

/// Function carrying PWM1 on PA6
const H3_PWM_FUNC: u32 = 3;

#[derive(Debug)]
pub struct H3Backend {
    pio: RegisterWindow,
    r_pio: RegisterWindow,
    pin_count: u32,
    /// Held across DAT read-modify-writes
    dat: Mutex<()>,
}

/// Location of one pin's registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BankPin {
    /// Index into `H3_BANK_SIZES` (7 = bank L)
    bank: usize,
    /// Word offset of the bank register set inside its window
    base: usize,
    /// Pin number inside the bank
    offset: u32,
}

impl H3Backend {
    /// Map the PIO and R_PIO blocks.
    pub fn open(device: &Path) -> Result<Self> {
        let pio = RegisterWindow::open(device, H3_IO1_BASE, BLOCK_SIZE)?;
        let r_pio = RegisterWindow::open(device, H3_IO2_BASE, BLOCK_SIZE)?;
        Ok(Self::with_windows(pio, r_pio))
    }

    pub fn with_windows(pio: RegisterWindow, r_pio: RegisterWindow) -> Self {
        Self {
            pio,
            r_pio,
            pin_count: H3_BANK_SIZES.iter().sum(),
            dat: Mutex::new(()),
        }
    }

    fn locate(&self, pin: u32) -> Result<BankPin> {
        let mut first = 0;
        for (bank, &size) in H3_BANK_SIZES.iter().enumerate() {
            if pin < first + size {
                let base = if bank < 7 {
                    H3_PIO_OFFSET + bank * H3_BANK_STRIDE
                } else {
                    H3_R_PIO_OFFSET
                };
                return Ok(BankPin {
                    bank,
                    base: base / 4,
                    offset: pin - first,
                });
            }
            first += size;
        }
        Err(GpioError::InvalidPin {
            pin,
            numbering: Numbering::Mcu,
        })
    }

    fn window(&self, bp: BankPin) -> &RegisterWindow {
        if bp.bank < 7 {
            &self.pio
        } else {
            &self.r_pio
        }
    }

    fn cfg_slot(bp: BankPin) -> (usize, u32) {
        (bp.base + H3_CFG0 + (bp.offset / 8) as usize, (bp.offset % 8) * 4)
    }

    fn pul_slot(bp: BankPin) -> (usize, u32) {
        (bp.base + H3_PUL0 + (bp.offset / 16) as usize, (bp.offset % 16) * 2)
    }
}

impl ArchBackend for H3Backend {
    fn name(&self) -> &str {
        "allwinner-h3"
    }

    fn pin_count(&self) -> u32 {
        self.pin_count
    }

    fn set_mode(&self, pin: u32, mode: Mode) -> Result<()> {
        let bp = self.locate(pin)?;
        let func = match mode {
            Mode::Input => 0,
            Mode::Output => 1,
            Mode::Alt0 => 2,
            Mode::Alt1 => 3,
            Mode::Alt2 => 4,
            Mode::Alt3 => 5,
            Mode::Alt4 => 6,
            Mode::Disabled => H3_FUNC_DISABLED,
            Mode::Pwm if pin == H3_PWM_PIN => H3_PWM_FUNC,
            Mode::Pwm | Mode::Alt5 => return Err(GpioError::UnsupportedMode { pin, mode }),
        };
        let (word, shift) = Self::cfg_slot(bp);
        self.window(bp)
            .modify(word, |v| (v & !(0b1111 << shift)) | (func << shift));
        trace!("allwinner-h3: pin {pin} -> {mode}");
        Ok(())
    }

    fn mode(&self, pin: u32) -> Result<Mode> {
        let bp = self.locate(pin)?;
        let (word, shift) = Self::cfg_slot(bp);
        let mode = match (self.window(bp).read(word) >> shift) & 0b111 {
            0 => Mode::Input,
            1 => Mode::Output,
            2 => Mode::Alt0,
            3 => Mode::Alt1,
            4 => Mode::Alt2,
            5 => Mode::Alt3,
            6 => Mode::Alt4,
            _ => Mode::Disabled,
        };
        Ok(mode)
    }

    fn set_pull(&self, pin: u32, pull: Pull) -> Result<()> {
        let bp = self.locate(pin)?;
        let code = match pull {
            Pull::Off => 0,
            Pull::Up => 1,
            Pull::Down => 2,
        };
        let (word, shift) = Self::pul_slot(bp);
        let win = self.window(bp);
        win.modify(word, |v| v & !(0b11 << shift));
        thread::sleep(PULL_SETTLE);
        win.modify(word, |v| v | (code << shift));
        thread::sleep(PULL_SETTLE);
        Ok(())
    }

    fn pull(&self, pin: u32) -> Result<Option<Pull>> {
        let bp = self.locate(pin)?;
        let (word, shift) = Self::pul_slot(bp);
        let pull = match (self.window(bp).read(word) >> shift) & 0b11 {
            1 => Pull::Up,
            2 => Pull::Down,
            _ => Pull::Off,
        };
        Ok(Some(pull))
    }

    fn write(&self, pin: u32, high: bool) -> Result<()> {
        let bp = self.locate(pin)?;
        let bit = 1 << bp.offset;
        let _dat = self.dat.lock().unwrap_or_else(PoisonError::into_inner);
        self.window(bp).modify(bp.base + H3_DAT, |v| {
            if high {
                v | bit
            } else {
                v & !bit
            }
        });
        Ok(())
    }

    fn read(&self, pin: u32) -> Result<bool> {
        let bp = self.locate(pin)?;
        Ok(self.window(bp).read(bp.base + H3_DAT) & (1 << bp.offset) != 0)
    }

    fn toggle(&self, pin: u32) -> Result<()> {
        let bp = self.locate(pin)?;
        let _dat = self.dat.lock().unwrap_or_else(PoisonError::into_inner);
        self.window(bp)
            .modify(bp.base + H3_DAT, |v| v ^ (1 << bp.offset));
        Ok(())
    }
}
