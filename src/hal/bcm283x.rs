//! # BCM283x GPIO Backend
//!
//! Register layout shared by the BCM2835, BCM2836, BCM2837 and (for the
//! first 54 pins) the BCM2711:
//!
//! - `GPFSEL0..5`: 3-bit function select fields, 10 pins per word
//! - `GPSET0/1`, `GPCLR0/1`: write-one-to-set / write-one-to-clear latches
//! - `GPLEV0/1`: pin levels
//! - `GPPUD` + `GPPUDCLK0/1`: clocked pull-up/down programming
//! - `GPIO_PUP_PDN_CNTRL_REG0..3` (BCM2711 only): 2-bit pull fields, 16 pins
//!   per word, replacing the clocked sequence
//!
//! The pull state can only be read back on the BCM2711; elsewhere `pull()`
//! returns `None`.

use std::path::Path;
use std::thread;

use log::trace;

use crate::board::Soc;
use crate::constants::{
    BCM2711_PUP_PDN_CNTRL0, BCM_GPCLR0, BCM_GPFSEL0, BCM_GPIO_OFFSET, BCM_GPLEV0, BCM_GPPUD,
    BCM_GPPUDCLK0, BCM_GPSET0, BCM_PIN_COUNT, BLOCK_SIZE, PULL_SETTLE,
};
use crate::error::{GpioError, Result};
use crate::hal::iomap::RegisterWindow;
use crate::hal::{ArchBackend, Mode, Pull};
use crate::pins::Numbering;

#[derive(Debug)]
pub struct Bcm283xBackend {
    window: RegisterWindow,
    soc: Soc,
}

impl Bcm283xBackend {
    /// Map the GPIO block of a SoC whose peripherals start at `io_base`.
    pub fn open(device: &Path, soc: Soc, io_base: u64) -> Result<Self> {
        let window = RegisterWindow::open(device, io_base + BCM_GPIO_OFFSET, BLOCK_SIZE)?;
        Ok(Self::with_window(window, soc))
    }

    /// Backend over an already mapped window.
    pub fn with_window(window: RegisterWindow, soc: Soc) -> Self {
        Self { window, soc }
    }

    pub fn soc(&self) -> Soc {
        self.soc
    }

    fn check(&self, pin: u32) -> Result<()> {
        if pin < BCM_PIN_COUNT {
            Ok(())
        } else {
            Err(GpioError::InvalidPin {
                pin,
                numbering: Numbering::Mcu,
            })
        }
    }

    /// Alternate function carrying PWM on `pin`, if any.
    fn pwm_function(&self, pin: u32) -> Option<Mode> {
        match pin {
            18 => Some(Mode::Alt5),
            12 | 13 if self.soc != Soc::Bcm2835 => Some(Mode::Alt0),
            _ => None,
        }
    }

    fn fsel_slot(pin: u32) -> (usize, u32) {
        (BCM_GPFSEL0 + (pin / 10) as usize, (pin % 10) * 3)
    }

    fn pup_pdn_slot(pin: u32) -> (usize, u32) {
        (BCM2711_PUP_PDN_CNTRL0 + (pin / 16) as usize, (pin % 16) * 2)
    }

    fn bank_bit(pin: u32) -> (usize, u32) {
        ((pin / 32) as usize, 1 << (pin % 32))
    }
}

fn fsel_bits(mode: Mode) -> Option<u32> {
    match mode {
        Mode::Input => Some(0b000),
        Mode::Output => Some(0b001),
        Mode::Alt0 => Some(0b100),
        Mode::Alt1 => Some(0b101),
        Mode::Alt2 => Some(0b110),
        Mode::Alt3 => Some(0b111),
        Mode::Alt4 => Some(0b011),
        Mode::Alt5 => Some(0b010),
        Mode::Pwm | Mode::Disabled => None,
    }
}

fn fsel_mode(bits: u32) -> Mode {
    match bits & 0b111 {
        0b000 => Mode::Input,
        0b001 => Mode::Output,
        0b100 => Mode::Alt0,
        0b101 => Mode::Alt1,
        0b110 => Mode::Alt2,
        0b111 => Mode::Alt3,
        0b011 => Mode::Alt4,
        _ => Mode::Alt5,
    }
}

impl ArchBackend for Bcm283xBackend {
    fn name(&self) -> &str {
        "bcm283x"
    }

    fn pin_count(&self) -> u32 {
        BCM_PIN_COUNT
    }

    fn set_mode(&self, pin: u32, mode: Mode) -> Result<()> {
        self.check(pin)?;
        let unsupported = GpioError::UnsupportedMode { pin, mode };
        let bits = match mode {
            Mode::Pwm => self.pwm_function(pin).and_then(fsel_bits).ok_or(unsupported)?,
            other => fsel_bits(other).ok_or(unsupported)?,
        };
        let (word, shift) = Self::fsel_slot(pin);
        self.window
            .modify(word, |v| (v & !(0b111 << shift)) | (bits << shift));
        trace!("bcm283x: pin {pin} -> {mode}");
        Ok(())
    }

    fn mode(&self, pin: u32) -> Result<Mode> {
        self.check(pin)?;
        let (word, shift) = Self::fsel_slot(pin);
        Ok(fsel_mode(self.window.read(word) >> shift))
    }

    fn set_pull(&self, pin: u32, pull: Pull) -> Result<()> {
        self.check(pin)?;

        if self.soc == Soc::Bcm2711 {
            let code = match pull {
                Pull::Off => 0b00,
                Pull::Up => 0b01,
                Pull::Down => 0b10,
            };
            let (word, shift) = Self::pup_pdn_slot(pin);
            self.window
                .modify(word, |v| (v & !(0b11 << shift)) | (code << shift));
            return Ok(());
        }

        let code = match pull {
            Pull::Off => 0,
            Pull::Down => 1,
            Pull::Up => 2,
        };
        let (bank, bit) = Self::bank_bit(pin);
        let clk = BCM_GPPUDCLK0 + bank;

        self.window.write(BCM_GPPUD, code);
        thread::sleep(PULL_SETTLE);
        self.window.write(clk, bit);
        thread::sleep(PULL_SETTLE);
        self.window.write(BCM_GPPUD, 0);
        self.window.write(clk, 0);
        Ok(())
    }

    fn pull(&self, pin: u32) -> Result<Option<Pull>> {
        self.check(pin)?;
        if self.soc != Soc::Bcm2711 {
            return Ok(None);
        }
        let (word, shift) = Self::pup_pdn_slot(pin);
        let pull = match (self.window.read(word) >> shift) & 0b11 {
            0b01 => Pull::Up,
            0b10 => Pull::Down,
            _ => Pull::Off,
        };
        Ok(Some(pull))
    }

    fn write(&self, pin: u32, high: bool) -> Result<()> {
        self.check(pin)?;
        let (bank, bit) = Self::bank_bit(pin);
        let base = if high { BCM_GPSET0 } else { BCM_GPCLR0 };
        self.window.write(base + bank, bit);
        Ok(())
    }

    fn read(&self, pin: u32) -> Result<bool> {
        self.check(pin)?;
        let (bank, bit) = Self::bank_bit(pin);
        Ok(self.window.read(BCM_GPLEV0 + bank) & bit != 0)
    }

    fn toggle(&self, pin: u32) -> Result<()> {
        let level = self.read(pin)?;
        self.write(pin, !level)
    }
}
