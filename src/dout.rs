//! # Digital Output Port
//!
//! An ordered set of output pins with an active polarity, the output
//! counterpart of [`DinPort`](crate::dinput::DinPort). Every output is
//! driven to its inactive level when the port is opened.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::PIN_MASK_CAPACITY;
use crate::dinput::ActiveLevel;
use crate::error::{GpioError, Result};
use crate::gpio::Gpio;
use crate::hal::Mode;
use crate::mask::PinMask;

/// One output of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoutPin {
    pub pin: u32,
    #[serde(default)]
    pub active: ActiveLevel,
}

impl DoutPin {
    pub fn active_high(pin: u32) -> Self {
        Self {
            pin,
            active: ActiveLevel::High,
        }
    }

    pub fn active_low(pin: u32) -> Self {
        Self {
            pin,
            active: ActiveLevel::Low,
        }
    }

    /// Raw level that puts this output in state `on`.
    fn level(&self, on: bool) -> bool {
        on == (self.active == ActiveLevel::High)
    }
}

#[derive(Debug)]
pub struct DoutPort {
    gpio: Gpio,
    pins: Vec<DoutPin>,
    mcu: Vec<u32>,
}

impl DoutPort {
    pub fn open(gpio: &Gpio, pins: &[DoutPin]) -> Result<Self> {
        if pins.len() > PIN_MASK_CAPACITY as usize {
            return Err(GpioError::MaskOverflow {
                pin: pins.len() as u32 - 1,
                capacity: PIN_MASK_CAPACITY,
            });
        }

        let mut mcu = Vec::with_capacity(pins.len());
        for pin in pins {
            let m = gpio.mcu_pin(pin.pin)?;
            // Latch the inactive level first so the pin never glitches active
            gpio.write(pin.pin, pin.level(false))?;
            gpio.set_mode(pin.pin, Mode::Output)?;
            mcu.push(m);
        }

        debug!("Output port opened with {} pins", pins.len());
        Ok(Self {
            gpio: gpio.clone(),
            pins: pins.to_vec(),
            mcu,
        })
    }

    fn slot(&self, index: usize) -> Result<(&DoutPin, u32)> {
        match self.pins.get(index) {
            Some(pin) => Ok((pin, self.mcu[index])),
            None => Err(GpioError::InvalidPortIndex {
                index,
                size: self.pins.len(),
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.pins.len()
    }

    pub fn gpio(&self) -> &Gpio {
        &self.gpio
    }

    /// Drive output `index` active (`true`) or inactive.
    pub fn write(&self, index: usize, on: bool) -> Result<()> {
        let (pin, mcu) = self.slot(index)?;
        self.gpio.write_mcu(mcu, pin.level(on))
    }

    pub fn set(&self, index: usize) -> Result<()> {
        self.write(index, true)
    }

    pub fn clear(&self, index: usize) -> Result<()> {
        self.write(index, false)
    }

    pub fn toggle(&self, index: usize) -> Result<()> {
        let (_, mcu) = self.slot(index)?;
        self.gpio.toggle_mcu(mcu)
    }

    /// Whether output `index` is currently active.
    pub fn read(&self, index: usize) -> Result<bool> {
        let (pin, mcu) = self.slot(index)?;
        Ok(self.gpio.read_mcu(mcu)? == pin.level(true))
    }

    /// Active outputs, bit `n` for output `n`.
    pub fn read_all(&self) -> Result<PinMask> {
        let mut mask = PinMask::empty();
        for index in 0..self.pins.len() {
            if self.read(index)? {
                mask.try_insert(index as u32)?;
            }
        }
        Ok(mask)
    }

    /// Drive every output to the state given by its bit in `mask`.
    pub fn write_all(&self, mask: PinMask) -> Result<()> {
        for index in 0..self.pins.len() {
            self.write(index, mask.contains(index as u32))?;
        }
        Ok(())
    }

    pub fn set_all(&self) -> Result<()> {
        (0..self.pins.len()).try_for_each(|i| self.set(i))
    }

    pub fn clear_all(&self) -> Result<()> {
        (0..self.pins.len()).try_for_each(|i| self.clear(i))
    }

    pub fn toggle_all(&self) -> Result<()> {
        (0..self.pins.len()).try_for_each(|i| self.toggle(i))
    }

    /// Drop the port's `Gpio` reference, reporting the release result when
    /// it was the last one.
    pub fn close(self) -> Result<()> {
        self.gpio.close()
    }
}
