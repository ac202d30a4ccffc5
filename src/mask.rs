//! Fixed-size pin bitset used by the batch operations.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor};

use serde::{Deserialize, Serialize};

use crate::constants::PIN_MASK_CAPACITY;
use crate::error::{GpioError, Result};

/// Set of pin numbers below `PIN_MASK_CAPACITY`.
///
/// Bit `n` stands for pin `n` in whatever numbering the caller uses (a
/// `Gpio` numbering scheme, or a port index for `DinPort`). Inserting a pin
/// past the capacity is an error rather than a silent truncation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinMask(u128);

impl PinMask {
    /// Empty mask
    pub const EMPTY: PinMask = PinMask(0);

    pub const fn empty() -> Self {
        PinMask(0)
    }

    pub const fn from_bits(bits: u128) -> Self {
        PinMask(bits)
    }

    pub const fn bits(self) -> u128 {
        self.0
    }

    /// Build a mask from pin numbers, failing on the first out-of-range pin.
    pub fn from_pins<I: IntoIterator<Item = u32>>(pins: I) -> Result<Self> {
        let mut mask = PinMask::empty();
        for pin in pins {
            mask.try_insert(pin)?;
        }
        Ok(mask)
    }

    pub fn try_insert(&mut self, pin: u32) -> Result<()> {
        if pin >= PIN_MASK_CAPACITY {
            return Err(GpioError::MaskOverflow {
                pin,
                capacity: PIN_MASK_CAPACITY,
            });
        }
        self.0 |= 1u128 << pin;
        Ok(())
    }

    /// Builder-style insert.
    pub fn with(mut self, pin: u32) -> Result<Self> {
        self.try_insert(pin)?;
        Ok(self)
    }

    pub fn remove(&mut self, pin: u32) {
        if pin < PIN_MASK_CAPACITY {
            self.0 &= !(1u128 << pin);
        }
    }

    pub fn contains(self, pin: u32) -> bool {
        pin < PIN_MASK_CAPACITY && self.0 & (1u128 << pin) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Pins in ascending order.
    pub fn iter(self) -> PinMaskIter {
        PinMaskIter(self.0)
    }
}

/// Iterator over the pins of a `PinMask`.
#[derive(Debug, Clone)]
pub struct PinMaskIter(u128);

impl Iterator for PinMaskIter {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.0 == 0 {
            return None;
        }
        let pin = self.0.trailing_zeros();
        self.0 &= self.0 - 1;
        Some(pin)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.0.count_ones() as usize;
        (n, Some(n))
    }
}

impl IntoIterator for PinMask {
    type Item = u32;
    type IntoIter = PinMaskIter;

    fn into_iter(self) -> PinMaskIter {
        self.iter()
    }
}

impl BitOr for PinMask {
    type Output = PinMask;
    fn bitor(self, rhs: PinMask) -> PinMask {
        PinMask(self.0 | rhs.0)
    }
}

impl BitAnd for PinMask {
    type Output = PinMask;
    fn bitand(self, rhs: PinMask) -> PinMask {
        PinMask(self.0 & rhs.0)
    }
}

impl BitXor for PinMask {
    type Output = PinMask;
    fn bitxor(self, rhs: PinMask) -> PinMask {
        PinMask(self.0 ^ rhs.0)
    }
}

impl fmt::Binary for PinMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Binary::fmt(&self.0, f)
    }
}

impl fmt::Display for PinMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, pin) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{pin}")?;
        }
        write!(f, "}}")
    }
}
