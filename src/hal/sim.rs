//! In-memory GPIO backend.
//!
//! Models what an application can observe on real pins: outputs read back
//! their latch, inputs follow an externally forced level or, when nothing
//! drives them, their pull resistor (floating inputs read low). Clones share
//! the same pins, so a test keeps one clone to drive levels while a `Gpio`
//! handle owns another.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{GpioError, Result};
use crate::hal::{ArchBackend, Mode, Pull};
use crate::pins::Numbering;

#[derive(Debug, Clone, Copy)]
struct SimPin {
    mode: Mode,
    pull: Pull,
    latch: bool,
    forced: Option<bool>,
}

impl Default for SimPin {
    fn default() -> Self {
        Self {
            mode: Mode::Input,
            pull: Pull::Off,
            latch: false,
            forced: None,
        }
    }
}

impl SimPin {
    fn level(&self) -> bool {
        if self.mode == Mode::Output {
            return self.latch;
        }
        match self.forced {
            Some(level) => level,
            None => self.pull == Pull::Up,
        }
    }
}

#[derive(Debug)]
struct SimState {
    pins: Vec<SimPin>,
    mutations: u64,
}

#[derive(Debug, Clone)]
pub struct SimBackend {
    state: Arc<Mutex<SimState>>,
    pull_readable: bool,
    pwm_pins: Arc<[u32]>,
}

impl SimBackend {
    /// `pin_count` input pins, pull off, pull state readable.
    pub fn new(pin_count: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                pins: vec![SimPin::default(); pin_count as usize],
                mutations: 0,
            })),
            pull_readable: true,
            pwm_pins: Arc::from(Vec::new()),
        }
    }

    /// Report `None` from `pull()`, like the BCM283x.
    pub fn with_unreadable_pull(mut self) -> Self {
        self.pull_readable = false;
        self
    }

    /// Pins that accept `Mode::Pwm` (read back as `Alt5`).
    pub fn with_pwm_pins(mut self, pins: &[u32]) -> Self {
        self.pwm_pins = Arc::from(pins.to_vec());
        self
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_pin<T>(&self, pin: u32, f: impl FnOnce(&mut SimPin) -> T) -> Result<T> {
        let mut state = self.lock();
        match state.pins.get_mut(pin as usize) {
            Some(p) => Ok(f(p)),
            None => Err(GpioError::InvalidPin {
                pin,
                numbering: Numbering::Mcu,
            }),
        }
    }

    /// Drive an input from the outside world.
    pub fn force_level(&self, pin: u32, high: bool) -> Result<()> {
        self.with_pin(pin, |p| p.forced = Some(high))
    }

    /// Stop driving an input; it falls back to its pull.
    pub fn release_level(&self, pin: u32) -> Result<()> {
        self.with_pin(pin, |p| p.forced = None)
    }

    /// Program a pin as if firmware had done it before the process started.
    pub fn preset(&self, pin: u32, mode: Mode, pull: Pull) -> Result<()> {
        self.with_pin(pin, |p| {
            p.mode = mode;
            p.pull = pull;
        })
    }

    /// Output latch regardless of the pin mode.
    pub fn latch(&self, pin: u32) -> Result<bool> {
        self.with_pin(pin, |p| p.latch)
    }

    /// Raw pull setting, readable even when `pull()` hides it.
    pub fn raw_pull(&self, pin: u32) -> Result<Pull> {
        self.with_pin(pin, |p| p.pull)
    }

    /// Number of mode, pull and latch changes seen so far.
    pub fn mutations(&self) -> u64 {
        self.lock().mutations
    }

    fn mutate(&self, pin: u32, f: impl FnOnce(&mut SimPin)) -> Result<()> {
        let mut state = self.lock();
        let p = state.pins.get_mut(pin as usize).ok_or(GpioError::InvalidPin {
            pin,
            numbering: Numbering::Mcu,
        })?;
        f(p);
        state.mutations += 1;
        Ok(())
    }
}

impl ArchBackend for SimBackend {
    fn name(&self) -> &str {
        "simulated"
    }

    fn pin_count(&self) -> u32 {
        self.lock().pins.len() as u32
    }

    fn set_mode(&self, pin: u32, mode: Mode) -> Result<()> {
        let mode = match mode {
            Mode::Pwm if self.pwm_pins.contains(&pin) => Mode::Alt5,
            Mode::Pwm => return Err(GpioError::UnsupportedMode { pin, mode }),
            other => other,
        };
        self.mutate(pin, |p| p.mode = mode)
    }

    fn mode(&self, pin: u32) -> Result<Mode> {
        self.with_pin(pin, |p| p.mode)
    }

    fn set_pull(&self, pin: u32, pull: Pull) -> Result<()> {
        self.mutate(pin, |p| p.pull = pull)
    }

    fn pull(&self, pin: u32) -> Result<Option<Pull>> {
        let pull = self.with_pin(pin, |p| p.pull)?;
        Ok(self.pull_readable.then_some(pull))
    }

    fn write(&self, pin: u32, high: bool) -> Result<()> {
        self.mutate(pin, |p| p.latch = high)
    }

    fn read(&self, pin: u32) -> Result<bool> {
        self.with_pin(pin, |p| p.level())
    }

    fn toggle(&self, pin: u32) -> Result<()> {
        self.mutate(pin, |p| p.latch = !p.latch)
    }
}
