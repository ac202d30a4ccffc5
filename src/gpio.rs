//! # GPIO Handle
//!
//! `Gpio` is the object applications open to reach the pins of the board.
//! It combines one register backend, one pin table and the bookkeeping
//! needed to hand the hardware back in the state it was found:
//!
//! - the first mode or pull change of a pin records the value it replaced
//! - when the last reference goes away, recorded pins are restored if
//!   release-on-close is enabled (the default)
//!
//! ## Sharing
//!
//! `Gpio` is a reference-counted handle. `Clone` adds a reference and
//! [`Gpio::close`] (or drop) removes one. [`Gpio::open`] returns the handle
//! already open in the process when there is one, so independent components
//! share the same pin bookkeeping. Handles made with [`Gpio::builder`] are
//! private to their owner.
//!
//! ```rust,no_run
//! use sbcio::{Gpio, Mode};
//!
//! let gpio = Gpio::open()?;
//! gpio.set_mode(0, Mode::Output)?;
//! gpio.write(0, true)?;
//! gpio.close()?;
//! # Ok::<(), sbcio::GpioError>(())
//! ```
//!
//! ## Concurrency
//!
//! Mode and pull changes are serialized by the handle. `write` and `read`
//! go straight to the backend so independent output pins can be driven from
//! different threads. `toggle` is a read-modify-write and two threads
//! toggling pins that share a register word can lose an update on the
//! BCM283x. On the H3 every data write is a read-modify-write of the bank
//! register, serialized inside the backend.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use log::{debug, info, trace, warn};
use once_cell::sync::OnceCell;

use crate::board;
use crate::config::GpioConfig;
use crate::error::{GpioError, Result};
use crate::hal::{self, ArchBackend, Mode, Pull};
use crate::mask::PinMask;
use crate::pins::{Numbering, PinTable};

/// Handle currently returned by `Gpio::open`, if any is alive.
static OPEN_HANDLE: OnceCell<Mutex<Weak<Shared>>> = OnceCell::new();

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Shared, reference-counted access to the board's pins.
#[derive(Debug, Clone)]
pub struct Gpio {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    backend: Arc<dyn ArchBackend>,
    table: Arc<PinTable>,
    state: Mutex<HandleState>,
}

#[derive(Debug)]
struct HandleState {
    numbering: Numbering,
    release_on_close: bool,
    released: bool,
    /// Indexed by MCU pin
    pins: Vec<PinRecord>,
    /// Valid pins of the active numbering, ascending
    order: Vec<u32>,
    /// Cursor position between entries of `order`
    cursor: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct PinRecord {
    /// Mode replaced by the first mode change
    restore_mode: Option<Mode>,
    /// Pull replaced by the first pull change (inner `None`: not readable)
    restore_pull: Option<Option<Pull>>,
    /// Last pull written through this handle
    pull: Option<Pull>,
}

/// Builder for `Gpio` handles with an explicit backend, table or settings.
///
/// Missing parts are filled in from the board probe:
///
/// ```rust
/// use sbcio::hal::SimBackend;
/// use sbcio::pins::{Numbering, RPI_REV3};
/// use sbcio::Gpio;
///
/// let gpio = Gpio::builder()
///     .backend(SimBackend::new(54))
///     .pin_table(RPI_REV3.clone())
///     .numbering(Numbering::Physical)
///     .build()
///     .unwrap();
/// assert_eq!(gpio.mcu_pin(11).unwrap(), 17);
/// ```
#[derive(Debug, Default)]
pub struct GpioBuilder {
    config: GpioConfig,
    backend: Option<Arc<dyn ArchBackend>>,
    table: Option<Arc<PinTable>>,
}

impl GpioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: GpioConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn numbering(mut self, numbering: Numbering) -> Self {
        self.config.numbering = numbering;
        self
    }

    pub fn release_on_close(mut self, enabled: bool) -> Self {
        self.config.release_on_close = enabled;
        self
    }

    pub fn mem_device(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mem_device = path.into();
        self
    }

    pub fn backend(mut self, backend: impl ArchBackend + 'static) -> Self {
        self.backend = Some(Arc::new(backend));
        self
    }

    pub fn shared_backend(mut self, backend: Arc<dyn ArchBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn pin_table(mut self, table: PinTable) -> Self {
        self.table = Some(Arc::new(table));
        self
    }

    /// Join the process-wide handle, or build it and make it the one
    /// [`Gpio::open`] returns while it is alive. The builder settings only
    /// apply when a new handle is created. A failed build registers nothing.
    pub fn open_shared(self) -> Result<Gpio> {
        let registry = OPEN_HANDLE.get_or_init(|| Mutex::new(Weak::new()));
        let mut current = lock(registry);

        if let Some(shared) = current.upgrade() {
            debug!("GPIO handle joined, {} references", Arc::strong_count(&shared));
            return Ok(Gpio { shared });
        }

        let gpio = self.build()?;
        *current = Arc::downgrade(&gpio.shared);
        Ok(gpio)
    }

    /// Open a private handle. Probes the board for whatever was not supplied.
    pub fn build(self) -> Result<Gpio> {
        let (backend, table) = match (self.backend, self.table) {
            (Some(backend), Some(table)) => (backend, table),
            (backend, table) => {
                let board = board::probe()?;
                let backend = match backend {
                    Some(b) => b,
                    None => hal::select_backend(board, &self.config.mem_device)?,
                };
                let table = table.unwrap_or_else(|| Arc::new(board.pin_table().clone()));
                (backend, table)
            }
        };

        if let Some(max) = table.max_mcu() {
            if max >= backend.pin_count() {
                return Err(GpioError::Config(format!(
                    "pin table '{}' uses MCU pin {} but the {} backend has {} pins",
                    table.name(),
                    max,
                    backend.name(),
                    backend.pin_count()
                )));
            }
        }

        let numbering = self.config.numbering;
        let state = HandleState {
            numbering,
            release_on_close: self.config.release_on_close,
            released: false,
            pins: vec![PinRecord::default(); backend.pin_count() as usize],
            order: table.pins(numbering),
            cursor: 0,
        };

        info!(
            "GPIO opened: {} on {} backend, {} numbering, {} pins",
            table.name(),
            backend.name(),
            numbering,
            state.order.len()
        );

        Ok(Gpio {
            shared: Arc::new(Shared {
                backend,
                table,
                state: Mutex::new(state),
            }),
        })
    }
}

impl Gpio {
    /// Open the board's GPIO with default settings, or join the handle
    /// already open in this process.
    pub fn open() -> Result<Self> {
        Self::open_with(GpioConfig::default())
    }

    /// Like [`Gpio::open`]; `config` only applies when a new handle is created.
    pub fn open_with(config: GpioConfig) -> Result<Self> {
        GpioBuilder::from_config(config).open_shared()
    }

    pub fn builder() -> GpioBuilder {
        GpioBuilder::new()
    }

    /// Drop this reference. The last one restores modified pins when
    /// release-on-close is enabled and reports the first restore failure.
    pub fn close(self) -> Result<()> {
        match Arc::into_inner(self.shared) {
            Some(shared) => shared.release(),
            None => Ok(()),
        }
    }

    /// Number of live references to this handle
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.shared)
    }

    /// Whether `self` and `other` are references to the same handle
    pub fn same_handle(&self, other: &Gpio) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub fn backend_name(&self) -> &str {
        self.shared.backend.name()
    }

    pub fn pin_table(&self) -> &PinTable {
        &self.shared.table
    }

    fn state(&self) -> MutexGuard<'_, HandleState> {
        lock(&self.shared.state)
    }

    fn resolve(&self, state: &HandleState, pin: u32) -> Result<u32> {
        self.shared
            .table
            .to_mcu(pin, state.numbering)
            .filter(|&mcu| (mcu as usize) < state.pins.len())
            .ok_or(GpioError::InvalidPin {
                pin,
                numbering: state.numbering,
            })
    }

    /// MCU pin behind `pin` in the active numbering
    pub fn mcu_pin(&self, pin: u32) -> Result<u32> {
        let state = self.state();
        self.resolve(&state, pin)
    }

    pub fn is_valid(&self, pin: u32) -> bool {
        self.mcu_pin(pin).is_ok()
    }

    /// Number of usable pins in the active numbering
    pub fn size(&self) -> usize {
        self.state().order.len()
    }

    pub fn numbering(&self) -> Numbering {
        self.state().numbering
    }

    /// Switch numbering scheme. The pin cursor goes back to the front.
    pub fn set_numbering(&self, numbering: Numbering) {
        let mut state = self.state();
        if state.numbering != numbering {
            state.order = self.shared.table.pins(numbering);
            state.numbering = numbering;
            state.cursor = 0;
            debug!("GPIO numbering set to {numbering}");
        }
    }

    pub fn release_on_close(&self) -> bool {
        self.state().release_on_close
    }

    pub fn set_release_on_close(&self, enabled: bool) {
        self.state().release_on_close = enabled;
    }

    pub fn set_mode(&self, pin: u32, mode: Mode) -> Result<()> {
        let mut state = self.state();
        let mcu = self.resolve(&state, pin)?;
        let backend = &self.shared.backend;

        let previous = backend.mode(mcu)?;
        backend.set_mode(mcu, mode)?;
        state.pins[mcu as usize].restore_mode.get_or_insert(previous);
        trace!("pin {pin} (MCU {mcu}): {previous} -> {mode}");
        Ok(())
    }

    pub fn mode(&self, pin: u32) -> Result<Mode> {
        let mcu = self.mcu_pin(pin)?;
        self.shared.backend.mode(mcu)
    }

    pub fn set_pull(&self, pin: u32, pull: Pull) -> Result<()> {
        let mut state = self.state();
        let mcu = self.resolve(&state, pin)?;
        let backend = &self.shared.backend;

        let previous = backend.pull(mcu)?;
        backend.set_pull(mcu, pull)?;
        let record = &mut state.pins[mcu as usize];
        record.restore_pull.get_or_insert(previous);
        record.pull = Some(pull);
        Ok(())
    }

    /// Pull of `pin`: read from hardware where possible, otherwise the last
    /// value set through this handle. `None` when neither is known.
    pub fn pull(&self, pin: u32) -> Result<Option<Pull>> {
        let state = self.state();
        let mcu = self.resolve(&state, pin)?;
        let hw = self.shared.backend.pull(mcu)?;
        Ok(hw.or(state.pins[mcu as usize].pull))
    }

    pub fn write(&self, pin: u32, high: bool) -> Result<()> {
        let mcu = self.mcu_pin(pin)?;
        self.shared.backend.write(mcu, high)
    }

    pub fn read(&self, pin: u32) -> Result<bool> {
        let mcu = self.mcu_pin(pin)?;
        self.shared.backend.read(mcu)
    }

    pub fn toggle(&self, pin: u32) -> Result<()> {
        let mcu = self.mcu_pin(pin)?;
        self.shared.backend.toggle(mcu)
    }

    /// Valid pins of `mask` with their MCU numbers. Pins that are not valid
    /// in the active numbering are dropped.
    fn mask_targets(&self, mask: PinMask) -> Vec<(u32, u32)> {
        let state = self.state();
        let table = &self.shared.table;
        mask.iter()
            .filter_map(|pin| {
                let mcu = table.to_mcu(pin, state.numbering)?;
                ((mcu as usize) < state.pins.len()).then_some((pin, mcu))
            })
            .collect()
    }

    /// Levels of the pins in `mask`. An empty mask reads every valid pin;
    /// pins that are not valid in the active numbering are skipped.
    pub fn read_all(&self, mask: PinMask) -> Result<PinMask> {
        let mask = if mask.is_empty() {
            PinMask::from_pins(self.pins())?
        } else {
            mask
        };
        let mut levels = PinMask::empty();
        for (pin, mcu) in self.mask_targets(mask) {
            if self.shared.backend.read(mcu)? {
                levels.try_insert(pin)?;
            }
        }
        Ok(levels)
    }

    /// Drive every output pin of `mask`. Pins in another mode are left
    /// alone and an empty mask drives nothing.
    pub fn write_all(&self, mask: PinMask, high: bool) -> Result<()> {
        let backend = &self.shared.backend;
        for (_, mcu) in self.mask_targets(mask) {
            if backend.mode(mcu)? == Mode::Output {
                backend.write(mcu, high)?;
            }
        }
        Ok(())
    }

    /// Toggle every output pin of `mask`. Pins in another mode are left
    /// alone and an empty mask toggles nothing.
    pub fn toggle_all(&self, mask: PinMask) -> Result<()> {
        let backend = &self.shared.backend;
        for (_, mcu) in self.mask_targets(mask) {
            if backend.mode(mcu)? == Mode::Output {
                backend.toggle(mcu)?;
            }
        }
        Ok(())
    }

    /// Snapshot of the valid pins of the active numbering, ascending.
    pub fn pins(&self) -> Vec<u32> {
        self.state().order.clone()
    }

    // Pin cursor. Shared by every reference to the handle.

    pub fn to_front(&self) {
        self.state().cursor = 0;
    }

    pub fn to_back(&self) {
        let mut state = self.state();
        state.cursor = state.order.len();
    }

    pub fn has_next(&self) -> bool {
        let state = self.state();
        state.cursor < state.order.len()
    }

    pub fn has_previous(&self) -> bool {
        self.state().cursor > 0
    }

    /// Pin after the cursor; advances the cursor.
    pub fn next(&self) -> Option<u32> {
        let mut state = self.state();
        let pin = state.order.get(state.cursor).copied()?;
        state.cursor += 1;
        Some(pin)
    }

    /// Pin before the cursor; moves the cursor back.
    pub fn previous(&self) -> Option<u32> {
        let mut state = self.state();
        let idx = state.cursor.checked_sub(1)?;
        state.cursor = idx;
        state.order.get(idx).copied()
    }

    pub(crate) fn read_mcu(&self, mcu: u32) -> Result<bool> {
        self.shared.backend.read(mcu)
    }

    pub(crate) fn write_mcu(&self, mcu: u32, high: bool) -> Result<()> {
        self.shared.backend.write(mcu, high)
    }

    pub(crate) fn toggle_mcu(&self, mcu: u32) -> Result<()> {
        self.shared.backend.toggle(mcu)
    }
}

impl Shared {
    fn release(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.released {
            return Ok(());
        }
        state.released = true;

        if !state.release_on_close {
            debug!("GPIO closed, pins left as configured");
            return Ok(());
        }

        let mut first_error = None;
        let mut restored = 0;
        for (mcu, record) in state.pins.iter_mut().enumerate() {
            match self.restore(mcu as u32, record) {
                Ok(true) => restored += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to restore MCU pin {mcu}: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }
        debug!("GPIO closed, {restored} pins restored");

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Put one pin back. Returns whether anything had to be restored.
    fn restore(&self, mcu: u32, record: &mut PinRecord) -> Result<bool> {
        let mode = record.restore_mode.take();
        let pull = record.restore_pull.take();
        record.pull = None;
        if mode.is_none() && pull.is_none() {
            return Ok(false);
        }

        if let Some(mode) = mode {
            self.backend.set_mode(mcu, mode)?;
            trace!("MCU pin {mcu} restored to {mode}");
        }

        match pull {
            Some(Some(previous)) => self.backend.set_pull(mcu, previous)?,
            // Changed, but the original value was never readable
            Some(None) => self.backend.set_pull(mcu, Pull::Down)?,
            None if mode == Some(Mode::Input) && self.backend.pull(mcu)?.is_none() => {
                self.backend.set_pull(mcu, Pull::Down)?
            }
            None => {}
        }
        Ok(true)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("GPIO release on drop failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::SimBackend;
    use crate::pins::RPI_REV3;

    fn sim_gpio(sim: &SimBackend) -> Gpio {
        Gpio::builder()
            .backend(sim.clone())
            .pin_table(RPI_REV3.clone())
            .build()
            .unwrap()
    }

    #[test]
    fn test_first_mutation_wins() {
        let sim = SimBackend::new(54);
        sim.preset(17, Mode::Alt3, Pull::Up).unwrap();
        let gpio = sim_gpio(&sim);

        gpio.set_mode(0, Mode::Output).unwrap();
        gpio.set_mode(0, Mode::Input).unwrap();
        gpio.set_pull(0, Pull::Down).unwrap();
        gpio.set_pull(0, Pull::Off).unwrap();

        let state = gpio.state();
        assert_eq!(state.pins[17].restore_mode, Some(Mode::Alt3));
        assert_eq!(state.pins[17].restore_pull, Some(Some(Pull::Up)));
        drop(state);

        gpio.close().unwrap();
        assert_eq!(sim.mode(17).unwrap(), Mode::Alt3);
        assert_eq!(sim.raw_pull(17).unwrap(), Pull::Up);
    }

    #[test]
    fn test_failed_mode_change_records_nothing() {
        let sim = SimBackend::new(54);
        let gpio = sim_gpio(&sim);
        assert!(gpio.set_mode(0, Mode::Pwm).is_err());
        assert_eq!(gpio.state().pins[17].restore_mode, None);
    }

    #[test]
    fn test_table_larger_than_backend_rejected() {
        let err = Gpio::builder()
            .backend(SimBackend::new(20))
            .pin_table(RPI_REV3.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, GpioError::Config(_)));
    }

    #[test]
    fn test_cursor_walk() {
        let sim = SimBackend::new(54);
        let gpio = Gpio::builder()
            .backend(sim)
            .pin_table(PinTable::logical_only("small", vec![4, -1, 7]).unwrap())
            .build()
            .unwrap();

        assert!(!gpio.has_previous());
        assert_eq!(gpio.next(), Some(0));
        assert_eq!(gpio.next(), Some(2));
        assert_eq!(gpio.next(), None);
        assert_eq!(gpio.previous(), Some(2));
        gpio.to_back();
        assert!(!gpio.has_next());
        assert_eq!(gpio.previous(), Some(2));
        assert_eq!(gpio.previous(), Some(0));
        assert_eq!(gpio.previous(), None);
    }
}
