//! # Digital Input Port
//!
//! A `DinPort` groups input pins of a [`Gpio`] handle, normalizes their
//! levels against each pin's active polarity and turns level changes into
//! edges.
//!
//! Edges are detected by sampling. [`DinPort::poll`] runs one sampling cycle
//! on the calling thread; installing a callback starts a monitor thread that
//! runs a cycle every `poll_interval` until the last callback is removed.
//!
//! For every pin whose change matches its trigger the cycle
//!
//! 1. records the edge in the pin's one-shot flag ([`DinPort::edge_occurred`])
//! 2. hands the edge to the pin callback, or to the group callback when the
//!    pin has none; a dispatched edge consumes the flag
//!
//! A callback cleared or replaced before its turn in the cycle is skipped and
//! the edge stays in the flag. One already running finishes that invocation.
//!
//! A callback returning `Err` is logged and counted; monitoring goes on.
//! Callbacks run on the monitor thread and delay the next sample while they
//! run. They must not call [`DinPort::poll`] on their own port.
//!
//! ```rust
//! use sbcio::dinput::{DinPin, DinPort, Edge};
//! use sbcio::hal::SimBackend;
//! use sbcio::pins::RPI_REV3;
//! use sbcio::{DinConfig, Gpio, Pull};
//!
//! let sim = SimBackend::new(54);
//! let gpio = Gpio::builder().backend(sim.clone()).pin_table(RPI_REV3.clone()).build()?;
//! let port = DinPort::open(&gpio, &[DinPin::active_low(0).with_pull(Pull::Up)], DinConfig::default())?;
//! port.set_edge(0, Edge::BOTH)?;
//!
//! sim.force_level(17, false)?; // button pressed
//! port.poll()?;
//! assert_eq!(port.edge_occurred(0)?, Edge::RISING);
//! # Ok::<(), sbcio::GpioError>(())
//! ```

use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use bitflags::bitflags;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::DinConfig;
use crate::constants::{CALLBACK_ERROR_LOG_CAP, CALLBACK_ERROR_LOG_WINDOW_MS, PIN_MASK_CAPACITY};
use crate::error::{GpioError, Result};
use crate::gpio::Gpio;
use crate::hal::{Mode, Pull};
use crate::mask::PinMask;
use crate::util::logging::{span_din_monitor, LogThrottle};

bitflags! {
    /// Edge of a normalized input level.
    ///
    /// Used both as a trigger (which edges a pin reacts to) and as the
    /// direction of a detected transition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Edge: u8 {
        /// Active to inactive
        const FALLING = 0b01;
        /// Inactive to active
        const RISING = 0b10;
        const BOTH = Self::FALLING.bits() | Self::RISING.bits();
    }
}

impl Edge {
    /// No edge / trigger disabled
    pub const NONE: Edge = Edge::empty();
}

impl Default for Edge {
    fn default() -> Self {
        Edge::NONE
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = if *self == Edge::BOTH {
            "both"
        } else if *self == Edge::RISING {
            "rising"
        } else if *self == Edge::FALLING {
            "falling"
        } else {
            "none"
        };
        f.write_str(s)
    }
}

/// Level at which an input counts as active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActiveLevel {
    #[default]
    High,
    Low,
}

/// One input of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DinPin {
    /// Pin number in the handle's numbering at the time the port is opened
    pub pin: u32,
    #[serde(default)]
    pub active: ActiveLevel,
    #[serde(default)]
    pub pull: Pull,
}

impl DinPin {
    pub fn active_high(pin: u32) -> Self {
        Self {
            pin,
            active: ActiveLevel::High,
            pull: Pull::Off,
        }
    }

    pub fn active_low(pin: u32) -> Self {
        Self {
            pin,
            active: ActiveLevel::Low,
            pull: Pull::Off,
        }
    }

    pub fn with_pull(mut self, pull: Pull) -> Self {
        self.pull = pull;
        self
    }
}

/// Counters of the sampling engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// Sampling cycles run
    pub samples: u64,
    /// Transitions that matched a trigger
    pub edges: u64,
    /// Callback invocations
    pub callbacks: u64,
    /// Callback invocations that returned an error
    pub callback_failures: u64,
}

type PinCallback = Arc<Mutex<Box<dyn FnMut(Edge) -> anyhow::Result<()> + Send>>>;
type GroupCallback = Arc<Mutex<Box<dyn FnMut(PinMask, usize, Edge) -> anyhow::Result<()> + Send>>>;

enum Dispatch {
    Pin(PinCallback),
    Group(GroupCallback),
}

#[derive(Default)]
struct PinSlot {
    trigger: Edge,
    occurred: Edge,
    callback: Option<PinCallback>,
}

struct PortState {
    slots: Vec<PinSlot>,
    group: Option<GroupCallback>,
    /// Normalized levels of the last accepted sample
    last: Vec<bool>,
    stats: MonitorStats,
}

impl PortState {
    fn has_callbacks(&self) -> bool {
        self.group.is_some() || self.slots.iter().any(|s| s.callback.is_some())
    }
}

struct Monitor {
    stop: Sender<()>,
    handle: JoinHandle<()>,
    thread: ThreadId,
}

impl Monitor {
    fn spawn(inner: Arc<PortInner>) -> Result<Self> {
        let (stop, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("sbcio-din".into())
            .spawn(move || run_monitor(inner, rx))
            .map_err(|e| GpioError::Thread(e.to_string()))?;
        let thread = handle.thread().id();
        Ok(Self {
            stop,
            handle,
            thread,
        })
    }

    /// Signal the thread and wait for it, unless called from the thread itself.
    fn stop(self) {
        let _ = self.stop.send(());
        if thread::current().id() == self.thread {
            debug!("Input monitor stop requested from its own callback");
            return;
        }
        if self.handle.join().is_err() {
            warn!("Input monitor thread panicked");
        }
    }
}

struct PortInner {
    gpio: Gpio,
    pins: Vec<DinPin>,
    mcu: Vec<u32>,
    config: DinConfig,
    state: Mutex<PortState>,
    /// Serializes sampling cycles
    cycle: Mutex<()>,
    throttle: Mutex<LogThrottle>,
    monitor: Mutex<Option<Monitor>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PortInner {
    fn sample(&self) -> Result<Vec<bool>> {
        self.pins
            .iter()
            .zip(&self.mcu)
            .map(|(pin, &mcu)| {
                let high = self.gpio.read_mcu(mcu)?;
                Ok(high == (pin.active == ActiveLevel::High))
            })
            .collect()
    }

    fn poll_cycle(&self) -> Result<()> {
        let _cycle = lock(&self.cycle);

        let levels = self.sample()?;
        {
            let mut state = lock(&self.state);
            state.stats.samples += 1;
            if levels == state.last {
                return Ok(());
            }
        }

        let levels = match self.config.debounce {
            Some(delay) => {
                thread::sleep(delay);
                let confirmed = self.sample()?;
                if confirmed != levels {
                    return Ok(());
                }
                confirmed
            }
            None => levels,
        };

        let mask = levels_to_mask(&levels)?;
        let mut calls = Vec::new();
        {
            let mut guard = lock(&self.state);
            let state = &mut *guard;
            for (index, (&now, slot)) in levels.iter().zip(state.slots.iter_mut()).enumerate() {
                if now == state.last[index] {
                    continue;
                }
                let edge = if now { Edge::RISING } else { Edge::FALLING };
                if !slot.trigger.intersects(edge) {
                    continue;
                }
                state.stats.edges += 1;
                slot.occurred = edge;

                let target = match (&slot.callback, &state.group) {
                    (Some(cb), _) => Some(Dispatch::Pin(Arc::clone(cb))),
                    (None, Some(group)) => Some(Dispatch::Group(Arc::clone(group))),
                    (None, None) => None,
                };
                if let Some(target) = target {
                    slot.occurred = Edge::NONE;
                    calls.push((index, edge, target));
                }
            }
            state.last = levels;
        }

        for (index, edge, target) in calls {
            // An earlier callback of this cycle, or another thread, may have
            // replaced or cleared the target since it was collected.
            let result = match target {
                Dispatch::Pin(cb) => {
                    let mut callback = lock(&cb);
                    if !self.is_current(index, edge, |slot, _| {
                        slot.callback.as_ref().is_some_and(|c| Arc::ptr_eq(c, &cb))
                    }) {
                        continue;
                    }
                    (*callback)(edge)
                }
                Dispatch::Group(cb) => {
                    let mut callback = lock(&cb);
                    if !self.is_current(index, edge, |slot, group| {
                        slot.callback.is_none()
                            && group.is_some_and(|g| Arc::ptr_eq(g, &cb))
                    }) {
                        continue;
                    }
                    (*callback)(mask, index, edge)
                }
            };

            let mut state = lock(&self.state);
            state.stats.callbacks += 1;
            if let Err(e) = result {
                state.stats.callback_failures += 1;
                drop(state);
                self.report(format_args!("Input {index} callback failed on {edge} edge: {e:#}"));
            }
        }
        Ok(())
    }

    /// Whether the collected target of `index` is still installed. If not,
    /// the edge is left in the one-shot flag instead.
    fn is_current<F>(&self, index: usize, edge: Edge, check: F) -> bool
    where
        F: FnOnce(&PinSlot, Option<&GroupCallback>) -> bool,
    {
        let mut state = lock(&self.state);
        let state = &mut *state;
        if check(&state.slots[index], state.group.as_ref()) {
            return true;
        }
        state.slots[index].occurred = edge;
        false
    }

    fn report(&self, message: fmt::Arguments<'_>) {
        let mut throttle = lock(&self.throttle);
        if throttle.allow() {
            match throttle.take_suppressed() {
                0 => warn!("{message}"),
                n => warn!("{message} ({n} similar messages suppressed)"),
            }
        }
    }
}

fn levels_to_mask(levels: &[bool]) -> Result<PinMask> {
    let mut mask = PinMask::empty();
    for (index, _) in levels.iter().enumerate().filter(|(_, &active)| active) {
        mask.try_insert(index as u32)?;
    }
    Ok(mask)
}

fn run_monitor(inner: Arc<PortInner>, stop: Receiver<()>) {
    let interval = inner.config.poll_interval;
    let span = span_din_monitor(inner.pins.len(), interval.as_millis() as u64);
    #[cfg(feature = "tracing")]
    let _entered = span.enter();
    #[cfg(not(feature = "tracing"))]
    let () = span;

    debug!("Input monitor started: {} pins every {:?}", inner.pins.len(), interval);
    loop {
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                if let Err(e) = inner.poll_cycle() {
                    inner.report(format_args!("Input sampling failed: {e}"));
                }
            }
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Input monitor stopped");
}

/// Edge-detecting group of digital inputs.
pub struct DinPort {
    inner: Arc<PortInner>,
}

impl DinPort {
    /// Configure `pins` as inputs with their pull and take the reference
    /// sample. The port keeps its own reference to `gpio`.
    pub fn open(gpio: &Gpio, pins: &[DinPin], config: DinConfig) -> Result<Self> {
        config.validate()?;
        if pins.len() > PIN_MASK_CAPACITY as usize {
            return Err(GpioError::MaskOverflow {
                pin: pins.len() as u32 - 1,
                capacity: PIN_MASK_CAPACITY,
            });
        }

        let mut mcu = Vec::with_capacity(pins.len());
        for pin in pins {
            gpio.set_mode(pin.pin, Mode::Input)?;
            gpio.set_pull(pin.pin, pin.pull)?;
            mcu.push(gpio.mcu_pin(pin.pin)?);
        }

        let inner = PortInner {
            gpio: gpio.clone(),
            pins: pins.to_vec(),
            mcu,
            config,
            state: Mutex::new(PortState {
                slots: pins.iter().map(|_| PinSlot::default()).collect(),
                group: None,
                last: Vec::new(),
                stats: MonitorStats::default(),
            }),
            cycle: Mutex::new(()),
            throttle: Mutex::new(LogThrottle::new(
                CALLBACK_ERROR_LOG_WINDOW_MS,
                CALLBACK_ERROR_LOG_CAP,
            )),
            monitor: Mutex::new(None),
        };
        let initial = inner.sample()?;
        lock(&inner.state).last = initial;

        debug!("Input port opened with {} pins", pins.len());
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    fn state(&self) -> MutexGuard<'_, PortState> {
        lock(&self.inner.state)
    }

    fn check(&self, index: usize) -> Result<()> {
        let size = self.size();
        if index < size {
            Ok(())
        } else {
            Err(GpioError::InvalidPortIndex { index, size })
        }
    }

    pub fn size(&self) -> usize {
        self.inner.pins.len()
    }

    pub fn pin(&self, index: usize) -> Result<&DinPin> {
        self.check(index)?;
        Ok(&self.inner.pins[index])
    }

    pub fn gpio(&self) -> &Gpio {
        &self.inner.gpio
    }

    /// `true` when input `index` is at its active level.
    pub fn read(&self, index: usize) -> Result<bool> {
        let pin = self.pin(index)?;
        let high = self.inner.gpio.read_mcu(self.inner.mcu[index])?;
        Ok(high == (pin.active == ActiveLevel::High))
    }

    /// Active inputs, bit `n` for input `n`.
    pub fn read_all(&self) -> Result<PinMask> {
        levels_to_mask(&self.inner.sample()?)
    }

    pub fn set_edge(&self, index: usize, edge: Edge) -> Result<()> {
        self.check(index)?;
        self.state().slots[index].trigger = edge;
        Ok(())
    }

    pub fn edge(&self, index: usize) -> Result<Edge> {
        self.check(index)?;
        Ok(self.state().slots[index].trigger)
    }

    /// Edge detected on `index` since the last call, `Edge::NONE` if none.
    /// Reading the flag clears it.
    pub fn edge_occurred(&self, index: usize) -> Result<Edge> {
        self.check(index)?;
        Ok(std::mem::take(&mut self.state().slots[index].occurred))
    }

    /// Call `callback` with the direction of each edge of `index` matching
    /// its trigger. Replaces any previous callback of that input.
    pub fn set_callback<F>(&self, index: usize, callback: F) -> Result<()>
    where
        F: FnMut(Edge) -> anyhow::Result<()> + Send + 'static,
    {
        self.check(index)?;
        self.state().slots[index].callback = Some(Arc::new(Mutex::new(Box::new(callback))));
        self.sync_monitor()
    }

    pub fn clear_callback(&self, index: usize) -> Result<()> {
        self.check(index)?;
        self.state().slots[index].callback = None;
        self.sync_monitor()
    }

    pub fn callback_installed(&self, index: usize) -> Result<bool> {
        self.check(index)?;
        Ok(self.state().slots[index].callback.is_some())
    }

    /// Call `callback` for edges of inputs without their own callback, with
    /// the active-input mask, the input index and the edge.
    pub fn set_group_callback<F>(&self, callback: F) -> Result<()>
    where
        F: FnMut(PinMask, usize, Edge) -> anyhow::Result<()> + Send + 'static,
    {
        self.state().group = Some(Arc::new(Mutex::new(Box::new(callback))));
        self.sync_monitor()
    }

    pub fn clear_group_callback(&self) -> Result<()> {
        self.state().group = None;
        self.sync_monitor()
    }

    pub fn group_callback_installed(&self) -> bool {
        self.state().group.is_some()
    }

    /// Whether the monitor thread is running
    pub fn is_monitoring(&self) -> bool {
        lock(&self.inner.monitor).is_some()
    }

    /// Run one sampling cycle on the calling thread.
    pub fn poll(&self) -> Result<()> {
        self.inner.poll_cycle()
    }

    pub fn stats(&self) -> MonitorStats {
        self.state().stats
    }

    /// Start the monitor when the first callback arrives, stop it when the
    /// last one goes.
    fn sync_monitor(&self) -> Result<()> {
        // Read the callbacks under the monitor lock so the last caller decides
        let mut monitor = lock(&self.inner.monitor);
        let wanted = self.state().has_callbacks();
        match (wanted, monitor.is_some()) {
            (true, false) => {
                *monitor = Some(Monitor::spawn(Arc::clone(&self.inner))?);
            }
            (false, true) => {
                let running = monitor.take();
                drop(monitor);
                if let Some(m) = running {
                    m.stop();
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn stop_monitor(&self) {
        let running = lock(&self.inner.monitor).take();
        if let Some(m) = running {
            m.stop();
        }
    }

    /// Stop monitoring and drop the port's `Gpio` reference; reports the
    /// release result when that was the last reference.
    pub fn close(self) -> Result<()> {
        self.stop_monitor();
        let inner = Arc::clone(&self.inner);
        drop(self);
        match Arc::try_unwrap(inner) {
            Ok(inner) => inner.gpio.close(),
            Err(_) => Ok(()),
        }
    }
}

impl Drop for DinPort {
    fn drop(&mut self) {
        self.stop_monitor();
    }
}

impl fmt::Debug for DinPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DinPort")
            .field("pins", &self.inner.pins)
            .field("config", &self.inner.config)
            .field("monitoring", &self.is_monitoring())
            .finish()
    }
}
