//! Switch adapter over a `DinPort`.
//!
//! A switch only cares which input changed and what the inputs look like
//! now, not the edge direction. Installing a switch callback arms every
//! input of the port for both edges and registers as its group callback.

use crate::dinput::{DinPort, Edge};
use crate::error::Result;
use crate::mask::PinMask;

#[derive(Debug)]
pub struct Switch<'a> {
    port: &'a DinPort,
}

impl<'a> Switch<'a> {
    pub fn new(port: &'a DinPort) -> Self {
        Self { port }
    }

    pub fn port(&self) -> &DinPort {
        self.port
    }

    /// Call `callback` with the active-input mask and the index of the input
    /// that changed. Inputs with their own callback keep it.
    pub fn set_callback<F>(&self, mut callback: F) -> Result<()>
    where
        F: FnMut(PinMask, usize) -> anyhow::Result<()> + Send + 'static,
    {
        for index in 0..self.port.size() {
            self.port.set_edge(index, Edge::BOTH)?;
        }
        self.port
            .set_group_callback(move |mask, index, _edge| callback(mask, index))
    }

    pub fn clear_callback(&self) -> Result<()> {
        self.port.clear_group_callback()
    }

    /// Current active-input mask
    pub fn state(&self) -> Result<PinMask> {
        self.port.read_all()
    }
}
