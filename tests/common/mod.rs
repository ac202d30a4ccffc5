//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use sbcio::hal::SimBackend;
use sbcio::pins::RPI_REV3;
use sbcio::{Gpio, PinTable};

/// MCU pins behind logical pins 0, 1 and 2
pub const SCENARIO_MCU: [u32; 3] = [17, 18, 27];

/// Three logical pins on MCU 17, 18 and 27.
pub fn scenario_table() -> PinTable {
    PinTable::logical_only("scenario", SCENARIO_MCU.iter().map(|&m| m as i16).collect()).unwrap()
}

/// Private handle over `sim` with the 40-pin Raspberry Pi layout.
pub fn rpi_gpio(sim: &SimBackend) -> Gpio {
    Gpio::builder()
        .backend(sim.clone())
        .pin_table(RPI_REV3.clone())
        .build()
        .unwrap()
}

/// Private handle over `sim` with the three-pin scenario layout.
pub fn scenario_gpio(sim: &SimBackend) -> Gpio {
    Gpio::builder()
        .backend(sim.clone())
        .pin_table(scenario_table())
        .build()
        .unwrap()
}
