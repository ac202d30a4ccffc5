//! Tests for the shared `Gpio` handle over the simulated backend.

mod common;

use common::{rpi_gpio, scenario_gpio, SCENARIO_MCU};
use sbcio::hal::SimBackend;
use sbcio::{ArchBackend, Gpio, GpioError, Mode, Numbering, PinMask, Pull};

/// Output on logical pin 0 reads back and is restored to input on close.
#[test]
fn test_scenario_output_restored_on_close() {
    let sim = SimBackend::new(54);
    let gpio = scenario_gpio(&sim);

    gpio.set_mode(0, Mode::Output).unwrap();
    gpio.write(0, true).unwrap();
    assert!(gpio.read(0).unwrap());
    assert_eq!(sim.mode(17).unwrap(), Mode::Output);

    gpio.close().unwrap();
    assert_eq!(sim.mode(17).unwrap(), Mode::Input);
}

/// N references closed one by one leave every pin as it was found.
#[test]
fn test_clones_restore_on_last_close() {
    let sim = SimBackend::new(54);
    sim.preset(18, Mode::Alt5, Pull::Up).unwrap();
    sim.preset(27, Mode::Output, Pull::Off).unwrap();

    let gpio = scenario_gpio(&sim);
    let refs: Vec<Gpio> = (0..4).map(|_| gpio.clone()).collect();
    assert_eq!(gpio.ref_count(), 5);

    refs[0].set_mode(1, Mode::Input).unwrap();
    refs[1].set_pull(1, Pull::Down).unwrap();
    refs[2].set_mode(2, Mode::Input).unwrap();
    refs[3].set_pull(0, Pull::Up).unwrap();

    for handle in refs {
        handle.close().unwrap();
        assert_eq!(sim.mode(18).unwrap(), Mode::Input);
    }
    assert_eq!(gpio.ref_count(), 1);
    gpio.close().unwrap();

    assert_eq!(sim.mode(18).unwrap(), Mode::Alt5);
    assert_eq!(sim.raw_pull(18).unwrap(), Pull::Up);
    assert_eq!(sim.mode(27).unwrap(), Mode::Output);
    assert_eq!(sim.mode(17).unwrap(), Mode::Input);
    assert_eq!(sim.raw_pull(17).unwrap(), Pull::Off);
}

/// With release-on-close disabled the last state persists.
#[test]
fn test_release_on_close_disabled() {
    let sim = SimBackend::new(54);
    let gpio = Gpio::builder()
        .backend(sim.clone())
        .pin_table(common::scenario_table())
        .release_on_close(false)
        .build()
        .unwrap();

    gpio.set_mode(2, Mode::Output).unwrap();
    gpio.set_pull(1, Pull::Up).unwrap();
    gpio.clone().close().unwrap();
    gpio.close().unwrap();

    assert_eq!(sim.mode(27).unwrap(), Mode::Output);
    assert_eq!(sim.raw_pull(18).unwrap(), Pull::Up);
}

/// Release-on-close can be switched at runtime.
#[test]
fn test_release_on_close_toggled_at_runtime() {
    let sim = SimBackend::new(54);
    let gpio = scenario_gpio(&sim);
    assert!(gpio.release_on_close());
    gpio.set_mode(0, Mode::Output).unwrap();
    gpio.set_release_on_close(false);
    drop(gpio);
    assert_eq!(sim.mode(17).unwrap(), Mode::Output);
}

/// Dropping the last reference restores like `close`.
#[test]
fn test_drop_restores() {
    let sim = SimBackend::new(54);
    {
        let gpio = scenario_gpio(&sim);
        gpio.set_mode(1, Mode::Output).unwrap();
    }
    assert_eq!(sim.mode(18).unwrap(), Mode::Input);
}

/// Restoring an input on a backend without pull read-back forces pull-down.
#[test]
fn test_input_restore_pulls_down_without_pull_readback() {
    let sim = SimBackend::new(54).with_unreadable_pull();
    sim.preset(17, Mode::Input, Pull::Up).unwrap();
    let gpio = scenario_gpio(&sim);

    gpio.set_mode(0, Mode::Output).unwrap();
    gpio.close().unwrap();

    assert_eq!(sim.mode(17).unwrap(), Mode::Input);
    assert_eq!(sim.raw_pull(17).unwrap(), Pull::Down);
}

/// A pull change with an unreadable original is undone as pull-down.
#[test]
fn test_unreadable_pull_change_restored_as_down() {
    let sim = SimBackend::new(54).with_unreadable_pull();
    let gpio = scenario_gpio(&sim);

    gpio.set_pull(1, Pull::Up).unwrap();
    assert_eq!(gpio.pull(1).unwrap(), Some(Pull::Up));
    assert_eq!(gpio.pull(2).unwrap(), None);
    gpio.close().unwrap();

    assert_eq!(sim.raw_pull(18).unwrap(), Pull::Down);
}

/// With readable pull, an untouched pull survives a mode restore.
#[test]
fn test_readable_pull_left_alone() {
    let sim = SimBackend::new(54);
    sim.preset(17, Mode::Input, Pull::Up).unwrap();
    let gpio = scenario_gpio(&sim);

    gpio.set_mode(0, Mode::Output).unwrap();
    gpio.close().unwrap();
    assert_eq!(sim.raw_pull(17).unwrap(), Pull::Up);
}

/// Invalid pins fail without touching the hardware.
#[test]
fn test_invalid_pin_has_no_side_effect() {
    let sim = SimBackend::new(54);
    let gpio = scenario_gpio(&sim);
    let before = sim.mutations();

    let err = gpio.set_mode(3, Mode::Output).unwrap_err();
    assert_eq!(err.to_string(), "Invalid logical pin: 3");
    assert!(matches!(gpio.write(7, true), Err(GpioError::InvalidPin { pin: 7, .. })));
    assert!(gpio.set_pull(100, Pull::Up).is_err());
    assert!(gpio.read(3).is_err());
    assert_eq!(sim.mutations(), before);
}

/// PWM is only accepted on PWM-capable pins.
#[test]
fn test_pwm_mode() {
    let sim = SimBackend::new(54).with_pwm_pins(&[18]);
    let gpio = scenario_gpio(&sim);

    gpio.set_mode(1, Mode::Pwm).unwrap();
    assert_eq!(gpio.mode(1).unwrap(), Mode::Alt5);
    let err = gpio.set_mode(0, Mode::Pwm).unwrap_err();
    assert!(matches!(err, GpioError::UnsupportedMode { pin: 17, mode: Mode::Pwm }));
}

/// The same MCU pin is reachable through every numbering scheme.
#[test]
fn test_numbering_schemes() {
    let sim = SimBackend::new(54);
    let gpio = rpi_gpio(&sim);
    assert_eq!(gpio.numbering(), Numbering::Logical);
    assert_eq!(gpio.mcu_pin(0).unwrap(), 17);

    gpio.set_numbering(Numbering::Physical);
    assert_eq!(gpio.mcu_pin(11).unwrap(), 17);
    assert!(!gpio.is_valid(1));
    assert_eq!(gpio.size(), 28);

    gpio.set_numbering(Numbering::Mcu);
    assert_eq!(gpio.mcu_pin(17).unwrap(), 17);
    assert!(!gpio.is_valid(28));
    gpio.set_mode(17, Mode::Output).unwrap();
    assert_eq!(sim.mode(17).unwrap(), Mode::Output);
}

/// The cursor skips gaps and restarts when the numbering changes.
#[test]
fn test_pin_iteration() {
    let sim = SimBackend::new(54);
    let gpio = rpi_gpio(&sim);

    let mut logical = Vec::new();
    while let Some(pin) = gpio.next() {
        logical.push(pin);
    }
    assert_eq!(logical, gpio.pins());
    assert!(!logical.contains(&17));
    assert!(!gpio.has_next());
    assert!(gpio.has_previous());

    gpio.set_numbering(Numbering::Physical);
    assert!(!gpio.has_previous());
    assert_eq!(gpio.next(), Some(3));
    assert_eq!(gpio.next(), Some(5));
    gpio.to_back();
    assert_eq!(gpio.previous(), Some(40));
}

/// Batch reads cover every pin when the mask is empty.
#[test]
fn test_read_all() {
    let sim = SimBackend::new(54);
    let gpio = scenario_gpio(&sim);
    sim.force_level(SCENARIO_MCU[1], true).unwrap();

    let all = gpio.read_all(PinMask::empty()).unwrap();
    assert_eq!(all, PinMask::from_pins([1]).unwrap());

    let some = gpio.read_all(PinMask::from_pins([0, 2, 9]).unwrap()).unwrap();
    assert!(some.is_empty());
}

/// Batch writes only drive output pins.
#[test]
fn test_write_all_skips_inputs() {
    let sim = SimBackend::new(54);
    let gpio = scenario_gpio(&sim);
    gpio.set_mode(0, Mode::Output).unwrap();
    gpio.set_mode(2, Mode::Output).unwrap();

    gpio.write_all(PinMask::from_pins([0, 1, 2]).unwrap(), true).unwrap();
    assert!(sim.latch(17).unwrap());
    assert!(!sim.latch(18).unwrap());
    assert!(sim.latch(27).unwrap());

    gpio.toggle_all(PinMask::from_pins([2]).unwrap()).unwrap();
    assert!(sim.latch(17).unwrap());
    assert!(!sim.latch(27).unwrap());
}

/// An empty mask selects nothing for batch writes and toggles.
#[test]
fn test_empty_mask_leaves_outputs_alone() {
    let sim = SimBackend::new(54);
    let gpio = scenario_gpio(&sim);
    gpio.set_mode(0, Mode::Output).unwrap();
    gpio.set_mode(2, Mode::Output).unwrap();
    let before = sim.mutations();

    gpio.write_all(PinMask::empty(), true).unwrap();
    assert!(!sim.latch(17).unwrap());
    assert!(!sim.latch(27).unwrap());

    gpio.toggle_all(PinMask::empty()).unwrap();
    assert!(!sim.latch(17).unwrap());
    assert!(!sim.latch(27).unwrap());
    assert_eq!(sim.mutations(), before);
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Batch writes and toggles never change what a non-output pin reads.
        #[test]
        fn prop_batch_ops_leave_non_outputs_alone(
            outputs in proptest::collection::vec(any::<bool>(), 3),
            levels in proptest::collection::vec(any::<bool>(), 3),
            mask_bits in 0u128..8,
            value in any::<bool>(),
            toggle in any::<bool>(),
        ) {
            let sim = SimBackend::new(54);
            let gpio = scenario_gpio(&sim);
            for pin in 0..3 {
                if outputs[pin] {
                    gpio.set_mode(pin as u32, Mode::Output).unwrap();
                }
                sim.force_level(SCENARIO_MCU[pin], levels[pin]).unwrap();
            }
            let before: Vec<bool> = (0..3).map(|p| gpio.read(p).unwrap()).collect();

            let mask = PinMask::from_bits(mask_bits);
            if toggle {
                gpio.toggle_all(mask).unwrap();
            } else {
                gpio.write_all(mask, value).unwrap();
            }

            for pin in 0..3 {
                if !outputs[pin] {
                    prop_assert_eq!(gpio.read(pin as u32).unwrap(), before[pin]);
                }
            }
        }
    }
}
