//! Unit tests for the `GpioError` enum and its associated `Display` trait implementation.

use std::io;
use std::path::PathBuf;

use sbcio::error::GpioError;
use sbcio::{Mode, Numbering};

/// Tests that the `InvalidPin` variant names the numbering scheme.
#[test]
fn test_invalid_pin_error() {
    let err = GpioError::InvalidPin {
        pin: 99,
        numbering: Numbering::Physical,
    };
    assert_eq!(err.to_string(), "Invalid physical pin: 99");
}

/// Tests that the `InvalidPortIndex` variant is correctly formatted.
#[test]
fn test_invalid_port_index_error() {
    let err = GpioError::InvalidPortIndex { index: 4, size: 3 };
    assert_eq!(err.to_string(), "Invalid port index 4 (port has 3 pins)");
}

/// Tests that the `UnsupportedMode` variant is correctly formatted.
#[test]
fn test_unsupported_mode_error() {
    let err = GpioError::UnsupportedMode {
        pin: 4,
        mode: Mode::Pwm,
    };
    assert_eq!(err.to_string(), "Mode PWM is not supported on MCU pin 4");
}

/// Tests that the `UnsupportedBoard` variant is correctly formatted.
#[test]
fn test_unsupported_board_error() {
    let err = GpioError::UnsupportedBoard("Orange Pi".to_string());
    assert_eq!(err.to_string(), "Unsupported board: Orange Pi");
}

/// Tests that the `MaskOverflow` variant is correctly formatted.
#[test]
fn test_mask_overflow_error() {
    let err = GpioError::MaskOverflow {
        pin: 130,
        capacity: 128,
    };
    assert_eq!(err.to_string(), "Pin 130 exceeds the pin mask capacity of 128");
}

/// Tests that the `Map` variant carries device, address and cause.
#[test]
fn test_map_error() {
    let err = GpioError::Map {
        path: PathBuf::from("/dev/mem"),
        base: 0x3F20_0000,
        source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
    };
    assert_eq!(
        err.to_string(),
        "Failed to map /dev/mem at 0x3F200000: permission denied"
    );
    assert!(std::error::Error::source(&err).is_some());
}

/// Tests that I/O errors convert into the `Io` variant.
#[test]
fn test_io_error_conversion() {
    let err: GpioError = io::Error::new(io::ErrorKind::NotFound, "no cpuinfo").into();
    assert_eq!(err.to_string(), "I/O error: no cpuinfo");
}

/// Tests that the `Config` variant is correctly formatted.
#[test]
fn test_config_error() {
    let err = GpioError::Config("bad table".to_string());
    assert_eq!(err.to_string(), "Invalid configuration: bad table");
}

/// Tests that the `Thread` variant is correctly formatted.
#[test]
fn test_thread_error() {
    let err = GpioError::Thread("spawn failed".to_string());
    assert_eq!(err.to_string(), "Monitor thread error: spawn failed");
}
