//! Board identification from `/proc`-style files.

use std::fs;

use sbcio::board::{probe_from, BoardInfo, Soc, SocFamily};
use sbcio::hal::{self, SimBackend};
use sbcio::{BoardRevision, Gpio, GpioError, Numbering};

const PI3_CPUINFO: &str = "processor\t: 0\n\
    model name\t: ARMv7 Processor rev 4 (v7l)\n\
    Hardware\t: BCM2835\n\
    Revision\t: a02082\n\
    Serial\t\t: 00000000deadbeef\n\
    Model\t\t: Raspberry Pi 3 Model B Rev 1.2\n";

/// A Raspberry Pi 3 is identified from cpuinfo and the device-tree model.
#[test]
fn test_probe_raspberry_pi_3() {
    let dir = tempfile::tempdir().unwrap();
    let cpuinfo = dir.path().join("cpuinfo");
    let model = dir.path().join("model");
    fs::write(&cpuinfo, PI3_CPUINFO).unwrap();
    fs::write(&model, "Raspberry Pi 3 Model B Rev 1.2\0").unwrap();

    let board = probe_from(&cpuinfo, &model).unwrap();
    assert_eq!(board.soc, Soc::Bcm2837);
    assert_eq!(board.family(), SocFamily::Bcm283x);
    assert_eq!(board.revision, BoardRevision::RpiRev3);
    assert_eq!(board.revision_code, Some(0xa02082));
    assert_eq!(board.model, "Raspberry Pi 3 Model B Rev 1.2");
    assert_eq!(board.pin_table().to_mcu(0, Numbering::Logical), Some(17));
}

/// A missing model file is fine for a Raspberry Pi.
#[test]
fn test_probe_without_model_file() {
    let dir = tempfile::tempdir().unwrap();
    let cpuinfo = dir.path().join("cpuinfo");
    fs::write(&cpuinfo, PI3_CPUINFO).unwrap();

    let board = probe_from(&cpuinfo, &dir.path().join("absent")).unwrap();
    assert_eq!(board.model, "Raspberry Pi 3 Model B");
}

/// A missing cpuinfo is an I/O error.
#[test]
fn test_probe_missing_cpuinfo() {
    let dir = tempfile::tempdir().unwrap();
    let err = probe_from(&dir.path().join("cpuinfo"), &dir.path().join("model")).unwrap_err();
    assert!(matches!(err, GpioError::Io(_)));
}

/// Backend selection fails cleanly when the memory device cannot be opened.
#[test]
fn test_select_backend_without_device() {
    let dir = tempfile::tempdir().unwrap();
    let board = BoardInfo::raspberry_pi(0xa02082, None).unwrap();
    let err = hal::select_backend(&board, &dir.path().join("mem")).unwrap_err();
    assert!(matches!(err, GpioError::Map { .. }));
}

/// A builder with both parts supplied never touches the board probe.
#[test]
fn test_builder_with_explicit_parts() {
    let board = BoardInfo::raspberry_pi(0x0002, None).unwrap();
    let gpio = Gpio::builder()
        .backend(SimBackend::new(54))
        .pin_table(board.pin_table().clone())
        .build()
        .unwrap();
    assert_eq!(gpio.pin_table().name(), "Raspberry Pi GPIO rev 1");
    assert_eq!(gpio.backend_name(), "simulated");
    assert_eq!(gpio.size(), 17);
}

/// Opening the real board; needs root on a supported board.
#[test]
#[ignore = "requires a supported board and access to /dev/mem"]
fn test_open_real_board() {
    if std::env::var("SBCIO_HARDWARE_TEST").unwrap_or_default() != "1" {
        return;
    }
    let gpio = Gpio::open().unwrap();
    assert!(gpio.size() > 0);
    gpio.close().unwrap();
}
