//! Unit tests for the logging functionality in the `sbcio` crate.

use sbcio::logging::{init_logger, init_logger_with_default, log_debug, log_error, log_info, log_warn};
use sbcio::util::LogThrottle;

/// Tests that the logging helpers work before and after initialization.
#[test]
fn test_logging() {
    log_error("This is an error message");
    log_warn("This is a warning message");
    log_info("This is an info message");
    log_debug("This is a debug message");
}

/// Tests that the logger can be initialized more than once.
#[test]
fn test_init_logger() {
    init_logger();
    init_logger_with_default("sbcio=trace");
    log_info("logger initialized");
}

/// Tests that the throttle used for callback failures caps a burst.
#[test]
fn test_throttle_caps_burst() {
    let mut throttle = LogThrottle::new(60_000, 3);
    let allowed = (0..10).filter(|_| throttle.allow()).count();
    assert_eq!(allowed, 3);
    assert_eq!(throttle.take_suppressed(), 7);
    assert_eq!(throttle.take_suppressed(), 0);
}
