use log::{debug, error, info, log_enabled, warn, Level};

/// Initializes the logger with the `env_logger` crate.
///
/// The filter is taken from `RUST_LOG`. Calling this more than once is
/// harmless; later calls leave the first logger in place.
pub fn init_logger() {
    let _ = env_logger::try_init();
}

/// Initializes the logger with a default filter used when `RUST_LOG` is unset.
///
/// # Examples
/// ```rust,no_run
/// sbcio::logging::init_logger_with_default("sbcio=debug");
/// ```
pub fn init_logger_with_default(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Logs an error message.
pub fn log_error(message: &str) {
    if log_enabled!(Level::Error) {
        error!("{message}");
    }
}

/// Logs a warning message.
pub fn log_warn(message: &str) {
    if log_enabled!(Level::Warn) {
        warn!("{message}");
    }
}

/// Logs an informational message.
pub fn log_info(message: &str) {
    if log_enabled!(Level::Info) {
        info!("{message}");
    }
}

/// Logs a debug message.
pub fn log_debug(message: &str) {
    if log_enabled!(Level::Debug) {
        debug!("{message}");
    }
}
