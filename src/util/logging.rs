//! # Logging Utilities
//!
//! Rate limiting for log messages emitted from hot paths (the input monitor
//! loop in particular) and optional tracing spans.
//!
//! ## Usage
//!
//! ```rust
//! use sbcio::util::logging::LogThrottle;
//!
//! // 5 messages per second
//! let mut throttle = LogThrottle::new(1000, 5);
//! if throttle.allow() {
//!     log::warn!("callback failed");
//! }
//! ```

use std::time::Instant;

/// Throttling structure for rate-limiting log messages
///
/// A handler that fails on every edge would otherwise produce one log line
/// per poll cycle.
#[derive(Debug)]
pub struct LogThrottle {
    /// Time window for throttling (in milliseconds)
    window_ms: u64,
    /// Maximum messages allowed per window
    cap: u32,
    /// Current message count in window
    count: u32,
    /// Messages refused since the last window that let one through
    suppressed: u64,
    /// Start time of current window
    t0: Instant,
}

impl LogThrottle {
    /// Create new throttle with time window and message cap
    ///
    /// # Arguments
    /// * `window_ms` - Time window in milliseconds
    /// * `cap` - Maximum messages allowed per window
    pub fn new(window_ms: u64, cap: u32) -> Self {
        Self {
            window_ms,
            cap,
            count: 0,
            suppressed: 0,
            t0: Instant::now(),
        }
    }

    /// Check if logging is allowed (resets counter after window expires)
    ///
    /// Returns `true` if the message should be logged, `false` if it
    /// should be throttled.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(self.t0).as_millis() as u64;

        if elapsed_ms > self.window_ms {
            self.t0 = now;
            self.count = 0;
        }

        self.count = self.count.saturating_add(1);
        if self.count <= self.cap {
            true
        } else {
            self.suppressed += 1;
            false
        }
    }

    /// Number of suppressed messages, cleared by this call.
    ///
    /// Callers use it to append "(N suppressed)" to the next message that
    /// gets through.
    pub fn take_suppressed(&mut self) -> u64 {
        std::mem::take(&mut self.suppressed)
    }
}

/// Create a tracing span for one input monitor thread
#[cfg(feature = "tracing")]
pub fn span_din_monitor(pins: usize, poll_ms: u64) -> tracing::Span {
    tracing::debug_span!("din_monitor", pins = pins, poll_ms = poll_ms)
}

/// Fallback span creation when tracing is not available
#[cfg(not(feature = "tracing"))]
pub fn span_din_monitor(_pins: usize, _poll_ms: u64) {
    // No-op when tracing is disabled
}
