//! # Configuration
//!
//! Serializable settings for the GPIO handle and the digital input ports.
//! Durations are written in milliseconds:
//!
//! ```json
//! {
//!   "gpio": { "numbering": "physical", "release_on_close": true },
//!   "din": { "poll_interval_ms": 10, "debounce_ms": 20 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MEM_DEVICE, DEFAULT_POLL_INTERVAL};
use crate::error::{GpioError, Result};
use crate::pins::Numbering;

/// Settings applied when a `Gpio` handle is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    pub numbering: Numbering,
    /// Restore modified pins when the last reference is closed
    pub release_on_close: bool,
    /// Device used to map the register windows
    pub mem_device: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            numbering: Numbering::Logical,
            release_on_close: true,
            mem_device: PathBuf::from(DEFAULT_MEM_DEVICE),
        }
    }
}

/// Settings of a `DinPort` monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DinConfig {
    /// Delay between two samples of the monitor thread
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
    /// Confirmation delay before a changed sample is accepted
    #[serde(rename = "debounce_ms", with = "opt_millis")]
    pub debounce: Option<Duration>,
}

impl Default for DinConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            debounce: None,
        }
    }
}

impl DinConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = Some(debounce);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(GpioError::Config("poll interval must be non-zero".into()));
        }
        Ok(())
    }
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gpio: GpioConfig,
    pub din: DinConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.din.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
