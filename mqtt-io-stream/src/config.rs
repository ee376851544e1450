//! Configuration for stream adapters and the stream daemon.
//!
//! Stream settings are plain `serde` structs mirroring the fields an
//! external configuration loader hands over; validation into the typed
//! values the adapters use ([`DeviceIdentity`], [`FrameSizes`]) happens
//! when an adapter is built.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;
use crate::types::{DeviceIdentity, FrameSizes};

fn default_read_timeout() -> u64 {
    1
}

fn default_write_timeout() -> u64 {
    1000
}

fn default_poll_interval() -> u64 {
    10
}

/// Settings for one stream, tagged by stream module.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "module", rename_all = "snake_case")]
pub enum StreamConfig {
    /// Raw USB bulk endpoints.
    Usb(UsbStreamConfig),
    /// USB HID device.
    UsbHid(HidStreamConfig),
}

impl StreamConfig {
    pub fn identity(&self) -> Result<DeviceIdentity, ConfigError> {
        match self {
            StreamConfig::Usb(c) => c.identity(),
            StreamConfig::UsbHid(c) => c.identity(),
        }
    }

    /// Check every field without touching any device.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.identity()?;
        match self {
            StreamConfig::Usb(c) => c.frame_sizes().map(|_| ()),
            StreamConfig::UsbHid(c) => c.frame_sizes().map(|_| ()),
        }
    }
}

/// Bulk USB stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UsbStreamConfig {
    /// Vendor ID
    pub vid: u16,

    /// Product ID
    pub pid: u16,

    /// Bytes requested per read
    pub read_size: usize,

    /// Read timeout in milliseconds; 0 waits indefinitely
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,

    /// Bytes per written frame
    pub write_size: usize,

    /// Per-frame write timeout in milliseconds
    #[serde(default = "default_write_timeout")]
    pub write_timeout: u64,

    /// Interface number to claim
    pub interface: u8,
}

impl UsbStreamConfig {
    pub fn identity(&self) -> Result<DeviceIdentity, ConfigError> {
        DeviceIdentity::new(self.vid, self.pid)
    }

    pub fn frame_sizes(&self) -> Result<FrameSizes, ConfigError> {
        FrameSizes::new(self.read_size, self.write_size)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout)
    }
}

/// HID stream configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HidStreamConfig {
    /// Vendor ID
    pub vid: u16,

    /// Product ID
    pub pid: u16,

    /// Report length requested per read
    pub read_size: usize,

    /// Report length per write; defaults to `read_size`
    #[serde(default)]
    pub write_size: Option<usize>,
}

impl HidStreamConfig {
    pub fn identity(&self) -> Result<DeviceIdentity, ConfigError> {
        DeviceIdentity::new(self.vid, self.pid)
    }

    pub fn frame_sizes(&self) -> Result<FrameSizes, ConfigError> {
        FrameSizes::new(self.read_size, self.write_size.unwrap_or(self.read_size))
    }
}

/// Configuration of the stream daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// The stream to run
    pub stream: StreamConfig,

    /// Pause between polls that returned no data, in milliseconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Config {
    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.stream.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
