//! USB vendor/product pair identifying the device a stream binds to.

use std::fmt;

use crate::error::ConfigError;

/// USB vendor and product IDs of the device a stream binds to.
///
/// Both IDs are non-zero; zero is never assigned to a real vendor or
/// product and usually means a field was left out of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    vid: u16,
    pid: u16,
}

impl DeviceIdentity {
    pub fn new(vid: u16, pid: u16) -> Result<Self, ConfigError> {
        if vid == 0 {
            return Err(ConfigError::ZeroVendorId);
        }
        if pid == 0 {
            return Err(ConfigError::ZeroProductId);
        }
        Ok(Self { vid, pid })
    }

    pub fn vendor_id(&self) -> u16 {
        self.vid
    }

    pub fn product_id(&self) -> u16 {
        self.pid
    }

    /// Whether a device with the given descriptor IDs is this device.
    pub fn matches(&self, vid: u16, pid: u16) -> bool {
        self.vid == vid && self.pid == pid
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vid, self.pid)
    }
}
