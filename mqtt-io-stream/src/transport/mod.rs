//! Physical transport layer for device connections.
//!
//! This module defines the capabilities a stream needs from the native
//! USB and HID stacks, as two pairs of traits: a *transport* that finds
//! and opens a device by [`DeviceIdentity`], and the *device* handle it
//! returns. Streams are generic over these traits so that the framing
//! and lifecycle logic runs unchanged against libusb, hidapi, or the
//! simulated bus used in tests.
//!
//! The native bindings live behind the `usb` (rusb/libusb) and `hid`
//! (hidapi) features.

use std::fmt;
use std::time::Duration;

use crate::error::TransportError;
use crate::types::DeviceIdentity;

#[cfg(feature = "hid")]
pub mod hid;
#[cfg(feature = "usb")]
pub mod usb;
#[cfg(test)]
pub(crate) mod sim;

/// Bit 7 of an endpoint address selects the transfer direction.
const ENDPOINT_DIR_MASK: u8 = 0x80;

/// Direction of an endpoint, from the host's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Device to host.
    In,
    /// Host to device.
    Out,
}

impl Direction {
    /// Decode the direction bit of an endpoint address.
    pub fn of_address(address: u8) -> Self {
        if address & ENDPOINT_DIR_MASK != 0 {
            Direction::In
        } else {
            Direction::Out
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("IN"),
            Direction::Out => f.write_str("OUT"),
        }
    }
}

/// One endpoint descriptor. Only the address matters for endpoint
/// selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub address: u8,
}

impl Endpoint {
    pub fn direction(&self) -> Direction {
        Direction::of_address(self.address)
    }
}

/// One alternate setting of an interface, with its endpoints in
/// descriptor order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub number: u8,
    pub alt_setting: u8,
    pub endpoints: Vec<Endpoint>,
}

/// A device configuration as reported by its descriptors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    pub number: u8,
    pub interfaces: Vec<Interface>,
}

impl Configuration {
    /// Look up an interface by number and alternate setting.
    pub fn interface(&self, number: u8, alt_setting: u8) -> Option<&Interface> {
        self.interfaces
            .iter()
            .find(|i| i.number == number && i.alt_setting == alt_setting)
    }
}

/// Finds and opens raw USB devices.
pub trait UsbTransport {
    type Device: UsbDevice;

    /// Open the first device matching `identity`.
    ///
    /// Returns `Ok(None)` when no such device is on the bus.
    fn open(&self, identity: DeviceIdentity) -> Result<Option<Self::Device>, TransportError>;
}

/// An opened raw USB device.
///
/// Dropping the device closes it and frees any OS-level resources.
pub trait UsbDevice {
    fn active_configuration(&self) -> Result<Configuration, TransportError>;

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError>;

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError>;

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError>;

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError>;

    /// Read up to `buf.len()` bytes from a bulk IN endpoint.
    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;

    /// Write `buf` to a bulk OUT endpoint, returning the bytes accepted.
    fn write_bulk(
        &mut self,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

/// Finds and opens HID devices.
pub trait HidTransport {
    type Device: HidDevice;

    /// Open the first HID device matching `identity`.
    ///
    /// Devices are enumerated afresh on every call. Returns `Ok(None)`
    /// when no such device is present.
    fn open(&mut self, identity: DeviceIdentity) -> Result<Option<Self::Device>, TransportError>;
}

/// An opened HID device. Dropping it closes the handle.
pub trait HidDevice {
    fn manufacturer(&self) -> Result<Option<String>, TransportError>;

    fn product(&self) -> Result<Option<String>, TransportError>;

    fn serial_number(&self) -> Result<Option<String>, TransportError>;

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), TransportError>;

    /// Read one input report into `buf`. In non-blocking mode this
    /// returns `Ok(0)` when no report is pending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Send one output report.
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_bit() {
        assert_eq!(Direction::of_address(0x81), Direction::In);
        assert_eq!(Direction::of_address(0x82), Direction::In);
        assert_eq!(Direction::of_address(0x01), Direction::Out);
        assert_eq!(Direction::of_address(0x00), Direction::Out);
    }

    #[test]
    fn test_interface_lookup_uses_alt_setting() {
        let config = Configuration {
            number: 1,
            interfaces: vec![
                Interface {
                    number: 0,
                    alt_setting: 0,
                    endpoints: vec![],
                },
                Interface {
                    number: 0,
                    alt_setting: 1,
                    endpoints: vec![Endpoint { address: 0x81 }],
                },
            ],
        };

        assert!(config.interface(0, 0).unwrap().endpoints.is_empty());
        assert_eq!(config.interface(0, 1).unwrap().endpoints.len(), 1);
        assert!(config.interface(1, 0).is_none());
    }
}
