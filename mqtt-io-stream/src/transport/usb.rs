//! Raw USB transport backed by libusb, via the `rusb` crate.

use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use super::{Configuration, Endpoint, Interface, UsbDevice, UsbTransport};
use crate::error::TransportError;
use crate::tracing::prelude::*;
use crate::types::DeviceIdentity;

/// libusb session used to enumerate and open devices.
pub struct LibUsbTransport {
    context: Context,
}

impl LibUsbTransport {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            context: Context::new()?,
        })
    }
}

impl UsbTransport for LibUsbTransport {
    type Device = LibUsbDevice;

    fn open(&self, identity: DeviceIdentity) -> Result<Option<LibUsbDevice>, TransportError> {
        for device in self.context.devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(e) => {
                    trace!(
                        bus = device.bus_number(),
                        address = device.address(),
                        "Skipping device with unreadable descriptor: {e}"
                    );
                    continue;
                }
            };

            if identity.matches(desc.vendor_id(), desc.product_id()) {
                let handle = device.open()?;
                return Ok(Some(LibUsbDevice { handle }));
            }
        }

        Ok(None)
    }
}

/// An opened libusb device handle.
pub struct LibUsbDevice {
    handle: DeviceHandle<Context>,
}

impl UsbDevice for LibUsbDevice {
    fn active_configuration(&self) -> Result<Configuration, TransportError> {
        let config = self.handle.device().active_config_descriptor()?;

        let interfaces = config
            .interfaces()
            .flat_map(|interface| interface.descriptors())
            .map(|desc| Interface {
                number: desc.interface_number(),
                alt_setting: desc.setting_number(),
                endpoints: desc
                    .endpoint_descriptors()
                    .map(|ep| Endpoint { address: ep.address() })
                    .collect(),
            })
            .collect();

        Ok(Configuration {
            number: config.number(),
            interfaces,
        })
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        Ok(self.handle.detach_kernel_driver(interface)?)
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        Ok(self.handle.attach_kernel_driver(interface)?)
    }

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        Ok(self.handle.set_active_configuration(configuration)?)
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        Ok(self.handle.claim_interface(interface)?)
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        Ok(self.handle.release_interface(interface)?)
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self.handle.read_bulk(endpoint, buf, timeout)?)
    }

    fn write_bulk(
        &mut self,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        Ok(self.handle.write_bulk(endpoint, buf, timeout)?)
    }
}
