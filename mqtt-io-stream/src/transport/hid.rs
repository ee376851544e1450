//! HID transport backed by the `hidapi` crate.

use hidapi::HidApi;

use super::{HidDevice, HidTransport};
use crate::error::TransportError;
use crate::types::DeviceIdentity;

/// hidapi context used to enumerate and open HID devices.
pub struct HidApiTransport {
    api: HidApi,
}

impl HidApiTransport {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            api: HidApi::new()?,
        })
    }
}

impl HidTransport for HidApiTransport {
    type Device = HidApiDevice;

    fn open(&mut self, identity: DeviceIdentity) -> Result<Option<HidApiDevice>, TransportError> {
        // hidapi's open() folds "not present" into a generic error, so
        // check the enumeration first. The list is a snapshot taken at
        // the last refresh.
        self.api.refresh_devices()?;
        let present = self
            .api
            .device_list()
            .any(|info| identity.matches(info.vendor_id(), info.product_id()));
        if !present {
            return Ok(None);
        }

        let device = self
            .api
            .open(identity.vendor_id(), identity.product_id())?;
        Ok(Some(HidApiDevice { device }))
    }
}

/// An opened hidapi device.
pub struct HidApiDevice {
    device: hidapi::HidDevice,
}

impl HidDevice for HidApiDevice {
    fn manufacturer(&self) -> Result<Option<String>, TransportError> {
        Ok(self.device.get_manufacturer_string()?)
    }

    fn product(&self) -> Result<Option<String>, TransportError> {
        Ok(self.device.get_product_string()?)
    }

    fn serial_number(&self) -> Result<Option<String>, TransportError> {
        Ok(self.device.get_serial_number_string()?)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), TransportError> {
        Ok(self.device.set_blocking_mode(!nonblocking)?)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(self.device.read(buf)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.device.write(data)?)
    }
}
