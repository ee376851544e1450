//! Simulated USB and HID transports for tests.
//!
//! Each simulated transport shares its state with the devices it opens,
//! so a test can script reads and failures up front and inspect what
//! the stream did afterwards, even once the stream owns the device.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use super::{
    Configuration, Endpoint, HidDevice, HidTransport, Interface, UsbDevice, UsbTransport,
};
use crate::config::{HidStreamConfig, UsbStreamConfig};
use crate::error::TransportError;
use crate::observer::{StreamEvent, StreamObserver};
use crate::types::DeviceIdentity;

pub fn identity() -> DeviceIdentity {
    DeviceIdentity::new(0x0483, 0x5750).unwrap()
}

pub fn usb_config(read_size: usize, write_size: usize) -> UsbStreamConfig {
    UsbStreamConfig {
        vid: 0x0483,
        pid: 0x5750,
        read_size,
        read_timeout: 1,
        write_size,
        write_timeout: 1000,
        interface: 0,
    }
}

pub fn hid_config(read_size: usize, write_size: Option<usize>) -> HidStreamConfig {
    HidStreamConfig {
        vid: 0x0483,
        pid: 0x5750,
        read_size,
        write_size,
    }
}

/// Pop the next scripted read and copy it into `buf`. An empty script
/// behaves like a timeout.
fn scripted_read(
    reads: &mut VecDeque<Result<Vec<u8>, TransportError>>,
    buf: &mut [u8],
) -> Result<usize, TransportError> {
    match reads.pop_front() {
        None => Err(TransportError::Timeout),
        Some(Err(e)) => Err(e),
        Some(Ok(data)) if data.len() > buf.len() => Err(TransportError::Overflow),
        Some(Ok(data)) => {
            buf[..data.len()].copy_from_slice(&data);
            Ok(data.len())
        }
    }
}

/// Shared state of a simulated USB bus holding at most one device.
pub struct SimUsbState {
    pub present: Option<DeviceIdentity>,
    pub configuration: Configuration,
    pub opened: usize,
    pub dropped: usize,

    pub detach_error: Option<TransportError>,
    pub attach_error: Option<TransportError>,
    pub configure_error: Option<TransportError>,
    pub claim_error: Option<TransportError>,
    pub release_error: Option<TransportError>,
    pub detached: Vec<u8>,
    pub attached: Vec<u8>,
    pub configured: Vec<u8>,
    pub claimed: Vec<u8>,
    pub released: Vec<u8>,

    pub reads: VecDeque<Result<Vec<u8>, TransportError>>,
    pub read_endpoints: Vec<u8>,
    pub read_timeouts: Vec<Duration>,

    /// Index of the write attempt that fails with `Pipe`.
    pub fail_write_at: Option<usize>,
    /// Accept at most this many bytes per write.
    pub accept_limit: Option<usize>,
    pub write_attempts: usize,
    pub written: Vec<Vec<u8>>,
    pub write_endpoints: Vec<u8>,
    pub write_timeouts: Vec<Duration>,
}

impl SimUsbState {
    fn new(present: Option<DeviceIdentity>) -> Self {
        Self {
            present,
            configuration: Configuration {
                number: 1,
                interfaces: vec![Interface {
                    number: 0,
                    alt_setting: 0,
                    endpoints: vec![Endpoint { address: 0x81 }, Endpoint { address: 0x01 }],
                }],
            },
            opened: 0,
            dropped: 0,
            detach_error: None,
            attach_error: None,
            configure_error: None,
            claim_error: None,
            release_error: None,
            detached: Vec::new(),
            attached: Vec::new(),
            configured: Vec::new(),
            claimed: Vec::new(),
            released: Vec::new(),
            reads: VecDeque::new(),
            read_endpoints: Vec::new(),
            read_timeouts: Vec::new(),
            fail_write_at: None,
            accept_limit: None,
            write_attempts: 0,
            written: Vec::new(),
            write_endpoints: Vec::new(),
            write_timeouts: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct SimUsbTransport {
    state: Arc<Mutex<SimUsbState>>,
}

impl SimUsbTransport {
    pub fn with_device(identity: DeviceIdentity) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimUsbState::new(Some(identity)))),
        }
    }

    pub fn empty() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimUsbState::new(None))),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SimUsbState> {
        self.state.lock()
    }
}

impl UsbTransport for SimUsbTransport {
    type Device = SimUsbDevice;

    fn open(&self, identity: DeviceIdentity) -> Result<Option<SimUsbDevice>, TransportError> {
        let mut state = self.state.lock();
        if state.present != Some(identity) {
            return Ok(None);
        }
        state.opened += 1;
        Ok(Some(SimUsbDevice {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct SimUsbDevice {
    state: Arc<Mutex<SimUsbState>>,
}

impl Drop for SimUsbDevice {
    fn drop(&mut self) {
        self.state.lock().dropped += 1;
    }
}

impl UsbDevice for SimUsbDevice {
    fn active_configuration(&self) -> Result<Configuration, TransportError> {
        Ok(self.state.lock().configuration.clone())
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(e) = state.detach_error.clone() {
            return Err(e);
        }
        state.detached.push(interface);
        Ok(())
    }

    fn attach_kernel_driver(&mut self, interface: u8) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(e) = state.attach_error.clone() {
            return Err(e);
        }
        state.attached.push(interface);
        Ok(())
    }

    fn set_configuration(&mut self, configuration: u8) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(e) = state.configure_error.clone() {
            return Err(e);
        }
        state.configured.push(configuration);
        Ok(())
    }

    fn claim_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(e) = state.claim_error.clone() {
            return Err(e);
        }
        state.claimed.push(interface);
        Ok(())
    }

    fn release_interface(&mut self, interface: u8) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(e) = state.release_error.clone() {
            return Err(e);
        }
        state.released.push(interface);
        Ok(())
    }

    fn read_bulk(
        &mut self,
        endpoint: u8,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        state.read_endpoints.push(endpoint);
        state.read_timeouts.push(timeout);
        scripted_read(&mut state.reads, buf)
    }

    fn write_bulk(
        &mut self,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        let attempt = state.write_attempts;
        state.write_attempts += 1;
        if state.fail_write_at == Some(attempt) {
            return Err(TransportError::Pipe);
        }

        let accepted = state.accept_limit.map_or(buf.len(), |n| n.min(buf.len()));
        state.written.push(buf[..accepted].to_vec());
        state.write_endpoints.push(endpoint);
        state.write_timeouts.push(timeout);
        Ok(accepted)
    }
}

/// Shared state of a simulated HID device.
pub struct SimHidState {
    pub present: Option<DeviceIdentity>,
    /// Enumerations performed by `open`.
    pub refreshes: usize,
    pub opened: usize,
    pub dropped: usize,

    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
    pub string_error: Option<TransportError>,
    pub nonblocking: Option<bool>,
    pub nonblocking_error: Option<TransportError>,

    pub reads: VecDeque<Result<Vec<u8>, TransportError>>,
    pub read_lengths: Vec<usize>,

    pub fail_write_at: Option<usize>,
    /// Accept at most this many bytes per report.
    pub accept_limit: Option<usize>,
    pub write_attempts: usize,
    pub written: Vec<Vec<u8>>,
}

impl SimHidState {
    fn new(present: Option<DeviceIdentity>) -> Self {
        Self {
            present,
            refreshes: 0,
            opened: 0,
            dropped: 0,
            manufacturer: Some("STMicroelectronics".into()),
            product: Some("Custom HID".into()),
            serial_number: None,
            string_error: None,
            nonblocking: None,
            nonblocking_error: None,
            reads: VecDeque::new(),
            read_lengths: Vec::new(),
            fail_write_at: None,
            accept_limit: None,
            write_attempts: 0,
            written: Vec::new(),
        }
    }

    fn string(&self, value: &Option<String>) -> Result<Option<String>, TransportError> {
        match &self.string_error {
            Some(e) => Err(e.clone()),
            None => Ok(value.clone()),
        }
    }
}

#[derive(Clone)]
pub struct SimHidTransport {
    state: Arc<Mutex<SimHidState>>,
}

impl SimHidTransport {
    pub fn with_device(identity: DeviceIdentity) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimHidState::new(Some(identity)))),
        }
    }

    pub fn empty() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimHidState::new(None))),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, SimHidState> {
        self.state.lock()
    }
}

impl HidTransport for SimHidTransport {
    type Device = SimHidDevice;

    fn open(&mut self, identity: DeviceIdentity) -> Result<Option<SimHidDevice>, TransportError> {
        let mut state = self.state.lock();
        state.refreshes += 1;
        if state.present != Some(identity) {
            return Ok(None);
        }
        state.opened += 1;
        Ok(Some(SimHidDevice {
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct SimHidDevice {
    state: Arc<Mutex<SimHidState>>,
}

impl Drop for SimHidDevice {
    fn drop(&mut self) {
        self.state.lock().dropped += 1;
    }
}

impl HidDevice for SimHidDevice {
    fn manufacturer(&self) -> Result<Option<String>, TransportError> {
        let state = self.state.lock();
        state.string(&state.manufacturer)
    }

    fn product(&self) -> Result<Option<String>, TransportError> {
        let state = self.state.lock();
        state.string(&state.product)
    }

    fn serial_number(&self) -> Result<Option<String>, TransportError> {
        let state = self.state.lock();
        state.string(&state.serial_number)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if let Some(e) = state.nonblocking_error.clone() {
            return Err(e);
        }
        state.nonblocking = Some(nonblocking);
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        state.read_lengths.push(buf.len());
        // A non-blocking HID read with nothing pending returns no data.
        if state.reads.is_empty() {
            return Ok(0);
        }
        scripted_read(&mut state.reads, buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock();
        let attempt = state.write_attempts;
        state.write_attempts += 1;
        if state.fail_write_at == Some(attempt) {
            return Err(TransportError::Other("report rejected".into()));
        }
        let accepted = state.accept_limit.map_or(data.len(), |n| n.min(data.len()));
        state.written.push(data[..accepted].to_vec());
        Ok(accepted)
    }
}

/// Observer that keeps every event it receives.
#[derive(Clone, Default)]
pub struct RecordingObserver {
    events: Arc<Mutex<Vec<StreamEvent>>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<StreamEvent> {
        self.events.lock().clone()
    }
}

impl StreamObserver for RecordingObserver {
    fn on_event(&self, _device: DeviceIdentity, event: &StreamEvent) {
        self.events.lock().push(event.clone());
    }
}
