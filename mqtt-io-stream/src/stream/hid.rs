//! Stream over a USB HID device.

use bytes::{Bytes, BytesMut};

use super::{finish_read, finish_write, run_step, Handle, SetupStep, Stream, StreamState};
use crate::config::HidStreamConfig;
use crate::error::{CleanupError, ConfigError, SetupError, TransportError, WriteError};
use crate::framing::{self, ReadOutcome};
use crate::observer::{Emitter, StreamEvent, StreamObserver};
use crate::transport::{HidDevice, HidTransport};
use crate::types::{DeviceIdentity, FrameSizes};

/// Stream over the reports of a HID device.
///
/// The OS HID driver owns interface binding, so one device handle
/// carries both directions. Reads are non-blocking: with no report
/// pending, `read` returns `None` at once. Writes are cut into reports of
/// `write_size` bytes, which must match the report size the firmware
/// expects.
pub struct HidUsbStream<T: HidTransport> {
    transport: T,
    frames: FrameSizes,
    handle: Handle<T::Device>,
    events: Emitter,
}

impl<T: HidTransport> HidUsbStream<T> {
    pub fn new(transport: T, config: &HidStreamConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            transport,
            frames: config.frame_sizes()?,
            handle: Handle::Unopened,
            events: Emitter::new(config.identity()?),
        })
    }

    /// Report events to `observer` instead of `tracing`.
    pub fn with_observer(mut self, observer: impl StreamObserver + 'static) -> Self {
        self.events.set_observer(Box::new(observer));
        self
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.events.device()
    }

    fn open(&mut self) -> Result<T::Device, SetupError> {
        let identity = self.identity();
        self.events.emit(StreamEvent::Opening);

        let mut device = self
            .transport
            .open(identity)
            .map_err(|source| SetupError::Step {
                step: SetupStep::OpenDevice,
                source,
            })?
            .ok_or(SetupError::DeviceNotFound { identity })?;

        let info = device_info(&device);
        if let Some(info) = run_step(&self.events, SetupStep::ReadDeviceInfo, info)? {
            self.events.emit(info);
        }

        let nonblocking = device.set_nonblocking(true);
        run_step(&self.events, SetupStep::SetNonBlocking, nonblocking)?;

        Ok(device)
    }
}

fn device_info<D: HidDevice>(device: &D) -> Result<StreamEvent, TransportError> {
    Ok(StreamEvent::DeviceInfo {
        manufacturer: device.manufacturer()?,
        product: device.product()?,
        serial_number: device.serial_number()?,
    })
}

impl<T: HidTransport> Stream for HidUsbStream<T> {
    fn setup(&mut self) -> Result<(), SetupError> {
        let state = self.state();
        if state != StreamState::Unopened {
            self.events.emit(StreamEvent::InvalidState {
                operation: "setup",
                state,
            });
            return Err(SetupError::InvalidState { state });
        }

        let device = self.open()?;
        self.handle = Handle::Open(device);
        self.events.emit(StreamEvent::Opened);
        Ok(())
    }

    fn read(&mut self) -> Option<Bytes> {
        let state = self.state();
        let Handle::Open(device) = &mut self.handle else {
            self.events.emit(StreamEvent::InvalidState {
                operation: "read",
                state,
            });
            return None;
        };

        let mut buf = BytesMut::zeroed(self.frames.read_size());
        let result = device.read(&mut buf);
        finish_read(&self.events, ReadOutcome::from_transfer(buf, result))
    }

    fn write(&mut self, data: Bytes) -> Result<(), WriteError> {
        let state = self.state();
        let Handle::Open(device) = &mut self.handle else {
            self.events.emit(StreamEvent::InvalidState {
                operation: "write",
                state,
            });
            return Err(WriteError::InvalidState { state });
        };

        let bytes = data.len();
        let result = framing::write_frames(data, self.frames.write_size(), |report| {
            let written = device.write(report)?;
            if written < report.len() {
                return Err(TransportError::ShortTransfer {
                    expected: report.len(),
                    actual: written,
                });
            }
            Ok(())
        });
        finish_write(&self.events, bytes, result)
    }

    fn cleanup(&mut self) -> Result<(), CleanupError> {
        let state = self.state();
        if state != StreamState::Open {
            self.events.emit(StreamEvent::InvalidState {
                operation: "cleanup",
                state,
            });
            return Err(CleanupError::InvalidState { state });
        }

        // Dropping the device closes the handle.
        self.handle = Handle::Closed;
        self.events.emit(StreamEvent::Closed);
        Ok(())
    }

    fn state(&self) -> StreamState {
        self.handle.state()
    }
}
