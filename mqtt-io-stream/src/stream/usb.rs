//! Stream over a pair of raw USB bulk endpoints.

use std::time::Duration;

use bytes::{Bytes, BytesMut};

use super::{finish_read, finish_write, run_step, Handle, SetupStep, Stream, StreamState};
use crate::config::UsbStreamConfig;
use crate::error::{CleanupError, ConfigError, SetupError, TransportError, WriteError};
use crate::framing::{self, ReadOutcome};
use crate::observer::{Emitter, StreamEvent, StreamObserver};
use crate::transport::{Configuration, Direction, UsbDevice, UsbTransport};
use crate::types::{DeviceIdentity, FrameSizes};

/// Alternate setting used when selecting the configured interface.
const ALT_SETTING: u8 = 0;

/// Bulk endpoint addresses used by an open stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointPair {
    pub input: u8,
    pub output: u8,
}

/// Pick the endpoints of `interface` (alternate setting 0).
///
/// The first endpoint of each direction in descriptor order wins.
/// Interfaces with several endpoints in one direction are not otherwise
/// disambiguated.
pub fn resolve_endpoints(
    configuration: &Configuration,
    interface: u8,
) -> Result<EndpointPair, SetupError> {
    let intf = configuration
        .interface(interface, ALT_SETTING)
        .ok_or(SetupError::InterfaceNotFound { interface })?;

    let first = |direction: Direction| {
        intf.endpoints
            .iter()
            .find(|ep| ep.direction() == direction)
            .map(|ep| ep.address)
            .ok_or(SetupError::EndpointNotFound {
                interface,
                direction,
            })
    };

    Ok(EndpointPair {
        input: first(Direction::In)?,
        output: first(Direction::Out)?,
    })
}

struct OpenDevice<D> {
    device: D,
    endpoints: EndpointPair,
    /// A kernel driver was detached from the interface during setup.
    detached: bool,
}

/// Stream over the bulk IN/OUT endpoints of one USB interface.
///
/// Reads block for at most the configured read timeout. Each write frame
/// is one bulk transfer, bounded by the write timeout.
pub struct BulkUsbStream<T: UsbTransport> {
    transport: T,
    frames: FrameSizes,
    interface: u8,
    read_timeout: Duration,
    write_timeout: Duration,
    handle: Handle<OpenDevice<T::Device>>,
    events: Emitter,
}

impl<T: UsbTransport> BulkUsbStream<T> {
    pub fn new(transport: T, config: &UsbStreamConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            transport,
            frames: config.frame_sizes()?,
            interface: config.interface,
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
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

    /// Endpoints in use, once open.
    pub fn endpoints(&self) -> Option<EndpointPair> {
        match &self.handle {
            Handle::Open(open) => Some(open.endpoints),
            _ => None,
        }
    }

    fn open(&self) -> Result<OpenDevice<T::Device>, SetupError> {
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

        let configuration = device
            .active_configuration()
            .map_err(|source| SetupError::Step {
                step: SetupStep::ReadConfiguration,
                source,
            })?;
        let endpoints = resolve_endpoints(&configuration, self.interface)?;
        self.events.emit(StreamEvent::EndpointsResolved {
            interface: self.interface,
            endpoint_in: endpoints.input,
            endpoint_out: endpoints.output,
        });

        let detached = device.detach_kernel_driver(self.interface);
        let detached = run_step(&self.events, SetupStep::DetachKernelDriver, detached)?.is_some();

        let configured = device.set_configuration(configuration.number);
        run_step(&self.events, SetupStep::ActivateConfiguration, configured)?;

        let claimed = device.claim_interface(self.interface);
        if let Err(e) = run_step(&self.events, SetupStep::ClaimInterface, claimed) {
            if detached {
                self.reattach(&mut device);
            }
            return Err(e);
        }

        Ok(OpenDevice {
            device,
            endpoints,
            detached,
        })
    }

    /// Hand the interface back to the kernel driver detached in setup.
    fn reattach(&self, device: &mut T::Device) {
        if let Err(error) = device.attach_kernel_driver(self.interface) {
            self.events.emit(StreamEvent::ReattachFailed { error });
        }
    }
}

impl<T: UsbTransport> Stream for BulkUsbStream<T> {
    fn setup(&mut self) -> Result<(), SetupError> {
        let state = self.state();
        if state != StreamState::Unopened {
            self.events.emit(StreamEvent::InvalidState {
                operation: "setup",
                state,
            });
            return Err(SetupError::InvalidState { state });
        }

        // On error the device is dropped here, closing it.
        let open = self.open()?;
        self.handle = Handle::Open(open);
        self.events.emit(StreamEvent::Opened);
        Ok(())
    }

    fn read(&mut self) -> Option<Bytes> {
        let state = self.state();
        let Handle::Open(open) = &mut self.handle else {
            self.events.emit(StreamEvent::InvalidState {
                operation: "read",
                state,
            });
            return None;
        };

        let mut buf = BytesMut::zeroed(self.frames.read_size());
        let result = open
            .device
            .read_bulk(open.endpoints.input, &mut buf, self.read_timeout);
        finish_read(&self.events, ReadOutcome::from_transfer(buf, result))
    }

    fn write(&mut self, data: Bytes) -> Result<(), WriteError> {
        let state = self.state();
        let Handle::Open(open) = &mut self.handle else {
            self.events.emit(StreamEvent::InvalidState {
                operation: "write",
                state,
            });
            return Err(WriteError::InvalidState { state });
        };

        let endpoint = open.endpoints.output;
        let timeout = self.write_timeout;
        let bytes = data.len();
        let result = framing::write_frames(data, self.frames.write_size(), |frame| {
            let written = open.device.write_bulk(endpoint, frame, timeout)?;
            if written < frame.len() {
                return Err(TransportError::ShortTransfer {
                    expected: frame.len(),
                    actual: written,
                });
            }
            Ok(())
        });
        finish_write(&self.events, bytes, result)
    }

    fn cleanup(&mut self) -> Result<(), CleanupError> {
        let state = self.state();
        let Handle::Open(mut open) = std::mem::replace(&mut self.handle, Handle::Closed) else {
            self.handle = match state {
                StreamState::Unopened => Handle::Unopened,
                _ => Handle::Closed,
            };
            self.events.emit(StreamEvent::InvalidState {
                operation: "cleanup",
                state,
            });
            return Err(CleanupError::InvalidState { state });
        };

        let released = open.device.release_interface(self.interface);
        if open.detached {
            self.reattach(&mut open.device);
        }
        // Dropping the device closes it and frees libusb's resources.
        drop(open);

        match released {
            Ok(()) => {
                self.events.emit(StreamEvent::Closed);
                Ok(())
            }
            Err(source) => {
                self.events.emit(StreamEvent::CleanupFailed {
                    error: source.clone(),
                });
                self.events.emit(StreamEvent::Closed);
                Err(CleanupError::ReleaseFailed {
                    interface: self.interface,
                    source,
                })
            }
        }
    }

    fn state(&self) -> StreamState {
        self.handle.state()
    }
}
