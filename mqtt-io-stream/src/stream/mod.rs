//! Stream adapters.
//!
//! A [`Stream`] is a fixed-frame byte pipe to one physical device. Every
//! adapter goes through the same lifecycle:
//!
//! ```text
//! Unopened --setup()--> Open --cleanup()--> Closed
//! ```
//!
//! `read` and `write` only work while the stream is open. There is no
//! reopening; build a new adapter instead.
//!
//! Two adapters are provided: [`BulkUsbStream`] for raw USB bulk
//! endpoints and [`HidUsbStream`] for HID devices. [`build`] picks one
//! from a [`StreamConfig`], wired to the native transports.

use bytes::Bytes;
use strum::Display;

use crate::error::{CleanupError, SetupError, TransportError, WriteError};
use crate::framing::ReadOutcome;
use crate::observer::{Emitter, StreamEvent};

mod hid;
mod usb;

pub use hid::HidUsbStream;
pub use usb::{resolve_endpoints, BulkUsbStream, EndpointPair};

/// Where a stream is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StreamState {
    Unopened,
    Open,
    Closed,
}

/// Byte stream to a device exchanging fixed-size frames.
pub trait Stream {
    /// Find and open the device.
    ///
    /// On error the stream stays [`StreamState::Unopened`] and holds no
    /// device handle.
    fn setup(&mut self) -> Result<(), SetupError>;

    /// Read one frame.
    ///
    /// Returns `None` whenever no complete frame was read: timeouts,
    /// transport errors, empty and short reads all look the same. Polling
    /// callers simply try again.
    fn read(&mut self) -> Option<Bytes>;

    /// Write `data` as zero-padded fixed-size frames, in order.
    ///
    /// If a frame fails, the frames before it have already reached the
    /// device.
    fn write(&mut self, data: Bytes) -> Result<(), WriteError>;

    /// Release the device. The stream is closed afterwards even if
    /// releasing failed.
    fn cleanup(&mut self) -> Result<(), CleanupError>;

    fn state(&self) -> StreamState;
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn setup(&mut self) -> Result<(), SetupError> {
        (**self).setup()
    }

    fn read(&mut self) -> Option<Bytes> {
        (**self).read()
    }

    fn write(&mut self, data: Bytes) -> Result<(), WriteError> {
        (**self).write(data)
    }

    fn cleanup(&mut self) -> Result<(), CleanupError> {
        (**self).cleanup()
    }

    fn state(&self) -> StreamState {
        (**self).state()
    }
}

/// A sub-step of [`Stream::setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SetupStep {
    OpenDevice,
    ReadConfiguration,
    DetachKernelDriver,
    ActivateConfiguration,
    ClaimInterface,
    ReadDeviceInfo,
    SetNonBlocking,
}

/// How setup treats the failure of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPolicy {
    /// Abort setup.
    Fatal,
    /// Report the failure and carry on.
    BestEffort,
}

impl SetupStep {
    /// Detaching and configuring race with the OS drivers at boot and
    /// fail harmlessly when already done. Device strings are cosmetic.
    pub fn policy(self) -> StepPolicy {
        match self {
            SetupStep::DetachKernelDriver
            | SetupStep::ActivateConfiguration
            | SetupStep::ReadDeviceInfo => StepPolicy::BestEffort,
            SetupStep::OpenDevice
            | SetupStep::ReadConfiguration
            | SetupStep::ClaimInterface
            | SetupStep::SetNonBlocking => StepPolicy::Fatal,
        }
    }
}

/// Apply the step policy to the result of a setup step.
///
/// Returns `Ok(None)` when a best-effort step failed.
pub(crate) fn run_step<T>(
    events: &Emitter,
    step: SetupStep,
    result: Result<T, TransportError>,
) -> Result<Option<T>, SetupError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(error) => match step.policy() {
            StepPolicy::Fatal => Err(SetupError::Step {
                step,
                source: error,
            }),
            StepPolicy::BestEffort => {
                events.emit(StreamEvent::SetupStepSkipped { step, error });
                Ok(None)
            }
        },
    }
}

/// Turn a read outcome into the caller-facing result, reporting
/// anything other than a frame.
pub(crate) fn finish_read(events: &Emitter, outcome: ReadOutcome) -> Option<Bytes> {
    match outcome {
        ReadOutcome::Frame(frame) => Some(frame),
        ReadOutcome::Empty => None,
        ReadOutcome::Short { expected, actual } => {
            events.emit(StreamEvent::ShortRead { expected, actual });
            None
        }
        ReadOutcome::Failed(error) => {
            events.emit(StreamEvent::ReadFailed { error });
            None
        }
    }
}

/// Report the outcome of a framed write.
pub(crate) fn finish_write(
    events: &Emitter,
    bytes: usize,
    result: Result<usize, WriteError>,
) -> Result<(), WriteError> {
    match &result {
        Ok(frames) => events.emit(StreamEvent::Wrote {
            bytes,
            frames: *frames,
        }),
        Err(WriteError::WriteFailed {
            frame,
            frames,
            source,
        }) => events.emit(StreamEvent::WriteFailed {
            frame: *frame,
            frames: *frames,
            error: source.clone(),
        }),
        Err(WriteError::InvalidState { .. }) => {}
    }
    result.map(|_| ())
}

/// Lifecycle of the device handle owned by an adapter.
///
/// The handle only exists while open, so an unopened or closed adapter
/// cannot touch the device.
pub(crate) enum Handle<D> {
    Unopened,
    Open(D),
    Closed,
}

impl<D> Handle<D> {
    pub(crate) fn state(&self) -> StreamState {
        match self {
            Handle::Unopened => StreamState::Unopened,
            Handle::Open(_) => StreamState::Open,
            Handle::Closed => StreamState::Closed,
        }
    }
}

/// Build the adapter described by `config`, backed by the native
/// transports.
///
/// The adapter is returned unopened.
pub fn build(config: &crate::config::StreamConfig) -> crate::error::Result<Box<dyn Stream + Send>> {
    use crate::config::StreamConfig;

    match config {
        #[cfg(feature = "usb")]
        StreamConfig::Usb(c) => {
            let transport = crate::transport::usb::LibUsbTransport::new()?;
            Ok(Box::new(BulkUsbStream::new(transport, c)?))
        }
        #[cfg(not(feature = "usb"))]
        StreamConfig::Usb(_) => Err(crate::error::Error::Unsupported("usb")),

        #[cfg(feature = "hid")]
        StreamConfig::UsbHid(c) => {
            let transport = crate::transport::hid::HidApiTransport::new()?;
            Ok(Box::new(HidUsbStream::new(transport, c)?))
        }
        #[cfg(not(feature = "hid"))]
        StreamConfig::UsbHid(_) => Err(crate::error::Error::Unsupported("usb_hid")),
    }
}
