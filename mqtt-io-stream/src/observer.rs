//! Structured diagnostics for stream adapters.
//!
//! Adapters never log directly. They describe what happened as a
//! [`StreamEvent`] and hand it to the [`StreamObserver`] they were built
//! with. The default, [`TracingObserver`], turns events into `tracing`
//! records; tests swap in an observer that records them instead.

use crate::error::TransportError;
use crate::stream::{SetupStep, StreamState};
use crate::tracing::prelude::*;
use crate::types::DeviceIdentity;

/// Something noteworthy that happened on a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Setup is about to look for the device.
    Opening,

    /// Descriptor strings reported by a HID device.
    DeviceInfo {
        manufacturer: Option<String>,
        product: Option<String>,
        serial_number: Option<String>,
    },

    /// Bulk endpoints chosen for the stream.
    EndpointsResolved {
        interface: u8,
        endpoint_in: u8,
        endpoint_out: u8,
    },

    /// A best-effort setup step failed and was skipped.
    SetupStepSkipped {
        step: SetupStep,
        error: TransportError,
    },

    /// Setup completed.
    Opened,

    /// A read failed or timed out.
    ReadFailed { error: TransportError },

    /// A read returned fewer bytes than a frame.
    ShortRead { expected: usize, actual: usize },

    /// A payload was written in full.
    Wrote { bytes: usize, frames: usize },

    /// A frame write failed; earlier frames were delivered.
    WriteFailed {
        frame: usize,
        frames: usize,
        error: TransportError,
    },

    /// The device handle was released.
    Closed,

    /// Releasing the device failed.
    CleanupFailed { error: TransportError },

    /// The kernel driver detached during setup could not be given back
    /// the interface.
    ReattachFailed { error: TransportError },

    /// An operation was called in a state that does not allow it.
    InvalidState {
        operation: &'static str,
        state: StreamState,
    },
}

/// Receives the events of one or more streams.
pub trait StreamObserver: Send + Sync {
    fn on_event(&self, device: DeviceIdentity, event: &StreamEvent);
}

/// Forwards stream events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl StreamObserver for TracingObserver {
    fn on_event(&self, device: DeviceIdentity, event: &StreamEvent) {
        match event {
            StreamEvent::Opening => info!(%device, "Finding device."),
            StreamEvent::DeviceInfo {
                manufacturer,
                product,
                serial_number,
            } => info!(
                %device,
                manufacturer = manufacturer.as_deref().unwrap_or("?"),
                product = product.as_deref().unwrap_or("?"),
                serial_number = serial_number.as_deref().unwrap_or("?"),
                "Opened HID device."
            ),
            StreamEvent::EndpointsResolved {
                interface,
                endpoint_in,
                endpoint_out,
            } => debug!(
                %device,
                interface,
                endpoint_in = format!("0x{endpoint_in:02x}"),
                endpoint_out = format!("0x{endpoint_out:02x}"),
                "Resolved endpoints."
            ),
            // Detaching fails routinely when no kernel driver was bound.
            StreamEvent::SetupStepSkipped {
                step: SetupStep::DetachKernelDriver,
                error,
            } => debug!(%device, "Kernel driver not detached: {error}"),
            StreamEvent::SetupStepSkipped { step, error } => {
                warn!(%device, %step, "Setup step failed, continuing: {error}")
            }
            StreamEvent::Opened => info!(%device, "Stream open."),
            StreamEvent::ReadFailed { error } => trace!(%device, "No data: {error}"),
            StreamEvent::ShortRead { expected, actual } => {
                debug!(%device, expected, actual, "Discarding short read.")
            }
            StreamEvent::Wrote { bytes, frames } => {
                trace!(%device, bytes, frames, "Wrote payload.")
            }
            StreamEvent::WriteFailed {
                frame,
                frames,
                error,
            } => error!(
                %device,
                frame = frame + 1,
                frames,
                "Write failed: {error}"
            ),
            StreamEvent::Closed => info!(%device, "Stream closed."),
            StreamEvent::CleanupFailed { error } => {
                warn!(%device, "Cleanup failed: {error}")
            }
            StreamEvent::ReattachFailed { error } => {
                warn!(%device, "Kernel driver not reattached: {error}")
            }
            StreamEvent::InvalidState { operation, state } => {
                error!(%device, operation, %state, "Operation not allowed.")
            }
        }
    }
}

/// Binds an observer to the identity of the stream it reports for.
pub(crate) struct Emitter {
    device: DeviceIdentity,
    observer: Box<dyn StreamObserver>,
}

impl Emitter {
    pub(crate) fn new(device: DeviceIdentity) -> Self {
        Self {
            device,
            observer: Box::new(TracingObserver),
        }
    }

    pub(crate) fn set_observer(&mut self, observer: Box<dyn StreamObserver>) {
        self.observer = observer;
    }

    pub(crate) fn device(&self) -> DeviceIdentity {
        self.device
    }

    pub(crate) fn emit(&self, event: StreamEvent) {
        self.observer.on_event(self.device, &event);
    }
}
