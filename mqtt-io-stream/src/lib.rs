//! Byte streams over USB bulk endpoints and USB HID devices.
//!
//! A [`Stream`](stream::Stream) hides the transport behind four
//! operations (`setup`, `read`, `write`, `cleanup`) with fixed-size
//! framing: writes are cut into zero-padded frames, and reads yield a
//! frame or nothing. Message routing layers drive streams without knowing
//! whether the device is a bulk USB gadget or a HID report device.

pub mod config;
pub mod controller;
pub mod error;
pub mod framing;
pub mod observer;
pub mod stream;
pub mod tracing;
pub mod transport;
pub mod types;
