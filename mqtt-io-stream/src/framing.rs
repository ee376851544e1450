//! Fixed-size framing for device streams.
//!
//! Devices behind these streams exchange data in frames of a fixed
//! length: a HID report, or a bulk packet on firmware that rejects
//! anything else. Writes are therefore cut into `write_size` frames with
//! the last one zero-padded, and reads only count when the device hands
//! back exactly `read_size` bytes.
//!
//! Everything here is pure so it can be tested without a device.

use bytes::{Bytes, BytesMut};

use crate::error::{TransportError, WriteError};

/// Number of frames needed to carry `len` bytes.
///
/// # Panics
/// Panics if `frame_size` is zero.
pub fn frame_count(len: usize, frame_size: usize) -> usize {
    assert!(frame_size > 0, "frame size must be positive");
    len.div_ceil(frame_size)
}

/// Iterator over the fixed-size frames of a payload.
///
/// Full frames are zero-copy slices of the payload; only a trailing
/// partial frame is copied, into a buffer padded with zeros up to the
/// frame size.
#[derive(Debug, Clone)]
pub struct Frames {
    remaining: Bytes,
    frame_size: usize,
}

impl Frames {
    /// # Panics
    /// Panics if `frame_size` is zero.
    pub fn new(data: Bytes, frame_size: usize) -> Self {
        assert!(frame_size > 0, "frame size must be positive");
        Self {
            remaining: data,
            frame_size,
        }
    }
}

impl Iterator for Frames {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.remaining.is_empty() {
            return None;
        }

        if self.remaining.len() >= self.frame_size {
            return Some(self.remaining.split_to(self.frame_size));
        }

        let mut frame = BytesMut::with_capacity(self.frame_size);
        frame.extend_from_slice(&self.remaining);
        frame.resize(self.frame_size, 0);
        self.remaining.clear();
        Some(frame.freeze())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = frame_count(self.remaining.len(), self.frame_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Frames {}

/// Send `data` as consecutive frames of `frame_size` bytes.
///
/// `send` is called once per frame, in order. The first error stops the
/// write; frames already sent are not rolled back. Returns the number of
/// frames sent.
pub fn write_frames<F>(data: Bytes, frame_size: usize, mut send: F) -> Result<usize, WriteError>
where
    F: FnMut(&[u8]) -> Result<(), TransportError>,
{
    let frames = Frames::new(data, frame_size);
    let total = frames.len();

    for (index, frame) in frames.enumerate() {
        send(&frame[..]).map_err(|source| WriteError::WriteFailed {
            frame: index,
            frames: total,
            source,
        })?;
    }

    Ok(total)
}

/// What a single fixed-size read produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// A complete frame.
    Frame(Bytes),
    /// The transport had nothing to deliver.
    Empty,
    /// Fewer bytes than a frame arrived.
    Short { expected: usize, actual: usize },
    /// The transport reported an error, a timeout included.
    Failed(TransportError),
}

impl ReadOutcome {
    /// Classify the result of reading into `buf`, whose length is the
    /// frame size that was requested.
    pub fn from_transfer(buf: BytesMut, result: Result<usize, TransportError>) -> Self {
        let expected = buf.len();
        match result {
            Ok(0) => ReadOutcome::Empty,
            Ok(n) if n == expected => ReadOutcome::Frame(buf.freeze()),
            Ok(n) if n < expected => ReadOutcome::Short {
                expected,
                actual: n,
            },
            // A transport claiming more than it was given room for is
            // broken; never hand out bytes it did not write.
            Ok(_) => ReadOutcome::Failed(TransportError::Overflow),
            Err(e) => ReadOutcome::Failed(e),
        }
    }

    /// The frame, if the read produced a complete one.
    pub fn into_frame(self) -> Option<Bytes> {
        match self {
            ReadOutcome::Frame(frame) => Some(frame),
            _ => None,
        }
    }
}
