//! Fixed frame lengths for a stream.

use crate::error::ConfigError;

/// Fixed lengths of the frames a stream reads and writes.
///
/// Every read asks the device for exactly `read_size` bytes, and every
/// write is cut into frames of exactly `write_size` bytes. Both are
/// positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSizes {
    read_size: usize,
    write_size: usize,
}

impl FrameSizes {
    pub fn new(read_size: usize, write_size: usize) -> Result<Self, ConfigError> {
        if read_size == 0 {
            return Err(ConfigError::ZeroReadSize);
        }
        if write_size == 0 {
            return Err(ConfigError::ZeroWriteSize);
        }
        Ok(Self {
            read_size,
            write_size,
        })
    }

    pub fn read_size(&self) -> usize {
        self.read_size
    }

    pub fn write_size(&self) -> usize {
        self.write_size
    }
}
