//! Small value types shared across the crate.

mod device_identity;
mod frame_sizes;

pub use device_identity::DeviceIdentity;
pub use frame_sizes::FrameSizes;
