// Input side: device selection and the grabbed event source.

pub mod filter;
pub mod source;

pub use filter::{is_virtual_device, matches_device_filter};
pub use source::{DeviceError, DeviceInfo, DeviceSource};
