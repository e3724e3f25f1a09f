//! Audio output subsystem

pub mod device;
pub mod playback;
pub mod sink;

pub use device::{get_output_device, list_output_devices, OutputDeviceInfo};
pub use playback::CpalSink;
pub use sink::{PlaybackSink, SinkConfig};
