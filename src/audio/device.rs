//! Output device enumeration

use cpal::traits::{DeviceTrait, HostTrait};
use crate::error::AudioError;

/// Description of an output device
#[derive(Debug, Clone)]
pub struct OutputDeviceInfo {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub sample_rates: Vec<u32>,
    pub channels: Vec<u16>,
}

/// List all available output devices
pub fn list_output_devices() -> Vec<OutputDeviceInfo> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    let default_output_name = host
        .default_output_device()
        .and_then(|d| d.name().ok());

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let Ok(name) = device.name() {
                let is_default = default_output_name.as_ref() == Some(&name);
                let (sample_rates, channels) = get_device_capabilities(&device);

                devices.push(OutputDeviceInfo {
                    id: format!("output:{}", name),
                    name,
                    is_default,
                    sample_rates,
                    channels,
                });
            }
        }
    }

    devices
}

/// Get device capabilities
fn get_device_capabilities(device: &cpal::Device) -> (Vec<u32>, Vec<u16>) {
    let mut sample_rates = Vec::new();
    let mut channels = Vec::new();

    if let Ok(configs) = device.supported_output_configs() {
        for config in configs {
            for rate_val in [44100u32, 48000, 88200, 96000] {
                let rate = cpal::SampleRate(rate_val);
                if rate >= config.min_sample_rate()
                    && rate <= config.max_sample_rate()
                    && !sample_rates.contains(&rate_val)
                {
                    sample_rates.push(rate_val);
                }
            }

            let ch = config.channels();
            if !channels.contains(&ch) {
                channels.push(ch);
            }
        }
    }

    sample_rates.sort();
    channels.sort();

    (sample_rates, channels)
}

/// Resolve an output device by id, or the default device when `id` is empty
pub fn get_output_device(id: &str) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();

    if id.is_empty() {
        return host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()));
    }

    let name = id.strip_prefix("output:").unwrap_or(id);
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    for device in devices {
        if device.name().map_or(false, |n| n == name) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.to_string()))
}
