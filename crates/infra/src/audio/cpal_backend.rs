//! CPAL-based output device enumeration
//!
//! Devices are identified by their position in the host's output device
//! list, which is the integer id the operator types into the device menu.

use calibrate_core::domain::audio::{AudioEnumerator, AudioError, DeviceId, DeviceInfo, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use tracing::{debug, info, warn};

/// Describe a CPAL output device found at `index`
pub(crate) fn describe_device(index: usize, device: &cpal::Device) -> DeviceInfo {
    #[allow(deprecated)]
    let name = device
        .name()
        .unwrap_or_else(|_| "Unknown Device".to_string());

    let max_output_channels = match device.supported_output_configs() {
        Ok(configs) => configs.map(|config| config.channels()).max().unwrap_or(0),
        Err(e) => {
            warn!(device = %name, error = %e, "Could not query output configurations");
            0
        }
    };

    let default_sample_rate = device
        .default_output_config()
        .ok()
        .map(|config| config.sample_rate());

    DeviceInfo {
        id: DeviceId::new(index),
        name,
        max_output_channels,
        default_sample_rate,
    }
}

/// Look up the CPAL device with the given id on `host`
pub(crate) fn find_output_device(host: &cpal::Host, id: DeviceId) -> Result<cpal::Device> {
    host.output_devices()
        .map_err(|e| AudioError::OsError(e.to_string()))?
        .nth(id.index())
        .ok_or_else(|| AudioError::DeviceNotFound(format!("no output device with id {}", id)))
}

/// CPAL-based audio enumerator
pub struct CpalEnumerator {
    host: cpal::Host,
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        info!("Initializing CPAL enumerator");
        Self::new()
    }
}

impl CpalEnumerator {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }
}

impl AudioEnumerator for CpalEnumerator {
    fn output_devices(&self) -> Result<Vec<DeviceInfo>> {
        info!("Enumerating output devices");

        let devices: Vec<DeviceInfo> = self
            .host
            .output_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?
            .enumerate()
            .map(|(index, device)| {
                let info = describe_device(index, &device);
                debug!("Found device {}: {}", info.id, info.name);
                info
            })
            .collect();

        info!("Found {} output devices", devices.len());
        Ok(devices)
    }

    fn device_by_id(&self, id: DeviceId) -> Result<DeviceInfo> {
        let device = find_output_device(&self.host, id)?;
        Ok(describe_device(id.index(), &device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerator_creation() {
        let enumerator = CpalEnumerator::default();
        assert_eq!(enumerator.host.id(), cpal::default_host().id());
    }

    #[test]
    fn test_enumerate_output_devices() {
        let enumerator = CpalEnumerator::default();
        match enumerator.output_devices() {
            Ok(devices) => {
                for (index, device) in devices.iter().enumerate() {
                    assert_eq!(device.id, DeviceId::new(index));
                    assert!(!device.name.is_empty());
                }
            }
            Err(e) => {
                // On CI or headless systems, there might not be audio devices
                eprintln!("Skipping test: {}", e);
            }
        }
    }

    #[test]
    fn test_unknown_device_id() {
        let enumerator = CpalEnumerator::default();
        match enumerator.device_by_id(DeviceId::new(usize::MAX)) {
            Err(AudioError::DeviceNotFound(_)) | Err(AudioError::OsError(_)) => {}
            other => panic!("unexpected result {:?}", other),
        }
    }
}
