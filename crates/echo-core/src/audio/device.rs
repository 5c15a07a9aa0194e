//! Audio device enumeration and lookup
//!
//! Enumerates devices from ALL available cpal hosts (ALSA, JACK, CoreAudio,
//! WASAPI, ...) in both directions, so the host application can list
//! microphones and outputs and select them by [`DeviceId`].

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Common sample rates probed for display
const COMMON_RATES: [u32; 7] = [16000, 22050, 44100, 48000, 88200, 96000, 192000];

/// Which side of the pipeline a device serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceDirection {
    Input,
    Output,
}

impl DeviceDirection {
    fn label(self) -> &'static str {
        match self {
            DeviceDirection::Input => "input",
            DeviceDirection::Output => "output",
        }
    }
}

/// Get a human-readable name for a host ID
pub(crate) fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Get a host by its display name
fn get_host_by_name(name: &str) -> Option<Host> {
    cpal::available_hosts()
        .into_iter()
        .find(|id| host_name(*id) == name)
        .and_then(|id| cpal::host_from_id(id).ok())
}

fn devices_of(host: &Host, direction: DeviceDirection) -> Option<Vec<cpal::Device>> {
    let devices: Result<Vec<cpal::Device>, _> = match direction {
        DeviceDirection::Input => host.input_devices().map(|d| d.collect()),
        DeviceDirection::Output => host.output_devices().map(|d| d.collect()),
    };
    match devices {
        Ok(d) => Some(d),
        Err(e) => {
            log::debug!("Could not enumerate {} devices: {}", direction.label(), e);
            None
        }
    }
}

fn default_of(host: &Host, direction: DeviceDirection) -> Option<cpal::Device> {
    match direction {
        DeviceDirection::Input => host.default_input_device(),
        DeviceDirection::Output => host.default_output_device(),
    }
}

/// Information about an audio device
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Device identifier for configuration (includes host info)
    pub id: DeviceId,
    /// Human-readable device name
    pub name: String,
    /// Host backend name (e.g., "ALSA", "JACK")
    pub host: String,
    /// Whether this is the system default device for its host
    pub is_default: bool,
    /// Supported sample rates (common ones)
    pub sample_rates: Vec<u32>,
    /// Maximum channels in this direction
    pub max_channels: u16,
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.host, self.name)
    }
}

/// Get all devices for `direction` from ALL hosts
///
/// Sorted with defaults first, then by host and name.
pub fn get_devices(direction: DeviceDirection) -> AudioResult<Vec<AudioDevice>> {
    let mut all_devices: Vec<AudioDevice> = Vec::new();

    for host_id in cpal::available_hosts() {
        let host = match cpal::host_from_id(host_id) {
            Ok(h) => h,
            Err(e) => {
                log::debug!("Could not initialize host {:?}: {}", host_id, e);
                continue;
            }
        };

        let host_name_str = host_name(host_id);
        let default_device_name = default_of(&host, direction).and_then(|d| d.name().ok());

        let Some(devices) = devices_of(&host, direction) else {
            continue;
        };

        for device in devices {
            let Ok(name) = device.name() else {
                continue;
            };

            let ranges: Vec<(u32, u32, u16)> = match direction {
                DeviceDirection::Input => match device.supported_input_configs() {
                    Ok(c) => c
                        .map(|r| (r.min_sample_rate().0, r.max_sample_rate().0, r.channels()))
                        .collect(),
                    Err(_) => continue,
                },
                DeviceDirection::Output => match device.supported_output_configs() {
                    Ok(c) => c
                        .map(|r| (r.min_sample_rate().0, r.max_sample_rate().0, r.channels()))
                        .collect(),
                    Err(_) => continue,
                },
            };

            if ranges.is_empty() {
                continue;
            }

            let mut sample_rates: Vec<u32> = COMMON_RATES
                .iter()
                .copied()
                .filter(|rate| ranges.iter().any(|(min, max, _)| (*min..=*max).contains(rate)))
                .collect();
            sample_rates.sort_unstable();
            let max_channels = ranges.iter().map(|(_, _, ch)| *ch).max().unwrap_or(0);

            all_devices.push(AudioDevice {
                id: DeviceId::with_host(&name, &host_name_str),
                is_default: default_device_name.as_ref() == Some(&name),
                name,
                host: host_name_str.clone(),
                sample_rates,
                max_channels,
            });
        }
    }

    if all_devices.is_empty() {
        return Err(AudioError::NoDevices(direction.label()));
    }

    all_devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.host.cmp(&b.host))
            .then_with(|| a.name.cmp(&b.name))
    });

    log::info!(
        "Enumerated {} {} devices from {} hosts",
        all_devices.len(),
        direction.label(),
        cpal::available_hosts().len()
    );

    Ok(all_devices)
}

/// Find a device by its ID
///
/// Uses the host named in the ID if present, otherwise searches every host.
pub fn find_device_by_id(id: &DeviceId, direction: DeviceDirection) -> AudioResult<cpal::Device> {
    let matches = |d: &cpal::Device| d.name().ok().as_ref() == Some(&id.name);

    if let Some(ref host_name) = id.host {
        if let Some(host) = get_host_by_name(host_name) {
            return devices_of(&host, direction)
                .ok_or_else(|| AudioError::ConfigError(format!("cannot enumerate {}", host_name)))?
                .into_iter()
                .find(matches)
                .ok_or_else(|| AudioError::DeviceNotFound(id.display_label()));
        }
    }

    for host_id in cpal::available_hosts() {
        let Ok(host) = cpal::host_from_id(host_id) else {
            continue;
        };
        if let Some(device) = devices_of(&host, direction).and_then(|d| d.into_iter().find(matches)) {
            return Ok(device);
        }
    }

    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// Get the default device for `direction` from the default host
pub fn default_device(direction: DeviceDirection) -> AudioResult<cpal::Device> {
    default_of(&cpal::default_host(), direction).ok_or_else(|| {
        AudioError::NoDefaultDevice(format!("No default {} device", direction.label()))
    })
}

/// Resolve an optional configured device, falling back to the default
pub fn resolve_device(
    id: Option<&DeviceId>,
    direction: DeviceDirection,
) -> AudioResult<cpal::Device> {
    match id {
        Some(id) => find_device_by_id(id, direction),
        None => default_device(direction),
    }
}
