//! # Compute Device Selection
//!
//! Picks the compute device for model inference based on the configured
//! preference, falling back to CPU when an accelerator is unavailable.

use candle_core::Device;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Detected best device, cached so repeated model loads agree.
static BEST_DEVICE: OnceLock<Device> = OnceLock::new();

/// Device preference for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Automatically select the best available device
    #[default]
    Auto,
    /// Force CPU usage
    Cpu,
    /// Force CUDA GPU usage (falls back to CPU if not available)
    Cuda,
    /// Force Metal GPU usage (falls back to CPU if not available)
    Metal,
}

impl std::str::FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" | "automatic" => Ok(DevicePreference::Auto),
            "cpu" => Ok(DevicePreference::Cpu),
            "cuda" | "gpu" => Ok(DevicePreference::Cuda),
            "metal" => Ok(DevicePreference::Metal),
            _ => Err(format!("Unknown device preference: {}", s)),
        }
    }
}

/// Resolve a device preference string from configuration.
///
/// Unknown values log a warning and fall back to automatic selection rather
/// than failing the workflow run.
pub fn resolve(preference: &str) -> Device {
    let preference = preference.parse().unwrap_or_else(|e| {
        warn!("{}; using automatic device selection", e);
        DevicePreference::Auto
    });

    match preference {
        DevicePreference::Auto => best_device(),
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => cuda_device().unwrap_or(Device::Cpu),
        DevicePreference::Metal => metal_device().unwrap_or(Device::Cpu),
    }
}

/// Best available device, detected once per process.
fn best_device() -> Device {
    BEST_DEVICE
        .get_or_init(|| {
            if let Some(device) = cuda_device() {
                info!("Selected CUDA GPU for model inference");
                return device;
            }
            if let Some(device) = metal_device() {
                info!("Selected Metal GPU for model inference");
                return device;
            }
            info!("Selected CPU for model inference");
            Device::Cpu
        })
        .clone()
}

fn cuda_device() -> Option<Device> {
    Device::new_cuda(0).ok()
}

fn metal_device() -> Option<Device> {
    Device::new_metal(0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_parsing() {
        assert_eq!("cpu".parse::<DevicePreference>().unwrap(), DevicePreference::Cpu);
        assert_eq!("GPU".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
        assert_eq!("auto".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert!("quantum".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_unknown_preference_falls_back_to_some_device() {
        // Should not panic regardless of available hardware.
        let _ = resolve("definitely-not-a-device");
        let _ = resolve("cpu");
    }
}
