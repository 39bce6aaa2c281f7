//! Compute device selection for model inference.
//!
//! Resolves the `models.device` configuration string into a Candle `Device`,
//! falling back to CPU when the requested accelerator is unavailable.

use candle_core::Device;
use tracing::{debug, info, warn};

/// Device preference parsed from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// Automatically select the best available device
    #[default]
    Auto,
    /// Force CPU usage
    Cpu,
    /// CUDA GPU, falling back to CPU if not available
    Cuda,
    /// Metal GPU, falling back to CPU if not available
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

/// Resolve a configuration string to a usable device.
///
/// Unknown strings log a warning and resolve as `Auto` so a typo in the
/// config never prevents startup.
pub fn select_device(device_str: &str) -> Device {
    let preference = match device_str.parse::<DevicePreference>() {
        Ok(p) => p,
        Err(e) => {
            warn!("{}, using auto device selection", e);
            DevicePreference::Auto
        }
    };

    match preference {
        DevicePreference::Auto => detect_best_device(),
        DevicePreference::Cpu => Device::Cpu,
        DevicePreference::Cuda => cuda_device().unwrap_or(Device::Cpu),
        DevicePreference::Metal => metal_device().unwrap_or(Device::Cpu),
    }
}

fn detect_best_device() -> Device {
    if let Some(device) = cuda_device() {
        info!("Selected CUDA GPU for model inference");
        return device;
    }

    if let Some(device) = metal_device() {
        info!("Selected Metal GPU for model inference");
        return device;
    }

    info!("Using CPU for model inference (no GPU acceleration available)");
    Device::Cpu
}

fn cuda_device() -> Option<Device> {
    match Device::new_cuda(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("CUDA not available: {}", e);
            None
        }
    }
}

fn metal_device() -> Option<Device> {
    match Device::new_metal(0) {
        Ok(device) => Some(device),
        Err(e) => {
            debug!("Metal not available: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_preference_parsing() {
        assert_eq!("auto".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert_eq!("cpu".parse::<DevicePreference>().unwrap(), DevicePreference::Cpu);
        assert_eq!("CUDA".parse::<DevicePreference>().unwrap(), DevicePreference::Cuda);
        assert_eq!("metal".parse::<DevicePreference>().unwrap(), DevicePreference::Metal);
        assert!("invalid".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_cpu_selection_always_works() {
        let device = select_device("cpu");
        assert!(matches!(device, Device::Cpu));
    }

    #[test]
    fn test_unknown_string_falls_back() {
        // Must not panic; resolves via auto detection.
        let _ = select_device("quantum");
    }
}
