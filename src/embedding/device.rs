use candle_core::{DType, Device};
use tracing::{debug, info, warn};

use super::error::EmbeddingError;
use crate::config::{DevicePreference, Precision};

/// Selects the compute device for a preference (falls back to CPU).
///
/// An explicit `cuda`/`metal` request that cannot be honoured still falls back
/// to CPU, but is logged at `warn` so misconfigured images are visible.
pub fn select_device(preference: DevicePreference) -> Result<Device, EmbeddingError> {
    let mut failures: Vec<String> = Vec::new();

    if matches!(preference, DevicePreference::Cpu) {
        debug!("CPU device requested");
        return Ok(Device::Cpu);
    }

    if matches!(preference, DevicePreference::Auto | DevicePreference::Cuda) {
        if cfg!(feature = "cuda") {
            match Device::new_cuda(0) {
                Ok(device) => {
                    info!("Using CUDA GPU acceleration");
                    return Ok(device);
                }
                Err(e) => {
                    let msg = e.to_string();
                    warn!(error = %msg, "CUDA device unavailable");
                    failures.push(format!("cuda failed: {msg}"));
                }
            }
        } else if matches!(preference, DevicePreference::Cuda) {
            failures.push("cuda backend not compiled".to_string());
        }
    }

    if matches!(preference, DevicePreference::Auto | DevicePreference::Metal) {
        if cfg!(feature = "metal") {
            match Device::new_metal(0) {
                Ok(device) => {
                    info!("Using Metal GPU acceleration");
                    return Ok(device);
                }
                Err(e) => {
                    let msg = e.to_string();
                    warn!(error = %msg, "Metal device unavailable");
                    failures.push(format!("metal failed: {msg}"));
                }
            }
        } else if matches!(preference, DevicePreference::Metal) {
            failures.push("metal backend not compiled".to_string());
        }
    }

    let reason = if failures.is_empty() {
        "no GPU backend compiled".to_string()
    } else {
        failures.join("; ")
    };

    if matches!(preference, DevicePreference::Auto) {
        debug!(reason = %reason, "Falling back to CPU device");
    } else {
        warn!(requested = %preference, reason = %reason, "Falling back to CPU device");
    }
    Ok(Device::Cpu)
}

/// Resolves the dtype to load weights in for a device.
///
/// Half precision matmuls on the CPU backend are far slower than f32, so CPU
/// always runs in f32 regardless of the requested precision.
pub fn effective_dtype(precision: Precision, device: &Device) -> DType {
    if device.is_cpu() {
        if precision != Precision::Float32 {
            debug!(requested = ?precision, "Using f32 on CPU device");
        }
        return DType::F32;
    }
    precision.dtype()
}

/// Short human-readable device label for health endpoints.
pub fn device_label(device: &Device) -> &'static str {
    match device {
        Device::Cpu => "cpu",
        Device::Cuda(_) => "cuda",
        Device::Metal(_) => "metal",
    }
}
