// file: src/hardware/gpu.rs
// description: GPU enumeration through NVML
// reference: https://docs.rs/nvml-wrapper

use crate::error::{Result, WorkbenchError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuInfo {
    pub index: u32,
    pub name: String,
    pub memory_total: u64,
    pub memory_free: u64,
    pub memory_used: u64,
}

fn gpu_error(message: impl Into<String>) -> WorkbenchError {
    WorkbenchError::HardwareQuery {
        component: "gpu",
        message: message.into(),
    }
}

/// Every visible NVIDIA device. No device is an error, not an empty list.
#[cfg(feature = "nvml")]
pub fn enumerate() -> Result<Vec<GpuInfo>> {
    use nvml_wrapper::Nvml;
    use nvml_wrapper::error::NvmlError;

    let nvml = Nvml::init().map_err(|e| match e {
        NvmlError::DriverNotLoaded | NvmlError::LibraryNotFound => {
            gpu_error("NVML is not available (driver not loaded)")
        }
        NvmlError::NoPermission => gpu_error("no permission to access NVML"),
        other => gpu_error(format!("NVML init error: {:?}", other)),
    })?;

    let count = nvml
        .device_count()
        .map_err(|e| gpu_error(format!("failed to get device count: {:?}", e)))?;
    if count == 0 {
        return Err(gpu_error("no GPU found"));
    }

    (0..count)
        .map(|index| {
            let device = nvml
                .device_by_index(index)
                .map_err(|e| gpu_error(format!("device {}: {:?}", index, e)))?;
            let name = device
                .name()
                .map_err(|e| gpu_error(format!("device {} name: {:?}", index, e)))?;
            let memory = device
                .memory_info()
                .map_err(|e| gpu_error(format!("device {} memory: {:?}", index, e)))?;
            Ok(GpuInfo {
                index,
                name,
                memory_total: memory.total,
                memory_free: memory.free,
                memory_used: memory.used,
            })
        })
        .collect()
}

#[cfg(not(feature = "nvml"))]
pub fn enumerate() -> Result<Vec<GpuInfo>> {
    Err(gpu_error(
        "GPU enumeration requires building with the `nvml` feature",
    ))
}
