//! 🜂 Level 1: Priests of Iron - compute device selection
//!
//! CUDA, then Metal, then CPU.

use anyhow::Result;
use candle_core::Device;

/// Kind of device chosen for the embedding model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Cpu,
    Cuda,
    Metal,
}

impl DeviceType {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceType::Cpu => "CPU",
            DeviceType::Cuda => "CUDA",
            DeviceType::Metal => "Metal",
        }
    }

    pub fn of(device: &Device) -> Self {
        if device.is_cuda() {
            DeviceType::Cuda
        } else if device.is_metal() {
            DeviceType::Metal
        } else {
            DeviceType::Cpu
        }
    }
}

/// Picks the best available device unless `force_cpu` is set
pub fn select_device(force_cpu: bool) -> Result<Device> {
    let device = if force_cpu {
        Device::Cpu
    } else if candle_core::utils::cuda_is_available() {
        Device::new_cuda(0)?
    } else if candle_core::utils::metal_is_available() {
        Device::new_metal(0)?
    } else {
        Device::Cpu
    };

    tracing::info!("⚡ Embedding device: {}", DeviceType::of(&device).name());
    Ok(device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_cpu() {
        let device = select_device(true).unwrap();
        assert_eq!(DeviceType::of(&device), DeviceType::Cpu);
        assert_eq!(DeviceType::Cpu.name(), "CPU");
    }
}
