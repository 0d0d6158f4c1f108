//! GPU devices that can render into an XR session.

use crate::types::GpuApi;

/// A GPU device the host renders XR views with.
///
/// Only used for validation in
/// [`XrContext::bind_gpu_device`](crate::XrContext::bind_gpu_device).
pub trait XrGpuDevice {
    /// Rendering API the device is backed by
    fn gpu_api(&self) -> GpuApi;
}

impl XrGpuDevice for GpuApi {
    fn gpu_api(&self) -> GpuApi {
        *self
    }
}

#[cfg(feature = "wgpu")]
impl XrGpuDevice for wgpu::AdapterInfo {
    fn gpu_api(&self) -> GpuApi {
        match self.backend {
            wgpu::Backend::Gl => GpuApi::WebGl,
            wgpu::Backend::BrowserWebGpu => GpuApi::WebGpu,
            wgpu::Backend::Vulkan => GpuApi::Vulkan,
            _ => GpuApi::Other,
        }
    }
}
