//! Adapter and device for the pair kernel

use thiserror::Error;
use wgpu::util::DeviceExt;

/// Failures opening a device
#[derive(Debug, Error)]
pub enum GpuDeviceError {
    /// No adapter matched the requested backends
    #[error("No compatible GPU adapter found")]
    NoAdapter,

    /// Adapter refused the device request
    #[error("Failed to request GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
}

/// Device, queue, and the adapter they came from
///
/// ```ignore
/// # use yukawa_colloid::GpuDevice;
/// let gpu = GpuDevice::new().await?;
/// println!("running pair kernel on {}", gpu.info().name);
/// ```
#[derive(Debug)]
pub struct GpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter: wgpu::Adapter,
}

impl GpuDevice {
    /// Whether any adapter can be opened; tests use it to skip on GPU-less hosts
    pub async fn is_gpu_available() -> bool {
        Self::new().await.is_ok()
    }

    /// Open the high-performance adapter on any backend
    ///
    /// # Errors
    ///
    /// `NoAdapter` or `DeviceRequest`
    pub async fn new() -> Result<Self, GpuDeviceError> {
        Self::new_with_backend(wgpu::Backends::all()).await
    }

    /// Open an adapter restricted to `backends`
    ///
    /// # Errors
    ///
    /// `NoAdapter` when nothing matches (always for an empty set)
    pub async fn new_with_backend(backends: wgpu::Backends) -> Result<Self, GpuDeviceError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuDeviceError::NoAdapter)?;

        // f32 storage buffers only; default limits cover the kernel's eight bindings
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("yukawa/colloid device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await?;

        Ok(Self {
            device,
            queue,
            adapter,
        })
    }

    /// Adapter name, vendor, and backend
    #[must_use]
    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    /// Buffer holding `contents`
    #[must_use]
    pub fn create_buffer_init(
        &self,
        label: &str,
        contents: &[u8],
        usage: wgpu::BufferUsages,
    ) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage,
            })
    }

    /// Unmapped buffer of `size` bytes
    #[must_use]
    pub fn create_buffer(&self, label: &str, size: u64, usage: wgpu::BufferUsages) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        })
    }

    /// Logical device
    #[must_use]
    pub const fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Submission queue
    #[must_use]
    pub const fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_backend_set_has_no_adapter() {
        let result = GpuDevice::new_with_backend(wgpu::Backends::empty()).await;
        assert!(matches!(result, Err(GpuDeviceError::NoAdapter)));
    }

    #[tokio::test]
    async fn test_open_reports_adapter() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping test_open_reports_adapter: GPU not available");
            return;
        }

        let gpu = GpuDevice::new().await.unwrap();
        assert!(!gpu.info().name.is_empty());
    }

    #[tokio::test]
    async fn test_position_buffer_size() {
        if !GpuDevice::is_gpu_available().await {
            eprintln!("⚠️  Skipping test_position_buffer_size: GPU not available");
            return;
        }

        let gpu = GpuDevice::new().await.unwrap();
        // two particles as vec4<f32> (x, y, z, radius)
        let xr: [f32; 8] = [0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 1.5];
        let buffer = gpu.create_buffer_init("xr", bytemuck::cast_slice(&xr), wgpu::BufferUsages::STORAGE);
        assert_eq!(buffer.size(), 32);
    }
}
