//! GPU memory limits
//!
//! wgpu exposes no VRAM query, so the buffer-size limit stands in for device
//! memory and a fixed fraction of it is treated as usable.

use super::GpuDevice;

/// Fraction of the detected limit available to pair data
pub const USABLE_FRACTION: f64 = 0.7;

/// GPU memory limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuMemoryLimits {
    /// Total device memory estimate (bytes)
    pub total_vram: u64,

    /// Memory usable for tables, particles, lists, and outputs
    pub usable_vram: u64,

    /// Largest single storage binding
    pub max_binding: u64,
}

impl GpuMemoryLimits {
    /// Detect GPU memory limits
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn detect(device: &GpuDevice) -> Self {
        let limits = device.device().limits();
        let total_vram = limits.max_buffer_size;

        Self {
            total_vram,
            usable_vram: (total_vram as f64 * USABLE_FRACTION) as u64,
            max_binding: u64::from(limits.max_storage_buffer_binding_size),
        }
    }

    /// Tighten the usable memory to a configured budget
    #[must_use]
    pub fn with_budget(mut self, budget: Option<usize>) -> Self {
        if let Some(budget) = budget {
            self.usable_vram = self.usable_vram.min(budget as u64);
        }
        self
    }

    /// Usable memory in bytes
    #[must_use]
    pub fn available(&self) -> usize {
        usize::try_from(self.usable_vram).unwrap_or(usize::MAX)
    }

    /// Whether a request of `total` bytes whose largest buffer is `largest` fits
    #[must_use]
    pub fn fits(&self, total: usize, largest: usize) -> bool {
        total as u64 <= self.usable_vram && largest as u64 <= self.max_binding
    }
}
