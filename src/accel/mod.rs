//! Accelerator service boundary
//!
//! The pair style talks to any accelerator through [`AcceleratorService`]: a
//! blocking request/response interface. Each compute call processes the
//! leading part of the active list, adds its results into the shared
//! accumulators, and returns the watermark `host_start` where host work
//! begins.
//!
//! # Backends
//!
//! - `cpu`: software accelerator on the host thread pool (always available)
//! - `gpu`: wgpu compute backend (feature `gpu`)

pub mod balance;
pub mod cpu;

#[cfg(feature = "gpu")]
pub mod gpu;

use thiserror::Error;

pub use crate::config::AccelMode;
use crate::pair::EvFlags;
use crate::pair::EvTally;
use crate::params::TypeTable;
use crate::storage::{Domain, NeighborList, ParticleSnapshot, SpecialBonds};

/// Accelerator failures
#[derive(Debug, Error)]
pub enum AccelError {
    /// No accelerator configured for accelerated styles
    #[error("Accelerator package is not configured")]
    NotConfigured,

    /// No compatible device found
    #[error("No compatible accelerator device found")]
    NoDevice,

    /// Device memory exhausted
    #[error("Insufficient accelerator memory: {required} bytes required, {available} available")]
    InsufficientMemory {
        /// Bytes the request needs
        required: usize,
        /// Bytes the device budget allows
        available: usize,
    },

    /// Request outside what the backend supports
    #[error("Unsupported accelerator request: {0}")]
    Unsupported(String),

    /// Compute issued before `init`
    #[error("Accelerator used before init")]
    NotInitialized,

    /// Backend-specific failure
    #[error("Accelerator backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

/// One-time initialisation parameters
#[derive(Debug, Clone, Copy)]
pub struct AccelInit<'a> {
    /// Table dimension (`ntypes + 1`, index 0 unused)
    pub ntypes: usize,
    /// Squared cutoffs
    pub cutsq: &'a TypeTable,
    /// Strength coefficients
    pub a: &'a TypeTable,
    /// Energy offsets
    pub offset: &'a TypeTable,
    /// Special-bond scale factors
    pub special_lj: [f64; 4],
    /// Local particles
    pub inum: usize,
    /// Local plus ghost particles
    pub nall: usize,
    /// Neighbor capacity hint per particle
    pub max_neighbors: usize,
    /// Special-partner capacity
    pub max_special: usize,
    /// Binning cell size (largest cutoff plus skin)
    pub cell_size: f64,
    /// Screening parameter
    pub kappa: f64,
}

/// Compute request where the accelerator builds or reuses its own list
#[derive(Debug, Clone, Copy)]
pub struct FullStepRequest<'a> {
    /// Steps since the last neighbor rebuild (0 = rebuild now)
    pub ago: u64,
    /// Active (local) particles
    pub inum: usize,
    /// Local plus ghost particles
    pub nall: usize,
    /// Positions, types, radii, tags
    pub particles: &'a ParticleSnapshot,
    /// Sub-domain bounds for ghost bookkeeping
    pub domain: &'a Domain,
    /// Bonded partners, `None` for non-molecular systems
    pub special: Option<&'a SpecialBonds>,
    /// Requested tallies
    pub flags: EvFlags,
    /// Host time of the previous tail computation, in seconds
    pub cpu_time: f64,
}

/// Compute request with a host-built list
#[derive(Debug, Clone, Copy)]
pub struct ListStepRequest<'a> {
    /// Steps since the last neighbor rebuild (0 = list changed)
    pub ago: u64,
    /// Active particles
    pub inum: usize,
    /// Local plus ghost particles
    pub nall: usize,
    /// Positions, types, radii, tags
    pub particles: &'a ParticleSnapshot,
    /// Host-built full neighbor list
    pub list: &'a NeighborList,
    /// Requested tallies
    pub flags: EvFlags,
    /// Host time of the previous tail computation, in seconds
    pub cpu_time: f64,
}

/// Result of a compute call where the accelerator owns the list
#[derive(Debug, Clone, Copy)]
pub struct FullStepResult<'a> {
    /// Start of the host range in the active list
    pub host_start: usize,
    /// Accelerator-owned list, same semantics as a host-built one
    pub list: &'a NeighborList,
}

/// Blocking accelerator service
///
/// Implementations own active-list positions `[0, host_start)` of each
/// call: they add forces for those particles into `forces` and their
/// energy/virial into `tally` (respecting `tally.flags()`), and must not touch
/// anything the host range owns.
pub trait AcceleratorService {
    /// Readiness probe run when the pair style is created
    ///
    /// # Errors
    ///
    /// Returns error if the accelerator cannot be used at all
    fn ready(&self) -> Result<(), AccelError> {
        Ok(())
    }

    /// One-time setup; returns the neighbor-list mode the accelerator runs in
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot hold the tables or is unusable
    fn init(&mut self, params: &AccelInit<'_>) -> Result<AccelMode, AccelError>;

    /// Release all accelerator-side resources
    fn clear(&mut self);

    /// Build or reuse the accelerator-owned list and compute the leading share
    ///
    /// # Errors
    ///
    /// Returns `AccelError::InsufficientMemory` when device memory runs out
    fn compute_full(
        &mut self,
        request: &FullStepRequest<'_>,
        forces: &mut [[f64; 3]],
        tally: &mut EvTally,
    ) -> Result<FullStepResult<'_>, AccelError>;

    /// Compute the leading share over a host-built list; returns `host_start`
    ///
    /// # Errors
    ///
    /// Returns `AccelError::InsufficientMemory` when device memory runs out
    fn compute_with_list(
        &mut self,
        request: &ListStepRequest<'_>,
        forces: &mut [[f64; 3]],
        tally: &mut EvTally,
    ) -> Result<usize, AccelError>;

    /// Accelerator memory in use, in bytes
    fn memory_usage(&self) -> usize;
}

impl<A: AcceleratorService + ?Sized> AcceleratorService for Box<A> {
    fn ready(&self) -> Result<(), AccelError> {
        (**self).ready()
    }

    fn init(&mut self, params: &AccelInit<'_>) -> Result<AccelMode, AccelError> {
        (**self).init(params)
    }

    fn clear(&mut self) {
        (**self).clear();
    }

    fn compute_full(
        &mut self,
        request: &FullStepRequest<'_>,
        forces: &mut [[f64; 3]],
        tally: &mut EvTally,
    ) -> Result<FullStepResult<'_>, AccelError> {
        (**self).compute_full(request, forces, tally)
    }

    fn compute_with_list(
        &mut self,
        request: &ListStepRequest<'_>,
        forces: &mut [[f64; 3]],
        tally: &mut EvTally,
    ) -> Result<usize, AccelError> {
        (**self).compute_with_list(request, forces, tally)
    }

    fn memory_usage(&self) -> usize {
        (**self).memory_usage()
    }
}

/// Rebuild an accelerator-owned list when due; returns whether it was rebuilt
///
/// A rebuild happens when `ago == 0`, when no list exists yet, or when the
/// active count changed since the last build.
///
/// # Errors
///
/// Returns `AccelError::Backend` if the snapshot cannot be binned
pub fn refresh_list(
    slot: &mut Option<NeighborList>,
    request: &FullStepRequest<'_>,
    cell_size: f64,
) -> Result<bool, AccelError> {
    let stale = slot.as_ref().map_or(true, |list| list.inum() != request.inum);
    if request.ago != 0 && !stale {
        return Ok(false);
    }

    let list = NeighborList::build_full(request.particles, request.domain, cell_size, request.special)
        .map_err(|e| AccelError::Backend(anyhow::Error::new(e)))?;
    tracing::trace!(
        inum = list.inum(),
        entries = list.num_entries(),
        max_neighbors = list.max_neighbors(),
        "rebuilt accelerator neighbor list"
    );
    *slot = Some(list);
    Ok(true)
}

/// Watermark for a fractional split of `inum` particles
///
/// `split` is clamped to `[0, 1]`; the result is in `[0, inum]`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn split_watermark(inum: usize, split: f64) -> usize {
    let split = if split.is_nan() { 1.0 } else { split.clamp(0.0, 1.0) };
    ((inum as f64 * split).round() as usize).min(inum)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_watermark_bounds() {
        assert_eq!(split_watermark(100, 1.0), 100);
        assert_eq!(split_watermark(100, 0.0), 0);
        assert_eq!(split_watermark(100, 0.25), 25);
        assert_eq!(split_watermark(100, 2.0), 100);
        assert_eq!(split_watermark(100, -0.5), 0);
        assert_eq!(split_watermark(0, 0.5), 0);
        assert_eq!(split_watermark(7, f64::NAN), 7);
    }

    #[test]
    fn test_accel_error_display() {
        let err = AccelError::InsufficientMemory {
            required: 10,
            available: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient accelerator memory: 10 bytes required, 5 available"
        );
        assert_eq!(
            AccelError::NotConfigured.to_string(),
            "Accelerator package is not configured"
        );
    }
}
