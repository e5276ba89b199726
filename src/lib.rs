//! yukawa-colloid: hybrid host/accelerator Yukawa colloid pair potential
//!
//! # Overview
//!
//! Screened-Coulomb (Yukawa) interaction between colloidal particles of
//! different radii, evaluated over a full neighbor list. Each force call hands
//! the leading part of the active list to an accelerator, computes the tail on
//! the host, and merges both into shared force, energy, and virial
//! accumulators.
//!
//! # Quick Start
//!
//! ```
//! use yukawa_colloid::{
//!     AccelConfig, AccelMode, CpuAccelerator, Domain, EvFlags, ListKind, PairCoeffs,
//!     PairYukawaColloidAccel, ParticleSnapshot, StepInput, StyleContext,
//! };
//!
//! # fn main() -> Result<(), yukawa_colloid::PairError> {
//! let mut coeffs = PairCoeffs::new(1, 1.0, 5.0)?;
//! coeffs.set_coeff(1, 1, 2.0, None)?;
//!
//! // Accelerator builds its own neighbor list
//! let accel = CpuAccelerator::new(AccelConfig::default().with_mode(AccelMode::Neigh));
//! let mut pair = PairYukawaColloidAccel::new(accel, coeffs)?;
//! let mut requests: Vec<ListKind> = Vec::new();
//! pair.init_style(&StyleContext::default().with_counts(2, 0), &mut requests)?;
//! assert!(requests.is_empty());
//!
//! let snap = ParticleSnapshot::new(
//!     vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
//!     vec![1, 1],
//!     vec![1.0, 1.5],
//! );
//! let domain = Domain::enclosing(&snap.positions);
//! let mut forces = vec![[0.0; 3]; 2];
//! pair.compute(&StepInput::new(&snap, &domain), &mut forces, EvFlags::global())?;
//!
//! assert!((forces[1][0] - 3.2974).abs() < 1e-3);
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - **Parameters**: symmetric per-type tables with mixing and energy offsets
//! - **Storage**: particle snapshot and CSR full neighbor lists
//! - **Pair**: split controller, host kernel, energy/virial tallies
//! - **Accelerators**: rayon software backend, wgpu backend (feature `gpu`)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accel;
pub mod config;
pub mod error;
pub mod pair;
pub mod params;
pub mod storage;

// Re-export core types
pub use accel::balance::LoadBalancer;
pub use accel::cpu::CpuAccelerator;
pub use accel::{
    split_watermark, AccelError, AccelInit, AcceleratorService, FullStepRequest, FullStepResult,
    ListStepRequest,
};
pub use config::{AccelConfig, AccelMode, StyleContext};
pub use error::PairError;
pub use pair::{
    ComputeReport, EvFlags, EvTally, NeighborRegistry, PairYukawaColloidAccel, StepInput,
};
pub use params::{MixRule, PairCoeffs, TypeTable};
pub use storage::{
    Domain, ListKind, NeighborEntry, NeighborList, ParticleSnapshot, SpecialBonds, NEIGHMASK,
    SBBITS,
};

#[cfg(feature = "gpu")]
pub use accel::gpu::{GpuDevice, GpuMemoryLimits, WgpuAccelerator};
