//! Per-step particle data and neighbor lists
//!
//! Provides the particle snapshot, special-bond topology, domain bounds, and the
//! CSR neighbor-list representation shared by host and accelerator paths.

pub mod neighbor;
pub mod particles;

pub use neighbor::{ListKind, NeighborEntry, NeighborList, NEIGHMASK, SBBITS};
pub use particles::{Domain, ParticleSnapshot, SpecialBonds};
