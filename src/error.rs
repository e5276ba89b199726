//! Typed errors for the accelerated Yukawa colloid pair style
//!
//! Every condition the surrounding engine would treat as fatal is a variant
//! here. Callers decide whether to abort the run; nothing in this crate
//! downgrades an error to a warning.

use crate::accel::AccelError;
use thiserror::Error;

/// Errors raised by style validation, coefficient setup, and force computation
#[derive(Debug, Error)]
pub enum PairError {
    /// Particle representation carries no per-particle radius
    #[error("Pair yukawa/colloid requires a per-particle radius (sphere atom style)")]
    MissingRadius,

    /// Newton's third law across pairs is enabled
    #[error("Cannot use newton pair with the accelerated yukawa/colloid pair style")]
    NewtonPair,

    /// Neither the pair nor both of its self-pairs have coefficients
    #[error("Pair coeffs are not set for types {itype} {jtype}")]
    CoeffsNotSet {
        /// First type
        itype: usize,
        /// Second type
        jtype: usize,
    },

    /// Type id outside `1..=ntypes`
    #[error("Invalid atom type {itype} (ntypes = {ntypes})")]
    InvalidType {
        /// Offending type id
        itype: usize,
        /// Number of types in the table
        ntypes: usize,
    },

    /// Rejected numeric parameter
    #[error("Invalid pair parameter: {0}")]
    InvalidParameter(String),

    /// Particles sharing a type have different radii
    #[error("Pair yukawa/colloid requires atoms with same type have same radius (type {itype})")]
    NonUniformRadius {
        /// Type with inconsistent radii
        itype: usize,
    },

    /// `compute` called before a successful `init_style`
    #[error("Pair style used before init_style")]
    NotInitialized,

    /// Host-built list mode but the caller supplied no neighbor list
    #[error("Accelerator runs in force-only mode but no host neighbor list was supplied")]
    MissingNeighborList,

    /// Host list stores each pair once; the kernel needs both sides
    #[error("Pair yukawa/colloid requires a full neighbor list")]
    HalfNeighborList,

    /// Accelerator ran out of device memory
    #[error("Insufficient memory on accelerator")]
    InsufficientMemory,

    /// Readiness probe failed at construction
    #[error("Accelerator is not available: {0}")]
    AcceleratorUnavailable(#[source] AccelError),

    /// One-time accelerator initialisation failed
    #[error("Accelerator initialisation failed: {0}")]
    AcceleratorInit(#[source] AccelError),

    /// Accelerator failed during a compute call
    #[error("Accelerator failure: {0}")]
    Accelerator(#[source] AccelError),

    /// Accelerator returned a watermark beyond the active list
    #[error("Accelerator watermark {host_start} exceeds active particle count {inum}")]
    WatermarkOutOfRange {
        /// Returned watermark
        host_start: usize,
        /// Active particle count
        inum: usize,
    },
}

impl PairError {
    /// Map an error returned by a compute call
    ///
    /// Memory exhaustion gets its own variant so the operator message matches
    /// the one the engine prints for this condition.
    pub(crate) fn from_compute(err: AccelError) -> Self {
        match err {
            AccelError::InsufficientMemory { .. } => Self::InsufficientMemory,
            other => Self::Accelerator(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_memory_message() {
        let err = PairError::from_compute(AccelError::InsufficientMemory {
            required: 2048,
            available: 1024,
        });
        assert!(matches!(err, PairError::InsufficientMemory));
        assert_eq!(err.to_string(), "Insufficient memory on accelerator");
    }

    #[test]
    fn test_other_compute_errors_keep_source() {
        let err = PairError::from_compute(AccelError::NotInitialized);
        assert!(matches!(err, PairError::Accelerator(_)));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("Accelerator used before init"));
    }

    #[test]
    fn test_config_error_display() {
        assert!(PairError::MissingRadius.to_string().contains("radius"));
        assert!(PairError::NewtonPair.to_string().contains("newton pair"));
        let err = PairError::CoeffsNotSet { itype: 1, jtype: 2 };
        assert_eq!(err.to_string(), "Pair coeffs are not set for types 1 2");
        assert!(PairError::HalfNeighborList.to_string().contains("full neighbor list"));
    }
}
