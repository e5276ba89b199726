//! Accelerated Yukawa colloid pair style
//!
//! [`PairYukawaColloidAccel`] drives one force evaluation per call: the
//! accelerator processes the leading part of the active list, the host kernel
//! processes the tail `[host_start, inum)`, and both add into the same
//! accumulators.
//!
//! # Example
//!
//! ```
//! use yukawa_colloid::{
//!     AccelConfig, CpuAccelerator, Domain, EvFlags, ListKind, NeighborList, PairCoeffs,
//!     PairYukawaColloidAccel, ParticleSnapshot, StepInput, StyleContext,
//! };
//!
//! let mut coeffs = PairCoeffs::new(1, 1.0, 5.0)?;
//! coeffs.set_coeff(1, 1, 2.0, None)?;
//!
//! let accel = CpuAccelerator::new(AccelConfig::default().with_split(0.5));
//! let mut pair = PairYukawaColloidAccel::new(accel, coeffs)?;
//!
//! let snap = ParticleSnapshot::new(
//!     vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
//!     vec![1, 1],
//!     vec![1.0, 1.5],
//! );
//! let mut requests: Vec<ListKind> = Vec::new();
//! pair.init_style(&StyleContext::default().with_counts(2, 0), &mut requests)?;
//! assert_eq!(requests, vec![ListKind::Full]);
//!
//! let domain = Domain::enclosing(&snap.positions);
//! let list = NeighborList::build_full(&snap, &domain, pair.cell_size(), None)?;
//! let mut forces = vec![[0.0; 3]; 2];
//! let step = StepInput::new(&snap, &domain).with_list(&list);
//! let report = pair.compute(&step, &mut forces, EvFlags::global())?;
//!
//! assert_eq!(report.host_start, 1);
//! assert!((pair.energy() - 2.0 * 0.5_f64.exp()).abs() < 1e-12);
//! # Ok::<(), yukawa_colloid::PairError>(())
//! ```

pub mod kernel;
pub mod tally;

use std::time::{Duration, Instant};

pub use kernel::{atom_contribution, compute_range, pair_terms, screening, KernelParams, ParticleView};
pub use tally::{AtomContribution, EvFlags, EvTally};

use crate::accel::{AccelInit, AccelMode, AcceleratorService, FullStepRequest, ListStepRequest};
use crate::config::{StyleContext, DEFAULT_NEIGHBOR_CAPACITY};
use crate::error::PairError;
use crate::params::PairCoeffs;
use crate::storage::{Domain, ListKind, NeighborList, ParticleSnapshot, SpecialBonds};

/// Engine collaborator that owns neighbor-list requests
pub trait NeighborRegistry {
    /// Register a list request; returns its request id
    fn request(&mut self, kind: ListKind) -> usize;
}

impl NeighborRegistry for Vec<ListKind> {
    fn request(&mut self, kind: ListKind) -> usize {
        self.push(kind);
        self.len() - 1
    }
}

/// Per-step inputs read by [`PairYukawaColloidAccel::compute`]
#[derive(Debug, Clone, Copy)]
pub struct StepInput<'a> {
    /// Steps since the last neighbor rebuild (0 = rebuild now)
    pub ago: u64,
    /// Particle snapshot
    pub particles: &'a ParticleSnapshot,
    /// Sub-domain bounds
    pub domain: &'a Domain,
    /// Bonded partners
    pub special: Option<&'a SpecialBonds>,
    /// Host-built full list, required in force-only mode
    pub list: Option<&'a NeighborList>,
}

impl<'a> StepInput<'a> {
    /// Step at a fresh neighbor rebuild, no bonds, no host list
    #[must_use]
    pub const fn new(particles: &'a ParticleSnapshot, domain: &'a Domain) -> Self {
        Self {
            ago: 0,
            particles,
            domain,
            special: None,
            list: None,
        }
    }

    /// Steps since the last rebuild
    #[must_use]
    pub const fn with_ago(mut self, ago: u64) -> Self {
        self.ago = ago;
        self
    }

    /// Bonded partners
    #[must_use]
    pub const fn with_special(mut self, special: &'a SpecialBonds) -> Self {
        self.special = Some(special);
        self
    }

    /// Host-built list
    #[must_use]
    pub const fn with_list(mut self, list: &'a NeighborList) -> Self {
        self.list = Some(list);
        self
    }
}

/// What one `compute` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComputeReport {
    /// Active particles this step
    pub inum: usize,
    /// Start of the host range
    pub host_start: usize,
    /// Host tail time, `None` when the accelerator took everything
    pub host_time: Option<Duration>,
}

impl ComputeReport {
    /// Particles computed on the host
    #[must_use]
    pub const fn host_count(&self) -> usize {
        self.inum - self.host_start
    }
}

/// Yukawa colloid pair style split between an accelerator and the host
#[derive(Debug)]
pub struct PairYukawaColloidAccel<A: AcceleratorService> {
    accel: A,
    coeffs: PairCoeffs,
    special_lj: [f64; 4],
    mode: Option<AccelMode>,
    cell_size: f64,
    cpu_time: f64,
    tally: EvTally,
}

impl<A: AcceleratorService> PairYukawaColloidAccel<A> {
    /// Pair style over `accel` with coefficient tables `coeffs`
    ///
    /// # Errors
    ///
    /// Returns `PairError::AcceleratorUnavailable` if the readiness probe fails
    pub fn new(accel: A, coeffs: PairCoeffs) -> Result<Self, PairError> {
        accel.ready().map_err(PairError::AcceleratorUnavailable)?;
        Ok(Self {
            accel,
            coeffs,
            special_lj: [1.0, 0.0, 0.0, 0.0],
            mode: None,
            cell_size: 0.0,
            cpu_time: 0.0,
            tally: EvTally::default(),
        })
    }

    /// Validate settings, finalize cutoffs, and initialise the accelerator
    ///
    /// # Errors
    ///
    /// - `PairError::MissingRadius` without per-particle radii
    /// - `PairError::NewtonPair` with newton pair on
    /// - `PairError::CoeffsNotSet` when no type pair is usable
    /// - `PairError::AcceleratorInit` if the accelerator rejects the setup
    pub fn init_style<R: NeighborRegistry + ?Sized>(
        &mut self,
        ctx: &StyleContext,
        registry: &mut R,
    ) -> Result<AccelMode, PairError> {
        if !ctx.has_radius {
            return Err(PairError::MissingRadius);
        }
        if ctx.newton_pair {
            return Err(PairError::NewtonPair);
        }
        if !ctx.type_radii.is_empty() {
            self.coeffs.set_type_radii(&ctx.type_radii)?;
        }

        let maxcut = self.coeffs.init_cutsq()?;
        if maxcut < 0.0 {
            return Err(PairError::CoeffsNotSet { itype: 1, jtype: 1 });
        }
        let cell_size = maxcut.sqrt() + ctx.skin;

        let nall = ctx.nlocal + ctx.nghost;
        let params = AccelInit {
            ntypes: self.coeffs.ntypes() + 1,
            cutsq: self.coeffs.cutsq(),
            a: self.coeffs.a(),
            offset: self.coeffs.offset(),
            special_lj: ctx.special_lj,
            inum: ctx.nlocal,
            nall,
            max_neighbors: DEFAULT_NEIGHBOR_CAPACITY,
            max_special: ctx.max_special,
            cell_size,
            kappa: self.coeffs.kappa(),
        };
        let mode = self.accel.init(&params).map_err(PairError::AcceleratorInit)?;

        if mode == AccelMode::Force {
            let id = registry.request(ListKind::Full);
            tracing::debug!(request = id, "registered full neighbor list");
        }

        tracing::info!(
            ?mode,
            cell_size,
            ntypes = self.coeffs.ntypes(),
            nlocal = ctx.nlocal,
            nall,
            "yukawa/colloid accelerated style initialised"
        );

        self.mode = Some(mode);
        self.cell_size = cell_size;
        self.special_lj = ctx.special_lj;
        self.tally.reset(self.tally.flags(), nall);
        Ok(mode)
    }

    /// One force evaluation
    ///
    /// Forces are added into `forces` (sized at least `nall`); energy and
    /// virial are accumulated into the style's tally, which is reset first.
    ///
    /// # Errors
    ///
    /// - `PairError::NotInitialized` before `init_style`
    /// - `PairError::MissingNeighborList` in force-only mode without a list
    /// - `PairError::HalfNeighborList` in force-only mode with a half list
    /// - `PairError::InvalidType` / `PairError::InvalidParameter` for a
    ///   snapshot or host list the kernel cannot index
    /// - `PairError::InsufficientMemory` when the accelerator runs out of memory
    /// - `PairError::WatermarkOutOfRange` for a watermark beyond `inum`
    pub fn compute(
        &mut self,
        step: &StepInput<'_>,
        forces: &mut [[f64; 3]],
        flags: EvFlags,
    ) -> Result<ComputeReport, PairError> {
        let mode = self.mode.ok_or(PairError::NotInitialized)?;
        let particles = step.particles;
        let nall = particles.nall();
        check_snapshot(&self.coeffs, particles, forces.len())?;
        self.tally.reset(flags, nall);

        let (inum, host_start, host_time) = if mode.builds_neighbors() {
            let inum = particles.nlocal;
            let request = FullStepRequest {
                ago: step.ago,
                inum,
                nall,
                particles,
                domain: step.domain,
                special: step.special,
                flags,
                cpu_time: self.cpu_time,
            };
            let result = self
                .accel
                .compute_full(&request, forces, &mut self.tally)
                .map_err(PairError::from_compute)?;
            let host_start = check_watermark(result.host_start, inum)?;
            let host_time = host_tail(
                &self.coeffs,
                self.special_lj,
                host_start..inum,
                result.list,
                particles,
                forces,
                &mut self.tally,
            )?;
            (inum, host_start, host_time)
        } else {
            let list = step.list.ok_or(PairError::MissingNeighborList)?;
            check_list(list, nall)?;
            let inum = list.inum();
            let request = ListStepRequest {
                ago: step.ago,
                inum,
                nall,
                particles,
                list,
                flags,
                cpu_time: self.cpu_time,
            };
            let host_start = self
                .accel
                .compute_with_list(&request, forces, &mut self.tally)
                .map_err(PairError::from_compute)?;
            let host_start = check_watermark(host_start, inum)?;
            let host_time = host_tail(
                &self.coeffs,
                self.special_lj,
                host_start..inum,
                list,
                particles,
                forces,
                &mut self.tally,
            )?;
            (inum, host_start, host_time)
        };

        if let Some(elapsed) = host_time {
            self.cpu_time = elapsed.as_secs_f64();
        }

        tracing::debug!(
            inum,
            host_start,
            host_seconds = host_time.map_or(0.0, |t| t.as_secs_f64()),
            "yukawa/colloid step"
        );

        Ok(ComputeReport {
            inum,
            host_start,
            host_time,
        })
    }

    /// Host kernel over active-list positions `[start, inum)`
    ///
    /// Adds into `forces` and the style's tally without resetting either.
    ///
    /// # Errors
    ///
    /// Returns error before `init_style`, without radii, for a snapshot or
    /// list that fails `check_snapshot`/`check_list`, or if the range lies
    /// outside the list
    pub fn cpu_compute(
        &mut self,
        start: usize,
        inum: usize,
        list: &NeighborList,
        particles: &ParticleSnapshot,
        forces: &mut [[f64; 3]],
    ) -> Result<(), PairError> {
        if self.mode.is_none() {
            return Err(PairError::NotInitialized);
        }
        check_snapshot(&self.coeffs, particles, forces.len())?;
        check_list(list, particles.nall())?;
        let params = KernelParams::from_coeffs(&self.coeffs, self.special_lj);
        let view = ParticleView::new(particles)?;
        compute_range(&params, &view, list, start..inum, forces, &mut self.tally)
    }

    /// Operating mode returned by the accelerator, `None` before `init_style`
    #[must_use]
    pub const fn mode(&self) -> Option<AccelMode> {
        self.mode
    }

    /// Binning cell size handed to the accelerator
    #[must_use]
    pub const fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Host tail time of the last call that ran one, in seconds
    #[must_use]
    pub const fn cpu_time(&self) -> f64 {
        self.cpu_time
    }

    /// Coefficient tables
    #[must_use]
    pub const fn coeffs(&self) -> &PairCoeffs {
        &self.coeffs
    }

    /// Accelerator backend
    #[must_use]
    pub const fn accelerator(&self) -> &A {
        &self.accel
    }

    /// Accumulators of the last evaluation
    #[must_use]
    pub const fn tally(&self) -> &EvTally {
        &self.tally
    }

    /// Global pair energy
    #[must_use]
    pub const fn energy(&self) -> f64 {
        self.tally.eng_vdwl
    }

    /// Global virial (xx, yy, zz, xy, xz, yz)
    #[must_use]
    pub const fn virial(&self) -> [f64; 6] {
        self.tally.virial
    }

    /// Per-atom energies
    #[must_use]
    pub fn eatom(&self) -> &[f64] {
        self.tally.eatom()
    }

    /// Per-atom virials
    #[must_use]
    pub fn vatom(&self) -> &[[f64; 6]] {
        self.tally.vatom()
    }

    /// Bytes held by tables, per-atom tallies, and the accelerator
    #[must_use]
    pub fn memory_usage(&self) -> usize {
        self.coeffs.memory_bytes() + self.tally.memory_bytes() + self.accel.memory_usage()
    }
}

impl<A: AcceleratorService> Drop for PairYukawaColloidAccel<A> {
    fn drop(&mut self) {
        self.accel.clear();
    }
}

fn check_watermark(host_start: usize, inum: usize) -> Result<usize, PairError> {
    if host_start > inum {
        return Err(PairError::WatermarkOutOfRange { host_start, inum });
    }
    Ok(host_start)
}

/// Timed host kernel over `range`; `None` when the range is empty
/// Snapshot arrays consistent, types within the tables, `forces` large enough
fn check_snapshot(
    coeffs: &PairCoeffs,
    particles: &ParticleSnapshot,
    nforces: usize,
) -> Result<(), PairError> {
    particles.validate()?;
    let nall = particles.nall();
    if nforces < nall {
        return Err(PairError::InvalidParameter(format!(
            "force array holds {nforces} particles, snapshot has {nall}"
        )));
    }
    for &itype in &particles.types {
        coeffs.check_type(itype)?;
    }
    Ok(())
}

/// Caller-supplied list must be full and index only into the snapshot
fn check_list(list: &NeighborList, nall: usize) -> Result<(), PairError> {
    if list.kind() != ListKind::Full {
        return Err(PairError::HalfNeighborList);
    }
    list.validate(nall)
}

fn host_tail(
    coeffs: &PairCoeffs,
    special_lj: [f64; 4],
    range: std::ops::Range<usize>,
    list: &NeighborList,
    particles: &ParticleSnapshot,
    forces: &mut [[f64; 3]],
    tally: &mut EvTally,
) -> Result<Option<Duration>, PairError> {
    if range.is_empty() {
        return Ok(None);
    }
    let started = Instant::now();
    let params = KernelParams::from_coeffs(coeffs, special_lj);
    let view = ParticleView::new(particles)?;
    compute_range(&params, &view, list, range, forces, tally)?;
    Ok(Some(started.elapsed()))
}
