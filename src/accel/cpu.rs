//! Software accelerator on the host thread pool
//!
//! Implements the accelerator contract without a device: it keeps its own copy
//! of the coefficient tables, owns and refreshes a neighbor list in the
//! neighbor-building modes, and evaluates its share of the active list in
//! parallel with rayon. Per-particle partials are reduced into the shared
//! accumulators after the parallel pass, so results do not depend on thread
//! scheduling.
//!
//! A memory budget can be set to reproduce device exhaustion.

use std::time::Instant;

use rayon::prelude::*;

use super::balance::LoadBalancer;
use super::{
    refresh_list, AccelError, AccelInit, AccelMode, AcceleratorService, FullStepRequest,
    FullStepResult, ListStepRequest,
};
use crate::config::AccelConfig;
use crate::pair::kernel::{atom_contribution, KernelParams, ParticleView};
use crate::pair::{AtomContribution, EvFlags, EvTally};
use crate::params::TypeTable;
use crate::storage::{NeighborList, ParticleSnapshot};

/// Bytes staged per particle: position, radius, type, tag
const PARTICLE_BYTES: usize = 3 * std::mem::size_of::<f64>()
    + std::mem::size_of::<f64>()
    + std::mem::size_of::<u32>()
    + std::mem::size_of::<i64>();

/// Coefficient copy made at init
#[derive(Debug, Clone)]
struct DeviceTables {
    cutsq: TypeTable,
    a: TypeTable,
    offset: TypeTable,
    kappa: f64,
    special_lj: [f64; 4],
    cell_size: f64,
    max_neighbors: usize,
}

impl DeviceTables {
    fn params(&self) -> KernelParams<'_> {
        KernelParams {
            cutsq: &self.cutsq,
            a: &self.a,
            offset: &self.offset,
            kappa: self.kappa,
            special_lj: self.special_lj,
        }
    }

    fn bytes(&self) -> usize {
        3 * self.cutsq.as_slice().len() * std::mem::size_of::<f64>()
    }
}

/// Host-side accelerator backend
///
/// # Example
///
/// ```
/// use yukawa_colloid::{AccelConfig, AccelMode, CpuAccelerator};
///
/// let accel = CpuAccelerator::new(AccelConfig::default().with_mode(AccelMode::Neigh));
/// assert_eq!(accel.config().mode, AccelMode::Neigh);
/// ```
#[derive(Debug)]
pub struct CpuAccelerator {
    config: AccelConfig,
    tables: Option<DeviceTables>,
    balancer: LoadBalancer,
    list: Option<NeighborList>,
    staged_bytes: usize,
    rebuilds: usize,
}

impl CpuAccelerator {
    /// Backend with the given configuration
    #[must_use]
    pub fn new(config: AccelConfig) -> Self {
        let balancer = LoadBalancer::new(&config);
        Self {
            config,
            tables: None,
            balancer,
            list: None,
            staged_bytes: 0,
            rebuilds: 0,
        }
    }

    /// Backend configuration
    #[must_use]
    pub const fn config(&self) -> &AccelConfig {
        &self.config
    }

    /// Current accelerator share of the active list
    #[must_use]
    pub const fn split(&self) -> f64 {
        self.balancer.split()
    }

    /// Number of neighbor-list builds since init
    #[must_use]
    pub const fn rebuilds(&self) -> usize {
        self.rebuilds
    }

    /// Accelerator-owned list, if one was built
    #[must_use]
    pub const fn neighbor_list(&self) -> Option<&NeighborList> {
        self.list.as_ref()
    }

    /// Fail if `required` bytes exceed the budget
    fn reserve(&self, required: usize) -> Result<(), AccelError> {
        match self.config.memory_limit {
            Some(available) if required > available => {
                Err(AccelError::InsufficientMemory { required, available })
            }
            _ => Ok(()),
        }
    }

    /// Stage particles and list, checking the budget
    fn stage(&mut self, particles: &ParticleSnapshot, list_bytes: usize) -> Result<(), AccelError> {
        let tables = self.tables.as_ref().ok_or(AccelError::NotInitialized)?;
        let required = tables.bytes() + particles.nall() * PARTICLE_BYTES + list_bytes;
        self.reserve(required)?;
        self.staged_bytes = particles.nall() * PARTICLE_BYTES + list_bytes;
        Ok(())
    }
}

/// Accelerator share `ilist[0..host_start)` evaluated in parallel
fn accelerate_share(
    params: &KernelParams<'_>,
    view: &ParticleView<'_>,
    list: &NeighborList,
    host_start: usize,
    flags: EvFlags,
) -> Vec<AtomContribution> {
    list.ilist()[..host_start]
        .par_iter()
        .map(|&i| {
            let i = i as usize;
            atom_contribution(params, view, list.row(i), i, flags)
        })
        .collect()
}

/// Reduce partials into the shared accumulators
fn merge(contributions: &[AtomContribution], forces: &mut [[f64; 3]], tally: &mut EvTally) {
    for c in contributions {
        tally.accumulate(forces, c);
    }
}

fn invalid_input(err: crate::error::PairError) -> AccelError {
    AccelError::Backend(anyhow::Error::new(err))
}

impl AcceleratorService for CpuAccelerator {
    fn init(&mut self, params: &AccelInit<'_>) -> Result<AccelMode, AccelError> {
        if params.cutsq.dim() != params.ntypes
            || params.a.dim() != params.ntypes
            || params.offset.dim() != params.ntypes
        {
            return Err(AccelError::Unsupported(format!(
                "coefficient tables do not match {} type slots",
                params.ntypes
            )));
        }

        let tables = DeviceTables {
            cutsq: params.cutsq.clone(),
            a: params.a.clone(),
            offset: params.offset.clone(),
            kappa: params.kappa,
            special_lj: params.special_lj,
            cell_size: params.cell_size,
            max_neighbors: params.max_neighbors,
        };
        self.reserve(tables.bytes())?;

        tracing::info!(
            mode = ?self.config.mode,
            split = self.balancer.split(),
            dynamic = self.balancer.is_dynamic(),
            cell_size = params.cell_size,
            nall = params.nall,
            "software accelerator initialised"
        );

        self.tables = Some(tables);
        self.list = None;
        self.rebuilds = 0;
        Ok(self.config.mode)
    }

    fn clear(&mut self) {
        self.tables = None;
        self.list = None;
        self.staged_bytes = 0;
        self.balancer = LoadBalancer::new(&self.config);
    }

    fn compute_full(
        &mut self,
        request: &FullStepRequest<'_>,
        forces: &mut [[f64; 3]],
        tally: &mut EvTally,
    ) -> Result<FullStepResult<'_>, AccelError> {
        let tables = self.tables.as_ref().ok_or(AccelError::NotInitialized)?;
        let particles = request.particles;

        if refresh_list(&mut self.list, request, tables.cell_size)? {
            self.rebuilds += 1;
            if let Some(list) = self.list.as_ref() {
                if list.max_neighbors() > tables.max_neighbors {
                    tracing::trace!(
                        max_neighbors = list.max_neighbors(),
                        hint = tables.max_neighbors,
                        "neighbor rows exceed capacity hint"
                    );
                }
            }
        }

        let list_bytes = self.list.as_ref().map_or(0, NeighborList::memory_bytes);
        self.stage(particles, list_bytes)?;

        let Some(list) = self.list.as_ref() else {
            return Err(AccelError::NotInitialized);
        };
        let Some(tables) = self.tables.as_ref() else {
            return Err(AccelError::NotInitialized);
        };
        let view = ParticleView::new(particles).map_err(invalid_input)?;

        let started = Instant::now();
        let inum = list.inum();
        let host_start = self.balancer.start_call(inum, request.cpu_time);
        let partials = accelerate_share(&tables.params(), &view, list, host_start, tally.flags());
        merge(&partials, forces, tally);
        self.balancer
            .finish_call(inum, host_start, started.elapsed().as_secs_f64());

        Ok(FullStepResult { host_start, list })
    }

    fn compute_with_list(
        &mut self,
        request: &ListStepRequest<'_>,
        forces: &mut [[f64; 3]],
        tally: &mut EvTally,
    ) -> Result<usize, AccelError> {
        if request.inum > request.list.inum() {
            return Err(AccelError::Unsupported(format!(
                "inum {} exceeds list of {} active particles",
                request.inum,
                request.list.inum()
            )));
        }
        self.stage(request.particles, request.list.memory_bytes())?;

        let tables = self.tables.as_ref().ok_or(AccelError::NotInitialized)?;
        let view = ParticleView::new(request.particles).map_err(invalid_input)?;

        let started = Instant::now();
        let host_start = self.balancer.start_call(request.inum, request.cpu_time);
        let partials = accelerate_share(
            &tables.params(),
            &view,
            request.list,
            host_start,
            tally.flags(),
        );
        merge(&partials, forces, tally);
        self.balancer
            .finish_call(request.inum, host_start, started.elapsed().as_secs_f64());

        Ok(host_start)
    }

    fn memory_usage(&self) -> usize {
        self.tables.as_ref().map_or(0, DeviceTables::bytes) + self.staged_bytes
    }
}
