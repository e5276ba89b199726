//! wgpu accelerator backend
//!
//! # Architecture
//!
//! - `device`: GPU device initialization and management
//! - `memory`: usable device memory and binding limits
//! - `buffer`: particle, list, and coefficient buffers
//! - `yukawa`: WGSL pair kernel and result readback
//!
//! The kernel runs in `f32`; results are widened and merged in `f64`.
//! Neighbor lists for the list-owning modes are built on the host and
//! uploaded in CSR form.
//!
//! # Feature Flag
//!
//! This module is only available with the `gpu` feature flag:
//! ```bash
//! cargo build --features gpu
//! ```

mod buffer;
mod device;
mod memory;
mod yukawa;

use std::time::Instant;

use anyhow::Context;

pub use buffer::{GpuCoeffTable, GpuPairBuffers, OUTPUT_STRIDE};
pub use device::{GpuDevice, GpuDeviceError};
pub use memory::GpuMemoryLimits;
pub use yukawa::{decode_output, YukawaPipeline};

use super::balance::LoadBalancer;
use super::{
    refresh_list, AccelError, AccelInit, AccelMode, AcceleratorService, FullStepRequest,
    FullStepResult, ListStepRequest,
};
use crate::config::AccelConfig;
use crate::pair::{EvFlags, EvTally};
use crate::storage::{NeighborList, ParticleSnapshot};

impl From<GpuDeviceError> for AccelError {
    fn from(err: GpuDeviceError) -> Self {
        match err {
            GpuDeviceError::NoAdapter => Self::NoDevice,
            other => Self::Backend(anyhow::Error::new(other)),
        }
    }
}

/// State created by `init`
#[derive(Debug)]
struct DeviceState {
    pipeline: YukawaPipeline,
    table: GpuCoeffTable,
    kappa: f64,
    special_lj: [f64; 4],
    cell_size: f64,
}

/// Accelerator backed by a wgpu device
///
/// Blocks on an internal current-thread tokio runtime for buffer mapping,
/// so callers stay synchronous.
#[derive(Debug)]
pub struct WgpuAccelerator {
    config: AccelConfig,
    runtime: tokio::runtime::Runtime,
    device: GpuDevice,
    limits: GpuMemoryLimits,
    state: Option<DeviceState>,
    balancer: LoadBalancer,
    list: Option<NeighborList>,
    staged_bytes: usize,
}

impl WgpuAccelerator {
    /// Open the default GPU
    ///
    /// # Errors
    ///
    /// Returns `AccelError::NoDevice` without a compatible adapter
    pub fn new(config: AccelConfig) -> Result<Self, AccelError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .context("Failed to start accelerator runtime")?;
        let device = runtime.block_on(GpuDevice::new())?;
        let limits = GpuMemoryLimits::detect(&device).with_budget(config.memory_limit);
        let balancer = LoadBalancer::new(&config);

        Ok(Self {
            config,
            runtime,
            device,
            limits,
            state: None,
            balancer,
            list: None,
            staged_bytes: 0,
        })
    }

    /// Device in use
    #[must_use]
    pub const fn device(&self) -> &GpuDevice {
        &self.device
    }

    /// Memory limits in effect
    #[must_use]
    pub const fn limits(&self) -> &GpuMemoryLimits {
        &self.limits
    }

    /// Current accelerator share of the active list
    #[must_use]
    pub const fn split(&self) -> f64 {
        self.balancer.split()
    }

    fn table_bytes(&self) -> usize {
        self.state.as_ref().map_or(0, |s| GpuCoeffTable::bytes_for(s.table.dim))
    }

    /// Upload, dispatch, and merge the device share; returns `host_start`
    fn run_share(
        &mut self,
        particles: &ParticleSnapshot,
        list: &NeighborList,
        inum: usize,
        cpu_time: f64,
        forces: &mut [[f64; 3]],
        tally: &mut EvTally,
    ) -> Result<usize, AccelError> {
        let state = self.state.as_ref().ok_or(AccelError::NotInitialized)?;
        let started = Instant::now();
        let host_start = self.balancer.start_call(inum, cpu_time);

        let (bytes, largest) = GpuPairBuffers::footprint(particles.nall(), list, host_start);
        let required = bytes + GpuCoeffTable::bytes_for(state.table.dim);
        if !self.limits.fits(required, largest) {
            return Err(AccelError::InsufficientMemory {
                required,
                available: self.limits.available(),
            });
        }

        let flags: EvFlags = tally.flags();
        let contributions = if host_start == 0 {
            Vec::new()
        } else {
            let buffers = GpuPairBuffers::upload(&self.device, particles, list, host_start)?;
            self.runtime.block_on(state.pipeline.run(
                &self.device,
                &state.table,
                &buffers,
                &list.ilist()[..host_start],
                state.kappa,
                state.special_lj,
                flags,
            ))?
        };
        for c in &contributions {
            tally.accumulate(forces, c);
        }

        self.staged_bytes = bytes;
        self.balancer
            .finish_call(inum, host_start, started.elapsed().as_secs_f64());
        Ok(host_start)
    }
}

impl AcceleratorService for WgpuAccelerator {
    fn init(&mut self, params: &AccelInit<'_>) -> Result<AccelMode, AccelError> {
        let table_bytes = GpuCoeffTable::bytes_for(params.ntypes);
        if !self.limits.fits(table_bytes, table_bytes) {
            return Err(AccelError::InsufficientMemory {
                required: table_bytes,
                available: self.limits.available(),
            });
        }

        let table = GpuCoeffTable::upload(&self.device, params.cutsq, params.a, params.offset)?;
        let pipeline = YukawaPipeline::new(&self.device);

        tracing::info!(
            adapter = %self.device.info().name,
            mode = ?self.config.mode,
            split = self.balancer.split(),
            cell_size = params.cell_size,
            usable_bytes = self.limits.usable_vram,
            "wgpu accelerator initialised"
        );

        self.state = Some(DeviceState {
            pipeline,
            table,
            kappa: params.kappa,
            special_lj: params.special_lj,
            cell_size: params.cell_size,
        });
        self.list = None;
        Ok(self.config.mode)
    }

    fn clear(&mut self) {
        self.state = None;
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
        let cell_size = self
            .state
            .as_ref()
            .ok_or(AccelError::NotInitialized)?
            .cell_size;
        refresh_list(&mut self.list, request, cell_size)?;

        // Lend the list out while the share runs
        let list = self.list.take().ok_or(AccelError::NotInitialized)?;
        let result = self.run_share(
            request.particles,
            &list,
            list.inum(),
            request.cpu_time,
            forces,
            tally,
        );
        let list = self.list.insert(list);
        Ok(FullStepResult {
            host_start: result?,
            list,
        })
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
        self.run_share(
            request.particles,
            request.list,
            request.inum,
            request.cpu_time,
            forces,
            tally,
        )
    }

    fn memory_usage(&self) -> usize {
        self.table_bytes() + self.staged_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::PairCoeffs;
    use crate::storage::Domain;

    fn accel(config: AccelConfig) -> Option<WgpuAccelerator> {
        match WgpuAccelerator::new(config) {
            Ok(accel) => Some(accel),
            Err(err) => {
                eprintln!("⚠️  Skipping wgpu accelerator test: {err}");
                None
            }
        }
    }

    fn coeffs() -> PairCoeffs {
        let mut coeffs = PairCoeffs::new(1, 1.0, 5.0).unwrap();
        coeffs.set_coeff(1, 1, 2.0, None).unwrap();
        coeffs.init_cutsq().unwrap();
        coeffs
    }

    fn init_params(coeffs: &PairCoeffs) -> AccelInit<'_> {
        AccelInit {
            ntypes: coeffs.ntypes() + 1,
            cutsq: coeffs.cutsq(),
            a: coeffs.a(),
            offset: coeffs.offset(),
            special_lj: [1.0; 4],
            inum: 2,
            nall: 2,
            max_neighbors: 300,
            max_special: 0,
            cell_size: 5.3,
            kappa: coeffs.kappa(),
        }
    }

    #[test]
    fn test_no_adapter_maps_to_no_device() {
        assert!(matches!(
            AccelError::from(GpuDeviceError::NoAdapter),
            AccelError::NoDevice
        ));
    }

    #[test]
    fn test_two_particle_forces_on_device() {
        let Some(mut accel) = accel(AccelConfig::default().with_mode(AccelMode::Neigh)) else {
            return;
        };
        let coeffs = coeffs();
        assert_eq!(accel.init(&init_params(&coeffs)).unwrap(), AccelMode::Neigh);

        let snap = ParticleSnapshot::new(vec![[0.0; 3], [2.0, 0.0, 0.0]], vec![1, 1], vec![1.0, 1.5]);
        let domain = Domain::enclosing(&snap.positions);
        let request = FullStepRequest {
            ago: 0,
            inum: 2,
            nall: 2,
            particles: &snap,
            domain: &domain,
            special: None,
            flags: EvFlags::global(),
            cpu_time: 0.0,
        };
        let mut forces = vec![[0.0; 3]; 2];
        let mut tally = EvTally::new(EvFlags::global(), 2);

        let result = accel.compute_full(&request, &mut forces, &mut tally).unwrap();
        assert_eq!(result.host_start, 2);

        let s = 0.5_f64.exp();
        assert!((forces[0][0] + 2.0 * s).abs() < 1e-4);
        assert!((forces[1][0] - 2.0 * s).abs() < 1e-4);
        assert!((tally.eng_vdwl - 2.0 * s).abs() < 1e-4);
    }

    #[test]
    fn test_tiny_budget_reports_insufficient_memory() {
        let Some(mut accel) = accel(AccelConfig::default().with_memory_limit(16)) else {
            return;
        };
        let coeffs = coeffs();
        assert!(matches!(
            accel.init(&init_params(&coeffs)),
            Err(AccelError::InsufficientMemory { .. })
        ));
    }
}
