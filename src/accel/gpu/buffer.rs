//! Device buffers for particles, neighbor lists, and coefficient tables
//!
//! Everything is narrowed to `f32`/`u32` on upload. Neighbor rows keep the
//! CSR layout of [`NeighborList`] with entries in packed form, so the shader
//! decodes special codes from the top two bits.

use super::GpuDevice;
use crate::params::TypeTable;
use crate::storage::{NeighborList, ParticleSnapshot};
use anyhow::{ensure, Result};

/// Floats per active particle in the result buffer: force(3), energy, virial(6)
pub const OUTPUT_STRIDE: usize = 10;

const STORAGE: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE;

/// Zero-length bindings are invalid, so empty arrays upload one padding element
fn non_empty<T: bytemuck::Pod + Default>(data: &[T]) -> Vec<T> {
    if data.is_empty() {
        vec![T::default()]
    } else {
        data.to_vec()
    }
}

/// Per-type-pair `(cutsq, a, offset, 0)` on the device
#[derive(Debug)]
pub struct GpuCoeffTable {
    /// Table dimension (`ntypes + 1`)
    pub dim: usize,

    /// `dim * dim` entries of `vec4<f32>`
    pub buffer: wgpu::Buffer,
}

impl GpuCoeffTable {
    /// Interleave the three tables into one buffer
    ///
    /// # Errors
    ///
    /// Returns error if the tables differ in dimension
    pub fn upload(device: &GpuDevice, cutsq: &TypeTable, a: &TypeTable, offset: &TypeTable) -> Result<Self> {
        let dim = cutsq.dim();
        ensure!(
            a.dim() == dim && offset.dim() == dim,
            "coefficient tables differ in dimension"
        );

        #[allow(clippy::cast_possible_truncation)]
        let packed: Vec<[f32; 4]> = cutsq
            .as_slice()
            .iter()
            .zip(a.as_slice())
            .zip(offset.as_slice())
            .map(|((&c, &a), &o)| [c as f32, a as f32, o as f32, 0.0])
            .collect();

        let buffer = device.create_buffer_init("Yukawa coeff table", bytemuck::cast_slice(&packed), STORAGE);
        Ok(Self { dim, buffer })
    }

    /// Device bytes for a table of dimension `dim`
    #[must_use]
    pub const fn bytes_for(dim: usize) -> usize {
        dim * dim * 4 * std::mem::size_of::<f32>()
    }
}

/// Particle and neighbor data for one compute call
#[derive(Debug)]
pub struct GpuPairBuffers {
    /// Particles uploaded (`nall`)
    pub num_particles: usize,

    /// Active particles handled on the device
    pub num_active: usize,

    /// `vec4<f32>(x, y, z, radius)` per particle
    pub positions: wgpu::Buffer,

    /// Type id per particle
    pub types: wgpu::Buffer,

    /// Device share of the active list
    pub ilist: wgpu::Buffer,

    /// CSR row offsets (size: rows + 1)
    pub row_offsets: wgpu::Buffer,

    /// Packed neighbor entries
    pub neighbors: wgpu::Buffer,

    /// Per-active-particle results, [`OUTPUT_STRIDE`] floats each
    pub output: wgpu::Buffer,
}

impl GpuPairBuffers {
    /// Upload particles and the leading `num_active` entries of the active list
    ///
    /// # Errors
    ///
    /// Returns error if the snapshot has no radii or a type id does not fit in `u32`
    #[allow(clippy::cast_possible_truncation)]
    pub fn upload(
        device: &GpuDevice,
        particles: &ParticleSnapshot,
        list: &NeighborList,
        num_active: usize,
    ) -> Result<Self> {
        let radius = particles.radius_slice()?;
        ensure!(num_active <= list.inum(), "device share exceeds active list");

        let positions: Vec<[f32; 4]> = particles
            .positions
            .iter()
            .zip(radius)
            .map(|(x, &r)| [x[0] as f32, x[1] as f32, x[2] as f32, r as f32])
            .collect();
        let types = particles
            .types
            .iter()
            .map(|&t| u32::try_from(t))
            .collect::<Result<Vec<u32>, _>>()?;
        let (row_offsets, neighbors) = list.packed_components();

        let positions = device.create_buffer_init(
            "Particle positions",
            bytemuck::cast_slice(&non_empty(&positions)),
            STORAGE,
        );
        let types = device.create_buffer_init("Particle types", bytemuck::cast_slice(&non_empty(&types)), STORAGE);
        let ilist = device.create_buffer_init(
            "Active list",
            bytemuck::cast_slice(&non_empty(&list.ilist()[..num_active])),
            STORAGE,
        );
        let row_offsets = device.create_buffer_init(
            "Neighbor row_offsets",
            bytemuck::cast_slice(&non_empty(row_offsets)),
            STORAGE,
        );
        let neighbors = device.create_buffer_init(
            "Neighbor entries",
            bytemuck::cast_slice(&non_empty(&neighbors)),
            STORAGE,
        );
        let output = device.create_buffer(
            "Pair output",
            Self::output_bytes(num_active.max(1)) as u64,
            STORAGE | wgpu::BufferUsages::COPY_SRC,
        );

        Ok(Self {
            num_particles: particles.nall(),
            num_active,
            positions,
            types,
            ilist,
            row_offsets,
            neighbors,
            output,
        })
    }

    /// Result-buffer bytes for `num_active` particles
    #[must_use]
    pub const fn output_bytes(num_active: usize) -> usize {
        num_active * OUTPUT_STRIDE * std::mem::size_of::<f32>()
    }

    /// Device bytes one call needs, and the size of its largest buffer
    #[must_use]
    pub fn footprint(nall: usize, list: &NeighborList, num_active: usize) -> (usize, usize) {
        let positions = nall * 4 * std::mem::size_of::<f32>();
        let types = nall * std::mem::size_of::<u32>();
        let ilist = num_active * std::mem::size_of::<u32>();
        let rows = (list.num_rows() + 1) * std::mem::size_of::<u32>();
        let neighbors = list.num_entries() * std::mem::size_of::<u32>();
        let output = Self::output_bytes(num_active);

        let sizes = [positions, types, ilist, rows, neighbors, output];
        let largest = sizes.iter().copied().max().unwrap_or(0);
        (sizes.iter().sum(), largest)
    }
}
