//! Yukawa colloid compute pipeline
//!
//! Built once per accelerator init. Each dispatch evaluates the device share
//! of the active list and reads back one [`OUTPUT_STRIDE`] record per active
//! particle, which the caller widens to `f64` and merges.

use super::buffer::{GpuCoeffTable, GpuPairBuffers, OUTPUT_STRIDE};
use super::GpuDevice;
use crate::pair::{AtomContribution, EvFlags};
use anyhow::{Context, Result};

const SHADER: &str = include_str!("shaders/yukawa_colloid.wgsl");
const WORKGROUP_SIZE: u32 = 256;

/// Uniform block of the shader
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct YukawaParams {
    count: u32,
    dim: u32,
    eflag: u32,
    vflag: u32,
    kappa: f32,
    _padding: [f32; 3],
    special_lj: [f32; 4],
}

/// Compiled shader and bind group layout
#[derive(Debug)]
pub struct YukawaPipeline {
    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl YukawaPipeline {
    /// Compile the kernel
    #[must_use]
    pub fn new(device: &GpuDevice) -> Self {
        let shader_module = device
            .device()
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Yukawa Colloid Shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER.into()),
            });

        let layout = device
            .device()
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Yukawa Colloid Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage_entry(1, true),
                    storage_entry(2, true),
                    storage_entry(3, true),
                    storage_entry(4, true),
                    storage_entry(5, true),
                    storage_entry(6, true),
                    storage_entry(7, false),
                ],
            });

        let pipeline_layout = device
            .device()
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Yukawa Colloid Pipeline Layout"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });

        let pipeline = device
            .device()
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Yukawa Colloid Pipeline"),
                layout: Some(&pipeline_layout),
                module: &shader_module,
                entry_point: "yukawa_colloid",
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        Self { layout, pipeline }
    }

    /// Dispatch over the uploaded device share and read back contributions
    ///
    /// `ilist` is the device share of the active list, in upload order.
    ///
    /// # Errors
    ///
    /// Returns error if the result buffer cannot be mapped
    #[allow(clippy::cast_possible_truncation, clippy::too_many_arguments)]
    pub async fn run(
        &self,
        device: &GpuDevice,
        table: &GpuCoeffTable,
        buffers: &GpuPairBuffers,
        ilist: &[u32],
        kappa: f64,
        special_lj: [f64; 4],
        flags: EvFlags,
    ) -> Result<Vec<AtomContribution>> {
        if buffers.num_active == 0 {
            return Ok(Vec::new());
        }

        let count = u32::try_from(buffers.num_active).context("active list too large for device")?;
        let params = YukawaParams {
            count,
            dim: u32::try_from(table.dim).context("type table too large for device")?,
            eflag: u32::from(flags.eflag()),
            vflag: u32::from(flags.vflag()),
            kappa: kappa as f32,
            _padding: [0.0; 3],
            special_lj: special_lj.map(|s| s as f32),
        };
        let params_buffer = device.create_buffer_init(
            "Yukawa Params",
            bytemuck::bytes_of(&params),
            wgpu::BufferUsages::UNIFORM,
        );

        let bind_group = device
            .device()
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Yukawa Colloid Bind Group"),
                layout: &self.layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffers.positions.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffers.types.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: buffers.ilist.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: buffers.row_offsets.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: buffers.neighbors.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: table.buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: buffers.output.as_entire_binding(),
                    },
                ],
            });

        let mut encoder = device
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Yukawa Colloid Encoder"),
            });
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Yukawa Colloid Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(count.div_ceil(WORKGROUP_SIZE), 1, 1);
        }
        device.queue().submit(Some(encoder.finish()));

        let raw = read_output(device, &buffers.output, buffers.num_active).await?;
        Ok(decode_output(&raw, buffers.num_active, |ii| ilist[ii] as usize))
    }
}

/// Copy the result buffer to a staging buffer and map it
async fn read_output(device: &GpuDevice, output: &wgpu::Buffer, num_active: usize) -> Result<Vec<f32>> {
    let size = GpuPairBuffers::output_bytes(num_active) as u64;
    let staging_buffer = device.create_buffer(
        "Pair Output Staging",
        size,
        wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
    );

    let mut encoder = device
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
    encoder.copy_buffer_to_buffer(output, 0, &staging_buffer, 0, size);
    device.queue().submit(Some(encoder.finish()));

    let buffer_slice = staging_buffer.slice(..);
    let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();

    buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });

    device.device().poll(wgpu::Maintain::Wait);
    rx.receive()
        .await
        .context("Failed to receive map result")?
        .context("Buffer mapping failed")?;

    let data = buffer_slice.get_mapped_range();
    let values: Vec<f32> = bytemuck::cast_slice(&data).to_vec();
    drop(data);
    staging_buffer.unmap();

    Ok(values)
}

/// Widen `num_active` output records; `index_of(ii)` maps a record to its particle
pub fn decode_output(
    raw: &[f32],
    num_active: usize,
    index_of: impl Fn(usize) -> usize,
) -> Vec<AtomContribution> {
    raw.chunks_exact(OUTPUT_STRIDE)
        .take(num_active)
        .enumerate()
        .map(|(ii, rec)| {
            let mut c = AtomContribution::new(index_of(ii));
            c.force = [f64::from(rec[0]), f64::from(rec[1]), f64::from(rec[2])];
            c.energy = f64::from(rec[3]);
            for (v, &r) in c.virial.iter_mut().zip(&rec[4..OUTPUT_STRIDE]) {
                *v = f64::from(r);
            }
            c
        })
        .collect()
}
