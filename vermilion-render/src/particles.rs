//! GPU particle simulation for animated light emitters.
//!
//! Particles live entirely on the GPU and are mirrored into the packed
//! light array each dispatch: particle `i` writes
//! `lights[light_offset + i]`. The caller reserves those slots by including
//! one placeholder point light per particle when building the scene's light
//! list; the simulation then animates their positions and intensities.

use std::cell::Cell;

use crate::context::RenderContext;
use crate::lights::LightCollection;
use crate::pipeline;
use vermilion_gpu_shared::shaders;
use vermilion_gpu_shared::uniforms::{ParticleRaw, ParticleSimParams};

pub struct ParticleSystem {
    count: u32,
    light_offset: u32,
    params_buffer: wgpu::Buffer,
    pipeline: wgpu::ComputePipeline,
    bind_group: wgpu::BindGroup,
    elapsed: Cell<f32>,
}

impl ParticleSystem {
    /// Build a system over `particles`, mirrored into `lights` starting at
    /// slot `light_offset`. The caller keeps that slot range reserved for
    /// the system's lifetime.
    pub fn new(
        ctx: &RenderContext,
        lights: &LightCollection,
        particles: &[ParticleRaw],
        light_offset: u32,
    ) -> Result<Self, String> {
        use wgpu::util::DeviceExt;

        if particles.is_empty() {
            return Err("particle system needs at least one particle".to_owned());
        }

        let particle_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Particle State"),
                contents: bytemuck::cast_slice(particles),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Sim Params"),
            size: std::mem::size_of::<ParticleSimParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Particle Sim BGL"),
                entries: &[
                    pipeline::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                    pipeline::storage_entry(1, wgpu::ShaderStages::COMPUTE, false),
                    pipeline::storage_entry(2, wgpu::ShaderStages::COMPUTE, false),
                ],
            });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Sim BG"),
            layout: &bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: particle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: lights.light_buffer.as_entire_binding(),
                },
            ],
        });

        let pipeline =
            pipeline::compute_pipeline(ctx, "Particle Sim", shaders::PARTICLE_SIM_COMPUTE, &[&bgl]);

        Ok(Self {
            count: particles.len() as u32,
            light_offset,
            params_buffer,
            pipeline,
            bind_group,
            elapsed: Cell::new(0.0),
        })
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Advance the simulation by `delta_time` seconds and mirror the
    /// particles into their reserved light slots. The renderer dispatches
    /// this at the top of every frame, before the passes record.
    pub fn simulate(
        &self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        delta_time: f32,
    ) {
        self.elapsed.set(self.elapsed.get() + delta_time);
        let params = ParticleSimParams {
            delta_time,
            elapsed_time: self.elapsed.get(),
            particle_count: self.count,
            light_offset: self.light_offset,
        };
        ctx.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Particle Sim"),
            ..Default::default()
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.dispatch_workgroups(self.count.div_ceil(64), 1, 1);
    }
}
