//! Screen-space reflection pass: a compute ray march against the Hi-Z
//! pyramid that writes the lit scene with reflections composited in, so it
//! can stand in for the lit target downstream.

use crate::context::RenderContext;
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{names, RenderTexture, HDR_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;
use vermilion_gpu_shared::uniforms::SsrParams;

/// March tuning, uploaded once at pass creation.
#[derive(Clone, Copy, Debug)]
pub struct SsrSettings {
    pub max_steps: u32,
    pub max_mip: u32,
    /// Write miss information into the output alpha channel.
    pub debug_missed: bool,
    /// View-space depth tolerance for accepting an intersection.
    pub thickness: f32,
    /// Base view-space step length.
    pub stride: f32,
}

impl Default for SsrSettings {
    fn default() -> Self {
        Self {
            max_steps: 96,
            max_mip: 6,
            debug_missed: false,
            thickness: 0.25,
            stride: 0.1,
        }
    }
}

pub struct SsrPass {
    io: PassIo,
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    target: RenderTexture,
}

fn create_target(ctx: &RenderContext, width: u32, height: u32) -> RenderTexture {
    RenderTexture::create(
        ctx,
        names::REFLECTION,
        width,
        height,
        1,
        1,
        HDR_FORMAT,
        wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
    )
}

impl SsrPass {
    pub fn new(ctx: &RenderContext, io: PassIo, width: u32, height: u32) -> Self {
        Self::with_settings(ctx, io, width, height, SsrSettings::default())
    }

    pub fn with_settings(
        ctx: &RenderContext,
        io: PassIo,
        width: u32,
        height: u32,
        settings: SsrSettings,
    ) -> Self {
        let params = SsrParams {
            max_steps: settings.max_steps,
            max_mip: settings.max_mip,
            debug_missed: settings.debug_missed as u32,
            _pad: 0,
            thickness: settings.thickness,
            stride: settings.stride,
            _pad2: [0.0; 2],
        };
        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSR Params"),
            size: std::mem::size_of::<SsrParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.queue
            .write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("SSR BGL"),
                entries: &[
                    pipeline::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                    pipeline::loaded_texture_entry(1, wgpu::ShaderStages::COMPUTE),
                    pipeline::loaded_texture_entry(2, wgpu::ShaderStages::COMPUTE),
                    pipeline::loaded_texture_entry(3, wgpu::ShaderStages::COMPUTE),
                    pipeline::storage_texture_entry(4, wgpu::ShaderStages::COMPUTE, HDR_FORMAT),
                ],
            });
        let pipeline = pipeline::compute_pipeline(
            ctx,
            "SSR Pipeline",
            shaders::SSR_COMPUTE,
            &[&ctx.camera_bgl, &bgl],
        );

        Self {
            io,
            pipeline,
            bgl,
            params_buffer,
            target: create_target(ctx, width, height),
        }
    }
}

impl RenderPass for SsrPass {
    fn kind(&self) -> PassKind {
        PassKind::Ssr
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        self.target = create_target(ctx, width, height);
    }

    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        _scene: &dyn Scene,
        _camera: &crate::Camera,
        inputs: &[RenderTexture],
        _surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        let hiz = &inputs[0];
        let lit = &inputs[1];
        let normal = &inputs[2];

        let bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSR BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&hiz.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&lit.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&self.target.view),
                },
            ],
        });

        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("SSR Pass"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.pipeline);
        cpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
        cpass.set_bind_group(1, &bg, &[]);
        cpass.dispatch_workgroups(
            self.target.width.div_ceil(8),
            self.target.height.div_ceil(8),
            1,
        );
        drop(cpass);

        vec![self.target.clone()]
    }
}
