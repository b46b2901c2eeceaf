//! Final blit: tonemap the HDR frame, mix in bloom, and write the swapchain.

use crate::context::{RenderContext, SamplerKind};
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::RenderTexture;
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;
use vermilion_gpu_shared::uniforms::BlitParams;

const BLOOM_MIX: f32 = 0.04;

pub struct BlitPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    /// 1x1 black stand-in bound when bloom is disabled; bloom_mix is zero
    /// then, so the sample never contributes.
    black: wgpu::TextureView,
}

fn create_black_1x1(ctx: &RenderContext) -> wgpu::TextureView {
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Black 1x1"),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba16Float,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    ctx.queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[0u8; 8],
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(8),
            rows_per_image: Some(1),
        },
        wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl BlitPass {
    pub fn new(ctx: &RenderContext, io: PassIo, surface_format: wgpu::TextureFormat) -> Self {
        let has_bloom = io.inputs.len() > 1;
        let params = BlitParams {
            bloom_mix: if has_bloom { BLOOM_MIX } else { 0.0 },
            _pad: [0.0; 3],
        };
        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Blit Params"),
            size: std::mem::size_of::<BlitParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.queue
            .write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Blit BGL"),
                entries: &[
                    pipeline::uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                    pipeline::texture_entry(
                        1,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::texture_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::sampler_entry(
                        3,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                ],
            });
        let pipeline = pipeline::fullscreen_pipeline(
            ctx,
            "Blit Pipeline",
            "Blit Frag",
            shaders::BLIT_FRAG,
            &[&bgl],
            surface_format,
            None,
        );

        Self {
            io,
            pipeline,
            bgl,
            params_buffer,
            black: create_black_1x1(ctx),
        }
    }
}

impl RenderPass for BlitPass {
    fn kind(&self) -> PassKind {
        PassKind::Blit
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, _ctx: &RenderContext, _width: u32, _height: u32) {}

    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        _scene: &dyn Scene,
        _camera: &crate::Camera,
        inputs: &[RenderTexture],
        surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        let frame = &inputs[0];
        let bloom_view = inputs.get(1).map(|t| &t.view).unwrap_or(&self.black);

        let sampler = ctx.sampler(SamplerKind::LinearClamp);
        let bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&frame.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(bloom_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Blit Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: surface_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            ..Default::default()
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &bg, &[]);
        rpass.draw(0..3, 0..1);
        drop(rpass);

        Vec::new()
    }
}
