//! Bloom pass: a full mip chain over the surface extent, 13-tap downsampled
//! to the coarsest level and then tent-upsampled additively back to mip 0.

use crate::context::{RenderContext, SamplerKind};
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{names, RenderTexture, HDR_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;
use vermilion_gpu_shared::uniforms::BloomParams;

const FILTER_RADIUS: f32 = 0.005;

const UPSAMPLE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

struct MipChain {
    texture: RenderTexture,
    mip_views: Vec<wgpu::TextureView>,
    mips: u32,
}

/// Full mip chain for the surface extent: `floor(1 + log2(max(w, h)))`.
fn chain_mips(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

fn create_chain(ctx: &RenderContext, width: u32, height: u32) -> MipChain {
    let mips = chain_mips(width, height);
    let texture = RenderTexture::create(
        ctx,
        names::BLOOM,
        width,
        height,
        1,
        mips,
        HDR_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    );
    let mip_views = (0..mips)
        .map(|mip| {
            texture.texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Bloom Mip"),
                base_mip_level: mip,
                mip_level_count: Some(1),
                ..Default::default()
            })
        })
        .collect();
    MipChain {
        texture,
        mip_views,
        mips,
    }
}

pub struct BloomPass {
    io: PassIo,
    down_pipeline: wgpu::RenderPipeline,
    up_pipeline: wgpu::RenderPipeline,
    down_bgl: wgpu::BindGroupLayout,
    up_bgl: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    chain: MipChain,
}

impl BloomPass {
    pub fn new(ctx: &RenderContext, io: PassIo, width: u32, height: u32) -> Self {
        let params = BloomParams {
            filter_radius: FILTER_RADIUS,
            _pad: [0.0; 3],
        };
        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bloom Params"),
            size: std::mem::size_of::<BloomParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.queue
            .write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let down_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Downsample BGL"),
                entries: &[
                    pipeline::texture_entry(
                        0,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::sampler_entry(
                        1,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                ],
            });
        let up_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Bloom Upsample BGL"),
                entries: &[
                    pipeline::uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                    pipeline::texture_entry(
                        1,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::sampler_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                ],
            });

        let down_pipeline = pipeline::fullscreen_pipeline(
            ctx,
            "Bloom Downsample Pipeline",
            "Bloom Downsample Frag",
            shaders::BLOOM_DOWNSAMPLE_FRAG,
            &[&down_bgl],
            HDR_FORMAT,
            None,
        );
        let up_pipeline = pipeline::fullscreen_pipeline(
            ctx,
            "Bloom Upsample Pipeline",
            "Bloom Upsample Frag",
            shaders::BLOOM_UPSAMPLE_FRAG,
            &[&up_bgl],
            HDR_FORMAT,
            Some(UPSAMPLE_BLEND),
        );

        Self {
            io,
            down_pipeline,
            up_pipeline,
            down_bgl,
            up_bgl,
            params_buffer,
            chain: create_chain(ctx, width, height),
        }
    }

    fn down_bg(&self, ctx: &RenderContext, src: &wgpu::TextureView) -> wgpu::BindGroup {
        let sampler = ctx.sampler(SamplerKind::LinearClamp);
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Downsample BG"),
            layout: &self.down_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        })
    }

    fn up_bg(&self, ctx: &RenderContext, src: &wgpu::TextureView) -> wgpu::BindGroup {
        let sampler = ctx.sampler(SamplerKind::LinearClamp);
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bloom Upsample BG"),
            layout: &self.up_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(src),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        })
    }
}

fn fullscreen_draw(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bg: &wgpu::BindGroup,
    target: &wgpu::TextureView,
    load: wgpu::LoadOp<wgpu::Color>,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load,
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });
    rpass.set_pipeline(pipeline);
    rpass.set_bind_group(0, bg, &[]);
    rpass.draw(0..3, 0..1);
}

impl RenderPass for BloomPass {
    fn kind(&self) -> PassKind {
        PassKind::Bloom
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        self.chain = create_chain(ctx, width, height);
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
        let color = &inputs[0];

        // Scene color into mip 0, then down the chain.
        let bg = self.down_bg(ctx, &color.view);
        fullscreen_draw(
            encoder,
            "Bloom Downsample Pass",
            &self.down_pipeline,
            &bg,
            &self.chain.mip_views[0],
            wgpu::LoadOp::Clear(wgpu::Color::BLACK),
        );
        for mip in 1..self.chain.mips as usize {
            let bg = self.down_bg(ctx, &self.chain.mip_views[mip - 1]);
            fullscreen_draw(
                encoder,
                "Bloom Downsample Pass",
                &self.down_pipeline,
                &bg,
                &self.chain.mip_views[mip],
                wgpu::LoadOp::Clear(wgpu::Color::BLACK),
            );
        }

        // Back up the chain, accumulating into each finer mip.
        for mip in (1..self.chain.mips as usize).rev() {
            let bg = self.up_bg(ctx, &self.chain.mip_views[mip]);
            fullscreen_draw(
                encoder,
                "Bloom Upsample Pass",
                &self.up_pipeline,
                &bg,
                &self.chain.mip_views[mip - 1],
                wgpu::LoadOp::Load,
            );
        }

        vec![self.chain.texture.clone()]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_follows_the_log2_formula() {
        // floor(1 + log2(max(w, h)))
        assert_eq!(chain_mips(1920, 1080), 11);
        assert_eq!(chain_mips(3840, 2160), 12);
        assert_eq!(chain_mips(1024, 1024), 11);
    }

    #[test]
    fn chain_shrinks_for_small_surfaces() {
        assert_eq!(chain_mips(2, 2), 2);
        assert_eq!(chain_mips(16, 16), 5);
        assert_eq!(chain_mips(1, 1), 1);
    }

    #[test]
    fn downsample_weights_sum_to_one() {
        // Center 2x2 group plus four corner groups, as sampled in the
        // downsample shader.
        let sum = 4.0 * 0.125 + 4.0 * 4.0 * 0.03125;
        assert!((sum - 1.0f64).abs() < 1e-9);
    }

    #[test]
    fn tent_upsample_weights_sum_to_one() {
        let weights = [1.0, 2.0, 1.0, 2.0, 4.0, 2.0, 1.0, 2.0, 1.0];
        let sum: f64 = weights.iter().sum::<f64>() / 16.0;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
