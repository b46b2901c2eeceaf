//! Temporal anti-aliasing resolve. Keeps two resolve targets and ping-pongs
//! between them so the previous frame's output serves as this frame's
//! history. The first frame after creation or a resize blends with weight
//! 1.0, which makes the output exactly the current frame.

use crate::context::{RenderContext, SamplerKind};
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{names, RenderTexture, HDR_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;
use vermilion_gpu_shared::uniforms::TaaParams;

/// Steady-state contribution of the current frame.
const CURRENT_WEIGHT: f32 = 0.1;

/// Blend weight for the current frame. Without valid history the output
/// must be exactly the current frame.
fn blend_weight(history_valid: bool) -> f32 {
    if history_valid {
        CURRENT_WEIGHT
    } else {
        1.0
    }
}

pub struct TaaPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    bgl: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    targets: [RenderTexture; 2],
    write_index: usize,
    history_valid: bool,
}

fn create_targets(ctx: &RenderContext, width: u32, height: u32) -> [RenderTexture; 2] {
    let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    [
        RenderTexture::create(ctx, names::TAA_RESOLVE, width, height, 1, 1, HDR_FORMAT, usage),
        RenderTexture::create(ctx, names::TAA_RESOLVE, width, height, 1, 1, HDR_FORMAT, usage),
    ]
}

impl TaaPass {
    pub fn new(ctx: &RenderContext, io: PassIo, width: u32, height: u32) -> Self {
        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("TAA Params"),
            size: std::mem::size_of::<TaaParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("TAA BGL"),
                entries: &[
                    pipeline::uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                    pipeline::loaded_texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                    pipeline::texture_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::loaded_texture_entry(3, wgpu::ShaderStages::FRAGMENT),
                    pipeline::sampler_entry(
                        4,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                ],
            });
        let pipeline = pipeline::fullscreen_pipeline(
            ctx,
            "TAA Resolve Pipeline",
            "TAA Resolve Frag",
            shaders::TAA_RESOLVE_FRAG,
            &[&bgl],
            HDR_FORMAT,
            None,
        );

        Self {
            io,
            pipeline,
            bgl,
            params_buffer,
            targets: create_targets(ctx, width, height),
            write_index: 0,
            history_valid: false,
        }
    }
}

impl RenderPass for TaaPass {
    fn kind(&self) -> PassKind {
        PassKind::Taa
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        self.targets = create_targets(ctx, width, height);
        self.history_valid = false;
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
        let current = &inputs[0];
        let velocity = &inputs[1];

        let params = TaaParams {
            current_weight: blend_weight(self.history_valid),
            _pad: [0.0; 3],
        };
        ctx.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let history = &self.targets[1 - self.write_index];
        let target = &self.targets[self.write_index];

        let sampler = ctx.sampler(SamplerKind::LinearClamp);
        let bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("TAA BG"),
            layout: &self.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&current.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&history.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&velocity.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("TAA Resolve Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
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

        let resolved = target.clone();
        self.write_index = 1 - self.write_index;
        self.history_valid = true;
        vec![resolved]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_after_reset_uses_only_the_current_frame() {
        assert_eq!(blend_weight(false), 1.0);
    }

    #[test]
    fn steady_state_blend_favors_history() {
        let w = blend_weight(true);
        assert!(w > 0.0 && w < 0.5);
    }
}
