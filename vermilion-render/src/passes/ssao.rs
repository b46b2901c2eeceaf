//! Screen-space ambient occlusion: hemisphere kernel pass plus a box blur.

use crate::context::{RenderContext, SamplerKind};
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{RenderTexture, R16_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;
use vermilion_gpu_shared::uniforms::{SsaoParams, SSAO_KERNEL_SIZE};

/// Deterministic hemisphere kernel: golden-angle spiral over the upper
/// hemisphere, samples packed toward the center by the quadratic scale.
pub fn build_kernel() -> [[f32; 4]; SSAO_KERNEL_SIZE] {
    use std::f32::consts::PI;

    let golden_angle = PI * (3.0 - 5.0f32.sqrt());
    let mut kernel = [[0.0; 4]; SSAO_KERNEL_SIZE];
    for (i, entry) in kernel.iter_mut().enumerate() {
        let t = (i as f32 + 0.5) / SSAO_KERNEL_SIZE as f32;
        let z = t; // upper hemisphere
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = golden_angle * i as f32;
        let scale = 0.1 + 0.9 * t * t;
        *entry = [
            r * phi.cos() * scale,
            r * phi.sin() * scale,
            z * scale,
            0.0,
        ];
    }
    kernel
}

pub struct SsaoPass {
    io: PassIo,
    ao_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    ao_bgl: wgpu::BindGroupLayout,
    blur_bgl: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    ao_target: RenderTexture,
    blur_target: RenderTexture,
}

fn create_targets(ctx: &RenderContext, width: u32, height: u32) -> (RenderTexture, RenderTexture) {
    let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    (
        RenderTexture::create(ctx, "SSAO AO", width, height, 1, 1, R16_FORMAT, usage),
        RenderTexture::create(ctx, "SSAO Blur", width, height, 1, 1, R16_FORMAT, usage),
    )
}

impl SsaoPass {
    pub fn new(ctx: &RenderContext, io: PassIo, width: u32, height: u32) -> Self {
        let params = SsaoParams {
            kernel: build_kernel(),
            radius: 0.5,
            bias: 0.025,
            strength: 1.5,
            _pad: 0.0,
        };
        let params_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("SSAO Params"),
            size: std::mem::size_of::<SsaoParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        ctx.queue
            .write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let ao_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("SSAO BGL"),
                entries: &[
                    pipeline::uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                    pipeline::depth_texture_entry(
                        1,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureViewDimension::D2,
                    ),
                    pipeline::loaded_texture_entry(2, wgpu::ShaderStages::FRAGMENT),
                ],
            });
        let blur_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("SSAO Blur BGL"),
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

        let ao_pipeline = pipeline::fullscreen_pipeline(
            ctx,
            "SSAO Pipeline",
            "SSAO Frag",
            shaders::SSAO_FRAG,
            &[&ctx.camera_bgl, &ao_bgl],
            R16_FORMAT,
            None,
        );
        let blur_pipeline = pipeline::fullscreen_pipeline(
            ctx,
            "SSAO Blur Pipeline",
            "SSAO Blur Frag",
            shaders::SSAO_BLUR_FRAG,
            &[&blur_bgl],
            R16_FORMAT,
            None,
        );

        let (ao_target, blur_target) = create_targets(ctx, width, height);

        Self {
            io,
            ao_pipeline,
            blur_pipeline,
            ao_bgl,
            blur_bgl,
            params_buffer,
            ao_target,
            blur_target,
        }
    }
}

impl RenderPass for SsaoPass {
    fn kind(&self) -> PassKind {
        PassKind::Ssao
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        let (ao, blur) = create_targets(ctx, width, height);
        self.ao_target = ao;
        self.blur_target = blur;
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
        let depth = &inputs[0];
        let normal = &inputs[1];

        let ao_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSAO BG"),
            layout: &self.ao_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&depth.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
            ],
        });
        let sampler = ctx.sampler(SamplerKind::NearestClamp);
        let blur_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SSAO Blur BG"),
            layout: &self.blur_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&self.ao_target.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("SSAO Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.ao_target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            rpass.set_pipeline(&self.ao_pipeline);
            rpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
            rpass.set_bind_group(1, &ao_bg, &[]);
            rpass.draw(0..3, 0..1);
        }
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("SSAO Blur Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.blur_target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                ..Default::default()
            });
            rpass.set_pipeline(&self.blur_pipeline);
            rpass.set_bind_group(0, &blur_bg, &[]);
            rpass.draw(0..3, 0..1);
        }

        vec![self.ao_target.clone(), self.blur_target.clone()]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_samples_live_in_the_upper_hemisphere() {
        for k in build_kernel() {
            assert!(k[2] > 0.0, "{k:?}");
            let len = (k[0] * k[0] + k[1] * k[1] + k[2] * k[2]).sqrt();
            assert!(len <= 1.0 + 1e-5, "{k:?}");
            assert!(len >= 0.01, "{k:?}");
        }
    }

    #[test]
    fn kernel_scale_grows_with_index() {
        let kernel = build_kernel();
        let len = |k: [f32; 4]| (k[0] * k[0] + k[1] * k[1] + k[2] * k[2]).sqrt();
        assert!(len(kernel[SSAO_KERNEL_SIZE - 1]) > len(kernel[0]));
    }
}
