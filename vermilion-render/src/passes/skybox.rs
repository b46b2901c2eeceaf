//! Skybox pass: far-plane fullscreen triangle over the lit target, depth
//! tested so only background pixels take the cubemap color.

use crate::context::{RenderContext, SamplerKind};
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{RenderTexture, DEPTH_FORMAT, HDR_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;

pub struct SkyboxPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    sky_bgl: wgpu::BindGroupLayout,
}

impl SkyboxPass {
    pub fn new(ctx: &RenderContext, io: PassIo) -> Self {
        let sky_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Skybox BGL"),
                entries: &[
                    pipeline::texture_entry(
                        0,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureSampleType::Float { filterable: true },
                        wgpu::TextureViewDimension::Cube,
                    ),
                    pipeline::sampler_entry(
                        1,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::SamplerBindingType::Filtering,
                    ),
                ],
            });

        let module = ctx.shader_module("Skybox Shader", shaders::SKYBOX_SHADER);
        let layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Skybox Layout"),
                bind_group_layouts: &[&ctx.camera_bgl, &sky_bgl],
                push_constant_ranges: &[],
            });
        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Skybox Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    // Triangle sits exactly on the far plane.
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: HDR_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        Self {
            io,
            pipeline,
            sky_bgl,
        }
    }
}

impl RenderPass for SkyboxPass {
    fn kind(&self) -> PassKind {
        PassKind::Skybox
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, _ctx: &RenderContext, _width: u32, _height: u32) {}

    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &dyn Scene,
        _camera: &crate::Camera,
        inputs: &[RenderTexture],
        _surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        let depth = &inputs[0];
        let lighting = &inputs[1];

        let Some(env) = scene.environment() else {
            return vec![lighting.clone()];
        };

        let sampler = ctx.sampler(SamplerKind::LinearClamp);
        let sky_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Skybox BG"),
            layout: &self.sky_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(env.skybox_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        let ds_view = depth
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Skybox Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &lighting.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ds_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
        rpass.set_bind_group(1, &sky_bg, &[]);
        rpass.draw(0..3, 0..1);
        drop(rpass);

        vec![lighting.clone()]
    }
}
