//! G-buffer pass: opaque geometry into normal/material, color/reflectance,
//! velocity, and depth targets.

use crate::context::RenderContext;
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::resource::{RenderTexture, ALBEDO_FORMAT, DEPTH_FORMAT, HDR_FORMAT, RG16_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;

struct Targets {
    normal: RenderTexture,
    color_reflectance: RenderTexture,
    velocity: RenderTexture,
    /// Full-aspect depth-stencil allocation; attached here and in the
    /// point-light passes.
    depth: RenderTexture,
    /// Depth-only view of the same allocation, the one published for
    /// sampling.
    depth_sampled: RenderTexture,
}

pub struct GBufferPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    targets: Targets,
}

fn create_targets(ctx: &RenderContext, width: u32, height: u32) -> Targets {
    let color_usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    let normal = RenderTexture::create(
        ctx,
        "GBuffer Normal+Material",
        width,
        height,
        1,
        1,
        HDR_FORMAT,
        color_usage,
    );
    let color_reflectance = RenderTexture::create(
        ctx,
        "GBuffer Color+Reflectance",
        width,
        height,
        1,
        1,
        ALBEDO_FORMAT,
        color_usage,
    );
    let velocity = RenderTexture::create(
        ctx,
        "GBuffer Velocity",
        width,
        height,
        1,
        1,
        RG16_FORMAT,
        color_usage,
    );
    let depth = RenderTexture::create(
        ctx,
        "Scene Depth",
        width,
        height,
        1,
        1,
        DEPTH_FORMAT,
        wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
    );
    // Stencil aspect must be excluded from sampled views.
    let depth_sampled = depth.with_view(depth.texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Scene Depth (sampled)"),
        aspect: wgpu::TextureAspect::DepthOnly,
        ..Default::default()
    }));
    Targets {
        normal,
        color_reflectance,
        velocity,
        depth,
        depth_sampled,
    }
}

impl GBufferPass {
    pub fn new(ctx: &RenderContext, io: PassIo, width: u32, height: u32) -> Self {
        let module = ctx.shader_module("GBuffer Shader", shaders::GBUFFER_SHADER);
        let layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("GBuffer Pipeline Layout"),
                bind_group_layouts: &[&ctx.camera_bgl, &ctx.object_bgl, &ctx.material_bgl],
                push_constant_ranges: &[],
            });

        let vertex_buffers = [
            wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3],
            },
            wgpu::VertexBufferLayout {
                array_stride: 12,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![1 => Float32x3],
            },
            wgpu::VertexBufferLayout {
                array_stride: 8,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![2 => Float32x2],
            },
        ];

        let color_target = |format| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        };

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("GBuffer Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &vertex_buffers,
                },
                primitive: wgpu::PrimitiveState {
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[
                        color_target(HDR_FORMAT),
                        color_target(ALBEDO_FORMAT),
                        color_target(RG16_FORMAT),
                    ],
                }),
                multiview: None,
                cache: None,
            });

        Self {
            io,
            pipeline,
            targets: create_targets(ctx, width, height),
        }
    }
}

impl RenderPass for GBufferPass {
    fn kind(&self) -> PassKind {
        PassKind::GBuffer
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        self.targets = create_targets(ctx, width, height);
    }

    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &dyn Scene,
        _camera: &crate::Camera,
        _inputs: &[RenderTexture],
        _surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        let attachment = |view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })
        };

        let mut rpass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("GBuffer Pass"),
                color_attachments: &[
                    attachment(&self.targets.normal.view),
                    attachment(&self.targets.color_reflectance.view),
                    attachment(&self.targets.velocity.view),
                ],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                ..Default::default()
            })
            .forget_lifetime();

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
        scene.render_opaque(&mut rpass, ctx);
        drop(rpass);

        vec![
            self.targets.normal.clone(),
            self.targets.color_reflectance.clone(),
            self.targets.velocity.clone(),
            self.targets.depth_sampled.clone(),
        ]
    }
}
