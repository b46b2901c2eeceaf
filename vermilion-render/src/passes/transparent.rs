//! Forward transparent pass: the scene's transparent list, directionally lit
//! and alpha blended over the lit target. Depth is tested against the opaque
//! buffer but never written.

use crate::context::RenderContext;
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{RenderTexture, DEPTH_FORMAT, HDR_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;

pub struct TransparentPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    light_bgl: wgpu::BindGroupLayout,
}

impl TransparentPass {
    pub fn new(ctx: &RenderContext, io: PassIo) -> Self {
        let light_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Transparent Lights BGL"),
                entries: &[
                    pipeline::storage_entry(0, wgpu::ShaderStages::FRAGMENT, true),
                    pipeline::uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
                ],
            });

        let module = ctx.shader_module("Transparent Shader", shaders::TRANSPARENT_SHADER);
        let layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Transparent Layout"),
                bind_group_layouts: &[
                    &ctx.camera_bgl,
                    &ctx.object_bgl,
                    &ctx.material_bgl,
                    &light_bgl,
                ],
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

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Transparent Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &vertex_buffers,
                },
                primitive: wgpu::PrimitiveState {
                    // Both faces of transparent surfaces stay visible.
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Less,
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
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        Self {
            io,
            pipeline,
            light_bgl,
        }
    }
}

impl RenderPass for TransparentPass {
    fn kind(&self) -> PassKind {
        PassKind::Transparent
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

        let lights = scene.lights();
        let light_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Transparent Lights BG"),
            layout: &self.light_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: lights.light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lights.directional_slice_buffer.as_entire_binding(),
                },
            ],
        });

        let ds_view = depth
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut rpass = encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Transparent Pass"),
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
            })
            .forget_lifetime();

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
        rpass.set_bind_group(3, &light_bg, &[]);
        scene.render_transparent(&mut rpass, ctx);
        drop(rpass);

        vec![lighting.clone()]
    }
}
