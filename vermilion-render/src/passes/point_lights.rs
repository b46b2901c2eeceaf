//! Point-light volume passes.
//!
//! Lights the camera is outside of are shaded through a stencil mask: the
//! mask pass rasterizes each bounding sphere with depth-fail stencil
//! arithmetic (back faces increment, front faces decrement), leaving a
//! non-zero count exactly where scene geometry sits inside a volume. The
//! shading pass then draws the sphere front faces with a stencil-not-equal
//! test and accumulates additively. Lights containing the camera skip the
//! mask and shade their back faces directly.

use crate::context::RenderContext;
use crate::lights::SphereMesh;
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::pipeline;
use crate::resource::{RenderTexture, DEPTH_FORMAT, HDR_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;

/// Additive accumulation into the lit target.
const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
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

fn light_slice_bgl(ctx: &RenderContext, label: &str) -> wgpu::BindGroupLayout {
    ctx.device
        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[
                pipeline::storage_entry(
                    0,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    true,
                ),
                pipeline::uniform_entry(
                    1,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ),
            ],
        })
}

fn light_slice_bg(
    ctx: &RenderContext,
    layout: &wgpu::BindGroupLayout,
    lights: &crate::lights::LightCollection,
    slice_buffer: &wgpu::Buffer,
) -> wgpu::BindGroup {
    ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Light Slice BG"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: lights.light_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: slice_buffer.as_entire_binding(),
            },
        ],
    })
}

fn sphere_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: 12,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
    }
}

/// Full-aspect view for attaching the shared depth-stencil texture.
fn depth_stencil_view(depth: &RenderTexture) -> wgpu::TextureView {
    depth
        .texture
        .create_view(&wgpu::TextureViewDescriptor::default())
}

// ============================================================================
// Mask pass
// ============================================================================

pub struct PointLightMaskPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    slice_bgl: wgpu::BindGroupLayout,
    sphere: SphereMesh,
}

impl PointLightMaskPass {
    pub fn new(ctx: &RenderContext, io: PassIo) -> Self {
        let slice_bgl = light_slice_bgl(ctx, "Point Light Mask BGL");
        let module = ctx.shader_module("Point Light Mask Shader", shaders::POINT_LIGHT_MASK_VERT);
        let layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Point Light Mask Layout"),
                bind_group_layouts: &[&ctx.camera_bgl, &slice_bgl],
                push_constant_ranges: &[],
            });

        let depth_fail_face = |op| wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::Always,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: op,
            pass_op: wgpu::StencilOperation::Keep,
        };

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Point Light Mask Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[sphere_vertex_layout()],
                },
                primitive: wgpu::PrimitiveState {
                    // Both faces rasterize; the stencil ops are per-face.
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState {
                        front: depth_fail_face(wgpu::StencilOperation::DecrementWrap),
                        back: depth_fail_face(wgpu::StencilOperation::IncrementWrap),
                        read_mask: 0xFF,
                        write_mask: 0xFF,
                    },
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: None,
                multiview: None,
                cache: None,
            });

        Self {
            io,
            pipeline,
            slice_bgl,
            sphere: SphereMesh::create(ctx),
        }
    }
}

impl RenderPass for PointLightMaskPass {
    fn kind(&self) -> PassKind {
        PassKind::PointLightMask
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
        let lights = scene.lights();
        let count = lights.packed.point.count;

        let slice_bg = light_slice_bg(ctx, &self.slice_bgl, lights, &lights.point_slice_buffer);
        let ds_view = depth_stencil_view(depth);

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point Light Mask Pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &ds_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            ..Default::default()
        });

        if count > 0 {
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
            rpass.set_bind_group(1, &slice_bg, &[]);
            rpass.set_vertex_buffer(0, self.sphere.vertex_buffer.slice(..));
            rpass.set_index_buffer(self.sphere.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..self.sphere.index_count, 0, 0..count);
        }

        Vec::new()
    }
}

// ============================================================================
// Shading passes
// ============================================================================

/// Which volume geometry and test the shading pipeline uses.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VolumePath {
    /// Front faces, stencil-not-equal-zero test. Camera outside the volume.
    StencilCulled,
    /// Back faces, no stencil. Camera inside the volume.
    CameraInside,
}

pub struct PointLightShadePass {
    io: PassIo,
    path: VolumePath,
    pipeline: wgpu::RenderPipeline,
    slice_bgl: wgpu::BindGroupLayout,
    gbuffer_bgl: wgpu::BindGroupLayout,
    sphere: SphereMesh,
}

impl PointLightShadePass {
    pub fn new(ctx: &RenderContext, io: PassIo, path: VolumePath) -> Self {
        let slice_bgl = light_slice_bgl(ctx, "Point Light Shade BGL");
        let gbuffer_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Point Light GBuffer BGL"),
                entries: &[
                    pipeline::loaded_texture_entry(0, wgpu::ShaderStages::FRAGMENT),
                    pipeline::loaded_texture_entry(1, wgpu::ShaderStages::FRAGMENT),
                    pipeline::depth_texture_entry(
                        2,
                        wgpu::ShaderStages::FRAGMENT,
                        wgpu::TextureViewDimension::D2,
                    ),
                ],
            });

        let module = ctx.shader_module("Point Light Shader", shaders::POINT_LIGHT_SHADER);
        let layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Point Light Shade Layout"),
                bind_group_layouts: &[&ctx.camera_bgl, &slice_bgl, &gbuffer_bgl],
                push_constant_ranges: &[],
            });

        let stencil = match path {
            VolumePath::StencilCulled => {
                let masked = wgpu::StencilFaceState {
                    compare: wgpu::CompareFunction::NotEqual,
                    fail_op: wgpu::StencilOperation::Keep,
                    depth_fail_op: wgpu::StencilOperation::Keep,
                    pass_op: wgpu::StencilOperation::Keep,
                };
                wgpu::StencilState {
                    front: masked,
                    back: masked,
                    read_mask: 0xFF,
                    write_mask: 0,
                }
            }
            VolumePath::CameraInside => wgpu::StencilState::default(),
        };
        let cull_mode = match path {
            VolumePath::StencilCulled => Some(wgpu::Face::Back),
            VolumePath::CameraInside => Some(wgpu::Face::Front),
        };

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Point Light Shade Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[sphere_vertex_layout()],
                },
                primitive: wgpu::PrimitiveState {
                    cull_mode,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: false,
                    // The fragment shader rejects pixels outside the volume.
                    depth_compare: wgpu::CompareFunction::Always,
                    stencil,
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: HDR_FORMAT,
                        blend: Some(ADDITIVE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        Self {
            io,
            path,
            pipeline,
            slice_bgl,
            gbuffer_bgl,
            sphere: SphereMesh::create(ctx),
        }
    }
}

impl RenderPass for PointLightShadePass {
    fn kind(&self) -> PassKind {
        match self.path {
            VolumePath::StencilCulled => PassKind::PointLightCulled,
            VolumePath::CameraInside => PassKind::PointLightInside,
        }
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
        let normal = &inputs[0];
        let color = &inputs[1];
        let depth = &inputs[2];
        let lighting = &inputs[3];

        let lights = scene.lights();
        let (slice_buffer, count) = match self.path {
            VolumePath::StencilCulled => (&lights.point_slice_buffer, lights.packed.point.count),
            VolumePath::CameraInside => (
                &lights.camera_inside_slice_buffer,
                lights.packed.camera_inside.count,
            ),
        };
        if count == 0 {
            return vec![lighting.clone()];
        }

        let slice_bg = light_slice_bg(ctx, &self.slice_bgl, lights, slice_buffer);
        let gbuffer_bg = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Point Light GBuffer BG"),
            layout: &self.gbuffer_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&color.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&depth.view),
                },
            ],
        });
        let ds_view = depth_stencil_view(depth);

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Point Light Shade Pass"),
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
                // Both aspects read-only: the same texture is sampled in the
                // G-buffer bind group, and only a read-only attachment may
                // share a pass with that usage. The pipeline writes neither
                // depth nor stencil.
                depth_ops: None,
                stencil_ops: None,
            }),
            ..Default::default()
        });

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &ctx.camera_bind_group, &[]);
        rpass.set_bind_group(1, &slice_bg, &[]);
        rpass.set_bind_group(2, &gbuffer_bg, &[]);
        if self.path == VolumePath::StencilCulled {
            rpass.set_stencil_reference(0);
        }
        rpass.set_vertex_buffer(0, self.sphere.vertex_buffer.slice(..));
        rpass.set_index_buffer(self.sphere.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        rpass.draw_indexed(0..self.sphere.index_count, 0, 0..count);
        drop(rpass);

        vec![lighting.clone()]
    }
}
