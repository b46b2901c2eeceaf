//! Cascaded shadow maps for the primary directional light.
//!
//! Two cascades are fitted to the camera frustum each frame and rendered
//! into layers of one depth array texture. The cascade matrices and split
//! distances are written to the shared cascade uniform so the lighting pass
//! can select and sample the right layer.

use glam::{Mat4, Vec3};

use crate::camera::Camera;
use crate::context::RenderContext;
use crate::pass::{PassIo, PassKind, RenderPass};
use crate::resource::{RenderTexture, SHADOW_FORMAT};
use crate::scene::Scene;
use vermilion_gpu_shared::shaders;
use vermilion_gpu_shared::uniforms::{CascadeRaw, ShadowDrawUniforms, CASCADE_COUNT, CASCADE_SLOTS};

/// Shadow map resolution per cascade layer.
pub const SHADOW_RESOLUTION: u32 = 2048;
/// Shadowing stops past this view distance; cascades only cover up to here.
pub const SHADOW_DISTANCE: f32 = 80.0;
/// First cascade starts just in front of the eye regardless of the camera
/// near plane, so close-up geometry is never unshadowed.
pub const CASCADE_NEAR: f32 = 0.05;
/// How far the light frustum is pulled back along the light direction to
/// catch casters behind the visible slice.
const CASTER_PULLBACK: f32 = 20.0;

/// Dynamic-offset stride for the per-cascade draw uniform.
const DRAW_UNIFORM_STRIDE: u64 = 256;

/// Split the `[near, far]` range into cascade boundaries using the
/// practical split scheme: `lambda` blends uniform (0.0) and logarithmic
/// (1.0) splits. Returns `count + 1` boundaries starting at `near`.
pub fn cascade_splits(near: f32, far: f32, count: usize, lambda: f32) -> Vec<f32> {
    let mut splits = Vec::with_capacity(count + 1);
    splits.push(near);
    for i in 1..count {
        let t = i as f32 / count as f32;
        let uniform = near + (far - near) * t;
        let log = near * (far / near).powf(t);
        splits.push(uniform + (log - uniform) * lambda);
    }
    splits.push(far);
    splits
}

/// Fit an orthographic light frustum around a camera sub-frustum.
///
/// Returns the light-space projection-view matrix: every corner projects
/// into the unit clip box, with slack behind the near plane for casters
/// outside the visible slice.
pub fn fit_cascade(corners: &[Vec3; 8], light_dir: Vec3) -> Mat4 {
    let dir = light_dir.normalize_or_zero();
    let dir = if dir == Vec3::ZERO { Vec3::Y } else { dir };

    let center = corners.iter().copied().sum::<Vec3>() / corners.len() as f32;
    // Up reference must not be parallel to the light direction.
    let up = if dir.cross(Vec3::Y).length_squared() < 1e-6 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_at_rh(center + dir, center, up);

    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for corner in corners {
        let v = view.transform_point3(*corner);
        min = min.min(v);
        max = max.max(v);
    }
    // Degenerate extents still need a valid projection.
    if max.x - min.x < 1e-3 {
        max.x = min.x + 1e-3;
    }
    if max.y - min.y < 1e-3 {
        max.y = min.y + 1e-3;
    }

    let near = -max.z - CASTER_PULLBACK;
    let far = -min.z + 1.0;
    let projection = Mat4::orthographic_rh(min.x, max.x, min.y, max.y, near, far);
    projection * view
}

pub struct CascadedShadowPass {
    io: PassIo,
    pipeline: wgpu::RenderPipeline,
    shadow_map: RenderTexture,
    layer_views: Vec<wgpu::TextureView>,
    draw_uniform_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
}

impl CascadedShadowPass {
    pub fn new(ctx: &RenderContext, io: PassIo) -> Self {
        let shadow_map = RenderTexture::create(
            ctx,
            "Shadow Map Array",
            SHADOW_RESOLUTION,
            SHADOW_RESOLUTION,
            CASCADE_SLOTS as u32,
            1,
            SHADOW_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        // The published handle carries the array view the lighting pass
        // samples; rendering attaches per-layer views.
        let shadow_map = shadow_map.with_view(shadow_map.texture.create_view(
            &wgpu::TextureViewDescriptor {
                label: Some("Shadow Map Array View"),
                dimension: Some(wgpu::TextureViewDimension::D2Array),
                ..Default::default()
            },
        ));
        let layer_views = (0..CASCADE_COUNT as u32)
            .map(|layer| {
                shadow_map.texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Shadow Cascade Layer"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let draw_uniform_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Draw Uniforms"),
            size: CASCADE_COUNT as u64 * DRAW_UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let draw_bgl = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Shadow Draw BGL"),
                entries: &[crate::pipeline::dynamic_uniform_entry(
                    0,
                    wgpu::ShaderStages::VERTEX,
                )],
            });
        let draw_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shadow Draw BG"),
            layout: &draw_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &draw_uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(
                        std::mem::size_of::<ShadowDrawUniforms>() as u64
                    ),
                }),
            }],
        });

        let module = ctx.shader_module("Shadow Depth Shader", shaders::SHADOW_DEPTH_VERT);
        let layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Shadow Pipeline Layout"),
                bind_group_layouts: &[&draw_bgl, &ctx.object_bgl],
                push_constant_ranges: &[],
            });
        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Shadow Pipeline"),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: 12,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &wgpu::vertex_attr_array![0 => Float32x3],
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    // Front-face culling trades peter-panning for less acne.
                    cull_mode: Some(wgpu::Face::Front),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: SHADOW_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState {
                        constant: 2,
                        slope_scale: 2.0,
                        clamp: 0.0,
                    },
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: None,
                multiview: None,
                cache: None,
            });

        Self {
            io,
            pipeline,
            shadow_map,
            layer_views,
            draw_uniform_buffer,
            draw_bind_group,
        }
    }
}

impl RenderPass for CascadedShadowPass {
    fn kind(&self) -> PassKind {
        PassKind::CascadedShadow
    }

    fn io(&self) -> &PassIo {
        &self.io
    }

    fn resize(&mut self, _ctx: &RenderContext, _width: u32, _height: u32) {
        // Shadow resolution is independent of the swapchain.
    }

    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &dyn Scene,
        camera: &Camera,
        _inputs: &[RenderTexture],
        _surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture> {
        let lights = scene.lights();
        let light_dir = lights.primary_directional();

        let shadow_far = camera.far.min(SHADOW_DISTANCE);
        let splits = cascade_splits(CASCADE_NEAR, shadow_far, CASCADE_COUNT, 0.7);

        let mut cascades = [CascadeRaw {
            proj_view: Mat4::IDENTITY.to_cols_array_2d(),
            far: f32::MAX,
            _pad: [0.0; 3],
        }; CASCADE_SLOTS];

        for i in 0..CASCADE_COUNT {
            let matrix = match light_dir {
                Some(dir) => {
                    let corners = camera.frustum_corners_world(splits[i], splits[i + 1]);
                    fit_cascade(&corners, dir)
                }
                None => Mat4::IDENTITY,
            };
            cascades[i] = CascadeRaw {
                proj_view: matrix.to_cols_array_2d(),
                far: splits[i + 1],
                _pad: [0.0; 3],
            };

            let draw = ShadowDrawUniforms {
                proj_view: matrix.to_cols_array_2d(),
            };
            ctx.queue.write_buffer(
                &self.draw_uniform_buffer,
                i as u64 * DRAW_UNIFORM_STRIDE,
                bytemuck::bytes_of(&draw),
            );
        }
        ctx.queue
            .write_buffer(&lights.cascade_buffer, 0, bytemuck::cast_slice(&cascades));

        for (i, layer_view) in self.layer_views.iter().enumerate() {
            let mut rpass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Shadow Cascade Pass"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: layer_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    ..Default::default()
                })
                .forget_lifetime();

            if light_dir.is_some() {
                rpass.set_pipeline(&self.pipeline);
                rpass.set_bind_group(
                    0,
                    &self.draw_bind_group,
                    &[(i as u64 * DRAW_UNIFORM_STRIDE) as u32],
                );
                scene.render_depth_only(&mut rpass, ctx);
            }
        }

        vec![self.shadow_map.clone()]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_are_monotonic_and_bounded() {
        let splits = cascade_splits(0.05, 80.0, CASCADE_COUNT, 0.7);
        assert_eq!(splits.len(), CASCADE_COUNT + 1);
        assert_eq!(splits[0], 0.05);
        assert_eq!(*splits.last().unwrap(), 80.0);
        for pair in splits.windows(2) {
            assert!(pair[0] < pair[1], "{splits:?}");
        }
    }

    #[test]
    fn log_bias_pulls_splits_toward_the_camera() {
        let uniform = cascade_splits(0.1, 100.0, 4, 0.0);
        let practical = cascade_splits(0.1, 100.0, 4, 0.8);
        for i in 1..4 {
            assert!(practical[i] < uniform[i]);
        }
    }

    fn assert_corners_contained(corners: &[Vec3; 8], matrix: Mat4) {
        for corner in corners {
            let clip = matrix * corner.extend(1.0);
            let ndc = clip / clip.w;
            assert!(ndc.x.abs() <= 1.0 + 1e-3, "{ndc}");
            assert!(ndc.y.abs() <= 1.0 + 1e-3, "{ndc}");
            assert!(ndc.z >= -1e-3 && ndc.z <= 1.0 + 1e-3, "{ndc}");
        }
    }

    #[test]
    fn fitted_cascade_contains_the_frustum_slice() {
        let camera = Camera::new(1920, 1080);
        let corners = camera.frustum_corners_world(0.05, 20.0);
        let matrix = fit_cascade(&corners, Vec3::new(0.4, 1.0, 0.3));
        assert_corners_contained(&corners, matrix);
    }

    #[test]
    fn vertical_light_direction_uses_the_fallback_up() {
        let camera = Camera::new(800, 600);
        let corners = camera.frustum_corners_world(0.05, 40.0);
        let matrix = fit_cascade(&corners, Vec3::Y);
        assert!(matrix.is_finite());
        assert_corners_contained(&corners, matrix);
    }

    #[test]
    fn zero_light_direction_does_not_produce_nan() {
        let camera = Camera::new(800, 600);
        let corners = camera.frustum_corners_world(0.05, 40.0);
        let matrix = fit_cascade(&corners, Vec3::ZERO);
        assert!(matrix.is_finite());
    }

    #[test]
    fn degenerate_slice_still_projects() {
        // All corners at one point.
        let corners = [Vec3::new(1.0, 2.0, 3.0); 8];
        let matrix = fit_cascade(&corners, Vec3::new(0.0, 1.0, 0.1));
        assert!(matrix.is_finite());
    }
}
