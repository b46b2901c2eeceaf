//! Light types, the packed GPU light array, and the point-light volume mesh.
//!
//! The light array has a fixed order the shading passes rely on:
//! directional lights first, then point lights shaded through the stencil
//! mask, then point lights whose volume contains the camera. Each shading
//! pass receives its slice of the array as a `LightSliceParams` uniform.

use glam::Vec3;

use crate::context::RenderContext;
use vermilion_gpu_shared::uniforms::{
    CascadeRaw, LightRaw, LightSliceParams, CASCADE_SLOTS, LIGHT_KIND_CAMERA_FACE_CULLED_POINT,
    LIGHT_KIND_DIRECTIONAL, LIGHT_KIND_POINT,
};

#[derive(Clone, Copy, Debug)]
pub enum Light {
    Directional {
        /// Direction toward the light.
        direction: Vec3,
        color: Vec3,
        intensity: f32,
    },
    Point {
        position: Vec3,
        color: Vec3,
        intensity: f32,
        /// Falloff radius; also the radius of the shaded volume.
        radius: f32,
    },
}

/// A contiguous run of the packed light array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LightSlice {
    pub base: u32,
    pub count: u32,
}

impl LightSlice {
    fn params(self) -> LightSliceParams {
        LightSliceParams {
            base_index: self.base,
            count: self.count,
            _pad: [0; 2],
        }
    }
}

/// The packed array plus the three slices the shading passes consume.
#[derive(Clone, Debug, Default)]
pub struct PackedLights {
    pub raws: Vec<LightRaw>,
    pub directional: LightSlice,
    pub point: LightSlice,
    pub camera_inside: LightSlice,
}

/// True when the camera sits inside (or nearly inside) the light volume, in
/// which case the volume's front faces would be clipped and the stencil
/// count would come out unbalanced. Those lights take the back-face path.
pub fn camera_inside_volume(eye: Vec3, position: Vec3, radius: f32, near: f32) -> bool {
    eye.distance(position) < radius + near * 2.0
}

/// Pack lights into the GPU array order.
pub fn pack_lights(lights: &[Light], eye: Vec3, near: f32) -> PackedLights {
    let mut directional = Vec::new();
    let mut point = Vec::new();
    let mut inside = Vec::new();

    for light in lights {
        match *light {
            Light::Directional {
                direction,
                color,
                intensity,
            } => directional.push(LightRaw {
                kind: LIGHT_KIND_DIRECTIONAL,
                intensity,
                radius: 0.0,
                _pad: 0.0,
                color: color.extend(1.0).to_array(),
                position: direction.normalize_or_zero().extend(0.0).to_array(),
            }),
            Light::Point {
                position,
                color,
                intensity,
                radius,
            } => {
                let raw = LightRaw {
                    kind: LIGHT_KIND_POINT,
                    intensity,
                    radius,
                    _pad: 0.0,
                    color: color.extend(1.0).to_array(),
                    position: position.extend(1.0).to_array(),
                };
                if camera_inside_volume(eye, position, radius, near) {
                    inside.push(LightRaw {
                        kind: LIGHT_KIND_CAMERA_FACE_CULLED_POINT,
                        ..raw
                    });
                } else {
                    point.push(raw);
                }
            }
        }
    }

    let d = directional.len() as u32;
    let p = point.len() as u32;
    let i = inside.len() as u32;

    let mut raws = directional;
    raws.append(&mut point);
    raws.append(&mut inside);

    PackedLights {
        raws,
        directional: LightSlice { base: 0, count: d },
        point: LightSlice { base: d, count: p },
        camera_inside: LightSlice {
            base: d + p,
            count: i,
        },
    }
}

// ============================================================================
// GPU-side collection
// ============================================================================

/// GPU residence for the packed light array, the per-pass slice uniforms,
/// and the shadow cascade matrices.
pub struct LightCollection {
    capacity: u32,
    pub light_buffer: wgpu::Buffer,
    pub cascade_buffer: wgpu::Buffer,
    pub directional_slice_buffer: wgpu::Buffer,
    pub point_slice_buffer: wgpu::Buffer,
    pub camera_inside_slice_buffer: wgpu::Buffer,
    pub packed: PackedLights,
}

impl LightCollection {
    pub fn new(ctx: &RenderContext, capacity: u32) -> Self {
        let light_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Light Array"),
            size: capacity as u64 * std::mem::size_of::<LightRaw>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let cascade_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Shadow Cascades"),
            size: (CASCADE_SLOTS * std::mem::size_of::<CascadeRaw>()) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let slice_buffer = |label| {
            ctx.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: std::mem::size_of::<LightSliceParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        Self {
            capacity,
            light_buffer,
            cascade_buffer,
            directional_slice_buffer: slice_buffer("Directional Light Slice"),
            point_slice_buffer: slice_buffer("Point Light Slice"),
            camera_inside_slice_buffer: slice_buffer("Camera-Inside Light Slice"),
            packed: PackedLights::default(),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Pack and upload this frame's lights. Lights beyond the buffer
    /// capacity are dropped with a warning.
    pub fn update(&mut self, ctx: &RenderContext, lights: &[Light], eye: Vec3, near: f32) {
        let mut packed = pack_lights(lights, eye, near);
        if packed.raws.len() > self.capacity as usize {
            log::warn!(
                "light array overflow: {} lights, capacity {}",
                packed.raws.len(),
                self.capacity
            );
            packed.raws.truncate(self.capacity as usize);
        }

        if !packed.raws.is_empty() {
            ctx.queue
                .write_buffer(&self.light_buffer, 0, bytemuck::cast_slice(&packed.raws));
        }
        ctx.queue.write_buffer(
            &self.directional_slice_buffer,
            0,
            bytemuck::bytes_of(&packed.directional.params()),
        );
        ctx.queue.write_buffer(
            &self.point_slice_buffer,
            0,
            bytemuck::bytes_of(&packed.point.params()),
        );
        ctx.queue.write_buffer(
            &self.camera_inside_slice_buffer,
            0,
            bytemuck::bytes_of(&packed.camera_inside.params()),
        );

        self.packed = packed;
    }

    /// Direction toward the first directional light, if any. The shadow
    /// pass fits its cascades to this.
    pub fn primary_directional(&self) -> Option<Vec3> {
        self.packed
            .raws
            .first()
            .filter(|raw| raw.kind == LIGHT_KIND_DIRECTIONAL)
            .map(|raw| Vec3::new(raw.position[0], raw.position[1], raw.position[2]))
    }
}

// ============================================================================
// Light volume mesh
// ============================================================================

/// Unit UV sphere for instanced light volume draws. Slightly inflated so
/// the faceted mesh still bounds the analytic sphere.
pub fn light_sphere_mesh(segments: u32, rings: u32) -> (Vec<[f32; 3]>, Vec<u32>) {
    use std::f32::consts::PI;

    // Inscribe-compensation: push vertices out so chord midpoints stay on
    // or outside the unit sphere.
    let inflate = 1.0 / (PI / segments.max(3) as f32).cos();

    let mut positions = Vec::new();
    for ring in 0..=rings {
        let theta = PI * ring as f32 / rings as f32;
        let (sin_t, cos_t) = theta.sin_cos();
        for seg in 0..=segments {
            let phi = 2.0 * PI * seg as f32 / segments as f32;
            let (sin_p, cos_p) = phi.sin_cos();
            positions.push([
                inflate * sin_t * cos_p,
                inflate * cos_t,
                inflate * sin_t * sin_p,
            ]);
        }
    }

    let stride = segments + 1;
    let mut indices = Vec::new();
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    (positions, indices)
}

/// The sphere mesh uploaded once and shared by the point-light passes.
pub struct SphereMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

impl SphereMesh {
    pub fn create(ctx: &RenderContext) -> Self {
        use wgpu::util::DeviceExt;

        let (positions, indices) = light_sphere_mesh(16, 12);
        let vertex_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Light Sphere VB"),
                contents: bytemuck::cast_slice(&positions),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Light Sphere IB"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        }
    }
}

// ============================================================================
// Stencil model
// ============================================================================

/// CPU model of the stencil mask write for one light volume along one camera
/// ray: back faces increment on depth-fail, front faces decrement on
/// depth-fail, faces behind the camera are clipped.
///
/// The net count is +1 exactly when the scene point at `scene_depth` lies
/// inside the volume, 0 otherwise, which is the invariant the mask pass
/// depends on.
pub fn stencil_delta(
    light_pos: Vec3,
    radius: f32,
    ray_origin: Vec3,
    ray_dir: Vec3,
    scene_depth: f32,
) -> i32 {
    let dir = ray_dir.normalize_or_zero();
    let oc = ray_origin - light_pos;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let disc = b * b - c;
    if disc <= 0.0 {
        return 0;
    }
    let sqrt_disc = disc.sqrt();
    let t_front = -b - sqrt_disc;
    let t_back = -b + sqrt_disc;

    let mut delta = 0;
    if t_back > 0.0 && scene_depth < t_back {
        delta += 1;
    }
    if t_front > 0.0 && scene_depth < t_front {
        delta -= 1;
    }
    delta
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn point(position: Vec3, radius: f32) -> Light {
        Light::Point {
            position,
            color: Vec3::ONE,
            intensity: 1.0,
            radius,
        }
    }

    #[test]
    fn packing_orders_directional_point_inside() {
        let eye = Vec3::ZERO;
        let lights = [
            point(Vec3::new(0.0, 0.0, -20.0), 2.0),
            Light::Directional {
                direction: Vec3::new(0.3, 1.0, 0.2),
                color: Vec3::ONE,
                intensity: 3.0,
            },
            point(Vec3::new(0.1, 0.0, 0.0), 5.0), // contains the camera
            point(Vec3::new(10.0, 0.0, 0.0), 1.0),
        ];
        let packed = pack_lights(&lights, eye, 0.1);

        assert_eq!(packed.directional, LightSlice { base: 0, count: 1 });
        assert_eq!(packed.point, LightSlice { base: 1, count: 2 });
        assert_eq!(packed.camera_inside, LightSlice { base: 3, count: 1 });

        assert_eq!(packed.raws[0].kind, LIGHT_KIND_DIRECTIONAL);
        assert_eq!(packed.raws[1].kind, LIGHT_KIND_POINT);
        assert_eq!(packed.raws[2].kind, LIGHT_KIND_POINT);
        assert_eq!(packed.raws[3].kind, LIGHT_KIND_CAMERA_FACE_CULLED_POINT);
    }

    #[test]
    fn directional_direction_is_normalized() {
        let packed = pack_lights(
            &[Light::Directional {
                direction: Vec3::new(0.0, 10.0, 0.0),
                color: Vec3::ONE,
                intensity: 1.0,
            }],
            Vec3::ZERO,
            0.1,
        );
        assert!((packed.raws[0].position[1] - 1.0).abs() < 1e-6);
        assert_eq!(packed.raws[0].position[3], 0.0);
    }

    #[test]
    fn near_plane_margin_reclassifies_boundary_lights() {
        let eye = Vec3::ZERO;
        // Camera just outside the sphere, but within the near-plane margin.
        assert!(camera_inside_volume(eye, Vec3::new(5.05, 0.0, 0.0), 5.0, 0.1));
        assert!(!camera_inside_volume(eye, Vec3::new(5.5, 0.0, 0.0), 5.0, 0.1));
    }

    #[test]
    fn sphere_mesh_bounds_the_unit_sphere() {
        let (positions, indices) = light_sphere_mesh(16, 12);
        assert_eq!(positions.len(), 17 * 13);
        assert_eq!(indices.len() as u32, 16 * 12 * 6);
        for p in &positions {
            let len = Vec3::from_array(*p).length();
            assert!((1.0..=1.05).contains(&len), "vertex length {len}");
        }
        for &i in &indices {
            assert!((i as usize) < positions.len());
        }
    }

    #[test]
    fn stencil_delta_marks_only_points_inside_the_volume() {
        let light = Vec3::new(0.0, 0.0, -10.0);
        let origin = Vec3::ZERO;
        let dir = Vec3::new(0.0, 0.0, -1.0);

        // Scene point in front of, inside, and behind the sphere.
        assert_eq!(stencil_delta(light, 2.0, origin, dir, 5.0), 0);
        assert_eq!(stencil_delta(light, 2.0, origin, dir, 10.0), 1);
        assert_eq!(stencil_delta(light, 2.0, origin, dir, 15.0), 0);
    }

    #[test]
    fn stencil_delta_ray_missing_the_volume_is_zero() {
        let light = Vec3::new(50.0, 0.0, -10.0);
        assert_eq!(
            stencil_delta(light, 2.0, Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), 10.0),
            0
        );
    }

    #[test]
    fn stencil_delta_with_camera_inside_counts_the_back_face() {
        let light = Vec3::new(0.0, 0.0, -1.0);
        let dir = Vec3::new(0.0, 0.0, -1.0);
        // Camera inside a radius-5 sphere: front face clipped.
        assert_eq!(stencil_delta(light, 5.0, Vec3::ZERO, dir, 2.0), 1);
        assert_eq!(stencil_delta(light, 5.0, Vec3::ZERO, dir, 20.0), 0);
    }
}
