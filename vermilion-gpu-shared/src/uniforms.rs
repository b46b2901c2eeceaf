use bytemuck::{Pod, Zeroable};

/// Camera uniform block — bind group 0, binding 0 in every scene pass.
///
/// Written by exactly one owner (the `Camera`) and uploaded at most once per
/// change. `prev_proj_view` is last frame's unjittered matrix, used by the
/// motion-vector and TAA shaders.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct CameraUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub proj_view: [[f32; 4]; 4],
    pub prev_proj_view: [[f32; 4]; 4],
    pub inv_projection: [[f32; 4]; 4],
    pub inv_view: [[f32; 4]; 4],
    pub position: [f32; 4],
    pub viewport: [f32; 2],
    /// Sub-pixel jitter in NDC units, zero when TAA is off.
    pub jitter: [f32; 2],
    pub near: f32,
    pub far: f32,
    pub _pad: [f32; 2],
}

/// Light kind tags, matching `Light` on the CPU side.
pub const LIGHT_KIND_DIRECTIONAL: u32 = 0;
pub const LIGHT_KIND_POINT: u32 = 1;
pub const LIGHT_KIND_CAMERA_FACE_CULLED_POINT: u32 = 2;

/// One packed light in the GPU-resident light array.
///
/// The array is ordered directional first, then point, then
/// camera-face-culled point; the lighting passes index on that order.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct LightRaw {
    pub kind: u32,
    pub intensity: f32,
    pub radius: f32,
    pub _pad: f32,
    pub color: [f32; 4],
    /// World position for point lights, direction toward the light for
    /// directional lights.
    pub position: [f32; 4],
}

/// One shadow cascade slot: light-space matrix plus the cascade far distance.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug)]
pub struct CascadeRaw {
    pub proj_view: [[f32; 4]; 4],
    pub far: f32,
    pub _pad: [f32; 3],
}

/// Number of fitted shadow cascades.
pub const CASCADE_COUNT: usize = 2;
/// Cascade buffer slots: fitted cascades plus one sentinel entry.
pub const CASCADE_SLOTS: usize = CASCADE_COUNT + 1;

/// GPU particle state for light-emitter animation. Mirrored 1:1 into the
/// light array at `light_offset + index` by the simulation shader.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ParticleRaw {
    pub position: [f32; 4],
    pub origin: [f32; 4],
    pub velocity: [f32; 4],
    pub radius: f32,
    pub life: f32,
    pub life_speed: f32,
    pub _pad: f32,
}

/// Particle simulation dispatch parameters.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ParticleSimParams {
    pub delta_time: f32,
    pub elapsed_time: f32,
    pub particle_count: u32,
    /// Index of the first mirrored light in the light array.
    pub light_offset: u32,
}

/// SSAO kernel size (hemisphere samples).
pub const SSAO_KERNEL_SIZE: usize = 32;

/// SSAO parameters.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SsaoParams {
    pub kernel: [[f32; 4]; SSAO_KERNEL_SIZE],
    pub radius: f32,
    pub bias: f32,
    pub strength: f32,
    pub _pad: f32,
}

/// Hi-Z SSR ray march parameters.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct SsrParams {
    pub max_steps: u32,
    pub max_mip: u32,
    /// Non-zero writes missed-intersection debug output into the alpha
    /// channel of the reflection texture.
    pub debug_missed: u32,
    pub _pad: u32,
    pub thickness: f32,
    pub stride: f32,
    pub _pad2: [f32; 2],
}

/// TAA resolve parameters.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct TaaParams {
    /// History blend weight; 1.0 means "use the current frame only"
    /// (first frame after an enable/reset).
    pub current_weight: f32,
    pub _pad: [f32; 3],
}

/// Bloom upsample parameters (one uniform shared across the mip walk).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct BloomParams {
    pub filter_radius: f32,
    pub _pad: [f32; 3],
}

/// Final composite parameters.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct BlitParams {
    /// Fixed mix factor for bloom mip 0; zero when bloom is disabled.
    pub bloom_mix: f32,
    pub _pad: [f32; 3],
}

/// Per-draw parameters for the point-light volume passes: which slice of the
/// light array the instanced sphere draw covers.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct LightSliceParams {
    pub base_index: u32,
    pub count: u32,
    pub _pad: [u32; 2],
}

/// Per-cascade shadow draw uniform (one slot per cascade, dynamic offset).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ShadowDrawUniforms {
    pub proj_view: [[f32; 4]; 4],
}

/// Per-object uniform contract for scene geometry — bind group 1, binding 0
/// in the G-buffer, shadow, and transparent passes. Scenes supply this; the
/// engine only defines the layout.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    /// Last frame's model matrix, for motion vectors.
    pub prev_model: [[f32; 4]; 4],
    pub normal_matrix_col0: [f32; 4],
    pub normal_matrix_col1: [f32; 4],
    pub normal_matrix_col2: [f32; 4],
}

/// Material uniform contract — bind group 2, binding 0 in the G-buffer and
/// transparent passes.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct MaterialUniforms {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub reflectance: f32,
    pub opacity: f32,
}
