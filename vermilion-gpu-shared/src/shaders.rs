/// Embedded WGSL shader sources for the deferred pipeline.
/// Fullscreen passes share `FULLSCREEN_VERT` and supply only a fragment stage.

pub const FULLSCREEN_VERT: &str = include_str!("../shaders/fullscreen.wgsl");
pub const GBUFFER_SHADER: &str = include_str!("../shaders/gbuffer.wgsl");
pub const SHADOW_DEPTH_VERT: &str = include_str!("../shaders/shadow_depth.wgsl");
pub const SSAO_FRAG: &str = include_str!("../shaders/ssao.wgsl");
pub const SSAO_BLUR_FRAG: &str = include_str!("../shaders/ssao_blur.wgsl");
pub const LIGHTING_FRAG: &str = include_str!("../shaders/lighting.wgsl");
pub const POINT_LIGHT_MASK_VERT: &str = include_str!("../shaders/point_light_mask.wgsl");
pub const POINT_LIGHT_SHADER: &str = include_str!("../shaders/point_light.wgsl");
pub const TRANSPARENT_SHADER: &str = include_str!("../shaders/transparent.wgsl");
pub const SKYBOX_SHADER: &str = include_str!("../shaders/skybox.wgsl");
pub const HIZ_COPY_COMPUTE: &str = include_str!("../shaders/hiz_copy.wgsl");
pub const HIZ_DOWNSAMPLE_COMPUTE: &str = include_str!("../shaders/hiz_downsample.wgsl");
pub const SSR_COMPUTE: &str = include_str!("../shaders/ssr.wgsl");
pub const TAA_RESOLVE_FRAG: &str = include_str!("../shaders/taa_resolve.wgsl");
pub const BLOOM_DOWNSAMPLE_FRAG: &str = include_str!("../shaders/bloom_downsample.wgsl");
pub const BLOOM_UPSAMPLE_FRAG: &str = include_str!("../shaders/bloom_upsample.wgsl");
pub const BLIT_FRAG: &str = include_str!("../shaders/blit.wgsl");
pub const PARTICLE_SIM_COMPUTE: &str = include_str!("../shaders/particle_sim.wgsl");
