//! The scene contract. The engine never owns geometry; callers draw into
//! the passes' render encoders through these callbacks.

use crate::context::RenderContext;
use crate::lights::LightCollection;
use crate::particles::ParticleSystem;

/// Cubemap set for the skybox and image-based ambient lighting.
pub trait EnvironmentMaps {
    /// Cube view sampled by the skybox pass.
    fn skybox_view(&self) -> &wgpu::TextureView;
    /// Diffuse irradiance cube.
    fn irradiance_view(&self) -> &wgpu::TextureView;
    /// Pre-filtered specular reflectance cube, roughness in the mip chain.
    fn reflectance_view(&self) -> &wgpu::TextureView;
    fn reflectance_mip_count(&self) -> u32;
}

/// Scene geometry and lights, supplied by the caller.
///
/// The draw callbacks receive an already-configured render pass: pipeline
/// set, camera bound at group 0, and (for the geometry passes) the
/// per-object and material groups expected at 1 and 2 per the uniform
/// layouts in `vermilion-gpu-shared`. Implementations bind their own object
/// data and issue draws.
pub trait Scene {
    /// Draw opaque geometry. Used by the G-buffer pass.
    fn render_opaque(&self, rpass: &mut wgpu::RenderPass<'static>, ctx: &RenderContext);

    /// Draw geometry into a depth-only target. Used per shadow cascade; the
    /// active light-space matrix is bound before the callback runs.
    fn render_depth_only(&self, rpass: &mut wgpu::RenderPass<'static>, ctx: &RenderContext);

    /// Draw blended geometry over the lit scene.
    fn render_transparent(&self, rpass: &mut wgpu::RenderPass<'static>, ctx: &RenderContext);

    fn lights(&self) -> &LightCollection;

    /// GPU particle emitters to advance each frame, or `None`. The renderer
    /// dispatches their simulation before any pass records, so the lighting
    /// passes see the updated light slots.
    fn particles(&self) -> Option<&ParticleSystem> {
        None
    }

    /// Environment cubemaps, or `None` for a black sky and no IBL.
    fn environment(&self) -> Option<&dyn EnvironmentMaps>;
}
