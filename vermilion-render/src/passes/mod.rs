//! Render pass implementations for the deferred pipeline.

pub mod blit;
pub mod bloom;
pub mod gbuffer;
pub mod hiz;
pub mod lighting;
pub mod point_lights;
pub mod shadow;
pub mod skybox;
pub mod ssao;
pub mod ssr;
pub mod taa;
pub mod transparent;

use crate::context::RenderContext;
use crate::pass::{PassKind, RenderPass};
use crate::plan::PlannedPass;

/// Instantiate the GPU pass for one planned node.
pub fn create_pass(
    ctx: &RenderContext,
    planned: &PlannedPass,
    width: u32,
    height: u32,
    surface_format: wgpu::TextureFormat,
) -> Box<dyn RenderPass> {
    let io = planned.io.clone();
    match planned.kind {
        PassKind::GBuffer => Box::new(gbuffer::GBufferPass::new(ctx, io, width, height)),
        PassKind::CascadedShadow => Box::new(shadow::CascadedShadowPass::new(ctx, io)),
        PassKind::Ssao => Box::new(ssao::SsaoPass::new(ctx, io, width, height)),
        PassKind::DirectionalAmbient => {
            Box::new(lighting::DirectionalAmbientPass::new(ctx, io, width, height))
        }
        PassKind::PointLightMask => Box::new(point_lights::PointLightMaskPass::new(ctx, io)),
        PassKind::PointLightCulled => Box::new(point_lights::PointLightShadePass::new(
            ctx,
            io,
            point_lights::VolumePath::StencilCulled,
        )),
        PassKind::PointLightInside => Box::new(point_lights::PointLightShadePass::new(
            ctx,
            io,
            point_lights::VolumePath::CameraInside,
        )),
        PassKind::Skybox => Box::new(skybox::SkyboxPass::new(ctx, io)),
        PassKind::Transparent => Box::new(transparent::TransparentPass::new(ctx, io)),
        PassKind::HiZ => Box::new(hiz::HiZPass::new(ctx, io, width, height)),
        PassKind::Ssr => Box::new(ssr::SsrPass::new(ctx, io, width, height)),
        PassKind::Taa => Box::new(taa::TaaPass::new(ctx, io, width, height)),
        PassKind::Bloom => Box::new(bloom::BloomPass::new(ctx, io, width, height)),
        PassKind::Blit => Box::new(blit::BlitPass::new(ctx, io, surface_format)),
    }
}
