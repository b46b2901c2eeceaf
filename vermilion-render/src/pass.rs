//! The render pass contract.

use crate::camera::Camera;
use crate::context::RenderContext;
use crate::resource::RenderTexture;
use crate::scene::Scene;

/// Every pass the composer knows how to schedule. At most one pass of each
/// kind may be registered.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PassKind {
    GBuffer,
    CascadedShadow,
    Ssao,
    DirectionalAmbient,
    PointLightMask,
    PointLightCulled,
    PointLightInside,
    Skybox,
    Transparent,
    HiZ,
    Ssr,
    Taa,
    Bloom,
    Blit,
}

/// A pass's registry contract: the names it reads and the names it writes.
///
/// Inputs are resolved in declaration order and handed to
/// [`RenderPass::render`] in the same order; outputs are published in
/// declaration order from the returned textures.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PassIo {
    pub inputs: Vec<&'static str>,
    pub outputs: Vec<&'static str>,
}

impl PassIo {
    pub fn new(inputs: Vec<&'static str>, outputs: Vec<&'static str>) -> Self {
        Self { inputs, outputs }
    }
}

/// One node of the deferred pipeline.
///
/// Passes own their render targets and pipelines, communicate only through
/// the registry names in their [`PassIo`], and draw scene geometry through
/// the [`Scene`] callbacks rather than holding meshes themselves.
pub trait RenderPass {
    fn kind(&self) -> PassKind;

    fn io(&self) -> &PassIo;

    /// Recreate size-dependent targets. Called by the composer on every
    /// registered pass when the swapchain size changes.
    fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32);

    /// Record this pass into `encoder`. `inputs` matches `io().inputs`
    /// one-to-one; the returned textures are published under `io().outputs`
    /// in order. `surface_view` is the swapchain target, only drawn to by
    /// the final blit.
    #[allow(clippy::too_many_arguments)]
    fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &dyn Scene,
        camera: &Camera,
        inputs: &[RenderTexture],
        surface_view: &wgpu::TextureView,
    ) -> Vec<RenderTexture>;
}
