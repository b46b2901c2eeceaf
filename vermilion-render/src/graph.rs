//! The composer: ordered pass execution over the name-keyed registry.

use crate::context::RenderContext;
use crate::pass::{PassKind, RenderPass};
use crate::resource::{RenderTexture, ResourceRegistry, VramTracker};
use crate::scene::Scene;

/// Owns the registered passes and the texture registry, and runs the frame.
///
/// Registration order is execution order. Use [`crate::plan::build_plan`] to
/// decide that order; the composer itself only enforces the one-pass-per-kind
/// rule and the registry contract.
pub struct Composer {
    passes: Vec<Box<dyn RenderPass>>,
    registry: ResourceRegistry<RenderTexture>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            registry: ResourceRegistry::new(),
        }
    }

    /// Register a pass. A second pass of the same kind is rejected with a
    /// warning; the first registration wins.
    pub fn add_pass(&mut self, pass: Box<dyn RenderPass>) {
        if self.contains(pass.kind()) {
            log::warn!("pass {:?} already registered, ignoring", pass.kind());
            return;
        }
        self.passes.push(pass);
    }

    pub fn contains(&self, kind: PassKind) -> bool {
        self.passes.iter().any(|p| p.kind() == kind)
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// Recreate size-dependent targets on every pass. The registry swaps to
    /// the new allocations as they are republished on the next frame.
    pub fn resize(&mut self, ctx: &RenderContext, width: u32, height: u32) {
        for pass in &mut self.passes {
            pass.resize(ctx, width, height);
        }
        log::info!("composer resized to {}x{}", width, height);
    }

    /// Record all passes in order. Fails if a pass asks for a name nothing
    /// upstream has published, or returns a different number of textures
    /// than its contract declares.
    pub fn render(
        &mut self,
        ctx: &RenderContext,
        encoder: &mut wgpu::CommandEncoder,
        scene: &dyn Scene,
        camera: &crate::Camera,
        surface_view: &wgpu::TextureView,
    ) -> Result<(), String> {
        for pass in &mut self.passes {
            let io = pass.io().clone();

            let mut inputs = Vec::with_capacity(io.inputs.len());
            for name in &io.inputs {
                let texture = self.registry.get(name).cloned().ok_or_else(|| {
                    format!("pass {:?} reads '{name}' but nothing published it", pass.kind())
                })?;
                inputs.push(texture);
            }

            let outputs = pass.render(ctx, encoder, scene, camera, &inputs, surface_view);
            if outputs.len() != io.outputs.len() {
                return Err(format!(
                    "pass {:?} declared {} outputs but returned {}",
                    pass.kind(),
                    io.outputs.len(),
                    outputs.len()
                ));
            }
            for (name, texture) in io.outputs.iter().zip(outputs) {
                self.registry.publish(name, texture);
            }
        }
        Ok(())
    }

    /// Look up a published texture by registry name. Intended for debug
    /// readback; returns `None` for names no pass has published yet.
    pub fn texture(&self, name: &str) -> Option<&RenderTexture> {
        self.registry.get(name)
    }

    pub fn vram(&self) -> &VramTracker {
        self.registry.vram()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass::PassIo;

    struct StubPass {
        kind: PassKind,
        io: PassIo,
    }

    impl RenderPass for StubPass {
        fn kind(&self) -> PassKind {
            self.kind
        }
        fn io(&self) -> &PassIo {
            &self.io
        }
        fn resize(&mut self, _ctx: &RenderContext, _width: u32, _height: u32) {}
        fn render(
            &mut self,
            _ctx: &RenderContext,
            _encoder: &mut wgpu::CommandEncoder,
            _scene: &dyn Scene,
            _camera: &crate::Camera,
            _inputs: &[RenderTexture],
            _surface_view: &wgpu::TextureView,
        ) -> Vec<RenderTexture> {
            Vec::new()
        }
    }

    fn stub(kind: PassKind) -> Box<dyn RenderPass> {
        Box::new(StubPass {
            kind,
            io: PassIo::default(),
        })
    }

    #[test]
    fn texture_lookup_misses_before_any_pass_publishes() {
        let composer = Composer::new();
        assert!(composer.texture(crate::resource::names::LIGHTING).is_none());
    }

    #[test]
    fn duplicate_pass_kind_is_ignored() {
        let mut composer = Composer::new();
        composer.add_pass(stub(PassKind::GBuffer));
        composer.add_pass(stub(PassKind::GBuffer));
        assert_eq!(composer.pass_count(), 1);
    }

    #[test]
    fn distinct_kinds_register_in_order() {
        let mut composer = Composer::new();
        composer.add_pass(stub(PassKind::GBuffer));
        composer.add_pass(stub(PassKind::Blit));
        assert_eq!(composer.pass_count(), 2);
        assert!(composer.contains(PassKind::GBuffer));
        assert!(composer.contains(PassKind::Blit));
        assert!(!composer.contains(PassKind::Taa));
    }
}
