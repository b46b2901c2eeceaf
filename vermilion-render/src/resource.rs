//! Render target creation and the name-keyed resource registry.
//!
//! Passes hand their outputs to the [`ResourceRegistry`] under well-known
//! names; downstream passes look them up by the same names. The registry
//! doubles as the VRAM ledger: publishing a new texture under a name that
//! already holds a different texture releases the old one's bytes.

use std::collections::HashMap;

/// HDR color format used throughout the pipeline.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Color+reflectance G-buffer format. Base color is LDR; reflectance rides
/// in the alpha channel.
pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Bgra8Unorm;
/// Scene depth format. Carries a stencil aspect for the point-light volume
/// mask pass.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
/// Shadow map depth format (no stencil, sampled with a comparison sampler).
pub const SHADOW_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Single-channel float format (SSAO).
pub const R16_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
/// Two-channel float format (velocity buffer).
pub const RG16_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;
/// Hi-Z pyramid format (storage-writable single-channel float).
pub const HIZ_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Well-known registry names. Passes refer to textures exclusively through
/// these, which is what lets the composer rewire the graph per feature
/// selection without the passes knowing about each other.
pub mod names {
    pub const NORMAL: &str = "normal texture";
    pub const COLOR_REFLECTANCE: &str = "color reflectance texture";
    pub const VELOCITY: &str = "velocity texture";
    pub const DEPTH: &str = "depth texture";
    pub const SHADOW_DEPTH: &str = "shadow depth texture";
    pub const SSAO: &str = "ssao texture";
    pub const SSAO_BLUR: &str = "ssao blurred texture";
    pub const LIGHTING: &str = "lighting texture";
    pub const HIZ_DEPTH: &str = "hi-z depth texture";
    pub const REFLECTION: &str = "reflection texture";
    pub const TAA_RESOLVE: &str = "taa resolve texture";
    pub const BLOOM: &str = "bloom texture";
}

/// Anything the registry can track: identity plus byte cost.
pub trait ResourceHandle {
    /// Process-unique id; two handles with the same id are the same
    /// allocation.
    fn id(&self) -> u64;
    fn bytes(&self) -> u64;
}

/// A GPU texture with its default view and accounting metadata. Cloning is
/// cheap (wgpu resources are reference-counted); all clones share one id.
#[derive(Clone)]
pub struct RenderTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub id: u64,
    pub bytes: u64,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

impl RenderTexture {
    /// Create a 2D texture with the given mip count and register its byte
    /// cost against the context's id counter.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        ctx: &crate::RenderContext,
        label: &str,
        width: u32,
        height: u32,
        layers: u32,
        mip_level_count: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: layers,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bytes = texture_byte_size(
            width,
            height,
            layers,
            mip_level_count,
            bytes_per_pixel(format),
        );
        Self {
            texture,
            view,
            id: ctx.alloc_resource_id(),
            bytes,
            width,
            height,
            format,
        }
    }

    /// Same allocation, different view (mip slice, array layer, aspect).
    /// The clone keeps the original id so the registry treats it as a
    /// republish, not a replacement.
    pub fn with_view(&self, view: wgpu::TextureView) -> Self {
        let mut clone = self.clone();
        clone.view = view;
        clone
    }
}

impl ResourceHandle for RenderTexture {
    fn id(&self) -> u64 {
        self.id
    }
    fn bytes(&self) -> u64 {
        self.bytes
    }
}

/// Bytes per texel for the formats the pipeline allocates.
pub fn bytes_per_pixel(format: wgpu::TextureFormat) -> u64 {
    match format {
        wgpu::TextureFormat::Rgba16Float => 8,
        wgpu::TextureFormat::Rg16Float => 4,
        wgpu::TextureFormat::R16Float => 2,
        wgpu::TextureFormat::R32Float => 4,
        wgpu::TextureFormat::Rgba8Unorm
        | wgpu::TextureFormat::Rgba8UnormSrgb
        | wgpu::TextureFormat::Bgra8Unorm => 4,
        wgpu::TextureFormat::Depth32Float => 4,
        wgpu::TextureFormat::Depth24PlusStencil8 => 4,
        other => other
            .block_copy_size(None)
            .map(u64::from)
            .unwrap_or(4),
    }
}

/// Total byte size of a 2D array texture across its mip chain.
pub fn texture_byte_size(
    width: u32,
    height: u32,
    layers: u32,
    mip_level_count: u32,
    bytes_per_pixel: u64,
) -> u64 {
    (0..mip_level_count)
        .map(|mip| {
            let w = (width >> mip).max(1) as u64;
            let h = (height >> mip).max(1) as u64;
            w * h * layers as u64 * bytes_per_pixel
        })
        .sum()
}

/// Running VRAM total for registry-tracked textures.
#[derive(Default, Debug)]
pub struct VramTracker {
    current: u64,
    peak: u64,
}

impl VramTracker {
    pub fn add(&mut self, bytes: u64) {
        self.current += bytes;
        self.peak = self.peak.max(self.current);
    }

    pub fn release(&mut self, bytes: u64) {
        self.current = self.current.saturating_sub(bytes);
    }

    pub fn current(&self) -> u64 {
        self.current
    }

    pub fn peak(&self) -> u64 {
        self.peak
    }
}

/// Name-keyed store for pass outputs.
///
/// Generic over the handle type so the accounting rules can be tested
/// without a GPU device.
pub struct ResourceRegistry<H: ResourceHandle> {
    entries: HashMap<String, H>,
    vram: VramTracker,
}

impl<H: ResourceHandle> Default for ResourceRegistry<H> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            vram: VramTracker::default(),
        }
    }
}

impl<H: ResourceHandle> ResourceRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a handle under `name`. Re-publishing the same allocation
    /// (same id) is free; replacing it with a new allocation releases the
    /// old bytes and charges the new ones.
    pub fn publish(&mut self, name: &str, handle: H) {
        match self.entries.get(name) {
            Some(old) if old.id() == handle.id() => {
                self.entries.insert(name.to_owned(), handle);
            }
            Some(old) => {
                self.vram.release(old.bytes());
                self.vram.add(handle.bytes());
                self.entries.insert(name.to_owned(), handle);
            }
            None => {
                self.vram.add(handle.bytes());
                self.entries.insert(name.to_owned(), handle);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&H> {
        self.entries.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<H> {
        let removed = self.entries.remove(name);
        if let Some(ref handle) = removed {
            self.vram.release(handle.bytes());
        }
        removed
    }

    pub fn vram(&self) -> &VramTracker {
        &self.vram
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct MockHandle {
        id: u64,
        bytes: u64,
    }

    impl ResourceHandle for MockHandle {
        fn id(&self) -> u64 {
            self.id
        }
        fn bytes(&self) -> u64 {
            self.bytes
        }
    }

    #[test]
    fn albedo_target_is_a_four_byte_unorm() {
        assert_eq!(ALBEDO_FORMAT, wgpu::TextureFormat::Bgra8Unorm);
        assert_eq!(bytes_per_pixel(ALBEDO_FORMAT), 4);
    }

    #[test]
    fn byte_size_single_mip() {
        // 1920x1080 RGBA16F
        assert_eq!(texture_byte_size(1920, 1080, 1, 1, 8), 1920 * 1080 * 8);
    }

    #[test]
    fn byte_size_full_chain_is_under_four_thirds() {
        let base = 1024 * 1024 * 4u64;
        let total = texture_byte_size(1024, 1024, 1, 11, 4);
        assert!(total > base);
        assert!(total < base * 4 / 3 + 4);
    }

    #[test]
    fn byte_size_counts_array_layers() {
        assert_eq!(
            texture_byte_size(2048, 2048, 3, 1, 4),
            2048 * 2048 * 3 * 4
        );
    }

    #[test]
    fn publish_charges_once_per_allocation() {
        let mut reg: ResourceRegistry<MockHandle> = ResourceRegistry::new();
        reg.publish("a", MockHandle { id: 1, bytes: 100 });
        assert_eq!(reg.vram().current(), 100);

        // Same allocation republished every frame: no change.
        for _ in 0..3 {
            reg.publish("a", MockHandle { id: 1, bytes: 100 });
        }
        assert_eq!(reg.vram().current(), 100);
    }

    #[test]
    fn replacing_an_allocation_swaps_its_bytes() {
        let mut reg: ResourceRegistry<MockHandle> = ResourceRegistry::new();
        reg.publish("a", MockHandle { id: 1, bytes: 100 });
        reg.publish("a", MockHandle { id: 2, bytes: 250 });
        assert_eq!(reg.vram().current(), 250);
        assert_eq!(reg.vram().peak(), 250);
    }

    #[test]
    fn resize_round_trip_is_net_zero() {
        let mut reg: ResourceRegistry<MockHandle> = ResourceRegistry::new();
        reg.publish("a", MockHandle { id: 1, bytes: 100 });
        reg.publish("b", MockHandle { id: 2, bytes: 200 });
        let before = reg.vram().current();

        // Resize: every name gets a fresh allocation of the same size.
        reg.publish("a", MockHandle { id: 3, bytes: 100 });
        reg.publish("b", MockHandle { id: 4, bytes: 200 });
        assert_eq!(reg.vram().current(), before);
    }

    #[test]
    fn remove_releases_bytes() {
        let mut reg: ResourceRegistry<MockHandle> = ResourceRegistry::new();
        reg.publish("a", MockHandle { id: 1, bytes: 100 });
        reg.remove("a");
        assert_eq!(reg.vram().current(), 0);
        assert_eq!(reg.vram().peak(), 100);
    }
}
