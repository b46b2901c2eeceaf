//! Shared GPU context handed to every pass: device, queue, the camera
//! uniform (group 0 everywhere), and small caches for shader modules and
//! samplers so passes can ask for them by name instead of threading them
//! through constructors.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::Instant;

use vermilion_gpu_shared::uniforms::CameraUniforms;

/// Wall-clock frame timing, advanced once per presented frame.
struct FrameClock {
    started: Instant,
    last: Cell<Instant>,
    elapsed: Cell<f32>,
    delta: Cell<f32>,
}

impl FrameClock {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            started: now,
            last: Cell::new(now),
            elapsed: Cell::new(0.0),
            delta: Cell::new(0.0),
        }
    }

    fn tick(&self) {
        let now = Instant::now();
        self.delta.set(now.duration_since(self.last.get()).as_secs_f32());
        self.elapsed.set(now.duration_since(self.started).as_secs_f32());
        self.last.set(now);
    }
}

/// Samplers shared across passes, keyed by behavior.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SamplerKind {
    LinearClamp,
    NearestClamp,
    LinearRepeat,
    /// Comparison sampler for shadow map PCF (LessEqual).
    ShadowCompare,
}

pub struct RenderContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,

    /// Camera uniform buffer, bound as group 0 binding 0 in every pass that
    /// reads the camera. Written once per frame by [`crate::Camera`].
    pub camera_buffer: wgpu::Buffer,
    pub camera_bgl: wgpu::BindGroupLayout,
    pub camera_bind_group: wgpu::BindGroup,

    /// Per-object uniform layout, group 1 in the geometry passes. Scenes
    /// create their bind groups against this.
    pub object_bgl: wgpu::BindGroupLayout,
    /// Material uniform layout, group 2 in the geometry passes.
    pub material_bgl: wgpu::BindGroupLayout,

    frame_index: Cell<u64>,
    clock: FrameClock,
    next_resource_id: Cell<u64>,
    shader_modules: RefCell<HashMap<&'static str, wgpu::ShaderModule>>,
    samplers: RefCell<HashMap<SamplerKind, wgpu::Sampler>>,
}

impl RenderContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniforms"),
            size: std::mem::size_of::<CameraUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let camera_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX
                    | wgpu::ShaderStages::FRAGMENT
                    | wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera BG"),
            layout: &camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let object_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Object BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let material_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        Self {
            device,
            queue,
            camera_buffer,
            camera_bgl,
            camera_bind_group,
            object_bgl,
            material_bgl,
            frame_index: Cell::new(0),
            clock: FrameClock::new(),
            next_resource_id: Cell::new(1),
            shader_modules: RefCell::new(HashMap::new()),
            samplers: RefCell::new(HashMap::new()),
        }
    }

    /// Monotonic frame counter, advanced once per presented frame.
    pub fn frame_index(&self) -> u64 {
        self.frame_index.get()
    }

    pub fn advance_frame(&self) {
        self.frame_index.set(self.frame_index.get() + 1);
        self.clock.tick();
    }

    /// Seconds since the context was created.
    pub fn elapsed(&self) -> f32 {
        self.clock.elapsed.get()
    }

    /// Seconds between the last two frame advances. Zero until the first
    /// frame completes, so time-driven work sits still on frame one.
    pub fn delta(&self) -> f32 {
        self.clock.delta.get()
    }

    /// Allocate a process-unique id for a GPU resource. Ids are never reused,
    /// so the resource registry can tell a republished texture from a
    /// replacement by comparing ids.
    pub fn alloc_resource_id(&self) -> u64 {
        let id = self.next_resource_id.get();
        self.next_resource_id.set(id + 1);
        id
    }

    /// Get or compile a shader module. Keyed by label, so the same WGSL
    /// source shared by several passes is compiled once.
    pub fn shader_module(&self, label: &'static str, source: &str) -> wgpu::ShaderModule {
        let mut cache = self.shader_modules.borrow_mut();
        cache
            .entry(label)
            .or_insert_with(|| {
                self.device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some(label),
                        source: wgpu::ShaderSource::Wgsl(source.into()),
                    })
            })
            .clone()
    }

    /// Get or create one of the shared samplers.
    pub fn sampler(&self, kind: SamplerKind) -> wgpu::Sampler {
        let mut cache = self.samplers.borrow_mut();
        cache
            .entry(kind)
            .or_insert_with(|| {
                let desc = match kind {
                    SamplerKind::LinearClamp => wgpu::SamplerDescriptor {
                        label: Some("Linear Clamp Sampler"),
                        address_mode_u: wgpu::AddressMode::ClampToEdge,
                        address_mode_v: wgpu::AddressMode::ClampToEdge,
                        address_mode_w: wgpu::AddressMode::ClampToEdge,
                        mag_filter: wgpu::FilterMode::Linear,
                        min_filter: wgpu::FilterMode::Linear,
                        mipmap_filter: wgpu::FilterMode::Linear,
                        ..Default::default()
                    },
                    SamplerKind::NearestClamp => wgpu::SamplerDescriptor {
                        label: Some("Nearest Clamp Sampler"),
                        address_mode_u: wgpu::AddressMode::ClampToEdge,
                        address_mode_v: wgpu::AddressMode::ClampToEdge,
                        address_mode_w: wgpu::AddressMode::ClampToEdge,
                        mag_filter: wgpu::FilterMode::Nearest,
                        min_filter: wgpu::FilterMode::Nearest,
                        mipmap_filter: wgpu::FilterMode::Nearest,
                        ..Default::default()
                    },
                    SamplerKind::LinearRepeat => wgpu::SamplerDescriptor {
                        label: Some("Linear Repeat Sampler"),
                        address_mode_u: wgpu::AddressMode::Repeat,
                        address_mode_v: wgpu::AddressMode::Repeat,
                        address_mode_w: wgpu::AddressMode::Repeat,
                        mag_filter: wgpu::FilterMode::Linear,
                        min_filter: wgpu::FilterMode::Linear,
                        mipmap_filter: wgpu::FilterMode::Linear,
                        ..Default::default()
                    },
                    SamplerKind::ShadowCompare => wgpu::SamplerDescriptor {
                        label: Some("Shadow Comparison Sampler"),
                        compare: Some(wgpu::CompareFunction::LessEqual),
                        mag_filter: wgpu::FilterMode::Linear,
                        min_filter: wgpu::FilterMode::Linear,
                        ..Default::default()
                    },
                };
                self.device.create_sampler(&desc)
            })
            .clone()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_starts_with_zero_delta() {
        let clock = FrameClock::new();
        assert_eq!(clock.delta.get(), 0.0);
        assert_eq!(clock.elapsed.get(), 0.0);
    }

    #[test]
    fn clock_accumulates_across_ticks() {
        let clock = FrameClock::new();
        clock.tick();
        let first_elapsed = clock.elapsed.get();
        assert!(clock.delta.get() >= 0.0);
        assert!(first_elapsed >= clock.delta.get());

        std::thread::sleep(std::time::Duration::from_millis(2));
        clock.tick();
        assert!(clock.delta.get() > 0.0);
        assert!(clock.elapsed.get() > first_elapsed);
    }
}
