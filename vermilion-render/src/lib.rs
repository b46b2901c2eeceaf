//! Deferred rendering engine built as a name-keyed render graph on wgpu.
//!
//! A [`Composer`] owns an ordered list of render passes. Each pass declares
//! the textures it consumes and produces by well-known name; the composer
//! resolves inputs from its registry before a pass runs and publishes the
//! pass's outputs afterwards. [`plan`] builds and validates the pass list for
//! a given feature selection before any GPU resource exists.
//!
//! Scene geometry is never owned by the engine: callers implement [`Scene`]
//! and draw into the passes' encoders through the pass contract.

pub mod camera;
pub mod context;
pub mod graph;
pub mod lights;
pub mod particles;
pub mod pass;
pub mod passes;
pub mod pipeline;
pub mod plan;
pub mod profiler;
pub mod renderer;
pub mod resource;
pub mod scene;

pub use camera::Camera;
pub use context::RenderContext;
pub use graph::Composer;
pub use particles::ParticleSystem;
pub use pass::{PassIo, PassKind, RenderPass};
pub use plan::RendererSettings;
pub use renderer::Renderer;
pub use resource::{names, RenderTexture};
pub use scene::{EnvironmentMaps, Scene};
