//! Shared GPU-facing data for the Vermilion deferred renderer.
//!
//! Everything the CPU uploads to the GPU lives here as `#[repr(C)]` Pod
//! structs, together with the embedded WGSL sources, so the render crate and
//! its tests agree on one set of layouts.

pub mod shaders;
pub mod uniforms;
