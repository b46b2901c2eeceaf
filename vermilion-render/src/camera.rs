//! Camera state, sub-pixel jitter, and the per-frame uniform upload.

use glam::{Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use crate::context::RenderContext;
use vermilion_gpu_shared::uniforms::CameraUniforms;

/// Length of the jitter cycle. 16 Halton(2,3) samples cover the pixel well
/// before repeating.
pub const JITTER_CYCLE: u64 = 16;

/// Radical inverse in the given base, the Halton sequence term.
fn halton(mut index: u64, base: u64) -> f32 {
    let mut fraction = 1.0f32;
    let mut result = 0.0f32;
    while index > 0 {
        fraction /= base as f32;
        result += fraction * (index % base) as f32;
        index /= base;
    }
    result
}

/// Sub-pixel jitter for a frame, in pixel units centered on zero. The
/// sequence is 1-based so frame 0 does not land exactly on the pixel center
/// twice in a row after a cycle wrap.
pub fn jitter_pixels(frame_index: u64) -> Vec2 {
    let i = frame_index % JITTER_CYCLE + 1;
    Vec2::new(halton(i, 2) - 0.5, halton(i, 3) - 0.5)
}

/// The same jitter scaled to NDC units for the given viewport.
pub fn jitter_ndc(frame_index: u64, width: u32, height: u32) -> Vec2 {
    let p = jitter_pixels(frame_index);
    Vec2::new(p.x * 2.0 / width.max(1) as f32, p.y * 2.0 / height.max(1) as f32)
}

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
    width: u32,
    height: u32,
    /// When false the uploaded jitter is zero and the projection is exact.
    pub jitter_enabled: bool,
    prev_proj_view: Option<Mat4>,
}

impl Camera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            eye: Vec3::new(0.0, 2.0, 6.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            near: 0.1,
            far: 500.0,
            width,
            height,
            jitter_enabled: true,
            prev_proj_view: None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect(), self.near, self.far)
    }

    /// World-space corners of the camera sub-frustum between `near` and
    /// `far`, near plane first. Used by the shadow pass to fit cascades.
    pub fn frustum_corners_world(&self, near: f32, far: f32) -> [Vec3; 8] {
        let proj = Mat4::perspective_rh(self.fov_y, self.aspect(), near, far);
        let inv = (proj * self.view()).inverse();
        let mut corners = [Vec3::ZERO; 8];
        let mut i = 0;
        for z in [0.0f32, 1.0] {
            for y in [-1.0f32, 1.0] {
                for x in [-1.0f32, 1.0] {
                    let p: Vec4 = inv * Vec4::new(x, y, z, 1.0);
                    corners[i] = p.xyz() / p.w;
                    i += 1;
                }
            }
        }
        corners
    }

    /// Write this frame's camera uniforms. The rasterized projection gets
    /// the sub-pixel jitter folded in; `prev_proj_view` stays unjittered so
    /// velocity vectors measure real motion only.
    pub fn upload(&mut self, ctx: &RenderContext) {
        let view = self.view();
        let projection = self.projection();
        let proj_view = projection * view;

        let jitter = if self.jitter_enabled {
            jitter_ndc(ctx.frame_index(), self.width, self.height)
        } else {
            Vec2::ZERO
        };
        let mut jittered_projection = projection;
        jittered_projection.z_axis.x += jitter.x;
        jittered_projection.z_axis.y += jitter.y;

        let uniforms = CameraUniforms {
            projection: jittered_projection.to_cols_array_2d(),
            view: view.to_cols_array_2d(),
            proj_view: (jittered_projection * view).to_cols_array_2d(),
            prev_proj_view: self
                .prev_proj_view
                .unwrap_or(proj_view)
                .to_cols_array_2d(),
            inv_projection: projection.inverse().to_cols_array_2d(),
            inv_view: view.inverse().to_cols_array_2d(),
            position: self.eye.extend(1.0).to_array(),
            viewport: [self.width as f32, self.height as f32],
            jitter: jitter.to_array(),
            near: self.near,
            far: self.far,
            _pad: [0.0; 2],
        };
        ctx.queue
            .write_buffer(&ctx.camera_buffer, 0, bytemuck::bytes_of(&uniforms));

        self.prev_proj_view = Some(proj_view);
    }

    /// Drop motion history, e.g. after a teleport. The next frame's
    /// reprojection falls back to the current matrix.
    pub fn reset_history(&mut self) {
        self.prev_proj_view = None;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_inside_the_pixel() {
        for frame in 0..64 {
            let j = jitter_pixels(frame);
            assert!(j.x.abs() <= 0.5, "frame {frame}: {j:?}");
            assert!(j.y.abs() <= 0.5, "frame {frame}: {j:?}");
        }
    }

    #[test]
    fn jitter_cycles_with_period_sixteen() {
        for frame in 0..JITTER_CYCLE {
            assert_eq!(jitter_pixels(frame), jitter_pixels(frame + JITTER_CYCLE));
        }
    }

    #[test]
    fn jitter_samples_are_distinct_within_a_cycle() {
        for a in 0..JITTER_CYCLE {
            for b in (a + 1)..JITTER_CYCLE {
                assert_ne!(jitter_pixels(a), jitter_pixels(b), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn jitter_ndc_scales_with_viewport() {
        let j = jitter_ndc(3, 1920, 1080);
        let p = jitter_pixels(3);
        assert!((j.x - p.x * 2.0 / 1920.0).abs() < 1e-7);
        assert!((j.y - p.y * 2.0 / 1080.0).abs() < 1e-7);
    }

    #[test]
    fn frustum_corners_span_near_and_far() {
        let camera = Camera::new(1280, 720);
        let corners = camera.frustum_corners_world(0.1, 10.0);
        let view = camera.view();
        // First four corners sit on the near plane, last four on the far.
        for (i, corner) in corners.iter().enumerate() {
            let vz = (view * corner.extend(1.0)).z;
            let expected = if i < 4 { -0.1 } else { -10.0 };
            assert!((vz - expected).abs() < 1e-3, "corner {i}: {vz} vs {expected}");
        }
    }
}
