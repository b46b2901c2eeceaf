//! Property tests for the CPU-side light math the volume passes depend on:
//! the packed array ordering and the stencil counting model.

use glam::Vec3;
use proptest::prelude::*;
use vermilion_render::lights::{
    camera_inside_volume, pack_lights, stencil_delta, Light, PackedLights,
};
use vermilion_gpu_shared::uniforms::{
    LIGHT_KIND_CAMERA_FACE_CULLED_POINT, LIGHT_KIND_DIRECTIONAL, LIGHT_KIND_POINT,
};

const NEAR: f32 = 0.1;

fn vec3_strategy(range: f32) -> impl Strategy<Value = Vec3> {
    (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Vec3::new(x, y, z))
}

fn light_strategy() -> impl Strategy<Value = Light> {
    prop_oneof![
        (vec3_strategy(1.0), 0.1f32..10.0).prop_map(|(direction, intensity)| {
            Light::Directional {
                direction,
                color: Vec3::ONE,
                intensity,
            }
        }),
        (vec3_strategy(50.0), 0.1f32..10.0, 0.5f32..20.0).prop_map(
            |(position, intensity, radius)| Light::Point {
                position,
                color: Vec3::ONE,
                intensity,
                radius,
            }
        ),
    ]
}

fn kind_runs_in_order(packed: &PackedLights) -> bool {
    let kinds: Vec<u32> = packed.raws.iter().map(|r| r.kind).collect();
    let mut sorted = kinds.clone();
    sorted.sort_by_key(|&k| match k {
        LIGHT_KIND_DIRECTIONAL => 0,
        LIGHT_KIND_POINT => 1,
        LIGHT_KIND_CAMERA_FACE_CULLED_POINT => 2,
        other => panic!("unexpected light kind {other}"),
    });
    kinds == sorted
}

proptest! {
    #[test]
    fn packing_keeps_category_runs_contiguous(
        lights in prop::collection::vec(light_strategy(), 0..24),
        eye in vec3_strategy(30.0),
    ) {
        let packed = pack_lights(&lights, eye, NEAR);
        prop_assert_eq!(packed.raws.len(), lights.len());
        prop_assert!(kind_runs_in_order(&packed));

        prop_assert_eq!(packed.directional.base, 0);
        prop_assert_eq!(packed.point.base, packed.directional.count);
        prop_assert_eq!(
            packed.camera_inside.base,
            packed.directional.count + packed.point.count
        );
        prop_assert_eq!(
            packed.directional.count + packed.point.count + packed.camera_inside.count,
            lights.len() as u32
        );
    }

    #[test]
    fn camera_inside_lights_take_the_back_face_path(
        position in vec3_strategy(20.0),
        radius in 0.5f32..15.0,
        eye in vec3_strategy(20.0),
    ) {
        let light = Light::Point {
            position,
            color: Vec3::ONE,
            intensity: 1.0,
            radius,
        };
        let packed = pack_lights(&[light], eye, NEAR);
        if camera_inside_volume(eye, position, radius, NEAR) {
            prop_assert_eq!(packed.camera_inside.count, 1);
            prop_assert_eq!(packed.raws[0].kind, LIGHT_KIND_CAMERA_FACE_CULLED_POINT);
        } else {
            prop_assert_eq!(packed.point.count, 1);
            prop_assert_eq!(packed.raws[0].kind, LIGHT_KIND_POINT);
        }
    }

    #[test]
    fn stencil_count_marks_exactly_the_points_inside_the_volume(
        light_pos in vec3_strategy(20.0),
        radius in 0.5f32..10.0,
        origin in vec3_strategy(20.0),
        dir in vec3_strategy(1.0),
        scene_depth in 0.1f32..60.0,
    ) {
        prop_assume!(dir.length() > 1e-3);
        let dir = dir.normalize();
        // Keep the sample away from the sphere surface where the inside
        // test flips on float noise.
        let scene_point = origin + dir * scene_depth;
        let dist = scene_point.distance(light_pos);
        prop_assume!((dist - radius).abs() > 1e-2);
        prop_assume!((origin.distance(light_pos) - radius).abs() > 1e-2);

        let delta = stencil_delta(light_pos, radius, origin, dir, scene_depth);
        let inside = dist < radius;
        if inside {
            prop_assert_eq!(delta, 1);
        } else {
            prop_assert_eq!(delta, 0);
        }
    }

    #[test]
    fn stencil_sum_is_bounded_by_the_covering_volumes(
        lights in prop::collection::vec((vec3_strategy(20.0), 0.5f32..8.0), 1..8),
        origin in vec3_strategy(20.0),
        dir in vec3_strategy(1.0),
        scene_depth in 0.1f32..50.0,
    ) {
        prop_assume!(dir.length() > 1e-3);
        let dir = dir.normalize();
        let scene_point = origin + dir * scene_depth;
        let mut covering = 0;
        for &(pos, radius) in &lights {
            prop_assume!((scene_point.distance(pos) - radius).abs() > 1e-2);
            prop_assume!((origin.distance(pos) - radius).abs() > 1e-2);
            if scene_point.distance(pos) < radius {
                covering += 1;
            }
        }
        let total: i32 = lights
            .iter()
            .map(|&(pos, radius)| stencil_delta(pos, radius, origin, dir, scene_depth))
            .sum();
        prop_assert!(total >= 0);
        prop_assert!(total <= covering);
    }

    #[test]
    fn stencil_counts_sum_over_independent_lights(
        lights in prop::collection::vec((vec3_strategy(20.0), 0.5f32..8.0), 1..8),
        origin in vec3_strategy(20.0),
        scene_depth in 0.1f32..50.0,
    ) {
        let dir = Vec3::new(0.2, -0.1, -1.0).normalize();
        let scene_point = origin + dir * scene_depth;
        let mut expected = 0;
        for &(pos, radius) in &lights {
            let dist = scene_point.distance(pos);
            prop_assume!((dist - radius).abs() > 1e-2);
            prop_assume!((origin.distance(pos) - radius).abs() > 1e-2);
            if dist < radius {
                expected += 1;
            }
        }
        let total: i32 = lights
            .iter()
            .map(|&(pos, radius)| stencil_delta(pos, radius, origin, dir, scene_depth))
            .sum();
        prop_assert_eq!(total, expected);
    }
}

#[test]
fn disjoint_volumes_are_counted_independently() {
    let a = Vec3::new(-10.0, 0.0, -20.0);
    let b = Vec3::new(10.0, 0.0, -20.0);
    let radius = 2.0;
    let origin = Vec3::ZERO;

    // Ray through the first volume's center, stopping at it: only that
    // volume contributes.
    let dir = (a - origin).normalize();
    let depth = origin.distance(a);
    assert_eq!(stencil_delta(a, radius, origin, dir, depth), 1);
    assert_eq!(stencil_delta(b, radius, origin, dir, depth), 0);

    // Stopping short of both leaves the mask balanced at zero.
    assert_eq!(stencil_delta(a, radius, origin, dir, 1.0), 0);
    assert_eq!(stencil_delta(b, radius, origin, dir, 1.0), 0);
}
