//! Pure pass-list planning.
//!
//! [`build_plan`] decides, from the feature selection alone, which passes
//! run and which registry names connect them. The composer instantiates GPU
//! passes from the plan; nothing here touches a device, so every wiring
//! scenario is testable on CPU.

use crate::pass::{PassIo, PassKind};
use crate::resource::names;

/// Feature selection for the frame graph. Off switches remove passes and
/// the remaining passes rewire around the gap.
#[derive(Clone, Copy, Debug)]
pub struct RendererSettings {
    pub ssao: bool,
    pub ssr: bool,
    pub taa: bool,
    pub bloom: bool,
    pub skybox: bool,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            ssao: true,
            ssr: true,
            taa: true,
            bloom: true,
            skybox: true,
        }
    }
}

/// One scheduled pass: its kind plus the resolved registry wiring.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPass {
    pub kind: PassKind,
    pub io: PassIo,
}

impl PlannedPass {
    fn new(kind: PassKind, inputs: Vec<&'static str>, outputs: Vec<&'static str>) -> Self {
        Self {
            kind,
            io: PassIo::new(inputs, outputs),
        }
    }
}

/// Build the ordered pass list for a feature selection.
///
/// The color chain is threaded through the plan: lighting and the additive
/// passes write "lighting texture"; SSR replaces it with the composited
/// reflection output; TAA replaces that with the resolve target; the blit
/// reads whatever the chain ends on.
pub fn build_plan(settings: &RendererSettings) -> Vec<PlannedPass> {
    let mut plan = Vec::new();

    plan.push(PlannedPass::new(
        PassKind::GBuffer,
        vec![],
        vec![
            names::NORMAL,
            names::COLOR_REFLECTANCE,
            names::VELOCITY,
            names::DEPTH,
        ],
    ));

    plan.push(PlannedPass::new(
        PassKind::CascadedShadow,
        vec![],
        vec![names::SHADOW_DEPTH],
    ));

    if settings.ssao {
        plan.push(PlannedPass::new(
            PassKind::Ssao,
            vec![names::DEPTH, names::NORMAL],
            vec![names::SSAO, names::SSAO_BLUR],
        ));
    }

    let mut lighting_inputs = vec![
        names::NORMAL,
        names::COLOR_REFLECTANCE,
        names::DEPTH,
        names::SHADOW_DEPTH,
    ];
    if settings.ssao {
        lighting_inputs.push(names::SSAO_BLUR);
    }
    plan.push(PlannedPass::new(
        PassKind::DirectionalAmbient,
        lighting_inputs,
        vec![names::LIGHTING],
    ));

    // Point-light volumes render additively into the lighting target. The
    // mask pass only touches the stencil aspect of the depth texture.
    plan.push(PlannedPass::new(
        PassKind::PointLightMask,
        vec![names::DEPTH],
        vec![],
    ));
    plan.push(PlannedPass::new(
        PassKind::PointLightCulled,
        vec![
            names::NORMAL,
            names::COLOR_REFLECTANCE,
            names::DEPTH,
            names::LIGHTING,
        ],
        vec![names::LIGHTING],
    ));
    plan.push(PlannedPass::new(
        PassKind::PointLightInside,
        vec![
            names::NORMAL,
            names::COLOR_REFLECTANCE,
            names::DEPTH,
            names::LIGHTING,
        ],
        vec![names::LIGHTING],
    ));

    if settings.skybox {
        plan.push(PlannedPass::new(
            PassKind::Skybox,
            vec![names::DEPTH, names::LIGHTING],
            vec![names::LIGHTING],
        ));
    }

    plan.push(PlannedPass::new(
        PassKind::Transparent,
        vec![names::DEPTH, names::LIGHTING],
        vec![names::LIGHTING],
    ));

    let mut color = names::LIGHTING;

    if settings.ssr {
        plan.push(PlannedPass::new(
            PassKind::HiZ,
            vec![names::DEPTH],
            vec![names::HIZ_DEPTH],
        ));
        plan.push(PlannedPass::new(
            PassKind::Ssr,
            vec![names::HIZ_DEPTH, color, names::NORMAL],
            vec![names::REFLECTION],
        ));
        color = names::REFLECTION;
    }

    if settings.taa {
        plan.push(PlannedPass::new(
            PassKind::Taa,
            vec![color, names::VELOCITY],
            vec![names::TAA_RESOLVE],
        ));
        color = names::TAA_RESOLVE;
    }

    if settings.bloom {
        plan.push(PlannedPass::new(
            PassKind::Bloom,
            vec![color],
            vec![names::BLOOM],
        ));
    }

    let mut blit_inputs = vec![color];
    if settings.bloom {
        blit_inputs.push(names::BLOOM);
    }
    plan.push(PlannedPass::new(PassKind::Blit, blit_inputs, vec![]));

    plan
}

/// Check a plan for wiring errors: duplicate pass kinds, inputs nothing
/// upstream produces, and a missing or misplaced final blit.
pub fn validate_plan(plan: &[PlannedPass]) -> Result<(), String> {
    let mut seen_kinds = Vec::new();
    let mut available: Vec<&str> = Vec::new();

    for pass in plan {
        if seen_kinds.contains(&pass.kind) {
            return Err(format!("duplicate pass kind {:?}", pass.kind));
        }
        seen_kinds.push(pass.kind);

        for input in &pass.io.inputs {
            if !available.contains(input) {
                return Err(format!(
                    "pass {:?} reads '{input}' but no earlier pass produces it",
                    pass.kind
                ));
            }
        }
        for output in &pass.io.outputs {
            if !available.contains(output) {
                available.push(output);
            }
        }
    }

    match plan.last() {
        Some(last) if last.kind == PassKind::Blit => Ok(()),
        Some(last) => Err(format!("plan must end with the blit, found {:?}", last.kind)),
        None => Err("empty plan".to_owned()),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn find(plan: &[PlannedPass], kind: PassKind) -> &PlannedPass {
        plan.iter().find(|p| p.kind == kind).unwrap()
    }

    fn has(plan: &[PlannedPass], kind: PassKind) -> bool {
        plan.iter().any(|p| p.kind == kind)
    }

    #[test]
    fn full_plan_validates() {
        let plan = build_plan(&RendererSettings::default());
        validate_plan(&plan).unwrap();
    }

    #[test]
    fn every_selection_validates() {
        for bits in 0..32u32 {
            let settings = RendererSettings {
                ssao: bits & 1 != 0,
                ssr: bits & 2 != 0,
                taa: bits & 4 != 0,
                bloom: bits & 8 != 0,
                skybox: bits & 16 != 0,
            };
            let plan = build_plan(&settings);
            validate_plan(&plan).unwrap_or_else(|e| panic!("{settings:?}: {e}"));
        }
    }

    #[test]
    fn ssr_off_routes_lighting_into_taa() {
        let settings = RendererSettings {
            ssr: false,
            ..Default::default()
        };
        let plan = build_plan(&settings);
        assert!(!has(&plan, PassKind::HiZ));
        assert!(!has(&plan, PassKind::Ssr));
        assert_eq!(find(&plan, PassKind::Taa).io.inputs[0], names::LIGHTING);
    }

    #[test]
    fn taa_off_routes_reflection_into_bloom_and_blit() {
        let settings = RendererSettings {
            taa: false,
            ..Default::default()
        };
        let plan = build_plan(&settings);
        assert_eq!(find(&plan, PassKind::Bloom).io.inputs[0], names::REFLECTION);
        assert_eq!(
            find(&plan, PassKind::Blit).io.inputs,
            vec![names::REFLECTION, names::BLOOM]
        );
    }

    #[test]
    fn ssao_and_ssr_off_blit_reads_the_taa_resolve() {
        let settings = RendererSettings {
            ssao: false,
            ssr: false,
            bloom: false,
            ..Default::default()
        };
        let plan = build_plan(&settings);
        assert!(!has(&plan, PassKind::Ssao));
        assert!(!has(&plan, PassKind::HiZ));
        assert!(!has(&plan, PassKind::Ssr));
        assert!(!has(&plan, PassKind::Bloom));
        assert_eq!(find(&plan, PassKind::Taa).io.inputs[0], names::LIGHTING);
        assert_eq!(
            find(&plan, PassKind::Blit).io.inputs,
            vec![names::TAA_RESOLVE]
        );
    }

    #[test]
    fn all_post_off_blits_the_lighting_texture() {
        let settings = RendererSettings {
            ssao: false,
            ssr: false,
            taa: false,
            bloom: false,
            skybox: true,
        };
        let plan = build_plan(&settings);
        assert_eq!(find(&plan, PassKind::Blit).io.inputs, vec![names::LIGHTING]);
    }

    #[test]
    fn ssao_feeds_the_lighting_pass_when_enabled() {
        let on = build_plan(&RendererSettings::default());
        assert!(find(&on, PassKind::DirectionalAmbient)
            .io
            .inputs
            .contains(&names::SSAO_BLUR));

        let off = build_plan(&RendererSettings {
            ssao: false,
            ..Default::default()
        });
        assert!(!find(&off, PassKind::DirectionalAmbient)
            .io
            .inputs
            .contains(&names::SSAO_BLUR));
        assert!(!has(&off, PassKind::Ssao));
    }

    #[test]
    fn point_light_passes_are_always_scheduled_in_order() {
        let plan = build_plan(&RendererSettings {
            ssao: false,
            ssr: false,
            taa: false,
            bloom: false,
            skybox: false,
        });
        let pos = |kind| plan.iter().position(|p| p.kind == kind).unwrap();
        assert!(pos(PassKind::DirectionalAmbient) < pos(PassKind::PointLightMask));
        assert!(pos(PassKind::PointLightMask) < pos(PassKind::PointLightCulled));
        assert!(pos(PassKind::PointLightCulled) < pos(PassKind::PointLightInside));
        assert!(pos(PassKind::PointLightInside) < pos(PassKind::Transparent));
    }

    #[test]
    fn validate_rejects_unproduced_input() {
        let plan = vec![
            PlannedPass::new(PassKind::Taa, vec![names::LIGHTING], vec![]),
            PlannedPass::new(PassKind::Blit, vec![], vec![]),
        ];
        let err = validate_plan(&plan).unwrap_err();
        assert!(err.contains("lighting texture"), "{err}");
    }

    #[test]
    fn validate_rejects_duplicate_kind() {
        let plan = vec![
            PlannedPass::new(PassKind::GBuffer, vec![], vec![names::DEPTH]),
            PlannedPass::new(PassKind::GBuffer, vec![], vec![names::DEPTH]),
            PlannedPass::new(PassKind::Blit, vec![names::DEPTH], vec![]),
        ];
        assert!(validate_plan(&plan).is_err());
    }

    #[test]
    fn validate_rejects_missing_blit() {
        let plan = vec![PlannedPass::new(
            PassKind::GBuffer,
            vec![],
            vec![names::DEPTH],
        )];
        assert!(validate_plan(&plan).is_err());
    }
}
