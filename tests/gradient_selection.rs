use std::sync::Arc;

use effect_forge::cache::{BackendProgramId, ProgramBackend};
use effect_forge::geometry::QuadGeometryProcessor;
use effect_forge::gradient::{GradientDesc, make_linear, make_radial, selected_colorizer_name};
use effect_forge::utils::MAT3_IDENTITY;
use effect_forge::validation::validate_program_source;
use effect_forge::{
    BlendMode, ProgramInfo, RenderContext, ShaderCaps, Swizzle, build_program_source,
};

const WHITE: [f32; 4] = [1.0; 4];
const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

struct StubBackend;

impl ProgramBackend for StubBackend {
    fn compile(&mut self, _source: &effect_forge::ProgramSource) -> Option<BackendProgramId> {
        Some(BackendProgramId(1))
    }
}

fn desc(colors: &[[f32; 4]], positions: Option<&[f32]>) -> GradientDesc {
    GradientDesc {
        colors: colors.to_vec(),
        positions: positions.map(|p| p.to_vec()),
    }
}

fn linear_pipeline(colors: &[[f32; 4]], positions: Option<&[f32]>) -> ProgramInfo {
    let caps = ShaderCaps::default();
    let effect = make_linear(&desc(colors, positions), MAT3_IDENTITY, &caps).expect("gradient");
    ProgramInfo::new(
        Box::new(QuadGeometryProcessor::new(false)),
        vec![effect],
        Vec::new(),
        BlendMode::SrcOver,
        Swizzle::RGBA,
    )
}

fn selected(colors: &[[f32; 4]], positions: Option<&[f32]>) -> &'static str {
    let info = linear_pipeline(colors, positions);
    selected_colorizer_name(info.fragments()[0].as_ref()).expect("colorizer in tree")
}

#[test]
fn two_colors_emit_a_single_mix() {
    assert_eq!(selected(&[RED, BLUE], None), "SingleIntervalGradientColorizer");

    let source =
        build_program_source(&linear_pipeline(&[RED, BLUE], None), &ShaderCaps::default())
            .expect("build");
    assert!(source.fragment.contains("mix(u_start_P2, u_end_P2,"));
    validate_program_source(&source).expect("valid");
}

#[test]
fn three_even_colors_bake_the_midpoint_threshold() {
    assert_eq!(
        selected(&[RED, GREEN, BLUE], None),
        "DualIntervalGradientColorizer"
    );

    let source = build_program_source(
        &linear_pipeline(&[RED, GREEN, BLUE], None),
        &ShaderCaps::default(),
    )
    .expect("build");
    assert!(source.fragment.contains("< 0.5"), "threshold is a literal");
    validate_program_source(&source).expect("valid");
}

#[test]
fn edge_hard_stops_reduce_to_dual_interval() {
    assert_eq!(
        selected(&[WHITE, RED, GREEN, BLUE], Some(&[0.0, 0.0, 0.5, 1.0])),
        "DualIntervalGradientColorizer"
    );
    assert_eq!(
        selected(&[RED, GREEN, BLUE, WHITE], Some(&[0.0, 0.5, 1.0, 1.0])),
        "DualIntervalGradientColorizer"
    );
    assert_eq!(
        selected(&[RED, GREEN, GREEN, BLUE], Some(&[0.0, 0.4, 0.4, 1.0])),
        "DualIntervalGradientColorizer"
    );
}

#[test]
fn trimmed_hard_stop_color_still_reaches_the_border() {
    let info = linear_pipeline(&[WHITE, RED, GREEN, BLUE], Some(&[0.0, 0.0, 0.5, 1.0]));
    let mut ctx = RenderContext::new(ShaderCaps::default(), StubBackend);
    let program = ctx.program(&info).expect("program");

    let (_, fragment) = program.write_draw_uniforms(&info).expect("draw uniforms");
    let read_vec4 = |name: &str| -> [f32; 4] {
        let field = fragment
            .layout()
            .field(name)
            .unwrap_or_else(|| panic!("missing field {name}"));
        std::array::from_fn(|k| {
            let off = field.offset + 4 * k;
            f32::from_ne_bytes(fragment.bytes()[off..off + 4].try_into().unwrap())
        })
    };
    assert_eq!(read_vec4("u_border_lo_P1"), WHITE);
    assert_eq!(read_vec4("u_border_hi_P1"), BLUE);
}

#[test]
fn eight_colors_unroll_a_binary_search() {
    let colors: Vec<[f32; 4]> = (0..8).map(|i| [i as f32 / 7.0, 0.0, 0.0, 1.0]).collect();
    assert_eq!(selected(&colors, None), "UnrolledBinaryGradientColorizer");

    let source = build_program_source(&linear_pipeline(&colors, None), &ShaderCaps::default())
        .expect("build");
    assert!(source.fragment.contains("u_scale0_P2"));
    assert!(source.fragment.contains("u_bias6_P2"), "seven intervals");
    validate_program_source(&source).expect("valid");
}

#[test]
fn twenty_colors_fall_back_to_a_texture_strip() {
    let colors: Vec<[f32; 4]> = (0..20).map(|i| [i as f32 / 19.0, 0.0, 0.5, 1.0]).collect();
    assert_eq!(selected(&colors, None), "TextureGradientColorizer");

    let source = build_program_source(&linear_pipeline(&colors, None), &ShaderCaps::default())
        .expect("build");
    assert_eq!(source.samplers.len(), 1);
    assert_eq!(source.samplers[0].name, "u_tex0_P2");
    validate_program_source(&source).expect("valid");

    // different color sets share the program: the strip contents are a
    // texture upload, not text
    let other: Vec<[f32; 4]> = (0..20).map(|i| [0.0, i as f32 / 19.0, 0.0, 1.0]).collect();
    let mut ctx = RenderContext::new(ShaderCaps::default(), StubBackend);
    let a = ctx.program(&linear_pipeline(&colors, None)).expect("first");
    let b = ctx.program(&linear_pipeline(&other, None)).expect("second");
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn radial_layout_measures_distance() {
    let caps = ShaderCaps::default();
    let effect = make_radial(&desc(&[RED, BLUE], None), MAT3_IDENTITY, &caps).expect("radial");
    let info = ProgramInfo::new(
        Box::new(QuadGeometryProcessor::new(false)),
        vec![effect],
        Vec::new(),
        BlendMode::SrcOver,
        Swizzle::RGBA,
    );
    let source = build_program_source(&info, &caps).expect("build");
    assert!(source.fragment.contains("length(v_transformed_coords_0)"));
    validate_program_source(&source).expect("valid");

    // linear and radial layouts are structurally different programs
    let linear_key = linear_pipeline(&[RED, BLUE], None).program_key(&caps);
    assert_ne!(info.program_key(&caps), linear_key);
}
