//! Gradient effects built as fragment processor trees.
//!
//! This module is organized into two submodules:
//! - `colorizer`: Maps the scalar gradient parameter `t` to a color
//! - `layout`: Maps transformed local coordinates to `t`
//!
//! A gradient is composed as a [`ClampedGradientEffect`] over one colorizer
//! and one layout child. Analysis happens here, not during emission: given
//! the resolved color stops, [`choose_colorizer`] walks a ladder of
//! increasingly general strategies and returns the cheapest one that can
//! represent the stops. The chosen strategy and its baked thresholds are
//! structural, so two gradients of the same shape share a compiled program
//! and differ only in uniform values.

pub mod colorizer;
pub mod layout;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::fragment::{FragmentProcessor, FragmentProcessorIter};
use crate::glsl::program_builder::FragmentEmitArgs;
use crate::glsl::{GlslType, ShaderCaps};
use crate::processor::{ClassId, Processor, class_id_of};
use crate::uniform_data::UniformData;
use crate::utils::Mat3;

use colorizer::choose_colorizer;
use layout::{LinearGradientLayout, RadialGradientLayout};

/// Positions closer than this are one hard stop.
pub(crate) const POSITION_EPS: f32 = 1e-5;

/// A gradient as the drawing API hands it over: parallel colors and
/// optional positions. Missing positions mean evenly spaced stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientDesc {
    pub colors: Vec<[f32; 4]>,
    #[serde(default)]
    pub positions: Option<Vec<f32>>,
}

/// One resolved color stop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub position: f32,
    pub color: [f32; 4],
}

/// Resolve a description into normalized stops.
///
/// Positions are clamped to [0, 1] and forced non-decreasing; boundary
/// stops at 0 and 1 are inserted when missing, so the result always spans
/// the full parameter range with at least two stops.
pub fn resolve_stops(desc: &GradientDesc) -> Result<Vec<GradientStop>> {
    if desc.colors.is_empty() {
        bail!("gradient needs at least one color stop");
    }
    let mut stops: Vec<GradientStop> = match &desc.positions {
        Some(positions) => {
            if positions.len() != desc.colors.len() {
                bail!(
                    "gradient has {} colors but {} positions",
                    desc.colors.len(),
                    positions.len()
                );
            }
            let mut last = 0.0_f32;
            desc.colors
                .iter()
                .zip(positions)
                .map(|(&color, &p)| {
                    let position = p.clamp(0.0, 1.0).max(last);
                    last = position;
                    GradientStop { position, color }
                })
                .collect()
        }
        None => {
            let n = desc.colors.len();
            desc.colors
                .iter()
                .enumerate()
                .map(|(i, &color)| GradientStop {
                    position: if n == 1 {
                        0.0
                    } else {
                        i as f32 / (n - 1) as f32
                    },
                    color,
                })
                .collect()
        }
    };

    let first = stops[0];
    if first.position > 0.0 {
        stops.insert(0, GradientStop {
            position: 0.0,
            ..first
        });
    }
    let last = stops[stops.len() - 1];
    if last.position < 1.0 {
        stops.push(GradientStop {
            position: 1.0,
            ..last
        });
    }
    if stops.len() == 1 {
        stops.push(GradientStop {
            position: 1.0,
            ..stops[0]
        });
    }
    Ok(stops)
}

/// Clamp-tiled gradient: layout child produces `t`, colorizer child maps it
/// to a color, and values outside [0, 1] take the border colors.
///
/// The border colors are the outermost stop colors of the original
/// description. With an edge hard stop they differ from the first interior
/// color, which is exactly what makes the hard stop visible at the border.
pub struct ClampedGradientEffect {
    children: [Box<dyn FragmentProcessor>; 2],
    border_lo: [f32; 4],
    border_hi: [f32; 4],
}

impl ClampedGradientEffect {
    const COLORIZER: usize = 0;
    const LAYOUT: usize = 1;

    pub fn new(
        colorizer: Box<dyn FragmentProcessor>,
        layout: Box<dyn FragmentProcessor>,
        border_lo: [f32; 4],
        border_hi: [f32; 4],
    ) -> Self {
        Self {
            children: [colorizer, layout],
            border_lo,
            border_hi,
        }
    }
}

impl Processor for ClampedGradientEffect {
    fn name(&self) -> &'static str {
        "ClampedGradient"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for ClampedGradientEffect {
    fn children(&self) -> &[Box<dyn FragmentProcessor>] {
        &self.children
    }

    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let border_lo = args.add_uniform(GlslType::Vec4, "u_border_lo");
        let border_hi = args.add_uniform(GlslType::Vec4, "u_border_hi");
        let t = args.emit_child(Self::LAYOUT, "vec4(1.0)")?;
        let colorized = args.emit_child(Self::COLORIZER, &t)?;
        let out = args.output().to_string();
        args.code(&format!("if ({t}.x < 0.0) {{"));
        args.code(&format!("{out} = {border_lo};"));
        args.code(&format!("}} else if ({t}.x > 1.0) {{"));
        args.code(&format!("{out} = {border_hi};"));
        args.code("} else {");
        args.code(&format!("{out} = {colorized};"));
        args.code("}");
        Ok(())
    }

    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        data.set_vec4(&format!("u_border_lo{suffix}"), self.border_lo)?;
        data.set_vec4(&format!("u_border_hi{suffix}"), self.border_hi)
    }
}

/// Build a clamp-tiled linear gradient effect.
///
/// `local_to_gradient` maps local draw coordinates so the gradient runs
/// from x = 0 to x = 1.
pub fn make_linear(
    desc: &GradientDesc,
    local_to_gradient: Mat3,
    caps: &ShaderCaps,
) -> Result<Box<dyn FragmentProcessor>> {
    let stops = resolve_stops(desc)?;
    let colorizer = choose_colorizer(&stops, caps);
    let layout = Box::new(LinearGradientLayout::new(local_to_gradient));
    Ok(Box::new(ClampedGradientEffect::new(
        colorizer,
        layout,
        stops[0].color,
        stops[stops.len() - 1].color,
    )))
}

/// Build a clamp-tiled radial gradient effect.
///
/// `local_to_gradient` maps local draw coordinates so the unit circle
/// around the origin spans the gradient.
pub fn make_radial(
    desc: &GradientDesc,
    local_to_gradient: Mat3,
    caps: &ShaderCaps,
) -> Result<Box<dyn FragmentProcessor>> {
    let stops = resolve_stops(desc)?;
    let colorizer = choose_colorizer(&stops, caps);
    let layout = Box::new(RadialGradientLayout::new(local_to_gradient));
    Ok(Box::new(ClampedGradientEffect::new(
        colorizer,
        layout,
        stops[0].color,
        stops[stops.len() - 1].color,
    )))
}

/// Name of the colorizer a gradient tree selected, for diagnostics.
pub fn selected_colorizer_name(root: &dyn FragmentProcessor) -> Option<&'static str> {
    FragmentProcessorIter::new(root)
        .find(|node| node.name().ends_with("GradientColorizer"))
        .map(|node| node.name())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(colors: &[[f32; 4]], positions: Option<&[f32]>) -> GradientDesc {
        GradientDesc {
            colors: colors.to_vec(),
            positions: positions.map(|p| p.to_vec()),
        }
    }

    const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
    const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
    const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

    #[test]
    fn missing_positions_space_stops_evenly() {
        let stops = resolve_stops(&desc(&[RED, GREEN, BLUE], None)).unwrap();
        let positions: Vec<f32> = stops.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn boundary_stops_are_inserted() {
        let stops = resolve_stops(&desc(&[RED, BLUE], Some(&[0.25, 0.75]))).unwrap();
        let positions: Vec<f32> = stops.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.25, 0.75, 1.0]);
        assert_eq!(stops[0].color, RED);
        assert_eq!(stops[3].color, BLUE);
    }

    #[test]
    fn positions_are_forced_monotonic() {
        let stops = resolve_stops(&desc(&[RED, GREEN, BLUE], Some(&[0.0, 0.8, 0.4]))).unwrap();
        let positions: Vec<f32> = stops.iter().map(|s| s.position).collect();
        assert_eq!(positions, vec![0.0, 0.8, 0.8, 1.0]);
    }

    #[test]
    fn single_color_becomes_a_flat_span() {
        let stops = resolve_stops(&desc(&[RED], None)).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].position, 0.0);
        assert_eq!(stops[1].position, 1.0);
        assert_eq!(stops[1].color, RED);
    }

    #[test]
    fn empty_and_mismatched_descriptions_fail() {
        assert!(resolve_stops(&desc(&[], None)).is_err());
        assert!(resolve_stops(&desc(&[RED, BLUE], Some(&[0.0]))).is_err());
    }

    #[test]
    fn linear_gradient_composes_colorizer_and_layout() {
        let caps = ShaderCaps::default();
        let d = desc(&[RED, GREEN, BLUE], None);
        let effect = make_linear(&d, crate::utils::MAT3_IDENTITY, &caps).unwrap();
        assert_eq!(effect.name(), "ClampedGradient");
        assert_eq!(effect.children().len(), 2);
        assert!(effect.children()[0].name().ends_with("GradientColorizer"));
        assert_eq!(effect.children()[1].name(), "LinearGradientLayout");
        assert_eq!(
            selected_colorizer_name(effect.as_ref()),
            Some("DualIntervalGradientColorizer")
        );
    }
}
