//! Transfer processors and blending.
//!
//! The transfer processor turns the fragment chain's final color and
//! coverage into the value written to the output, and decides how that
//! value meets the destination: either through fixed-function blend
//! coefficients, or in-shader against a sampled copy of the destination.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::glsl::program_builder::XferEmitArgs;
use crate::key::KeyBuilder;
use crate::processor::{ClassId, Processor, class_id_of};
use crate::uniform_data::UniformData;

/// Porter-Duff compositing modes, plus the separable extras expressible
/// with fixed-function coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    Clear,
    Src,
    Dst,
    SrcOver,
    DstOver,
    SrcIn,
    DstIn,
    SrcOut,
    DstOut,
    SrcATop,
    DstATop,
    Xor,
    Plus,
    Modulate,
    Screen,
}

impl BlendMode {
    pub fn key_byte(self) -> u8 {
        self as u8
    }
}

/// Fixed-function blend coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendCoeff {
    Zero,
    One,
    /// Source color.
    Sc,
    /// One minus source color.
    Isc,
    /// Destination color.
    Dc,
    /// One minus destination color.
    Idc,
    /// Source alpha.
    Sa,
    /// One minus source alpha.
    Isa,
    /// Destination alpha.
    Da,
    /// One minus destination alpha.
    Ida,
}

/// A `src * srcCoeff + dst * dstCoeff` blend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlendFormula {
    pub src: BlendCoeff,
    pub dst: BlendCoeff,
}

/// Fixed-function coefficients implementing a Porter-Duff mode.
///
/// With coverage present, the shader has already multiplied coverage into
/// the output's color and alpha, so modes whose dst coefficient would drop
/// uncovered destination pixels switch to `Isa` to preserve them.
pub fn porter_duff_formula(mode: BlendMode, has_coverage: bool) -> BlendFormula {
    use BlendCoeff::*;
    let (src, dst) = match mode {
        BlendMode::Clear => (Zero, Zero),
        BlendMode::Src => (One, Zero),
        BlendMode::Dst => (Zero, One),
        BlendMode::SrcOver => (One, Isa),
        BlendMode::DstOver => (Ida, One),
        BlendMode::SrcIn => (Da, Zero),
        BlendMode::DstIn => (Zero, Sa),
        BlendMode::SrcOut => (Ida, Zero),
        BlendMode::DstOut => (Zero, Isa),
        BlendMode::SrcATop => (Da, Isa),
        BlendMode::DstATop => (Ida, Sa),
        BlendMode::Xor => (Ida, Isa),
        BlendMode::Plus => (One, One),
        BlendMode::Modulate => (Zero, Sc),
        BlendMode::Screen => (One, Isc),
    };
    if has_coverage && dst == Zero {
        return BlendFormula { src, dst: Isa };
    }
    BlendFormula { src, dst }
}

/// The final stage of the fragment shader.
pub trait XferProcessor: Processor {
    /// Whether emitted code samples a copy of the destination. Forces the
    /// builder to declare the dst sampler and disables fixed-function
    /// blending.
    fn will_read_dst(&self) -> bool {
        false
    }

    /// Fixed-function coefficients for this draw, `None` when blending
    /// happens in the shader.
    fn blend_formula(&self, has_coverage: bool) -> Option<BlendFormula>;

    fn emit_code(&self, args: &mut XferEmitArgs<'_, '_>) -> Result<()>;

    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        let _ = (suffix, data);
        Ok(())
    }
}

/// Default transfer: write `color * coverage` and let fixed-function
/// blending apply the Porter-Duff mode.
#[derive(Debug, Clone)]
pub struct PorterDuffXfer {
    mode: BlendMode,
}

impl PorterDuffXfer {
    pub fn new(mode: BlendMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> BlendMode {
        self.mode
    }
}

impl Processor for PorterDuffXfer {
    fn name(&self) -> &'static str {
        "PorterDuffXfer"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        key.push_u8(self.mode.key_byte());
    }
}

impl XferProcessor for PorterDuffXfer {
    fn blend_formula(&self, has_coverage: bool) -> Option<BlendFormula> {
        Some(porter_duff_formula(self.mode, has_coverage))
    }

    fn emit_code(&self, args: &mut XferEmitArgs<'_, '_>) -> Result<()> {
        let output = args.output().to_string();
        let color = args.input_color().to_string();
        let coverage = args.input_coverage().to_string();
        args.code(&format!("{output} = {color} * {coverage};"));
        Ok(())
    }
}

/// Separable blends that need the destination color in the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DstBlendMode {
    Multiply,
    Darken,
    Lighten,
}

/// Transfer processor blending against a sampled destination copy.
///
/// The result is written with overwrite coefficients (One, Zero); all
/// mixing happens in the emitted code on premultiplied values.
#[derive(Debug, Clone)]
pub struct DstReadXfer {
    mode: DstBlendMode,
}

impl DstReadXfer {
    pub fn new(mode: DstBlendMode) -> Self {
        Self { mode }
    }
}

impl Processor for DstReadXfer {
    fn name(&self) -> &'static str {
        "DstReadXfer"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        key.push_u8(match self.mode {
            DstBlendMode::Multiply => 0,
            DstBlendMode::Darken => 1,
            DstBlendMode::Lighten => 2,
        });
    }
}

impl XferProcessor for DstReadXfer {
    fn will_read_dst(&self) -> bool {
        true
    }

    fn blend_formula(&self, _has_coverage: bool) -> Option<BlendFormula> {
        None
    }

    fn emit_code(&self, args: &mut XferEmitArgs<'_, '_>) -> Result<()> {
        let Some(dst) = args.dst_color().map(str::to_string) else {
            bail!("dst-read transfer emitted without a dst sampler");
        };
        let output = args.output().to_string();
        let color = args.input_color().to_string();
        let coverage = args.input_coverage().to_string();
        args.code(&format!("vec4 src = {color} * {coverage};"));
        match self.mode {
            DstBlendMode::Multiply => {
                args.code(&format!(
                    "vec4 blended = src * {dst} + src * (1.0 - {dst}.a) + {dst} * (1.0 - src.a);"
                ));
            }
            DstBlendMode::Darken => {
                args.code(&format!(
                    "vec3 rgb = src.rgb + {dst}.rgb - max(src.rgb * {dst}.a, {dst}.rgb * src.a);"
                ));
                args.code(&format!(
                    "vec4 blended = vec4(rgb, src.a + {dst}.a - src.a * {dst}.a);"
                ));
            }
            DstBlendMode::Lighten => {
                args.code(&format!(
                    "vec3 rgb = src.rgb + {dst}.rgb - min(src.rgb * {dst}.a, {dst}.rgb * src.a);"
                ));
                args.code(&format!(
                    "vec4 blended = vec4(rgb, src.a + {dst}.a - src.a * {dst}.a);"
                ));
            }
        }
        args.code(&format!("{output} = blended;"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn src_over_is_one_inverse_src_alpha() {
        let f = porter_duff_formula(BlendMode::SrcOver, false);
        assert_eq!(f.src, BlendCoeff::One);
        assert_eq!(f.dst, BlendCoeff::Isa);
        // unchanged by coverage
        assert_eq!(porter_duff_formula(BlendMode::SrcOver, true), f);
    }

    #[test]
    fn coverage_preserves_uncovered_dst() {
        let src = porter_duff_formula(BlendMode::Src, true);
        assert_eq!(src.src, BlendCoeff::One);
        assert_eq!(src.dst, BlendCoeff::Isa);

        let clear = porter_duff_formula(BlendMode::Clear, true);
        assert_eq!(clear.src, BlendCoeff::Zero);
        assert_eq!(clear.dst, BlendCoeff::Isa);

        let src_in = porter_duff_formula(BlendMode::SrcIn, true);
        assert_eq!(src_in.dst, BlendCoeff::Isa);
    }

    #[test]
    fn porter_duff_xfer_exposes_formula_dst_read_does_not() {
        let pd = PorterDuffXfer::new(BlendMode::SrcOver);
        assert!(pd.blend_formula(false).is_some());
        assert!(!pd.will_read_dst());

        let dr = DstReadXfer::new(DstBlendMode::Multiply);
        assert!(dr.blend_formula(false).is_none());
        assert!(dr.will_read_dst());
    }

    #[test]
    fn distinct_modes_key_differently() {
        let key_of = |mode: BlendMode| {
            let mut k = KeyBuilder::new();
            PorterDuffXfer::new(mode).key_coefficients(&mut k);
            k.finish()
        };
        assert_ne!(key_of(BlendMode::SrcOver), key_of(BlendMode::DstIn));
    }
}
