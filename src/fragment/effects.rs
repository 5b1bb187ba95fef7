//! Stock fragment processors.

use anyhow::{Result, bail};

use super::{CoordTransform, FragmentProcessor};
use crate::glsl::GlslType;
use crate::glsl::program_builder::FragmentEmitArgs;
use crate::key::KeyBuilder;
use crate::processor::{ClassId, Processor, class_id_of};
use crate::texture::TextureSamplerRef;
use crate::uniform_data::UniformData;
use crate::utils::{Mat3, fmt_glsl_f32};

/// How [`ConstColorProcessor`] combines its color with the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Replace the input entirely.
    Ignore,
    /// Multiply the input by the color, channel-wise.
    ModulateRgba,
    /// Multiply the color by the input's alpha.
    ModulateA,
}

impl InputMode {
    fn key_byte(self) -> u8 {
        match self {
            InputMode::Ignore => 0,
            InputMode::ModulateRgba => 1,
            InputMode::ModulateA => 2,
        }
    }
}

/// Emits a uniform color. The color value is draw-time state; only the
/// input mode shapes the generated text.
#[derive(Debug, Clone)]
pub struct ConstColorProcessor {
    color: [f32; 4],
    mode: InputMode,
}

impl ConstColorProcessor {
    pub fn new(color: [f32; 4], mode: InputMode) -> Self {
        Self { color, mode }
    }
}

impl Processor for ConstColorProcessor {
    fn name(&self) -> &'static str {
        "ConstColor"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        key.push_u8(self.mode.key_byte());
    }
}

impl FragmentProcessor for ConstColorProcessor {
    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let color = args.add_uniform(GlslType::Vec4, "u_color");
        let input = args.input().to_string();
        let output = args.output().to_string();
        match self.mode {
            InputMode::Ignore => args.code(&format!("{output} = {color};")),
            InputMode::ModulateRgba => args.code(&format!("{output} = {input} * {color};")),
            InputMode::ModulateA => args.code(&format!("{output} = {input}.a * {color};")),
        }
        Ok(())
    }

    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        data.set_vec4(&format!("u_color{suffix}"), self.color)
    }
}

/// Runs its children in sequence, feeding each child's output to the next.
pub struct SeriesProcessor {
    children: Vec<Box<dyn FragmentProcessor>>,
}

impl SeriesProcessor {
    /// Combine processors into a series, collapsing the single-child case.
    pub fn make(
        mut children: Vec<Box<dyn FragmentProcessor>>,
    ) -> Result<Box<dyn FragmentProcessor>> {
        match children.len() {
            0 => bail!("series requires at least one child"),
            1 => Ok(children.remove(0)),
            _ => Ok(Box::new(SeriesProcessor { children })),
        }
    }
}

impl Processor for SeriesProcessor {
    fn name(&self) -> &'static str {
        "Series"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for SeriesProcessor {
    fn children(&self) -> &[Box<dyn FragmentProcessor>] {
        &self.children
    }

    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let mut current = args.input().to_string();
        for i in 0..self.children.len() {
            current = args.emit_child(i, &current)?;
        }
        let output = args.output().to_string();
        args.code(&format!("{output} = {current};"));
        Ok(())
    }
}

/// Samples a texture at this effect's transformed coordinates.
#[derive(Debug, Clone)]
pub struct TextureEffect {
    samplers: [TextureSamplerRef; 1],
    transforms: [CoordTransform; 1],
}

impl TextureEffect {
    pub fn new(sampler: TextureSamplerRef, local_to_texture: Mat3) -> Self {
        Self {
            samplers: [sampler],
            transforms: [CoordTransform::new(local_to_texture)],
        }
    }
}

impl Processor for TextureEffect {
    fn name(&self) -> &'static str {
        "TextureEffect"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for TextureEffect {
    fn coord_transforms(&self) -> &[CoordTransform] {
        &self.transforms
    }

    fn texture_samplers(&self) -> &[TextureSamplerRef] {
        &self.samplers
    }

    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let sampler = args.sampler(0).to_string();
        let coords = args.transformed_coords(0).to_string();
        let output = args.output().to_string();
        args.code(&format!("{output} = texture({sampler}, {coords});"));
        Ok(())
    }
}

/// Applies a 4x5 color matrix, baked into the shader text.
///
/// Row-major: 4 rows of (r, g, b, a, bias). Because every coefficient is a
/// literal in the generated text, all 20 participate in the key.
#[derive(Debug, Clone)]
pub struct ColorMatrixProcessor {
    matrix: [f32; 20],
}

impl ColorMatrixProcessor {
    pub fn new(matrix: [f32; 20]) -> Self {
        Self { matrix }
    }
}

impl Processor for ColorMatrixProcessor {
    fn name(&self) -> &'static str {
        "ColorMatrix"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        for v in self.matrix {
            key.push_f32(v);
        }
    }
}

impl FragmentProcessor for ColorMatrixProcessor {
    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let m = &self.matrix;
        // GLSL mat4 takes columns; rows here are the matrix's coefficient rows.
        let mut cols = Vec::with_capacity(16);
        for col in 0..4 {
            for row in 0..4 {
                cols.push(fmt_glsl_f32(m[row * 5 + col]));
            }
        }
        let bias: Vec<String> = (0..4).map(|row| fmt_glsl_f32(m[row * 5 + 4])).collect();
        let input = args.input().to_string();
        let output = args.output().to_string();
        args.code(&format!("mat4 m = mat4({});", cols.join(", ")));
        args.code(&format!("vec4 v = vec4({});", bias.join(", ")));
        args.code(&format!("{output} = clamp(m * {input} + v, 0.0, 1.0);"));
        Ok(())
    }
}

/// Multiplies color channels by alpha.
///
/// Node identity inside a pipeline is address-based, so even a
/// parameterless processor must occupy storage; a zero-sized type would
/// give every boxed instance the same dangling address.
#[derive(Debug, Clone, Default)]
pub struct PremulAlphaProcessor {
    _addressed: u8,
}

impl PremulAlphaProcessor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Processor for PremulAlphaProcessor {
    fn name(&self) -> &'static str {
        "PremulAlpha"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for PremulAlphaProcessor {
    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let input = args.input().to_string();
        let output = args.output().to_string();
        args.code(&format!(
            "{output} = vec4({input}.rgb * {input}.a, {input}.a);"
        ));
        Ok(())
    }
}
