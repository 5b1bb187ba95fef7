//! Colorizers: map the gradient parameter `t` to a color.
//!
//! `t` arrives through the child-input color slot as `vec4(t, 1, 0, 0)`,
//! so every colorizer reads `input.x`. Interval scale/bias pairs are
//! runtime uniforms; interval thresholds are baked into the generated text
//! and therefore key material.

use anyhow::Result;

use super::{GradientStop, POSITION_EPS};
use crate::fragment::FragmentProcessor;
use crate::glsl::program_builder::FragmentEmitArgs;
use crate::glsl::{GlslType, ShaderCaps};
use crate::key::KeyBuilder;
use crate::processor::{ClassId, Processor, class_id_of};
use crate::texture::{Filter, LookupBitmap, PixelFormat, TextureSamplerRef, WrapMode};
use crate::uniform_data::UniformData;
use crate::utils::fmt_glsl_f32;

const MAX_UNROLLED_COLORS: usize = 16;
const MAX_UNROLLED_INTERVALS: usize = 8;
const LUT_WIDTH: u32 = 256;

/// Pick the cheapest colorizer that can represent `stops`.
///
/// A hard stop at either edge drops the redundant boundary stop from the
/// analysis; the dropped color still reaches the border uniforms of the
/// clamp wrapper. The ladder then runs single-interval, dual-interval,
/// unrolled-binary, and finally the rasterized texture lookup, falling
/// through whenever a strategy cannot express the stop distribution.
pub fn choose_colorizer(stops: &[GradientStop], caps: &ShaderCaps) -> Box<dyn FragmentProcessor> {
    let mut lo = 0;
    let mut hi = stops.len();
    if hi - lo > 2 && stops[lo + 1].position - stops[lo].position <= POSITION_EPS {
        lo += 1;
    }
    if hi - lo > 2 && stops[hi - 1].position - stops[hi - 2].position <= POSITION_EPS {
        hi -= 1;
    }
    let trimmed = &stops[lo..hi];

    match trimmed {
        [a, b] => return Box::new(SingleIntervalColorizer::new(a.color, b.color)),
        [a, mid, b] => {
            if let Some(c) =
                DualIntervalColorizer::make(a.color, mid.color, mid.color, b.color, mid.position)
            {
                return Box::new(c);
            }
        }
        [a, b, c, d] if (c.position - b.position).abs() <= POSITION_EPS => {
            if let Some(c) =
                DualIntervalColorizer::make(a.color, b.color, c.color, d.color, b.position)
            {
                return Box::new(c);
            }
        }
        _ => {}
    }
    if trimmed.len() <= MAX_UNROLLED_COLORS {
        if let Some(c) = UnrolledBinaryColorizer::make(trimmed) {
            return Box::new(c);
        }
    }
    // Rasterize from the full stop list so interior hard stops survive.
    Box::new(TextureColorizer::new(stops, caps))
}

/// Two colors, one interval: `mix(start, end, t)`.
pub struct SingleIntervalColorizer {
    start: [f32; 4],
    end: [f32; 4],
}

impl SingleIntervalColorizer {
    pub fn new(start: [f32; 4], end: [f32; 4]) -> Self {
        Self { start, end }
    }
}

impl Processor for SingleIntervalColorizer {
    fn name(&self) -> &'static str {
        "SingleIntervalGradientColorizer"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for SingleIntervalColorizer {
    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let start = args.add_uniform(GlslType::Vec4, "u_start");
        let end = args.add_uniform(GlslType::Vec4, "u_end");
        let input = args.input().to_string();
        let out = args.output().to_string();
        args.code(&format!("{out} = mix({start}, {end}, {input}.x);"));
        Ok(())
    }

    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        data.set_vec4(&format!("u_start{suffix}"), self.start)?;
        data.set_vec4(&format!("u_end{suffix}"), self.end)
    }
}

/// Two intervals split at a baked threshold, each evaluated as
/// `t * scale + bias`.
pub struct DualIntervalColorizer {
    scale01: [f32; 4],
    bias01: [f32; 4],
    scale23: [f32; 4],
    bias23: [f32; 4],
    threshold: f32,
}

impl DualIntervalColorizer {
    /// Derive the interval coefficients, `None` when the threshold sits on
    /// an edge and one interval would degenerate.
    pub fn make(
        c0: [f32; 4],
        c1: [f32; 4],
        c2: [f32; 4],
        c3: [f32; 4],
        threshold: f32,
    ) -> Option<Self> {
        if threshold <= POSITION_EPS || threshold >= 1.0 - POSITION_EPS {
            return None;
        }
        let scale01: [f32; 4] = std::array::from_fn(|k| (c1[k] - c0[k]) / threshold);
        let scale23: [f32; 4] = std::array::from_fn(|k| (c3[k] - c2[k]) / (1.0 - threshold));
        let bias23: [f32; 4] = std::array::from_fn(|k| c2[k] - threshold * scale23[k]);
        Some(Self {
            scale01,
            bias01: c0,
            scale23,
            bias23,
            threshold,
        })
    }
}

impl Processor for DualIntervalColorizer {
    fn name(&self) -> &'static str {
        "DualIntervalGradientColorizer"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        key.push_f32(self.threshold);
    }
}

impl FragmentProcessor for DualIntervalColorizer {
    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let scale01 = args.add_uniform(GlslType::Vec4, "u_scale01");
        let bias01 = args.add_uniform(GlslType::Vec4, "u_bias01");
        let scale23 = args.add_uniform(GlslType::Vec4, "u_scale23");
        let bias23 = args.add_uniform(GlslType::Vec4, "u_bias23");
        let scale = args.mangle("scale");
        let bias = args.mangle("bias");
        let input = args.input().to_string();
        let out = args.output().to_string();
        let threshold = fmt_glsl_f32(self.threshold);

        args.code(&format!("vec4 {scale};"));
        args.code(&format!("vec4 {bias};"));
        args.code(&format!("if ({input}.x < {threshold}) {{"));
        args.code(&format!("{scale} = {scale01};"));
        args.code(&format!("{bias} = {bias01};"));
        args.code("} else {");
        args.code(&format!("{scale} = {scale23};"));
        args.code(&format!("{bias} = {bias23};"));
        args.code("}");
        args.code(&format!("{out} = {input}.x * {scale} + {bias};"));
        Ok(())
    }

    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        data.set_vec4(&format!("u_scale01{suffix}"), self.scale01)?;
        data.set_vec4(&format!("u_bias01{suffix}"), self.bias01)?;
        data.set_vec4(&format!("u_scale23{suffix}"), self.scale23)?;
        data.set_vec4(&format!("u_bias23{suffix}"), self.bias23)
    }
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    scale: [f32; 4],
    bias: [f32; 4],
}

/// Up to eight intervals selected by a baked binary search over the
/// interval thresholds.
pub struct UnrolledBinaryColorizer {
    intervals: Vec<Interval>,
    /// End position of each interval but the last.
    thresholds: Vec<f32>,
}

impl UnrolledBinaryColorizer {
    /// Build interval coefficients from adjacent stop pairs, skipping
    /// zero-width pairs. `None` when nothing remains or more than eight
    /// intervals would be needed.
    pub fn make(stops: &[GradientStop]) -> Option<Self> {
        let mut intervals = Vec::new();
        let mut thresholds = Vec::new();
        for pair in stops.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let width = b.position - a.position;
            if width <= POSITION_EPS {
                continue;
            }
            let scale: [f32; 4] = std::array::from_fn(|k| (b.color[k] - a.color[k]) / width);
            let bias: [f32; 4] = std::array::from_fn(|k| a.color[k] - a.position * scale[k]);
            intervals.push(Interval { scale, bias });
            thresholds.push(b.position);
        }
        thresholds.pop();
        if intervals.is_empty() || intervals.len() > MAX_UNROLLED_INTERVALS {
            return None;
        }
        Some(Self {
            intervals,
            thresholds,
        })
    }

    pub fn num_intervals(&self) -> usize {
        self.intervals.len()
    }

    fn emit_search(
        &self,
        args: &mut FragmentEmitArgs<'_, '_>,
        scales: &[String],
        biases: &[String],
        scale_var: &str,
        bias_var: &str,
        t: &str,
        lo: usize,
        hi: usize,
    ) {
        if lo == hi {
            args.code(&format!("{scale_var} = {};", scales[lo]));
            args.code(&format!("{bias_var} = {};", biases[lo]));
            return;
        }
        let mid = (lo + hi) / 2;
        let threshold = fmt_glsl_f32(self.thresholds[mid]);
        args.code(&format!("if ({t}.x < {threshold}) {{"));
        self.emit_search(args, scales, biases, scale_var, bias_var, t, lo, mid);
        args.code("} else {");
        self.emit_search(args, scales, biases, scale_var, bias_var, t, mid + 1, hi);
        args.code("}");
    }
}

impl Processor for UnrolledBinaryColorizer {
    fn name(&self) -> &'static str {
        "UnrolledBinaryGradientColorizer"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        key.push_u32(self.intervals.len() as u32);
        for t in &self.thresholds {
            key.push_f32(*t);
        }
    }
}

impl FragmentProcessor for UnrolledBinaryColorizer {
    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let scales: Vec<String> = (0..self.intervals.len())
            .map(|i| args.add_uniform(GlslType::Vec4, &format!("u_scale{i}")))
            .collect();
        let biases: Vec<String> = (0..self.intervals.len())
            .map(|i| args.add_uniform(GlslType::Vec4, &format!("u_bias{i}")))
            .collect();
        let scale_var = args.mangle("scale");
        let bias_var = args.mangle("bias");
        let input = args.input().to_string();
        let out = args.output().to_string();

        args.code(&format!("vec4 {scale_var};"));
        args.code(&format!("vec4 {bias_var};"));
        self.emit_search(
            args,
            &scales,
            &biases,
            &scale_var,
            &bias_var,
            &input,
            0,
            self.intervals.len() - 1,
        );
        args.code(&format!("{out} = {input}.x * {scale_var} + {bias_var};"));
        Ok(())
    }

    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        for (i, interval) in self.intervals.iter().enumerate() {
            data.set_vec4(&format!("u_scale{i}{suffix}"), interval.scale)?;
            data.set_vec4(&format!("u_bias{i}{suffix}"), interval.bias)?;
        }
        Ok(())
    }
}

/// Rasterized 1-D lookup strip sampled by `t`.
pub struct TextureColorizer {
    bitmap: LookupBitmap,
    samplers: [TextureSamplerRef; 1],
}

impl TextureColorizer {
    pub fn new(stops: &[GradientStop], caps: &ShaderCaps) -> Self {
        let format = if caps.high_precision_lookup {
            PixelFormat::RgbaF16
        } else {
            PixelFormat::Rgba8
        };
        let bitmap = rasterize_stops(stops, format);
        let samplers = [TextureSamplerRef::new(
            bitmap.desc(),
            Filter::Linear,
            WrapMode::Clamp,
        )];
        Self { bitmap, samplers }
    }

    /// The strip to upload for this colorizer's sampler slot.
    pub fn bitmap(&self) -> &LookupBitmap {
        &self.bitmap
    }
}

impl Processor for TextureColorizer {
    fn name(&self) -> &'static str {
        "TextureGradientColorizer"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for TextureColorizer {
    fn texture_samplers(&self) -> &[TextureSamplerRef] {
        &self.samplers
    }

    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let sampler = args.sampler(0).to_string();
        let input = args.input().to_string();
        let out = args.output().to_string();
        // map t to texel centers of the strip
        let scale = fmt_glsl_f32((LUT_WIDTH - 1) as f32 / LUT_WIDTH as f32);
        let bias = fmt_glsl_f32(0.5 / LUT_WIDTH as f32);
        args.code(&format!(
            "{out} = texture({sampler}, vec2({input}.x * {scale} + {bias}, 0.5));"
        ));
        Ok(())
    }
}

/// Piecewise-linear color of the stop sequence at parameter `t`.
fn color_at(stops: &[GradientStop], t: f32) -> [f32; 4] {
    let mut prev = stops[0];
    for &stop in &stops[1..] {
        if t <= stop.position {
            let width = stop.position - prev.position;
            if width <= f32::EPSILON {
                return stop.color;
            }
            let f = (t - prev.position) / width;
            return std::array::from_fn(|k| prev.color[k] + (stop.color[k] - prev.color[k]) * f);
        }
        prev = stop;
    }
    stops[stops.len() - 1].color
}

fn rasterize_stops(stops: &[GradientStop], format: PixelFormat) -> LookupBitmap {
    match format {
        PixelFormat::Rgba8 => {
            let image = image::RgbaImage::from_fn(LUT_WIDTH, 1, |x, _| {
                let c = color_at(stops, (x as f32 + 0.5) / LUT_WIDTH as f32);
                image::Rgba(c.map(|v| (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8))
            });
            LookupBitmap::from_rgba8(image)
        }
        PixelFormat::RgbaF16 => {
            let mut data = Vec::with_capacity(LUT_WIDTH as usize * 4);
            for x in 0..LUT_WIDTH {
                let c = color_at(stops, (x as f32 + 0.5) / LUT_WIDTH as f32);
                data.extend(c.map(half::f16::from_f32));
            }
            LookupBitmap::from_rgba_f16(LUT_WIDTH, data)
        }
    }
}
