//! Geometry processors and vertex attributes.
//!
//! The geometry processor owns the draw's vertex attributes, writes the
//! vertex stage (clip-space position, varyings, coord transform feeding),
//! and seeds the fragment stage's color and coverage chains.

use anyhow::Result;

use crate::glsl::program_builder::{GeometryEmitArgs, GeometryOutputs};
use crate::key::KeyBuilder;
use crate::processor::{ClassId, Processor, class_id_of};
use crate::texture::TextureSamplerRef;
use crate::uniform_data::UniformData;

/// Storage format of one vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrFormat {
    Float,
    Float2,
    Float3,
    Float4,
}

impl AttrFormat {
    pub fn glsl_type(&self) -> &'static str {
        match self {
            AttrFormat::Float => "float",
            AttrFormat::Float2 => "vec2",
            AttrFormat::Float3 => "vec3",
            AttrFormat::Float4 => "vec4",
        }
    }

    pub fn key_byte(&self) -> u8 {
        match self {
            AttrFormat::Float => 0,
            AttrFormat::Float2 => 1,
            AttrFormat::Float3 => 2,
            AttrFormat::Float4 => 3,
        }
    }

    pub fn size_bytes(&self) -> usize {
        match self {
            AttrFormat::Float => 4,
            AttrFormat::Float2 => 8,
            AttrFormat::Float3 => 12,
            AttrFormat::Float4 => 16,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub format: AttrFormat,
}

/// The processor owning the vertex stage of a pipeline.
///
/// Its emission must call
/// [`emit_transforms`](crate::glsl::program_builder::GeometryEmitArgs::emit_transforms)
/// exactly once (even for pipelines without transforms) so fragment
/// processors can reach their transformed coordinates.
pub trait GeometryProcessor: Processor {
    /// Active vertex attributes, in binding order. Formats participate in
    /// the program key at the pipeline level.
    fn attributes(&self) -> &[VertexAttribute];

    fn texture_samplers(&self) -> &[TextureSamplerRef] {
        &[]
    }

    fn emit_code(&self, args: &mut GeometryEmitArgs<'_, '_>) -> Result<GeometryOutputs>;

    /// Write this processor's uniform values for one draw.
    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        let _ = (suffix, data);
        Ok(())
    }
}

/// Device-space to clip-space coefficients for the rt-adjust uniform.
///
/// `x_clip = x * v[0] + v[1]`, `y_clip = y * v[2] + v[3]`.
pub fn rt_adjust_for(width: f32, height: f32, origin_top_left: bool) -> [f32; 4] {
    if origin_top_left {
        [2.0 / width, -1.0, -2.0 / height, 1.0]
    } else {
        [2.0 / width, -1.0, 2.0 / height, -1.0]
    }
}

/// Textured-quad geometry: device-space position plus local coordinates,
/// optionally a per-vertex color.
#[derive(Debug, Clone)]
pub struct QuadGeometryProcessor {
    attrs: Vec<VertexAttribute>,
    has_color: bool,
}

impl QuadGeometryProcessor {
    pub fn new(has_color: bool) -> Self {
        let mut attrs = vec![
            VertexAttribute {
                name: "a_position",
                format: AttrFormat::Float2,
            },
            VertexAttribute {
                name: "a_local_coords",
                format: AttrFormat::Float2,
            },
        ];
        if has_color {
            attrs.push(VertexAttribute {
                name: "a_color",
                format: AttrFormat::Float4,
            });
        }
        Self { attrs, has_color }
    }

    pub fn vertex_stride(&self) -> usize {
        self.attrs.iter().map(|a| a.format.size_bytes()).sum()
    }
}

impl Processor for QuadGeometryProcessor {
    fn name(&self) -> &'static str {
        "QuadGeometry"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        key.push_bool(self.has_color);
    }
}

impl GeometryProcessor for QuadGeometryProcessor {
    fn attributes(&self) -> &[VertexAttribute] {
        &self.attrs
    }

    fn emit_code(&self, args: &mut GeometryEmitArgs<'_, '_>) -> Result<GeometryOutputs> {
        args.emit_transforms("a_local_coords");
        let color = if self.has_color {
            let v = args.add_varying(crate::glsl::GlslType::Vec4, "v_color");
            args.code(&format!("{} = a_color;", v.name));
            v.name
        } else {
            "vec4(1.0)".to_string()
        };
        args.emit_position("a_position");
        Ok(GeometryOutputs {
            color,
            coverage: "vec4(1.0)".to_string(),
        })
    }
}
