//! GLSL program assembly.
//!
//! This module is organized into several submodules:
//! - `caps`: Shader capabilities of the target API
//! - `shader_builder`: Per-stage text accumulation and section ordering
//! - `uniform_handler`: Uniform and sampler declaration
//! - `varying_handler`: Inter-stage varyings
//! - `program_builder`: The orchestrator walking a `ProgramInfo`
//!
//! The main entry point is [`build_program_source`], which assembles the
//! vertex and fragment text for one draw description.

pub mod caps;
pub mod program_builder;
pub mod shader_builder;
pub mod uniform_handler;
pub mod varying_handler;

use std::sync::Arc;

use anyhow::Result;

use crate::program_info::ProgramInfo;
use crate::uniform_data::UniformLayout;

pub use caps::{GlslTarget, ShaderCaps};
pub use program_builder::{
    FragmentEmitArgs, GeometryEmitArgs, GeometryOutputs, ProgramBuilder, XferEmitArgs,
};

/// Shader stage a declaration or source string belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

/// GLSL value types used for uniforms and varyings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    Float,
    Int,
    Vec2,
    Vec3,
    Vec4,
    Mat3,
    Mat4,
}

impl GlslType {
    pub fn glsl_name(&self) -> &'static str {
        match self {
            GlslType::Float => "float",
            GlslType::Int => "int",
            GlslType::Vec2 => "vec2",
            GlslType::Vec3 => "vec3",
            GlslType::Vec4 => "vec4",
            GlslType::Mat3 => "mat3",
            GlslType::Mat4 => "mat4",
        }
    }

    /// std140 base alignment of the type inside a uniform block.
    pub fn std140_align(&self) -> usize {
        match self {
            GlslType::Float | GlslType::Int => 4,
            GlslType::Vec2 => 8,
            GlslType::Vec3 | GlslType::Vec4 | GlslType::Mat3 | GlslType::Mat4 => 16,
        }
    }

    /// Bytes the value occupies from its offset under std140. A mat3 is
    /// three vec3 columns on a 16-byte stride.
    pub fn std140_size(&self) -> usize {
        match self {
            GlslType::Float | GlslType::Int => 4,
            GlslType::Vec2 => 8,
            GlslType::Vec3 => 12,
            GlslType::Vec4 => 16,
            GlslType::Mat3 => 48,
            GlslType::Mat4 => 64,
        }
    }
}

/// A sampler uniform together with the texture binding point assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerBinding {
    pub name: String,
    pub stage: ShaderStage,
    pub binding: usize,
}

/// A std140 uniform block together with its binding point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockBinding {
    pub name: String,
    pub stage: ShaderStage,
    pub binding: usize,
}

/// Finished shader text plus everything the caller needs to feed it.
#[derive(Debug, Clone)]
pub struct ProgramSource {
    pub vertex: String,
    pub fragment: String,
    pub vertex_layout: Arc<UniformLayout>,
    pub fragment_layout: Arc<UniformLayout>,
    /// Value uniform blocks actually declared, at most one per stage.
    pub uniform_blocks: Vec<UniformBlockBinding>,
    /// Sampler name to texture binding point pairs, declaration order.
    pub samplers: Vec<SamplerBinding>,
    /// Vertex-stage coord matrix uniform names, in pipeline coord-transform
    /// order. Uploading transform values walks the same iteration order, so
    /// index `i` here pairs with the `i`-th transform of the draw.
    pub coord_uniforms: Vec<String>,
}

/// Assemble the vertex and fragment text for one draw description.
pub fn build_program_source(info: &ProgramInfo, caps: &ShaderCaps) -> Result<ProgramSource> {
    ProgramBuilder::new(info, caps).build()
}
