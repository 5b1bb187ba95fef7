//! Uniform and sampler declaration.
//!
//! Processors register uniforms under their final (already mangled) names
//! while emitting. At finalize the handler renders each stage's values as
//! one anonymous std140 block, so members are referenced unqualified in the
//! generated text, and produces the staging-buffer layouts the caller
//! uploads through. Binding points are fixed: block 0 for vertex values,
//! block 1 for fragment values, samplers from 2 up in declaration order.
//!
//! Sampler registration is the one operation here that can fail: a pipeline
//! asking for more fragment-stage samplers than the caps allow aborts the
//! whole program build.

use anyhow::{Result, bail};

use super::caps::ShaderCaps;
use super::shader_builder::ShaderBuilder;
use super::{GlslType, SamplerBinding, ShaderStage};

const FIRST_SAMPLER_BINDING: usize = 2;

pub fn block_name(stage: ShaderStage) -> &'static str {
    match stage {
        ShaderStage::Vertex => "VertexUniforms",
        ShaderStage::Fragment => "FragmentUniforms",
    }
}

pub fn block_binding(stage: ShaderStage) -> usize {
    match stage {
        ShaderStage::Vertex => 0,
        ShaderStage::Fragment => 1,
    }
}

#[derive(Debug, Clone)]
struct UniformDecl {
    stage: ShaderStage,
    ty: GlslType,
    name: String,
}

#[derive(Debug)]
pub struct UniformHandler {
    max_samplers: usize,
    uniforms: Vec<UniformDecl>,
    samplers: Vec<SamplerBinding>,
}

impl UniformHandler {
    pub fn new(caps: &ShaderCaps) -> Self {
        Self {
            max_samplers: caps.max_fragment_samplers,
            uniforms: Vec::new(),
            samplers: Vec::new(),
        }
    }

    /// Register a uniform, returning its name unchanged.
    ///
    /// Re-registering an identical declaration is a no-op so builder-level
    /// uniforms can be requested from more than one place. Mangling makes
    /// cross-processor collisions impossible; a same-name type conflict is
    /// a processor bug and only checked in debug builds.
    pub fn add_uniform(&mut self, stage: ShaderStage, ty: GlslType, name: &str) -> String {
        if let Some(existing) = self.uniforms.iter().find(|u| u.name == name) {
            debug_assert_eq!(existing.ty, ty, "uniform {name} redeclared with new type");
            debug_assert_eq!(existing.stage, stage, "uniform {name} redeclared in new stage");
            return name.to_string();
        }
        self.uniforms.push(UniformDecl {
            stage,
            ty,
            name: name.to_string(),
        });
        name.to_string()
    }

    /// Register a sampler and assign it the next texture binding point.
    ///
    /// Only fragment-stage samplers count against the caps; vertex-stage
    /// samplers take binding points but no budget.
    pub fn add_sampler(&mut self, stage: ShaderStage, name: &str) -> Result<String> {
        let in_fragment = self
            .samplers
            .iter()
            .filter(|s| s.stage == ShaderStage::Fragment)
            .count();
        if stage == ShaderStage::Fragment && in_fragment >= self.max_samplers {
            bail!(
                "program requires more than {} fragment samplers ({in_fragment} already declared, adding {name})",
                self.max_samplers,
            );
        }
        let binding = FIRST_SAMPLER_BINDING + self.samplers.len();
        self.samplers.push(SamplerBinding {
            name: name.to_string(),
            stage,
            binding,
        });
        Ok(name.to_string())
    }

    pub fn num_samplers(&self) -> usize {
        self.samplers.len()
    }

    pub fn samplers(&self) -> &[SamplerBinding] {
        &self.samplers
    }

    /// Render the declarations belonging to `stage` into its builder.
    pub fn append_declarations(&self, stage: ShaderStage, sb: &mut ShaderBuilder) {
        let fields: Vec<&UniformDecl> = self.uniforms.iter().filter(|u| u.stage == stage).collect();
        if !fields.is_empty() {
            sb.add_uniform_decl(&format!(
                "layout(std140, binding = {}) uniform {} {{",
                block_binding(stage),
                block_name(stage)
            ));
            for u in &fields {
                sb.add_uniform_decl(&format!("    {} {};", u.ty.glsl_name(), u.name));
            }
            sb.add_uniform_decl("};");
        }
        for s in self.samplers.iter().filter(|s| s.stage == stage) {
            sb.add_uniform_decl(&format!(
                "layout(binding = {}) uniform sampler2D {};",
                s.binding, s.name
            ));
        }
    }

    /// Uniform fields of `stage` in declaration order, for layout building.
    pub fn layout_fields(&self, stage: ShaderStage) -> Vec<(String, GlslType)> {
        self.uniforms
            .iter()
            .filter(|u| u.stage == stage)
            .map(|u| (u.name.clone(), u.ty))
            .collect()
    }
}
