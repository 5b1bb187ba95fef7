//! Inter-stage varyings.
//!
//! A varying registered here is declared as a vertex output and a fragment
//! input under the same name and location, so the two stages always agree.

use super::GlslType;
use super::shader_builder::ShaderBuilder;

#[derive(Debug, Clone)]
pub struct Varying {
    pub ty: GlslType,
    pub name: String,
    pub location: usize,
}

#[derive(Debug, Default)]
pub struct VaryingHandler {
    varyings: Vec<Varying>,
}

impl VaryingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a varying under its final name, assigning the next location.
    pub fn add_varying(&mut self, ty: GlslType, name: &str) -> Varying {
        let v = Varying {
            ty,
            name: name.to_string(),
            location: self.varyings.len(),
        };
        self.varyings.push(v.clone());
        v
    }

    pub fn varyings(&self) -> &[Varying] {
        &self.varyings
    }

    /// Render matched out/in declarations into both stage builders.
    pub fn append_declarations(&self, vs: &mut ShaderBuilder, fs: &mut ShaderBuilder) {
        for v in &self.varyings {
            vs.add_output_decl(&format!(
                "layout(location = {}) out {} {};",
                v.location,
                v.ty.glsl_name(),
                v.name
            ));
            fs.add_input_decl(&format!(
                "layout(location = {}) in {} {};",
                v.location,
                v.ty.glsl_name(),
                v.name
            ));
        }
    }
}
