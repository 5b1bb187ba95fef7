//! Per-stage shader text accumulation.
//!
//! Declarations and code land in named sections while processors emit, and
//! [`ShaderBuilder::finalize`] concatenates the sections in a fixed order:
//! version, extensions, definitions, precision, uniforms, inputs, outputs,
//! functions, main. Emission order inside a section is append order, so the
//! assembled text is deterministic for a given emission sequence.

use std::fmt::Write as _;

use super::ShaderStage;
use super::caps::ShaderCaps;

#[derive(Debug)]
pub struct ShaderBuilder {
    stage: ShaderStage,
    version: String,
    extensions: String,
    definitions: String,
    precision: String,
    uniforms: String,
    inputs: String,
    outputs: String,
    functions: String,
    code: String,
}

impl ShaderBuilder {
    pub fn new(stage: ShaderStage, caps: &ShaderCaps) -> Self {
        let mut precision = String::new();
        if let Some(line) = caps.precision_line() {
            precision.push_str(line);
            precision.push('\n');
        }
        Self {
            stage,
            version: format!("{}\n", caps.version_line()),
            extensions: String::new(),
            definitions: String::new(),
            precision,
            uniforms: String::new(),
            inputs: String::new(),
            outputs: String::new(),
            functions: String::new(),
            code: String::new(),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn add_extension(&mut self, name: &str) {
        let _ = writeln!(self.extensions, "#extension {name} : require");
    }

    pub fn add_definition(&mut self, define: &str) {
        let _ = writeln!(self.definitions, "#define {define}");
    }

    pub fn add_uniform_decl(&mut self, decl: &str) {
        self.uniforms.push_str(decl);
        self.uniforms.push('\n');
    }

    pub fn add_input_decl(&mut self, decl: &str) {
        self.inputs.push_str(decl);
        self.inputs.push('\n');
    }

    pub fn add_output_decl(&mut self, decl: &str) {
        self.outputs.push_str(decl);
        self.outputs.push('\n');
    }

    /// Append a complete function definition to the functions section.
    pub fn add_function(&mut self, definition: &str) {
        self.functions.push_str(definition);
        if !definition.ends_with('\n') {
            self.functions.push('\n');
        }
    }

    /// Append one line to the body of `main`.
    pub fn code_append(&mut self, line: &str) {
        self.code.push_str("  ");
        self.code.push_str(line);
        self.code.push('\n');
    }

    /// Append preformatted text to the body of `main` verbatim.
    pub fn code_append_raw(&mut self, text: &str) {
        self.code.push_str(text);
        if !text.ends_with('\n') {
            self.code.push('\n');
        }
    }

    pub fn finalize(&self) -> String {
        let mut out = String::with_capacity(
            self.version.len()
                + self.extensions.len()
                + self.definitions.len()
                + self.precision.len()
                + self.uniforms.len()
                + self.inputs.len()
                + self.outputs.len()
                + self.functions.len()
                + self.code.len()
                + 32,
        );
        out.push_str(&self.version);
        out.push_str(&self.extensions);
        out.push_str(&self.definitions);
        out.push_str(&self.precision);
        out.push_str(&self.uniforms);
        out.push_str(&self.inputs);
        out.push_str(&self.outputs);
        out.push_str(&self.functions);
        out.push_str("void main() {\n");
        out.push_str(&self.code);
        out.push_str("}\n");
        out
    }
}
