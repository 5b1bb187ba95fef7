//! Generated-shader validation using the naga library.

use anyhow::{Context, Result, anyhow};

use crate::glsl::{ProgramSource, ShaderStage};

/// Parse and validate one stage of generated GLSL.
///
/// # Arguments
/// * `source` - The GLSL source code to validate
/// * `stage` - Which pipeline stage the source belongs to
///
/// # Returns
/// The parsed naga Module on success, or an error with the numbered source
/// text attached on failure.
pub fn validate_glsl(source: &str, stage: ShaderStage) -> Result<naga::Module> {
    let shader_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    let mut parser = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options {
        stage: shader_stage,
        defines: Default::default(),
    };

    let module = parser.parse(&options, source).map_err(|e| {
        anyhow!(
            "GLSL parse failed: {e:?}\n{}",
            numbered_source(source)
        )
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| {
        anyhow!(
            "GLSL validation failed: {e:?}\n{}",
            numbered_source(source)
        )
    })?;

    Ok(module)
}

/// Validate both stages of an assembled program.
pub fn validate_program_source(source: &ProgramSource) -> Result<()> {
    validate_glsl(&source.vertex, ShaderStage::Vertex).context("vertex stage")?;
    validate_glsl(&source.fragment, ShaderStage::Fragment).context("fragment stage")?;
    Ok(())
}

/// Line-numbered source context for error messages.
fn numbered_source(source: &str) -> String {
    let mut output = String::new();
    output.push_str("Generated GLSL:\n");
    output.push_str("---\n");
    for (line_num, line) in source.lines().enumerate() {
        output.push_str(&format!("{:4} | {}\n", line_num + 1, line));
    }
    output.push_str("---\n");
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_vertex_glsl_passes() {
        let source = r#"#version 450
layout(location = 0) in vec2 a_position;
layout(location = 0) out vec2 v_coords;
void main() {
    v_coords = a_position;
    gl_Position = vec4(a_position, 0.0, 1.0);
}
"#;
        assert!(validate_glsl(source, ShaderStage::Vertex).is_ok());
    }

    #[test]
    fn valid_fragment_glsl_passes() {
        let source = r#"#version 450
layout(std140, binding = 1) uniform FragmentUniforms {
    vec4 u_color;
};
layout(location = 0) out vec4 o_color;
void main() {
    o_color = u_color;
}
"#;
        assert!(validate_glsl(source, ShaderStage::Fragment).is_ok());
    }

    #[test]
    fn es_profile_fragment_passes() {
        let source = r#"#version 310 es
precision highp float;
layout(location = 0) out vec4 o_color;
void main() {
    o_color = vec4(1.0);
}
"#;
        assert!(validate_glsl(source, ShaderStage::Fragment).is_ok());
    }

    #[test]
    fn syntax_error_reports_numbered_source() {
        let source = "#version 450\nvoid main( {\n}\n";
        let err = validate_glsl(source, ShaderStage::Fragment).unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("1 | #version 450"), "missing context:\n{msg}");
    }

    #[test]
    fn wrong_stage_fails() {
        let source = r#"#version 450
layout(location = 0) in vec2 a_position;
void main() {
    gl_Position = vec4(a_position, 0.0, 1.0);
}
"#;
        assert!(validate_glsl(source, ShaderStage::Fragment).is_err());
    }
}
