//! The program builder.
//!
//! Walks one [`ProgramInfo`] and drives every processor's emission into the
//! two stage builders, then finalizes the assembled text. The builder owns
//! the mangle stack: while a processor emits, every name it mints or
//! registers is suffixed with `_P{index}` from the pipeline's processor
//! index map, which keeps same-type siblings from colliding. An index of -1
//! (a processor foreign to the pipeline) mangles to the empty suffix.
//!
//! Emission is single-pass and deterministic: identical pipeline
//! descriptions produce byte-identical shader text.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Result, bail};

use super::caps::ShaderCaps;
use super::shader_builder::ShaderBuilder;
use super::uniform_handler::{self, UniformHandler};
use super::varying_handler::{Varying, VaryingHandler};
use super::{GlslType, ProgramSource, ShaderStage, UniformBlockBinding};
use crate::fragment::{
    FragmentProcessor, FragmentProcessorIter, child_sampler_offset, child_transform_offset,
    count_coord_transforms, count_texture_samplers,
};
use crate::processor::Processor;
use crate::program_info::ProgramInfo;
use crate::uniform_data::UniformLayout;
use crate::utils::sanitize_glsl_ident;

/// Vertex uniform mapping device-space positions to clip space. Registered
/// outside any processor scope, so the name is never mangled.
pub const RT_ADJUST_UNIFORM: &str = "u_rt_adjust";

/// Fragment sampler holding a copy of the destination, present only when
/// the transfer processor reads dst.
pub const DST_SAMPLER_UNIFORM: &str = "u_dst_sampler";

/// Texel scale/offset turning `gl_FragCoord` into dst sampler coordinates:
/// `uv = gl_FragCoord.xy * value.xy + value.zw`.
pub const DST_TEXEL_SCALE_UNIFORM: &str = "u_dst_texel_scale";

pub struct ProgramBuilder<'a> {
    info: &'a ProgramInfo,
    caps: &'a ShaderCaps,
    vs: ShaderBuilder,
    fs: ShaderBuilder,
    uniform_handler: UniformHandler,
    varying_handler: VaryingHandler,
    stack: Vec<i32>,
    used_names: HashSet<String>,
    transformed_coord_vars: Vec<String>,
    coord_uniform_names: Vec<String>,
    fragment_sampler_names: Vec<String>,
    gp_sampler_names: Vec<String>,
}

impl<'a> ProgramBuilder<'a> {
    pub fn new(info: &'a ProgramInfo, caps: &'a ShaderCaps) -> Self {
        Self {
            info,
            caps,
            vs: ShaderBuilder::new(ShaderStage::Vertex, caps),
            fs: ShaderBuilder::new(ShaderStage::Fragment, caps),
            uniform_handler: UniformHandler::new(caps),
            varying_handler: VaryingHandler::new(),
            stack: Vec::new(),
            used_names: HashSet::new(),
            transformed_coord_vars: Vec::new(),
            coord_uniform_names: Vec::new(),
            fragment_sampler_names: Vec::new(),
            gp_sampler_names: Vec::new(),
        }
    }

    pub fn caps(&self) -> &ShaderCaps {
        self.caps
    }

    /// Assemble the full program.
    pub fn build(mut self) -> Result<ProgramSource> {
        let info = self.info;
        let outputs = self.emit_geometry()?;
        self.declare_fragment_samplers()?;

        let mut coord_cursor = 0;
        let mut sampler_cursor = 0;
        let mut color = outputs.color;
        for fp in info.color_fragments() {
            color = self.emit_fragment_root(fp.as_ref(), &color, coord_cursor, sampler_cursor)?;
            coord_cursor += count_coord_transforms(fp.as_ref());
            sampler_cursor += count_texture_samplers(fp.as_ref());
        }
        let mut coverage = outputs.coverage;
        for fp in info.coverage_fragments() {
            coverage =
                self.emit_fragment_root(fp.as_ref(), &coverage, coord_cursor, sampler_cursor)?;
            coord_cursor += count_coord_transforms(fp.as_ref());
            sampler_cursor += count_texture_samplers(fp.as_ref());
        }

        self.emit_xfer(&color, &coverage)?;
        Ok(self.finalize())
    }

    fn emit_geometry(&mut self) -> Result<GeometryOutputs> {
        let gp = self.info.geometry();
        for (i, attr) in gp.attributes().iter().enumerate() {
            self.vs.add_input_decl(&format!(
                "layout(location = {i}) in {} {};",
                attr.format.glsl_type(),
                attr.name
            ));
        }

        self.push_processor(gp);
        for (j, _sampler) in gp.texture_samplers().iter().enumerate() {
            let name = self.name_variable(&format!("u_gp_tex{j}"));
            self.uniform_handler.add_sampler(ShaderStage::Vertex, &name)?;
            self.gp_sampler_names.push(name);
        }
        self.vs.code_append(&format!("// {}", gp.name()));
        self.vs.code_append("{");
        let mut args = GeometryEmitArgs { pb: &mut *self };
        let outputs = gp.emit_code(&mut args)?;
        self.vs.code_append("}");
        self.pop_processor();
        Ok(outputs)
    }

    /// Declare every fragment-tree sampler up front, in pipeline pre-order.
    ///
    /// The flat declaration order is the same order the child-offset
    /// helpers assume, so a node's samplers sit at its slice base.
    fn declare_fragment_samplers(&mut self) -> Result<()> {
        let info = self.info;
        for root in info.fragments() {
            for node in FragmentProcessorIter::new(root.as_ref()) {
                let suffix = info.mangle_suffix(node);
                for j in 0..node.texture_samplers().len() {
                    let name = format!("u_tex{j}{suffix}");
                    self.uniform_handler
                        .add_sampler(ShaderStage::Fragment, &name)?;
                    self.fragment_sampler_names.push(name);
                }
            }
        }
        Ok(())
    }

    fn emit_fragment_root(
        &mut self,
        fp: &'a dyn FragmentProcessor,
        input: &str,
        coord_base: usize,
        sampler_base: usize,
    ) -> Result<String> {
        self.push_processor(fp);
        let in_var = self.name_variable("input");
        let out_var = self.name_variable("output");
        self.fs.code_append(&format!("// {}", fp.name()));
        self.fs.code_append(&format!("vec4 {in_var} = {input};"));
        self.fs.code_append(&format!("vec4 {out_var} = vec4(1.0);"));
        self.fs.code_append("{");
        let mut args = FragmentEmitArgs {
            pb: &mut *self,
            node: fp,
            input: in_var,
            output: out_var.clone(),
            coord_base,
            sampler_base,
        };
        fp.emit_code(&mut args)?;
        self.fs.code_append("}");
        self.pop_processor();
        Ok(out_var)
    }

    fn emit_xfer(&mut self, color: &str, coverage: &str) -> Result<()> {
        self.fs
            .add_output_decl("layout(location = 0) out vec4 o_color;");
        let xp = self.info.xfer();
        self.push_processor(xp);
        self.fs.code_append(&format!("// {}", xp.name()));
        let dst = if xp.will_read_dst() {
            self.uniform_handler
                .add_sampler(ShaderStage::Fragment, DST_SAMPLER_UNIFORM)?;
            self.uniform_handler.add_uniform(
                ShaderStage::Fragment,
                GlslType::Vec4,
                DST_TEXEL_SCALE_UNIFORM,
            );
            let dst_var = self.name_variable("dst_color");
            self.fs.code_append(&format!(
                "vec4 {dst_var} = texture({DST_SAMPLER_UNIFORM}, gl_FragCoord.xy * {DST_TEXEL_SCALE_UNIFORM}.xy + {DST_TEXEL_SCALE_UNIFORM}.zw);"
            ));
            Some(dst_var)
        } else {
            None
        };
        let mut args = XferEmitArgs {
            pb: &mut *self,
            color: color.to_string(),
            coverage: coverage.to_string(),
            output: "o_color",
            dst,
        };
        xp.emit_code(&mut args)?;
        self.pop_processor();

        let swizzle = self.info.swizzle();
        if !swizzle.is_identity() {
            let expr = swizzle.glsl_expr("o_color");
            self.fs.code_append(&format!("o_color = {expr};"));
        }
        Ok(())
    }

    fn finalize(mut self) -> ProgramSource {
        self.uniform_handler
            .append_declarations(ShaderStage::Vertex, &mut self.vs);
        self.uniform_handler
            .append_declarations(ShaderStage::Fragment, &mut self.fs);
        self.varying_handler
            .append_declarations(&mut self.vs, &mut self.fs);

        let vertex_layout = Arc::new(UniformLayout::new(
            self.uniform_handler.layout_fields(ShaderStage::Vertex),
        ));
        let fragment_layout = Arc::new(UniformLayout::new(
            self.uniform_handler.layout_fields(ShaderStage::Fragment),
        ));
        let mut uniform_blocks = Vec::new();
        for (stage, layout) in [
            (ShaderStage::Vertex, &vertex_layout),
            (ShaderStage::Fragment, &fragment_layout),
        ] {
            if !layout.is_empty() {
                uniform_blocks.push(UniformBlockBinding {
                    name: uniform_handler::block_name(stage).to_string(),
                    stage,
                    binding: uniform_handler::block_binding(stage),
                });
            }
        }

        ProgramSource {
            vertex: self.vs.finalize(),
            fragment: self.fs.finalize(),
            vertex_layout,
            fragment_layout,
            uniform_blocks,
            samplers: self.uniform_handler.samplers().to_vec(),
            coord_uniforms: self.coord_uniform_names,
        }
    }

    fn push_processor<P: Processor + ?Sized>(&mut self, p: &P) {
        self.stack.push(self.info.processor_index(p));
    }

    fn pop_processor(&mut self) {
        self.stack.pop();
    }

    fn current_suffix(&self) -> String {
        match self.stack.last() {
            Some(&idx) if idx >= 0 => format!("_P{idx}"),
            _ => String::new(),
        }
    }

    /// Mint a unique identifier from `base`, mangled for the current
    /// processor scope.
    pub fn name_variable(&mut self, base: &str) -> String {
        let base = format!("{}{}", sanitize_glsl_ident(base), self.current_suffix());
        let mut name = base.clone();
        let mut n: u32 = 2;
        while !self.used_names.insert(name.clone()) {
            name = format!("{base}_{n}");
            n += 1;
        }
        name
    }
}

/// What a geometry processor's emission hands back to the builder: the
/// fragment-stage expressions seeding the color and coverage chains.
#[derive(Debug, Clone)]
pub struct GeometryOutputs {
    pub color: String,
    pub coverage: String,
}

/// Emission context for the geometry processor.
pub struct GeometryEmitArgs<'x, 'a> {
    pb: &'x mut ProgramBuilder<'a>,
}

impl<'x, 'a> GeometryEmitArgs<'x, 'a> {
    /// Append one line to the vertex main body.
    pub fn code(&mut self, line: &str) {
        self.pb.vs.code_append(line);
    }

    /// Register a vertex uniform under a mangled name, returning the name.
    pub fn add_uniform(&mut self, ty: GlslType, base: &str) -> String {
        let name = self.pb.name_variable(base);
        self.pb
            .uniform_handler
            .add_uniform(ShaderStage::Vertex, ty, &name)
    }

    /// Register a varying under a mangled name.
    pub fn add_varying(&mut self, ty: GlslType, base: &str) -> Varying {
        let name = self.pb.name_variable(base);
        self.pb.varying_handler.add_varying(ty, &name)
    }

    /// Name of the geometry processor's `i`-th sampler uniform.
    pub fn sampler(&self, i: usize) -> &str {
        &self.pb.gp_sampler_names[i]
    }

    /// Declare and feed every coord transform of the pipeline.
    ///
    /// For transform `i` this declares a `u_coord_matrix_{i}` vertex
    /// uniform and a `v_transformed_coords_{i}` varying, and assigns
    /// `(matrix * vec3(local, 1.0)).xy` in the vertex body. Numbering
    /// follows pipeline coord-transform order, the same order transform
    /// values are uploaded in.
    pub fn emit_transforms(&mut self, local_coords: &str) {
        let info = self.pb.info;
        for (i, _entry) in info.pipeline_coord_transforms().enumerate() {
            let uniform = self.pb.uniform_handler.add_uniform(
                ShaderStage::Vertex,
                GlslType::Mat3,
                &format!("u_coord_matrix_{i}"),
            );
            let varying = self
                .pb
                .varying_handler
                .add_varying(GlslType::Vec2, &format!("v_transformed_coords_{i}"));
            self.pb.vs.code_append(&format!(
                "{} = ({uniform} * vec3({local_coords}, 1.0)).xy;",
                varying.name
            ));
            self.pb.transformed_coord_vars.push(varying.name);
            self.pb.coord_uniform_names.push(uniform);
        }
    }

    /// Write the clip-space position from a device-space vec2 expression.
    ///
    /// `pos_xy` is inlined per component, so it must be a plain variable
    /// or attribute name.
    pub fn emit_position(&mut self, pos_xy: &str) {
        self.pb.uniform_handler.add_uniform(
            ShaderStage::Vertex,
            GlslType::Vec4,
            RT_ADJUST_UNIFORM,
        );
        self.pb.vs.code_append(&format!(
            "gl_Position = vec4({pos_xy}.x * {RT_ADJUST_UNIFORM}.x + {RT_ADJUST_UNIFORM}.y, {pos_xy}.y * {RT_ADJUST_UNIFORM}.z + {RT_ADJUST_UNIFORM}.w, 0.0, 1.0);"
        ));
    }
}

/// Emission context for one fragment processor node.
pub struct FragmentEmitArgs<'x, 'a> {
    pb: &'x mut ProgramBuilder<'a>,
    node: &'a dyn FragmentProcessor,
    input: String,
    output: String,
    coord_base: usize,
    sampler_base: usize,
}

impl<'x, 'a> FragmentEmitArgs<'x, 'a> {
    /// Expression holding this node's input color. Always a valid vec4.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Variable this node must assign its output color to.
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Append one line to the fragment main body.
    pub fn code(&mut self, line: &str) {
        self.pb.fs.code_append(line);
    }

    /// Append a function definition to the fragment functions section.
    pub fn add_function(&mut self, definition: &str) {
        self.pb.fs.add_function(definition);
    }

    /// Mint a unique mangled identifier.
    pub fn mangle(&mut self, base: &str) -> String {
        self.pb.name_variable(base)
    }

    /// Register a fragment uniform under a mangled name.
    pub fn add_uniform(&mut self, ty: GlslType, base: &str) -> String {
        let name = self.pb.name_variable(base);
        self.pb
            .uniform_handler
            .add_uniform(ShaderStage::Fragment, ty, &name)
    }

    /// Varying holding this node's `i`-th transformed coordinates.
    pub fn transformed_coords(&self, i: usize) -> &str {
        &self.pb.transformed_coord_vars[self.coord_base + i]
    }

    /// Sampler uniform name for this node's `i`-th texture sampler.
    pub fn sampler(&self, i: usize) -> &str {
        &self.pb.fragment_sampler_names[self.sampler_base + i]
    }

    /// Emit a child processor and return the variable holding its output.
    ///
    /// `input` is the color expression the child sees; pass `"vec4(1.0)"`
    /// for children that should start from the implicit default.
    pub fn emit_child(&mut self, child_index: usize, input: &str) -> Result<String> {
        let children = self.node.children();
        if child_index >= children.len() {
            bail!(
                "{} has {} children, no child {child_index}",
                self.node.name(),
                children.len()
            );
        }
        let child: &'a dyn FragmentProcessor = children[child_index].as_ref();
        let coord_base = self.coord_base + child_transform_offset(self.node, child_index);
        let sampler_base = self.sampler_base + child_sampler_offset(self.node, child_index);

        self.pb.push_processor(child);
        let in_var = self.pb.name_variable("child_input");
        let out_var = self.pb.name_variable("child_output");
        self.pb.fs.code_append(&format!("// child: {}", child.name()));
        self.pb.fs.code_append(&format!("vec4 {in_var} = {input};"));
        self.pb
            .fs
            .code_append(&format!("vec4 {out_var} = vec4(1.0);"));
        self.pb.fs.code_append("{");
        let mut child_args = FragmentEmitArgs {
            pb: &mut *self.pb,
            node: child,
            input: in_var,
            output: out_var.clone(),
            coord_base,
            sampler_base,
        };
        child.emit_code(&mut child_args)?;
        self.pb.fs.code_append("}");
        self.pb.pop_processor();
        Ok(out_var)
    }
}

/// Emission context for the transfer processor.
pub struct XferEmitArgs<'x, 'a> {
    pb: &'x mut ProgramBuilder<'a>,
    color: String,
    coverage: String,
    output: &'static str,
    dst: Option<String>,
}

impl<'x, 'a> XferEmitArgs<'x, 'a> {
    /// Final color of the fragment chain.
    pub fn input_color(&self) -> &str {
        &self.color
    }

    /// Final coverage of the fragment chain.
    pub fn input_coverage(&self) -> &str {
        &self.coverage
    }

    /// The fragment output variable.
    pub fn output(&self) -> &str {
        self.output
    }

    /// Variable holding the sampled destination color, when dst is read.
    pub fn dst_color(&self) -> Option<&str> {
        self.dst.as_deref()
    }

    pub fn code(&mut self, line: &str) {
        self.pb.fs.code_append(line);
    }

    pub fn add_function(&mut self, definition: &str) {
        self.pb.fs.add_function(definition);
    }

    pub fn mangle(&mut self, base: &str) -> String {
        self.pb.name_variable(base)
    }

    pub fn add_uniform(&mut self, ty: GlslType, base: &str) -> String {
        let name = self.pb.name_variable(base);
        self.pb
            .uniform_handler
            .add_uniform(ShaderStage::Fragment, ty, &name)
    }
}
