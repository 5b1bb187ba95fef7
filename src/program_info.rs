//! The full description of one draw's program.
//!
//! A [`ProgramInfo`] owns the geometry processor, the fragment trees
//! (color chain then coverage chain), and the transfer processor. On
//! construction it assigns every owned processor a dense index in a fixed
//! walk order; the index drives name mangling, so a processor's generated
//! names depend only on the pipeline's structure, never on allocation
//! order or addresses.

use std::collections::HashMap;

use crate::fragment::{
    CoordTransform, CoordTransformIter, FragmentProcessor, FragmentProcessorIter,
    count_coord_transforms, count_texture_samplers,
};
use crate::geometry::GeometryProcessor;
use crate::glsl::ShaderCaps;
use crate::key::{KeyBuilder, ProgramKey};
use crate::processor::{Processor, data_ptr};
use crate::swizzle::Swizzle;
use crate::xfer::{BlendFormula, BlendMode, PorterDuffXfer, XferProcessor};

pub struct ProgramInfo {
    geometry: Box<dyn GeometryProcessor>,
    /// Color roots first, coverage roots after.
    fragments: Vec<Box<dyn FragmentProcessor>>,
    num_color_fragments: usize,
    xfer: Box<dyn XferProcessor>,
    blend_mode: BlendMode,
    swizzle: Swizzle,
    index_by_ptr: HashMap<usize, i32>,
    num_processors: usize,
}

impl ProgramInfo {
    pub fn new(
        geometry: Box<dyn GeometryProcessor>,
        color_fragments: Vec<Box<dyn FragmentProcessor>>,
        coverage_fragments: Vec<Box<dyn FragmentProcessor>>,
        blend_mode: BlendMode,
        swizzle: Swizzle,
    ) -> Self {
        let num_color_fragments = color_fragments.len();
        let mut fragments = color_fragments;
        fragments.extend(coverage_fragments);
        let mut info = Self {
            geometry,
            fragments,
            num_color_fragments,
            xfer: Box::new(PorterDuffXfer::new(blend_mode)),
            blend_mode,
            swizzle,
            index_by_ptr: HashMap::new(),
            num_processors: 0,
        };
        info.update_processor_indices();
        info
    }

    /// Replace the default Porter-Duff transfer with an explicit one.
    pub fn with_xfer(mut self, xfer: Box<dyn XferProcessor>) -> Self {
        self.xfer = xfer;
        self.update_processor_indices();
        self
    }

    /// Assign dense indices: geometry first, fragment trees in pre-order,
    /// transfer last. Keyed by node address; the pipeline owns every node,
    /// so addresses are stable and unique for its lifetime.
    fn update_processor_indices(&mut self) {
        let mut map = HashMap::new();
        let mut next: i32 = 0;
        map.insert(data_ptr(self.geometry.as_ref()) as usize, next);
        next += 1;
        for root in &self.fragments {
            for node in FragmentProcessorIter::new(root.as_ref()) {
                map.insert(data_ptr(node) as usize, next);
                next += 1;
            }
        }
        map.insert(data_ptr(self.xfer.as_ref()) as usize, next);
        next += 1;
        self.num_processors = next as usize;
        debug_assert_eq!(
            map.len(),
            self.num_processors,
            "processor addresses must be distinct; a zero-sized node collapses the index map"
        );
        self.index_by_ptr = map;
    }

    /// Index of a processor owned by this pipeline, -1 for foreign ones.
    pub fn processor_index<P: Processor + ?Sized>(&self, p: &P) -> i32 {
        self.index_by_ptr
            .get(&(data_ptr(p) as usize))
            .copied()
            .unwrap_or(-1)
    }

    /// Name suffix isolating a processor's identifiers, empty for foreign
    /// processors.
    pub fn mangle_suffix<P: Processor + ?Sized>(&self, p: &P) -> String {
        let idx = self.processor_index(p);
        if idx < 0 {
            String::new()
        } else {
            format!("_P{idx}")
        }
    }

    pub fn num_processors(&self) -> usize {
        self.num_processors
    }

    pub fn geometry(&self) -> &dyn GeometryProcessor {
        self.geometry.as_ref()
    }

    pub fn fragments(&self) -> &[Box<dyn FragmentProcessor>] {
        &self.fragments
    }

    pub fn color_fragments(&self) -> &[Box<dyn FragmentProcessor>] {
        &self.fragments[..self.num_color_fragments]
    }

    pub fn coverage_fragments(&self) -> &[Box<dyn FragmentProcessor>] {
        &self.fragments[self.num_color_fragments..]
    }

    pub fn xfer(&self) -> &dyn XferProcessor {
        self.xfer.as_ref()
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn swizzle(&self) -> Swizzle {
        self.swizzle
    }

    pub fn has_coverage(&self) -> bool {
        self.fragments.len() > self.num_color_fragments
    }

    /// Every fragment node of the pipeline, tree by tree in pre-order.
    pub fn all_fragment_processors(&self) -> impl Iterator<Item = &dyn FragmentProcessor> {
        self.fragments
            .iter()
            .flat_map(|root| FragmentProcessorIter::new(root.as_ref()))
    }

    /// Every coord transform of the pipeline with its owning node, in the
    /// canonical numbering order used for varyings and uploads.
    pub fn pipeline_coord_transforms(
        &self,
    ) -> impl Iterator<Item = (&dyn FragmentProcessor, &CoordTransform)> {
        self.fragments
            .iter()
            .flat_map(|root| CoordTransformIter::new(root.as_ref()))
    }

    pub fn num_coord_transforms(&self) -> usize {
        self.fragments
            .iter()
            .map(|root| count_coord_transforms(root.as_ref()))
            .sum()
    }

    pub fn num_fragment_samplers(&self) -> usize {
        self.fragments
            .iter()
            .map(|root| count_texture_samplers(root.as_ref()))
            .sum()
    }

    /// Fixed-function blend coefficients, `None` when the transfer
    /// processor blends in the shader.
    pub fn blend_formula(&self) -> Option<BlendFormula> {
        self.xfer.blend_formula(self.has_coverage())
    }

    /// Build the structural key for this pipeline under the given caps.
    ///
    /// Equal keys guarantee byte-identical generated text. Runtime-only
    /// state (uniform values, texture contents) never lands here; anything
    /// baked into the text as a literal must.
    pub fn program_key(&self, caps: &ShaderCaps) -> ProgramKey {
        let mut key = KeyBuilder::new();
        key.push_u8(caps.key_tag());

        let gp = self.geometry.as_ref();
        key.push_u32(gp.class_id().raw());
        gp.key_coefficients(&mut key);
        key.push_u32(gp.attributes().len() as u32);
        for attr in gp.attributes() {
            key.push_str(attr.name);
            key.push_u8(attr.format.key_byte());
        }
        key.push_u32(gp.texture_samplers().len() as u32);
        for s in gp.texture_samplers() {
            s.config_key(&mut key);
        }

        key.push_u32(self.fragments.len() as u32);
        key.push_u32(self.num_color_fragments as u32);
        for root in &self.fragments {
            // Pre-order flatten; child counts keep distinct tree shapes
            // from producing equal byte streams.
            for node in FragmentProcessorIter::new(root.as_ref()) {
                key.push_u32(node.class_id().raw());
                key.push_u32(node.children().len() as u32);
                key.push_u32(node.coord_transforms().len() as u32);
                key.push_u32(node.texture_samplers().len() as u32);
                node.key_coefficients(&mut key);
                for s in node.texture_samplers() {
                    s.config_key(&mut key);
                }
            }
        }

        key.push_u32(self.xfer.class_id().raw());
        key.push_bool(self.xfer.will_read_dst());
        self.xfer.key_coefficients(&mut key);
        key.push_u8(self.blend_mode.key_byte());
        self.swizzle.key(&mut key);
        key.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::effects::{
        ConstColorProcessor, InputMode, PremulAlphaProcessor, SeriesProcessor,
    };
    use crate::geometry::QuadGeometryProcessor;
    use crate::xfer::{BlendCoeff, DstBlendMode, DstReadXfer};

    fn const_color(c: [f32; 4]) -> Box<dyn FragmentProcessor> {
        Box::new(ConstColorProcessor::new(c, InputMode::ModulateRgba))
    }

    fn series_pipeline(color: [f32; 4]) -> ProgramInfo {
        let tree = SeriesProcessor::make(vec![
            const_color(color),
            Box::new(PremulAlphaProcessor::new()),
        ])
        .unwrap();
        ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![tree],
            Vec::new(),
            BlendMode::SrcOver,
            Swizzle::RGBA,
        )
    }

    #[test]
    fn indices_are_dense_in_walk_order() {
        let info = series_pipeline([1.0; 4]);
        assert_eq!(info.processor_index(info.geometry()), 0);
        let indices: Vec<i32> = info
            .all_fragment_processors()
            .map(|p| info.processor_index(p))
            .collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(info.processor_index(info.xfer()), 4);
        assert_eq!(info.num_processors(), 5);
    }

    #[test]
    fn identical_pipelines_assign_identical_indices() {
        let a = series_pipeline([1.0; 4]);
        let b = series_pipeline([0.25, 0.5, 0.75, 1.0]);
        let ia: Vec<i32> = a
            .all_fragment_processors()
            .map(|p| a.processor_index(p))
            .collect();
        let ib: Vec<i32> = b
            .all_fragment_processors()
            .map(|p| b.processor_index(p))
            .collect();
        assert_eq!(ia, ib);
    }

    #[test]
    fn repeated_parameterless_processors_keep_distinct_indices() {
        // one premul nested in the color chain, one as the coverage root
        let info = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![SeriesProcessor::make(vec![
                const_color([1.0; 4]),
                Box::new(PremulAlphaProcessor::new()),
            ])
            .unwrap()],
            vec![Box::new(PremulAlphaProcessor::new())],
            BlendMode::SrcOver,
            Swizzle::RGBA,
        );

        let mut indices = vec![info.processor_index(info.geometry())];
        indices.extend(info.all_fragment_processors().map(|p| info.processor_index(p)));
        indices.push(info.processor_index(info.xfer()));
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);

        let suffixes: Vec<String> = info
            .all_fragment_processors()
            .filter(|p| p.name() == "PremulAlpha")
            .map(|p| info.mangle_suffix(p))
            .collect();
        assert_eq!(suffixes, vec!["_P3".to_string(), "_P4".to_string()]);
    }

    #[test]
    fn foreign_processor_maps_to_minus_one_and_empty_suffix() {
        let info = series_pipeline([1.0; 4]);
        let outsider = ConstColorProcessor::new([0.0; 4], InputMode::Ignore);
        assert_eq!(info.processor_index(&outsider), -1);
        assert_eq!(info.mangle_suffix(&outsider), "");
        assert_eq!(info.mangle_suffix(info.xfer()), "_P4");
    }

    #[test]
    fn key_ignores_uniform_values_but_keeps_structure() {
        let caps = ShaderCaps::default();
        let a = series_pipeline([1.0, 0.0, 0.0, 1.0]);
        let b = series_pipeline([0.0, 1.0, 0.0, 1.0]);
        assert_eq!(a.program_key(&caps), b.program_key(&caps));

        let different_mode = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![SeriesProcessor::make(vec![
                Box::new(ConstColorProcessor::new([1.0; 4], InputMode::Ignore)),
                Box::new(PremulAlphaProcessor::new()),
            ])
            .unwrap()],
            Vec::new(),
            BlendMode::SrcOver,
            Swizzle::RGBA,
        );
        assert_ne!(a.program_key(&caps), different_mode.program_key(&caps));
    }

    #[test]
    fn key_covers_pipeline_state_and_caps() {
        let caps = ShaderCaps::default();
        let base = series_pipeline([1.0; 4]);

        let blend = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![SeriesProcessor::make(vec![
                const_color([1.0; 4]),
                Box::new(PremulAlphaProcessor::new()),
            ])
            .unwrap()],
            Vec::new(),
            BlendMode::DstIn,
            Swizzle::RGBA,
        );
        assert_ne!(base.program_key(&caps), blend.program_key(&caps));

        let swizzled = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![SeriesProcessor::make(vec![
                const_color([1.0; 4]),
                Box::new(PremulAlphaProcessor::new()),
            ])
            .unwrap()],
            Vec::new(),
            BlendMode::SrcOver,
            Swizzle::BGRA,
        );
        assert_ne!(base.program_key(&caps), swizzled.program_key(&caps));

        let gp_attrs = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(true)),
            vec![SeriesProcessor::make(vec![
                const_color([1.0; 4]),
                Box::new(PremulAlphaProcessor::new()),
            ])
            .unwrap()],
            Vec::new(),
            BlendMode::SrcOver,
            Swizzle::RGBA,
        );
        assert_ne!(base.program_key(&caps), gp_attrs.program_key(&caps));

        assert_ne!(
            base.program_key(&caps),
            base.program_key(&ShaderCaps::gles())
        );
    }

    #[test]
    fn key_distinguishes_tree_shapes() {
        let caps = ShaderCaps::default();
        // series(a, series(b, c)) vs series(a, b, c): same node multiset,
        // different nesting
        let nested = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![SeriesProcessor::make(vec![
                const_color([1.0; 4]),
                SeriesProcessor::make(vec![
                    Box::new(PremulAlphaProcessor::new()),
                    const_color([1.0; 4]),
                ])
                .unwrap(),
            ])
            .unwrap()],
            Vec::new(),
            BlendMode::SrcOver,
            Swizzle::RGBA,
        );
        let flat = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![SeriesProcessor::make(vec![
                const_color([1.0; 4]),
                Box::new(PremulAlphaProcessor::new()),
                const_color([1.0; 4]),
            ])
            .unwrap()],
            Vec::new(),
            BlendMode::SrcOver,
            Swizzle::RGBA,
        );
        assert_ne!(nested.program_key(&caps), flat.program_key(&caps));
    }

    #[test]
    fn coverage_presence_reaches_blend_formula() {
        let opaque = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![const_color([1.0; 4])],
            Vec::new(),
            BlendMode::Src,
            Swizzle::RGBA,
        );
        assert_eq!(
            opaque.blend_formula().map(|f| f.dst),
            Some(BlendCoeff::Zero)
        );

        let covered = ProgramInfo::new(
            Box::new(QuadGeometryProcessor::new(false)),
            vec![const_color([1.0; 4])],
            vec![Box::new(PremulAlphaProcessor::new())],
            BlendMode::Src,
            Swizzle::RGBA,
        );
        assert!(covered.has_coverage());
        assert_eq!(
            covered.blend_formula().map(|f| f.dst),
            Some(BlendCoeff::Isa)
        );
    }

    #[test]
    fn explicit_xfer_replaces_sentinel() {
        let info = series_pipeline([1.0; 4])
            .with_xfer(Box::new(DstReadXfer::new(DstBlendMode::Multiply)));
        assert!(info.xfer().will_read_dst());
        assert!(info.blend_formula().is_none());
        // xfer still gets the last index after replacement
        assert_eq!(info.processor_index(info.xfer()), 4);

        let caps = ShaderCaps::default();
        assert_ne!(
            info.program_key(&caps),
            series_pipeline([1.0; 4]).program_key(&caps)
        );
    }
}
