//! Fragment processor trees.
//!
//! A fragment processor maps an input color to an output color. Processors
//! form trees: a parent owns its children, decides whether to invoke them,
//! and feeds them whatever input color it likes. The pipeline holds an
//! ordered list of tree roots; everything downstream (keys, uniform slices,
//! transformed coordinates) walks those trees in one canonical pre-order.
//!
//! This module is organized into:
//! - `iter`: Non-recursive pre-order traversal
//! - `effects`: Stock effects (const color, series, texture, color matrix)

pub mod effects;
pub mod iter;

use anyhow::Result;

use crate::glsl::program_builder::FragmentEmitArgs;
use crate::processor::Processor;
use crate::texture::TextureSamplerRef;
use crate::uniform_data::UniformData;
use crate::utils::Mat3;

pub use iter::{CoordTransformIter, FragmentProcessorIter};

/// A local-space to effect-space transform owned by a fragment processor.
///
/// The vertex stage applies the matrix to the draw's local coordinates and
/// hands the result to the owning processor through a varying.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordTransform {
    pub matrix: Mat3,
}

impl CoordTransform {
    pub fn new(matrix: Mat3) -> Self {
        Self { matrix }
    }
}

/// A node in a fragment processor tree.
pub trait FragmentProcessor: Processor {
    /// Child processors in declaration order. Children are owned; sharing a
    /// node between two parents is not representable.
    fn children(&self) -> &[Box<dyn FragmentProcessor>] {
        &[]
    }

    /// Coord transforms this node itself owns, excluding children.
    fn coord_transforms(&self) -> &[CoordTransform] {
        &[]
    }

    /// Texture samplers this node itself owns, excluding children.
    fn texture_samplers(&self) -> &[TextureSamplerRef] {
        &[]
    }

    /// Emit the statements computing this node's output color.
    ///
    /// The emitted code must assign `args.output()`; the variable is
    /// pre-seeded with `vec4(1.0)` so a processor that writes nothing
    /// behaves as opaque white.
    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()>;

    /// Write this node's uniform values for one draw, excluding children.
    ///
    /// `suffix` is the node's mangle suffix; implementations append it to
    /// the same base names they registered while emitting.
    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        let _ = (suffix, data);
        Ok(())
    }
}

/// Total coord transforms in `root`'s subtree, the root included.
pub fn count_coord_transforms(root: &dyn FragmentProcessor) -> usize {
    FragmentProcessorIter::new(root)
        .map(|n| n.coord_transforms().len())
        .sum()
}

/// Total texture samplers in `root`'s subtree, the root included.
pub fn count_texture_samplers(root: &dyn FragmentProcessor) -> usize {
    FragmentProcessorIter::new(root)
        .map(|n| n.texture_samplers().len())
        .sum()
}

/// Offset of `child_index`'s transform slice within its parent's slice.
///
/// Walks the parent's subtree in pre-order and sums the transform counts of
/// every node visited before the target child, so the layout matches the
/// flat per-pipeline transform array exactly.
pub fn child_transform_offset(parent: &dyn FragmentProcessor, child_index: usize) -> usize {
    child_offset(parent, child_index, |n| n.coord_transforms().len())
}

/// Offset of `child_index`'s sampler slice within its parent's slice.
pub fn child_sampler_offset(parent: &dyn FragmentProcessor, child_index: usize) -> usize {
    child_offset(parent, child_index, |n| n.texture_samplers().len())
}

fn child_offset(
    parent: &dyn FragmentProcessor,
    child_index: usize,
    count: impl Fn(&dyn FragmentProcessor) -> usize,
) -> usize {
    // Positional, not identity-based: indistinguishable sibling nodes must
    // still land on their own slices.
    let mut sum = count(parent);
    for earlier in &parent.children()[..child_index] {
        for node in FragmentProcessorIter::new(earlier.as_ref()) {
            sum += count(node);
        }
    }
    sum
}
