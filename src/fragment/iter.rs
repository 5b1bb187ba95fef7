//! Non-recursive pre-order traversal of fragment processor trees.
//!
//! Tree depth is caller-controlled, so traversal never recurses; an
//! explicit stack drives both iterators. Pre-order (parent first, children
//! in declaration order) is the canonical order shared by key generation,
//! uniform slicing, and coord transform numbering.

use super::{CoordTransform, FragmentProcessor};

/// Pre-order iterator over one fragment processor subtree.
pub struct FragmentProcessorIter<'a> {
    stack: Vec<&'a dyn FragmentProcessor>,
}

impl<'a> FragmentProcessorIter<'a> {
    pub fn new(root: &'a dyn FragmentProcessor) -> Self {
        Self { stack: vec![root] }
    }
}

impl<'a> Iterator for FragmentProcessorIter<'a> {
    type Item = &'a dyn FragmentProcessor;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse push keeps children in declaration order on a LIFO stack.
        for child in node.children().iter().rev() {
            self.stack.push(child.as_ref());
        }
        Some(node)
    }
}

/// Iterator over `(owner, transform)` pairs of one subtree, in pre-order.
///
/// A node's own transforms come out before any child's, matching the slice
/// layout produced by the child-offset helpers.
pub struct CoordTransformIter<'a> {
    nodes: FragmentProcessorIter<'a>,
    owner: Option<&'a dyn FragmentProcessor>,
    pending: &'a [CoordTransform],
}

impl<'a> CoordTransformIter<'a> {
    pub fn new(root: &'a dyn FragmentProcessor) -> Self {
        Self {
            nodes: FragmentProcessorIter::new(root),
            owner: None,
            pending: &[],
        }
    }
}

impl<'a> Iterator for CoordTransformIter<'a> {
    type Item = (&'a dyn FragmentProcessor, &'a CoordTransform);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(owner) = self.owner {
                if let Some((first, rest)) = self.pending.split_first() {
                    self.pending = rest;
                    return Some((owner, first));
                }
            }
            let node = self.nodes.next()?;
            self.owner = Some(node);
            self.pending = node.coord_transforms();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::{child_sampler_offset, child_transform_offset};
    use crate::glsl::program_builder::FragmentEmitArgs;
    use crate::key::KeyBuilder;
    use crate::processor::{ClassId, Processor, class_id_of, data_ptr};
    use crate::texture::{Filter, PixelFormat, TextureDesc, TextureSamplerRef, WrapMode};
    use crate::utils::mat3_translate;
    use anyhow::Result;

    struct TestNode {
        children: Vec<Box<dyn FragmentProcessor>>,
        transforms: Vec<CoordTransform>,
        samplers: Vec<TextureSamplerRef>,
    }

    impl Processor for TestNode {
        fn name(&self) -> &'static str {
            "TestNode"
        }
        fn class_id(&self) -> ClassId {
            class_id_of::<Self>()
        }
        fn key_coefficients(&self, _key: &mut KeyBuilder) {}
    }

    impl FragmentProcessor for TestNode {
        fn children(&self) -> &[Box<dyn FragmentProcessor>] {
            &self.children
        }
        fn coord_transforms(&self) -> &[CoordTransform] {
            &self.transforms
        }
        fn texture_samplers(&self) -> &[TextureSamplerRef] {
            &self.samplers
        }
        fn emit_code(&self, _args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
            Ok(())
        }
    }

    fn sampler() -> TextureSamplerRef {
        TextureSamplerRef::new(
            TextureDesc {
                width: 8,
                height: 8,
                format: PixelFormat::Rgba8,
            },
            Filter::Linear,
            WrapMode::Clamp,
        )
    }

    fn node(
        children: Vec<Box<dyn FragmentProcessor>>,
        num_transforms: usize,
        num_samplers: usize,
    ) -> Box<dyn FragmentProcessor> {
        Box::new(TestNode {
            children,
            transforms: (0..num_transforms)
                .map(|i| CoordTransform::new(mat3_translate(i as f32, 0.0)))
                .collect(),
            samplers: (0..num_samplers).map(|_| sampler()).collect(),
        })
    }

    #[test]
    fn yields_parent_before_children_in_declaration_order() {
        let root = node(
            vec![
                node(vec![node(vec![], 0, 0), node(vec![], 0, 0)], 0, 0),
                node(vec![], 0, 0),
            ],
            0,
            0,
        );
        let a = root.children()[0].as_ref();
        let a0 = a.children()[0].as_ref();
        let a1 = a.children()[1].as_ref();
        let b = root.children()[1].as_ref();
        let expected = vec![
            data_ptr(root.as_ref()),
            data_ptr(a),
            data_ptr(a0),
            data_ptr(a1),
            data_ptr(b),
        ];

        let order: Vec<_> = FragmentProcessorIter::new(root.as_ref())
            .map(data_ptr)
            .collect();
        assert_eq!(order, expected);
    }

    #[test]
    fn deep_chain_does_not_overflow_the_stack() {
        let mut fp = node(vec![], 0, 0);
        for _ in 0..4096 {
            fp = node(vec![fp], 0, 0);
        }
        assert_eq!(FragmentProcessorIter::new(fp.as_ref()).count(), 4097);
    }

    #[test]
    fn coord_transforms_come_out_in_owner_order() {
        // root owns 1 transform, first child owns 2, second child owns 1
        let root = node(
            vec![node(vec![], 2, 0), node(vec![], 1, 0)],
            1,
            0,
        );
        let owners_and_tx: Vec<(*const (), f32)> = CoordTransformIter::new(root.as_ref())
            .map(|(owner, t)| (data_ptr(owner), t.matrix[6]))
            .collect();

        let a = data_ptr(root.children()[0].as_ref());
        let b = data_ptr(root.children()[1].as_ref());
        let r = data_ptr(root.as_ref());
        assert_eq!(
            owners_and_tx,
            vec![(r, 0.0), (a, 0.0), (a, 1.0), (b, 0.0)]
        );
    }

    #[test]
    fn child_offsets_skip_preceding_subtrees() {
        // root (1 transform, 1 sampler)
        //   child0 (2 transforms, 0 samplers)
        //     grandchild (1 transform, 2 samplers)
        //   child1 (1 transform, 1 sampler)
        let root = node(
            vec![
                node(vec![node(vec![], 1, 2)], 2, 0),
                node(vec![], 1, 1),
            ],
            1,
            1,
        );
        assert_eq!(child_transform_offset(root.as_ref(), 0), 1);
        assert_eq!(child_transform_offset(root.as_ref(), 1), 4);
        assert_eq!(child_sampler_offset(root.as_ref(), 0), 1);
        assert_eq!(child_sampler_offset(root.as_ref(), 1), 3);
    }
}
