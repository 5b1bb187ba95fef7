//! Layouts: map transformed local coordinates to the gradient parameter.
//!
//! Each layout owns a single coord transform. The vertex stage applies the
//! matrix and delivers the result through a varying, so the fragment side
//! only reads the interpolated coordinates. A layout's output carries `t`
//! in `.x`; the clamp wrapper reads that lane alone, the rest is padding.

use anyhow::Result;

use crate::fragment::{CoordTransform, FragmentProcessor};
use crate::glsl::program_builder::FragmentEmitArgs;
use crate::processor::{ClassId, Processor, class_id_of};
use crate::utils::Mat3;

/// `t` is the transformed x coordinate.
pub struct LinearGradientLayout {
    transforms: [CoordTransform; 1],
}

impl LinearGradientLayout {
    /// `local_to_gradient` maps local draw coordinates so the gradient axis
    /// runs from x = 0 to x = 1.
    pub fn new(local_to_gradient: Mat3) -> Self {
        Self {
            transforms: [CoordTransform::new(local_to_gradient)],
        }
    }
}

impl Processor for LinearGradientLayout {
    fn name(&self) -> &'static str {
        "LinearGradientLayout"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for LinearGradientLayout {
    fn coord_transforms(&self) -> &[CoordTransform] {
        &self.transforms
    }

    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let coords = args.transformed_coords(0).to_string();
        let out = args.output().to_string();
        args.code(&format!("{out} = vec4({coords}.x, 1.0, 0.0, 0.0);"));
        Ok(())
    }
}

/// `t` is the distance from the transformed origin.
pub struct RadialGradientLayout {
    transforms: [CoordTransform; 1],
}

impl RadialGradientLayout {
    /// `local_to_gradient` maps local draw coordinates so the unit circle
    /// around the origin spans the gradient.
    pub fn new(local_to_gradient: Mat3) -> Self {
        Self {
            transforms: [CoordTransform::new(local_to_gradient)],
        }
    }
}

impl Processor for RadialGradientLayout {
    fn name(&self) -> &'static str {
        "RadialGradientLayout"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }
}

impl FragmentProcessor for RadialGradientLayout {
    fn coord_transforms(&self) -> &[CoordTransform] {
        &self.transforms
    }

    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let coords = args.transformed_coords(0).to_string();
        let out = args.output().to_string();
        args.code(&format!("{out} = vec4(length({coords}), 1.0, 0.0, 0.0);"));
        Ok(())
    }
}
