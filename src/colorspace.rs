//! Color-space conversion as a fragment processor wrapper.
//!
//! The conversion is consumed as an opaque bundle: a flag set naming which
//! steps apply and the coefficients those steps need (two transfer
//! functions of seven coefficients each, one 3x3 gamut matrix). Flags gate
//! which uniforms are declared and whether the transfer helper is emitted,
//! so they are key material; the coefficients themselves flow through
//! uniforms at draw time. No color-science math happens in this module.

use anyhow::Result;

use crate::fragment::FragmentProcessor;
use crate::glsl::GlslType;
use crate::glsl::program_builder::FragmentEmitArgs;
use crate::key::KeyBuilder;
use crate::processor::{ClassId, Processor, class_id_of};
use crate::uniform_data::UniformData;
use crate::utils::{MAT3_IDENTITY, Mat3};

/// Which conversion steps a transform performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XformFlags(u32);

impl XformFlags {
    /// Apply the source transfer function, gamma-encoded to linear.
    pub const LINEARIZE: Self = Self(1 << 0);
    /// Multiply by the gamut matrix.
    pub const GAMUT: Self = Self(1 << 1);
    /// Apply the destination transfer function, linear to gamma-encoded.
    pub const ENCODE: Self = Self(1 << 2);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl std::ops::BitOr for XformFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One conversion step bundle, produced by color-management code elsewhere.
///
/// Transfer coefficients are ordered `g, a, b, c, d, e, f` for the
/// piecewise curve `y = c*x + f` below `d`, `y = (a*x + b)^g + e` above.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorSpaceXform {
    pub flags: XformFlags,
    pub linearize: [f32; 7],
    pub encode: [f32; 7],
    pub gamut: Mat3,
}

impl Default for ColorSpaceXform {
    fn default() -> Self {
        Self {
            flags: XformFlags::empty(),
            linearize: IDENTITY_TRANSFER,
            encode: IDENTITY_TRANSFER,
            gamut: MAT3_IDENTITY,
        }
    }
}

/// `y = x` in the seven-coefficient form.
const IDENTITY_TRANSFER: [f32; 7] = [1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];

/// Applies a [`ColorSpaceXform`] to its child's output.
pub struct ColorSpaceXformEffect {
    children: [Box<dyn FragmentProcessor>; 1],
    xform: ColorSpaceXform,
}

impl ColorSpaceXformEffect {
    pub fn new(child: Box<dyn FragmentProcessor>, xform: ColorSpaceXform) -> Self {
        Self {
            children: [child],
            xform,
        }
    }

    /// Wrap `child` in a conversion, or hand it back untouched when the
    /// flag set is empty and the conversion would be a no-op.
    pub fn wrap(
        child: Box<dyn FragmentProcessor>,
        xform: ColorSpaceXform,
    ) -> Box<dyn FragmentProcessor> {
        if xform.flags.is_empty() {
            return child;
        }
        Box::new(Self::new(child, xform))
    }

    fn emit_transfer(
        args: &mut FragmentEmitArgs<'_, '_>,
        helper: &str,
        color: &str,
        base: &str,
    ) -> Result<()> {
        let gabc = args.add_uniform(GlslType::Vec4, &format!("u_{base}_gabc"));
        let def = args.add_uniform(GlslType::Vec3, &format!("u_{base}_def"));
        for channel in ["r", "g", "b"] {
            args.code(&format!(
                "{color}.{channel} = {helper}({color}.{channel}, {gabc}, {def});"
            ));
        }
        Ok(())
    }

    fn write_transfer(
        suffix: &str,
        data: &mut UniformData,
        base: &str,
        coeffs: &[f32; 7],
    ) -> Result<()> {
        data.set_vec4(
            &format!("u_{base}_gabc{suffix}"),
            [coeffs[0], coeffs[1], coeffs[2], coeffs[3]],
        )?;
        data.set_vec3(
            &format!("u_{base}_def{suffix}"),
            [coeffs[4], coeffs[5], coeffs[6]],
        )
    }
}

impl Processor for ColorSpaceXformEffect {
    fn name(&self) -> &'static str {
        "ColorSpaceXform"
    }

    fn class_id(&self) -> ClassId {
        class_id_of::<Self>()
    }

    fn key_coefficients(&self, key: &mut KeyBuilder) {
        key.push_u32(self.xform.flags.bits());
    }
}

impl FragmentProcessor for ColorSpaceXformEffect {
    fn children(&self) -> &[Box<dyn FragmentProcessor>] {
        &self.children
    }

    fn emit_code(&self, args: &mut FragmentEmitArgs<'_, '_>) -> Result<()> {
        let input = args.input().to_string();
        let inner = args.emit_child(0, &input)?;
        let color = args.mangle("converted");
        args.code(&format!("vec4 {color} = {inner};"));

        let flags = self.xform.flags;
        let needs_transfer =
            flags.contains(XformFlags::LINEARIZE) || flags.contains(XformFlags::ENCODE);
        let mut helper = String::new();
        if needs_transfer {
            helper = args.mangle("transfer_fn");
            // sign/abs mirroring keeps extended-range negatives intact
            args.add_function(&format!(
                "float {helper}(float x, vec4 gabc, vec3 def) {{\n    float s = sign(x);\n    x = abs(x);\n    x = (x < def.x) ? gabc.w * x + def.z : pow(gabc.y * x + gabc.z, gabc.x) + def.y;\n    return s * x;\n}}"
            ));
        }
        if flags.contains(XformFlags::LINEARIZE) {
            Self::emit_transfer(args, &helper, &color, "linearize")?;
        }
        if flags.contains(XformFlags::GAMUT) {
            let gamut = args.add_uniform(GlslType::Mat3, "u_gamut");
            args.code(&format!("{color}.rgb = {gamut} * {color}.rgb;"));
        }
        if flags.contains(XformFlags::ENCODE) {
            Self::emit_transfer(args, &helper, &color, "encode")?;
        }
        let out = args.output().to_string();
        args.code(&format!("{out} = {color};"));
        Ok(())
    }

    fn write_uniforms(&self, suffix: &str, data: &mut UniformData) -> Result<()> {
        let flags = self.xform.flags;
        if flags.contains(XformFlags::LINEARIZE) {
            Self::write_transfer(suffix, data, "linearize", &self.xform.linearize)?;
        }
        if flags.contains(XformFlags::GAMUT) {
            data.set_mat3(&format!("u_gamut{suffix}"), self.xform.gamut)?;
        }
        if flags.contains(XformFlags::ENCODE) {
            Self::write_transfer(suffix, data, "encode", &self.xform.encode)?;
        }
        Ok(())
    }
}
