//! Output swizzles.
//!
//! A swizzle reorders (or pins) the four channels written to the render
//! target, compensating for backends whose target formats store channels
//! in a different order. It is applied as the last statement of the
//! fragment shader and participates in the program key.

use std::fmt;

use anyhow::{Result, bail};

use crate::key::KeyBuilder;

/// Per-channel selector: one of `r g b a 0 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle([u8; 4]);

impl Swizzle {
    pub const RGBA: Swizzle = Swizzle(*b"rgba");
    pub const BGRA: Swizzle = Swizzle(*b"bgra");
    /// Broadcast red into all color channels, keep alpha. Used for
    /// single-channel target formats.
    pub const RRRA: Swizzle = Swizzle(*b"rrra");
    /// Force opaque alpha.
    pub const RGB1: Swizzle = Swizzle(*b"rgb1");

    pub fn parse(s: &str) -> Result<Swizzle> {
        let bytes = s.as_bytes();
        if bytes.len() != 4 {
            bail!("swizzle must have exactly 4 components, got {s:?}");
        }
        let mut out = [0_u8; 4];
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'r' | b'g' | b'b' | b'a' | b'0' | b'1' => out[i] = b,
                _ => bail!("invalid swizzle component {:?} in {s:?}", b as char),
            }
        }
        Ok(Swizzle(out))
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::RGBA
    }

    /// Build the GLSL expression selecting this swizzle out of `src`.
    ///
    /// `src` must be a vec4-typed lvalue or expression without side effects,
    /// since constant components repeat it per channel.
    pub fn glsl_expr(&self, src: &str) -> String {
        if self.is_identity() {
            return src.to_string();
        }
        let component = |b: u8| match b {
            b'0' => "0.0".to_string(),
            b'1' => "1.0".to_string(),
            c => format!("{src}.{}", c as char),
        };
        format!(
            "vec4({}, {}, {}, {})",
            component(self.0[0]),
            component(self.0[1]),
            component(self.0[2]),
            component(self.0[3])
        )
    }

    pub fn key(&self, key: &mut KeyBuilder) {
        for b in self.0 {
            key.push_u8(b);
        }
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::RGBA
    }
}

impl fmt::Display for Swizzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_channel_and_constant_components() {
        assert_eq!(Swizzle::parse("bgra").unwrap(), Swizzle::BGRA);
        assert_eq!(Swizzle::parse("rgb1").unwrap(), Swizzle::RGB1);
        assert!(Swizzle::parse("rgbx").is_err());
        assert!(Swizzle::parse("rgb").is_err());
    }

    #[test]
    fn identity_emits_source_unchanged() {
        assert_eq!(Swizzle::RGBA.glsl_expr("color"), "color");
        assert_eq!(
            Swizzle::BGRA.glsl_expr("color"),
            "vec4(color.b, color.g, color.r, color.a)"
        );
        assert_eq!(
            Swizzle::RGB1.glsl_expr("c"),
            "vec4(c.r, c.g, c.b, 1.0)"
        );
    }

    #[test]
    fn distinct_swizzles_key_differently() {
        let key_of = |s: Swizzle| {
            let mut k = KeyBuilder::new();
            s.key(&mut k);
            k.finish()
        };
        assert_ne!(key_of(Swizzle::RGBA), key_of(Swizzle::BGRA));
        assert_ne!(key_of(Swizzle::RGBA), key_of(Swizzle::RGB1));
    }
}
