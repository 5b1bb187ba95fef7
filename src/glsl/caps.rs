//! Shader capabilities of the target API.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// GLSL dialect generated for the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlslTarget {
    Desktop,
    Gles,
}

/// Capabilities that shape generated shader text.
///
/// Anything here that changes the text must also feed [`ShaderCaps::key_tag`],
/// otherwise one cache could hand a desktop program to a GLES draw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShaderCaps {
    #[serde(default = "default_target")]
    pub target: GlslTarget,
    /// Fragment-stage sampler budget for one program.
    #[serde(default = "default_max_samplers")]
    pub max_fragment_samplers: usize,
    /// Rasterize gradient lookup strips as RGBA F16 instead of 8-bit.
    #[serde(default)]
    pub high_precision_lookup: bool,
}

fn default_target() -> GlslTarget {
    GlslTarget::Desktop
}

fn default_max_samplers() -> usize {
    16
}

impl Default for ShaderCaps {
    fn default() -> Self {
        Self {
            target: default_target(),
            max_fragment_samplers: default_max_samplers(),
            high_precision_lookup: false,
        }
    }
}

impl ShaderCaps {
    pub fn gles() -> Self {
        Self {
            target: GlslTarget::Gles,
            ..Self::default()
        }
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("failed to parse shader caps")
    }

    pub fn is_es(&self) -> bool {
        self.target == GlslTarget::Gles
    }

    pub fn version_line(&self) -> &'static str {
        match self.target {
            GlslTarget::Desktop => "#version 450",
            GlslTarget::Gles => "#version 310 es",
        }
    }

    /// Precision statement for stages that require one, ES only.
    pub fn precision_line(&self) -> Option<&'static str> {
        match self.target {
            GlslTarget::Desktop => None,
            GlslTarget::Gles => Some("precision highp float;"),
        }
    }

    /// Byte folded into program keys for every text-shaping capability.
    pub fn key_tag(&self) -> u8 {
        match self.target {
            GlslTarget::Desktop => 0,
            GlslTarget::Gles => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_desktop() {
        let caps = ShaderCaps::default();
        assert_eq!(caps.target, GlslTarget::Desktop);
        assert_eq!(caps.max_fragment_samplers, 16);
        assert!(caps.precision_line().is_none());
    }

    #[test]
    fn parses_partial_json() {
        let caps = ShaderCaps::from_json_str(r#"{"target": "gles"}"#).unwrap();
        assert!(caps.is_es());
        assert_eq!(caps.max_fragment_samplers, 16);
        assert!(caps.precision_line().is_some());
    }

    #[test]
    fn key_tag_separates_targets() {
        assert_ne!(
            ShaderCaps::default().key_tag(),
            ShaderCaps::gles().key_tag()
        );
    }
}
