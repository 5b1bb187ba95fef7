//! Texture and sampler descriptions referenced by processors.
//!
//! Processors never own GPU textures. They hold a [`TextureSamplerRef`]
//! describing the texture's configuration (format, filtering, wrap mode),
//! which is enough to generate shader text and key it. The actual texture
//! object is bound by the caller at draw time using the sampler-to-binding
//! pairs recorded in the compiled program.

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::key::{KeyBuilder, hash_bytes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgba8,
    RgbaF16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    Clamp,
    Repeat,
    MirrorRepeat,
}

/// Texture configuration a processor can be built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// A texture + sampler-state pair owned by a processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureSamplerRef {
    pub desc: TextureDesc,
    pub filter: Filter,
    pub wrap: WrapMode,
}

impl TextureSamplerRef {
    pub fn new(desc: TextureDesc, filter: Filter, wrap: WrapMode) -> Self {
        Self { desc, filter, wrap }
    }

    /// Append the texture configuration this sampler was built against.
    ///
    /// Texture identity and pixel contents are draw-time state and stay out
    /// of the key; two draws sampling different textures of the same
    /// configuration share a program.
    pub fn config_key(&self, key: &mut KeyBuilder) {
        key.push_u32(self.desc.width);
        key.push_u32(self.desc.height);
        key.push_u8(match self.desc.format {
            PixelFormat::Rgba8 => 0,
            PixelFormat::RgbaF16 => 1,
        });
        key.push_u8(match self.filter {
            Filter::Nearest => 0,
            Filter::Linear => 1,
        });
        key.push_u8(match self.wrap {
            WrapMode::Clamp => 0,
            WrapMode::Repeat => 1,
            WrapMode::MirrorRepeat => 2,
        });
    }
}

/// Pixel storage for CPU-rasterized lookup strips.
#[derive(Debug, Clone)]
pub enum LookupPixels {
    Rgba8(RgbaImage),
    RgbaF16 { width: u32, data: Vec<half::f16> },
}

/// An N x 1 lookup bitmap rasterized on the CPU, uploaded by the caller.
#[derive(Debug, Clone)]
pub struct LookupBitmap {
    pixels: LookupPixels,
}

impl LookupBitmap {
    pub fn from_rgba8(image: RgbaImage) -> Self {
        Self {
            pixels: LookupPixels::Rgba8(image),
        }
    }

    pub fn from_rgba_f16(width: u32, data: Vec<half::f16>) -> Self {
        debug_assert_eq!(data.len(), width as usize * 4);
        Self {
            pixels: LookupPixels::RgbaF16 { width, data },
        }
    }

    pub fn width(&self) -> u32 {
        match &self.pixels {
            LookupPixels::Rgba8(img) => img.width(),
            LookupPixels::RgbaF16 { width, .. } => *width,
        }
    }

    pub fn format(&self) -> PixelFormat {
        match &self.pixels {
            LookupPixels::Rgba8(_) => PixelFormat::Rgba8,
            LookupPixels::RgbaF16 { .. } => PixelFormat::RgbaF16,
        }
    }

    pub fn desc(&self) -> TextureDesc {
        TextureDesc {
            width: self.width(),
            height: 1,
            format: self.format(),
        }
    }

    pub fn pixels(&self) -> &LookupPixels {
        &self.pixels
    }

    /// Digest of the pixel contents, for deduplicating uploads and logging.
    pub fn content_digest(&self) -> [u8; 32] {
        match &self.pixels {
            LookupPixels::Rgba8(img) => hash_bytes(img.as_raw()),
            LookupPixels::RgbaF16 { data, .. } => {
                let mut bytes = Vec::with_capacity(data.len() * 2);
                for v in data {
                    bytes.extend_from_slice(&v.to_bits().to_le_bytes());
                }
                hash_bytes(&bytes)
            }
        }
    }
}
