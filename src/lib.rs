//! Shader program assembly and caching for a GL-style draw pipeline.
//!
//! A draw is described by a [`ProgramInfo`]: one geometry processor, an
//! ordered list of fragment processor trees, and an optional transfer
//! processor. The GLSL module assembles that description into vertex and
//! fragment shader text with per-processor name mangling, and the cache
//! module reuses compiled programs across draws whose generated text is
//! guaranteed to be identical.
//!
//! This crate is organized into several submodules:
//! - `processor`: Processor identity (class ids) and the base trait
//! - `key`: Structural program keys and key digests
//! - `fragment`: Fragment processor trees, traversal, and stock effects
//! - `geometry`: Geometry processors and vertex attributes
//! - `xfer`: Transfer processors and fixed-function blend formulas
//! - `program_info`: The full pipeline description handed to the builder
//! - `glsl`: Shader text assembly (builders, uniform/varying handlers, caps)
//! - `uniform_data`: CPU-side uniform staging buffers
//! - `cache`: Compiled program cache keyed by structural program keys
//! - `gradient`: Gradient effects and colorizer selection
//! - `colorspace`: Color space transform effects
//! - `validation`: GLSL validation using naga
//!
//! The main entry points are:
//! - [`RenderContext::program`]: Look up or build the program for a draw
//! - [`glsl::build_program_source`]: Assemble shader text without caching

pub mod cache;
pub mod colorspace;
pub mod fragment;
pub mod geometry;
pub mod glsl;
pub mod gradient;
pub mod key;
pub mod processor;
pub mod program_info;
pub mod swizzle;
pub mod texture;
pub mod uniform_data;
pub mod utils;
pub mod validation;
pub mod xfer;

pub use cache::{
    BackendProgramId, CacheStats, Program, ProgramBackend, ProgramCache, RenderContext,
};
pub use colorspace::{ColorSpaceXform, ColorSpaceXformEffect, XformFlags};
pub use fragment::{FragmentProcessor, FragmentProcessorIter};
pub use geometry::GeometryProcessor;
pub use glsl::{ProgramSource, ShaderCaps, build_program_source};
pub use gradient::{GradientDesc, make_linear, make_radial};
pub use key::{KeyBuilder, ProgramKey};
pub use processor::{ClassId, Processor};
pub use program_info::ProgramInfo;
pub use swizzle::Swizzle;
pub use uniform_data::{UniformData, UniformLayout};
pub use validation::validate_program_source;
pub use xfer::{BlendFormula, BlendMode, XferProcessor};
