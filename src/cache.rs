//! Program cache and render context.
//!
//! A [`RenderContext`] owns the shader caps, the backend realizer, and one
//! [`ProgramCache`] keyed by structural [`ProgramKey`]. [`RenderContext::program`]
//! is the find-or-create entry point: equal keys hand back the same
//! [`Program`] without touching emission or the backend, and a failed build
//! installs nothing, so the next draw with the same key retries cleanly.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::glsl::{ProgramSource, ShaderCaps, build_program_source};
use crate::key::ProgramKey;
use crate::program_info::ProgramInfo;
use crate::uniform_data::{UniformData, write_coord_transform_matrices};
use crate::validation::validate_program_source;

/// Opaque handle to a backend-compiled program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendProgramId(pub u64);

/// The narrow interface the cache drives to realize GPU programs.
///
/// Implementations compile and link the generated sources, bind the
/// declared uniform blocks and samplers, and hand back an opaque id.
/// `None` means the backend rejected the program.
pub trait ProgramBackend {
    fn compile(&mut self, source: &ProgramSource) -> Option<BackendProgramId>;
}

/// A compiled program with everything needed to bind and feed it.
pub struct Program {
    key: ProgramKey,
    backend_id: BackendProgramId,
    source: ProgramSource,
}

impl Program {
    pub fn key(&self) -> &ProgramKey {
        &self.key
    }

    pub fn backend_id(&self) -> BackendProgramId {
        self.backend_id
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    /// Fresh zeroed staging buffer for the vertex uniform block.
    pub fn make_vertex_data(&self) -> UniformData {
        UniformData::new(self.source.vertex_layout.clone())
    }

    /// Fresh zeroed staging buffer for the fragment uniform block.
    pub fn make_fragment_data(&self) -> UniformData {
        UniformData::new(self.source.fragment_layout.clone())
    }

    /// Collect one draw's processor uniform values into staging buffers.
    ///
    /// `info` must describe the same pipeline structure this program was
    /// compiled from; the per-processor suffixes and coord-uniform names
    /// only resolve against a matching layout. Target-dependent values
    /// (`u_rt_adjust`, dst texel scale) are the caller's to fill in after.
    pub fn write_draw_uniforms(&self, info: &ProgramInfo) -> Result<(UniformData, UniformData)> {
        let mut vertex = self.make_vertex_data();
        let mut fragment = self.make_fragment_data();

        let gp = info.geometry();
        gp.write_uniforms(&info.mangle_suffix(gp), &mut vertex)?;
        write_coord_transform_matrices(info, &self.source.coord_uniforms, &mut vertex)?;

        for node in info.all_fragment_processors() {
            node.write_uniforms(&info.mangle_suffix(node), &mut fragment)?;
        }

        let xp = info.xfer();
        xp.write_uniforms(&info.mangle_suffix(xp), &mut fragment)?;

        Ok((vertex, fragment))
    }
}

/// Hit and miss counters, kept across purges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub build_failures: u64,
}

#[derive(Default)]
pub struct ProgramCache {
    programs: HashMap<ProgramKey, Arc<Program>>,
    stats: CacheStats,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn get(&self, key: &ProgramKey) -> Option<Arc<Program>> {
        self.programs.get(key).cloned()
    }

    /// Drop every cached program. Counters survive.
    pub fn purge(&mut self) {
        self.programs.clear();
    }
}

/// Owns the caps, the backend, and the per-context program cache.
///
/// One context serves one thread; there is no interior locking.
pub struct RenderContext<B: ProgramBackend> {
    caps: ShaderCaps,
    backend: B,
    cache: ProgramCache,
}

impl<B: ProgramBackend> RenderContext<B> {
    pub fn new(caps: ShaderCaps, backend: B) -> Self {
        Self {
            caps,
            backend,
            cache: ProgramCache::new(),
        }
    }

    pub fn caps(&self) -> &ShaderCaps {
        &self.caps
    }

    pub fn cache(&self) -> &ProgramCache {
        &self.cache
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn purge_programs(&mut self) {
        self.cache.purge();
    }

    /// Find or create the compiled program for `info`.
    ///
    /// Emission failure, invalid generated text, and backend rejection all
    /// return `None` and leave the cache untouched.
    pub fn program(&mut self, info: &ProgramInfo) -> Option<Arc<Program>> {
        let key = info.program_key(&self.caps);
        if let Some(hit) = self.cache.programs.get(&key) {
            self.cache.stats.hits += 1;
            tracing::trace!(key = %key.digest_hex(), "program cache hit");
            return Some(hit.clone());
        }
        self.cache.stats.misses += 1;

        let source = match build_program_source(info, &self.caps) {
            Ok(source) => source,
            Err(e) => {
                self.cache.stats.build_failures += 1;
                tracing::warn!(key = %key.digest_hex(), "program emission failed: {e:#}");
                return None;
            }
        };
        if let Err(e) = validate_program_source(&source) {
            self.cache.stats.build_failures += 1;
            tracing::warn!(key = %key.digest_hex(), "generated program failed validation: {e:#}");
            return None;
        }
        let Some(backend_id) = self.backend.compile(&source) else {
            self.cache.stats.build_failures += 1;
            tracing::warn!(key = %key.digest_hex(), "backend rejected program");
            return None;
        };

        tracing::debug!(
            key = %key.digest_hex(),
            vertex_bytes = source.vertex.len(),
            fragment_bytes = source.fragment.len(),
            samplers = source.samplers.len(),
            "compiled new program"
        );
        let program = Arc::new(Program {
            key: key.clone(),
            backend_id,
            source,
        });
        self.cache.programs.insert(key, program.clone());
        Some(program)
    }
}
