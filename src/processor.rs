//! Processor identity.
//!
//! Every concrete processor type gets a process-wide [`ClassId`], assigned
//! lazily the first time the type is touched. Class ids are stable for the
//! lifetime of the process and feed the structural program key; they are
//! never serialized or compared across processes.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use crate::key::KeyBuilder;

/// Process-wide identity of a concrete processor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(u32);

impl ClassId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

fn registry() -> &'static Mutex<HashMap<TypeId, ClassId>> {
    static REGISTRY: OnceLock<Mutex<HashMap<TypeId, ClassId>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Look up (or assign) the class id for a concrete type.
///
/// Ids start at 1 so zero can never collide with a live processor in keys.
pub fn class_id_of<T: 'static>() -> ClassId {
    let mut map = registry().lock().unwrap_or_else(|e| e.into_inner());
    let next = ClassId(map.len() as u32 + 1);
    *map.entry(TypeId::of::<T>()).or_insert(next)
}

/// Address of a (possibly unsized) value, with any pointer metadata dropped.
///
/// Used as node identity inside one pipeline: the pipeline owns its boxed
/// processors, so data pointers are stable and unique for its lifetime.
pub(crate) fn data_ptr<T: ?Sized>(p: &T) -> *const () {
    (p as *const T).cast()
}

/// Behavior shared by geometry, fragment, and transfer processors.
///
/// Implementations return `class_id_of::<Self>()` from [`Processor::class_id`];
/// there is no blanket impl because the lookup needs the concrete type.
pub trait Processor {
    /// Stable human-readable name, used in generated shader comments and logs.
    fn name(&self) -> &'static str;

    fn class_id(&self) -> ClassId;

    /// Append every field that changes the generated shader text.
    ///
    /// Fields that only alter uniform values uploaded at draw time must be
    /// left out, otherwise equivalent programs stop sharing cache entries.
    fn key_coefficients(&self, _key: &mut KeyBuilder) {}
}
