//! Buffer type recognition.
//!
//! A type is a fixed-capacity inline buffer when its definition carries the
//! `InlineBuffer(length)` marker with a positive constant length. Its element
//! type is the type of its only instance field.
//!
//! Recognition is computed once per definition (following retargeted
//! definitions to the one they forward to) and once per instantiated type,
//! and memoized in concurrent maps. Two threads may compute the same entry;
//! both results are identical and the first insert wins. Diagnostics raised
//! while folding the length are kept only from the winning computation, so
//! each definition reports them exactly once.

use std::ops::Deref;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use keel_diagnostic::Diagnostic;
use keel_ir::{DefId, TypeId};
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::{AttrId, ConstEvaluator, FieldStorage, TypeData, TypeTable};

/// What recognition found out about a type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BufferTypeDescriptor {
    pub source: TypeId,
    /// Number of elements; zero when the type is not a buffer.
    pub capacity: u32,
    /// Element type; absent when the type is not a buffer or its storage is
    /// not exactly one by-value instance field.
    pub element: Option<TypeId>,
}

impl BufferTypeDescriptor {
    pub fn unrecognized(source: TypeId) -> Self {
        BufferTypeDescriptor {
            source,
            capacity: 0,
            element: None,
        }
    }

    #[inline]
    pub fn is_recognized(&self) -> bool {
        self.capacity > 0
    }

    /// Recognized with a usable element type.
    #[inline]
    pub fn is_indexable(&self) -> bool {
        self.is_recognized() && self.element.is_some()
    }
}

/// Shape of a definition, with the element type in terms of its own
/// generic parameters.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct DefShape {
    capacity: u32,
    element: Option<TypeId>,
}

impl DefShape {
    const NONE: DefShape = DefShape {
        capacity: 0,
        element: None,
    };
}

/// Memo tables of a [`BufferRecognizer`], owned separately so they can
/// outlive any one recognizer. A cache belongs to exactly one type table.
#[derive(Default)]
pub struct RecognitionCache {
    by_def: DashMap<DefId, DefShape>,
    by_type: DashMap<TypeId, BufferTypeDescriptor>,
    declaration_diagnostics: Mutex<Vec<Diagnostic>>,
}

impl RecognitionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instantiated types recognized so far.
    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

enum CacheRef<'t> {
    Owned(RecognitionCache),
    Shared(&'t RecognitionCache),
}

impl Deref for CacheRef<'_> {
    type Target = RecognitionCache;

    fn deref(&self) -> &RecognitionCache {
        match self {
            CacheRef::Owned(cache) => cache,
            CacheRef::Shared(cache) => cache,
        }
    }
}

pub struct BufferRecognizer<'t> {
    table: &'t TypeTable,
    marker: Option<AttrId>,
    cache: CacheRef<'t>,
}

impl<'t> BufferRecognizer<'t> {
    /// Recognizer with its own cache, dropped with it.
    pub fn new(table: &'t TypeTable) -> Self {
        Self::build(table, CacheRef::Owned(RecognitionCache::new()))
    }

    /// Recognizer over `cache`, which keeps what it learns.
    pub fn with_cache(table: &'t TypeTable, cache: &'t RecognitionCache) -> Self {
        Self::build(table, CacheRef::Shared(cache))
    }

    fn build(table: &'t TypeTable, cache: CacheRef<'t>) -> Self {
        let marker = table
            .interner()
            .get("InlineBuffer")
            .and_then(|name| table.attribute_by_name(name));
        BufferRecognizer {
            table,
            marker,
            cache,
        }
    }

    pub fn table(&self) -> &'t TypeTable {
        self.table
    }

    pub fn recognize(&self, ty: TypeId) -> BufferTypeDescriptor {
        if ty.is_primitive() {
            return BufferTypeDescriptor::unrecognized(ty);
        }
        if let Some(cached) = self.cache.by_type.get(&ty) {
            return *cached;
        }
        let computed = self.compute(ty);
        *self.cache.by_type.entry(ty).or_insert(computed)
    }

    fn compute(&self, ty: TypeId) -> BufferTypeDescriptor {
        let TypeData::Named { def, args } = self.table.data(ty) else {
            return BufferTypeDescriptor::unrecognized(ty);
        };
        let shape = self.def_shape(def);
        if shape.capacity == 0 {
            return BufferTypeDescriptor::unrecognized(ty);
        }
        BufferTypeDescriptor {
            source: ty,
            capacity: shape.capacity,
            element: shape.element.map(|e| self.table.substitute(e, &args)),
        }
    }

    /// Follow retargeting links to the definition that owns the data.
    fn origin(&self, mut def: DefId) -> DefId {
        for _ in 0..self.table.def_count() {
            match self.table.def(def).retargets {
                Some(next) => def = next,
                None => break,
            }
        }
        def
    }

    fn def_shape(&self, def: DefId) -> DefShape {
        let def = self.origin(def);
        if let Some(cached) = self.cache.by_def.get(&def) {
            return *cached;
        }
        let (shape, diagnostics) = self.analyze(def);
        match self.cache.by_def.entry(def) {
            Entry::Occupied(existing) => *existing.get(),
            Entry::Vacant(slot) => {
                slot.insert(shape);
                if !diagnostics.is_empty() {
                    self.cache.declaration_diagnostics.lock().extend(diagnostics);
                }
                tracing::debug!(
                    ?def,
                    capacity = shape.capacity,
                    has_element = shape.element.is_some(),
                    "buffer shape computed"
                );
                shape
            }
        }
    }

    fn analyze(&self, def_id: DefId) -> (DefShape, Vec<Diagnostic>) {
        let Some(marker) = self.marker else {
            return (DefShape::NONE, Vec::new());
        };
        let def = self.table.def(def_id);
        let markers: SmallVec<[_; 2]> = def
            .attributes
            .iter()
            .filter(|a| a.class == marker)
            .collect();
        if markers.is_empty() {
            return (DefShape::NONE, Vec::new());
        }
        if markers.len() > 1 && !self.table.attribute(marker).allow_multiple {
            return (DefShape::NONE, Vec::new());
        }

        // Every marker's arguments are folded so their diagnostics surface;
        // only the first one's length counts.
        let mut eval = ConstEvaluator::new(self.table);
        let mut lengths: SmallVec<[Option<i32>; 2]> = SmallVec::new();
        for m in &markers {
            let length = match m.args.as_slice() {
                [arg] => eval.eval(arg).and_then(|v| v.as_int()),
                _ => None,
            };
            lengths.push(length);
        }
        let diagnostics = eval.into_diagnostics();

        let capacity = lengths
            .first()
            .copied()
            .flatten()
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0);
        if capacity == 0 {
            return (DefShape::NONE, diagnostics);
        }

        let fields: SmallVec<[_; 2]> = def.instance_fields().collect();
        let element = match fields.as_slice() {
            [(_, field)] if field.storage == FieldStorage::Value => Some(field.ty),
            _ => None,
        };
        (DefShape { capacity, element }, diagnostics)
    }

    /// Diagnostics raised while recognizing definitions so far and not yet
    /// taken.
    pub fn declaration_diagnostics(&self) -> Vec<Diagnostic> {
        self.cache.declaration_diagnostics.lock().clone()
    }

    pub fn take_declaration_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.cache.declaration_diagnostics.lock())
    }
}
