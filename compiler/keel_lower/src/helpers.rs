//! Shared helper synthesis.
//!
//! Buffer views are formed by two generic routines placed in a
//! compilation-private container:
//!
//! ```text
//! AsMutableView<TBuffer, TElement>(ref TBuffer buffer, int length)
//!     => View.CreateMutable(ref Ref.Reinterpret<TBuffer, TElement>(ref buffer), length)
//! AsReadOnlyView<TBuffer, TElement>(in TBuffer buffer, int length)
//!     => View.CreateReadOnly(ref Ref.Reinterpret<TBuffer, TElement>(ref Ref.AsMutable(in buffer)), length)
//! ```
//!
//! Each routine is synthesized the first time any unit needs it. The table
//! is an insert-if-absent map so concurrent units agree on one instance per
//! routine without a lock around lowering.

use std::sync::Arc;

use dashmap::DashMap;
use keel_ir::{HelperKind, ViewKind};
use smallvec::SmallVec;

use crate::primitives::{required_for_view, PlatformPrimitive};

/// Name of the container holding the helpers.
pub const HELPER_CONTAINER: &str = "<CompilationPrivate>";

/// How the helper receives the buffer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BufferPassing {
    Ref,
    In,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct SynthesizedHelper {
    pub kind: HelperKind,
    pub container: &'static str,
    pub name: &'static str,
    pub type_params: [&'static str; 2],
    pub buffer_param: (&'static str, BufferPassing),
    pub length_param: &'static str,
    pub returns: ViewKind,
    /// Primitive calls making up the body, innermost first.
    pub body: SmallVec<[PlatformPrimitive; 3]>,
}

impl SynthesizedHelper {
    fn synthesize(kind: HelperKind) -> Self {
        let view = kind.view_kind();
        let passing = match view {
            ViewKind::Mutable => BufferPassing::Ref,
            ViewKind::ReadOnly => BufferPassing::In,
        };
        SynthesizedHelper {
            kind,
            container: HELPER_CONTAINER,
            name: kind.name(),
            type_params: ["TBuffer", "TElement"],
            buffer_param: ("buffer", passing),
            length_param: "length",
            returns: view,
            body: required_for_view(view),
        }
    }

    /// Signature as it would be printed in a symbol listing.
    pub fn signature(&self) -> String {
        let (buffer, passing) = self.buffer_param;
        let passing = match passing {
            BufferPassing::Ref => "ref",
            BufferPassing::In => "in",
        };
        let view = match self.returns {
            ViewKind::Mutable => "MutableView",
            ViewKind::ReadOnly => "ReadOnlyView",
        };
        let [t_buffer, t_element] = self.type_params;
        format!(
            "{view}<{t_element}> {}.{}<{t_buffer}, {t_element}>({passing} {t_buffer} {buffer}, int {})",
            self.container, self.name, self.length_param
        )
    }
}

/// Helpers synthesized so far in one compilation.
#[derive(Debug, Default)]
pub struct HelperTable {
    helpers: DashMap<HelperKind, Arc<SynthesizedHelper>>,
}

impl HelperTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The helper for `kind`, synthesizing it on first request.
    pub fn get_or_synthesize(&self, kind: HelperKind) -> Arc<SynthesizedHelper> {
        if let Some(existing) = self.helpers.get(&kind) {
            return Arc::clone(existing.value());
        }
        let entry = self.helpers.entry(kind).or_insert_with(|| {
            tracing::debug!(helper = kind.name(), "helper synthesized");
            Arc::new(SynthesizedHelper::synthesize(kind))
        });
        Arc::clone(entry.value())
    }

    pub fn contains(&self, kind: HelperKind) -> bool {
        self.helpers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.helpers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.helpers.is_empty()
    }

    /// Helpers to emit, mutable first.
    pub fn emitted(&self) -> Vec<Arc<SynthesizedHelper>> {
        HelperKind::ALL
            .iter()
            .filter_map(|kind| self.helpers.get(kind).map(|h| Arc::clone(h.value())))
            .collect()
    }
}
