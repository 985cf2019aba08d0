//! Platform primitives the lowered code calls into.
//!
//! Lowered buffer accesses bottom out in a handful of runtime members
//! (index offset computation, reference reinterpretation, raw view
//! construction, view accessors). The target platform may lack any of them;
//! only sites that need a missing primitive fail.

use std::fmt;

use keel_diagnostic::{Diagnostic, ErrorCode, ErrorGuaranteed};
use keel_ir::{Span, ViewKind};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::lower::Lowerer;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum PlatformPrimitive {
    /// Absolute offset of a relative index.
    IndexGetOffset,
    RangeStart,
    RangeEnd,
    /// Read-only reference to mutable reference, without a copy.
    ReadOnlyToMutableRef,
    /// Reference to a buffer as a reference to its first element.
    ReinterpretRef,
    CreateMutableView,
    CreateReadOnlyView,
    MutableViewItem,
    ReadOnlyViewItem,
    MutableViewSlice,
    ReadOnlyViewSlice,
}

impl PlatformPrimitive {
    pub const ALL: [PlatformPrimitive; 11] = [
        PlatformPrimitive::IndexGetOffset,
        PlatformPrimitive::RangeStart,
        PlatformPrimitive::RangeEnd,
        PlatformPrimitive::ReadOnlyToMutableRef,
        PlatformPrimitive::ReinterpretRef,
        PlatformPrimitive::CreateMutableView,
        PlatformPrimitive::CreateReadOnlyView,
        PlatformPrimitive::MutableViewItem,
        PlatformPrimitive::ReadOnlyViewItem,
        PlatformPrimitive::MutableViewSlice,
        PlatformPrimitive::ReadOnlyViewSlice,
    ];

    /// Qualified member name as it appears in diagnostics.
    pub fn member_name(self) -> &'static str {
        match self {
            PlatformPrimitive::IndexGetOffset => "Index.GetOffset",
            PlatformPrimitive::RangeStart => "Range.Start",
            PlatformPrimitive::RangeEnd => "Range.End",
            PlatformPrimitive::ReadOnlyToMutableRef => "Ref.AsMutable",
            PlatformPrimitive::ReinterpretRef => "Ref.Reinterpret",
            PlatformPrimitive::CreateMutableView => "View.CreateMutable",
            PlatformPrimitive::CreateReadOnlyView => "View.CreateReadOnly",
            PlatformPrimitive::MutableViewItem => "MutableView.Item",
            PlatformPrimitive::ReadOnlyViewItem => "ReadOnlyView.Item",
            PlatformPrimitive::MutableViewSlice => "MutableView.Slice",
            PlatformPrimitive::ReadOnlyViewSlice => "ReadOnlyView.Slice",
        }
    }

    pub fn create_view(kind: ViewKind) -> Self {
        match kind {
            ViewKind::Mutable => PlatformPrimitive::CreateMutableView,
            ViewKind::ReadOnly => PlatformPrimitive::CreateReadOnlyView,
        }
    }

    pub fn view_item(kind: ViewKind) -> Self {
        match kind {
            ViewKind::Mutable => PlatformPrimitive::MutableViewItem,
            ViewKind::ReadOnly => PlatformPrimitive::ReadOnlyViewItem,
        }
    }

    pub fn view_slice(kind: ViewKind) -> Self {
        match kind {
            ViewKind::Mutable => PlatformPrimitive::MutableViewSlice,
            ViewKind::ReadOnly => PlatformPrimitive::ReadOnlyViewSlice,
        }
    }
}

impl fmt::Display for PlatformPrimitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.member_name())
    }
}

/// Which primitives the target platform provides. Everything is available
/// unless marked missing.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PrimitiveTable {
    missing: FxHashSet<PlatformPrimitive>,
}

impl PrimitiveTable {
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn without(mut self, primitive: PlatformPrimitive) -> Self {
        self.missing.insert(primitive);
        self
    }

    pub fn mark_missing(&mut self, primitive: PlatformPrimitive) {
        self.missing.insert(primitive);
    }

    pub fn is_available(&self, primitive: PlatformPrimitive) -> bool {
        !self.missing.contains(&primitive)
    }
}

/// Shape of an access operand after normalization.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) enum IndexShape {
    /// Integral (or dynamically converted) index.
    Int,
    /// Relative index such as `^1`.
    Relative,
    Range,
}

/// Primitives behind one of the shared helpers, in call order.
pub(crate) fn required_for_view(kind: ViewKind) -> SmallVec<[PlatformPrimitive; 3]> {
    let mut required = SmallVec::new();
    if kind == ViewKind::ReadOnly {
        required.push(PlatformPrimitive::ReadOnlyToMutableRef);
    }
    required.push(PlatformPrimitive::ReinterpretRef);
    required.push(PlatformPrimitive::create_view(kind));
    required
}

/// Primitives behind an element access or slice.
///
/// `helper` is the view formed through a shared helper, absent when the
/// receiver already is a view. `accessor` is the kind of view indexed.
pub(crate) fn required_for_access(
    helper: Option<ViewKind>,
    accessor: ViewKind,
    shape: IndexShape,
) -> SmallVec<[PlatformPrimitive; 7]> {
    let mut required = SmallVec::new();
    if shape != IndexShape::Int {
        required.push(PlatformPrimitive::IndexGetOffset);
    }
    if shape == IndexShape::Range {
        required.push(PlatformPrimitive::RangeStart);
        required.push(PlatformPrimitive::RangeEnd);
    }
    if let Some(kind) = helper {
        required.extend(required_for_view(kind));
    }
    required.push(match shape {
        IndexShape::Range => PlatformPrimitive::view_slice(accessor),
        IndexShape::Int | IndexShape::Relative => PlatformPrimitive::view_item(accessor),
    });
    required
}

pub(crate) fn missing_primitive(primitive: PlatformPrimitive, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E5001)
        .with_message(format!(
            "missing compiler required member `{}`",
            primitive.member_name()
        ))
        .with_arg(primitive.member_name())
        .with_label(span, "required here")
}

impl Lowerer<'_> {
    /// Report every primitive of `required` the platform lacks, once each.
    pub(crate) fn require_primitives(
        &mut self,
        required: &[PlatformPrimitive],
        span: Span,
    ) -> Result<(), ErrorGuaranteed> {
        let mut failed = None;
        for &primitive in required {
            if !self.ctx.primitives.is_available(primitive) {
                failed = Some(self.diagnostics.emit_error(missing_primitive(primitive, span)));
            }
        }
        match failed {
            Some(guar) => Err(guar),
            None => Ok(()),
        }
    }
}
