//! View conversion resolution.
//!
//! A buffer converts to `MutableView<T>` and `ReadOnlyView<T>` of its
//! element type. These built-in conversions compete with identity, view
//! widening (`MutableView<T>` to `ReadOnlyView<T>`) and user-declared
//! conversion operators under the usual "better conversion" rules:
//!
//! 1. identity beats everything
//! 2. built-in conversions beat user-defined ones; among built-ins the
//!    mutable view wins
//! 3. two user-defined candidates are ambiguous
//!
//! Whether a candidate is eligible depends on the source's addressability:
//! mutable views need a writable variable.

use std::cmp::Ordering;

use keel_diagnostic::{Diagnostic, ErrorGuaranteed};
use keel_ir::{
    ArgMode, BoundId, BoundKind, HelperKind, LoweredId, LoweredKind, MemberRef, Span, TypeId,
    ViewKind,
};
use keel_safety::{check, Escape};
use keel_types::{BufferRecognizer, BufferTypeDescriptor, MemberDef, TypeData, TypeTable};
use smallvec::{smallvec, SmallVec};

use crate::addressability::{Addressability, Place};
use crate::errors;
use crate::lower::Lowerer;
use crate::primitives::required_for_view;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ConversionKind {
    Identity,
    /// `MutableView<T>` to `ReadOnlyView<T>`.
    ViewWidening,
    /// Buffer to a view over its storage.
    BufferView(ViewKind),
    UserDefined(MemberRef),
}

impl ConversionKind {
    fn rank(self) -> u8 {
        match self {
            ConversionKind::Identity => 0,
            ConversionKind::ViewWidening | ConversionKind::BufferView(_) => 1,
            ConversionKind::UserDefined(_) => 2,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ConversionCandidate {
    pub target: TypeId,
    pub kind: ConversionKind,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Resolution {
    Resolved(ConversionCandidate),
    Ambiguous(ConversionCandidate, ConversionCandidate),
    NoConversion,
}

pub struct ViewConversionResolver<'a> {
    table: &'a TypeTable,
    recognizer: &'a BufferRecognizer<'a>,
}

impl<'a> ViewConversionResolver<'a> {
    pub fn new(recognizer: &'a BufferRecognizer<'a>) -> Self {
        ViewConversionResolver {
            table: recognizer.table(),
            recognizer,
        }
    }

    /// Eligible conversions from a `source` expression with the given
    /// place to `target`.
    pub fn candidates(
        &self,
        source: TypeId,
        place: Place,
        target: TypeId,
        explicit: bool,
    ) -> SmallVec<[ConversionCandidate; 2]> {
        let mut out = SmallVec::new();
        let candidate = |kind| ConversionCandidate { target, kind };
        if source == target {
            out.push(candidate(ConversionKind::Identity));
            return out;
        }
        let target_view = self.table.as_view(target);
        let writable = place.addressability == Addressability::StableVariable;

        if let (Some((ViewKind::Mutable, from)), Some((ViewKind::ReadOnly, to))) =
            (self.table.as_view(source), target_view)
        {
            if from == to {
                out.push(candidate(ConversionKind::ViewWidening));
            }
        }

        let user_defined = self.user_conversions(source, target, explicit);
        let user_mutable = matches!(target_view, Some((ViewKind::Mutable, _)));
        if !user_defined.is_empty() {
            // A declared operator hides the built-in conversion to the
            // same view; a mutable one still needs a writable source.
            if !user_mutable || writable {
                out.extend(
                    user_defined
                        .into_iter()
                        .map(|member| candidate(ConversionKind::UserDefined(member))),
                );
            }
        } else if let (Some(element), Some((kind, to))) = (self.view_element(source), target_view)
        {
            if element == to && (kind == ViewKind::ReadOnly || writable) {
                out.push(candidate(ConversionKind::BufferView(kind)));
            }
        }
        out
    }

    /// Pick the best conversion from `source` to any of `targets`.
    pub fn resolve(
        &self,
        source: TypeId,
        place: Place,
        targets: &[TypeId],
        explicit: bool,
    ) -> Resolution {
        let mut best: SmallVec<[ConversionCandidate; 2]> = SmallVec::new();
        for (i, &target) in targets.iter().enumerate() {
            if targets[..i].contains(&target) {
                continue;
            }
            for candidate in self.candidates(source, place, target, explicit) {
                match best.first().map(|b| self.compare(candidate, *b)) {
                    None | Some(Ordering::Equal) => best.push(candidate),
                    Some(Ordering::Less) => {
                        best.clear();
                        best.push(candidate);
                    }
                    Some(Ordering::Greater) => {}
                }
            }
        }
        match best.as_slice() {
            [] => Resolution::NoConversion,
            [only] => Resolution::Resolved(*only),
            [first, second, ..] => Resolution::Ambiguous(*first, *second),
        }
    }

    /// Conversion operators declared on `source` to exactly `target`.
    fn user_conversions(
        &self,
        source: TypeId,
        target: TypeId,
        explicit: bool,
    ) -> SmallVec<[MemberRef; 1]> {
        let TypeData::Named { def, args } = self.table.data(source) else {
            return SmallVec::new();
        };
        let members = &self.table.def(def).members;
        (0u32..)
            .zip(members)
            .filter_map(|(index, member)| match member {
                MemberDef::Conversion {
                    target: declared,
                    explicit: explicit_only,
                } if (explicit || !explicit_only)
                    && self.table.substitute(*declared, &args) == target =>
                {
                    Some(MemberRef::new(def, index))
                }
                _ => None,
            })
            .collect()
    }

    /// Element type of a buffer whose storage a view can point into.
    fn view_element(&self, source: TypeId) -> Option<TypeId> {
        let descriptor = self.recognizer.recognize(source);
        descriptor
            .element
            .filter(|_| descriptor.is_recognized() && self.table.is_value_type(source))
    }

    fn compare(&self, a: ConversionCandidate, b: ConversionCandidate) -> Ordering {
        a.kind.rank().cmp(&b.kind.rank()).then_with(|| {
            if a.kind.rank() == 1 {
                self.view_preference(a.target)
                    .cmp(&self.view_preference(b.target))
            } else {
                Ordering::Equal
            }
        })
    }

    /// Mutable views convert to read-only ones, so they are the better
    /// target.
    fn view_preference(&self, target: TypeId) -> u8 {
        match self.table.as_view(target) {
            Some((ViewKind::Mutable, _)) => 0,
            _ => 1,
        }
    }
}

impl<'a> Lowerer<'a> {
    /// Lower `operand` converted to one of `targets`.
    ///
    /// Conversions that involve no view type are left to the binder's
    /// choice and lowered as a plain conversion to the node's type.
    pub(crate) fn lower_conversion(
        &mut self,
        id: BoundId,
        operand: BoundId,
        targets: &[TypeId],
        explicit: bool,
    ) -> Result<LoweredId, ErrorGuaranteed> {
        let src = self.src();
        let span = src.span(id);
        let source = src.ty(operand);
        let table = self.table();

        if source.is_error() || !targets.iter().any(|&t| table.as_view(t).is_some()) {
            let lowered = self.lower_expr(operand);
            return Ok(self.push(
                LoweredKind::Convert {
                    operand: lowered,
                    explicit,
                },
                src.ty(id),
                span,
            ));
        }

        let place = self.classify(operand);
        let resolver = ViewConversionResolver::new(self.ctx.recognizer);
        match resolver.resolve(source, place, targets, explicit) {
            Resolution::Resolved(candidate) => {
                tracing::trace!(
                    target = %table.display(candidate.target),
                    kind = ?candidate.kind,
                    "view conversion resolved"
                );
                self.lower_resolved(operand, place, candidate, span)
            }
            Resolution::Ambiguous(first, second) => {
                let diagnostic = errors::ambiguous_conversion(
                    &table.display(first.target),
                    &table.display(second.target),
                    &table.display(source),
                    span,
                );
                Err(self.diagnostics.emit_error(diagnostic))
            }
            Resolution::NoConversion => {
                let descriptor = self.ctx.recognizer.recognize(source);
                let diagnostic = self.no_view_conversion(&descriptor, place, targets, span);
                Err(self.diagnostics.emit_error(diagnostic))
            }
        }
    }

    fn lower_resolved(
        &mut self,
        operand: BoundId,
        place: Place,
        candidate: ConversionCandidate,
        span: Span,
    ) -> Result<LoweredId, ErrorGuaranteed> {
        let target = candidate.target;
        match candidate.kind {
            ConversionKind::Identity => Ok(self.lower_expr(operand)),
            ConversionKind::ViewWidening => {
                let operand = self.lower_expr(operand);
                Ok(self.push(
                    LoweredKind::Convert {
                        operand,
                        explicit: false,
                    },
                    target,
                    span,
                ))
            }
            ConversionKind::UserDefined(member) => {
                let operand = self.lower_expr(operand);
                Ok(self.push(LoweredKind::UserConversion { member, operand }, target, span))
            }
            ConversionKind::BufferView(kind) => {
                self.require_primitives(&required_for_view(kind), span)?;
                let source = self.src().ty(operand);
                let descriptor = self.ctx.recognizer.recognize(source);
                let element = descriptor.element.unwrap_or(TypeId::ERROR);
                let mut effects = SmallVec::new();
                let buffer = self.source_buffer(operand, place, kind, false, false, &mut effects);
                let helper = HelperKind::for_view(kind);
                let view = self.push(
                    LoweredKind::HelperCall {
                        helper,
                        buffer,
                        buffer_ty: source,
                        element_ty: element,
                        length: descriptor.capacity,
                    },
                    target,
                    span,
                );
                self.ctx.helpers.get_or_synthesize(helper);
                Ok(self.sequence(effects, view, span))
            }
        }
    }

    /// Why no conversion to a view applies, phrased in the most specific
    /// vocabulary available.
    fn no_view_conversion(
        &self,
        descriptor: &BufferTypeDescriptor,
        place: Place,
        targets: &[TypeId],
        span: Span,
    ) -> Diagnostic {
        let table = self.table();
        let source = descriptor.source;
        let target = targets
            .iter()
            .copied()
            .find(|&t| table.as_view(t).is_some())
            .unwrap_or(TypeId::ERROR);

        if descriptor.is_recognized() && descriptor.element.is_none() {
            return errors::cannot_index(&table.display(source), span);
        }
        let same_element = descriptor.is_indexable()
            && table
                .as_view(target)
                .is_some_and(|(_, element)| Some(element) == descriptor.element);
        if same_element && table.is_value_type(source) {
            match place.addressability {
                Addressability::Rvalue => return check::ref_needs_variable(ArgMode::Ref, span),
                Addressability::ReadOnlyBinding => {
                    return check::ref_to_readonly(ArgMode::Ref, span);
                }
                Addressability::StableVariable => {}
            }
        }
        errors::no_conversion(&table.display(source), &table.display(target), span)
    }

    /// Targets a conversion node may settle on.
    fn conversion_targets(&self, id: BoundId) -> SmallVec<[TypeId; 2]> {
        match self.src().kind(id) {
            BoundKind::ConvertToOneOf { targets, .. } => targets.clone(),
            _ => smallvec![self.src().ty(id)],
        }
    }

    /// Value escape of a conversion result: views over a buffer inherit its
    /// storage's escape, widened views keep their operand's.
    pub(crate) fn conversion_escape(&self, id: BoundId, operand: BoundId) -> Escape {
        let explicit = matches!(
            self.src().kind(id),
            BoundKind::Convert { explicit: true, .. }
        );
        let targets = self.conversion_targets(id);
        let resolver = ViewConversionResolver::new(self.ctx.recognizer);
        let place = self.classify(operand);
        match resolver.resolve(self.src().ty(operand), place, &targets, explicit) {
            Resolution::Resolved(ConversionCandidate {
                kind: ConversionKind::BufferView(_),
                ..
            }) => self.storage_escape(operand),
            Resolution::Resolved(ConversionCandidate {
                kind: ConversionKind::Identity | ConversionKind::ViewWidening,
                ..
            }) => self.value_escape(operand),
            _ => Escape::HEAP,
        }
    }
}
