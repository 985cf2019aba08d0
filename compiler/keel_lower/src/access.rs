//! Element-access lowering.
//!
//! `x[i]` and `x[a..b]` on a recognized buffer become
//!
//! ```text
//! <CompilationPrivate>.AsMutableView<B, T>(ref x, N).Item(i)
//! <CompilationPrivate>.AsReadOnlyView<B, T>(in x, N).Slice(start, count)
//! ```
//!
//! whatever indexers or slice methods the buffer type declares. The view
//! kind is picked once per site from the receiver's addressability and
//! whether the site writes. Accesses on a view go straight to the view's
//! own accessors.

use keel_diagnostic::ErrorGuaranteed;
use keel_ir::{
    ArgMode, BoundArg, BoundId, BoundKind, HelperKind, LoweredId, LoweredKind, Span, TypeId,
    UnitFlags, ViewKind,
};
use keel_safety::check;
use smallvec::SmallVec;

use crate::addressability::{AccessUse, Addressability, AliasSite, Place};
use crate::errors;
use crate::index::{IndexForm, Length};
use crate::lower::Lowerer;
use crate::primitives::{required_for_access, IndexShape};

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_element_access(
        &mut self,
        id: BoundId,
        receiver: BoundId,
        args: &'a [BoundArg],
        usage: AccessUse,
    ) -> Result<LoweredId, ErrorGuaranteed> {
        let src = self.src();
        let span = src.span(id);
        let recv_ty = src.ty(receiver);

        if matches!(src.kind(receiver), BoundKind::TypeRef) {
            let name = self.display(recv_ty);
            return Err(self
                .diagnostics
                .emit_error(errors::type_not_valid(&name, src.span(receiver))));
        }
        if recv_ty.is_error() {
            return Ok(self.error_node(span));
        }

        if let Some((kind, element)) = self.table().as_view(recv_ty) {
            let operand = self.check_access_args(args, span)?;
            let shape = self.index_shape(operand)?;
            return self.lower_view_access(id, receiver, kind, element, operand, shape);
        }

        // Recognition accepts any declaration kind; only value types have
        // storage a view can point into.
        let descriptor = self.ctx.recognizer.recognize(recv_ty);
        let element = descriptor
            .element
            .filter(|_| descriptor.is_recognized() && self.table().is_value_type(recv_ty));
        let Some(element) = element else {
            let name = self.display(recv_ty);
            return Err(self
                .diagnostics
                .emit_error(errors::cannot_index(&name, span)));
        };
        let operand = self.check_access_args(args, span)?;
        let shape = self.index_shape(operand)?;
        let is_slice = shape == IndexShape::Range;

        let target_ty = src.ty(id);
        let write = if is_slice {
            self.requires_mutable_view(target_ty)
        } else {
            usage.write_required()
        };
        let place = self.classify(receiver);
        let kind = self.select_view_kind(place, write, is_slice, element, usage, span)?;
        self.require_primitives(&required_for_access(Some(kind), kind, shape), span)?;

        let spill = self.spills(operand);
        let mut effects = SmallVec::new();
        let buffer =
            self.source_buffer(receiver, place, kind, spill, spill || is_slice, &mut effects);
        let mut form =
            self.lower_index(operand, shape, Length::Const(descriptor.capacity), &mut effects);
        if spill {
            form = self.spill_item(form, span, &mut effects);
        }
        let helper = HelperKind::for_view(kind);
        let view_ty = self.table().view(kind, element);
        let view = self.push(
            LoweredKind::HelperCall {
                helper,
                buffer,
                buffer_ty: recv_ty,
                element_ty: element,
                length: descriptor.capacity,
            },
            view_ty,
            span,
        );
        self.ctx.helpers.get_or_synthesize(helper);

        let value = self.access_view(view, kind, element, form, target_ty, span);
        tracing::trace!(
            ?kind,
            ?shape,
            capacity = descriptor.capacity,
            hidden_copy = place.is_rvalue(),
            "buffer access lowered"
        );
        Ok(self.sequence(effects, value, span))
    }

    /// `view[i]` / `view[a..b]` on a value that already is a view.
    fn lower_view_access(
        &mut self,
        id: BoundId,
        receiver: BoundId,
        kind: ViewKind,
        element: TypeId,
        operand: BoundId,
        shape: IndexShape,
    ) -> Result<LoweredId, ErrorGuaranteed> {
        let src = self.src();
        let span = src.span(id);
        let recv_ty = src.ty(receiver);
        let target_ty = src.ty(id);

        if shape == IndexShape::Range
            && kind == ViewKind::ReadOnly
            && self.requires_mutable_view(target_ty)
        {
            let (from, to) = (self.display(recv_ty), self.display(target_ty));
            return Err(self
                .diagnostics
                .emit_error(errors::no_conversion(&from, &to, span)));
        }
        self.require_primitives(&required_for_access(None, kind, shape), span)?;

        let mut effects = SmallVec::new();
        let lowered = self.lower_expr(receiver);
        // The view is read twice when its length is needed.
        let bind = (shape != IndexShape::Int || self.spills(operand)) && !self.is_simple(receiver);
        let (view, length) = if bind {
            let temp = self.store_temp(lowered, recv_ty, span, &mut effects);
            (self.temp_node(temp, recv_ty, span), Length::ViewTemp(temp, recv_ty))
        } else {
            (lowered, Length::View(receiver))
        };
        let form = self.lower_index(operand, shape, length, &mut effects);
        let value = self.access_view(view, kind, element, form, target_ty, span);
        Ok(self.sequence(effects, value, span))
    }

    fn access_view(
        &mut self,
        view: LoweredId,
        kind: ViewKind,
        element: TypeId,
        form: IndexForm,
        target_ty: TypeId,
        span: Span,
    ) -> LoweredId {
        match form {
            IndexForm::Item(index) => {
                self.push(LoweredKind::ViewItem { kind, view, index }, element, span)
            }
            IndexForm::Slice { start, count } => {
                let view_ty = self.table().view(kind, element);
                let slice = self.push(
                    LoweredKind::ViewSlice {
                        kind,
                        view,
                        start,
                        count,
                    },
                    view_ty,
                    span,
                );
                match self.table().as_view(target_ty) {
                    Some((ViewKind::ReadOnly, _)) if kind.is_mutable() => self.push(
                        LoweredKind::Convert {
                            operand: slice,
                            explicit: false,
                        },
                        target_ty,
                        span,
                    ),
                    _ => slice,
                }
            }
        }
    }

    /// Whether evaluating `operand` may suspend, so values computed before
    /// it must be hoisted.
    fn spills(&self, operand: BoundId) -> bool {
        let spills = self.unit.flags.contains(UnitFlags::ASYNC) && self.src().contains_await(operand);
        if spills {
            tracing::debug!(?operand, "access operands spilled across suspension");
        }
        spills
    }

    /// Evaluate an item position into a temporary among `effects`, so the
    /// view is only formed once every suspension in the operand is done.
    /// Slice bounds are already stored there.
    fn spill_item(
        &mut self,
        form: IndexForm,
        span: Span,
        effects: &mut SmallVec<[LoweredId; 4]>,
    ) -> IndexForm {
        match form {
            IndexForm::Item(index) => {
                let temp = self.store_temp(index, TypeId::INT, span, effects);
                IndexForm::Item(self.temp_node(temp, TypeId::INT, span))
            }
            slice @ IndexForm::Slice { .. } => slice,
        }
    }

    /// Whether re-reading `id` yields the same storage without side effects.
    pub(crate) fn is_simple(&self, id: BoundId) -> bool {
        let src = self.src();
        match src.kind(id) {
            BoundKind::Local(_) | BoundKind::Param(_) | BoundKind::This | BoundKind::StaticField(_) => {
                true
            }
            BoundKind::Field { receiver, .. } => {
                self.table().is_value_type(src.ty(*receiver)) && self.is_simple(*receiver)
            }
            _ => false,
        }
    }

    fn requires_mutable_view(&self, ty: TypeId) -> bool {
        self.table()
            .as_view(ty)
            .is_some_and(|(kind, _)| kind.is_mutable())
    }

    /// Pick the view kind for an access site over a buffer.
    fn select_view_kind(
        &mut self,
        place: Place,
        write: bool,
        is_slice: bool,
        element: TypeId,
        usage: AccessUse,
        span: Span,
    ) -> Result<ViewKind, ErrorGuaranteed> {
        match (place.addressability, write) {
            (Addressability::StableVariable, _) => Ok(ViewKind::Mutable),
            (_, false) => Ok(ViewKind::ReadOnly),
            (Addressability::ReadOnlyBinding, true) if is_slice => {
                let table = self.table();
                let from = table.display(table.view(ViewKind::ReadOnly, element));
                let to = table.display(table.view(ViewKind::Mutable, element));
                Err(self
                    .diagnostics
                    .emit_error(errors::no_conversion(&from, &to, span)))
            }
            (Addressability::Rvalue, true) if is_slice => Err(self
                .diagnostics
                .emit_error(check::ref_needs_variable(ArgMode::Ref, span))),
            (_, true) => self
                .check_use(place, usage, span)
                .map(|()| ViewKind::Mutable),
        }
    }

    /// The buffer argument of the helper call.
    ///
    /// Rvalues are copied into a hidden temporary first. Receivers whose
    /// evaluation has side effects are bound by reference when something
    /// must run between evaluating them and forming the view, so they are
    /// still evaluated first and only once.
    pub(crate) fn source_buffer(
        &mut self,
        receiver: BoundId,
        place: Place,
        kind: ViewKind,
        spill: bool,
        needs_binding: bool,
        effects: &mut SmallVec<[LoweredId; 4]>,
    ) -> LoweredId {
        let src = self.src();
        let ty = src.ty(receiver);
        let span = src.span(receiver);

        if place.is_rvalue() {
            let value = self.lower_expr(receiver);
            if spill {
                let slot = self.out.declare_slot(ty, false);
                effects.push(self.push(LoweredKind::Hoist { slot, value }, TypeId::VOID, span));
                return self.push(LoweredKind::Hoisted(slot), ty, span);
            }
            let temp = self.store_temp(value, ty, span, effects);
            return self.temp_node(temp, ty, span);
        }

        let usage = match kind {
            ViewKind::Mutable => AccessUse::MutableAlias(AliasSite::Receiver),
            ViewKind::ReadOnly => AccessUse::ReadOnlyAlias(AliasSite::Receiver),
        };
        let lowered = self.lower_with(receiver, usage);
        if !needs_binding || self.is_simple(receiver) {
            return lowered;
        }
        if spill {
            let slot = self.out.declare_slot(ty, true);
            effects.push(self.push(
                LoweredKind::Hoist {
                    slot,
                    value: lowered,
                },
                TypeId::VOID,
                span,
            ));
            self.push(LoweredKind::Hoisted(slot), ty, span)
        } else {
            let temp = self.out.declare_temp(ty, true);
            effects.push(self.push(
                LoweredKind::BindTemp {
                    temp,
                    place: lowered,
                },
                TypeId::VOID,
                span,
            ));
            self.temp_node(temp, ty, span)
        }
    }
}
