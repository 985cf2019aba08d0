//! Addressability and escape tags of bound expressions.
//!
//! [`Lowerer::classify`] answers two questions about an expression used as a
//! place: may it be written or aliased mutably, and how far may a reference
//! to it escape. [`Lowerer::value_escape`] answers the second question for
//! the reference-like *value* of a view-typed expression.

use keel_diagnostic::ErrorGuaranteed;
use keel_ir::{
    ArgMode, BoundId, BoundKind, FieldRef, LocalRefKind, ParamRefKind, ReturnKind, Span, TypeId,
    UnitFlags,
};
use keel_safety::{check, Escape, EscapeOrigin, EscapeScope, HasEscapeScope};

use crate::errors;
use crate::lower::Lowerer;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Addressability {
    /// Field, local or parameter storage that may be written.
    StableVariable,
    /// Storage reachable only for reading: a read-only field, an `in`
    /// parameter, `this` in a read-only member.
    ReadOnlyBinding,
    /// A value without storage of its own: call results, conversions, fresh
    /// values, awaited results.
    Rvalue,
}

/// Addressability of an expression together with its reference escape.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Place {
    pub addressability: Addressability,
    pub escape: Escape,
}

impl Place {
    pub const RVALUE: Place = Place {
        addressability: Addressability::Rvalue,
        escape: Escape::TEMPORARY,
    };

    pub const fn stable(escape: Escape) -> Self {
        Place {
            addressability: Addressability::StableVariable,
            escape,
        }
    }

    pub const fn read_only(escape: Escape) -> Self {
        Place {
            addressability: Addressability::ReadOnlyBinding,
            escape,
        }
    }

    /// The same storage seen through a read-only path.
    #[must_use]
    pub fn as_read_only(self) -> Self {
        match self.addressability {
            Addressability::StableVariable => Place::read_only(self.escape),
            Addressability::ReadOnlyBinding | Addressability::Rvalue => self,
        }
    }

    pub fn is_rvalue(&self) -> bool {
        self.addressability == Addressability::Rvalue
    }
}

impl HasEscapeScope for Place {
    fn ref_escape(&self) -> Escape {
        self.escape
    }
}

/// Where an alias to a place is created.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AliasSite {
    /// Call argument passed with the given modifier.
    Argument(ArgMode),
    /// Initializer of a `ref` or `ref readonly` local.
    Local,
    /// `return ref`.
    Return,
    /// Receiver of an element access or field access being aliased on
    /// behalf of the outer expression.
    Receiver,
}

impl AliasSite {
    fn keyword_mode(self) -> ArgMode {
        match self {
            AliasSite::Argument(mode) => mode,
            AliasSite::Local | AliasSite::Return | AliasSite::Receiver => ArgMode::Ref,
        }
    }
}

/// How the result of an expression is used.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum AccessUse {
    Read,
    Assign,
    CompoundAssign,
    MutableAlias(AliasSite),
    ReadOnlyAlias(AliasSite),
    /// Returned by value from a unit returning a view.
    ValueReturn,
}

impl AccessUse {
    pub fn write_required(self) -> bool {
        matches!(
            self,
            AccessUse::Assign | AccessUse::CompoundAssign | AccessUse::MutableAlias(_)
        )
    }

    /// Use of a value-type receiver when its field or element is used this
    /// way.
    #[must_use]
    pub fn for_receiver(self) -> AccessUse {
        if self.write_required() {
            AccessUse::MutableAlias(AliasSite::Receiver)
        } else {
            AccessUse::Read
        }
    }
}

impl Lowerer<'_> {
    pub(crate) fn classify(&self, id: BoundId) -> Place {
        let src = self.src();
        match src.kind(id) {
            // Already reported; stay permissive so nothing cascades.
            BoundKind::Error => Place::stable(Escape::HEAP),
            BoundKind::Local(local) => {
                let escape = self.locals.ref_escape(*local);
                match self.unit.local(*local).ref_kind {
                    LocalRefKind::Value | LocalRefKind::Ref => Place::stable(escape),
                    LocalRefKind::RefReadonly => Place::read_only(escape),
                }
            }
            BoundKind::Param(param) => {
                let decl = self.unit.param(*param);
                let by_ref = Escape::new(EscapeScope::CALLER, EscapeOrigin::RefParameter);
                match decl.ref_kind {
                    ParamRefKind::Value => Place::stable(Escape::new(
                        EscapeScope::PARAMETER,
                        EscapeOrigin::ValueParameter {
                            name: decl.name,
                            span: decl.span,
                        },
                    )),
                    ParamRefKind::Ref | ParamRefKind::Out => Place::stable(by_ref),
                    ParamRefKind::In => Place::read_only(by_ref),
                }
            }
            BoundKind::This => self.this_place(),
            BoundKind::Field { receiver, field } => self.field_place(*receiver, *field),
            BoundKind::StaticField(field) => {
                if self.table().field(*field).is_readonly() {
                    Place::read_only(Escape::HEAP)
                } else {
                    Place::stable(Escape::HEAP)
                }
            }
            BoundKind::Call { args, returns, .. } => {
                if *returns == ReturnKind::Value {
                    return Place::RVALUE;
                }
                // A returned reference lives no longer than the narrowest
                // reference passed in.
                let escape = args
                    .iter()
                    .filter(|a| matches!(a.mode, ArgMode::Ref | ArgMode::Out | ArgMode::In))
                    .map(|a| self.classify(a.expr).escape)
                    .fold(Escape::HEAP, Escape::narrowest);
                match returns {
                    ReturnKind::RefReadonly => Place::read_only(escape),
                    ReturnKind::Ref | ReturnKind::Value => Place::stable(escape),
                }
            }
            BoundKind::ElementAccess { receiver, args } => {
                let is_slice = args
                    .first()
                    .is_some_and(|a| src.ty(a.expr) == TypeId::RANGE);
                self.element_place(*receiver, is_slice)
            }
            _ => Place::RVALUE,
        }
    }

    fn this_place(&self) -> Place {
        let Some(owner) = self.unit.owner.filter(|_| self.unit.is_instance()) else {
            return Place::RVALUE;
        };
        let table = self.table();
        if !table.is_value_type(owner) {
            // A class `this` is a reference value; its fields live on the heap.
            return Place::RVALUE;
        }
        let flags = self.unit.flags;
        let escape = if flags.contains(UnitFlags::UNSCOPED_REF) {
            Escape::new(EscapeScope::CALLER, EscapeOrigin::RefParameter)
        } else {
            Escape::new(EscapeScope::PARAMETER, EscapeOrigin::StructThis)
        };
        let readonly_type = table
            .def_of(owner)
            .is_some_and(|def| table.def(def).readonly);
        let constructing = flags.contains(UnitFlags::CONSTRUCTOR);
        if flags.contains(UnitFlags::READONLY_MEMBER) || (readonly_type && !constructing) {
            Place::read_only(escape)
        } else {
            Place::stable(escape)
        }
    }

    fn field_place(&self, receiver: BoundId, field: FieldRef) -> Place {
        let src = self.src();
        let table = self.table();
        let def = table.field(field);
        let through_this_in_ctor = self.unit.flags.contains(UnitFlags::CONSTRUCTOR)
            && matches!(src.kind(receiver), BoundKind::This);
        let readonly =
            (def.is_readonly() || table.def(field.def).readonly) && !through_this_in_ctor;

        let base = if table.is_value_type(src.ty(receiver)) {
            let base = self.classify(receiver);
            if base.is_rvalue() {
                return Place::RVALUE;
            }
            base
        } else {
            Place::stable(Escape::HEAP)
        };
        if readonly {
            base.as_read_only()
        } else {
            base
        }
    }

    /// Place of `receiver[..]`. Slices are values (views); elements share
    /// the receiver's storage, or the view's when the receiver is a view.
    fn element_place(&self, receiver: BoundId, is_slice: bool) -> Place {
        if is_slice {
            return Place::RVALUE;
        }
        let recv_ty = self.src().ty(receiver);
        if let Some((kind, _)) = self.table().as_view(recv_ty) {
            let escape = self.value_escape(receiver);
            return if kind.is_mutable() {
                Place::stable(escape)
            } else {
                Place::read_only(escape)
            };
        }
        let indexable = self.ctx.recognizer.recognize(recv_ty).is_indexable();
        if indexable && self.table().is_value_type(recv_ty) {
            // An element of a value is itself a value read from a hidden copy.
            self.classify(receiver)
        } else {
            // Not a buffer: lowering reports it.
            Place::stable(Escape::HEAP)
        }
    }

    /// How far the value of a view-typed expression may travel.
    pub(crate) fn value_escape(&self, id: BoundId) -> Escape {
        let src = self.src();
        let table = self.table();
        match src.kind(id) {
            BoundKind::Local(local) => self.locals.value_escape(*local),
            BoundKind::ElementAccess { receiver, args } => {
                let is_slice = args
                    .first()
                    .is_some_and(|a| src.ty(a.expr) == TypeId::RANGE);
                if !is_slice {
                    return Escape::HEAP;
                }
                if table.as_view(src.ty(*receiver)).is_some() {
                    self.value_escape(*receiver)
                } else {
                    self.storage_escape(*receiver)
                }
            }
            BoundKind::Convert { operand, .. } | BoundKind::ConvertToOneOf { operand, .. } => {
                self.conversion_escape(id, *operand)
            }
            _ => Escape::HEAP,
        }
    }

    /// Escape of a view formed over `buffer`'s storage.
    pub(crate) fn storage_escape(&self, buffer: BoundId) -> Escape {
        let place = self.classify(buffer);
        if place.is_rvalue() {
            // Formed over a hidden copy.
            Escape::TEMPORARY
        } else {
            place.escape
        }
    }

    /// Report a use of `place` that its addressability does not allow.
    pub(crate) fn check_use(
        &mut self,
        place: Place,
        usage: AccessUse,
        span: Span,
    ) -> Result<(), ErrorGuaranteed> {
        use Addressability::{ReadOnlyBinding, Rvalue, StableVariable};

        let diagnostic = match (usage, place.addressability) {
            (_, StableVariable)
            | (AccessUse::Read | AccessUse::ValueReturn, _)
            | (AccessUse::ReadOnlyAlias(_), ReadOnlyBinding)
            | (AccessUse::ReadOnlyAlias(AliasSite::Receiver), Rvalue) => return Ok(()),
            (AccessUse::Assign | AccessUse::CompoundAssign, Rvalue) => errors::not_assignable(span),
            (AccessUse::Assign | AccessUse::CompoundAssign, ReadOnlyBinding) => {
                check::assign_readonly(span)
            }
            (AccessUse::MutableAlias(AliasSite::Return), Rvalue)
            | (AccessUse::ReadOnlyAlias(_), Rvalue) => {
                if usage == AccessUse::ReadOnlyAlias(AliasSite::Local) {
                    self.diagnostics
                        .emit_error(check::init_by_ref_with_value(span));
                }
                check::not_ref_passable(span)
            }
            (AccessUse::MutableAlias(site), Rvalue) => {
                check::ref_needs_variable(site.keyword_mode(), span)
            }
            (AccessUse::MutableAlias(site), ReadOnlyBinding) => {
                check::ref_to_readonly(site.keyword_mode(), span)
            }
        };
        Err(self.diagnostics.emit_error(diagnostic))
    }
}
