//! Expression dispatch.
//!
//! `try_lower` maps each `BoundKind` to its lowered form, handing buffer
//! accesses and conversions to their own modules. The usage an expression
//! is lowered for travels down so receivers know whether they are read or
//! aliased.

use keel_diagnostic::ErrorGuaranteed;
use keel_ir::{
    ArgMode, BoundArg, BoundId, BoundKind, InitElement, LoweredId, LoweredKind, MemberRef, TypeId,
};
use keel_safety::check;
use keel_types::MemberDef;

use super::Lowerer;
use crate::addressability::{AccessUse, AliasSite};
use crate::errors;
use crate::stack::ensure_sufficient_stack;

impl<'a> Lowerer<'a> {
    pub(crate) fn lower_expr(&mut self, id: BoundId) -> LoweredId {
        self.lower_with(id, AccessUse::Read)
    }

    /// Lower `id` for `usage` without checking that its place allows it.
    pub(crate) fn lower_with(&mut self, id: BoundId, usage: AccessUse) -> LoweredId {
        ensure_sufficient_stack(|| match self.try_lower(id, usage) {
            Ok(lowered) => lowered,
            Err(_) => self.error_node(self.src().span(id)),
        })
    }

    /// Lower `id` as a place used for `usage`.
    ///
    /// The whole receiver chain is classified once here; nested lowering
    /// does not check again.
    pub(crate) fn lower_place(&mut self, id: BoundId, usage: AccessUse) -> LoweredId {
        let span = self.src().span(id);
        let place = self.classify(id);
        match self.check_use(place, usage, span) {
            Ok(()) => self.lower_with(id, usage),
            Err(_) => self.error_node(span),
        }
    }

    fn try_lower(&mut self, id: BoundId, usage: AccessUse) -> Result<LoweredId, ErrorGuaranteed> {
        let src = self.src();
        let node = src.get(id);
        let (ty, span) = (node.ty, node.span);

        let lowered = match &node.kind {
            BoundKind::Error => self.error_node(span),
            BoundKind::IntLit(v) => self.push(LoweredKind::IntLit(*v), ty, span),
            BoundKind::Default => self.push(LoweredKind::Default, ty, span),
            BoundKind::Local(local) => self.push(LoweredKind::Local(*local), ty, span),
            BoundKind::Param(param) => self.push(LoweredKind::Param(*param), ty, span),
            BoundKind::This => self.push(LoweredKind::This, ty, span),
            BoundKind::StaticField(field) => self.push(LoweredKind::StaticField(*field), ty, span),
            BoundKind::New => self.push(LoweredKind::New, ty, span),
            BoundKind::TypeRef => {
                let name = self.display(ty);
                return Err(self
                    .diagnostics
                    .emit_error(errors::type_not_valid(&name, span)));
            }

            BoundKind::Field { receiver, field } => {
                let receiver_use = if self.table().is_value_type(src.ty(*receiver)) {
                    usage.for_receiver()
                } else {
                    AccessUse::Read
                };
                let receiver = self.lower_with(*receiver, receiver_use);
                self.push(
                    LoweredKind::Field {
                        receiver,
                        field: *field,
                    },
                    ty,
                    span,
                )
            }
            BoundKind::Call {
                callee,
                receiver,
                args,
                ..
            } => {
                let receiver = receiver.map(|r| self.lower_expr(r));
                let args = self.lower_call_args(args);
                self.push(
                    LoweredKind::Call {
                        callee: *callee,
                        receiver,
                        args,
                    },
                    ty,
                    span,
                )
            }
            BoundKind::ObjectInit { inits } => {
                let mut lowered = Vec::with_capacity(inits.len());
                for init in inits {
                    let element = match self.lower_init_element(ty, init) {
                        Ok(element) => element,
                        Err(_) => self.error_node(init.span),
                    };
                    lowered.push(element);
                }
                self.push(LoweredKind::ObjectInit { inits: lowered }, ty, span)
            }
            BoundKind::Await(operand) => {
                let operand = self.lower_expr(*operand);
                self.push(LoweredKind::Await(operand), ty, span)
            }
            BoundKind::Convert { operand, explicit } => {
                return self.lower_conversion(id, *operand, &[ty], *explicit);
            }
            BoundKind::ConvertToOneOf { operand, targets } => {
                return self.lower_conversion(id, *operand, targets, false);
            }
            BoundKind::FromEnd(operand) => {
                let operand = self.lower_expr(*operand);
                self.push(LoweredKind::FromEnd(operand), ty, span)
            }
            BoundKind::Range { start, end } => {
                let start = start.map(|s| self.lower_expr(s));
                let end = end.map(|e| self.lower_expr(e));
                self.push(LoweredKind::Range { start, end }, ty, span)
            }
            BoundKind::ElementAccess { receiver, args } => {
                return self.lower_element_access(id, *receiver, args, usage);
            }
            BoundKind::Binary { op, left, right } => {
                let left = self.lower_expr(*left);
                let right = self.lower_expr(*right);
                self.push(
                    LoweredKind::Binary {
                        op: *op,
                        left,
                        right,
                    },
                    ty,
                    span,
                )
            }
            BoundKind::Assign { target, value } => {
                let target_l = self.lower_place(*target, AccessUse::Assign);
                let value_l = self.lower_expr(*value);
                self.check_view_store(*target, *value)?;
                self.push(
                    LoweredKind::Assign {
                        target: target_l,
                        value: value_l,
                    },
                    ty,
                    span,
                )
            }
            BoundKind::CompoundAssign { op, target, value } => {
                let target = self.lower_place(*target, AccessUse::CompoundAssign);
                let value = self.lower_expr(*value);
                self.push(
                    LoweredKind::CompoundAssign {
                        op: *op,
                        target,
                        value,
                    },
                    ty,
                    span,
                )
            }
        };
        tracing::trace!(?id, ?lowered, "lowered");
        Ok(lowered)
    }

    fn lower_call_args(&mut self, args: &[BoundArg]) -> Vec<(ArgMode, LoweredId)> {
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            let expr = match arg.mode {
                ArgMode::Value | ArgMode::ImplicitIn => self.lower_expr(arg.expr),
                ArgMode::Ref | ArgMode::Out => self.lower_place(
                    arg.expr,
                    AccessUse::MutableAlias(AliasSite::Argument(arg.mode)),
                ),
                ArgMode::In => self.lower_place(
                    arg.expr,
                    AccessUse::ReadOnlyAlias(AliasSite::Argument(arg.mode)),
                ),
            };
            lowered.push((arg.mode, expr));
        }
        lowered
    }

    /// `[args] = value` inside an object initializer.
    ///
    /// Goes through the target's declared indexer; the built-in buffer
    /// lowering never applies here.
    fn lower_init_element(
        &mut self,
        object_ty: TypeId,
        init: &'a InitElement,
    ) -> Result<LoweredId, ErrorGuaranteed> {
        let target_ty = init
            .member
            .map_or(object_ty, |field| self.table().field_type(object_ty, field));

        let Some(member) = self.settable_indexer(target_ty) else {
            let name = self.display(target_ty);
            return Err(self
                .diagnostics
                .emit_error(errors::element_initializer_without_indexer(&name, init.span)));
        };

        let args = init.args.iter().map(|a| self.lower_expr(a.expr)).collect();
        let value = self.lower_expr(init.value);
        Ok(self.push(
            LoweredKind::IndexerSet {
                field: init.member,
                member,
                args,
                value,
            },
            TypeId::VOID,
            init.span,
        ))
    }

    /// First accessible indexer of `ty` with a setter.
    fn settable_indexer(&self, ty: TypeId) -> Option<MemberRef> {
        let def = self.table().def_of(ty)?;
        let index = self.table().def(def).members.iter().position(|member| {
            matches!(
                member,
                MemberDef::Indexer {
                    has_setter: true,
                    accessible: true,
                    ..
                }
            )
        })?;
        Some(MemberRef::new(def, u32::try_from(index).ok()?))
    }

    /// Assigning a view to a local: whatever it points into must live as
    /// long as the local's current contents may.
    fn check_view_store(&mut self, target: BoundId, value: BoundId) -> Result<(), ErrorGuaranteed> {
        let BoundKind::Local(local) = *self.src().kind(target) else {
            return Ok(());
        };
        let decl = self.unit.local(local);
        if self.table().as_view(decl.ty).is_none() {
            return Ok(());
        }
        let target_scope = self.locals.value_escape(local).scope;
        let escape = self.value_escape(value);
        let name = self.names().lookup(decl.name);
        check::check_escape_into(target_scope, escape, name, self.src().span(value))
            .map_err(|diagnostic| self.diagnostics.emit_error(diagnostic))
    }
}
