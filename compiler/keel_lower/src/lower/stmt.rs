//! Statements: local initializers and returns carry the escape checks.

use keel_ir::{
    BoundId, BoundStmt, LocalId, LocalRefKind, LoweredId, LoweredKind, LoweredStmt, ReturnKind,
};
use keel_safety::{check, EscapeScope};

use super::Lowerer;
use crate::addressability::{AccessUse, AliasSite};

impl Lowerer<'_> {
    pub(crate) fn lower_stmts(&mut self, stmts: &[BoundStmt]) -> Vec<LoweredStmt> {
        stmts.iter().map(|stmt| self.lower_stmt(stmt)).collect()
    }

    fn lower_stmt(&mut self, stmt: &BoundStmt) -> LoweredStmt {
        match stmt {
            BoundStmt::Expr(expr) => LoweredStmt::Expr(self.lower_expr(*expr)),
            BoundStmt::Local { local, init } => LoweredStmt::Local {
                local: *local,
                init: init.map(|init| self.lower_local_init(*local, init)),
            },
            BoundStmt::Return { value, .. } => {
                LoweredStmt::Return(value.map(|value| self.lower_return(value)))
            }
            BoundStmt::Block(stmts) => LoweredStmt::Block(self.lower_stmts(stmts)),
        }
    }

    fn lower_local_init(&mut self, local: LocalId, init: BoundId) -> LoweredId {
        let decl = self.unit.local(local);
        match decl.ref_kind {
            LocalRefKind::Value => {
                let lowered = self.lower_expr(init);
                if self.table().as_view(decl.ty).is_none() || self.is_error(lowered) {
                    return lowered;
                }
                let escape = self.value_escape(init);
                let name = self.names().lookup(decl.name);
                let span = self.src().span(init);
                if let Err(diagnostic) =
                    check::check_escape_into(EscapeScope::block(decl.depth), escape, name, span)
                {
                    self.diagnostics.emit_error(diagnostic);
                    return self.error_node(span);
                }
                self.locals.bind_value(local, decl, escape);
                lowered
            }
            LocalRefKind::Ref | LocalRefKind::RefReadonly => {
                let usage = if decl.ref_kind == LocalRefKind::Ref {
                    AccessUse::MutableAlias(AliasSite::Local)
                } else {
                    AccessUse::ReadOnlyAlias(AliasSite::Local)
                };
                let escape = self.classify(init).escape;
                let lowered = self.lower_place(init, usage);
                self.locals.bind_ref(local, decl, escape);
                lowered
            }
        }
    }

    fn lower_return(&mut self, value: BoundId) -> LoweredId {
        let span = self.src().span(value);
        let result = match self.unit.returns {
            ReturnKind::Value => {
                if self.table().as_view(self.unit.return_ty).is_none() {
                    return self.lower_expr(value);
                }
                let lowered = self.lower_with(value, AccessUse::ValueReturn);
                if self.is_error(lowered) {
                    return lowered;
                }
                let escape = self.value_escape(value);
                check::check_value_return(escape, span, self.names()).map(|()| lowered)
            }
            ReturnKind::Ref | ReturnKind::RefReadonly => {
                let usage = if self.unit.returns == ReturnKind::Ref {
                    AccessUse::MutableAlias(AliasSite::Return)
                } else {
                    AccessUse::ReadOnlyAlias(AliasSite::Return)
                };
                let escape = self.classify(value).escape;
                let lowered = self.lower_place(value, usage);
                if self.is_error(lowered) {
                    return lowered;
                }
                check::check_ref_return(escape, span, self.names()).map(|()| lowered)
            }
        };
        match result {
            Ok(lowered) => lowered,
            Err(diagnostic) => {
                self.diagnostics.emit_error(diagnostic);
                self.error_node(span)
            }
        }
    }

    pub(crate) fn is_error(&self, id: LoweredId) -> bool {
        matches!(self.out.arena.kind(id), LoweredKind::Error)
    }
}
