//! Bound tree → lowered tree.
//!
//! Walks one unit's statements and expressions, copying ordinary nodes and
//! expanding buffer constructs (see [`crate::access`] and [`crate::convert`]).
//! Every failure is reported once and replaced by an error node, so the rest
//! of the unit still lowers.

mod expr;
mod stmt;

use keel_diagnostic::{DiagnosticConfig, DiagnosticQueue};
use keel_ir::{
    BoundArena, BoundUnit, LoweredId, LoweredKind, LoweredUnit, Span, StringInterner, TypeId,
};
use keel_safety::LocalScopes;
use keel_types::{BufferRecognizer, TypeTable};
use smallvec::SmallVec;

use crate::helpers::HelperTable;
use crate::primitives::PrimitiveTable;

/// Everything lowering reads that outlives a single unit.
///
/// Shared by reference between worker threads.
pub struct LowerContext<'a> {
    pub table: &'a TypeTable,
    pub recognizer: &'a BufferRecognizer<'a>,
    pub helpers: &'a HelperTable,
    pub primitives: &'a PrimitiveTable,
    pub diagnostics: DiagnosticConfig,
}

impl<'a> LowerContext<'a> {
    pub fn new(
        recognizer: &'a BufferRecognizer<'a>,
        helpers: &'a HelperTable,
        primitives: &'a PrimitiveTable,
    ) -> Self {
        LowerContext {
            table: recognizer.table(),
            recognizer,
            helpers,
            primitives,
            diagnostics: DiagnosticConfig::default(),
        }
    }

    #[must_use]
    pub fn with_diagnostics(mut self, config: DiagnosticConfig) -> Self {
        self.diagnostics = config;
        self
    }
}

/// Lower one unit.
///
/// Returns the lowered unit and the diagnostics raised while lowering it.
/// Helpers the unit needs are synthesized into `ctx.helpers` as a side
/// effect.
pub fn lower_unit(ctx: &LowerContext<'_>, unit: &BoundUnit) -> (LoweredUnit, DiagnosticQueue) {
    let mut lowerer = Lowerer::new(ctx, unit);
    let body = lowerer.lower_stmts(&unit.body);
    lowerer.finish(body)
}

/// State for lowering one unit.
pub(crate) struct Lowerer<'a> {
    pub(crate) ctx: &'a LowerContext<'a>,
    pub(crate) unit: &'a BoundUnit,
    /// Target arena and declarations (being built).
    pub(crate) out: LoweredUnit,
    pub(crate) diagnostics: DiagnosticQueue,
    /// Escape tags of the unit's locals, narrowed as they are initialized.
    pub(crate) locals: LocalScopes,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn new(ctx: &'a LowerContext<'a>, unit: &'a BoundUnit) -> Self {
        Lowerer {
            ctx,
            unit,
            out: LoweredUnit::new(unit.name),
            diagnostics: DiagnosticQueue::with_config(ctx.diagnostics.clone()),
            locals: LocalScopes::new(&unit.locals),
        }
    }

    fn finish(self, body: Vec<keel_ir::LoweredStmt>) -> (LoweredUnit, DiagnosticQueue) {
        let mut out = self.out;
        out.body = body;
        tracing::debug!(
            unit = self.ctx.table.interner().lookup(out.name),
            nodes = out.arena.len(),
            temps = out.temps.len(),
            slots = out.slots.len(),
            errors = self.diagnostics.error_count(),
            "unit lowered"
        );
        (out, self.diagnostics)
    }

    /// Source arena (read-only, outlives `self`).
    #[inline]
    pub(crate) fn src(&self) -> &'a BoundArena {
        &self.unit.arena
    }

    #[inline]
    pub(crate) fn table(&self) -> &'a TypeTable {
        self.ctx.table
    }

    #[inline]
    pub(crate) fn names(&self) -> &'a StringInterner {
        self.ctx.table.interner()
    }

    pub(crate) fn display(&self, ty: TypeId) -> String {
        self.table().display(ty)
    }

    pub(crate) fn push(&mut self, kind: LoweredKind, ty: TypeId, span: Span) -> LoweredId {
        self.out.arena.alloc(kind, ty, span)
    }

    pub(crate) fn error_node(&mut self, span: Span) -> LoweredId {
        self.out.arena.error(span)
    }

    /// `effects` followed by `value`; just `value` when there are none.
    pub(crate) fn sequence(
        &mut self,
        effects: SmallVec<[LoweredId; 4]>,
        value: LoweredId,
        span: Span,
    ) -> LoweredId {
        if effects.is_empty() {
            return value;
        }
        let ty = self.out.arena.ty(value);
        self.push(LoweredKind::Sequence { effects, value }, ty, span)
    }
}
