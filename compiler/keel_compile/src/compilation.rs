//! Lowering a batch of bound units.
//!
//! Units are independent: each one is lowered with its own diagnostic
//! queue, sharing only the type table, the buffer recognizer's memo tables
//! and the helper table. Results are merged back in input order, so the
//! output does not depend on how the pool scheduled the work.
//!
//! A compilation may lower several batches. Recognition results and
//! synthesized helpers live as long as the compilation; each batch reports
//! only the declaration diagnostics and helpers it produced first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use keel_diagnostic::DiagnosticQueue;
use keel_ir::{BoundUnit, HelperKind, LoweredUnit};
use keel_lower::{lower_unit, HelperTable, LowerContext, SynthesizedHelper};
use keel_types::{BufferRecognizer, RecognitionCache, TypeTable};
use smallvec::SmallVec;
use rayon::prelude::*;

use crate::options::{CompilationOptions, OptionsError};

/// Worker stack size. Lowering grows its stack on demand, this only sets the
/// starting point.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error, Clone, Eq, PartialEq)]
pub enum CompileError {
    #[error("compilation cancelled after {completed} of {total} units")]
    Cancelled { completed: usize, total: usize },
    #[error("invalid options: {0}")]
    Options(#[from] OptionsError),
}

/// Shared flag a host sets to stop lowering. Checked between units only; a
/// unit that has started always finishes.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Everything lowering produced for one batch.
#[derive(Debug)]
pub struct CompilationOutput {
    /// Lowered units, in input order.
    pub units: Vec<LoweredUnit>,
    /// Helpers first synthesized by this batch, mutable first. Earlier
    /// batches already handed out the rest.
    pub helpers: Vec<Arc<SynthesizedHelper>>,
    /// Declaration diagnostics raised by this batch first, then each unit's
    /// diagnostics in unit order.
    pub diagnostics: DiagnosticQueue,
}

impl CompilationOutput {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// One compilation: a frozen type table plus the helpers synthesized for it.
pub struct Compilation {
    table: TypeTable,
    options: CompilationOptions,
    recognition: RecognitionCache,
    helpers: HelperTable,
    /// Helpers already returned by an earlier batch.
    reported: SmallVec<[HelperKind; 2]>,
    cancellation: CancellationFlag,
}

impl Compilation {
    pub fn new(table: TypeTable, options: CompilationOptions) -> Result<Self, CompileError> {
        options.validate()?;
        Ok(Compilation {
            table,
            options,
            recognition: RecognitionCache::new(),
            helpers: HelperTable::new(),
            reported: SmallVec::new(),
            cancellation: CancellationFlag::new(),
        })
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    pub fn options(&self) -> &CompilationOptions {
        &self.options
    }

    /// Helpers synthesized by every batch lowered so far.
    pub fn helpers(&self) -> &HelperTable {
        &self.helpers
    }

    /// Handle for cancelling this compilation from another thread.
    pub fn cancellation(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    /// Lower `units`, in parallel unless the options say otherwise.
    pub fn lower_units(&mut self, units: &[BoundUnit]) -> Result<CompilationOutput, CompileError> {
        let recognizer = BufferRecognizer::with_cache(&self.table, &self.recognition);
        let ctx = LowerContext::new(&recognizer, &self.helpers, &self.options.primitives)
            .with_diagnostics(self.options.diagnostics.clone());

        let results = if self.options.parallel && units.len() > 1 {
            self.lower_parallel(&ctx, units)
        } else {
            self.lower_sequential(&ctx, units)
        };

        let completed = results.iter().filter(|r| r.is_some()).count();
        if completed < units.len() {
            tracing::debug!(completed, total = units.len(), "lowering cancelled");
            return Err(CompileError::Cancelled {
                completed,
                total: units.len(),
            });
        }

        let mut diagnostics = DiagnosticQueue::with_config(self.options.diagnostics.clone());
        for diagnostic in recognizer.take_declaration_diagnostics() {
            diagnostics.push(diagnostic);
        }
        let mut lowered = Vec::with_capacity(units.len());
        for (unit, queue) in results.into_iter().flatten() {
            diagnostics.extend(queue);
            lowered.push(unit);
        }

        let helpers: Vec<_> = self
            .helpers
            .emitted()
            .into_iter()
            .filter(|helper| !self.reported.contains(&helper.kind))
            .collect();
        self.reported.extend(helpers.iter().map(|helper| helper.kind));
        tracing::info!(
            units = lowered.len(),
            errors = diagnostics.error_count(),
            helpers = helpers.len(),
            "lowering finished"
        );
        Ok(CompilationOutput {
            units: lowered,
            helpers,
            diagnostics,
        })
    }

    fn lower_sequential(
        &self,
        ctx: &LowerContext<'_>,
        units: &[BoundUnit],
    ) -> Vec<Option<(LoweredUnit, DiagnosticQueue)>> {
        units.iter().map(|unit| self.lower_one(ctx, unit)).collect()
    }

    /// Lower on a scoped pool, torn down before returning. Falls back to the
    /// calling thread if the pool cannot be built.
    fn lower_parallel(
        &self,
        ctx: &LowerContext<'_>,
        units: &[BoundUnit],
    ) -> Vec<Option<(LoweredUnit, DiagnosticQueue)>> {
        let mut builder = rayon::ThreadPoolBuilder::new().stack_size(WORKER_STACK_SIZE);
        if let Some(threads) = self.options.threads {
            builder = builder.num_threads(threads);
        }
        builder
            .build_scoped(rayon::ThreadBuilder::run, |pool| {
                pool.install(|| {
                    units
                        .par_iter()
                        .map(|unit| self.lower_one(ctx, unit))
                        .collect::<Vec<_>>()
                })
            })
            .unwrap_or_else(|e| {
                tracing::warn!("failed to create thread pool ({e}), lowering sequentially");
                self.lower_sequential(ctx, units)
            })
    }

    fn lower_one(
        &self,
        ctx: &LowerContext<'_>,
        unit: &BoundUnit,
    ) -> Option<(LoweredUnit, DiagnosticQueue)> {
        if self.cancellation.is_cancelled() {
            return None;
        }
        let name = self.table.interner().lookup(unit.name);
        let _span = tracing::debug_span!("lower_unit", unit = name).entered();
        Some(lower_unit(ctx, unit))
    }
}
