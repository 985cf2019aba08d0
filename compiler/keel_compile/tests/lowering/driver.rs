//! Batch lowering through [`Compilation`].

use std::sync::Arc;

use keel_compile::{CompilationOptions, CompileError, OptionsError};
use keel_diagnostic::{DiagnosticConfig, ErrorCode};
use keel_ir::{BoundUnit, HelperKind, Span, TypeId};
use keel_lower::PlatformPrimitive;
use keel_types::{ConstExpr, DeclKind, FieldFlags};
use pretty_assertions::assert_eq;

use crate::common::{codes, helper_calls, read_unit, store_unit, Program};

/// Alternating store/read units over `Buffer10<int>`, plus one unit that
/// writes through a read-only field every `error_every` units.
fn batch(count: usize, error_every: usize) -> (Program, Vec<BoundUnit>) {
    let mut p = Program::new();
    let def = p.buffer10();
    let buf = p.instantiate(def, TypeId::INT);
    let (s, field) = p.holder("S", DeclKind::Struct, buf, false);
    let (r, ro_field) = p.holder("R", DeclKind::Struct, buf, true);
    let units = (0..count)
        .map(|n| {
            let index = i64::try_from(n % 10).unwrap();
            if error_every != 0 && n % error_every == 0 {
                store_unit(&p, &format!("Bad{n}"), r, ro_field, buf, index)
            } else if n % 2 == 0 {
                store_unit(&p, &format!("Store{n}"), s, field, buf, index)
            } else {
                read_unit(&p, &format!("Read{n}"), s, field, buf, index)
            }
        })
        .collect();
    (p, units)
}

fn exact() -> CompilationOptions {
    CompilationOptions::default().with_diagnostics(DiagnosticConfig::unlimited())
}

#[test]
fn parallel_and_sequential_lowering_agree() {
    let (p, units) = batch(48, 7);
    let parallel = p
        .compile(exact().with_threads(4))
        .lower_units(&units)
        .unwrap();
    let (p, units) = batch(48, 7);
    let sequential = p.compile(exact().sequential()).lower_units(&units).unwrap();

    assert_eq!(parallel.units.len(), 48);
    assert_eq!(codes(&parallel), codes(&sequential));
    assert_eq!(codes(&parallel), vec![ErrorCode::E4001; 7]);
    for (a, b) in parallel.units.iter().zip(&sequential.units) {
        assert_eq!(a.name, b.name);
        assert_eq!(helper_calls(a), helper_calls(b));
        assert_eq!(a.arena.len(), b.arena.len());
    }
    let kinds = |output: &keel_compile::CompilationOutput| {
        output.helpers.iter().map(|h| h.kind).collect::<Vec<_>>()
    };
    assert_eq!(kinds(&parallel), kinds(&sequential));
}

#[test]
fn diagnostics_follow_unit_order() {
    let (p, units) = batch(20, 5);
    let output = p.compile(exact().with_threads(8)).lower_units(&units).unwrap();
    let spans: Vec<_> = output
        .diagnostics
        .iter()
        .map(|d| d.primary_span())
        .collect();
    // Every failing unit is built the same way, so its error lands on the
    // same span; order is only visible through the units.
    assert_eq!(spans.len(), 4);
    assert!(spans.windows(2).all(|w| w[0] == w[1]));
    let failed: Vec<_> = output
        .units
        .iter()
        .enumerate()
        .filter(|(_, u)| u.arena.has_errors())
        .map(|(n, _)| n)
        .collect();
    assert_eq!(failed, vec![0, 5, 10, 15]);
}

#[test]
fn helpers_are_shared_by_all_units_and_reported_once() {
    let (p, units) = batch(64, 0);
    let mut compilation = p.compile(exact().with_threads(8));
    let first = compilation.lower_units(&units).unwrap();
    let second = compilation.lower_units(&units).unwrap();

    assert_eq!(
        first.helpers.iter().map(|h| h.kind).collect::<Vec<_>>(),
        vec![HelperKind::AsMutableView, HelperKind::AsReadOnlyView]
    );
    assert!(second.helpers.is_empty());
    assert_eq!(compilation.helpers().len(), 2);
    for helper in &first.helpers {
        let again = compilation.helpers().get_or_synthesize(helper.kind);
        assert!(Arc::ptr_eq(helper, &again));
    }
}

#[test]
fn later_batches_report_only_new_helpers() {
    let (p, units) = batch(4, 0);
    let mut compilation = p.compile(exact().sequential());
    // Unit 0 stores, unit 1 reads.
    let stores = compilation.lower_units(&units[..1]).unwrap();
    let both = compilation.lower_units(&units[..2]).unwrap();
    let again = compilation.lower_units(&units).unwrap();

    let kinds = |output: &keel_compile::CompilationOutput| {
        output.helpers.iter().map(|h| h.kind).collect::<Vec<_>>()
    };
    assert_eq!(kinds(&stores), vec![HelperKind::AsMutableView]);
    assert_eq!(kinds(&both), vec![HelperKind::AsReadOnlyView]);
    assert!(again.helpers.is_empty());
    assert_eq!(again.units.len(), 4);
}

#[test]
fn declaration_diagnostics_reported_in_first_batch_only() {
    let mut p = Program::new();
    let length = p.constant("Sizes", 10, FieldFlags::OBSOLETE);
    let def = p.buffer("OldBuffer", ConstExpr::member(length, Span::new(1, 9)));
    let buf = p.instantiate(def, TypeId::INT);
    let (s, field) = p.holder("S", DeclKind::Struct, buf, false);
    let first: Vec<_> = (0..3)
        .map(|n| store_unit(&p, &format!("Store{n}"), s, field, buf, n))
        .collect();
    let second: Vec<_> = (0..3)
        .map(|n| read_unit(&p, &format!("Read{n}"), s, field, buf, n))
        .collect();

    let mut compilation = p.compile(exact().with_threads(2));
    let one = compilation.lower_units(&first).unwrap();
    let two = compilation.lower_units(&second).unwrap();
    assert_eq!(codes(&one), vec![ErrorCode::W2001]);
    assert!(two.diagnostics.is_empty());
    for unit in &two.units {
        assert_eq!(helper_calls(unit), vec![(HelperKind::AsReadOnlyView, 10)]);
    }
}

#[test]
fn missing_primitive_fails_only_sites_that_need_it() {
    let (p, units) = batch(4, 0);
    let options = exact().without_primitive(PlatformPrimitive::CreateReadOnlyView);
    let output = p.compile(options).lower_units(&units).unwrap();

    assert_eq!(codes(&output), vec![ErrorCode::E5001; 2]);
    assert!(output
        .diagnostics
        .iter()
        .all(|d| d.args == vec!["View.CreateReadOnly".to_owned()]));
    let failed: Vec<_> = output.units.iter().map(|u| u.arena.has_errors()).collect();
    assert_eq!(failed, vec![false, true, false, true]);
    assert_eq!(
        output.helpers.iter().map(|h| h.kind).collect::<Vec<_>>(),
        vec![HelperKind::AsMutableView]
    );
}

#[test]
fn error_limit_applies_to_merged_diagnostics() {
    let (p, units) = batch(30, 3);
    let options = CompilationOptions::default().with_diagnostics(DiagnosticConfig {
        error_limit: 2,
        deduplicate: false,
    });
    let output = p.compile(options).lower_units(&units).unwrap();
    assert_eq!(output.diagnostics.len(), 2);
    assert_eq!(output.diagnostics.error_count(), 10);
    assert!(output.has_errors());
}

#[test]
fn cancelled_compilation_lowers_nothing() {
    let (p, units) = batch(8, 0);
    let mut compilation = p.compile(exact().sequential());
    compilation.cancellation().cancel();
    match compilation.lower_units(&units) {
        Err(err) => assert_eq!(
            err,
            CompileError::Cancelled {
                completed: 0,
                total: 8
            }
        ),
        Ok(_) => panic!("expected cancellation"),
    }
    assert!(compilation.helpers().is_empty());
}

#[test]
fn empty_batch() {
    let (p, _) = batch(0, 0);
    let output = p.compile(exact()).lower_units(&[]).unwrap();
    assert!(output.units.is_empty());
    assert!(output.helpers.is_empty());
    assert!(output.diagnostics.is_empty());
}

#[test]
fn zero_threads_rejected() {
    let (p, _) = batch(0, 0);
    let result = keel_compile::Compilation::new(p.table, exact().with_threads(0));
    assert!(matches!(
        result,
        Err(CompileError::Options(OptionsError::ZeroThreads))
    ));
}
