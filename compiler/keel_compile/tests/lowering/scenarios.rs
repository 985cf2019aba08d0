//! Whole-program scenarios.

use keel_diagnostic::{ErrorCode, Severity};
use keel_ir::{
    ArgMode, FieldRef, HelperKind, LoweredKind, LoweredStmt, ParamRefKind, ReturnKind, Span,
    TypeId, ViewKind,
};
use keel_types::{BufferRecognizer, ConstExpr, DeclKind, FieldFlags};
use pretty_assertions::assert_eq;

use crate::common::{codes, helper_calls, read_unit, store_unit, view_items, Program};

#[test]
fn mutable_view_round_trip_through_stable_field() {
    // struct C { public Buffer10<int> F; }
    // void M() { C x; x.F[0] = 111; _ = x.F[0]; }
    let mut p = Program::new();
    let def = p.buffer10();
    let buf = p.instantiate(def, TypeId::INT);
    let (c, field) = p.holder("C", DeclKind::Struct, buf, false);

    let mut u = p.unit("M");
    let x = u.local("x", c);
    let recv = u.local_ref(x);
    let recv = u.field(recv, field, buf);
    let index = u.int(0);
    let target = u.access(recv, index, TypeId::INT);
    let value = u.int(111);
    let store = u.assign(target, value);
    u.stmt(store);
    let recv = u.local_ref(x);
    let recv = u.field(recv, field, buf);
    let index = u.int(0);
    let read = u.access(recv, index, TypeId::INT);
    u.stmt(read);

    let output = p.lower(&[u.finish()]);
    assert!(!output.has_errors());
    let unit = &output.units[0];
    assert_eq!(
        helper_calls(unit),
        vec![(HelperKind::AsMutableView, 10), (HelperKind::AsMutableView, 10)]
    );
    assert_eq!(view_items(unit), vec![ViewKind::Mutable, ViewKind::Mutable]);

    // The write and the read address the same element of the same storage.
    let indices: Vec<i64> = unit
        .arena
        .iter()
        .filter_map(|(_, node)| match node.kind {
            LoweredKind::ViewItem { index, .. } => match unit.arena.kind(index) {
                LoweredKind::IntLit(i) => Some(*i),
                _ => None,
            },
            _ => None,
        })
        .collect();
    assert_eq!(indices, vec![0, 0]);

    assert_eq!(output.helpers.len(), 1);
    assert_eq!(
        output.helpers[0].signature(),
        "MutableView<TElement> <CompilationPrivate>.AsMutableView<TBuffer, TElement>(ref TBuffer buffer, int length)"
    );
}

#[test]
fn readonly_field_reads_but_rejects_writes() {
    // class C { public readonly Buffer10<int> F; }
    let mut p = Program::new();
    let def = p.buffer10();
    let buf = p.instantiate(def, TypeId::INT);
    let (c, field) = p.holder("C", DeclKind::Class, buf, true);

    let mut read = p.unit("Read");
    let o = read.param("c", c, ParamRefKind::Value);
    let recv = read.param_ref(o);
    let recv = read.field(recv, field, buf);
    let index = read.int(0);
    let element = read.access(recv, index, TypeId::INT);
    read.ret(element);
    let read = read.returns(ReturnKind::Value, TypeId::INT).finish();

    let mut write = p.unit("Write");
    let o = write.param("c", c, ParamRefKind::Value);
    let recv = write.param_ref(o);
    let recv = write.field(recv, field, buf);
    let index = write.int(0);
    let target = write.access(recv, index, TypeId::INT);
    let value = write.int(1);
    let store = write.assign(target, value);
    write.stmt(store);
    let write = write.finish();

    let output = p.lower(&[read, write]);
    assert_eq!(codes(&output), vec![ErrorCode::E4001]);
    assert_eq!(helper_calls(&output.units[0]), vec![(HelperKind::AsReadOnlyView, 10)]);
    assert!(!output.units[0].arena.has_errors());
    assert!(output.units[1].arena.has_errors());
    assert_eq!(
        output.helpers.iter().map(|h| h.kind).collect::<Vec<_>>(),
        vec![HelperKind::AsReadOnlyView]
    );
}

#[test]
fn rvalue_buffer_reads_through_hidden_copy() {
    // static int M() => Make()[0];
    let mut p = Program::new();
    let def = p.buffer10();
    let buf = p.instantiate(def, TypeId::INT);

    let mut u = p.unit("M");
    let make = u.make("Make", buf);
    let index = u.int(0);
    let element = u.access(make, index, TypeId::INT);
    u.ret(element);
    let unit = u.returns(ReturnKind::Value, TypeId::INT).finish();

    let output = p.lower(&[unit]);
    assert!(!output.has_errors());
    let unit = &output.units[0];
    assert_eq!(helper_calls(unit), vec![(HelperKind::AsReadOnlyView, 10)]);
    assert_eq!(unit.temps.len(), 1);
    assert_eq!(unit.temps[0].ty, buf);
    assert!(matches!(unit.body[0], LoweredStmt::Return(Some(_))));
}

#[test]
fn rvalue_buffer_has_no_mutable_view() {
    let mut p = Program::new();
    let def = p.buffer10();
    let buf = p.instantiate(def, TypeId::INT);
    let mutable = p.view(ViewKind::Mutable, TypeId::INT);
    let read_only = p.view(ViewKind::ReadOnly, TypeId::INT);

    let mut bad = p.unit("Mutable");
    let make = bad.make("Make", buf);
    let slice = bad.slice_all(make, mutable);
    bad.stmt(slice);
    let bad = bad.finish();

    // The read-only view of the same rvalue may be passed to a call.
    let mut good = p.unit("ReadOnly");
    let make = good.make("Make", buf);
    let slice = good.slice_all(make, read_only);
    let call = good.call_with("Use", slice, ArgMode::Value);
    good.stmt(call);
    let good = good.finish();

    let output = p.lower(&[bad, good]);
    assert_eq!(codes(&output), vec![ErrorCode::E4003]);
    assert!(output.units[0].arena.has_errors());
    assert!(!output.units[1].arena.has_errors());
    assert_eq!(helper_calls(&output.units[1]), vec![(HelperKind::AsReadOnlyView, 10)]);
}

#[test]
fn cast_and_constant_lengths_match_literal() {
    let mut p = Program::new();
    let length = p.constant("Sizes", 10, FieldFlags::empty());
    let literal = p.buffer10();
    let cast = p.buffer("CastBuffer", ConstExpr::cast(TypeId::SHORT, ConstExpr::int(10)));
    let member = p.buffer("MemberBuffer", ConstExpr::member(length, Span::DUMMY));

    let types: Vec<TypeId> = [literal, cast, member]
        .iter()
        .map(|&def| p.instantiate(def, TypeId::INT))
        .collect();
    let holders: Vec<(TypeId, FieldRef)> = types
        .iter()
        .enumerate()
        .map(|(n, &buf)| p.holder(&format!("S{n}"), DeclKind::Struct, buf, false))
        .collect();

    {
        let recognizer = BufferRecognizer::new(&p.table);
        let shapes: Vec<_> = types
            .iter()
            .map(|&ty| {
                let d = recognizer.recognize(ty);
                (d.capacity, d.element)
            })
            .collect();
        assert_eq!(shapes, vec![(10, Some(TypeId::INT)); 3]);
    }

    let units: Vec<_> = holders
        .iter()
        .zip(&types)
        .enumerate()
        .map(|(n, (&(holder, field), &buf))| {
            read_unit(&p, &format!("Read{n}"), holder, field, buf, 9)
        })
        .collect();
    let output = p.lower(&units);
    assert!(!output.has_errors());
    for unit in &output.units {
        assert_eq!(helper_calls(unit), vec![(HelperKind::AsReadOnlyView, 10)]);
    }
}

#[test]
fn obsolete_length_constant_warns_once() {
    let mut p = Program::new();
    let length = p.constant("Sizes", 10, FieldFlags::OBSOLETE);
    let def = p.buffer("OldBuffer", ConstExpr::member(length, Span::new(1, 9)));
    let buf = p.instantiate(def, TypeId::INT);
    let (s, field) = p.holder("S", DeclKind::Struct, buf, false);

    let units: Vec<_> = (0..4)
        .map(|n| store_unit(&p, &format!("Store{n}"), s, field, buf, n))
        .collect();
    let output = p.lower(&units);
    assert!(!output.has_errors());
    assert_eq!(codes(&output), vec![ErrorCode::W2001]);
    assert_eq!(output.diagnostics.iter().next().map(|d| d.severity), Some(Severity::Warning));
    for unit in &output.units {
        assert_eq!(helper_calls(unit), vec![(HelperKind::AsMutableView, 10)]);
    }
}
