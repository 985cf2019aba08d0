//! Program builder for end-to-end lowering tests.
//!
//! [`Program`] declares types into a fresh table (the `InlineBuffer`
//! attribute is always present); [`UnitBuilder`] assembles bound units.
//! Once every unit is built, [`Program::compile`] hands the table to a
//! [`Compilation`].

use keel_compile::{Compilation, CompilationOptions, CompilationOutput};
use keel_diagnostic::{DiagnosticConfig, ErrorCode};
use keel_ir::{
    ArgMode, BoundArg, BoundId, BoundKind, BoundStmt, BoundUnit, DefId, FieldRef, HelperKind,
    LocalId, LocalRefKind, LoweredKind, LoweredUnit, ParamId, ParamRefKind, ReturnKind,
    SharedInterner, Span, TypeId, ViewKind,
};
use keel_types::{
    AttrId, AttributeApp, AttributeClass, ConstExpr, DeclKind, FieldDef, FieldFlags, TypeDef,
    TypeTable,
};
use smallvec::smallvec;

pub struct Program {
    pub table: TypeTable,
    pub marker: AttrId,
}

impl Program {
    pub fn new() -> Self {
        let mut table = TypeTable::new(SharedInterner::new());
        let name = table.interner().intern("InlineBuffer");
        let marker = table.define_attribute(AttributeClass {
            name,
            allow_multiple: false,
        });
        Program { table, marker }
    }

    /// `[InlineBuffer(length)] struct {name}<T> { T _element0; }`
    pub fn buffer(&mut self, name: &str, length: ConstExpr) -> DefId {
        let i = self.table.interner().clone();
        let attr = AttributeApp::new(self.marker, vec![length]);
        self.table.define_with(|t, id| {
            TypeDef::new(i.intern(name), DeclKind::Struct)
                .with_generics([i.intern("T")])
                .with_attribute(attr)
                .with_field(FieldDef::new(i.intern("_element0"), t.param(id, 0)))
        })
    }

    /// The usual `Buffer10<T>`.
    pub fn buffer10(&mut self) -> DefId {
        self.buffer("Buffer10", ConstExpr::int(10))
    }

    pub fn instantiate(&self, def: DefId, element: TypeId) -> TypeId {
        self.table.named(def, &[element])
    }

    /// `{kind} {name} { [readonly] {field_ty} F; }`
    pub fn holder(
        &mut self,
        name: &str,
        kind: DeclKind,
        field_ty: TypeId,
        readonly_field: bool,
    ) -> (TypeId, FieldRef) {
        let i = self.table.interner().clone();
        let mut field = FieldDef::new(i.intern("F"), field_ty);
        if readonly_field {
            field = field.with_flags(FieldFlags::READONLY);
        }
        let def = self
            .table
            .define(TypeDef::new(i.intern(name), kind).with_field(field));
        (self.table.named(def, &[]), FieldRef::new(def, 0))
    }

    /// `class {name} { const int Length = value; }`
    pub fn constant(&mut self, name: &str, value: i64, flags: FieldFlags) -> FieldRef {
        let i = self.table.interner().clone();
        let def = self.table.define(
            TypeDef::new(i.intern(name), DeclKind::Class).with_field(
                FieldDef::constant(i.intern("Length"), TypeId::INT, ConstExpr::int(value))
                    .with_flags(flags),
            ),
        );
        FieldRef::new(def, 0)
    }

    pub fn view(&self, kind: ViewKind, element: TypeId) -> TypeId {
        self.table.view(kind, element)
    }

    pub fn unit(&self, name: &str) -> UnitBuilder {
        UnitBuilder::new(self.table.interner().clone(), name)
    }

    pub fn compile(self, options: CompilationOptions) -> Compilation {
        Compilation::new(self.table, options).unwrap()
    }

    /// Compile with exact diagnostics and lower `units` in one batch.
    pub fn lower(self, units: &[BoundUnit]) -> CompilationOutput {
        let options = CompilationOptions::default().with_diagnostics(DiagnosticConfig::unlimited());
        self.compile(options).lower_units(units).unwrap()
    }
}

/// Builds a [`BoundUnit`]; every node gets its own span.
pub struct UnitBuilder {
    names: SharedInterner,
    unit: BoundUnit,
    next_span: u32,
}

impl UnitBuilder {
    fn new(names: SharedInterner, name: &str) -> Self {
        let unit = BoundUnit::new(names.intern(name), Span::new(0, 1));
        UnitBuilder {
            names,
            unit,
            next_span: 1,
        }
    }

    fn span(&mut self) -> Span {
        let start = self.next_span * 10;
        self.next_span += 1;
        Span::new(start, start + 5)
    }

    pub fn returns(mut self, returns: ReturnKind, ty: TypeId) -> Self {
        self.unit.returns = returns;
        self.unit.return_ty = ty;
        self
    }

    pub fn param(&mut self, name: &str, ty: TypeId, kind: ParamRefKind) -> ParamId {
        let span = self.span();
        self.unit.add_param(self.names.intern(name), ty, kind, span)
    }

    pub fn local(&mut self, name: &str, ty: TypeId) -> LocalId {
        let span = self.span();
        self.unit
            .add_local(self.names.intern(name), ty, LocalRefKind::Value, 0, span)
    }

    pub fn expr(&mut self, kind: BoundKind, ty: TypeId) -> BoundId {
        let span = self.span();
        self.unit.arena.alloc(kind, ty, span)
    }

    pub fn int(&mut self, value: i64) -> BoundId {
        self.expr(BoundKind::IntLit(value), TypeId::INT)
    }

    pub fn param_ref(&mut self, param: ParamId) -> BoundId {
        let ty = self.unit.param(param).ty;
        self.expr(BoundKind::Param(param), ty)
    }

    pub fn local_ref(&mut self, local: LocalId) -> BoundId {
        let ty = self.unit.local(local).ty;
        self.expr(BoundKind::Local(local), ty)
    }

    pub fn field(&mut self, receiver: BoundId, field: FieldRef, ty: TypeId) -> BoundId {
        self.expr(BoundKind::Field { receiver, field }, ty)
    }

    /// `receiver[arg]` typed `ty`.
    pub fn access(&mut self, receiver: BoundId, arg: BoundId, ty: TypeId) -> BoundId {
        self.expr(
            BoundKind::ElementAccess {
                receiver,
                args: smallvec![BoundArg::positional(arg)],
            },
            ty,
        )
    }

    /// `receiver[..]` typed `ty`.
    pub fn slice_all(&mut self, receiver: BoundId, ty: TypeId) -> BoundId {
        let range = self.expr(
            BoundKind::Range {
                start: None,
                end: None,
            },
            TypeId::RANGE,
        );
        self.access(receiver, range, ty)
    }

    /// Static call `name()` returning `ty` by value.
    pub fn make(&mut self, name: &str, ty: TypeId) -> BoundId {
        let callee = self.names.intern(name);
        self.expr(
            BoundKind::Call {
                callee,
                receiver: None,
                args: Vec::new(),
                returns: ReturnKind::Value,
            },
            ty,
        )
    }

    /// `name(mode arg)` returning nothing.
    pub fn call_with(&mut self, name: &str, arg: BoundId, mode: ArgMode) -> BoundId {
        let callee = self.names.intern(name);
        self.expr(
            BoundKind::Call {
                callee,
                receiver: None,
                args: vec![BoundArg::positional(arg).with_mode(mode)],
                returns: ReturnKind::Value,
            },
            TypeId::VOID,
        )
    }

    pub fn assign(&mut self, target: BoundId, value: BoundId) -> BoundId {
        let ty = self.unit.arena.ty(target);
        self.expr(BoundKind::Assign { target, value }, ty)
    }

    pub fn stmt(&mut self, expr: BoundId) {
        self.unit.body.push(BoundStmt::Expr(expr));
    }

    pub fn ret(&mut self, value: BoundId) {
        let span = self.span();
        self.unit.body.push(BoundStmt::Return {
            value: Some(value),
            span,
        });
    }

    pub fn finish(self) -> BoundUnit {
        self.unit
    }
}

pub fn codes(output: &CompilationOutput) -> Vec<ErrorCode> {
    output.diagnostics.iter().map(|d| d.code).collect()
}

/// `(helper, length)` of every helper call in `unit`.
pub fn helper_calls(unit: &LoweredUnit) -> Vec<(HelperKind, u32)> {
    unit.arena
        .iter()
        .filter_map(|(_, node)| match node.kind {
            LoweredKind::HelperCall { helper, length, .. } => Some((helper, length)),
            _ => None,
        })
        .collect()
}

/// Kinds of every view element access in `unit`.
pub fn view_items(unit: &LoweredUnit) -> Vec<ViewKind> {
    unit.arena
        .iter()
        .filter_map(|(_, node)| match node.kind {
            LoweredKind::ViewItem { kind, .. } => Some(kind),
            _ => None,
        })
        .collect()
}

/// `void {name}(ref {holder} x) { x.F[index] = value; }`
pub fn store_unit(
    program: &Program,
    name: &str,
    holder: TypeId,
    field: FieldRef,
    buffer: TypeId,
    index: i64,
) -> BoundUnit {
    let mut u = program.unit(name);
    let x = u.param("x", holder, ParamRefKind::Ref);
    let recv = u.param_ref(x);
    let recv = u.field(recv, field, buffer);
    let index = u.int(index);
    let target = u.access(recv, index, TypeId::INT);
    let value = u.int(1);
    let store = u.assign(target, value);
    u.stmt(store);
    u.finish()
}

/// `int {name}(in {holder} x) => x.F[index];`
pub fn read_unit(
    program: &Program,
    name: &str,
    holder: TypeId,
    field: FieldRef,
    buffer: TypeId,
    index: i64,
) -> BoundUnit {
    let mut u = program.unit(name);
    let x = u.param("x", holder, ParamRefKind::In);
    let recv = u.param_ref(x);
    let recv = u.field(recv, field, buffer);
    let index = u.int(index);
    let read = u.access(recv, index, TypeId::INT);
    u.ret(read);
    u.returns(ReturnKind::Value, TypeId::INT).finish()
}
