//! Shared fixtures for lowering tests.
//!
//! [`Fixture`] owns a type table with the `InlineBuffer` marker and a
//! generic `Buffer10<T>`; [`UnitBuilder`] assembles bound units node by
//! node. Every node gets its own span so diagnostics can be matched to the
//! node they were reported on.

use keel_diagnostic::{Diagnostic, ErrorCode};
use keel_ir::{
    ArgMode, BoundArg, BoundId, BoundKind, BoundStmt, BoundUnit, DefId, FieldRef, HelperKind,
    LocalId, LocalRefKind, LoweredId, LoweredKind, LoweredNode, LoweredStmt, LoweredUnit, Name,
    ParamId, ParamRefKind, ReturnKind, SharedInterner, Span, TypeId, UnitFlags, ViewKind,
};
use keel_types::{
    AttrId, AttributeApp, AttributeClass, BufferRecognizer, ConstExpr, DeclKind, FieldDef,
    FieldFlags, MemberDef, TypeDef, TypeTable,
};
use smallvec::smallvec;

use crate::helpers::HelperTable;
use crate::lower::{lower_unit, LowerContext, Lowerer};
use crate::primitives::PrimitiveTable;

pub(crate) struct Fixture {
    pub table: TypeTable,
    pub marker: AttrId,
    /// `[InlineBuffer(10)] struct Buffer10<T> { T _element0; }`
    pub buffer: DefId,
}

impl Fixture {
    pub fn new() -> Self {
        let mut table = TypeTable::new(SharedInterner::new());
        let i = table.interner().clone();
        let marker = table.define_attribute(AttributeClass {
            name: i.intern("InlineBuffer"),
            allow_multiple: false,
        });
        let attr = AttributeApp::new(marker, vec![ConstExpr::int(10)]);
        let buffer = table.define_with(|t, id| {
            TypeDef::new(i.intern("Buffer10"), DeclKind::Struct)
                .with_generics([i.intern("T")])
                .with_attribute(attr)
                .with_field(FieldDef::new(i.intern("_element0"), t.param(id, 0)))
        });
        Fixture {
            table,
            marker,
            buffer,
        }
    }

    pub fn name(&self, s: &str) -> Name {
        self.table.interner().intern(s)
    }

    /// `Buffer10<element>`
    pub fn buffer_of(&self, element: TypeId) -> TypeId {
        self.table.named(self.buffer, &[element])
    }

    pub fn view(&self, kind: ViewKind, element: TypeId) -> TypeId {
        self.table.view(kind, element)
    }

    /// A type with a single instance field `F` of type `field_ty`.
    pub fn holder(
        &mut self,
        name: &str,
        kind: DeclKind,
        field_ty: TypeId,
        readonly_field: bool,
    ) -> (TypeId, FieldRef) {
        let mut field = FieldDef::new(self.name("F"), field_ty);
        if readonly_field {
            field = field.with_flags(FieldFlags::READONLY);
        }
        let def = self
            .table
            .define(TypeDef::new(self.name(name), kind).with_field(field));
        (self.table.named(def, &[]), FieldRef::new(def, 0))
    }

    /// A `readonly struct` with a single field `F`.
    pub fn readonly_holder(&mut self, name: &str, field_ty: TypeId) -> (TypeId, FieldRef) {
        let def = self.table.define(
            TypeDef::new(self.name(name), DeclKind::Struct)
                .readonly()
                .with_field(FieldDef::new(self.name("F"), field_ty)),
        );
        (self.table.named(def, &[]), FieldRef::new(def, 0))
    }

    /// Non-generic buffer `[InlineBuffer(length)] {kind} {name} { element _e; }`
    /// with extra members.
    pub fn custom_buffer(
        &mut self,
        name: &str,
        kind: DeclKind,
        element: TypeId,
        members: Vec<MemberDef>,
    ) -> TypeId {
        let attr = AttributeApp::new(self.marker, vec![ConstExpr::int(4)]);
        let mut def = TypeDef::new(self.name(name), kind)
            .with_attribute(attr)
            .with_field(FieldDef::new(self.name("_e"), element));
        def.members = members;
        let def = self.table.define(def);
        self.table.named(def, &[])
    }

    /// Marked type whose only field is static, so it has no element.
    pub fn elementless_buffer(&mut self, name: &str) -> TypeId {
        let attr = AttributeApp::new(self.marker, vec![ConstExpr::int(4)]);
        let field = FieldDef::new(self.name("_e"), TypeId::INT).with_flags(FieldFlags::STATIC);
        let def = self.table.define(
            TypeDef::new(self.name(name), DeclKind::Struct)
                .with_attribute(attr)
                .with_field(field),
        );
        self.table.named(def, &[])
    }

    pub fn unit(&self, name: &str) -> UnitBuilder {
        UnitBuilder::new(self.table.interner().clone(), name)
    }

    pub fn lower(&self, unit: &BoundUnit) -> Lowered {
        self.lower_with(unit, PrimitiveTable::all())
    }

    pub fn lower_with(&self, unit: &BoundUnit, primitives: PrimitiveTable) -> Lowered {
        let recognizer = BufferRecognizer::new(&self.table);
        let helpers = HelperTable::new();
        let ctx = LowerContext::new(&recognizer, &helpers, &primitives);
        let (unit, diagnostics) = lower_unit(&ctx, unit);
        Lowered {
            unit,
            diagnostics: diagnostics.flush(),
            helpers: helpers.emitted().iter().map(|h| h.kind).collect(),
        }
    }

    /// Run `f` against a lowerer for `unit` without lowering the body.
    pub fn with_lowerer<R>(&self, unit: &BoundUnit, f: impl FnOnce(&mut Lowerer<'_>) -> R) -> R {
        let recognizer = BufferRecognizer::new(&self.table);
        let helpers = HelperTable::new();
        let primitives = PrimitiveTable::all();
        let ctx = LowerContext::new(&recognizer, &helpers, &primitives);
        let mut lowerer = Lowerer::new(&ctx, unit);
        f(&mut lowerer)
    }
}

/// Builds a [`BoundUnit`] one node at a time.
pub(crate) struct UnitBuilder {
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

    /// Instance member of `owner`.
    pub fn instance(mut self, owner: TypeId, flags: UnitFlags) -> Self {
        self.unit.owner = Some(owner);
        self.unit.flags |= UnitFlags::INSTANCE | flags;
        self
    }

    pub fn flags(mut self, flags: UnitFlags) -> Self {
        self.unit.flags |= flags;
        self
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

    pub fn local(&mut self, name: &str, ty: TypeId, kind: LocalRefKind, depth: u32) -> LocalId {
        let span = self.span();
        self.unit
            .add_local(self.names.intern(name), ty, kind, depth, span)
    }

    pub fn expr(&mut self, kind: BoundKind, ty: TypeId) -> BoundId {
        let span = self.span();
        self.unit.arena.alloc(kind, ty, span)
    }

    pub fn span_of(&self, id: BoundId) -> Span {
        self.unit.arena.span(id)
    }

    pub fn int(&mut self, value: i64) -> BoundId {
        self.expr(BoundKind::IntLit(value), TypeId::INT)
    }

    /// `^value`
    pub fn from_end(&mut self, value: i64) -> BoundId {
        let operand = self.int(value);
        self.expr(BoundKind::FromEnd(operand), TypeId::INDEX)
    }

    /// `start..end`
    pub fn range(&mut self, start: Option<i64>, end: Option<i64>) -> BoundId {
        let start = start.map(|v| self.int(v));
        let end = end.map(|v| self.int(v));
        self.expr(BoundKind::Range { start, end }, TypeId::RANGE)
    }

    pub fn param_ref(&mut self, param: ParamId) -> BoundId {
        let ty = self.unit.param(param).ty;
        self.expr(BoundKind::Param(param), ty)
    }

    pub fn local_ref(&mut self, local: LocalId) -> BoundId {
        let ty = self.unit.local(local).ty;
        self.expr(BoundKind::Local(local), ty)
    }

    pub fn this(&mut self) -> BoundId {
        let ty = self.unit.owner.unwrap_or(TypeId::ERROR);
        self.expr(BoundKind::This, ty)
    }

    pub fn field(&mut self, receiver: BoundId, field: FieldRef, ty: TypeId) -> BoundId {
        self.expr(BoundKind::Field { receiver, field }, ty)
    }

    /// `receiver[arg]` typed `ty`.
    pub fn access(&mut self, receiver: BoundId, arg: BoundId, ty: TypeId) -> BoundId {
        self.access_with(receiver, BoundArg::positional(arg), ty)
    }

    pub fn access_with(&mut self, receiver: BoundId, arg: BoundArg, ty: TypeId) -> BoundId {
        self.expr(
            BoundKind::ElementAccess {
                receiver,
                args: smallvec![arg],
            },
            ty,
        )
    }

    /// Static call `name(args)`.
    pub fn call(&mut self, name: &str, args: Vec<BoundArg>, returns: ReturnKind, ty: TypeId) -> BoundId {
        let callee = self.names.intern(name);
        self.expr(
            BoundKind::Call {
                callee,
                receiver: None,
                args,
                returns,
            },
            ty,
        )
    }

    /// `name(mode arg)` returning nothing.
    pub fn call_with(&mut self, name: &str, arg: BoundId, mode: ArgMode) -> BoundId {
        self.call(
            name,
            vec![BoundArg::positional(arg).with_mode(mode)],
            ReturnKind::Value,
            TypeId::VOID,
        )
    }

    pub fn convert(&mut self, operand: BoundId, target: TypeId) -> BoundId {
        self.expr(
            BoundKind::Convert {
                operand,
                explicit: false,
            },
            target,
        )
    }

    pub fn assign(&mut self, target: BoundId, value: BoundId) -> BoundId {
        let ty = self.unit.arena.ty(target);
        self.expr(BoundKind::Assign { target, value }, ty)
    }

    pub fn stmt(&mut self, expr: BoundId) {
        self.unit.body.push(BoundStmt::Expr(expr));
    }

    pub fn init(&mut self, local: LocalId, init: BoundId) {
        self.unit.body.push(BoundStmt::Local {
            local,
            init: Some(init),
        });
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

/// Result of lowering one test unit.
pub(crate) struct Lowered {
    pub unit: LoweredUnit,
    pub diagnostics: Vec<Diagnostic>,
    /// Helpers emitted while lowering, in emission order.
    pub helpers: Vec<HelperKind>,
}

impl Lowered {
    pub fn codes(&self) -> Vec<ErrorCode> {
        self.diagnostics.iter().map(|d| d.code).collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &LoweredNode> {
        self.unit.arena.iter().map(|(_, node)| node)
    }

    pub fn count(&self, pred: impl Fn(&LoweredKind) -> bool) -> usize {
        self.nodes().filter(|node| pred(&node.kind)).count()
    }

    pub fn find(&self, pred: impl Fn(&LoweredKind) -> bool) -> Option<&LoweredNode> {
        self.nodes().find(|node| pred(&node.kind))
    }

    /// `(helper, buffer_ty, element_ty, length)` of every helper call.
    pub fn helper_calls(&self) -> Vec<(HelperKind, TypeId, TypeId, u32)> {
        self.nodes()
            .filter_map(|node| match node.kind {
                LoweredKind::HelperCall {
                    helper,
                    buffer_ty,
                    element_ty,
                    length,
                    ..
                } => Some((helper, buffer_ty, element_ty, length)),
                _ => None,
            })
            .collect()
    }

    pub fn kind_of(&self, id: LoweredId) -> &LoweredKind {
        self.unit.arena.kind(id)
    }

    /// Every node reachable from the body, in the order it finishes
    /// evaluating (operands left to right, then the node itself).
    pub fn evaluation_order(&self) -> Vec<&LoweredKind> {
        let mut order = Vec::new();
        self.walk_stmts(&self.unit.body, &mut order);
        order.into_iter().map(|id| self.kind_of(id)).collect()
    }

    fn walk_stmts(&self, stmts: &[LoweredStmt], order: &mut Vec<LoweredId>) {
        for stmt in stmts {
            match stmt {
                LoweredStmt::Expr(id) | LoweredStmt::Local { init: Some(id), .. } => {
                    self.walk(*id, order);
                }
                LoweredStmt::Return(value) => {
                    if let Some(id) = value {
                        self.walk(*id, order);
                    }
                }
                LoweredStmt::Local { init: None, .. } => {}
                LoweredStmt::Block(inner) => self.walk_stmts(inner, order),
            }
        }
    }

    fn walk(&self, id: LoweredId, order: &mut Vec<LoweredId>) {
        let operands: Vec<LoweredId> = match self.kind_of(id) {
            LoweredKind::Error
            | LoweredKind::IntLit(_)
            | LoweredKind::Default
            | LoweredKind::Local(_)
            | LoweredKind::Param(_)
            | LoweredKind::This
            | LoweredKind::StaticField(_)
            | LoweredKind::New
            | LoweredKind::Temp(_)
            | LoweredKind::Hoisted(_) => Vec::new(),
            LoweredKind::Field { receiver, .. } => vec![*receiver],
            LoweredKind::Call { receiver, args, .. } => receiver
                .iter()
                .copied()
                .chain(args.iter().map(|(_, arg)| *arg))
                .collect(),
            LoweredKind::ObjectInit { inits } => inits.clone(),
            LoweredKind::Await(operand)
            | LoweredKind::Convert { operand, .. }
            | LoweredKind::FromEnd(operand)
            | LoweredKind::ViewLength(operand)
            | LoweredKind::RangeStart(operand)
            | LoweredKind::RangeEnd(operand)
            | LoweredKind::DynamicConvert(operand)
            | LoweredKind::UserConversion { operand, .. }
            | LoweredKind::StoreTemp { value: operand, .. }
            | LoweredKind::BindTemp { place: operand, .. }
            | LoweredKind::Hoist { value: operand, .. }
            | LoweredKind::HelperCall {
                buffer: operand, ..
            } => vec![*operand],
            LoweredKind::Range { start, end } => start.iter().chain(end).copied().collect(),
            LoweredKind::Binary { left, right, .. } => vec![*left, *right],
            LoweredKind::Assign { target, value }
            | LoweredKind::CompoundAssign { target, value, .. } => vec![*target, *value],
            LoweredKind::Sequence { effects, value } => {
                effects.iter().copied().chain([*value]).collect()
            }
            LoweredKind::ViewItem { view, index, .. } => vec![*view, *index],
            LoweredKind::ViewSlice {
                view, start, count, ..
            } => vec![*view, *start, *count],
            LoweredKind::IndexOffset { index, length } => vec![*index, *length],
            LoweredKind::IndexerSet { args, value, .. } => {
                args.iter().copied().chain([*value]).collect()
            }
        };
        for operand in operands {
            self.walk(operand, order);
        }
        order.push(id);
    }
}

/// Member declaring a user conversion operator to `target`.
pub(crate) fn conversion(target: TypeId) -> MemberDef {
    MemberDef::Conversion {
        target,
        explicit: false,
    }
}

/// Accessible `this[int]` indexer with a setter.
pub(crate) fn indexer(element: TypeId) -> MemberDef {
    MemberDef::Indexer {
        param: TypeId::INT,
        element,
        has_setter: true,
        accessible: true,
    }
}
