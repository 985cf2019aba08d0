//! Bound tree: the binder's output and lowering's input.
//!
//! Every expression already carries its type. Names are resolved to
//! handles (`LocalId`, `ParamId`, `FieldRef`), but element accesses,
//! conversions and initializers are still in their source-level shape.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::{FieldRef, LocalId, Name, ParamId, Span, TypeId};

/// Index of a node in a [`BoundArena`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct BoundId(u32);

impl BoundId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
}

/// How an argument is passed.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ArgMode {
    /// By value.
    Value,
    /// `ref arg`: mutable alias.
    Ref,
    /// `out arg`: mutable alias, written before read.
    Out,
    /// `in arg`: read-only alias, written explicitly at the call site.
    In,
    /// Plain argument bound to an `in` parameter; a temporary copy is
    /// allowed when the argument has no address.
    ImplicitIn,
}

impl ArgMode {
    /// The modifier keyword as written in source, if any.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            ArgMode::Ref => Some("ref"),
            ArgMode::Out => Some("out"),
            ArgMode::In => Some("in"),
            ArgMode::Value | ArgMode::ImplicitIn => None,
        }
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct BoundArg {
    pub expr: BoundId,
    /// `name: expr` argument label.
    pub name: Option<Name>,
    pub mode: ArgMode,
}

impl BoundArg {
    pub fn positional(expr: BoundId) -> Self {
        BoundArg {
            expr,
            name: None,
            mode: ArgMode::Value,
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ArgMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: Name) -> Self {
        self.name = Some(name);
        self
    }
}

/// How a call returns its result.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum ReturnKind {
    #[default]
    Value,
    Ref,
    RefReadonly,
}

/// `[args] = value` inside an object initializer.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct InitElement {
    /// Member whose value is initialized element-wise (`F = { [0] = 1 }`),
    /// or `None` for elements of the object itself (`new B { [0] = 1 }`).
    pub member: Option<FieldRef>,
    pub args: SmallVec<[BoundArg; 1]>,
    pub value: BoundId,
    pub span: Span,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum BoundKind {
    /// Binding already failed and reported.
    Error,
    IntLit(i64),
    /// `default` of the node's type.
    Default,
    Local(LocalId),
    Param(ParamId),
    This,
    /// A type name in expression position.
    TypeRef,
    Field {
        receiver: BoundId,
        field: FieldRef,
    },
    StaticField(FieldRef),
    Call {
        callee: Name,
        receiver: Option<BoundId>,
        args: Vec<BoundArg>,
        returns: ReturnKind,
    },
    /// Fresh value of the node's type.
    New,
    ObjectInit {
        inits: Vec<InitElement>,
    },
    Await(BoundId),
    /// Conversion to the node's type.
    Convert {
        operand: BoundId,
        explicit: bool,
    },
    /// Argument converted to whichever of `targets` overload resolution
    /// picks, one target per candidate overload. The node's type is the
    /// binder's provisional choice; lowering settles it.
    ConvertToOneOf {
        operand: BoundId,
        targets: SmallVec<[TypeId; 2]>,
    },
    /// `^operand`.
    FromEnd(BoundId),
    /// `start..end`, either side optional.
    Range {
        start: Option<BoundId>,
        end: Option<BoundId>,
    },
    /// `receiver[args]`, indexing or slicing depending on the argument type.
    ///
    /// For indexing the node's type is the element type. For slicing it is
    /// the view type the context requires; any other type means the context
    /// takes whichever view the receiver allows.
    ElementAccess {
        receiver: BoundId,
        args: SmallVec<[BoundArg; 1]>,
    },
    Binary {
        op: BinaryOp,
        left: BoundId,
        right: BoundId,
    },
    Assign {
        target: BoundId,
        value: BoundId,
    },
    CompoundAssign {
        op: BinaryOp,
        target: BoundId,
        value: BoundId,
    },
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct BoundExpr {
    pub kind: BoundKind,
    pub ty: TypeId,
    pub span: Span,
}

/// Flat storage for one unit's expressions.
#[derive(Clone, Default, Debug)]
pub struct BoundArena {
    nodes: Vec<BoundExpr>,
}

impl BoundArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    ///
    /// # Panics
    /// Panics past `u32::MAX` nodes.
    pub fn alloc(&mut self, kind: BoundKind, ty: TypeId, span: Span) -> BoundId {
        let id = match u32::try_from(self.nodes.len()) {
            Ok(raw) => BoundId(raw),
            Err(_) => panic!("bound arena overflow"),
        };
        self.nodes.push(BoundExpr { kind, ty, span });
        id
    }

    #[inline]
    pub fn get(&self, id: BoundId) -> &BoundExpr {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: BoundId) -> &BoundKind {
        &self.get(id).kind
    }

    #[inline]
    pub fn ty(&self, id: BoundId) -> TypeId {
        self.get(id).ty
    }

    #[inline]
    pub fn span(&self, id: BoundId) -> Span {
        self.get(id).span
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct children of `id` in evaluation order.
    pub fn children(&self, id: BoundId) -> SmallVec<[BoundId; 4]> {
        let mut out = SmallVec::new();
        match self.kind(id) {
            BoundKind::Error
            | BoundKind::IntLit(_)
            | BoundKind::Default
            | BoundKind::Local(_)
            | BoundKind::Param(_)
            | BoundKind::This
            | BoundKind::TypeRef
            | BoundKind::StaticField(_)
            | BoundKind::New => {}
            BoundKind::Field { receiver, .. } => out.push(*receiver),
            BoundKind::Call { receiver, args, .. } => {
                out.extend(receiver.iter().copied());
                out.extend(args.iter().map(|a| a.expr));
            }
            BoundKind::ObjectInit { inits } => {
                for init in inits {
                    out.extend(init.args.iter().map(|a| a.expr));
                    out.push(init.value);
                }
            }
            BoundKind::Await(operand)
            | BoundKind::Convert { operand, .. }
            | BoundKind::ConvertToOneOf { operand, .. }
            | BoundKind::FromEnd(operand) => out.push(*operand),
            BoundKind::Range { start, end } => {
                out.extend(start.iter().copied());
                out.extend(end.iter().copied());
            }
            BoundKind::ElementAccess { receiver, args } => {
                out.push(*receiver);
                out.extend(args.iter().map(|a| a.expr));
            }
            BoundKind::Binary { left, right, .. } => {
                out.push(*left);
                out.push(*right);
            }
            BoundKind::Assign { target, value } | BoundKind::CompoundAssign { target, value, .. } => {
                out.push(*target);
                out.push(*value);
            }
        }
        out
    }

    /// Whether evaluating `id` may suspend the enclosing async unit.
    pub fn contains_await(&self, id: BoundId) -> bool {
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if matches!(self.kind(next), BoundKind::Await(_)) {
                return true;
            }
            stack.extend(self.children(next));
        }
        false
    }
}

/// Parameter passing convention.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ParamRefKind {
    Value,
    Ref,
    In,
    Out,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct ParamDecl {
    pub name: Name,
    pub ty: TypeId,
    pub ref_kind: ParamRefKind,
    pub span: Span,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum LocalRefKind {
    Value,
    Ref,
    RefReadonly,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct LocalDecl {
    pub name: Name,
    pub ty: TypeId,
    pub ref_kind: LocalRefKind,
    /// Block nesting depth of the declaration; 0 is the unit's top block.
    pub depth: u32,
    pub span: Span,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum BoundStmt {
    Expr(BoundId),
    Local {
        local: LocalId,
        init: Option<BoundId>,
    },
    Return {
        value: Option<BoundId>,
        span: Span,
    },
    Block(Vec<BoundStmt>),
}

bitflags! {
    /// Properties of the unit being lowered.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct UnitFlags: u8 {
        /// Has a `this` receiver.
        const INSTANCE = 1 << 0;
        /// Instance member declared read-only: `this` may not be mutated.
        const READONLY_MEMBER = 1 << 1;
        /// Annotated so references to `this` may escape to the caller.
        const UNSCOPED_REF = 1 << 2;
        const CONSTRUCTOR = 1 << 3;
        const ASYNC = 1 << 4;
    }
}

/// A method, accessor, or initializer body: the unit of parallel lowering.
#[derive(Clone, Debug)]
pub struct BoundUnit {
    pub name: Name,
    pub span: Span,
    /// Type of `this` for instance units.
    pub owner: Option<TypeId>,
    pub flags: UnitFlags,
    pub returns: ReturnKind,
    pub return_ty: TypeId,
    pub params: Vec<ParamDecl>,
    pub locals: Vec<LocalDecl>,
    pub arena: BoundArena,
    pub body: Vec<BoundStmt>,
}

impl BoundUnit {
    pub fn new(name: Name, span: Span) -> Self {
        BoundUnit {
            name,
            span,
            owner: None,
            flags: UnitFlags::empty(),
            returns: ReturnKind::Value,
            return_ty: TypeId::VOID,
            params: Vec::new(),
            locals: Vec::new(),
            arena: BoundArena::new(),
            body: Vec::new(),
        }
    }

    pub fn add_param(&mut self, name: Name, ty: TypeId, ref_kind: ParamRefKind, span: Span) -> ParamId {
        let id = ParamId::from_index(self.params.len());
        self.params.push(ParamDecl {
            name,
            ty,
            ref_kind,
            span,
        });
        id
    }

    pub fn add_local(&mut self, name: Name, ty: TypeId, ref_kind: LocalRefKind, depth: u32, span: Span) -> LocalId {
        let id = LocalId::from_index(self.locals.len());
        self.locals.push(LocalDecl {
            name,
            ty,
            ref_kind,
            depth,
            span,
        });
        id
    }

    #[inline]
    pub fn param(&self, id: ParamId) -> &ParamDecl {
        &self.params[id.index()]
    }

    #[inline]
    pub fn local(&self, id: LocalId) -> &LocalDecl {
        &self.locals[id.index()]
    }

    pub fn is_instance(&self) -> bool {
        self.flags.contains(UnitFlags::INSTANCE)
    }
}
