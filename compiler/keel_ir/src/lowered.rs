//! Lowered tree: bound trees after buffer accesses are rewritten.
//!
//! Lowering makes every hidden step explicit. A buffer element access
//! becomes a sequence that forms a view through a synthesized helper and
//! indexes or slices it; hidden copies and spilled operands show up as
//! declared temporaries (`TempId`) and hoisted slots (`SlotId`).

use smallvec::SmallVec;

use crate::{
    ArgMode, BinaryOp, FieldRef, LocalId, MemberRef, Name, ParamId, SlotId, Span, TempId, TypeId,
};

/// Mutability of a view over buffer storage.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ViewKind {
    Mutable,
    ReadOnly,
}

impl ViewKind {
    pub fn is_mutable(self) -> bool {
        matches!(self, ViewKind::Mutable)
    }
}

/// One of the two shared view-forming routines.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum HelperKind {
    /// `AsMutableView<TBuffer, TElement>(ref TBuffer buffer, int length)`
    AsMutableView,
    /// `AsReadOnlyView<TBuffer, TElement>(in TBuffer buffer, int length)`
    AsReadOnlyView,
}

impl HelperKind {
    pub const ALL: [HelperKind; 2] = [HelperKind::AsMutableView, HelperKind::AsReadOnlyView];

    pub fn for_view(kind: ViewKind) -> Self {
        match kind {
            ViewKind::Mutable => HelperKind::AsMutableView,
            ViewKind::ReadOnly => HelperKind::AsReadOnlyView,
        }
    }

    pub fn view_kind(self) -> ViewKind {
        match self {
            HelperKind::AsMutableView => ViewKind::Mutable,
            HelperKind::AsReadOnlyView => ViewKind::ReadOnly,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            HelperKind::AsMutableView => "AsMutableView",
            HelperKind::AsReadOnlyView => "AsReadOnlyView",
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct LoweredId(u32);

impl LoweredId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum LoweredKind {
    /// Error-typed placeholder; later passes skip it.
    Error,
    IntLit(i64),
    Default,
    Local(LocalId),
    Param(ParamId),
    This,
    Field {
        receiver: LoweredId,
        field: FieldRef,
    },
    StaticField(FieldRef),
    Call {
        callee: Name,
        receiver: Option<LoweredId>,
        args: Vec<(ArgMode, LoweredId)>,
    },
    New,
    ObjectInit {
        inits: Vec<LoweredId>,
    },
    Await(LoweredId),
    Convert {
        operand: LoweredId,
        explicit: bool,
    },
    /// Built-in `^operand` index value.
    FromEnd(LoweredId),
    /// Built-in range value.
    Range {
        start: Option<LoweredId>,
        end: Option<LoweredId>,
    },
    Binary {
        op: BinaryOp,
        left: LoweredId,
        right: LoweredId,
    },
    Assign {
        target: LoweredId,
        value: LoweredId,
    },
    CompoundAssign {
        op: BinaryOp,
        target: LoweredId,
        value: LoweredId,
    },

    /// Read (or address, when declared by-ref) a temporary.
    Temp(TempId),
    /// `temp = value`.
    StoreTemp {
        temp: TempId,
        value: LoweredId,
    },
    /// `ref temp = ref place`.
    BindTemp {
        temp: TempId,
        place: LoweredId,
    },
    Hoisted(SlotId),
    /// Spill into a hoisted slot before a suspension point.
    Hoist {
        slot: SlotId,
        value: LoweredId,
    },
    /// Run `effects` in order, then evaluate to `value`.
    Sequence {
        effects: SmallVec<[LoweredId; 4]>,
        value: LoweredId,
    },

    /// Call to a synthesized helper forming a view over `buffer`.
    HelperCall {
        helper: HelperKind,
        buffer: LoweredId,
        buffer_ty: TypeId,
        element_ty: TypeId,
        length: u32,
    },
    /// Reference to element `index` of a view.
    ViewItem {
        kind: ViewKind,
        view: LoweredId,
        index: LoweredId,
    },
    ViewSlice {
        kind: ViewKind,
        view: LoweredId,
        start: LoweredId,
        count: LoweredId,
    },
    ViewLength(LoweredId),
    /// Absolute offset of a relative index for a sequence of `length`.
    IndexOffset {
        index: LoweredId,
        length: LoweredId,
    },
    RangeStart(LoweredId),
    RangeEnd(LoweredId),
    /// Run-time conversion of a dynamically-typed value to the node's type.
    DynamicConvert(LoweredId),
    /// Element initializer of the object under construction, or of its
    /// `field`, through a declared indexer.
    IndexerSet {
        field: Option<FieldRef>,
        member: MemberRef,
        args: Vec<LoweredId>,
        value: LoweredId,
    },
    /// User-declared conversion operator.
    UserConversion {
        member: MemberRef,
        operand: LoweredId,
    },
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct LoweredNode {
    pub kind: LoweredKind,
    pub ty: TypeId,
    pub span: Span,
}

#[derive(Clone, Default, Debug)]
pub struct LoweredArena {
    nodes: Vec<LoweredNode>,
}

impl LoweredArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    ///
    /// # Panics
    /// Panics past `u32::MAX` nodes.
    pub fn alloc(&mut self, kind: LoweredKind, ty: TypeId, span: Span) -> LoweredId {
        let id = match u32::try_from(self.nodes.len()) {
            Ok(raw) => LoweredId(raw),
            Err(_) => panic!("lowered arena overflow"),
        };
        self.nodes.push(LoweredNode { kind, ty, span });
        id
    }

    pub fn error(&mut self, span: Span) -> LoweredId {
        self.alloc(LoweredKind::Error, TypeId::ERROR, span)
    }

    #[inline]
    pub fn get(&self, id: LoweredId) -> &LoweredNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn kind(&self, id: LoweredId) -> &LoweredKind {
        &self.get(id).kind
    }

    #[inline]
    pub fn ty(&self, id: LoweredId) -> TypeId {
        self.get(id).ty
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LoweredId, &LoweredNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (LoweredId(u32::try_from(i).unwrap_or(u32::MAX)), n))
    }

    /// Helpers called anywhere in the arena, deduplicated.
    pub fn helpers_used(&self) -> SmallVec<[HelperKind; 2]> {
        let mut used = SmallVec::new();
        for node in &self.nodes {
            if let LoweredKind::HelperCall { helper, .. } = node.kind {
                if !used.contains(&helper) {
                    used.push(helper);
                }
            }
        }
        used.sort();
        used
    }

    pub fn has_errors(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n.kind, LoweredKind::Error))
    }
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum LoweredStmt {
    Expr(LoweredId),
    Local {
        local: LocalId,
        init: Option<LoweredId>,
    },
    Return(Option<LoweredId>),
    Block(Vec<LoweredStmt>),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TempDecl {
    pub ty: TypeId,
    pub by_ref: bool,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct SlotDecl {
    pub ty: TypeId,
    pub by_ref: bool,
}

/// Result of lowering one [`BoundUnit`](crate::BoundUnit).
#[derive(Clone, Debug, Default)]
pub struct LoweredUnit {
    pub name: Name,
    pub arena: LoweredArena,
    pub body: Vec<LoweredStmt>,
    pub temps: Vec<TempDecl>,
    pub slots: Vec<SlotDecl>,
}

impl LoweredUnit {
    pub fn new(name: Name) -> Self {
        LoweredUnit {
            name,
            ..Self::default()
        }
    }

    pub fn declare_temp(&mut self, ty: TypeId, by_ref: bool) -> TempId {
        let id = TempId::from_index(self.temps.len());
        self.temps.push(TempDecl { ty, by_ref });
        id
    }

    pub fn declare_slot(&mut self, ty: TypeId, by_ref: bool) -> SlotId {
        let id = SlotId::from_index(self.slots.len());
        self.slots.push(SlotDecl { ty, by_ref });
        id
    }
}
