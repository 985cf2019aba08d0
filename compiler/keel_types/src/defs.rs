//! Declarations stored in the type table.

use bitflags::bitflags;
use keel_ir::{BinaryOp, FieldRef, Name, Span, TypeId};

/// Declaration kind of a type definition.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum DeclKind {
    Struct,
    /// Stack-only struct.
    RefStruct,
    Class,
    Interface,
    Enum,
    Delegate,
}

impl DeclKind {
    /// Value types are stored inline; everything else is a heap reference.
    pub fn is_value_type(self) -> bool {
        matches!(self, DeclKind::Struct | DeclKind::RefStruct | DeclKind::Enum)
    }
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct FieldFlags: u8 {
        const STATIC = 1 << 0;
        const READONLY = 1 << 1;
        /// Compile-time constant; implies static.
        const CONST = 1 << 2;
        /// Marked obsolete: referencing it warns.
        const OBSOLETE = 1 << 3;
        /// Marked obsolete as an error: referencing it is an error.
        const OBSOLETE_ERROR = 1 << 4;
    }
}

/// What a field stores: a value, or a reference to a value elsewhere.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum FieldStorage {
    #[default]
    Value,
    Ref,
    RefReadonly,
}

#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct FieldDef {
    pub name: Name,
    pub ty: TypeId,
    pub flags: FieldFlags,
    pub storage: FieldStorage,
    /// Initializer of a `const` field.
    pub value: Option<ConstExpr>,
    pub span: Span,
}

impl FieldDef {
    pub fn new(name: Name, ty: TypeId) -> Self {
        FieldDef {
            name,
            ty,
            flags: FieldFlags::empty(),
            storage: FieldStorage::Value,
            value: None,
            span: Span::DUMMY,
        }
    }

    /// A `const` field with the given initializer.
    pub fn constant(name: Name, ty: TypeId, value: ConstExpr) -> Self {
        FieldDef {
            flags: FieldFlags::CONST | FieldFlags::STATIC,
            value: Some(value),
            ..FieldDef::new(name, ty)
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: FieldFlags) -> Self {
        self.flags |= flags;
        self
    }

    #[must_use]
    pub fn with_storage(mut self, storage: FieldStorage) -> Self {
        self.storage = storage;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn is_static(&self) -> bool {
        self.flags.intersects(FieldFlags::STATIC | FieldFlags::CONST)
    }

    pub fn is_readonly(&self) -> bool {
        self.flags.contains(FieldFlags::READONLY)
    }
}

/// Constant expression, as written in an attribute argument or a `const`
/// field initializer.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ConstExpr {
    /// Integral literal of the given type.
    Int { value: i64, ty: TypeId },
    Bool(bool),
    Str(Name),
    /// `(ty)operand`
    Cast { ty: TypeId, operand: Box<ConstExpr> },
    Neg(Box<ConstExpr>),
    Binary {
        op: BinaryOp,
        left: Box<ConstExpr>,
        right: Box<ConstExpr>,
    },
    /// Reference to a `const` field.
    Member { field: FieldRef, span: Span },
    /// Anything the binder could not classify as constant (calls, instance
    /// members, `new`).
    NonConstant,
}

impl ConstExpr {
    pub fn int(value: i64) -> Self {
        ConstExpr::Int {
            value,
            ty: TypeId::INT,
        }
    }

    pub fn cast(ty: TypeId, operand: ConstExpr) -> Self {
        ConstExpr::Cast {
            ty,
            operand: Box::new(operand),
        }
    }

    pub fn member(field: FieldRef, span: Span) -> Self {
        ConstExpr::Member { field, span }
    }
}

/// Handle of a declared attribute class.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct AttrId(pub(crate) u32);

/// An attribute class and its usage rules.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AttributeClass {
    pub name: Name,
    /// Whether one declaration may carry the attribute more than once.
    pub allow_multiple: bool,
}

/// An attribute applied to a declaration.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct AttributeApp {
    pub class: AttrId,
    pub args: Vec<ConstExpr>,
    pub span: Span,
}

impl AttributeApp {
    pub fn new(class: AttrId, args: Vec<ConstExpr>) -> Self {
        AttributeApp {
            class,
            args,
            span: Span::DUMMY,
        }
    }
}

/// Members other than fields.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum MemberDef {
    /// `this[param]` indexer.
    Indexer {
        param: TypeId,
        element: TypeId,
        has_setter: bool,
        accessible: bool,
    },
    /// `Slice(int start, int length)`-shaped method.
    SliceMethod { name: Name, accessible: bool },
    /// User-defined conversion operator to `target`.
    Conversion { target: TypeId, explicit: bool },
}

/// A declared type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct TypeDef {
    pub name: Name,
    pub kind: DeclKind,
    /// Generic parameter names, in order.
    pub generics: Vec<Name>,
    pub fields: Vec<FieldDef>,
    pub members: Vec<MemberDef>,
    pub attributes: Vec<AttributeApp>,
    /// `readonly struct`: every instance field is read-only.
    pub readonly: bool,
    /// Set when this definition is a retargeted view of another one (the
    /// same type seen through a different assembly reference).
    pub retargets: Option<keel_ir::DefId>,
    pub span: Span,
}

impl TypeDef {
    pub fn new(name: Name, kind: DeclKind) -> Self {
        TypeDef {
            name,
            kind,
            generics: Vec::new(),
            fields: Vec::new(),
            members: Vec::new(),
            attributes: Vec::new(),
            readonly: false,
            retargets: None,
            span: Span::DUMMY,
        }
    }

    #[must_use]
    pub fn with_generics(mut self, generics: impl IntoIterator<Item = Name>) -> Self {
        self.generics.extend(generics);
        self
    }

    #[must_use]
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_member(mut self, member: MemberDef) -> Self {
        self.members.push(member);
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, attribute: AttributeApp) -> Self {
        self.attributes.push(attribute);
        self
    }

    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    #[must_use]
    pub fn retargeting(mut self, original: keel_ir::DefId) -> Self {
        self.retargets = Some(original);
        self
    }

    /// Non-static, non-const fields in declaration order.
    pub fn instance_fields(&self) -> impl Iterator<Item = (u32, &FieldDef)> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.is_static())
            .map(|(i, f)| (u32::try_from(i).unwrap_or(u32::MAX), f))
    }
}
