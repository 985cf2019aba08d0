//! The type table.
//!
//! Definitions are declared up front through `&mut self` and never change
//! afterwards. Type expressions (`Buffer<int>`, `ReadOnlyView<T>`) are
//! interned on demand through `&self`, because lowering creates view types
//! for whatever element types it meets.

use keel_ir::{DefId, FieldRef, Name, SharedInterner, TypeId, ViewKind};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{AttrId, AttributeClass, FieldDef, MemberDef, TypeDef};

/// Structure of an interned type.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeData {
    /// One of the fixed `TypeId` constants.
    Primitive,
    /// A definition, instantiated with `args` when generic.
    Named {
        def: DefId,
        args: SmallVec<[TypeId; 2]>,
    },
    /// Generic parameter `index` of `def`.
    Param { def: DefId, index: u32 },
    View { kind: ViewKind, element: TypeId },
}

struct TypeStore {
    data: Vec<TypeData>,
    map: FxHashMap<TypeData, TypeId>,
}

pub struct TypeTable {
    interner: SharedInterner,
    defs: Vec<TypeDef>,
    attributes: Vec<AttributeClass>,
    store: RwLock<TypeStore>,
}

const PRIMITIVE_NAMES: [&str; TypeId::FIRST_COMPOUND as usize] = [
    "<error>", "void", "bool", "byte", "short", "int", "long", "char", "string", "object",
    "dynamic", "Index", "Range",
];

impl TypeTable {
    pub fn new(interner: SharedInterner) -> Self {
        let data = vec![TypeData::Primitive; TypeId::FIRST_COMPOUND as usize];
        TypeTable {
            interner,
            defs: Vec::new(),
            attributes: Vec::new(),
            store: RwLock::new(TypeStore {
                data,
                map: FxHashMap::default(),
            }),
        }
    }

    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    // Declarations

    pub fn define(&mut self, def: TypeDef) -> DefId {
        let id = DefId::from_index(self.defs.len());
        self.defs.push(def);
        id
    }

    /// Declare a definition whose members refer to its own id, such as a
    /// generic type whose fields use its parameters.
    pub fn define_with(&mut self, build: impl FnOnce(&Self, DefId) -> TypeDef) -> DefId {
        let id = DefId::from_index(self.defs.len());
        let def = build(self, id);
        self.defs.push(def);
        id
    }

    pub fn define_attribute(&mut self, class: AttributeClass) -> AttrId {
        let id = AttrId(u32::try_from(self.attributes.len()).unwrap_or(u32::MAX));
        self.attributes.push(class);
        id
    }

    #[inline]
    pub fn def(&self, id: DefId) -> &TypeDef {
        &self.defs[id.index()]
    }

    pub fn attribute(&self, id: AttrId) -> &AttributeClass {
        &self.attributes[id.0 as usize]
    }

    pub fn field(&self, field: FieldRef) -> &FieldDef {
        &self.def(field.def).fields[field.index as usize]
    }

    pub fn member(&self, member: keel_ir::MemberRef) -> &MemberDef {
        &self.def(member.def).members[member.index as usize]
    }

    pub fn def_count(&self) -> usize {
        self.defs.len()
    }

    /// Attribute class with the given name, first declared wins.
    pub fn attribute_by_name(&self, name: Name) -> Option<AttrId> {
        self.attributes
            .iter()
            .position(|a| a.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(AttrId)
    }

    /// Definition with the given name, first declared wins.
    pub fn def_by_name(&self, name: Name) -> Option<DefId> {
        self.defs
            .iter()
            .position(|d| d.name == name)
            .map(DefId::from_index)
    }

    // Interning

    pub fn intern(&self, data: TypeData) -> TypeId {
        if let Some(&id) = self.store.read().map.get(&data) {
            return id;
        }
        let mut store = self.store.write();
        if let Some(&id) = store.map.get(&data) {
            return id;
        }
        let id = TypeId::from_index(store.data.len());
        store.data.push(data.clone());
        store.map.insert(data, id);
        id
    }

    pub fn data(&self, id: TypeId) -> TypeData {
        self.store
            .read()
            .data
            .get(id.index())
            .cloned()
            .unwrap_or(TypeData::Primitive)
    }

    /// The non-generic type of `def`, or `def` instantiated with `args`.
    pub fn named(&self, def: DefId, args: &[TypeId]) -> TypeId {
        self.intern(TypeData::Named {
            def,
            args: args.iter().copied().collect(),
        })
    }

    pub fn param(&self, def: DefId, index: u32) -> TypeId {
        self.intern(TypeData::Param { def, index })
    }

    pub fn view(&self, kind: ViewKind, element: TypeId) -> TypeId {
        self.intern(TypeData::View { kind, element })
    }

    // Queries

    /// Definition behind a named type.
    pub fn def_of(&self, ty: TypeId) -> Option<DefId> {
        match self.data(ty) {
            TypeData::Named { def, .. } => Some(def),
            _ => None,
        }
    }

    pub fn as_view(&self, ty: TypeId) -> Option<(ViewKind, TypeId)> {
        match self.data(ty) {
            TypeData::View { kind, element } => Some((kind, element)),
            _ => None,
        }
    }

    /// Whether values of `ty` are stored inline rather than behind a
    /// heap reference.
    pub fn is_value_type(&self, ty: TypeId) -> bool {
        match self.data(ty) {
            TypeData::Primitive => !matches!(
                ty,
                TypeId::STRING | TypeId::OBJECT | TypeId::DYNAMIC | TypeId::ERROR
            ),
            TypeData::Named { def, .. } => self.def(def).kind.is_value_type(),
            TypeData::View { .. } => true,
            // Unconstrained parameters are treated as possibly-value.
            TypeData::Param { .. } => true,
        }
    }

    /// Replace generic parameters in `ty` by `args`.
    pub fn substitute(&self, ty: TypeId, args: &[TypeId]) -> TypeId {
        if args.is_empty() {
            return ty;
        }
        match self.data(ty) {
            TypeData::Primitive => ty,
            TypeData::Param { index, .. } => args.get(index as usize).copied().unwrap_or(ty),
            TypeData::Named { def, args: inner } => {
                let substituted: SmallVec<[TypeId; 2]> =
                    inner.iter().map(|&a| self.substitute(a, args)).collect();
                if substituted == inner {
                    ty
                } else {
                    self.intern(TypeData::Named {
                        def,
                        args: substituted,
                    })
                }
            }
            TypeData::View { kind, element } => {
                let element = self.substitute(element, args);
                self.view(kind, element)
            }
        }
    }

    /// Type of `field` when accessed on a receiver of type `receiver`.
    pub fn field_type(&self, receiver: TypeId, field: FieldRef) -> TypeId {
        let declared = self.field(field).ty;
        match self.data(receiver) {
            TypeData::Named { args, .. } => self.substitute(declared, &args),
            _ => declared,
        }
    }

    /// Source-like rendering for diagnostics.
    pub fn display(&self, ty: TypeId) -> String {
        match self.data(ty) {
            TypeData::Primitive => PRIMITIVE_NAMES
                .get(ty.index())
                .copied()
                .unwrap_or("<unknown>")
                .to_string(),
            TypeData::Named { def, args } => {
                let name = self.interner.lookup(self.def(def).name);
                if args.is_empty() {
                    name.to_string()
                } else {
                    let args: Vec<String> = args.iter().map(|&a| self.display(a)).collect();
                    format!("{name}<{}>", args.join(", "))
                }
            }
            TypeData::Param { def, index } => self
                .def(def)
                .generics
                .get(index as usize)
                .map_or_else(|| format!("T{index}"), |&n| self.interner.lookup(n).to_string()),
            TypeData::View { kind, element } => {
                let prefix = match kind {
                    ViewKind::Mutable => "MutableView",
                    ViewKind::ReadOnly => "ReadOnlyView",
                };
                format!("{prefix}<{}>", self.display(element))
            }
        }
    }
}
