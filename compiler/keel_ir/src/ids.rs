//! Typed index handles.
//!
//! Every handle is a `u32` newtype so nodes stay small and comparisons are
//! integer compares. The tables they index live in other crates: `TypeId` and
//! `DefId` in the type table, `LocalId`/`ParamId` in a [`BoundUnit`], and
//! `TempId`/`SlotId` in a [`LoweredUnit`].
//!
//! [`BoundUnit`]: crate::BoundUnit
//! [`LoweredUnit`]: crate::LoweredUnit

use std::fmt;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub const fn from_raw(raw: u32) -> Self {
                $name(raw)
            }

            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// Handle for the `index`-th entry of a table.
            ///
            /// # Panics
            /// Panics if `index` does not fit in `u32`.
            #[inline]
            pub fn from_index(index: usize) -> Self {
                match u32::try_from(index) {
                    Ok(raw) => $name(raw),
                    Err(_) => panic!(concat!(stringify!($name), " overflow: {}"), index),
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

define_index!(
    /// Interned type in the type table.
    TypeId,
    "ty"
);
define_index!(
    /// Type definition (a declared struct, class, interface, enum or delegate).
    DefId,
    "def"
);
define_index!(LocalId, "local");
define_index!(ParamId, "param");
define_index!(
    /// Compiler-introduced temporary, declared by the lowered unit.
    TempId,
    "tmp"
);
define_index!(
    /// Slot hoisted out of the evaluation stack so it survives a suspension.
    SlotId,
    "slot"
);

impl TypeId {
    pub const ERROR: TypeId = TypeId(0);
    pub const VOID: TypeId = TypeId(1);
    pub const BOOL: TypeId = TypeId(2);
    pub const BYTE: TypeId = TypeId(3);
    pub const SHORT: TypeId = TypeId(4);
    pub const INT: TypeId = TypeId(5);
    pub const LONG: TypeId = TypeId(6);
    pub const CHAR: TypeId = TypeId(7);
    pub const STRING: TypeId = TypeId(8);
    pub const OBJECT: TypeId = TypeId(9);
    /// Dynamically-typed value: member access and conversions bind at run time.
    pub const DYNAMIC: TypeId = TypeId(10);
    /// Relative index (`^n` or a plain position).
    pub const INDEX: TypeId = TypeId(11);
    /// Range of relative indices (`a..b`).
    pub const RANGE: TypeId = TypeId(12);

    /// First id handed out for non-primitive types.
    pub const FIRST_COMPOUND: u32 = 13;

    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_COMPOUND
    }

    #[inline]
    pub fn is_error(self) -> bool {
        self == Self::ERROR
    }

    /// Integral types that widen implicitly to `INT`.
    #[inline]
    pub fn widens_to_int(self) -> bool {
        matches!(self, Self::BYTE | Self::SHORT | Self::CHAR | Self::INT)
    }
}

/// A field of a type definition, by declaration position.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct FieldRef {
    pub def: DefId,
    pub index: u32,
}

impl FieldRef {
    pub const fn new(def: DefId, index: u32) -> Self {
        FieldRef { def, index }
    }
}

/// A non-field member (indexer, slice method, conversion operator).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct MemberRef {
    pub def: DefId,
    pub index: u32,
}

impl MemberRef {
    pub const fn new(def: DefId, index: u32) -> Self {
        MemberRef { def, index }
    }
}
