//! The escape-scope lattice.

use std::fmt;

use keel_ir::{Name, Span};

/// How far something may escape, ordered from widest to narrowest.
///
/// Smaller scopes live longer: [`EscapeScope::CALLER`] may be returned,
/// [`EscapeScope::PARAMETER`] lives for the whole call, block scopes for
/// their block, and [`EscapeScope::TEMPORARY`] only for the current
/// statement.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct EscapeScope(u32);

impl EscapeScope {
    /// May be returned to the caller.
    pub const CALLER: Self = Self(0);
    /// Storage owned by the current call (by-value parameters, `this` of a
    /// value type).
    pub const PARAMETER: Self = Self(1);
    /// Locals of the unit's top block.
    pub const LOCAL: Self = Self(2);
    /// Temporaries of the current statement.
    pub const TEMPORARY: Self = Self(u32::MAX);

    /// Scope of locals declared `depth` blocks below the top block.
    pub const fn block(depth: u32) -> Self {
        Self(Self::LOCAL.0.saturating_add(depth))
    }

    /// The narrower of two scopes (the shorter lifetime).
    #[inline]
    #[must_use]
    pub fn narrowest(self, other: Self) -> Self {
        self.max(other)
    }

    /// Whether a value with this scope may be stored into something with
    /// scope `target`.
    #[inline]
    pub fn fits_in(self, target: Self) -> bool {
        self <= target
    }

    #[inline]
    pub fn is_returnable(self) -> bool {
        self == Self::CALLER
    }
}

impl fmt::Debug for EscapeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::CALLER => write!(f, "caller"),
            Self::PARAMETER => write!(f, "parameter"),
            Self::TEMPORARY => write!(f, "temporary"),
            Self(n) => write!(f, "block{}", n - Self::LOCAL.0),
        }
    }
}

/// Where a scope limit comes from, for reporting.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum EscapeOrigin {
    /// Heap or static storage.
    Heap,
    /// A `ref`/`in`/`out` parameter.
    RefParameter,
    /// A parameter passed by value.
    ValueParameter { name: Name, span: Span },
    /// `this` inside a value type.
    StructThis,
    /// A by-value local.
    Local { name: Name, span: Span },
    /// A `ref` local or reference-like local whose scope came from its
    /// initializer.
    ScopedLocal { name: Name, span: Span },
    /// A call result, conversion result or hidden copy.
    Temporary,
}

/// A scope together with its origin.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Escape {
    pub scope: EscapeScope,
    pub origin: EscapeOrigin,
}

impl Escape {
    pub const HEAP: Escape = Escape {
        scope: EscapeScope::CALLER,
        origin: EscapeOrigin::Heap,
    };

    pub const TEMPORARY: Escape = Escape {
        scope: EscapeScope::TEMPORARY,
        origin: EscapeOrigin::Temporary,
    };

    pub const fn new(scope: EscapeScope, origin: EscapeOrigin) -> Self {
        Escape { scope, origin }
    }

    /// Combine two sources: the narrower scope wins and keeps its origin.
    /// Ties keep `self`.
    #[must_use]
    pub fn narrowest(self, other: Escape) -> Escape {
        if other.scope > self.scope {
            other
        } else {
            self
        }
    }

    pub fn is_returnable(&self) -> bool {
        self.scope.is_returnable()
    }
}

/// Anything that can be checked against the lattice.
///
/// `ref_escape` bounds references *to* the thing; `value_escape` bounds the
/// thing itself when it is reference-like (a view carries the ref escape of
/// the storage it points into). Ordinary values escape everywhere.
pub trait HasEscapeScope {
    fn ref_escape(&self) -> Escape;

    fn value_escape(&self) -> Escape {
        Escape::HEAP
    }
}
