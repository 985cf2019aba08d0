//! Keel IR - shared representation types for the keel front end.
//!
//! This crate holds the data every other phase agrees on:
//! - Spans for source locations
//! - Names for interned identifiers
//! - Typed handles (`TypeId`, `DefId`, `LocalId`, ...) into tables owned elsewhere
//! - The *bound tree*: fully bound, high-level expressions handed to lowering
//! - The *lowered tree*: the same program with buffer accesses rewritten into
//!   explicit view operations, temporaries and hoisted slots
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: Strings → Name(u32), Types → TypeId(u32)
//! - **Flatten Everything**: no boxed children, nodes reference `BoundId` / `LoweredId`
//! - **Immutable Input**: the bound tree is never rewritten in place; lowering
//!   produces a separate arena

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-allocated types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

pub mod bound;
mod ids;
mod interner;
pub mod lowered;
mod name;
mod span;

pub use bound::{
    ArgMode, BinaryOp, BoundArena, BoundArg, BoundExpr, BoundId, BoundKind, BoundStmt, BoundUnit,
    InitElement, LocalDecl, LocalRefKind, ParamDecl, ParamRefKind, ReturnKind, UnitFlags,
};
pub use ids::{DefId, FieldRef, LocalId, MemberRef, ParamId, SlotId, TempId, TypeId};
pub use interner::{InternError, SharedInterner, StringInterner, StringLookup};
pub use lowered::{
    HelperKind, LoweredArena, LoweredId, LoweredKind, LoweredNode, LoweredStmt, LoweredUnit,
    SlotDecl, TempDecl, ViewKind,
};
pub use name::Name;
pub use span::Span;
