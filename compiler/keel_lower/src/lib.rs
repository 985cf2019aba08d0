//! Keel Lower - inline buffer lowering.
//!
//! Rewrites the bound tree of one unit (method, accessor, initializer) into
//! the lowered tree, expanding every construct that touches a fixed-capacity
//! inline buffer:
//!
//! - element access and slicing (`x.F[i]`, `x.F[^1]`, `x.F[a..b]`) become a
//!   view formed by a shared helper, then indexed or sliced through the
//!   view's own accessors
//! - conversions from a buffer to its views are resolved against user
//!   conversions and lowered the same way
//! - object-initializer elements (`new B { [0] = 1 }`) go through the type's
//!   declared indexer instead
//!
//! Whether a view may be mutable, and how far it may travel, is decided by
//! the receiver's [`Addressability`] and escape tag, checked with the
//! general reference-safety rules in `keel_safety`.
//!
//! # Concurrency
//!
//! [`lower_unit`] touches no shared mutable state except the buffer
//! recognizer's memo tables and the [`HelperTable`], both safe to use from
//! many workers at once. Each unit gets its own diagnostic queue.

mod access;
mod addressability;
mod convert;
mod errors;
mod helpers;
mod index;
mod lower;
mod primitives;
mod stack;

#[cfg(test)]
mod test_support;

pub use addressability::{AccessUse, Addressability, AliasSite, Place};
pub use convert::{ConversionCandidate, ConversionKind, Resolution, ViewConversionResolver};
pub use helpers::{BufferPassing, HelperTable, SynthesizedHelper, HELPER_CONTAINER};
pub use lower::{lower_unit, LowerContext};
pub use primitives::{PlatformPrimitive, PrimitiveTable};
