//! Reference safety: how far references and reference-like values may travel.
//!
//! Every place and every reference-like value (a `ref` local, a view) is
//! tagged with an [`Escape`]: the [`EscapeScope`] it may flow to, plus the
//! [`EscapeOrigin`] that explains the limit when a check fails. Producers of
//! such values implement [`HasEscapeScope`] and hand the tags to the checks in
//! [`check`], which own the user-facing reference-safety diagnostics. Nothing
//! here knows about buffers or views specifically.

pub mod check;
mod locals;
mod scope;

pub use locals::LocalScopes;
pub use scope::{Escape, EscapeOrigin, EscapeScope, HasEscapeScope};
