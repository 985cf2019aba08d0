//! Diagnostics for the keel front end.
//!
//! Every user-facing problem is a [`Diagnostic`] value identified by a stable
//! [`ErrorCode`]. Diagnostics are collected per lowering unit in a
//! [`DiagnosticQueue`] and merged by the compilation driver.
//!
//! # Error Guarantees
//!
//! [`ErrorGuaranteed`] can only be obtained by emitting an error, so a
//! function returning `Result<T, ErrorGuaranteed>` proves that its failure
//! was reported:
//!
//! ```text
//! let guar = queue.emit_error(diagnostic);
//! return Err(guar);
//! ```

mod diagnostic;
mod error_code;
mod guarantee;
pub mod queue;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use guarantee::ErrorGuaranteed;
pub use queue::{DiagnosticConfig, DiagnosticQueue};
