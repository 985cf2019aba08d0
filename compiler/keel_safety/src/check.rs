//! Reference-safety checks and their diagnostics.
//!
//! The checks compare an [`Escape`] against the scope it is about to flow
//! into. When the scope does not fit, the origin decides which diagnostic
//! is reported and which name it mentions.

use keel_diagnostic::{Diagnostic, ErrorCode};
use keel_ir::{ArgMode, Span, StringLookup};

use crate::{Escape, EscapeOrigin, EscapeScope};

/// `return ref <place>`: the place must outlive the call.
pub fn check_ref_return(
    escape: Escape,
    span: Span,
    names: &dyn StringLookup,
) -> Result<(), Diagnostic> {
    if escape.is_returnable() {
        return Ok(());
    }
    Err(ref_escape_error(escape.origin, span, names))
}

/// `return <value>` of a reference-like value: whatever it refers to must
/// outlive the call.
pub fn check_value_return(
    escape: Escape,
    span: Span,
    names: &dyn StringLookup,
) -> Result<(), Diagnostic> {
    if escape.is_returnable() {
        return Ok(());
    }
    match escape.origin {
        EscapeOrigin::ScopedLocal { name, .. } => Err(escape_variable(names.lookup(name), span)),
        origin => Err(ref_escape_error(origin, span, names)),
    }
}

/// Store a reference-like value into a variable living in `target`.
pub fn check_escape_into(
    target: EscapeScope,
    value: Escape,
    target_name: &str,
    span: Span,
) -> Result<(), Diagnostic> {
    if value.scope.fits_in(target) {
        Ok(())
    } else {
        tracing::trace!(?target, value = ?value.scope, "reference-like value escapes");
        Err(escape_variable(target_name, span))
    }
}

fn ref_escape_error(origin: EscapeOrigin, span: Span, names: &dyn StringLookup) -> Diagnostic {
    match origin {
        EscapeOrigin::ValueParameter { name, span: decl } => {
            let name = names.lookup(name);
            Diagnostic::error(ErrorCode::E4006)
                .with_message(format!(
                    "cannot return parameter `{name}` by reference because it is not a ref parameter"
                ))
                .with_arg(name)
                .with_label(span, "returned here")
                .with_secondary_label(decl, "declared by value here")
        }
        EscapeOrigin::StructThis => Diagnostic::error(ErrorCode::E4007)
            .with_message("cannot return a member of `this` by reference in a value type")
            .with_label(span, "returned here")
            .with_note("annotate the member `UnscopedRef` to let references to `this` escape"),
        EscapeOrigin::ScopedLocal { name, span: decl } => {
            let name = names.lookup(name);
            Diagnostic::error(ErrorCode::E4008)
                .with_message(format!(
                    "cannot return `{name}` by reference because it was initialized to a value that cannot be returned by reference"
                ))
                .with_arg(name)
                .with_label(span, "returned here")
                .with_secondary_label(decl, "initialized here")
        }
        EscapeOrigin::Local { name, span: decl } => {
            let name = names.lookup(name);
            Diagnostic::error(ErrorCode::E4010)
                .with_message(format!(
                    "cannot return local `{name}` by reference because it is not a ref local"
                ))
                .with_arg(name)
                .with_label(span, "returned here")
                .with_secondary_label(decl, "declared here")
        }
        EscapeOrigin::Heap | EscapeOrigin::RefParameter | EscapeOrigin::Temporary => {
            not_ref_passable(span)
        }
    }
}

/// E4009
pub fn escape_variable(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4009)
        .with_message(format!(
            "cannot use variable `{name}` in this context because it may expose referenced variables outside of their declaration scope"
        ))
        .with_arg(name)
        .with_label(span, "used here")
}

/// E4001: assignment to a read-only place.
pub fn assign_readonly(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4001)
        .with_message("cannot assign to a read-only variable")
        .with_label(span, "read-only")
}

/// E4002: `ref`/`out` or mutable alias of a read-only place.
pub fn ref_to_readonly(mode: ArgMode, span: Span) -> Diagnostic {
    let keyword = mode.keyword().unwrap_or("ref");
    Diagnostic::error(ErrorCode::E4002)
        .with_message(format!(
            "cannot use a read-only variable as a `{keyword}` value"
        ))
        .with_arg(keyword)
        .with_label(span, "read-only")
}

/// E4003: `ref`/`out` of something that has no address.
pub fn ref_needs_variable(mode: ArgMode, span: Span) -> Diagnostic {
    let keyword = mode.keyword().unwrap_or("ref");
    Diagnostic::error(ErrorCode::E4003)
        .with_message(format!(
            "a `{keyword}` value must be an assignable variable"
        ))
        .with_arg(keyword)
        .with_label(span, "not a variable")
}

/// E4004
pub fn not_ref_passable(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4004)
        .with_message(
            "the expression cannot be used in this context because it may not be passed or returned by reference",
        )
        .with_label(span, "not addressable")
}

/// E4005: `ref readonly` binding to a value.
pub fn init_by_ref_with_value(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E4005)
        .with_message("cannot initialize a by-reference variable with a value")
        .with_label(span, "this is a value")
}
