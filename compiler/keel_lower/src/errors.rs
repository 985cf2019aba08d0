//! Binding diagnostics raised while lowering buffer constructs.
//!
//! Reference-safety diagnostics live in `keel_safety::check`.

use keel_diagnostic::{Diagnostic, ErrorCode};
use keel_ir::Span;

/// E2001
pub(crate) fn cannot_index(ty: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2001)
        .with_message(format!(
            "cannot apply indexing with [] to an expression of type `{ty}`"
        ))
        .with_arg(ty)
        .with_label(span, "not indexable")
}

/// E2001
pub(crate) fn wrong_index_count(count: usize, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2001)
        .with_message("wrong number of indices inside []; expected 1")
        .with_arg(count.to_string())
        .with_label(span, format!("{count} indices given"))
}

/// E2001
pub(crate) fn bad_index_type(ty: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2001)
        .with_message(format!("cannot index with a value of type `{ty}`"))
        .with_arg(ty)
        .with_label(span, "expected an integer, index or range")
}

/// E2002
pub(crate) fn named_index_argument(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2002)
        .with_message("named arguments are not permitted in element access expressions")
        .with_arg(name)
        .with_label(span, format!("`{name}:` not allowed here"))
}

/// E2003
pub(crate) fn index_argument_modifier(keyword: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2003)
        .with_message(format!(
            "argument 1 may not be passed with the `{keyword}` keyword"
        ))
        .with_arg("1")
        .with_arg(keyword)
        .with_label(span, "remove the modifier")
}

/// E2004
pub(crate) fn element_initializer_without_indexer(ty: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2004)
        .with_message(format!(
            "elements of `{ty}` cannot be initialized: it has no accessible indexer"
        ))
        .with_arg(ty)
        .with_label(span, "element initializer")
}

/// E2005
pub(crate) fn type_not_valid(ty: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2005)
        .with_message(format!(
            "`{ty}` is a type, which is not valid in this context"
        ))
        .with_arg(ty)
        .with_arg("type")
        .with_label(span, "expected a value")
}

/// E2006
pub(crate) fn ambiguous_conversion(first: &str, second: &str, source: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2006)
        .with_message(format!(
            "ambiguous user-defined conversions to `{first}` and to `{second}` when converting from `{source}`"
        ))
        .with_arg(first)
        .with_arg(second)
        .with_arg(source)
        .with_label(span, "conversion is ambiguous")
}

/// E2007
pub(crate) fn no_conversion(source: &str, target: &str, span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2007)
        .with_message(format!("cannot convert from `{source}` to `{target}`"))
        .with_arg(source)
        .with_arg(target)
        .with_label(span, "no conversion")
}

/// E2008
pub(crate) fn not_assignable(span: Span) -> Diagnostic {
    Diagnostic::error(ErrorCode::E2008)
        .with_message("the left-hand side of an assignment must be a variable")
        .with_label(span, "not a variable")
}
