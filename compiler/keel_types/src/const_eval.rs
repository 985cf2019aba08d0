//! Constant evaluation for attribute arguments and `const` members.
//!
//! # Scope
//!
//! - Integral, boolean and string literals
//! - Casts between integral types (`(short)10`), with wrapping
//! - Negation and `+ - *` with overflow detection
//! - References to `const` fields, followed transitively
//!
//! Overflow, cycles and anything non-constant fold to `None`; the caller
//! decides whether that is an error. Referencing an obsolete constant is
//! reported while folding, whether or not folding succeeds.

use keel_diagnostic::{Diagnostic, ErrorCode};
use keel_ir::{BinaryOp, FieldRef, Name, Span, TypeId};
use rustc_hash::FxHashSet;

use crate::{ConstExpr, FieldFlags, TypeTable};

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ConstValue {
    Int { value: i64, ty: TypeId },
    Bool(bool),
    Str(Name),
}

impl ConstValue {
    /// The value as an `int`, if it is integral and implicitly converts.
    pub fn as_int(self) -> Option<i32> {
        match self {
            ConstValue::Int { value, ty } if ty.widens_to_int() => i32::try_from(value).ok(),
            _ => None,
        }
    }
}

/// Folds constant expressions against a [`TypeTable`], collecting the
/// diagnostics produced along the way.
pub struct ConstEvaluator<'t> {
    table: &'t TypeTable,
    /// `const` fields currently being folded, for cycle detection.
    in_progress: FxHashSet<FieldRef>,
    diagnostics: Vec<Diagnostic>,
}

impl<'t> ConstEvaluator<'t> {
    pub fn new(table: &'t TypeTable) -> Self {
        ConstEvaluator {
            table,
            in_progress: FxHashSet::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn eval(&mut self, expr: &ConstExpr) -> Option<ConstValue> {
        match expr {
            ConstExpr::Int { value, ty } => Some(ConstValue::Int {
                value: *value,
                ty: *ty,
            }),
            ConstExpr::Bool(b) => Some(ConstValue::Bool(*b)),
            ConstExpr::Str(s) => Some(ConstValue::Str(*s)),
            ConstExpr::Cast { ty, operand } => {
                let value = self.eval(operand)?;
                cast(value, *ty)
            }
            ConstExpr::Neg(operand) => match self.eval(operand)? {
                ConstValue::Int { value, ty } => {
                    value.checked_neg().map(|value| ConstValue::Int { value, ty })
                }
                _ => None,
            },
            ConstExpr::Binary { op, left, right } => {
                // Both sides are folded so both report their diagnostics.
                let left = self.eval(left);
                let right = self.eval(right);
                fold_binary(*op, left?, right?)
            }
            ConstExpr::Member { field, span } => self.eval_member(*field, *span),
            ConstExpr::NonConstant => None,
        }
    }

    fn eval_member(&mut self, field_ref: FieldRef, span: Span) -> Option<ConstValue> {
        let field = self.table.field(field_ref);
        self.report_obsolete(field_ref, span);

        if !field.flags.contains(FieldFlags::CONST) {
            return None;
        }
        let init = field.value.as_ref()?;
        if !self.in_progress.insert(field_ref) {
            tracing::debug!(?field_ref, "constant refers to itself");
            return None;
        }
        let value = self.eval(init).and_then(|v| cast(v, field.ty));
        self.in_progress.remove(&field_ref);
        value
    }

    fn report_obsolete(&mut self, field_ref: FieldRef, span: Span) {
        let field = self.table.field(field_ref);
        let interner = self.table.interner();
        let owner = interner.lookup(self.table.def(field_ref.def).name);
        let member = format!("{owner}.{}", interner.lookup(field.name));

        let diagnostic = if field.flags.contains(FieldFlags::OBSOLETE_ERROR) {
            Diagnostic::error(ErrorCode::E2009)
        } else if field.flags.contains(FieldFlags::OBSOLETE) {
            Diagnostic::warning(ErrorCode::W2001)
        } else {
            return;
        };
        self.diagnostics.push(
            diagnostic
                .with_message(format!("`{member}` is obsolete"))
                .with_arg(member)
                .with_label(span, "obsolete member referenced here"),
        );
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Explicit conversion of a constant to `ty`, wrapping like the run-time
/// conversion would.
fn cast(value: ConstValue, ty: TypeId) -> Option<ConstValue> {
    let ConstValue::Int { value, .. } = value else {
        return match (value, ty) {
            (ConstValue::Bool(_), TypeId::BOOL) | (ConstValue::Str(_), TypeId::STRING) => Some(value),
            _ => None,
        };
    };
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "explicit constant conversions wrap by definition"
    )]
    let wrapped = match ty {
        TypeId::BYTE => i64::from(value as u8),
        TypeId::SHORT => i64::from(value as i16),
        TypeId::CHAR => i64::from(value as u16),
        TypeId::INT => i64::from(value as i32),
        TypeId::LONG => value,
        _ => return None,
    };
    Some(ConstValue::Int { value: wrapped, ty })
}

/// Result type of integral arithmetic: `long` if either side is, else `int`.
fn promote(a: TypeId, b: TypeId) -> TypeId {
    if a == TypeId::LONG || b == TypeId::LONG {
        TypeId::LONG
    } else {
        TypeId::INT
    }
}

fn fold_binary(op: BinaryOp, left: ConstValue, right: ConstValue) -> Option<ConstValue> {
    let (ConstValue::Int { value: a, ty: ta }, ConstValue::Int { value: b, ty: tb }) = (left, right)
    else {
        return None;
    };
    let ty = promote(ta, tb);
    let value = match op {
        BinaryOp::Add => a.checked_add(b)?,
        BinaryOp::Sub => a.checked_sub(b)?,
        BinaryOp::Mul => a.checked_mul(b)?,
    };
    // Overflowing the promoted type is a compile-time overflow, not a wrap.
    if ty == TypeId::INT && i32::try_from(value).is_err() {
        return None;
    }
    Some(ConstValue::Int { value, ty })
}
