//! Access operand checks and index normalization.
//!
//! After normalization every access is either an absolute `int` position or
//! an absolute `(start, count)` pair:
//!
//! | operand  | lowered                                                  |
//! |----------|----------------------------------------------------------|
//! | `int`    | as is (narrower integrals widened)                       |
//! | `dynamic`| run-time conversion to `int`                             |
//! | `^n`     | `Index.GetOffset(^n, length)`                            |
//! | `a..b`   | `start = a.GetOffset(length)`, `count = b.GetOffset(length) - start` |

use keel_diagnostic::ErrorGuaranteed;
use keel_ir::{BinaryOp, BoundArg, BoundId, LoweredId, LoweredKind, Span, TempId, TypeId};
use smallvec::SmallVec;

use crate::errors;
use crate::lower::Lowerer;
use crate::primitives::IndexShape;

/// Normalized operand.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum IndexForm {
    Item(LoweredId),
    Slice { start: LoweredId, count: LoweredId },
}

/// Where the length of the indexed sequence comes from.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum Length {
    /// A buffer's capacity.
    Const(u32),
    /// `.Length` of a view expression with no side effects.
    View(BoundId),
    /// `.Length` of a view already stored in a temporary of the given type.
    ViewTemp(TempId, TypeId),
}

impl Lowerer<'_> {
    /// The single positional operand of an element access.
    pub(crate) fn check_access_args(
        &mut self,
        args: &[BoundArg],
        span: Span,
    ) -> Result<BoundId, ErrorGuaranteed> {
        let [arg] = args else {
            return Err(self
                .diagnostics
                .emit_error(errors::wrong_index_count(args.len(), span)));
        };
        let arg_span = self.src().span(arg.expr);
        if let Some(name) = arg.name {
            let name = self.names().lookup(name);
            return Err(self
                .diagnostics
                .emit_error(errors::named_index_argument(name, arg_span)));
        }
        if let Some(keyword) = arg.mode.keyword() {
            return Err(self
                .diagnostics
                .emit_error(errors::index_argument_modifier(keyword, arg_span)));
        }
        Ok(arg.expr)
    }

    pub(crate) fn index_shape(&mut self, operand: BoundId) -> Result<IndexShape, ErrorGuaranteed> {
        let ty = self.src().ty(operand);
        match ty {
            // Already reported; the operand lowers to an error node.
            TypeId::ERROR | TypeId::DYNAMIC => Ok(IndexShape::Int),
            TypeId::INDEX => Ok(IndexShape::Relative),
            TypeId::RANGE => Ok(IndexShape::Range),
            ty if ty.widens_to_int() => Ok(IndexShape::Int),
            ty => {
                let name = self.display(ty);
                let span = self.src().span(operand);
                Err(self
                    .diagnostics
                    .emit_error(errors::bad_index_type(&name, span)))
            }
        }
    }

    /// Lower `operand` into absolute positions, pushing whatever must run
    /// before the access onto `effects`.
    pub(crate) fn lower_index(
        &mut self,
        operand: BoundId,
        shape: IndexShape,
        length: Length,
        effects: &mut SmallVec<[LoweredId; 4]>,
    ) -> IndexForm {
        let span = self.src().span(operand);
        match shape {
            IndexShape::Int => IndexForm::Item(self.lower_int_index(operand)),
            IndexShape::Relative => {
                let index = self.lower_expr(operand);
                let length = self.length_node(length, span);
                IndexForm::Item(self.push(
                    LoweredKind::IndexOffset { index, length },
                    TypeId::INT,
                    span,
                ))
            }
            IndexShape::Range => {
                let range = self.lower_expr(operand);
                let range_temp = self.store_temp(range, TypeId::RANGE, span, effects);

                let range_start = self.temp_node(range_temp, TypeId::RANGE, span);
                let start = self.push(LoweredKind::RangeStart(range_start), TypeId::INDEX, span);
                let start_length = self.length_node(length, span);
                let start = self.push(
                    LoweredKind::IndexOffset {
                        index: start,
                        length: start_length,
                    },
                    TypeId::INT,
                    span,
                );
                let start_temp = self.store_temp(start, TypeId::INT, span, effects);

                let range_end = self.temp_node(range_temp, TypeId::RANGE, span);
                let end = self.push(LoweredKind::RangeEnd(range_end), TypeId::INDEX, span);
                let end_length = self.length_node(length, span);
                let end = self.push(
                    LoweredKind::IndexOffset {
                        index: end,
                        length: end_length,
                    },
                    TypeId::INT,
                    span,
                );
                let start_read = self.temp_node(start_temp, TypeId::INT, span);
                let count = self.push(
                    LoweredKind::Binary {
                        op: BinaryOp::Sub,
                        left: end,
                        right: start_read,
                    },
                    TypeId::INT,
                    span,
                );
                IndexForm::Slice {
                    start: self.temp_node(start_temp, TypeId::INT, span),
                    count,
                }
            }
        }
    }

    fn lower_int_index(&mut self, operand: BoundId) -> LoweredId {
        let ty = self.src().ty(operand);
        let span = self.src().span(operand);
        let index = self.lower_expr(operand);
        match ty {
            TypeId::INT | TypeId::ERROR => index,
            // Bound at run time, always to `int`.
            TypeId::DYNAMIC => self.push(LoweredKind::DynamicConvert(index), TypeId::INT, span),
            _ => self.push(
                LoweredKind::Convert {
                    operand: index,
                    explicit: false,
                },
                TypeId::INT,
                span,
            ),
        }
    }

    fn length_node(&mut self, length: Length, span: Span) -> LoweredId {
        match length {
            Length::Const(capacity) => {
                self.push(LoweredKind::IntLit(i64::from(capacity)), TypeId::INT, span)
            }
            Length::View(view) => {
                let view = self.lower_expr(view);
                self.push(LoweredKind::ViewLength(view), TypeId::INT, span)
            }
            Length::ViewTemp(temp, ty) => {
                let view = self.temp_node(temp, ty, span);
                self.push(LoweredKind::ViewLength(view), TypeId::INT, span)
            }
        }
    }

    /// `temp = value` as an effect; returns the temporary.
    pub(crate) fn store_temp(
        &mut self,
        value: LoweredId,
        ty: TypeId,
        span: Span,
        effects: &mut SmallVec<[LoweredId; 4]>,
    ) -> TempId {
        let temp = self.out.declare_temp(ty, false);
        effects.push(self.push(LoweredKind::StoreTemp { temp, value }, TypeId::VOID, span));
        temp
    }

    pub(crate) fn temp_node(&mut self, temp: TempId, ty: TypeId, span: Span) -> LoweredId {
        self.push(LoweredKind::Temp(temp), ty, span)
    }
}
