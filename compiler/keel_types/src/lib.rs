//! Keel Types - the host symbol table, constant evaluation and buffer
//! type recognition.
//!
//! # Architecture
//!
//! - [`TypeTable`]: type definitions (frozen once declared) plus a
//!   concurrent interner for type expressions (`Named`, `View`, `Param`)
//! - [`ConstEvaluator`]: folds attribute arguments and constant members,
//!   reporting obsolete-member usage along the way
//! - [`BufferRecognizer`]: decides whether a type is a fixed-capacity inline
//!   buffer, memoized per definition and per instantiation
//!
//! Lowering threads share one `TypeTable` and one `BufferRecognizer` by
//! reference; both are `Sync`.

mod buffer;
mod const_eval;
mod defs;
mod table;

pub use buffer::{BufferRecognizer, BufferTypeDescriptor, RecognitionCache};
pub use const_eval::{ConstEvaluator, ConstValue};
pub use defs::{
    AttrId, AttributeApp, AttributeClass, ConstExpr, DeclKind, FieldDef, FieldFlags, FieldStorage,
    MemberDef, TypeDef,
};
pub use table::{TypeData, TypeTable};
