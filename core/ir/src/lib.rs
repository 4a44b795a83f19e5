#![warn(clippy::pedantic)]
//! Lumina's intermediate representation and the middle-end passes over it:
//! AST lowering, SSA conversion, optimization, and validation.
//!
//! ## Modules
//!
//! - [`nodes`] — IR node types plus the enum/struct shape metadata codegen needs.
//! - [`lower`] — AST to IR lowering with match/enum/pipeline/member-assignment
//!   desugaring and call-site retargeting.
//! - [`ssa`] — renaming into SSA form with phi insertion at if/else joins.
//! - [`optimize`] — folding, simplification, dead-store and unused-function
//!   elimination.
//! - [`validate`] — internal-error checks over the final SSA form.

pub mod lower;
pub mod nodes;
pub mod optimize;
pub mod ssa;
pub mod validate;

pub use lower::Lowerer;
pub use nodes::{
    IrBinaryOp, IrEnumDef, IrExpr, IrFunction, IrParam, IrProgram, IrStmt, IrStructDef,
    IrVariantDef,
};
pub use optimize::optimize_program;
pub use ssa::convert_program;
pub use validate::{validate_ssa, RUNTIME_NAMES};
