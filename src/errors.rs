//! Unifies every stage-specific error enum behind one type so callers of
//! [`crate::compile`] have a single `Result` to propagate with `?`
//! (`SPEC_FULL.md` §7's four-enum error taxonomy: IR, analysis, allocation,
//! codegen, joined here with linking).

use thiserror::Error;

use crate::alloc::AllocError;
use crate::analysis::AnalysisError;
use crate::codegen::CodegenError;
use crate::ir::IrError;
use crate::link::LinkError;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum CompileError {
    #[error(transparent)]
    Ir(#[from] IrError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Codegen(#[from] CodegenError),
    #[error(transparent)]
    Link(#[from] LinkError),
}
