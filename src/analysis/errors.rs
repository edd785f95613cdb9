use thiserror::Error;

/// No analysis in this crate currently has a failure mode of its own — every
/// analysis is a total function of an already-verified `Procedure` (see
/// `ir::verify_procedure` and the crate-level `verify` module, which run
/// first and own the only two checks an analysis could otherwise fail:
/// use-before-def and missing-return). This enum exists, with no variants
/// yet, so `errors::CompileError` has a stable place to grow an
/// analysis-specific error into without reshaping the top-level enum, per
/// `SPEC_FULL.md` §7's four-enum error taxonomy.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {}
