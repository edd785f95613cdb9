use thiserror::Error;

/// Invariant violations and front-end-produced-invalid-IR, per
/// `SPEC_FULL.md` §7. Both rows of that table are "no, surfaced" /
/// "no, implementation bug" — there is no recovery path, only propagation
/// up to a caller that aborts.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum IrError {
    #[error("procedure `{procedure}`: jump target is not a label present in this procedure")]
    DanglingJumpTarget { procedure: String },

    #[error("procedure `{procedure}`: entry references a symbol outside this procedure's symbol list")]
    ForeignSymbol { procedure: String },

    #[error("procedure `{procedure}`: expected exactly one Prologue/Epilogue pair with matching slot counts")]
    MalformedPrologueEpilogue { procedure: String },

    #[error("procedure `{procedure}`: variable is live at entry (used before any reaching definition)")]
    UseBeforeDef { procedure: String },

    #[error("procedure `{procedure}`: a path to the end of the procedure does not pass through Return")]
    MissingReturn { procedure: String },
}
