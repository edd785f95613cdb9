use thiserror::Error;

/// Failures lowering an allocated `Procedure` into target instructions
/// (`SPEC_FULL.md` §6 "Outputs from the core" / §4.G "Code generation").
/// None of these are reachable from a verified, allocated procedure under
/// correct input — they exist the same way `alloc::AllocError` does, as a
/// typed backstop rather than a `panic!`.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum CodegenError {
    #[error("procedure `{procedure}`: entry references symbol with no assigned register")]
    UnallocatedSymbol { procedure: String },

    #[error("procedure `{procedure}`: immediate value {value} does not fit the {bits}-bit field of its instruction family")]
    ImmediateOutOfRange { procedure: String, value: i64, bits: u32 },

    #[error("procedure `{procedure}`: Phi entries require SSA construction, which no pass in this crate performs")]
    UnsupportedPhi { procedure: String },

    #[error("malformed instruction word during decode: {0:#010x}")]
    MalformedInstruction(u32),
}
