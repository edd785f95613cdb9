use thiserror::Error;

/// The allocator is proven to terminate with an assignable coloring: each
/// spill strictly shrinks the set of live ranges carrying the spilled
/// symbol's value, so only finitely many spills are possible, and once the
/// interference graph has at most `MAX_REGISTERS` neighbors per node the
/// simplify/reconstruct loop always succeeds. This variant exists so that
/// invariant has a typed failure to return instead of a `panic!` if it is
/// ever violated, per `SPEC_FULL.md` §7's "spill-exhaustion" row.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum AllocError {
    #[error(
        "procedure `{procedure}`: register allocation did not converge after {attempts} spill attempts"
    )]
    SpillExhausted { procedure: String, attempts: u32 },
}
