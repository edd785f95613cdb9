use thiserror::Error;

/// The only way linking an otherwise well-formed set of objects can fail:
/// something one object's relocations target was never defined by any
/// object in the link (`SPEC_FULL.md` §6 "Linkable object format").
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum LinkError {
    #[error("undefined symbol `{name}` referenced by `{referencing_object}`")]
    UndefinedSymbol { name: String, referencing_object: String },
}
