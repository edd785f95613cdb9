//! Structural invariant checks from `SPEC_FULL.md` §3 that can be
//! verified without building a flow graph or any dataflow analysis.
//! Liveness-based checks (use-before-def, missing return on some path)
//! live in the crate-level `verify` module, since they need the flow
//! graph and reaching-definitions analysis.

use super::entry::Entry;
use super::procedure::Procedure;
use super::IrError;

pub fn verify_procedure(procedure: &Procedure) -> Result<(), IrError> {
    check_jump_targets(procedure)?;
    check_symbols_in_range(procedure)?;
    check_prologue_epilogue(procedure)?;
    Ok(())
}

fn check_jump_targets(procedure: &Procedure) -> Result<(), IrError> {
    let entries = procedure.entries();
    for (_, entry) in entries.iter() {
        let targets: Vec<_> = match entry {
            Entry::Jump { target } => vec![*target],
            Entry::CJump { true_target, false_target, .. } => vec![*true_target, *false_target],
            _ => continue,
        };
        for target in targets {
            match entries.get(target) {
                Some(Entry::Label { .. }) => {}
                _ => {
                    return Err(IrError::DanglingJumpTarget { procedure: procedure.name.clone() });
                }
            }
        }
    }
    Ok(())
}

fn check_symbols_in_range(procedure: &Procedure) -> Result<(), IrError> {
    let count = procedure.symbols().len();
    for (_, entry) in procedure.entries().iter() {
        for id in entry.referenced_symbols() {
            if id.index() >= count {
                return Err(IrError::ForeignSymbol { procedure: procedure.name.clone() });
            }
        }
    }
    Ok(())
}

fn check_prologue_epilogue(procedure: &Procedure) -> Result<(), IrError> {
    let entries = procedure.entries();
    let prologue_slots = match entries.get(procedure.prologue()) {
        Some(Entry::Prologue { slots }) => *slots,
        _ => return Err(IrError::MalformedPrologueEpilogue { procedure: procedure.name.clone() }),
    };
    let epilogue_slots = match entries.get(procedure.epilogue()) {
        Some(Entry::Epilogue { slots }) => *slots,
        _ => return Err(IrError::MalformedPrologueEpilogue { procedure: procedure.name.clone() }),
    };
    if prologue_slots != epilogue_slots {
        return Err(IrError::MalformedPrologueEpilogue { procedure: procedure.name.clone() });
    }

    let mut prologue_count = 0;
    let mut epilogue_count = 0;
    for (_, entry) in entries.iter() {
        match entry {
            Entry::Prologue { .. } => prologue_count += 1,
            Entry::Epilogue { .. } => epilogue_count += 1,
            _ => {}
        }
    }
    if prologue_count != 1 || epilogue_count != 1 {
        return Err(IrError::MalformedPrologueEpilogue { procedure: procedure.name.clone() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Entry as E;

    #[test]
    fn fresh_procedure_is_valid() {
        let proc = Procedure::new("main");
        assert!(verify_procedure(&proc).is_ok());
    }

    #[test]
    fn dangling_jump_target_is_rejected() {
        let mut proc = Procedure::new("main");
        let bogus = crate::ir::EntryId(999);
        proc.push(E::Jump { target: bogus });
        assert!(matches!(
            verify_procedure(&proc),
            Err(IrError::DanglingJumpTarget { .. })
        ));
    }
}
