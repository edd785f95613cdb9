//! Liveness-based invariant checks that need the flow graph and live
//! variables analysis, as opposed to the purely structural checks in
//! `ir::verify_procedure` (`SPEC_FULL.md` §7: "a `verify` collaborator runs
//! before the core transforms and rejects (a) live-at-entry variables... and
//! (b) any path to `end` that is not a `Return`").

use crate::analysis::Analysis;
use crate::ir::{Entry, IrError, Procedure};

pub fn verify_liveness(procedure: &Procedure, analysis: &mut Analysis) -> Result<(), IrError> {
    check_use_before_def(procedure, analysis)?;
    check_missing_return(procedure, analysis)?;
    Ok(())
}

/// A symbol live at the procedure's very first instruction was used before
/// any reaching definition inside this procedure.
fn check_use_before_def(procedure: &Procedure, analysis: &mut Analysis) -> Result<(), IrError> {
    let live = analysis.live_variables(procedure);
    if !live.live_in(procedure.start_label()).is_empty() {
        return Err(IrError::UseBeforeDef { procedure: procedure.name.clone() });
    }
    Ok(())
}

/// Every predecessor of the flow graph's `end` block must fall through a
/// `Return`; any other way of reaching `end` is a path that never returns.
fn check_missing_return(procedure: &Procedure, analysis: &mut Analysis) -> Result<(), IrError> {
    let graph = analysis.flow_graph(procedure);
    let end = graph.end();
    for &pred in &graph.block(end).preds {
        let entries = graph.entries(procedure, pred);
        let last = entries.last().and_then(|&id| procedure.entries().get(id));
        if !matches!(last, Some(Entry::Return)) {
            return Err(IrError::MissingReturn { procedure: procedure.name.clone() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn procedure_ending_in_return_passes() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        b.mov_imm(x, 1);
        b.print(x);
        b.ret();
        let proc = b.build().unwrap();
        let mut analysis = Analysis::new();
        assert!(verify_liveness(&proc, &mut analysis).is_ok());
    }

    #[test]
    fn procedure_without_return_is_rejected() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        b.mov_imm(x, 1);
        b.print(x);
        let proc = b.build().unwrap();
        let mut analysis = Analysis::new();
        assert!(matches!(
            verify_liveness(&proc, &mut analysis),
            Err(IrError::MissingReturn { .. })
        ));
    }
}
