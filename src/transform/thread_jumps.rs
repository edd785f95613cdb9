//! Jump threading: follow chains of unconditional jumps to their ultimate
//! target (`SPEC_FULL.md` §4.E "Jump threading").

use std::collections::HashSet;

use crate::analysis::Analysis;
use crate::ir::{Entry, EntryId, Procedure};

pub fn transform(procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
    let ids: Vec<EntryId> = procedure.entries().ids().collect();
    let mut changed = false;

    for id in ids {
        let entry = match procedure.entries().get(id) {
            Some(e) => e.clone(),
            None => continue,
        };
        match entry {
            Entry::Jump { target } => {
                let threaded = follow(procedure, target);
                if threaded != target {
                    if let Some(Entry::Jump { target: t }) = procedure.entries_mut().get_mut(id) {
                        *t = threaded;
                    }
                    changed = true;
                }
            }
            Entry::CJump { true_target, false_target, .. } => {
                let t = follow(procedure, true_target);
                let f = follow(procedure, false_target);
                if t != true_target || f != false_target {
                    if let Some(Entry::CJump { true_target: tt, false_target: ft, .. }) =
                        procedure.entries_mut().get_mut(id)
                    {
                        *tt = t;
                        *ft = f;
                    }
                    changed = true;
                }
            }
            _ => {}
        }
    }

    if changed {
        analysis.invalidate();
    }
    changed
}

/// Given a label, follow `Label -> Jump -> Label -> Jump -> ...` chains
/// to the label the jump ultimately lands on. Guards against an infinite
/// loop of jumps that target each other.
fn follow(procedure: &Procedure, label: EntryId) -> EntryId {
    let mut cur = label;
    let mut seen = HashSet::new();
    loop {
        if !seen.insert(cur) {
            return cur;
        }
        match procedure.entries().next(cur).and_then(|id| procedure.entries().get(id).map(|e| (id, e))) {
            Some((_, Entry::Jump { target })) => cur = *target,
            _ => return cur,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn chain_of_jumps_threads_to_final_target() {
        let mut b = ProcedureBuilder::new("f");
        let p = b.temp(4);
        let entry_label = b.fresh_label();
        let l1 = "l1".to_string();
        let l2 = "l2".to_string();
        let l3 = "l3".to_string();
        b.mov_imm(p, 1);
        let cjump_id = b.cjump(p, &l1, &entry_label);
        b.place_label(&l1);
        b.jump(&l2);
        b.place_label(&l2);
        b.jump(&l3);
        b.place_label(&l3);
        b.ret();
        b.place_label(&entry_label);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        let l3_id = proc
            .entries()
            .iter()
            .find(|(_, e)| matches!(e, Entry::Label { name } if name == "l3"))
            .unwrap()
            .0;
        match proc.entries().get(cjump_id) {
            Some(Entry::CJump { true_target, .. }) => assert_eq!(*true_target, l3_id),
            _ => panic!("expected CJump"),
        }
    }
}
