//! Loop-invariant code motion: hoist constant-valued definitions and
//! loop-invariant pure expressions out of loops that have a preheader
//! (`SPEC_FULL.md` §4.E "Loop-invariant code motion"). An expression
//! qualifies the same way a constant `Move` already does here: exactly one
//! definition inside the loop, operands never redefined anywhere in the
//! loop — the generalization the distilled source's own `// TODO:
//! Non-constant invariants` comment left undone. `LoadMem` is excluded
//! even though it reports `is_pure_expression()` — hoisting a load needs
//! alias analysis this crate doesn't have, so a value redefined through a
//! pointer could be hoisted past its own invalidation.

use std::collections::HashMap;

use crate::analysis::{Analysis, LoopId, Loops};
use crate::flow_graph::BlockId;
use crate::ir::{Entry, EntryId, Procedure, SymbolId};

pub fn transform(procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
    let block_entries: HashMap<BlockId, Vec<EntryId>> = {
        let graph = analysis.flow_graph(procedure);
        graph.blocks().map(|b| (b, graph.entries(procedure, b))).collect()
    };

    let changed = {
        let loops = analysis.loops(procedure);
        let root = loops.root();
        process_loop(root, procedure, loops, &block_entries)
    };

    if changed {
        analysis.invalidate();
    }
    changed
}

fn process_loop(
    id: LoopId,
    procedure: &mut Procedure,
    loops: &Loops,
    block_entries: &HashMap<BlockId, Vec<EntryId>>,
) -> bool {
    let mut changed = false;
    for &child in &loops.get(id).children {
        changed |= process_loop(child, procedure, loops, block_entries);
    }

    if id == loops.root() {
        return changed;
    }

    let preheader = match loops.get(id).preheader {
        Some(p) => p,
        None => return changed,
    };
    let header = loops.get(id).header;

    let mut defs: HashMap<SymbolId, u32> = HashMap::new();
    let mut candidates: Vec<EntryId> = Vec::new();
    for &block in &loops.get(id).blocks {
        for &eid in &block_entries[&block] {
            let entry = match procedure.entries().get(eid) {
                Some(e) => e,
                None => continue,
            };
            if let Some(a) = entry.assign() {
                *defs.entry(a).or_insert(0) += 1;
            }
            let is_constant_move = matches!(entry, Entry::Move(t) if t.rhs1.is_none());
            let is_expression = entry.is_pure_expression() && !matches!(entry, Entry::LoadMem { .. });
            if is_constant_move || is_expression {
                candidates.push(eid);
            }
        }
    }

    let header_first = block_entries[&header][0];
    let preheader_last = *block_entries[&preheader].last().expect("preheader has entries");
    let insert_point = match procedure.entries().get(preheader_last) {
        Some(Entry::Jump { .. }) => preheader_last,
        _ => header_first,
    };

    for eid in candidates {
        let entry = match procedure.entries().get(eid) {
            Some(e) => e.clone(),
            None => continue,
        };
        let assigned = entry.assign().expect("candidate assigns");
        if defs.get(&assigned).copied().unwrap_or(0) != 1 {
            // More than one definition inside the loop: not safe to hoist.
            continue;
        }
        if entry.used_symbols().iter().any(|s| defs.contains_key(s)) {
            // An operand is itself redefined somewhere in the loop: not invariant.
            continue;
        }
        procedure.entries_mut().erase(eid);
        procedure.insert_before(insert_point, entry);
        changed = true;
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn constant_invariant_move_is_hoisted_to_preheader() {
        let mut b = ProcedureBuilder::new("f");
        let i = b.symbol("i", 4);
        let n = b.symbol("n", 4);
        let k = b.symbol("k", 4);
        let pred = b.temp(4);
        let header = b.fresh_label();
        let body = b.fresh_label();
        let after = b.fresh_label();
        b.mov_imm(i, 0);
        b.place_label(&header);
        b.less_than(pred, i, n);
        b.cjump(pred, &body, &after);
        b.place_label(&body);
        let hoisted = b.mov_imm(k, 42);
        b.print(k);
        b.add_imm(i, i, 1);
        b.jump(&header);
        b.place_label(&after);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        assert!(!proc.entries().contains(hoisted));
        let still_present = proc
            .entries()
            .iter()
            .any(|(_, e)| matches!(e, Entry::Move(t) if t.lhs == k && t.imm == Some(42)));
        assert!(still_present);
    }

    #[test]
    fn invariant_expression_is_hoisted_to_preheader() {
        let mut b = ProcedureBuilder::new("f");
        let i = b.symbol("i", 4);
        let n = b.symbol("n", 4);
        let x = b.symbol("x", 4);
        let y = b.symbol("y", 4);
        let t = b.temp(4);
        let pred = b.temp(4);
        let header = b.fresh_label();
        let body = b.fresh_label();
        let after = b.fresh_label();
        b.mov_imm(i, 0);
        b.mov_imm(x, 3);
        b.mov_imm(y, 4);
        b.place_label(&header);
        b.less_than(pred, i, n);
        b.cjump(pred, &body, &after);
        b.place_label(&body);
        let hoisted = b.mult(t, x, y);
        b.print(t);
        b.add_imm(i, i, 1);
        b.jump(&header);
        b.place_label(&after);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        assert!(!proc.entries().contains(hoisted));
        let still_present = proc.entries().iter().any(|(_, e)| matches!(e, Entry::Mult(t2) if t2.lhs == t));
        assert!(still_present);
    }
}
