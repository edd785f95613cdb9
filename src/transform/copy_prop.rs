//! Forward and backward copy propagation (`SPEC_FULL.md` §4.E "Copy
//! propagation").

use std::collections::{BTreeSet, HashMap};

use crate::analysis::Analysis;
use crate::dataflow::{self, Direction, GenKill, ItemSet, Meet};
use crate::ir::{Entry, EntryId, Procedure, SymbolId, ThreeAddr};

pub fn transform(procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
    let mut changed = false;
    changed |= backward(procedure, analysis);
    changed |= forward(procedure, analysis);
    changed
}

/// A `Move l := r` with no immediate: the only shape copy propagation
/// tracks (an immediate move is constant propagation's job instead).
fn is_copy(entry: &Entry) -> Option<&ThreeAddr> {
    match entry {
        Entry::Move(t) if t.rhs1.is_some() && t.imm.is_none() => Some(t),
        _ => None,
    }
}

fn forward(procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
    let moves: Vec<(EntryId, SymbolId, SymbolId)> = procedure
        .entries()
        .iter()
        .filter_map(|(id, e)| is_copy(e).map(|t| (id, t.lhs, t.rhs1.unwrap())))
        .collect();
    if moves.is_empty() {
        return false;
    }

    let all: ItemSet<EntryId> = moves.iter().map(|&(id, ..)| id).collect();
    let mut gen: GenKill<EntryId> = HashMap::new();
    let mut kill: GenKill<EntryId> = HashMap::new();
    for &(id, ..) in &moves {
        gen.insert(id, [id].into_iter().collect());
    }
    for (id, entry) in procedure.entries().iter() {
        if let Some(a) = entry.assign() {
            let k: BTreeSet<EntryId> = moves
                .iter()
                .filter(|&&(m_id, lhs, rhs1)| m_id != id && (lhs == a || rhs1 == a))
                .map(|&(m_id, ..)| m_id)
                .collect();
            if !k.is_empty() {
                kill.insert(id, k);
            }
        }
    }

    let in_sets = {
        let graph = analysis.flow_graph(procedure);
        dataflow::analyze(procedure, graph, &gen, &kill, &all, Meet::Intersect, Direction::Forward)
    };

    let move_by_id: HashMap<EntryId, (SymbolId, SymbolId)> =
        moves.iter().map(|&(id, lhs, rhs1)| (id, (lhs, rhs1))).collect();

    let mut rewrites: Vec<(EntryId, SymbolId, SymbolId)> = Vec::new();
    for (id, entry) in procedure.entries().iter() {
        let alive = match in_sets.get(&id) {
            Some(s) => s,
            None => continue,
        };
        for &m_id in alive {
            let &(lhs, rhs1) = &move_by_id[&m_id];
            if entry.uses(lhs) {
                rewrites.push((id, lhs, rhs1));
            }
        }
    }

    if rewrites.is_empty() {
        return false;
    }
    for (id, old, new) in rewrites {
        if let Some(e) = procedure.entries_mut().get_mut(id) {
            e.replace_use(old, new);
        }
        analysis.replace_use(id, old, new);
    }
    true
}

fn backward(procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
    let moves: Vec<(EntryId, SymbolId, SymbolId)> = procedure
        .entries()
        .iter()
        .filter_map(|(id, e)| is_copy(e).map(|t| (id, t.lhs, t.rhs1.unwrap())))
        .collect();
    if moves.is_empty() {
        return false;
    }

    let all: ItemSet<EntryId> = moves.iter().map(|&(id, ..)| id).collect();
    let mut gen: GenKill<EntryId> = HashMap::new();
    let mut kill: GenKill<EntryId> = HashMap::new();
    for &(id, ..) in &moves {
        gen.insert(id, [id].into_iter().collect());
    }
    for (id, entry) in procedure.entries().iter() {
        let k: BTreeSet<EntryId> = moves
            .iter()
            .filter(|&&(m_id, lhs, rhs1)| {
                m_id != id
                    && (entry.assign() == Some(lhs)
                        || entry.assign() == Some(rhs1)
                        || entry.uses(lhs)
                        || entry.uses(rhs1))
            })
            .map(|&(m_id, ..)| m_id)
            .collect();
        if !k.is_empty() {
            kill.insert(id, k);
        }
    }

    let alive_after = {
        let graph = analysis.flow_graph(procedure);
        dataflow::analyze(procedure, graph, &gen, &kill, &all, Meet::Intersect, Direction::Backward)
    };

    let move_by_id: HashMap<EntryId, (SymbolId, SymbolId)> =
        moves.iter().map(|&(id, lhs, rhs1)| (id, (lhs, rhs1))).collect();

    // Candidate defining entries: alive_after(def) contains a move whose
    // rhs1 is exactly what def assigns — def can write directly to the
    // move's lhs instead, eliminating the move.
    let mut retarget: Vec<(EntryId, SymbolId, SymbolId, EntryId)> = Vec::new();
    for (def_id, entry) in procedure.entries().iter() {
        let assigned = match entry.assign() {
            Some(s) => s,
            None => continue,
        };
        let alive = match alive_after.get(&def_id) {
            Some(s) => s,
            None => continue,
        };
        for &m_id in alive {
            if m_id == def_id {
                continue;
            }
            let &(lhs, rhs1) = &move_by_id[&m_id];
            if rhs1 == assigned {
                retarget.push((def_id, assigned, lhs, m_id));
            }
        }
    }

    if retarget.is_empty() {
        return false;
    }
    for (def_id, old, new, move_id) in retarget {
        if let Some(e) = procedure.entries_mut().get_mut(def_id) {
            e.replace_assign(old, new);
        }
        analysis.replace_use(def_id, old, new);
        // Turn the move into a harmless self-move; DeadCodeElimination's
        // `Move l := l` rule removes it next.
        if let Some(Entry::Move(t)) = procedure.entries_mut().get_mut(move_id) {
            t.rhs1 = Some(t.lhs);
        }
        analysis.replace_use(move_id, old, new);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn forward_propagates_copy_into_use() {
        let mut b = ProcedureBuilder::new("f");
        let a = b.symbol("a", 4);
        let bb = b.symbol("b", 4);
        b.mov_imm(a, 7);
        b.mov(bb, a);
        let print_id = b.print(bb);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        let print_entry = proc.entries().get(print_id);
        assert!(matches!(print_entry, Some(Entry::Call { .. })));
        let store_arg = proc
            .entries()
            .iter()
            .find(|(_, e)| matches!(e, Entry::StoreArg { .. }))
            .unwrap()
            .1;
        assert!(matches!(store_arg, Entry::StoreArg { rhs, .. } if *rhs == a));
    }

    #[test]
    fn backward_retargets_def_and_turns_move_into_self_move() {
        let mut b = ProcedureBuilder::new("f");
        let a = b.symbol("a", 4);
        let c = b.symbol("c", 4);
        let bb = b.temp(4);
        let add_id = b.add(a, a, c);
        let move_id = b.mov(bb, a);
        b.print(bb);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        let add_entry = proc.entries().get(add_id).unwrap();
        assert!(matches!(add_entry, Entry::Add(t) if t.lhs == bb));
        let move_entry = proc.entries().get(move_id).unwrap();
        assert!(matches!(move_entry, Entry::Move(t) if t.lhs == t.rhs1.unwrap()));
    }
}
