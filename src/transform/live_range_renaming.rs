//! Live-range renaming: split each symbol into one symbol per connected
//! component of its def-use graph (`SPEC_FULL.md` §4.E "Live-range
//! renaming"). Run before register allocation, it shrinks live ranges and
//! sparsifies the interference graph.

use std::collections::VecDeque;

use crate::analysis::{Analysis, UseDefs};
use crate::ir::{EntryId, Procedure, Symbol, SymbolId};

pub fn transform(procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
    let mut changed = false;
    let old_count = procedure.symbols().len();
    let mut new_symbols: Vec<Symbol> = Vec::new();

    // Built once up front: it only borrows `analysis`, so mutating
    // `procedure` afterwards (a separate value) doesn't conflict with it.
    let use_defs = analysis.use_defs(procedure);

    for i in 0..old_count {
        let old = SymbolId(i as u32);
        let mut idx = 0u32;
        let ids: Vec<EntryId> = procedure.entries().ids().collect();
        for id in ids {
            let touches = match procedure.entries().get(id) {
                Some(e) => e.assign() == Some(old) || e.uses(old),
                None => continue,
            };
            if !touches {
                continue;
            }
            let old_symbol = procedure.symbol(old).clone();
            let new_name = if idx == 0 {
                old_symbol.name.clone()
            } else {
                format!("{}.{}", old_symbol.name, idx)
            };
            idx += 1;
            // Minted past `old_count` so a component renamed while symbol
            // `i` is being processed can never collide with (and later get
            // re-swept and relabeled under) a not-yet-processed old symbol
            // `i+1`, `i+2`, ... Compacted back down to a dense `0..len`
            // range once every old symbol has been processed.
            let new_id = SymbolId((old_count + new_symbols.len()) as u32);
            new_symbols.push(Symbol {
                name: new_name,
                size: old_symbol.size,
                front_end_ref: old_symbol.front_end_ref,
            });
            rename_component(procedure, id, old, new_id, use_defs);
        }
        if idx > 1 {
            changed = true;
        }
    }

    compact_symbol_ids(procedure, old_count);
    procedure.set_symbols(new_symbols);
    changed
}

/// Shifts every symbol id minted at or past `old_count` down by
/// `old_count`, so the post-rename id space is dense starting at 0 again
/// (ids were offset past `old_count` during the rename loop above purely to
/// avoid colliding with old symbols still awaiting their turn).
fn compact_symbol_ids(procedure: &mut Procedure, old_count: usize) {
    let ids: Vec<EntryId> = procedure.entries().ids().collect();
    for id in ids {
        let entry = match procedure.entries_mut().get_mut(id) {
            Some(e) => e,
            None => continue,
        };
        if let Some(old) = entry.assign() {
            if old.index() >= old_count {
                entry.replace_assign(old, SymbolId((old.index() - old_count) as u32));
            }
        }
        for old in entry.used_symbols() {
            if old.index() >= old_count {
                entry.replace_use(old, SymbolId((old.index() - old_count) as u32));
            }
        }
    }
}

/// BFS over the def-use graph starting at `start`, renaming every
/// occurrence of `old` to `new`. Relies on each entry's rename being
/// idempotent: once an entry no longer assigns/uses `old`, revisiting it
/// is a no-op, so no separate visited set is needed.
fn rename_component(
    procedure: &mut Procedure,
    start: EntryId,
    old: SymbolId,
    new: SymbolId,
    use_defs: &UseDefs,
) {
    let mut queue: VecDeque<EntryId> = VecDeque::new();
    queue.push_back(start);

    while let Some(id) = queue.pop_front() {
        let (is_def, is_use) = match procedure.entries().get(id) {
            Some(e) => (e.assign() == Some(old), e.uses(old)),
            None => continue,
        };

        if is_def {
            if let Some(e) = procedure.entries_mut().get_mut(id) {
                e.replace_assign(old, new);
            }
            for next in use_defs.uses(id) {
                queue.push_back(next);
            }
        }
        if is_use {
            if let Some(e) = procedure.entries_mut().get_mut(id) {
                e.replace_use(old, new);
            }
            for next in use_defs.defines(id, old) {
                queue.push_back(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ProcedureBuilder;
    use crate::ir::Entry;

    #[test]
    fn disjoint_live_ranges_of_the_same_symbol_are_split() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        b.mov_imm(x, 1);
        b.print(x);
        b.mov_imm(x, 2);
        let second_print = b.print(x);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        assert!(proc.symbols().iter().any(|s| s.name == "x"));
        assert!(proc.symbols().iter().any(|s| s.name == "x.1"));

        // The second print's StoreArg should reference the split-off symbol.
        let store_for_second_print = proc
            .entries()
            .iter()
            .take_while(|&(id, _)| id != second_print)
            .filter(|(_, e)| matches!(e, Entry::StoreArg { .. }))
            .last();
        assert!(store_for_second_print.is_some());
    }

    #[test]
    fn single_live_range_keeps_its_original_name() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        b.mov_imm(x, 1);
        b.print(x);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(!transform(&mut proc, &mut analysis));
        assert_eq!(proc.symbols().len(), 1);
        assert_eq!(proc.symbols()[0].name, "x");
    }
}
