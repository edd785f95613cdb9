//! Forward/union dataflow on entries: `gen(e) = {e}` when `e` assigns a
//! symbol, `kill(e) = { other defs of the same symbol }`
//! (`SPEC_FULL.md` §4.D "Reaching definitions").

use std::collections::{BTreeSet, HashMap};

use crate::dataflow::{self, Direction, GenKill, ItemSet, Meet};
use crate::flow_graph::FlowGraph;
use crate::ir::{EntryId, Procedure, SymbolId};

pub struct ReachingDefs {
    in_sets: HashMap<EntryId, BTreeSet<EntryId>>,
}

impl ReachingDefs {
    pub fn build(procedure: &Procedure, graph: &FlowGraph) -> Self {
        let mut defs_by_symbol: HashMap<SymbolId, BTreeSet<EntryId>> = HashMap::new();
        let mut all: ItemSet<EntryId> = BTreeSet::new();

        for (id, entry) in procedure.entries().iter() {
            if let Some(sym) = entry.assign() {
                defs_by_symbol.entry(sym).or_default().insert(id);
                all.insert(id);
            }
        }

        let mut gen: GenKill<EntryId> = HashMap::new();
        let mut kill: GenKill<EntryId> = HashMap::new();
        for (id, entry) in procedure.entries().iter() {
            if let Some(sym) = entry.assign() {
                gen.insert(id, [id].into_iter().collect());
                let mut k = defs_by_symbol[&sym].clone();
                k.remove(&id);
                kill.insert(id, k);
            }
        }

        let in_sets = dataflow::analyze(procedure, graph, &gen, &kill, &all, Meet::Union, Direction::Forward);
        ReachingDefs { in_sets }
    }

    /// Definitions reaching `entry` (of any symbol).
    pub fn defs(&self, entry: EntryId) -> BTreeSet<EntryId> {
        self.in_sets.get(&entry).cloned().unwrap_or_default()
    }

    /// Definitions of `symbol` reaching `entry`.
    pub fn defs_for_symbol(&self, procedure: &Procedure, entry: EntryId, symbol: SymbolId) -> BTreeSet<EntryId> {
        self.defs(entry)
            .into_iter()
            .filter(|d| procedure.entries().get(*d).and_then(|e| e.assign()) == Some(symbol))
            .collect()
    }
}
