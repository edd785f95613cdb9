//! Backward/union dataflow on symbols (`SPEC_FULL.md` §4.D "Live
//! variables").

use std::collections::{BTreeSet, HashMap};

use crate::dataflow::{self, Direction, GenKill, ItemSet, Meet};
use crate::flow_graph::FlowGraph;
use crate::ir::{EntryId, Procedure, SymbolId};

pub struct LiveVariables {
    /// Symbols live immediately *after* each entry executes.
    live_out: HashMap<EntryId, BTreeSet<SymbolId>>,
    gen: GenKill<SymbolId>,
    kill: GenKill<SymbolId>,
}

impl LiveVariables {
    pub fn build(procedure: &Procedure, graph: &FlowGraph) -> Self {
        let mut gen: GenKill<SymbolId> = HashMap::new();
        let mut kill: GenKill<SymbolId> = HashMap::new();
        let mut all: ItemSet<SymbolId> = BTreeSet::new();

        for (id, entry) in procedure.entries().iter() {
            let used: BTreeSet<SymbolId> = entry.used_symbols().into_iter().collect();
            all.extend(used.iter().copied());
            let mut k = BTreeSet::new();
            if let Some(a) = entry.assign() {
                all.insert(a);
                if !used.contains(&a) {
                    k.insert(a);
                }
            }
            gen.insert(id, used);
            kill.insert(id, k);
        }

        let live_out = dataflow::analyze(procedure, graph, &gen, &kill, &all, Meet::Union, Direction::Backward);
        LiveVariables { live_out, gen, kill }
    }

    pub fn live_out(&self, entry: EntryId) -> BTreeSet<SymbolId> {
        self.live_out.get(&entry).cloned().unwrap_or_default()
    }

    pub fn live_in(&self, entry: EntryId) -> BTreeSet<SymbolId> {
        let out = self.live_out(entry);
        let empty = BTreeSet::new();
        let gen = self.gen.get(&entry).unwrap_or(&empty);
        let kill = self.kill.get(&entry).unwrap_or(&empty);
        let mut in_set: BTreeSet<SymbolId> = gen.clone();
        for s in &out {
            if !kill.contains(s) {
                in_set.insert(*s);
            }
        }
        in_set
    }

    pub fn is_live_out(&self, entry: EntryId, symbol: SymbolId) -> bool {
        self.live_out.get(&entry).map(|s| s.contains(&symbol)).unwrap_or(false)
    }
}
