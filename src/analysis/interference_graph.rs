//! Undirected interference graph on symbols (`SPEC_FULL.md` §4.D
//! "Interference graph"). Supports cheap node removal so the register
//! allocator's simplification loop can peel nodes without rebuilding the
//! whole graph (§4.G).

use std::collections::BTreeSet;

use crate::ir::{Procedure, SymbolId};

use super::live_variables::LiveVariables;

pub type SymbolSet = BTreeSet<SymbolId>;

#[derive(Clone)]
pub struct InterferenceGraph {
    adjacency: std::collections::BTreeMap<SymbolId, SymbolSet>,
}

impl InterferenceGraph {
    pub fn build(procedure: &Procedure, live: &LiveVariables) -> Self {
        let adjacency: std::collections::BTreeMap<SymbolId, SymbolSet> =
            procedure.symbol_ids().map(|s| (s, SymbolSet::new())).collect();

        let mut ig = InterferenceGraph { adjacency };
        for (id, _) in procedure.entries().iter() {
            let live_out: Vec<SymbolId> = live.live_out(id).into_iter().collect();
            for i in 0..live_out.len() {
                for j in (i + 1)..live_out.len() {
                    ig.add_edge(live_out[i], live_out[j]);
                }
            }
        }
        ig
    }

    pub fn add_symbol(&mut self, symbol: SymbolId) {
        self.adjacency.entry(symbol).or_default();
    }

    pub fn add_edge(&mut self, a: SymbolId, b: SymbolId) {
        if a == b {
            return;
        }
        self.adjacency.entry(a).or_default().insert(b);
        self.adjacency.entry(b).or_default().insert(a);
    }

    /// Remove `symbol` from the graph, scrubbing it from every neighbor's
    /// adjacency set.
    pub fn remove_symbol(&mut self, symbol: SymbolId) {
        if let Some(neighbors) = self.adjacency.remove(&symbol) {
            for n in neighbors {
                if let Some(adj) = self.adjacency.get_mut(&n) {
                    adj.remove(&symbol);
                }
            }
        }
    }

    pub fn interferences(&self, symbol: SymbolId) -> SymbolSet {
        self.adjacency.get(&symbol).cloned().unwrap_or_default()
    }

    pub fn symbols(&self) -> impl Iterator<Item = SymbolId> + '_ {
        self.adjacency.keys().copied()
    }

    pub fn degree(&self, symbol: SymbolId) -> usize {
        self.adjacency.get(&symbol).map(|s| s.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_graph::FlowGraph;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn simultaneously_live_symbols_interfere() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        let y = b.symbol("y", 4);
        let z = b.temp(4);
        b.mov_imm(x, 1);
        b.mov_imm(y, 2);
        b.add(z, x, y);
        b.print(z);
        let proc = b.build().unwrap();

        let graph = FlowGraph::build(&proc);
        let live = LiveVariables::build(&proc, &graph);
        let ig = InterferenceGraph::build(&proc, &live);

        assert!(ig.interferences(x).contains(&y));
    }
}
