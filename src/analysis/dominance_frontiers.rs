//! Dominance frontier computation via the Cytron et al. "runner"
//! algorithm over an already-built dominator tree (`SPEC_FULL.md` §4.D
//! "Dominance frontiers").

use std::collections::{BTreeSet, HashMap};

use super::dominance::DominatorTree;
use crate::flow_graph::{BlockId, FlowGraph};

pub struct DominanceFrontiers {
    frontier: HashMap<BlockId, BTreeSet<BlockId>>,
}

impl DominanceFrontiers {
    pub fn build(graph: &FlowGraph, dom: &DominatorTree) -> Self {
        let mut frontier: HashMap<BlockId, BTreeSet<BlockId>> = HashMap::new();

        for &block in dom.reachable_blocks() {
            let preds: Vec<BlockId> = graph.block(block).preds.iter().copied().collect();
            if preds.len() < 2 {
                continue;
            }
            let idom_block = match dom.idom(block) {
                Some(i) => i,
                None => continue,
            };
            for pred in preds {
                let mut runner = pred;
                while runner != idom_block {
                    frontier.entry(runner).or_default().insert(block);
                    match dom.idom(runner) {
                        Some(next) if next != runner => runner = next,
                        _ => break,
                    }
                }
            }
        }

        DominanceFrontiers { frontier }
    }

    pub fn frontier_of(&self, block: BlockId) -> BTreeSet<BlockId> {
        self.frontier.get(&block).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_graph::FlowGraph;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn diamond_join_is_in_both_branch_frontiers() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        let t = b.fresh_label();
        let merge = b.fresh_label();
        let pred = b.temp(4);
        b.mov_imm(pred, 1);
        b.cjump(pred, &t, &merge);
        b.place_label(&t);
        b.mov_imm(x, 1);
        b.jump(&merge);
        b.place_label(&merge);
        b.mov_imm(x, 2);
        b.ret();
        let proc = b.build().unwrap();

        let graph = FlowGraph::build(&proc);
        let dom = DominatorTree::build(&graph);
        let df = DominanceFrontiers::build(&graph, &dom);

        // entry block dominates everything, so its frontier is empty.
        assert!(df.frontier_of(graph.start()).is_empty());
    }
}
