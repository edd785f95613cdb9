//! Cooper-Harvey-Kennedy iterative dominator computation over a
//! reverse-postorder block numbering (`SPEC_FULL.md` §4.D "Dominator
//! tree").

use std::collections::HashMap;

use crate::flow_graph::{BlockId, FlowGraph};

pub struct DominatorTree {
    /// Reverse postorder index of each reachable block.
    rpo_number: HashMap<BlockId, usize>,
    rpo_order: Vec<BlockId>,
    idom: HashMap<BlockId, BlockId>,
}

impl DominatorTree {
    pub fn build(graph: &FlowGraph) -> Self {
        let rpo_order = reverse_postorder(graph);
        let rpo_number: HashMap<BlockId, usize> =
            rpo_order.iter().enumerate().map(|(i, &b)| (b, i)).collect();

        let start = graph.start();
        let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
        idom.insert(start, start);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo_order.iter().skip(1) {
                let preds: Vec<BlockId> = graph
                    .block(block)
                    .preds
                    .iter()
                    .copied()
                    .filter(|p| idom.contains_key(p))
                    .collect();
                if preds.is_empty() {
                    continue;
                }
                let mut new_idom = preds[0];
                for &p in &preds[1..] {
                    new_idom = intersect(new_idom, p, &idom, &rpo_number);
                }
                if idom.get(&block) != Some(&new_idom) {
                    idom.insert(block, new_idom);
                    changed = true;
                }
            }
        }

        DominatorTree { rpo_number, rpo_order, idom }
    }

    pub fn idom(&self, block: BlockId) -> Option<BlockId> {
        self.idom.get(&block).copied()
    }

    pub fn reachable_blocks(&self) -> &[BlockId] {
        &self.rpo_order
    }

    /// `a` dominates `b` iff walking `b`'s idom chain reaches `a`.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        let mut cur = b;
        loop {
            if cur == a {
                return true;
            }
            let next = match self.idom(cur) {
                Some(n) => n,
                None => return false,
            };
            if next == cur {
                return cur == a;
            }
            cur = next;
        }
    }
}

fn intersect(
    mut a: BlockId,
    mut b: BlockId,
    idom: &HashMap<BlockId, BlockId>,
    rpo_number: &HashMap<BlockId, usize>,
) -> BlockId {
    while a != b {
        while rpo_number[&a] > rpo_number[&b] {
            a = idom[&a];
        }
        while rpo_number[&b] > rpo_number[&a] {
            b = idom[&b];
        }
    }
    a
}

fn reverse_postorder(graph: &FlowGraph) -> Vec<BlockId> {
    let mut visited = std::collections::HashSet::new();
    let mut postorder = Vec::new();
    let mut stack: Vec<(BlockId, usize)> = vec![(graph.start(), 0)];
    visited.insert(graph.start());

    while let Some((block, next_succ)) = stack.pop() {
        let succs: Vec<BlockId> = graph.block(block).succs.iter().copied().collect();
        if next_succ < succs.len() {
            stack.push((block, next_succ + 1));
            let succ = succs[next_succ];
            if visited.insert(succ) {
                stack.push((succ, 0));
            }
        } else {
            postorder.push(block);
        }
    }

    postorder.reverse();
    postorder
}
