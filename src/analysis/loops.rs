//! Natural loop discovery and nesting over a dominator tree
//! (`SPEC_FULL.md` §4.D "Loops").

use std::collections::{BTreeSet, HashMap, VecDeque};

use super::dominance::DominatorTree;
use crate::flow_graph::{BlockId, FlowGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopId(u32);

impl LoopId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

pub struct Loop {
    pub header: BlockId,
    pub preheader: Option<BlockId>,
    pub blocks: BTreeSet<BlockId>,
    pub parent: Option<LoopId>,
    pub children: Vec<LoopId>,
}

pub struct Loops {
    loops: Vec<Loop>,
    root: LoopId,
}

impl Loops {
    pub fn build(graph: &FlowGraph, dom: &DominatorTree) -> Self {
        let mut loops: Vec<Loop> = Vec::new();
        let mut header_loop: HashMap<BlockId, LoopId> = HashMap::new();

        for &block in dom.reachable_blocks() {
            for &succ in &graph.block(block).succs {
                if dom.dominates(succ, block) {
                    // back edge block -> succ; succ is the loop header.
                    let body = backward_reach(graph, block, succ);
                    match header_loop.get(&succ) {
                        Some(&id) => {
                            loops[id.0 as usize].blocks.extend(body);
                        }
                        None => {
                            let id = LoopId(loops.len() as u32);
                            loops.push(Loop {
                                header: succ,
                                preheader: None,
                                blocks: body,
                                parent: None,
                                children: Vec::new(),
                            });
                            header_loop.insert(succ, id);
                        }
                    }
                }
            }
        }

        let root_blocks: BTreeSet<BlockId> = dom.reachable_blocks().iter().copied().collect();
        let root = LoopId(loops.len() as u32);
        loops.push(Loop {
            header: graph.start(),
            preheader: None,
            blocks: root_blocks,
            parent: None,
            children: Vec::new(),
        });

        for id in 0..loops.len() as u32 {
            let id = LoopId(id);
            if id == root {
                continue;
            }
            let header = loops[id.0 as usize].header;
            let parent = find_parent(&header_loop, dom, id, header, root);
            loops[id.0 as usize].parent = Some(parent);
            loops[parent.0 as usize].children.push(id);
        }

        for id in 0..loops.len() as u32 {
            let id = LoopId(id);
            if id == root {
                continue;
            }
            loops[id.0 as usize].preheader = find_preheader(graph, &loops, id);
        }

        Loops { loops, root }
    }

    pub fn root(&self) -> LoopId {
        self.root
    }

    pub fn get(&self, id: LoopId) -> &Loop {
        &self.loops[id.0 as usize]
    }

    pub fn ids(&self) -> impl Iterator<Item = LoopId> + '_ {
        (0..self.loops.len() as u32).map(LoopId)
    }

    /// Loop nesting depth of `block`: how many non-root loops contain it.
    pub fn depth(&self, block: BlockId) -> u32 {
        self.loops
            .iter()
            .enumerate()
            .filter(|&(i, l)| LoopId(i as u32) != self.root && l.blocks.contains(&block))
            .count() as u32
    }
}

fn backward_reach(graph: &FlowGraph, bottom: BlockId, header: BlockId) -> BTreeSet<BlockId> {
    let mut blocks = BTreeSet::new();
    blocks.insert(header);
    blocks.insert(bottom);
    let mut queue: VecDeque<BlockId> = VecDeque::new();
    queue.push_back(bottom);
    while let Some(b) = queue.pop_front() {
        if b == header {
            continue;
        }
        for &pred in &graph.block(b).preds {
            if blocks.insert(pred) {
                queue.push_back(pred);
            }
        }
    }
    blocks
}

fn find_parent(
    header_loop: &HashMap<BlockId, LoopId>,
    dom: &DominatorTree,
    this_id: LoopId,
    header: BlockId,
    root: LoopId,
) -> LoopId {
    let mut cur = header;
    loop {
        let next = match dom.idom(cur) {
            Some(n) if n != cur => n,
            _ => return root,
        };
        if let Some(&lid) = header_loop.get(&next) {
            if lid != this_id {
                return lid;
            }
        }
        cur = next;
    }
}

/// A loop has a preheader iff its header has exactly one predecessor from
/// outside the loop, and that predecessor has exactly one successor.
fn find_preheader(graph: &FlowGraph, loops: &[Loop], id: LoopId) -> Option<BlockId> {
    let l = &loops[id.0 as usize];
    let outside: Vec<BlockId> = graph
        .block(l.header)
        .preds
        .iter()
        .copied()
        .filter(|p| !l.blocks.contains(p))
        .collect();
    if outside.len() != 1 {
        return None;
    }
    let candidate = outside[0];
    if graph.block(candidate).succs.len() == 1 {
        Some(candidate)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::dominance::DominatorTree;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn single_loop_has_preheader_and_depth_one() {
        let mut b = ProcedureBuilder::new("f");
        let i = b.symbol("i", 4);
        let n = b.symbol("n", 4);
        let pred = b.temp(4);
        let header = b.fresh_label();
        let body = b.fresh_label();
        let after = b.fresh_label();
        b.mov_imm(i, 0);
        b.place_label(&header);
        b.less_than(pred, i, n);
        b.cjump(pred, &body, &after);
        b.place_label(&body);
        b.add_imm(i, i, 1);
        b.jump(&header);
        b.place_label(&after);
        b.ret();
        let proc = b.build().unwrap();

        let graph = FlowGraph::build(&proc);
        let dom = DominatorTree::build(&graph);
        let loops = Loops::build(&graph, &dom);

        let non_root: Vec<LoopId> = loops.ids().filter(|&id| id != loops.root()).collect();
        assert_eq!(non_root.len(), 1);
        let l = loops.get(non_root[0]);
        assert!(l.preheader.is_some());

        let header_block = graph.block_of(
            proc.entries()
                .ids()
                .find(|&e| matches!(proc.entries().get(e), Some(crate::ir::Entry::Label { name }) if name == &header))
                .unwrap(),
        ).unwrap();
        assert_eq!(loops.depth(header_block), 1);
    }
}
