//! Partition a procedure's linear entry list into basic blocks with
//! predecessor/successor edges (`SPEC_FULL.md` §3 "Flow graph", §4.B).

use std::collections::BTreeSet;

use crate::ir::{Entry, EntryId, Procedure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A basic block. `span` is `None` for the two synthetic sentinels
/// (`start`, `end`); otherwise it is the inclusive `[first, last]` range
/// of entries this block owns, as a *view* into the procedure's entry
/// list — never a copy.
#[derive(Debug, Clone)]
pub struct Block {
    pub span: Option<(EntryId, EntryId)>,
    pub preds: BTreeSet<BlockId>,
    pub succs: BTreeSet<BlockId>,
}

pub struct FlowGraph {
    blocks: Vec<Block>,
    start: BlockId,
    end: BlockId,
    /// Block containing each live entry; `None` entries (tombstones) are
    /// never looked up.
    owner: std::collections::HashMap<EntryId, BlockId>,
    label_block: std::collections::HashMap<EntryId, BlockId>,
}

impl FlowGraph {
    pub fn start(&self) -> BlockId {
        self.start
    }

    pub fn end(&self) -> BlockId {
        self.end
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_of(&self, entry: EntryId) -> Option<BlockId> {
        self.owner.get(&entry).copied()
    }

    /// Entries of `block` in list order. Empty for the sentinels.
    pub fn entries<'a>(&self, procedure: &'a Procedure, block: BlockId) -> Vec<EntryId> {
        match self.block(block).span {
            Some((first, last)) => procedure.entries().span(first, last).collect(),
            None => Vec::new(),
        }
    }

    /// Build the flow graph for `procedure`. Walks the entry list
    /// linearly: a new block starts at every `Label`; a block ends at any
    /// `Jump`, `CJump`, `Return`, or immediately before the next `Label`.
    pub fn build(procedure: &Procedure) -> FlowGraph {
        let entries = procedure.entries();

        let mut blocks = vec![
            Block { span: None, preds: BTreeSet::new(), succs: BTreeSet::new() }, // start
            Block { span: None, preds: BTreeSet::new(), succs: BTreeSet::new() }, // end
        ];
        let start = BlockId(0);
        let end = BlockId(1);

        // First pass: carve out block spans and record which block each
        // Label entry starts.
        let mut label_block = std::collections::HashMap::new();
        let mut owner = std::collections::HashMap::new();
        let mut spans: Vec<(EntryId, EntryId)> = Vec::new();

        let mut cur_first: Option<EntryId> = None;
        let mut cur_last: Option<EntryId> = None;
        let ids: Vec<EntryId> = entries.ids().collect();

        for (i, &id) in ids.iter().enumerate() {
            let entry = entries.get(id).expect("live id");
            let starts_new_block = matches!(entry, Entry::Label { .. }) && cur_first.is_some();
            if starts_new_block {
                spans.push((cur_first.unwrap(), cur_last.unwrap()));
                cur_first = None;
            }
            if cur_first.is_none() {
                cur_first = Some(id);
            }
            cur_last = Some(id);

            let ends_block = matches!(entry, Entry::Jump { .. } | Entry::CJump { .. } | Entry::Return)
                || ids.get(i + 1).map(|&next| matches!(entries.get(next), Some(Entry::Label { .. }))).unwrap_or(true);

            if ends_block {
                spans.push((cur_first.unwrap(), cur_last.unwrap()));
                cur_first = None;
                cur_last = None;
            }
        }

        for span in &spans {
            let block_id = BlockId(blocks.len() as u32);
            blocks.push(Block { span: Some(*span), preds: BTreeSet::new(), succs: BTreeSet::new() });
            for id in entries.span(span.0, span.1) {
                owner.insert(id, block_id);
            }
            if let Entry::Label { .. } = entries.get(span.0).expect("live") {
                label_block.insert(span.0, block_id);
            }
        }

        let mut graph = FlowGraph { blocks, start, end, owner, label_block };
        graph.connect(procedure, &spans);
        graph
    }

    fn connect(&mut self, procedure: &Procedure, spans: &[(EntryId, EntryId)]) {
        let entries = procedure.entries();
        let block_for_span = |i: usize| BlockId((i + 2) as u32);

        if !spans.is_empty() {
            self.add_edge(self.start, block_for_span(0));
        } else {
            self.add_edge(self.start, self.end);
        }

        for (i, span) in spans.iter().enumerate() {
            let this_block = block_for_span(i);
            let last_entry = entries.get(span.1).expect("live");
            match last_entry {
                Entry::Jump { target } => {
                    let target_block = *self.label_block.get(target).expect("dangling jump target");
                    self.add_edge(this_block, target_block);
                }
                Entry::CJump { true_target, false_target, .. } => {
                    let t = *self.label_block.get(true_target).expect("dangling jump target");
                    let f = *self.label_block.get(false_target).expect("dangling jump target");
                    self.add_edge(this_block, t);
                    self.add_edge(this_block, f);
                }
                Entry::Return => {
                    self.add_edge(this_block, self.end);
                }
                _ => {
                    // falls through
                    if let Some(_next) = spans.get(i + 1) {
                        self.add_edge(this_block, block_for_span(i + 1));
                    } else {
                        self.add_edge(this_block, self.end);
                    }
                }
            }
        }
    }

    fn add_edge(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from.0 as usize].succs.insert(to);
        self.blocks[to.0 as usize].preds.insert(from);
    }

    /// Swap `new` in place of `old` at whichever block boundary (first or
    /// last) currently holds it; a no-op for any interior entry, since
    /// block spans are boundary-only (`SPEC_FULL.md` §4.B).
    pub fn replace(&mut self, old: EntryId, new: EntryId) {
        for block in self.blocks.iter_mut() {
            if let Some((first, last)) = block.span.as_mut() {
                if *first == old {
                    *first = new;
                }
                if *last == old {
                    *last = new;
                }
            }
        }
        if let Some(b) = self.owner.remove(&old) {
            self.owner.insert(new, b);
        }
        if let Some(b) = self.label_block.remove(&old) {
            self.label_block.insert(new, b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Entry as E, Procedure};

    #[test]
    fn straight_line_has_one_real_block() {
        let mut proc = Procedure::new("f");
        let a = proc.add_symbol("a", 4);
        proc.push(E::Move(crate::ir::ThreeAddr::move_imm(a, 5)));
        let graph = FlowGraph::build(&proc);
        // start, end, and exactly one real block covering entry..exit
        assert_eq!(graph.blocks().count(), 3);
        assert!(graph.block(graph.start()).succs.contains(&BlockId(2)));
    }

}
