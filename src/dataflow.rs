//! A single generic driver parametric in item type, meet operator, and
//! direction (`SPEC_FULL.md` §4.C). Every analysis in `analysis/` that
//! needs a classic fixed-point solve (as opposed to the specialized
//! direct-composition approach reaching-defs uses, §4.D) goes through
//! this.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::hash::Hash;

use crate::flow_graph::{BlockId, FlowGraph};
use crate::ir::{EntryId, Procedure};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meet {
    Union,
    Intersect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub type ItemSet<T> = BTreeSet<T>;
pub type GenKill<T> = HashMap<EntryId, ItemSet<T>>;

fn transfer<T: Ord + Clone>(in_set: &ItemSet<T>, gen: &ItemSet<T>, kill: &ItemSet<T>) -> ItemSet<T> {
    let mut out: ItemSet<T> = gen.clone();
    for item in in_set {
        if !kill.contains(item) {
            out.insert(item.clone());
        }
    }
    out
}

fn meet<T: Ord + Clone>(a: &ItemSet<T>, b: &ItemSet<T>, meet_type: Meet) -> ItemSet<T> {
    match meet_type {
        Meet::Union => a.union(b).cloned().collect(),
        Meet::Intersect => a.intersection(b).cloned().collect(),
    }
}

/// Run the fixed-point solve and return, for every live entry, the
/// dataflow set holding *before* that entry executes (in the forward
/// case) or *after* it (in the backward case) — i.e. the per-entry `in`
/// set threaded by direction, exactly as `SPEC_FULL.md` §4.C step 4
/// describes.
pub fn analyze<T: Ord + Clone + Hash>(
    procedure: &Procedure,
    graph: &FlowGraph,
    gen: &GenKill<T>,
    kill: &GenKill<T>,
    all: &ItemSet<T>,
    meet_type: Meet,
    direction: Direction,
) -> HashMap<EntryId, ItemSet<T>> {
    let empty: ItemSet<T> = ItemSet::new();

    let mut gen_block: HashMap<BlockId, ItemSet<T>> = HashMap::new();
    let mut kill_block: HashMap<BlockId, ItemSet<T>> = HashMap::new();

    for block in graph.blocks() {
        let mut g: ItemSet<T> = ItemSet::new();
        let mut k: ItemSet<T> = ItemSet::new();
        let mut entry_ids = graph.entries(procedure, block);
        if direction == Direction::Backward {
            entry_ids.reverse();
        }
        for id in entry_ids {
            let e_gen = gen.get(&id).unwrap_or(&empty);
            let e_kill = kill.get(&id).unwrap_or(&empty);
            let new_g = transfer(&g, e_gen, e_kill);
            let new_k = transfer(&k, e_kill, e_gen);
            g = new_g;
            k = new_k;
        }
        gen_block.insert(block, g);
        kill_block.insert(block, k);
    }

    #[derive(Clone)]
    struct InOut<T: Ord + Clone> {
        in_set: ItemSet<T>,
        out_set: ItemSet<T>,
    }

    let mut states: HashMap<BlockId, InOut<T>> = HashMap::new();
    let mut queue: VecDeque<BlockId> = VecDeque::new();
    let mut queued: std::collections::HashSet<BlockId> = std::collections::HashSet::new();

    for block in graph.blocks() {
        let out_set = match meet_type {
            Meet::Union => ItemSet::new(),
            Meet::Intersect => all.clone(),
        };
        states.insert(block, InOut { in_set: ItemSet::new(), out_set });
        queue.push_back(block);
        queued.insert(block);
    }

    let boundary = match direction {
        Direction::Forward => graph.start(),
        Direction::Backward => graph.end(),
    };

    while let Some(block) = queue.pop_front() {
        queued.remove(&block);

        let in_set = if block == boundary {
            ItemSet::new()
        } else {
            match meet_type {
                Meet::Union => ItemSet::new(),
                Meet::Intersect => all.clone(),
            }
        };

        let neighbors: Vec<BlockId> = match direction {
            Direction::Forward => graph.block(block).preds.iter().copied().collect(),
            Direction::Backward => graph.block(block).succs.iter().copied().collect(),
        };

        let mut new_in = in_set;
        for n in &neighbors {
            let n_out = &states[n].out_set;
            new_in = meet(&new_in, n_out, meet_type);
        }
        states.get_mut(&block).unwrap().in_set = new_in.clone();

        let out = transfer(&new_in, &gen_block[&block], &kill_block[&block]);
        if out != states[&block].out_set {
            states.get_mut(&block).unwrap().out_set = out;
            let next: Vec<BlockId> = match direction {
                Direction::Forward => graph.block(block).succs.iter().copied().collect(),
                Direction::Backward => graph.block(block).preds.iter().copied().collect(),
            };
            for n in next {
                if queued.insert(n) {
                    queue.push_back(n);
                }
            }
        }
    }

    let mut result: HashMap<EntryId, ItemSet<T>> = HashMap::new();
    for block in graph.blocks() {
        let mut set = states[&block].in_set.clone();
        let mut entry_ids = graph.entries(procedure, block);
        if direction == Direction::Backward {
            entry_ids.reverse();
        }
        for id in entry_ids {
            result.insert(id, set.clone());
            let e_gen = gen.get(&id).unwrap_or(&empty);
            let e_kill = kill.get(&id).unwrap_or(&empty);
            set = transfer(&set, e_gen, e_kill);
        }
    }
    result
}
