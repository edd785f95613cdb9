//! Forward/intersect dataflow over entries whose operator is a pure
//! expression (arith/compare/`And`/`Or`/`LoadMem`), plus `StoreMem` (which
//! CSE treats as making the stored value available at a subsequent
//! matching `LoadMem`) — `SPEC_FULL.md` §4.D "Available expressions".

use std::collections::{BTreeSet, HashMap};

use crate::dataflow::{self, Direction, GenKill, ItemSet, Meet};
use crate::flow_graph::FlowGraph;
use crate::ir::{Entry, EntryId, Procedure};

fn is_cse_candidate(entry: &Entry) -> bool {
    entry.is_pure_expression() || matches!(entry, Entry::StoreMem { .. })
}

pub struct AvailableExpressions {
    in_sets: HashMap<EntryId, BTreeSet<EntryId>>,
}

impl AvailableExpressions {
    pub fn build(procedure: &Procedure, graph: &FlowGraph) -> Self {
        let mut candidates: Vec<EntryId> = Vec::new();
        for (id, entry) in procedure.entries().iter() {
            if is_cse_candidate(entry) {
                candidates.push(id);
            }
        }
        let all: ItemSet<EntryId> = candidates.iter().copied().collect();

        let mut gen: GenKill<EntryId> = HashMap::new();
        let mut kill: GenKill<EntryId> = HashMap::new();

        for (id, entry) in procedure.entries().iter() {
            if is_cse_candidate(entry) {
                gen.insert(id, [id].into_iter().collect());
            }

            let mut k: BTreeSet<EntryId> = BTreeSet::new();
            if let Some(a) = entry.assign() {
                for &cand in &candidates {
                    if cand == id {
                        continue;
                    }
                    let cand_entry = procedure.entries().get(cand).expect("live");
                    if cand_entry.uses(a) || cand_entry.assign() == Some(a) {
                        k.insert(cand);
                    }
                }
            }
            if matches!(entry, Entry::StoreMem { .. }) {
                for &cand in &candidates {
                    if cand == id {
                        continue;
                    }
                    if matches!(procedure.entries().get(cand), Some(Entry::LoadMem { .. }) | Some(Entry::StoreMem { .. })) {
                        k.insert(cand);
                    }
                }
            }
            if !k.is_empty() {
                kill.insert(id, k);
            }
        }

        let in_sets = dataflow::analyze(procedure, graph, &gen, &kill, &all, Meet::Intersect, Direction::Forward);
        AvailableExpressions { in_sets }
    }

    /// Expression entries available immediately before `entry`.
    pub fn available_at(&self, entry: EntryId) -> BTreeSet<EntryId> {
        self.in_sets.get(&entry).cloned().unwrap_or_default()
    }
}
