//! Use-def / def-use chains, derived from reaching definitions
//! (`SPEC_FULL.md` §4.D "Use-def chains").

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::reaching_defs::ReachingDefs;
use crate::ir::{EntryId, Procedure, SymbolId};

pub struct UseDefs {
    /// use entry -> symbol -> defs reaching that use
    defines: HashMap<EntryId, BTreeMap<SymbolId, BTreeSet<EntryId>>>,
    /// def entry -> uses of it
    uses: HashMap<EntryId, BTreeSet<EntryId>>,
}

impl UseDefs {
    pub fn build(procedure: &Procedure, reaching: &ReachingDefs) -> Self {
        let mut defines: HashMap<EntryId, BTreeMap<SymbolId, BTreeSet<EntryId>>> = HashMap::new();
        let mut uses: HashMap<EntryId, BTreeSet<EntryId>> = HashMap::new();

        for (id, entry) in procedure.entries().iter() {
            for def_id in reaching.defs(id) {
                let def_entry = procedure.entries().get(def_id).expect("live def");
                let symbol = match def_entry.assign() {
                    Some(s) => s,
                    None => continue,
                };
                if entry.uses(symbol) {
                    defines.entry(id).or_default().entry(symbol).or_default().insert(def_id);
                    uses.entry(def_id).or_default().insert(id);
                }
            }
        }

        UseDefs { defines, uses }
    }

    /// Every entry that uses the value defined at `define`.
    pub fn uses(&self, define: EntryId) -> BTreeSet<EntryId> {
        self.uses.get(&define).cloned().unwrap_or_default()
    }

    /// Every definition of `symbol` that reaches `use_entry`.
    pub fn defines(&self, use_entry: EntryId, symbol: SymbolId) -> BTreeSet<EntryId> {
        self.defines
            .get(&use_entry)
            .and_then(|m| m.get(&symbol))
            .cloned()
            .unwrap_or_default()
    }

    /// All (use, symbol) pairs recorded for `use_entry`, i.e. every
    /// symbol `use_entry` reads together with its reaching defs.
    pub fn defines_all(&self, use_entry: EntryId) -> BTreeMap<SymbolId, BTreeSet<EntryId>> {
        self.defines.get(&use_entry).cloned().unwrap_or_default()
    }
}
