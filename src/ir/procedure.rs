//! A compilation unit: owns its symbols and entries (see `SPEC_FULL.md`
//! §3 "Procedure").

use super::entry::{Entry, EntryId};
use super::entry_list::EntryList;
use super::symbol::{Symbol, SymbolId};

pub struct Procedure {
    pub name: String,
    symbols: Vec<Symbol>,
    entries: EntryList,
    start_label: EntryId,
    prologue: EntryId,
    epilogue: EntryId,
    end_label: EntryId,
    temp_counter: u32,
    label_counter: u32,
}

impl Procedure {
    /// Builds the four-entry skeleton every procedure must carry: a start
    /// label, a `Prologue` as the second entry, an `Epilogue` immediately
    /// before the end label, and the end label itself (invariant 4 of
    /// `SPEC_FULL.md` §3).
    pub fn new(name: impl Into<String>) -> Self {
        let mut entries = EntryList::new();
        let start_label = entries.push_back(Entry::Label { name: "entry".to_string() });
        let prologue = entries.push_back(Entry::Prologue { slots: 0 });
        let epilogue = entries.push_back(Entry::Epilogue { slots: 0 });
        let end_label = entries.push_back(Entry::Label { name: "exit".to_string() });
        Procedure {
            name: name.into(),
            symbols: Vec::new(),
            entries,
            start_label,
            prologue,
            epilogue,
            end_label,
            temp_counter: 0,
            label_counter: 0,
        }
    }

    pub fn start_label(&self) -> EntryId {
        self.start_label
    }

    pub fn end_label(&self) -> EntryId {
        self.end_label
    }

    pub fn prologue(&self) -> EntryId {
        self.prologue
    }

    pub fn epilogue(&self) -> EntryId {
        self.epilogue
    }

    pub fn entries(&self) -> &EntryList {
        &self.entries
    }

    pub fn entries_mut(&mut self) -> &mut EntryList {
        &mut self.entries
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    pub fn symbol_ids(&self) -> impl Iterator<Item = SymbolId> {
        (0..self.symbols.len() as u32).map(SymbolId)
    }

    pub fn add_symbol(&mut self, name: impl Into<String>, size: u32) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name, size));
        id
    }

    pub fn new_temp(&mut self, size: u32) -> SymbolId {
        let name = format!("temp{}", self.temp_counter);
        self.temp_counter += 1;
        self.add_symbol(name, size)
    }

    /// Allocate a fresh label name; the caller is responsible for actually
    /// inserting an `Entry::Label` with this name into the entry list.
    pub fn new_label_name(&mut self) -> String {
        self.label_counter += 1;
        format!("bb{}", self.label_counter)
    }

    /// Insert `entry` into the body, immediately before the epilogue —
    /// the usual way to append a new instruction to a procedure under
    /// construction.
    pub fn push(&mut self, entry: Entry) -> EntryId {
        let at = self.epilogue;
        self.entries.insert_before(at, entry)
    }

    pub fn insert_before(&mut self, at: EntryId, entry: Entry) -> EntryId {
        self.entries.insert_before(at, entry)
    }

    /// Replace every symbol this procedure knows about. Used by
    /// live-range renaming, which splits the symbol set wholesale.
    pub fn set_symbols(&mut self, symbols: Vec<Symbol>) {
        self.symbols = symbols;
    }

    /// Drop the symbols at `ids` (assumed already unreferenced by any
    /// entry); used by dead-code elimination's "drop zero-assignment
    /// symbols" step. Renumbers remaining symbols and returns the old ->
    /// new id mapping so callers can rewrite entries.
    pub fn remove_symbols(&mut self, ids: &std::collections::BTreeSet<SymbolId>) -> Vec<Option<SymbolId>> {
        let mut remap = vec![None; self.symbols.len()];
        let mut kept = Vec::with_capacity(self.symbols.len());
        for (i, sym) in self.symbols.drain(..).enumerate() {
            let old = SymbolId(i as u32);
            if !ids.contains(&old) {
                let new = SymbolId(kept.len() as u32);
                remap[i] = Some(new);
                kept.push(sym);
            }
        }
        self.symbols = kept;
        remap
    }
}
