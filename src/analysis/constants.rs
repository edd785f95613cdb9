//! Constant-valuedness of a use, derived from use-def chains
//! (`SPEC_FULL.md` §4.D "Constants").

use crate::ir::{Entry, EntryId, Procedure, SymbolId};

use super::use_defs::UseDefs;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Int(i32),
    Str(String),
}

pub struct Constants<'a> {
    procedure: &'a Procedure,
    use_defs: &'a UseDefs,
}

impl<'a> Constants<'a> {
    pub fn build(procedure: &'a Procedure, use_defs: &'a UseDefs) -> Self {
        Constants { procedure, use_defs }
    }

    fn value(&self, entry: EntryId, symbol: SymbolId) -> Option<Value> {
        let defs = self.use_defs.defines(entry, symbol);
        if defs.is_empty() {
            return None;
        }
        let mut found: Option<Value> = None;
        for def in defs {
            let v = match self.procedure.entries().get(def)? {
                Entry::Move(t) if t.rhs1.is_none() => Value::Int(t.imm?),
                Entry::LoadString { value, .. } => Value::Str(value.clone()),
                _ => return None,
            };
            match &found {
                None => found = Some(v),
                Some(existing) if *existing == v => {}
                Some(_) => return None,
            }
        }
        found
    }

    /// The constant integer value of `symbol` at `entry`, if every
    /// reaching definition is an identical immediate `Move`.
    pub fn int_value(&self, entry: EntryId, symbol: SymbolId) -> Option<i32> {
        match self.value(entry, symbol)? {
            Value::Int(v) => Some(v),
            Value::Str(_) => None,
        }
    }

    /// The constant string value of `symbol` at `entry`, if every reaching
    /// definition is an identical `LoadString`.
    pub fn string_value(&self, entry: EntryId, symbol: SymbolId) -> Option<String> {
        match self.value(entry, symbol)? {
            Value::Str(v) => Some(v),
            Value::Int(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::reaching_defs::ReachingDefs;
    use crate::flow_graph::FlowGraph;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn agreeing_immediate_defs_are_constant() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        let y = b.temp(4);
        b.mov_imm(x, 5);
        let use_entry = b.mov(y, x);
        let proc = b.build().unwrap();

        let graph = FlowGraph::build(&proc);
        let reaching = ReachingDefs::build(&proc, &graph);
        let use_defs = UseDefs::build(&proc, &reaching);
        let constants = Constants::build(&proc, &use_defs);

        assert_eq!(constants.int_value(use_entry, x), Some(5));
    }

    #[test]
    fn disagreeing_defs_are_not_constant() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        let y = b.temp(4);
        let t = b.fresh_label();
        let f = b.fresh_label();
        let merge = b.fresh_label();
        let p = b.temp(4);
        b.mov_imm(p, 1);
        b.cjump(p, &t, &f);
        b.place_label(&t);
        b.mov_imm(x, 1);
        b.jump(&merge);
        b.place_label(&f);
        b.mov_imm(x, 2);
        b.jump(&merge);
        b.place_label(&merge);
        let use_entry = b.mov(y, x);
        b.ret();
        let proc = b.build().unwrap();

        let graph = FlowGraph::build(&proc);
        let reaching = ReachingDefs::build(&proc, &graph);
        let use_defs = UseDefs::build(&proc, &reaching);
        let constants = Constants::build(&proc, &use_defs);

        assert_eq!(constants.int_value(use_entry, x), None);
    }
}
