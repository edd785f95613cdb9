//! A thin in-memory IR builder: the stand-in for a real front-end
//! (lexer/parser/type-checker/AST-to-IR lowering), all of which is out of
//! scope (`SPEC_FULL.md` §1). Tests and the CLI's demo procedures use
//! this to construct `ir::Procedure`s directly, the way the distilled
//! source's own test harnesses build IR by hand for the end-to-end
//! scenarios in §8.

use std::collections::HashMap;

use crate::ir::{Entry, EntryId, IrError, Procedure, SymbolId, ThreeAddr};

enum Pending {
    Jump(EntryId, String),
    CJump(EntryId, String, String),
}

pub struct ProcedureBuilder {
    proc: Procedure,
    labels: HashMap<String, EntryId>,
    pending: Vec<Pending>,
}

impl ProcedureBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        ProcedureBuilder { proc: Procedure::new(name), labels: HashMap::new(), pending: Vec::new() }
    }

    pub fn symbol(&mut self, name: impl Into<String>, size: u32) -> SymbolId {
        self.proc.add_symbol(name, size)
    }

    pub fn temp(&mut self, size: u32) -> SymbolId {
        self.proc.new_temp(size)
    }

    pub fn fresh_label(&mut self) -> String {
        self.proc.new_label_name()
    }

    /// Insert `Label { name }` at the current position. The name may be
    /// referenced by `jump`/`cjump` calls made before *or* after this one.
    pub fn place_label(&mut self, name: impl Into<String>) -> EntryId {
        let name = name.into();
        let id = self.proc.push(Entry::Label { name: name.clone() });
        self.labels.insert(name, id);
        id
    }

    fn push(&mut self, entry: Entry) -> EntryId {
        self.proc.push(entry)
    }

    pub fn mov(&mut self, lhs: SymbolId, rhs: SymbolId) -> EntryId {
        self.push(Entry::Move(ThreeAddr::move_sym(lhs, rhs)))
    }

    pub fn mov_imm(&mut self, lhs: SymbolId, imm: i32) -> EntryId {
        self.push(Entry::Move(ThreeAddr::move_imm(lhs, imm)))
    }

    pub fn add(&mut self, lhs: SymbolId, rhs1: SymbolId, rhs2: SymbolId) -> EntryId {
        self.push(Entry::Add(ThreeAddr::binary(lhs, rhs1, rhs2)))
    }

    pub fn add_imm(&mut self, lhs: SymbolId, rhs1: SymbolId, imm: i32) -> EntryId {
        self.push(Entry::Add(ThreeAddr::with_imm(lhs, rhs1, imm)))
    }

    pub fn subtract(&mut self, lhs: SymbolId, rhs1: SymbolId, rhs2: SymbolId) -> EntryId {
        self.push(Entry::Subtract(ThreeAddr::binary(lhs, rhs1, rhs2)))
    }

    pub fn mult(&mut self, lhs: SymbolId, rhs1: SymbolId, rhs2: SymbolId) -> EntryId {
        self.push(Entry::Mult(ThreeAddr::binary(lhs, rhs1, rhs2)))
    }

    pub fn mult_imm(&mut self, lhs: SymbolId, rhs1: SymbolId, imm: i32) -> EntryId {
        self.push(Entry::Mult(ThreeAddr::with_imm(lhs, rhs1, imm)))
    }

    pub fn equal(&mut self, lhs: SymbolId, rhs1: SymbolId, rhs2: SymbolId) -> EntryId {
        self.push(Entry::Equal(ThreeAddr::binary(lhs, rhs1, rhs2)))
    }

    pub fn less_than(&mut self, lhs: SymbolId, rhs1: SymbolId, rhs2: SymbolId) -> EntryId {
        self.push(Entry::LessThan(ThreeAddr::binary(lhs, rhs1, rhs2)))
    }

    pub fn load_mem(&mut self, lhs: SymbolId, base: SymbolId, index: Option<SymbolId>, offset: i32) -> EntryId {
        self.push(Entry::LoadMem { lhs, base, index, offset })
    }

    pub fn store_mem(&mut self, base: SymbolId, index: Option<SymbolId>, offset: i32, rhs: SymbolId) -> EntryId {
        self.push(Entry::StoreMem { base, index, offset, rhs })
    }

    pub fn load_string(&mut self, lhs: SymbolId, value: impl Into<String>) -> EntryId {
        self.push(Entry::LoadString { lhs, value: value.into() })
    }

    pub fn store_arg(&mut self, slot: u32, rhs: SymbolId) -> EntryId {
        self.push(Entry::StoreArg { slot, rhs })
    }

    pub fn call(&mut self, lhs: Option<SymbolId>, name: impl Into<String>) -> EntryId {
        self.push(Entry::Call { lhs, name: name.into() })
    }

    /// `print x` lowers to the calling convention: stash the argument in
    /// slot 0, then call the well-known runtime `print` procedure.
    pub fn print(&mut self, value: SymbolId) -> EntryId {
        self.store_arg(0, value);
        self.call(None, "print")
    }

    pub fn jump(&mut self, target_label: impl Into<String>) -> EntryId {
        let id = self.push(Entry::Jump { target: EntryId::default() });
        self.pending.push(Pending::Jump(id, target_label.into()));
        id
    }

    pub fn cjump(
        &mut self,
        pred: SymbolId,
        true_label: impl Into<String>,
        false_label: impl Into<String>,
    ) -> EntryId {
        let id = self.push(Entry::CJump {
            pred,
            true_target: EntryId::default(),
            false_target: EntryId::default(),
        });
        self.pending.push(Pending::CJump(id, true_label.into(), false_label.into()));
        id
    }

    pub fn ret(&mut self) -> EntryId {
        self.push(Entry::Return)
    }

    /// Resolve every forward/backward label reference and return the
    /// finished procedure. Fails with `IrError::DanglingJumpTarget` if a
    /// referenced label was never placed.
    pub fn build(mut self) -> Result<Procedure, IrError> {
        for p in &self.pending {
            match p {
                Pending::Jump(id, name) => {
                    let target = *self
                        .labels
                        .get(name)
                        .ok_or_else(|| IrError::DanglingJumpTarget { procedure: self.proc.name.clone() })?;
                    if let Some(Entry::Jump { target: t }) = self.proc.entries_mut().get_mut(*id) {
                        *t = target;
                    }
                }
                Pending::CJump(id, true_name, false_name) => {
                    let t = *self
                        .labels
                        .get(true_name)
                        .ok_or_else(|| IrError::DanglingJumpTarget { procedure: self.proc.name.clone() })?;
                    let f = *self
                        .labels
                        .get(false_name)
                        .ok_or_else(|| IrError::DanglingJumpTarget { procedure: self.proc.name.clone() })?;
                    if let Some(Entry::CJump { true_target, false_target, .. }) =
                        self.proc.entries_mut().get_mut(*id)
                    {
                        *true_target = t;
                        *false_target = f;
                    }
                }
            }
        }
        Ok(self.proc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow_graph::FlowGraph;

    #[test]
    fn straight_line_builds() {
        let mut b = ProcedureBuilder::new("f");
        let a = b.symbol("a", 4);
        let bb = b.symbol("b", 4);
        let c = b.symbol("c", 4);
        b.mov_imm(a, 2);
        b.mov_imm(bb, 3);
        b.add(c, a, bb);
        b.print(c);
        let proc = b.build().expect("builds");
        assert!(crate::ir::verify_procedure(&proc).is_ok());
    }

    #[test]
    fn forward_jump_resolves() {
        let mut b = ProcedureBuilder::new("f");
        let p = b.symbol("p", 4);
        b.mov_imm(p, 1);
        b.cjump(p, "t", "f");
        b.place_label("t");
        b.jump("done");
        b.place_label("f");
        b.jump("done");
        b.place_label("done");
        b.ret();
        let proc = b.build().expect("builds");
        assert!(crate::ir::verify_procedure(&proc).is_ok());
        let graph = FlowGraph::build(&proc);
        assert!(graph.blocks().count() > 3);
    }
}
