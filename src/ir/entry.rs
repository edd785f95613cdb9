//! The IR instruction: a single tagged variant with a fixed query surface,
//! rather than a struct hierarchy (see `SPEC_FULL.md` §9 / design note
//! "Heterogeneous entries with shared queries").

use super::symbol::SymbolId;

/// A stable handle into a [`Procedure`](super::procedure::Procedure)'s
/// entry arena. Never reused within one procedure's lifetime, even after
/// the entry it names has been erased, so stale handles held by an
/// un-invalidated analysis cache can never silently alias a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(crate) u32);

impl EntryId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for EntryId {
    /// Only meaningful as a placeholder immediately overwritten before
    /// any lookup can observe it (see `frontend::ProcedureBuilder`'s
    /// forward-label patching); never a valid handle on its own.
    fn default() -> Self {
        EntryId(u32::MAX)
    }
}

/// The common `lhs := rhs1 op rhs2` shape shared by every arithmetic,
/// logical, and comparison entry, plus `Move`. `rhs2` and `imm` are
/// mutually exclusive: when `rhs2` is `None`, `imm` (if present) stands in
/// for it. `Move` never has both `rhs1` and `imm` set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreeAddr {
    pub lhs: SymbolId,
    pub rhs1: Option<SymbolId>,
    pub rhs2: Option<SymbolId>,
    pub imm: Option<i32>,
}

impl ThreeAddr {
    pub fn binary(lhs: SymbolId, rhs1: SymbolId, rhs2: SymbolId) -> Self {
        ThreeAddr { lhs, rhs1: Some(rhs1), rhs2: Some(rhs2), imm: None }
    }

    pub fn with_imm(lhs: SymbolId, rhs1: SymbolId, imm: i32) -> Self {
        ThreeAddr { lhs, rhs1: Some(rhs1), rhs2: None, imm: Some(imm) }
    }

    pub fn move_sym(lhs: SymbolId, rhs1: SymbolId) -> Self {
        ThreeAddr { lhs, rhs1: Some(rhs1), rhs2: None, imm: None }
    }

    pub fn move_imm(lhs: SymbolId, imm: i32) -> Self {
        ThreeAddr { lhs, rhs1: None, rhs2: None, imm: Some(imm) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Move(ThreeAddr),
    Add(ThreeAddr),
    Subtract(ThreeAddr),
    Mult(ThreeAddr),
    Divide(ThreeAddr),
    Modulo(ThreeAddr),
    Equal(ThreeAddr),
    Nequal(ThreeAddr),
    LessThan(ThreeAddr),
    LessThanE(ThreeAddr),
    GreaterThan(ThreeAddr),
    GreaterThanE(ThreeAddr),
    And(ThreeAddr),
    Or(ThreeAddr),

    LoadMem { lhs: SymbolId, base: SymbolId, index: Option<SymbolId>, offset: i32 },
    StoreMem { base: SymbolId, index: Option<SymbolId>, offset: i32, rhs: SymbolId },
    LoadStack { lhs: SymbolId, slot: u32 },
    StoreStack { slot: u32, rhs: SymbolId },
    LoadString { lhs: SymbolId, value: String },
    /// `lhs := rhs1 ++ rhs2`, string concatenation of two string-valued
    /// symbols. Folded by constant propagation when both sides trace back
    /// to a `LoadString`.
    StringConcat { lhs: SymbolId, rhs1: SymbolId, rhs2: SymbolId },
    /// `lhs := str(rhs1)` with an integer-valued operand.
    StringInt { lhs: SymbolId, rhs1: SymbolId },
    /// `lhs := str(rhs1)` with a boolean-valued operand (`"true"`/`"false"`).
    StringBool { lhs: SymbolId, rhs1: SymbolId },
    New { lhs: SymbolId, size: SymbolId },
    LoadAddress { lhs: SymbolId, symbol: SymbolId },
    FunctionAddr { lhs: SymbolId, name: String },

    Call { lhs: Option<SymbolId>, name: String },
    CallIndirect { lhs: Option<SymbolId>, target: SymbolId },
    LoadArg { lhs: SymbolId, slot: u32 },
    StoreArg { slot: u32, rhs: SymbolId },
    LoadRet { lhs: SymbolId },
    StoreRet { rhs: SymbolId },
    Prologue { slots: u32 },
    Epilogue { slots: u32 },

    Label { name: String },
    Jump { target: EntryId },
    CJump { pred: SymbolId, true_target: EntryId, false_target: EntryId },
    Return,
    /// Only ever produced by an SSA-construction pass; no pass in this
    /// crate produces one, but the variant exists so the query surface
    /// (and a future SSA pass) has somewhere to put it.
    Phi { lhs: SymbolId, args: Vec<SymbolId> },
}

impl Entry {
    /// Is this entry an arithmetic/compare/logic expression (as opposed to
    /// a memory, control, or calling-convention entry)? Used by
    /// available-expressions and CSE.
    pub fn is_pure_expression(&self) -> bool {
        matches!(
            self,
            Entry::Add(_)
                | Entry::Subtract(_)
                | Entry::Mult(_)
                | Entry::Divide(_)
                | Entry::Modulo(_)
                | Entry::Equal(_)
                | Entry::Nequal(_)
                | Entry::LessThan(_)
                | Entry::LessThanE(_)
                | Entry::GreaterThan(_)
                | Entry::GreaterThanE(_)
                | Entry::And(_)
                | Entry::Or(_)
                | Entry::LoadMem { .. }
        )
    }

    pub fn is_commutative(&self) -> bool {
        matches!(self, Entry::Add(_) | Entry::Mult(_))
    }

    /// The symbol this entry writes, if any.
    pub fn assign(&self) -> Option<SymbolId> {
        use Entry::*;
        match self {
            Move(t) | Add(t) | Subtract(t) | Mult(t) | Divide(t) | Modulo(t) | Equal(t)
            | Nequal(t) | LessThan(t) | LessThanE(t) | GreaterThan(t) | GreaterThanE(t)
            | And(t) | Or(t) => Some(t.lhs),
            LoadMem { lhs, .. } => Some(*lhs),
            StoreMem { .. } => None,
            LoadStack { lhs, .. } => Some(*lhs),
            StoreStack { .. } => None,
            LoadString { lhs, .. } => Some(*lhs),
            StringConcat { lhs, .. } => Some(*lhs),
            StringInt { lhs, .. } => Some(*lhs),
            StringBool { lhs, .. } => Some(*lhs),
            New { lhs, .. } => Some(*lhs),
            LoadAddress { lhs, .. } => Some(*lhs),
            FunctionAddr { lhs, .. } => Some(*lhs),
            Call { lhs, .. } => *lhs,
            CallIndirect { lhs, .. } => *lhs,
            LoadArg { lhs, .. } => Some(*lhs),
            StoreArg { .. } => None,
            LoadRet { lhs } => Some(*lhs),
            StoreRet { .. } => None,
            Prologue { .. } | Epilogue { .. } => None,
            Label { .. } | Jump { .. } | CJump { .. } | Return => None,
            Phi { lhs, .. } => Some(*lhs),
        }
    }

    /// Does this entry read `symbol`?
    pub fn uses(&self, symbol: SymbolId) -> bool {
        use Entry::*;
        match self {
            Move(t) | Add(t) | Subtract(t) | Mult(t) | Divide(t) | Modulo(t) | Equal(t)
            | Nequal(t) | LessThan(t) | LessThanE(t) | GreaterThan(t) | GreaterThanE(t)
            | And(t) | Or(t) => t.rhs1 == Some(symbol) || t.rhs2 == Some(symbol),
            LoadMem { base, index, .. } => *base == symbol || *index == Some(symbol),
            StoreMem { base, index, rhs, .. } => {
                *base == symbol || *index == Some(symbol) || *rhs == symbol
            }
            LoadStack { .. } => false,
            StoreStack { rhs, .. } => *rhs == symbol,
            LoadString { .. } => false,
            StringConcat { rhs1, rhs2, .. } => *rhs1 == symbol || *rhs2 == symbol,
            StringInt { rhs1, .. } | StringBool { rhs1, .. } => *rhs1 == symbol,
            New { size, .. } => *size == symbol,
            LoadAddress { symbol: target, .. } => *target == symbol,
            FunctionAddr { .. } => false,
            Call { .. } => false,
            CallIndirect { target, .. } => *target == symbol,
            LoadArg { .. } => false,
            StoreArg { rhs, .. } => *rhs == symbol,
            LoadRet { .. } => false,
            StoreRet { rhs } => *rhs == symbol,
            Prologue { .. } | Epilogue { .. } => false,
            Label { .. } | Jump { .. } | Return => false,
            CJump { pred, .. } => *pred == symbol,
            Phi { args, .. } => args.contains(&symbol),
        }
    }

    /// Every symbol this entry reads, in no particular order. Used where
    /// an analysis needs the full `gen` set rather than a membership test
    /// against one symbol (e.g. live variables), and by the structural
    /// verifier to confirm every referenced symbol is in range.
    pub fn used_symbols(&self) -> Vec<SymbolId> {
        use Entry::*;
        match self {
            Move(t) | Add(t) | Subtract(t) | Mult(t) | Divide(t) | Modulo(t) | Equal(t)
            | Nequal(t) | LessThan(t) | LessThanE(t) | GreaterThan(t) | GreaterThanE(t)
            | And(t) | Or(t) => t.rhs1.into_iter().chain(t.rhs2).collect(),
            LoadMem { base, index, .. } => {
                std::iter::once(*base).chain(*index).collect()
            }
            StoreMem { base, index, rhs, .. } => {
                std::iter::once(*base).chain(*index).chain(std::iter::once(*rhs)).collect()
            }
            StoreStack { rhs, .. } => vec![*rhs],
            StringConcat { rhs1, rhs2, .. } => vec![*rhs1, *rhs2],
            StringInt { rhs1, .. } | StringBool { rhs1, .. } => vec![*rhs1],
            New { size, .. } => vec![*size],
            LoadAddress { symbol, .. } => vec![*symbol],
            CallIndirect { target, .. } => vec![*target],
            StoreArg { rhs, .. } => vec![*rhs],
            StoreRet { rhs } => vec![*rhs],
            CJump { pred, .. } => vec![*pred],
            Phi { args, .. } => args.clone(),
            _ => Vec::new(),
        }
    }

    /// Every symbol this entry references, reads or writes. Used by the
    /// structural verifier (not by analyses, which use `assign`/`uses`
    /// separately so they can treat defs and uses differently).
    pub fn referenced_symbols(&self) -> Vec<SymbolId> {
        let mut out = self.used_symbols();
        out.extend(self.assign());
        out
    }

    /// Replace the symbol this entry assigns to, if it assigns `old`.
    pub fn replace_assign(&mut self, old: SymbolId, new: SymbolId) {
        use Entry::*;
        let lhs = match self {
            Move(t) | Add(t) | Subtract(t) | Mult(t) | Divide(t) | Modulo(t) | Equal(t)
            | Nequal(t) | LessThan(t) | LessThanE(t) | GreaterThan(t) | GreaterThanE(t)
            | And(t) | Or(t) => Some(&mut t.lhs),
            LoadMem { lhs, .. } => Some(lhs),
            LoadStack { lhs, .. } => Some(lhs),
            LoadString { lhs, .. } => Some(lhs),
            StringConcat { lhs, .. } => Some(lhs),
            StringInt { lhs, .. } => Some(lhs),
            StringBool { lhs, .. } => Some(lhs),
            New { lhs, .. } => Some(lhs),
            LoadAddress { lhs, .. } => Some(lhs),
            FunctionAddr { lhs, .. } => Some(lhs),
            Call { lhs, .. } => lhs.as_mut(),
            CallIndirect { lhs, .. } => lhs.as_mut(),
            LoadArg { lhs, .. } => Some(lhs),
            LoadRet { lhs } => Some(lhs),
            Phi { lhs, .. } => Some(lhs),
            _ => None,
        };
        if let Some(lhs) = lhs {
            if *lhs == old {
                *lhs = new;
            }
        }
    }

    /// Replace every read of `old` with `new`.
    pub fn replace_use(&mut self, old: SymbolId, new: SymbolId) {
        use Entry::*;
        let mut repl = |s: &mut SymbolId| {
            if *s == old {
                *s = new;
            }
        };
        let mut repl_opt = |s: &mut Option<SymbolId>| {
            if *s == Some(old) {
                *s = Some(new);
            }
        };
        match self {
            Move(t) | Add(t) | Subtract(t) | Mult(t) | Divide(t) | Modulo(t) | Equal(t)
            | Nequal(t) | LessThan(t) | LessThanE(t) | GreaterThan(t) | GreaterThanE(t)
            | And(t) | Or(t) => {
                repl_opt(&mut t.rhs1);
                repl_opt(&mut t.rhs2);
            }
            LoadMem { base, index, .. } => {
                repl(base);
                repl_opt(index);
            }
            StoreMem { base, index, rhs, .. } => {
                repl(base);
                repl_opt(index);
                repl(rhs);
            }
            StoreStack { rhs, .. } => repl(rhs),
            StringConcat { rhs1, rhs2, .. } => {
                repl(rhs1);
                repl(rhs2);
            }
            StringInt { rhs1, .. } | StringBool { rhs1, .. } => repl(rhs1),
            New { size, .. } => repl(size),
            LoadAddress { symbol, .. } => repl(symbol),
            CallIndirect { target, .. } => repl(target),
            StoreArg { rhs, .. } => repl(rhs),
            StoreRet { rhs } => repl(rhs),
            CJump { pred, .. } => repl(pred),
            Phi { args, .. } => {
                for a in args.iter_mut() {
                    if *a == old {
                        *a = new;
                    }
                }
            }
            _ => {}
        }
    }
}
