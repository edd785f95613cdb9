//! Common-subexpression elimination driven by the `AvailableExpressions`
//! analysis (`SPEC_FULL.md` §4.E "Common-subexpression elimination").

use std::collections::{HashSet, VecDeque};

use crate::analysis::Analysis;
use crate::ir::{Entry, EntryId, Procedure, SymbolId, ThreeAddr};

pub fn transform(procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
    let mut changed = false;
    let mut queue: VecDeque<EntryId> = procedure.entries().ids().collect();
    let mut queued: HashSet<EntryId> = queue.iter().copied().collect();

    while let Some(id) = queue.pop_front() {
        queued.remove(&id);
        if !procedure.entries().contains(id) {
            continue;
        }
        let entry = match procedure.entries().get(id) {
            Some(e) => e.clone(),
            None => continue,
        };
        if !entry.is_pure_expression() || entry.assign().is_none() {
            continue;
        }

        let available = analysis.available_expressions(procedure).available_at(id);
        let target = find_match(procedure, &entry, &available);
        if let Some(target) = target {
            let lhs = entry.assign().unwrap();
            let followers: Vec<EntryId> = analysis.use_defs(procedure).uses(id).into_iter().collect();

            let new_entry = Entry::Move(ThreeAddr::move_sym(lhs, target));
            let new_id = procedure.insert_before(id, new_entry);
            procedure.entries_mut().erase(id);
            analysis.replace(id, new_id);

            for f in followers {
                if procedure.entries().contains(f) && queued.insert(f) {
                    queue.push_back(f);
                }
            }
            changed = true;
        }
    }
    changed
}

/// Same rule as `Entry::is_commutative`, repeated here because CSE's
/// matching needs it on borrowed `&Entry` values already destructured by
/// variant, not on `self`.
fn is_commutative(entry: &Entry) -> bool {
    entry.is_commutative()
}

fn three_addr_of(entry: &Entry) -> Option<&ThreeAddr> {
    match entry {
        Entry::Add(t) | Entry::Subtract(t) | Entry::Mult(t) | Entry::Divide(t) | Entry::Modulo(t)
        | Entry::Equal(t) | Entry::Nequal(t) | Entry::LessThan(t) | Entry::LessThanE(t)
        | Entry::GreaterThan(t) | Entry::GreaterThanE(t) | Entry::And(t) | Entry::Or(t) => Some(t),
        _ => None,
    }
}

fn same_family(a: &Entry, b: &Entry) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Finds a prior computation in `available` whose value `entry` can reuse,
/// returning the symbol that already holds it.
fn find_match(procedure: &Procedure, entry: &Entry, available: &std::collections::BTreeSet<EntryId>) -> Option<SymbolId> {
    for &cand in available {
        let cand_entry = procedure.entries().get(cand)?;

        if let Entry::LoadMem { base, index, offset, .. } = entry {
            match cand_entry {
                Entry::LoadMem { base: cb, index: ci, offset: co, lhs } if cb == base && ci == index && co == offset => {
                    return Some(*lhs);
                }
                Entry::StoreMem { base: cb, index: ci, offset: co, rhs } if cb == base && ci == index && co == offset => {
                    return Some(*rhs);
                }
                _ => continue,
            }
        }

        if !same_family(entry, cand_entry) {
            continue;
        }
        let (t_en, t_ex) = match (three_addr_of(entry), three_addr_of(cand_entry)) {
            (Some(a), Some(b)) => (a, b),
            _ => continue,
        };
        if t_en.rhs1 == t_ex.rhs1 && t_en.rhs2 == t_ex.rhs2 && t_en.imm == t_ex.imm {
            return Some(t_ex.lhs);
        }
        if is_commutative(entry) && t_en.rhs1 == t_ex.rhs2 && t_en.rhs2 == t_ex.rhs1 && t_en.imm == t_ex.imm {
            return Some(t_ex.lhs);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn repeated_addition_is_replaced_with_a_move() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        let y = b.symbol("y", 4);
        let a = b.temp(4);
        let bb = b.temp(4);
        b.add(a, x, y);
        let second_add = b.add(bb, x, y);
        b.print(bb);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        assert!(!proc.entries().contains(second_add));
        let replaced = proc
            .entries()
            .iter()
            .find(|(_, e)| matches!(e, Entry::Move(t) if t.lhs == bb));
        assert!(matches!(replaced, Some((_, Entry::Move(t))) if t.rhs1 == Some(a)));
    }

    #[test]
    fn commutative_operand_order_still_matches() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        let y = b.symbol("y", 4);
        let a = b.temp(4);
        let bb = b.temp(4);
        b.add(a, x, y);
        let second_add = b.add(bb, y, x);
        b.print(bb);
        b.ret();
        let mut proc = b.build().unwrap();
        let mut analysis = Analysis::new();

        assert!(transform(&mut proc, &mut analysis));
        assert!(!proc.entries().contains(second_add));
    }
}
