//! Whole-pipeline scenarios, each built by hand through `frontend`
//! (there is no text-based front end to parse a source string), run
//! through `optimizer::optimize` and `alloc::allocate`, asserting on the
//! resulting IR/allocation shape the way the teacher's integration test
//! asserts on resulting bytes.

use mirai_compiler::analysis::Analysis;
use mirai_compiler::codegen::{generate_object, Instruction, OneAddrOp, TwoAddrOp};
use mirai_compiler::frontend::ProcedureBuilder;
use mirai_compiler::ir::{verify_procedure, Entry};
use mirai_compiler::link::link;
use mirai_compiler::{alloc, optimizer};

#[test]
fn constant_folding_collapses_to_a_single_print() {
    let mut b = ProcedureBuilder::new("main");
    let a = b.symbol("a", 4);
    let bb = b.symbol("b", 4);
    let c = b.symbol("c", 4);
    b.mov_imm(a, 2);
    b.mov_imm(bb, 3);
    b.add(c, a, bb);
    b.print(c);
    b.ret();
    let mut proc = b.build().unwrap();
    let mut analysis = Analysis::new();

    optimizer::optimize(&mut proc, &mut analysis);
    verify_procedure(&proc).unwrap();

    let stores: Vec<_> = proc.entries().iter().filter(|(_, e)| matches!(e, Entry::StoreArg { .. })).collect();
    assert_eq!(stores.len(), 1);
    let arg_symbol = match stores[0].1 {
        Entry::StoreArg { rhs, .. } => *rhs,
        _ => unreachable!(),
    };
    let value = analysis.int_value(&proc, stores[0].0, arg_symbol);
    assert_eq!(value, Some(5));

    let registers = alloc::allocate(&mut proc).unwrap();
    assert_eq!(registers.values().collect::<std::collections::HashSet<_>>().len(), 1);

    let object = generate_object(&proc, &registers).unwrap();
    let image = link(vec![object]).unwrap();
    assert!(image.code.iter().any(|i| matches!(i, Instruction::OneAddr { op: OneAddrOp::Call, .. })));
}

#[test]
fn copy_propagation_eliminates_the_move() {
    let mut b = ProcedureBuilder::new("main");
    let a = b.symbol("a", 4);
    let bb = b.symbol("b", 4);
    b.mov_imm(a, 7);
    b.mov(bb, a);
    b.print(bb);
    b.ret();
    let mut proc = b.build().unwrap();
    let mut analysis = Analysis::new();

    optimizer::optimize(&mut proc, &mut analysis);
    verify_procedure(&proc).unwrap();

    let store = proc.entries().iter().find(|(_, e)| matches!(e, Entry::StoreArg { .. })).unwrap();
    let rhs = match store.1 {
        Entry::StoreArg { rhs, .. } => *rhs,
        _ => unreachable!(),
    };
    assert_eq!(analysis.int_value(&proc, store.0, rhs), Some(7));
}

#[test]
fn dead_block_is_removed_when_the_branch_is_constant() {
    let mut b = ProcedureBuilder::new("main");
    let pred = b.symbol("pred", 4);
    let v1 = b.symbol("v1", 4);
    let v2 = b.symbol("v2", 4);
    b.mov_imm(pred, 1);
    b.cjump(pred, "t", "f");
    b.place_label("t");
    b.mov_imm(v1, 1);
    b.print(v1);
    b.jump("done");
    b.place_label("f");
    b.mov_imm(v2, 2);
    b.print(v2);
    b.jump("done");
    b.place_label("done");
    b.ret();
    let mut proc = b.build().unwrap();
    let mut analysis = Analysis::new();

    optimizer::optimize(&mut proc, &mut analysis);
    verify_procedure(&proc).unwrap();

    let has_else_label = proc.entries().iter().any(|(_, e)| matches!(e, Entry::Label { name } if name == "f"));
    assert!(!has_else_label, "the else-block's label should have no predecessors left and be deleted");

    let prints_two = proc
        .entries()
        .iter()
        .any(|(_, e)| matches!(e, Entry::Move(t) if t.lhs == v2 && t.imm == Some(2)));
    assert!(!prints_two, "only the true arm's print should survive");
}

#[test]
fn jump_chain_threads_directly_to_its_final_target() {
    let mut b = ProcedureBuilder::new("main");
    let pred = b.symbol("pred", 4);
    b.mov_imm(pred, 1);
    b.cjump(pred, "l1", "end");
    b.place_label("l1");
    b.jump("l2");
    b.place_label("l2");
    b.jump("l3");
    b.place_label("l3");
    b.ret();
    b.place_label("end");
    b.ret();
    let mut proc = b.build().unwrap();
    let mut analysis = Analysis::new();

    optimizer::optimize(&mut proc, &mut analysis);
    verify_procedure(&proc).unwrap();

    let still_has_l1 = proc.entries().iter().any(|(_, e)| matches!(e, Entry::Label { name } if name == "l1"));
    let still_has_l2 = proc.entries().iter().any(|(_, e)| matches!(e, Entry::Label { name } if name == "l2"));
    assert!(!still_has_l1 && !still_has_l2, "l1 and l2 should be dead once the branch threads past them");
}

#[test]
fn spilling_under_register_pressure_still_reaches_a_valid_coloring() {
    let mut b = ProcedureBuilder::new("main");
    let live_count = alloc::MAX_REGISTERS + 2;
    let mut vars = Vec::new();
    for k in 0..live_count {
        let s = b.symbol(format!("v{k}"), 4);
        b.mov_imm(s, k as i32);
        vars.push(s);
    }
    let i = b.symbol("i", 4);
    let limit = b.symbol("limit", 4);
    let sum = b.symbol("sum", 4);
    b.mov_imm(i, 0);
    b.mov_imm(limit, 10);
    b.mov(sum, vars[0]);
    b.place_label("loop");
    let cond = b.temp(4);
    b.less_than(cond, i, limit);
    b.cjump(cond, "body", "end");
    b.place_label("body");
    for &v in &vars[1..] {
        b.add(sum, sum, v);
    }
    b.add_imm(i, i, 1);
    b.jump("loop");
    b.place_label("end");
    b.print(sum);
    b.ret();
    let mut proc = b.build().unwrap();
    let mut analysis = Analysis::new();
    optimizer::optimize(&mut proc, &mut analysis);

    let registers = alloc::allocate(&mut proc).unwrap();
    let used: std::collections::HashSet<_> = registers.values().copied().collect();
    assert!(used.len() <= alloc::MAX_REGISTERS);

    let slots = match proc.entries().get(proc.prologue()) {
        Some(Entry::Prologue { slots }) => *slots,
        _ => panic!("prologue entry missing"),
    };
    assert!(slots >= 1, "register pressure this far over the register file should force at least one spill");
}

#[test]
fn invariant_computation_inside_a_loop_is_hoisted_and_computed_once() {
    let mut b = ProcedureBuilder::new("main");
    let x = b.symbol("x", 4);
    let y = b.symbol("y", 4);
    let i = b.symbol("i", 4);
    let n = b.symbol("n", 4);
    let arr = b.symbol("arr", 4);
    b.mov_imm(x, 3);
    b.mov_imm(y, 4);
    b.mov_imm(i, 0);
    b.mov_imm(n, 10);
    b.place_label("loop");
    let cond = b.temp(4);
    b.less_than(cond, i, n);
    b.cjump(cond, "body", "end");
    b.place_label("body");
    let t1 = b.temp(4);
    b.mult(t1, x, y);
    let t2 = b.temp(4);
    b.add_imm(t2, t1, 1);
    b.store_mem(arr, Some(i), 0, t2);
    b.add_imm(i, i, 1);
    b.jump("loop");
    b.place_label("end");
    b.ret();
    let mut proc = b.build().unwrap();
    let mut analysis = Analysis::new();

    optimizer::optimize(&mut proc, &mut analysis);
    verify_procedure(&proc).unwrap();

    let mult_count = proc.entries().iter().filter(|(_, e)| matches!(e, Entry::Mult(_))).count();
    assert_eq!(mult_count, 1, "x*y is computed exactly once regardless of how many iterations run");

    let graph = analysis.flow_graph(&proc);
    let mult_entry = proc.entries().iter().find(|(_, e)| matches!(e, Entry::Mult(_))).unwrap().0;
    let mult_block = graph.block_of(mult_entry).unwrap();
    let body_label = proc.entries().iter().find(|(_, e)| matches!(e, Entry::Label { name } if name == "body")).map(|(id, _)| id);
    if let Some(body_label) = body_label {
        let body_block = graph.block_of(body_label).unwrap();
        assert_ne!(mult_block, body_block, "the invariant multiply should have left the loop body");
    }
}

#[test]
fn two_address_and_one_address_instructions_round_trip_through_linking() {
    let mut b = ProcedureBuilder::new("helper");
    let x = b.symbol("x", 4);
    b.mov_imm(x, 41);
    b.ret();
    let mut proc = b.build().unwrap();
    let registers = alloc::allocate(&mut proc).unwrap();
    let object = generate_object(&proc, &registers).unwrap();
    assert!(object.code.iter().any(|i| matches!(i, Instruction::TwoAddr { op: TwoAddrOp::MoveImm, .. })));

    let image = link(vec![object]).unwrap();
    for instr in &image.code {
        assert!(instr.encode("helper").is_ok());
    }
}
