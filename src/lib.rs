//! The optimizing middle/back-end of an ahead-of-time compiler: IR model,
//! flow graph, dataflow analyses, optimizing transforms, an optimizer
//! driver, a Chaitin-style register allocator, and a code generator +
//! linker sitting at the fixed §6 instruction/object interface
//! (`SPEC_FULL.md` §1 "Overview").
//!
//! No front-end lives here; callers hand this crate already-built
//! [`ir::Procedure`]s (by hand, via [`frontend::ProcedureBuilder`], or
//! from a real parser elsewhere) and get back a linked [`link::Image`].

pub mod alloc;
pub mod analysis;
pub mod codegen;
pub mod dataflow;
pub mod errors;
pub mod flow_graph;
pub mod frontend;
pub mod ir;
pub mod link;
pub mod optimizer;
pub mod transform;
pub mod verify;

use anyhow::Context;

use ir::Program;

/// Runs the full pipeline over every procedure in `program` — verify,
/// optimize, allocate, generate code — then links the results into one
/// image. Mirrors the assembler's own `assemble` entry point: one function
/// chaining every stage, each wrapped in its own `.context(...)` so a
/// failure names which stage and which procedure it came from.
pub fn compile(program: &mut Program) -> anyhow::Result<link::Image> {
    let mut objects = Vec::with_capacity(program.procedures.len());

    for procedure in &mut program.procedures {
        let name = procedure.name.clone();

        ir::verify_procedure(procedure)
            .with_context(|| format!("failed structural verification for procedure `{name}`"))?;

        let mut analysis = analysis::Analysis::new();
        verify::verify_liveness(procedure, &mut analysis)
            .with_context(|| format!("failed liveness verification for procedure `{name}`"))?;

        optimizer::optimize(procedure, &mut analysis);

        let registers = alloc::allocate(procedure)
            .with_context(|| format!("register allocation failed for procedure `{name}`"))?;
        tracing::info!(target: "compile", procedure = %name, registers = registers.len(), "allocated procedure");

        let object = codegen::generate_object(procedure, &registers)
            .with_context(|| format!("code generation failed for procedure `{name}`"))?;
        objects.push(object);
    }

    let image = link::link(objects).with_context(|| "failed during linking")?;
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frontend::ProcedureBuilder;
    use ir::Program;

    #[test]
    fn compiles_a_single_procedure_straight_through() {
        let mut b = ProcedureBuilder::new("main");
        let x = b.symbol("x", 4);
        b.mov_imm(x, 2);
        b.print(x);
        b.ret();
        let proc = b.build().unwrap();

        let mut program = Program::new();
        program.add_procedure(proc);

        let image = compile(&mut program).unwrap();
        assert!(!image.code.is_empty());
        assert_eq!(image.entry_points["main"], 0);
    }

    #[test]
    fn undefined_call_target_surfaces_as_an_error() {
        let mut b = ProcedureBuilder::new("main");
        b.call(None, "nonexistent");
        b.ret();
        let proc = b.build().unwrap();

        let mut program = Program::new();
        program.add_procedure(proc);

        assert!(compile(&mut program).is_err());
    }
}
