use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use serde::Serialize;

use mirai_compiler::frontend::ProcedureBuilder;
use mirai_compiler::ir::Program;
use mirai_compiler::{alloc, compile};

/// `--dump-ir` output shape: one entry per IR instruction, newest-build-order.
#[derive(Serialize)]
struct IrDump {
    procedure: String,
    entries: Vec<String>,
}

/// `--dump-asm` output shape: one line per linked instruction.
#[derive(Serialize)]
struct AsmDump {
    instructions: Vec<String>,
}

/// Compiles a small set of built-in demo procedures (there is no source
/// text to parse — see `frontend::ProcedureBuilder`) and writes the
/// linked image to `output`.
#[derive(ClapParser)]
#[clap(version, author)]
struct Opts {
    #[clap(short, long)]
    output: PathBuf,
    /// Which built-in demo procedure to compile.
    #[clap(short, long, default_value = "constant-fold")]
    demo: Demo,
    /// Write the procedure's IR, one entry per line, before optimization.
    #[clap(long)]
    dump_ir: bool,
    /// Write the linked instruction stream as `{tag:#06x} {imm}` lines
    /// instead of raw bytes.
    #[clap(long)]
    dump_asm: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the allocator's register file shape and exit.
    RegisterInfo,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Demo {
    ConstantFold,
    CopyProp,
    Spill,
}

fn build_demo(demo: Demo) -> Program {
    let mut program = Program::new();
    let proc = match demo {
        Demo::ConstantFold => {
            let mut b = ProcedureBuilder::new("main");
            let a = b.symbol("a", 4);
            let bb = b.symbol("b", 4);
            let c = b.symbol("c", 4);
            b.mov_imm(a, 2);
            b.mov_imm(bb, 3);
            b.add(c, a, bb);
            b.print(c);
            b.ret();
            b.build().expect("demo procedure is well formed")
        }
        Demo::CopyProp => {
            let mut b = ProcedureBuilder::new("main");
            let x = b.symbol("x", 4);
            let y = b.symbol("y", 4);
            b.mov_imm(x, 10);
            b.mov(y, x);
            b.print(y);
            b.ret();
            b.build().expect("demo procedure is well formed")
        }
        Demo::Spill => {
            let mut b = ProcedureBuilder::new("main");
            let mut locals = Vec::new();
            for i in 0..32 {
                let s = b.temp(4);
                b.mov_imm(s, i);
                locals.push(s);
            }
            let sum = b.temp(4);
            b.mov(sum, locals[0]);
            for &l in &locals[1..] {
                b.add(sum, sum, l);
            }
            b.print(sum);
            b.ret();
            b.build().expect("demo procedure is well formed")
        }
    };
    program.add_procedure(proc);
    program
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts = Opts::parse();

    if matches!(opts.command, Some(Commands::RegisterInfo)) {
        println!(
            "allocatable registers: {}, caller-saved pseudos: {}",
            alloc::MAX_REGISTERS,
            alloc::CALLER_SAVED_REGISTERS
        );
        return Ok(());
    }

    let mut program = build_demo(opts.demo);

    if opts.dump_ir {
        for procedure in &program.procedures {
            let dump = IrDump {
                procedure: procedure.name.clone(),
                entries: procedure
                    .entries()
                    .iter()
                    .map(|(id, entry)| format!("{}: {:?}", id.index(), entry))
                    .collect(),
            };
            println!("{}", serde_json::to_string_pretty(&dump).context("failed to serialize IR dump")?);
        }
    }

    let image = compile(&mut program).context("failed to compile demo program")?;

    if opts.dump_asm {
        let dump = AsmDump {
            instructions: image.code.iter().enumerate().map(|(offset, instr)| format!("{offset:#06x} {instr:?}")).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&dump).context("failed to serialize assembly dump")?);
    }

    let bytes: Vec<u8> = image
        .code
        .iter()
        .flat_map(|instr| instr.encode("main").expect("a linked image only holds already-validated instructions"))
        .collect();
    fs::write(&opts.output, &bytes).with_context(|| format!("failed to write output file: {}", opts.output.display()))?;

    println!("Successfully compiled demo program to {}", opts.output.display());
    Ok(())
}
