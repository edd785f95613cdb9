//! Concatenates a set of [`crate::codegen::Object`]s into one runnable
//! [`Image`], patching every relocation against the merged symbol table
//! (`SPEC_FULL.md` §6 "Linkable object format").
//!
//! Grounded directly on `original_source/Compiler/Back/Linker.cpp`: lay
//! objects out one after another, rebase each one's locally-defined
//! symbols by the running offset, then for every relocation look the
//! target up in the merged table and patch the instruction's immediate
//! field in place — `Absolute` relocations get the resolved value
//! itself, `Call`/`PcRelative` ones get `resolved - this_offset`.

mod errors;

pub use errors::LinkError;

use std::collections::HashMap;

use crate::codegen::{Instruction, Object, RelocationKind};

/// A merged, fully relocated program ready to hand to a target runtime:
/// one flat instruction stream, one flat string pool, and the offset each
/// input procedure's entry point landed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub code: Vec<Instruction>,
    pub strings: Vec<String>,
    pub entry_points: HashMap<String, u32>,
}

const STRING_SYMBOL_PREFIX: &str = ".str.";

pub fn link(objects: Vec<Object>) -> Result<Image, LinkError> {
    let mut code: Vec<Instruction> = Vec::new();
    let mut strings: Vec<String> = Vec::new();
    let mut symbols: HashMap<String, u32> = HashMap::new();
    let mut code_base: Vec<u32> = Vec::with_capacity(objects.len());

    for object in &objects {
        let this_code_base = code.len() as u32;
        let this_string_base = strings.len() as u32;
        code_base.push(this_code_base);

        for (name, &local_value) in &object.local_symbols {
            let resolved = if name.starts_with(STRING_SYMBOL_PREFIX) {
                this_string_base + local_value
            } else {
                this_code_base + local_value
            };
            symbols.insert(name.clone(), resolved);
        }

        code.extend(object.code.iter().copied());
        strings.extend(object.strings.iter().cloned());
    }

    for (i, object) in objects.iter().enumerate() {
        let base = code_base[i];
        for reloc in &object.relocations {
            let resolved = symbols.get(&reloc.target).copied().ok_or_else(|| LinkError::UndefinedSymbol {
                name: reloc.target.clone(),
                referencing_object: object.name.clone(),
            })?;
            let this_offset = base + reloc.offset;
            let patched_imm = match reloc.kind {
                RelocationKind::Absolute => resolved as i32,
                RelocationKind::Call | RelocationKind::PcRelative => resolved as i32 - this_offset as i32,
            };
            code[this_offset as usize] = patch_imm(code[this_offset as usize], patched_imm);
        }
    }

    let entry_points = objects.iter().zip(code_base.iter()).map(|(o, &base)| (o.name.clone(), base)).collect();

    Ok(Image { code, strings, entry_points })
}

fn patch_imm(instr: Instruction, imm: i32) -> Instruction {
    match instr {
        Instruction::TwoAddr { op, reg_lhs, reg_rhs, .. } => Instruction::TwoAddr { op, reg_lhs, reg_rhs, imm },
        Instruction::ThreeAddr { op, reg_lhs, reg_rhs1, reg_rhs2, .. } => {
            Instruction::ThreeAddr { op, reg_lhs, reg_rhs1, reg_rhs2, imm }
        }
        Instruction::OneAddr { op, reg, .. } => Instruction::OneAddr { op, reg, imm },
        Instruction::MultiReg { .. } => instr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc;
    use crate::codegen::generate_object;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn undefined_call_target_is_rejected() {
        let mut b = ProcedureBuilder::new("f");
        b.call(None, "does_not_exist");
        b.ret();
        let mut proc = b.build().unwrap();
        let registers = alloc::allocate(&mut proc).unwrap();
        let object = generate_object(&proc, &registers).unwrap();

        let err = link(vec![object]).unwrap_err();
        assert_eq!(err, LinkError::UndefinedSymbol { name: "does_not_exist".to_string(), referencing_object: "f".to_string() });
    }

    #[test]
    fn two_procedures_link_and_resolve_the_call_between_them() {
        let mut caller = ProcedureBuilder::new("main");
        caller.call(None, "callee");
        caller.ret();
        let mut caller_proc = caller.build().unwrap();
        let caller_registers = alloc::allocate(&mut caller_proc).unwrap();
        let caller_object = generate_object(&caller_proc, &caller_registers).unwrap();

        let mut callee = ProcedureBuilder::new("callee");
        callee.ret();
        let mut callee_proc = callee.build().unwrap();
        let callee_registers = alloc::allocate(&mut callee_proc).unwrap();
        let callee_object = generate_object(&callee_proc, &callee_registers).unwrap();

        let image = link(vec![caller_object, callee_object]).unwrap();
        assert_eq!(image.entry_points["main"], 0);
        assert!(image.entry_points["callee"] > 0);
    }
}
