//! The top-level compilation unit: an ordered list of procedures plus data
//! sections and an imports/exports table (see `SPEC_FULL.md` §3
//! "Program").

use super::procedure::Procedure;

/// A string literal living outside any one procedure's entries, the way
/// `LoadString` ultimately needs a place in the linked object's string
/// table (see `SPEC_FULL.md` §6).
#[derive(Debug, Clone)]
pub struct DataSection {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct ExportsTable {
    pub exported_procedures: Vec<String>,
}

pub struct Program {
    pub procedures: Vec<Procedure>,
    pub data: Vec<DataSection>,
    pub exports: ExportsTable,
}

impl Program {
    pub fn new() -> Self {
        Program { procedures: Vec::new(), data: Vec::new(), exports: ExportsTable::default() }
    }

    pub fn add_procedure(&mut self, procedure: Procedure) -> usize {
        self.procedures.push(procedure);
        self.procedures.len() - 1
    }

    pub fn procedure_by_name(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}
