//! IR-to-IR optimizing transforms, each `fn(&mut Procedure, &mut Analysis)
//! -> bool` reporting whether it changed anything.

pub mod constant_prop;
pub mod copy_prop;
pub mod cse;
pub mod dead_code_elim;
pub mod licm;
pub mod live_range_renaming;
pub mod thread_jumps;

use crate::analysis::Analysis;
use crate::ir::Procedure;

/// Every transform the optimizer driver can schedule, named the way the
/// driver's dependency graph refers to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformKind {
    CopyProp,
    ConstantProp,
    DeadCodeElimination,
    ThreadJumps,
    LoopInvariantCodeMotion,
    CommonSubexpressionElimination,
}

impl TransformKind {
    pub fn name(self) -> &'static str {
        match self {
            TransformKind::CopyProp => "CopyProp",
            TransformKind::ConstantProp => "ConstantProp",
            TransformKind::DeadCodeElimination => "DeadCodeElimination",
            TransformKind::ThreadJumps => "ThreadJumps",
            TransformKind::LoopInvariantCodeMotion => "LoopInvariantCodeMotion",
            TransformKind::CommonSubexpressionElimination => "CommonSubexpressionElimination",
        }
    }

    pub fn run(self, procedure: &mut Procedure, analysis: &mut Analysis) -> bool {
        match self {
            TransformKind::CopyProp => copy_prop::transform(procedure, analysis),
            TransformKind::ConstantProp => constant_prop::transform(procedure, analysis),
            TransformKind::DeadCodeElimination => dead_code_elim::transform(procedure, analysis),
            TransformKind::ThreadJumps => thread_jumps::transform(procedure, analysis),
            TransformKind::LoopInvariantCodeMotion => licm::transform(procedure, analysis),
            TransformKind::CommonSubexpressionElimination => cse::transform(procedure, analysis),
        }
    }

    /// Transforms to re-enqueue when this one reports a change
    /// (`SPEC_FULL.md` §4.F's dependency graph).
    pub fn dependents(self) -> &'static [TransformKind] {
        match self {
            TransformKind::CopyProp => &[TransformKind::DeadCodeElimination],
            TransformKind::ConstantProp => &[TransformKind::DeadCodeElimination],
            TransformKind::DeadCodeElimination => {
                &[TransformKind::ConstantProp, TransformKind::CopyProp]
            }
            TransformKind::CommonSubexpressionElimination => &[TransformKind::CopyProp],
            TransformKind::ThreadJumps | TransformKind::LoopInvariantCodeMotion => &[],
        }
    }
}
