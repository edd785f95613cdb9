//! Every dataflow/structural analysis a procedure may need, unified behind
//! one lazily-built, cached façade (`SPEC_FULL.md` §4.D).

pub mod available_expressions;
pub mod constants;
pub mod dominance;
pub mod dominance_frontiers;
pub mod interference_graph;
pub mod live_variables;
pub mod loops;
pub mod reaching_defs;
pub mod use_defs;

mod errors;

pub use available_expressions::AvailableExpressions;
pub use constants::Constants;
pub use dominance::DominatorTree;
pub use dominance_frontiers::DominanceFrontiers;
pub use errors::AnalysisError;
pub use interference_graph::InterferenceGraph;
pub use live_variables::LiveVariables;
pub use loops::{LoopId, Loops};
pub use reaching_defs::ReachingDefs;
pub use use_defs::UseDefs;

use crate::flow_graph::FlowGraph;
use crate::ir::{EntryId, Procedure, SymbolId};

/// Lazily-built, cached collection of every analysis over one procedure.
///
/// Edit hooks (`replace`/`replace_use`/`remove`/`invalidate`) do not patch
/// cached analyses incrementally; they drop whichever ones can no longer be
/// vouched for and let the next accessor rebuild from scratch (see
/// `DESIGN.md`'s "Analysis façade edit-propagation" entry for why this
/// trades the spec's O(degree) bound for O(procedure) deliberately).
#[derive(Default)]
pub struct Analysis {
    flow_graph: Option<FlowGraph>,
    reaching_defs: Option<ReachingDefs>,
    use_defs: Option<UseDefs>,
    live_variables: Option<LiveVariables>,
    available_expressions: Option<AvailableExpressions>,
    dominator_tree: Option<DominatorTree>,
    dominance_frontiers: Option<DominanceFrontiers>,
    loops: Option<Loops>,
    interference_graph: Option<InterferenceGraph>,
}

impl Analysis {
    pub fn new() -> Self {
        Analysis::default()
    }

    pub fn flow_graph(&mut self, procedure: &Procedure) -> &FlowGraph {
        if self.flow_graph.is_none() {
            self.flow_graph = Some(FlowGraph::build(procedure));
        }
        self.flow_graph.as_ref().unwrap()
    }

    pub fn reaching_defs(&mut self, procedure: &Procedure) -> &ReachingDefs {
        self.flow_graph(procedure);
        if self.reaching_defs.is_none() {
            let built = {
                let graph = self.flow_graph.as_ref().unwrap();
                ReachingDefs::build(procedure, graph)
            };
            self.reaching_defs = Some(built);
        }
        self.reaching_defs.as_ref().unwrap()
    }

    pub fn use_defs(&mut self, procedure: &Procedure) -> &UseDefs {
        self.reaching_defs(procedure);
        if self.use_defs.is_none() {
            let built = UseDefs::build(procedure, self.reaching_defs.as_ref().unwrap());
            self.use_defs = Some(built);
        }
        self.use_defs.as_ref().unwrap()
    }

    pub fn live_variables(&mut self, procedure: &Procedure) -> &LiveVariables {
        self.flow_graph(procedure);
        if self.live_variables.is_none() {
            let built = {
                let graph = self.flow_graph.as_ref().unwrap();
                LiveVariables::build(procedure, graph)
            };
            self.live_variables = Some(built);
        }
        self.live_variables.as_ref().unwrap()
    }

    pub fn available_expressions(&mut self, procedure: &Procedure) -> &AvailableExpressions {
        self.flow_graph(procedure);
        if self.available_expressions.is_none() {
            let built = {
                let graph = self.flow_graph.as_ref().unwrap();
                AvailableExpressions::build(procedure, graph)
            };
            self.available_expressions = Some(built);
        }
        self.available_expressions.as_ref().unwrap()
    }

    pub fn dominator_tree(&mut self, procedure: &Procedure) -> &DominatorTree {
        self.flow_graph(procedure);
        if self.dominator_tree.is_none() {
            let built = {
                let graph = self.flow_graph.as_ref().unwrap();
                DominatorTree::build(graph)
            };
            self.dominator_tree = Some(built);
        }
        self.dominator_tree.as_ref().unwrap()
    }

    pub fn dominance_frontiers(&mut self, procedure: &Procedure) -> &DominanceFrontiers {
        self.dominator_tree(procedure);
        if self.dominance_frontiers.is_none() {
            let built = {
                let graph = self.flow_graph.as_ref().unwrap();
                let dom = self.dominator_tree.as_ref().unwrap();
                DominanceFrontiers::build(graph, dom)
            };
            self.dominance_frontiers = Some(built);
        }
        self.dominance_frontiers.as_ref().unwrap()
    }

    pub fn loops(&mut self, procedure: &Procedure) -> &Loops {
        self.dominator_tree(procedure);
        if self.loops.is_none() {
            let built = {
                let graph = self.flow_graph.as_ref().unwrap();
                let dom = self.dominator_tree.as_ref().unwrap();
                Loops::build(graph, dom)
            };
            self.loops = Some(built);
        }
        self.loops.as_ref().unwrap()
    }

    pub fn interference_graph(&mut self, procedure: &Procedure) -> &InterferenceGraph {
        self.live_variables(procedure);
        if self.interference_graph.is_none() {
            let built = InterferenceGraph::build(procedure, self.live_variables.as_ref().unwrap());
            self.interference_graph = Some(built);
        }
        self.interference_graph.as_ref().unwrap()
    }

    /// The constant integer value of `symbol` at `entry`, if every reaching
    /// definition agrees (`Constants` is cheap enough to rebuild per call
    /// rather than cache — see `constants.rs`).
    pub fn int_value(&mut self, procedure: &Procedure, entry: EntryId, symbol: SymbolId) -> Option<i32> {
        let use_defs = self.use_defs(procedure);
        Constants::build(procedure, use_defs).int_value(entry, symbol)
    }

    pub fn string_value(&mut self, procedure: &Procedure, entry: EntryId, symbol: SymbolId) -> Option<String> {
        let use_defs = self.use_defs(procedure);
        Constants::build(procedure, use_defs).string_value(entry, symbol)
    }

    /// `old_entry` has been replaced by `new_entry` in the same structural
    /// role (e.g. a fold rewrote it in place but under a fresh id). Patches
    /// the flow graph's boundary bookkeeping in O(1); drops every other
    /// cached analysis.
    pub fn replace(&mut self, old_entry: EntryId, new_entry: EntryId) {
        if let Some(g) = self.flow_graph.as_mut() {
            g.replace(old_entry, new_entry);
        }
        self.drop_derived();
    }

    /// `entry` now reads `new_symbol` instead of `old_symbol`.
    pub fn replace_use(&mut self, _entry: EntryId, _old_symbol: SymbolId, _new_symbol: SymbolId) {
        self.drop_derived();
    }

    /// `entry` is about to be erased from the procedure.
    pub fn remove(&mut self, _entry: EntryId) {
        self.flow_graph = None;
        self.drop_derived();
    }

    /// Blanket invalidation, used whenever CFG topology changes in a way
    /// no targeted hook covers (e.g. a `CJump` collapsing to a `Jump`).
    pub fn invalidate(&mut self) {
        self.flow_graph = None;
        self.drop_derived();
    }

    fn drop_derived(&mut self) {
        self.reaching_defs = None;
        self.use_defs = None;
        self.live_variables = None;
        self.available_expressions = None;
        self.dominator_tree = None;
        self.dominance_frontiers = None;
        self.loops = None;
        self.interference_graph = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ProcedureBuilder;

    #[test]
    fn accessors_cache_and_invalidate_clears() {
        let mut b = ProcedureBuilder::new("f");
        let x = b.symbol("x", 4);
        b.mov_imm(x, 1);
        b.print(x);
        let proc = b.build().unwrap();

        let mut analysis = Analysis::new();
        analysis.reaching_defs(&proc);
        assert!(analysis.reaching_defs.is_some());
        analysis.use_defs(&proc);
        assert!(analysis.use_defs.is_some());

        analysis.invalidate();
        assert!(analysis.flow_graph.is_none());
        assert!(analysis.use_defs.is_none());
    }
}
