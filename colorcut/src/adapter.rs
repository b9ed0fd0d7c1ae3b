//! Clique cut separation as seen by the search engine.
use std::sync::Arc;

use log::debug;

use colorcut_graph::Graph;

use crate::cuts::CutManager;
use crate::engine::Separator;
use crate::formulation::ColoringVars;
use crate::model::LinConstraint;
use crate::separate::separate_cliques;
use crate::snapshot::RelaxationSnapshot;

/// Separator handing clique cuts to the engine.
///
/// Duplicates share the graph and the cut manager. The only mutable state shared between workers
/// is inside the cut manager.
#[derive(Clone)]
pub struct CliqueSeparator {
    graph: Arc<Graph>,
    vars: ColoringVars,
    cuts: Arc<CutManager>,
}

impl CliqueSeparator {
    pub fn new(graph: Arc<Graph>, vars: ColoringVars, cuts: Arc<CutManager>) -> CliqueSeparator {
        CliqueSeparator { graph, vars, cuts }
    }

    pub fn cut_manager(&self) -> &Arc<CutManager> {
        &self.cuts
    }
}

impl Separator for CliqueSeparator {
    fn separate(&mut self, snapshot: &RelaxationSnapshot) -> Vec<LinConstraint> {
        let candidates = separate_cliques(&self.graph, &self.vars, snapshot);
        let candidate_count = candidates.len();
        let accepted = self.cuts.submit(&self.graph, candidates);

        debug!(
            "Node {}: {} clique cuts, {} new",
            snapshot.node(),
            candidate_count,
            accepted.len()
        );

        accepted
            .iter()
            .map(|cut| cut.to_constraint(&self.vars))
            .collect()
    }

    fn duplicate(&self) -> Box<dyn Separator> {
        Box::new(self.clone())
    }
}
