//! Read-only views of relaxation solutions.
use colorcut_graph::Vertex;

use crate::formulation::ColoringVars;
use crate::model::VarId;

/// Values of all model columns in the relaxation solved at a search node.
///
/// Borrowed from the calling search worker for the duration of a single separation call.
#[derive(Copy, Clone, Debug)]
pub struct RelaxationSnapshot<'a> {
    values: &'a [f64],
    node: u64,
}

impl<'a> RelaxationSnapshot<'a> {
    pub fn new(values: &'a [f64], node: u64) -> RelaxationSnapshot<'a> {
        RelaxationSnapshot { values, node }
    }

    #[inline]
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }

    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    /// Id of the search node this relaxation belongs to.
    pub fn node(&self) -> u64 {
        self.node
    }

    /// Fractional assignment value of `x(vertex, color)`.
    #[inline]
    pub fn assignment(&self, vars: &ColoringVars, vertex: Vertex, color: usize) -> f64 {
        self.value(vars.x(vertex, color))
    }
}
