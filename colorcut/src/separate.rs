//! Separation of clique cuts.
//!
//! For a color `j` and a clique `K` of the graph, at most one vertex of `K` can take the color `j`
//! and none can when `j` is unused. Thus
//!
//! ```text
//! sum(x[i][j] for i in K) - w[j] <= 0
//! ```
//!
//! holds for every coloring. For edges this is the conflict constraint of the formulation, larger
//! cliques give stronger inequalities.
//!
//! The separation heuristic grows one clique per color, greedily taking vertices in order of
//! decreasing relaxation value `x[i][j]`. Ties are broken by ascending vertex index, so the result
//! only depends on the graph and the relaxation values.
use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use thiserror::Error;

use colorcut_graph::{Graph, Vertex, VertexSet};

use crate::formulation::ColoringVars;
use crate::model::{LinConstraint, LinExpr, Sense};
use crate::snapshot::RelaxationSnapshot;

/// Members of a clique.
pub type Clique = SmallVec<[Vertex; 8]>;

/// Identifies a clique cut independent of member order.
pub type CutKey = (usize, Clique);

/// A clique inequality for a single color.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CliqueCut {
    color: usize,
    clique: Clique,
}

/// A generated inequality that would exclude a proper coloring.
///
/// The separation never produces these for a consistent graph, this is used to check that.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidCut {
    #[error("Clique cut for color {color} has only {len} members")]
    TooSmall { color: usize, len: usize },
    #[error("Clique cut for color {color} contains the non-adjacent vertices {a} and {b}")]
    NotAdjacent { color: usize, a: Vertex, b: Vertex },
    #[error("Clique cut uses color {color} but the graph only allows {colors} colors")]
    ColorOutOfRange { color: usize, colors: usize },
}

impl CliqueCut {
    pub fn new(color: usize, clique: Clique) -> CliqueCut {
        CliqueCut { color, clique }
    }

    pub fn color(&self) -> usize {
        self.color
    }

    /// Members in the order they were added to the clique.
    pub fn clique(&self) -> &[Vertex] {
        &self.clique
    }

    /// The same cut with the clique members in ascending order.
    pub fn key(&self) -> CutKey {
        let mut members = self.clique.clone();
        members.sort_unstable();
        (self.color, members)
    }

    /// Check that the cut is a valid clique inequality for the graph.
    pub fn validate(&self, graph: &Graph) -> Result<(), InvalidCut> {
        if self.color >= graph.vertex_count() {
            return Err(InvalidCut::ColorOutOfRange {
                color: self.color,
                colors: graph.vertex_count(),
            });
        }
        if self.clique.len() < 2 {
            return Err(InvalidCut::TooSmall {
                color: self.color,
                len: self.clique.len(),
            });
        }
        for (pos, &a) in self.clique.iter().enumerate() {
            for &b in self.clique[..pos].iter() {
                if a.index() >= graph.vertex_count()
                    || b.index() >= graph.vertex_count()
                    || !graph.adjacent(a, b)
                {
                    return Err(InvalidCut::NotAdjacent {
                        color: self.color,
                        a: b,
                        b: a,
                    });
                }
            }
        }
        Ok(())
    }

    /// The inequality `sum(x[i][color] for i in clique) - w[color] <= 0`.
    pub fn to_constraint(&self, vars: &ColoringVars) -> LinConstraint {
        let mut expr = LinExpr::new();
        for &vertex in self.clique.iter() {
            expr.add_term(vars.x(vertex, self.color), 1.0);
        }
        expr.add_term(vars.w(self.color), -1.0);
        expr.constrain(Sense::Le, 0.0)
    }

    /// Left hand side value of the inequality at a relaxation solution.
    pub fn activity(&self, vars: &ColoringVars, snapshot: &RelaxationSnapshot) -> f64 {
        self.clique
            .iter()
            .map(|&vertex| snapshot.assignment(vars, vertex, self.color))
            .sum::<f64>()
            - snapshot.value(vars.w(self.color))
    }
}

/// Greedily grow a maximal clique for one color.
///
/// Vertices are visited by decreasing `x[i][color]`, ties by ascending index. A vertex joins if it
/// is adjacent to all current members. The set of such vertices is maintained as a bitset, so each
/// vertex costs a single membership test plus one row intersection when it joins.
pub fn greedy_clique(
    graph: &Graph,
    vars: &ColoringVars,
    snapshot: &RelaxationSnapshot,
    color: usize,
) -> Clique {
    let mut order: Vec<Vertex> = graph.vertices().collect();
    order.sort_by_key(|&vertex| {
        (
            Reverse(OrderedFloat(snapshot.assignment(vars, vertex, color))),
            vertex,
        )
    });

    let mut candidates = VertexSet::full(graph.vertex_count());
    let mut clique = Clique::new();

    for vertex in order {
        if candidates.contains(vertex) {
            clique.push(vertex);
            candidates.intersect_words(graph.neighbor_words(vertex));
        }
    }

    debug_assert!(graph.is_clique(&clique));

    clique
}

/// Find one clique cut per color, skipping cliques with fewer than two members.
///
/// The result is ordered by color. This does not keep any state between calls.
pub fn separate_cliques(
    graph: &Graph,
    vars: &ColoringVars,
    snapshot: &RelaxationSnapshot,
) -> Vec<CliqueCut> {
    (0..vars.color_count())
        .filter_map(|color| {
            let clique = greedy_clique(graph, vars, snapshot, color);
            if clique.len() >= 2 {
                Some(CliqueCut::new(color, clique))
            } else {
                None
            }
        })
        .collect()
}
