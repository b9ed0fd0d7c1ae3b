//! Colorcut finds colorings of graphs with the fewest colors using branch-and-cut.
//!
//! The coloring problem is formulated as an integer program over assignment variables `x[i][j]`
//! and color usage indicators `w[j]`. During the search, the relaxation at each node is
//! strengthened by clique cuts: for a clique `K` and a color `j` at most one vertex of `K` can
//! take `j`, so `sum(x[i][j] for i in K) <= w[j]` holds for every coloring.

pub mod adapter;
pub mod config;
pub mod cuts;
pub mod engine;
pub mod formulation;
pub mod greedy;
pub mod model;
pub mod separate;
pub mod snapshot;
pub mod solver;

pub use colorcut_graph::{Graph, GraphError, Vertex, VertexSet};

pub use solver::{ColoringSolver, SolveReport, SolveStatus, SolverError};

pub mod dimacs {
    //! DIMACS edge format parser and writer.
    pub use colorcut_dimacs::*;
}
