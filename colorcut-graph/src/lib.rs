//! Graph data types used by the colorcut graph coloring solver.

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! vertex {
    ($x:expr) => {
        $crate::vertex::Vertex::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! vertices {
    ( $( $x:expr ),* ) => { [ $( $crate::vertex!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { $crate::vertices! [ $( $ x),* ] };
}

/// Shortcut for tests, takes the vertex count followed by 1-based edges.
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! graph {
    ( $n:expr $( ; $a:expr, $b:expr )* ) => {
        $crate::graph::Graph::new(
            $n,
            vec![ $( ($crate::vertex!($a), $crate::vertex!($b)) ),* ],
        )
        .unwrap()
    };
}

pub mod graph;
pub mod set;
pub mod vertex;


pub use graph::{Graph, GraphError};
pub use set::VertexSet;
pub use vertex::Vertex;
