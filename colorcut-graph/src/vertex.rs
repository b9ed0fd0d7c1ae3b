//! Vertices.
use std::fmt;

/// The backing type used to represent vertices.
pub type VertexIdx = u32;

/// A vertex of a graph.
///
/// Internally vertices are 0-based, i.e. the first vertex has the index 0. For user IO a 1-based
/// index is used. This convention is also used in the DIMACS edge format.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Vertex {
    index: VertexIdx,
}

impl Vertex {
    /// Creates a vertex from a 1-based index as used in the DIMACS edge format.
    ///
    /// The parameter must be positive and may not exceed `Vertex::max_count()`.
    #[inline]
    pub fn from_dimacs(number: usize) -> Vertex {
        debug_assert!(number > 0);
        Vertex::from_index(number - 1)
    }

    /// Creates a vertex from a 0-based index.
    #[inline]
    pub fn from_index(index: usize) -> Vertex {
        debug_assert!(index < Vertex::max_count());
        Vertex {
            index: index as VertexIdx,
        }
    }

    /// The 1-based index representing this vertex in the DIMACS edge format.
    #[inline]
    pub fn to_dimacs(self) -> usize {
        self.index as usize + 1
    }

    /// The 0-based index representing this vertex.
    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Largest number of vertices supported.
    ///
    /// The adjacency matrix is quadratic in the vertex count, so this is far below what the
    /// backing integer type could represent.
    pub const fn max_count() -> usize {
        1 << 16
    }
}

/// Uses the 1-based DIMACS encoding.
impl fmt::Debug for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

/// Uses the 1-based DIMACS encoding.
impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;
    use proptest::prelude::*;

    pub fn vertex(index: impl Strategy<Value = usize>) -> impl Strategy<Value = Vertex> {
        index.prop_map(Vertex::from_index)
    }
}
