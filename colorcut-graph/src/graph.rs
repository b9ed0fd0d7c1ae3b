//! Undirected simple graphs.
use std::fmt;

use thiserror::Error;

use crate::set::{word_count, VertexSet};
use crate::vertex::Vertex;

/// Possible errors while constructing a graph.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Vertex {} is out of range for a graph with {} vertices", vertex, vertex_count)]
    VertexOutOfRange { vertex: usize, vertex_count: usize },
    #[error("Self loop at vertex {}", vertex)]
    SelfLoop { vertex: usize },
    #[error("Graph has {} vertices, at most {} are supported", vertex_count, max)]
    TooManyVertices { vertex_count: usize, max: usize },
}

/// An undirected graph without self loops or parallel edges.
///
/// Stores the edge list together with a row-major adjacency bit matrix, so that adjacency queries
/// take constant time. A graph cannot be modified after construction.
#[derive(Clone, Eq, PartialEq)]
pub struct Graph {
    vertex_count: usize,
    edges: Vec<(Vertex, Vertex)>,
    /// One row of `words_per_row` words for each vertex.
    adjacency: Vec<u64>,
    words_per_row: usize,
}

impl Graph {
    /// Create a graph from an edge list.
    ///
    /// Each edge is stored with its smaller endpoint first. Edges listed more than once, in either
    /// orientation, are only stored once.
    pub fn new(
        vertex_count: usize,
        edges: impl IntoIterator<Item = (Vertex, Vertex)>,
    ) -> Result<Graph, GraphError> {
        if vertex_count > Vertex::max_count() {
            return Err(GraphError::TooManyVertices {
                vertex_count,
                max: Vertex::max_count(),
            });
        }

        let words_per_row = word_count(vertex_count);
        let mut graph = Graph {
            vertex_count,
            edges: vec![],
            adjacency: vec![0; words_per_row * vertex_count],
            words_per_row,
        };

        for (a, b) in edges {
            for &vertex in [a, b].iter() {
                if vertex.index() >= vertex_count {
                    return Err(GraphError::VertexOutOfRange {
                        vertex: vertex.to_dimacs(),
                        vertex_count,
                    });
                }
            }
            if a == b {
                return Err(GraphError::SelfLoop {
                    vertex: a.to_dimacs(),
                });
            }
            if graph.adjacent(a, b) {
                continue;
            }
            graph.set_bit(a, b);
            graph.set_bit(b, a);
            graph.edges.push((a.min(b), a.max(b)));
        }

        Ok(graph)
    }

    /// A graph without edges.
    pub fn empty(vertex_count: usize) -> Result<Graph, GraphError> {
        Graph::new(vertex_count, vec![])
    }

    fn set_bit(&mut self, row: Vertex, column: Vertex) {
        let column = column.index();
        self.adjacency[row.index() * self.words_per_row + column / 64] |= 1 << (column % 64);
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of distinct edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All vertices in ascending order.
    pub fn vertices(&self) -> impl Iterator<Item = Vertex> {
        (0..self.vertex_count).map(Vertex::from_index)
    }

    /// The edges in insertion order, smaller endpoint first.
    pub fn edges(&self) -> &[(Vertex, Vertex)] {
        &self.edges
    }

    /// Whether `a` and `b` are joined by an edge.
    #[inline]
    pub fn adjacent(&self, a: Vertex, b: Vertex) -> bool {
        let b = b.index();
        (self.adjacency[a.index() * self.words_per_row + b / 64] >> (b % 64)) & 1 != 0
    }

    /// The adjacency matrix row of a vertex, in the layout used by [`VertexSet`].
    #[inline]
    pub fn neighbor_words(&self, vertex: Vertex) -> &[u64] {
        let start = vertex.index() * self.words_per_row;
        &self.adjacency[start..start + self.words_per_row]
    }

    /// The neighbors of a vertex as a set.
    pub fn neighbor_set(&self, vertex: Vertex) -> VertexSet {
        let mut set = VertexSet::full(self.vertex_count);
        set.intersect_words(self.neighbor_words(vertex));
        set
    }

    /// Neighbors of a vertex in ascending order.
    pub fn neighbors<'a>(&'a self, vertex: Vertex) -> impl Iterator<Item = Vertex> + 'a {
        self.vertices().filter(move |&other| self.adjacent(vertex, other))
    }

    pub fn degree(&self, vertex: Vertex) -> usize {
        self.neighbor_words(vertex)
            .iter()
            .map(|word| word.count_ones() as usize)
            .sum()
    }

    /// Whether the given vertices are pairwise adjacent.
    ///
    /// Repeated vertices are not adjacent to themselves, so they make this return false.
    pub fn is_clique(&self, vertices: &[Vertex]) -> bool {
        vertices.iter().all(|v| v.index() < self.vertex_count)
            && vertices
                .iter()
                .enumerate()
                .all(|(pos, &a)| vertices[..pos].iter().all(|&b| self.adjacent(a, b)))
    }

    /// Whether `colors[i]` is a color for each vertex `i` such that adjacent vertices differ.
    pub fn is_proper_coloring(&self, colors: &[usize]) -> bool {
        colors.len() == self.vertex_count
            && self
                .edges
                .iter()
                .all(|&(a, b)| colors[a.index()] != colors[b.index()])
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(&self.vertex_count, f)?;
        f.debug_list().entries(self.edges.iter()).finish()
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;

    use proptest::{prelude::*, *};

    /// Random graphs where each possible edge is present with the given probability.
    pub fn graph(
        vertices: impl Strategy<Value = usize>,
        density: impl Strategy<Value = f64>,
    ) -> impl Strategy<Value = Graph> {
        (vertices, density).prop_flat_map(|(vertices, density)| {
            let pairs = vertices * vertices.saturating_sub(1) / 2;
            collection::vec(prop::bool::weighted(density), pairs).prop_map(move |present| {
                let mut edges = vec![];
                let mut present = present.into_iter();
                for a in 0..vertices {
                    for b in 0..a {
                        if present.next() == Some(true) {
                            edges.push((Vertex::from_index(a), Vertex::from_index(b)));
                        }
                    }
                }
                Graph::new(vertices, edges).unwrap()
            })
        })
    }
}
