//! Fixed size vertex sets.
use std::fmt;

use crate::vertex::Vertex;

/// Number of `u64` words needed to store one bit per vertex.
#[inline]
pub fn word_count(vertex_count: usize) -> usize {
    (vertex_count + 63) / 64
}

/// A set of vertices of a graph with a fixed vertex count, stored as a bitset.
#[derive(Clone, PartialEq, Eq)]
pub struct VertexSet {
    words: Vec<u64>,
    vertex_count: usize,
}

impl VertexSet {
    /// The empty set.
    pub fn empty(vertex_count: usize) -> VertexSet {
        VertexSet {
            words: vec![0; word_count(vertex_count)],
            vertex_count,
        }
    }

    /// The set of all vertices.
    pub fn full(vertex_count: usize) -> VertexSet {
        let mut set = VertexSet::empty(vertex_count);
        for word in set.words.iter_mut() {
            *word = !0;
        }
        let tail = vertex_count % 64;
        if tail != 0 {
            if let Some(last) = set.words.last_mut() {
                *last = (1 << tail) - 1;
            }
        }
        set
    }

    #[inline]
    pub fn contains(&self, vertex: Vertex) -> bool {
        let index = vertex.index();
        (self.words[index / 64] >> (index % 64)) & 1 != 0
    }

    #[inline]
    pub fn insert(&mut self, vertex: Vertex) {
        let index = vertex.index();
        self.words[index / 64] |= 1 << (index % 64);
    }

    #[inline]
    pub fn remove(&mut self, vertex: Vertex) {
        let index = vertex.index();
        self.words[index / 64] &= !(1 << (index % 64));
    }

    /// Keep only vertices also present in the given bit row.
    ///
    /// The row must use the same layout, e.g. a row of a graph's adjacency matrix.
    #[inline]
    pub fn intersect_words(&mut self, row: &[u64]) {
        debug_assert_eq!(row.len(), self.words.len());
        for (word, &other) in self.words.iter_mut().zip(row.iter()) {
            *word &= other;
        }
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&word| word == 0)
    }

    /// Iterate over the contained vertices in ascending order.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = Vertex> + 'a {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, &word)| {
                let mut rest = word;
                std::iter::from_fn(move || {
                    if rest == 0 {
                        None
                    } else {
                        let bit = rest.trailing_zeros() as usize;
                        rest &= rest - 1;
                        Some(Vertex::from_index(word_index * 64 + bit))
                    }
                })
            })
    }

    /// Number of vertices of the graph this set belongs to.
    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }
}

impl fmt::Debug for VertexSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
