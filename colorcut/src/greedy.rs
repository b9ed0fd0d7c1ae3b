//! Greedy DSATUR coloring.
use rustc_hash::FxHashSet as HashSet;

use colorcut_graph::{Graph, Vertex};

/// Color a graph with the DSATUR heuristic.
///
/// Repeatedly colors the uncolored vertex with the most distinct neighbor colors, breaking ties by
/// degree and then by index, using the smallest color not taken by a neighbor. The used colors are
/// always `0..k`.
pub fn dsatur(graph: &Graph) -> Vec<usize> {
    let n = graph.vertex_count();
    let mut coloring: Vec<Option<usize>> = vec![None; n];
    let mut neighbor_colors: Vec<HashSet<usize>> = vec![HashSet::default(); n];

    for _ in 0..n {
        let mut best: Option<(usize, usize, Vertex)> = None;
        for vertex in graph.vertices() {
            if coloring[vertex.index()].is_some() {
                continue;
            }
            let key = (
                neighbor_colors[vertex.index()].len(),
                graph.degree(vertex),
                vertex,
            );
            best = match best {
                Some(current) if (current.0, current.1) >= (key.0, key.1) => Some(current),
                _ => Some(key),
            };
        }

        let vertex = match best {
            Some((_, _, vertex)) => vertex,
            None => break,
        };

        let taken = &neighbor_colors[vertex.index()];
        let color = (0..).find(|color| !taken.contains(color)).unwrap_or(0);
        coloring[vertex.index()] = Some(color);

        for neighbor in graph.neighbors(vertex) {
            neighbor_colors[neighbor.index()].insert(color);
        }
    }

    coloring.into_iter().map(|color| color.unwrap_or(0)).collect()
}

/// Number of colors used by a coloring with colors `0..k`.
pub fn color_count(coloring: &[usize]) -> usize {
    coloring.iter().map(|&color| color + 1).max().unwrap_or(0)
}
