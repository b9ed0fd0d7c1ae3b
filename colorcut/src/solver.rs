//! Graph coloring solver.
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Error;
use log::info;
use thiserror::Error;

use colorcut_graph::Graph;

use crate::adapter::CliqueSeparator;
use crate::config::{ConfigError, SolverConfig, SolverConfigUpdate};
use crate::cuts::CutManager;
use crate::dimacs::DimacsGraphParser;
use crate::engine::{BranchAndCut, EngineError, SearchStatus};
use crate::formulation::build_formulation;
use crate::greedy::{color_count, dsatur};

/// Possible errors while solving.
///
/// Running into a limit is not an error, see [`SolveStatus`].
#[derive(Debug, Error)]
pub enum SolverError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("The search returned an improper coloring")]
    InvalidColoring,
}

/// How far solving got.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SolveStatus {
    /// The coloring uses the minimal number of colors.
    Optimal,
    /// A limit was hit, the coloring might not be minimal.
    Feasible,
    Infeasible,
    /// A limit was hit before any coloring was found.
    Unknown,
}

/// Outcome of solving.
#[derive(Clone, Debug)]
pub struct SolveReport {
    pub status: SolveStatus,
    /// Number of colors of the best coloring found.
    pub chromatic_number: Option<usize>,
    /// Lower bound on the chromatic number.
    pub best_bound: f64,
    pub elapsed: Duration,
    pub cuts_generated: u64,
    pub nodes: u64,
    /// The color of each vertex, colors are `0..chromatic_number`.
    pub coloring: Option<Vec<usize>>,
}

/// Finds colorings with a minimal number of colors.
#[derive(Default)]
pub struct ColoringSolver {
    config: SolverConfig,
    graph: Option<Arc<Graph>>,
}

impl ColoringSolver {
    /// Create a new solver.
    pub fn new() -> ColoringSolver {
        ColoringSolver::default()
    }

    /// Change the solver configuration.
    pub fn config(&mut self, update: &SolverConfigUpdate) -> Result<(), ConfigError> {
        self.config.update(update)
    }

    /// Set the graph to color, replacing any previous graph.
    pub fn add_graph(&mut self, graph: Graph) {
        info!(
            "Graph with {} vertices and {} edges",
            graph.vertex_count(),
            graph.edge_count()
        );
        self.graph = Some(Arc::new(graph));
    }

    /// Reads and sets a graph in DIMACS edge format.
    pub fn add_dimacs_graph(&mut self, input: impl io::Read) -> Result<(), Error> {
        use io::BufRead;

        let mut buffer = io::BufReader::new(input);
        let mut parser = DimacsGraphParser::new();

        loop {
            let data = buffer.fill_buf()?;
            if data.is_empty() {
                break;
            }
            parser.parse_chunk(data)?;
            let len = data.len();
            buffer.consume(len);
        }
        parser.eof()?;
        parser.check_header()?;

        info!("Parsed {} edge lines", parser.edge_count());

        self.add_graph(parser.into_graph()?);
        Ok(())
    }

    /// Search for a coloring with the fewest colors.
    pub fn solve(&mut self) -> Result<SolveReport, SolverError> {
        let start = Instant::now();
        let graph = match &self.graph {
            Some(graph) if graph.vertex_count() > 0 => graph.clone(),
            _ => {
                return Ok(SolveReport {
                    status: SolveStatus::Optimal,
                    chromatic_number: Some(0),
                    best_bound: 0.0,
                    elapsed: start.elapsed(),
                    cuts_generated: 0,
                    nodes: 0,
                    coloring: Some(vec![]),
                })
            }
        };

        let greedy = dsatur(&graph);
        info!("Greedy coloring with {} colors", color_count(&greedy));

        let color_bound = if self.config.presolve {
            Some(color_count(&greedy))
        } else {
            None
        };
        let formulation = build_formulation(&graph, color_bound);
        let vars = formulation.vars;

        let cuts = Arc::new(CutManager::new());
        let mut search = BranchAndCut::new(formulation.model, &self.config);
        if self.config.clique_cuts {
            search = search.with_separator(Box::new(CliqueSeparator::new(
                graph.clone(),
                vars,
                cuts.clone(),
            )));
        }
        search.set_incumbent(vars.encode_coloring(&greedy));

        let outcome = search.solve()?;

        let coloring = match &outcome.incumbent {
            Some((_, values)) => {
                let coloring = normalize_coloring(&graph, vars.decode_coloring(values));
                if !graph.is_proper_coloring(&coloring) {
                    return Err(SolverError::InvalidColoring);
                }
                Some(coloring)
            }
            None => None,
        };
        let chromatic_number = coloring.as_ref().map(|coloring| color_count(coloring));

        let status = match (outcome.status, &coloring) {
            (SearchStatus::Optimal, _) => SolveStatus::Optimal,
            (SearchStatus::Infeasible, _) => SolveStatus::Infeasible,
            (_, Some(_)) => SolveStatus::Feasible,
            (_, None) => SolveStatus::Unknown,
        };

        let trivial_bound = if graph.edge_count() > 0 { 2.0 } else { 1.0 };
        let best_bound = match (status, chromatic_number) {
            (SolveStatus::Optimal, Some(colors)) => colors as f64,
            _ => (outcome.best_bound - 1e-6).ceil().max(trivial_bound),
        };

        let report = SolveReport {
            status,
            chromatic_number,
            best_bound,
            elapsed: start.elapsed(),
            cuts_generated: cuts.cuts_generated(),
            nodes: outcome.nodes,
            coloring,
        };

        info!(
            "{:?} with {:?} colors, bound {}, {} nodes, {} cuts in {:.3}s",
            report.status,
            report.chromatic_number,
            report.best_bound,
            report.nodes,
            report.cuts_generated,
            report.elapsed.as_secs_f64()
        );

        Ok(report)
    }
}

/// Make the colors of a decoded coloring contiguous.
///
/// Isolated vertices get color 0, as nothing in the model ties their color to a used color.
/// The remaining colors are renumbered in order of first use.
fn normalize_coloring(graph: &Graph, mut coloring: Vec<usize>) -> Vec<usize> {
    for vertex in graph.vertices() {
        if graph.degree(vertex) == 0 {
            coloring[vertex.index()] = 0;
        }
    }

    let mut relabel = vec![None; coloring.len()];
    let mut next = 0;
    for color in coloring.iter_mut() {
        *color = *relabel[*color].get_or_insert_with(|| {
            next += 1;
            next - 1
        });
    }
    coloring
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::{prelude::*, *};

    use colorcut_graph::{
        graph,
        test::{colorable_graph, complete, cycle},
        Vertex,
    };

    use crate::dimacs::write_dimacs_graph;

    fn solver(threads: usize, clique_cuts: bool) -> ColoringSolver {
        let mut solver = ColoringSolver::new();
        let mut update = SolverConfigUpdate::new();
        update.threads = Some(threads);
        update.clique_cuts = Some(clique_cuts);
        solver.config(&update).unwrap();
        solver
    }

    /// Smallest number of colors, by trying all colorings.
    fn brute_force_chromatic_number(graph: &Graph) -> usize {
        let n = graph.vertex_count();
        for colors in 1..=n {
            let mut coloring = vec![0; n];
            loop {
                if graph.is_proper_coloring(&coloring) {
                    return colors;
                }
                let mut pos = 0;
                while pos < n && coloring[pos] + 1 == colors {
                    coloring[pos] = 0;
                    pos += 1;
                }
                if pos == n {
                    break;
                }
                coloring[pos] += 1;
            }
        }
        0
    }

    #[test]
    fn empty_graph() {
        let report = ColoringSolver::new().solve().unwrap();
        assert_eq!(report.status, SolveStatus::Optimal);
        assert_eq!(report.chromatic_number, Some(0));
        assert_eq!(report.coloring, Some(vec![]));
    }

    #[test]
    fn small_graphs() {
        for &clique_cuts in [true, false].iter() {
            for &(ref graph, expected) in [
                (complete(3), 3),
                (cycle(6), 2),
                (cycle(5), 3),
                (Graph::new(4, vec![]).unwrap(), 1),
                (graph![5; 1, 2; 2, 3; 3, 1; 4, 5], 3),
            ]
            .iter()
            {
                let mut solver = solver(2, clique_cuts);
                solver.add_graph(graph.clone());
                let report = solver.solve().unwrap();

                assert_eq!(report.status, SolveStatus::Optimal);
                assert_eq!(report.chromatic_number, Some(expected));
                assert_eq!(report.best_bound, expected as f64);
                assert!(graph.is_proper_coloring(report.coloring.as_ref().unwrap()));
                if !clique_cuts {
                    assert_eq!(report.cuts_generated, 0);
                }
            }
        }
    }

    #[test]
    fn triangle_from_dimacs() {
        let mut solver = solver(1, true);
        solver
            .add_dimacs_graph(&b"c triangle\np edge 3 3\ne 1 2\ne 2 3\ne 3 1\n"[..])
            .unwrap();
        let report = solver.solve().unwrap();

        assert_eq!(report.chromatic_number, Some(3));
        assert!(report.cuts_generated > 0);
    }

    #[test]
    fn dimacs_errors_are_reported() {
        let mut solver = ColoringSolver::new();
        assert!(solver.add_dimacs_graph(&b"p edge 2 1\ne 1 3\n"[..]).is_err());
        assert!(solver.add_dimacs_graph(&b"p edge 2 2\ne 1 2\n"[..]).is_err());
    }

    #[test]
    fn isolated_vertices_share_color_zero() {
        let graph = graph![4; 2, 3];
        let coloring = normalize_coloring(&graph, vec![3, 2, 0, 1]);
        assert_eq!(coloring, vec![0, 1, 0, 0]);
        assert!(graph.is_proper_coloring(&coloring));
        assert_eq!(graph.degree(Vertex::from_index(0)), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn optimal_colorings(
            (graph, planted) in colorable_graph(1..7usize, 1..4usize, 0.3..1.0),
            clique_cuts in proptest::bool::ANY,
            presolve in proptest::bool::ANY
        ) {
            let mut solver = solver(2, clique_cuts);
            let mut update = SolverConfigUpdate::new();
            update.presolve = Some(presolve);
            solver.config(&update).unwrap();

            let mut dimacs = vec![];
            write_dimacs_graph(&mut dimacs, &graph).unwrap();
            solver.add_dimacs_graph(&mut &dimacs[..]).unwrap();

            let report = solver.solve().unwrap();
            let coloring = report.coloring.unwrap();
            let expected = brute_force_chromatic_number(&graph);

            prop_assert_eq!(report.status, SolveStatus::Optimal);
            prop_assert_eq!(report.chromatic_number, Some(expected));
            prop_assert!(expected <= color_count(&planted));
            prop_assert!(graph.is_proper_coloring(&coloring));
            prop_assert_eq!(color_count(&coloring), expected);
        }
    }
}
