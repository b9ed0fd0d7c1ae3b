//! Integer programming formulation of graph coloring.
use log::debug;

use colorcut_graph::{Graph, Vertex};

use crate::model::{LinExpr, Model, Sense, VarId};

/// Column layout of the coloring variables.
///
/// `x(i, j)` is 1 when vertex `i` gets color `j`, `w(j)` is 1 when color `j` is used. There is
/// one color per vertex, so `colors == vertices`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ColoringVars {
    vertices: usize,
    colors: usize,
}

impl ColoringVars {
    pub fn new(vertices: usize) -> ColoringVars {
        ColoringVars {
            vertices,
            colors: vertices,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices
    }

    pub fn color_count(&self) -> usize {
        self.colors
    }

    /// The assignment variable of a vertex and color.
    #[inline]
    pub fn x(&self, vertex: Vertex, color: usize) -> VarId {
        debug_assert!(vertex.index() < self.vertices && color < self.colors);
        VarId::from_index(vertex.index() * self.colors + color)
    }

    /// The usage indicator of a color.
    #[inline]
    pub fn w(&self, color: usize) -> VarId {
        debug_assert!(color < self.colors);
        VarId::from_index(self.vertices * self.colors + color)
    }

    pub fn var_count(&self) -> usize {
        self.vertices * self.colors + self.colors
    }

    /// Read the color of each vertex from an integral assignment.
    ///
    /// Picks the color with the largest value, so slightly perturbed values are fine.
    pub fn decode_coloring(&self, values: &[f64]) -> Vec<usize> {
        (0..self.vertices)
            .map(|index| {
                let vertex = Vertex::from_index(index);
                let mut best = 0;
                for color in 1..self.colors {
                    if values[self.x(vertex, color).index()] > values[self.x(vertex, best).index()]
                    {
                        best = color;
                    }
                }
                best
            })
            .collect()
    }

    /// Encode a proper coloring whose colors are exactly `0..k` as an assignment.
    pub fn encode_coloring(&self, coloring: &[usize]) -> Vec<f64> {
        let mut values = vec![0.0; self.var_count()];
        for (index, &color) in coloring.iter().enumerate() {
            values[self.x(Vertex::from_index(index), color).index()] = 1.0;
            values[self.w(color).index()] = 1.0;
        }
        values
    }
}

/// The coloring model together with its column layout.
pub struct Formulation {
    pub model: Model,
    pub vars: ColoringVars,
}

/// Build the coloring model of a graph.
///
/// With a `color_bound` of `k` all variables of the colors `k..` are fixed to zero. This keeps
/// every optimal solution as long as a coloring with `k` colors exists, because the symmetry
/// breaking rows force the used colors to form a prefix.
pub fn build_formulation(graph: &Graph, color_bound: Option<usize>) -> Formulation {
    let n = graph.vertex_count();
    let vars = ColoringVars::new(n);
    let mut model = Model::new();

    for vertex in graph.vertices() {
        for color in 0..n {
            let var = model.add_binary(format!("x[{}][{}]", vertex.index(), color));
            debug_assert_eq!(var, vars.x(vertex, color));
        }
    }
    for color in 0..n {
        let var = model.add_binary(format!("w[{}]", color));
        debug_assert_eq!(var, vars.w(color));
        model.set_objective(var, 1.0);
    }

    for vertex in graph.vertices() {
        let mut assignment = LinExpr::new();
        for color in 0..n {
            assignment.add_term(vars.x(vertex, color), 1.0);
        }
        model.add_constraint(assignment.constrain(Sense::Eq, 1.0));
    }

    for &(a, b) in graph.edges() {
        for color in 0..n {
            model.add_constraint(
                LinExpr::new()
                    .with_term(vars.x(a, color), 1.0)
                    .with_term(vars.x(b, color), 1.0)
                    .with_term(vars.w(color), -1.0)
                    .constrain(Sense::Le, 0.0),
            );
        }
    }

    for color in 0..n.saturating_sub(1) {
        model.add_constraint(
            LinExpr::new()
                .with_term(vars.w(color), 1.0)
                .with_term(vars.w(color + 1), -1.0)
                .constrain(Sense::Ge, 0.0),
        );
    }

    for color in 0..n {
        let mut usage = LinExpr::new().with_term(vars.w(color), 1.0);
        for vertex in graph.vertices() {
            usage.add_term(vars.x(vertex, color), -1.0);
        }
        model.add_constraint(usage.constrain(Sense::Le, 0.0));
    }

    if let Some(bound) = color_bound {
        for color in bound.min(n)..n {
            model.tighten_bounds(vars.w(color), 0.0, 0.0);
            for vertex in graph.vertices() {
                model.tighten_bounds(vars.x(vertex, color), 0.0, 0.0);
            }
        }
    }

    debug!(
        "Built coloring model with {} variables and {} constraints",
        model.var_count(),
        model.constraints().len()
    );

    Formulation { model, vars }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::*;

    use colorcut_graph::{graph, test::colorable_graph};

    #[test]
    fn row_families() {
        let graph = graph![3; 1, 2; 2, 3; 3, 1];
        let formulation = build_formulation(&graph, None);
        let model = &formulation.model;

        assert_eq!(model.var_count(), 3 * 3 + 3);
        // assignment + conflict + symmetry + usage
        assert_eq!(model.constraints().len(), 3 + 3 * 3 + 2 + 3);
        assert_eq!(model.objective().iter().sum::<f64>(), 3.0);
        assert_eq!(model.name(formulation.vars.x(Vertex::from_index(2), 1)), "x[2][1]");
        assert_eq!(model.name(formulation.vars.w(2)), "w[2]");
    }

    #[test]
    fn color_bound_fixes_columns() {
        let graph = graph![3; 1, 2];
        let formulation = build_formulation(&graph, Some(2));
        let vars = formulation.vars;
        let upper = formulation.model.upper_bounds();

        assert_eq!(upper[vars.w(1).index()], 1.0);
        assert_eq!(upper[vars.w(2).index()], 0.0);
        for vertex in graph.vertices() {
            assert_eq!(upper[vars.x(vertex, 2).index()], 0.0);
            assert_eq!(upper[vars.x(vertex, 0).index()], 1.0);
        }
    }

    proptest! {
        #[test]
        fn proper_colorings_are_feasible(
            (graph, coloring) in colorable_graph(1..8usize, 1..4usize, 0.0..1.0)
        ) {
            // Relabel colors to a prefix 0..k in order of first use.
            let mut relabel = vec![None; 4];
            let mut next = 0;
            let coloring: Vec<usize> = coloring
                .iter()
                .map(|&color| {
                    *relabel[color].get_or_insert_with(|| {
                        next += 1;
                        next - 1
                    })
                })
                .collect();

            let formulation = build_formulation(&graph, None);
            let values = formulation.vars.encode_coloring(&coloring);

            prop_assert!(formulation.model.is_feasible(&values, 1e-9));
            prop_assert_eq!(formulation.model.objective_value(&values), next as f64);
            prop_assert_eq!(formulation.vars.decode_coloring(&values), coloring);
        }

        #[test]
        fn improper_colorings_are_infeasible(
            (graph, coloring) in colorable_graph(2..8usize, 1..4usize, 0.3..1.0)
        ) {
            prop_assume!(graph.edge_count() > 0);
            let (a, b) = graph.edges()[0];
            let mut coloring = coloring;
            coloring[b.index()] = coloring[a.index()];
            prop_assume!(coloring.iter().all(|&color| color < graph.vertex_count()));

            let formulation = build_formulation(&graph, None);
            let mut values = formulation.vars.encode_coloring(&coloring);
            for color in 0..graph.vertex_count() {
                values[formulation.vars.w(color).index()] = 1.0;
            }

            prop_assert!(!formulation.model.is_feasible(&values, 1e-9));
        }
    }
}
