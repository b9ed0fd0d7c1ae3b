//! Dense bounded-variable simplex for node relaxations.
//!
//! Columns are shifted by their lower bound, so every column ranges over `[0, upper - lower]`.
//! Upper bounds are handled by the ratio test instead of extra rows. Rows are normalized to a
//! non-negative right hand side and get a slack, a surplus plus an artificial, or an artificial.
//! Phase one minimizes the sum of artificials, phase two the model objective. Pricing and the ratio
//! test follow Bland's rule.
use std::mem::size_of;
use std::time::Instant;

use crate::model::{LinConstraint, Model, Sense};

const PIVOT_TOLERANCE: f64 = 1e-9;
const COST_TOLERANCE: f64 = 1e-9;
const FEASIBILITY_TOLERANCE: f64 = 1e-7;
/// Pivots between two looks at the clock.
const DEADLINE_CHECK_INTERVAL: usize = 16;

/// Result of solving a relaxation.
#[derive(Clone, Debug, PartialEq)]
pub enum LpOutcome {
    Optimal(LpSolution),
    Infeasible,
    Unbounded,
    IterationLimit,
    /// The deadline passed before the relaxation was solved.
    Interrupted,
}

/// An optimal relaxation solution in the column space of the model.
#[derive(Clone, Debug, PartialEq)]
pub struct LpSolution {
    pub objective: f64,
    pub values: Vec<f64>,
}

/// The linear relaxation of a model under node bounds, extended by a set of cuts.
pub struct Relaxation<'a> {
    pub model: &'a Model,
    pub lower: &'a [f64],
    pub upper: &'a [f64],
    pub cuts: &'a [LinConstraint],
    /// Substitute fixed columns and drop the rows they leave empty.
    pub presolve: bool,
    /// Give up with [`LpOutcome::Interrupted`] once this instant has passed.
    pub deadline: Option<Instant>,
}

enum Stop {
    Unbounded,
    IterationLimit,
    Interrupted,
}

struct Simplex {
    rows: Vec<Vec<f64>>,
    basis: Vec<usize>,
    basic: Vec<bool>,
    upper: Vec<f64>,
    values: Vec<f64>,
    at_upper: Vec<bool>,
    reduced: Vec<f64>,
    iterations: usize,
    iteration_limit: usize,
    deadline: Option<Instant>,
}

impl<'a> Relaxation<'a> {
    /// Upper bound in bytes on the memory used by [`solve`](Relaxation::solve).
    ///
    /// Counts the dense tableau plus the per-column vectors of the rows and columns left after
    /// presolve.
    pub fn memory(&self) -> usize {
        let kept =
            |k: usize| !self.presolve || self.upper[k] - self.lower[k] > FEASIBILITY_TOLERANCE;
        let columns = (0..self.model.var_count()).filter(|&k| kept(k)).count();
        let rows = self
            .model
            .constraints()
            .iter()
            .chain(self.cuts.iter())
            .filter(|constraint| {
                !self.presolve
                    || constraint
                        .expr
                        .terms()
                        .iter()
                        .any(|&(var, coefficient)| coefficient != 0.0 && kept(var.index()))
            })
            .count();
        let total = columns + 2 * rows;
        rows.saturating_add(5)
            .saturating_mul(total)
            .saturating_mul(size_of::<f64>())
    }

    pub fn solve(&self) -> LpOutcome {
        let model = self.model;
        let var_count = model.var_count();

        if (0..var_count).any(|k| self.lower[k] > self.upper[k] + FEASIBILITY_TOLERANCE) {
            return LpOutcome::Infeasible;
        }

        let mut column_of = vec![None; var_count];
        let mut column_upper = vec![];
        let mut column_cost = vec![];
        for k in 0..var_count {
            let range = (self.upper[k] - self.lower[k]).max(0.0);
            if self.presolve && range <= FEASIBILITY_TOLERANCE {
                continue;
            }
            column_of[k] = Some(column_upper.len());
            column_upper.push(range);
            column_cost.push(model.objective()[k]);
        }
        let columns = column_upper.len();

        let mut rows = vec![];
        for constraint in model.constraints().iter().chain(self.cuts.iter()) {
            let mut coefficients = vec![0.0; columns];
            let mut rhs = constraint.rhs;
            let mut empty = true;
            for &(var, coefficient) in constraint.expr.terms() {
                rhs -= coefficient * self.lower[var.index()];
                if let Some(column) = column_of[var.index()] {
                    coefficients[column] += coefficient;
                    empty &= coefficient == 0.0;
                }
            }

            if self.presolve && empty {
                let satisfied = match constraint.sense {
                    Sense::Le => rhs >= -FEASIBILITY_TOLERANCE,
                    Sense::Ge => rhs <= FEASIBILITY_TOLERANCE,
                    Sense::Eq => rhs.abs() <= FEASIBILITY_TOLERANCE,
                };
                if !satisfied {
                    return LpOutcome::Infeasible;
                }
                continue;
            }

            rows.push(normalize(coefficients, constraint.sense, rhs));
        }

        let slack_count = rows.iter().filter(|row| row.1 != Sense::Eq).count();
        let artificial_count = rows.iter().filter(|row| row.1 != Sense::Le).count();
        let first_slack = columns;
        let first_artificial = columns + slack_count;
        let total = first_artificial + artificial_count;

        let mut simplex = Simplex {
            rows: Vec::with_capacity(rows.len()),
            basis: Vec::with_capacity(rows.len()),
            basic: vec![false; total],
            upper: column_upper,
            values: vec![0.0; total],
            at_upper: vec![false; total],
            reduced: vec![],
            iterations: 0,
            iteration_limit: 50_000.max(20 * (rows.len() + total)),
            deadline: self.deadline,
        };
        simplex
            .upper
            .resize(total, std::f64::INFINITY);

        let mut next_slack = first_slack;
        let mut next_artificial = first_artificial;
        for (coefficients, sense, rhs) in rows {
            let mut row = coefficients;
            row.resize(total, 0.0);
            let basic = match sense {
                Sense::Le => {
                    row[next_slack] = 1.0;
                    next_slack += 1;
                    next_slack - 1
                }
                Sense::Ge => {
                    row[next_slack] = -1.0;
                    row[next_artificial] = 1.0;
                    next_slack += 1;
                    next_artificial += 1;
                    next_artificial - 1
                }
                Sense::Eq => {
                    row[next_artificial] = 1.0;
                    next_artificial += 1;
                    next_artificial - 1
                }
            };
            simplex.rows.push(row);
            simplex.basis.push(basic);
            simplex.basic[basic] = true;
            simplex.values[basic] = rhs;
        }

        if artificial_count > 0 {
            let mut costs = vec![0.0; total];
            for cost in costs[first_artificial..].iter_mut() {
                *cost = 1.0;
            }
            match simplex.run(&costs) {
                Ok(()) => (),
                // Phase one is bounded below by zero.
                Err(Stop::Unbounded) => return LpOutcome::Infeasible,
                Err(Stop::IterationLimit) => return LpOutcome::IterationLimit,
                Err(Stop::Interrupted) => return LpOutcome::Interrupted,
            }
            let infeasibility: f64 = simplex.values[first_artificial..].iter().sum();
            if infeasibility > FEASIBILITY_TOLERANCE {
                return LpOutcome::Infeasible;
            }
            for artificial in first_artificial..total {
                simplex.upper[artificial] = 0.0;
                simplex.values[artificial] = 0.0;
            }
        }

        let mut costs = column_cost;
        costs.resize(total, 0.0);
        match simplex.run(&costs) {
            Ok(()) => (),
            Err(Stop::Unbounded) => return LpOutcome::Unbounded,
            Err(Stop::IterationLimit) => return LpOutcome::IterationLimit,
            Err(Stop::Interrupted) => return LpOutcome::Interrupted,
        }

        let values: Vec<f64> = (0..var_count)
            .map(|k| {
                let value = match column_of[k] {
                    Some(column) => self.lower[k] + simplex.values[column],
                    None => self.lower[k],
                };
                value.max(self.lower[k]).min(self.upper[k])
            })
            .collect();

        LpOutcome::Optimal(LpSolution {
            objective: model.objective_value(&values),
            values,
        })
    }
}

/// Scale a row by -1 if needed so that `<=` rows have `rhs >= 0`, `>=` rows have `rhs > 0` and
/// equations have `rhs >= 0`.
fn normalize(mut coefficients: Vec<f64>, sense: Sense, rhs: f64) -> (Vec<f64>, Sense, f64) {
    let flip = match sense {
        Sense::Le => rhs < 0.0,
        Sense::Ge => rhs <= 0.0,
        Sense::Eq => rhs < 0.0,
    };
    if !flip {
        return (coefficients, sense, rhs);
    }
    for coefficient in coefficients.iter_mut() {
        *coefficient = -*coefficient;
    }
    let sense = match sense {
        Sense::Le => Sense::Ge,
        Sense::Ge => Sense::Le,
        Sense::Eq => Sense::Eq,
    };
    (coefficients, sense, -rhs)
}

impl Simplex {
    fn price(&mut self, costs: &[f64]) {
        self.reduced = costs.to_vec();
        for (row, &basic) in self.rows.iter().zip(self.basis.iter()) {
            let cost = costs[basic];
            if cost != 0.0 {
                for (reduced, &coefficient) in self.reduced.iter_mut().zip(row.iter()) {
                    *reduced -= cost * coefficient;
                }
            }
        }
    }

    /// Lowest index column that improves the objective when moved away from its bound.
    fn entering(&self) -> Option<usize> {
        (0..self.values.len()).find(|&column| {
            !self.basic[column]
                && self.upper[column] > PIVOT_TOLERANCE
                && if self.at_upper[column] {
                    self.reduced[column] > COST_TOLERANCE
                } else {
                    self.reduced[column] < -COST_TOLERANCE
                }
        })
    }

    fn run(&mut self, costs: &[f64]) -> Result<(), Stop> {
        self.price(costs);

        while let Some(entering) = self.entering() {
            if self.iterations >= self.iteration_limit {
                return Err(Stop::IterationLimit);
            }
            if self.iterations % DEADLINE_CHECK_INTERVAL == 0
                && self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
            {
                return Err(Stop::Interrupted);
            }
            self.iterations += 1;

            let direction = if self.at_upper[entering] { -1.0 } else { 1.0 };

            // Without a leaving row the entering column moves to its other bound.
            let mut step = self.upper[entering];
            let mut leaving: Option<(usize, bool)> = None;

            for (index, row) in self.rows.iter().enumerate() {
                let alpha = row[entering] * direction;
                let basic = self.basis[index];
                let (limit, to_upper) = if alpha > PIVOT_TOLERANCE {
                    (self.values[basic] / alpha, false)
                } else if alpha < -PIVOT_TOLERANCE && self.upper[basic].is_finite() {
                    ((self.upper[basic] - self.values[basic]) / -alpha, true)
                } else {
                    continue;
                };
                let limit = limit.max(0.0);

                let replace = if limit < step - 1e-12 {
                    true
                } else if let Some((current, _)) = leaving {
                    limit <= step + 1e-12 && basic < self.basis[current]
                } else {
                    false
                };
                if replace {
                    step = limit;
                    leaving = Some((index, to_upper));
                }
            }

            if step.is_infinite() {
                return Err(Stop::Unbounded);
            }

            for (row, &basic) in self.rows.iter().zip(self.basis.iter()) {
                self.values[basic] -= row[entering] * direction * step;
            }
            self.values[entering] += direction * step;

            match leaving {
                None => {
                    let at_upper = !self.at_upper[entering];
                    self.at_upper[entering] = at_upper;
                    self.values[entering] = if at_upper {
                        self.upper[entering]
                    } else {
                        0.0
                    };
                }
                Some((index, to_upper)) => {
                    let leaving = self.basis[index];
                    self.values[leaving] = if to_upper {
                        self.upper[leaving]
                    } else {
                        0.0
                    };
                    self.at_upper[leaving] = to_upper;
                    self.basic[leaving] = false;

                    self.pivot(index, entering);

                    self.basis[index] = entering;
                    self.basic[entering] = true;
                    self.at_upper[entering] = false;
                }
            }
        }

        Ok(())
    }

    fn pivot(&mut self, pivot_index: usize, column: usize) {
        let pivot = self.rows[pivot_index][column];
        for coefficient in self.rows[pivot_index].iter_mut() {
            *coefficient /= pivot;
        }
        let pivot_row = std::mem::take(&mut self.rows[pivot_index]);

        for row in self.rows.iter_mut() {
            if row.is_empty() {
                continue;
            }
            let factor = row[column];
            if factor != 0.0 {
                for (coefficient, &p) in row.iter_mut().zip(pivot_row.iter()) {
                    *coefficient -= factor * p;
                }
            }
        }

        let factor = self.reduced[column];
        if factor != 0.0 {
            for (reduced, &p) in self.reduced.iter_mut().zip(pivot_row.iter()) {
                *reduced -= factor * p;
            }
        }

        self.rows[pivot_index] = pivot_row;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::*;

    use colorcut_graph::test::colorable_graph;

    use crate::formulation::build_formulation;
    use crate::greedy::{color_count, dsatur};
    use crate::model::{LinExpr, VarKind};

    fn solve(model: &Model, cuts: &[LinConstraint], presolve: bool) -> LpOutcome {
        Relaxation {
            model,
            lower: model.lower_bounds(),
            upper: model.upper_bounds(),
            cuts,
            presolve,
            deadline: None,
        }
        .solve()
    }

    fn optimum(outcome: LpOutcome) -> LpSolution {
        match outcome {
            LpOutcome::Optimal(solution) => solution,
            other => panic!("expected an optimal solution, got {:?}", other),
        }
    }

    #[test]
    fn packing() {
        let mut model = Model::new();
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        model.set_objective(x, -1.0);
        model.set_objective(y, -1.0);
        model.add_constraint(
            LinExpr::new()
                .with_term(x, 1.0)
                .with_term(y, 1.0)
                .constrain(Sense::Le, 1.5),
        );

        let solution = optimum(solve(&model, &[], true));
        assert!((solution.objective + 1.5).abs() < 1e-9);

        let cut = LinExpr::new()
            .with_term(x, 1.0)
            .with_term(y, 1.0)
            .constrain(Sense::Le, 1.0);
        let solution = optimum(solve(&model, &[cut], true));
        assert!((solution.objective + 1.0).abs() < 1e-9);
    }

    #[test]
    fn equality_and_phase_one() {
        let mut model = Model::new();
        let x = model.add_var("x", VarKind::Continuous, 0.0, 4.0);
        let y = model.add_var("y", VarKind::Continuous, 1.0, 4.0);
        model.set_objective(x, 1.0);
        model.set_objective(y, 2.0);
        model.add_constraint(
            LinExpr::new()
                .with_term(x, 1.0)
                .with_term(y, 1.0)
                .constrain(Sense::Eq, 3.0),
        );
        model.add_constraint(LinExpr::new().with_term(x, 1.0).constrain(Sense::Ge, 0.5));

        let solution = optimum(solve(&model, &[], true));
        assert!((solution.values[0] - 2.0).abs() < 1e-9);
        assert!((solution.values[1] - 1.0).abs() < 1e-9);
        assert!((solution.objective - 4.0).abs() < 1e-9);
    }

    #[test]
    fn infeasible() {
        let mut model = Model::new();
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        model.add_constraint(
            LinExpr::new()
                .with_term(x, 1.0)
                .with_term(y, 1.0)
                .constrain(Sense::Ge, 3.0),
        );

        assert_eq!(solve(&model, &[], true), LpOutcome::Infeasible);
        assert_eq!(solve(&model, &[], false), LpOutcome::Infeasible);
    }

    #[test]
    fn fixed_columns() {
        let mut model = Model::new();
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        model.set_objective(y, -1.0);
        model.add_constraint(
            LinExpr::new()
                .with_term(x, 1.0)
                .with_term(y, 1.0)
                .constrain(Sense::Le, 1.0),
        );
        model.tighten_bounds(x, 1.0, 1.0);

        for &presolve in [true, false].iter() {
            let solution = optimum(solve(&model, &[], presolve));
            assert_eq!(solution.values, vec![1.0, 0.0]);
        }

        // Only fixed columns left in this row.
        model.add_constraint(LinExpr::new().with_term(x, 1.0).constrain(Sense::Le, 0.0));
        for &presolve in [true, false].iter() {
            assert_eq!(solve(&model, &[], presolve), LpOutcome::Infeasible);
        }
    }

    #[test]
    fn passed_deadline_interrupts() {
        let mut model = Model::new();
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        model.set_objective(x, -1.0);
        model.set_objective(y, -1.0);
        model.add_constraint(
            LinExpr::new()
                .with_term(x, 1.0)
                .with_term(y, 1.0)
                .constrain(Sense::Le, 1.5),
        );

        let relaxation = Relaxation {
            model: &model,
            lower: model.lower_bounds(),
            upper: model.upper_bounds(),
            cuts: &[],
            presolve: true,
            deadline: Some(Instant::now()),
        };
        assert_eq!(relaxation.solve(), LpOutcome::Interrupted);

        // One row with two columns and a slack.
        assert_eq!(relaxation.memory(), 6 * 4 * size_of::<f64>());
    }

    #[test]
    fn unbounded() {
        let mut model = Model::new();
        let x = model.add_var("x", VarKind::Continuous, 0.0, std::f64::INFINITY);
        model.set_objective(x, -1.0);

        assert_eq!(solve(&model, &[], true), LpOutcome::Unbounded);
    }

    proptest! {
        #[test]
        fn coloring_relaxation_is_a_lower_bound(
            (graph, _) in colorable_graph(1..7usize, 1..4usize, 0.2..1.0),
            presolve in proptest::bool::ANY
        ) {
            let coloring = dsatur(&graph);
            let formulation = build_formulation(&graph, Some(color_count(&coloring)));
            let model = &formulation.model;

            let solution = optimum(solve(model, &[], presolve));

            for constraint in model.constraints() {
                prop_assert!(constraint.is_satisfied(&solution.values, 1e-6));
            }
            for (k, &value) in solution.values.iter().enumerate() {
                prop_assert!(value >= model.lower_bounds()[k] && value <= model.upper_bounds()[k]);
            }
            prop_assert!(solution.objective <= color_count(&coloring) as f64 + 1e-6);
            // Every vertex needs some color and one edge needs two.
            let trivial = if graph.edge_count() > 0 { 2.0 } else { 0.0 };
            prop_assert!(solution.objective >= trivial - 1e-6);
        }
    }
}
