//! Linear models exchanged with the search engine.
use std::fmt;

/// A column of a [`Model`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct VarId(u32);

impl VarId {
    #[inline]
    pub fn from_index(index: usize) -> VarId {
        VarId(index as u32)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Domain of a variable within its bounds.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum VarKind {
    Binary,
    Continuous,
}

/// Relation between the two sides of a constraint.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Sense {
    Le,
    Eq,
    Ge,
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Sense::Le => "<=",
            Sense::Eq => "=",
            Sense::Ge => ">=",
        })
    }
}

/// A sparse linear expression without constant term.
#[derive(Clone, Default, PartialEq, Debug)]
pub struct LinExpr {
    terms: Vec<(VarId, f64)>,
}

impl LinExpr {
    pub fn new() -> LinExpr {
        LinExpr::default()
    }

    /// Add `coefficient * var` to the expression.
    pub fn add_term(&mut self, var: VarId, coefficient: f64) -> &mut LinExpr {
        self.terms.push((var, coefficient));
        self
    }

    /// Builder style variant of [`add_term`](LinExpr::add_term).
    pub fn with_term(mut self, var: VarId, coefficient: f64) -> LinExpr {
        self.add_term(var, coefficient);
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    /// Value of the expression for an assignment of all columns.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|&(var, coefficient)| coefficient * values[var.index()])
            .sum()
    }

    /// Build `lhs sense rhs`.
    pub fn constrain(self, sense: Sense, rhs: f64) -> LinConstraint {
        LinConstraint {
            expr: self,
            sense,
            rhs,
        }
    }
}

/// A linear constraint `expr sense rhs`.
#[derive(Clone, PartialEq, Debug)]
pub struct LinConstraint {
    pub expr: LinExpr,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinConstraint {
    /// Value of the left hand side.
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.expr.evaluate(values)
    }

    /// Amount by which the constraint is violated, 0 if it is satisfied.
    pub fn violation(&self, values: &[f64]) -> f64 {
        let activity = self.activity(values);
        match self.sense {
            Sense::Le => (activity - self.rhs).max(0.0),
            Sense::Ge => (self.rhs - activity).max(0.0),
            Sense::Eq => (activity - self.rhs).abs(),
        }
    }

    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        self.violation(values) <= tolerance
    }
}

/// A minimization problem over bounded variables.
#[derive(Clone, Default, Debug)]
pub struct Model {
    names: Vec<String>,
    kinds: Vec<VarKind>,
    lower: Vec<f64>,
    upper: Vec<f64>,
    objective: Vec<f64>,
    constraints: Vec<LinConstraint>,
}

impl Model {
    pub fn new() -> Model {
        Model::default()
    }

    /// Add a binary variable with bounds `[0, 1]`.
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_var(name, VarKind::Binary, 0.0, 1.0)
    }

    pub fn add_var(
        &mut self,
        name: impl Into<String>,
        kind: VarKind,
        lower: f64,
        upper: f64,
    ) -> VarId {
        let var = VarId::from_index(self.names.len());
        self.names.push(name.into());
        self.kinds.push(kind);
        self.lower.push(lower);
        self.upper.push(upper);
        self.objective.push(0.0);
        var
    }

    /// Restrict the bounds of a variable.
    pub fn tighten_bounds(&mut self, var: VarId, lower: f64, upper: f64) {
        let index = var.index();
        self.lower[index] = self.lower[index].max(lower);
        self.upper[index] = self.upper[index].min(upper);
    }

    pub fn set_objective(&mut self, var: VarId, coefficient: f64) {
        self.objective[var.index()] = coefficient;
    }

    pub fn add_constraint(&mut self, constraint: LinConstraint) {
        self.constraints.push(constraint);
    }

    pub fn var_count(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, var: VarId) -> &str {
        &self.names[var.index()]
    }

    pub fn kind(&self, var: VarId) -> VarKind {
        self.kinds[var.index()]
    }

    pub fn lower_bounds(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_bounds(&self) -> &[f64] {
        &self.upper
    }

    /// Objective coefficient of each column, the objective is minimized.
    pub fn objective(&self) -> &[f64] {
        &self.objective
    }

    pub fn constraints(&self) -> &[LinConstraint] {
        &self.constraints
    }

    /// Objective value of an assignment.
    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .iter()
            .zip(values.iter())
            .map(|(coefficient, value)| coefficient * value)
            .sum()
    }

    /// Whether every binary variable is within `tolerance` of an integer.
    pub fn is_integral(&self, values: &[f64], tolerance: f64) -> bool {
        self.kinds
            .iter()
            .zip(values.iter())
            .all(|(&kind, &value)| kind != VarKind::Binary || (value - value.round()).abs() <= tolerance)
    }

    /// Whether an assignment satisfies all bounds, integrality and constraints.
    pub fn is_feasible(&self, values: &[f64], tolerance: f64) -> bool {
        values.len() == self.var_count()
            && values.iter().enumerate().all(|(index, &value)| {
                value >= self.lower[index] - tolerance && value <= self.upper[index] + tolerance
            })
            && self.is_integral(values, tolerance)
            && self
                .constraints
                .iter()
                .all(|constraint| constraint.is_satisfied(values, tolerance))
    }

    /// Whether the objective only takes integral values on integral points.
    pub fn has_integral_objective(&self) -> bool {
        self.objective.iter().zip(self.kinds.iter()).all(|(&c, &kind)| {
            c == 0.0 || (kind == VarKind::Binary && c == c.round())
        })
    }

    /// Render a constraint with variable names, e.g. `x[0][0] + x[1][0] - w[0] <= 0`.
    pub fn display_constraint(&self, constraint: &LinConstraint) -> String {
        let mut text = String::new();
        for (pos, &(var, coefficient)) in constraint.expr.terms().iter().enumerate() {
            let sign = if coefficient < 0.0 { "-" } else { "+" };
            if pos == 0 {
                if coefficient < 0.0 {
                    text.push('-');
                }
            } else {
                text.push_str(&format!(" {} ", sign));
            }
            if coefficient.abs() != 1.0 {
                text.push_str(&format!("{} ", coefficient.abs()));
            }
            text.push_str(self.name(var));
        }
        text.push_str(&format!(" {} {}", constraint.sense, constraint.rhs));
        text
    }
}
