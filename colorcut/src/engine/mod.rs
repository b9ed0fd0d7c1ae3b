//! A small branch-and-cut engine.
//!
//! Solves models with binary variables by best-bound branch-and-bound over dense simplex
//! relaxations. Cuts returned by a [`Separator`] are added to a single global pool and used by all
//! later relaxations. Workers run on separate threads, each with its own copy of the separator.
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{info, warn};
use thiserror::Error;

use crate::config::{ConfigError, SolverConfig};
use crate::model::{LinConstraint, Model};
use crate::snapshot::RelaxationSnapshot;

mod lp;
mod node;
mod search;

pub use lp::{LpOutcome, LpSolution, Relaxation};

use search::{Incumbent, Shared};

/// Finds cuts for relaxation solutions.
///
/// Called by the workers at search nodes. Every worker owns a separate instance created with
/// [`duplicate`](Separator::duplicate). Returned cuts must be valid for all feasible solutions of
/// the model, not just for the current node.
pub trait Separator: Send {
    fn separate(&mut self, snapshot: &RelaxationSnapshot) -> Vec<LinConstraint>;

    /// A new instance for another worker.
    fn duplicate(&self) -> Box<dyn Separator>;
}

/// How the search ended.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SearchStatus {
    /// The incumbent is optimal.
    Optimal,
    /// No feasible solution exists.
    Infeasible,
    TimeLimit,
    MemoryLimit,
    /// The tree was exhausted but some subtree could not be solved.
    Incomplete,
}

/// Result of a search.
#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub status: SearchStatus,
    /// Objective and values of the best solution found.
    pub incumbent: Option<(f64, Vec<f64>)>,
    /// Lower bound on the optimal objective.
    pub best_bound: f64,
    pub nodes: u64,
    pub cuts: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid search configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("A search worker panicked")]
    WorkerPanicked,
}

/// Branch-and-cut search over a model.
pub struct BranchAndCut {
    model: Model,
    config: SolverConfig,
    separator: Option<Box<dyn Separator>>,
    incumbent: Option<Incumbent>,
}

impl BranchAndCut {
    pub fn new(model: Model, config: &SolverConfig) -> BranchAndCut {
        BranchAndCut {
            model,
            config: config.clone(),
            separator: None,
            incumbent: None,
        }
    }

    pub fn with_separator(mut self, separator: Box<dyn Separator>) -> BranchAndCut {
        self.separator = Some(separator);
        self
    }

    /// Start from a known solution.
    ///
    /// Returns false and ignores the solution if it is not feasible.
    pub fn set_incumbent(&mut self, values: Vec<f64>) -> bool {
        if !self.model.is_feasible(&values, 1e-6) {
            warn!("Ignoring infeasible warm start");
            return false;
        }
        let objective = self.model.objective_value(&values);
        if self
            .incumbent
            .as_ref()
            .map_or(true, |incumbent| objective < incumbent.objective)
        {
            info!("Warm start with objective {}", objective);
            self.incumbent = Some(Incumbent { objective, values });
        }
        true
    }

    /// Run the search until the tree is exhausted or a limit is hit.
    pub fn solve(self) -> Result<SearchOutcome, EngineError> {
        let BranchAndCut {
            model,
            config,
            separator,
            incumbent,
        } = self;
        config.validate()?;

        let start = Instant::now();
        let workers = config.threads;

        info!(
            "Searching with {} workers on {} variables and {} constraints",
            workers,
            model.var_count(),
            model.constraints().len()
        );

        let shared = Arc::new(Shared::new(model, config, incumbent, start));

        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let shared = Arc::clone(&shared);
                let separator = separator.as_ref().map(|separator| separator.duplicate());
                thread::spawn(move || search::run_worker(&shared, separator))
            })
            .collect();

        let mut panicked = false;
        for handle in handles {
            panicked |= handle.join().is_err();
        }
        if panicked {
            return Err(EngineError::WorkerPanicked);
        }

        let outcome = shared.outcome(start.elapsed());

        info!(
            "Search finished: {:?} after {} nodes, {} cuts, bound {}",
            outcome.status, outcome.nodes, outcome.cuts, outcome.best_bound
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::model::{LinExpr, Sense, VarId};

    /// Knapsack style model: maximize value under a weight limit.
    fn knapsack(values: &[f64], weights: &[f64], capacity: f64) -> Model {
        let mut model = Model::new();
        let mut weight = LinExpr::new();
        for (index, (&value, &item_weight)) in values.iter().zip(weights.iter()).enumerate() {
            let var = model.add_binary(format!("item[{}]", index));
            model.set_objective(var, -value);
            weight.add_term(var, item_weight);
        }
        model.add_constraint(weight.constrain(Sense::Le, capacity));
        model
    }

    fn config(threads: usize) -> SolverConfig {
        SolverConfig {
            threads,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn knapsack_optimum() {
        let model = knapsack(&[5.0, 4.0, 3.0, 2.0], &[4.0, 3.0, 2.0, 1.0], 6.0);

        for &threads in [1, 3].iter() {
            let outcome = BranchAndCut::new(model.clone(), &config(threads))
                .solve()
                .unwrap();
            let (objective, values) = outcome.incumbent.unwrap();

            assert_eq!(outcome.status, SearchStatus::Optimal);
            assert_eq!(objective, -9.0);
            assert_eq!(outcome.best_bound, -9.0);
            assert!(model.is_feasible(&values, 1e-6));
        }
    }

    #[test]
    fn infeasible_model() {
        let mut model = Model::new();
        let x = model.add_binary("x");
        let y = model.add_binary("y");
        model.add_constraint(
            LinExpr::new()
                .with_term(x, 2.0)
                .with_term(y, 2.0)
                .constrain(Sense::Eq, 1.0),
        );

        let outcome = BranchAndCut::new(model, &config(2)).solve().unwrap();
        assert_eq!(outcome.status, SearchStatus::Infeasible);
        assert!(outcome.incumbent.is_none());
    }

    #[test]
    fn warm_start() {
        let model = knapsack(&[5.0, 4.0, 3.0], &[4.0, 3.0, 2.0], 6.0);
        let mut search = BranchAndCut::new(model, &config(1));

        assert!(!search.set_incumbent(vec![1.0, 1.0, 1.0]));
        assert!(search.set_incumbent(vec![1.0, 0.0, 1.0]));

        let outcome = search.solve().unwrap();
        assert_eq!(outcome.status, SearchStatus::Optimal);
        assert_eq!(outcome.incumbent.unwrap().0, -8.0);
    }

    /// Adds `x + y <= 1` once, counting how often it was asked.
    #[derive(Clone)]
    struct PairCut {
        calls: Arc<AtomicUsize>,
    }

    impl Separator for PairCut {
        fn separate(&mut self, snapshot: &RelaxationSnapshot) -> Vec<LinConstraint> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let cut = LinExpr::new()
                .with_term(VarId::from_index(0), 1.0)
                .with_term(VarId::from_index(1), 1.0)
                .constrain(Sense::Le, 1.0);
            if cut.violation(snapshot.values()) > 1e-6 {
                vec![cut]
            } else {
                vec![]
            }
        }

        fn duplicate(&self) -> Box<dyn Separator> {
            Box::new(self.clone())
        }
    }

    #[test]
    fn cuts_close_the_root() {
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

        let calls = Arc::new(AtomicUsize::new(0));
        let separator = PairCut {
            calls: calls.clone(),
        };

        let outcome = BranchAndCut::new(model, &config(1))
            .with_separator(Box::new(separator))
            .solve()
            .unwrap();

        assert_eq!(outcome.status, SearchStatus::Optimal);
        assert_eq!(outcome.incumbent.unwrap().0, -1.0);
        assert_eq!(outcome.cuts, 1);
        assert_eq!(outcome.nodes, 1);
        assert!(calls.load(Ordering::SeqCst) >= 1);
    }

    /// Tree memory in megabytes that holds `bytes`.
    fn megabytes(bytes: usize) -> f64 {
        bytes as f64 / (1024.0 * 1024.0)
    }

    #[test]
    fn tree_memory_limit() {
        let values: Vec<f64> = (0..14).map(|i| 10.0 + i as f64 * 0.37).collect();
        let weights: Vec<f64> = (0..14).map(|i| 7.0 + (i * 5 % 11) as f64).collect();
        let model = knapsack(&values, &weights, 40.5);

        let root_relaxation = Relaxation {
            model: &model,
            lower: model.lower_bounds(),
            upper: model.upper_bounds(),
            cuts: &[],
            presolve: true,
            deadline: None,
        }
        .memory();
        let child = node::Node::root().child(VarId::from_index(0), 1.0, 0.0).memory();

        let config = SolverConfig {
            threads: 1,
            // The root relaxation fits, but not together with an open child.
            tree_memory: megabytes(root_relaxation + child / 2),
            heuristic_freq: 0,
            ..SolverConfig::default()
        };
        let outcome = BranchAndCut::new(model, &config).solve().unwrap();

        assert_eq!(outcome.status, SearchStatus::MemoryLimit);
        assert_eq!(outcome.nodes, 2);
        assert!(outcome.best_bound > std::f64::NEG_INFINITY);
        assert!(outcome.best_bound < 0.0);
    }

    #[test]
    fn relaxation_memory_is_limited() {
        let model = knapsack(&[5.0, 4.0, 3.0, 2.0], &[4.0, 3.0, 2.0, 1.0], 6.0);

        for &threads in [1, 4].iter() {
            let config = SolverConfig {
                threads,
                tree_memory: 1e-6,
                ..SolverConfig::default()
            };
            let outcome = BranchAndCut::new(model.clone(), &config).solve().unwrap();

            assert_eq!(outcome.status, SearchStatus::MemoryLimit);
            assert!(outcome.incumbent.is_none());
            assert_eq!(outcome.best_bound, std::f64::NEG_INFINITY);
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let model = knapsack(&[5.0, 4.0], &[4.0, 3.0], 6.0);

        for &time_limit in [-1.0, std::f64::NAN].iter() {
            let config = SolverConfig {
                time_limit,
                ..SolverConfig::default()
            };
            match BranchAndCut::new(model.clone(), &config).solve() {
                Err(EngineError::Config(ConfigError::TimeLimit(_))) => (),
                other => panic!("expected a config error, got {:?}", other.map(|o| o.status)),
            }
        }
    }
}
