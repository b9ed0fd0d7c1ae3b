//! Shared search state and the worker loop.
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::SolverConfig;
use crate::model::{LinConstraint, Model, VarId, VarKind};
use crate::snapshot::RelaxationSnapshot;

use super::lp::{LpOutcome, Relaxation};
use super::node::{Node, NodeQueue};
use super::{SearchOutcome, SearchStatus, Separator};

const INTEGRALITY_TOLERANCE: f64 = 1e-6;
const VIOLATION_TOLERANCE: f64 = 1e-6;

/// Best known solution.
#[derive(Clone, Debug)]
pub struct Incumbent {
    pub objective: f64,
    pub values: Vec<f64>,
}

struct SearchState {
    queue: NodeQueue,
    /// Workers currently processing a node.
    active: usize,
    incumbent: Option<Incumbent>,
    stop: Option<SearchStatus>,
    aborted: bool,
    /// Smallest bound of subtrees given up without a solution.
    lost_bound: Option<f64>,
    /// Bytes held by relaxations currently being solved.
    reserved: usize,
    nodes: u64,
    next_id: u64,
}

/// State shared by all workers.
pub struct Shared {
    model: Model,
    config: SolverConfig,
    integral_objective: bool,
    deadline: Instant,
    memory_limit: usize,
    cut_limit: usize,
    pool: RwLock<Vec<LinConstraint>>,
    state: Mutex<SearchState>,
    wakeup: Condvar,
}

impl Shared {
    pub fn new(
        model: Model,
        config: SolverConfig,
        incumbent: Option<Incumbent>,
        start: Instant,
    ) -> Shared {
        let mut queue = NodeQueue::default();
        queue.push(Node::root());

        let cut_limit =
            (config.cut_limit_factor * model.constraints().len() as f64).ceil() as usize;

        Shared {
            integral_objective: model.has_integral_objective(),
            // Capped so the deadline is representable.
            deadline: start + Duration::from_secs_f64(config.time_limit.min(1e9)),
            memory_limit: (config.tree_memory * 1024.0 * 1024.0) as usize,
            cut_limit,
            model,
            config,
            pool: RwLock::new(vec![]),
            state: Mutex::new(SearchState {
                queue,
                active: 0,
                incumbent,
                stop: None,
                aborted: false,
                lost_bound: None,
                reserved: 0,
                nodes: 0,
                next_id: 1,
            }),
            wakeup: Condvar::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<SearchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cuts(&self) -> RwLockReadGuard<Vec<LinConstraint>> {
        self.pool.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a subtree with the given bound cannot contain a better solution.
    fn dominated(&self, bound: f64, incumbent: Option<&Incumbent>) -> bool {
        let objective = match incumbent {
            Some(incumbent) => incumbent.objective,
            None => return false,
        };
        if self.integral_objective {
            (bound - INTEGRALITY_TOLERANCE).ceil() >= objective - INTEGRALITY_TOLERANCE
        } else {
            bound >= objective - INTEGRALITY_TOLERANCE
        }
    }

    fn should_stop(&self) -> bool {
        let state = self.lock_state();
        state.stop.is_some() || state.aborted || Instant::now() >= self.deadline
    }

    /// Take the next open node, waiting while other workers may still add nodes.
    fn next_node(&self) -> Option<Node> {
        let mut state = self.lock_state();
        loop {
            if state.stop.is_some() || state.aborted {
                return None;
            }
            let now = Instant::now();
            if now >= self.deadline {
                info!("Time limit reached");
                state.stop = Some(SearchStatus::TimeLimit);
                self.wakeup.notify_all();
                return None;
            }

            if let Some(node) = state.queue.pop() {
                if self.dominated(node.bound, state.incumbent.as_ref()) {
                    continue;
                }
                state.active += 1;
                state.nodes += 1;
                return Some(node);
            }

            if state.active == 0 {
                self.wakeup.notify_all();
                return None;
            }

            state = match self.wakeup.wait_timeout(state, self.deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }

    /// Queue the children of a processed node.
    fn finish_node(&self, children: Vec<Node>) {
        let mut state = self.lock_state();
        state.active -= 1;
        for mut child in children {
            if child.id == 0 {
                child.id = state.next_id;
                state.next_id += 1;
            }
            state.queue.push(child);
        }
        if state.stop.is_none() && state.queue.memory() + state.reserved > self.memory_limit {
            info!(
                "Tree memory limit reached with {} open nodes",
                state.queue.len()
            );
            state.stop = Some(SearchStatus::MemoryLimit);
        }
        self.wakeup.notify_all();
    }

    /// Account for the memory of a relaxation before building it.
    ///
    /// Stops the search with a memory limit if the open nodes and all relaxations in progress
    /// would exceed the tree memory.
    fn reserve(&self, bytes: usize) -> bool {
        let mut state = self.lock_state();
        if state.stop.is_some() || state.aborted {
            return false;
        }
        let used = state.queue.memory() + state.reserved;
        if used.saturating_add(bytes) > self.memory_limit {
            info!(
                "Tree memory limit reached, {} bytes in use and {} bytes needed for a relaxation",
                used, bytes
            );
            state.stop = Some(SearchStatus::MemoryLimit);
            self.wakeup.notify_all();
            return false;
        }
        state.reserved += bytes;
        true
    }

    fn release(&self, bytes: usize) {
        let mut state = self.lock_state();
        state.reserved -= bytes;
    }

    /// Record a subtree that could not be solved.
    fn give_up(&self, bound: f64) {
        let mut state = self.lock_state();
        state.lost_bound = Some(state.lost_bound.map_or(bound, |lost| lost.min(bound)));
    }

    /// Replace the incumbent if the solution is feasible and better.
    fn offer(&self, values: &[f64]) -> bool {
        let rounded: Vec<f64> = values
            .iter()
            .enumerate()
            .map(|(k, &value)| match self.model.kind(VarId::from_index(k)) {
                VarKind::Binary => value.round(),
                VarKind::Continuous => value,
            })
            .collect();
        if !self.model.is_feasible(&rounded, INTEGRALITY_TOLERANCE) {
            return false;
        }
        let objective = self.model.objective_value(&rounded);

        let mut state = self.lock_state();
        let improves = state
            .incumbent
            .as_ref()
            .map_or(true, |incumbent| objective < incumbent.objective - 1e-9);
        if improves {
            info!("New incumbent with objective {}", objective);
            state.incumbent = Some(Incumbent {
                objective,
                values: rounded,
            });
        }
        true
    }

    fn is_dominated(&self, bound: f64) -> bool {
        let state = self.lock_state();
        self.dominated(bound, state.incumbent.as_ref())
    }

    /// Solve a node, returning its children.
    ///
    /// A node interrupted by a limit is returned unchanged so it stays part of the bound.
    fn process_node(&self, node: Node, separator: &mut Option<Box<dyn Separator>>) -> Vec<Node> {
        let (lower, upper) = node.bounds(self.model.lower_bounds(), self.model.upper_bounds());
        let mut bound = node.bound;
        let mut rounds = 0;

        let values = loop {
            if self.should_stop() {
                return vec![Node { bound, ..node }];
            }

            let outcome = {
                let cuts = self.cuts();
                let relaxation = Relaxation {
                    model: &self.model,
                    lower: &lower,
                    upper: &upper,
                    cuts: &cuts,
                    presolve: self.config.presolve,
                    deadline: Some(self.deadline),
                };
                let bytes = relaxation.memory();
                if !self.reserve(bytes) {
                    return vec![Node { bound, ..node }];
                }
                let outcome = relaxation.solve();
                self.release(bytes);
                outcome
            };

            let solution = match outcome {
                LpOutcome::Optimal(solution) => solution,
                LpOutcome::Interrupted => {
                    debug!("Node {}: relaxation interrupted", node.id);
                    return vec![Node { bound, ..node }];
                }
                LpOutcome::Infeasible => {
                    debug!("Node {}: infeasible", node.id);
                    return vec![];
                }
                LpOutcome::Unbounded | LpOutcome::IterationLimit => {
                    warn!("Node {}: relaxation failed with {:?}", node.id, outcome);
                    return self.branch_unsolved(&node, &lower, &upper);
                }
            };

            bound = bound.max(solution.objective);
            if self.is_dominated(bound) {
                debug!("Node {}: pruned at bound {}", node.id, bound);
                return vec![];
            }

            if self.model.is_integral(&solution.values, INTEGRALITY_TOLERANCE)
                && self.offer(&solution.values)
            {
                return vec![];
            }

            let separator = match separator {
                Some(separator) => separator,
                None => break solution.values,
            };
            if rounds >= self.config.max_cut_rounds || self.cuts().len() >= self.cut_limit {
                break solution.values;
            }
            rounds += 1;

            let cuts = separator.separate(&RelaxationSnapshot::new(&solution.values, node.id));
            let violated = cuts
                .iter()
                .any(|cut| cut.violation(&solution.values) > VIOLATION_TOLERANCE);
            if !cuts.is_empty() {
                let mut pool = self.pool.write().unwrap_or_else(PoisonError::into_inner);
                pool.extend(cuts);
            }
            if !violated {
                break solution.values;
            }
        };

        if self.config.heuristic_freq > 0 && node.id % self.config.heuristic_freq == 0 {
            self.offer(&values);
            if self.is_dominated(bound) {
                return vec![];
            }
        }

        match self.most_fractional(&values, &lower, &upper) {
            Some(var) => {
                debug!(
                    "Node {}: bound {}, branching on {}",
                    node.id,
                    bound,
                    self.model.name(var)
                );
                vec![node.child(var, 1.0, bound), node.child(var, 0.0, bound)]
            }
            None => {
                warn!("Node {}: no branching candidate", node.id);
                self.give_up(bound);
                vec![]
            }
        }
    }

    /// Free binary variable closest to one half, ties by index.
    fn most_fractional(&self, values: &[f64], lower: &[f64], upper: &[f64]) -> Option<VarId> {
        let mut best: Option<(f64, VarId)> = None;
        for (k, &value) in values.iter().enumerate() {
            let var = VarId::from_index(k);
            if self.model.kind(var) != VarKind::Binary || lower[k] == upper[k] {
                continue;
            }
            let fractionality = (value - value.round()).abs();
            if fractionality <= INTEGRALITY_TOLERANCE {
                continue;
            }
            if best.map_or(true, |(current, _)| fractionality > current) {
                best = Some((fractionality, var));
            }
        }
        best.map(|(_, var)| var)
    }

    /// Branch on the first free binary variable of a node whose relaxation was not solved.
    fn branch_unsolved(&self, node: &Node, lower: &[f64], upper: &[f64]) -> Vec<Node> {
        let free = (0..self.model.var_count()).find(|&k| {
            self.model.kind(VarId::from_index(k)) == VarKind::Binary && lower[k] < upper[k]
        });
        match free {
            Some(k) => {
                let var = VarId::from_index(k);
                vec![
                    node.child(var, 1.0, node.bound),
                    node.child(var, 0.0, node.bound),
                ]
            }
            None => {
                if !self.offer(lower) {
                    self.give_up(node.bound);
                }
                vec![]
            }
        }
    }

    /// Summarize the search after all workers stopped.
    pub fn outcome(&self, elapsed: Duration) -> SearchOutcome {
        let state = self.lock_state();
        let cuts = self.cuts().len();

        let status = match state.stop {
            Some(status) => status,
            None if state.lost_bound.is_some() => SearchStatus::Incomplete,
            None if state.incumbent.is_some() => SearchStatus::Optimal,
            None => SearchStatus::Infeasible,
        };

        let incumbent_objective = state.incumbent.as_ref().map(|incumbent| incumbent.objective);
        let best_bound = match status {
            SearchStatus::Optimal => incumbent_objective.unwrap_or(std::f64::INFINITY),
            SearchStatus::Infeasible => std::f64::INFINITY,
            _ => state
                .queue
                .best_bound()
                .into_iter()
                .chain(state.lost_bound)
                .chain(incumbent_objective)
                .fold(std::f64::INFINITY, f64::min),
        };

        SearchOutcome {
            status,
            incumbent: state
                .incumbent
                .as_ref()
                .map(|incumbent| (incumbent.objective, incumbent.values.clone())),
            best_bound,
            nodes: state.nodes,
            cuts,
            elapsed,
        }
    }
}

/// Stops the other workers when a worker panics.
struct AbortOnPanic<'a>(&'a Shared);

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            let mut state = self.0.lock_state();
            state.aborted = true;
            self.0.wakeup.notify_all();
        }
    }
}

/// Process nodes until the search is done.
pub fn run_worker(shared: &Shared, mut separator: Option<Box<dyn Separator>>) {
    let _guard = AbortOnPanic(shared);
    while let Some(node) = shared.next_node() {
        let children = shared.process_node(node, &mut separator);
        shared.finish_node(children);
    }
}
