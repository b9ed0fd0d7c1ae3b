//! Search tree nodes and the open node queue.
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::mem::size_of;

use ordered_float::OrderedFloat;

use crate::model::VarId;

/// A subproblem given by fixing some variables of the model.
#[derive(Clone, Debug)]
pub struct Node {
    pub id: u64,
    pub depth: usize,
    /// Lower bound on the objective of all solutions in this subtree.
    pub bound: f64,
    pub fixings: Vec<(VarId, f64)>,
}

impl Node {
    pub fn root() -> Node {
        Node {
            id: 0,
            depth: 0,
            bound: std::f64::NEG_INFINITY,
            fixings: vec![],
        }
    }

    /// A child with one more fixed variable.
    pub fn child(&self, var: VarId, value: f64, bound: f64) -> Node {
        let mut fixings = Vec::with_capacity(self.fixings.len() + 1);
        fixings.extend_from_slice(&self.fixings);
        fixings.push((var, value));
        Node {
            id: 0,
            depth: self.depth + 1,
            bound,
            fixings,
        }
    }

    /// Variable bounds of the subproblem.
    pub fn bounds(&self, lower: &[f64], upper: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let mut lower = lower.to_vec();
        let mut upper = upper.to_vec();
        for &(var, value) in self.fixings.iter() {
            lower[var.index()] = value;
            upper[var.index()] = value;
        }
        (lower, upper)
    }

    /// Estimated memory used while this node is waiting in the queue.
    pub fn memory(&self) -> usize {
        size_of::<Node>() + self.fixings.capacity() * size_of::<(VarId, f64)>()
    }
}

struct QueuedNode(Node);

impl QueuedNode {
    /// Best bound first, then deepest, then oldest.
    fn key(&self) -> (Reverse<OrderedFloat<f64>>, usize, Reverse<u64>) {
        (
            Reverse(OrderedFloat(self.0.bound)),
            self.0.depth,
            Reverse(self.0.id),
        )
    }
}

impl PartialEq for QueuedNode {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for QueuedNode {}

impl PartialOrd for QueuedNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Open nodes ordered by bound.
#[derive(Default)]
pub struct NodeQueue {
    heap: BinaryHeap<QueuedNode>,
    memory: usize,
}

impl NodeQueue {
    pub fn push(&mut self, node: Node) {
        self.memory += node.memory();
        self.heap.push(QueuedNode(node));
    }

    /// Remove the node with the smallest bound.
    pub fn pop(&mut self) -> Option<Node> {
        let QueuedNode(node) = self.heap.pop()?;
        self.memory -= node.memory();
        Some(node)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Smallest bound of all open nodes.
    pub fn best_bound(&self) -> Option<f64> {
        self.heap.peek().map(|queued| queued.0.bound)
    }

    /// Estimated memory of all open nodes in bytes.
    pub fn memory(&self) -> usize {
        self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_bound_first() {
        let mut queue = NodeQueue::default();
        let root = Node::root();

        let mut a = root.child(VarId::from_index(0), 1.0, 3.0);
        a.id = 1;
        let mut b = root.child(VarId::from_index(0), 0.0, 2.0);
        b.id = 2;
        let mut c = b.child(VarId::from_index(1), 1.0, 2.0);
        c.id = 3;

        queue.push(a);
        queue.push(b);
        queue.push(c);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.best_bound(), Some(2.0));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop()).map(|node| node.id).collect();
        assert_eq!(order, vec![3, 2, 1]);
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.memory(), 0);
    }

    #[test]
    fn bounds_apply_fixings() {
        let node = Node::root()
            .child(VarId::from_index(1), 1.0, 0.0)
            .child(VarId::from_index(0), 0.0, 0.0);

        let (lower, upper) = node.bounds(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        assert_eq!(lower, vec![0.0, 1.0, 0.0]);
        assert_eq!(upper, vec![0.0, 1.0, 1.0]);
    }
}
