//! Bookkeeping for generated cuts.
use std::hash::BuildHasherDefault;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashSet;
use rustc_hash::FxHasher;

use colorcut_graph::Graph;

use crate::separate::{CliqueCut, CutKey};

type FxDashSet<K> = DashSet<K, BuildHasherDefault<FxHasher>>;

/// Filters repeated cuts and counts accepted ones.
///
/// Shared between all search workers. Accepted cuts are valid for the whole search, so a cut is
/// accepted at most once no matter which node found it. Keys live in a sharded set, so a worker
/// only ever waits for a single insertion into the same shard.
#[derive(Default)]
pub struct CutManager {
    submitted: FxDashSet<CutKey>,
    accepted: AtomicU64,
    rejected: AtomicU64,
}

impl CutManager {
    pub fn new() -> CutManager {
        CutManager::default()
    }

    /// Accept all cuts not submitted before, keeping their order.
    ///
    /// The counter is incremented once per call by the number of accepted cuts.
    pub fn submit(&self, graph: &Graph, cuts: Vec<CliqueCut>) -> Vec<CliqueCut> {
        if cuts.is_empty() {
            return cuts;
        }

        let offered = cuts.len();
        let accepted: Vec<CliqueCut> = cuts
            .into_iter()
            .filter(|cut| {
                debug_assert_eq!(cut.validate(graph), Ok(()));
                self.submitted.insert(cut.key())
            })
            .collect();

        self.accepted
            .fetch_add(accepted.len() as u64, Ordering::Relaxed);
        self.rejected
            .fetch_add((offered - accepted.len()) as u64, Ordering::Relaxed);

        accepted
    }

    /// Total number of accepted cuts.
    pub fn cuts_generated(&self) -> u64 {
        self.accepted.load(Ordering::Relaxed)
    }

    /// Total number of cuts dropped as repeats.
    pub fn repeats(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
