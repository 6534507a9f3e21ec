//! Edge collapse simplification
//!
//! Greedy quadric error metric (QEM) reduction: every iteration collapses the
//! cheapest candidate edge into its lower-id endpoint and re-scores the edges
//! around the survivor. The number of iterations is fixed up front from the
//! retain fraction; there is no quality floor or convergence test.

use crate::store::{ConnectivityStore, EdgeId};
use crate::MeshSimplifier;
use priority_queue::PriorityQueue;
use remeshcrate_core::{Error, Result, TriangleMesh};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info, warn};

// ============================================================
// Configuration Types
// ============================================================

/// How the cheapest edge is found each iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionStrategy {
    /// Scan the whole candidate set every iteration.
    #[default]
    LinearScan,
    /// Keep candidates in an indexed priority queue updated per collapse.
    PriorityQueue,
}

/// What to do when the candidate set runs dry before the budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExhaustionPolicy {
    /// Log a warning and return the mesh as reduced so far.
    #[default]
    StopEarly,
    /// Return [`Error::BudgetExceeded`].
    Fail,
}

/// Parameters for [`EdgeCollapseSimplifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimplifyParams {
    /// Fraction of the original vertex count to keep, in `[0, 1]`.
    /// `0` collapses down to a single vertex.
    pub retain_fraction: f32,
    pub strategy: SelectionStrategy,
    pub on_exhaustion: ExhaustionPolicy,
}

impl Default for SimplifyParams {
    fn default() -> Self {
        Self {
            retain_fraction: 0.5,
            strategy: SelectionStrategy::LinearScan,
            on_exhaustion: ExhaustionPolicy::StopEarly,
        }
    }
}

impl SimplifyParams {
    pub fn new(retain_fraction: f32) -> Self {
        Self {
            retain_fraction,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.retain_fraction) {
            return Err(Error::InvalidData(format!(
                "Retain fraction must be between 0.0 and 1.0, got {}",
                self.retain_fraction
            )));
        }
        Ok(())
    }
}

/// Counters reported by a simplification run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimplifyStats {
    pub initial_vertices: usize,
    pub final_vertices: usize,
    pub final_triangles: usize,
    /// Collapses the budget asked for
    pub requested: usize,
    /// Collapses actually performed
    pub performed: usize,
    pub removed_triangles: usize,
    /// The candidate set ran out before `requested` was reached
    pub exhausted: bool,
}

/// Number of collapses for a retain fraction.
///
/// `round((1 - f) * n)`, or `n - 1` when `f == 0`.
pub fn iteration_budget(vertex_count: usize, retain_fraction: f32) -> usize {
    if vertex_count == 0 {
        return 0;
    }
    if retain_fraction == 0.0 {
        return vertex_count - 1;
    }
    ((1.0 - retain_fraction as f64) * vertex_count as f64).round() as usize
}

// ============================================================
// Edge Cost for Priority Queue
// ============================================================

#[derive(Debug, Clone, Copy)]
struct EdgeCost {
    edge: EdgeId,
    cost: f32,
}

impl PartialEq for EdgeCost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for EdgeCost {}

impl PartialOrd for EdgeCost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeCost {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-queue: smallest cost first, then lowest edge id
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.edge.cmp(&self.edge))
    }
}

// ============================================================
// Edge Collapse Simplifier
// ============================================================

/// Greedy QEM edge collapse simplifier.
///
/// Quadrics are computed once per vertex before the first collapse and then
/// carried through collapses as sums. Each collapse merges the higher-id
/// endpoint of the cheapest edge into the lower-id one at their midpoint.
#[derive(Debug, Clone, Default)]
pub struct EdgeCollapseSimplifier {
    pub params: SimplifyParams,
}

impl EdgeCollapseSimplifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: SimplifyParams) -> Self {
        Self { params }
    }

    /// Simplify the store in place.
    pub fn run(&self, store: &mut ConnectivityStore) -> Result<SimplifyStats> {
        self.params.validate()?;

        let initial_vertices = store.vertex_count();
        let requested = iteration_budget(initial_vertices, self.params.retain_fraction);
        let mut stats = SimplifyStats {
            initial_vertices,
            requested,
            ..SimplifyStats::default()
        };

        store.initialize_quadrics()?;
        store.score_all_edges()?;
        debug!(
            vertices = initial_vertices,
            edges = store.edge_count(),
            requested,
            strategy = ?self.params.strategy,
            "initial quadrics and edge costs computed"
        );

        let completed = match self.params.strategy {
            SelectionStrategy::LinearScan => self.collapse_linear(store, &mut stats)?,
            SelectionStrategy::PriorityQueue => self.collapse_queued(store, &mut stats)?,
        };

        stats.final_vertices = store.vertex_count();
        stats.final_triangles = store.triangle_count();

        if !completed {
            match self.params.on_exhaustion {
                ExhaustionPolicy::Fail => {
                    return Err(Error::BudgetExceeded {
                        requested,
                        performed: stats.performed,
                    });
                }
                ExhaustionPolicy::StopEarly => {
                    warn!(
                        requested,
                        performed = stats.performed,
                        "candidate edges exhausted, stopping early"
                    );
                    stats.exhausted = true;
                }
            }
        }

        info!(
            from = stats.initial_vertices,
            to = stats.final_vertices,
            triangles = stats.final_triangles,
            collapses = stats.performed,
            "simplification finished"
        );
        Ok(stats)
    }

    /// Returns `false` if the candidate set emptied before the budget was spent.
    fn collapse_linear(&self, store: &mut ConnectivityStore, stats: &mut SimplifyStats) -> Result<bool> {
        for _ in 0..stats.requested {
            let Some(edge) = store.lowest_cost_edge() else {
                return Ok(false);
            };
            let (keep, drop) = store.edge_checked(edge)?.vertices();
            let outcome = store.collapse(keep, drop)?;
            store.rescore_edges_around(keep)?;

            stats.performed += 1;
            stats.removed_triangles += outcome.removed_triangles.len();
        }
        Ok(true)
    }

    fn collapse_queued(&self, store: &mut ConnectivityStore, stats: &mut SimplifyStats) -> Result<bool> {
        let mut queue: PriorityQueue<EdgeId, EdgeCost> = store
            .edges()
            .map(|e| (e.id(), EdgeCost { edge: e.id(), cost: e.cost() }))
            .collect();

        for _ in 0..stats.requested {
            let Some((edge, _)) = queue.pop() else {
                return Ok(false);
            };
            let (keep, drop) = store.edge_checked(edge)?.vertices();
            let outcome = store.collapse(keep, drop)?;
            for e in &outcome.removed_edges {
                queue.remove(e);
            }
            for e in store.rescore_edges_around(keep)? {
                let cost = store.edge_checked(e)?.cost();
                queue.push(e, EdgeCost { edge: e, cost });
            }

            stats.performed += 1;
            stats.removed_triangles += outcome.removed_triangles.len();
        }
        Ok(true)
    }
}

impl MeshSimplifier for EdgeCollapseSimplifier {
    fn simplify(&self, mesh: &TriangleMesh, retain_fraction: f32) -> Result<TriangleMesh> {
        let params = SimplifyParams {
            retain_fraction,
            ..self.params.clone()
        };
        let mut store = ConnectivityStore::from_mesh(mesh)?;
        EdgeCollapseSimplifier::with_params(params).run(&mut store)?;
        Ok(store.to_triangle_mesh())
    }
}
