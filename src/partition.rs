//! Three-way partition of components into PRE, ITER and POST.
//!
//! - `ITER` holds every component on a path from a design variable to a
//!   response, closed under cycle membership, plus forced-always-run
//!   components.
//! - `PRE` holds the components no design variable can reach.
//! - `POST` holds the rest: influenced by the design, but not needed by any
//!   response.
//!
//! [`validate`] checks that no edge carries values backwards across phases,
//! and [`ExecutionPlan`] orders each phase for execution.

mod plan;
mod validate;

pub use plan::{Block, ExecutionPlan, Handoff, PhasePlan, PlanOptions};
pub use validate::{GraphCycleError, LeakingEdge, validate};

use std::fmt;

use tracing::debug;

use crate::{
    graph::{Condensation, ConnectionGraph, Reachability},
    model::Placement,
};

/// Execution phase of a component, ordered by when it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    /// Runs once, before the optimization loop.
    Pre,

    /// Runs on every iteration and every perturbation pass.
    Iter,

    /// Runs once, after the loop ends.
    Post,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Pre, Phase::Iter, Phase::Post];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Pre => "PRE",
            Self::Iter => "ITER",
            Self::Post => "POST",
        })
    }
}

/// A total mapping from component index to [`Phase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    phases: Vec<Phase>,
}

impl Partition {
    /// Partitions the graph from its reachability sets and SCCs.
    ///
    /// An SCC containing any core or forced-always-run component moves into
    /// ITER as a whole. Components pinned with [`Placement::RunOnce`] go to
    /// PRE regardless; [`validate`] reports it if that pin is wrong.
    pub fn compute(
        graph: &ConnectionGraph,
        reach: &Reachability,
        condensation: &Condensation,
    ) -> Self {
        let n = graph.node_count();

        let mut iter_scc = vec![false; condensation.sccs().len()];
        for node in 0..n {
            if reach.is_core(node) || graph.component(node).is_always_run() {
                iter_scc[condensation.scc_of(node)] = true;
            }
        }

        let phases = (0..n)
            .map(|node| {
                if graph.component(node).placement() == Placement::RunOnce {
                    Phase::Pre
                } else if iter_scc[condensation.scc_of(node)] {
                    Phase::Iter
                } else if reach.is_influenced(node) {
                    Phase::Post
                } else {
                    Phase::Pre
                }
            })
            .collect();

        let partition = Self { phases };
        debug!(
            pre = partition.count(Phase::Pre),
            iter = partition.count(Phase::Iter),
            post = partition.count(Phase::Post),
            "partition computed"
        );
        partition
    }

    /// Every component in ITER: the unpartitioned baseline.
    pub fn single_phase(components: usize) -> Self {
        Self {
            phases: vec![Phase::Iter; components],
        }
    }

    /// Phase assigned to `node`.
    pub fn phase(&self, node: usize) -> Phase {
        self.phases[node]
    }

    /// Components in `phase`, ascending index order.
    pub fn members(&self, phase: Phase) -> impl Iterator<Item = usize> + '_ {
        self.phases
            .iter()
            .enumerate()
            .filter(move |&(_, &p)| p == phase)
            .map(|(node, _)| node)
    }

    /// Number of components in `phase`.
    pub fn count(&self, phase: Phase) -> usize {
        self.phases.iter().filter(|&&p| p == phase).count()
    }

    /// Number of components partitioned.
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    /// Whether the partition covers no components.
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}
