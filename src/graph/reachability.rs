use tracing::debug;

use super::ConnectionGraph;

/// Influence and need sets of a connection graph.
///
/// - A component is *influenced* if it is reachable downstream from a
///   component owning a design variable (or from a forced-always-run
///   component).
/// - A component is *needed* if a component owning a response (or a
///   forced-always-run component) is reachable downstream from it.
///
/// Components that are both form the core iterative set: everything lying
/// on some path from a design variable to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reachability {
    influenced: Vec<bool>,
    needed: Vec<bool>,
}

impl Reachability {
    /// Runs both traversals over `graph`.
    pub fn analyze(graph: &ConnectionGraph) -> Self {
        let pinned = (0..graph.node_count()).filter(|&n| graph.component(n).is_always_run());

        let influenced = forward(
            graph,
            graph
                .design_vars()
                .iter()
                .map(|dv| dv.owner)
                .chain(pinned.clone()),
        );
        let needed = backward(
            graph,
            graph.responses().iter().map(|r| r.owner).chain(pinned),
        );

        let reach = Self { influenced, needed };
        debug!(
            influenced = reach.influenced.iter().filter(|&&b| b).count(),
            needed = reach.needed.iter().filter(|&&b| b).count(),
            core = reach.core().count(),
            "reachability analyzed"
        );
        reach
    }

    /// Whether `node` is downstream of a design variable.
    pub fn is_influenced(&self, node: usize) -> bool {
        self.influenced[node]
    }

    /// Whether `node` is upstream of a response.
    pub fn is_needed(&self, node: usize) -> bool {
        self.needed[node]
    }

    /// Whether `node` lies on a path from a design variable to a response.
    pub fn is_core(&self, node: usize) -> bool {
        self.influenced[node] && self.needed[node]
    }

    /// Core components in ascending index order.
    pub fn core(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.influenced.len()).filter(|&n| self.is_core(n))
    }
}

/// Marks every node reachable downstream from the seeds, seeds included.
pub fn forward(graph: &ConnectionGraph, seeds: impl IntoIterator<Item = usize>) -> Vec<bool> {
    traverse(graph.node_count(), seeds, |n| graph.successors(n))
}

/// Marks every node the seeds are reachable from, seeds included.
pub fn backward(graph: &ConnectionGraph, seeds: impl IntoIterator<Item = usize>) -> Vec<bool> {
    traverse(graph.node_count(), seeds, |n| graph.predecessors(n))
}

fn traverse<'g>(
    len: usize,
    seeds: impl IntoIterator<Item = usize>,
    next: impl Fn(usize) -> &'g [usize],
) -> Vec<bool> {
    let mut seen = vec![false; len];
    let mut stack: Vec<usize> = seeds.into_iter().collect();

    while let Some(node) = stack.pop() {
        if seen[node] {
            continue;
        }
        seen[node] = true;
        stack.extend(next(node).iter().copied().filter(|&n| !seen[n]));
    }

    seen
}
