use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::{
    graph::{ConnectionGraph, Reachability},
    model::ComponentId,
};

use super::{Partition, Phase};

/// An edge that carries values from a later phase into an earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakingEdge {
    pub from: ComponentId,
    pub from_phase: Phase,
    pub to: ComponentId,
    pub to_phase: Phase,
}

impl fmt::Display for LeakingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) -> {} ({})",
            self.from, self.from_phase, self.to, self.to_phase
        )
    }
}

/// The partition would let a component read a stale value.
///
/// Raised when a component placed in an earlier phase depends on one placed
/// in a later phase, or when a PRE component is influenced by a design
/// variable. Both point to a miscategorized dependency, typically a
/// component pinned to run once that in fact sees the design.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("infeasible partition: {}", describe(.edges, .influenced))]
pub struct GraphCycleError {
    /// Every edge whose target runs in an earlier phase than its source.
    pub edges: Vec<LeakingEdge>,

    /// PRE components reachable from a design variable.
    pub influenced: Vec<ComponentId>,
}

fn describe(edges: &[LeakingEdge], influenced: &[ComponentId]) -> String {
    let mut parts: Vec<String> = edges.iter().map(ToString::to_string).collect();
    parts.extend(
        influenced
            .iter()
            .map(|id| format!("{id} (PRE) depends on a design variable")),
    );
    parts.join(", ")
}

/// Checks that no value can flow backwards across phases.
///
/// Every edge is walked; an edge from ITER or POST into PRE, or from POST
/// into ITER, is a leak. All leaks are collected before failing.
///
/// # Errors
///
/// Returns a [`GraphCycleError`] listing every leaking edge and every
/// influenced PRE component.
pub fn validate(
    graph: &ConnectionGraph,
    reach: &Reachability,
    partition: &Partition,
) -> Result<(), GraphCycleError> {
    let edges: Vec<LeakingEdge> = graph
        .edges()
        .filter(|&(from, to)| partition.phase(to) < partition.phase(from))
        .map(|(from, to)| LeakingEdge {
            from: graph.component(from).id().clone(),
            from_phase: partition.phase(from),
            to: graph.component(to).id().clone(),
            to_phase: partition.phase(to),
        })
        .collect();

    let influenced: Vec<ComponentId> = partition
        .members(Phase::Pre)
        .filter(|&node| reach.is_influenced(node))
        .map(|node| graph.component(node).id().clone())
        .collect();

    if edges.is_empty() && influenced.is_empty() {
        return Ok(());
    }

    for edge in &edges {
        warn!(%edge, "stale-value leak across phases");
    }
    Err(GraphCycleError { edges, influenced })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        graph::Condensation,
        model::System,
        test_support::{LinearComp, reference_system},
    };

    fn check(system: &System) -> Result<(), GraphCycleError> {
        let graph = ConnectionGraph::build(system).unwrap();
        let reach = Reachability::analyze(&graph);
        let condensation = Condensation::compute(&graph);
        let partition = Partition::compute(&graph, &reach, &condensation);
        validate(&graph, &reach, &partition)
    }

    #[test]
    fn reference_model_is_feasible() {
        assert!(check(&reference_system()).is_ok());
    }

    #[test]
    fn run_once_downstream_of_design_is_a_leak() {
        let mut system = System::new();
        system
            .add(LinearComp::scale("dv", 1.0))
            .add(LinearComp::scale("cached", 1.0).map_info(|info| info.run_once()))
            .add(LinearComp::scale("obj", 1.0))
            .connect("dv.y", ["cached.x"])
            .connect("cached.y", ["obj.x"])
            .add_design_var("dv.x")
            .add_objective("obj.y");

        let err = check(&system).unwrap_err();
        assert_eq!(
            err.edges,
            [LeakingEdge {
                from: "dv".into(),
                from_phase: Phase::Iter,
                to: "cached".into(),
                to_phase: Phase::Pre,
            }]
        );
        assert_eq!(err.influenced, [ComponentId::from("cached")]);
        assert!(err.to_string().contains("dv (ITER) -> cached (PRE)"));
    }

    #[test]
    fn run_once_design_owner_is_reported() {
        let mut system = System::new();
        system
            .add(LinearComp::scale("c", 1.0).map_info(|info| info.run_once()))
            .add_design_var("c.x")
            .add_objective("c.y");

        let err = check(&system).unwrap_err();
        assert!(err.edges.is_empty());
        assert_eq!(err.influenced, [ComponentId::from("c")]);
    }

    #[test]
    fn run_once_off_the_design_path_is_fine() {
        let mut system = reference_system();
        system.add(LinearComp::scale("table", 1.0).map_info(|info| info.run_once()));
        assert!(check(&system).is_ok());
    }
}
