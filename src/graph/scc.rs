use std::{
    cmp::Reverse,
    collections::{BTreeSet, BinaryHeap},
};

use tracing::debug;

use super::ConnectionGraph;

/// A strongly connected component of the connection graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scc {
    members: Vec<usize>,
    cyclic: bool,
}

impl Scc {
    /// Member components in ascending registration order.
    pub fn members(&self) -> &[usize] {
        &self.members
    }

    /// Whether the members form a feedback loop.
    ///
    /// True for any SCC with more than one member and for a single
    /// component whose output feeds one of its own inputs.
    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    /// The member with the smallest registration index.
    pub fn leader(&self) -> usize {
        self.members[0]
    }
}

/// The graph contracted to its strongly connected components.
///
/// The condensation is a DAG. Its topological order breaks ties by the
/// smallest member index, so the order is deterministic and, for an acyclic
/// graph registered in dependency order, equal to registration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condensation {
    component_of: Vec<usize>,
    sccs: Vec<Scc>,
    order: Vec<usize>,
}

impl Condensation {
    /// Computes the SCCs of `graph` and their topological order.
    pub fn compute(graph: &ConnectionGraph) -> Self {
        let (component_of, groups) = Tarjan::new(graph).run();

        let sccs: Vec<Scc> = groups
            .into_iter()
            .map(|mut members| {
                members.sort_unstable();
                let cyclic = members.len() > 1 || graph.successors(members[0]).contains(&members[0]);
                Scc { members, cyclic }
            })
            .collect();

        let order = topological_order(graph, &component_of, &sccs);

        debug!(
            sccs = sccs.len(),
            cyclic = sccs.iter().filter(|scc| scc.cyclic).count(),
            "condensed graph"
        );

        Self {
            component_of,
            sccs,
            order,
        }
    }

    /// Id of the SCC containing `node`.
    pub fn scc_of(&self, node: usize) -> usize {
        self.component_of[node]
    }

    /// The SCC with index `id`.
    pub fn scc(&self, id: usize) -> &Scc {
        &self.sccs[id]
    }

    /// All SCCs, indexed by SCC id.
    pub fn sccs(&self) -> &[Scc] {
        &self.sccs
    }

    /// SCC ids in topological order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Components in topological order, SCC members kept together.
    pub fn leaf_order(&self) -> impl Iterator<Item = usize> + '_ {
        self.order
            .iter()
            .flat_map(|&id| self.sccs[id].members.iter().copied())
    }
}

const UNVISITED: usize = usize::MAX;

/// Iterative Tarjan's algorithm.
///
/// An explicit frame stack of `(node, next successor position)` replaces
/// recursion, so deep chains cannot overflow the call stack.
struct Tarjan<'g> {
    graph: &'g ConnectionGraph,
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
}

impl<'g> Tarjan<'g> {
    fn new(graph: &'g ConnectionGraph) -> Self {
        let n = graph.node_count();
        Self {
            graph,
            index: vec![UNVISITED; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::with_capacity(n),
            next_index: 0,
        }
    }

    fn visit(&mut self, node: usize) {
        self.index[node] = self.next_index;
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }

    fn run(mut self) -> (Vec<usize>, Vec<Vec<usize>>) {
        let n = self.graph.node_count();
        let mut component_of = vec![0; n];
        let mut groups = Vec::new();
        let mut frames: Vec<(usize, usize)> = Vec::new();

        for root in 0..n {
            if self.index[root] != UNVISITED {
                continue;
            }
            self.visit(root);
            frames.push((root, 0));

            while let Some(frame) = frames.last_mut() {
                let node = frame.0;
                if let Some(&next) = self.graph.successors(node).get(frame.1) {
                    frame.1 += 1;
                    if self.index[next] == UNVISITED {
                        self.visit(next);
                        frames.push((next, 0));
                    } else if self.on_stack[next] {
                        self.lowlink[node] = self.lowlink[node].min(self.index[next]);
                    }
                    continue;
                }

                frames.pop();
                if let Some(&(parent, _)) = frames.last() {
                    self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
                }

                if self.lowlink[node] == self.index[node] {
                    let id = groups.len();
                    let mut members = Vec::new();
                    while let Some(member) = self.stack.pop() {
                        self.on_stack[member] = false;
                        component_of[member] = id;
                        members.push(member);
                        if member == node {
                            break;
                        }
                    }
                    groups.push(members);
                }
            }
        }

        (component_of, groups)
    }
}

/// Kahn's algorithm over the condensation, smallest leader first.
fn topological_order(graph: &ConnectionGraph, component_of: &[usize], sccs: &[Scc]) -> Vec<usize> {
    let edges: BTreeSet<(usize, usize)> = graph
        .edges()
        .map(|(from, to)| (component_of[from], component_of[to]))
        .filter(|(from, to)| from != to)
        .collect();

    let mut successors = vec![Vec::new(); sccs.len()];
    let mut in_degree = vec![0usize; sccs.len()];
    for &(from, to) in &edges {
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<(usize, usize)>> = sccs
        .iter()
        .enumerate()
        .filter(|&(id, _)| in_degree[id] == 0)
        .map(|(id, scc)| Reverse((scc.leader(), id)))
        .collect();

    let mut order = Vec::with_capacity(sccs.len());
    while let Some(Reverse((_, id))) = ready.pop() {
        order.push(id);
        for &next in &successors[id] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((sccs[next].leader(), next)));
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        model::System,
        test_support::{LinearComp, reference_system},
    };

    #[test]
    fn acyclic_reference_model_keeps_registration_order() {
        let graph = ConnectionGraph::build(&reference_system()).unwrap();
        let condensation = Condensation::compute(&graph);

        assert_eq!(condensation.sccs().len(), 8);
        assert!(condensation.sccs().iter().all(|scc| !scc.is_cyclic()));
        assert_eq!(
            condensation.leaf_order().collect::<Vec<_>>(),
            (0..8).collect::<Vec<_>>()
        );
    }

    #[test]
    fn cycle_is_contracted_and_ordered() {
        // src -> a <-> b -> sink, registered out of dependency order.
        let mut system = System::new();
        system
            .add(LinearComp::scale("sink", 1.0))
            .add(LinearComp::new("b", &[("x", 0.25)]))
            .add(LinearComp::new("a", &[("x", 1.0), ("z", 0.5)]))
            .add(LinearComp::scale("src", 1.0))
            .connect("src.y", ["a.x"])
            .connect("a.y", ["b.x"])
            .connect("b.y", ["a.z", "sink.x"]);
        let graph = ConnectionGraph::build(&system).unwrap();
        let condensation = Condensation::compute(&graph);

        assert_eq!(condensation.sccs().len(), 3);
        assert_eq!(condensation.scc_of(1), condensation.scc_of(2));

        let cycle = condensation.scc(condensation.scc_of(2));
        assert!(cycle.is_cyclic());
        assert_eq!(cycle.members(), [1, 2]);

        assert_eq!(condensation.leaf_order().collect::<Vec<_>>(), [3, 1, 2, 0]);
    }

    #[test]
    fn self_loop_is_cyclic() {
        let mut system = System::new();
        system
            .add(LinearComp::new("c", &[("x", 1.0), ("z", 0.5)]))
            .connect("c.y", ["c.z"]);
        let graph = ConnectionGraph::build(&system).unwrap();
        let condensation = Condensation::compute(&graph);

        assert_eq!(condensation.sccs().len(), 1);
        assert!(condensation.scc(0).is_cyclic());
    }

    #[test]
    fn long_chain_does_not_recurse() {
        let mut system = System::new();
        let n = 5_000;
        for i in 0..n {
            system.add(LinearComp::scale(format!("c{i}"), 1.0));
        }
        for i in 1..n {
            system.connect(format!("c{}.y", i - 1), [format!("c{i}.x")]);
        }
        let graph = ConnectionGraph::build(&system).unwrap();
        let condensation = Condensation::compute(&graph);

        assert_eq!(condensation.sccs().len(), n);
        assert!(condensation.leaf_order().eq(0..n));
    }
}
