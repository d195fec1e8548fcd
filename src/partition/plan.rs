use std::{fmt, slice};

use tracing::{info, warn};

use crate::{
    graph::{Condensation, ConnectionGraph, Reachability},
    model::{ComponentId, VarPath},
};

use super::{GraphCycleError, Partition, Phase, validate};

/// How the execution plan is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    /// Split the graph into PRE, ITER and POST. When false, every component
    /// runs in ITER.
    pub partitioning: bool,

    /// On an infeasible partition, fall back to a single ITER phase instead
    /// of failing.
    pub degrade: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            partitioning: true,
            degrade: false,
        }
    }
}

/// A unit of execution within a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// One acyclic component.
    Single(usize),

    /// Members of a feedback loop, in registration order, converged together.
    Cycle(Vec<usize>),
}

impl Block {
    /// Component indices in execution order.
    pub fn members(&self) -> &[usize] {
        match self {
            Self::Single(node) => slice::from_ref(node),
            Self::Cycle(members) => members,
        }
    }

    /// Whether the block is a feedback loop.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle(_))
    }
}

/// The ordered blocks of one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhasePlan {
    phase: Phase,
    blocks: Vec<Block>,
}

impl PhasePlan {
    fn new(phase: Phase, partition: &Partition, condensation: &Condensation) -> Self {
        let blocks = condensation
            .order()
            .iter()
            .filter_map(|&id| {
                let scc = condensation.scc(id);
                let members: Vec<usize> = scc
                    .members()
                    .iter()
                    .copied()
                    .filter(|&m| partition.phase(m) == phase)
                    .collect();

                if members.is_empty() {
                    None
                } else if scc.is_cyclic() {
                    Some(Block::Cycle(members))
                } else {
                    Some(Block::Single(members[0]))
                }
            })
            .collect();

        Self { phase, blocks }
    }

    /// The phase this plan runs.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Blocks in execution order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Components in execution order.
    pub fn components(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().flat_map(|block| block.members().iter().copied())
    }

    /// Number of components in the phase.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(|block| block.members().len()).sum()
    }

    /// Whether the phase has no components.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// A variable read across a phase boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handoff {
    pub source: VarPath,
    pub source_slot: usize,
    pub from: Phase,
    pub target: VarPath,
    pub target_slot: usize,
    pub to: Phase,
}

/// The ordered phases of a model and the values handed between them.
///
/// Built once at setup and never changed. Each phase lists its components
/// in the graph's global topological order, with feedback loops kept
/// together as [`Block::Cycle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    names: Vec<ComponentId>,
    partition: Partition,
    phases: [PhasePlan; 3],
    handoffs: Vec<Handoff>,
    partitioned: bool,
    degraded: bool,
}

impl ExecutionPlan {
    /// Partitions `graph` and orders each phase.
    ///
    /// # Errors
    ///
    /// Returns a [`GraphCycleError`] if the partition leaks stale values and
    /// `options.degrade` is off.
    pub fn build(graph: &ConnectionGraph, options: PlanOptions) -> Result<Self, GraphCycleError> {
        let condensation = Condensation::compute(graph);
        let n = graph.node_count();

        let (partition, degraded) = if options.partitioning {
            let reach = Reachability::analyze(graph);
            let partition = Partition::compute(graph, &reach, &condensation);
            match validate(graph, &reach, &partition) {
                Ok(()) => (partition, false),
                Err(error) if options.degrade => {
                    warn!(%error, "collapsing every component into ITER");
                    (Partition::single_phase(n), true)
                }
                Err(error) => return Err(error),
            }
        } else {
            (Partition::single_phase(n), false)
        };

        let phases = Phase::ALL.map(|phase| PhasePlan::new(phase, &partition, &condensation));

        let handoffs = graph
            .links()
            .iter()
            .filter_map(|link| {
                let source = graph.variable(link.source);
                let target = graph.variable(link.target);
                let (from, to) = (partition.phase(source.owner), partition.phase(target.owner));
                (from != to).then(|| Handoff {
                    source: source.path.clone(),
                    source_slot: link.source,
                    from,
                    target: target.path.clone(),
                    target_slot: link.target,
                    to,
                })
            })
            .collect();

        let plan = Self {
            names: (0..n).map(|node| graph.component(node).id().clone()).collect(),
            partition,
            phases,
            handoffs,
            partitioned: options.partitioning && !degraded,
            degraded,
        };

        info!(
            pre = plan.phase(Phase::Pre).len(),
            iter = plan.phase(Phase::Iter).len(),
            post = plan.phase(Phase::Post).len(),
            handoffs = plan.handoffs.len(),
            partitioned = plan.partitioned,
            degraded = plan.degraded,
            "execution plan ready"
        );
        Ok(plan)
    }

    /// The partition the plan was built from.
    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    /// The ordered plan for one phase.
    pub fn phase(&self, phase: Phase) -> &PhasePlan {
        match phase {
            Phase::Pre => &self.phases[0],
            Phase::Iter => &self.phases[1],
            Phase::Post => &self.phases[2],
        }
    }

    /// All cross-phase reads, in connection order.
    pub fn handoffs(&self) -> &[Handoff] {
        &self.handoffs
    }

    /// Cross-phase reads performed by components in `phase`.
    pub fn handoffs_into(&self, phase: Phase) -> impl Iterator<Item = &Handoff> {
        self.handoffs.iter().filter(move |h| h.to == phase)
    }

    /// Whether the graph is split into phases.
    ///
    /// False for the baseline and after degradation.
    pub fn is_partitioned(&self) -> bool {
        self.partitioned
    }

    /// Whether an infeasible partition was collapsed into ITER.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Id of the component at `node`.
    pub fn name(&self, node: usize) -> &ComponentId {
        &self.names[node]
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = if self.degraded {
            "degraded to a single phase"
        } else if self.partitioned {
            "partitioned"
        } else {
            "single phase"
        };
        writeln!(f, "execution plan ({mode})")?;

        for plan in &self.phases {
            write!(f, "  {:<5}({}):", plan.phase, plan.len())?;
            for block in &plan.blocks {
                match block {
                    Block::Single(node) => write!(f, " {}", self.names[*node])?,
                    Block::Cycle(members) => {
                        let names: Vec<&str> =
                            members.iter().map(|&m| self.names[m].as_str()).collect();
                        write!(f, " [{}]", names.join(", "))?;
                    }
                }
            }
            writeln!(f)?;
        }

        if self.handoffs.is_empty() {
            return Ok(());
        }
        writeln!(f, "  handoffs:")?;
        for h in &self.handoffs {
            writeln!(
                f,
                "    {} ({}) -> {} ({})",
                h.source, h.from, h.target, h.to
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{
        model::System,
        test_support::{LinearComp, reference_system},
    };

    fn ids(plan: &ExecutionPlan, phase: Phase) -> Vec<String> {
        plan.phase(phase)
            .components()
            .map(|n| plan.name(n).to_string())
            .collect()
    }

    #[test]
    fn reference_plan() {
        let graph = ConnectionGraph::build(&reference_system()).unwrap();
        let plan = ExecutionPlan::build(&graph, PlanOptions::default()).unwrap();

        assert!(plan.is_partitioned());
        assert_eq!(ids(&plan, Phase::Pre), ["pre1", "pre2"]);
        assert_eq!(ids(&plan, Phase::Iter), ["iter1", "iter2", "iter4", "iter3"]);
        assert_eq!(ids(&plan, Phase::Post), ["post1", "post2"]);

        let into_iter: Vec<String> = plan
            .handoffs_into(Phase::Iter)
            .map(|h| format!("{} -> {}", h.source, h.target))
            .collect();
        assert_eq!(into_iter, ["pre1.y -> iter1.x1", "pre2.y -> iter1.x2"]);
        assert_eq!(plan.handoffs_into(Phase::Post).count(), 3);
        assert_eq!(plan.handoffs_into(Phase::Pre).count(), 0);
    }

    #[test]
    fn baseline_is_a_single_phase() {
        let graph = ConnectionGraph::build(&reference_system()).unwrap();
        let options = PlanOptions {
            partitioning: false,
            ..PlanOptions::default()
        };
        let plan = ExecutionPlan::build(&graph, options).unwrap();

        assert!(!plan.is_partitioned());
        assert!(!plan.is_degraded());
        assert!(plan.phase(Phase::Pre).is_empty());
        assert!(plan.phase(Phase::Post).is_empty());
        assert_eq!(plan.phase(Phase::Iter).len(), 8);
        assert!(plan.handoffs().is_empty());
    }

    fn leaky_system() -> System {
        let mut system = System::new();
        system
            .add(LinearComp::scale("dv", 1.0))
            .add(LinearComp::scale("cached", 1.0).map_info(|info| info.run_once()))
            .add(LinearComp::scale("obj", 1.0))
            .connect("dv.y", ["cached.x"])
            .connect("cached.y", ["obj.x"])
            .add_design_var("dv.x")
            .add_objective("obj.y");
        system
    }

    #[test]
    fn infeasible_partition_fails_or_degrades() {
        let graph = ConnectionGraph::build(&leaky_system()).unwrap();

        let err = ExecutionPlan::build(&graph, PlanOptions::default()).unwrap_err();
        assert_eq!(err.edges.len(), 1);

        let options = PlanOptions {
            degrade: true,
            ..PlanOptions::default()
        };
        let plan = ExecutionPlan::build(&graph, options).unwrap();
        assert!(plan.is_degraded());
        assert!(!plan.is_partitioned());
        assert_eq!(ids(&plan, Phase::Iter), ["dv", "cached", "obj"]);
    }

    #[test]
    fn cycles_form_one_block() {
        let mut system = System::new();
        system
            .add(LinearComp::scale("dv", 1.0))
            .add(LinearComp::new("a", &[("x", 1.0), ("z", 0.5)]))
            .add(LinearComp::scale("b", 0.25))
            .connect("dv.y", ["a.x"])
            .connect("a.y", ["b.x"])
            .connect("b.y", ["a.z"])
            .add_design_var("dv.x")
            .add_objective("b.y");
        let graph = ConnectionGraph::build(&system).unwrap();
        let plan = ExecutionPlan::build(&graph, PlanOptions::default()).unwrap();

        assert_eq!(
            plan.phase(Phase::Iter).blocks(),
            [Block::Single(0), Block::Cycle(vec![1, 2])]
        );

        let report = plan.to_string();
        assert!(report.contains("ITER (3): dv [a, b]"), "{report}");
    }

    #[test]
    fn report_lists_phases_and_handoffs() {
        let graph = ConnectionGraph::build(&reference_system()).unwrap();
        let plan = ExecutionPlan::build(&graph, PlanOptions::default()).unwrap();
        let report = plan.to_string();

        assert!(report.starts_with("execution plan (partitioned)"));
        assert!(report.contains("PRE  (2): pre1 pre2"), "{report}");
        assert!(report.contains("pre1.y (PRE) -> post2.x1 (POST)"), "{report}");
    }
}
