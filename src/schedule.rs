//! Phase-ordered execution driven by an optimizer.
//!
//! A [`Scheduler`] owns the components of a [`System`] together with its
//! connection graph and [`ExecutionPlan`], and runs them through the
//! lifecycle
//!
//! ```text
//! INIT -> RUN_PRE -> RUN_ITER* -> CONVERGED -> RUN_POST -> DONE
//! ```
//!
//! The driver calls [`Scheduler::iterate`] once per design point and
//! [`Scheduler::finalize`] (or [`Scheduler::terminate`]) once at the end.
//! PRE runs once and is cached, ITER runs on every call (plus any
//! perturbation passes needed for derivatives), and POST runs exactly once
//! from the last successful ITER state.

mod cache;
mod coloring;
mod config;
mod derivatives;
mod error;
mod result;
mod runner;
mod state;

pub use cache::{IterSnapshot, PreCache};
pub use coloring::{Coloring, ColoringError};
pub use config::{Approximation, CycleConfig, DifferenceForm, SchedulerConfig};
pub use error::{EvaluationFailure, SchedulerError, SetupError};
pub use result::{DesignPoint, EvaluationCounts, EvaluationResult, ResponseValue, TotalJacobian};
pub use state::SchedulerState;

use tracing::{debug, error, info, warn};

use crate::{
    graph::{ConfigurationError, ConnectionGraph, forward},
    model::{Component, ResponseKind, System},
    partition::{ExecutionPlan, Phase},
};

use runner::Runner;

/// How the driver ended the optimization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The optimizer converged.
    Converged,

    /// The optimizer stopped early, e.g. at an iteration limit.
    Stopped,

    /// The run failed; POST is skipped.
    Failed(String),
}

/// Executes a partitioned model on behalf of an optimizer.
///
/// # Example
///
/// ```
/// use twine_phases::{
///     model::{IndependentVars, System},
///     schedule::{DesignPoint, Scheduler, SchedulerConfig},
/// };
///
/// let mut system = System::new();
/// system
///     .add(IndependentVars::new("ivc").with("x", 1.0))
///     .add_design_var("ivc.x")
///     .add_objective("ivc.x");
///
/// let mut scheduler = Scheduler::setup(system, SchedulerConfig::default()).unwrap();
/// let result = scheduler.iterate(&DesignPoint::new().with("ivc.x", 3.0)).unwrap();
/// assert_eq!(result.objective("ivc.x"), Some(3.0));
///
/// scheduler.finalize().unwrap();
/// ```
pub struct Scheduler {
    components: Vec<Box<dyn Component>>,
    graph: ConnectionGraph,
    plan: ExecutionPlan,
    config: SchedulerConfig,
    groups: Vec<Vec<usize>>,
    influence: Vec<Vec<bool>>,
    store: Vec<f64>,
    baseline: Vec<f64>,
    pre_cache: Option<PreCache>,
    snapshot: Option<IterSnapshot>,
    state: SchedulerState,
    counts: EvaluationCounts,
    iteration: usize,
    failure: Option<String>,
}

/// Responses and derivatives from one successful evaluation.
struct Evaluation {
    objectives: Vec<ResponseValue>,
    constraints: Vec<ResponseValue>,
    gradients: Option<TotalJacobian>,
}

impl Scheduler {
    /// Builds the graph and execution plan of `system`.
    ///
    /// Each design variable starts in its own coloring group; see
    /// [`with_coloring`](Self::with_coloring).
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] if the model is structurally inconsistent,
    /// if the partition is infeasible and degradation is off, or if
    /// derivatives are approximated but an ITER component does not support
    /// it.
    pub fn setup(system: System, config: SchedulerConfig) -> Result<Self, SetupError> {
        let graph = ConnectionGraph::build(&system)?;
        let plan = ExecutionPlan::build(&graph, config.plan_options())?;

        if config.approximation.is_approximated() {
            let unsupported = plan
                .phase(Phase::Iter)
                .components()
                .find(|&node| !graph.component(node).supports_approximation());
            if let Some(node) = unsupported {
                return Err(ConfigurationError::ApproximationUnsupported(
                    graph.component(node).id().clone(),
                )
                .into());
            }
        }

        let influence = graph
            .design_vars()
            .iter()
            .map(|dv| forward(&graph, [dv.owner]))
            .collect();
        let store = graph.defaults();

        info!(
            components = graph.node_count(),
            design_vars = graph.design_vars().len(),
            responses = graph.responses().len(),
            approximation = ?config.approximation,
            "scheduler set up"
        );

        Ok(Self {
            components: system.into_components(),
            groups: coloring::uncolored(graph.design_vars().len()),
            influence,
            baseline: store.clone(),
            store,
            counts: EvaluationCounts::new(graph.node_count()),
            graph,
            plan,
            config,
            pre_cache: None,
            snapshot: None,
            state: SchedulerState::Init,
            iteration: 0,
            failure: None,
        })
    }

    /// Applies a coloring of the design variables.
    ///
    /// The coloring is checked even when
    /// [`coloring_enabled`](SchedulerConfig::coloring_enabled) is off, but
    /// only used when it is on.
    ///
    /// # Errors
    ///
    /// Returns [`SetupError::Coloring`] unless every design variable appears
    /// in exactly one group.
    pub fn with_coloring(mut self, coloring: &Coloring) -> Result<Self, SetupError> {
        let groups = coloring.resolve(self.graph.design_vars())?;
        if self.config.coloring_enabled {
            debug!(groups = groups.len(), "coloring applied");
            self.groups = groups;
        } else {
            debug!("coloring disabled; one group per design variable");
        }
        Ok(self)
    }

    /// Runs every PRE component once and freezes their outputs.
    ///
    /// Does nothing if PRE has already run.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::PreFailed`] if a PRE component fails, which
    /// also fails the run, and [`SchedulerError::RunFailed`] if the run has
    /// already failed.
    pub fn run_pre(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Init => {}
            SchedulerState::Failed => return Err(self.run_failed()),
            state => {
                debug!(%state, "PRE already ran");
                return Ok(());
            }
        }
        self.transition(SchedulerState::RunPre, "run PRE")?;

        let pins = self.pins();
        let pre = self.plan.phase(Phase::Pre);
        let outcome = Runner::new(
            &self.components,
            &self.graph,
            self.config.cycle,
            &mut self.counts,
        )
        .run_phase(pre, &mut self.store, &pins);

        if let Err(failure) = outcome {
            self.fail(failure.to_string());
            return Err(SchedulerError::PreFailed(failure));
        }

        let slots = pre
            .components()
            .flat_map(|node| self.graph.output_slots(node).iter().copied());
        let cache = PreCache::capture(&self.store, slots);
        info!(
            components = pre.len(),
            cached = cache.len(),
            "PRE complete"
        );

        self.pre_cache = Some(cache);
        self.baseline.clone_from(&self.store);
        Ok(())
    }

    /// Evaluates one design point.
    ///
    /// Runs PRE first if needed, then one ITER pass at the design point, plus
    /// the perturbation passes the configured approximation needs when the
    /// point requests gradients.
    ///
    /// A component failure is not an error: the result comes back with
    /// `failure` set and the store is rolled back to the last successful
    /// iteration.
    ///
    /// # Errors
    ///
    /// Returns a [`SchedulerError`] if the scheduler is past the loop, the
    /// point names an unknown design variable, or PRE fails.
    pub fn iterate(&mut self, point: &DesignPoint) -> Result<EvaluationResult, SchedulerError> {
        match self.state {
            SchedulerState::Init => self.run_pre()?,
            SchedulerState::RunPre | SchedulerState::RunIter => {}
            SchedulerState::Failed => return Err(self.run_failed()),
            state => {
                return Err(SchedulerError::InvalidState {
                    operation: "iterate",
                    state,
                });
            }
        }

        let design = self.resolve_design(point)?;
        self.transition(SchedulerState::RunIter, "iterate")?;
        self.iteration += 1;
        let iteration = self.iteration;
        let passes_before = self.counts.iter_passes();

        for (dv, value) in design {
            let slot = self.graph.design_vars()[dv].slot;
            self.store[slot] = value;
        }
        let outcome = self.evaluate(point.wants_gradients());
        let passes = self.counts.iter_passes() - passes_before;

        match outcome {
            Ok(evaluation) => {
                self.snapshot = Some(IterSnapshot::capture(iteration, &self.store));
                debug!(iteration, passes, "iteration complete");
                Ok(EvaluationResult {
                    iteration,
                    objectives: evaluation.objectives,
                    constraints: evaluation.constraints,
                    gradients: evaluation.gradients,
                    failure: None,
                    passes,
                })
            }
            Err(failure) => {
                warn!(iteration, %failure, "iteration failed; rolling back");
                self.rollback();
                Ok(EvaluationResult {
                    iteration,
                    objectives: Vec::new(),
                    constraints: Vec::new(),
                    gradients: None,
                    failure: Some(failure),
                    passes,
                })
            }
        }
    }

    /// Ends the loop and runs POST once.
    ///
    /// Runs PRE first if it never ran, and one ITER pass at the current design
    /// if no iteration ever succeeded, so POST always sees consistent inputs.
    /// Calling it again after success does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::RunFailed`] after an abort or failed
    /// termination, and the matching variant if PRE, the final ITER pass, or
    /// POST fails (each of which fails the run).
    pub fn finalize(&mut self) -> Result<(), SchedulerError> {
        match self.state {
            SchedulerState::Done => {
                debug!("already finalized");
                return Ok(());
            }
            SchedulerState::Failed => return Err(self.run_failed()),
            SchedulerState::Init => self.run_pre()?,
            _ => {}
        }

        if self.snapshot.is_none() {
            info!("no successful iteration; running ITER once before POST");
            self.transition(SchedulerState::RunIter, "finalize")?;
            if let Err(failure) = self.run_iter_pass() {
                self.fail(failure.to_string());
                return Err(SchedulerError::FinalIterationFailed(failure));
            }
            self.snapshot = Some(IterSnapshot::capture(self.iteration, &self.store));
        }

        self.transition(SchedulerState::Converged, "finalize")?;
        self.rollback();
        if let Some(cache) = &self.pre_cache {
            cache.reseed(&mut self.store);
        }

        self.transition(SchedulerState::RunPost, "finalize")?;
        let pins = self.pins();
        let post = self.plan.phase(Phase::Post);
        let post_components = post.len();
        let outcome = Runner::new(
            &self.components,
            &self.graph,
            self.config.cycle,
            &mut self.counts,
        )
        .run_phase(post, &mut self.store, &pins);

        if let Err(failure) = outcome {
            self.fail(failure.to_string());
            return Err(SchedulerError::PostFailed(failure));
        }

        self.transition(SchedulerState::Done, "finalize")?;
        info!(
            components = post_components,
            iterations = self.iteration,
            evaluations = self.counts.total_evaluations(),
            "POST complete"
        );
        Ok(())
    }

    /// Ends the run as reported by the driver.
    ///
    /// Converged and stopped runs are finalized; a failed run is aborted and
    /// POST is skipped.
    ///
    /// # Errors
    ///
    /// Returns whatever [`finalize`](Self::finalize) or
    /// [`abort`](Self::abort) returns.
    pub fn terminate(&mut self, termination: Termination) -> Result<(), SchedulerError> {
        match termination {
            Termination::Converged | Termination::Stopped => self.finalize(),
            Termination::Failed(reason) => self.abort(reason),
        }
    }

    /// Fails the run. POST will not run and later calls report the reason.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidState`] if the run already finished.
    pub fn abort(&mut self, reason: impl Into<String>) -> Result<(), SchedulerError> {
        if self.state == SchedulerState::Done {
            return Err(SchedulerError::InvalidState {
                operation: "abort",
                state: self.state,
            });
        }
        self.fail(reason.into());
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The execution plan built at setup.
    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// The connection graph built at setup.
    pub fn graph(&self) -> &ConnectionGraph {
        &self.graph
    }

    /// The configuration the scheduler was set up with.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of `iterate` calls so far, failed ones included.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Evaluation counts so far.
    pub fn counts(&self) -> &EvaluationCounts {
        &self.counts
    }

    /// Times the named component has been evaluated.
    pub fn evaluations(&self, component: &str) -> Option<usize> {
        let node = self.graph.node_index(component)?;
        Some(self.counts.evaluations(node))
    }

    /// Times the named component has computed partials.
    pub fn partials(&self, component: &str) -> Option<usize> {
        let node = self.graph.node_index(component)?;
        Some(self.counts.partials(node))
    }

    /// Current value of a variable path or alias in the live store.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.graph.resolve(name).map(|slot| self.store[slot])
    }

    /// Frozen PRE outputs, once PRE has run.
    pub fn pre_cache(&self) -> Option<&PreCache> {
        self.pre_cache.as_ref()
    }

    /// State left by the last successful ITER pass.
    pub fn last_snapshot(&self) -> Option<&IterSnapshot> {
        self.snapshot.as_ref()
    }

    /// Why the run failed, if it did.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn transition(
        &mut self,
        next: SchedulerState,
        operation: &'static str,
    ) -> Result<(), SchedulerError> {
        if !self.state.can_transition(next) {
            return Err(SchedulerError::InvalidState {
                operation,
                state: self.state,
            });
        }
        if self.state != next {
            debug!(from = %self.state, to = %next, "state transition");
        }
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, reason: String) {
        error!(state = %self.state, %reason, "run failed");
        self.state = SchedulerState::Failed;
        self.failure = Some(reason);
    }

    fn run_failed(&self) -> SchedulerError {
        SchedulerError::RunFailed {
            reason: self.failure.clone().unwrap_or_default(),
        }
    }

    /// Maps design-point names to design-variable indices.
    fn resolve_design(&self, point: &DesignPoint) -> Result<Vec<(usize, f64)>, SchedulerError> {
        point
            .values()
            .map(|(name, value)| {
                self.graph
                    .design_vars()
                    .iter()
                    .position(|dv| dv.name == name)
                    .map(|dv| (dv, value))
                    .ok_or_else(|| SchedulerError::UnknownDesignVariable(name.to_string()))
            })
            .collect()
    }

    /// Design-variable slots with their current values.
    fn pins(&self) -> Vec<(usize, f64)> {
        self.graph
            .design_vars()
            .iter()
            .map(|dv| (dv.slot, self.store[dv.slot]))
            .collect()
    }

    fn rollback(&mut self) {
        match &self.snapshot {
            Some(snapshot) => snapshot.restore(&mut self.store),
            None => self.store.copy_from_slice(&self.baseline),
        }
    }

    /// One ITER pass at the design values currently in the store.
    fn run_iter_pass(&mut self) -> Result<(), EvaluationFailure> {
        if let Some(cache) = &self.pre_cache {
            cache.reseed(&mut self.store);
        }
        let pins = self.pins();
        self.counts.record_iter_pass();
        Runner::new(
            &self.components,
            &self.graph,
            self.config.cycle,
            &mut self.counts,
        )
        .run_phase(self.plan.phase(Phase::Iter), &mut self.store, &pins)
    }

    fn evaluate(&mut self, gradients: bool) -> Result<Evaluation, EvaluationFailure> {
        self.run_iter_pass()?;

        let mut objectives = Vec::new();
        let mut constraints = Vec::new();
        for response in self.graph.responses() {
            let value = ResponseValue {
                name: response.name.clone(),
                kind: response.kind,
                value: self.store[response.slot],
            };
            match response.kind {
                ResponseKind::Objective => objectives.push(value),
                ResponseKind::Constraint => constraints.push(value),
            }
        }

        let gradients = if gradients {
            Some(self.totals()?)
        } else {
            None
        };

        Ok(Evaluation {
            objectives,
            constraints,
            gradients,
        })
    }

    /// Current response values, in registration order.
    fn response_values<T: Copy>(&self, store: &[T]) -> Vec<T> {
        self.graph
            .responses()
            .iter()
            .map(|response| store[response.slot])
            .collect()
    }
}
