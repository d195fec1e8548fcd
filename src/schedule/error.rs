use thiserror::Error;

use crate::{
    graph::ConfigurationError,
    model::{ComponentId, EvalError},
    partition::{GraphCycleError, Phase},
};

use super::{ColoringError, SchedulerState};

/// A component failed while a phase was running.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("component `{component}` failed during {phase}: {source}")]
pub struct EvaluationFailure {
    pub component: ComponentId,
    pub phase: Phase,
    pub source: EvalError,
}

impl EvaluationFailure {
    /// Whether the failure is a feedback loop or internal solve that did not
    /// converge.
    pub fn is_convergence_failure(&self) -> bool {
        self.source.is_convergence_failure()
    }
}

/// Errors raised while setting up a scheduler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SetupError {
    /// The model's structure is inconsistent.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The partition would leak stale values and degradation is off.
    #[error(transparent)]
    GraphCycle(#[from] GraphCycleError),

    /// The supplied coloring does not match the design variables.
    #[error(transparent)]
    Coloring(#[from] ColoringError),
}

/// Errors raised by scheduler entry points.
///
/// ITER failures are not among them: those come back inside an
/// [`EvaluationResult`](super::EvaluationResult).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    /// The call is not allowed in the current state.
    #[error("cannot {operation} in state {state}")]
    InvalidState {
        operation: &'static str,
        state: SchedulerState,
    },

    /// A design point names a variable that is not registered.
    #[error("unknown design variable `{0}`")]
    UnknownDesignVariable(String),

    /// A PRE component failed; the run cannot continue.
    #[error("PRE failed")]
    PreFailed(#[source] EvaluationFailure),

    /// A POST component failed.
    #[error("POST failed")]
    PostFailed(#[source] EvaluationFailure),

    /// The ITER pass run before POST, for lack of a successful one, failed.
    #[error("final ITER pass failed")]
    FinalIterationFailed(#[source] EvaluationFailure),

    /// The run was aborted or ended in failure; POST was skipped.
    #[error("run failed: {reason}")]
    RunFailed { reason: String },
}
