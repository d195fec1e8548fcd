use thiserror::Error;

/// Errors a component reports from one of its evaluation calls.
///
/// Failures inside the iterative phase are recoverable: the scheduler hands
/// them back to the driver inside an evaluation result instead of aborting
/// the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The component's computation failed.
    #[error("evaluation failed: {0}")]
    Failed(String),

    /// An implicit solve did not converge.
    ///
    /// Reported by components with internal solvers, and by the scheduler
    /// itself when a coupled cycle fails to settle.
    #[error("did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged {
        /// Iterations (or sweeps) performed.
        iterations: usize,

        /// Largest change or residual at the final iteration.
        residual: f64,
    },

    /// The component read or wrote a variable it does not declare.
    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    /// The component does not implement the requested capability.
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

impl EvalError {
    /// Creates an [`EvalError::Failed`] with the given message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Returns `true` if this error reports a convergence failure.
    pub fn is_convergence_failure(&self) -> bool {
        matches!(self, Self::NotConverged { .. })
    }
}
