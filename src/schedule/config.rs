use crate::{
    partition::PlanOptions,
    support::constraint::{Constrained, ConstraintError, StrictlyPositive},
};

/// Scheduler configuration.
///
/// Built once at setup and never changed during a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    /// Split the model into PRE, ITER and POST phases.
    ///
    /// When false every component runs on every iteration, which is the
    /// reference behavior partitioned execution must reproduce.
    pub enable_partitioning: bool,

    /// Collapse an infeasible partition into a single ITER phase (with a
    /// warning) instead of failing setup.
    pub degrade_on_infeasible_partition: bool,

    /// How total derivatives are computed when a design point requests them.
    pub approximation: Approximation,

    /// Use the supplied coloring to perturb several design variables per
    /// pass. When false each design variable gets its own pass.
    pub coloring_enabled: bool,

    /// Convergence settings for feedback loops.
    pub cycle: CycleConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_partitioning: true,
            degrade_on_infeasible_partition: false,
            approximation: Approximation::Exact,
            coloring_enabled: true,
            cycle: CycleConfig::default(),
        }
    }
}

impl SchedulerConfig {
    /// The unpartitioned baseline with otherwise identical settings.
    #[must_use]
    pub fn baseline(self) -> Self {
        Self {
            enable_partitioning: false,
            ..self
        }
    }

    pub(super) fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            partitioning: self.enable_partitioning,
            degrade: self.degrade_on_infeasible_partition,
        }
    }
}

/// Stencil of a finite-difference approximation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceForm {
    /// `(f(x + h) - f(x)) / h`, one extra pass per group.
    Forward,

    /// `(f(x + h) - f(x - h)) / 2h`, two extra passes per group.
    Central,
}

/// Method used for total derivatives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Approximation {
    /// Analytic partials from every ITER component, propagated forward.
    Exact,

    /// Finite differences over ITER passes.
    FiniteDifference {
        step: Constrained<f64, StrictlyPositive>,
        form: DifferenceForm,
    },

    /// Complex-step differentiation over complex-valued ITER passes.
    ComplexStep {
        step: Constrained<f64, StrictlyPositive>,
    },
}

impl Approximation {
    pub const DEFAULT_FD_STEP: Constrained<f64, StrictlyPositive> = Constrained::from_const(1e-6);
    pub const DEFAULT_CS_STEP: Constrained<f64, StrictlyPositive> = Constrained::from_const(1e-40);

    /// Forward differences with the given step.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstraintError`] if `step` is not strictly positive.
    pub fn forward_difference(step: f64) -> Result<Self, ConstraintError> {
        Ok(Self::FiniteDifference {
            step: StrictlyPositive::new(step)?,
            form: DifferenceForm::Forward,
        })
    }

    /// Central differences with the given step.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstraintError`] if `step` is not strictly positive.
    pub fn central_difference(step: f64) -> Result<Self, ConstraintError> {
        Ok(Self::FiniteDifference {
            step: StrictlyPositive::new(step)?,
            form: DifferenceForm::Central,
        })
    }

    /// Complex step with the given step.
    ///
    /// # Errors
    ///
    /// Returns a [`ConstraintError`] if `step` is not strictly positive.
    pub fn complex_step(step: f64) -> Result<Self, ConstraintError> {
        Ok(Self::ComplexStep {
            step: StrictlyPositive::new(step)?,
        })
    }

    /// Whether derivatives come from perturbed ITER passes.
    pub fn is_approximated(&self) -> bool {
        !matches!(self, Self::Exact)
    }

    /// Extra ITER passes needed per coloring group.
    pub fn passes_per_group(&self) -> usize {
        match self {
            Self::Exact => 0,
            Self::FiniteDifference {
                form: DifferenceForm::Forward,
                ..
            }
            | Self::ComplexStep { .. } => 1,
            Self::FiniteDifference {
                form: DifferenceForm::Central,
                ..
            } => 2,
        }
    }
}

/// Nonlinear block Gauss-Seidel settings for feedback loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleConfig {
    /// Maximum number of sweeps over the loop's members.
    pub max_iterations: usize,

    /// Largest output change between sweeps accepted as converged.
    pub tolerance: Constrained<f64, StrictlyPositive>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: Constrained::from_const(1e-10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pass_counts_per_group() {
        assert_eq!(Approximation::Exact.passes_per_group(), 0);
        assert_eq!(
            Approximation::forward_difference(1e-6)
                .unwrap()
                .passes_per_group(),
            1
        );
        assert_eq!(
            Approximation::central_difference(1e-6)
                .unwrap()
                .passes_per_group(),
            2
        );
        assert_eq!(
            Approximation::complex_step(1e-30).unwrap().passes_per_group(),
            1
        );
    }

    #[test]
    fn steps_must_be_positive() {
        assert_eq!(
            Approximation::forward_difference(0.0),
            Err(ConstraintError::Zero)
        );
        assert_eq!(
            Approximation::complex_step(-1.0),
            Err(ConstraintError::Negative)
        );
        assert!(Approximation::central_difference(f64::NAN).is_err());
    }

    #[test]
    fn baseline_only_turns_off_partitioning() {
        let config = SchedulerConfig {
            coloring_enabled: false,
            ..SchedulerConfig::default()
        };
        let baseline = config.baseline();
        assert!(!baseline.enable_partitioning);
        assert!(!baseline.coloring_enabled);
        assert_eq!(baseline.cycle, config.cycle);
    }
}
