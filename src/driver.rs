//! Adapter that lets Twine solvers drive a [`Scheduler`].
//!
//! [`PhasedModel`] implements [`twine_core::Model`] with a [`DesignPoint`] as
//! input and an [`EvaluationResult`] as output, so any solver that accepts a
//! model can run the optimization loop. PRE runs on the first call, ITER on
//! every call, and POST when the caller hands the scheduler back with
//! [`PhasedModel::finish`].

use std::cell::RefCell;

use thiserror::Error;
use twine_core::Model;

use crate::schedule::{
    DesignPoint, EvaluationFailure, EvaluationResult, Scheduler, SchedulerError, Termination,
};

/// Errors from a [`PhasedModel`] call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The scheduler rejected the call.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// A component failed at this design point.
    ///
    /// The scheduler has rolled back to the last good state, so the caller
    /// can try another point.
    #[error("evaluation failed")]
    Evaluation(#[source] EvaluationFailure),
}

/// A [`Scheduler`] seen as a [`Model`].
pub struct PhasedModel {
    scheduler: RefCell<Scheduler>,
}

impl PhasedModel {
    /// Wraps a scheduler that has not started yet.
    pub fn new(scheduler: Scheduler) -> Self {
        Self {
            scheduler: RefCell::new(scheduler),
        }
    }

    /// Ends the run and returns the scheduler.
    ///
    /// # Errors
    ///
    /// Returns a [`SchedulerError`] if POST, or the work that must precede
    /// it, fails.
    pub fn finish(self, termination: Termination) -> Result<Scheduler, SchedulerError> {
        let mut scheduler = self.scheduler.into_inner();
        scheduler.terminate(termination)?;
        Ok(scheduler)
    }

    /// Returns the scheduler without ending the run.
    pub fn into_scheduler(self) -> Scheduler {
        self.scheduler.into_inner()
    }
}

impl Model for PhasedModel {
    type Input = DesignPoint;
    type Output = EvaluationResult;
    type Error = DriverError;

    fn call(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
        let mut result = self.scheduler.borrow_mut().iterate(input)?;
        match result.failure.take() {
            Some(failure) => Err(DriverError::Evaluation(failure)),
            None => Ok(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use approx::assert_relative_eq;
    use twine_core::EquationProblem;
    use twine_solvers::equation::bisection;

    use crate::{
        model::{IndependentVars, System},
        schedule::SchedulerConfig,
        test_support::{Fragile, reference_system},
    };

    #[test]
    fn calls_iterate_and_finishes_with_post() {
        let scheduler = Scheduler::setup(reference_system(), SchedulerConfig::default()).unwrap();
        let model = PhasedModel::new(scheduler);

        let output = model
            .call(&DesignPoint::new().with("iter1.x3", 6.0))
            .unwrap();
        assert_relative_eq!(output.constraint("iter2.y").unwrap(), 10.0);

        let scheduler = model.finish(Termination::Converged).unwrap();
        assert_eq!(scheduler.evaluations("post1"), Some(1));
        assert_relative_eq!(scheduler.value("post1.y").unwrap(), 8.0 * 840.0);
    }

    #[test]
    fn failed_points_are_errors() {
        let mut system = System::new();
        system
            .add(IndependentVars::new("ivc").with("x", 1.0))
            .add(Fragile::above("f", 5.0))
            .connect("ivc.x", ["f.x"])
            .add_design_var("ivc.x")
            .add_objective("f.y");
        let model = PhasedModel::new(Scheduler::setup(system, SchedulerConfig::default()).unwrap());

        let err = model.call(&DesignPoint::new().with("ivc.x", 7.0)).unwrap_err();
        assert!(matches!(err, DriverError::Evaluation(ref f) if f.component.as_str() == "f"));

        let err = model.call(&DesignPoint::new().with("nope", 1.0)).unwrap_err();
        assert_eq!(
            err,
            DriverError::Scheduler(SchedulerError::UnknownDesignVariable("nope".to_string()))
        );

        assert!(model.call(&DesignPoint::new().with("ivc.x", 2.0)).is_ok());
        let scheduler = model.into_scheduler();
        assert_eq!(scheduler.evaluations("f"), Some(2));
    }

    /// Drives `iter1.x3` until the constraint `iter2.y` reaches a target.
    struct ConstraintTarget(f64);

    impl EquationProblem<1> for ConstraintTarget {
        type Input = DesignPoint;
        type Output = EvaluationResult;
        type Error = Infallible;

        fn input(&self, x: &[f64; 1]) -> Result<Self::Input, Self::Error> {
            Ok(DesignPoint::new().with("iter1.x3", x[0]))
        }

        fn residuals(
            &self,
            _input: &Self::Input,
            output: &Self::Output,
        ) -> Result<[f64; 1], Self::Error> {
            let value = output.constraint("iter2.y").unwrap_or(f64::NAN);
            Ok([value - self.0])
        }
    }

    #[test]
    fn bisection_drives_the_reference_model() {
        let scheduler = Scheduler::setup(reference_system(), SchedulerConfig::default()).unwrap();
        let model = PhasedModel::new(scheduler);
        let config = bisection::Config {
            max_iters: 100,
            x_abs_tol: 1e-12,
            x_rel_tol: 0.0,
            residual_tol: 1e-12,
        };

        let solution = bisection::solve(
            &model,
            &ConstraintTarget(10.0),
            [0.0, 20.0],
            &config,
            |event: &bisection::Event<'_, _, _>| {
                if event.result().is_err() {
                    return Some(bisection::Action::assume_positive());
                }
                None
            },
        )
        .unwrap();

        assert!(solution.status == bisection::Status::Converged);
        assert_relative_eq!(
            solution.snapshot.output.constraint("iter2.y").unwrap(),
            10.0,
            epsilon = 1e-9
        );

        let scheduler = model.finish(Termination::Converged).unwrap();
        assert_relative_eq!(scheduler.value("iter1.x3").unwrap(), 6.0, epsilon = 1e-6);
        assert_eq!(scheduler.evaluations("pre1"), Some(1));
        assert_eq!(scheduler.evaluations("post2"), Some(1));
        assert!(scheduler.evaluations("iter1").unwrap() > 1);
    }
}
