use num_complex::Complex64;
use tracing::{debug, trace};

use crate::{
    graph::ConnectionGraph,
    model::{Component, EvalContext, EvalError},
    partition::{Block, Phase, PhasePlan},
};

use super::{CycleConfig, EvaluationCounts, EvaluationFailure};

/// Value type a phase can be run in.
pub(super) trait Scalar: Copy {
    /// Dispatches to the component's evaluation for this value type.
    fn evaluate(
        component: &dyn Component,
        ctx: &mut EvalContext<'_, Self>,
    ) -> Result<(), EvalError>;

    /// Magnitude of the difference, for loop convergence.
    ///
    /// `step` is the imaginary perturbation of a complex pass; complex
    /// values compare their imaginary parts relative to it.
    fn distance(a: Self, b: Self, step: f64) -> f64;
}

impl Scalar for f64 {
    fn evaluate(
        component: &dyn Component,
        ctx: &mut EvalContext<'_, Self>,
    ) -> Result<(), EvalError> {
        component.evaluate(ctx)
    }

    fn distance(a: Self, b: Self, _step: f64) -> f64 {
        (a - b).abs()
    }
}

impl Scalar for Complex64 {
    fn evaluate(
        component: &dyn Component,
        ctx: &mut EvalContext<'_, Self>,
    ) -> Result<(), EvalError> {
        component.evaluate_complex(ctx)
    }

    fn distance(a: Self, b: Self, step: f64) -> f64 {
        let real = (a.re - b.re).abs();
        let imaginary = (a.im - b.im).abs() / step;
        if real.is_nan() || imaginary.is_nan() {
            return f64::NAN;
        }
        real.max(imaginary)
    }
}

/// Runs the blocks of a phase against a store.
///
/// Before a component runs, each of its connected inputs is refreshed from
/// its source slot. After it runs, any design variable it owns is written
/// back so a component cannot overwrite the optimizer's value.
pub(super) struct Runner<'a> {
    components: &'a [Box<dyn Component>],
    graph: &'a ConnectionGraph,
    cycle: CycleConfig,
    step: f64,
    counts: &'a mut EvaluationCounts,
}

impl<'a> Runner<'a> {
    pub(super) fn new(
        components: &'a [Box<dyn Component>],
        graph: &'a ConnectionGraph,
        cycle: CycleConfig,
        counts: &'a mut EvaluationCounts,
    ) -> Self {
        Self {
            components,
            graph,
            cycle,
            step: 1.0,
            counts,
        }
    }

    /// Sets the imaginary perturbation carried by a complex pass.
    pub(super) fn with_imaginary_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Runs every block of `plan` in order.
    ///
    /// `pins` lists design-variable slots and their values.
    pub(super) fn run_phase<T: Scalar>(
        &mut self,
        plan: &PhasePlan,
        store: &mut [T],
        pins: &[(usize, T)],
    ) -> Result<(), EvaluationFailure> {
        let phase = plan.phase();
        trace!(%phase, components = plan.len(), "running phase");

        for block in plan.blocks() {
            match block {
                Block::Single(node) => self
                    .evaluate(*node, store, pins)
                    .map_err(|source| self.failure(*node, phase, source))?,
                Block::Cycle(members) => self.converge(members, phase, store, pins)?,
            }
        }
        Ok(())
    }

    fn evaluate<T: Scalar>(
        &mut self,
        node: usize,
        store: &mut [T],
        pins: &[(usize, T)],
    ) -> Result<(), EvalError> {
        let graph = self.graph;
        let inputs = graph.input_slots(node);
        for &slot in inputs {
            if let Some(source) = graph.variable(slot).source {
                store[slot] = store[source];
            }
        }

        let component = self.components[node].as_ref();
        trace!(component = %component.info().id(), "evaluating");
        self.counts.record_evaluation(node);

        let mut ctx = EvalContext::new(component.info(), inputs, graph.output_slots(node), store);
        T::evaluate(component, &mut ctx)?;

        for &(slot, value) in pins {
            if graph.variable(slot).owner == node {
                store[slot] = value;
            }
        }
        Ok(())
    }

    /// Nonlinear block Gauss-Seidel over a feedback loop.
    fn converge<T: Scalar>(
        &mut self,
        members: &[usize],
        phase: Phase,
        store: &mut [T],
        pins: &[(usize, T)],
    ) -> Result<(), EvaluationFailure> {
        let graph = self.graph;
        let tolerance = self.cycle.tolerance.into_inner();
        let mut change = f64::INFINITY;

        for sweep in 1..=self.cycle.max_iterations {
            change = 0.0;
            for &node in members {
                let outputs = graph.output_slots(node);
                let before: Vec<T> = outputs.iter().map(|&slot| store[slot]).collect();

                self.evaluate(node, store, pins)
                    .map_err(|source| self.failure(node, phase, source))?;

                for (&slot, old) in outputs.iter().zip(before) {
                    let delta = T::distance(store[slot], old, self.step);
                    if delta.is_nan() || delta > change {
                        change = delta;
                    }
                }
            }

            trace!(sweep, change, "loop sweep");
            if change <= tolerance {
                debug!(
                    leader = %graph.component(members[0]).id(),
                    sweeps = sweep,
                    "loop converged"
                );
                return Ok(());
            }
        }

        Err(self.failure(
            members[0],
            phase,
            EvalError::NotConverged {
                iterations: self.cycle.max_iterations,
                residual: change,
            },
        ))
    }

    fn failure(&self, node: usize, phase: Phase, source: EvalError) -> EvaluationFailure {
        EvaluationFailure {
            component: self.graph.component(node).id().clone(),
            phase,
            source,
        }
    }
}
