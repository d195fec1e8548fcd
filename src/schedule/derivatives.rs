use num_complex::Complex64;
use tracing::{debug, trace};

use crate::{
    model::{EvalContext, EvalError},
    partition::{Block, Phase},
};

use super::{
    Approximation, DifferenceForm, EvaluationFailure, Scheduler, TotalJacobian, runner::Runner,
};

/// Partial derivatives of one component, mapped onto store slots.
struct SlotPartials {
    /// `(output slot, wrt slot, value)` triples.
    entries: Vec<(usize, usize, f64)>,
}

impl Scheduler {
    /// Total derivatives of every response with respect to every design
    /// variable, at the state left by the ITER pass that just ran.
    ///
    /// The store is left as it was found.
    pub(super) fn totals(&mut self) -> Result<TotalJacobian, EvaluationFailure> {
        let of = self
            .graph
            .responses()
            .iter()
            .map(|r| r.name.clone())
            .collect();
        let wrt = self
            .graph
            .design_vars()
            .iter()
            .map(|dv| dv.name.clone())
            .collect();
        let mut jacobian = TotalJacobian::zeros(of, wrt);

        match self.config.approximation {
            Approximation::Exact => self.linearized(&mut jacobian)?,
            Approximation::FiniteDifference { step, form } => {
                self.finite_difference(step.into_inner(), form, &mut jacobian)?;
            }
            Approximation::ComplexStep { step } => {
                self.complex_step(step.into_inner(), &mut jacobian)?;
            }
        }
        Ok(jacobian)
    }

    /// Forward-mode propagation of analytic partials through ITER.
    fn linearized(&mut self, jacobian: &mut TotalJacobian) -> Result<(), EvaluationFailure> {
        let nodes: Vec<usize> = self.plan.phase(Phase::Iter).components().collect();
        let mut partials: Vec<Option<SlotPartials>> =
            (0..self.graph.node_count()).map(|_| None).collect();
        for node in nodes {
            partials[node] = Some(self.slot_partials(node)?);
        }

        for j in 0..self.graph.design_vars().len() {
            let mut tangent = vec![0.0; self.store.len()];
            let seeds: Vec<(usize, f64)> = self
                .graph
                .design_vars()
                .iter()
                .enumerate()
                .map(|(k, dv)| (dv.slot, if k == j { 1.0 } else { 0.0 }))
                .collect();
            for &(slot, seed) in &seeds {
                tangent[slot] = seed;
            }

            for block in self.plan.phase(Phase::Iter).blocks() {
                match block {
                    Block::Single(node) => {
                        self.propagate(*node, partials[*node].as_ref(), &mut tangent, &seeds);
                    }
                    Block::Cycle(members) => {
                        self.propagate_loop(members, &partials, &mut tangent, &seeds)?;
                    }
                }
            }

            for (i, response) in self.graph.responses().iter().enumerate() {
                jacobian.set(i, j, tangent[response.slot]);
            }
        }

        debug!(
            design_vars = self.graph.design_vars().len(),
            "analytic totals computed"
        );
        Ok(())
    }

    /// Asks a component for its partials and maps names to slots.
    fn slot_partials(&mut self, node: usize) -> Result<SlotPartials, EvaluationFailure> {
        let graph = &self.graph;
        let info = graph.component(node);
        let inputs = graph.input_slots(node);
        let outputs = graph.output_slots(node);
        self.counts.record_partials(node);

        let failure = |source: EvalError| EvaluationFailure {
            component: info.id().clone(),
            phase: Phase::Iter,
            source,
        };

        let ctx = EvalContext::new(info, inputs, outputs, &mut self.store);
        let jacobian = self.components[node]
            .compute_partials(&ctx)
            .map_err(failure)?;

        let mut entries = Vec::new();
        for (of, wrt, value) in jacobian.iter() {
            let out = info
                .output_index(of)
                .ok_or_else(|| failure(EvalError::UnknownVariable(of.to_string())))?;
            let wrt = info
                .input_index(wrt)
                .ok_or_else(|| failure(EvalError::UnknownVariable(wrt.to_string())))?;
            entries.push((outputs[out], inputs[wrt], value));
        }
        trace!(component = %info.id(), partials = entries.len(), "partials mapped");
        Ok(SlotPartials { entries })
    }

    /// Pushes tangents through one component.
    fn propagate(
        &self,
        node: usize,
        partials: Option<&SlotPartials>,
        tangent: &mut [f64],
        seeds: &[(usize, f64)],
    ) {
        for &slot in self.graph.input_slots(node) {
            if let Some(source) = self.graph.variable(slot).source {
                tangent[slot] = tangent[source];
            }
        }
        for &slot in self.graph.output_slots(node) {
            tangent[slot] = 0.0;
        }
        if let Some(partials) = partials {
            for &(out, wrt, value) in &partials.entries {
                tangent[out] += value * tangent[wrt];
            }
        }
        for &(slot, seed) in seeds {
            if self.graph.variable(slot).owner == node {
                tangent[slot] = seed;
            }
        }
    }

    /// Linear block Gauss-Seidel over a feedback loop.
    fn propagate_loop(
        &self,
        members: &[usize],
        partials: &[Option<SlotPartials>],
        tangent: &mut [f64],
        seeds: &[(usize, f64)],
    ) -> Result<(), EvaluationFailure> {
        let tolerance = self.config.cycle.tolerance.into_inner();
        let max_iterations = self.config.cycle.max_iterations;
        let mut change = f64::INFINITY;

        for _ in 0..max_iterations {
            change = 0.0;
            for &node in members {
                let outputs = self.graph.output_slots(node);
                let before: Vec<f64> = outputs.iter().map(|&slot| tangent[slot]).collect();
                self.propagate(node, partials[node].as_ref(), tangent, seeds);
                for (&slot, old) in outputs.iter().zip(before) {
                    let delta = (tangent[slot] - old).abs();
                    if delta.is_nan() || delta > change {
                        change = delta;
                    }
                }
            }
            if change <= tolerance {
                return Ok(());
            }
        }

        Err(EvaluationFailure {
            component: self.graph.component(members[0]).id().clone(),
            phase: Phase::Iter,
            source: EvalError::NotConverged {
                iterations: max_iterations,
                residual: change,
            },
        })
    }

    /// Finite differences, one perturbed pass per group and direction.
    fn finite_difference(
        &mut self,
        step: f64,
        form: DifferenceForm,
        jacobian: &mut TotalJacobian,
    ) -> Result<(), EvaluationFailure> {
        let base = self.store.clone();
        let base_values = self.response_values(&base);

        let groups = self.groups.clone();
        let outcome = groups.iter().try_for_each(|group| {
            self.difference_group(&base, &base_values, group, step, form, jacobian)
        });

        self.store.copy_from_slice(&base);
        debug!(groups = groups.len(), ?form, "finite-difference totals computed");
        outcome
    }

    fn difference_group(
        &mut self,
        base: &[f64],
        base_values: &[f64],
        group: &[usize],
        step: f64,
        form: DifferenceForm,
        jacobian: &mut TotalJacobian,
    ) -> Result<(), EvaluationFailure> {
        let plus = self.perturbed(base, group, step)?;
        let (reference, width) = match form {
            DifferenceForm::Forward => (base_values.to_vec(), step),
            DifferenceForm::Central => (self.perturbed(base, group, -step)?, 2.0 * step),
        };
        for &j in group {
            for (i, response) in self.graph.responses().iter().enumerate() {
                if self.influence[j][response.owner] {
                    jacobian.set(i, j, (plus[i] - reference[i]) / width);
                }
            }
        }
        Ok(())
    }

    /// Runs ITER from `base` with every design variable in `group` shifted by
    /// `step`, and returns the responses.
    fn perturbed(
        &mut self,
        base: &[f64],
        group: &[usize],
        step: f64,
    ) -> Result<Vec<f64>, EvaluationFailure> {
        self.store.copy_from_slice(base);
        for &j in group {
            let slot = self.graph.design_vars()[j].slot;
            self.store[slot] += step;
        }
        self.run_iter_pass()?;
        Ok(self.response_values(&self.store))
    }

    /// Complex step, one complex pass per group.
    fn complex_step(
        &mut self,
        step: f64,
        jacobian: &mut TotalJacobian,
    ) -> Result<(), EvaluationFailure> {
        let groups = self.groups.clone();
        for group in &groups {
            let mut store: Vec<Complex64> = self
                .store
                .iter()
                .map(|&value| Complex64::new(value, 0.0))
                .collect();
            for &j in group {
                store[self.graph.design_vars()[j].slot].im = step;
            }
            let pins: Vec<(usize, Complex64)> = self
                .graph
                .design_vars()
                .iter()
                .map(|dv| (dv.slot, store[dv.slot]))
                .collect();

            self.counts.record_iter_pass();
            Runner::new(
                &self.components,
                &self.graph,
                self.config.cycle,
                &mut self.counts,
            )
            .with_imaginary_step(step)
            .run_phase(self.plan.phase(Phase::Iter), &mut store, &pins)?;

            let values = self.response_values(&store);
            for &j in group {
                for (i, response) in self.graph.responses().iter().enumerate() {
                    if self.influence[j][response.owner] {
                        jacobian.set(i, j, values[i].im / step);
                    }
                }
            }
        }

        debug!(groups = groups.len(), "complex-step totals computed");
        Ok(())
    }
}
