use crate::model::ResponseKind;

use super::EvaluationFailure;

/// Design-variable values for one evaluation.
///
/// Variables not named keep their current values.
///
/// ```
/// use twine_phases::schedule::DesignPoint;
///
/// let point = DesignPoint::new().with("iter1.x3", 6.0).with_gradients();
/// assert!(point.wants_gradients());
/// assert_eq!(point.values().collect::<Vec<_>>(), [("iter1.x3", 6.0)]);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesignPoint {
    values: Vec<(String, f64)>,
    gradients: bool,
}

impl DesignPoint {
    /// Creates an empty point that requests no gradients.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a design variable by name.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set(name, value);
        self
    }

    /// Sets a design variable by name, replacing an earlier value.
    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Requests total derivatives along with the values.
    #[must_use]
    pub fn with_gradients(mut self) -> Self {
        self.gradients = true;
        self
    }

    /// Named values, in the order first set.
    pub fn values(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Whether total derivatives were requested.
    pub fn wants_gradients(&self) -> bool {
        self.gradients
    }
}

/// A named response value.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseValue {
    pub name: String,
    pub kind: ResponseKind,
    pub value: f64,
}

/// Total derivatives of responses with respect to design variables.
#[derive(Debug, Clone, PartialEq)]
pub struct TotalJacobian {
    of: Vec<String>,
    wrt: Vec<String>,
    values: Vec<f64>,
}

impl TotalJacobian {
    pub(super) fn zeros(of: Vec<String>, wrt: Vec<String>) -> Self {
        let values = vec![0.0; of.len() * wrt.len()];
        Self { of, wrt, values }
    }

    pub(super) fn set(&mut self, of: usize, wrt: usize, value: f64) {
        let cols = self.wrt.len();
        self.values[of * cols + wrt] = value;
    }

    /// Derivative of response `of` with respect to design variable `wrt`.
    pub fn get(&self, of: &str, wrt: &str) -> Option<f64> {
        let row = self.of.iter().position(|n| n == of)?;
        let col = self.wrt.iter().position(|n| n == wrt)?;
        Some(self.values[row * self.wrt.len() + col])
    }

    /// Response names, one per row.
    pub fn of(&self) -> &[String] {
        &self.of
    }

    /// Design-variable names, one per column.
    pub fn wrt(&self) -> &[String] {
        &self.wrt
    }

    /// One row of derivatives, ordered like [`wrt`](Self::wrt).
    pub fn row(&self, of: usize) -> &[f64] {
        let cols = self.wrt.len();
        &self.values[of * cols..(of + 1) * cols]
    }
}

/// Outcome of one call to [`Scheduler::iterate`](super::Scheduler::iterate).
///
/// A component failure does not raise an error: it comes back here with
/// `failure` set so the driver can reject the point and try another.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationResult {
    /// One-based iteration number.
    pub iteration: usize,

    pub objectives: Vec<ResponseValue>,
    pub constraints: Vec<ResponseValue>,

    /// Present when the design point requested gradients.
    pub gradients: Option<TotalJacobian>,

    /// Why the evaluation failed, if it did.
    pub failure: Option<EvaluationFailure>,

    /// ITER passes performed, perturbation passes included.
    pub passes: usize,
}

impl EvaluationResult {
    /// Whether a component failed during the evaluation.
    pub fn failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Value of the named objective, if present.
    pub fn objective(&self, name: &str) -> Option<f64> {
        find(&self.objectives, name)
    }

    /// Value of the named constraint, if present.
    pub fn constraint(&self, name: &str) -> Option<f64> {
        find(&self.constraints, name)
    }
}

fn find(values: &[ResponseValue], name: &str) -> Option<f64> {
    values.iter().find(|r| r.name == name).map(|r| r.value)
}

/// Per-component cost accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationCounts {
    evaluations: Vec<usize>,
    partials: Vec<usize>,
    iter_passes: usize,
}

impl EvaluationCounts {
    pub(super) fn new(components: usize) -> Self {
        Self {
            evaluations: vec![0; components],
            partials: vec![0; components],
            iter_passes: 0,
        }
    }

    pub(super) fn record_evaluation(&mut self, node: usize) {
        self.evaluations[node] += 1;
    }

    pub(super) fn record_partials(&mut self, node: usize) {
        self.partials[node] += 1;
    }

    pub(super) fn record_iter_pass(&mut self) {
        self.iter_passes += 1;
    }

    /// Times the component at `node` was evaluated, real or complex.
    pub fn evaluations(&self, node: usize) -> usize {
        self.evaluations[node]
    }

    /// Times the component at `node` computed partials.
    pub fn partials(&self, node: usize) -> usize {
        self.partials[node]
    }

    /// Evaluations summed over all components.
    pub fn total_evaluations(&self) -> usize {
        self.evaluations.iter().sum()
    }

    /// ITER passes run so far, perturbation passes included.
    pub fn iter_passes(&self) -> usize {
        self.iter_passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_point_overwrites_repeated_names() {
        let mut point = DesignPoint::new().with("a", 1.0).with("b", 2.0);
        point.set("a", 3.0);
        assert_eq!(point.values().collect::<Vec<_>>(), [("a", 3.0), ("b", 2.0)]);
        assert!(!point.wants_gradients());
    }

    #[test]
    fn jacobian_lookup() {
        let mut jac = TotalJacobian::zeros(
            vec!["f".to_string(), "g".to_string()],
            vec!["x".to_string(), "y".to_string()],
        );
        jac.set(1, 0, 4.0);

        assert_eq!(jac.get("g", "x"), Some(4.0));
        assert_eq!(jac.get("f", "y"), Some(0.0));
        assert_eq!(jac.get("h", "x"), None);
        assert_eq!(jac.row(1), [4.0, 0.0]);
    }
}
