use std::{borrow::Borrow, fmt};

use num_complex::Complex64;

use super::{EvalContext, EvalError, Jacobian};

/// Unique identifier of a leaf component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(String);

impl ComponentId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ComponentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ComponentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for ComponentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the partitioner may place a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Placement follows from the graph.
    #[default]
    Auto,

    /// Forced to run on every iteration, regardless of graph position.
    AlwaysRun,

    /// Declared independent of every design variable; pinned to the
    /// pre-loop phase.
    ///
    /// If the graph shows the component does depend on a design variable,
    /// partition validation fails.
    RunOnce,
}

/// A declared variable with its initial value.
#[derive(Debug, Clone, PartialEq)]
struct Variable {
    name: String,
    default: f64,
}

/// Static description of a component: identity, ordered variables, and flags.
///
/// Built with a small builder API:
///
/// ```
/// use twine_phases::model::ComponentInfo;
///
/// let info = ComponentInfo::new("iter1")
///     .input("x1", 1.0)
///     .input("x2", 1.0)
///     .output("y", 0.0);
///
/// assert_eq!(info.inputs().collect::<Vec<_>>(), ["x1", "x2"]);
/// assert!(!info.is_always_run());
/// assert!(info.supports_approximation());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInfo {
    id: ComponentId,
    inputs: Vec<Variable>,
    outputs: Vec<Variable>,
    placement: Placement,
    approximable: bool,
}

impl ComponentInfo {
    /// Creates a description with no variables.
    pub fn new(id: impl Into<ComponentId>) -> Self {
        Self {
            id: id.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            placement: Placement::Auto,
            approximable: true,
        }
    }

    /// Declares an input variable with its initial value.
    #[must_use]
    pub fn input(mut self, name: impl Into<String>, default: f64) -> Self {
        self.inputs.push(Variable {
            name: name.into(),
            default,
        });
        self
    }

    /// Declares an output variable with its initial value.
    #[must_use]
    pub fn output(mut self, name: impl Into<String>, default: f64) -> Self {
        self.outputs.push(Variable {
            name: name.into(),
            default,
        });
        self
    }

    /// Forces the component to run on every iteration.
    #[must_use]
    pub fn always_run(mut self) -> Self {
        self.placement = Placement::AlwaysRun;
        self
    }

    /// Pins the component to the pre-loop phase.
    #[must_use]
    pub fn run_once(mut self) -> Self {
        self.placement = Placement::RunOnce;
        self
    }

    /// Marks the component as unable to take part in derivative
    /// approximation (finite difference or complex step).
    #[must_use]
    pub fn without_approximation(mut self) -> Self {
        self.approximable = false;
        self
    }

    /// The component's unique id.
    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    /// Input names in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|v| v.name.as_str())
    }

    /// Output names in declaration order.
    pub fn outputs(&self) -> impl Iterator<Item = &str> {
        self.outputs.iter().map(|v| v.name.as_str())
    }

    /// Where the partitioner is told to place the component.
    pub fn placement(&self) -> Placement {
        self.placement
    }

    /// Whether the component is pinned into ITER.
    pub fn is_always_run(&self) -> bool {
        self.placement == Placement::AlwaysRun
    }

    /// Whether finite-difference and complex-step passes may run it.
    pub fn supports_approximation(&self) -> bool {
        self.approximable
    }

    /// Position of an input in declaration order.
    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|v| v.name == name)
    }

    /// Position of an output in declaration order.
    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|v| v.name == name)
    }

    pub(crate) fn input_defaults(&self) -> impl Iterator<Item = (&str, f64)> {
        self.inputs.iter().map(|v| (v.name.as_str(), v.default))
    }

    pub(crate) fn output_defaults(&self) -> impl Iterator<Item = (&str, f64)> {
        self.outputs.iter().map(|v| (v.name.as_str(), v.default))
    }
}

/// The execution interface of a leaf component.
///
/// Components read their inputs from and write their outputs to the
/// [`EvalContext`] they are handed; they never see the rest of the model.
/// The scheduler treats every call as atomic.
pub trait Component {
    /// Returns the component's static description.
    fn info(&self) -> &ComponentInfo;

    /// Computes outputs from inputs.
    ///
    /// # Errors
    ///
    /// Returns an [`EvalError`] if the computation fails or an internal solve
    /// does not converge.
    fn evaluate(&self, ctx: &mut EvalContext<'_, f64>) -> Result<(), EvalError>;

    /// Computes partial derivatives of outputs with respect to inputs at the
    /// current point.
    ///
    /// Needed only when totals are computed analytically. Entries missing
    /// from the returned [`Jacobian`] are zero.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Unsupported`] unless overridden.
    fn compute_partials(&self, ctx: &EvalContext<'_, f64>) -> Result<Jacobian, EvalError> {
        let _ = ctx;
        Err(EvalError::Unsupported("analytic partials"))
    }

    /// Computes outputs from complex-valued inputs.
    ///
    /// Needed only for complex-step derivative approximation.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Unsupported`] unless overridden.
    fn evaluate_complex(&self, ctx: &mut EvalContext<'_, Complex64>) -> Result<(), EvalError> {
        let _ = ctx;
        Err(EvalError::Unsupported("complex evaluation"))
    }
}

/// A component whose outputs are all independent variables.
///
/// It has no inputs and its evaluation leaves outputs untouched, so the
/// values set by the driver (or the declared defaults) flow downstream.
/// It is the usual owner of design variables.
#[derive(Debug, Clone)]
pub struct IndependentVars {
    info: ComponentInfo,
}

impl IndependentVars {
    /// Creates a component with no outputs yet.
    pub fn new(id: impl Into<ComponentId>) -> Self {
        Self {
            info: ComponentInfo::new(id),
        }
    }

    /// Adds an independent output with its initial value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.info = self.info.output(name, value);
        self
    }
}

impl Component for IndependentVars {
    fn info(&self) -> &ComponentInfo {
        &self.info
    }

    fn evaluate(&self, _ctx: &mut EvalContext<'_, f64>) -> Result<(), EvalError> {
        Ok(())
    }

    fn compute_partials(&self, _ctx: &EvalContext<'_, f64>) -> Result<Jacobian, EvalError> {
        Ok(Jacobian::new())
    }

    fn evaluate_complex(&self, _ctx: &mut EvalContext<'_, Complex64>) -> Result<(), EvalError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_flags() {
        let info = ComponentInfo::new("c").output("y", 0.0).always_run();
        assert_eq!(info.placement(), Placement::AlwaysRun);
        assert!(info.is_always_run());

        let info = ComponentInfo::new("c").output("y", 0.0).run_once();
        assert_eq!(info.placement(), Placement::RunOnce);
        assert!(!info.is_always_run());
    }

    #[test]
    fn variable_lookup() {
        let info = ComponentInfo::new("c")
            .input("a", 1.0)
            .input("b", 2.0)
            .output("y", 3.0);

        assert_eq!(info.input_index("b"), Some(1));
        assert_eq!(info.output_index("y"), Some(0));
        assert_eq!(info.output_index("a"), None);
        assert_eq!(info.input_defaults().collect::<Vec<_>>(), [("a", 1.0), ("b", 2.0)]);
    }

    #[test]
    fn independent_vars_declare_outputs_only() {
        let ivc = IndependentVars::new("ivc").with("x", 3.0).with("z", 4.0);
        assert_eq!(ivc.info().outputs().collect::<Vec<_>>(), ["x", "z"]);
        assert_eq!(ivc.info().inputs().count(), 0);
    }
}
