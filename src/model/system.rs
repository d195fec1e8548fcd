use std::fmt;

use super::{Component, DesignVariable, Response};

/// A source variable feeding one or more target variables.
///
/// Both ends are variable paths or promoted aliases; they are resolved when
/// the connection graph is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    source: String,
    targets: Vec<String>,
}

impl Connection {
    /// Output feeding the connection.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Inputs fed by the connection.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.targets.iter().map(String::as_str)
    }
}

/// A flattened model: leaf components, their connections, promotions, and
/// the design-variable and response registries.
///
/// ```
/// use twine_phases::model::{IndependentVars, System};
///
/// let mut system = System::new();
/// system
///     .add(IndependentVars::new("ivc").with("x", 1.0))
///     .add_design_var("ivc.x")
///     .add_objective("ivc.x");
///
/// assert_eq!(system.components().count(), 1);
/// assert_eq!(system.design_vars().count(), 1);
/// ```
#[derive(Default)]
pub struct System {
    components: Vec<Box<dyn Component>>,
    connections: Vec<Connection>,
    promotions: Vec<(String, String)>,
    design_vars: Vec<DesignVariable>,
    responses: Vec<Response>,
}

impl System {
    /// Creates an empty system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a leaf component.
    pub fn add(&mut self, component: impl Component + 'static) -> &mut Self {
        self.components.push(Box::new(component));
        self
    }

    /// Registers an already boxed leaf component.
    pub fn add_boxed(&mut self, component: Box<dyn Component>) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Connects a source output to one or more target inputs.
    pub fn connect<I, S>(&mut self, source: impl Into<String>, targets: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connections.push(Connection {
            source: source.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Declares `alias` as a pass-through name for `target`.
    ///
    /// The target may be a variable path or another alias.
    pub fn promote(&mut self, alias: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.promotions.push((alias.into(), target.into()));
        self
    }

    /// Registers a design variable named after its target.
    pub fn add_design_var(&mut self, target: impl Into<String>) -> &mut Self {
        self.design_vars.push(DesignVariable::new(target));
        self
    }

    /// Registers a fully specified design variable.
    pub fn add_design_variable(&mut self, design_var: DesignVariable) -> &mut Self {
        self.design_vars.push(design_var);
        self
    }

    /// Registers a nonlinear objective named after its target.
    pub fn add_objective(&mut self, target: impl Into<String>) -> &mut Self {
        self.responses.push(Response::objective(target));
        self
    }

    /// Registers a nonlinear constraint named after its target.
    pub fn add_constraint(&mut self, target: impl Into<String>) -> &mut Self {
        self.responses.push(Response::constraint(target));
        self
    }

    /// Registers a fully specified response.
    pub fn add_response(&mut self, response: Response) -> &mut Self {
        self.responses.push(response);
        self
    }

    /// Components in registration order.
    pub fn components(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(Box::as_ref)
    }

    /// Connections in declaration order.
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    /// Promotions as `(alias, target)` pairs.
    pub fn promotions(&self) -> impl Iterator<Item = (&str, &str)> {
        self.promotions
            .iter()
            .map(|(alias, target)| (alias.as_str(), target.as_str()))
    }

    /// Registered design variables, in registration order.
    pub fn design_vars(&self) -> impl Iterator<Item = &DesignVariable> {
        self.design_vars.iter()
    }

    /// Registered responses, in registration order.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        self.responses.iter()
    }

    pub(crate) fn into_components(self) -> Vec<Box<dyn Component>> {
        self.components
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field(
                "components",
                &self
                    .components
                    .iter()
                    .map(|c| c.info().id())
                    .collect::<Vec<_>>(),
            )
            .field("connections", &self.connections)
            .field("promotions", &self.promotions)
            .field("design_vars", &self.design_vars)
            .field("responses", &self.responses)
            .finish()
    }
}
