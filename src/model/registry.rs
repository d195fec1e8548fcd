use std::fmt;

/// A variable the optimizer is free to set.
///
/// The target is a variable path or promoted alias. It may name an output
/// (typically of an [`IndependentVars`](super::IndependentVars)) or an
/// unconnected input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignVariable {
    name: String,
    target: String,
}

impl DesignVariable {
    /// Creates a design variable named after its target.
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            name: target.clone(),
            target,
        }
    }

    /// Overrides the name the driver uses for this variable.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Name the optimizer uses for the variable.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable path or alias the design variable sets.
    pub fn target(&self) -> &str {
        &self.target
    }
}

/// Whether a response is minimized or bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Objective,
    Constraint,
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Objective => f.write_str("objective"),
            Self::Constraint => f.write_str("constraint"),
        }
    }
}

/// An output the optimizer evaluates, as objective or constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    name: String,
    target: String,
    kind: ResponseKind,
    linear: bool,
}

impl Response {
    /// Creates a nonlinear objective named after its target.
    pub fn objective(target: impl Into<String>) -> Self {
        Self::new(target, ResponseKind::Objective)
    }

    /// Creates a nonlinear constraint named after its target.
    pub fn constraint(target: impl Into<String>) -> Self {
        Self::new(target, ResponseKind::Constraint)
    }

    fn new(target: impl Into<String>, kind: ResponseKind) -> Self {
        let target = target.into();
        Self {
            name: target.clone(),
            target,
            kind,
            linear: false,
        }
    }

    /// Overrides the name the driver uses for this response.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Flags the response as linear in the design variables.
    #[must_use]
    pub fn linear(mut self) -> Self {
        self.linear = true;
        self
    }

    /// Name the optimizer uses for the response.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variable path or alias the response reads.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether the response is an objective or a constraint.
    pub fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// Whether the response is flagged as linear in the design variables.
    pub fn is_linear(&self) -> bool {
        self.linear
    }
}
