use std::fmt;

use super::ComponentId;

/// A fully qualified variable path, `component.variable`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarPath {
    component: ComponentId,
    name: String,
}

impl VarPath {
    /// Creates a path from a component id and a variable name.
    pub fn new(component: impl Into<ComponentId>, name: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            name: name.into(),
        }
    }

    /// Parses a `component.variable` string, splitting at the last dot.
    ///
    /// Returns `None` if there is no dot or either side is empty.
    ///
    /// ```
    /// use twine_phases::model::VarPath;
    ///
    /// let path = VarPath::parse("G1.pre1.y").unwrap();
    /// assert_eq!(path.component().as_str(), "G1.pre1");
    /// assert_eq!(path.name(), "y");
    ///
    /// assert!(VarPath::parse("y").is_none());
    /// ```
    pub fn parse(path: &str) -> Option<Self> {
        let (component, name) = path.rsplit_once('.')?;
        if component.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(component, name))
    }

    /// The owning component's id.
    pub fn component(&self) -> &ComponentId {
        &self.component
    }

    /// The variable name within its component.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for VarPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.component, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_empty_sides() {
        assert!(VarPath::parse(".y").is_none());
        assert!(VarPath::parse("comp.").is_none());
        assert!(VarPath::parse("").is_none());
    }

    #[test]
    fn display_round_trips_nested_ids() {
        let path = VarPath::new("G2.post1", "y");
        assert_eq!(path.to_string(), "G2.post1.y");
        assert_eq!(VarPath::parse(&path.to_string()), Some(path));
    }
}
