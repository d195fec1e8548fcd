use std::collections::HashMap;

use thiserror::Error;

use crate::graph::DesignSlot;

/// Design variables grouped so one perturbation pass serves a whole group.
///
/// Groups come from an external coloring algorithm; the scheduler only
/// checks that they cover each design variable exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Coloring {
    groups: Vec<Vec<String>>,
}

impl Coloring {
    /// Creates a coloring from groups of design-variable names.
    pub fn new<G, S>(groups: impl IntoIterator<Item = G>) -> Self
    where
        G: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: groups
                .into_iter()
                .map(|group| group.into_iter().map(Into::into).collect())
                .collect(),
        }
    }

    /// Every design variable perturbed together.
    pub fn single_group<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::new([names])
    }

    /// Groups of design-variable names.
    pub fn groups(&self) -> &[Vec<String>] {
        &self.groups
    }

    /// Resolves names to design-variable indices.
    pub(super) fn resolve(&self, design_vars: &[DesignSlot]) -> Result<Vec<Vec<usize>>, ColoringError> {
        let index: HashMap<&str, usize> = design_vars
            .iter()
            .enumerate()
            .map(|(i, dv)| (dv.name.as_str(), i))
            .collect();
        let mut seen = vec![false; design_vars.len()];

        let mut groups = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut resolved = Vec::with_capacity(group.len());
            for name in group {
                let &i = index
                    .get(name.as_str())
                    .ok_or_else(|| ColoringError::UnknownDesignVariable(name.clone()))?;
                if seen[i] {
                    return Err(ColoringError::Duplicate(name.clone()));
                }
                seen[i] = true;
                resolved.push(i);
            }
            if !resolved.is_empty() {
                groups.push(resolved);
            }
        }

        if let Some(i) = seen.iter().position(|&s| !s) {
            return Err(ColoringError::Missing(design_vars[i].name.clone()));
        }
        Ok(groups)
    }
}

/// One group per design variable.
pub(super) fn uncolored(design_vars: usize) -> Vec<Vec<usize>> {
    (0..design_vars).map(|i| vec![i]).collect()
}

/// A supplied coloring does not match the design variables.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColoringError {
    #[error("coloring names unknown design variable `{0}`")]
    UnknownDesignVariable(String),

    #[error("design variable `{0}` appears in more than one coloring group")]
    Duplicate(String),

    #[error("design variable `{0}` is missing from the coloring")]
    Missing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design_vars(names: &[&str]) -> Vec<DesignSlot> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| DesignSlot {
                name: (*name).to_string(),
                slot: i,
                owner: i,
            })
            .collect()
    }

    #[test]
    fn resolves_groups_to_indices() {
        let dvs = design_vars(&["a", "b", "c"]);
        let coloring = Coloring::new([vec!["c", "a"], vec!["b"]]);
        assert_eq!(coloring.resolve(&dvs).unwrap(), [vec![2, 0], vec![1]]);
    }

    #[test]
    fn must_cover_each_design_variable_once() {
        let dvs = design_vars(&["a", "b"]);

        assert_eq!(
            Coloring::single_group(["a"]).resolve(&dvs),
            Err(ColoringError::Missing("b".to_string()))
        );
        assert_eq!(
            Coloring::new([vec!["a", "b"], vec!["a"]]).resolve(&dvs),
            Err(ColoringError::Duplicate("a".to_string()))
        );
        assert_eq!(
            Coloring::single_group(["a", "b", "z"]).resolve(&dvs),
            Err(ColoringError::UnknownDesignVariable("z".to_string()))
        );
    }

    #[test]
    fn uncolored_is_one_group_each() {
        assert_eq!(uncolored(3), [vec![0], vec![1], vec![2]]);
    }
}
