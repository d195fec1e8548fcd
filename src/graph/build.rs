use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::model::{ComponentId, System, VarPath};

use super::{
    ConfigurationError, ConnectionGraph, DesignSlot, Link, Node, ResponseSlot, VarKind, Variable,
};

impl ConnectionGraph {
    /// Builds the connection graph of a flattened system.
    ///
    /// Variables are laid out component by component, inputs before outputs,
    /// in registration order. Connections, design variables and responses
    /// are resolved through promotions to concrete variable paths.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if the system is structurally
    /// inconsistent: duplicate ids or names, unresolved names, promotion
    /// cycles, connections with the wrong direction, inputs with more than
    /// one source, or design variables and responses on the wrong kind of
    /// variable.
    pub fn build(system: &System) -> Result<Self, ConfigurationError> {
        let mut nodes = Vec::new();
        let mut index = HashMap::new();
        let mut variables = Vec::new();
        let mut paths = HashMap::new();

        for (node, component) in system.components().enumerate() {
            let info = component.info().clone();
            let id = info.id().clone();

            if index.insert(id.clone(), node).is_some() {
                return Err(ConfigurationError::DuplicateComponent(id));
            }

            let mut layout = Layout {
                variables: &mut variables,
                paths: &mut paths,
                id: &id,
                owner: node,
            };
            let inputs = layout.declare(VarKind::Input, info.input_defaults())?;
            let outputs = layout.declare(VarKind::Output, info.output_defaults())?;

            nodes.push(Node {
                info,
                inputs,
                outputs,
            });
        }

        let mut aliases = HashMap::new();
        for (alias, target) in system.promotions() {
            if aliases
                .insert(alias.to_string(), target.to_string())
                .is_some()
            {
                return Err(ConfigurationError::DuplicateAlias(alias.to_string()));
            }
        }

        let mut links = Vec::new();
        let mut edges = BTreeSet::new();
        for connection in system.connections() {
            let source = resolve(&paths, &aliases, connection.source(), "connection source")?;
            if variables[source].kind != VarKind::Output {
                return Err(ConfigurationError::SourceNotOutput(
                    variables[source].path.clone(),
                ));
            }

            for target in connection.targets() {
                let target = resolve(&paths, &aliases, target, "connection target")?;
                let variable: &mut Variable = &mut variables[target];
                if variable.kind != VarKind::Input {
                    return Err(ConfigurationError::TargetNotInput(variable.path.clone()));
                }

                match variable.source {
                    Some(existing) if existing == source => continue,
                    Some(existing) => {
                        let target = variable.path.clone();
                        return Err(ConfigurationError::MultipleSources {
                            target,
                            first: variables[existing].path.clone(),
                            second: variables[source].path.clone(),
                        });
                    }
                    None => variable.source = Some(source),
                }

                links.push(Link { source, target });
                edges.insert((variables[source].owner, variables[target].owner));
            }
        }

        let mut successors = vec![Vec::new(); nodes.len()];
        let mut predecessors = vec![Vec::new(); nodes.len()];
        for &(from, to) in &edges {
            successors[from].push(to);
            predecessors[to].push(from);
        }

        let mut names = HashSet::new();
        let mut targets: HashMap<usize, &str> = HashMap::new();
        let mut design_vars = Vec::new();
        for design_var in system.design_vars() {
            if !names.insert(design_var.name()) {
                return Err(ConfigurationError::DuplicateName {
                    role: "design variable",
                    name: design_var.name().to_string(),
                });
            }

            let slot = resolve(&paths, &aliases, design_var.target(), "design variable")?;
            let variable = &variables[slot];
            if variable.kind == VarKind::Input && variable.source.is_some() {
                return Err(ConfigurationError::ConnectedDesignVariable {
                    name: design_var.name().to_string(),
                    path: variable.path.clone(),
                });
            }
            if let Some(first) = targets.insert(slot, design_var.name()) {
                return Err(ConfigurationError::DuplicateDesignTarget {
                    first: first.to_string(),
                    second: design_var.name().to_string(),
                    path: variable.path.clone(),
                });
            }

            design_vars.push(DesignSlot {
                name: design_var.name().to_string(),
                slot,
                owner: variable.owner,
            });
        }

        let mut names = HashSet::new();
        let mut responses = Vec::new();
        for response in system.responses() {
            if !names.insert(response.name()) {
                return Err(ConfigurationError::DuplicateName {
                    role: "response",
                    name: response.name().to_string(),
                });
            }

            let slot = resolve(&paths, &aliases, response.target(), "response")?;
            let variable = &variables[slot];
            if variable.kind != VarKind::Output {
                return Err(ConfigurationError::ResponseNotOutput {
                    name: response.name().to_string(),
                    path: variable.path.clone(),
                });
            }

            responses.push(ResponseSlot {
                name: response.name().to_string(),
                slot,
                owner: variable.owner,
                kind: response.kind(),
                linear: response.is_linear(),
            });
        }

        debug!(
            components = nodes.len(),
            variables = variables.len(),
            connections = links.len(),
            edges = edges.len(),
            design_vars = design_vars.len(),
            responses = responses.len(),
            "built connection graph"
        );

        Ok(Self {
            nodes,
            index,
            successors,
            predecessors,
            variables,
            paths,
            aliases,
            links,
            design_vars,
            responses,
        })
    }
}

/// Slot assignment for one component's variables.
struct Layout<'a> {
    variables: &'a mut Vec<Variable>,
    paths: &'a mut HashMap<VarPath, usize>,
    id: &'a ComponentId,
    owner: usize,
}

impl Layout<'_> {
    fn declare<'n>(
        &mut self,
        kind: VarKind,
        declared: impl Iterator<Item = (&'n str, f64)>,
    ) -> Result<Vec<usize>, ConfigurationError> {
        declared
            .map(|(name, default)| {
                let path = VarPath::new(self.id.clone(), name);
                let slot = self.variables.len();
                if self.paths.insert(path.clone(), slot).is_some() {
                    return Err(ConfigurationError::DuplicateVariable(path));
                }
                self.variables.push(Variable {
                    path,
                    kind,
                    owner: self.owner,
                    default,
                    source: None,
                });
                Ok(slot)
            })
            .collect()
    }
}

/// Resolves a variable path or alias to a slot.
///
/// Concrete paths win over aliases. Alias chains are followed until a path
/// resolves; revisiting an alias is a promotion cycle.
pub(super) fn resolve(
    paths: &HashMap<VarPath, usize>,
    aliases: &HashMap<String, String>,
    name: &str,
    role: &'static str,
) -> Result<usize, ConfigurationError> {
    let mut current = name;
    let mut visited = HashSet::new();

    loop {
        if let Some(&slot) = VarPath::parse(current).and_then(|path| paths.get(&path)) {
            return Ok(slot);
        }

        let Some(next) = aliases.get(current) else {
            return Err(ConfigurationError::Unresolved {
                role,
                name: name.to_string(),
            });
        };
        if !visited.insert(current) {
            return Err(ConfigurationError::PromotionCycle(current.to_string()));
        }
        current = next;
    }
}
