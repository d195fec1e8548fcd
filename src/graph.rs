//! The connection graph and its structural analyses.
//!
//! [`ConnectionGraph`] has one node per leaf component and an edge `u → v`
//! whenever an output of `u` feeds an input of `v`. On top of it,
//! [`Reachability`] finds what the design variables influence and what the
//! responses need, and [`Condensation`] resolves strongly connected
//! components (coupled cycles) and the global topological order.

mod build;
mod error;
mod reachability;
mod scc;

pub use error::ConfigurationError;
pub use reachability::{Reachability, backward, forward};
pub use scc::{Condensation, Scc};

use std::collections::HashMap;

use crate::model::{ComponentId, ComponentInfo, ResponseKind, VarPath};

/// Directed graph over leaf components, with a dense variable layout.
///
/// Every declared variable is assigned a slot; the scheduler's variable
/// store is a vector indexed by slot. Each input records the slot of its
/// source output, if connected.
#[derive(Debug, Clone)]
pub struct ConnectionGraph {
    nodes: Vec<Node>,
    index: HashMap<ComponentId, usize>,
    successors: Vec<Vec<usize>>,
    predecessors: Vec<Vec<usize>>,
    variables: Vec<Variable>,
    paths: HashMap<VarPath, usize>,
    aliases: HashMap<String, String>,
    links: Vec<Link>,
    design_vars: Vec<DesignSlot>,
    responses: Vec<ResponseSlot>,
}

#[derive(Debug, Clone)]
struct Node {
    info: ComponentInfo,
    inputs: Vec<usize>,
    outputs: Vec<usize>,
}

/// Whether a variable is read or written by its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Input,
    Output,
}

/// A variable in the store layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub path: VarPath,
    pub kind: VarKind,
    /// Index of the owning component.
    pub owner: usize,
    /// Initial value.
    pub default: f64,
    /// Slot of the connected source output, for connected inputs.
    pub source: Option<usize>,
}

/// A resolved connection between two variable slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub source: usize,
    pub target: usize,
}

/// A design variable resolved to its slot and owning component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignSlot {
    pub name: String,
    pub slot: usize,
    pub owner: usize,
}

/// A response resolved to its slot and owning component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSlot {
    pub name: String,
    pub slot: usize,
    pub owner: usize,
    pub kind: ResponseKind,
    pub linear: bool,
}

impl ConnectionGraph {
    /// Number of components.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of distinct component-to-component edges.
    pub fn edge_count(&self) -> usize {
        self.successors.iter().map(Vec::len).sum()
    }

    /// Description of the component at `node`.
    pub fn component(&self, node: usize) -> &ComponentInfo {
        &self.nodes[node].info
    }

    /// Index of the component with the given id.
    pub fn node_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Components downstream of `node`, ascending.
    pub fn successors(&self, node: usize) -> &[usize] {
        &self.successors[node]
    }

    /// Components upstream of `node`, ascending.
    pub fn predecessors(&self, node: usize) -> &[usize] {
        &self.predecessors[node]
    }

    /// All edges as `(from, to)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.successors
            .iter()
            .enumerate()
            .flat_map(|(from, succ)| succ.iter().map(move |&to| (from, to)))
    }

    /// Slots of the inputs of `node`, in declaration order.
    pub fn input_slots(&self, node: usize) -> &[usize] {
        &self.nodes[node].inputs
    }

    /// Slots of the outputs of `node`, in declaration order.
    pub fn output_slots(&self, node: usize) -> &[usize] {
        &self.nodes[node].outputs
    }

    /// Every variable, indexed by slot.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// The variable stored at `slot`.
    pub fn variable(&self, slot: usize) -> &Variable {
        &self.variables[slot]
    }

    /// Resolved connections in declaration order.
    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// Resolved connections as `(source, target)` paths, in declaration order.
    pub fn connections(&self) -> impl Iterator<Item = (&VarPath, &VarPath)> {
        self.links.iter().map(|link| {
            (
                &self.variables[link.source].path,
                &self.variables[link.target].path,
            )
        })
    }

    /// Resolved design variables, in registration order.
    pub fn design_vars(&self) -> &[DesignSlot] {
        &self.design_vars
    }

    /// Resolved responses, in registration order.
    pub fn responses(&self) -> &[ResponseSlot] {
        &self.responses
    }

    /// Resolves a variable path or promoted alias to its slot.
    pub fn resolve(&self, name: &str) -> Option<usize> {
        build::resolve(&self.paths, &self.aliases, name, "variable").ok()
    }

    /// Initial store values, indexed by slot.
    pub fn defaults(&self) -> Vec<f64> {
        self.variables.iter().map(|v| v.default).collect()
    }
}
