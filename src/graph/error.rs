use thiserror::Error;

use crate::model::{ComponentId, VarPath};

/// Errors detected while building the connection graph.
///
/// All of these are structural and fatal: they are raised at setup, before
/// any component runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// Two components share an id.
    #[error("duplicate component id `{0}`")]
    DuplicateComponent(ComponentId),

    /// A component declares the same variable name twice.
    #[error("variable `{0}` is declared more than once")]
    DuplicateVariable(VarPath),

    /// An alias is promoted more than once.
    #[error("alias `{0}` is promoted more than once")]
    DuplicateAlias(String),

    /// A name does not resolve to any variable in the graph.
    #[error("{role} `{name}` does not resolve to a variable in the graph")]
    Unresolved {
        /// What the name was used as (connection source, design variable, ...).
        role: &'static str,

        /// The unresolved name.
        name: String,
    },

    /// Following promotions from a name leads back to an alias already visited.
    #[error("promotion cycle through `{0}`")]
    PromotionCycle(String),

    /// A connection's source is an input.
    #[error("connection source `{0}` is not an output")]
    SourceNotOutput(VarPath),

    /// A connection's target is an output.
    #[error("connection target `{0}` is not an input")]
    TargetNotInput(VarPath),

    /// An input is connected to two different sources.
    #[error("input `{target}` is connected to both `{first}` and `{second}`")]
    MultipleSources {
        target: VarPath,
        first: VarPath,
        second: VarPath,
    },

    /// A design variable targets an input that already has a source.
    #[error("design variable `{name}` targets connected input `{path}`")]
    ConnectedDesignVariable { name: String, path: VarPath },

    /// Two design variables resolve to the same variable.
    #[error("design variables `{first}` and `{second}` both set `{path}`")]
    DuplicateDesignTarget {
        first: String,
        second: String,
        path: VarPath,
    },

    /// A response targets an input.
    #[error("response `{name}` targets input `{path}`; responses must be outputs")]
    ResponseNotOutput { name: String, path: VarPath },

    /// A design variable or response name is registered twice.
    #[error("{role} name `{name}` is registered more than once")]
    DuplicateName { role: &'static str, name: String },

    /// Derivatives are approximated but an iterative component cannot be
    /// perturbed.
    #[error("component `{0}` does not support derivative approximation")]
    ApproximationUnsupported(ComponentId),
}
