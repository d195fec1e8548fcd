//! Model description.
//!
//! A [`System`] is the flattened description of a numerical model: leaf
//! [`Component`]s, the [`Connection`]s between their variables, and the
//! registries of design variables and responses. Grouping and naming are
//! resolved before a system reaches this crate; the one indirection kept
//! here is pass-through promotion, where an alias stands in for a variable
//! path (or for another alias).
//!
//! Variables are addressed by path, `component.variable`. Component ids may
//! themselves contain dots (`G1.pre1`), so a path is split at its last dot.

mod component;
mod context;
mod error;
mod registry;
mod system;
mod variable;

pub use component::{Component, ComponentId, ComponentInfo, IndependentVars, Placement};
pub use context::{EvalContext, Jacobian};
pub use error::EvalError;
pub use registry::{DesignVariable, Response, ResponseKind};
pub use system::{Connection, System};
pub use variable::VarPath;
