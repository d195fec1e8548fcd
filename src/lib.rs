//! # Twine Phases
//!
//! Phase partitioning and scheduling of component models for
//! [Twine](https://github.com/isentropic-dev/twine) optimization.
//!
//! An optimizer re-evaluates a model many times while only a few design
//! variables change. Most models contain work whose inputs never change
//! during the search, and work whose outputs no objective or constraint ever
//! reads. This crate splits a model's components into three phases so each
//! piece of work runs only as often as it must:
//!
//! - **PRE**: unaffected by every design variable; runs exactly once, before
//!   the optimization loop, and its outputs are frozen in a cache.
//! - **ITER**: lies on a path from a design variable to a response; runs on
//!   every optimizer iteration and every derivative perturbation pass.
//! - **POST**: affected by design variables but never needed by a response;
//!   runs exactly once, after the optimizer is done.
//!
//! ## Crate layout
//!
//! - [`model`]: Components, variables, connections, and the design-variable
//!   and response registries that make up a [`model::System`].
//! - [`graph`]: The connection graph, reachability analysis, and strongly
//!   connected component resolution.
//! - [`partition`]: The three-way partition, its validation, and the
//!   resulting [`partition::ExecutionPlan`].
//! - [`schedule`]: The [`schedule::Scheduler`] state machine that drives
//!   execution through `iterate` and `finalize`.
//! - [`driver`]: A [`twine_core::Model`] adapter so Twine solvers can drive a
//!   scheduler directly.
//! - [`support`]: Supporting utilities.
//!
//! ## Equivalence
//!
//! Partitioned execution produces the same responses and total derivatives as
//! running every component on every iteration. Setting
//! [`schedule::SchedulerConfig::enable_partitioning`] to `false` selects that
//! baseline, which is useful for auditing a model.

pub mod driver;
pub mod graph;
pub mod model;
pub mod partition;
pub mod schedule;
pub mod support;

#[cfg(test)]
mod test_support;
