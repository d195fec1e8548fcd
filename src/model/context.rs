use std::collections::HashMap;

use super::{ComponentId, ComponentInfo, EvalError};

/// A component's window onto the live variable store.
///
/// The context maps the component's local variable names to slots in the
/// store. A component can read any of its own inputs and outputs and write
/// only its own outputs.
///
/// The value type is `f64` for ordinary evaluation and
/// [`Complex64`](num_complex::Complex64) for complex-step passes.
pub struct EvalContext<'a, T> {
    info: &'a ComponentInfo,
    inputs: &'a [usize],
    outputs: &'a [usize],
    values: &'a mut [T],
}

impl<'a, T: Copy> EvalContext<'a, T> {
    pub(crate) fn new(
        info: &'a ComponentInfo,
        inputs: &'a [usize],
        outputs: &'a [usize],
        values: &'a mut [T],
    ) -> Self {
        debug_assert_eq!(info.inputs().count(), inputs.len());
        debug_assert_eq!(info.outputs().count(), outputs.len());
        Self {
            info,
            inputs,
            outputs,
            values,
        }
    }

    /// The id of the component being evaluated.
    pub fn component(&self) -> &ComponentId {
        self.info.id()
    }

    /// Reads an input.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownVariable`] if the component declares no
    /// input with this name.
    pub fn input(&self, name: &str) -> Result<T, EvalError> {
        let index = self
            .info
            .input_index(name)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))?;
        Ok(self.values[self.inputs[index]])
    }

    /// Reads the current value of an output.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownVariable`] if the component declares no
    /// output with this name.
    pub fn output(&self, name: &str) -> Result<T, EvalError> {
        let index = self
            .info
            .output_index(name)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))?;
        Ok(self.values[self.outputs[index]])
    }

    /// Writes an output.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::UnknownVariable`] if the component declares no
    /// output with this name.
    pub fn set_output(&mut self, name: &str, value: T) -> Result<(), EvalError> {
        let index = self
            .info
            .output_index(name)
            .ok_or_else(|| EvalError::UnknownVariable(name.to_string()))?;
        self.values[self.outputs[index]] = value;
        Ok(())
    }
}

/// Partial derivatives of a component's outputs with respect to its inputs.
///
/// Entries are keyed by local variable names, `(of, wrt)`. Missing entries
/// are zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Jacobian {
    entries: HashMap<(String, String), f64>,
}

impl Jacobian {
    /// Creates an empty Jacobian; missing entries read as zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the partial of output `of` with respect to input `wrt`.
    #[must_use]
    pub fn with(mut self, of: impl Into<String>, wrt: impl Into<String>, value: f64) -> Self {
        self.set(of, wrt, value);
        self
    }

    /// Sets the partial of output `of` with respect to input `wrt`.
    pub fn set(&mut self, of: impl Into<String>, wrt: impl Into<String>, value: f64) {
        self.entries.insert((of.into(), wrt.into()), value);
    }

    /// Returns the partial of `of` with respect to `wrt`, or zero.
    pub fn get(&self, of: &str, wrt: &str) -> f64 {
        self.entries
            .get(&(of.to_string(), wrt.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    /// Iterates over the nonzero structure as `(of, wrt, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.entries
            .iter()
            .map(|((of, wrt), value)| (of.as_str(), wrt.as_str(), *value))
    }

    /// Whether no partial has been set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ComponentInfo {
        ComponentInfo::new("c")
            .input("x", 0.0)
            .input("z", 0.0)
            .output("y", 0.0)
    }

    #[test]
    fn reads_and_writes_through_slots() {
        let info = info();
        let mut values = vec![10.0, 20.0, 30.0, 40.0];
        let mut ctx = EvalContext::new(&info, &[3, 1], &[0], &mut values);

        assert_eq!(ctx.input("x").unwrap(), 40.0);
        assert_eq!(ctx.input("z").unwrap(), 20.0);

        ctx.set_output("y", 5.0).unwrap();
        assert_eq!(ctx.output("y").unwrap(), 5.0);
        assert_eq!(values, [5.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn rejects_undeclared_names() {
        let info = info();
        let mut values = vec![0.0; 3];
        let mut ctx = EvalContext::new(&info, &[0, 1], &[2], &mut values);

        assert_eq!(
            ctx.input("y"),
            Err(EvalError::UnknownVariable("y".to_string()))
        );
        assert!(ctx.set_output("x", 1.0).is_err());
    }

    #[test]
    fn jacobian_defaults_to_zero() {
        let jac = Jacobian::new().with("y", "x", 2.5);
        assert_eq!(jac.get("y", "x"), 2.5);
        assert_eq!(jac.get("y", "z"), 0.0);
        assert_eq!(jac.iter().count(), 1);
    }
}
