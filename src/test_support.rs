//! Components and systems shared by unit tests.

use num_complex::Complex64;

use crate::model::{
    Component, ComponentId, ComponentInfo, EvalContext, EvalError, Jacobian, System,
};

/// `y = c + sum(a_i * x_i)` with analytic partials and complex support.
///
/// Inputs default to 1.0 and the output to 0.0.
pub struct LinearComp {
    info: ComponentInfo,
    terms: Vec<(String, f64)>,
    constant: f64,
}

impl LinearComp {
    pub fn new(id: impl Into<ComponentId>, terms: &[(&str, f64)]) -> Self {
        let mut info = ComponentInfo::new(id);
        for &(name, _) in terms {
            info = info.input(name, 1.0);
        }
        Self {
            info: info.output("y", 0.0),
            terms: terms
                .iter()
                .map(|&(name, coef)| (name.to_string(), coef))
                .collect(),
            constant: 0.0,
        }
    }

    /// `y = factor * x`.
    pub fn scale(id: impl Into<ComponentId>, factor: f64) -> Self {
        Self::new(id, &[("x", factor)])
    }

    #[must_use]
    pub fn plus(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    #[must_use]
    pub fn map_info(mut self, f: impl FnOnce(ComponentInfo) -> ComponentInfo) -> Self {
        self.info = f(self.info);
        self
    }
}

impl Component for LinearComp {
    fn info(&self) -> &ComponentInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_, f64>) -> Result<(), EvalError> {
        let mut y = self.constant;
        for (name, coef) in &self.terms {
            y += coef * ctx.input(name)?;
        }
        ctx.set_output("y", y)
    }

    fn compute_partials(&self, _ctx: &EvalContext<'_, f64>) -> Result<Jacobian, EvalError> {
        Ok(self
            .terms
            .iter()
            .fold(Jacobian::new(), |jac, (name, coef)| jac.with("y", name, *coef)))
    }

    fn evaluate_complex(&self, ctx: &mut EvalContext<'_, Complex64>) -> Result<(), EvalError> {
        let mut y = Complex64::new(self.constant, 0.0);
        for (name, coef) in &self.terms {
            y += ctx.input(name)? * *coef;
        }
        ctx.set_output("y", y)
    }
}

/// `y = x * x`, the one nonlinear component the tests need.
pub struct Square {
    info: ComponentInfo,
}

impl Square {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        Self {
            info: ComponentInfo::new(id).input("x", 1.0).output("y", 0.0),
        }
    }
}

impl Component for Square {
    fn info(&self) -> &ComponentInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_, f64>) -> Result<(), EvalError> {
        let x = ctx.input("x")?;
        ctx.set_output("y", x * x)
    }

    fn compute_partials(&self, ctx: &EvalContext<'_, f64>) -> Result<Jacobian, EvalError> {
        Ok(Jacobian::new().with("y", "x", 2.0 * ctx.input("x")?))
    }

    fn evaluate_complex(&self, ctx: &mut EvalContext<'_, Complex64>) -> Result<(), EvalError> {
        let x = ctx.input("x")?;
        ctx.set_output("y", x * x)
    }
}

/// `y = x`, failing whenever `x` exceeds a threshold.
pub struct Fragile {
    info: ComponentInfo,
    threshold: f64,
}

impl Fragile {
    pub fn above(id: impl Into<ComponentId>, threshold: f64) -> Self {
        Self {
            info: ComponentInfo::new(id).input("x", 0.0).output("y", 0.0),
            threshold,
        }
    }

    fn check(&self, x: f64) -> Result<(), EvalError> {
        if x > self.threshold {
            return Err(EvalError::failed(format!(
                "x = {x} exceeds {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

impl Component for Fragile {
    fn info(&self) -> &ComponentInfo {
        &self.info
    }

    fn evaluate(&self, ctx: &mut EvalContext<'_, f64>) -> Result<(), EvalError> {
        let x = ctx.input("x")?;
        self.check(x)?;
        ctx.set_output("y", x)
    }

    fn compute_partials(&self, _ctx: &EvalContext<'_, f64>) -> Result<Jacobian, EvalError> {
        Ok(Jacobian::new().with("y", "x", 1.0))
    }

    fn evaluate_complex(&self, ctx: &mut EvalContext<'_, Complex64>) -> Result<(), EvalError> {
        let x = ctx.input("x")?;
        self.check(x.re)?;
        ctx.set_output("y", x)
    }
}

/// The eight-component reference model.
///
/// ```text
/// pre1  -> iter1, post2
/// pre2  -> iter1
/// iter1 -> iter2, iter4
/// iter2 -> post2
/// iter4 -> iter3 -> post1
/// ```
///
/// The design variable is `iter1.x3`, the objective `iter3.y` and the
/// constraint `iter2.y`, so `iter2.y = 0.5 * (14 + x3)` with default inputs.
pub fn reference_system() -> System {
    let mut system = System::new();
    system
        .add(LinearComp::scale("pre1", 2.0))
        .add(LinearComp::scale("pre2", 3.0))
        .add(LinearComp::new(
            "iter1",
            &[("x1", 1.0), ("x2", 4.0), ("x3", 1.0)],
        ))
        .add(LinearComp::scale("iter2", 0.5))
        .add(LinearComp::scale("iter4", 7.0))
        .add(LinearComp::scale("iter3", 6.0))
        .add(LinearComp::scale("post1", 8.0))
        .add(LinearComp::new("post2", &[("x1", 9.0), ("x2", 5.0)]))
        .connect("pre1.y", ["iter1.x1", "post2.x1"])
        .connect("pre2.y", ["iter1.x2"])
        .connect("iter1.y", ["iter2.x", "iter4.x"])
        .connect("iter2.y", ["post2.x2"])
        .connect("iter3.y", ["post1.x"])
        .connect("iter4.y", ["iter3.x"])
        .add_design_var("iter1.x3")
        .add_objective("iter3.y")
        .add_constraint("iter2.y");
    system
}

/// The reference model nested in groups, addressed through promoted names.
pub fn grouped_reference_system() -> System {
    let mut system = System::new();
    system
        .add(LinearComp::scale("G1.pre1", 2.0))
        .add(LinearComp::scale("G1.pre2", 3.0))
        .add(LinearComp::new(
            "G2.iter1",
            &[("x1", 1.0), ("x2", 4.0), ("x3", 1.0)],
        ))
        .add(LinearComp::scale("G2.iter2", 0.5))
        .add(LinearComp::scale("G2.sub.iter4", 7.0))
        .add(LinearComp::scale("G2.sub.iter3", 6.0))
        .add(LinearComp::scale("G3.post1", 8.0))
        .add(LinearComp::new("G3.post2", &[("x1", 9.0), ("x2", 5.0)]))
        .promote("G1.a", "G1.pre1.y")
        .promote("a", "G1.a")
        .promote("G2.x3", "G2.iter1.x3")
        .promote("x3", "G2.x3")
        .promote("G2.sub.obj", "G2.sub.iter3.y")
        .promote("obj", "G2.sub.obj")
        .promote("con", "G2.iter2.y")
        .connect("a", ["G2.iter1.x1", "G3.post2.x1"])
        .connect("G1.pre2.y", ["G2.iter1.x2"])
        .connect("G2.iter1.y", ["G2.iter2.x", "G2.sub.iter4.x"])
        .connect("con", ["G3.post2.x2"])
        .connect("obj", ["G3.post1.x"])
        .connect("G2.sub.iter4.y", ["G2.sub.iter3.x"])
        .add_design_var("x3")
        .add_objective("obj")
        .add_constraint("con");
    system
}
