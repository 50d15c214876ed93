//! # Expression Module
//!
//! Parser, symbolic differentiator and evaluator for the algebraic energy
//! expressions used by custom forces, such as `eps*(A/r^12 - B/r^10)`.
//!
//! The grammar follows the conventions of the OpenMM custom force API:
//!
//! - Operators `+ - * / ^` with `^` binding tightest and associating right.
//! - Built-in functions (`sqrt`, `exp`, `erf`, `step`, `select`, `min`, …).
//! - Intermediate definitions after semicolons: `E; E = a*b; a = 2*r`.
//! - Calls to tabulated functions registered at compile time, such as
//!   `C12(type1,type2)`.
//!
//! An [`Expression`] is compiled against a [`VariableLayout`] into a
//! [`CompiledExpression`], which evaluates from a flat slice of values.

mod compiled;
mod node;
mod parser;

pub use compiled::{CompiledExpression, Discrete2DFunction, VariableLayout};
pub use node::{BinaryOp, Function, Node};

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },
    #[error("Unknown variable '{0}' in expression")]
    UnknownVariable(String),
    #[error("Unknown function '{0}' in expression")]
    UnknownFunction(String),
    #[error("Function '{function}' expects {expected} argument(s), found {found}")]
    WrongArgumentCount {
        function: String,
        expected: usize,
        found: usize,
    },
    #[error("Tabulated function needs {expected} values, found {found}")]
    InvalidTable { expected: usize, found: usize },
    #[error("Tabulated function argument ({x}, {y}) is out of range")]
    TableIndexOutOfRange { x: f64, y: f64 },
}

/// A parsed energy expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    root: Node,
}

impl Expression {
    pub fn parse(source: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            root: parser::parse(source)?,
        })
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn variables(&self) -> Vec<&str> {
        self.root.variables()
    }

    pub fn simplify(&self) -> Self {
        Self {
            root: self.root.simplify(),
        }
    }

    /// Derivative with respect to `var`, already simplified.
    pub fn differentiate(&self, var: &str) -> Self {
        Self {
            root: self.root.differentiate(var).simplify(),
        }
    }

    pub fn compile(
        &self,
        layout: &VariableLayout,
        functions: &[(String, Discrete2DFunction)],
    ) -> Result<CompiledExpression, ExpressionError> {
        CompiledExpression::compile(&self.root, layout, functions)
    }
}

impl FromStr for Expression {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.root.fmt(f)
    }
}

/// A pair potential of the separation `r` compiled together with its
/// derivative `dE/dr`.
#[derive(Debug, Clone)]
pub struct RadialPotential {
    energy: CompiledExpression,
    derivative: CompiledExpression,
    r_slot: usize,
}

impl RadialPotential {
    /// Compiles `source`; `layout` must contain a variable named `r`.
    pub fn compile(
        source: &str,
        layout: &VariableLayout,
        functions: &[(String, Discrete2DFunction)],
    ) -> Result<Self, ExpressionError> {
        let r_slot = layout
            .slot("r")
            .ok_or_else(|| ExpressionError::UnknownVariable("r".to_string()))?;
        let expression = Expression::parse(source)?.simplify();
        let derivative = expression.differentiate("r");
        Ok(Self {
            energy: expression.compile(layout, functions)?,
            derivative: derivative.compile(layout, functions)?,
            r_slot,
        })
    }

    pub fn r_slot(&self) -> usize {
        self.r_slot
    }

    /// Returns `(E, dE/dr)` for the values in `slots`.
    pub fn evaluate(&self, slots: &[f64]) -> Result<(f64, f64), ExpressionError> {
        Ok((
            self.energy.evaluate(slots)?,
            self.derivative.evaluate(slots)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn finite_difference(potential: &RadialPotential, slots: &[f64]) -> f64 {
        let h = 1e-6;
        let r = potential.r_slot();
        let mut plus = slots.to_vec();
        let mut minus = slots.to_vec();
        plus[r] += h;
        minus[r] -= h;
        (potential.evaluate(&plus).unwrap().0 - potential.evaluate(&minus).unwrap().0) / (2.0 * h)
    }

    #[test]
    fn radial_derivative_matches_finite_difference() {
        let sources = [
            "A/r^12-B/r^10",
            "-eps*exp(-(r-r0)^2/(2*sigma^2))",
            "eps*(1+(r0/r)^12)*(1+G)-eps; G = -exp(-(r-r0)^2/(2*sigma^2))",
            "sqrt(r)*sin(r)+cosh(r)/atan(r)",
            "erf(r)*erfc(r/2)+tanh(r)^2",
            "sec(r)+csc(r)+cot(r)+tan(r)+recip(r)+cube(r)+log(r)",
            "asin(r/4)+acos(r/3)+atan2(r, 2)+sinh(r)",
            "r^r",
        ];
        let layout = VariableLayout::new(["r", "A", "B", "eps", "r0", "sigma"]);
        let slots = [0.7, 2.0e-3, 1.5e-3, 1.2, 0.65, 0.05];
        for source in sources {
            let potential = RadialPotential::compile(source, &layout, &[]).unwrap();
            let (_, analytic) = potential.evaluate(&slots).unwrap();
            let numeric = finite_difference(&potential, &slots);
            assert_relative_eq!(analytic, numeric, max_relative = 1e-5, epsilon = 1e-8);
        }
    }

    #[test]
    fn tabulated_functions_use_per_type_slots() {
        let table = Discrete2DFunction::new(2, 2, vec![1.0, 2.0, 2.0, 4.0]).unwrap();
        let functions = vec![("C12".to_string(), table)];
        let layout = VariableLayout::new(["r", "type1", "type2"]);
        let potential = RadialPotential::compile("C12(type1,type2)/r^12", &layout, &functions).unwrap();

        let (energy, derivative) = potential.evaluate(&[1.0, 0.0, 1.0]).unwrap();
        assert_relative_eq!(energy, 2.0);
        assert_relative_eq!(derivative, -24.0);

        let (energy, _) = potential.evaluate(&[1.0, 1.0, 1.0]).unwrap();
        assert_relative_eq!(energy, 4.0);
    }

    #[test]
    fn unknown_variable_is_a_compile_error() {
        let layout = VariableLayout::new(["r"]);
        let err = RadialPotential::compile("k*r", &layout, &[]).unwrap_err();
        assert_eq!(err, ExpressionError::UnknownVariable("k".into()));
    }

    #[test]
    fn unknown_tabulated_function_is_a_compile_error() {
        let layout = VariableLayout::new(["r", "type1", "type2"]);
        let err = RadialPotential::compile("eps(type1,type2)/r", &layout, &[]).unwrap_err();
        assert_eq!(err, ExpressionError::UnknownFunction("eps".into()));
    }

    #[test]
    fn layout_without_r_is_rejected() {
        let layout = VariableLayout::new(["x"]);
        assert!(RadialPotential::compile("x", &layout, &[]).is_err());
    }

    #[test]
    fn expression_parses_from_str_and_simplifies() {
        let expression: Expression = "0*r + 2*3".parse().unwrap();
        assert_eq!(expression.simplify().root(), &Node::Constant(6.0));
        assert_eq!(expression.variables(), vec!["r"]);
    }
}
