use super::ExpressionError;
use super::node::{BinaryOp, Function, Node};

/// Assignment of variable names to value slots.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VariableLayout {
    names: Vec<String>,
}

impl VariableLayout {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push(&mut self, name: impl Into<String>) -> usize {
        self.names.push(name.into());
        self.names.len() - 1
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A function of two integer arguments given by a table of values.
///
/// The value for `(x, y)` is stored at index `x + xsize * y`; arguments are
/// rounded to the nearest integer before lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Discrete2DFunction {
    xsize: usize,
    ysize: usize,
    values: Vec<f64>,
}

impl Discrete2DFunction {
    pub fn new(xsize: usize, ysize: usize, values: Vec<f64>) -> Result<Self, ExpressionError> {
        if values.len() != xsize * ysize {
            return Err(ExpressionError::InvalidTable {
                expected: xsize * ysize,
                found: values.len(),
            });
        }
        Ok(Self {
            xsize,
            ysize,
            values,
        })
    }

    pub fn xsize(&self) -> usize {
        self.xsize
    }

    pub fn ysize(&self) -> usize {
        self.ysize
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn evaluate(&self, x: f64, y: f64) -> Result<f64, ExpressionError> {
        let (ix, iy) = (x.round(), y.round());
        if ix < 0.0 || iy < 0.0 || ix >= self.xsize as f64 || iy >= self.ysize as f64 {
            return Err(ExpressionError::TableIndexOutOfRange { x: ix, y: iy });
        }
        Ok(self.values[ix as usize + self.xsize * iy as usize])
    }
}

#[derive(Debug, Clone)]
enum Op {
    Constant(f64),
    Slot(usize),
    Negate(Box<Op>),
    Binary(BinaryOp, Box<Op>, Box<Op>),
    Call(Function, Vec<Op>),
    Table(usize, Box<Op>, Box<Op>),
}

/// An expression whose variables have been resolved to slot indices.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    root: Op,
    tables: Vec<Discrete2DFunction>,
}

impl CompiledExpression {
    pub(crate) fn compile(
        node: &Node,
        layout: &VariableLayout,
        functions: &[(String, Discrete2DFunction)],
    ) -> Result<Self, ExpressionError> {
        let mut tables = Vec::new();
        let root = lower(node, layout, functions, &mut tables)?;
        Ok(Self { root, tables })
    }

    /// Evaluates with `slots` laid out as in the `VariableLayout` used to compile.
    pub fn evaluate(&self, slots: &[f64]) -> Result<f64, ExpressionError> {
        self.run(&self.root, slots)
    }

    fn run(&self, op: &Op, slots: &[f64]) -> Result<f64, ExpressionError> {
        Ok(match op {
            Op::Constant(c) => *c,
            Op::Slot(i) => slots[*i],
            Op::Negate(inner) => -self.run(inner, slots)?,
            Op::Binary(op, a, b) => {
                let (a, b) = (self.run(a, slots)?, self.run(b, slots)?);
                match op {
                    BinaryOp::Add => a + b,
                    BinaryOp::Subtract => a - b,
                    BinaryOp::Multiply => a * b,
                    BinaryOp::Divide => a / b,
                    BinaryOp::Power => a.powf(b),
                }
            }
            Op::Call(function, args) => {
                let mut values = [0.0; 3];
                for (value, arg) in values.iter_mut().zip(args) {
                    *value = self.run(arg, slots)?;
                }
                function.apply(&values[..args.len()])
            }
            Op::Table(index, x, y) => {
                let (x, y) = (self.run(x, slots)?, self.run(y, slots)?);
                self.tables[*index].evaluate(x, y)?
            }
        })
    }
}

fn lower(
    node: &Node,
    layout: &VariableLayout,
    functions: &[(String, Discrete2DFunction)],
    tables: &mut Vec<Discrete2DFunction>,
) -> Result<Op, ExpressionError> {
    let recurse = |n: &Node, tables: &mut Vec<Discrete2DFunction>| {
        lower(n, layout, functions, tables).map(Box::new)
    };
    Ok(match node {
        Node::Constant(c) => Op::Constant(*c),
        Node::Variable(name) => Op::Slot(
            layout
                .slot(name)
                .ok_or_else(|| ExpressionError::UnknownVariable(name.clone()))?,
        ),
        Node::Negate(inner) => Op::Negate(recurse(inner, tables)?),
        Node::Binary(op, a, b) => Op::Binary(*op, recurse(a, tables)?, recurse(b, tables)?),
        Node::Call(function, args) => Op::Call(
            *function,
            args.iter()
                .map(|a| lower(a, layout, functions, tables))
                .collect::<Result<_, _>>()?,
        ),
        Node::Tabulated(name, args) => {
            let (_, function) = functions
                .iter()
                .find(|(n, _)| n == name)
                .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
            let [x, y] = args.as_slice() else {
                return Err(ExpressionError::WrongArgumentCount {
                    function: name.clone(),
                    expected: 2,
                    found: args.len(),
                });
            };
            let x = recurse(x, tables)?;
            let y = recurse(y, tables)?;
            let index = match tables.iter().position(|t| t == function) {
                Some(index) => index,
                None => {
                    tables.push(function.clone());
                    tables.len() - 1
                }
            };
            Op::Table(index, x, y)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn discrete_function_uses_x_major_index() {
        let f = Discrete2DFunction::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(f.evaluate(1.0, 0.0).unwrap(), 2.0);
        assert_eq!(f.evaluate(0.0, 1.0).unwrap(), 3.0);
        assert_eq!(f.evaluate(0.9, 1.2).unwrap(), 4.0);
    }

    #[test]
    fn discrete_function_rejects_out_of_range_arguments() {
        let f = Discrete2DFunction::new(2, 1, vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            f.evaluate(2.0, 0.0),
            Err(ExpressionError::TableIndexOutOfRange { .. })
        ));
        assert!(f.evaluate(0.0, -1.0).is_err());
    }

    #[test]
    fn discrete_function_checks_table_size() {
        assert!(matches!(
            Discrete2DFunction::new(2, 2, vec![1.0]),
            Err(ExpressionError::InvalidTable {
                expected: 4,
                found: 1
            })
        ));
    }

    #[test]
    fn layout_assigns_slots_in_order() {
        let mut layout = VariableLayout::new(["r", "eps"]);
        assert_eq!(layout.push("sigma"), 2);
        assert_eq!(layout.slot("eps"), Some(1));
        assert_eq!(layout.slot("missing"), None);
        assert_eq!(layout.len(), 3);
    }

    #[test]
    fn compiled_evaluation_reads_slots() {
        let node = Node::Binary(
            BinaryOp::Multiply,
            Box::new(Node::Variable("k".into())),
            Box::new(Node::Call(
                Function::Square,
                vec![Node::Variable("r".into())],
            )),
        );
        let layout = VariableLayout::new(["r", "k"]);
        let compiled = CompiledExpression::compile(&node, &layout, &[]).unwrap();
        assert_relative_eq!(compiled.evaluate(&[3.0, 0.5]).unwrap(), 4.5);
    }
}
