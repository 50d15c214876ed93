use std::f64::consts::PI;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
}

impl BinaryOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => a / b,
            Self::Power => a.powf(b),
        }
    }

    fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Subtract => '-',
            Self::Multiply => '*',
            Self::Divide => '/',
            Self::Power => '^',
        }
    }
}

/// Built-in mathematical functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
    Sec,
    Csc,
    Tan,
    Cot,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Erf,
    Erfc,
    Step,
    Delta,
    Square,
    Cube,
    Recip,
    Min,
    Max,
    Abs,
    Floor,
    Ceil,
    Select,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        let function = match name {
            "sqrt" => Self::Sqrt,
            "exp" => Self::Exp,
            "log" => Self::Log,
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "sec" => Self::Sec,
            "csc" => Self::Csc,
            "tan" => Self::Tan,
            "cot" => Self::Cot,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "atan2" => Self::Atan2,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "erf" => Self::Erf,
            "erfc" => Self::Erfc,
            "step" => Self::Step,
            "delta" => Self::Delta,
            "square" => Self::Square,
            "cube" => Self::Cube,
            "recip" => Self::Recip,
            "min" => Self::Min,
            "max" => Self::Max,
            "abs" => Self::Abs,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "select" => Self::Select,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sqrt => "sqrt",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Sec => "sec",
            Self::Csc => "csc",
            Self::Tan => "tan",
            Self::Cot => "cot",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Atan2 => "atan2",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Erf => "erf",
            Self::Erfc => "erfc",
            Self::Step => "step",
            Self::Delta => "delta",
            Self::Square => "square",
            Self::Cube => "cube",
            Self::Recip => "recip",
            Self::Min => "min",
            Self::Max => "max",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Select => "select",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Self::Atan2 | Self::Min | Self::Max => 2,
            Self::Select => 3,
            _ => 1,
        }
    }

    /// Evaluates the function; `args` must hold exactly `arity()` values.
    pub fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Self::Sqrt => x.sqrt(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Sec => 1.0 / x.cos(),
            Self::Csc => 1.0 / x.sin(),
            Self::Tan => x.tan(),
            Self::Cot => 1.0 / x.tan(),
            Self::Asin => x.asin(),
            Self::Acos => x.acos(),
            Self::Atan => x.atan(),
            Self::Atan2 => x.atan2(args[1]),
            Self::Sinh => x.sinh(),
            Self::Cosh => x.cosh(),
            Self::Tanh => x.tanh(),
            Self::Erf => libm::erf(x),
            Self::Erfc => libm::erfc(x),
            Self::Step => {
                if x >= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Delta => {
                if x == 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Square => x * x,
            Self::Cube => x * x * x,
            Self::Recip => 1.0 / x,
            Self::Min => x.min(args[1]),
            Self::Max => x.max(args[1]),
            Self::Abs => x.abs(),
            Self::Floor => x.floor(),
            Self::Ceil => x.ceil(),
            Self::Select => {
                if x != 0.0 {
                    args[1]
                } else {
                    args[2]
                }
            }
        }
    }
}

/// Abstract syntax tree of an energy expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Constant(f64),
    Variable(String),
    Negate(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
    /// Call of a user-supplied tabulated function such as `eps(type1,type2)`.
    Tabulated(String, Vec<Node>),
}

fn constant(value: f64) -> Node {
    Node::Constant(value)
}

fn binary(op: BinaryOp, a: Node, b: Node) -> Node {
    Node::Binary(op, Box::new(a), Box::new(b))
}

fn call(function: Function, args: Vec<Node>) -> Node {
    Node::Call(function, args)
}

impl Node {
    pub fn is_constant(&self, value: f64) -> bool {
        matches!(self, Node::Constant(c) if *c == value)
    }

    /// Visits every variable name referenced by the tree.
    pub fn variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            Node::Constant(_) => {}
            Node::Variable(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            Node::Negate(inner) => inner.collect_variables(names),
            Node::Binary(_, a, b) => {
                a.collect_variables(names);
                b.collect_variables(names);
            }
            Node::Call(_, args) | Node::Tabulated(_, args) => {
                for arg in args {
                    arg.collect_variables(names);
                }
            }
        }
    }

    /// Replaces every occurrence of `name` with `replacement`.
    pub fn substitute(&self, name: &str, replacement: &Node) -> Node {
        match self {
            Node::Variable(v) if v == name => replacement.clone(),
            Node::Constant(_) | Node::Variable(_) => self.clone(),
            Node::Negate(inner) => Node::Negate(Box::new(inner.substitute(name, replacement))),
            Node::Binary(op, a, b) => binary(
                *op,
                a.substitute(name, replacement),
                b.substitute(name, replacement),
            ),
            Node::Call(function, args) => call(
                *function,
                args.iter().map(|a| a.substitute(name, replacement)).collect(),
            ),
            Node::Tabulated(table, args) => Node::Tabulated(
                table.clone(),
                args.iter().map(|a| a.substitute(name, replacement)).collect(),
            ),
        }
    }

    /// Symbolic derivative with respect to `var`. Tabulated functions of
    /// discrete arguments have zero derivative.
    pub fn differentiate(&self, var: &str) -> Node {
        match self {
            Node::Constant(_) | Node::Tabulated(..) => constant(0.0),
            Node::Variable(name) => constant(if name == var { 1.0 } else { 0.0 }),
            Node::Negate(inner) => Node::Negate(Box::new(inner.differentiate(var))),
            Node::Binary(op, a, b) => {
                let (da, db) = (a.differentiate(var), b.differentiate(var));
                let (a, b) = (a.as_ref().clone(), b.as_ref().clone());
                match op {
                    BinaryOp::Add => binary(BinaryOp::Add, da, db),
                    BinaryOp::Subtract => binary(BinaryOp::Subtract, da, db),
                    BinaryOp::Multiply => binary(
                        BinaryOp::Add,
                        binary(BinaryOp::Multiply, da, b.clone()),
                        binary(BinaryOp::Multiply, a, db),
                    ),
                    BinaryOp::Divide => binary(
                        BinaryOp::Divide,
                        binary(
                            BinaryOp::Subtract,
                            binary(BinaryOp::Multiply, da, b.clone()),
                            binary(BinaryOp::Multiply, a, db),
                        ),
                        call(Function::Square, vec![b]),
                    ),
                    BinaryOp::Power => match b {
                        Node::Constant(n) => binary(
                            BinaryOp::Multiply,
                            binary(
                                BinaryOp::Multiply,
                                constant(n),
                                binary(BinaryOp::Power, a, constant(n - 1.0)),
                            ),
                            da,
                        ),
                        _ => {
                            // d(a^b) = a^b * (b' ln a + b a'/a)
                            let power = binary(BinaryOp::Power, a.clone(), b.clone());
                            binary(
                                BinaryOp::Multiply,
                                power,
                                binary(
                                    BinaryOp::Add,
                                    binary(
                                        BinaryOp::Multiply,
                                        db,
                                        call(Function::Log, vec![a.clone()]),
                                    ),
                                    binary(
                                        BinaryOp::Divide,
                                        binary(BinaryOp::Multiply, b, da),
                                        a,
                                    ),
                                ),
                            )
                        }
                    },
                }
            }
            Node::Call(function, args) => differentiate_call(*function, args, var),
        }
    }

    /// Folds constant subtrees and removes algebraic identities.
    pub fn simplify(&self) -> Node {
        match self {
            Node::Constant(_) | Node::Variable(_) => self.clone(),
            Node::Negate(inner) => match inner.simplify() {
                Node::Constant(c) => constant(-c),
                Node::Negate(x) => *x,
                other => Node::Negate(Box::new(other)),
            },
            Node::Binary(op, a, b) => simplify_binary(*op, a.simplify(), b.simplify()),
            Node::Call(function, args) => {
                let args: Vec<Node> = args.iter().map(Node::simplify).collect();
                let values: Option<Vec<f64>> = args
                    .iter()
                    .map(|a| match a {
                        Node::Constant(c) => Some(*c),
                        _ => None,
                    })
                    .collect();
                match values {
                    Some(values) => constant(function.apply(&values)),
                    None => call(*function, args),
                }
            }
            Node::Tabulated(name, args) => {
                Node::Tabulated(name.clone(), args.iter().map(Node::simplify).collect())
            }
        }
    }

    /// Evaluates the tree with a name lookup. Intended for tests and
    /// one-off evaluation; hot loops use a compiled expression.
    pub fn evaluate_with(&self, lookup: &impl Fn(&str) -> Option<f64>) -> Option<f64> {
        match self {
            Node::Constant(c) => Some(*c),
            Node::Variable(name) => lookup(name),
            Node::Negate(inner) => inner.evaluate_with(lookup).map(|v| -v),
            Node::Binary(op, a, b) => Some(op.apply(a.evaluate_with(lookup)?, b.evaluate_with(lookup)?)),
            Node::Call(function, args) => {
                let values = args
                    .iter()
                    .map(|a| a.evaluate_with(lookup))
                    .collect::<Option<Vec<_>>>()?;
                Some(function.apply(&values))
            }
            Node::Tabulated(..) => None,
        }
    }
}

fn simplify_binary(op: BinaryOp, a: Node, b: Node) -> Node {
    if let (Node::Constant(x), Node::Constant(y)) = (&a, &b) {
        return constant(op.apply(*x, *y));
    }
    match op {
        BinaryOp::Add if a.is_constant(0.0) => b,
        BinaryOp::Add | BinaryOp::Subtract if b.is_constant(0.0) => a,
        BinaryOp::Subtract if a.is_constant(0.0) => Node::Negate(Box::new(b)).simplify(),
        BinaryOp::Multiply if a.is_constant(0.0) || b.is_constant(0.0) => constant(0.0),
        BinaryOp::Multiply if a.is_constant(1.0) => b,
        BinaryOp::Multiply | BinaryOp::Divide if b.is_constant(1.0) => a,
        BinaryOp::Multiply if a.is_constant(-1.0) => Node::Negate(Box::new(b)).simplify(),
        BinaryOp::Multiply if b.is_constant(-1.0) => Node::Negate(Box::new(a)).simplify(),
        BinaryOp::Divide if a.is_constant(0.0) => constant(0.0),
        BinaryOp::Power if b.is_constant(0.0) => constant(1.0),
        BinaryOp::Power if b.is_constant(1.0) => a,
        BinaryOp::Power if b.is_constant(2.0) => call(Function::Square, vec![a]),
        BinaryOp::Power if b.is_constant(3.0) => call(Function::Cube, vec![a]),
        _ => binary(op, a, b),
    }
}

fn differentiate_call(function: Function, args: &[Node], var: &str) -> Node {
    use BinaryOp::{Add, Divide, Multiply, Subtract};

    let u = args[0].clone();
    let du = args[0].differentiate(var);
    let chain = |outer: Node| binary(Multiply, outer, du.clone());
    let negate = |n: Node| Node::Negate(Box::new(n));
    // sqrt(1 - u^2)
    let unit_root = || {
        call(
            Function::Sqrt,
            vec![binary(Subtract, constant(1.0), call(Function::Square, vec![u.clone()]))],
        )
    };

    match function {
        Function::Sqrt => binary(
            Divide,
            du.clone(),
            binary(Multiply, constant(2.0), call(Function::Sqrt, vec![u])),
        ),
        Function::Exp => chain(call(Function::Exp, vec![u])),
        Function::Log => binary(Divide, du.clone(), u),
        Function::Sin => chain(call(Function::Cos, vec![u])),
        Function::Cos => chain(negate(call(Function::Sin, vec![u]))),
        Function::Sec => chain(binary(
            Multiply,
            call(Function::Sec, vec![u.clone()]),
            call(Function::Tan, vec![u]),
        )),
        Function::Csc => chain(negate(binary(
            Multiply,
            call(Function::Csc, vec![u.clone()]),
            call(Function::Cot, vec![u]),
        ))),
        Function::Tan => chain(call(
            Function::Square,
            vec![call(Function::Sec, vec![u])],
        )),
        Function::Cot => chain(negate(call(
            Function::Square,
            vec![call(Function::Csc, vec![u])],
        ))),
        Function::Asin => binary(Divide, du.clone(), unit_root()),
        Function::Acos => negate(binary(Divide, du.clone(), unit_root())),
        Function::Atan => binary(
            Divide,
            du.clone(),
            binary(Add, constant(1.0), call(Function::Square, vec![u])),
        ),
        Function::Atan2 => {
            // d atan2(y, x) = (x y' - y x') / (x^2 + y^2)
            let x = args[1].clone();
            let dx = args[1].differentiate(var);
            binary(
                Divide,
                binary(
                    Subtract,
                    binary(Multiply, x.clone(), du.clone()),
                    binary(Multiply, u.clone(), dx),
                ),
                binary(
                    Add,
                    call(Function::Square, vec![x]),
                    call(Function::Square, vec![u]),
                ),
            )
        }
        Function::Sinh => chain(call(Function::Cosh, vec![u])),
        Function::Cosh => chain(call(Function::Sinh, vec![u])),
        Function::Tanh => chain(binary(
            Subtract,
            constant(1.0),
            call(Function::Square, vec![call(Function::Tanh, vec![u])]),
        )),
        Function::Erf | Function::Erfc => {
            let gaussian = binary(
                Multiply,
                constant(2.0 / PI.sqrt()),
                call(
                    Function::Exp,
                    vec![negate(call(Function::Square, vec![u]))],
                ),
            );
            if function == Function::Erf {
                chain(gaussian)
            } else {
                chain(negate(gaussian))
            }
        }
        Function::Step | Function::Delta | Function::Floor | Function::Ceil => constant(0.0),
        Function::Square => chain(binary(Multiply, constant(2.0), u)),
        Function::Cube => chain(binary(
            Multiply,
            constant(3.0),
            call(Function::Square, vec![u]),
        )),
        Function::Recip => negate(binary(
            Divide,
            du.clone(),
            call(Function::Square, vec![u]),
        )),
        Function::Min | Function::Max => {
            let v = args[1].clone();
            let dv = args[1].differentiate(var);
            let a_not_less = call(Function::Step, vec![binary(Subtract, u, v)]);
            // min picks v when u >= v; max picks u
            let (when_true, when_false) = if function == Function::Min {
                (dv, du.clone())
            } else {
                (du.clone(), dv)
            };
            call(Function::Select, vec![a_not_less, when_true, when_false])
        }
        Function::Abs => chain(binary(
            Subtract,
            binary(Multiply, constant(2.0), call(Function::Step, vec![u])),
            constant(1.0),
        )),
        Function::Select => call(
            Function::Select,
            vec![
                u,
                args[1].differentiate(var),
                args[2].differentiate(var),
            ],
        ),
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constant(c) => write!(f, "{}", c),
            Node::Variable(name) => write!(f, "{}", name),
            Node::Negate(inner) => write!(f, "-({})", inner),
            Node::Binary(op, a, b) => write!(f, "({}{}{})", a, op.symbol(), b),
            Node::Call(function, args) => write_call(f, function.name(), args),
            Node::Tabulated(name, args) => write_call(f, name, args),
        }
    }
}

fn write_call(f: &mut fmt::Formatter<'_>, name: &str, args: &[Node]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{}", arg)?;
    }
    write!(f, ")")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn var(name: &str) -> Node {
        Node::Variable(name.to_string())
    }

    fn at(node: &Node, r: f64) -> f64 {
        node.evaluate_with(&|name: &str| (name == "r").then_some(r))
            .unwrap()
    }

    #[test]
    fn erf_matches_reference_values_to_double_precision() {
        let erf = |x| Function::Erf.apply(&[x]);
        let erfc = |x| Function::Erfc.apply(&[x]);
        assert_eq!(erf(0.0), 0.0);
        assert_relative_eq!(erf(0.5), 0.520_499_877_813_046_5, max_relative = 1e-14);
        assert_relative_eq!(erf(-1.0), -0.842_700_792_949_714_9, max_relative = 1e-14);
        assert_relative_eq!(erfc(2.0), 0.004_677_734_981_047_265, max_relative = 1e-14);
        assert_relative_eq!(erfc(5.0), 1.537_459_794_428_035_1e-12, max_relative = 1e-13);
    }

    #[test]
    fn erf_slope_matches_its_analytic_derivative() {
        let erf = |x: f64| Function::Erf.apply(&[x]);
        let x = 0.7;
        let h = 1e-5;
        let numeric = (erf(x + h) - erf(x - h)) / (2.0 * h);
        let analytic = 2.0 / std::f64::consts::PI.sqrt() * (-x * x).exp();
        assert_relative_eq!(numeric, analytic, max_relative = 1e-9);
    }

    #[test]
    fn simplify_folds_constants_and_identities() {
        let tree = binary(
            BinaryOp::Add,
            binary(BinaryOp::Multiply, constant(0.0), var("r")),
            binary(BinaryOp::Multiply, constant(2.0), constant(3.0)),
        );
        assert_eq!(tree.simplify(), constant(6.0));

        let tree = binary(BinaryOp::Multiply, constant(1.0), var("r"));
        assert_eq!(tree.simplify(), var("r"));

        let tree = binary(BinaryOp::Power, var("r"), constant(2.0));
        assert_eq!(tree.simplify(), call(Function::Square, vec![var("r")]));
    }

    #[test]
    fn derivative_of_power_with_constant_exponent() {
        let tree = binary(BinaryOp::Power, var("r"), constant(-12.0));
        let d = tree.differentiate("r").simplify();
        assert_relative_eq!(at(&d, 1.1), -12.0 * 1.1f64.powf(-13.0), max_relative = 1e-12);
    }

    #[test]
    fn derivative_with_respect_to_other_variable_is_zero() {
        let tree = binary(BinaryOp::Multiply, var("k"), var("k"));
        assert_eq!(tree.differentiate("r").simplify(), constant(0.0));
    }

    #[test]
    fn min_and_max_derivatives_follow_the_active_branch() {
        let min = call(Function::Min, vec![var("r"), constant(1.0)]);
        let d = min.differentiate("r");
        assert_relative_eq!(at(&d, 0.5), 1.0);
        assert_relative_eq!(at(&d, 1.5), 0.0);

        let max = call(Function::Max, vec![var("r"), constant(1.0)]);
        let d = max.differentiate("r");
        assert_relative_eq!(at(&d, 0.5), 0.0);
        assert_relative_eq!(at(&d, 1.5), 1.0);
    }

    #[test]
    fn substitute_replaces_all_occurrences() {
        let tree = binary(BinaryOp::Add, var("a"), var("a"));
        let replaced = tree.substitute("a", &var("r"));
        assert_eq!(replaced.variables(), vec!["r"]);
    }

    #[test]
    fn step_is_one_at_zero() {
        assert_eq!(Function::Step.apply(&[0.0]), 1.0);
        assert_eq!(Function::Step.apply(&[-1e-12]), 0.0);
        assert_eq!(Function::Select.apply(&[0.0, 1.0, 2.0]), 2.0);
    }
}
