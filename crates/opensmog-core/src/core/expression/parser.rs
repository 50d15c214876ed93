use super::ExpressionError;
use super::node::{BinaryOp, Function, Node};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Operator(char),
    LeftParen,
    RightParen,
    Comma,
}

fn error(position: usize, message: impl Into<String>) -> ExpressionError {
    ExpressionError::Parse {
        position,
        message: message.into(),
    }
}

fn tokenize(source: &str, offset: usize) -> Result<Vec<(usize, Token)>, ExpressionError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i] as char;
        let start = i;
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '+' | '-' | '*' | '/' | '^' => {
                tokens.push((offset + start, Token::Operator(c)));
                i += 1;
            }
            '(' => {
                tokens.push((offset + start, Token::LeftParen));
                i += 1;
            }
            ')' => {
                tokens.push((offset + start, Token::RightParen));
                i += 1;
            }
            ',' => {
                tokens.push((offset + start, Token::Comma));
                i += 1;
            }
            '0'..='9' | '.' => {
                while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                    i += 1;
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && bytes[j].is_ascii_digit() {
                        while j < bytes.len() && bytes[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text = &source[start..i];
                let value = text
                    .parse()
                    .map_err(|_| error(offset + start, format!("invalid number '{}'", text)))?;
                tokens.push((offset + start, Token::Number(value)));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push((offset + start, Token::Identifier(source[start..i].to_string())));
            }
            other => {
                return Err(error(offset + start, format!("unexpected character '{}'", other)));
            }
        }
    }
    Ok(tokens)
}

/// Recursive-descent parser. Precedence from loosest to tightest:
/// `+ -`, `* /`, unary minus, `^` (right associative).
struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(p, _)| *p)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExpressionError> {
        let position = self.position();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            _ => Err(error(position, format!("expected {}", what))),
        }
    }

    fn parse_sum(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.parse_product()?;
        while let Some(Token::Operator(op @ ('+' | '-'))) = self.peek() {
            let op = if *op == '+' {
                BinaryOp::Add
            } else {
                BinaryOp::Subtract
            };
            self.pos += 1;
            let rhs = self.parse_product()?;
            node = Node::Binary(op, Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_product(&mut self) -> Result<Node, ExpressionError> {
        let mut node = self.parse_unary()?;
        while let Some(Token::Operator(op @ ('*' | '/'))) = self.peek() {
            let op = if *op == '*' {
                BinaryOp::Multiply
            } else {
                BinaryOp::Divide
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            node = Node::Binary(op, Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Node, ExpressionError> {
        match self.peek() {
            Some(Token::Operator('-')) => {
                self.pos += 1;
                Ok(Node::Negate(Box::new(self.parse_unary()?)))
            }
            Some(Token::Operator('+')) => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Node, ExpressionError> {
        let base = self.parse_primary()?;
        if let Some(Token::Operator('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.parse_unary()?;
            return Ok(Node::Binary(
                BinaryOp::Power,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn parse_arguments(&mut self) -> Result<Vec<Node>, ExpressionError> {
        let mut args = vec![self.parse_sum()?];
        while let Some(Token::Comma) = self.peek() {
            self.pos += 1;
            args.push(self.parse_sum()?);
        }
        self.expect(Token::RightParen, "')' after function arguments")?;
        Ok(args)
    }

    fn parse_primary(&mut self) -> Result<Node, ExpressionError> {
        let position = self.position();
        match self.next() {
            Some(Token::Number(value)) => Ok(Node::Constant(value)),
            Some(Token::LeftParen) => {
                let inner = self.parse_sum()?;
                self.expect(Token::RightParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Identifier(name)) => {
                if self.peek() != Some(&Token::LeftParen) {
                    return Ok(Node::Variable(name));
                }
                self.pos += 1;
                let args = self.parse_arguments()?;
                match Function::from_name(&name) {
                    Some(function) if function.arity() != args.len() => {
                        Err(ExpressionError::WrongArgumentCount {
                            function: name,
                            expected: function.arity(),
                            found: args.len(),
                        })
                    }
                    Some(function) => Ok(Node::Call(function, args)),
                    None => Ok(Node::Tabulated(name, args)),
                }
            }
            Some(_) => Err(error(position, "unexpected token")),
            None => Err(error(position, "unexpected end of expression")),
        }
    }
}

fn parse_single(source: &str, offset: usize) -> Result<Node, ExpressionError> {
    let tokens = tokenize(source, offset)?;
    if tokens.is_empty() {
        return Err(error(offset, "empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: offset + source.len(),
    };
    let node = parser.parse_sum()?;
    if parser.pos < parser.tokens.len() {
        return Err(error(parser.position(), "unexpected trailing input"));
    }
    Ok(node)
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parses `expr; name = expr; ...`. Each definition may use names defined
/// after it, so definitions are substituted from last to first.
pub(crate) fn parse(source: &str) -> Result<Node, ExpressionError> {
    let mut segments = Vec::new();
    let mut offset = 0;
    for segment in source.split(';') {
        segments.push((offset, segment));
        offset += segment.len() + 1;
    }

    let (main_offset, main_source) = segments[0];
    let main = parse_single(main_source, main_offset)?;

    let mut definitions: Vec<(String, Node)> = Vec::new();
    for &(offset, segment) in &segments[1..] {
        if segment.trim().is_empty() {
            continue;
        }
        let (name, body) = segment
            .split_once('=')
            .ok_or_else(|| error(offset, "expected 'name = expression' definition"))?;
        let name = name.trim();
        if !is_identifier(name) {
            return Err(error(offset, format!("invalid definition name '{}'", name)));
        }
        let body_offset = offset + segment.find('=').map_or(0, |i| i + 1);
        definitions.push((name.to_string(), parse_single(body, body_offset)?));
    }

    let mut resolved: Vec<(String, Node)> = Vec::with_capacity(definitions.len());
    for (name, body) in definitions.into_iter().rev() {
        let body = resolved
            .iter()
            .rev()
            .fold(body, |node, (later, value)| node.substitute(later, value));
        resolved.push((name, body));
    }

    Ok(resolved
        .iter()
        .rev()
        .fold(main, |node, (name, value)| node.substitute(name, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn eval(source: &str, vars: &[(&str, f64)]) -> f64 {
        parse(source)
            .unwrap()
            .evaluate_with(&|name: &str| vars.iter().find(|(n, _)| *n == name).map(|(_, v)| *v))
            .unwrap()
    }

    #[test]
    fn operator_precedence_and_associativity() {
        assert_relative_eq!(eval("1+2*3", &[]), 7.0);
        assert_relative_eq!(eval("2^3^2", &[]), 512.0);
        assert_relative_eq!(eval("-2^2", &[]), -4.0);
        assert_relative_eq!(eval("8/4/2", &[]), 1.0);
        assert_relative_eq!(eval("2^-1", &[]), 0.5);
        assert_relative_eq!(eval("(1+2)*3", &[]), 9.0);
    }

    #[test]
    fn scientific_notation_numbers() {
        assert_relative_eq!(eval("1.5e-3*2", &[]), 3.0e-3);
        assert_relative_eq!(eval(".5E+1", &[]), 5.0);
    }

    #[test]
    fn contact_expression_with_variables() {
        let value = eval("A/r^12-B/r^10", &[("A", 2.0), ("B", 1.0), ("r", 1.0)]);
        assert_relative_eq!(value, 1.0);
    }

    #[test]
    fn definitions_may_reference_later_definitions() {
        let value = eval("eps*x; x = y + 1; y = 2*r", &[("eps", 3.0), ("r", 0.5)]);
        assert_relative_eq!(value, 6.0);
    }

    #[test]
    fn function_calls_and_tabulated_calls() {
        assert_relative_eq!(eval("max(r, 2) + min(1, 3)", &[("r", 1.0)]), 3.0);
        let node = parse("C12(type1,type2)/r^12").unwrap();
        let Node::Binary(BinaryOp::Divide, lhs, _) = node else {
            panic!("expected division");
        };
        assert!(matches!(*lhs, Node::Tabulated(ref name, ref args) if name == "C12" && args.len() == 2));
    }

    #[test]
    fn wrong_argument_count_is_rejected() {
        assert!(matches!(
            parse("sqrt(1, 2)"),
            Err(ExpressionError::WrongArgumentCount { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn syntax_errors_report_position() {
        match parse("1 + * 2") {
            Err(ExpressionError::Parse { position, .. }) => assert_eq!(position, 4),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(parse("(r").is_err());
        assert!(parse("r r").is_err());
        assert!(parse("").is_err());
        assert!(parse("r; 2x = 1").is_err());
        assert!(parse("r $ 2").is_err());
    }
}
