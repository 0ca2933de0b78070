//! Arithmetic expression evaluator backing the `calculator` tool.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('+' | '-') unary | power
//! power   := primary ('^' unary)?
//! primary := number | name | name '(' args ')' | '(' expr ')'
//! ```
//!
//! `**` is accepted as an alias for `^`, which is right-associative.

use serde_json::{json, Value};
use thiserror::Error;

use crate::tools::Tool;

/// Deepest nesting of parentheses, signs and exponents the parser accepts.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("unknown constant '{0}'")]
    UnknownConstant(String),

    #[error("{name} expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0}")]
    Domain(String),

    #[error("expression nested deeper than {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Op(char),
    LParen,
    RParen,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Ident(s) => s.clone(),
            Token::Op(c) => c.to_string(),
            Token::LParen => "(".to_string(),
            Token::RParen => ")".to_string(),
            Token::Comma => ",".to_string(),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut literal = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' || d == '_' {
                        if d != '_' {
                            literal.push(d);
                        }
                        chars.next();
                    } else if (d == 'e' || d == 'E') && !literal.contains(['e', 'E']) {
                        // Only treat `e` as an exponent when digits follow.
                        let mut lookahead = chars.clone();
                        lookahead.next();
                        let next = lookahead.peek().copied();
                        let signed = matches!(next, Some('+') | Some('-'));
                        if signed {
                            lookahead.next();
                        }
                        if lookahead.peek().is_some_and(|n| n.is_ascii_digit()) {
                            literal.push('e');
                            chars.next();
                            if signed {
                                literal.push(chars.next().unwrap_or('+'));
                            }
                        } else {
                            break;
                        }
                    } else {
                        break;
                    }
                }
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| CalcError::UnexpectedToken(literal.clone()))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_alphanumeric() || d == '_' {
                        name.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name.to_lowercase()));
            }
            '*' => {
                chars.next();
                if chars.peek() == Some(&'*') {
                    chars.next();
                    tokens.push(Token::Op('^'));
                } else {
                    tokens.push(Token::Op('*'));
                }
            }
            '+' | '-' | '/' | '%' | '^' => {
                chars.next();
                tokens.push(Token::Op(c));
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), CalcError> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(CalcError::UnexpectedToken(t.describe())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek().cloned() {
            self.pos += 1;
            let rhs = self.unary()?;
            value = match op {
                '*' => value * rhs,
                _ if rhs == 0.0 => return Err(CalcError::DivisionByZero),
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // Every recursive path passes through here, so this is where depth is counted.
    fn unary(&mut self) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if let Some(Token::LParen) = self.peek() {
                    self.pos += 1;
                    let args = self.args()?;
                    apply_function(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(t) => Err(CalcError::UnexpectedToken(t.describe())),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn args(&mut self) -> Result<Vec<f64>, CalcError> {
        let mut args = Vec::new();
        if let Some(Token::RParen) = self.peek() {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(t) => return Err(CalcError::UnexpectedToken(t.describe())),
                None => return Err(CalcError::UnexpectedEnd),
            }
        }
    }
}

fn constant(name: &str) -> Result<f64, CalcError> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        "tau" => Ok(std::f64::consts::TAU),
        _ => Err(CalcError::UnknownConstant(name.to_string())),
    }
}

fn unary_arg(name: &str, args: &[f64]) -> Result<f64, CalcError> {
    match args {
        [x] => Ok(*x),
        _ => Err(CalcError::Arity {
            name: name.to_string(),
            expected: "1",
            got: args.len(),
        }),
    }
}

fn at_least_one(name: &str, args: &[f64]) -> Result<(), CalcError> {
    if args.is_empty() {
        return Err(CalcError::Arity {
            name: name.to_string(),
            expected: "at least 1",
            got: 0,
        });
    }
    Ok(())
}

fn apply_function(name: &str, args: &[f64]) -> Result<f64, CalcError> {
    match name {
        "sqrt" => {
            let x = unary_arg(name, args)?;
            if x < 0.0 {
                return Err(CalcError::Domain(format!(
                    "sqrt of negative number {}",
                    x
                )));
            }
            Ok(x.sqrt())
        }
        "ln" | "log" => {
            // log(x, base) is accepted as well as log(x).
            let (x, base) = match (name, args) {
                ("log", [x, base]) => (*x, Some(*base)),
                _ => (unary_arg(name, args)?, None),
            };
            if x <= 0.0 {
                return Err(CalcError::Domain(format!("{} of non-positive number {}", name, x)));
            }
            Ok(match (name, base) {
                (_, Some(b)) => x.ln() / b.ln(),
                ("ln", None) => x.ln(),
                _ => x.log10(),
            })
        }
        "abs" => Ok(unary_arg(name, args)?.abs()),
        "exp" => Ok(unary_arg(name, args)?.exp()),
        "sin" => Ok(unary_arg(name, args)?.sin()),
        "cos" => Ok(unary_arg(name, args)?.cos()),
        "tan" => Ok(unary_arg(name, args)?.tan()),
        "floor" => Ok(unary_arg(name, args)?.floor()),
        "ceil" => Ok(unary_arg(name, args)?.ceil()),
        "round" => Ok(unary_arg(name, args)?.round()),
        "sum" => Ok(args.iter().sum()),
        "avg" | "mean" | "average" => {
            at_least_one(name, args)?;
            Ok(args.iter().sum::<f64>() / args.len() as f64)
        }
        "min" => {
            at_least_one(name, args)?;
            Ok(args.iter().copied().fold(f64::INFINITY, f64::min))
        }
        "max" => {
            at_least_one(name, args)?;
            Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        _ => Err(CalcError::UnknownFunction(name.to_string())),
    }
}

/// Evaluate an expression to a finite number.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(CalcError::UnexpectedEnd);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(t) = parser.peek() {
        return Err(CalcError::UnexpectedToken(t.describe()));
    }
    if !value.is_finite() {
        return Err(CalcError::Domain("result is not a finite number".to_string()));
    }
    Ok(value)
}

/// Render whole numbers without a trailing `.0`.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let rendered = format!("{:.10}", value);
        rendered.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

/// The `calculator` tool exposed to agents.
pub struct Calculator;

impl Tool for Calculator {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate a mathematical expression. Supports + - * / % ^, parentheses, \
         constants pi and e, and the functions sqrt, abs, ln, log, exp, sin, cos, \
         tan, floor, ceil, round, sum, avg, mean, min and max."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. \"sqrt(144)\" or \"avg(10, 15, 20)\""
                }
            },
            "required": ["expression"]
        })
    }

    fn call(&self, arguments: &Value) -> Result<String, String> {
        let expression = arguments
            .get("expression")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing string argument 'expression'".to_string())?;

        evaluate(expression)
            .map(|value| format!("Result: {}", format_number(value)))
            .map_err(|e| format!("Error evaluating '{}': {}", expression, e))
    }
}
