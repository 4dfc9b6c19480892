//! The embedded expression language used by CALCULATION rules and SCRIPT
//! conditions.
//!
//! Deliberately small: numeric arithmetic, string concatenation and
//! comparison, boolean composition, parentheses, and variable lookup in a
//! flat binding map. Variables are bare identifiers (`price`) or the legacy
//! `$`-prefixed form (`$price`). The evaluator can reach nothing outside its
//! bindings.

use serde_json::{Map, Number, Value};

use crate::error::{NodeError, NodeResult};
use crate::evaluator::operators::values_equal;

/// Evaluate `source` against the bound variables.
pub fn evaluate_expression(source: &str, bindings: &Map<String, Value>) -> NodeResult<Value> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expression()?;
    parser.expect_end()?;
    expr.eval(bindings)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    LParen,
    RParen,
}

fn tokenize(source: &str) -> NodeResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                chars.next();
            }
            '0'..='9' | '.' => {
                let mut num = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let parsed = num.parse::<f64>().map_err(|_| {
                    NodeError::ExpressionError(format!("invalid number literal: {num}"))
                })?;
                tokens.push(Token::Number(parsed));
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                for d in chars.by_ref() {
                    if d == quote {
                        closed = true;
                        break;
                    }
                    s.push(d);
                }
                if !closed {
                    return Err(NodeError::ExpressionError(
                        "unterminated string literal".to_string(),
                    ));
                }
                tokens.push(Token::Str(s));
            }
            '$' => {
                chars.next();
                let name = read_identifier(&mut chars);
                if name.is_empty() {
                    return Err(NodeError::ExpressionError(
                        "expected variable name after '$'".to_string(),
                    ));
                }
                tokens.push(Token::Ident(name));
            }
            c if c.is_alphabetic() || c == '_' => {
                let name = read_identifier(&mut chars);
                tokens.push(match name.as_str() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    _ => Token::Ident(name),
                });
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '=' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Eq);
                } else {
                    return Err(NodeError::ExpressionError(
                        "'=' is not an operator; use '=='".to_string(),
                    ));
                }
            }
            '!' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ne);
                } else {
                    tokens.push(Token::Bang);
                }
            }
            '<' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    chars.next();
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '&' => {
                chars.next();
                if chars.peek() == Some(&'&') {
                    chars.next();
                    tokens.push(Token::AndAnd);
                } else {
                    return Err(NodeError::ExpressionError(
                        "'&' is not an operator; use '&&'".to_string(),
                    ));
                }
            }
            '|' => {
                chars.next();
                if chars.peek() == Some(&'|') {
                    chars.next();
                    tokens.push(Token::OrOr);
                } else {
                    return Err(NodeError::ExpressionError(
                        "'|' is not an operator; use '||'".to_string(),
                    ));
                }
            }
            other => {
                return Err(NodeError::ExpressionError(format!(
                    "unexpected character '{other}'"
                )));
            }
        }
    }

    Ok(tokens)
}

fn read_identifier(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut name = String::new();
    while let Some(&d) = chars.peek() {
        if d.is_alphanumeric() || d == '_' {
            name.push(d);
            chars.next();
        } else {
            break;
        }
    }
    name
}

#[derive(Debug, Clone)]
enum Expr {
    Literal(Value),
    Variable(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_end(&self) -> NodeResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(NodeError::ExpressionError(format!(
                "unexpected trailing token: {token:?}"
            ))),
        }
    }

    fn parse_expression(&mut self) -> NodeResult<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> NodeResult<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> NodeResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let right = self.parse_equality()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> NodeResult<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> NodeResult<Expr> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> NodeResult<Expr> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> NodeResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> NodeResult<Expr> {
        if self.eat(&Token::Bang) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        if self.eat(&Token::Minus) {
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> NodeResult<Expr> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number_value(n)?)),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::True) => Ok(Expr::Literal(Value::Bool(true))),
            Some(Token::False) => Ok(Expr::Literal(Value::Bool(false))),
            Some(Token::Null) => Ok(Expr::Literal(Value::Null)),
            Some(Token::Ident(name)) => Ok(Expr::Variable(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expression()?;
                if !self.eat(&Token::RParen) {
                    return Err(NodeError::ExpressionError(
                        "expected closing ')'".to_string(),
                    ));
                }
                Ok(inner)
            }
            Some(token) => Err(NodeError::ExpressionError(format!(
                "unexpected token: {token:?}"
            ))),
            None => Err(NodeError::ExpressionError(
                "unexpected end of expression".to_string(),
            )),
        }
    }
}

impl Expr {
    fn eval(&self, bindings: &Map<String, Value>) -> NodeResult<Value> {
        match self {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Variable(name) => bindings.get(name).cloned().ok_or_else(|| {
                NodeError::ExpressionError(format!("unbound variable: {name}"))
            }),
            Expr::Unary(op, operand) => {
                let value = operand.eval(bindings)?;
                match op {
                    UnaryOp::Not => match value {
                        Value::Bool(b) => Ok(Value::Bool(!b)),
                        other => Err(type_error("!", &other)),
                    },
                    UnaryOp::Neg => match as_number(&value) {
                        Some(n) => number_value(-n),
                        None => Err(type_error("-", &value)),
                    },
                }
            }
            Expr::Binary(op, left, right) => eval_binary(*op, left, right, bindings),
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    bindings: &Map<String, Value>,
) -> NodeResult<Value> {
    // && and || short-circuit: the right side is only evaluated when the
    // left side does not already decide the result.
    match op {
        BinaryOp::And => {
            return match left.eval(bindings)? {
                Value::Bool(false) => Ok(Value::Bool(false)),
                Value::Bool(true) => expect_bool("&&", right.eval(bindings)?),
                other => Err(type_error("&&", &other)),
            };
        }
        BinaryOp::Or => {
            return match left.eval(bindings)? {
                Value::Bool(true) => Ok(Value::Bool(true)),
                Value::Bool(false) => expect_bool("||", right.eval(bindings)?),
                other => Err(type_error("||", &other)),
            };
        }
        _ => {}
    }

    let lhs = left.eval(bindings)?;
    let rhs = right.eval(bindings)?;

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&lhs, &rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&lhs, &rhs))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = compare(&lhs, &rhs)?;
            Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Add => {
            if lhs.is_string() || rhs.is_string() {
                let mut s = super::operators::value_to_string(&lhs);
                s.push_str(&super::operators::value_to_string(&rhs));
                return Ok(Value::String(s));
            }
            arithmetic("+", &lhs, &rhs, |a, b| a + b)
        }
        BinaryOp::Sub => arithmetic("-", &lhs, &rhs, |a, b| a - b),
        BinaryOp::Mul => arithmetic("*", &lhs, &rhs, |a, b| a * b),
        BinaryOp::Div => arithmetic("/", &lhs, &rhs, |a, b| a / b),
        BinaryOp::Rem => arithmetic("%", &lhs, &rhs, |a, b| a % b),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn type_error(op: &str, value: &Value) -> NodeError {
    NodeError::ExpressionError(format!("operator '{op}' cannot be applied to {value}"))
}

fn expect_bool(op: &str, value: Value) -> NodeResult<Value> {
    match value {
        Value::Bool(_) => Ok(value),
        other => Err(type_error(op, &other)),
    }
}

fn compare(lhs: &Value, rhs: &Value) -> NodeResult<std::cmp::Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        _ => match (as_number(lhs), as_number(rhs)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).ok_or_else(|| {
                NodeError::ExpressionError("incomparable numeric values".to_string())
            }),
            _ => Err(NodeError::ExpressionError(format!(
                "cannot compare {lhs} with {rhs}"
            ))),
        },
    }
}

fn arithmetic(
    op: &str,
    lhs: &Value,
    rhs: &Value,
    f: impl Fn(f64, f64) -> f64,
) -> NodeResult<Value> {
    match (as_number(lhs), as_number(rhs)) {
        (Some(a), Some(b)) => number_value(f(a, b)),
        _ => Err(NodeError::ExpressionError(format!(
            "operator '{op}' requires numeric operands, got {lhs} and {rhs}"
        ))),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Wrap an f64 result, rendering whole numbers as integers. Non-finite
/// results (division by zero, overflow) are evaluation errors because
/// `serde_json::Number` cannot represent them.
fn number_value(n: f64) -> NodeResult<Value> {
    if !n.is_finite() {
        return Err(NodeError::ExpressionError(format!(
            "non-finite arithmetic result: {n}"
        )));
    }
    if n.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&n) {
        return Ok(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(|| NodeError::ExpressionError(format!("unrepresentable number: {n}")))
}
