//! Restricted expression language used by `#if`, `#elif` and `{…}` macros.
//!
//! ```text
//! or      := and ( "||" and )*
//! and     := eq ( "&&" eq )*
//! eq      := cmp ( ("==" | "!=" | "===" | "!==") cmp )*
//! cmp     := add ( ("<" | "<=" | ">" | ">=") add )*
//! add     := mul ( ("+" | "-") mul )*
//! mul     := unary ( ("*" | "/" | "%") unary )*
//! unary   := ("!" | "-" | "+") unary | primary
//! primary := NUMBER | STRING | "true" | "false" | IDENT | "(" or ")"
//! ```
//!
//! Identifiers are resolved through a [`Scope`]; an unknown identifier is an
//! error. Nothing outside this grammar can be evaluated.

use std::cmp::Ordering;
use std::fmt;

use story_state::format_number;

use crate::error::EvalError;

/// Result of an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Num(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    /// Numeric view; text that is not a number becomes NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Str(s) if s.trim().is_empty() => 0.0,
            Value::Str(s) => s.trim().parse().unwrap_or(f64::NAN),
        }
    }

    fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Num(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Resolves identifiers during evaluation.
pub trait Scope {
    fn lookup(&self, name: &str) -> Option<Value>;
}

/// Scope without any symbols.
pub struct NoSymbols;

impl Scope for NoSymbols {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{}", format_number(*n)),
            Token::Str(s) => write!(f, "\"{}\"", s),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Op(op) => write!(f, "{}", op),
        }
    }
}

/// Deepest allowed nesting of parentheses and prefix operators.
pub const MAX_NESTING: usize = 64;

/// Longest allowed expression, which also bounds the depth of operator chains.
pub const MAX_TOKENS: usize = 4096;

const OPERATORS: [&str; 19] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "<", ">", "!", "+", "-", "*", "/", "%",
    "(", ")", ",",
];

fn tokenize(src: &str) -> Result<Vec<Token>, EvalError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if tokens.len() >= MAX_TOKENS {
            return Err(EvalError::TooLong(MAX_TOKENS));
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit()))
        {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let literal: String = chars[start..i].iter().collect();
            let n = literal
                .parse::<f64>()
                .map_err(|_| EvalError::UnexpectedToken(literal.clone()))?;
            tokens.push(Token::Num(n));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(EvalError::UnterminatedString);
                };
                i += 1;
                if ch == quote {
                    break;
                }
                if ch == '\\' {
                    let Some(&escaped) = chars.get(i) else {
                        return Err(EvalError::UnterminatedString);
                    };
                    i += 1;
                    s.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    });
                } else {
                    s.push(ch);
                }
            }
            tokens.push(Token::Str(s));
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len()
                && (chars[i].is_alphanumeric() || matches!(chars[i], '_' | ':' | '.'))
            {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push(Token::Op(op));
                i += op.chars().count();
            }
            None => return Err(EvalError::UnexpectedChar(c)),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Ident(String),
    Unary(&'static str, Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(Token::Op(op)) => Some(op),
            _ => None,
        }
    }

    fn eat_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        let op = self.peek_op().filter(|op| ops.contains(op))?;
        self.pos += 1;
        Some(op)
    }

    fn binary_level(
        &mut self,
        ops: &[&'static str],
        next: fn(&mut Self) -> Result<Expr, EvalError>,
    ) -> Result<Expr, EvalError> {
        let mut left = next(self)?;
        while let Some(op) = self.eat_op(ops) {
            let right = next(self)?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn or(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&["||"], Self::and)
    }

    fn and(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&["&&"], Self::equality)
    }

    fn equality(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&["==", "!=", "===", "!=="], Self::comparison)
    }

    fn comparison(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&["<", "<=", ">", ">="], Self::additive)
    }

    fn additive(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&["+", "-"], Self::multiplicative)
    }

    fn multiplicative(&mut self) -> Result<Expr, EvalError> {
        self.binary_level(&["*", "/", "%"], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr, EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(EvalError::TooDeep(MAX_NESTING));
        }
        let expr = match self.eat_op(&["!", "-", "+"]) {
            Some(op) => Expr::Unary(op, Box::new(self.unary()?)),
            None => self.primary()?,
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn primary(&mut self) -> Result<Expr, EvalError> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(EvalError::UnexpectedEnd)?;
        self.pos += 1;

        match token {
            Token::Num(n) => Ok(Expr::Literal(Value::Num(n))),
            Token::Str(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Ident(name) if name == "true" => Ok(Expr::Literal(Value::Bool(true))),
            Token::Ident(name) if name == "false" => Ok(Expr::Literal(Value::Bool(false))),
            Token::Ident(name) => Ok(Expr::Ident(name)),
            Token::Op("(") => {
                let inner = self.or()?;
                match self.eat_op(&[")"]) {
                    Some(_) => Ok(inner),
                    None => Err(self.unexpected()),
                }
            }
            other => Err(EvalError::UnexpectedToken(other.to_string())),
        }
    }

    fn unexpected(&self) -> EvalError {
        match self.tokens.get(self.pos) {
            Some(token) => EvalError::UnexpectedToken(token.to_string()),
            None => EvalError::UnexpectedEnd,
        }
    }
}

fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(EvalError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.or()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.unexpected());
    }
    Ok(expr)
}

fn eval(expr: &Expr, scope: &dyn Scope) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => scope
            .lookup(name)
            .ok_or_else(|| EvalError::UnknownSymbol(name.clone())),
        Expr::Unary(op, operand) => {
            let value = eval(operand, scope)?;
            Ok(match *op {
                "!" => Value::Bool(!value.truthy()),
                "-" => Value::Num(-value.to_number()),
                _ => Value::Num(value.to_number()),
            })
        }
        Expr::Binary("&&", left, right) => {
            let left = eval(left, scope)?;
            if left.truthy() {
                eval(right, scope)
            } else {
                Ok(left)
            }
        }
        Expr::Binary("||", left, right) => {
            let left = eval(left, scope)?;
            if left.truthy() {
                Ok(left)
            } else {
                eval(right, scope)
            }
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            Ok(apply_binary(op, &left, &right))
        }
    }
}

fn apply_binary(op: &str, left: &Value, right: &Value) -> Value {
    match op {
        "+" => match (left, right) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{}{}", left, right)),
            _ => Value::Num(left.to_number() + right.to_number()),
        },
        "-" => Value::Num(left.to_number() - right.to_number()),
        "*" => Value::Num(left.to_number() * right.to_number()),
        "/" => Value::Num(left.to_number() / right.to_number()),
        "%" => Value::Num(left.to_number() % right.to_number()),
        "==" => Value::Bool(loose_eq(left, right)),
        "!=" => Value::Bool(!loose_eq(left, right)),
        "===" => Value::Bool(left.same_type(right) && loose_eq(left, right)),
        "!==" => Value::Bool(!(left.same_type(right) && loose_eq(left, right))),
        _ => {
            let ordering = match (left, right) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => left.to_number().partial_cmp(&right.to_number()),
            };
            Value::Bool(match (op, ordering) {
                (_, None) => false,
                ("<", Some(o)) => o == Ordering::Less,
                ("<=", Some(o)) => o != Ordering::Greater,
                (">", Some(o)) => o == Ordering::Greater,
                (">=", Some(o)) => o != Ordering::Less,
                _ => false,
            })
        }
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        _ => left.to_number() == right.to_number(),
    }
}

/// Parse and evaluate an expression.
pub fn evaluate(src: &str, scope: &dyn Scope) -> Result<Value, EvalError> {
    let expr = parse(src)?;
    eval(&expr, scope)
}
