// conmon-core/src/domain/check/predicate.rs
// ============================================================================
// Module: Custom Predicate Language
// Description: Small expression language for CUSTOM comparisons.
// Purpose: Express check-specific logic as data, compiled once into an AST and
//          evaluated by a tree-walking interpreter. No host code is executed.
// ============================================================================

//! ## Grammar (informal)
//!
//! ```text
//! expr    := or
//! or      := and ( "||" and )*
//! and     := not ( "&&" not )*
//! not     := "!" not | cmp
//! cmp     := sum ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" | "in" | "contains" ) sum )?
//! sum     := product ( ( "+" | "-" ) product )*
//! product := unary ( ( "*" | "/" | "%" ) unary )*
//! unary   := "-" unary | primary
//! primary := number | string | "true" | "false" | "null" | "[" list "]"
//!          | path | ident "(" args ")" | "(" expr ")"
//! path    := ( "actual" | "expected" ) ( "." ( ident | digits ) )*
//! ```
//!
//! Functions: `len(x)`, `lower(s)`, `upper(s)`, `starts_with(s, p)`,
//! `ends_with(s, p)`, `matches(s, regex)`, `exists(path)`.
//!
//! ```
//! use conmon_core::domain::check::predicate::Predicate;
//! use serde_json::json;
//!
//! let p = Predicate::compile("len(actual.rules) >= expected && actual.mode in ['strict', 'audit']").unwrap();
//! assert!(p.evaluate(&json!({"rules": [1, 2], "mode": "audit"}), &json!(2)).unwrap());
//! ```

use regex::Regex;
use serde_json::{Number, Value};
use thiserror::Error;

use super::compare::{contains, ordering, type_name, values_equal};
use super::path::{length_of, step};

// ============================================================================
// SECTION: Limits
// ============================================================================

const MAX_INPUT_BYTES: usize = 4 * 1024;
const MAX_NESTING: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredicateError {
    // --- compile time ---
    #[error("predicate is empty")]
    EmptyInput,
    #[error("predicate exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    InputTooLarge {
        max_bytes: usize,
        actual_bytes: usize,
    },
    #[error("predicate nesting exceeds limit of {max_depth} at {position}")]
    NestingTooDeep { max_depth: usize, position: usize },
    #[error("unexpected token `{found}` at {position}, expected {expected}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        position: usize,
    },
    #[error("unknown identifier `{name}` at {position} (use `actual` or `expected`)")]
    UnknownIdentifier { name: String, position: usize },
    #[error("unknown function `{name}` at {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("function `{function}` takes {expected} argument(s), got {found}")]
    Arity {
        function: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("invalid number `{raw}` at {position}")]
    InvalidNumber { raw: String, position: usize },
    #[error("unterminated string starting at {position}")]
    UnterminatedString { position: usize },
    #[error("invalid regex `{pattern}`: {reason}")]
    InvalidRegex { pattern: String, reason: String },
    #[error("unexpected trailing input at {position}")]
    TrailingInput { position: usize },

    // --- run time ---
    #[error("`{operation}` cannot be applied to {found}")]
    TypeError {
        operation: &'static str,
        found: String,
    },
    #[error("path `{0}` does not resolve")]
    MissingField(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("predicate produced {0}, expected a boolean")]
    NotBoolean(&'static str),
}

// ============================================================================
// SECTION: AST
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Root {
    Actual,
    Expected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Contains,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::And => "&&",
            Self::Or => "||",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::Contains => "contains",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Function {
    Len,
    Lower,
    Upper,
    StartsWith,
    EndsWith,
    /// Pattern compiled at parse time; only literal patterns are accepted.
    Matches(Regex),
    Exists,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Path { root: Root, segments: Vec<String> },
    Not(Box<Expr>),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call { function: Function, args: Vec<Expr> },
}

/// A compiled predicate. Keeps its source for persistence and display.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    pub fn compile(source: &str) -> Result<Self, PredicateError> {
        if source.len() > MAX_INPUT_BYTES {
            return Err(PredicateError::InputTooLarge {
                max_bytes: MAX_INPUT_BYTES,
                actual_bytes: source.len(),
            });
        }
        let tokens = Lexer::new(source).lex()?;
        let mut parser = Parser {
            tokens,
            index: 0,
            depth: 0,
        };
        let expr = parser.parse_expr()?;
        parser.expect_eof()?;
        Ok(Self {
            source: source.trim().to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, actual: &Value, expected: &Value) -> Result<bool, PredicateError> {
        let env = Env { actual, expected };
        match env.eval(&self.expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(PredicateError::NotBoolean(type_name(&other))),
        }
    }
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    Str(String),
    Op(&'static str),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Ident(s) | Token::Number(s) => s.clone(),
            Token::Str(s) => format!("'{}'", s),
            Token::Op(op) => (*op).to_string(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::LBracket => "[".into(),
            Token::RBracket => "]".into(),
            Token::Comma => ",".into(),
            Token::Dot => ".".into(),
            Token::Eof => "end of input".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    position: usize,
}

struct Lexer<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, offset: 0 }
    }

    fn lex(mut self) -> Result<Vec<Spanned>, PredicateError> {
        let bytes = self.input.as_bytes();
        let mut tokens = Vec::new();

        while self.offset < bytes.len() {
            let start = self.offset;
            let ch = bytes[start];
            let next = bytes.get(start + 1).copied();

            let token = match (ch, next) {
                (b' ' | b'\t' | b'\n' | b'\r', _) => {
                    self.offset += 1;
                    continue;
                }
                (b'(', _) => self.single(Token::LParen),
                (b')', _) => self.single(Token::RParen),
                (b'[', _) => self.single(Token::LBracket),
                (b']', _) => self.single(Token::RBracket),
                (b',', _) => self.single(Token::Comma),
                (b'.', _) => self.single(Token::Dot),
                (b'&', Some(b'&')) => self.double("&&"),
                (b'|', Some(b'|')) => self.double("||"),
                (b'=', Some(b'=')) => self.double("=="),
                (b'!', Some(b'=')) => self.double("!="),
                (b'<', Some(b'=')) => self.double("<="),
                (b'>', Some(b'=')) => self.double(">="),
                (b'!', _) => self.single(Token::Op("!")),
                (b'<', _) => self.single(Token::Op("<")),
                (b'>', _) => self.single(Token::Op(">")),
                (b'+', _) => self.single(Token::Op("+")),
                (b'-', _) => self.single(Token::Op("-")),
                (b'*', _) => self.single(Token::Op("*")),
                (b'/', _) => self.single(Token::Op("/")),
                (b'%', _) => self.single(Token::Op("%")),
                (b'\'' | b'"', _) => self.string(ch)?,
                (b'0'..=b'9', _) => {
                    self.consume_while(|b| b.is_ascii_digit());
                    if bytes.get(self.offset) == Some(&b'.')
                        && bytes.get(self.offset + 1).is_some_and(u8::is_ascii_digit)
                    {
                        self.offset += 1;
                        self.consume_while(|b| b.is_ascii_digit());
                    }
                    Token::Number(self.input[start..self.offset].to_string())
                }
                (b'a'..=b'z' | b'A'..=b'Z' | b'_', _) => {
                    self.consume_while(|b| b.is_ascii_alphanumeric() || b == b'_');
                    Token::Ident(self.input[start..self.offset].to_string())
                }
                _ => {
                    return Err(PredicateError::UnexpectedToken {
                        expected: "literal, identifier or operator",
                        found: self.input[start..].chars().next().unwrap_or('?').to_string(),
                        position: start,
                    });
                }
            };
            tokens.push(Spanned {
                token,
                position: start,
            });
        }

        if tokens.is_empty() {
            return Err(PredicateError::EmptyInput);
        }
        tokens.push(Spanned {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    fn single(&mut self, token: Token) -> Token {
        self.offset += 1;
        token
    }

    fn double(&mut self, op: &'static str) -> Token {
        self.offset += 2;
        Token::Op(op)
    }

    fn consume_while(&mut self, keep: impl Fn(u8) -> bool) {
        let bytes = self.input.as_bytes();
        while self.offset < bytes.len() && keep(bytes[self.offset]) {
            self.offset += 1;
        }
    }

    /// Quoted string; `\` escapes the next character.
    fn string(&mut self, quote: u8) -> Result<Token, PredicateError> {
        let start = self.offset;
        self.offset += 1;
        let mut out = String::new();
        let mut chars = self.input[self.offset..].char_indices();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c as u32 == quote as u32 => {
                    self.offset += i + 1;
                    return Ok(Token::Str(out));
                }
                c => out.push(c),
            }
        }
        Err(PredicateError::UnterminatedString { position: start })
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

struct Parser {
    tokens: Vec<Spanned>,
    index: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens
            .get(self.index)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.index).map(|t| t.position).unwrap_or(0)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() {
            self.index += 1;
        }
        token
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Token::Op(o) if *o == op) {
            self.index += 1;
            return true;
        }
        false
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Token::Ident(s) if s == keyword) {
            self.index += 1;
            return true;
        }
        false
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), PredicateError> {
        if *self.peek() == token {
            self.index += 1;
            return Ok(());
        }
        Err(self.unexpected(expected))
    }

    fn expect_eof(&self) -> Result<(), PredicateError> {
        match self.peek() {
            Token::Eof => Ok(()),
            _ => Err(PredicateError::TrailingInput {
                position: self.position(),
            }),
        }
    }

    fn unexpected(&self, expected: &'static str) -> PredicateError {
        PredicateError::UnexpectedToken {
            expected,
            found: self.peek().describe(),
            position: self.position(),
        }
    }

    fn enter(&mut self) -> Result<(), PredicateError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(PredicateError::NestingTooDeep {
                max_depth: MAX_NESTING,
                position: self.position(),
            });
        }
        Ok(())
    }

    fn parse_expr(&mut self) -> Result<Expr, PredicateError> {
        self.enter()?;
        let expr = self.parse_or();
        self.depth -= 1;
        expr
    }

    fn parse_or(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.parse_and()?;
        while self.eat_op("||") {
            let right = self.parse_and()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.parse_not()?;
        while self.eat_op("&&") {
            let right = self.parse_not()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, PredicateError> {
        if self.eat_op("!") {
            self.enter()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, PredicateError> {
        let left = self.parse_sum()?;
        let op = match self.peek() {
            Token::Op("==") => BinaryOp::Eq,
            Token::Op("!=") => BinaryOp::Ne,
            Token::Op("<") => BinaryOp::Lt,
            Token::Op("<=") => BinaryOp::Le,
            Token::Op(">") => BinaryOp::Gt,
            Token::Op(">=") => BinaryOp::Ge,
            Token::Ident(k) if k == "in" => BinaryOp::In,
            Token::Ident(k) if k == "contains" => BinaryOp::Contains,
            _ => return Ok(left),
        };
        self.index += 1;
        let right = self.parse_sum()?;
        Ok(binary(op, left, right))
    }

    fn parse_sum(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.parse_product()?;
        loop {
            let op = if self.eat_op("+") {
                BinaryOp::Add
            } else if self.eat_op("-") {
                BinaryOp::Sub
            } else {
                return Ok(left);
            };
            let right = self.parse_product()?;
            left = binary(op, left, right);
        }
    }

    fn parse_product(&mut self) -> Result<Expr, PredicateError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = if self.eat_op("*") {
                BinaryOp::Mul
            } else if self.eat_op("/") {
                BinaryOp::Div
            } else if self.eat_op("%") {
                BinaryOp::Rem
            } else {
                return Ok(left);
            };
            let right = self.parse_unary()?;
            left = binary(op, left, right);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, PredicateError> {
        if self.eat_op("-") {
            self.enter()?;
            let inner = self.parse_unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, PredicateError> {
        let position = self.position();
        match self.advance() {
            Token::Number(raw) => parse_number(&raw, position).map(Expr::Literal),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, ")")?;
                Ok(inner)
            }
            Token::LBracket => {
                let items = self.parse_list(Token::RBracket, "]")?;
                Ok(Expr::List(items))
            }
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" => Ok(Expr::Literal(Value::Null)),
                "actual" => self.parse_path(Root::Actual),
                "expected" => self.parse_path(Root::Expected),
                _ if *self.peek() == Token::LParen => {
                    self.index += 1;
                    let args = self.parse_list(Token::RParen, ")")?;
                    call(&name, args, position)
                }
                _ => Err(PredicateError::UnknownIdentifier { name, position }),
            },
            _ => {
                self.index -= 1;
                Err(self.unexpected("literal, path, call or '('"))
            }
        }
    }

    fn parse_path(&mut self, root: Root) -> Result<Expr, PredicateError> {
        let mut segments = Vec::new();
        while *self.peek() == Token::Dot {
            self.index += 1;
            match self.advance() {
                Token::Ident(s) | Token::Number(s) => segments.push(s),
                _ => {
                    self.index -= 1;
                    return Err(self.unexpected("field name after '.'"));
                }
            }
        }
        Ok(Expr::Path { root, segments })
    }

    fn parse_list(
        &mut self,
        close: Token,
        expected: &'static str,
    ) -> Result<Vec<Expr>, PredicateError> {
        let mut items = Vec::new();
        if *self.peek() == close {
            self.index += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr()?);
            if *self.peek() == Token::Comma {
                self.index += 1;
                continue;
            }
            self.expect(close, expected)?;
            return Ok(items);
        }
    }
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn parse_number(raw: &str, position: usize) -> Result<Value, PredicateError> {
    let invalid = || PredicateError::InvalidNumber {
        raw: raw.to_string(),
        position,
    };
    if raw.contains('.') {
        let f: f64 = raw.parse().map_err(|_| invalid())?;
        Number::from_f64(f).map(Value::Number).ok_or_else(invalid)
    } else {
        raw.parse::<i64>().map(Value::from).map_err(|_| invalid())
    }
}

fn call(name: &str, args: Vec<Expr>, position: usize) -> Result<Expr, PredicateError> {
    let (function, arity): (Function, usize) = match name {
        "len" => (Function::Len, 1),
        "lower" => (Function::Lower, 1),
        "upper" => (Function::Upper, 1),
        "starts_with" => (Function::StartsWith, 2),
        "ends_with" => (Function::EndsWith, 2),
        "exists" => (Function::Exists, 1),
        "matches" => {
            let pattern = match args.get(1) {
                Some(Expr::Literal(Value::String(p))) => p.clone(),
                _ => {
                    return Err(PredicateError::UnexpectedToken {
                        expected: "string literal pattern as second argument of matches",
                        found: "expression".to_string(),
                        position,
                    });
                }
            };
            let regex = Regex::new(&pattern).map_err(|e| PredicateError::InvalidRegex {
                pattern,
                reason: e.to_string(),
            })?;
            (Function::Matches(regex), 2)
        }
        _ => {
            return Err(PredicateError::UnknownFunction {
                name: name.to_string(),
                position,
            });
        }
    };
    if args.len() != arity {
        return Err(PredicateError::Arity {
            function: function.name(),
            expected: arity,
            found: args.len(),
        });
    }
    if matches!(function, Function::Exists) && !matches!(args[0], Expr::Path { .. }) {
        return Err(PredicateError::UnexpectedToken {
            expected: "a path argument for exists",
            found: "expression".to_string(),
            position,
        });
    }
    Ok(Expr::Call { function, args })
}

impl Function {
    fn name(&self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::StartsWith => "starts_with",
            Self::EndsWith => "ends_with",
            Self::Matches(_) => "matches",
            Self::Exists => "exists",
        }
    }
}

// ============================================================================
// SECTION: Interpreter
// ============================================================================

struct Env<'a> {
    actual: &'a Value,
    expected: &'a Value,
}

impl Env<'_> {
    fn eval(&self, expr: &Expr) -> Result<Value, PredicateError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::List(items) => items
                .iter()
                .map(|e| self.eval(e))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Expr::Path { root, segments } => self
                .resolve(*root, segments)
                .ok_or_else(|| PredicateError::MissingField(render_path(*root, segments))),
            Expr::Not(inner) => Ok(Value::Bool(!self.truth("!", inner)?)),
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Number(n) => negate(&n),
                other => Err(type_error("-", &other)),
            },
            Expr::Binary { op, left, right } => self.binary(*op, left, right),
            Expr::Call { function, args } => self.call(function, args),
        }
    }

    fn resolve(&self, root: Root, segments: &[String]) -> Option<Value> {
        let mut current = match root {
            Root::Actual => self.actual.clone(),
            Root::Expected => self.expected.clone(),
        };
        for segment in segments {
            current = step(&current, segment)?;
        }
        Some(current)
    }

    fn truth(&self, operation: &'static str, expr: &Expr) -> Result<bool, PredicateError> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(type_error(operation, &other)),
        }
    }

    fn binary(&self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<Value, PredicateError> {
        // Short-circuit first
        match op {
            BinaryOp::And => {
                return Ok(Value::Bool(
                    self.truth("&&", left)? && self.truth("&&", right)?,
                ));
            }
            BinaryOp::Or => {
                return Ok(Value::Bool(
                    self.truth("||", left)? || self.truth("||", right)?,
                ));
            }
            _ => {}
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        let symbol = op.symbol();
        let result = match op {
            BinaryOp::Eq => Value::Bool(values_equal(&l, &r)),
            BinaryOp::Ne => Value::Bool(!values_equal(&l, &r)),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let ord = ordering(&l, &r).ok_or_else(|| PredicateError::TypeError {
                    operation: symbol,
                    found: format!("{} and {}", type_name(&l), type_name(&r)),
                })?;
                Value::Bool(match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                })
            }
            BinaryOp::In => Value::Bool(contains(&r, &l).ok_or_else(|| type_error(symbol, &r))?),
            BinaryOp::Contains => {
                Value::Bool(contains(&l, &r).ok_or_else(|| type_error(symbol, &l))?)
            }
            BinaryOp::Add => match (&l, &r) {
                (Value::String(a), Value::String(b)) => Value::String(format!("{}{}", a, b)),
                _ => arithmetic(op, &l, &r)?,
            },
            BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                arithmetic(op, &l, &r)?
            }
            BinaryOp::And | BinaryOp::Or => Value::Null,
        };
        Ok(result)
    }

    fn call(&self, function: &Function, args: &[Expr]) -> Result<Value, PredicateError> {
        if let Function::Exists = function {
            return Ok(Value::Bool(match &args[0] {
                Expr::Path { root, segments } => self.resolve(*root, segments).is_some(),
                _ => false,
            }));
        }

        let values = args
            .iter()
            .map(|a| self.eval(a))
            .collect::<Result<Vec<_>, _>>()?;
        let name = function.name();
        let text = |i: usize| -> Result<&str, PredicateError> {
            values[i].as_str().ok_or_else(|| type_error(name, &values[i]))
        };

        Ok(match function {
            Function::Len => Value::from(length_of(&values[0])),
            Function::Lower => Value::String(text(0)?.to_lowercase()),
            Function::Upper => Value::String(text(0)?.to_uppercase()),
            Function::StartsWith => Value::Bool(text(0)?.starts_with(text(1)?)),
            Function::EndsWith => Value::Bool(text(0)?.ends_with(text(1)?)),
            Function::Matches(regex) => Value::Bool(regex.is_match(text(0)?)),
            Function::Exists => Value::Bool(true),
        })
    }
}

fn type_error(operation: &'static str, value: &Value) -> PredicateError {
    PredicateError::TypeError {
        operation,
        found: type_name(value).to_string(),
    }
}

fn render_path(root: Root, segments: &[String]) -> String {
    let mut out = match root {
        Root::Actual => "actual".to_string(),
        Root::Expected => "expected".to_string(),
    };
    for s in segments {
        out.push('.');
        out.push_str(s);
    }
    out
}

fn negate(n: &Number) -> Result<Value, PredicateError> {
    if let Some(i) = n.as_i64() {
        return match i.checked_neg() {
            Some(v) => Ok(Value::from(v)),
            None => float(-(i as f64)),
        };
    }
    float(-n.as_f64().unwrap_or_default())
}

fn float(f: f64) -> Result<Value, PredicateError> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or(PredicateError::DivisionByZero)
}

fn arithmetic(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, PredicateError> {
    let (Value::Number(a), Value::Number(b)) = (l, r) else {
        return Err(PredicateError::TypeError {
            operation: op.symbol(),
            found: format!("{} and {}", type_name(l), type_name(r)),
        });
    };

    if let (Some(x), Some(y), false) = (a.as_i64(), b.as_i64(), op == BinaryOp::Div) {
        let checked = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            _ if y == 0 => return Err(PredicateError::DivisionByZero),
            _ => x.checked_rem(y),
        };
        if let Some(v) = checked {
            return Ok(Value::from(v));
        }
    }

    let x = a.as_f64().unwrap_or_default();
    let y = b.as_f64().unwrap_or_default();
    match op {
        BinaryOp::Add => float(x + y),
        BinaryOp::Sub => float(x - y),
        BinaryOp::Mul => float(x * y),
        _ if y == 0.0 => Err(PredicateError::DivisionByZero),
        BinaryOp::Div => float(x / y),
        _ => float(x % y),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(src: &str, actual: Value, expected: Value) -> Result<bool, PredicateError> {
        Predicate::compile(src).unwrap().evaluate(&actual, &expected)
    }

    #[test]
    fn test_boolean_composition_and_precedence() {
        assert!(eval("actual > 1 && actual < 10 || false", json!(5), json!(null)).unwrap());
        assert!(!eval("!(actual == expected)", json!(3), json!(3.0)).unwrap());
        assert!(eval("actual + 2 * 3 == 10", json!(4), json!(null)).unwrap());
        assert!(eval("-actual == expected", json!(4), json!(-4)).unwrap());
    }

    #[test]
    fn test_paths_and_membership() {
        let actual = json!({"policy": {"statements": [{"effect": "Deny"}]}, "tags": ["pci"]});
        assert!(eval("actual.policy.statements.0.effect == 'Deny'", actual.clone(), json!(null)).unwrap());
        assert!(eval("'pci' in actual.tags", actual.clone(), json!(null)).unwrap());
        assert!(eval("actual.tags contains expected", actual.clone(), json!("pci")).unwrap());
        assert!(eval("actual.policy.statements.0.effect in ['Deny', 'Audit']", actual, json!(null)).unwrap());
    }

    #[test]
    fn test_functions() {
        let actual = json!({"arn": "arn:aws:kms:eu-west-1:1:key/abc", "name": "Prod-DB"});
        assert!(eval("starts_with(actual.arn, 'arn:aws:kms')", actual.clone(), json!(null)).unwrap());
        assert!(eval("lower(actual.name) == 'prod-db'", actual.clone(), json!(null)).unwrap());
        assert!(eval("matches(actual.arn, '^arn:aws:kms:[a-z0-9-]+:')", actual.clone(), json!(null)).unwrap());
        assert!(eval("len(actual.name) == 7", actual.clone(), json!(null)).unwrap());
        assert!(eval("!exists(actual.kms_key) && exists(actual.arn)", actual, json!(null)).unwrap());
    }

    #[test]
    fn test_missing_path_is_runtime_error() {
        let err = eval("actual.missing == 1", json!({}), json!(null)).unwrap_err();
        assert_eq!(err, PredicateError::MissingField("actual.missing".into()));
    }

    #[test]
    fn test_runtime_type_errors() {
        assert!(matches!(
            eval("actual && true", json!(1), json!(null)),
            Err(PredicateError::TypeError { operation: "&&", .. })
        ));
        assert!(matches!(
            eval("actual < 'x'", json!(1), json!(null)),
            Err(PredicateError::TypeError { operation: "<", .. })
        ));
        assert_eq!(
            eval("actual / 0 == 1", json!(1), json!(null)),
            Err(PredicateError::DivisionByZero)
        );
        assert_eq!(
            eval("actual + 1", json!(1), json!(null)),
            Err(PredicateError::NotBoolean("number"))
        );
    }

    #[test]
    fn test_compile_errors() {
        assert_eq!(Predicate::compile("   ").unwrap_err(), PredicateError::EmptyInput);
        assert!(matches!(
            Predicate::compile("os.system('rm')"),
            Err(PredicateError::UnknownIdentifier { .. })
        ));
        assert!(matches!(
            Predicate::compile("eval(actual)"),
            Err(PredicateError::UnknownFunction { .. })
        ));
        assert!(matches!(
            Predicate::compile("actual == 1 1"),
            Err(PredicateError::TrailingInput { .. })
        ));
        assert!(matches!(
            Predicate::compile("'open"),
            Err(PredicateError::UnterminatedString { position: 0 })
        ));
        assert!(matches!(
            Predicate::compile("len(actual, expected)"),
            Err(PredicateError::Arity { function: "len", .. })
        ));
        assert!(matches!(
            Predicate::compile("matches(actual, '(')"),
            Err(PredicateError::InvalidRegex { .. })
        ));
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}actual{}", "(".repeat(40), ")".repeat(40));
        assert!(matches!(
            Predicate::compile(&deep),
            Err(PredicateError::NestingTooDeep { .. })
        ));
    }

    #[test]
    fn test_negating_i64_min_widens_to_float() {
        assert!(eval("-actual > 0", json!(i64::MIN), json!(null)).unwrap());
        assert!(eval("-actual == expected", json!(i64::MIN), json!(9.223372036854775808e18)).unwrap());
    }

    #[test]
    fn test_source_is_kept() {
        let p = Predicate::compile("  actual == expected ").unwrap();
        assert_eq!(p.source(), "actual == expected");
    }
}
