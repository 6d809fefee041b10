use std::collections::HashMap;

use thiserror::Error;

// Tree depth never exceeds the token count, so this bounds evaluation and drop as well as parsing.
const MAX_TOKENS: usize = 1024;
const MAX_NESTING: usize = 64;

/// Failure modes of formula parsing and evaluation. Every variant carries the byte offset of
/// the token that triggered it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { pos: usize, ch: char },
    #[error("invalid number '{text}' at position {pos}")]
    InvalidNumber { pos: usize, text: String },
    #[error("expected number at position {pos}")]
    ExpectedOperand { pos: usize },
    #[error("missing closing parenthesis at position {pos}")]
    MissingCloseParen { pos: usize },
    #[error("unexpected input at position {pos}")]
    TrailingInput { pos: usize },
    #[error("division by zero at position {pos}")]
    DivisionByZero { pos: usize },
    #[error("unknown variable '#{name}' at position {pos}")]
    UnknownVariable { pos: usize, name: String },
    #[error("formula too long or too deeply nested at position {pos}")]
    TooDeep { pos: usize },
}

impl FormulaError {
    pub fn position(&self) -> usize {
        match self {
            FormulaError::UnexpectedChar { pos, .. }
            | FormulaError::InvalidNumber { pos, .. }
            | FormulaError::ExpectedOperand { pos }
            | FormulaError::MissingCloseParen { pos }
            | FormulaError::TrailingInput { pos }
            | FormulaError::DivisionByZero { pos }
            | FormulaError::UnknownVariable { pos, .. }
            | FormulaError::TooDeep { pos } => *pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(f64),
    Var(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(f64),
    Var { name: String, pos: usize },
    Neg(Box<Expr>),
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: usize,
    },
}

/// A parsed formula. Variables stay symbolic in the tree and are resolved on every evaluation,
/// so one parse serves every team of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    root: Expr,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens,
            idx: 0,
            end: source.len(),
            depth: 0,
        };
        let root = parser.parse_add_sub()?;
        if let Some(tok) = parser.peek() {
            return Err(FormulaError::TrailingInput { pos: tok.pos });
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Variable names referenced by the formula, first-seen order, without duplicates.
    pub fn variables(&self) -> Vec<&str> {
        let mut out = Vec::new();
        collect_vars(&self.root, &mut out);
        out
    }

    /// Reject the formula up front if it names a variable `known` does not accept.
    pub fn check_vars<F>(&self, known: F) -> Result<(), FormulaError>
    where
        F: Fn(&str) -> bool,
    {
        match first_unknown_var(&self.root, &known) {
            Some((name, pos)) => Err(FormulaError::UnknownVariable {
                pos,
                name: name.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn eval_with<F>(&self, lookup: F) -> Result<f64, FormulaError>
    where
        F: Fn(&str) -> Option<f64>,
    {
        eval_expr(&self.root, &lookup)
    }

    pub fn eval(&self, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
        self.eval_with(|name| vars.get(name).copied())
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(source: &str, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
    Formula::parse(source)?.eval(vars)
}

/// Scan a raw formula for `#name` placeholders without parsing it.
pub fn find_vars(source: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut current: Option<String> = None;

    for c in source.chars() {
        if c == '#' {
            flush(&mut current, &mut out);
            current = Some(String::new());
        } else if let Some(name) = current.as_mut() {
            if is_var_char(c) {
                name.push(c);
            } else {
                flush(&mut current, &mut out);
            }
        }
    }
    flush(&mut current, &mut out);
    out
}

fn flush(current: &mut Option<String>, out: &mut Vec<String>) {
    if let Some(name) = current.take() {
        if !name.is_empty() && !out.contains(&name) {
            out.push(name);
        }
    }
}

fn is_var_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if tokens.len() == MAX_TOKENS {
            return Err(FormulaError::TooDeep { pos });
        }
        let single = match c {
            '+' => Some(TokenKind::Plus),
            '-' => Some(TokenKind::Minus),
            '*' => Some(TokenKind::Star),
            '/' => Some(TokenKind::Slash),
            '^' => Some(TokenKind::Caret),
            '(' => Some(TokenKind::LParen),
            ')' => Some(TokenKind::RParen),
            _ => None,
        };
        if let Some(kind) = single {
            chars.next();
            tokens.push(Token { kind, pos });
            continue;
        }

        if c == '#' {
            chars.next();
            let mut name = String::new();
            while let Some(&(_, n)) = chars.peek() {
                if !is_var_char(n) {
                    break;
                }
                name.push(n);
                chars.next();
            }
            if name.is_empty() {
                return Err(FormulaError::UnexpectedChar { pos, ch: '#' });
            }
            tokens.push(Token {
                kind: TokenKind::Var(name),
                pos,
            });
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let mut text = String::new();
            while let Some(&(_, n)) = chars.peek() {
                if !(n.is_ascii_digit() || n == '.') {
                    break;
                }
                text.push(n);
                chars.next();
            }
            let value = text
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber { pos, text })?;
            tokens.push(Token {
                kind: TokenKind::Number(value),
                pos,
            });
            continue;
        }

        return Err(FormulaError::UnexpectedChar { pos, ch: c });
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx)
    }

    fn pos(&self) -> usize {
        self.peek().map(|t| t.pos).unwrap_or(self.end)
    }

    fn enter(&mut self, pos: usize) -> Result<(), FormulaError> {
        if self.depth == MAX_NESTING {
            return Err(FormulaError::TooDeep { pos });
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn next_if(&mut self, kinds: &[TokenKind]) -> Option<Token> {
        let tok = self.peek()?;
        if kinds.contains(&tok.kind) {
            let tok = tok.clone();
            self.idx += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn parse_add_sub(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_mul_div()?;
        while let Some(tok) = self.next_if(&[TokenKind::Plus, TokenKind::Minus]) {
            let rhs = self.parse_mul_div()?;
            let op = if tok.kind == TokenKind::Plus {
                BinOp::Add
            } else {
                BinOp::Sub
            };
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos: tok.pos,
            };
        }
        Ok(lhs)
    }

    fn parse_mul_div(&mut self) -> Result<Expr, FormulaError> {
        let mut lhs = self.parse_power()?;
        while let Some(tok) = self.next_if(&[TokenKind::Star, TokenKind::Slash]) {
            let rhs = self.parse_power()?;
            let op = if tok.kind == TokenKind::Star {
                BinOp::Mul
            } else {
                BinOp::Div
            };
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                pos: tok.pos,
            };
        }
        Ok(lhs)
    }

    // Right-associative: 2^3^2 == 2^(3^2).
    fn parse_power(&mut self) -> Result<Expr, FormulaError> {
        let base = self.parse_unary()?;
        if let Some(tok) = self.next_if(&[TokenKind::Caret]) {
            self.enter(tok.pos)?;
            let exponent = self.parse_power()?;
            self.leave();
            return Ok(Expr::Binary {
                op: BinOp::Pow,
                lhs: Box::new(base),
                rhs: Box::new(exponent),
                pos: tok.pos,
            });
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Expr, FormulaError> {
        if let Some(tok) = self.next_if(&[TokenKind::Minus]) {
            self.enter(tok.pos)?;
            let inner = self.parse_primary()?;
            self.leave();
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, FormulaError> {
        let pos = self.pos();
        let Some(tok) = self.peek().cloned() else {
            return Err(FormulaError::ExpectedOperand { pos });
        };
        match tok.kind {
            TokenKind::Number(v) => {
                self.idx += 1;
                Ok(Expr::Num(v))
            }
            TokenKind::Var(name) => {
                self.idx += 1;
                Ok(Expr::Var { name, pos })
            }
            TokenKind::LParen => {
                self.idx += 1;
                self.enter(pos)?;
                let inner = self.parse_add_sub()?;
                if self.next_if(&[TokenKind::RParen]).is_none() {
                    return Err(FormulaError::MissingCloseParen { pos: self.pos() });
                }
                self.leave();
                Ok(inner)
            }
            _ => Err(FormulaError::ExpectedOperand { pos }),
        }
    }
}

fn eval_expr<F>(expr: &Expr, lookup: &F) -> Result<f64, FormulaError>
where
    F: Fn(&str) -> Option<f64>,
{
    match expr {
        Expr::Num(v) => Ok(*v),
        Expr::Var { name, pos } => lookup(name).ok_or_else(|| FormulaError::UnknownVariable {
            pos: *pos,
            name: name.clone(),
        }),
        Expr::Neg(inner) => Ok(-eval_expr(inner, lookup)?),
        Expr::Binary { op, lhs, rhs, pos } => {
            let l = eval_expr(lhs, lookup)?;
            let r = eval_expr(rhs, lookup)?;
            match op {
                BinOp::Add => Ok(l + r),
                BinOp::Sub => Ok(l - r),
                BinOp::Mul => Ok(l * r),
                BinOp::Div => {
                    if r == 0.0 {
                        return Err(FormulaError::DivisionByZero { pos: *pos });
                    }
                    Ok(l / r)
                }
                BinOp::Pow => Ok(l.powf(r)),
            }
        }
    }
}

fn first_unknown_var<'a, F>(expr: &'a Expr, known: &F) -> Option<(&'a str, usize)>
where
    F: Fn(&str) -> bool,
{
    match expr {
        Expr::Num(_) => None,
        Expr::Var { name, pos } => (!known(name)).then_some((name.as_str(), *pos)),
        Expr::Neg(inner) => first_unknown_var(inner, known),
        Expr::Binary { lhs, rhs, .. } => {
            first_unknown_var(lhs, known).or_else(|| first_unknown_var(rhs, known))
        }
    }
}

fn collect_vars<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Num(_) => {}
        Expr::Var { name, .. } => {
            if !out.contains(&name.as_str()) {
                out.push(name.as_str());
            }
        }
        Expr::Neg(inner) => collect_vars(inner, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_vars(lhs, out);
            collect_vars(rhs, out);
        }
    }
}
