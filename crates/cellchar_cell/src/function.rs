//! Boolean logic functions over cell ports.
//!
//! Functions are written with the usual operators, loosest binding first:
//! `|` or `+` (or), `^` (xor), `&` or `*` (and), and prefix `!` or `~` (not).
//! Parentheses group, `0` and `1` are constants, and any other identifier
//! names a port. `(A & B) | !C` is a valid function.

use crate::ids::PortId;
use cellchar_common::Logic;

/// A parsed logic function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A constant level.
    Const(bool),
    /// The value of a port.
    Port(PortId),
    /// Logical negation.
    Not(Box<Expr>),
    /// Logical conjunction.
    And(Box<Expr>, Box<Expr>),
    /// Logical disjunction.
    Or(Box<Expr>, Box<Expr>),
    /// Exclusive or.
    Xor(Box<Expr>, Box<Expr>),
}

/// Failure to parse a function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The text is not a well-formed expression.
    #[error("column {column}: {message}")]
    Syntax {
        /// 1-based column of the offending character.
        column: usize,
        /// What was expected.
        message: String,
    },
    /// An identifier did not resolve to a port.
    #[error("unknown name `{0}`")]
    UnknownName(String),
}

impl Expr {
    /// Parses `text`, resolving identifiers to ports with `resolve`.
    pub fn parse(
        text: &str,
        resolve: impl Fn(&str) -> Option<PortId>,
    ) -> Result<Expr, ParseError> {
        let tokens = tokenize(text)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: text.len(),
            resolve: &resolve,
        };
        let expr = parser.or()?;
        match parser.peek() {
            None => Ok(expr),
            Some((tok, at)) => Err(syntax(at, format!("unexpected `{tok}`"))),
        }
    }

    /// Evaluates the function with port values supplied by `value`.
    pub fn eval(&self, value: &impl Fn(PortId) -> Logic) -> Logic {
        match self {
            Expr::Const(b) => Logic::from(*b),
            Expr::Port(id) => value(*id),
            Expr::Not(e) => !e.eval(value),
            Expr::And(a, b) => a.eval(value) & b.eval(value),
            Expr::Or(a, b) => a.eval(value) | b.eval(value),
            Expr::Xor(a, b) => a.eval(value) ^ b.eval(value),
        }
    }

    /// Returns every port the function reads, sorted by declaration order.
    pub fn support(&self) -> Vec<PortId> {
        let mut ports = Vec::new();
        self.collect(&mut ports);
        ports.sort();
        ports.dedup();
        ports
    }

    /// Returns `true` if the function reads `port`.
    pub fn references(&self, port: PortId) -> bool {
        match self {
            Expr::Const(_) => false,
            Expr::Port(id) => *id == port,
            Expr::Not(e) => e.references(port),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Xor(a, b) => {
                a.references(port) || b.references(port)
            }
        }
    }

    /// If the function is a bare port or its negation, returns the port and
    /// whether it is inverted.
    pub fn as_port(&self) -> Option<(PortId, bool)> {
        match self {
            Expr::Port(id) => Some((*id, false)),
            Expr::Not(inner) => inner.as_port().map(|(id, inv)| (id, !inv)),
            _ => None,
        }
    }

    fn collect(&self, out: &mut Vec<PortId>) {
        match self {
            Expr::Const(_) => {}
            Expr::Port(id) => out.push(*id),
            Expr::Not(e) => e.collect(out),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Xor(a, b) => {
                a.collect(out);
                b.collect(out);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Const(bool),
    Not,
    And,
    Or,
    Xor,
    LParen,
    RParen,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(name) => f.write_str(name),
            Token::Const(b) => write!(f, "{}", u8::from(*b)),
            Token::Not => f.write_str("!"),
            Token::And => f.write_str("&"),
            Token::Or => f.write_str("|"),
            Token::Xor => f.write_str("^"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

fn syntax(offset: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        column: offset + 1,
        message: message.into(),
    }
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();
    while let Some((at, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '!' | '~' => Token::Not,
            '&' | '*' => Token::And,
            '|' | '+' => Token::Or,
            '^' => Token::Xor,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '0' => Token::Const(false),
            '1' => Token::Const(true),
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = at + c.len_utf8();
                while let Some(&(next, n)) = chars.peek() {
                    if n.is_ascii_alphanumeric() || n == '_' || n == '[' || n == ']' {
                        end = next + n.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(text[at..end].to_string())
            }
            other => return Err(syntax(at, format!("unexpected character `{other}`"))),
        };
        tokens.push((token, at));
    }
    Ok(tokens)
}

struct Parser<'a, F> {
    tokens: &'a [(Token, usize)],
    pos: usize,
    end: usize,
    resolve: &'a F,
}

impl<F: Fn(&str) -> Option<PortId>> Parser<'_, F> {
    fn peek(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, at)| (t, *at))
    }

    fn eat(&mut self, want: &Token) -> bool {
        if self.peek().is_some_and(|(t, _)| t == want) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.xor()?;
        while self.eat(&Token::Or) {
            lhs = Expr::Or(Box::new(lhs), Box::new(self.xor()?));
        }
        Ok(lhs)
    }

    fn xor(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Xor) {
            lhs = Expr::Xor(Box::new(lhs), Box::new(self.and()?));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::And) {
            lhs = Expr::And(Box::new(lhs), Box::new(self.unary()?));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ParseError> {
        let Some((token, at)) = self.peek() else {
            return Err(syntax(self.end, "expected an operand"));
        };
        let token = token.clone();
        self.pos += 1;
        match token {
            Token::Const(b) => Ok(Expr::Const(b)),
            Token::Ident(name) => (self.resolve)(&name)
                .map(Expr::Port)
                .ok_or(ParseError::UnknownName(name)),
            Token::LParen => {
                let inner = self.or()?;
                if self.eat(&Token::RParen) {
                    Ok(inner)
                } else {
                    let at = self.peek().map_or(self.end, |(_, at)| at);
                    Err(syntax(at, "expected `)`"))
                }
            }
            other => Err(syntax(at, format!("expected an operand, found `{other}`"))),
        }
    }
}
