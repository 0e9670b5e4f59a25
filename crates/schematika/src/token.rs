//! Tokens consumed by the reader.
//!
//! Tokens arrive pre-classified: keywords, punctuation and operators are
//! distinct variants, literals carry their decoded value. Non-literal tokens
//! carry an optional source span for diagnostics.

use std::fmt;

use strum::IntoStaticStr;

/// Half-open byte range in the source stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// The classification (and literal payload) of one token.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TokenKind {
    Symbol(String),
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
    Def,
    If,
    Then,
    Else,
    Lambda,
    Let,
    In,
    End,
    Colon,
    DoubleColon,
    Semicolon,
    Comma,
    Dot,
    /// `=`
    SingleAssign,
    /// `:=`
    Assign,
    /// `->`
    Yields,
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    /// `<`
    LeftAngle,
    /// `>`
    RightAngle,
    /// `<=`
    LessEqual,
    /// `>=`
    GreatEqual,
    Plus,
    Minus,
    Star,
    Slash,
    /// `==`
    CmpEq,
    /// `!=`
    CmpNe,
}

/// One token, with its source span when known.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Option<Span>,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span: Some(span) }
    }

    /// A token with no span, e.g. one synthesized at end of input.
    #[must_use]
    pub fn bare(kind: TokenKind) -> Self {
        Self { kind, span: None }
    }

    /// Static name of the token kind, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        (&self.kind).into()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Symbol(s) => write!(f, "{s}"),
            TokenKind::Bool(b) => write!(f, "{b}"),
            TokenKind::I64(v) => write!(f, "{v}"),
            TokenKind::F64(v) => write!(f, "{}", ryu::Buffer::new().format(*v)),
            TokenKind::Str(s) => write!(f, "{s:?}"),
            TokenKind::Def => write!(f, "def"),
            TokenKind::If => write!(f, "if"),
            TokenKind::Then => write!(f, "then"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::Lambda => write!(f, "lambda"),
            TokenKind::Let => write!(f, "let"),
            TokenKind::In => write!(f, "in"),
            TokenKind::End => write!(f, "end"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::DoubleColon => write!(f, "::"),
            TokenKind::Semicolon => write!(f, ";"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::SingleAssign => write!(f, "="),
            TokenKind::Assign => write!(f, ":="),
            TokenKind::Yields => write!(f, "->"),
            TokenKind::LeftParen => write!(f, "("),
            TokenKind::RightParen => write!(f, ")"),
            TokenKind::LeftBrace => write!(f, "{{"),
            TokenKind::RightBrace => write!(f, "}}"),
            TokenKind::LeftBracket => write!(f, "["),
            TokenKind::RightBracket => write!(f, "]"),
            TokenKind::LeftAngle => write!(f, "<"),
            TokenKind::RightAngle => write!(f, ">"),
            TokenKind::LessEqual => write!(f, "<="),
            TokenKind::GreatEqual => write!(f, ">="),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::CmpEq => write!(f, "=="),
            TokenKind::CmpNe => write!(f, "!="),
        }
    }
}
