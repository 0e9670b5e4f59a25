//! Error types for the reader, the VM, and the session layer.
//!
//! Each family is a plain enum with a `Display` impl; there is no
//! panic-based control flow outside internal invariant violations.

use std::fmt;

/// Error from the character tokenizer. Carries the byte position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub kind: LexErrorKind,
    pub pos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    UnexpectedChar(char),
    MalformedNumber,
    UnterminatedString,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            LexErrorKind::UnexpectedChar(ch) => {
                write!(f, "unexpected character {ch:?} at byte {}", self.pos)
            }
            LexErrorKind::MalformedNumber => {
                write!(f, "malformed numeric literal at byte {}", self.pos)
            }
            LexErrorKind::UnterminatedString => {
                write!(f, "unterminated string literal starting at byte {}", self.pos)
            }
        }
    }
}

/// Error raised while parsing. The parser records at most one of these per
/// input batch; recovery is by `reset_to_idle_toplevel`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    Lex(LexError),
    /// A token arrived that is illegal in the receiving state machine's
    /// current state.
    Syntax {
        /// Name of the syntax state machine that rejected the input.
        ssm: &'static str,
        /// What the state machine was prepared to accept.
        expected: &'static str,
        /// Rendering of the offending input.
        found: String,
    },
    UnboundVariable {
        name: String,
    },
    Type {
        message: String,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(e) => write!(f, "lex error: {e}"),
            Self::Syntax { ssm, expected, found } => {
                write!(f, "syntax error: unexpected {found} (expecting {expected}) in {ssm}")
            }
            Self::UnboundVariable { name } => write!(f, "unbound variable: {name}"),
            Self::Type { message } => write!(f, "type error: {message}"),
        }
    }
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        Self::Lex(e)
    }
}

/// Runtime error. The VM halts with the error as its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    DivisionByZero,
    IntegerOverflow,
    /// An operand or test value had the wrong runtime type.
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    /// Applied something that is neither a closure nor a primitive.
    NotCallable {
        found: String,
    },
    ArityMismatch {
        expected: usize,
        found: usize,
    },
    /// A variable slot outside the environment chain was addressed.
    UnboundSlot {
        link: u32,
        slot: u16,
    },
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DivisionByZero => write!(f, "division by zero"),
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Self::NotCallable { found } => write!(f, "cannot apply non-function value {found}"),
            Self::ArityMismatch { expected, found } => {
                write!(f, "function expects {expected} argument(s), got {found}")
            }
            Self::UnboundSlot { link, slot } => {
                write!(f, "no binding at link {link}, slot {slot}")
            }
        }
    }
}

/// Error surfaced by [`Session`](crate::Session) execution.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Parse(ParseError),
    Vm(VmError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "{e}"),
            Self::Vm(e) => write!(f, "runtime error: {e}"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<ParseError> for SessionError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<VmError> for SessionError {
    fn from(e: VmError) -> Self {
        Self::Vm(e)
    }
}
