//! The incremental reader: text in, typed expression trees out.
//!
//! [`Reader`] couples the character tokenizer with the SSM-stack parser.
//! Input arrives in whatever chunks the host has; each call to
//! [`Reader::read_expr`] consumes buffered tokens until a top-level
//! expression completes, an error is recorded, or input runs dry.

pub(crate) mod parser;
pub(crate) mod ssm;

use std::rc::Rc;

use crate::{
    error::ParseError,
    expr::Expr,
    session::LangState,
    token::{Token, TokenKind},
    tokenizer::Tokenizer,
};

use parser::{Parser, ParserResult};
pub use parser::SessionMode;

/// Outcome of one [`Reader::read_expr`] call.
#[derive(Debug)]
pub enum ReaderResult {
    /// A top-level expression completed.
    Expression(Rc<Expr>),
    /// No complete expression yet; more input is needed (or, at eof,
    /// there was nothing left to read).
    None,
    /// The parser recorded an error. Recover with
    /// [`Reader::reset_to_idle_toplevel`].
    Error(ParseError),
}

/// Incremental reader over a persistent parser.
pub struct Reader {
    tokenizer: Tokenizer,
    parser: Parser,
}

impl Reader {
    /// A reader with no session established yet. Call one of the
    /// `begin_*_session` methods before feeding input.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            parser: Parser::new(),
        }
    }

    /// Installs the interactive top-level machine: any expression allowed.
    pub fn begin_interactive_session(&mut self) {
        self.parser.begin_session(SessionMode::Interactive);
    }

    /// Installs the batch top-level machine: only definitions allowed.
    pub fn begin_batch_session(&mut self) {
        self.parser.begin_session(SessionMode::Batch);
    }

    /// Feeds `input` (possibly empty, to continue draining earlier input)
    /// and scans forward. With `eof` set, a trailing expression missing
    /// its `;` is finalized by a synthesized one.
    pub fn read_expr(&mut self, input: &str, eof: bool, st: &mut LangState) -> ReaderResult {
        self.tokenizer.push(input);
        loop {
            match self.tokenizer.next(eof) {
                Err(e) => {
                    self.parser.capture_error(ParseError::Lex(e.clone()));
                    return ReaderResult::Error(ParseError::Lex(e));
                }
                Ok(None) => break,
                Ok(Some(tk)) => {
                    self.parser.on_token(&tk, st);
                    match self.parser.take_ready() {
                        ParserResult::Expression(expr) => return ReaderResult::Expression(expr),
                        ParserResult::Error(e) => return ReaderResult::Error(e),
                        ParserResult::None => {}
                    }
                }
            }
        }
        if eof && self.parser.has_incomplete_expr() {
            self.parser
                .on_token(&Token::bare(TokenKind::Semicolon), st);
            match self.parser.take_ready() {
                ParserResult::Expression(expr) => return ReaderResult::Expression(expr),
                ParserResult::Error(e) => return ReaderResult::Error(e),
                ParserResult::None => {}
            }
        }
        ReaderResult::None
    }

    /// True when a construct is part way through parsing (a multi-line
    /// expression, for instance).
    #[must_use]
    pub fn has_incomplete_expr(&self) -> bool {
        self.parser.has_incomplete_expr() || self.tokenizer.has_pending_input()
    }

    /// True when only the top-level machine is on the stack.
    #[must_use]
    pub fn is_at_toplevel(&self) -> bool {
        self.parser.is_at_toplevel()
    }

    /// Discards partial state after an error: pops every nested machine,
    /// restores the parser arena to its idle checkpoint, and drops
    /// unconsumed input. Idempotent.
    pub fn reset_to_idle_toplevel(&mut self) {
        self.parser.reset_to_idle_toplevel();
        self.tokenizer.clear();
    }

    /// Parser stack depth, for stack-soundness assertions in tests.
    #[must_use]
    pub fn parser_depth(&self) -> usize {
        self.parser.depth()
    }

    /// Parser arena bytes in use, for stack-soundness assertions.
    #[must_use]
    pub fn parser_arena_used(&self) -> usize {
        self.parser.arena_used()
    }
}

impl Default for Reader {
    fn default() -> Self {
        Self::new()
    }
}
