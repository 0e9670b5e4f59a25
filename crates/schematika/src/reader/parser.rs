//! The parser state machine: an explicit stack of syntax state machines.
//!
//! Tokens are dispatched to the topmost SSM. An SSM either updates its own
//! state, pushes nested SSMs for subordinate constructs, or pops itself and
//! hands its finished product to the SSM below through one of the
//! `on_parsed_*` callback channels. Channels an SSM does not accept in its
//! current state become syntax errors.
//!
//! Each stack node captures an arena checkpoint when it is pushed; popping
//! restores that checkpoint, so nested-parser scratch cannot outlive its
//! construct. The parser records at most one error per input batch; further
//! would-be errors are dropped until `reset_to_idle_toplevel` runs.

use std::rc::Rc;

use crate::{
    arena::{Arena, ArenaStr, Checkpoint},
    error::ParseError,
    expr::Expr,
    session::LangState,
    symtab::{Binding, LocalSymtab},
    token::{Token, TokenKind},
    types::TypeDescr,
};

use super::ssm::{Emission, Flow, Ssm, ToplevelSeqSsm};

/// Top-level mode: interactive sessions accept any expression, batch
/// sessions accept only definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Interactive,
    Batch,
}

/// What the parser has produced since the last query.
#[derive(Debug)]
pub(crate) enum ParserResult {
    None,
    Expression(Rc<Expr>),
    Error(ParseError),
}

struct StackNode {
    ssm: Ssm,
    ckp: Checkpoint,
}

pub(crate) struct Parser {
    stack: Vec<StackNode>,
    arena: Arena,
    base_ckp: Checkpoint,
    result: ParserResult,
    /// Innermost local scope while parsing binding forms; `None` at the
    /// top level.
    scope: Option<Rc<LocalSymtab>>,
}

impl Parser {
    pub(crate) fn new() -> Self {
        let arena = Arena::new();
        let base_ckp = arena.checkpoint();
        Self {
            stack: Vec::new(),
            arena,
            base_ckp,
            result: ParserResult::None,
            scope: None,
        }
    }

    /// Installs the top-level SSM, discarding any prior stack.
    pub(crate) fn begin_session(&mut self, mode: SessionMode) {
        self.stack.clear();
        self.arena.restore(self.base_ckp);
        self.scope = None;
        self.result = ParserResult::None;
        self.push_ssm(Ssm::ToplevelSeq(ToplevelSeqSsm::new(mode)));
        self.base_ckp = self.arena.checkpoint();
    }

    /// True when only the top-level SSM is on the stack.
    pub(crate) fn is_at_toplevel(&self) -> bool {
        self.stack.len() <= 1
    }

    /// True when a construct is part way through parsing.
    pub(crate) fn has_incomplete_expr(&self) -> bool {
        self.stack.len() > 1
    }

    /// Pops everything above the top-level SSM and reclaims its memory.
    /// Idempotent: calling it twice in a row is a no-op the second time.
    pub(crate) fn reset_to_idle_toplevel(&mut self) {
        self.stack.truncate(1);
        self.arena.restore(self.base_ckp);
        self.scope = None;
        self.result = ParserResult::None;
    }

    /// Takes the pending result, leaving `None` behind.
    pub(crate) fn take_ready(&mut self) -> ParserResult {
        std::mem::replace(&mut self.result, ParserResult::None)
    }

    pub(crate) fn result_is_error(&self) -> bool {
        matches!(self.result, ParserResult::Error(_))
    }

    /// Publishes a finished top-level expression.
    pub(crate) fn capture_result(&mut self, expr: Rc<Expr>) {
        if !self.result_is_error() {
            self.result = ParserResult::Expression(expr);
        }
    }

    /// Records an error. Only the first error of a batch is kept; cascades
    /// triggered by it are dropped.
    pub(crate) fn capture_error(&mut self, error: ParseError) {
        if !self.result_is_error() {
            self.result = ParserResult::Error(error);
        }
    }

    pub(crate) fn push_ssm(&mut self, ssm: Ssm) {
        let ckp = self.arena.checkpoint();
        self.stack.push(StackNode { ssm, ckp });
    }

    /// Number of SSMs currently stacked (the top-level one included).
    pub(crate) fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Arena scratch used right now, for stack-soundness assertions.
    pub(crate) fn arena_used(&self) -> usize {
        self.arena.used()
    }

    pub(crate) fn arena_alloc(&mut self, text: &str) -> ArenaStr {
        self.arena.alloc_str(text)
    }

    pub(crate) fn arena_str(&self, handle: ArenaStr) -> &str {
        self.arena.get(handle)
    }

    // ----- lexical scopes -----

    pub(crate) fn current_scope(&self) -> Option<&Rc<LocalSymtab>> {
        self.scope.as_ref()
    }

    pub(crate) fn push_scope(&mut self, symtab: Rc<LocalSymtab>) {
        self.scope = Some(symtab);
    }

    pub(crate) fn pop_scope(&mut self) {
        let parent = self
            .scope
            .as_ref()
            .expect("scope pop without a scope")
            .parent()
            .cloned();
        self.scope = parent;
    }

    /// Resolves `text` against the local scope chain, then the globals.
    /// Returns a variable reference carrying the number of scopes crossed.
    pub(crate) fn lookup_varref(&self, text: &str, st: &LangState) -> Option<Rc<Expr>> {
        let sym = st.strings.lookup(text)?;
        let mut depth: u32 = 0;
        let mut scope = self.scope.as_ref();
        while let Some(s) = scope {
            if let Binding::Local { slot, .. } = s.lookup_binding(sym) {
                let def = s.lookup_var(slot).expect("binding names a valid slot");
                return Some(Expr::var_ref(Rc::clone(def), depth));
            }
            depth += 1;
            scope = s.parent();
        }
        let def = st.globals.lookup(sym)?;
        Some(Expr::var_ref(Rc::clone(def), depth))
    }

    /// Hands a lambda signature to the definition whose right-hand side is
    /// being parsed, if the lambda is its direct rhs and the variable has
    /// no type yet. This is what lets a recursive function's body refer to
    /// the function being defined with a usable type.
    pub(crate) fn propagate_signature_to_pending_define(&self, sig: TypeDescr) {
        let n = self.stack.len();
        if n >= 2
            && matches!(self.stack[n - 1].ssm, Ssm::ExpectExpr(_))
            && let Ssm::Define(d) = &self.stack[n - 2].ssm
            && d.awaiting_rhs()
        {
            d.propagate_lhs_type(sig);
        }
    }

    // ----- input channels -----

    /// Routes one token to the topmost SSM.
    pub(crate) fn on_token(&mut self, tk: &Token, st: &mut LangState) {
        self.dispatch(st, |ssm, p, st| ssm.on_token(tk, p, st));
    }

    fn deliver(&mut self, emission: Emission, st: &mut LangState) {
        match emission {
            Emission::Expr(expr) => {
                self.dispatch(st, move |ssm, p, st| ssm.on_parsed_expression(expr, p, st));
            }
            Emission::ExprWithToken(expr, tk) => {
                self.dispatch(st, move |ssm, p, st| {
                    ssm.on_parsed_expression_with_token(expr, &tk, p, st)
                });
            }
            Emission::Symbol(sym) => {
                self.dispatch(st, move |ssm, p, st| ssm.on_parsed_symbol(sym, p, st));
            }
            Emission::TypeDescr(td) => {
                self.dispatch(st, move |ssm, p, st| ssm.on_parsed_typedescr(td, p, st));
            }
            Emission::Formal(formal, tk) => {
                self.dispatch(st, move |ssm, p, st| ssm.on_parsed_formal(formal, p, st));
                self.on_token(&tk, st);
            }
            Emission::FormalArglist(formals) => {
                self.dispatch(st, move |ssm, p, st| {
                    ssm.on_parsed_formal_arglist(formals, p, st)
                });
            }
            Emission::Cancel(tk) => self.on_token(&tk, st),
        }
    }

    /// Core dispatch: temporarily detaches the topmost SSM, runs the
    /// handler, then acts on the returned flow. Children the handler pushed
    /// end up above the re-inserted node; a completed node has its arena
    /// checkpoint restored before its product is delivered below.
    fn dispatch<F>(&mut self, st: &mut LangState, f: F)
    where
        F: FnOnce(&mut Ssm, &mut Parser, &mut LangState) -> Flow,
    {
        if self.result_is_error() {
            // One error per batch; drop cascading input.
            return;
        }
        let Some(mut node) = self.stack.pop() else {
            panic!("parser received input before a session was established");
        };
        let depth = self.stack.len();
        let flow = f(&mut node.ssm, self, st);
        match flow {
            Flow::Continue => self.stack.insert(depth, node),
            Flow::ContinueAndRedeliver(tk) => {
                self.stack.insert(depth, node);
                self.on_token(&tk, st);
            }
            Flow::Replace(ssms) => {
                self.arena.restore(node.ckp);
                for ssm in ssms {
                    self.push_ssm(ssm);
                }
            }
            Flow::ReplaceAndRedeliver(ssms, tk) => {
                self.arena.restore(node.ckp);
                for ssm in ssms {
                    self.push_ssm(ssm);
                }
                self.on_token(&tk, st);
            }
            Flow::Emit(emission) => {
                self.arena.restore(node.ckp);
                drop(node);
                self.deliver(emission, st);
            }
        }
    }
}

/// Records a syntax error for `tk` against the named SSM and expectation.
pub(crate) fn illegal_token(
    p: &mut Parser,
    ssm: &'static str,
    expected: &'static str,
    tk: &Token,
) -> Flow {
    p.capture_error(ParseError::Syntax {
        ssm,
        expected,
        found: match &tk.kind {
            TokenKind::Symbol(_) | TokenKind::Bool(_) | TokenKind::I64(_) | TokenKind::F64(_) => {
                format!("{tk}")
            }
            TokenKind::Str(_) => format!("{tk}"),
            _ => format!("'{tk}'"),
        },
    });
    Flow::Continue
}

/// Records a syntax error for a mis-delivered callback channel.
pub(crate) fn illegal_channel(
    p: &mut Parser,
    ssm: &'static str,
    expected: &'static str,
    found: &'static str,
) -> Flow {
    p.capture_error(ParseError::Syntax {
        ssm,
        expected,
        found: found.to_owned(),
    });
    Flow::Continue
}
