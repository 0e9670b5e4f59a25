//! The session layer: language state, heap, and the execute loop.
//!
//! [`LangState`] bundles the process-wide pieces — string table, type
//! table, global symbol table — into one explicit object passed along the
//! call chain; the reader and VM borrow it rather than reaching for
//! globals. [`Session`] owns a `LangState`, the GC heap, the global
//! environment, and a persistent [`Reader`], so variables and functions
//! defined in one `execute` call are visible in the next.

use std::rc::Rc;

use crate::{
    error::SessionError,
    expr::Expr,
    heap::{Heap, HeapStats},
    intern::StringTable,
    object::Object,
    reader::{Reader, ReaderResult},
    symtab::GlobalSymtab,
    tracer::NoopTracer,
    types::TypeTable,
    value::HeapId,
    vm::Vm,
};

/// The process-wide language state: interned strings, interned type
/// descriptors, and the global symbol table.
pub struct LangState {
    pub strings: StringTable,
    pub types: TypeTable,
    pub globals: GlobalSymtab,
}

impl LangState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            strings: StringTable::new(),
            types: TypeTable::new(),
            globals: GlobalSymtab::new(),
        }
    }
}

impl Default for LangState {
    fn default() -> Self {
        Self::new()
    }
}

/// A persistent interpreter session.
pub struct Session {
    state: LangState,
    heap: Heap,
    global_env: HeapId,
    reader: Reader,
}

impl Session {
    /// An interactive session: any expression allowed at top level.
    #[must_use]
    pub fn new() -> Self {
        Self::build(Heap::new(), true)
    }

    /// A batch session: only definitions allowed at top level.
    #[must_use]
    pub fn batch() -> Self {
        Self::build(Heap::new(), false)
    }

    /// An interactive session whose heap collects once `threshold`
    /// objects are live. Small thresholds force collections mid-run.
    #[must_use]
    pub fn with_gc_threshold(threshold: usize) -> Self {
        Self::build(Heap::with_gc_threshold(threshold), true)
    }

    fn build(mut heap: Heap, interactive: bool) -> Self {
        let global_env = heap.alloc_global_env();
        let mut reader = Reader::new();
        if interactive {
            reader.begin_interactive_session();
        } else {
            reader.begin_batch_session();
        }
        Self {
            state: LangState::new(),
            heap,
            global_env,
            reader,
        }
    }

    /// Runs a complete source text and returns every top-level result in
    /// order. The first parse or runtime error stops execution; the
    /// reader is reset so the session stays usable.
    pub fn execute_all(&mut self, source: &str) -> Result<Vec<Object>, SessionError> {
        self.drain(source, true)
    }

    /// Runs a complete source text and returns the last top-level result
    /// (or `Unspecified` if the text held nothing).
    pub fn execute(&mut self, source: &str) -> Result<Object, SessionError> {
        let results = self.execute_all(source)?;
        Ok(results.into_iter().last().unwrap_or(Object::Unspecified))
    }

    /// Feeds one line without finalizing, returning whatever complete
    /// expressions it produced. An expression still in flight stays
    /// buffered; check [`Session::needs_more_input`].
    pub fn feed_line(&mut self, line: &str) -> Result<Vec<Object>, SessionError> {
        self.drain(line, false)
    }

    /// Finalizes buffered input as if end-of-input were reached.
    pub fn finish_input(&mut self) -> Result<Vec<Object>, SessionError> {
        self.drain("", true)
    }

    /// True while a multi-line construct is part way through parsing.
    #[must_use]
    pub fn needs_more_input(&self) -> bool {
        self.reader.has_incomplete_expr()
    }

    /// Discards any partial parse, keeping definitions already made.
    pub fn reset(&mut self) {
        self.reader.reset_to_idle_toplevel();
    }

    /// Heap occupancy snapshot.
    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    /// Collections the heap has performed so far.
    #[must_use]
    pub fn collections(&self) -> usize {
        self.heap.collections()
    }

    /// The session's language state (string, type, and symbol tables).
    #[must_use]
    pub fn lang_state(&self) -> &LangState {
        &self.state
    }

    /// Parser stack depth, exposed for stack-soundness assertions.
    #[must_use]
    pub fn parser_depth(&self) -> usize {
        self.reader.parser_depth()
    }

    /// Parser arena bytes in use, exposed for stack-soundness assertions.
    #[must_use]
    pub fn parser_arena_used(&self) -> usize {
        self.reader.parser_arena_used()
    }

    fn drain(&mut self, input: &str, eof: bool) -> Result<Vec<Object>, SessionError> {
        let mut out = Vec::new();
        let mut input = input;
        loop {
            match self.reader.read_expr(input, eof, &mut self.state) {
                ReaderResult::Expression(expr) => {
                    input = "";
                    out.push(self.eval(&expr)?);
                }
                ReaderResult::None => return Ok(out),
                ReaderResult::Error(e) => {
                    self.reader.reset_to_idle_toplevel();
                    return Err(SessionError::Parse(e));
                }
            }
        }
    }

    fn eval(&mut self, expr: &Rc<Expr>) -> Result<Object, SessionError> {
        expr.attach_envs(&self.state.globals, &self.state.strings)
            .map_err(SessionError::Parse)?;
        let mut vm = Vm::new(
            &mut self.heap,
            &mut self.global_env,
            &self.state.strings,
            NoopTracer,
        );
        vm.load(Rc::clone(expr));
        match vm.run() {
            Ok(value) => Ok(Object::from_value(value, &self.heap, &self.state.strings)),
            Err(e) => {
                self.reader.reset_to_idle_toplevel();
                Err(SessionError::Vm(e))
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
