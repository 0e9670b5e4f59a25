//! VM execution tracing.
//!
//! The VM is generic over a [`VmTracer`]; with [`NoopTracer`] every hook
//! monomorphizes to nothing, so production execution pays no cost.
//! [`StderrTracer`] logs dispatches for debugging, [`CountingTracer`]
//! accumulates counters that tests and the CLI inspect.

use crate::vm::Opcode;

/// Hook points at the VM's significant events.
pub trait VmTracer {
    /// An opcode is about to be dispatched.
    fn on_opcode(&mut self, _op: Opcode) {}

    /// A closure body is entered.
    fn on_apply_closure(&mut self, _name: &str) {}

    /// A native primitive is invoked.
    fn on_apply_primitive(&mut self, _name: &'static str) {}

    /// A collection ran at a safe point.
    fn on_collect(&mut self, _live_before: usize, _live_after: usize) {}
}

/// Zero-cost tracer; the production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracer;

impl VmTracer for NoopTracer {}

/// Human-readable execution log on stderr.
#[derive(Debug, Default)]
pub struct StderrTracer;

impl VmTracer for StderrTracer {
    fn on_opcode(&mut self, op: Opcode) {
        eprintln!("vsm: {}", op.name());
    }

    fn on_apply_closure(&mut self, name: &str) {
        eprintln!("vsm: enter closure {name}");
    }

    fn on_apply_primitive(&mut self, name: &'static str) {
        eprintln!("vsm: primitive {name}");
    }

    fn on_collect(&mut self, live_before: usize, live_after: usize) {
        eprintln!("vsm: gc {live_before} -> {live_after} live objects");
    }
}

/// Event counters.
#[derive(Debug, Default, Clone)]
pub struct CountingTracer {
    pub opcodes: usize,
    pub closure_applies: usize,
    pub primitive_applies: usize,
    pub collections: usize,
}

impl VmTracer for CountingTracer {
    fn on_opcode(&mut self, _op: Opcode) {
        self.opcodes += 1;
    }

    fn on_apply_closure(&mut self, _name: &str) {
        self.closure_applies += 1;
    }

    fn on_apply_primitive(&mut self, _name: &'static str) {
        self.primitive_applies += 1;
    }

    fn on_collect(&mut self, _live_before: usize, _live_after: usize) {
        self.collections += 1;
    }
}
