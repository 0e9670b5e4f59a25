//! The virtual machine.
//!
//! Four mutable registers drive a dispatch loop: `pc` (the opcode to
//! execute), `expr` (what to evaluate when `pc` is `Eval`), `value` (the
//! most recent result), and `cont` (what to do when the current evaluation
//! completes). Two more registers root the heap: `stack` (topmost
//! continuation frame) and `local_env` (current environment).
//!
//! Every nested evaluation saves whatever registers it will clobber in a
//! heap-allocated frame; the frame chain through the saved-`stack` fields
//! *is* the activation stack, and the collector walks it like any other
//! heap structure. Because every frame push is an allocation, every frame
//! push is a safe point: the machine offers its registers as roots before
//! allocating, and a collection can relocate all live state mid-run.

use std::rc::Rc;

use strum::IntoStaticStr;

use crate::{
    error::VmError,
    expr::{Expr, Literal},
    heap::{
        ApplyClosureFrame, ApplyFrame, Closure, DefContFrame, Heap, HeapData, HeapId,
        IfElseContFrame, LocalEnv, RootSet, SeqContFrame,
    },
    intern::StringTable,
    tracer::VmTracer,
    value::Value,
};

/// One VM instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Opcode {
    /// Dispatch on the expression in the `expr` register.
    Eval,
    /// Stop the loop.
    Halt,
    /// After a define/assign right-hand side: store `value` into the slot.
    DefCont,
    /// After a closure body returns: restore saved registers.
    ApplyCont,
    /// After an if-else test: pick a branch.
    IfElseCont,
    /// Step to the next expression of a sequence.
    SeqCont,
    /// Collect the callee and then each argument of an application.
    EvalArgs,
    /// Perform the call once callee and arguments are evaluated.
    Apply,
}

impl Opcode {
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }
}

/// The Schematika virtual machine.
///
/// Borrows the heap and the global environment root from the session that
/// owns them; registers live here. `Tr` selects the tracing behavior and
/// monomorphizes away for [`NoopTracer`](crate::tracer::NoopTracer).
pub struct Vm<'a, Tr: VmTracer> {
    heap: &'a mut Heap,
    global_env: &'a mut HeapId,
    strings: &'a StringTable,
    tracer: Tr,

    pc: Opcode,
    cont: Opcode,
    expr: Option<Rc<Expr>>,
    value: Value,
    stack: Option<HeapId>,
    local_env: HeapId,
}

impl<'a, Tr: VmTracer> Vm<'a, Tr> {
    pub fn new(
        heap: &'a mut Heap,
        global_env: &'a mut HeapId,
        strings: &'a StringTable,
        tracer: Tr,
    ) -> Self {
        let local_env = *global_env;
        Self {
            heap,
            global_env,
            strings,
            tracer,
            pc: Opcode::Halt,
            cont: Opcode::Halt,
            expr: None,
            value: Value::Unspecified,
            stack: None,
            local_env,
        }
    }

    /// Installs `expr` for evaluation: `pc <- Eval`, `cont <- Halt`.
    pub fn load(&mut self, expr: Rc<Expr>) {
        self.pc = Opcode::Eval;
        self.cont = Opcode::Halt;
        self.expr = Some(expr);
        self.value = Value::Unspecified;
        self.stack = None;
        self.local_env = *self.global_env;
    }

    /// Runs until `Halt`; returns the final value.
    pub fn run(&mut self) -> Result<Value, VmError> {
        loop {
            match self.step() {
                Ok(true) => return Ok(self.value),
                Ok(false) => {}
                Err(e) => {
                    self.pc = Opcode::Halt;
                    return Err(e);
                }
            }
        }
    }

    /// Executes one opcode. Returns whether the machine has halted.
    pub fn step(&mut self) -> Result<bool, VmError> {
        self.tracer.on_opcode(self.pc);
        match self.pc {
            Opcode::Halt => return Ok(true),
            Opcode::Eval => self.do_eval()?,
            Opcode::DefCont => self.do_def_cont()?,
            Opcode::ApplyCont => self.do_apply_cont(),
            Opcode::IfElseCont => self.do_if_else_cont()?,
            Opcode::SeqCont => self.do_seq_cont(),
            Opcode::EvalArgs => self.do_eval_args(),
            Opcode::Apply => self.do_apply()?,
        }
        Ok(false)
    }

    /// The value register.
    #[must_use]
    pub fn value(&self) -> Value {
        self.value
    }

    /// Access to the tracer, e.g. to read counters after a run.
    pub fn tracer(&self) -> &Tr {
        &self.tracer
    }

    /// Offers the registers as roots and collects if the heap asks for it.
    /// Called before every allocation the machine performs.
    fn maybe_collect(&mut self) {
        if !self.heap.should_collect() {
            return;
        }
        let live_before = self.heap.stats().live_objects;
        self.heap.collect(RootSet {
            ids: vec![&mut self.local_env, &mut *self.global_env],
            opt_ids: vec![&mut self.stack],
            values: vec![&mut self.value],
        });
        let live_after = self.heap.stats().live_objects;
        self.tracer.on_collect(live_before, live_after);
    }

    /// Walks `link` parents up from the current environment.
    fn env_at(&self, link: u32) -> Result<HeapId, VmError> {
        let mut env = self.local_env;
        for crossed in 0..link {
            let HeapData::LocalEnv(e) = self.heap.get(env) else {
                unreachable!("environment register names a non-environment");
            };
            env = e.parent.ok_or(VmError::UnboundSlot {
                link: crossed + 1,
                slot: 0,
            })?;
        }
        Ok(env)
    }

    fn top_frame(&self) -> HeapId {
        self.stack.expect("continuation dispatched with empty frame stack")
    }

    fn do_eval(&mut self) -> Result<(), VmError> {
        let expr = Rc::clone(self.expr.as_ref().expect("eval dispatched with empty expr register"));
        match &*expr {
            Expr::Constant(c) => {
                self.value = match &c.literal {
                    Literal::Bool(b) => Value::Bool(*b),
                    Literal::I64(v) => Value::I64(*v),
                    Literal::F64(v) => Value::F64(*v),
                    Literal::Str(s) => {
                        self.maybe_collect();
                        let id = self.heap.alloc(HeapData::Str(s.clone()));
                        Value::Ref(id)
                    }
                };
                self.pc = self.cont;
            }
            Expr::VarRef(v) => {
                let env = self.env_at(v.link_depth)?;
                let HeapData::LocalEnv(e) = self.heap.get(env) else {
                    unreachable!("environment register names a non-environment");
                };
                let HeapData::Array(slots) = self.heap.get(e.values) else {
                    unreachable!("environment values are not an array");
                };
                let slot = v.def.slot();
                let Some(value) = slots.get(slot as usize) else {
                    return Err(VmError::UnboundSlot {
                        link: v.link_depth,
                        slot,
                    });
                };
                self.value = *value;
                self.pc = self.cont;
            }
            Expr::Define(d) => {
                self.maybe_collect();
                let frame = self.heap.alloc(HeapData::DefCont(DefContFrame {
                    parent: self.stack,
                    cont: self.cont,
                    target: Rc::clone(&expr),
                }));
                self.stack = Some(frame);
                self.cont = Opcode::DefCont;
                self.expr = Some(Rc::clone(&d.rhs));
                self.pc = Opcode::Eval;
            }
            Expr::Assign(a) => {
                self.maybe_collect();
                let frame = self.heap.alloc(HeapData::DefCont(DefContFrame {
                    parent: self.stack,
                    cont: self.cont,
                    target: Rc::clone(&expr),
                }));
                self.stack = Some(frame);
                self.cont = Opcode::DefCont;
                self.expr = Some(Rc::clone(&a.rhs));
                self.pc = Opcode::Eval;
            }
            Expr::IfElse(i) => {
                self.maybe_collect();
                let frame = self.heap.alloc(HeapData::IfElseCont(IfElseContFrame {
                    parent: self.stack,
                    cont: self.cont,
                    ifelse: Rc::clone(&expr),
                }));
                self.stack = Some(frame);
                self.cont = Opcode::IfElseCont;
                self.expr = Some(Rc::clone(&i.test));
                self.pc = Opcode::Eval;
            }
            Expr::Sequence(s) => {
                if s.exprs.is_empty() {
                    self.value = Value::Unspecified;
                    self.pc = self.cont;
                } else {
                    self.maybe_collect();
                    let frame = self.heap.alloc(HeapData::SeqCont(SeqContFrame {
                        parent: self.stack,
                        cont: self.cont,
                        seq: Rc::clone(&expr),
                        i_seq: 0,
                    }));
                    self.stack = Some(frame);
                    self.cont = Opcode::SeqCont;
                    self.expr = Some(Rc::clone(&s.exprs[0]));
                    self.pc = Opcode::Eval;
                }
            }
            Expr::Apply(a) => {
                self.maybe_collect();
                let args = self
                    .heap
                    .alloc(HeapData::Array(Vec::with_capacity(a.args.len())));
                let frame = self.heap.alloc(HeapData::ApplyFrame(ApplyFrame {
                    parent: self.stack,
                    cont: self.cont,
                    apply: Rc::clone(&expr),
                    fn_val: Value::Unspecified,
                    args,
                    i_arg: 0,
                }));
                self.stack = Some(frame);
                self.cont = Opcode::EvalArgs;
                self.expr = Some(Rc::clone(&a.fn_expr));
                self.pc = Opcode::Eval;
            }
            Expr::Lambda(l) => {
                self.maybe_collect();
                let id = self.heap.alloc(HeapData::Closure(Closure {
                    code: Rc::clone(l),
                    env: self.local_env,
                }));
                self.value = Value::Ref(id);
                self.pc = self.cont;
            }
            Expr::Primitive(p) => {
                self.value = Value::Primitive(*p);
                self.pc = self.cont;
            }
        }
        Ok(())
    }

    fn do_def_cont(&mut self) -> Result<(), VmError> {
        let frame_id = self.top_frame();
        let (parent, saved_cont, target) = {
            let HeapData::DefCont(f) = self.heap.get(frame_id) else {
                unreachable!("def continuation without a def frame");
            };
            (f.parent, f.cont, Rc::clone(&f.target))
        };
        self.stack = parent;
        self.cont = saved_cont;

        let (link, slot, may_grow) = match &*target {
            Expr::Define(d) => (0, d.lhs.slot(), true),
            Expr::Assign(a) => (a.lhs.link_depth, a.lhs.def.slot(), false),
            _ => unreachable!("def frame holds neither define nor assign"),
        };
        let env = self.env_at(link)?;
        let values = {
            let HeapData::LocalEnv(e) = self.heap.get(env) else {
                unreachable!("environment register names a non-environment");
            };
            e.values
        };
        let HeapData::Array(slots) = self.heap.get_mut(values) else {
            unreachable!("environment values are not an array");
        };
        let index = slot as usize;
        if may_grow && index >= slots.len() {
            slots.resize(index + 1, Value::Unspecified);
        }
        let Some(cell) = slots.get_mut(index) else {
            return Err(VmError::UnboundSlot { link, slot });
        };
        *cell = self.value;
        // The result of a definition or assignment is the stored value.
        self.pc = saved_cont;
        Ok(())
    }

    fn do_apply_cont(&mut self) {
        let frame_id = self.top_frame();
        let HeapData::ApplyClosureFrame(f) = self.heap.get(frame_id) else {
            unreachable!("apply continuation without a closure frame");
        };
        self.stack = f.parent;
        self.cont = f.cont;
        self.local_env = f.env;
        self.pc = self.cont;
    }

    fn do_if_else_cont(&mut self) -> Result<(), VmError> {
        let frame_id = self.top_frame();
        let (parent, saved_cont, ifelse) = {
            let HeapData::IfElseCont(f) = self.heap.get(frame_id) else {
                unreachable!("if-else continuation without its frame");
            };
            (f.parent, f.cont, Rc::clone(&f.ifelse))
        };
        let Expr::IfElse(i) = &*ifelse else {
            unreachable!("if-else frame holds a non-conditional");
        };
        let Value::Bool(test) = self.value else {
            return Err(VmError::TypeMismatch {
                expected: "bool test",
                found: self.value.kind_name(self.heap).to_owned(),
            });
        };
        self.stack = parent;
        self.cont = saved_cont;
        let branch = if test {
            Some(&i.when_true)
        } else {
            i.when_false.as_ref()
        };
        // The chosen branch evaluates straight into the caller's
        // continuation; the frame is already gone.
        match branch {
            Some(expr) => {
                self.expr = Some(Rc::clone(expr));
                self.pc = Opcode::Eval;
            }
            None => {
                self.value = Value::Unspecified;
                self.pc = saved_cont;
            }
        }
        Ok(())
    }

    fn do_seq_cont(&mut self) {
        let frame_id = self.top_frame();
        let (parent, saved_cont, seq, i_seq) = {
            let HeapData::SeqCont(f) = self.heap.get(frame_id) else {
                unreachable!("sequence continuation without its frame");
            };
            (f.parent, f.cont, Rc::clone(&f.seq), f.i_seq)
        };
        let Expr::Sequence(s) = &*seq else {
            unreachable!("sequence frame holds a non-sequence");
        };
        let next = i_seq as usize + 1;
        if next < s.exprs.len() {
            let HeapData::SeqCont(f) = self.heap.get_mut(frame_id) else {
                unreachable!("sequence continuation without its frame");
            };
            f.i_seq = i_seq + 1;
            self.expr = Some(Rc::clone(&s.exprs[next]));
            self.cont = Opcode::SeqCont;
            self.pc = Opcode::Eval;
        } else {
            self.stack = parent;
            self.cont = saved_cont;
            self.pc = saved_cont;
        }
    }

    fn do_eval_args(&mut self) {
        let frame_id = self.top_frame();
        let (apply, args_id, k) = {
            let HeapData::ApplyFrame(f) = self.heap.get(frame_id) else {
                unreachable!("argument continuation without an apply frame");
            };
            (Rc::clone(&f.apply), f.args, f.i_arg)
        };
        if k == 0 {
            let HeapData::ApplyFrame(f) = self.heap.get_mut(frame_id) else {
                unreachable!("argument continuation without an apply frame");
            };
            f.fn_val = self.value;
        } else {
            let HeapData::Array(args) = self.heap.get_mut(args_id) else {
                unreachable!("apply arguments are not an array");
            };
            args.push(self.value);
        }
        {
            let HeapData::ApplyFrame(f) = self.heap.get_mut(frame_id) else {
                unreachable!("argument continuation without an apply frame");
            };
            f.i_arg = k + 1;
        }
        let Expr::Apply(a) = &*apply else {
            unreachable!("apply frame holds a non-application");
        };
        let stored = k as usize;
        if stored < a.args.len() {
            self.expr = Some(Rc::clone(&a.args[stored]));
            self.cont = Opcode::EvalArgs;
            self.pc = Opcode::Eval;
        } else {
            self.pc = Opcode::Apply;
        }
    }

    fn do_apply(&mut self) -> Result<(), VmError> {
        // Safe point first: the frame and its argument array are still
        // rooted through the stack register here.
        self.maybe_collect();
        let frame_id = self.top_frame();
        let (parent, saved_cont, fn_val, args_id) = {
            let HeapData::ApplyFrame(f) = self.heap.get(frame_id) else {
                unreachable!("apply dispatched without an apply frame");
            };
            (f.parent, f.cont, f.fn_val, f.args)
        };
        match fn_val {
            Value::Primitive(p) => {
                self.tracer.on_apply_primitive(p.name());
                let HeapData::Array(args) = self.heap.get(args_id) else {
                    unreachable!("apply arguments are not an array");
                };
                self.value = p.invoke(args)?;
                self.stack = parent;
                self.cont = saved_cont;
                self.pc = saved_cont;
            }
            Value::Ref(id) => {
                let closure = match self.heap.get(id) {
                    HeapData::Closure(c) => c.clone(),
                    _ => {
                        return Err(VmError::NotCallable {
                            found: fn_val.kind_name(self.heap).to_owned(),
                        });
                    }
                };
                let n_args = {
                    let HeapData::Array(args) = self.heap.get(args_id) else {
                        unreachable!("apply arguments are not an array");
                    };
                    args.len()
                };
                if closure.code.arity() != n_args {
                    return Err(VmError::ArityMismatch {
                        expected: closure.code.arity(),
                        found: n_args,
                    });
                }
                self.tracer
                    .on_apply_closure(self.strings.resolve(closure.code.name));
                // The evaluated-args array becomes the new environment's
                // slot array directly.
                let env = self.heap.alloc(HeapData::LocalEnv(LocalEnv {
                    parent: Some(closure.env),
                    values: args_id,
                }));
                let frame = self.heap.alloc(HeapData::ApplyClosureFrame(ApplyClosureFrame {
                    parent,
                    cont: saved_cont,
                    env: self.local_env,
                }));
                self.stack = Some(frame);
                self.local_env = env;
                self.expr = Some(Rc::clone(&closure.code.body));
                self.cont = Opcode::ApplyCont;
                self.pc = Opcode::Eval;
            }
            other => {
                return Err(VmError::NotCallable {
                    found: other.kind_name(self.heap).to_owned(),
                });
            }
        }
        Ok(())
    }
}
