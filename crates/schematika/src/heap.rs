//! The relocatable value heap and its copying collector.
//!
//! Every heap object is a [`HeapData`] variant addressed by a [`HeapId`].
//! The mandatory contract on each kind is three operations: `shallow_size`
//! (allocation size excluding children), `shallow_copy` (an identical copy
//! whose child fields still point into the old space), and
//! `forward_children` (rewrite each child field through the collector).
//!
//! Collection copies the roots into a fresh slot vector, then runs a
//! Cheney-style scan over the copies, forwarding children as it goes. A
//! `Forwarded` marker is left in the old slot the first time an object is
//! copied, which makes forwarding idempotent and keyed on identity — cyclic
//! structures (a closure whose captured environment holds that closure)
//! need no special handling.
//!
//! Collection may run at any safe point; in this system every allocation is
//! one. The VM's registers, the session's global environment, and nothing
//! else form the root set.

use std::{collections::BTreeMap, fmt, mem, rc::Rc};

use strum::IntoStaticStr;

use crate::{expr::LambdaDef, intern::StringTable, value::Value, vm::Opcode};

/// Index of an object in the heap's current space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapId(u32);

impl HeapId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A function value: code plus the environment captured at the point the
/// lambda expression was evaluated.
#[derive(Debug, Clone)]
pub(crate) struct Closure {
    pub code: Rc<LambdaDef>,
    pub env: HeapId,
}

/// Runtime twin of a lexical scope: parent pointer plus one value slot per
/// variable, held in a heap [`HeapData::Array`].
#[derive(Debug, Clone)]
pub(crate) struct LocalEnv {
    pub parent: Option<HeapId>,
    pub values: HeapId,
}

/// Saved registers while an apply expression evaluates its function and
/// argument expressions.
#[derive(Debug, Clone)]
pub(crate) struct ApplyFrame {
    pub parent: Option<HeapId>,
    pub cont: Opcode,
    /// The apply expression, for the argument expressions still to run.
    pub apply: Rc<crate::expr::Expr>,
    /// Evaluated callee; `Unspecified` until the head position finishes.
    pub fn_val: Value,
    /// Heap array accumulating evaluated arguments.
    pub args: HeapId,
    /// Count of values received so far (callee first, then arguments).
    pub i_arg: u32,
}

/// Saved registers while a closure body runs; restored on return.
#[derive(Debug, Clone)]
pub(crate) struct ApplyClosureFrame {
    pub parent: Option<HeapId>,
    pub cont: Opcode,
    pub env: HeapId,
}

/// Saved registers while the right-hand side of a `def` or `:=` evaluates.
#[derive(Debug, Clone)]
pub(crate) struct DefContFrame {
    pub parent: Option<HeapId>,
    pub cont: Opcode,
    /// The define or assign expression whose slot receives the value.
    pub target: Rc<crate::expr::Expr>,
}

/// Saved registers while an if-else test evaluates.
#[derive(Debug, Clone)]
pub(crate) struct IfElseContFrame {
    pub parent: Option<HeapId>,
    pub cont: Opcode,
    pub ifelse: Rc<crate::expr::Expr>,
}

/// Saved registers while a sequence steps through its elements.
#[derive(Debug, Clone)]
pub(crate) struct SeqContFrame {
    pub parent: Option<HeapId>,
    pub cont: Opcode,
    pub seq: Rc<crate::expr::Expr>,
    pub i_seq: u32,
}

/// One heap object.
#[derive(Debug, Clone, IntoStaticStr)]
pub(crate) enum HeapData {
    Str(Box<str>),
    Array(Vec<Value>),
    Closure(Closure),
    LocalEnv(LocalEnv),
    ApplyFrame(ApplyFrame),
    ApplyClosureFrame(ApplyClosureFrame),
    DefCont(DefContFrame),
    IfElseCont(IfElseContFrame),
    SeqCont(SeqContFrame),
    /// Tombstone left in the old space once an object has been copied.
    Forwarded(HeapId),
}

impl HeapData {
    /// Allocation size in bytes, excluding pointed-to children.
    pub(crate) fn shallow_size(&self) -> usize {
        let payload = match self {
            Self::Str(s) => s.len(),
            Self::Array(v) => v.len() * mem::size_of::<Value>(),
            _ => 0,
        };
        mem::size_of::<Self>() + payload
    }

    /// An identical copy whose child fields still reference the old space.
    /// The collector forwards them afterward.
    pub(crate) fn shallow_copy(&self) -> Self {
        self.clone()
    }

    /// Rewrites every child pointer field through `gc`. Returns the
    /// object's shallow size so the scan can account for copied bytes.
    pub(crate) fn forward_children(&mut self, gc: &mut Collector) -> usize {
        match self {
            Self::Str(_) => {}
            Self::Array(values) => {
                for v in values.iter_mut() {
                    gc.forward_value(v);
                }
            }
            Self::Closure(c) => gc.forward_inplace(&mut c.env),
            Self::LocalEnv(env) => {
                if let Some(parent) = &mut env.parent {
                    gc.forward_inplace(parent);
                }
                gc.forward_inplace(&mut env.values);
            }
            Self::ApplyFrame(f) => {
                if let Some(parent) = &mut f.parent {
                    gc.forward_inplace(parent);
                }
                gc.forward_value(&mut f.fn_val);
                gc.forward_inplace(&mut f.args);
            }
            Self::ApplyClosureFrame(f) => {
                if let Some(parent) = &mut f.parent {
                    gc.forward_inplace(parent);
                }
                gc.forward_inplace(&mut f.env);
            }
            Self::DefCont(f) => {
                if let Some(parent) = &mut f.parent {
                    gc.forward_inplace(parent);
                }
            }
            Self::IfElseCont(f) => {
                if let Some(parent) = &mut f.parent {
                    gc.forward_inplace(parent);
                }
            }
            Self::SeqCont(f) => {
                if let Some(parent) = &mut f.parent {
                    gc.forward_inplace(parent);
                }
            }
            Self::Forwarded(_) => unreachable!("forwarding marker in destination space"),
        }
        self.shallow_size()
    }
}

/// Mutable references to every [`HeapId`]/[`Value`] the caller holds
/// outside the heap. The collector rewrites them to destination space.
#[derive(Default)]
pub(crate) struct RootSet<'a> {
    pub ids: Vec<&'a mut HeapId>,
    pub opt_ids: Vec<&'a mut Option<HeapId>>,
    pub values: Vec<&'a mut Value>,
}

/// In-flight state of one collection.
pub(crate) struct Collector {
    from: Vec<HeapData>,
    to: Vec<HeapData>,
}

impl Collector {
    /// Allocates a shallow copy of `src` in the destination space.
    fn alloc_copy(&mut self, src: &HeapData) -> HeapId {
        let id = HeapId(u32::try_from(self.to.len()).expect("heap overflow"));
        self.to.push(src.shallow_copy());
        id
    }

    /// Forwards one pointer field: copies the referent on first touch,
    /// then rewrites the field. Idempotent — repeat calls on fields naming
    /// the same object all yield the same destination id.
    pub(crate) fn forward_inplace(&mut self, field: &mut HeapId) {
        let old = *field;
        if let HeapData::Forwarded(new_id) = &self.from[old.index()] {
            *field = *new_id;
            return;
        }
        let new_id = {
            let src = mem::replace(&mut self.from[old.index()], HeapData::Forwarded(HeapId(0)));
            let new_id = self.alloc_copy(&src);
            self.from[old.index()] = HeapData::Forwarded(new_id);
            new_id
        };
        *field = new_id;
    }

    /// Forwards a value if it references the heap; immediates are untouched.
    pub(crate) fn forward_value(&mut self, value: &mut Value) {
        if let Value::Ref(id) = value {
            self.forward_inplace(id);
        }
    }
}

/// Statistics snapshot of the heap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Number of objects in the current space.
    pub live_objects: usize,
    /// Estimated bytes held by those objects.
    pub live_bytes: usize,
    /// Breakdown by variant name, deterministic iteration order.
    pub objects_by_kind: BTreeMap<&'static str, usize>,
    /// Collections performed so far.
    pub collections: usize,
}

impl fmt::Display for HeapStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} live objects, ~{} bytes, {} collection(s)",
            self.live_objects, self.live_bytes, self.collections
        )?;
        for (kind, count) in &self.objects_by_kind {
            write!(f, "\n  {kind}: {count}")?;
        }
        Ok(())
    }
}

/// The GC heap. Single-owner; collection happens only when the owner asks
/// for it at a safe point, with the full root set in hand.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<HeapData>,
    threshold: usize,
    collections: usize,
}

/// Allocations before the first collection is requested.
const DEFAULT_GC_THRESHOLD: usize = 64 * 1024;

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    #[must_use]
    pub fn new() -> Self {
        Self::with_gc_threshold(DEFAULT_GC_THRESHOLD)
    }

    /// A heap that requests collection once `threshold` objects are live.
    /// Small thresholds force frequent collections, which tests use.
    #[must_use]
    pub fn with_gc_threshold(threshold: usize) -> Self {
        Self {
            slots: Vec::new(),
            threshold: threshold.max(1),
            collections: 0,
        }
    }

    pub(crate) fn alloc(&mut self, data: HeapData) -> HeapId {
        let id = HeapId(u32::try_from(self.slots.len()).expect("heap overflow"));
        self.slots.push(data);
        id
    }

    pub(crate) fn get(&self, id: HeapId) -> &HeapData {
        match &self.slots[id.index()] {
            HeapData::Forwarded(_) => unreachable!("read through forwarding marker"),
            data => data,
        }
    }

    pub(crate) fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        match &mut self.slots[id.index()] {
            HeapData::Forwarded(_) => unreachable!("write through forwarding marker"),
            data => data,
        }
    }

    /// Allocates an empty top-level environment. Hosts driving the VM
    /// directly need one as the root environment.
    pub fn alloc_global_env(&mut self) -> HeapId {
        let values = self.alloc(HeapData::Array(Vec::new()));
        self.alloc(HeapData::LocalEnv(LocalEnv {
            parent: None,
            values,
        }))
    }

    /// True once enough has been allocated that the next safe point should
    /// collect.
    #[must_use]
    pub fn should_collect(&self) -> bool {
        self.slots.len() >= self.threshold
    }

    /// Number of collections performed.
    #[must_use]
    pub fn collections(&self) -> usize {
        self.collections
    }

    /// Copies everything reachable from `roots` into a fresh space and
    /// rewrites the roots. Everything unreachable is dropped.
    pub(crate) fn collect(&mut self, roots: RootSet<'_>) {
        let from = mem::take(&mut self.slots);
        let mut gc = Collector { from, to: Vec::new() };

        for id in roots.ids {
            gc.forward_inplace(id);
        }
        for id in roots.opt_ids {
            if let Some(id) = id {
                gc.forward_inplace(id);
            }
        }
        for value in roots.values {
            gc.forward_value(value);
        }

        // Cheney scan: every object copied after the scan cursor still has
        // children pointing into the old space.
        let mut scan = 0;
        while scan < gc.to.len() {
            let mut obj = mem::replace(&mut gc.to[scan], HeapData::Forwarded(HeapId(0)));
            obj.forward_children(&mut gc);
            gc.to[scan] = obj;
            scan += 1;
        }

        self.slots = gc.to;
        self.collections += 1;
        // Keep headroom so we do not collect on every allocation when the
        // live set is near the threshold.
        self.threshold = self.threshold.max(self.slots.len() * 2);
    }

    /// Variant name of the object at `id`.
    #[must_use]
    pub fn kind_name(&self, id: HeapId) -> &'static str {
        self.get(id).into()
    }

    /// Renders the object at `id` for output.
    #[must_use]
    pub fn display_object(&self, id: HeapId, strings: &StringTable) -> String {
        match self.get(id) {
            HeapData::Str(s) => format!("{s:?}"),
            HeapData::Array(values) => {
                let mut out = String::from("[");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&v.display(self, strings));
                }
                out.push(']');
                out
            }
            HeapData::Closure(c) => format!("<closure {}>", strings.resolve(c.code.name)),
            HeapData::LocalEnv(_) => "<env>".to_owned(),
            HeapData::ApplyFrame(_)
            | HeapData::ApplyClosureFrame(_)
            | HeapData::DefCont(_)
            | HeapData::IfElseCont(_)
            | HeapData::SeqCont(_) => "<frame>".to_owned(),
            HeapData::Forwarded(_) => unreachable!("display of forwarding marker"),
        }
    }

    /// Snapshot of heap occupancy.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        let mut objects_by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut live_bytes = 0;
        for slot in &self.slots {
            *objects_by_kind.entry(slot.into()).or_insert(0) += 1;
            live_bytes += slot.shallow_size();
        }
        HeapStats {
            live_objects: self.slots.len(),
            live_bytes,
            objects_by_kind,
            collections: self.collections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_obj(text: &str) -> HeapData {
        HeapData::Str(text.into())
    }

    #[test]
    fn collect_preserves_shape_and_scalars() {
        let mut heap = Heap::new();
        let s = heap.alloc(str_obj("shared"));
        let arr = heap.alloc(HeapData::Array(vec![
            Value::I64(7),
            Value::Ref(s),
            Value::Ref(s),
        ]));

        let mut root = arr;
        heap.collect(RootSet {
            ids: vec![&mut root],
            ..RootSet::default()
        });

        let HeapData::Array(values) = heap.get(root) else {
            panic!("root should still be an array");
        };
        assert_eq!(values[0], Value::I64(7));
        // Shared child keeps a single identity after the move.
        let (Value::Ref(a), Value::Ref(b)) = (values[1], values[2]) else {
            panic!("children should still be refs");
        };
        assert_eq!(a, b);
        let HeapData::Str(text) = heap.get(a) else {
            panic!("child should still be a string");
        };
        assert_eq!(&**text, "shared");
    }

    #[test]
    fn unreachable_objects_are_dropped() {
        let mut heap = Heap::new();
        let keep = heap.alloc(str_obj("keep"));
        heap.alloc(str_obj("drop one"));
        heap.alloc(str_obj("drop two"));
        assert_eq!(heap.stats().live_objects, 3);

        let mut root = keep;
        heap.collect(RootSet {
            ids: vec![&mut root],
            ..RootSet::default()
        });
        assert_eq!(heap.stats().live_objects, 1);
    }

    #[test]
    fn forwarding_is_idempotent() {
        let from = vec![str_obj("x")];
        let mut gc = Collector { from, to: Vec::new() };
        let mut field_a = HeapId(0);
        let mut field_b = HeapId(0);
        gc.forward_inplace(&mut field_a);
        gc.forward_inplace(&mut field_b);
        // Second forwarding of the same source object yields the same copy.
        assert_eq!(field_a, field_b);
        assert_eq!(gc.to.len(), 1);
        let prior = field_a;
        gc.forward_inplace(&mut field_a);
        assert_eq!(field_a, prior);
    }

    #[test]
    fn cyclic_references_survive_collection() {
        let mut heap = Heap::new();
        let arr = heap.alloc(HeapData::Array(vec![Value::Unspecified]));
        // Tie the knot: the array's only element references the array.
        let HeapData::Array(values) = heap.get_mut(arr) else {
            unreachable!();
        };
        values[0] = Value::Ref(arr);

        let mut root = arr;
        heap.collect(RootSet {
            ids: vec![&mut root],
            ..RootSet::default()
        });
        let HeapData::Array(values) = heap.get(root) else {
            panic!("root should still be an array");
        };
        assert_eq!(values[0], Value::Ref(root));
        assert_eq!(heap.stats().live_objects, 1);
    }

    #[test]
    fn repeated_collections_are_stable() {
        let mut heap = Heap::new();
        let s = heap.alloc(str_obj("stable"));
        let arr = heap.alloc(HeapData::Array(vec![Value::Ref(s)]));
        let mut root = arr;
        for _ in 0..3 {
            heap.collect(RootSet {
                ids: vec![&mut root],
                ..RootSet::default()
            });
            assert_eq!(heap.stats().live_objects, 2);
        }
        assert_eq!(heap.collections(), 3);
    }
}
