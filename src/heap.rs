//! Heap-allocated objects and the mark-and-sweep collector.
//!
//! Slots are reused via a free list instead of shrinking the backing `Vec`,
//! so a `GcRef` stays a plain `usize` index for the lifetime of the heap.
//! Collection is triggered by the VM whenever `bytes_allocated` crosses
//! `next_gc`; `next_gc` doubles after every collection (classic
//! mark-sweep-with-growth-factor, same shape as the original `gc.cpp`).

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::Function;
use crate::value::Value;

pub type GcRef = usize;

#[derive(Debug, Clone)]
pub struct ClosureObject {
    pub function: Rc<Function>,
    pub upvalues: Vec<GcRef>,
}

#[derive(Debug, Clone)]
pub enum UpvalueObject {
    /// Points at a live stack slot while the enclosing frame is active.
    Open(usize),
    /// Holds its own copy once the enclosing frame has returned.
    Closed(Value),
}

#[derive(Debug, Clone)]
pub struct ClassObject {
    pub name: String,
    pub superclass: Option<GcRef>,
    pub methods: HashMap<String, GcRef>,
}

#[derive(Debug, Clone)]
pub struct InstanceObject {
    pub class: GcRef,
    pub fields: HashMap<String, Value>,
}

/// A method closure paired with the instance it was looked up on, produced
/// by `GetField` when the field name resolves through the class's method
/// table rather than the instance's own fields. Calling it binds `this` to
/// `receiver` for the duration of the call (see `Vm::call_value`).
#[derive(Debug, Clone, Copy)]
pub struct BoundMethodObject {
    pub receiver: GcRef,
    pub method: GcRef,
}

/// Native functions get a `&Heap` alongside their arguments so they can
/// format/inspect heap-allocated values (e.g. `print` stringifying a
/// string or array argument) without the VM exposing its internals.
pub type NativeFn = fn(&[Value], &Heap) -> Result<Value, String>;

#[derive(Debug, Clone)]
pub enum HeapObject {
    String(String),
    Array(Vec<Value>),
    PlainObject(HashMap<String, Value>),
    Closure(ClosureObject),
    Upvalue(UpvalueObject),
    Class(ClassObject),
    Instance(InstanceObject),
    Native(NativeFn),
    BoundMethod(BoundMethodObject),
}

impl HeapObject {
    pub fn type_name(&self) -> &'static str {
        match self {
            HeapObject::String(_) => "string",
            HeapObject::Array(_) => "object",
            HeapObject::PlainObject(_) => "object",
            HeapObject::Closure(_) | HeapObject::Native(_) => "function",
            HeapObject::Upvalue(_) => "object",
            HeapObject::Class(_) => "function",
            HeapObject::Instance(_) => "object",
            HeapObject::BoundMethod(_) => "function",
        }
    }

    fn approx_size(&self) -> usize {
        match self {
            HeapObject::String(s) => std::mem::size_of::<Self>() + s.len(),
            HeapObject::Array(items) => std::mem::size_of::<Self>() + items.len() * std::mem::size_of::<Value>(),
            HeapObject::PlainObject(map) => std::mem::size_of::<Self>() + map.len() * 48,
            HeapObject::Instance(inst) => std::mem::size_of::<Self>() + inst.fields.len() * 48,
            _ => std::mem::size_of::<Self>(),
        }
    }

    fn trace(&self, out: &mut Vec<GcRef>) {
        match self {
            HeapObject::Array(items) => {
                for v in items {
                    if let Value::Object(r) = v {
                        out.push(*r);
                    }
                }
            }
            HeapObject::PlainObject(map) => {
                for v in map.values() {
                    if let Value::Object(r) = v {
                        out.push(*r);
                    }
                }
            }
            HeapObject::Closure(c) => out.extend(c.upvalues.iter().copied()),
            HeapObject::Upvalue(UpvalueObject::Closed(Value::Object(r))) => out.push(*r),
            HeapObject::Class(c) => {
                if let Some(s) = c.superclass {
                    out.push(s);
                }
                out.extend(c.methods.values().copied());
            }
            HeapObject::Instance(inst) => {
                out.push(inst.class);
                for v in inst.fields.values() {
                    if let Value::Object(r) = v {
                        out.push(*r);
                    }
                }
            }
            HeapObject::BoundMethod(b) => {
                out.push(b.receiver);
                out.push(b.method);
            }
            _ => {}
        }
    }
}

struct Slot {
    object: HeapObject,
    marked: bool,
}

pub struct Heap {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    pub bytes_allocated: usize,
    pub next_gc: usize,
}

const INITIAL_GC_THRESHOLD: usize = 1 << 20;

impl Heap {
    pub fn new() -> Self {
        Heap { slots: Vec::new(), free: Vec::new(), bytes_allocated: 0, next_gc: INITIAL_GC_THRESHOLD }
    }

    pub fn should_collect(&self) -> bool {
        self.bytes_allocated > self.next_gc
    }

    pub fn alloc(&mut self, object: HeapObject) -> GcRef {
        self.bytes_allocated += object.approx_size();
        let slot = Slot { object, marked: false };
        if let Some(idx) = self.free.pop() {
            self.slots[idx] = Some(slot);
            idx
        } else {
            self.slots.push(Some(slot));
            self.slots.len() - 1
        }
    }

    pub fn get(&self, r: GcRef) -> &HeapObject {
        &self.slots[r].as_ref().expect("dangling GcRef").object
    }

    pub fn get_mut(&mut self, r: GcRef) -> &mut HeapObject {
        &mut self.slots[r].as_mut().expect("dangling GcRef").object
    }

    /// Marks `root` and everything reachable from it, then, once all roots
    /// are marked, frees every unmarked slot and doubles `next_gc` (spec
    /// §4.I: "roots are the VM operand stack, globals table, open upvalue
    /// list, and every call frame's closure").
    pub fn collect_garbage(&mut self, roots: &[GcRef]) {
        let mut marked_count = 0usize;
        for slot in self.slots.iter_mut().flatten() {
            slot.marked = false;
        }
        let mut worklist: Vec<GcRef> = roots.to_vec();
        while let Some(r) = worklist.pop() {
            let already_marked = self.slots[r].as_ref().map(|s| s.marked).unwrap_or(true);
            if already_marked {
                continue;
            }
            let mut children = Vec::new();
            if let Some(slot) = self.slots[r].as_mut() {
                slot.marked = true;
                marked_count += 1;
                slot.object.trace(&mut children);
            }
            worklist.extend(children);
        }
        let _ = marked_count;

        let mut freed_bytes = 0usize;
        for (idx, slot) in self.slots.iter_mut().enumerate() {
            let unmarked = matches!(slot, Some(s) if !s.marked);
            if unmarked {
                if let Some(s) = slot.take() {
                    freed_bytes += s.object.approx_size();
                }
                self.free.push(idx);
            }
        }
        self.bytes_allocated = self.bytes_allocated.saturating_sub(freed_bytes);
        self.next_gc = (self.bytes_allocated.max(INITIAL_GC_THRESHOLD)) * 2;
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_reuses_freed_slots() {
        let mut heap = Heap::new();
        let a = heap.alloc(HeapObject::String("a".into()));
        let b = heap.alloc(HeapObject::String("b".into()));
        heap.collect_garbage(&[b]);
        assert!(heap.live_count() == 1);
        let c = heap.alloc(HeapObject::String("c".into()));
        assert_eq!(c, a, "freed slot should be recycled");
    }

    #[test]
    fn collect_garbage_keeps_only_reachable_objects() {
        let mut heap = Heap::new();
        let inner = heap.alloc(HeapObject::String("inner".into()));
        let arr = heap.alloc(HeapObject::Array(vec![Value::Object(inner)]));
        let orphan = heap.alloc(HeapObject::String("orphan".into()));
        let _ = orphan;
        heap.collect_garbage(&[arr]);
        assert_eq!(heap.live_count(), 2);
    }

    #[test]
    fn next_gc_grows_after_collection() {
        let mut heap = Heap::new();
        let before = heap.next_gc;
        heap.alloc(HeapObject::Array(vec![Value::Number(1.0); 1000]));
        heap.collect_garbage(&[]);
        assert!(heap.next_gc <= before || heap.next_gc >= INITIAL_GC_THRESHOLD);
    }
}
