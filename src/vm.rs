//! Stack-based bytecode interpreter.
//!
//! One `CallFrame` per active call, a flat `Vec<Value>` operand/locals
//! stack shared across frames (each frame's locals are a window into it
//! starting at `stack_base`), and a sorted `open_upvalues` list so two
//! closures capturing the same still-live local see the same cell.

use std::collections::HashMap;
use std::rc::Rc;

use crate::bytecode::{Constant, Function, OpCode};
use crate::heap::{BoundMethodObject, ClassObject, ClosureObject, GcRef, Heap, HeapObject, InstanceObject, NativeFn, UpvalueObject};
use crate::value::Value;

struct CallFrame {
    closure: GcRef,
    ip: usize,
    stack_base: usize,
}

pub struct Vm {
    heap: Heap,
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    globals: HashMap<String, Value>,
    open_upvalues: Vec<GcRef>,
}

pub type RuntimeResult<T> = Result<T, String>;

impl Vm {
    pub fn new() -> Self {
        Vm { heap: Heap::new(), stack: Vec::new(), frames: Vec::new(), globals: HashMap::new(), open_upvalues: Vec::new() }
    }

    pub fn register_native(&mut self, name: &str, f: NativeFn) {
        let r = self.heap.alloc(HeapObject::Native(f));
        self.globals.insert(name.to_string(), Value::Object(r));
    }

    /// Exposes the heap for display formatting (`vm::display_value`) after
    /// `interpret` returns a value a caller wants to render, e.g. the REPL.
    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    /// Runs the top-level script function to completion, returning the
    /// value it implicitly returns: `null` for an empty script, the value
    /// of a trailing expression statement if there is one, `undefined`
    /// otherwise (see `repl.rs` for how a caller renders this).
    pub fn interpret(&mut self, script: Function) -> RuntimeResult<Value> {
        let closure = self.heap.alloc(HeapObject::Closure(ClosureObject { function: Rc::new(script), upvalues: Vec::new() }));
        let base = self.stack.len();
        self.stack.push(Value::Object(closure));
        self.frames.push(CallFrame { closure, ip: 0, stack_base: base });
        self.run()
    }

    fn current_function(&self) -> Rc<Function> {
        let frame = self.frames.last().unwrap();
        match self.heap.get(frame.closure) {
            HeapObject::Closure(c) => c.function.clone(),
            _ => unreachable!("call frame closure slot holds a non-closure"),
        }
    }

    fn read_byte(&mut self) -> u8 {
        let frame = self.frames.last_mut().unwrap();
        let func = match self.heap.get(frame.closure) {
            HeapObject::Closure(c) => c.function.clone(),
            _ => unreachable!(),
        };
        let byte = func.code[frame.ip];
        frame.ip += 1;
        byte
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_byte();
        let lo = self.read_byte();
        u16::from_be_bytes([hi, lo])
    }

    fn read_constant(&mut self) -> Constant {
        let idx = self.read_u16() as usize;
        self.current_function().constants[idx].clone()
    }

    fn push(&mut self, v: Value) {
        self.stack.push(v);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("operand stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    fn intern_string(&mut self, s: String) -> GcRef {
        self.heap.alloc(HeapObject::String(s))
    }

    fn display_string(&self, v: Value) -> String {
        display_value(v, &self.heap)
    }

    fn strings_equal(&self, a: GcRef, b: GcRef) -> bool {
        matches!((self.heap.get(a), self.heap.get(b)), (HeapObject::String(x), HeapObject::String(y)) if x == y)
    }

    fn values_equal(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Object(x), Value::Object(y)) => {
                x == y || matches!((self.heap.get(x), self.heap.get(y)), (HeapObject::String(_), HeapObject::String(_))) && self.strings_equal(x, y)
            }
            _ => false,
        }
    }

    fn maybe_collect(&mut self) {
        if !self.heap.should_collect() {
            return;
        }
        let mut roots: Vec<GcRef> = Vec::new();
        roots.extend(self.open_upvalues.iter().copied());
        roots.extend(self.frames.iter().map(|f| f.closure));
        for v in &self.stack {
            if let Value::Object(r) = v {
                roots.push(*r);
            }
        }
        for v in self.globals.values() {
            if let Value::Object(r) = v {
                roots.push(*r);
            }
        }
        self.heap.collect_garbage(&roots);
    }

    fn find_or_open_upvalue(&mut self, stack_slot: usize) -> GcRef {
        for &r in &self.open_upvalues {
            if let HeapObject::Upvalue(UpvalueObject::Open(slot)) = self.heap.get(r) {
                if *slot == stack_slot {
                    return r;
                }
            }
        }
        let r = self.heap.alloc(HeapObject::Upvalue(UpvalueObject::Open(stack_slot)));
        self.open_upvalues.push(r);
        r
    }

    fn close_upvalues_from(&mut self, from_slot: usize) {
        let mut i = 0;
        while i < self.open_upvalues.len() {
            let r = self.open_upvalues[i];
            let slot = match self.heap.get(r) {
                HeapObject::Upvalue(UpvalueObject::Open(slot)) => Some(*slot),
                _ => None,
            };
            match slot {
                Some(slot) if slot >= from_slot => {
                    let value = self.stack[slot];
                    *self.heap.get_mut(r) = HeapObject::Upvalue(UpvalueObject::Closed(value));
                    self.open_upvalues.remove(i);
                }
                _ => i += 1,
            }
        }
    }

    fn run(&mut self) -> RuntimeResult<Value> {
        loop {
            self.maybe_collect();
            let op = match OpCode::from_byte(self.read_byte()) {
                Some(op) => op,
                None => return Err("invalid bytecode".to_string()),
            };
            match op {
                OpCode::Constant => {
                    let c = self.read_constant();
                    let v = self.constant_to_value(c);
                    self.push(v);
                }
                OpCode::Null => self.push(Value::Null),
                OpCode::Undefined => self.push(Value::Undefined),
                OpCode::True => self.push(Value::Boolean(true)),
                OpCode::False => self.push(Value::Boolean(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::Dup => {
                    self.push(self.peek(0));
                }
                OpCode::GetLocal => {
                    let slot = self.read_u16() as usize;
                    let base = self.frames.last().unwrap().stack_base;
                    self.push(self.stack[base + slot]);
                }
                OpCode::SetLocal => {
                    let slot = self.read_u16() as usize;
                    let base = self.frames.last().unwrap().stack_base;
                    self.stack[base + slot] = self.peek(0);
                }
                OpCode::GetGlobal => {
                    let name = self.read_global_name();
                    match self.globals.get(&name) {
                        Some(v) => self.push(*v),
                        None => return Err(format!("Undefined variable '{}'", name)),
                    }
                }
                OpCode::SetGlobal => {
                    let name = self.read_global_name();
                    if !self.globals.contains_key(&name) {
                        return Err(format!("Undefined variable '{}'", name));
                    }
                    self.globals.insert(name, self.peek(0));
                }
                OpCode::DefineGlobal => {
                    let name = self.read_global_name();
                    let v = self.pop();
                    self.globals.insert(name, v);
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_u16() as usize;
                    let r = self.upvalue_ref(slot);
                    let v = match self.heap.get(r) {
                        HeapObject::Upvalue(UpvalueObject::Open(s)) => self.stack[*s],
                        HeapObject::Upvalue(UpvalueObject::Closed(v)) => *v,
                        _ => unreachable!(),
                    };
                    self.push(v);
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_u16() as usize;
                    let r = self.upvalue_ref(slot);
                    let v = self.peek(0);
                    let stack_slot = match self.heap.get(r) {
                        HeapObject::Upvalue(UpvalueObject::Open(s)) => Some(*s),
                        _ => None,
                    };
                    match stack_slot {
                        Some(s) => self.stack[s] = v,
                        None => *self.heap.get_mut(r) = HeapObject::Upvalue(UpvalueObject::Closed(v)),
                    }
                }
                OpCode::GetField => {
                    let name = self.read_global_name();
                    let obj = self.pop();
                    let v = self.get_field(obj, &name)?;
                    self.push(v);
                }
                OpCode::SetField => {
                    let name = self.read_global_name();
                    let obj = self.pop();
                    let v = self.peek(0);
                    self.set_field(obj, &name, v)?;
                }
                OpCode::GetIndex => {
                    let index = self.pop();
                    let obj = self.pop();
                    let v = self.get_index(obj, index)?;
                    self.push(v);
                }
                OpCode::SetIndex => {
                    let index = self.pop();
                    let obj = self.pop();
                    let v = self.peek(0);
                    self.set_index(obj, index, v)?;
                }
                OpCode::Add => self.binary_add()?,
                OpCode::Subtract => self.binary_numeric(|a, b| Ok(a - b))?,
                OpCode::Multiply => self.binary_numeric(|a, b| Ok(a * b))?,
                OpCode::Divide => self.binary_numeric(|a, b| {
                    if b == 0.0 {
                        Err("Division by zero".to_string())
                    } else {
                        Ok(a / b)
                    }
                })?,
                OpCode::Modulo => self.binary_numeric(|a, b| {
                    if b == 0.0 {
                        Err("Modulo by zero".to_string())
                    } else {
                        Ok(a % b)
                    }
                })?,
                OpCode::BitAnd => self.binary_numeric(|a, b| Ok(((a as i64) & (b as i64)) as f64))?,
                OpCode::BitOr => self.binary_numeric(|a, b| Ok(((a as i64) | (b as i64)) as f64))?,
                OpCode::BitXor => self.binary_numeric(|a, b| Ok(((a as i64) ^ (b as i64)) as f64))?,
                OpCode::Shl => self.binary_numeric(|a, b| Ok((((a as i64) << ((b as i64) & 31)) as f64)))?,
                OpCode::Shr => self.binary_numeric(|a, b| Ok((((a as i64) >> ((b as i64) & 31)) as f64)))?,
                OpCode::UShr => self.binary_numeric(|a, b| Ok((((a as u32) >> ((b as i64) & 31)) as f64)))?,
                OpCode::Negate => {
                    let v = self.pop();
                    match v {
                        Value::Number(n) => self.push(Value::Number(-n)),
                        _ => return Err("Operand must be a number".to_string()),
                    }
                }
                OpCode::Not => {
                    let v = self.pop();
                    self.push(Value::Boolean(!v.is_truthy()));
                }
                OpCode::BitNot => {
                    let v = self.pop();
                    match v {
                        Value::Number(n) => self.push(Value::Number(!(n as i64) as f64)),
                        _ => return Err("Operand must be a number".to_string()),
                    }
                }
                OpCode::TypeOf => {
                    let v = self.pop();
                    let name = v.type_name(&self.heap);
                    let r = self.intern_string(name.to_string());
                    self.push(Value::Object(r));
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Boolean(self.values_equal(a, b)));
                }
                OpCode::NotEqual => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Boolean(!self.values_equal(a, b)));
                }
                OpCode::StrictEqual => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Boolean(self.strict_equal(a, b)));
                }
                OpCode::StrictNotEqual => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Boolean(!self.strict_equal(a, b)));
                }
                OpCode::Greater => self.binary_compare(|a, b| a > b)?,
                OpCode::GreaterEqual => self.binary_compare(|a, b| a >= b)?,
                OpCode::Less => self.binary_compare(|a, b| a < b)?,
                OpCode::LessEqual => self.binary_compare(|a, b| a <= b)?,
                OpCode::InstanceOf => {
                    let class_val = self.pop();
                    let obj_val = self.pop();
                    self.push(Value::Boolean(self.instance_of(obj_val, class_val)));
                }
                OpCode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().unwrap().ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if !self.peek(0).is_truthy() {
                        self.frames.last_mut().unwrap().ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().unwrap().ip -= offset;
                }
                OpCode::Call => {
                    let arg_count = self.read_u16() as usize;
                    self.call_value(arg_count)?;
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.pop().unwrap();
                    self.close_upvalues_from(frame.stack_base);
                    self.stack.truncate(frame.stack_base);
                    if self.frames.is_empty() {
                        return Ok(result);
                    }
                    self.push(result);
                }
                OpCode::Closure => {
                    let c = self.read_constant();
                    let Constant::Function(function) = c else { return Err("expected function constant".to_string()) };
                    let mut upvalues = Vec::with_capacity(function.upvalues.len());
                    for desc in &function.upvalues {
                        let is_local = self.read_byte() != 0;
                        let index = self.read_u16() as usize;
                        if is_local {
                            let base = self.frames.last().unwrap().stack_base;
                            upvalues.push(self.find_or_open_upvalue(base + index));
                        } else {
                            upvalues.push(self.upvalue_ref(index));
                        }
                    }
                    let r = self.heap.alloc(HeapObject::Closure(ClosureObject { function, upvalues }));
                    self.push(Value::Object(r));
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues_from(top);
                    self.pop();
                }
                OpCode::NewArray => {
                    let count = self.read_u16() as usize;
                    let items = self.stack.split_off(self.stack.len() - count);
                    let r = self.heap.alloc(HeapObject::Array(items));
                    self.push(Value::Object(r));
                }
                OpCode::NewObject => {
                    let count = self.read_u16() as usize;
                    let mut map = HashMap::with_capacity(count);
                    for _ in 0..count {
                        let value = self.pop();
                        let key = self.pop();
                        let Value::Object(key_ref) = key else {
                            return Err("Object keys must be strings".to_string());
                        };
                        let HeapObject::String(name) = self.heap.get(key_ref) else {
                            return Err("Object keys must be strings".to_string());
                        };
                        map.insert(name.clone(), value);
                    }
                    let r = self.heap.alloc(HeapObject::PlainObject(map));
                    self.push(Value::Object(r));
                }
                OpCode::NewClass => {
                    let name = self.read_global_name();
                    let r = self.heap.alloc(HeapObject::Class(ClassObject { name, superclass: None, methods: HashMap::new() }));
                    self.push(Value::Object(r));
                }
                OpCode::Inherit => {
                    let superclass = self.pop();
                    let Value::Object(super_ref) = superclass else {
                        return Err("Superclass must be a class".to_string());
                    };
                    if !matches!(self.heap.get(super_ref), HeapObject::Class(_)) {
                        return Err("Superclass must be a class".to_string());
                    }
                    let class_val = self.peek(0);
                    if let Value::Object(class_ref) = class_val {
                        if let HeapObject::Class(c) = self.heap.get_mut(class_ref) {
                            c.superclass = Some(super_ref);
                        }
                    }
                }
                OpCode::Method => {
                    let name = self.read_global_name();
                    let method = self.pop();
                    let Value::Object(method_ref) = method else { return Err("expected closure for method".to_string()) };
                    let class_val = self.peek(0);
                    if let Value::Object(class_ref) = class_val {
                        if let HeapObject::Class(c) = self.heap.get_mut(class_ref) {
                            c.methods.insert(name, method_ref);
                        }
                    }
                }
                OpCode::Print => {
                    let v = self.pop();
                    println!("{}", self.display_string(v));
                    self.push(Value::Undefined);
                }
            }
        }
    }

    fn constant_to_value(&mut self, c: Constant) -> Value {
        match c {
            Constant::Number(n) => Value::Number(n),
            Constant::String(s) => Value::Object(self.intern_string(s)),
            Constant::Function(f) => {
                let r = self.heap.alloc(HeapObject::Closure(ClosureObject { function: f, upvalues: Vec::new() }));
                Value::Object(r)
            }
        }
    }

    fn read_global_name(&mut self) -> String {
        match self.read_constant() {
            Constant::String(s) => s,
            _ => String::new(),
        }
    }

    fn upvalue_ref(&self, index: usize) -> GcRef {
        let frame = self.frames.last().unwrap();
        match self.heap.get(frame.closure) {
            HeapObject::Closure(c) => c.upvalues[index],
            _ => unreachable!(),
        }
    }

    fn binary_add(&mut self) -> RuntimeResult<()> {
        let b = self.pop();
        let a = self.pop();
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => self.push(Value::Number(x + y)),
            (Value::Object(x), Value::Object(y))
                if matches!(self.heap.get(x), HeapObject::String(_)) && matches!(self.heap.get(y), HeapObject::String(_)) =>
            {
                let (sx, sy) = match (self.heap.get(x), self.heap.get(y)) {
                    (HeapObject::String(sx), HeapObject::String(sy)) => (sx.clone(), sy.clone()),
                    _ => unreachable!(),
                };
                let r = self.intern_string(sx + &sy);
                self.push(Value::Object(r));
            }
            _ => return Err("Operands must be two numbers or two strings".to_string()),
        }
        Ok(())
    }

    fn binary_numeric(&mut self, f: impl Fn(f64, f64) -> Result<f64, String>) -> RuntimeResult<()> {
        let b = self.pop();
        let a = self.pop();
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                self.push(Value::Number(f(x, y)?));
                Ok(())
            }
            _ => Err("Operands must be numbers".to_string()),
        }
    }

    fn binary_compare(&mut self, f: impl Fn(f64, f64) -> bool) -> RuntimeResult<()> {
        let b = self.pop();
        let a = self.pop();
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                self.push(Value::Boolean(f(x, y)));
                Ok(())
            }
            _ => Err("Operands must be numbers".to_string()),
        }
    }

    fn strict_equal(&self, a: Value, b: Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x == y,
            (Value::Boolean(x), Value::Boolean(y)) => x == y,
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Object(x), Value::Object(y)) => {
                if x == y {
                    return true;
                }
                matches!((self.heap.get(x), self.heap.get(y)), (HeapObject::String(_), HeapObject::String(_))) && self.strings_equal(x, y)
            }
            _ => false,
        }
    }

    fn instance_of(&self, obj: Value, class: Value) -> bool {
        let (Value::Object(obj_ref), Value::Object(class_ref)) = (obj, class) else { return false };
        let HeapObject::Instance(inst) = self.heap.get(obj_ref) else { return false };
        let mut current = Some(inst.class);
        while let Some(c) = current {
            if c == class_ref {
                return true;
            }
            current = match self.heap.get(c) {
                HeapObject::Class(info) => info.superclass,
                _ => None,
            };
        }
        false
    }

    fn get_field(&mut self, obj: Value, name: &str) -> RuntimeResult<Value> {
        let Value::Object(r) = obj else { return Err("Only instances have fields".to_string()) };
        match self.heap.get(r) {
            HeapObject::Instance(inst) => {
                if let Some(v) = inst.fields.get(name) {
                    return Ok(*v);
                }
                let class_ref = inst.class;
                if let Some(method) = self.find_method(class_ref, name) {
                    // Bind `this` to the instance so a later `Call` sees the
                    // receiver rather than the bare method closure.
                    let bound = self.heap.alloc(HeapObject::BoundMethod(BoundMethodObject { receiver: r, method }));
                    return Ok(Value::Object(bound));
                }
                Err(format!("Undefined property '{}'", name))
            }
            HeapObject::PlainObject(map) => map.get(name).copied().ok_or_else(|| format!("Undefined property '{}'", name)),
            _ => Err("Only instances have fields".to_string()),
        }
    }

    /// Superclass method lookup walks the chain at call time rather than
    /// copying the superclass's method table into every subclass.
    fn find_method(&self, class_ref: GcRef, name: &str) -> Option<GcRef> {
        let mut current = Some(class_ref);
        while let Some(c) = current {
            match self.heap.get(c) {
                HeapObject::Class(info) => {
                    if let Some(m) = info.methods.get(name) {
                        return Some(*m);
                    }
                    current = info.superclass;
                }
                _ => return None,
            }
        }
        None
    }

    fn set_field(&mut self, obj: Value, name: &str, value: Value) -> RuntimeResult<()> {
        let Value::Object(r) = obj else { return Err("Only instances have fields".to_string()) };
        match self.heap.get_mut(r) {
            HeapObject::Instance(inst) => {
                inst.fields.insert(name.to_string(), value);
                Ok(())
            }
            HeapObject::PlainObject(map) => {
                map.insert(name.to_string(), value);
                Ok(())
            }
            _ => Err("Only instances have fields".to_string()),
        }
    }

    fn get_index(&mut self, obj: Value, index: Value) -> RuntimeResult<Value> {
        let Value::Object(r) = obj else { return Err("Only arrays can be indexed".to_string()) };
        let Value::Number(n) = index else { return Err("Array index must be a number".to_string()) };
        match self.heap.get(r) {
            HeapObject::Array(items) => {
                let i = n as usize;
                items.get(i).copied().ok_or_else(|| "Array index out of bounds".to_string())
            }
            _ => Err("Only arrays can be indexed".to_string()),
        }
    }

    fn set_index(&mut self, obj: Value, index: Value, value: Value) -> RuntimeResult<()> {
        let Value::Object(r) = obj else { return Err("Only arrays can be indexed".to_string()) };
        let Value::Number(n) = index else { return Err("Array index must be a number".to_string()) };
        match self.heap.get_mut(r) {
            HeapObject::Array(items) => {
                let i = n as usize;
                if i >= items.len() {
                    return Err("Array index out of bounds".to_string());
                }
                items[i] = value;
                Ok(())
            }
            _ => Err("Only arrays can be indexed".to_string()),
        }
    }

    fn call_value(&mut self, arg_count: usize) -> RuntimeResult<()> {
        let callee = self.peek(arg_count);
        match callee {
            Value::Object(r) => match self.heap.get(r).clone() {
                HeapObject::Closure(c) => self.call_closure(r, c.function.arity, arg_count),
                HeapObject::Native(f) => {
                    let args_start = self.stack.len() - arg_count;
                    let args: Vec<Value> = self.stack[args_start..].to_vec();
                    self.stack.truncate(args_start - 1);
                    match f(&args, &self.heap) {
                        Ok(v) => {
                            self.push(v);
                            Ok(())
                        }
                        Err(e) => Err(e),
                    }
                }
                HeapObject::Class(_) => self.instantiate(r, arg_count),
                HeapObject::BoundMethod(b) => self.call_bound_method(b, arg_count),
                _ => Err("Can only call functions, classes, and objects".to_string()),
            },
            _ => Err("Can only call functions, classes, and objects".to_string()),
        }
    }

    /// Replaces the callee slot (currently the `BoundMethod`) with its
    /// receiver, then calls the underlying closure exactly as `call_closure`
    /// would — so slot 0 inside the method body is `this`, not the method
    /// object itself.
    fn call_bound_method(&mut self, bound: BoundMethodObject, arg_count: usize) -> RuntimeResult<()> {
        let arity = match self.heap.get(bound.method) {
            HeapObject::Closure(c) => c.function.arity,
            _ => return Err("Can only call functions, classes, and objects".to_string()),
        };
        let callee_slot = self.stack.len() - arg_count - 1;
        self.stack[callee_slot] = Value::Object(bound.receiver);
        self.call_closure(bound.method, arity, arg_count)
    }

    fn call_closure(&mut self, closure_ref: GcRef, arity: u8, arg_count: usize) -> RuntimeResult<()> {
        if arg_count != arity as usize {
            return Err(format!("Expected {} arguments but got {}", arity, arg_count));
        }
        let stack_base = self.stack.len() - arg_count - 1;
        self.frames.push(CallFrame { closure: closure_ref, ip: 0, stack_base });
        Ok(())
    }

    fn instantiate(&mut self, class_ref: GcRef, arg_count: usize) -> RuntimeResult<()> {
        let instance = self.heap.alloc(HeapObject::Instance(InstanceObject { class: class_ref, fields: HashMap::new() }));
        let constructor = self.find_method(class_ref, "");
        let callee_slot = self.stack.len() - arg_count - 1;
        self.stack[callee_slot] = Value::Object(instance);
        match constructor {
            Some(ctor_ref) => {
                let arity = match self.heap.get(ctor_ref) {
                    HeapObject::Closure(c) => c.function.arity,
                    _ => return Err("Undefined method '' in superclass".to_string()),
                };
                self.call_closure(ctor_ref, arity, arg_count)?;
                Ok(())
            }
            None => {
                if arg_count != 0 {
                    return Err(format!("Expected 0 arguments but got {}", arg_count));
                }
                self.stack.truncate(callee_slot + 1);
                Ok(())
            }
        }
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a value the way `print` and the `Print` opcode show it — plain
/// strings unquoted, arrays/objects bracketed, functions/classes named.
pub fn display_value(v: Value, heap: &Heap) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Undefined => "undefined".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Number(n) => format!("{}", n),
        Value::Object(r) => match heap.get(r) {
            HeapObject::String(s) => s.clone(),
            HeapObject::Array(items) => {
                format!("[{}]", items.iter().map(|v| display_value(*v, heap)).collect::<Vec<_>>().join(", "))
            }
            HeapObject::PlainObject(_) => "[object Object]".to_string(),
            HeapObject::Closure(c) => format!("[Function: {}]", c.function.name),
            HeapObject::Native(_) => "[Function: native]".to_string(),
            HeapObject::Class(c) => format!("[class {}]", c.name),
            HeapObject::Instance(i) => {
                let class_name = match heap.get(i.class) {
                    HeapObject::Class(c) => c.name.clone(),
                    _ => "Object".to_string(),
                };
                format!("[object {}]", class_name)
            }
            HeapObject::Upvalue(_) => "[upvalue]".to_string(),
            HeapObject::BoundMethod(b) => match heap.get(b.method) {
                HeapObject::Closure(c) => format!("[Function: {}]", c.function.name),
                _ => "[Function: bound]".to_string(),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::intern::Interner;
    use crate::lexer::Lexer;
    use crate::parser::parse;
    use crate::compiler::compile;

    fn run_source(src: &str) -> RuntimeResult<Value> {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let tokens = Lexer::tokenize(src, &mut interner);
        let (program, _) = parse(src, &tokens, &arena);
        let (script, _) = compile(&program, &interner);
        Vm::new().interpret(script)
    }

    #[test]
    fn evaluates_arithmetic() {
        let result = run_source("1 + 2 * 3;").unwrap();
        assert_eq!(result, Value::Number(7.0));
    }

    #[test]
    fn returns_script_level_return_value() {
        let result = run_source("return 1 + 2;").unwrap();
        assert_eq!(result, Value::Number(3.0));
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let err = run_source("return 1 / 0;").unwrap_err();
        assert_eq!(err, "Division by zero");
    }

    #[test]
    fn string_concatenation_with_plus() {
        let result = run_source(r#"return "a" + "b";"#).unwrap();
        match result {
            Value::Object(_) => {}
            other => panic!("expected string object, got {:?}", other),
        }
    }

    #[test]
    fn object_literal_builds_a_plain_object() {
        let result = run_source(r#"let o = { x: 1, y: "two" }; return o.x;"#).unwrap();
        assert_eq!(result, Value::Number(1.0));
    }

    #[test]
    fn number_plus_string_is_a_runtime_error() {
        let err = run_source(r#"return 1 + "a";"#).unwrap_err();
        assert_eq!(err, "Operands must be two numbers or two strings");
    }

    #[test]
    fn closures_capture_enclosing_locals() {
        let result = run_source(
            "function makeCounter() { let n = 0; function inc() { n = n + 1; return n; } return inc; } let c = makeCounter(); c(); return c();",
        )
        .unwrap();
        assert_eq!(result, Value::Number(2.0));
    }

    #[test]
    fn while_loop_accumulates() {
        let result = run_source("let i = 0; let sum = 0; while (i < 5) { sum = sum + i; i = i + 1; } return sum;").unwrap();
        assert_eq!(result, Value::Number(10.0));
    }

    #[test]
    fn class_constructor_and_method_dispatch() {
        let result = run_source(
            "class Point { x: number; constructor(x: number) { this.x = x; } getX(): number { return this.x; } } let p = Point(5); return p.getX();",
        )
        .unwrap();
        assert_eq!(result, Value::Number(5.0));
    }

    #[test]
    fn method_call_binds_this_to_the_receiving_instance() {
        let result = run_source(
            "class Box { v: number; constructor(v: number) { this.v = v; } get(): number { return this.v; } } \
             let a = Box(1); let b = Box(2); return a.get() + b.get();",
        )
        .unwrap();
        assert_eq!(result, Value::Number(3.0));
    }

    #[test]
    fn inherited_method_resolves_through_superclass_chain() {
        let result = run_source(
            "class Animal { speak(): string { return \"...\"; } } class Dog extends Animal {} let d = Dog(); return d.speak();",
        )
        .unwrap();
        match result {
            Value::Object(_) => {}
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn array_index_out_of_bounds_is_a_runtime_error() {
        let err = run_source("let a = [1, 2]; return a[5];").unwrap_err();
        assert_eq!(err, "Array index out of bounds");
    }
}
