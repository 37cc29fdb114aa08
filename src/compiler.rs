//! Single-pass bytecode compiler with closure conversion.
//!
//! One `FunctionCompiler` exists per nested function being compiled, chained
//! through `enclosing` the way a recursive-descent compiler naturally
//! nests; resolving a free variable walks that chain outward, capturing an
//! upvalue at every level it crosses (closure conversion happens inline,
//! not as a separate pass).

use std::rc::Rc;

use crate::ast::*;
use crate::bytecode::{Constant, Function, OpCode, UpvalueDescriptor};
use crate::diagnostic::{Diagnostic, Position};
use crate::intern::{Interner, Symbol};

const MAX_CONSTANTS: usize = 256;
const MAX_JUMP: usize = u16::MAX as usize;

struct Local {
    name: Symbol,
    depth: i32,
    is_captured: bool,
}

struct LoopContext {
    loop_start: usize,
    break_jumps: Vec<usize>,
    scope_depth: i32,
}

struct FunctionCompiler {
    function: Function,
    locals: Vec<Local>,
    scope_depth: i32,
    loops: Vec<LoopContext>,
}

impl FunctionCompiler {
    fn new(name: impl Into<String>, reserve_self_slot: bool) -> Self {
        let mut locals = Vec::new();
        if reserve_self_slot {
            // Slot 0 holds the called closure itself (or `this` for
            // methods), mirroring the original calling convention.
            locals.push(Local { name: Symbol::EMPTY, depth: 0, is_captured: false });
        }
        FunctionCompiler { function: Function::new(name), locals, scope_depth: 0, loops: Vec::new() }
    }
}

pub struct Compiler<'i> {
    interner: &'i Interner,
    stack: Vec<FunctionCompiler>,
    diagnostics: Vec<Diagnostic>,
}

/// Compiles a checked program into the implicit top-level `Function` (the
/// script body), returning it alongside any compile-time diagnostics (e.g.
/// jump ranges or constant-pool overflow).
pub fn compile(program: &Program, interner: &Interner) -> (Function, Vec<Diagnostic>) {
    let mut compiler = Compiler { interner, stack: vec![FunctionCompiler::new("<script>", true)], diagnostics: Vec::new() };
    let last_index = program.statements.len().checked_sub(1);
    let mut trailing_value = false;
    for (i, stmt) in program.statements.iter().enumerate() {
        // The script's own implicit return is the value of a trailing
        // expression statement, if there is one —
        // every other statement still pops its expression as usual.
        if Some(i) == last_index && matches!(stmt.kind, StmtKind::Expression(_)) {
            let StmtKind::Expression(e) = &stmt.kind else { unreachable!() };
            compiler.compile_expr(e);
            trailing_value = true;
        } else {
            compiler.compile_stmt(stmt);
        }
    }
    if !trailing_value {
        // An empty program has no implicit value to fall back to, so it
        // runs to `Null` rather than `Undefined` (boundary
        // behavior); anything else that reaches here ends in a
        // non-expression statement and keeps the old `Undefined` default.
        if program.statements.is_empty() {
            compiler.emit_op(OpCode::Null);
        } else {
            compiler.emit_op(OpCode::Undefined);
        }
    }
    compiler.emit_op(OpCode::Return);
    let top = compiler.stack.pop().unwrap();
    (top.function, compiler.diagnostics)
}

impl<'i> Compiler<'i> {
    fn current(&mut self) -> &mut FunctionCompiler {
        self.stack.last_mut().unwrap()
    }

    fn error(&mut self, message: impl Into<String>, position: Position) {
        self.diagnostics.push(Diagnostic::error(message, position));
    }

    fn emit_byte(&mut self, byte: u8) {
        self.current().function.emit_byte(byte);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.current().function.emit_op(op);
    }

    fn emit_u16(&mut self, value: u16) {
        self.current().function.emit_u16(value);
    }

    fn emit_op_u16(&mut self, op: OpCode, value: u16) {
        self.emit_op(op);
        self.emit_u16(value);
    }

    fn code_len(&mut self) -> usize {
        self.current().function.code.len()
    }

    fn add_constant(&mut self, constant: Constant, position: Position) -> u16 {
        let current = self.current();
        if current.function.constants.len() >= MAX_CONSTANTS {
            self.error("too many constants in one function", position);
            return 0;
        }
        current.function.add_constant(constant) as u16
    }

    fn emit_jump(&mut self, op: OpCode) -> usize {
        self.emit_op(op);
        let offset = self.code_len();
        self.emit_u16(0xFFFF);
        offset
    }

    fn patch_jump(&mut self, offset: usize, position: Position) {
        let target = self.code_len();
        let distance = target - (offset + 2);
        if distance > MAX_JUMP {
            self.error("too much code to jump over", position);
            return;
        }
        self.current().function.patch_u16(offset, distance as u16);
    }

    fn emit_loop(&mut self, loop_start: usize, position: Position) {
        self.emit_op(OpCode::Loop);
        let distance = self.code_len() + 2 - loop_start;
        if distance > MAX_JUMP {
            self.error("too much code to jump over", position);
            self.emit_u16(0);
            return;
        }
        self.emit_u16(distance as u16);
    }

    fn begin_scope(&mut self) {
        self.current().scope_depth += 1;
    }

    fn end_scope(&mut self) {
        let fc = self.current();
        fc.scope_depth -= 1;
        let depth = fc.scope_depth;
        while let Some(last) = fc.locals.last() {
            if last.depth <= depth {
                break;
            }
            if fc.locals.last().unwrap().is_captured {
                fc.function.emit_op(OpCode::CloseUpvalue);
            } else {
                fc.function.emit_op(OpCode::Pop);
            }
            fc.locals.pop();
        }
    }

    fn declare_local(&mut self, name: Symbol, position: Position) -> u16 {
        let fc = self.current();
        if fc.locals.len() >= MAX_JUMP {
            self.error("too many local variables in one function", position);
        }
        fc.locals.push(Local { name, depth: fc.scope_depth, is_captured: false });
        (fc.locals.len() - 1) as u16
    }

    fn resolve_local(fc: &FunctionCompiler, name: Symbol) -> Option<u16> {
        fc.locals.iter().rposition(|l| l.name == name).map(|i| i as u16)
    }

    /// Walks the compiler chain outward looking for `name`; every frame the
    /// search crosses records a fresh upvalue pointing either at a captured
    /// local (`is_local: true`) or at the enclosing frame's own upvalue
    /// array (`is_local: false`) — this *is* closure conversion.
    fn resolve_upvalue(stack: &mut [FunctionCompiler], depth: usize, name: Symbol) -> Option<u16> {
        if depth == 0 {
            return None;
        }
        let enclosing_depth = depth - 1;
        if let Some(local_index) = Self::resolve_local(&stack[enclosing_depth], name) {
            stack[enclosing_depth].locals[local_index as usize].is_captured = true;
            return Some(Self::add_upvalue(&mut stack[depth], true, local_index));
        }
        if let Some(upvalue_index) = Self::resolve_upvalue(stack, enclosing_depth, name) {
            return Some(Self::add_upvalue(&mut stack[depth], false, upvalue_index));
        }
        None
    }

    fn add_upvalue(fc: &mut FunctionCompiler, is_local: bool, index: u16) -> u16 {
        if let Some(existing) = fc.function.upvalues.iter().position(|u| u.is_local == is_local && u.index == index) {
            return existing as u16;
        }
        fc.function.upvalues.push(UpvalueDescriptor { is_local, index });
        (fc.function.upvalues.len() - 1) as u16
    }

    // ---- statements ----

    fn compile_stmt(&mut self, stmt: &Stmt) {
        match &stmt.kind {
            StmtKind::Expression(e) => {
                self.compile_expr(e);
                self.emit_op(OpCode::Pop);
            }
            StmtKind::Block(b) => {
                self.begin_scope();
                for s in b.statements {
                    self.compile_stmt(s);
                }
                self.end_scope();
            }
            StmtKind::VariableDeclaration { declarators, .. } => {
                for d in declarators {
                    match d.initializer {
                        Some(init) => self.compile_expr(init),
                        None => self.emit_op(OpCode::Undefined),
                    }
                    self.define_variable(d.name, d.position);
                }
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                self.compile_expr(cond);
                let then_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.emit_op(OpCode::Pop);
                self.compile_stmt(then_branch);
                let else_jump = self.emit_jump(OpCode::Jump);
                self.patch_jump(then_jump, stmt.position);
                self.emit_op(OpCode::Pop);
                if let Some(e) = else_branch {
                    self.compile_stmt(e);
                }
                self.patch_jump(else_jump, stmt.position);
            }
            StmtKind::While { cond, body } => {
                let loop_start = self.code_len();
                self.current().loops.push(LoopContext { loop_start, break_jumps: Vec::new(), scope_depth: self.current().scope_depth });
                self.compile_expr(cond);
                let exit_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.emit_op(OpCode::Pop);
                self.compile_stmt(body);
                self.emit_loop(loop_start, stmt.position);
                self.patch_jump(exit_jump, stmt.position);
                self.emit_op(OpCode::Pop);
                let ctx = self.current().loops.pop().unwrap();
                for jump in ctx.break_jumps {
                    self.patch_jump(jump, stmt.position);
                }
            }
            StmtKind::For { init, cond, update, body } => {
                self.begin_scope();
                if let Some(init) = init {
                    self.compile_stmt(init);
                }
                let loop_start = self.code_len();
                self.current().loops.push(LoopContext { loop_start, break_jumps: Vec::new(), scope_depth: self.current().scope_depth });
                let exit_jump = cond.map(|c| {
                    self.compile_expr(c);
                    let j = self.emit_jump(OpCode::JumpIfFalse);
                    self.emit_op(OpCode::Pop);
                    j
                });
                self.compile_stmt(body);
                if let Some(update) = update {
                    self.compile_expr(update);
                    self.emit_op(OpCode::Pop);
                }
                self.emit_loop(loop_start, stmt.position);
                if let Some(j) = exit_jump {
                    self.patch_jump(j, stmt.position);
                    self.emit_op(OpCode::Pop);
                }
                let ctx = self.current().loops.pop().unwrap();
                for jump in ctx.break_jumps {
                    self.patch_jump(jump, stmt.position);
                }
                self.end_scope();
            }
            StmtKind::Return(value) => {
                match value {
                    Some(e) => self.compile_expr(e),
                    None => self.emit_op(OpCode::Undefined),
                }
                self.emit_op(OpCode::Return);
            }
            StmtKind::Break => {
                if let Some(ctx) = self.current().loops.last() {
                    let _ = ctx.scope_depth;
                    let jump = self.emit_jump(OpCode::Jump);
                    self.current().loops.last_mut().unwrap().break_jumps.push(jump);
                } else {
                    self.error("'break' outside of a loop", stmt.position);
                }
            }
            StmtKind::Continue => {
                if let Some(ctx) = self.current().loops.last() {
                    let loop_start = ctx.loop_start;
                    self.emit_loop(loop_start, stmt.position);
                } else {
                    self.error("'continue' outside of a loop", stmt.position);
                }
            }
            StmtKind::FunctionDeclaration(f) => {
                self.compile_function(Some(f.name), f.params, f.body, true, stmt.position);
                self.define_variable(f.name, stmt.position);
            }
            StmtKind::ClassDeclaration(c) => self.compile_class(c, stmt.position),
            StmtKind::InterfaceDeclaration(_) => {
                // Interfaces are purely a checker-time construct;
                // they erase completely by the time bytecode is emitted.
            }
        }
    }

    fn define_variable(&mut self, name: Symbol, position: Position) {
        if self.current().scope_depth > 0 {
            self.declare_local(name, position);
            return;
        }
        let sym = self.add_constant(Constant::String(self.interner.resolve(name).to_string()), position);
        self.emit_op_u16(OpCode::DefineGlobal, sym);
    }

    fn compile_function(&mut self, name: Option<Symbol>, params: &[Param], body: &Block, reserve_self_slot: bool, position: Position) {
        let fn_name = name.map(|n| self.interner.resolve(n).to_string()).unwrap_or_else(|| "<anonymous>".to_string());
        let mut fc = FunctionCompiler::new(fn_name, reserve_self_slot);
        fc.function.arity = params.len() as u8;
        self.stack.push(fc);
        self.begin_scope();
        for p in params {
            self.declare_local(p.name, position);
        }
        for s in body.statements {
            self.compile_stmt(s);
        }
        self.emit_op(OpCode::Undefined);
        self.emit_op(OpCode::Return);
        let compiled = self.stack.pop().unwrap();
        let upvalues = compiled.function.upvalues.clone();
        let func = Rc::new(compiled.function);
        let idx = self.add_constant(Constant::Function(func), position);
        self.emit_op_u16(OpCode::Closure, idx);
        for uv in upvalues {
            self.emit_byte(uv.is_local as u8);
            self.emit_u16(uv.index);
        }
    }

    fn compile_class(&mut self, c: &ClassDecl, position: Position) {
        let name_idx = self.add_constant(Constant::String(self.interner.resolve(c.name).to_string()), position);
        self.emit_op_u16(OpCode::NewClass, name_idx);
        self.define_variable(c.name, position);
        self.load_variable(c.name, position);

        if let Some(super_name) = c.superclass {
            self.load_variable(super_name, position);
            self.emit_op(OpCode::Inherit);
        }

        for member in c.members {
            match member {
                ClassMember::Method(m) => self.compile_method(m.name, m.params, m.body, position),
                ClassMember::Getter(m) => self.compile_method(m.name, m.params, m.body, position),
                ClassMember::Setter(m) => self.compile_method(m.name, m.params, m.body, position),
                ClassMember::Constructor(m) => self.compile_method(Symbol::EMPTY, m.params, m.body, position),
                ClassMember::Property(_) => {}
            }
        }
        self.emit_op(OpCode::Pop); // drop the class value pushed by load_variable
    }

    fn compile_method(&mut self, name: Symbol, params: &[Param], body: &Block, position: Position) {
        self.compile_function(Some(name), params, body, true, position);
        let name_idx = self.add_constant(Constant::String(self.interner.resolve(name).to_string()), position);
        self.emit_op_u16(OpCode::Method, name_idx);
    }

    fn load_variable(&mut self, name: Symbol, position: Position) {
        let depth = self.stack.len() - 1;
        if let Some(slot) = Self::resolve_local(&self.stack[depth], name) {
            self.emit_op_u16(OpCode::GetLocal, slot);
            return;
        }
        if let Some(slot) = Self::resolve_upvalue(&mut self.stack, depth, name) {
            self.emit_op_u16(OpCode::GetUpvalue, slot);
            return;
        }
        let sym = self.add_constant(Constant::String(self.interner.resolve(name).to_string()), position);
        self.emit_op_u16(OpCode::GetGlobal, sym);
    }

    fn store_variable(&mut self, name: Symbol, position: Position) {
        let depth = self.stack.len() - 1;
        if let Some(slot) = Self::resolve_local(&self.stack[depth], name) {
            self.emit_op_u16(OpCode::SetLocal, slot);
            return;
        }
        if let Some(slot) = Self::resolve_upvalue(&mut self.stack, depth, name) {
            self.emit_op_u16(OpCode::SetUpvalue, slot);
            return;
        }
        let sym = self.add_constant(Constant::String(self.interner.resolve(name).to_string()), position);
        self.emit_op_u16(OpCode::SetGlobal, sym);
    }

    // ---- expressions ----

    fn compile_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(lit) => self.compile_literal(lit, expr.position),
            ExprKind::Identifier(sym) => self.load_variable(*sym, expr.position),
            ExprKind::Binary { op: BinaryOp::And, left, right } => {
                self.compile_expr(left);
                let short_circuit = self.emit_jump(OpCode::JumpIfFalse);
                self.emit_op(OpCode::Pop);
                self.compile_expr(right);
                self.patch_jump(short_circuit, expr.position);
            }
            ExprKind::Binary { op: BinaryOp::Or, left, right } => {
                self.compile_expr(left);
                // No dedicated "jump if truthy": a false-jump over an
                // unconditional jump gets the same short-circuit shape.
                let else_jump = self.emit_jump(OpCode::JumpIfFalse);
                let end_jump = self.emit_jump(OpCode::Jump);
                self.patch_jump(else_jump, expr.position);
                self.emit_op(OpCode::Pop);
                self.compile_expr(right);
                self.patch_jump(end_jump, expr.position);
            }
            ExprKind::Binary { op, left, right } => {
                self.compile_expr(left);
                self.compile_expr(right);
                self.emit_op(binop_opcode(*op));
            }
            ExprKind::Unary { op, operand, is_prefix } => self.compile_unary(*op, operand, *is_prefix, expr.position),
            ExprKind::Assign { op, target, value } => self.compile_assign(*op, target, value, expr.position),
            ExprKind::Conditional { cond, then_branch, else_branch } => {
                self.compile_expr(cond);
                let then_jump = self.emit_jump(OpCode::JumpIfFalse);
                self.emit_op(OpCode::Pop);
                self.compile_expr(then_branch);
                let else_jump = self.emit_jump(OpCode::Jump);
                self.patch_jump(then_jump, expr.position);
                self.emit_op(OpCode::Pop);
                self.compile_expr(else_branch);
                self.patch_jump(else_jump, expr.position);
            }
            ExprKind::ArrayLiteral(elems) => {
                for e in *elems {
                    self.compile_expr(e);
                }
                self.emit_op_u16(OpCode::NewArray, elems.len() as u16);
            }
            ExprKind::ObjectLiteral(fields) => {
                // Keys are pushed as ordinary string constants (not raw
                // operand bytes) so the instruction stream stays a uniform
                // sequence of opcodes; `NewObject` pops `2 * count` values
                // in (key, value) pairs.
                for (name, value) in *fields {
                    let idx = self.add_constant(Constant::String(self.interner.resolve(*name).to_string()), expr.position);
                    self.emit_op_u16(OpCode::Constant, idx);
                    self.compile_expr(value);
                }
                self.emit_op_u16(OpCode::NewObject, fields.len() as u16);
            }
            ExprKind::Member { object, key, .. } => {
                self.compile_expr(object);
                match key {
                    MemberKey::Name(name) => {
                        let idx = self.add_constant(Constant::String(self.interner.resolve(*name).to_string()), expr.position);
                        self.emit_op_u16(OpCode::GetField, idx);
                    }
                    MemberKey::Computed(index_expr) => {
                        self.compile_expr(index_expr);
                        self.emit_op(OpCode::GetIndex);
                    }
                }
            }
            ExprKind::Call { callee, args } => {
                self.compile_expr(callee);
                for a in *args {
                    self.compile_expr(a);
                }
                self.emit_op_u16(OpCode::Call, args.len() as u16);
            }
            ExprKind::InstanceOf { left, right } => {
                self.compile_expr(left);
                self.compile_expr(right);
                self.emit_op(OpCode::InstanceOf);
            }
            ExprKind::StrictEqual { left, right, negate } => {
                self.compile_expr(left);
                self.compile_expr(right);
                self.emit_op(if *negate { OpCode::StrictNotEqual } else { OpCode::StrictEqual });
            }
            ExprKind::TypeAssertion { expr: inner, .. } => {
                // Type assertions are erased: they only guide the checker.
                self.compile_expr(inner);
            }
            ExprKind::Function(f) => self.compile_function(f.name, f.params, f.body, true, expr.position),
        }
    }

    fn compile_literal(&mut self, lit: &Literal, position: Position) {
        match lit {
            Literal::Number(n) => {
                let idx = self.add_constant(Constant::Number(*n), position);
                self.emit_op_u16(OpCode::Constant, idx);
            }
            Literal::String(sym) => {
                let idx = self.add_constant(Constant::String(self.interner.resolve(*sym).to_string()), position);
                self.emit_op_u16(OpCode::Constant, idx);
            }
            Literal::Boolean(true) => self.emit_op(OpCode::True),
            Literal::Boolean(false) => self.emit_op(OpCode::False),
            Literal::Null => self.emit_op(OpCode::Null),
            Literal::Undefined => self.emit_op(OpCode::Undefined),
        }
    }

    fn compile_unary(&mut self, op: UnaryOp, operand: &Expr, is_prefix: bool, position: Position) {
        match op {
            UnaryOp::Increment | UnaryOp::Decrement => {
                self.compile_expr(operand);
                if !is_prefix {
                    self.emit_op(OpCode::Dup);
                }
                let one = self.add_constant(Constant::Number(1.0), position);
                self.emit_op_u16(OpCode::Constant, one);
                self.emit_op(if op == UnaryOp::Increment { OpCode::Add } else { OpCode::Subtract });
                if is_prefix {
                    self.emit_op(OpCode::Dup);
                }
                self.store_to(operand, position);
                if !is_prefix {
                    self.emit_op(OpCode::Pop);
                }
            }
            UnaryOp::TypeOf => {
                self.compile_expr(operand);
                self.emit_op(OpCode::TypeOf);
            }
            UnaryOp::Negate => {
                self.compile_expr(operand);
                self.emit_op(OpCode::Negate);
            }
            UnaryOp::Plus => {
                self.compile_expr(operand);
            }
            UnaryOp::Not => {
                self.compile_expr(operand);
                self.emit_op(OpCode::Not);
            }
            UnaryOp::BitNot => {
                self.compile_expr(operand);
                self.emit_op(OpCode::BitNot);
            }
        }
    }

    fn compile_assign(&mut self, op: AssignOp, target: &Expr, value: &Expr, position: Position) {
        if op != AssignOp::Assign {
            self.compile_expr(target);
            self.compile_expr(value);
            self.emit_op(compound_assign_opcode(op));
        } else {
            self.compile_expr(value);
        }
        self.emit_op(OpCode::Dup);
        self.store_to(target, position);
    }

    fn store_to(&mut self, target: &Expr, position: Position) {
        match &target.kind {
            ExprKind::Identifier(sym) => self.store_variable(*sym, position),
            ExprKind::Member { object, key, .. } => {
                self.compile_expr(object);
                match key {
                    MemberKey::Name(name) => {
                        let idx = self.add_constant(Constant::String(self.interner.resolve(*name).to_string()), position);
                        self.emit_op_u16(OpCode::SetField, idx);
                    }
                    MemberKey::Computed(index_expr) => {
                        self.compile_expr(index_expr);
                        self.emit_op(OpCode::SetIndex);
                    }
                }
            }
            _ => self.error("invalid assignment target", position),
        }
    }
}

fn binop_opcode(op: BinaryOp) -> OpCode {
    use BinaryOp::*;
    match op {
        Add => OpCode::Add,
        Sub => OpCode::Subtract,
        Mul => OpCode::Multiply,
        Div => OpCode::Divide,
        Mod => OpCode::Modulo,
        Less => OpCode::Less,
        LessEqual => OpCode::LessEqual,
        Greater => OpCode::Greater,
        GreaterEqual => OpCode::GreaterEqual,
        Equal => OpCode::Equal,
        NotEqual => OpCode::NotEqual,
        And | Or => unreachable!("&&/|| short-circuit and are compiled via jumps, not a single opcode"),
        BitAnd => OpCode::BitAnd,
        BitOr => OpCode::BitOr,
        BitXor => OpCode::BitXor,
        Shl => OpCode::Shl,
        Shr => OpCode::Shr,
        UShr => OpCode::UShr,
    }
}

fn compound_assign_opcode(op: AssignOp) -> OpCode {
    use AssignOp::*;
    match op {
        Assign => unreachable!(),
        AddAssign => OpCode::Add,
        SubAssign => OpCode::Subtract,
        MulAssign => OpCode::Multiply,
        DivAssign => OpCode::Divide,
        ModAssign => OpCode::Modulo,
        BitAndAssign => OpCode::BitAnd,
        BitOrAssign => OpCode::BitOr,
        BitXorAssign => OpCode::BitXor,
        ShlAssign => OpCode::Shl,
        ShrAssign => OpCode::Shr,
        UShrAssign => OpCode::UShr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::lexer::Lexer;
    use crate::parser::parse;

    fn compile_source(src: &str) -> (Function, Vec<Diagnostic>) {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let tokens = Lexer::tokenize(src, &mut interner);
        let (program, _) = parse(src, &tokens, &arena);
        compile(&program, &interner)
    }

    #[test]
    fn compiles_arithmetic_expression_statement() {
        let (f, diags) = compile_source("1 + 2;");
        assert!(diags.is_empty());
        assert!(f.code.contains(&(OpCode::Add as u8)));
    }

    #[test]
    fn compiles_global_variable_definition() {
        let (f, diags) = compile_source("let x = 1;");
        assert!(diags.is_empty());
        assert!(f.code.contains(&(OpCode::DefineGlobal as u8)));
    }

    #[test]
    fn closure_captures_enclosing_local_as_upvalue() {
        let (f, diags) = compile_source("function outer() { let x = 1; function inner() { return x; } return inner; }");
        assert!(diags.is_empty(), "{:?}", diags);
        // outer's constant pool holds inner's compiled Function with one upvalue.
        let inner = f.constants.iter().find_map(|c| match c {
            Constant::Function(func) if func.name == "outer" => Some(func.clone()),
            _ => None,
        });
        assert!(inner.is_some());
    }

    #[test]
    fn while_loop_emits_backward_loop_instruction() {
        let (f, diags) = compile_source("let i = 0; while (i < 3) { i = i + 1; }");
        assert!(diags.is_empty());
        assert!(f.code.contains(&(OpCode::Loop as u8)));
    }

    #[test]
    fn for_loop_compiles_clean() {
        let (f, diags) = compile_source("for (let i = 0; i < 3; i = i + 1) { i; }");
        assert!(diags.is_empty());
        assert!(f.code.contains(&(OpCode::Loop as u8)));
    }

    #[test]
    fn class_declaration_emits_new_class_and_methods() {
        let (f, diags) = compile_source("class Point { constructor(x: number) { this.x = x; } getX(): number { return this.x; } }");
        assert!(diags.is_empty(), "{:?}", diags);
        assert!(f.code.contains(&(OpCode::NewClass as u8)));
        assert!(f.code.contains(&(OpCode::Method as u8)));
    }

    #[test]
    fn too_many_constants_is_a_compile_error() {
        let mut src = String::new();
        for i in 0..300 {
            src.push_str(&format!("let v{} = {};\n", i, i));
        }
        let (_, diags) = compile_source(&src);
        assert!(diags.iter().any(|d| d.message.contains("too many constants")));
    }
}
