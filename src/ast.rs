//! Expression and statement AST.
//!
//! Nodes are tagged enums holding `&'a` references into the arena that owns
//! the whole tree for one compilation (see `arena.rs`) — a flat match-based
//! traversal rather than virtual-dispatch `Node`/`Expression`/`Statement`
//! subclasses.

use crate::diagnostic::Position;
use crate::intern::{Interner, Symbol};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    Number(f64),
    String(Symbol),
    Boolean(bool),
    Null,
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Plus,
    BitNot,
    Not,
    Increment,
    Decrement,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
    ModAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
}

/// Type-annotation grammar: `T := primitive | ident (<T,...>)? |
/// T[] | { prop: T, ... } | (T, ...) => T | T | T | T & T`.
#[derive(Debug, Clone)]
pub enum TypeAnnotation<'a> {
    Number,
    String,
    Boolean,
    Any,
    Unknown,
    Never,
    Void,
    Named { name: Symbol, type_args: &'a [TypeAnnotation<'a>] },
    Array(&'a TypeAnnotation<'a>),
    Object(&'a [(Symbol, TypeAnnotation<'a>)]),
    Function { params: &'a [TypeAnnotation<'a>], ret: &'a TypeAnnotation<'a> },
    Union(&'a [TypeAnnotation<'a>]),
    Intersection(&'a [TypeAnnotation<'a>]),
}

#[derive(Debug, Clone, Copy)]
pub enum MemberKey<'a> {
    Name(Symbol),
    Computed(&'a Expr<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct Param<'a> {
    pub name: Symbol,
    pub type_annotation: Option<&'a TypeAnnotation<'a>>,
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionExpr<'a> {
    pub name: Option<Symbol>,
    pub params: &'a [Param<'a>],
    pub return_type: Option<&'a TypeAnnotation<'a>>,
    pub body: &'a Block<'a>,
    pub is_arrow: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Expr<'a> {
    pub kind: ExprKind<'a>,
    pub position: Position,
}

#[derive(Debug, Clone, Copy)]
pub enum ExprKind<'a> {
    Literal(Literal),
    Identifier(Symbol),
    Binary { op: BinaryOp, left: &'a Expr<'a>, right: &'a Expr<'a> },
    Unary { op: UnaryOp, operand: &'a Expr<'a>, is_prefix: bool },
    Assign { op: AssignOp, target: &'a Expr<'a>, value: &'a Expr<'a> },
    Conditional { cond: &'a Expr<'a>, then_branch: &'a Expr<'a>, else_branch: &'a Expr<'a> },
    ArrayLiteral(&'a [Expr<'a>]),
    ObjectLiteral(&'a [(Symbol, Expr<'a>)]),
    Member { object: &'a Expr<'a>, key: MemberKey<'a>, optional: bool },
    Call { callee: &'a Expr<'a>, args: &'a [Expr<'a>] },
    InstanceOf { left: &'a Expr<'a>, right: &'a Expr<'a> },
    StrictEqual { left: &'a Expr<'a>, right: &'a Expr<'a>, negate: bool },
    TypeAssertion { expr: &'a Expr<'a>, type_annotation: &'a TypeAnnotation<'a> },
    Function(&'a FunctionExpr<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct Declarator<'a> {
    pub name: Symbol,
    pub type_annotation: Option<&'a TypeAnnotation<'a>>,
    pub initializer: Option<&'a Expr<'a>>,
    pub position: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Let,
    Const,
    Var,
}

#[derive(Debug, Clone, Copy)]
pub struct Block<'a> {
    pub statements: &'a [Stmt<'a>],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
    Protected,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassProperty<'a> {
    pub name: Symbol,
    pub type_annotation: Option<&'a TypeAnnotation<'a>>,
    pub initializer: Option<&'a Expr<'a>>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_readonly: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ClassMethod<'a> {
    pub name: Symbol,
    pub params: &'a [Param<'a>],
    pub return_type: Option<&'a TypeAnnotation<'a>>,
    pub body: &'a Block<'a>,
    pub visibility: Visibility,
    pub is_static: bool,
    pub type_params: &'a [Symbol],
}

#[derive(Debug, Clone, Copy)]
pub enum ClassMember<'a> {
    Property(ClassProperty<'a>),
    Method(ClassMethod<'a>),
    Constructor(ClassMethod<'a>),
    Getter(ClassMethod<'a>),
    Setter(ClassMethod<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct ClassDecl<'a> {
    pub name: Symbol,
    pub type_params: &'a [Symbol],
    pub superclass: Option<Symbol>,
    pub implements: &'a [Symbol],
    pub members: &'a [ClassMember<'a>],
}

#[derive(Debug, Clone, Copy)]
pub struct InterfaceMember<'a> {
    pub name: Symbol,
    pub type_annotation: &'a TypeAnnotation<'a>,
}

#[derive(Debug, Clone, Copy)]
pub struct InterfaceDecl<'a> {
    pub name: Symbol,
    pub members: &'a [InterfaceMember<'a>],
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionDecl<'a> {
    pub name: Symbol,
    pub params: &'a [Param<'a>],
    pub return_type: Option<&'a TypeAnnotation<'a>>,
    pub body: &'a Block<'a>,
}

#[derive(Debug, Clone, Copy)]
pub struct Stmt<'a> {
    pub kind: StmtKind<'a>,
    pub position: Position,
}

#[derive(Debug, Clone, Copy)]
pub enum StmtKind<'a> {
    Expression(&'a Expr<'a>),
    Block(&'a Block<'a>),
    VariableDeclaration { kind: DeclKind, declarators: &'a [Declarator<'a>] },
    If { cond: &'a Expr<'a>, then_branch: &'a Stmt<'a>, else_branch: Option<&'a Stmt<'a>> },
    While { cond: &'a Expr<'a>, body: &'a Stmt<'a> },
    For {
        init: Option<&'a Stmt<'a>>,
        cond: Option<&'a Expr<'a>>,
        update: Option<&'a Expr<'a>>,
        body: &'a Stmt<'a>,
    },
    Return(Option<&'a Expr<'a>>),
    Break,
    Continue,
    FunctionDeclaration(&'a FunctionDecl<'a>),
    ClassDeclaration(&'a ClassDecl<'a>),
    InterfaceDeclaration(&'a InterfaceDecl<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct Program<'a> {
    pub statements: &'a [Stmt<'a>],
}

impl<'a> Expr<'a> {
    pub fn to_source_string(&self, interner: &Interner) -> String {
        display_expr(self, interner)
    }
}

impl<'a> Stmt<'a> {
    pub fn to_source_string(&self, interner: &Interner) -> String {
        display_stmt(self, interner)
    }
}

fn display_type(t: &TypeAnnotation, interner: &Interner) -> String {
    match t {
        TypeAnnotation::Number => "number".to_string(),
        TypeAnnotation::String => "string".to_string(),
        TypeAnnotation::Boolean => "boolean".to_string(),
        TypeAnnotation::Any => "any".to_string(),
        TypeAnnotation::Unknown => "unknown".to_string(),
        TypeAnnotation::Never => "never".to_string(),
        TypeAnnotation::Void => "void".to_string(),
        TypeAnnotation::Named { name, type_args } => {
            if type_args.is_empty() {
                interner.resolve(*name).to_string()
            } else {
                let parts: Vec<String> = type_args.iter().map(|t| display_type(t, interner)).collect();
                format!("{}<{}>", interner.resolve(*name), parts.join(", "))
            }
        }
        TypeAnnotation::Array(elem) => format!("{}[]", display_type(elem, interner)),
        TypeAnnotation::Object(props) => {
            let parts: Vec<String> =
                props.iter().map(|(n, t)| format!("{}: {}", interner.resolve(*n), display_type(t, interner))).collect();
            format!("{{ {} }}", parts.join(", "))
        }
        TypeAnnotation::Function { params, ret } => {
            let parts: Vec<String> = params.iter().map(|p| display_type(p, interner)).collect();
            format!("({}) => {}", parts.join(", "), display_type(ret, interner))
        }
        TypeAnnotation::Union(members) => {
            members.iter().map(|m| display_type(m, interner)).collect::<Vec<_>>().join(" | ")
        }
        TypeAnnotation::Intersection(members) => {
            members.iter().map(|m| display_type(m, interner)).collect::<Vec<_>>().join(" & ")
        }
    }
}

fn binop_str(op: BinaryOp) -> &'static str {
    use BinaryOp::*;
    match op {
        Add => "+",
        Sub => "-",
        Mul => "*",
        Div => "/",
        Mod => "%",
        Less => "<",
        LessEqual => "<=",
        Greater => ">",
        GreaterEqual => ">=",
        Equal => "==",
        NotEqual => "!=",
        And => "&&",
        Or => "||",
        BitAnd => "&",
        BitOr => "|",
        BitXor => "^",
        Shl => "<<",
        Shr => ">>",
        UShr => ">>>",
    }
}

fn display_expr(e: &Expr, interner: &Interner) -> String {
    match &e.kind {
        ExprKind::Literal(lit) => match lit {
            Literal::Number(n) => format!("{}", n),
            Literal::String(s) => format!("\"{}\"", interner.resolve(*s)),
            Literal::Boolean(b) => b.to_string(),
            Literal::Null => "null".to_string(),
            Literal::Undefined => "undefined".to_string(),
        },
        ExprKind::Identifier(sym) => interner.resolve(*sym).to_string(),
        ExprKind::Binary { op, left, right } => {
            format!("({} {} {})", display_expr(left, interner), binop_str(*op), display_expr(right, interner))
        }
        ExprKind::Unary { op, operand, is_prefix } => {
            let sym = match op {
                UnaryOp::Negate => "-",
                UnaryOp::Plus => "+",
                UnaryOp::BitNot => "~",
                UnaryOp::Not => "!",
                UnaryOp::Increment => "++",
                UnaryOp::Decrement => "--",
                UnaryOp::TypeOf => "typeof ",
            };
            if *is_prefix {
                format!("{}{}", sym, display_expr(operand, interner))
            } else {
                format!("{}{}", display_expr(operand, interner), sym)
            }
        }
        ExprKind::Assign { op, target, value } => {
            let sym = match op {
                AssignOp::Assign => "=",
                AssignOp::AddAssign => "+=",
                AssignOp::SubAssign => "-=",
                AssignOp::MulAssign => "*=",
                AssignOp::DivAssign => "/=",
                AssignOp::ModAssign => "%=",
                AssignOp::BitAndAssign => "&=",
                AssignOp::BitOrAssign => "|=",
                AssignOp::BitXorAssign => "^=",
                AssignOp::ShlAssign => "<<=",
                AssignOp::ShrAssign => ">>=",
                AssignOp::UShrAssign => ">>>=",
            };
            format!("({} {} {})", display_expr(target, interner), sym, display_expr(value, interner))
        }
        ExprKind::Conditional { cond, then_branch, else_branch } => format!(
            "({} ? {} : {})",
            display_expr(cond, interner),
            display_expr(then_branch, interner),
            display_expr(else_branch, interner)
        ),
        ExprKind::ArrayLiteral(elems) => {
            format!("[{}]", elems.iter().map(|e| display_expr(e, interner)).collect::<Vec<_>>().join(", "))
        }
        ExprKind::ObjectLiteral(fields) => {
            let parts: Vec<String> =
                fields.iter().map(|(n, v)| format!("{}: {}", interner.resolve(*n), display_expr(v, interner))).collect();
            format!("{{ {} }}", parts.join(", "))
        }
        ExprKind::Member { object, key, optional } => {
            let op = if *optional { "?." } else { "." };
            match key {
                MemberKey::Name(name) => format!("{}{}{}", display_expr(object, interner), op, interner.resolve(*name)),
                MemberKey::Computed(idx) => format!("{}[{}]", display_expr(object, interner), display_expr(idx, interner)),
            }
        }
        ExprKind::Call { callee, args } => {
            format!(
                "{}({})",
                display_expr(callee, interner),
                args.iter().map(|a| display_expr(a, interner)).collect::<Vec<_>>().join(", ")
            )
        }
        ExprKind::InstanceOf { left, right } => {
            format!("({} instanceof {})", display_expr(left, interner), display_expr(right, interner))
        }
        ExprKind::StrictEqual { left, right, negate } => {
            let op = if *negate { "!==" } else { "===" };
            format!("({} {} {})", display_expr(left, interner), op, display_expr(right, interner))
        }
        ExprKind::TypeAssertion { expr, type_annotation } => {
            format!("({} as {})", display_expr(expr, interner), display_type(type_annotation, interner))
        }
        ExprKind::Function(f) => {
            let params: Vec<String> = f.params.iter().map(|p| interner.resolve(p.name).to_string()).collect();
            if f.is_arrow {
                format!("({}) => {{ ... }}", params.join(", "))
            } else {
                format!("function {}({}) {{ ... }}", f.name.map(|n| interner.resolve(n)).unwrap_or(""), params.join(", "))
            }
        }
    }
}

fn display_block(b: &Block, interner: &Interner) -> String {
    let parts: Vec<String> = b.statements.iter().map(|s| display_stmt(s, interner)).collect();
    format!("{{ {} }}", parts.join(" "))
}

fn display_stmt(s: &Stmt, interner: &Interner) -> String {
    match &s.kind {
        StmtKind::Expression(e) => format!("{};", display_expr(e, interner)),
        StmtKind::Block(b) => display_block(b, interner),
        StmtKind::VariableDeclaration { kind, declarators } => {
            let kw = match kind {
                DeclKind::Let => "let",
                DeclKind::Const => "const",
                DeclKind::Var => "var",
            };
            let parts: Vec<String> = declarators
                .iter()
                .map(|d| {
                    let mut s = interner.resolve(d.name).to_string();
                    if let Some(t) = d.type_annotation {
                        s.push_str(&format!(": {}", display_type(t, interner)));
                    }
                    if let Some(init) = d.initializer {
                        s.push_str(&format!(" = {}", display_expr(init, interner)));
                    }
                    s
                })
                .collect();
            format!("{} {};", kw, parts.join(", "))
        }
        StmtKind::If { cond, then_branch, else_branch } => {
            let mut s = format!("if ({}) {}", display_expr(cond, interner), display_stmt(then_branch, interner));
            if let Some(e) = else_branch {
                s.push_str(&format!(" else {}", display_stmt(e, interner)));
            }
            s
        }
        StmtKind::While { cond, body } => format!("while ({}) {}", display_expr(cond, interner), display_stmt(body, interner)),
        StmtKind::For { init, cond, update, body } => {
            let init_s = init.map(|s| display_stmt(s, interner)).unwrap_or_default();
            let cond_s = cond.map(|e| display_expr(e, interner)).unwrap_or_default();
            let update_s = update.map(|e| display_expr(e, interner)).unwrap_or_default();
            format!("for ({} {}; {}) {}", init_s, cond_s, update_s, display_stmt(body, interner))
        }
        StmtKind::Return(val) => match val {
            Some(v) => format!("return {};", display_expr(v, interner)),
            None => "return;".to_string(),
        },
        StmtKind::Break => "break;".to_string(),
        StmtKind::Continue => "continue;".to_string(),
        StmtKind::FunctionDeclaration(f) => {
            let params: Vec<String> = f.params.iter().map(|p| interner.resolve(p.name).to_string()).collect();
            format!("function {}({}) {}", interner.resolve(f.name), params.join(", "), display_block(f.body, interner))
        }
        StmtKind::ClassDeclaration(c) => display_class(c, interner),
        StmtKind::InterfaceDeclaration(i) => display_interface(i, interner),
    }
}

fn display_visibility(v: Visibility) -> &'static str {
    match v {
        Visibility::Public => "",
        Visibility::Private => "private ",
        Visibility::Protected => "protected ",
    }
}

fn display_type_params(params: &[Symbol], interner: &Interner) -> String {
    if params.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = params.iter().map(|p| interner.resolve(*p).to_string()).collect();
    format!("<{}>", parts.join(", "))
}

fn display_method(keyword: &str, m: &ClassMethod, interner: &Interner) -> String {
    let params: Vec<String> = m
        .params
        .iter()
        .map(|p| {
            let mut s = interner.resolve(p.name).to_string();
            if let Some(t) = p.type_annotation {
                s.push_str(&format!(": {}", display_type(t, interner)));
            }
            s
        })
        .collect();
    let mut s = String::new();
    s.push_str(display_visibility(m.visibility));
    if m.is_static {
        s.push_str("static ");
    }
    s.push_str(keyword);
    s.push_str(interner.resolve(m.name));
    s.push_str(&display_type_params(m.type_params, interner));
    s.push_str(&format!("({})", params.join(", ")));
    if let Some(ret) = m.return_type {
        s.push_str(&format!(": {}", display_type(ret, interner)));
    }
    s.push(' ');
    s.push_str(&display_block(m.body, interner));
    s
}

fn display_class_member(member: &ClassMember, interner: &Interner) -> String {
    match member {
        ClassMember::Property(p) => {
            let mut s = String::new();
            s.push_str(display_visibility(p.visibility));
            if p.is_static {
                s.push_str("static ");
            }
            if p.is_readonly {
                s.push_str("readonly ");
            }
            s.push_str(interner.resolve(p.name));
            if let Some(t) = p.type_annotation {
                s.push_str(&format!(": {}", display_type(t, interner)));
            }
            if let Some(init) = p.initializer {
                s.push_str(&format!(" = {}", display_expr(init, interner)));
            }
            s.push(';');
            s
        }
        ClassMember::Method(m) => display_method("", m, interner),
        ClassMember::Constructor(m) => display_method("constructor", m, interner),
        ClassMember::Getter(m) => display_method("get ", m, interner),
        ClassMember::Setter(m) => display_method("set ", m, interner),
    }
}

fn display_class(c: &ClassDecl, interner: &Interner) -> String {
    let mut s = format!("class {}{}", interner.resolve(c.name), display_type_params(c.type_params, interner));
    if let Some(sup) = c.superclass {
        s.push_str(&format!(" extends {}", interner.resolve(sup)));
    }
    if !c.implements.is_empty() {
        let parts: Vec<String> = c.implements.iter().map(|i| interner.resolve(*i).to_string()).collect();
        s.push_str(&format!(" implements {}", parts.join(", ")));
    }
    let members: Vec<String> = c.members.iter().map(|m| display_class_member(m, interner)).collect();
    s.push_str(&format!(" {{ {} }}", members.join(" ")));
    s
}

fn display_interface(i: &InterfaceDecl, interner: &Interner) -> String {
    let members: Vec<String> = i
        .members
        .iter()
        .map(|m| format!("{}: {};", interner.resolve(m.name), display_type(m.type_annotation, interner)))
        .collect();
    format!("interface {} {{ {} }}", interner.resolve(i.name), members.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;

    #[test]
    fn round_trips_arithmetic_expression() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let two = arena.alloc(Expr { kind: ExprKind::Literal(Literal::Number(2.0)), position: Position::start() });
        let three = arena.alloc(Expr { kind: ExprKind::Literal(Literal::Number(3.0)), position: Position::start() });
        let sum = Expr {
            kind: ExprKind::Binary { op: BinaryOp::Add, left: two, right: three },
            position: Position::start(),
        };
        assert_eq!(sum.to_source_string(&mut interner), "(2 + 3)");
    }

    #[test]
    fn display_identifier_resolves_symbol() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let sym = interner.intern("x");
        let e = arena.alloc(Expr { kind: ExprKind::Identifier(sym), position: Position::start() });
        assert_eq!(e.to_source_string(&interner), "x");
    }

    #[test]
    fn class_display_prints_members_instead_of_a_placeholder() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let x = interner.intern("x");
        let get_x = interner.intern("getX");
        let point = interner.intern("Point");
        let empty_body = arena.alloc(Block { statements: &[] });
        let members = arena.alloc_slice([
            ClassMember::Property(ClassProperty {
                name: x,
                type_annotation: Some(arena.alloc(TypeAnnotation::Number)),
                initializer: None,
                visibility: Visibility::Private,
                is_static: false,
                is_readonly: false,
            }),
            ClassMember::Method(ClassMethod {
                name: get_x,
                params: &[],
                return_type: Some(arena.alloc(TypeAnnotation::Number)),
                body: empty_body,
                visibility: Visibility::Public,
                is_static: false,
                type_params: &[],
            }),
        ]);
        let decl = ClassDecl { name: point, type_params: &[], superclass: None, implements: &[], members };
        let stmt = Stmt { kind: StmtKind::ClassDeclaration(&decl), position: Position::start() };
        let printed = stmt.to_source_string(&interner);
        assert!(printed.contains("private x: number;"), "{}", printed);
        assert!(printed.contains("getX(): number"), "{}", printed);
        assert!(!printed.contains("..."));
    }
}
