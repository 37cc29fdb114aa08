//! Pratt parser.
//!
//! Binary operators are parsed by precedence-climbing over a fixed binding
//! power table; everything else (unary, postfix, call/member chains,
//! primaries, statements) is plain recursive descent. Errors are collected
//! rather than raised — a parse error enters panic mode and the parser
//! resynchronizes at the next statement boundary so one mistake doesn't
//! hide the rest of the file's diagnostics (mirrors teacher's `error.rs`
//! collect-and-continue style).

use crate::arena::Arena;
use crate::ast::*;
use crate::diagnostic::{Diagnostic, Position};
use crate::token::{Token, TokenKind};

pub struct Parser<'a, 't> {
    tokens: &'t [Token],
    source: &'a str,
    pos: usize,
    arena: &'a Arena,
    diagnostics: Vec<Diagnostic>,
    panic_mode: bool,
}

pub fn parse<'a>(source: &'a str, tokens: &[Token], arena: &'a Arena) -> (Program<'a>, Vec<Diagnostic>) {
    let mut parser = Parser { tokens, source, pos: 0, arena, diagnostics: Vec::new(), panic_mode: false };
    let mut statements = Vec::new();
    while !parser.check(TokenKind::Eof) {
        if let Some(stmt) = parser.declaration() {
            statements.push(stmt);
        }
    }
    let statements = arena.alloc_slice(statements);
    (Program { statements }, parser.diagnostics)
}

// Binding power table for `parse_binary`. Higher binds tighter. `instanceof`
// and `===`/`!==` share a level with their sibling operators but build
// distinct AST nodes: InstanceOf and StrictEqual are first-class.
fn infix_precedence(kind: TokenKind) -> Option<u8> {
    use TokenKind::*;
    Some(match kind {
        PipePipe => 3,
        AmpAmp => 4,
        Pipe => 5,
        Caret => 6,
        Amp => 7,
        EqualEqual | BangEqual | EqualEqualEqual | BangEqualEqual => 8,
        Less | LessEqual | Greater | GreaterEqual | InstanceOf => 9,
        Shl | Shr | UShr => 10,
        Plus | Minus => 11,
        Star | Slash | Percent => 12,
        _ => return None,
    })
}

fn assign_op(kind: TokenKind) -> Option<AssignOp> {
    use TokenKind::*;
    Some(match kind {
        Equal => AssignOp::Assign,
        PlusEqual => AssignOp::AddAssign,
        MinusEqual => AssignOp::SubAssign,
        StarEqual => AssignOp::MulAssign,
        SlashEqual => AssignOp::DivAssign,
        PercentEqual => AssignOp::ModAssign,
        AmpEqual => AssignOp::BitAndAssign,
        PipeEqual => AssignOp::BitOrAssign,
        CaretEqual => AssignOp::BitXorAssign,
        ShlEqual => AssignOp::ShlAssign,
        ShrEqual => AssignOp::ShrAssign,
        UShrEqual => AssignOp::UShrAssign,
        _ => return None,
    })
}

impl<'a, 't> Parser<'a, 't> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = *self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn matches(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn position(&self) -> Position {
        self.peek().position
    }

    fn error(&mut self, message: impl Into<String>) {
        if self.panic_mode {
            return;
        }
        self.panic_mode = true;
        let lexeme = self.peek().lexeme(self.source).to_string();
        let diag = Diagnostic::error(message, self.position()).with_suggestion_for(&lexeme);
        self.diagnostics.push(diag);
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Token {
        if self.check(kind) {
            self.advance()
        } else {
            self.error(format!("expected {}", what));
            *self.peek()
        }
    }

    fn lexeme_symbol(&mut self, tok: &Token) -> crate::intern::Symbol {
        tok.text.unwrap_or(crate::intern::Symbol::EMPTY)
    }

    /// Skips tokens until a likely statement boundary, so one malformed
    /// statement doesn't cascade into spurious errors for the rest of the
    /// file.
    fn synchronize(&mut self) {
        self.panic_mode = false;
        while !self.check(TokenKind::Eof) {
            if self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].kind == TokenKind::Semicolon {
                return;
            }
            match self.peek_kind() {
                TokenKind::Class
                | TokenKind::Function
                | TokenKind::Let
                | TokenKind::Const
                | TokenKind::Var
                | TokenKind::If
                | TokenKind::While
                | TokenKind::For
                | TokenKind::Return
                | TokenKind::Interface => return,
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ---- statements ----

    fn declaration(&mut self) -> Option<Stmt<'a>> {
        let stmt = match self.peek_kind() {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => self.variable_declaration(),
            TokenKind::Function => self.function_declaration(),
            TokenKind::Class => self.class_declaration(),
            TokenKind::Interface => self.interface_declaration(),
            _ => self.statement(),
        };
        if self.panic_mode {
            self.synchronize();
        }
        Some(stmt)
    }

    fn statement(&mut self) -> Stmt<'a> {
        match self.peek_kind() {
            TokenKind::LeftBrace => self.block_statement(),
            TokenKind::If => self.if_statement(),
            TokenKind::While => self.while_statement(),
            TokenKind::For => self.for_statement(),
            TokenKind::Return => self.return_statement(),
            TokenKind::Break => self.break_statement(),
            TokenKind::Continue => self.continue_statement(),
            _ => self.expression_statement(),
        }
    }

    fn block(&mut self) -> &'a Block<'a> {
        let start = self.position();
        self.expect(TokenKind::LeftBrace, "'{'");
        let mut statements = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            if let Some(s) = self.declaration() {
                statements.push(s);
            }
        }
        self.expect(TokenKind::RightBrace, "'}'");
        let _ = start;
        self.arena.alloc(Block { statements: self.arena.alloc_slice(statements) })
    }

    fn block_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        let block = self.block();
        Stmt { kind: StmtKind::Block(block), position }
    }

    fn if_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        self.expect(TokenKind::LeftParen, "'(' after 'if'");
        let cond = self.expression();
        self.expect(TokenKind::RightParen, "')' after condition");
        let then_branch = self.arena.alloc(self.statement());
        let else_branch = if self.matches(TokenKind::Else) { Some(&*self.arena.alloc(self.statement())) } else { None };
        Stmt { kind: StmtKind::If { cond, then_branch, else_branch }, position }
    }

    fn while_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        self.expect(TokenKind::LeftParen, "'(' after 'while'");
        let cond = self.expression();
        self.expect(TokenKind::RightParen, "')' after condition");
        let body = self.arena.alloc(self.statement());
        Stmt { kind: StmtKind::While { cond, body }, position }
    }

    fn for_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        self.expect(TokenKind::LeftParen, "'(' after 'for'");
        let init = if self.matches(TokenKind::Semicolon) {
            None
        } else {
            let s = match self.peek_kind() {
                TokenKind::Let | TokenKind::Const | TokenKind::Var => self.variable_declaration(),
                _ => self.expression_statement(),
            };
            Some(&*self.arena.alloc(s))
        };
        let cond = if self.check(TokenKind::Semicolon) { None } else { Some(&*self.expression()) };
        self.expect(TokenKind::Semicolon, "';' after loop condition");
        let update = if self.check(TokenKind::RightParen) { None } else { Some(&*self.expression()) };
        self.expect(TokenKind::RightParen, "')' after for clauses");
        let body = self.arena.alloc(self.statement());
        Stmt { kind: StmtKind::For { init, cond, update, body }, position }
    }

    fn return_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        let value = if self.check(TokenKind::Semicolon) { None } else { Some(&*self.expression()) };
        self.matches(TokenKind::Semicolon);
        Stmt { kind: StmtKind::Return(value), position }
    }

    fn break_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        self.matches(TokenKind::Semicolon);
        Stmt { kind: StmtKind::Break, position }
    }

    fn continue_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        self.matches(TokenKind::Semicolon);
        Stmt { kind: StmtKind::Continue, position }
    }

    fn expression_statement(&mut self) -> Stmt<'a> {
        let position = self.position();
        let expr = self.expression();
        self.matches(TokenKind::Semicolon);
        Stmt { kind: StmtKind::Expression(expr), position }
    }

    fn variable_declaration(&mut self) -> Stmt<'a> {
        let position = self.position();
        let kind = match self.advance().kind {
            TokenKind::Let => DeclKind::Let,
            TokenKind::Const => DeclKind::Const,
            _ => DeclKind::Var,
        };
        let mut declarators = Vec::new();
        loop {
            let dpos = self.position();
            let name_tok = self.expect(TokenKind::Identifier, "identifier");
            let name = self.lexeme_symbol(&name_tok);
            let type_annotation = if self.matches(TokenKind::Colon) { Some(&*self.parse_type()) } else { None };
            let initializer = if self.matches(TokenKind::Equal) { Some(&*self.assignment()) } else { None };
            declarators.push(Declarator { name, type_annotation, initializer, position: dpos });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.matches(TokenKind::Semicolon);
        Stmt {
            kind: StmtKind::VariableDeclaration { kind, declarators: self.arena.alloc_slice(declarators) },
            position,
        }
    }

    fn params_list(&mut self) -> &'a [Param<'a>] {
        self.expect(TokenKind::LeftParen, "'('");
        let mut params = Vec::new();
        while !self.check(TokenKind::RightParen) && !self.check(TokenKind::Eof) {
            let tok = self.expect(TokenKind::Identifier, "parameter name");
            let name = self.lexeme_symbol(&tok);
            let type_annotation = if self.matches(TokenKind::Colon) { Some(&*self.parse_type()) } else { None };
            params.push(Param { name, type_annotation });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RightParen, "')'");
        self.arena.alloc_slice(params)
    }

    fn function_declaration(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        let name_tok = self.expect(TokenKind::Identifier, "function name");
        let name = self.lexeme_symbol(&name_tok);
        let params = self.params_list();
        let return_type = if self.matches(TokenKind::Colon) { Some(&*self.parse_type()) } else { None };
        let body = self.block();
        Stmt {
            kind: StmtKind::FunctionDeclaration(self.arena.alloc(FunctionDecl { name, params, return_type, body })),
            position,
        }
    }

    fn visibility_and_modifiers(&mut self) -> (Visibility, bool, bool) {
        let mut visibility = Visibility::Public;
        let mut is_static = false;
        let mut is_readonly = false;
        loop {
            match self.peek_kind() {
                TokenKind::Public => {
                    self.advance();
                    visibility = Visibility::Public;
                }
                TokenKind::Private => {
                    self.advance();
                    visibility = Visibility::Private;
                }
                TokenKind::Protected => {
                    self.advance();
                    visibility = Visibility::Protected;
                }
                TokenKind::Static => {
                    self.advance();
                    is_static = true;
                }
                TokenKind::Readonly => {
                    self.advance();
                    is_readonly = true;
                }
                _ => break,
            }
        }
        (visibility, is_static, is_readonly)
    }

    fn class_declaration(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        let name_tok = self.expect(TokenKind::Identifier, "class name");
        let name = self.lexeme_symbol(&name_tok);

        let mut type_params = Vec::new();
        if self.matches(TokenKind::Less) {
            loop {
                let tok = self.expect(TokenKind::Identifier, "type parameter");
                type_params.push(self.lexeme_symbol(&tok));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::Greater, "'>'");
        }

        let superclass = if self.matches(TokenKind::Extends) {
            let tok = self.expect(TokenKind::Identifier, "superclass name");
            Some(self.lexeme_symbol(&tok))
        } else {
            None
        };

        let mut implements = Vec::new();
        if self.matches(TokenKind::Implements) {
            loop {
                let tok = self.expect(TokenKind::Identifier, "interface name");
                implements.push(self.lexeme_symbol(&tok));
                if !self.matches(TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::LeftBrace, "'{' before class body");
        let mut members = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            members.push(self.class_member());
        }
        self.expect(TokenKind::RightBrace, "'}' after class body");

        Stmt {
            kind: StmtKind::ClassDeclaration(self.arena.alloc(ClassDecl {
                name,
                type_params: self.arena.alloc_slice(type_params),
                superclass,
                implements: self.arena.alloc_slice(implements),
                members: self.arena.alloc_slice(members),
            })),
            position,
        }
    }

    fn class_member(&mut self) -> ClassMember<'a> {
        let (visibility, is_static, is_readonly) = self.visibility_and_modifiers();

        let is_getter = self.check(TokenKind::Get);
        let is_setter = self.check(TokenKind::Set);
        if is_getter || is_setter {
            self.advance();
        }

        if self.check(TokenKind::Constructor) {
            self.advance();
            let name = crate::intern::Symbol::EMPTY;
            let params = self.params_list();
            let body = self.block();
            return ClassMember::Constructor(ClassMethod {
                name,
                params,
                return_type: None,
                body,
                visibility,
                is_static,
                type_params: &[],
            });
        }

        let name_tok = self.expect(TokenKind::Identifier, "member name");
        let name = self.lexeme_symbol(&name_tok);

        if self.check(TokenKind::LeftParen) {
            let params = self.params_list();
            let return_type = if self.matches(TokenKind::Colon) { Some(&*self.parse_type()) } else { None };
            let body = self.block();
            let method = ClassMethod { name, params, return_type, body, visibility, is_static, type_params: &[] };
            return if is_getter {
                ClassMember::Getter(method)
            } else if is_setter {
                ClassMember::Setter(method)
            } else {
                ClassMember::Method(method)
            };
        }

        let type_annotation = if self.matches(TokenKind::Colon) { Some(&*self.parse_type()) } else { None };
        let initializer = if self.matches(TokenKind::Equal) { Some(&*self.assignment()) } else { None };
        self.matches(TokenKind::Semicolon);
        ClassMember::Property(ClassProperty { name, type_annotation, initializer, visibility, is_static, is_readonly })
    }

    fn interface_declaration(&mut self) -> Stmt<'a> {
        let position = self.position();
        self.advance();
        let name_tok = self.expect(TokenKind::Identifier, "interface name");
        let name = self.lexeme_symbol(&name_tok);
        self.expect(TokenKind::LeftBrace, "'{' before interface body");
        let mut members = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
            let member_tok = self.expect(TokenKind::Identifier, "member name");
            let member_name = self.lexeme_symbol(&member_tok);
            self.expect(TokenKind::Colon, "':' after member name");
            let type_annotation = self.parse_type();
            self.matches(TokenKind::Semicolon);
            self.matches(TokenKind::Comma);
            members.push(InterfaceMember { name: member_name, type_annotation });
        }
        self.expect(TokenKind::RightBrace, "'}' after interface body");
        Stmt {
            kind: StmtKind::InterfaceDeclaration(
                self.arena.alloc(InterfaceDecl { name, members: self.arena.alloc_slice(members) }),
            ),
            position,
        }
    }

    // ---- type annotations ----

    fn parse_type(&mut self) -> &'a TypeAnnotation<'a> {
        self.parse_union_type()
    }

    fn parse_union_type(&mut self) -> &'a TypeAnnotation<'a> {
        let mut members = vec![*self.parse_intersection_type()];
        while self.matches(TokenKind::Pipe) {
            members.push(*self.parse_intersection_type());
        }
        if members.len() == 1 {
            self.arena.alloc(members.pop().unwrap())
        } else {
            self.arena.alloc(TypeAnnotation::Union(self.arena.alloc_slice(members)))
        }
    }

    fn parse_intersection_type(&mut self) -> &'a TypeAnnotation<'a> {
        let mut members = vec![*self.parse_array_type()];
        while self.matches(TokenKind::Amp) {
            members.push(*self.parse_array_type());
        }
        if members.len() == 1 {
            self.arena.alloc(members.pop().unwrap())
        } else {
            self.arena.alloc(TypeAnnotation::Intersection(self.arena.alloc_slice(members)))
        }
    }

    fn parse_array_type(&mut self) -> &'a TypeAnnotation<'a> {
        let mut ty = self.parse_primary_type();
        while self.check(TokenKind::LeftBracket) {
            self.advance();
            self.expect(TokenKind::RightBracket, "']'");
            ty = self.arena.alloc(TypeAnnotation::Array(ty));
        }
        ty
    }

    fn parse_primary_type(&mut self) -> &'a TypeAnnotation<'a> {
        match self.peek_kind() {
            TokenKind::NumberType => {
                self.advance();
                self.arena.alloc(TypeAnnotation::Number)
            }
            TokenKind::StringType => {
                self.advance();
                self.arena.alloc(TypeAnnotation::String)
            }
            TokenKind::BooleanType => {
                self.advance();
                self.arena.alloc(TypeAnnotation::Boolean)
            }
            TokenKind::AnyType => {
                self.advance();
                self.arena.alloc(TypeAnnotation::Any)
            }
            TokenKind::UnknownType => {
                self.advance();
                self.arena.alloc(TypeAnnotation::Unknown)
            }
            TokenKind::NeverType => {
                self.advance();
                self.arena.alloc(TypeAnnotation::Never)
            }
            TokenKind::Void => {
                self.advance();
                self.arena.alloc(TypeAnnotation::Void)
            }
            TokenKind::LeftBrace => {
                self.advance();
                let mut props = Vec::new();
                while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                    let tok = self.expect(TokenKind::Identifier, "property name");
                    let name = self.lexeme_symbol(&tok);
                    self.expect(TokenKind::Colon, "':'");
                    let ty = *self.parse_type();
                    props.push((name, ty));
                    if !self.matches(TokenKind::Comma) && !self.matches(TokenKind::Semicolon) {
                        break;
                    }
                }
                self.expect(TokenKind::RightBrace, "'}'");
                self.arena.alloc(TypeAnnotation::Object(self.arena.alloc_slice(props)))
            }
            TokenKind::LeftParen => {
                self.advance();
                let mut params = Vec::new();
                while !self.check(TokenKind::RightParen) && !self.check(TokenKind::Eof) {
                    self.expect(TokenKind::Identifier, "parameter name");
                    self.expect(TokenKind::Colon, "':'");
                    params.push(*self.parse_type());
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RightParen, "')'");
                self.expect(TokenKind::Arrow, "'=>' in function type");
                let ret = self.parse_type();
                self.arena.alloc(TypeAnnotation::Function { params: self.arena.alloc_slice(params), ret })
            }
            TokenKind::Identifier => {
                let tok = self.advance();
                let name = self.lexeme_symbol(&tok);
                let type_args = if self.matches(TokenKind::Less) {
                    let mut args = Vec::new();
                    loop {
                        args.push(*self.parse_type());
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::Greater, "'>'");
                    self.arena.alloc_slice(args)
                } else {
                    &[]
                };
                self.arena.alloc(TypeAnnotation::Named { name, type_args })
            }
            _ => {
                self.error("expected a type");
                self.arena.alloc(TypeAnnotation::Any)
            }
        }
    }

    // ---- expressions ----

    fn expression(&mut self) -> &'a Expr<'a> {
        self.assignment()
    }

    fn assignment(&mut self) -> &'a Expr<'a> {
        let position = self.position();
        let expr = self.conditional();
        if let Some(op) = assign_op(self.peek_kind()) {
            self.advance();
            let value = self.assignment();
            return self.arena.alloc(Expr { kind: ExprKind::Assign { op, target: expr, value }, position });
        }
        expr
    }

    fn conditional(&mut self) -> &'a Expr<'a> {
        let position = self.position();
        let cond = self.binary(3);
        if self.matches(TokenKind::Question) {
            let then_branch = self.assignment();
            self.expect(TokenKind::Colon, "':' in conditional expression");
            let else_branch = self.assignment();
            return self.arena.alloc(Expr { kind: ExprKind::Conditional { cond, then_branch, else_branch }, position });
        }
        cond
    }

    fn binary(&mut self, min_prec: u8) -> &'a Expr<'a> {
        let mut left = self.unary();
        loop {
            let kind = self.peek_kind();
            let Some(prec) = infix_precedence(kind) else { break };
            if prec < min_prec {
                break;
            }
            let position = self.position();
            self.advance();
            let right = self.binary(prec + 1);
            left = match kind {
                TokenKind::InstanceOf => self.arena.alloc(Expr { kind: ExprKind::InstanceOf { left, right }, position }),
                TokenKind::EqualEqualEqual | TokenKind::BangEqualEqual => self.arena.alloc(Expr {
                    kind: ExprKind::StrictEqual { left, right, negate: kind == TokenKind::BangEqualEqual },
                    position,
                }),
                _ => {
                    let op = binop_from_token(kind);
                    self.arena.alloc(Expr { kind: ExprKind::Binary { op, left, right }, position })
                }
            };
        }
        left
    }

    fn unary(&mut self) -> &'a Expr<'a> {
        let position = self.position();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnaryOp::Negate),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::PlusPlus => Some(UnaryOp::Increment),
            TokenKind::MinusMinus => Some(UnaryOp::Decrement),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.unary();
            return self.arena.alloc(Expr { kind: ExprKind::Unary { op, operand, is_prefix: true }, position });
        }
        if self.matches(TokenKind::TypeOf) {
            let operand = self.unary();
            return self.arena.alloc(Expr {
                kind: ExprKind::Unary { op: UnaryOp::TypeOf, operand, is_prefix: true },
                position,
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> &'a Expr<'a> {
        let position = self.position();
        let mut expr = self.call();
        loop {
            match self.peek_kind() {
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = self.arena.alloc(Expr {
                        kind: ExprKind::Unary { op: UnaryOp::Increment, operand: expr, is_prefix: false },
                        position,
                    });
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = self.arena.alloc(Expr {
                        kind: ExprKind::Unary { op: UnaryOp::Decrement, operand: expr, is_prefix: false },
                        position,
                    });
                }
                _ => break,
            }
        }
        expr
    }

    fn call(&mut self) -> &'a Expr<'a> {
        let position = self.position();
        let mut expr = self.primary();
        loop {
            match self.peek_kind() {
                TokenKind::LeftParen => {
                    self.advance();
                    let mut args = Vec::new();
                    while !self.check(TokenKind::RightParen) && !self.check(TokenKind::Eof) {
                        args.push(*self.assignment());
                        if !self.matches(TokenKind::Comma) {
                            break;
                        }
                    }
                    self.expect(TokenKind::RightParen, "')' after arguments");
                    expr = self.arena.alloc(Expr {
                        kind: ExprKind::Call { callee: expr, args: self.arena.alloc_slice(args) },
                        position,
                    });
                }
                TokenKind::Dot => {
                    self.advance();
                    let tok = self.expect(TokenKind::Identifier, "property name after '.'");
                    let name = self.lexeme_symbol(&tok);
                    expr = self.arena.alloc(Expr {
                        kind: ExprKind::Member { object: expr, key: MemberKey::Name(name), optional: false },
                        position,
                    });
                }
                TokenKind::QuestionDot => {
                    self.advance();
                    let tok = self.expect(TokenKind::Identifier, "property name after '?.'");
                    let name = self.lexeme_symbol(&tok);
                    expr = self.arena.alloc(Expr {
                        kind: ExprKind::Member { object: expr, key: MemberKey::Name(name), optional: true },
                        position,
                    });
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.expression();
                    self.expect(TokenKind::RightBracket, "']' after index");
                    expr = self.arena.alloc(Expr {
                        kind: ExprKind::Member { object: expr, key: MemberKey::Computed(index), optional: false },
                        position,
                    });
                }
                TokenKind::As => {
                    self.advance();
                    let type_annotation = self.parse_type();
                    expr = self.arena.alloc(Expr { kind: ExprKind::TypeAssertion { expr, type_annotation }, position });
                }
                _ => break,
            }
        }
        expr
    }

    fn primary(&mut self) -> &'a Expr<'a> {
        let position = self.position();
        match self.peek_kind() {
            TokenKind::NumberLiteral => {
                let tok = self.advance();
                self.arena.alloc(Expr { kind: ExprKind::Literal(Literal::Number(tok.number_value.unwrap_or(0.0))), position })
            }
            TokenKind::StringLiteral | TokenKind::TemplateLiteral => {
                let tok = self.advance();
                let sym = tok.text.unwrap_or(crate::intern::Symbol::EMPTY);
                self.arena.alloc(Expr { kind: ExprKind::Literal(Literal::String(sym)), position })
            }
            TokenKind::True => {
                self.advance();
                self.arena.alloc(Expr { kind: ExprKind::Literal(Literal::Boolean(true)), position })
            }
            TokenKind::False => {
                self.advance();
                self.arena.alloc(Expr { kind: ExprKind::Literal(Literal::Boolean(false)), position })
            }
            TokenKind::Null => {
                self.advance();
                self.arena.alloc(Expr { kind: ExprKind::Literal(Literal::Null), position })
            }
            TokenKind::Undefined => {
                self.advance();
                self.arena.alloc(Expr { kind: ExprKind::Literal(Literal::Undefined), position })
            }
            TokenKind::This | TokenKind::Super | TokenKind::Identifier => {
                let tok = self.advance();
                let sym = tok.text.unwrap_or(crate::intern::Symbol::EMPTY);
                self.arena.alloc(Expr { kind: ExprKind::Identifier(sym), position })
            }
            TokenKind::New => {
                // `new Foo(args)` has no dedicated AST node: the VM's Call
                // opcode allocates an instance when the callee resolves to
                // a class, so `new` simply desugars to an ordinary call.
                self.advance();
                self.call()
            }
            TokenKind::LeftParen => {
                // Could be a parenthesized expression or an arrow function's
                // parameter list; a `=>` after the matching ')' disambiguates.
                let checkpoint = self.pos;
                if let Some(func) = self.try_arrow_function(position) {
                    return func;
                }
                self.pos = checkpoint;
                self.advance();
                let expr = self.expression();
                self.expect(TokenKind::RightParen, "')'");
                expr
            }
            TokenKind::Function => self.function_expression(position),
            TokenKind::LeftBracket => {
                self.advance();
                let mut elems = Vec::new();
                while !self.check(TokenKind::RightBracket) && !self.check(TokenKind::Eof) {
                    elems.push(*self.assignment());
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RightBracket, "']'");
                self.arena.alloc(Expr { kind: ExprKind::ArrayLiteral(self.arena.alloc_slice(elems)), position })
            }
            TokenKind::LeftBrace => {
                self.advance();
                let mut fields = Vec::new();
                while !self.check(TokenKind::RightBrace) && !self.check(TokenKind::Eof) {
                    let tok = self.expect(TokenKind::Identifier, "property name");
                    let name = self.lexeme_symbol(&tok);
                    self.expect(TokenKind::Colon, "':' after property name");
                    let value = self.assignment();
                    fields.push((name, *value));
                    if !self.matches(TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(TokenKind::RightBrace, "'}'");
                self.arena.alloc(Expr { kind: ExprKind::ObjectLiteral(self.arena.alloc_slice(fields)), position })
            }
            _ => {
                self.error("expected an expression");
                self.advance();
                self.arena.alloc(Expr { kind: ExprKind::Literal(Literal::Undefined), position })
            }
        }
    }

    fn try_arrow_function(&mut self, position: Position) -> Option<&'a Expr<'a>> {
        let params = self.try_params_list()?;
        if !self.matches(TokenKind::Arrow) {
            return None;
        }
        let body = if self.check(TokenKind::LeftBrace) {
            self.block()
        } else {
            let expr_pos = self.position();
            let expr = self.assignment();
            let ret = Stmt { kind: StmtKind::Return(Some(expr)), position: expr_pos };
            self.arena.alloc(Block { statements: self.arena.alloc_slice([ret]) })
        };
        Some(self.arena.alloc(Expr {
            kind: ExprKind::Function(self.arena.alloc(FunctionExpr {
                name: None,
                params,
                return_type: None,
                body,
                is_arrow: true,
            })),
            position,
        }))
    }

    /// Speculatively parses `(ident: Type, ...)`; returns `None` (leaving
    /// `self.pos` wherever it stopped — caller must restore a checkpoint) if
    /// the token stream isn't actually a parameter list.
    fn try_params_list(&mut self) -> Option<&'a [Param<'a>]> {
        if !self.check(TokenKind::LeftParen) {
            return None;
        }
        self.advance();
        let mut params = Vec::new();
        while !self.check(TokenKind::RightParen) {
            if !self.check(TokenKind::Identifier) {
                return None;
            }
            let tok = self.advance();
            let name = self.lexeme_symbol(&tok);
            let type_annotation = if self.matches(TokenKind::Colon) { Some(&*self.parse_type()) } else { None };
            params.push(Param { name, type_annotation });
            if !self.matches(TokenKind::Comma) {
                break;
            }
        }
        if !self.matches(TokenKind::RightParen) {
            return None;
        }
        Some(self.arena.alloc_slice(params))
    }

    fn function_expression(&mut self, position: Position) -> &'a Expr<'a> {
        self.advance();
        let name = if self.check(TokenKind::Identifier) {
            let tok = self.advance();
            Some(self.lexeme_symbol(&tok))
        } else {
            None
        };
        let params = self.params_list();
        let return_type = if self.matches(TokenKind::Colon) { Some(&*self.parse_type()) } else { None };
        let body = self.block();
        self.arena.alloc(Expr {
            kind: ExprKind::Function(self.arena.alloc(FunctionExpr { name, params, return_type, body, is_arrow: false })),
            position,
        })
    }
}

fn binop_from_token(kind: TokenKind) -> BinaryOp {
    use TokenKind::*;
    match kind {
        Plus => BinaryOp::Add,
        Minus => BinaryOp::Sub,
        Star => BinaryOp::Mul,
        Slash => BinaryOp::Div,
        Percent => BinaryOp::Mod,
        Less => BinaryOp::Less,
        LessEqual => BinaryOp::LessEqual,
        Greater => BinaryOp::Greater,
        GreaterEqual => BinaryOp::GreaterEqual,
        EqualEqual => BinaryOp::Equal,
        BangEqual => BinaryOp::NotEqual,
        AmpAmp => BinaryOp::And,
        PipePipe => BinaryOp::Or,
        Amp => BinaryOp::BitAnd,
        Pipe => BinaryOp::BitOr,
        Caret => BinaryOp::BitXor,
        Shl => BinaryOp::Shl,
        Shr => BinaryOp::Shr,
        UShr => BinaryOp::UShr,
        _ => unreachable!("not an infix operator token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intern::Interner;
    use crate::lexer::Lexer;

    fn parse_source<'a>(arena: &'a Arena, interner: &mut Interner, src: &'a str) -> (Program<'a>, Vec<Diagnostic>) {
        let tokens = Lexer::tokenize(src, interner);
        parse(src, &tokens, arena)
    }

    #[test]
    fn parses_variable_declaration_with_initializer() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, diags) = parse_source(&arena, &mut interner, "let x: number = 1 + 2;");
        assert!(diags.is_empty());
        assert_eq!(program.statements.len(), 1);
        assert!(matches!(program.statements[0].kind, StmtKind::VariableDeclaration { .. }));
    }

    #[test]
    fn parses_precedence_correctly() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, _) = parse_source(&arena, &mut interner, "1 + 2 * 3;");
        let StmtKind::Expression(e) = program.statements[0].kind else { panic!("expected expression statement") };
        assert_eq!(e.to_source_string(&interner), "(1 + (2 * 3))");
    }

    #[test]
    fn parses_if_else() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, diags) = parse_source(&arena, &mut interner, "if (x) { y(); } else { z(); }");
        assert!(diags.is_empty());
        assert!(matches!(program.statements[0].kind, StmtKind::If { .. }));
    }

    #[test]
    fn parses_while_loop() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, diags) = parse_source(&arena, &mut interner, "while (i < 10) { i = i + 1; }");
        assert!(diags.is_empty());
        assert!(matches!(program.statements[0].kind, StmtKind::While { .. }));
    }

    #[test]
    fn parses_function_declaration() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, diags) = parse_source(&arena, &mut interner, "function add(a: number, b: number): number { return a + b; }");
        assert!(diags.is_empty());
        assert!(matches!(program.statements[0].kind, StmtKind::FunctionDeclaration(_)));
    }

    #[test]
    fn parses_arrow_function_expression() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, diags) = parse_source(&arena, &mut interner, "let f = (x: number) => x + 1;");
        assert!(diags.is_empty());
        let StmtKind::VariableDeclaration { declarators, .. } = program.statements[0].kind else { panic!() };
        let init = declarators[0].initializer.unwrap();
        assert!(matches!(init.kind, ExprKind::Function(_)));
    }

    #[test]
    fn parses_instanceof_and_strict_equal_as_distinct_nodes() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, _) = parse_source(&arena, &mut interner, "a instanceof B;");
        let StmtKind::Expression(e) = program.statements[0].kind else { panic!() };
        assert!(matches!(e.kind, ExprKind::InstanceOf { .. }));

        let (program, _) = parse_source(&arena, &mut interner, "a === b;");
        let StmtKind::Expression(e) = program.statements[0].kind else { panic!() };
        assert!(matches!(e.kind, ExprKind::StrictEqual { negate: false, .. }));
    }

    #[test]
    fn reports_diagnostic_on_malformed_expression_and_recovers() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let (program, diags) = parse_source(&arena, &mut interner, "let x = ; let y = 2;");
        assert!(!diags.is_empty());
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn parses_class_with_constructor_and_method() {
        let arena = Arena::new();
        let mut interner = Interner::new();
        let src = "class Point { x: number; constructor(x: number) { this.x = x; } getX(): number { return this.x; } }";
        let (program, diags) = parse_source(&arena, &mut interner, src);
        assert!(diags.is_empty());
        let StmtKind::ClassDeclaration(c) = program.statements[0].kind else { panic!() };
        assert_eq!(c.members.len(), 3);
    }
}
