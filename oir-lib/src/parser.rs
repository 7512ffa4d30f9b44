use core::mem::discriminant;
use std::collections::HashMap;

use itertools::Itertools;
use utils::DiagnosticEmitter;

use crate::{
    ir::{
        self, BinaryOp, CallKind, ClassId, Exp, FieldId, Invoke, MethodId, MethodRef, Program,
        Stmt, Type, VarId, normalize_subsignature,
    },
    lexer::{Identifier, IdentifierTable, LexResult, Token, TokenValue},
};

use TokenValue::*;

/// A method whose body still needs to be parsed, starting at the token
/// `body_start`.
struct PendingBody {
    method: MethodId,
    body_start: usize,
}

/// Builds a [`Program`] from tokens. Declarations are collected in a first
/// pass that skips method bodies, so bodies can refer to classes, fields,
/// and methods declared anywhere in the source.
pub struct Parser<'src> {
    current_tok: usize,
    tokens: Vec<Token>,
    identifiers: IdentifierTable,
    program: Program,
    diag: &'src mut DiagnosticEmitter,
}

impl<'src> Parser<'src> {
    pub fn new(lexed: LexResult, diag: &'src mut DiagnosticEmitter) -> Self {
        let LexResult {
            tokens,
            identifiers,
        } = lexed;

        Parser {
            current_tok: 0,
            tokens,
            identifiers,
            program: Program::default(),
            diag,
        }
    }

    pub fn parse(mut self) -> Option<Program> {
        let mut bodies = Vec::new();
        while !self.is_at_end() {
            self.parse_class(&mut bodies)?;
        }

        for PendingBody { method, body_start } in bodies {
            self.current_tok = body_start;
            self.parse_body(method)?;
        }

        self.program.finish();
        Some(self.program)
    }

    ////////////////////////////////////////////////////
    // Declarations                                   //
    ////////////////////////////////////////////////////

    fn parse_class(&mut self, bodies: &mut Vec<PendingBody>) -> Option<()> {
        let is_abstract = self.try_consume(Abstract).is_some();
        let is_interface = if self.try_consume(Interface).is_some() {
            true
        } else {
            self.consume(Class, "'class' or 'interface' expected.")?;
            false
        };
        let (name_tok, name) = self.consume_identifier()?;
        let class = self.program.class_or_phantom(&name);
        if !self.program.class(class).is_phantom {
            self.error(name_tok, &format!("Class '{name}' is already declared."));
            return None;
        }

        let mut super_class = None;
        let mut interfaces = Vec::new();
        if self.try_consume(Extends).is_some() {
            if is_interface {
                interfaces = self.parse_class_list()?;
            } else {
                let (_, super_name) = self.consume_identifier()?;
                super_class = Some(self.program.class_or_phantom(&super_name));
            }
        }
        if !is_interface && self.try_consume(Implements).is_some() {
            interfaces = self.parse_class_list()?;
        }

        let declared = self.program.class_mut(class);
        declared.is_phantom = false;
        declared.is_interface = is_interface;
        declared.is_abstract = is_abstract || is_interface;
        declared.super_class = super_class;
        declared.interfaces = interfaces;

        self.consume(LeftBrace, "")?;
        while !self.check(RightBrace) {
            if self.is_at_end() {
                self.error(self.peek(), "'}' expected.");
                return None;
            }
            self.parse_member(class, bodies)?;
        }
        self.consume(RightBrace, "")?;
        Some(())
    }

    fn parse_class_list(&mut self) -> Option<Vec<ClassId>> {
        let mut result = Vec::new();
        loop {
            let (_, name) = self.consume_identifier()?;
            result.push(self.program.class_or_phantom(&name));
            if self.try_consume(Comma).is_none() {
                return Some(result);
            }
        }
    }

    fn parse_member(&mut self, class: ClassId, bodies: &mut Vec<PendingBody>) -> Option<()> {
        let is_static = self.try_consume(Static).is_some();
        let is_abstract = self.try_consume(Abstract).is_some();

        if self.try_consume(Field).is_some() {
            let ty = self.parse_type()?;
            let (name_tok, name) = self.consume_identifier()?;
            self.consume(Semicolon, "")?;
            let duplicate = self
                .program
                .class(class)
                .fields
                .iter()
                .any(|&f| self.program.field(f).name == name);
            if duplicate {
                self.error(name_tok, &format!("Field '{name}' is already declared."));
                return None;
            }
            self.program.add_field(class, &name, ty, is_static);
            return Some(());
        }

        let Some(method_tok) = self.try_consume(Method) else {
            self.error(self.peek(), "'field' or 'method' expected.");
            return None;
        };
        let ret_type = self.parse_type()?;
        let (name_tok, name) = self.consume_identifier()?;
        self.consume(LeftParen, "")?;
        let mut params = Vec::new();
        if !self.check(RightParen) {
            loop {
                let ty = self.parse_type()?;
                let (_, param) = self.consume_identifier()?;
                params.push((param, ty));
                if self.try_consume(Comma).is_none() {
                    break;
                }
            }
        }
        self.consume(RightParen, "")?;

        let param_types: Vec<Type> = params.iter().map(|(_, ty)| ty.clone()).collect();
        let subsig = format!(
            "{} {name}({})",
            self.program.type_name(&ret_type),
            param_types.iter().map(|ty| self.program.type_name(ty)).join(",")
        );
        let subsignature = self.program.intern_subsignature(&subsig);
        if self.program.class(class).declared_method(subsignature).is_some() {
            self.error(name_tok, &format!("Method '{subsig}' is already declared."));
            return None;
        }

        let is_interface = self.program.class(class).is_interface;
        let has_body = self.check(LeftBrace);
        if has_body && is_abstract {
            self.error(method_tok, "Abstract method cannot have a body.");
            return None;
        }

        let method = self.program.add_method(ir::Method {
            name,
            class,
            subsignature,
            param_types,
            ret_type,
            is_static,
            is_abstract: is_abstract || (is_interface && !has_body),
            this: None,
            params: Vec::new(),
            vars: Vec::new(),
            stmts: Vec::new(),
            stmt_lines: Vec::new(),
            return_vars: Vec::new(),
        });
        if !is_static {
            let this = self.program.add_var(method, "this", Type::Class(class));
            self.program.method_mut(method).this = Some(this);
        }
        for (param, ty) in params {
            let var = self.program.add_var(method, &param, ty);
            self.program.method_mut(method).params.push(var);
        }

        if has_body {
            bodies.push(PendingBody {
                method,
                body_start: self.current_tok,
            });
            self.skip_body()?;
        } else {
            self.consume(Semicolon, "';' or method body expected.")?;
        }
        Some(())
    }

    /// Skip a brace-delimited block in the declaration pass.
    fn skip_body(&mut self) -> Option<()> {
        let open = self.consume(LeftBrace, "")?;
        let mut depth = 1;
        while depth > 0 {
            if self.is_at_end() {
                self.error(open, "Unterminated method body.");
                return None;
            }
            match self.advance().value {
                LeftBrace => depth += 1,
                RightBrace => depth -= 1,
                _ => {}
            }
        }
        Some(())
    }

    fn parse_type(&mut self) -> Option<Type> {
        let tok = self.advance();
        let mut ty = match tok.value {
            Int => Type::Int,
            Boolean => Type::Boolean,
            Byte => Type::Byte,
            Short => Type::Short,
            Char => Type::Char,
            Long => Type::Long,
            Float => Type::Float,
            Double => Type::Double,
            Void => Type::Void,
            Ident(id) => {
                let name = self.identifiers.get_name(id).to_owned();
                Type::Class(self.program.class_or_phantom(&name))
            }
            _ => {
                self.error(tok, "Type expected.");
                return None;
            }
        };
        while self.check(LeftBracket) && self.check_next(RightBracket) {
            self.advance();
            self.advance();
            ty = Type::Array(Box::new(ty));
        }
        Some(ty)
    }

    ////////////////////////////////////////////////////
    // Method bodies                                  //
    ////////////////////////////////////////////////////

    fn parse_body(&mut self, method: MethodId) -> Option<()> {
        let mut scope: HashMap<String, VarId> = self
            .program
            .method(method)
            .vars
            .iter()
            .map(|&v| (self.program.var_name(v).to_owned(), v))
            .collect();
        let mut labels: HashMap<Identifier, usize> = HashMap::new();
        let mut label_defs: Vec<Token> = Vec::new();
        let mut stmts = Vec::new();
        let mut lines = Vec::new();
        let mut jump_labels: Vec<Vec<Token>> = Vec::new();

        self.consume(LeftBrace, "")?;
        while !self.check(RightBrace) {
            if self.is_at_end() {
                self.error(self.peek(), "'}' expected.");
                return None;
            }

            if self.try_consume(Var).is_some() {
                let ty = self.parse_type()?;
                loop {
                    let (name_tok, name) = self.consume_identifier()?;
                    if scope.contains_key(&name) {
                        self.error(name_tok, &format!("Variable '{name}' is already declared."));
                        return None;
                    }
                    let var = self.program.add_var(method, &name, ty.clone());
                    scope.insert(name, var);
                    if self.try_consume(Comma).is_none() {
                        break;
                    }
                }
                self.consume(Semicolon, "")?;
                continue;
            }

            if let Ident(label) = self.peek().value {
                if self.check_next(Colon) {
                    let label_tok = self.advance();
                    self.advance();
                    if labels.insert(label, stmts.len()).is_some() {
                        self.error(label_tok, "Duplicate label.");
                        return None;
                    }
                    label_defs.push(label_tok);
                    continue;
                }
            }

            let line = self.peek().line_num.0;
            let (stmt, targets) = self.parse_stmt(method, &scope)?;
            stmts.push(stmt);
            lines.push(line);
            jump_labels.push(targets);
        }
        self.consume(RightBrace, "")?;

        for label_tok in label_defs {
            if let Ident(label) = label_tok.value {
                if labels[&label] == stmts.len() {
                    self.error(label_tok, "Label must precede a statement.");
                    return None;
                }
            }
        }

        for (stmt, tokens) in stmts.iter_mut().zip(&jump_labels) {
            for (target, &label_tok) in stmt.targets_mut().into_iter().zip(tokens) {
                let Ident(label) = label_tok.value else {
                    continue;
                };
                let Some(&index) = labels.get(&label) else {
                    self.error(label_tok, "Undefined label.");
                    return None;
                };
                *target = index;
            }
        }

        let return_vars = stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Return(Some(var)) => Some(*var),
                _ => None,
            })
            .collect();
        let body = self.program.method_mut(method);
        body.stmts = stmts;
        body.stmt_lines = lines;
        body.return_vars = return_vars;
        Some(())
    }

    /// Parse a single statement. Also returns the label tokens of jump
    /// targets in the order they appear, the targets themselves are patched
    /// once every label of the body is known.
    fn parse_stmt(
        &mut self,
        method: MethodId,
        scope: &HashMap<String, VarId>,
    ) -> Option<(Stmt, Vec<Token>)> {
        let tok = self.peek();
        let result = match tok.value {
            Ident(_) => (self.parse_assignment(scope)?, Vec::new()),
            StaticInvoke | SpecialInvoke | VirtualInvoke | InterfaceInvoke | DynamicInvoke => {
                let invoke = self.parse_invoke(scope, None)?;
                (Stmt::Invoke(invoke), Vec::new())
            }
            If => {
                self.advance();
                let lhs = self.consume_var(scope)?;
                let op_tok = self.advance();
                let Some(op) = binary_op(op_tok.value).filter(|op| op.is_comparison()) else {
                    self.error(op_tok, "Comparison operator expected.");
                    return None;
                };
                let rhs = self.consume_var(scope)?;
                self.consume(Goto, "")?;
                let label = self.consume_label()?;
                let stmt = Stmt::If {
                    lhs,
                    op,
                    rhs,
                    target: 0,
                };
                (stmt, vec![label])
            }
            Goto => {
                self.advance();
                let label = self.consume_label()?;
                (Stmt::Goto { target: 0 }, vec![label])
            }
            Switch => {
                self.advance();
                self.consume(LeftParen, "")?;
                let var = self.consume_var(scope)?;
                self.consume(RightParen, "")?;
                self.consume(LeftBrace, "")?;
                let mut cases = Vec::new();
                let mut labels = Vec::new();
                while self.try_consume(Case).is_some() {
                    let value_tok = self.advance();
                    let Integer(value) = value_tok.value else {
                        self.error(value_tok, "Integer expected.");
                        return None;
                    };
                    self.consume(Colon, "")?;
                    labels.push(self.consume_label()?);
                    self.consume(Semicolon, "")?;
                    cases.push((value, 0));
                }
                self.consume(Default, "'case' or 'default' expected.")?;
                self.consume(Colon, "")?;
                labels.push(self.consume_label()?);
                self.consume(Semicolon, "")?;
                self.consume(RightBrace, "")?;
                let stmt = Stmt::Switch {
                    var,
                    cases,
                    default: 0,
                };
                // The closing brace already ends the statement.
                return Some((stmt, labels));
            }
            Return => {
                self.advance();
                if self.check(Semicolon) {
                    if self.program.method(method).ret_type != Type::Void {
                        self.error(tok, "Return value expected.");
                        return None;
                    }
                    (Stmt::Return(None), Vec::new())
                } else {
                    (Stmt::Return(Some(self.consume_var(scope)?)), Vec::new())
                }
            }
            Nop => {
                self.advance();
                (Stmt::Nop, Vec::new())
            }
            _ => {
                self.error(tok, "Statement expected.");
                return None;
            }
        };
        self.consume(Semicolon, "")?;
        Some(result)
    }

    /// Statements starting with an identifier: stores and assignments.
    fn parse_assignment(&mut self, scope: &HashMap<String, VarId>) -> Option<Stmt> {
        let (first_tok, first) = self.consume_identifier()?;

        if self.try_consume(Dot).is_some() {
            let (field_tok, field_name) = self.consume_identifier()?;
            let (base, field) =
                self.resolve_field_access(scope, first_tok, &first, field_tok, &field_name)?;
            self.consume(Assign, "")?;
            let rhs = self.consume_var(scope)?;
            return Some(Stmt::StoreField { base, field, rhs });
        }

        let lhs = self.lookup_var(scope, first_tok, &first)?;
        if self.try_consume(LeftBracket).is_some() {
            let index = self.consume_var(scope)?;
            self.consume(RightBracket, "")?;
            self.consume(Assign, "")?;
            let rhs = self.consume_var(scope)?;
            return Some(Stmt::StoreArray {
                base: lhs,
                index,
                rhs,
            });
        }

        self.consume(Assign, "")?;
        let tok = self.peek();
        match tok.value {
            New => {
                self.advance();
                let ty = self.parse_type()?;
                if self.try_consume(LeftBracket).is_some() {
                    let length = self.consume_var(scope)?;
                    self.consume(RightBracket, "")?;
                    return Some(Stmt::New {
                        lhs,
                        ty: Type::Array(Box::new(ty)),
                        length: Some(length),
                    });
                }
                Some(Stmt::New {
                    lhs,
                    ty,
                    length: None,
                })
            }
            Integer(value) => {
                self.advance();
                Some(Stmt::Assign {
                    lhs,
                    rhs: Exp::Int(value),
                })
            }
            LeftParen => {
                self.advance();
                let ty = self.parse_type()?;
                self.consume(RightParen, "")?;
                let operand = self.consume_var(scope)?;
                Some(Stmt::Assign {
                    lhs,
                    rhs: Exp::Cast(ty, operand),
                })
            }
            StaticInvoke | SpecialInvoke | VirtualInvoke | InterfaceInvoke | DynamicInvoke => {
                Some(Stmt::Invoke(self.parse_invoke(scope, Some(lhs))?))
            }
            Ident(_) => {
                let (src_tok, src) = self.consume_identifier()?;
                if self.try_consume(Dot).is_some() {
                    let (field_tok, field_name) = self.consume_identifier()?;
                    let (base, field) =
                        self.resolve_field_access(scope, src_tok, &src, field_tok, &field_name)?;
                    return Some(Stmt::LoadField { lhs, base, field });
                }
                let operand = self.lookup_var(scope, src_tok, &src)?;
                if self.try_consume(LeftBracket).is_some() {
                    let index = self.consume_var(scope)?;
                    self.consume(RightBracket, "")?;
                    return Some(Stmt::LoadArray {
                        lhs,
                        base: operand,
                        index,
                    });
                }
                if let Some(op) = binary_op(self.peek().value) {
                    self.advance();
                    let rhs = self.consume_var(scope)?;
                    return Some(Stmt::Assign {
                        lhs,
                        rhs: Exp::Binary(op, operand, rhs),
                    });
                }
                Some(Stmt::Assign {
                    lhs,
                    rhs: Exp::Var(operand),
                })
            }
            _ => {
                self.error(tok, "Expression expected.");
                None
            }
        }
    }

    /// `base.field` where `base` is either a variable or a class name.
    fn resolve_field_access(
        &mut self,
        scope: &HashMap<String, VarId>,
        base_tok: Token,
        base: &str,
        field_tok: Token,
        field_name: &str,
    ) -> Option<(Option<VarId>, FieldId)> {
        let (var, class) = if let Some(&var) = scope.get(base) {
            let Some(class) = self.program.var(var).ty.class() else {
                self.error(base_tok, "Field access on a non-class type.");
                return None;
            };
            (Some(var), class)
        } else if let Some(class) = self.program.class_by_name(base) {
            (None, class)
        } else {
            self.error(base_tok, &format!("Undeclared variable or class '{base}'."));
            return None;
        };

        let Some(field) = self.program.resolve_field(class, field_name) else {
            let class_name = &self.program.class(class).name;
            let msg = format!("Unknown field '{field_name}' in class '{class_name}'.");
            self.error(field_tok, &msg);
            return None;
        };
        if self.program.field(field).is_static != var.is_none() {
            self.error(
                field_tok,
                "Static fields are accessed through the class, instance fields through a variable.",
            );
            return None;
        }
        Some((var, field))
    }

    fn parse_invoke(
        &mut self,
        scope: &HashMap<String, VarId>,
        result: Option<VarId>,
    ) -> Option<Invoke> {
        let kind_tok = self.advance();
        let kind = match kind_tok.value {
            StaticInvoke => CallKind::Static,
            SpecialInvoke => CallKind::Special,
            VirtualInvoke => CallKind::Virtual,
            InterfaceInvoke => CallKind::Interface,
            _ => CallKind::Dynamic,
        };
        let base = match kind {
            CallKind::Static | CallKind::Dynamic => None,
            _ => {
                let base = self.consume_var(scope)?;
                self.consume(Dot, "")?;
                Some(base)
            }
        };

        let sig_tok = self.advance();
        let Signature(sig) = sig_tok.value else {
            self.error(sig_tok, "Method signature expected.");
            return None;
        };
        let text = self.identifiers.get_name(sig).to_owned();
        let Some((class_name, subsig)) = text.split_once(':') else {
            self.error(sig_tok, "Malformed method signature.");
            return None;
        };
        let subsig = normalize_subsignature(subsig);
        let Some(param_list) = subsig
            .split_once('(')
            .and_then(|(_, rest)| rest.strip_suffix(')'))
        else {
            self.error(sig_tok, "Malformed method signature.");
            return None;
        };
        let arity = param_list.split(',').filter(|p| !p.is_empty()).count();
        let method_ref = MethodRef {
            class: self.program.class_or_phantom(class_name.trim()),
            subsignature: self.program.intern_subsignature(&subsig),
        };

        self.consume(LeftParen, "")?;
        let mut args = Vec::new();
        if !self.check(RightParen) {
            loop {
                args.push(self.consume_var(scope)?);
                if self.try_consume(Comma).is_none() {
                    break;
                }
            }
        }
        let close = self.consume(RightParen, "")?;
        if args.len() != arity {
            self.error(close, &format!("Expected {arity} arguments, found {}.", args.len()));
            return None;
        }

        Some(Invoke {
            kind,
            method_ref,
            base,
            args,
            result,
        })
    }

    ////////////////////////////////////////////////////
    // Token helpers                                  //
    ////////////////////////////////////////////////////

    fn consume_var(&mut self, scope: &HashMap<String, VarId>) -> Option<VarId> {
        let (tok, name) = self.consume_identifier()?;
        self.lookup_var(scope, tok, &name)
    }

    fn lookup_var(
        &mut self,
        scope: &HashMap<String, VarId>,
        tok: Token,
        name: &str,
    ) -> Option<VarId> {
        if let Some(&var) = scope.get(name) {
            return Some(var);
        }
        self.error(tok, "Undeclared variable.");
        None
    }

    fn consume_label(&mut self) -> Option<Token> {
        if let Ident(_) = self.peek().value {
            return Some(self.advance());
        }
        self.error(self.peek(), "Label expected.");
        None
    }

    fn consume_identifier(&mut self) -> Option<(Token, String)> {
        if let Ident(id) = self.peek().value {
            let token = self.advance();
            return Some((token, self.identifiers.get_name(id).to_owned()));
        }
        self.error(self.peek(), "Identifier expected.");
        None
    }

    fn peek(&self) -> Token {
        self.tokens[self.current_tok]
    }

    fn is_at_end(&self) -> bool {
        self.peek().value == EndOfFile
    }

    fn check(&self, tok_val: TokenValue) -> bool {
        discriminant(&self.peek().value) == discriminant(&tok_val)
    }

    fn check_next(&self, tok_val: TokenValue) -> bool {
        self.tokens
            .get(self.current_tok + 1)
            .is_some_and(|tok| discriminant(&tok.value) == discriminant(&tok_val))
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek();
        if !self.is_at_end() {
            self.current_tok += 1;
        }
        tok
    }

    fn consume(&mut self, tok_val: TokenValue, s: &str) -> Option<Token> {
        if self.check(tok_val) {
            return Some(self.advance());
        }
        let msg = if s.is_empty() {
            format!("'{tok_val}' expected.")
        } else {
            s.to_owned()
        };
        self.error(self.peek(), &msg);
        None
    }

    fn try_consume(&mut self, tok_val: TokenValue) -> Option<Token> {
        if self.check(tok_val) {
            return Some(self.advance());
        }
        None
    }

    fn error(&mut self, tok: Token, s: &str) {
        if tok.value == EndOfFile {
            self.diag.report(tok.line_num.0, "at end", s);
        } else {
            let text = self.identifiers.describe(tok.value);
            self.diag.report(tok.line_num.0, &format!("at '{text}'"), s);
        }
    }
}

fn binary_op(value: TokenValue) -> Option<BinaryOp> {
    let op = match value {
        Plus => BinaryOp::Add,
        Minus => BinaryOp::Sub,
        Star => BinaryOp::Mul,
        Slash => BinaryOp::Div,
        Percent => BinaryOp::Rem,
        Amp => BinaryOp::And,
        Pipe => BinaryOp::Or,
        Caret => BinaryOp::Xor,
        TokenValue::Shl => BinaryOp::Shl,
        TokenValue::Shr => BinaryOp::Shr,
        TokenValue::Ushr => BinaryOp::Ushr,
        EqEq => BinaryOp::Eq,
        NotEq => BinaryOp::Ne,
        Less => BinaryOp::Lt,
        Greater => BinaryOp::Gt,
        LessEq => BinaryOp::Le,
        GreaterEq => BinaryOp::Ge,
        _ => return None,
    };
    Some(op)
}
