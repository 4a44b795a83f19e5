//! Recursive-descent / Pratt parser implementing the `parse` contract and
//! the panic-mode recovery loop.
//!
//! Grammar sketch (informal):
//!
//! ```text
//! program      := declaration* EOF
//! declaration  := "pub"? ( function | struct | enum | type_alias
//!                        | trait | impl | import | let_decl )
//! function     := "fn" IDENT generics? "(" params? ")" ("->" type)? block
//! struct       := "struct" IDENT generics? "{" (field ("," field)* ","?)? "}"
//! enum         := "enum" IDENT generics? "{" (variant ("," variant)* ","?)? "}"
//! type_expr    := IDENT ("<" type_expr ("," type_expr)* ">")?
//!               | "[" type_expr ";" const_expr "]"
//!               | "_"
//! const_expr   := const_term (("+" | "-") const_term)*
//! const_term   := const_atom (("*" | "/") const_atom)*
//! const_atom   := NUMBER | IDENT | "(" const_expr ")"
//! ```
//!
//! Expressions are parsed with precedence climbing (`parse_expr_bp`).

use crate::errors::ParseError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::nodes::*;
use std::sync::atomic::{AtomicU32, Ordering};

/// Parses `source`, applying panic-mode recovery up to `max_errors` times.
/// This is the crate's implementation of the `parse(source) -> AST |
/// ParseError` contract; callers that only care about the binary
/// success/failure shape can check [`ParseResult::success`].
#[must_use]
pub fn parse(source: &str) -> ParseResult {
    parse_with_max_errors(source, 25)
}

#[derive(Debug, Clone)]
pub struct ParseResult {
    pub program: Program,
    pub diagnostics: Vec<ParseError>,
}

impl ParseResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// The recovery loop: on failure, blank the input from the error offset
/// through the next synchronization point (replacing non-newline characters
/// with spaces to preserve line/column numbers) and retry, bounded by
/// `max_errors`. A sync point is the character after the nearest following
/// `;` or `}`, or the start of the next token in the sync set (the
/// top-level declaration keywords), whichever comes first. When the failure
/// lands exactly on a sync keyword, the broken input is the prefix behind
/// it, so that prefix is blanked back to the previous boundary instead and
/// the declaration at the keyword is preserved. Each iteration strictly
/// advances past the prior failure or the loop stops.
#[must_use]
pub fn parse_with_max_errors(source: &str, max_errors: usize) -> ParseResult {
    let mut buffer = source.as_bytes().to_vec();
    let mut diagnostics = Vec::new();
    let mut program = Program::default();
    let max_errors = max_errors.max(1);
    let mut last_error_offset = None;

    for _ in 0..max_errors {
        let text = String::from_utf8_lossy(&buffer).into_owned();
        let tokens = Lexer::new(&text).tokenize();
        let mut parser = Parser::new(tokens.clone());
        match parser.parse_program() {
            Ok(parsed) => {
                program = parsed;
                break;
            }
            Err(err) => {
                let offset = err.location.start.offset as usize;
                diagnostics.push(err);
                if last_error_offset == Some(offset) {
                    break;
                }
                last_error_offset = Some(offset);
                if sync_keyword_starts_at(&tokens, offset) {
                    let start = previous_boundary(&tokens, &buffer, offset);
                    blank_range(&mut buffer, start, offset);
                    continue;
                }
                let sync = find_sync_point(&tokens, &buffer, offset);
                if sync <= offset {
                    break;
                }
                blank_range(&mut buffer, offset, sync);
            }
        }
        if diagnostics.len() >= max_errors {
            break;
        }
    }

    ParseResult { program, diagnostics }
}

/// Tokens that begin a top-level declaration; together with `;`/`}` they
/// form the recovery sync set.
fn is_sync_keyword(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Fn
            | TokenKind::Struct
            | TokenKind::Enum
            | TokenKind::Trait
            | TokenKind::Impl
            | TokenKind::Type
            | TokenKind::Import
            | TokenKind::Let
            | TokenKind::Pub
    )
}

fn sync_keyword_starts_at(tokens: &[Token], offset: usize) -> bool {
    tokens
        .iter()
        .any(|t| t.location.start.offset as usize == offset && is_sync_keyword(&t.kind))
}

/// The nearest sync point after `from`: one past the next `;`/`}` byte, or
/// the start of the next sync-keyword token, whichever is closer.
fn find_sync_point(tokens: &[Token], buffer: &[u8], from: usize) -> usize {
    let mut sync = buffer.len();
    let mut i = from;
    while i < buffer.len() {
        if matches!(buffer[i], b';' | b'}') {
            sync = i + 1;
            break;
        }
        i += 1;
    }
    for token in tokens {
        let start = token.location.start.offset as usize;
        if start > from && start < sync && is_sync_keyword(&token.kind) {
            sync = start;
        }
    }
    sync
}

/// The last boundary before `before`: one past the nearest preceding
/// `;`/`}` byte or the start of the nearest preceding sync keyword, else
/// the start of input.
fn previous_boundary(tokens: &[Token], buffer: &[u8], before: usize) -> usize {
    let mut boundary = 0;
    for (i, b) in buffer.iter().enumerate().take(before) {
        if matches!(*b, b';' | b'}') {
            boundary = boundary.max(i + 1);
        }
    }
    for token in tokens {
        let start = token.location.start.offset as usize;
        if start < before && is_sync_keyword(&token.kind) {
            boundary = boundary.max(start);
        }
    }
    boundary
}

fn blank_range(buffer: &mut [u8], start: usize, end: usize) {
    let end = end.min(buffer.len());
    for b in &mut buffer[start..end] {
        if *b != b'\n' {
            *b = b' ';
        }
    }
}

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

fn next_id() -> u32 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn loc(&self) -> Location {
        self.current().location
    }

    fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.current().kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::expected_found(
                self.loc(),
                kind.to_string(),
                self.current().kind.to_string(),
            ))
        }
    }

    fn expect_ident(&mut self) -> PResult<String> {
        match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            other => Err(ParseError::expected_found(self.loc(), "identifier", other.to_string())),
        }
    }

    pub fn parse_program(&mut self) -> PResult<Program> {
        let mut declarations = Vec::new();
        while !self.check(&TokenKind::Eof) {
            declarations.push(self.parse_declaration()?);
        }
        Ok(Program { declarations })
    }

    fn parse_visibility(&mut self) -> Visibility {
        if self.eat(&TokenKind::Pub) {
            Visibility::Public
        } else {
            Visibility::Private
        }
    }

    fn parse_declaration(&mut self) -> PResult<Declaration> {
        let visibility = self.parse_visibility();
        match &self.current().kind {
            TokenKind::Fn => Ok(Declaration::Function(self.parse_function(visibility)?)),
            TokenKind::Struct => Ok(Declaration::Struct(self.parse_struct(visibility)?)),
            TokenKind::Enum => Ok(Declaration::Enum(self.parse_enum(visibility)?)),
            TokenKind::Type => Ok(Declaration::TypeAlias(self.parse_type_alias(visibility)?)),
            TokenKind::Trait => Ok(Declaration::Trait(self.parse_trait(visibility)?)),
            TokenKind::Impl => Ok(Declaration::Impl(self.parse_impl()?)),
            TokenKind::Import => Ok(Declaration::Import(self.parse_import()?)),
            TokenKind::Let => Ok(Declaration::Let(self.parse_top_level_let(visibility)?)),
            other => Err(ParseError::expected_found(self.loc(), "a declaration", other.to_string())),
        }
    }

    /// `<T, U, const N: i32>`
    fn parse_generics(&mut self) -> PResult<(Vec<String>, Vec<ConstParam>)> {
        let mut type_params = Vec::new();
        let mut const_params = Vec::new();
        if !self.eat(&TokenKind::Lt) {
            return Ok((type_params, const_params));
        }
        loop {
            let start = self.loc();
            if self.current().kind == TokenKind::Ident("const".to_string()) {
                self.advance();
                let name = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                const_params.push(ConstParam { id: next_id(), location: start, name, ty });
            } else {
                type_params.push(self.expect_ident()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt)?;
        Ok((type_params, const_params))
    }

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        if self.eat(&TokenKind::Underscore) {
            return Ok(TypeExpr::Hole);
        }
        if self.eat(&TokenKind::LBracket) {
            let element = Box::new(self.parse_type()?);
            let size = if self.eat(&TokenKind::Semicolon) {
                Some(self.parse_const_expr()?)
            } else {
                None
            };
            self.expect(TokenKind::RBracket)?;
            return Ok(TypeExpr::Array { element, size });
        }
        let name = self.expect_ident()?;
        let (args, const_args) = if self.eat(&TokenKind::Lt) {
            self.parse_angle_args()?
        } else {
            (Vec::new(), Vec::new())
        };
        Ok(TypeExpr::Named { name, args, const_args })
    }

    /// The argument list after a consumed `<`, through the closing `>`.
    /// Integer literals and parenthesized arithmetic are const arguments
    /// (`Buffer<4>`, `Grid<T, 2 * 2>`); everything else is a type argument.
    fn parse_angle_args(&mut self) -> PResult<(Vec<TypeExpr>, Vec<ConstExpr>)> {
        let mut args = Vec::new();
        let mut const_args = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::Number(_) | TokenKind::LParen => const_args.push(self.parse_const_expr()?),
                _ => args.push(self.parse_type()?),
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Gt)?;
        Ok((args, const_args))
    }

    fn parse_const_expr(&mut self) -> PResult<ConstExpr> {
        let mut left = self.parse_const_term()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Plus => ConstOp::Add,
                TokenKind::Minus => ConstOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_const_term()?;
            left = ConstExpr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_const_term(&mut self) -> PResult<ConstExpr> {
        let mut left = self.parse_const_atom()?;
        loop {
            let op = match self.current().kind {
                TokenKind::Star => ConstOp::Mul,
                TokenKind::Slash => ConstOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_const_atom()?;
            left = ConstExpr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_const_atom(&mut self) -> PResult<ConstExpr> {
        match self.current().kind.clone() {
            TokenKind::Number(text) => {
                self.advance();
                let value: i64 = text.parse().map_err(|_| {
                    ParseError::new(self.loc(), format!("invalid integer literal `{text}`"))
                })?;
                Ok(ConstExpr::IntLiteral(value))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(ConstExpr::ConstParamRef(name))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_const_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(inner)
            }
            other => Err(ParseError::expected_found(self.loc(), "a const expression", other.to_string())),
        }
    }

    fn parse_params(&mut self) -> PResult<(Option<SelfParam>, Vec<Param>)> {
        self.expect(TokenKind::LParen)?;
        let mut self_param = None;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                if self.check(&TokenKind::Self_) {
                    let loc = self.loc();
                    self.advance();
                    self_param = Some(SelfParam { id: next_id(), location: loc });
                } else {
                    let loc = self.loc();
                    let name = self.expect_ident()?;
                    self.expect(TokenKind::Colon)?;
                    let ty = self.parse_type()?;
                    params.push(Param { id: next_id(), location: loc, name, ty });
                }
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok((self_param, params))
    }

    fn parse_function(&mut self, visibility: Visibility) -> PResult<FunctionDecl> {
        let start = self.loc();
        self.expect(TokenKind::Fn)?;
        let name = self.expect_ident()?;
        let (type_params, const_params) = self.parse_generics()?;
        let (self_param, params) = self.parse_params()?;
        let return_type = if self.eat(&TokenKind::Arrow) {
            self.parse_type()?
        } else {
            TypeExpr::simple("void")
        };
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            id: next_id(),
            location: start,
            visibility,
            name,
            type_params,
            const_params,
            self_param,
            params,
            return_type,
            body,
        })
    }

    fn parse_struct(&mut self, visibility: Visibility) -> PResult<StructDecl> {
        let start = self.loc();
        self.expect(TokenKind::Struct)?;
        let name = self.expect_ident()?;
        let (type_params, const_params) = self.parse_generics()?;
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let floc = self.loc();
            let fname = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let ty = self.parse_type()?;
            fields.push(StructField { id: next_id(), location: floc, name: fname, ty });
            if !self.eat(&TokenKind::Comma) {
                self.eat(&TokenKind::Semicolon);
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(StructDecl { id: next_id(), location: start, visibility, name, type_params, const_params, fields })
    }

    fn parse_enum(&mut self, visibility: Visibility) -> PResult<EnumDecl> {
        let start = self.loc();
        self.expect(TokenKind::Enum)?;
        let name = self.expect_ident()?;
        let (type_params, _const_params) = self.parse_generics()?;
        self.expect(TokenKind::LBrace)?;
        let mut variants = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let vloc = self.loc();
            let vname = self.expect_ident()?;
            let mut payload = Vec::new();
            if self.eat(&TokenKind::LParen) {
                if !self.check(&TokenKind::RParen) {
                    loop {
                        payload.push(self.parse_type()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RParen)?;
            }
            variants.push(EnumVariant { id: next_id(), location: vloc, name: vname, payload });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(EnumDecl { id: next_id(), location: start, visibility, name, type_params, variants })
    }

    fn parse_type_alias(&mut self, visibility: Visibility) -> PResult<TypeAliasDecl> {
        let start = self.loc();
        self.expect(TokenKind::Type)?;
        let name = self.expect_ident()?;
        let (type_params, _const_params) = self.parse_generics()?;
        self.expect(TokenKind::Eq)?;
        let aliased = self.parse_type()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(TypeAliasDecl { id: next_id(), location: start, visibility, name, type_params, aliased })
    }

    fn parse_trait(&mut self, visibility: Visibility) -> PResult<TraitDecl> {
        let start = self.loc();
        self.expect(TokenKind::Trait)?;
        let name = self.expect_ident()?;
        self.expect(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let mloc = self.loc();
            self.expect(TokenKind::Fn)?;
            let mname = self.expect_ident()?;
            let (self_param, params) = self.parse_params()?;
            let return_type = if self.eat(&TokenKind::Arrow) {
                self.parse_type()?
            } else {
                TypeExpr::simple("void")
            };
            self.expect(TokenKind::Semicolon)?;
            methods.push(TraitMethodSig {
                id: next_id(),
                location: mloc,
                name: mname,
                has_self: self_param.is_some(),
                params,
                return_type,
            });
        }
        self.expect(TokenKind::RBrace)?;
        Ok(TraitDecl { id: next_id(), location: start, visibility, name, methods })
    }

    fn parse_impl(&mut self) -> PResult<ImplDecl> {
        let start = self.loc();
        self.expect(TokenKind::Impl)?;
        let first = self.parse_type()?;
        let (trait_name, for_type) = if self.eat(&TokenKind::For) {
            let TypeExpr::Named { name, .. } = &first else {
                return Err(ParseError::new(start, "trait name in `impl ... for ...` must be a named type"));
            };
            (Some(name.clone()), self.parse_type()?)
        } else {
            (None, first)
        };
        self.expect(TokenKind::LBrace)?;
        let mut methods = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            methods.push(self.parse_function(Visibility::Public)?);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(ImplDecl { id: next_id(), location: start, trait_name, for_type, methods })
    }

    fn parse_import(&mut self) -> PResult<ImportDecl> {
        let start = self.loc();
        self.expect(TokenKind::Import)?;
        let mut names = Vec::new();
        let mut glob = false;
        self.expect(TokenKind::LBrace)?;
        if self.eat(&TokenKind::Star) {
            glob = true;
        } else if !self.check(&TokenKind::RBrace) {
            loop {
                names.push(self.expect_ident()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RBrace)?;
        self.expect(TokenKind::From)?;
        let source = match self.current().kind.clone() {
            TokenKind::Str(s) => {
                self.advance();
                s
            }
            other => return Err(ParseError::expected_found(self.loc(), "a module path string", other.to_string())),
        };
        self.expect(TokenKind::Semicolon)?;
        Ok(ImportDecl { id: next_id(), location: start, names, glob, source })
    }

    fn parse_top_level_let(&mut self, visibility: Visibility) -> PResult<TopLevelLetDecl> {
        let start = self.loc();
        self.expect(TokenKind::Let)?;
        let name = self.expect_ident()?;
        let ty = if self.eat(&TokenKind::Colon) { Some(self.parse_type()?) } else { None };
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(TopLevelLetDecl { id: next_id(), location: start, visibility, name, ty, value })
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.loc();
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            statements.push(self.parse_statement()?);
        }
        let close = self.expect(TokenKind::RBrace)?;
        // The block's span runs from `{` through `}` so callers can hash the
        // body's exact source text for incremental reuse.
        let location = Location::new(start.start, close.location.end);
        Ok(Block { id: next_id(), location, statements })
    }

    fn parse_statement(&mut self) -> PResult<Statement> {
        match &self.current().kind {
            TokenKind::Let => self.parse_let_stmt(),
            TokenKind::Return => self.parse_return_stmt(),
            TokenKind::If => self.parse_if_stmt(),
            TokenKind::While => self.parse_while_stmt(),
            TokenKind::Match => self.parse_match_stmt(),
            TokenKind::Break => {
                let loc = self.loc();
                self.advance();
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Break(BreakStmt { id: next_id(), location: loc }))
            }
            TokenKind::Assert => {
                let loc = self.loc();
                self.advance();
                self.expect(TokenKind::LParen)?;
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Semicolon)?;
                Ok(Statement::Assert(AssertStmt { id: next_id(), location: loc, expr }))
            }
            _ => self.parse_expr_or_assign_stmt(),
        }
    }

    fn parse_let_stmt(&mut self) -> PResult<Statement> {
        let start = self.loc();
        self.expect(TokenKind::Let)?;
        let name = self.expect_ident()?;
        let ty = if self.eat(&TokenKind::Colon) { Some(self.parse_type()?) } else { None };
        self.expect(TokenKind::Eq)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::Semicolon)?;
        Ok(Statement::Let(LetStmt { id: next_id(), location: start, name, ty, value }))
    }

    fn parse_return_stmt(&mut self) -> PResult<Statement> {
        let start = self.loc();
        self.expect(TokenKind::Return)?;
        let value = if self.check(&TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon)?;
        Ok(Statement::Return(ReturnStmt { id: next_id(), location: start, value }))
    }

    fn parse_if_stmt(&mut self) -> PResult<Statement> {
        let start = self.loc();
        self.expect(TokenKind::If)?;
        let cond = self.parse_expr()?;
        let then_branch = self.parse_block()?;
        let else_branch = if self.eat(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                let nested = self.parse_if_stmt()?;
                let Statement::If(inner) = nested else { unreachable!() };
                Some(Block {
                    id: next_id(),
                    location: inner.location,
                    statements: vec![Statement::If(inner)],
                })
            } else {
                Some(self.parse_block()?)
            }
        } else {
            None
        };
        Ok(Statement::If(IfStmt { id: next_id(), location: start, cond, then_branch, else_branch }))
    }

    fn parse_while_stmt(&mut self) -> PResult<Statement> {
        let start = self.loc();
        self.expect(TokenKind::While)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(Statement::While(WhileStmt { id: next_id(), location: start, cond, body }))
    }

    fn parse_pattern(&mut self) -> PResult<Pattern> {
        if self.eat(&TokenKind::Underscore) {
            return Ok(Pattern::Wildcard);
        }
        let name = self.expect_ident()?;
        let mut bindings = Vec::new();
        if self.eat(&TokenKind::LParen) {
            if !self.check(&TokenKind::RParen) {
                loop {
                    bindings.push(self.expect_ident()?);
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        Ok(Pattern::Variant { name, bindings })
    }

    fn parse_match_stmt(&mut self) -> PResult<Statement> {
        let start = self.loc();
        self.expect(TokenKind::Match)?;
        let scrutinee = self.parse_expr()?;
        self.expect(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let aloc = self.loc();
            let pattern = self.parse_pattern()?;
            self.expect(TokenKind::FatArrow)?;
            let body = self.parse_block()?;
            arms.push(MatchArmStmt { id: next_id(), location: aloc, pattern, body });
            self.eat(&TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Statement::Match(MatchStmtNode { id: next_id(), location: start, scrutinee, arms }))
    }

    /// Disambiguates a bare expression statement from an assignment by
    /// parsing the left-hand expression first and checking for `=`.
    fn parse_expr_or_assign_stmt(&mut self) -> PResult<Statement> {
        let start = self.loc();
        let expr = self.parse_expr()?;
        if self.eat(&TokenKind::Eq) {
            let value = self.parse_expr()?;
            self.expect(TokenKind::Semicolon)?;
            Ok(Statement::Assign(AssignStmt { id: next_id(), location: start, target: expr, value }))
        } else {
            self.expect(TokenKind::Semicolon)?;
            Ok(Statement::Expr(ExprStmtNode { id: next_id(), location: start, expr }))
        }
    }

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_pipeline()
    }

    fn parse_pipeline(&mut self) -> PResult<Expr> {
        let mut left = self.parse_binary_expr(0)?;
        while self.eat(&TokenKind::PipeGt) {
            let start = left.location();
            let call = self.parse_binary_expr(0)?;
            left = Expr::Pipeline(PipelineExpr {
                id: next_id(),
                location: start,
                value: Box::new(left),
                call: Box::new(call),
            });
        }
        Ok(left)
    }

    fn binding_power(kind: &TokenKind) -> Option<(u8, BinaryOp)> {
        Some(match kind {
            TokenKind::OrOr => (1, BinaryOp::Or),
            TokenKind::AndAnd => (2, BinaryOp::And),
            TokenKind::EqEq => (3, BinaryOp::Eq),
            TokenKind::NotEq => (3, BinaryOp::NotEq),
            TokenKind::Lt => (4, BinaryOp::Lt),
            TokenKind::LtEq => (4, BinaryOp::LtEq),
            TokenKind::Gt => (4, BinaryOp::Gt),
            TokenKind::GtEq => (4, BinaryOp::GtEq),
            TokenKind::Plus => (5, BinaryOp::Add),
            TokenKind::Minus => (5, BinaryOp::Sub),
            TokenKind::Star => (6, BinaryOp::Mul),
            TokenKind::Slash => (6, BinaryOp::Div),
            TokenKind::Percent => (6, BinaryOp::Mod),
            _ => return None,
        })
    }

    /// Precedence-climbing binary expression parser.
    fn parse_binary_expr(&mut self, min_bp: u8) -> PResult<Expr> {
        let mut left = self.parse_unary_expr()?;
        while let Some((bp, op)) = Self::binding_power(&self.current().kind) {
            if bp < min_bp {
                break;
            }
            let start = left.location();
            self.advance();
            let right = self.parse_binary_expr(bp + 1)?;
            left = Expr::Binary(BinaryExpr {
                id: next_id(),
                location: start,
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> PResult<Expr> {
        let start = self.loc();
        if self.eat(&TokenKind::Minus) {
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::Unary(UnaryExpr { id: next_id(), location: start, op: UnaryOp::Neg, operand: Box::new(operand) }));
        }
        if self.eat(&TokenKind::Not) {
            let operand = self.parse_unary_expr()?;
            return Ok(Expr::Unary(UnaryExpr { id: next_id(), location: start, op: UnaryOp::Not, operand: Box::new(operand) }));
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            let start = expr.location();
            if self.eat(&TokenKind::Dot) {
                let member = self.expect_ident()?;
                if self.check(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    let callee = Expr::Member(MemberExpr { id: next_id(), location: start, object: Box::new(expr), member });
                    expr = Expr::Call(CallExpr { id: next_id(), location: start, callee: Box::new(callee), args });
                } else {
                    expr = Expr::Member(MemberExpr { id: next_id(), location: start, object: Box::new(expr), member });
                }
            } else if self.check(&TokenKind::LParen) {
                let args = self.parse_call_args()?;
                expr = Expr::Call(CallExpr { id: next_id(), location: start, callee: Box::new(expr), args });
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                expr = Expr::Index(IndexExpr { id: next_id(), location: start, object: Box::new(expr), index: Box::new(index) });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn parse_call_args(&mut self) -> PResult<Vec<Expr>> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    fn parse_primary_expr(&mut self) -> PResult<Expr> {
        let start = self.loc();
        match self.current().kind.clone() {
            TokenKind::Number(text) => {
                self.advance();
                Ok(Expr::Number(NumberLiteral { id: next_id(), location: start, text }))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Bool(BoolLiteral { id: next_id(), location: start, value: true }))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Bool(BoolLiteral { id: next_id(), location: start, value: false }))
            }
            TokenKind::Str(value) => {
                self.advance();
                Ok(Expr::Str(StringLiteral { id: next_id(), location: start, value }))
            }
            TokenKind::Self_ => {
                self.advance();
                Ok(Expr::Ident(Identifier { id: next_id(), location: start, name: "self".to_string() }))
            }
            TokenKind::Match => self.parse_match_expr(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                Ok(Expr::Paren(ParenExpr { id: next_id(), location: start, inner: Box::new(inner) }))
            }
            TokenKind::LBracket => {
                self.advance();
                let mut elements = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr()?);
                        if !self.eat(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket)?;
                Ok(Expr::ArrayLit(ArrayLiteralExpr { id: next_id(), location: start, elements }))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LBrace) && Self::looks_like_struct_literal(&self.tokens, self.pos) {
                    let fields = self.parse_struct_literal_fields()?;
                    Ok(Expr::StructLit(StructLiteralExpr {
                        id: next_id(),
                        location: start,
                        name,
                        type_args: Vec::new(),
                        const_args: Vec::new(),
                        fields,
                    }))
                } else if self.check(&TokenKind::Lt) && Self::looks_like_generic_struct_literal(&self.tokens, self.pos) {
                    self.advance();
                    let (type_args, const_args) = self.parse_angle_args()?;
                    let fields = self.parse_struct_literal_fields()?;
                    Ok(Expr::StructLit(StructLiteralExpr {
                        id: next_id(),
                        location: start,
                        name,
                        type_args,
                        const_args,
                        fields,
                    }))
                } else {
                    Ok(Expr::Ident(Identifier { id: next_id(), location: start, name }))
                }
            }
            other => Err(ParseError::expected_found(start, "an expression", other.to_string())),
        }
    }

    fn parse_struct_literal_fields(&mut self) -> PResult<Vec<(String, Expr)>> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let fname = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            fields.push((fname, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(fields)
    }

    /// `Name { ... }` is a struct literal only when the brace is immediately
    /// followed by `ident :` or an immediate `}` (empty struct); this avoids
    /// swallowing a following block, e.g. `if cond { ... }`.
    fn looks_like_struct_literal(tokens: &[Token], open_brace_pos: usize) -> bool {
        match tokens.get(open_brace_pos + 1).map(|t| &t.kind) {
            Some(TokenKind::RBrace) => true,
            Some(TokenKind::Ident(_)) => matches!(tokens.get(open_brace_pos + 2).map(|t| &t.kind), Some(TokenKind::Colon)),
            _ => false,
        }
    }

    /// `Name<...> { ... }` is a struct literal only when the angle-bracket
    /// run starting at `lt_pos` contains nothing but type/const-argument
    /// tokens, closes, and is immediately followed by a struct-literal
    /// brace; otherwise `<` is the comparison operator.
    fn looks_like_generic_struct_literal(tokens: &[Token], lt_pos: usize) -> bool {
        let mut depth = 0usize;
        let mut i = lt_pos;
        while let Some(token) = tokens.get(i) {
            match &token.kind {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(tokens.get(i + 1).map(|t| &t.kind), Some(TokenKind::LBrace))
                            && Self::looks_like_struct_literal(tokens, i + 1);
                    }
                }
                TokenKind::Ident(_)
                | TokenKind::Number(_)
                | TokenKind::Comma
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::LBracket
                | TokenKind::RBracket
                | TokenKind::Semicolon
                | TokenKind::Underscore => {}
                _ => return false,
            }
            i += 1;
        }
        false
    }

    fn parse_match_expr(&mut self) -> PResult<Expr> {
        let start = self.loc();
        self.expect(TokenKind::Match)?;
        let scrutinee = self.parse_expr()?;
        self.expect(TokenKind::LBrace)?;
        let mut arms = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let aloc = self.loc();
            let pattern = self.parse_pattern()?;
            self.expect(TokenKind::FatArrow)?;
            let body = self.parse_expr()?;
            arms.push(MatchArmExpr { id: next_id(), location: aloc, pattern, body: Box::new(body) });
            self.eat(&TokenKind::Comma);
        }
        self.expect(TokenKind::RBrace)?;
        Ok(Expr::Match(MatchExprNode { id: next_id(), location: start, scrutinee: Box::new(scrutinee), arms }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_function() {
        let result = parse("fn main() { let x = 1 + 2; return x * 3; }");
        assert!(result.success(), "{:?}", result.diagnostics);
        assert_eq!(result.program.functions().len(), 1);
        assert_eq!(result.program.main_function().unwrap().name, "main");
    }

    #[test]
    fn parses_if_else_with_assign() {
        let result = parse("fn main(flag: bool){ let x = 0; if(flag){ x = 1; } else { x = 2; } return x; }");
        assert!(result.success(), "{:?}", result.diagnostics);
        let f = &result.program.functions()[0];
        assert_eq!(f.body.statements.len(), 3);
    }

    #[test]
    fn parses_generic_function() {
        let result = parse("fn id<T>(x: T) -> T { return x; }");
        assert!(result.success(), "{:?}", result.diagnostics);
        assert_eq!(result.program.functions()[0].type_params, vec!["T"]);
    }

    #[test]
    fn parses_const_generic_struct() {
        let result = parse("struct Buf<const N: i32> { data: [i32; N] }");
        assert!(result.success(), "{:?}", result.diagnostics);
    }

    #[test]
    fn parses_const_generic_struct_literal_with_explicit_argument() {
        let src = "struct Buf<const N: i32> { data: [i32; N] }\nfn main() -> i32 { let b = Buf<4> { data: [1, 2, 3, 4] }; return 0; }";
        let result = parse(src);
        assert!(result.success(), "{:?}", result.diagnostics);
        let main = result.program.main_function().unwrap();
        let Statement::Let(let_stmt) = &main.body.statements[0] else { panic!("expected let") };
        let Expr::StructLit(lit) = &let_stmt.value else { panic!("expected struct literal") };
        assert_eq!(lit.name, "Buf");
        assert_eq!(lit.const_args, vec![ConstExpr::IntLiteral(4)]);
        assert!(lit.type_args.is_empty());
    }

    #[test]
    fn parses_const_generic_type_reference() {
        let result = parse("struct Buf<const N: i32> { data: [i32; N] }\nfn first(b: Buf<4>) -> i32 { return b.data[0]; }");
        assert!(result.success(), "{:?}", result.diagnostics);
        let f = result.program.functions()[0];
        let TypeExpr::Named { name, const_args, .. } = &f.params[0].ty else { panic!("expected named type") };
        assert_eq!(name, "Buf");
        assert_eq!(const_args, &vec![ConstExpr::IntLiteral(4)]);
    }

    #[test]
    fn comparison_is_not_mistaken_for_a_generic_literal() {
        let result = parse("fn lt(a: i32, b: i32) -> bool { return a < b; }");
        assert!(result.success(), "{:?}", result.diagnostics);
    }

    #[test]
    fn parses_enum_with_payload() {
        let result = parse("enum Option<T> { Some(T), None }");
        assert!(result.success(), "{:?}", result.diagnostics);
        let Declaration::Enum(e) = &result.program.declarations[0] else { panic!("expected enum") };
        assert_eq!(e.variants[0].name, "Some");
        assert_eq!(e.variants[0].payload.len(), 1);
        assert_eq!(e.variants[1].name, "None");
        assert!(e.variants[1].payload.is_empty());
    }

    #[test]
    fn parses_trait_and_impl() {
        let src = "trait P { fn p(self) -> void; } struct U{name:string} impl P for U { fn p(self){ } }";
        let result = parse(src);
        assert!(result.success(), "{:?}", result.diagnostics);
    }

    #[test]
    fn parses_match_statement() {
        let src = "fn f(o: Option) { match o { Some(x) => { return; } None => { return; } } }";
        let result = parse(src);
        assert!(result.success(), "{:?}", result.diagnostics);
    }

    #[test]
    fn parses_pipeline_operator() {
        let result = parse("fn main() { let y = 1 |> add(2); return y; }");
        assert!(result.success(), "{:?}", result.diagnostics);
    }

    #[test]
    fn recovers_from_syntax_error_and_bounds_errors() {
        let src = "fn broken( { return 1; } fn ok() { return 2; }";
        let result = parse_with_max_errors(src, 5);
        assert!(!result.diagnostics.is_empty());
        assert!(result.diagnostics.len() <= 5);
        assert!(result.program.functions().iter().any(|f| f.name == "ok"), "{:?}", result.program);
    }

    #[test]
    fn recovery_syncs_on_declaration_keyword_before_any_semicolon() {
        // The only `;` ahead of the error is inside `ok`'s body; the `fn`
        // keyword must win the sync so `ok` survives.
        let src = "struct Broken( fn ok() -> i32 { return 1; }";
        let result = parse_with_max_errors(src, 25);
        assert!(!result.diagnostics.is_empty());
        assert!(result.program.functions().iter().any(|f| f.name == "ok"), "{:?}", result.program);
    }

    #[test]
    fn package_import_parses() {
        let result = parse("import { x } from \"pkg\";");
        assert!(result.success(), "{:?}", result.diagnostics);
    }
}
