// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! The parser implementation using Pratt parsing for expressions.

use solar_ast::expr::{BinOp, Expr, ExprKind};
use solar_ast::stmt::{FnDecl, ImportDecl, Param, Stmt, StmtKind};
use solar_ast::token::{Token, TokenKind};
use solar_ast::{NodeId, Span, Type};

/// The parser for Solar source code.
///
/// Fails on the first syntactic error; there is no local recovery.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Counter for generating unique NodeIds
    next_node_id: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_first_id(tokens, 0)
    }

    /// A parser whose NodeIds start at `first_id`.
    ///
    /// The module resolver parses imported files with fresh id ranges so
    /// spliced nodes never collide with the main program's ids.
    pub fn with_first_id(tokens: Vec<Token>, first_id: u32) -> Self {
        Self { tokens, pos: 0, next_node_id: first_id }
    }

    /// The first id not handed out yet.
    pub fn next_unused_id(&self) -> u32 {
        self.next_node_id
    }

    /// Parse an ordered sequence of top-level statements.
    pub fn parse(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        while !self.at_end() {
            stmts.push(self.parse_stmt()?);
        }
        Ok(stmts)
    }

    // =========================================================================
    // Token Navigation
    // =========================================================================

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or_else(|| self.tokens.last().unwrap())
    }

    fn current_kind(&self) -> &TokenKind {
        &self.current().kind
    }

    fn peek(&self, n: usize) -> &TokenKind {
        self.tokens.get(self.pos + n).map(|t| &t.kind).unwrap_or(&TokenKind::Eof)
    }

    fn at_end(&self) -> bool {
        matches!(self.current_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.at_end() {
            self.pos += 1;
        }
        self.tokens.get(self.pos - 1).unwrap()
    }

    fn prev_span_end(&self) -> usize {
        self.tokens[self.pos.saturating_sub(1)].span.end
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.current_kind()) == std::mem::discriminant(kind)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Result<&Token, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(ParseError::expected(
                kind.display_name(),
                self.current_kind(),
                self.current().span,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<String, ParseError> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::expected(
                "a name",
                self.current_kind(),
                self.current().span,
            )),
        }
    }

    /// Expression, assignment, and `retornar` statements must end with `;`,
    /// `}`, or end of input. Only `;` is consumed.
    fn expect_terminator(&mut self) -> Result<(), ParseError> {
        if self.check(&TokenKind::Semi) {
            self.advance();
            Ok(())
        } else if self.check(&TokenKind::Eof) || self.check(&TokenKind::RBrace) {
            Ok(())
        } else {
            Err(ParseError::expected(
                "';'",
                self.current_kind(),
                self.current().span,
            ))
        }
    }

    fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }

    // =========================================================================
    // Statement Parsing
    // =========================================================================

    fn parse_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span.start;

        let kind = match self.current_kind() {
            TokenKind::Se => self.parse_if_stmt()?,
            TokenKind::Enquanto => self.parse_while_stmt()?,
            TokenKind::Para => self.parse_for_stmt()?,
            TokenKind::Definir => self.parse_fn_decl()?,
            TokenKind::Retornar => {
                let kind = self.parse_return_stmt()?;
                self.expect_terminator()?;
                kind
            }
            TokenKind::Importar => {
                let kind = self.parse_import_stmt()?;
                self.expect_terminator()?;
                kind
            }
            _ => {
                let kind = self.parse_expr_or_assign()?;
                self.expect_terminator()?;
                kind
            }
        };

        Ok(Stmt {
            id: self.next_id(),
            kind,
            span: Span::new(start, self.prev_span_end()),
        })
    }

    /// An assignment `name [: type] ~> value`, or a bare expression.
    fn parse_expr_or_assign(&mut self) -> Result<StmtKind, ParseError> {
        if matches!(self.current_kind(), TokenKind::Ident(_))
            && matches!(self.peek(1), TokenKind::Assign | TokenKind::Colon)
        {
            let name = self.expect_ident()?;
            let ty = if self.match_token(&TokenKind::Colon) {
                Some(self.parse_type_annotation()?)
            } else {
                None
            };
            self.expect(&TokenKind::Assign)?;
            let value = self.parse_expr()?;
            return Ok(StmtKind::Assign { name, ty, value });
        }

        Ok(StmtKind::Expr(self.parse_expr()?))
    }

    fn parse_type_annotation(&mut self) -> Result<Type, ParseError> {
        let span = self.current().span;
        let name = self.expect_ident()?;
        name.parse::<Type>().map_err(|()| {
            ParseError::new(format!("unknown type name '{}'", name), span)
                .with_hint("valid types are inteiro, decimal, texto, booleano, vazio")
        })
    }

    fn parse_if_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Se)?;
        let cond = self.parse_expr()?;
        let then_block = self.parse_block()?;
        let else_block = if self.match_token(&TokenKind::Senao) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(StmtKind::If { cond, then_block, else_block })
    }

    fn parse_while_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Enquanto)?;
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        Ok(StmtKind::While { cond, body })
    }

    /// `para (init; cond; step) { body }` — each clause may be empty.
    fn parse_for_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Para)?;
        self.expect(&TokenKind::LParen)?;

        let init = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_clause_stmt()?))
        };
        self.expect(&TokenKind::Semi)?;

        let cond = if self.check(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semi)?;

        let step = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_clause_stmt()?))
        };
        self.expect(&TokenKind::RParen)?;

        let body = self.parse_block()?;
        Ok(StmtKind::For { init, cond, step, body })
    }

    /// A `para` clause: an assignment or expression with no terminator.
    fn parse_clause_stmt(&mut self) -> Result<Stmt, ParseError> {
        let start = self.current().span.start;
        let kind = self.parse_expr_or_assign()?;
        Ok(Stmt {
            id: self.next_id(),
            kind,
            span: Span::new(start, self.prev_span_end()),
        })
    }

    fn parse_fn_decl(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Definir)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let pname = self.expect_ident()?;
                let ty = if self.match_token(&TokenKind::Colon) {
                    self.parse_type_annotation()?
                } else {
                    Type::Integer
                };
                params.push(Param { name: pname, ty });
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;

        let ret_ty = if self.match_token(&TokenKind::Colon) {
            self.parse_type_annotation()?
        } else {
            Type::Integer
        };

        let body = self.parse_block()?;
        Ok(StmtKind::Fn(FnDecl { name, params, ret_ty, body }))
    }

    fn parse_return_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Retornar)?;
        let value = if self.check(&TokenKind::Semi)
            || self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::Eof)
        {
            None
        } else {
            Some(self.parse_expr()?)
        };
        Ok(StmtKind::Return(value))
    }

    fn parse_import_stmt(&mut self) -> Result<StmtKind, ParseError> {
        self.expect(&TokenKind::Importar)?;

        let mut symbols = vec![self.expect_import_symbol()?];
        while self.match_token(&TokenKind::Comma) {
            symbols.push(self.expect_import_symbol()?);
        }

        self.expect(&TokenKind::De)?;
        let module = self.expect_ident()?;
        Ok(StmtKind::Import(ImportDecl { symbols, module }))
    }

    /// Imported symbols may shadow built-in names (e.g. `imprime` from `io`),
    /// which the lexer has already classified as function tokens.
    fn expect_import_symbol(&mut self) -> Result<String, ParseError> {
        match self.current_kind().clone() {
            TokenKind::Ident(name) | TokenKind::Function(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::expected(
                "a symbol name",
                self.current_kind(),
                self.current().span,
            )),
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            if self.at_end() {
                return Err(ParseError::expected(
                    "'}'",
                    self.current_kind(),
                    self.current().span,
                ));
            }
            stmts.push(self.parse_stmt()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(stmts)
    }

    // =========================================================================
    // Expression Parsing (Pratt Parser)
    // =========================================================================

    pub fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        self.parse_expr_bp(0)
    }

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr, ParseError> {
        let start = self.current().span.start;
        let mut lhs = self.parse_prefix()?;

        while let Some((l_bp, r_bp)) = infix_bp(self.current_kind()) {
            if l_bp < min_bp {
                break;
            }

            let op = binop_for(self.current_kind());
            self.advance();
            let rhs = self.parse_expr_bp(r_bp)?;
            let end = rhs.span.end;
            lhs = Expr {
                id: self.next_id(),
                kind: ExprKind::Binary {
                    op,
                    left: Box::new(lhs),
                    right: Box::new(rhs),
                },
                span: Span::new(start, end),
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr, ParseError> {
        let start = self.current().span.start;

        match self.current_kind().clone() {
            TokenKind::Int(n) => {
                self.advance();
                Ok(self.literal(ExprKind::Int(n), start))
            }
            TokenKind::Float(n) => {
                self.advance();
                Ok(self.literal(ExprKind::Float(n), start))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(self.literal(ExprKind::Str(s), start))
            }
            TokenKind::Verdadeiro => {
                self.advance();
                Ok(self.literal(ExprKind::Bool(true), start))
            }
            TokenKind::Falso => {
                self.advance();
                Ok(self.literal(ExprKind::Bool(false), start))
            }

            // Unary minus exists only as a prefix of a numeric literal
            TokenKind::Minus => {
                self.advance();
                match self.current_kind().clone() {
                    TokenKind::Int(n) => {
                        self.advance();
                        Ok(self.literal(ExprKind::Int(-n), start))
                    }
                    TokenKind::Float(n) => {
                        self.advance();
                        Ok(self.literal(ExprKind::Float(-n), start))
                    }
                    _ => Err(ParseError::expected(
                        "a numeric literal after '-'",
                        self.current_kind(),
                        self.current().span,
                    )
                    .with_hint("unary minus only negates literals; write `0 - x` to negate a variable")),
                }
            }

            TokenKind::Ident(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.parse_call(name, start)
                } else {
                    Ok(self.literal(ExprKind::Var(name), start))
                }
            }

            TokenKind::Function(name) => {
                self.advance();
                if self.check(&TokenKind::LParen) {
                    self.parse_call(name, start)
                } else {
                    Err(ParseError::new(
                        format!("built-in function '{}' must be called", name),
                        Span::new(start, self.prev_span_end()),
                    )
                    .with_hint("add an argument list, e.g. `imprime(42)`"))
                }
            }

            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                // Reuse the inner node; grouping has no AST representation
                Ok(inner)
            }

            _ => Err(ParseError::expected(
                "an expression",
                self.current_kind(),
                self.current().span,
            )),
        }
    }

    fn parse_call(&mut self, callee: String, start: usize) -> Result<Expr, ParseError> {
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.match_token(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        Ok(Expr {
            id: self.next_id(),
            kind: ExprKind::Call { callee, args },
            span: Span::new(start, self.prev_span_end()),
        })
    }

    fn literal(&mut self, kind: ExprKind, start: usize) -> Expr {
        Expr {
            id: self.next_id(),
            kind,
            span: Span::new(start, self.prev_span_end()),
        }
    }
}

/// Infix binding powers, low to high: comparison, additive, multiplicative,
/// exponentiation. Exponentiation binds right (its right power is lower
/// than its left); everything else binds left.
fn infix_bp(kind: &TokenKind) -> Option<(u8, u8)> {
    match kind {
        TokenKind::EqEq
        | TokenKind::BangEq
        | TokenKind::Lt
        | TokenKind::Gt
        | TokenKind::LtEq
        | TokenKind::GtEq => Some((1, 2)),
        TokenKind::Plus | TokenKind::Minus => Some((3, 4)),
        TokenKind::Star | TokenKind::Slash => Some((5, 6)),
        TokenKind::StarStar => Some((8, 7)),
        _ => None,
    }
}

fn binop_for(kind: &TokenKind) -> BinOp {
    match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::StarStar => BinOp::Pow,
        TokenKind::EqEq => BinOp::Eq,
        TokenKind::BangEq => BinOp::Ne,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::LtEq => BinOp::Le,
        TokenKind::GtEq => BinOp::Ge,
        _ => unreachable!("infix_bp admitted a non-operator token"),
    }
}

/// A parser error with location and friendly message.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub span: Span,
    pub message: String,
    pub hint: Option<String>,
}

impl ParseError {
    fn new(message: impl Into<String>, span: Span) -> Self {
        Self { span, message: message.into(), hint: None }
    }

    fn expected(what: &str, found: &TokenKind, span: Span) -> Self {
        Self::new(
            format!("expected {}, found {}", what, found.display_name()),
            span,
        )
    }

    fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use solar_lexer::Lexer;
    use solar_stdlib::default_builtins;

    fn parse(source: &str) -> Vec<Stmt> {
        try_parse(source).expect("parsing failed")
    }

    fn try_parse(source: &str) -> Result<Vec<Stmt>, ParseError> {
        let registry = default_builtins();
        let tokens = Lexer::new(source, &registry).tokenize().expect("lexing failed");
        Parser::new(tokens).parse()
    }

    fn parse_one_expr(source: &str) -> Expr {
        let stmts = parse(source);
        assert_eq!(stmts.len(), 1);
        match stmts.into_iter().next().unwrap().kind {
            StmtKind::Expr(e) => e,
            other => panic!("expected expression statement, got {:?}", other),
        }
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse_one_expr("2 + 3 * 4;");
        assert_eq!(expr.to_string(), "(2 + (3 * 4))");
    }

    #[test]
    fn exponentiation_is_right_associative() {
        let expr = parse_one_expr("2 ** 3 ** 2;");
        assert_eq!(expr.to_string(), "(2 ** (3 ** 2))");
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = parse_one_expr("10 - 3 - 2;");
        assert_eq!(expr.to_string(), "((10 - 3) - 2)");
    }

    #[test]
    fn comparison_binds_loosest() {
        let expr = parse_one_expr("1 + 2 < 3 * 4;");
        assert_eq!(expr.to_string(), "((1 + 2) < (3 * 4))");
    }

    #[test]
    fn comparison_chains_left() {
        let expr = parse_one_expr("1 < 2 == verdadeiro;");
        assert_eq!(expr.to_string(), "((1 < 2) == verdadeiro)");
    }

    #[test]
    fn parentheses_override_precedence() {
        let expr = parse_one_expr("(2 + 3) * 4;");
        assert_eq!(expr.to_string(), "((2 + 3) * 4)");
    }

    #[test]
    fn expression_rendering_reparses_equivalently() {
        for source in ["2 + 3 * 4;", "2 ** 3 ** 2;", "10 - 3 - 2 < 4;", "soma(1, 2) * abs(-3);"] {
            let first = parse_one_expr(source);
            let second = parse_one_expr(&format!("{};", first));
            assert_eq!(first.to_string(), second.to_string(), "source: {}", source);
        }
    }

    #[test]
    fn negated_literals() {
        let expr = parse_one_expr("-5 + 2;");
        assert_eq!(expr.to_string(), "(-5 + 2)");
        let expr = parse_one_expr("-2.5;");
        assert!(matches!(expr.kind, ExprKind::Float(v) if v == -2.5));
    }

    #[test]
    fn unary_minus_on_variable_is_rejected() {
        let err = try_parse("x ~> 1; imprime(-x);").unwrap_err();
        assert!(err.message.contains("numeric literal"), "{}", err.message);
    }

    #[test]
    fn assignment_with_and_without_annotation() {
        let stmts = parse("x ~> 1; y: decimal ~> 2.5;");
        match &stmts[0].kind {
            StmtKind::Assign { name, ty, .. } => {
                assert_eq!(name, "x");
                assert_eq!(*ty, None);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &stmts[1].kind {
            StmtKind::Assign { name, ty, .. } => {
                assert_eq!(name, "y");
                assert_eq!(*ty, Some(Type::Decimal));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_type_annotation_is_rejected() {
        let err = try_parse("x: numero ~> 1;").unwrap_err();
        assert!(err.message.contains("unknown type name"));
    }

    #[test]
    fn if_with_optional_else() {
        let stmts = parse("se n > 5 { imprime(1); } senao { imprime(0); }");
        match &stmts[0].kind {
            StmtKind::If { else_block, .. } => assert!(else_block.is_some()),
            other => panic!("unexpected {:?}", other),
        }

        let stmts = parse("se n > 5 { imprime(1); }");
        match &stmts[0].kind {
            StmtKind::If { else_block, .. } => assert!(else_block.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn function_declaration_defaults() {
        let stmts = parse("definir quad(x: inteiro): inteiro { retornar x * x; }");
        match &stmts[0].kind {
            StmtKind::Fn(decl) => {
                assert_eq!(decl.name, "quad");
                assert_eq!(decl.params.len(), 1);
                assert_eq!(decl.params[0].ty, Type::Integer);
                assert_eq!(decl.ret_ty, Type::Integer);
            }
            other => panic!("unexpected {:?}", other),
        }

        // Omitted annotations default to integer
        let stmts = parse("definir f(a, b) { retornar a + b; }");
        match &stmts[0].kind {
            StmtKind::Fn(decl) => {
                assert_eq!(decl.params[1].ty, Type::Integer);
                assert_eq!(decl.ret_ty, Type::Integer);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn for_clauses_may_be_empty() {
        let stmts = parse("para (i ~> 0; i < 3; i ~> i + 1) { imprime(i); }");
        match &stmts[0].kind {
            StmtKind::For { init, cond, step, .. } => {
                assert!(init.is_some());
                assert!(cond.is_some());
                assert!(step.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }

        let stmts = parse("para (;;) { retornar; }");
        match &stmts[0].kind {
            StmtKind::For { init, cond, step, .. } => {
                assert!(init.is_none());
                assert!(cond.is_none());
                assert!(step.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn return_value_is_optional() {
        let stmts = parse("definir f(): vazio { retornar; }");
        match &stmts[0].kind {
            StmtKind::Fn(decl) => match &decl.body[0].kind {
                StmtKind::Return(value) => assert!(value.is_none()),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn import_lists_symbols() {
        let stmts = parse("importar imprime, soma de io;");
        match &stmts[0].kind {
            StmtKind::Import(decl) => {
                assert_eq!(decl.symbols, vec!["imprime", "soma"]);
                assert_eq!(decl.module, "io");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn control_flow_needs_no_semicolon() {
        // A statement follows the closing brace directly
        let stmts = parse("se x { imprime(1); } imprime(2);");
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn missing_semicolon_is_rejected() {
        let err = try_parse("x ~> 1 imprime(x);").unwrap_err();
        assert!(err.message.contains("';'"), "{}", err.message);
    }

    #[test]
    fn unclosed_block_reports_expected_brace() {
        let err = try_parse("se x { imprime(1);").unwrap_err();
        assert!(err.message.contains("'}'"), "{}", err.message);
    }

    #[test]
    fn unclosed_paren_is_rejected() {
        let err = try_parse("imprime((1 + 2;").unwrap_err();
        assert!(err.message.contains("')'"), "{}", err.message);
    }

    #[test]
    fn trailing_comma_in_call_is_rejected() {
        let err = try_parse("imprime(1, 2,);").unwrap_err();
        assert!(err.message.contains("an expression"), "{}", err.message);
    }

    #[test]
    fn bare_builtin_reference_is_rejected() {
        let err = try_parse("x ~> imprime;").unwrap_err();
        assert!(err.message.contains("must be called"), "{}", err.message);
    }

    #[test]
    fn call_arguments_parse_in_order() {
        let expr = parse_one_expr("soma(1, 2 + 3, abs(-4));");
        assert_eq!(expr.to_string(), "soma(1, (2 + 3), abs(-4))");
    }
}
