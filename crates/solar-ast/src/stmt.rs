//! Statement AST nodes.

use crate::expr::Expr;
use crate::{NodeId, Span, Type};

/// A statement in the AST.
#[derive(Debug, Clone)]
pub struct Stmt {
    pub id: NodeId,
    pub kind: StmtKind,
    pub span: Span,
}

/// The kind of statement.
#[derive(Debug, Clone)]
pub enum StmtKind {
    /// Expression statement
    Expr(Expr),
    /// Assignment: `name [: type] ~> value`
    Assign {
        name: String,
        ty: Option<Type>,
        value: Expr,
    },
    /// `se cond { ... } [senao { ... }]`
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    /// `enquanto cond { ... }`
    While {
        cond: Expr,
        body: Vec<Stmt>,
    },
    /// `para (init; cond; step) { ... }` — all three clauses optional
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
    },
    /// `definir name(params) [: ret] { ... }`
    Fn(FnDecl),
    /// `retornar [value]`
    Return(Option<Expr>),
    /// `importar syms de module`
    Import(ImportDecl),
}

/// A function declaration.
#[derive(Debug, Clone)]
pub struct FnDecl {
    pub name: String,
    pub params: Vec<Param>,
    /// Declared return type; integer when the annotation is omitted.
    pub ret_ty: Type,
    pub body: Vec<Stmt>,
}

/// A function parameter. The type defaults to integer when omitted.
#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

/// An import: `importar sym1, sym2 de module`.
#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub symbols: Vec<String>,
    pub module: String,
}
