//! Abstract Syntax Tree definitions for the Dungeon DSL
//!
//! The tree is produced by the parser of the surrounding application (or
//! deserialized from JSON). Every node that takes part in symbol relations
//! carries a [`NodeId`], which is unique within the process. Serialized trees
//! must carry the id of every node.

use crate::utils::Span;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an AST node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Allocate a new process-unique node id
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Ids read from a serialized tree are reserved, so later fresh ids never
/// collide with them
impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = u64::deserialize(deserializer)?;
        NEXT_NODE_ID.fetch_max(id.saturating_add(1), Ordering::Relaxed);
        Ok(NodeId(id))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ident {
    pub id: NodeId,
    pub name: String,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>, span: Span) -> Self {
        Self { id: NodeId::fresh(), name: name.into(), span }
    }
}

/// A complete program (compilation unit)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    pub id: NodeId,
    pub items: Vec<Item>,
}

impl Program {
    pub fn new(items: Vec<Item>) -> Self {
        Self { id: NodeId::fresh(), items }
    }
}

/// Top-level items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Item {
    Prototype(PrototypeDef),
    ItemPrototype(ItemPrototypeDef),
    Object(ObjectDef),
    Graph(GraphDef),
    Function(FunctionDef),
}

// ==================== Type Definitions ====================

/// Entity prototype: `entity_type monster { health_component { max: 10 }, position_component }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrototypeDef {
    pub id: NodeId,
    pub name: Ident,
    pub components: Vec<AggregateValueDef>,
    pub span: Span,
}

impl PrototypeDef {
    pub fn new(name: Ident, components: Vec<AggregateValueDef>, span: Span) -> Self {
        Self { id: NodeId::fresh(), name, components, span }
    }
}

/// Item prototype derived from an existing aggregate type:
/// `item_type key : quest_item { description: "rusty" }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemPrototypeDef {
    pub id: NodeId,
    pub name: Ident,
    pub base: Ident,
    pub properties: Vec<PropertyDef>,
    pub span: Span,
}

impl ItemPrototypeDef {
    pub fn new(name: Ident, base: Ident, properties: Vec<PropertyDef>, span: Span) -> Self {
        Self { id: NodeId::fresh(), name, base, properties, span }
    }
}

// ==================== Object Definitions ====================

/// Object definition: `quest_config level_one { name: "x", ... }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectDef {
    pub id: NodeId,
    pub type_name: Ident,
    pub name: Ident,
    pub properties: Vec<PropertyDef>,
    pub span: Span,
}

impl ObjectDef {
    pub fn new(type_name: Ident, name: Ident, properties: Vec<PropertyDef>, span: Span) -> Self {
        Self { id: NodeId::fresh(), type_name, name, properties, span }
    }
}

/// Aggregate value: a component definition inside a prototype or an inline
/// aggregate used as a property value (`position_component { x: 1 }`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateValueDef {
    pub id: NodeId,
    pub name: Ident,
    pub properties: Vec<PropertyDef>,
    pub span: Span,
}

impl AggregateValueDef {
    pub fn new(name: Ident, properties: Vec<PropertyDef>, span: Span) -> Self {
        Self { id: NodeId::fresh(), name, properties, span }
    }
}

/// Property definition: `name: value`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDef {
    pub id: NodeId,
    pub name: Ident,
    pub value: Expr,
    pub span: Span,
}

impl PropertyDef {
    pub fn new(name: Ident, value: Expr, span: Span) -> Self {
        Self { id: NodeId::fresh(), name, value, span }
    }
}

/// Task dependency graph: `graph g { t1 -> t2 -> t3 }`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDef {
    pub id: NodeId,
    pub name: Ident,
    pub edges: Vec<EdgeStmt>,
    pub span: Span,
}

impl GraphDef {
    pub fn new(name: Ident, edges: Vec<EdgeStmt>, span: Span) -> Self {
        Self { id: NodeId::fresh(), name, edges, span }
    }
}

/// Chain of graph nodes connected by edges
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeStmt {
    pub id: NodeId,
    pub chain: Vec<Ident>,
    pub span: Span,
}

impl EdgeStmt {
    pub fn new(chain: Vec<Ident>, span: Span) -> Self {
        Self { id: NodeId::fresh(), chain, span }
    }
}

// ==================== Functions ====================

/// Function definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub id: NodeId,
    pub name: Ident,
    pub params: Vec<ParamDef>,
    pub ret_type: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

impl FunctionDef {
    pub fn new(
        name: Ident,
        params: Vec<ParamDef>,
        ret_type: Option<TypeExpr>,
        body: Block,
        span: Span,
    ) -> Self {
        Self { id: NodeId::fresh(), name, params, ret_type, body, span }
    }
}

/// Function parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamDef {
    pub id: NodeId,
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

impl ParamDef {
    pub fn new(name: Ident, ty: TypeExpr, span: Span) -> Self {
        Self { id: NodeId::fresh(), name, ty, span }
    }
}

/// Type identifier as written in the source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeExpr {
    pub id: NodeId,
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TypeExprKind {
    Named(String),
    /// `T[]`
    List(Box<TypeExpr>),
    /// `T<>`
    Set(Box<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>, span: Span) -> Self {
        Self { id: NodeId::fresh(), kind: TypeExprKind::Named(name.into()), span }
    }

    pub fn list(element: TypeExpr, span: Span) -> Self {
        Self { id: NodeId::fresh(), kind: TypeExprKind::List(Box::new(element)), span }
    }

    pub fn set(element: TypeExpr, span: Span) -> Self {
        Self { id: NodeId::fresh(), kind: TypeExprKind::Set(Box::new(element)), span }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeExprKind::Named(name) => f.write_str(name),
            TypeExprKind::List(inner) => write!(f, "{}[]", inner),
            TypeExprKind::Set(inner) => write!(f, "{}<>", inner),
        }
    }
}

// ==================== Statements ====================

/// Statement block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: NodeId,
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>, span: Span) -> Self {
        Self { id: NodeId::fresh(), stmts, span }
    }
}

/// Variable declaration: `var x : int = 1;` or `var x = f();`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub id: NodeId,
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Statements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Block(Block),
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        span: Span,
    },
    /// `for T x in xs [count i] body`
    For {
        var_type: TypeExpr,
        var: Ident,
        iterable: Expr,
        counter: Option<Ident>,
        body: Box<Stmt>,
        span: Span,
    },
    VarDecl(VarDecl),
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Expr(Expr),
}

impl Stmt {
    pub fn block(stmts: Vec<Stmt>, span: Span) -> Self {
        Stmt::Block(Block::new(stmts, span))
    }

    pub fn var(name: Ident, ty: Option<TypeExpr>, init: Option<Expr>, span: Span) -> Self {
        Stmt::VarDecl(VarDecl { id: NodeId::fresh(), name, ty, init, span })
    }

    pub fn if_else(cond: Expr, then_branch: Stmt, else_branch: Option<Stmt>, span: Span) -> Self {
        Stmt::If {
            cond,
            then_branch: Box::new(then_branch),
            else_branch: else_branch.map(Box::new),
            span,
        }
    }

    pub fn ret(value: Option<Expr>, span: Span) -> Self {
        Stmt::Return { value, span }
    }

    pub fn span(&self) -> Span {
        match self {
            Stmt::Block(block) => block.span,
            Stmt::If { span, .. } => *span,
            Stmt::While { span, .. } => *span,
            Stmt::For { span, .. } => *span,
            Stmt::VarDecl(decl) => decl.span,
            Stmt::Return { span, .. } => *span,
            Stmt::Expr(expr) => expr.span(),
        }
    }
}

// ==================== Expressions ====================

/// Function call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuncCall {
    pub id: NodeId,
    pub name: Ident,
    pub args: Vec<Expr>,
    pub span: Span,
}

/// Literals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Operators producing a bool regardless of operand types
    pub fn is_boolean(&self) -> bool {
        !matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Expressions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Expr {
    Ident(Ident),
    Literal {
            id: NodeId,
        value: Literal,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
        span: Span,
    },
    Call(FuncCall),
    /// `lhs.rhs`; chains nest to the right: `a.b.c` is `a.(b.c)`
    MemberAccess {
            id: NodeId,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        span: Span,
    },
    List {
        elements: Vec<Expr>,
        span: Span,
    },
    Set {
        elements: Vec<Expr>,
        span: Span,
    },
    Aggregate(AggregateValueDef),
    Grouped(Box<Expr>),
}

impl Expr {
    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Expr::Ident(Ident::new(name, span))
    }

    pub fn literal(value: Literal, span: Span) -> Self {
        Expr::Literal { id: NodeId::fresh(), value, span }
    }

    pub fn int(value: i64, span: Span) -> Self {
        Self::literal(Literal::Int(value), span)
    }

    pub fn string(value: impl Into<String>, span: Span) -> Self {
        Self::literal(Literal::Str(value.into()), span)
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>, span: Span) -> Self {
        Expr::Call(FuncCall { id: NodeId::fresh(), name: Ident::new(name, span), args, span })
    }

    pub fn member(lhs: Expr, rhs: Expr, span: Span) -> Self {
        Expr::MemberAccess { id: NodeId::fresh(), lhs: Box::new(lhs), rhs: Box::new(rhs), span }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, span: Span) -> Self {
        Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span }
    }

    pub fn assign(target: Expr, value: Expr, span: Span) -> Self {
        Expr::Assign { target: Box::new(target), value: Box::new(value), span }
    }

    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(ident) => ident.span,
            Expr::Literal { span, .. } => *span,
            Expr::Binary { span, .. } => *span,
            Expr::Unary { span, .. } => *span,
            Expr::Assign { span, .. } => *span,
            Expr::Call(call) => call.span,
            Expr::MemberAccess { span, .. } => *span,
            Expr::List { span, .. } => *span,
            Expr::Set { span, .. } => *span,
            Expr::Aggregate(def) => def.span,
            Expr::Grouped(inner) => inner.span(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ids_are_unique() {
        let a = Ident::new("a", Span::at_line(1));
        let b = Ident::new("a", Span::at_line(1));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_type_expr_display() {
        let span = Span::at_line(1);
        let ty = TypeExpr::set(TypeExpr::list(TypeExpr::named("int", span), span), span);
        assert_eq!(ty.to_string(), "int[]<>");
    }

    #[test]
    fn test_json_ids_are_reserved() {
        let json = r#"{ "id": 900000, "name": "x", "span": { "line": 4, "column": 2 } }"#;
        let ident: Ident = serde_json::from_str(json).unwrap();
        assert_eq!(ident.id, NodeId(900000));
        assert_eq!(ident.span, Span::new(4, 2));
        assert!(NodeId::fresh() > ident.id);
    }

    #[test]
    fn test_json_without_id_is_rejected() {
        let json = r#"{ "name": "x", "span": { "line": 4, "column": 2 } }"#;
        assert!(serde_json::from_str::<Ident>(json).is_err());
    }
}
