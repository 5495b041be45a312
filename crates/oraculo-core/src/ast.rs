//! Syntax tree produced by the parser.
//!
//! The tree is built once and never mutated. Blocks are held behind [`Arc`]
//! so the evaluator's suspended frames and registered event callbacks can
//! point into the tree without copying it.

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Program {
    pub body: Arc<Block>,
}

impl Program {
    pub fn statements(&self) -> &[Statement] {
        &self.body.statements
    }
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone)]
pub enum Statement {
    Command(CommandStatement),
    If(IfStatement),
    For(ForLoopStatement),
}

#[derive(Debug, Clone)]
pub struct CommandStatement {
    pub name: String,
    pub args: Vec<Expression>,
    /// Target of a `-> name` suffix.
    pub binding: Option<String>,
    /// Body of a `-> onClick { ... }` suffix.
    pub callback: Option<Arc<Block>>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone)]
pub struct IfStatement {
    pub condition: Expression,
    pub then_block: Arc<Block>,
    pub else_block: Option<Arc<Block>>,
}

#[derive(Debug, Clone)]
pub struct ForLoopStatement {
    pub variable: String,
    pub source: LoopSource,
    pub body: Arc<Block>,
    pub line: usize,
}

/// What a `for` loop iterates over.
#[derive(Debug, Clone)]
pub enum LoopSource {
    /// `for x in "a,b,c"` / `for x in items`
    Collection(Expression),
    /// `for i from 1 to 10`
    Range { from: Expression, to: Expression },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Literal),
    Identifier(String),
    Binary {
        left: Box<Expression>,
        op: CompareOp,
        right: Box<Expression>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }
}
