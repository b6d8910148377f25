//! Query AST.

use std::fmt;

use json_context_value::Value;

/// Where evaluation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// The document root: `pages[id=1]`.
    Root,
    /// The context value passed with the query: `.id`, `:filter`.
    Context,
}

/// One navigation step.
#[derive(Debug, Clone)]
pub enum Step {
    /// `.name` or a bare leading identifier.
    Field(String),
    /// `[...]`
    Select(Selector),
    /// `:name(args)`
    Filter(FilterCall),
}

/// Bracket selector.
#[derive(Debug, Clone)]
pub enum Selector {
    /// `[{query}]`: the key is computed by a sub-query.
    Dynamic(Box<Query>),
    /// `[*]`: every child, tried in order.
    Each,
    /// `[3]`
    Index(usize),
    /// `['name']`
    Name(String),
    /// `[a=1&b={.b}]`: first child matching every condition.
    Where(Vec<Condition>),
}

/// Comparison operators usable inside a `Where` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

/// `path op operand`, `path` (truthy) or `!path` (falsy).
#[derive(Debug, Clone)]
pub struct Condition {
    pub path: Vec<String>,
    pub test: Option<(CmpOp, Operand)>,
    pub negate: bool,
}

/// Right-hand side of a condition or a filter argument.
#[derive(Debug, Clone)]
pub enum Operand {
    Literal(Value),
    Query(Box<Query>),
}

/// `:name(arg, ...)`
#[derive(Debug, Clone)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Operand>,
}

/// A parsed query expression.
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) source: String,
    pub origin: Origin,
    pub steps: Vec<Step>,
}

impl Query {
    /// The expression text this query was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
