//! A path-selector language (a subset of XPath 1.0) evaluated against [`html::Document`]s.

use html::{Document, NodeId};
use std::fmt;
use thiserror::Error;
use tracing::{span, trace, Level};

#[derive(PartialEq, Clone, Debug)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    Arithmetic(Box<Expr>, ArithmeticOp, Box<Expr>),
    Negate(Box<Expr>),
    Union(Box<Expr>, Box<Expr>),
    Path(LocationPath),
    /// A primary expression narrowed by predicates and optionally continued by further steps,
    /// e.g. `(//a)[1]/@href`
    Filter {
        primary: Box<Expr>,
        predicates: Vec<Expr>,
        steps: Vec<Step>,
    },
    Literal(String),
    Number(f64),
    Function(String, Vec<Expr>),
}

#[derive(PartialEq, Clone, Debug)]
pub struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(PartialEq, Clone, Debug)]
pub struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    pub fn new(axis: Axis, test: NodeTest) -> Self {
        Self {
            axis,
            test,
            predicates: vec![],
        }
    }
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Axis {
    Child,
    Descendant,
    DescendantOrSelf,
    SelfAxis,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Attribute,
}

#[derive(PartialEq, Clone, Debug)]
pub enum NodeTest {
    // name
    Name(String),
    // *
    Any,
    // node()
    Node,
    // text()
    Text,
    // comment()
    Comment,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum ArithmeticOp {
    Add,
    Sub,
}

/// One member of a selector's result: a tree node, or an attribute identified by its owner
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Match {
    Node(NodeId),
    Attribute { owner: NodeId, name: String },
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Match::Node(id) => write!(f, "node #{}", id.index()),
            Match::Attribute { owner, name } => write!(f, "@{} of node #{}", name, owner.index()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SelectorError {
    #[error("invalid selector syntax at byte {offset}")]
    Syntax { offset: usize },
    #[error("unknown function {0}()")]
    UnknownFunction(String),
    #[error("{name}() takes {expected} argument(s) but {found} were given")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },
    #[error("selector does not evaluate to a node-set")]
    NotANodeSet,
}

/// A parsed selector expression, ready to be evaluated against any number of documents
#[derive(PartialEq, Clone, Debug)]
pub struct Selector {
    source: String,
    expr: Expr,
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let expr = parsing::selector(text)?;
        Ok(Self {
            source: text.to_string(),
            expr,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Evaluate against the current state of `document`, returning the matches in document
    /// order without duplicates
    pub fn select(&self, document: &Document) -> Result<Vec<Match>, SelectorError> {
        let span = span!(Level::TRACE, "Evaluating selector", selector = %self.source);
        let _enter = span.enter();
        match eval::Evaluator::new(document).evaluate_root(&self.expr)? {
            eval::Value::Nodes(nodes) => {
                trace!(matches = nodes.len(), "Selector evaluated");
                Ok(nodes)
            }
            _ => Err(SelectorError::NotANodeSet),
        }
    }
}

/// Parse `selector` and evaluate it against `document` in one go
pub fn select(document: &Document, selector: &str) -> Result<Vec<Match>, SelectorError> {
    Selector::parse(selector)?.select(document)
}

mod eval;
mod parsing;
#[cfg(test)]
mod tests;
