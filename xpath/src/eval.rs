use html::{Document, NodeData, NodeId};
use std::collections::HashMap;
use std::iter;

use super::{ArithmeticOp, Axis, CompareOp, Expr, Match, NodeTest, SelectorError, Step};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Nodes(Vec<Match>),
    Boolean(bool),
    Number(f64),
    String(String),
}

struct Context {
    node: Match,
    position: usize,
    size: usize,
}

/// Evaluates expressions against one snapshot of a document
pub(crate) struct Evaluator<'d> {
    document: &'d Document,
    // Pre-order index of every connected node, used to sort node-sets into document order
    order: HashMap<NodeId, usize>,
}

impl<'d> Evaluator<'d> {
    pub fn new(document: &'d Document) -> Self {
        let root = document.root();
        let order = iter::once(root)
            .chain(document.descendants(root))
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        Self { document, order }
    }

    pub fn evaluate_root(&self, expr: &Expr) -> Result<Value, SelectorError> {
        let context = Context {
            node: Match::Node(self.document.root()),
            position: 1,
            size: 1,
        };
        self.evaluate(expr, &context)
    }

    fn evaluate(&self, expr: &Expr, ctx: &Context) -> Result<Value, SelectorError> {
        Ok(match expr {
            Expr::Or(l, r) => Value::Boolean(self.boolean(l, ctx)? || self.boolean(r, ctx)?),
            Expr::And(l, r) => Value::Boolean(self.boolean(l, ctx)? && self.boolean(r, ctx)?),
            Expr::Compare(l, op, r) => {
                let left = self.evaluate(l, ctx)?;
                let right = self.evaluate(r, ctx)?;
                Value::Boolean(self.compare(&left, *op, &right))
            }
            Expr::Arithmetic(l, op, r) => {
                let left = self.to_number(&self.evaluate(l, ctx)?);
                let right = self.to_number(&self.evaluate(r, ctx)?);
                Value::Number(match op {
                    ArithmeticOp::Add => left + right,
                    ArithmeticOp::Sub => left - right,
                })
            }
            Expr::Negate(e) => Value::Number(-self.to_number(&self.evaluate(e, ctx)?)),
            Expr::Union(l, r) => {
                let mut nodes = self.node_set(l, ctx)?;
                nodes.extend(self.node_set(r, ctx)?);
                Value::Nodes(self.document_order(nodes))
            }
            Expr::Path(path) => {
                let start = if path.absolute {
                    Match::Node(self.document.root())
                } else {
                    ctx.node.clone()
                };
                Value::Nodes(self.apply_steps(vec![start], &path.steps)?)
            }
            Expr::Filter {
                primary,
                predicates,
                steps,
            } => {
                let mut nodes = self.document_order(self.node_set(primary, ctx)?);
                for predicate in predicates {
                    nodes = self.filter(nodes, predicate)?;
                }
                Value::Nodes(self.apply_steps(nodes, steps)?)
            }
            Expr::Literal(s) => Value::String(s.clone()),
            Expr::Number(n) => Value::Number(*n),
            Expr::Function(name, args) => self.call(name, args, ctx)?,
        })
    }

    fn boolean(&self, expr: &Expr, ctx: &Context) -> Result<bool, SelectorError> {
        Ok(self.to_boolean(&self.evaluate(expr, ctx)?))
    }

    fn node_set(&self, expr: &Expr, ctx: &Context) -> Result<Vec<Match>, SelectorError> {
        match self.evaluate(expr, ctx)? {
            Value::Nodes(nodes) => Ok(nodes),
            _ => Err(SelectorError::NotANodeSet),
        }
    }

    fn apply_steps(&self, mut nodes: Vec<Match>, steps: &[Step]) -> Result<Vec<Match>, SelectorError> {
        for step in steps {
            let mut next = Vec::new();
            for node in &nodes {
                let mut candidates: Vec<Match> = self
                    .axis(node, step.axis)
                    .into_iter()
                    .filter(|c| self.test(c, step.axis, &step.test))
                    .collect();
                for predicate in &step.predicates {
                    candidates = self.filter(candidates, predicate)?;
                }
                next.extend(candidates);
            }
            nodes = self.document_order(next);
        }
        Ok(nodes)
    }

    /// Keep the nodes for which `predicate` holds; a numeric predicate selects by position
    fn filter(&self, nodes: Vec<Match>, predicate: &Expr) -> Result<Vec<Match>, SelectorError> {
        let size = nodes.len();
        let mut kept = Vec::new();
        for (i, node) in nodes.into_iter().enumerate() {
            let ctx = Context {
                node,
                position: i + 1,
                size,
            };
            let keep = match self.evaluate(predicate, &ctx)? {
                Value::Number(n) => n == ctx.position as f64,
                other => self.to_boolean(&other),
            };
            if keep {
                kept.push(ctx.node);
            }
        }
        Ok(kept)
    }

    fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        iter::successors(self.document.parent(id), |&p| self.document.parent(p)).collect()
    }

    /// Nodes along `axis` from `node`, in proximity order (reverse axes start nearest)
    fn axis(&self, node: &Match, axis: Axis) -> Vec<Match> {
        let doc = self.document;
        let id = match node {
            Match::Node(id) => *id,
            Match::Attribute { owner, .. } => {
                return match axis {
                    Axis::SelfAxis | Axis::DescendantOrSelf => vec![node.clone()],
                    Axis::Parent => vec![Match::Node(*owner)],
                    Axis::Ancestor | Axis::AncestorOrSelf => {
                        let own = (axis == Axis::AncestorOrSelf).then(|| node.clone());
                        own.into_iter()
                            .chain(iter::once(*owner).chain(self.ancestors(*owner)).map(Match::Node))
                            .collect()
                    }
                    _ => vec![],
                };
            }
        };
        let ids: Vec<NodeId> = match axis {
            Axis::Child => doc.children(id).to_vec(),
            Axis::Descendant => doc.descendants(id),
            Axis::DescendantOrSelf => iter::once(id).chain(doc.descendants(id)).collect(),
            Axis::SelfAxis => vec![id],
            Axis::Parent => doc.parent(id).into_iter().collect(),
            Axis::Ancestor => self.ancestors(id),
            Axis::AncestorOrSelf => iter::once(id).chain(self.ancestors(id)).collect(),
            Axis::FollowingSibling | Axis::PrecedingSibling => {
                let siblings = doc.parent(id).map(|p| doc.children(p)).unwrap_or_default();
                let at = siblings.iter().position(|&s| s == id).unwrap_or(0);
                if axis == Axis::FollowingSibling {
                    siblings.iter().skip(at + 1).copied().collect()
                } else {
                    siblings[..at].iter().rev().copied().collect()
                }
            }
            Axis::Attribute => {
                return doc
                    .element(id)
                    .map(|e| {
                        e.attributes
                            .iter()
                            .map(|(name, _)| Match::Attribute {
                                owner: id,
                                name: name.to_string(),
                            })
                            .collect()
                    })
                    .unwrap_or_default();
            }
        };
        ids.into_iter().map(Match::Node).collect()
    }

    fn test(&self, candidate: &Match, axis: Axis, test: &NodeTest) -> bool {
        match candidate {
            Match::Attribute { name, .. } => match test {
                NodeTest::Node => true,
                NodeTest::Any => axis == Axis::Attribute,
                NodeTest::Name(n) => axis == Axis::Attribute && n.eq_ignore_ascii_case(name),
                NodeTest::Text | NodeTest::Comment => false,
            },
            Match::Node(id) => match (test, self.document.data(*id)) {
                (NodeTest::Node, _) => true,
                (NodeTest::Any, NodeData::Element(_)) => true,
                (NodeTest::Name(n), NodeData::Element(e)) => n.eq_ignore_ascii_case(&e.tag_name),
                (NodeTest::Text, NodeData::Text(_)) => true,
                (NodeTest::Comment, NodeData::Comment(_)) => true,
                _ => false,
            },
        }
    }

    fn order_key(&self, node: &Match) -> (usize, usize) {
        match node {
            Match::Node(id) => (self.order.get(id).copied().unwrap_or(usize::MAX), 0),
            Match::Attribute { owner, name } => {
                let at = self
                    .document
                    .element(*owner)
                    .and_then(|e| e.attributes.iter().position(|(k, _)| k == name))
                    .unwrap_or(0);
                (self.order.get(owner).copied().unwrap_or(usize::MAX), at + 1)
            }
        }
    }

    fn document_order(&self, mut nodes: Vec<Match>) -> Vec<Match> {
        nodes.sort_by_key(|n| self.order_key(n));
        nodes.dedup();
        nodes
    }

    fn string_value(&self, node: &Match) -> String {
        match node {
            Match::Node(id) => self.document.string_value(*id),
            Match::Attribute { owner, name } => self
                .document
                .element(*owner)
                .and_then(|e| e.attributes.get(name))
                .unwrap_or_default()
                .to_string(),
        }
    }

    fn node_name(&self, node: &Match) -> String {
        match node {
            Match::Node(id) => self
                .document
                .element(*id)
                .map(|e| e.tag_name.clone())
                .unwrap_or_default(),
            Match::Attribute { name, .. } => name.clone(),
        }
    }

    fn to_boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Boolean(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            _ => parse_number(&self.to_string(value)),
        }
    }

    fn to_string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|n| self.string_value(n))
                .unwrap_or_default(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
        }
    }

    fn compare(&self, left: &Value, op: CompareOp, right: &Value) -> bool {
        match (left, right) {
            (Value::Nodes(l), Value::Nodes(r)) => l.iter().any(|a| {
                let a = Value::String(self.string_value(a));
                r.iter()
                    .any(|b| self.compare_atoms(&a, op, &Value::String(self.string_value(b))))
            }),
            (Value::Nodes(nodes), Value::Boolean(_)) => {
                self.compare_atoms(&Value::Boolean(!nodes.is_empty()), op, right)
            }
            (Value::Boolean(_), Value::Nodes(nodes)) => {
                self.compare_atoms(left, op, &Value::Boolean(!nodes.is_empty()))
            }
            (Value::Nodes(nodes), atom) => nodes
                .iter()
                .any(|n| self.compare_atoms(&Value::String(self.string_value(n)), op, atom)),
            (atom, Value::Nodes(nodes)) => nodes
                .iter()
                .any(|n| self.compare_atoms(atom, op, &Value::String(self.string_value(n)))),
            (l, r) => self.compare_atoms(l, op, r),
        }
    }

    fn compare_atoms(&self, left: &Value, op: CompareOp, right: &Value) -> bool {
        match op {
            CompareOp::Eq | CompareOp::Ne => {
                let equal = match (left, right) {
                    (Value::Boolean(_), _) | (_, Value::Boolean(_)) => {
                        self.to_boolean(left) == self.to_boolean(right)
                    }
                    (Value::Number(_), _) | (_, Value::Number(_)) => {
                        self.to_number(left) == self.to_number(right)
                    }
                    _ => self.to_string(left) == self.to_string(right),
                };
                equal == (op == CompareOp::Eq)
            }
            CompareOp::Lt => self.to_number(left) < self.to_number(right),
            CompareOp::Le => self.to_number(left) <= self.to_number(right),
            CompareOp::Gt => self.to_number(left) > self.to_number(right),
            CompareOp::Ge => self.to_number(left) >= self.to_number(right),
        }
    }

    fn string_arg(&self, args: &[Expr], ctx: &Context) -> Result<String, SelectorError> {
        match args.first() {
            Some(arg) => Ok(self.to_string(&self.evaluate(arg, ctx)?)),
            None => Ok(self.string_value(&ctx.node)),
        }
    }

    fn string_pair(&self, args: &[Expr], ctx: &Context) -> Result<(String, String), SelectorError> {
        let a = self.to_string(&self.evaluate(&args[0], ctx)?);
        let b = self.to_string(&self.evaluate(&args[1], ctx)?);
        Ok((a, b))
    }

    /// Arity has been checked when the selector was parsed
    fn call(&self, name: &str, args: &[Expr], ctx: &Context) -> Result<Value, SelectorError> {
        Ok(match name {
            "last" => Value::Number(ctx.size as f64),
            "position" => Value::Number(ctx.position as f64),
            "count" => Value::Number(self.node_set(&args[0], ctx)?.len() as f64),
            "name" | "local-name" => {
                let nodes = match args.first() {
                    Some(arg) => self.document_order(self.node_set(arg, ctx)?),
                    None => vec![ctx.node.clone()],
                };
                Value::String(nodes.first().map(|n| self.node_name(n)).unwrap_or_default())
            }
            "string" => Value::String(self.string_arg(args, ctx)?),
            "concat" => Value::String(
                args.iter()
                    .map(|a| self.evaluate(a, ctx).map(|v| self.to_string(&v)))
                    .collect::<Result<String, _>>()?,
            ),
            "contains" => {
                let (a, b) = self.string_pair(args, ctx)?;
                Value::Boolean(a.contains(&b))
            }
            "starts-with" => {
                let (a, b) = self.string_pair(args, ctx)?;
                Value::Boolean(a.starts_with(&b))
            }
            "ends-with" => {
                let (a, b) = self.string_pair(args, ctx)?;
                Value::Boolean(a.ends_with(&b))
            }
            "normalize-space" => Value::String(
                self.string_arg(args, ctx)?
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            "string-length" => Value::Number(self.string_arg(args, ctx)?.chars().count() as f64),
            "not" => Value::Boolean(!self.boolean(&args[0], ctx)?),
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            "boolean" => Value::Boolean(self.boolean(&args[0], ctx)?),
            "number" => Value::Number(match args.first() {
                Some(arg) => self.to_number(&self.evaluate(arg, ctx)?),
                None => parse_number(&self.string_value(&ctx.node)),
            }),
            other => return Err(SelectorError::UnknownFunction(other.to_string())),
        })
    }
}

fn parse_number(s: &str) -> f64 {
    s.trim().parse().unwrap_or(f64::NAN)
}

fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let sign = if n > 0.0 { "" } else { "-" };
        format!("{}Infinity", sign)
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
