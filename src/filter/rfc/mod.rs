//! RFC 9535 filter expressions
//!
//! Filter bodies in the `rfc` mode parse into this AST and evaluate without
//! runtime errors: type mismatches compare as "not equal and not ordered",
//! per the RFC. Embedded queries reuse the crate's segment grammar, which
//! is a superset of the RFC filter-query grammar.

use serde_json::{Number, Value};

use crate::ast::Segment;
use crate::eval::context::{Context, CtxValue, NormalizedPath, PayloadKind};
use crate::eval::EvalEnv;
use crate::node::NodeList;

pub(crate) mod functions;
pub(crate) mod parse;
pub(crate) mod registry;

use functions::{FuncValue, FunctionExpr};

/// Trait for testing a filter predicate against a candidate node
pub(crate) trait TestFilter {
    fn test_filter<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> bool;
}

impl TestFilter for Value {
    fn test_filter<'a>(&self, _current: &'a Value, _env: &EvalEnv<'a, '_>) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n != &Number::from(0),
            _ => true,
        }
    }
}

/// The parsed form of one `[?…]` body in RFC mode
#[derive(Debug, PartialEq, Clone)]
pub(crate) struct Filter(pub(crate) LogicalOr);

impl Filter {
    #[cfg_attr(feature = "trace", tracing::instrument(name = "Test Filter", level = "trace", parent = None, skip(env), ret))]
    pub(crate) fn test<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> bool {
        self.0.test_filter(current, env)
    }
}

/// Logical OR over one or more AND terms
#[derive(Debug, PartialEq, Clone)]
pub(crate) struct LogicalOr(pub(crate) Vec<LogicalAnd>);

impl TestFilter for LogicalOr {
    fn test_filter<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> bool {
        self.0.iter().any(|expr| expr.test_filter(current, env))
    }
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) struct LogicalAnd(pub(crate) Vec<BasicExpr>);

impl TestFilter for LogicalAnd {
    fn test_filter<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> bool {
        self.0.iter().all(|expr| expr.test_filter(current, env))
    }
}

/// The basic forms a filter term can take
#[derive(Debug, PartialEq, Clone)]
pub(crate) enum BasicExpr {
    Paren(LogicalOr),
    NotParen(LogicalOr),
    Relation(ComparisonExpr),
    Exist(FilterQuery),
    NotExist(FilterQuery),
    Func(FunctionExpr),
    NotFunc(FunctionExpr),
}

impl TestFilter for BasicExpr {
    fn test_filter<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> bool {
        match self {
            BasicExpr::Paren(expr) => expr.test_filter(current, env),
            BasicExpr::NotParen(expr) => !expr.test_filter(current, env),
            BasicExpr::Relation(expr) => expr.test_filter(current, env),
            BasicExpr::Exist(query) => !query.nodes(current, env).is_empty(),
            BasicExpr::NotExist(query) => query.nodes(current, env).is_empty(),
            BasicExpr::Func(expr) => expr.test_filter(current, env),
            BasicExpr::NotFunc(expr) => !expr.test_filter(current, env),
        }
    }
}

/// A comparison of two comparables
#[derive(Debug, PartialEq, Clone)]
pub(crate) struct ComparisonExpr {
    pub(crate) left: Comparable,
    pub(crate) op: CompareOp,
    pub(crate) right: Comparable,
}

impl TestFilter for ComparisonExpr {
    fn test_filter<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> bool {
        let left = self.left.resolve(current, env);
        let right = self.right.resolve(current, env);
        match self.op {
            CompareOp::Eq => equal_to(&left, &right),
            CompareOp::Ne => !equal_to(&left, &right),
            CompareOp::Lt => same_type(&left, &right) && less_than(&left, &right),
            CompareOp::Gt => {
                same_type(&left, &right)
                    && !less_than(&left, &right)
                    && !equal_to(&left, &right)
            }
            CompareOp::Le => {
                same_type(&left, &right)
                    && (less_than(&left, &right) || equal_to(&left, &right))
            }
            CompareOp::Ge => same_type(&left, &right) && !less_than(&left, &right),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A comparison operand: restricted to single values by the RFC type
/// discipline
#[derive(Debug, PartialEq, Clone)]
pub(crate) enum Comparable {
    Literal(Literal),
    Singular(SingularQuery),
    Func(FunctionExpr),
}

impl Comparable {
    fn resolve<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> CompVal<'a> {
        match self {
            Comparable::Literal(lit) => CompVal::Owned(lit.to_value()),
            Comparable::Singular(query) => match query.node(current, env.root) {
                Some(v) => CompVal::Node(v),
                None => CompVal::Nothing,
            },
            Comparable::Func(expr) => match expr.evaluate(current, env) {
                FuncValue::Node(v) => CompVal::Node(v),
                FuncValue::Value(v) => CompVal::Owned(v),
                // Nodes/Logical returns are rejected at parse time
                _ => CompVal::Nothing,
            },
        }
    }
}

/// A resolved comparison operand
#[derive(Debug)]
enum CompVal<'a> {
    Node(&'a Value),
    Owned(Value),
    Nothing,
}

impl<'a> CompVal<'a> {
    fn value(&self) -> Option<&Value> {
        match self {
            CompVal::Node(v) => Some(v),
            CompVal::Owned(v) => Some(v),
            CompVal::Nothing => None,
        }
    }
}

fn equal_to(left: &CompVal<'_>, right: &CompVal<'_>) -> bool {
    match (left.value(), right.value()) {
        (Some(l), Some(r)) => value_equal_to(l, r),
        (None, None) => true,
        _ => false,
    }
}

fn value_equal_to(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => number_equal_to(l, r),
        _ => left == right,
    }
}

fn number_equal_to(left: &Number, right: &Number) -> bool {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        l == r
    } else if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        l == r
    } else if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        l == r
    } else {
        false
    }
}

fn less_than(left: &CompVal<'_>, right: &CompVal<'_>) -> bool {
    match (left.value(), right.value()) {
        (Some(Value::Number(l)), Some(Value::Number(r))) => number_less_than(l, r),
        (Some(Value::String(l)), Some(Value::String(r))) => l < r,
        _ => false,
    }
}

fn number_less_than(left: &Number, right: &Number) -> bool {
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        l < r
    } else if let (Some(l), Some(r)) = (left.as_i64(), right.as_i64()) {
        l < r
    } else if let (Some(l), Some(r)) = (left.as_u64(), right.as_u64()) {
        l < r
    } else {
        false
    }
}

fn same_type(left: &CompVal<'_>, right: &CompVal<'_>) -> bool {
    match (left.value(), right.value()) {
        (Some(l), Some(r)) => {
            matches!((l, r), (Value::Null, Value::Null))
                | matches!((l, r), (Value::Bool(_), Value::Bool(_)))
                | matches!((l, r), (Value::Number(_), Value::Number(_)))
                | matches!((l, r), (Value::String(_), Value::String(_)))
                | matches!((l, r), (Value::Array(_), Value::Array(_)))
                | matches!((l, r), (Value::Object(_), Value::Object(_)))
        }
        _ => false,
    }
}

/// A literal value appearing in a filter expression
#[derive(Debug, PartialEq, Clone)]
pub(crate) enum Literal {
    Number(Number),
    String(String),
    Bool(bool),
    Null,
}

impl Literal {
    fn to_value(&self) -> Value {
        match self {
            Literal::Number(n) => Value::Number(n.clone()),
            Literal::String(s) => Value::String(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }
    }
}

/// Whether an embedded query starts at the document root or the candidate
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum QueryKind {
    Absolute,
    Relative,
}

/// A query embedded in a filter expression
///
/// Segments exclude the leading `$`/`@`, which is captured as the kind.
#[derive(Debug, PartialEq, Clone)]
pub(crate) struct FilterQuery {
    pub(crate) kind: QueryKind,
    pub(crate) segments: Vec<Segment>,
}

impl FilterQuery {
    /// Evaluate against the candidate, yielding the selected nodes
    ///
    /// Runs without location tracking; nested filter bodies were forced at
    /// parse time, so evaluation cannot fail in RFC mode.
    pub(crate) fn nodes<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> NodeList<'a> {
        let start = match self.kind {
            QueryKind::Absolute => env.root,
            QueryKind::Relative => current,
        };
        let seed = Context {
            value: CtxValue::Node(start),
            loc: NormalizedPath::default(),
            parent: None,
            parent_key: None,
            grandparent_key: None,
            payload: PayloadKind::Value,
        };
        crate::eval::eval_segments(&self.segments, vec![seed], &env.untracked())
            .map(|contexts| {
                contexts
                    .into_iter()
                    .map(|c| c.value.to_value())
                    .collect::<Vec<_>>()
                    .into()
            })
            .unwrap_or_default()
    }

    pub(crate) fn is_singular(&self) -> bool {
        self.segments.iter().all(Segment::is_singular)
    }
}

/// A query guaranteed to select at most one node
#[derive(Debug, PartialEq, Clone)]
pub(crate) struct SingularQuery {
    pub(crate) kind: QueryKind,
    pub(crate) steps: Vec<SingularStep>,
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) enum SingularStep {
    Name(String),
    Index(isize),
}

impl SingularQuery {
    /// Walk to the selected node, if it exists
    pub(crate) fn node<'a>(&self, current: &'a Value, root: &'a Value) -> Option<&'a Value> {
        let mut target = match self.kind {
            QueryKind::Absolute => root,
            QueryKind::Relative => current,
        };
        for step in &self.steps {
            target = match step {
                SingularStep::Name(name) => target.as_object()?.get(name)?,
                SingularStep::Index(index) => {
                    let list = target.as_array()?;
                    let resolved = if *index < 0 {
                        list.len().checked_sub(index.unsigned_abs())?
                    } else {
                        *index as usize
                    };
                    list.get(resolved)?
                }
            };
        }
        Some(target)
    }
}

impl TryFrom<FilterQuery> for SingularQuery {
    type Error = NonSingularQueryError;

    fn try_from(query: FilterQuery) -> Result<Self, Self::Error> {
        let steps = query
            .segments
            .into_iter()
            .map(|segment| match segment {
                Segment::Child(crate::ast::Selector::Name(n)) => Ok(SingularStep::Name(n.name)),
                Segment::Child(crate::ast::Selector::Index(i)) => Ok(SingularStep::Index(i)),
                Segment::Current => Err(NonSingularQueryError::Segment),
                Segment::Recursive(_) => Err(NonSingularQueryError::Descendant),
                Segment::Child(crate::ast::Selector::Wildcard) => {
                    Err(NonSingularQueryError::Wildcard)
                }
                Segment::Child(crate::ast::Selector::Slice(_)) => Err(NonSingularQueryError::Slice),
                Segment::Filter(_) => Err(NonSingularQueryError::Filter),
                _ => Err(NonSingularQueryError::Segment),
            })
            .collect::<Result<Vec<SingularStep>, Self::Error>>()?;
        Ok(Self {
            kind: query.kind,
            steps,
        })
    }
}

/// Error when a query in singular position is not singular
#[derive(Debug, thiserror::Error, PartialEq)]
pub(crate) enum NonSingularQueryError {
    #[error("descendant segments are not singular")]
    Descendant,
    #[error("wildcard segments are not singular")]
    Wildcard,
    #[error("slice segments are not singular")]
    Slice,
    #[error("filter segments are not singular")]
    Filter,
    #[error("segment kind is not singular")]
    Segment,
}
