//! The function extension type system for RFC filters
//!
//! Filter functions conform to the three-type discipline of RFC 9535:
//! nodelists, single values (possibly nothing), and logicals. Functions are
//! registered through [`inventory`], so additional functions can be
//! submitted from any linked source file; the built-ins live in
//! [`registry`][super::registry].

use std::collections::VecDeque;

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::eval::EvalEnv;
use crate::node::NodeList;

use super::{FilterQuery, Literal, LogicalOr, SingularQuery, TestFilter};

/// Evaluates one function call from its already-evaluated arguments
pub type Evaluator =
    Lazy<Box<dyn for<'a> Fn(VecDeque<FuncValue<'a>>) -> FuncValue<'a> + Send + Sync>>;

/// Validates argument kinds at parse time
pub type Validator =
    Lazy<Box<dyn Fn(&[FuncKind]) -> Result<(), FunctionError> + Send + Sync>>;

/// A registered filter function
pub struct Function {
    pub(crate) name: &'static str,
    pub(crate) result: FuncKind,
    pub(crate) evaluator: &'static Evaluator,
    pub(crate) validator: &'static Validator,
}

impl Function {
    /// Describe a function for registration with `inventory::submit!`
    pub const fn new(
        name: &'static str,
        result: FuncKind,
        evaluator: &'static Evaluator,
        validator: &'static Validator,
    ) -> Self {
        Self {
            name,
            result,
            evaluator,
            validator,
        }
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name)
            .field("result", &self.result)
            .finish()
    }
}

inventory::collect!(Function);

pub(crate) fn lookup(name: &str) -> Option<&'static Function> {
    inventory::iter::<Function>().find(|f| f.name == name)
}

/// A value flowing through a function expression
#[derive(Debug)]
pub enum FuncValue<'a> {
    /// A nodelist, usually the result of a filter query
    Nodes(NodeList<'a>),
    /// A logical outcome
    Logical(bool),
    /// A reference to a node of the queried document
    Node(&'a Value),
    /// An owned value, from a literal or computed by a function
    Value(Value),
    /// The absence of a value
    Nothing,
}

impl<'a> FuncValue<'a> {
    /// View as a single JSON value, when the kind allows it
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FuncValue::Node(v) => Some(v),
            FuncValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// The declared kind of a function argument or result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncKind {
    /// A nodelist
    Nodes,
    /// A single node of the document
    Node,
    /// A single value
    Value,
    /// A logical
    Logical,
    /// Nothing
    Nothing,
}

impl FuncKind {
    /// The conversion table of the RFC type discipline
    pub fn converts_to(&self, other: FuncKind) -> bool {
        matches!(
            (self, other),
            (FuncKind::Nodes, FuncKind::Nodes | FuncKind::Logical)
                | (
                    FuncKind::Node,
                    FuncKind::Nodes | FuncKind::Node | FuncKind::Value
                )
                | (FuncKind::Value, FuncKind::Node | FuncKind::Value)
                | (FuncKind::Logical, FuncKind::Logical)
                | (FuncKind::Nothing, FuncKind::Value | FuncKind::Nodes)
        )
    }
}

impl std::fmt::Display for FuncKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuncKind::Nodes => write!(f, "NodesType"),
            FuncKind::Logical => write!(f, "LogicalType"),
            FuncKind::Node | FuncKind::Value | FuncKind::Nothing => write!(f, "ValueType"),
        }
    }
}

/// A parsed function expression with its resolved registry entry
#[derive(Debug, Clone)]
pub(crate) struct FunctionExpr {
    pub(crate) name: String,
    pub(crate) args: Vec<FuncExprArg>,
    pub(crate) function: &'static Function,
}

impl PartialEq for FunctionExpr {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.args == other.args
    }
}

impl FunctionExpr {
    /// Resolve the function, check its argument kinds, and build the
    /// expression
    pub(crate) fn validate(
        name: String,
        args: Vec<FuncExprArg>,
    ) -> Result<Self, FunctionError> {
        let function = lookup(&name).ok_or_else(|| FunctionError::Undefined {
            name: name.clone(),
        })?;
        let kinds: Vec<FuncKind> = args.iter().map(FuncExprArg::as_kind).collect();
        (function.validator)(&kinds)?;
        Ok(Self {
            name,
            args,
            function,
        })
    }

    #[cfg_attr(
        feature = "trace",
        tracing::instrument(name = "Evaluate Function Expr", level = "trace", parent = None, skip(env), ret)
    )]
    pub(crate) fn evaluate<'a>(
        &self,
        current: &'a Value,
        env: &EvalEnv<'a, '_>,
    ) -> FuncValue<'a> {
        let args: VecDeque<FuncValue<'a>> = self
            .args
            .iter()
            .map(|a| a.evaluate(current, env))
            .collect();
        (self.function.evaluator)(args)
    }
}

impl TestFilter for FunctionExpr {
    fn test_filter<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> bool {
        match self.evaluate(current, env) {
            FuncValue::Nodes(nl) => !nl.is_empty(),
            FuncValue::Logical(l) => l,
            FuncValue::Node(n) => n.test_filter(current, env),
            FuncValue::Value(v) => v.test_filter(current, env),
            FuncValue::Nothing => false,
        }
    }
}

/// One argument position of a function expression
#[derive(Debug, PartialEq, Clone)]
pub(crate) enum FuncExprArg {
    Literal(Literal),
    Singular(SingularQuery),
    Query(FilterQuery),
    Logical(LogicalOr),
    Func(FunctionExpr),
}

impl FuncExprArg {
    fn evaluate<'a>(&self, current: &'a Value, env: &EvalEnv<'a, '_>) -> FuncValue<'a> {
        match self {
            FuncExprArg::Literal(lit) => FuncValue::Value(lit.to_value()),
            FuncExprArg::Singular(q) => match q.node(current, env.root) {
                Some(n) => FuncValue::Node(n),
                None => FuncValue::Nothing,
            },
            FuncExprArg::Query(q) => FuncValue::Nodes(q.nodes(current, env)),
            FuncExprArg::Logical(l) => FuncValue::Logical(l.test_filter(current, env)),
            FuncExprArg::Func(f) => f.evaluate(current, env),
        }
    }

    pub(crate) fn as_kind(&self) -> FuncKind {
        match self {
            FuncExprArg::Literal(_) => FuncKind::Value,
            FuncExprArg::Singular(_) => FuncKind::Node,
            FuncExprArg::Query(q) => {
                if q.is_singular() {
                    FuncKind::Node
                } else {
                    FuncKind::Nodes
                }
            }
            FuncExprArg::Logical(_) => FuncKind::Logical,
            FuncExprArg::Func(f) => f.function.result,
        }
    }
}

/// An error raised while validating a function expression
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FunctionError {
    /// No function with the given name is registered
    #[error("function name '{name}' is not defined")]
    Undefined {
        /// The unresolved name
        name: String,
    },
    /// Wrong number of arguments
    #[error("expected {expected} args, but received {received}")]
    NumberOfArgsMismatch {
        /// Arguments the function declares
        expected: usize,
        /// Arguments received
        received: usize,
    },
    /// An argument kind does not convert to the declared parameter kind
    #[error("in argument position {position}, expected a type that converts to {expected}, received {received}")]
    MismatchTypeKind {
        /// Declared kind
        expected: FuncKind,
        /// Received kind
        received: FuncKind,
        /// Zero-based argument position
        position: usize,
    },
    /// A function was used in a position its return kind does not fit
    #[error("function with incorrect return type used")]
    IncorrectFunctionReturnType,
}

/// Shared validator body: argument count plus kind conversion per position
pub fn expect_args(expected: &[FuncKind], received: &[FuncKind]) -> Result<(), FunctionError> {
    if expected.len() != received.len() {
        return Err(FunctionError::NumberOfArgsMismatch {
            expected: expected.len(),
            received: received.len(),
        });
    }
    for (position, (want, got)) in expected.iter().zip(received.iter()).enumerate() {
        if !got.converts_to(*want) {
            return Err(FunctionError::MismatchTypeKind {
                expected: *want,
                received: *got,
                position,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{expect_args, FuncKind, FunctionError};

    #[test]
    fn conversion_table() {
        assert!(FuncKind::Nodes.converts_to(FuncKind::Logical));
        assert!(FuncKind::Node.converts_to(FuncKind::Value));
        assert!(!FuncKind::Value.converts_to(FuncKind::Nodes));
        assert!(!FuncKind::Logical.converts_to(FuncKind::Value));
    }

    #[test]
    fn arg_validation() {
        assert!(expect_args(&[FuncKind::Value], &[FuncKind::Node]).is_ok());
        assert_eq!(
            expect_args(&[FuncKind::Value], &[]),
            Err(FunctionError::NumberOfArgsMismatch {
                expected: 1,
                received: 0
            })
        );
        assert!(matches!(
            expect_args(&[FuncKind::Nodes], &[FuncKind::Value]),
            Err(FunctionError::MismatchTypeKind { position: 0, .. })
        ));
    }
}
