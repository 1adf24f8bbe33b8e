//! Evaluation options

use std::collections::HashMap;

use serde_json::Value;

use crate::eval::context::PayloadKind;
use crate::result::ResultRecord;

/// Names made available inside legacy filter and script expressions
pub type Sandbox = HashMap<String, Value>;

/// Per-result visitor, invoked with the value, its payload kind, and the
/// full result record; returning `Some` substitutes the value
pub type QueryCallback<'a> =
    Box<dyn Fn(&Value, PayloadKind, &ResultRecord<'a>) -> Option<Value> + 'a>;

/// The shape each matched node is projected into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultType {
    /// The matched values themselves
    #[default]
    Value,
    /// Normalized bracket-notation location strings
    Path,
    /// RFC 6901 JSON Pointer strings
    Pointer,
    /// The parents of the matched nodes
    Parent,
    /// The keys under which the matched nodes hang in their parents
    ParentProperty,
    /// The chain of `{property, parent}` pairs from the root down
    ParentChain,
    /// A record combining all of the above
    All,
}

/// Which predicate semantics `[?…]` filters use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// RFC 9535 filter expressions
    #[default]
    Rfc,
    /// The legacy JS-subset expressions, evaluated once per candidate child
    JsonPath,
    /// The legacy expressions, evaluated once per parent context
    XPath,
}

/// Whether and how legacy filter and script expressions may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalPolicy {
    /// Any legacy filter or script fails with an eval-disabled error
    Off,
    /// Evaluate expressions without the identifier scan
    Native,
    /// Scan identifiers against the allow-list before evaluating
    #[default]
    Safe,
}

/// Flattening of nested arrays in value results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flatten {
    /// Leave results as matched
    #[default]
    Off,
    /// Flatten nested arrays by this many levels
    Depth(usize),
}

impl Flatten {
    pub(crate) fn depth(&self) -> usize {
        match self {
            Flatten::Off => 0,
            Flatten::Depth(d) => *d,
        }
    }
}

impl From<bool> for Flatten {
    fn from(value: bool) -> Self {
        if value {
            Flatten::Depth(1)
        } else {
            Flatten::Off
        }
    }
}

impl From<usize> for Flatten {
    fn from(depth: usize) -> Self {
        Flatten::Depth(depth)
    }
}

/// Options recognized by the evaluator
///
/// The lifetime ties the parent overrides and the callback to the document
/// being queried.
pub struct QueryOptions<'a> {
    /// Output shape per result
    pub result_type: ResultType,
    /// When `false`, empty results become nothing and single results are
    /// unwrapped
    pub wrap: bool,
    /// Nested-array flattening for value results
    pub flatten: Flatten,
    /// Filter semantics for `[?…]`
    pub filter_mode: FilterMode,
    /// Policy for legacy filters and scripts
    pub eval: EvalPolicy,
    /// Hard block on expression evaluation regardless of `eval`
    pub prevent_eval: bool,
    /// Names available inside legacy expressions
    pub sandbox: Sandbox,
    /// Treat per-candidate expression errors as a failed match
    pub ignore_eval_errors: bool,
    /// Per-result visitor and optional transformer
    pub callback: Option<QueryCallback<'a>>,
    /// Virtual parent of the document root
    pub parent: Option<&'a Value>,
    /// Key of the document root within its virtual parent
    pub parent_property: Option<&'a str>,
    /// Cap on the length of parent chains
    pub max_parent_chain_depth: Option<usize>,
}

impl<'a> Default for QueryOptions<'a> {
    fn default() -> Self {
        Self {
            result_type: ResultType::default(),
            wrap: true,
            flatten: Flatten::default(),
            filter_mode: FilterMode::default(),
            eval: EvalPolicy::default(),
            prevent_eval: false,
            sandbox: Sandbox::default(),
            ignore_eval_errors: false,
            callback: None,
            parent: None,
            parent_property: None,
            max_parent_chain_depth: None,
        }
    }
}

impl<'a> QueryOptions<'a> {
    /// Options with all defaults: wrapped value results, RFC filters, safe
    /// eval policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output shape
    pub fn with_result_type(mut self, result_type: ResultType) -> Self {
        self.result_type = result_type;
        self
    }

    /// Control single/empty unwrapping
    pub fn with_wrap(mut self, wrap: bool) -> Self {
        self.wrap = wrap;
        self
    }

    /// Set the nested-array flattening depth
    pub fn with_flatten(mut self, flatten: impl Into<Flatten>) -> Self {
        self.flatten = flatten.into();
        self
    }

    /// Choose the filter semantics for `[?…]`
    pub fn with_filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter_mode = mode;
        self
    }

    /// Choose the legacy expression policy
    pub fn with_eval(mut self, policy: EvalPolicy) -> Self {
        self.eval = policy;
        self
    }

    /// Hard-block expression evaluation regardless of the policy
    pub fn with_prevent_eval(mut self, prevent: bool) -> Self {
        self.prevent_eval = prevent;
        self
    }

    /// Provide names for legacy expressions
    pub fn with_sandbox(mut self, sandbox: Sandbox) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Treat per-candidate expression errors as a failed match
    pub fn with_ignore_eval_errors(mut self, ignore: bool) -> Self {
        self.ignore_eval_errors = ignore;
        self
    }

    /// Install a per-result visitor
    pub fn with_callback(mut self, callback: QueryCallback<'a>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Override the virtual parent of the document root
    pub fn with_parent(mut self, parent: &'a Value) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Override the key of the document root within its virtual parent
    pub fn with_parent_property(mut self, property: &'a str) -> Self {
        self.parent_property = Some(property);
        self
    }

    /// Cap the length of parent chains
    pub fn with_max_parent_chain_depth(mut self, depth: usize) -> Self {
        self.max_parent_chain_depth = Some(depth);
        self
    }

    /// True when the legacy expression engine may run at all
    pub(crate) fn eval_allowed(&self) -> bool {
        !self.prevent_eval && !matches!(self.eval, EvalPolicy::Off)
    }
}

impl<'a> std::fmt::Debug for QueryOptions<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryOptions")
            .field("result_type", &self.result_type)
            .field("wrap", &self.wrap)
            .field("flatten", &self.flatten)
            .field("filter_mode", &self.filter_mode)
            .field("eval", &self.eval)
            .field("prevent_eval", &self.prevent_eval)
            .field("sandbox", &self.sandbox)
            .field("ignore_eval_errors", &self.ignore_eval_errors)
            .field("callback", &self.callback.as_ref().map(|_| "<fn>"))
            .field("parent", &self.parent)
            .field("parent_property", &self.parent_property)
            .field("max_parent_chain_depth", &self.max_parent_chain_depth)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{EvalPolicy, Flatten, QueryOptions};

    #[test]
    fn defaults() {
        let opts = QueryOptions::new();
        assert!(opts.wrap);
        assert!(opts.eval_allowed());
        assert_eq!(opts.flatten, Flatten::Off);
    }

    #[test]
    fn eval_gating() {
        let opts = QueryOptions::new().with_eval(EvalPolicy::Off);
        assert!(!opts.eval_allowed());
        let opts = QueryOptions::new().with_prevent_eval(true);
        assert!(!opts.eval_allowed());
    }

    #[test]
    fn flatten_conversions() {
        assert_eq!(Flatten::from(true), Flatten::Depth(1));
        assert_eq!(Flatten::from(false), Flatten::Off);
        assert_eq!(Flatten::from(3usize).depth(), 3);
    }
}
