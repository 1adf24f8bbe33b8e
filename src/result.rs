//! Result assembly
//!
//! Projects the final context frontier into the caller's chosen output
//! shape, then applies flattening, the per-result callback, and wrapping.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::EvalError;
use crate::eval::context::{Context, PayloadKind};
use crate::eval::segment::walk;
use crate::eval::EvalEnv;
use crate::node::NodeList;
use crate::options::ResultType;

/// The outcome of one union branch before assembly
pub(crate) enum BranchOutcome<'a> {
    /// Contexts from the general evaluator
    Contexts(Vec<Context<'a>>),
    /// Plain values from a fast path; only produced for value results
    Values(Vec<&'a Value>),
}

/// The result of evaluating a query
///
/// [`QueryResult::Many`] is the shape of a wrapped result; with
/// `wrap = false`, empty results become [`QueryResult::Nothing`] and single
/// results are unwrapped into [`QueryResult::One`].
#[derive(Debug, PartialEq, Clone)]
pub enum QueryResult<'a> {
    /// No results, with wrapping disabled
    Nothing,
    /// A sole result, with wrapping disabled
    One(Box<QueryOutput<'a>>),
    /// The results in traversal order
    Many(Vec<QueryOutput<'a>>),
}

impl<'a> QueryResult<'a> {
    /// All outputs, regardless of wrapping
    pub fn all(self) -> Vec<QueryOutput<'a>> {
        match self {
            QueryResult::Nothing => Vec::new(),
            QueryResult::One(single) => vec![*single],
            QueryResult::Many(outputs) => outputs,
        }
    }

    /// Number of results
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Nothing => 0,
            QueryResult::One(_) => 1,
            QueryResult::Many(outputs) => outputs.len(),
        }
    }

    /// Check for an empty result
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The results as a [`NodeList`] of values
    ///
    /// Non-value outputs contribute their value payload where they have one
    /// (`all` records) and are dropped otherwise.
    pub fn nodes(self) -> NodeList<'a> {
        self.all()
            .into_iter()
            .filter_map(|output| match output {
                QueryOutput::Value(v) => Some(v),
                QueryOutput::All(record) => Some(record.value),
                _ => None,
            })
            .collect::<Vec<_>>()
            .into()
    }

    /// The results as owned JSON values, one per output
    pub fn values(self) -> Vec<Value> {
        self.all().into_iter().map(QueryOutput::into_value).collect()
    }
}

/// One projected result
#[derive(Debug, PartialEq, Clone)]
pub enum QueryOutput<'a> {
    /// The matched value
    Value(Cow<'a, Value>),
    /// Normalized bracket-notation location
    Path(String),
    /// RFC 6901 JSON Pointer
    Pointer(String),
    /// The matched node's parent, absent at the root
    Parent(Option<&'a Value>),
    /// The key under which the node hangs in its parent
    ParentProperty(Option<Value>),
    /// `{property, parent}` pairs from the root down to the node
    ParentChain(Vec<ChainLink<'a>>),
    /// Everything at once
    All(ResultRecord<'a>),
}

impl<'a> QueryOutput<'a> {
    /// Collapse into a single JSON value
    pub fn into_value(self) -> Value {
        match self {
            QueryOutput::Value(v) => v.into_owned(),
            QueryOutput::Path(p) => Value::String(p),
            QueryOutput::Pointer(p) => Value::String(p),
            QueryOutput::Parent(p) => p.cloned().unwrap_or(Value::Null),
            QueryOutput::ParentProperty(p) => p.unwrap_or(Value::Null),
            QueryOutput::ParentChain(links) => Value::Array(
                links
                    .into_iter()
                    .map(|link| {
                        let mut entry = serde_json::Map::new();
                        entry.insert(String::from("property"), link.property);
                        entry.insert(String::from("parent"), link.parent.clone());
                        Value::Object(entry)
                    })
                    .collect(),
            ),
            QueryOutput::All(record) => record.value.into_owned(),
        }
    }
}

/// One step of a parent chain
#[derive(Debug, PartialEq, Clone)]
pub struct ChainLink<'a> {
    /// The key taken at this step
    pub property: Value,
    /// The node holding that key
    pub parent: &'a Value,
}

/// The combined payload produced for `all` results and callbacks
#[derive(Debug, PartialEq, Clone)]
pub struct ResultRecord<'a> {
    /// The matched value, possibly substituted by a callback
    pub value: Cow<'a, Value>,
    /// Normalized bracket-notation location
    pub path: String,
    /// RFC 6901 JSON Pointer
    pub pointer: String,
    /// The parent node
    pub parent: Option<&'a Value>,
    /// The key within the parent
    pub parent_property: Option<Value>,
    /// Whether the value is a node or a property name
    pub payload: PayloadKind,
}

/// Project branch outcomes into the requested output shape
pub(crate) fn assemble<'a>(
    outcomes: Vec<BranchOutcome<'a>>,
    env: &EvalEnv<'a, '_>,
) -> Result<QueryResult<'a>, EvalError> {
    let mut outputs = Vec::new();
    for outcome in outcomes {
        match outcome {
            BranchOutcome::Values(values) => {
                outputs.extend(values.into_iter().map(|v| QueryOutput::Value(Cow::Borrowed(v))));
            }
            BranchOutcome::Contexts(contexts) => {
                for ctx in contexts {
                    outputs.push(project(ctx, env));
                }
            }
        }
    }
    let depth = env.opts.flatten.depth();
    if depth > 0 {
        outputs = flatten_outputs(outputs, depth);
    }
    Ok(if env.opts.wrap {
        QueryResult::Many(outputs)
    } else {
        match outputs.len() {
            0 => QueryResult::Nothing,
            1 => QueryResult::One(Box::new(outputs.remove(0))),
            _ => QueryResult::Many(outputs),
        }
    })
}

fn project<'a>(ctx: Context<'a>, env: &EvalEnv<'a, '_>) -> QueryOutput<'a> {
    let mut value = ctx.value.to_value();
    if let Some(callback) = &env.opts.callback {
        let mut record = build_record(&ctx, value.clone());
        if let Some(substituted) = callback(record.value.as_ref(), record.payload, &record) {
            value = Cow::Owned(substituted.clone());
            record.value = Cow::Owned(substituted);
        }
        if matches!(env.opts.result_type, ResultType::All) {
            return QueryOutput::All(record);
        }
    }
    match env.opts.result_type {
        ResultType::Value => QueryOutput::Value(value),
        ResultType::Path => QueryOutput::Path(ctx.loc.to_string()),
        ResultType::Pointer => QueryOutput::Pointer(ctx.loc.as_json_pointer()),
        ResultType::Parent => QueryOutput::Parent(ctx.parent),
        ResultType::ParentProperty => {
            QueryOutput::ParentProperty(ctx.parent_key.map(|k| k.to_value()))
        }
        ResultType::ParentChain => QueryOutput::ParentChain(build_chain(&ctx, env)),
        ResultType::All => QueryOutput::All(build_record(&ctx, value)),
    }
}

fn build_record<'a>(ctx: &Context<'a>, value: Cow<'a, Value>) -> ResultRecord<'a> {
    ResultRecord {
        value,
        path: ctx.loc.to_string(),
        pointer: ctx.loc.as_json_pointer(),
        parent: ctx.parent,
        parent_property: ctx.parent_key.map(|k| k.to_value()),
        payload: ctx.payload,
    }
}

// Walk from the root along the tracked location, collecting one link per
// step; the virtual root parent contributes a leading link.
fn build_chain<'a>(ctx: &Context<'a>, env: &EvalEnv<'a, '_>) -> Vec<ChainLink<'a>> {
    let cap = env.opts.max_parent_chain_depth.unwrap_or(usize::MAX);
    let mut chain = Vec::new();
    if let Some(parent) = env.opts.parent {
        chain.push(ChainLink {
            property: env
                .opts
                .parent_property
                .map(|p| Value::String(p.to_owned()))
                .unwrap_or(Value::Null),
            parent,
        });
    }
    let mut current = env.root;
    for elem in ctx.loc.iter() {
        if chain.len() >= cap {
            break;
        }
        chain.push(ChainLink {
            property: elem.to_value(),
            parent: current,
        });
        match walk(current, std::iter::once(*elem)) {
            Some(next) => current = next,
            None => break,
        }
    }
    chain.truncate(cap);
    chain
}

// Splice nested arrays into the value results, `depth` levels deep.
fn flatten_outputs(outputs: Vec<QueryOutput<'_>>, depth: usize) -> Vec<QueryOutput<'_>> {
    let mut outputs = outputs;
    for _ in 0..depth {
        let mut next = Vec::with_capacity(outputs.len());
        let mut changed = false;
        for output in outputs {
            match output {
                QueryOutput::Value(Cow::Borrowed(Value::Array(list))) => {
                    changed = true;
                    next.extend(list.iter().map(|v| QueryOutput::Value(Cow::Borrowed(v))));
                }
                QueryOutput::Value(Cow::Owned(Value::Array(list))) => {
                    changed = true;
                    next.extend(list.into_iter().map(|v| QueryOutput::Value(Cow::Owned(v))));
                }
                other => next.push(other),
            }
        }
        outputs = next;
        if !changed {
            break;
        }
    }
    outputs
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use serde_json::json;

    use super::{flatten_outputs, QueryOutput};

    #[test]
    fn flatten_splices_arrays() {
        let doc = json!([[1, 2], [3], 4]);
        let outputs = doc
            .as_array()
            .unwrap()
            .iter()
            .map(|v| QueryOutput::Value(Cow::Borrowed(v)))
            .collect::<Vec<_>>();
        let flat = flatten_outputs(outputs, 1);
        assert_eq!(
            flat.into_iter()
                .map(QueryOutput::into_value)
                .collect::<Vec<_>>(),
            vec![json!(1), json!(2), json!(3), json!(4)]
        );
    }

    #[test]
    fn flatten_depth_is_respected() {
        let doc = json!([[[1], [2]]]);
        let outputs = doc
            .as_array()
            .unwrap()
            .iter()
            .map(|v| QueryOutput::Value(Cow::Borrowed(v)))
            .collect::<Vec<_>>();
        let once = flatten_outputs(outputs.clone(), 1);
        assert_eq!(once.len(), 2);
        let twice = flatten_outputs(outputs, 2);
        assert_eq!(
            twice
                .into_iter()
                .map(QueryOutput::into_value)
                .collect::<Vec<_>>(),
            vec![json!(1), json!(2)]
        );
    }
}
